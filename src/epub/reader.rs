use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::HashMap;
use std::io::{Read, Seek};
use std::path::Path;
use zip::ZipArchive;

use crate::book::{Book, Metadata, TocEntry};
use crate::error::{Error, Result};
use crate::loader::resolve_path;
use crate::util::strip_bom;

/// A manifest `<item>`
struct ManifestItem {
    href: String,
    media_type: String,
    properties: Option<String>,
}

/// A spine `<itemref>`
struct ItemRef {
    idref: String,
    linear: bool,
}

/// Parsed OPF content
struct OpfData {
    metadata: Metadata,
    manifest: HashMap<String, ManifestItem>,
    spine: Vec<ItemRef>,
    ncx_id: Option<String>,
}

/// Read an EPUB file from disk into a [`Book`].
///
/// # Example
///
/// ```no_run
/// use basalt::read_epub;
///
/// let book = read_epub("path/to/book.epub")?;
/// println!("Title: {}", book.metadata.title);
/// # Ok::<(), basalt::Error>(())
/// ```
pub fn read_epub<P: AsRef<Path>>(path: P) -> Result<Book> {
    let file = std::fs::File::open(path)?;
    read_epub_from_reader(file)
}

/// Read an EPUB from any [`Read`] + [`Seek`] source.
///
/// Resources, spine hrefs, and TOC hrefs in the returned book are all full
/// container paths.
pub fn read_epub_from_reader<R: Read + Seek>(reader: R) -> Result<Book> {
    let mut archive = ZipArchive::new(reader)?;

    let opf_path = find_opf_path(&mut archive)?;
    let opf_content = read_archive_file(&mut archive, &opf_path)?;
    let OpfData {
        metadata,
        manifest,
        spine,
        ncx_id,
    } = parse_opf(&opf_content)?;

    let mut book = Book::new();
    book.metadata = metadata;

    let container_path = |href: &str| {
        let decoded = percent_encoding::percent_decode_str(href).decode_utf8_lossy();
        resolve_path(&opf_path, &decoded)
    };

    for item in manifest.values() {
        let full_path = container_path(&item.href);
        match read_archive_file_bytes(&mut archive, &full_path) {
            Ok(data) => book.add_resource(full_path, data, item.media_type.clone()),
            Err(e) => log::warn!("manifest item {full_path:?} could not be read: {e}"),
        }
    }

    for itemref in spine {
        let Some(item) = manifest.get(&itemref.idref) else {
            log::warn!("spine itemref {:?} has no manifest item", itemref.idref);
            continue;
        };
        let href = container_path(&item.href);
        if itemref.linear {
            book.add_spine_item(itemref.idref, href, item.media_type.clone());
        } else {
            book.add_nonlinear_spine_item(itemref.idref, href, item.media_type.clone());
        }
    }

    if book.spine.is_empty() {
        return Err(Error::InvalidEpub("spine has no readable items".into()));
    }

    // EPUB 3 navigation document first, NCX as the fallback
    let nav_path = manifest
        .values()
        .find(|item| has_property(item, "nav"))
        .map(|item| container_path(&item.href));
    if let Some(nav_path) = nav_path
        && let Some(resource) = book.get_resource(&nav_path)
    {
        let content = String::from_utf8_lossy(strip_bom(&resource.data)).into_owned();
        book.toc = parse_nav(&content, &nav_path)?;
    }

    if book.toc.is_empty()
        && let Some(ncx_item) = ncx_id
            .as_ref()
            .and_then(|id| manifest.get(id))
            .or_else(|| {
                manifest
                    .values()
                    .find(|item| item.media_type == "application/x-dtbncx+xml")
            })
    {
        let ncx_path = container_path(&ncx_item.href);
        if let Some(resource) = book.get_resource(&ncx_path) {
            let content = String::from_utf8_lossy(strip_bom(&resource.data)).into_owned();
            book.toc = parse_ncx(&content, &ncx_path)?;
        }
    }

    log::debug!(
        "read {:?}: {} spine items, {} top-level TOC entries, {} resources",
        book.metadata.title,
        book.spine.len(),
        book.toc.len(),
        book.resources.len()
    );

    Ok(book)
}

fn has_property(item: &ManifestItem, property: &str) -> bool {
    item.properties
        .as_ref()
        .is_some_and(|props| props.split_ascii_whitespace().any(|p| p == property))
}

fn find_opf_path<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<String> {
    let container = read_archive_file(archive, "META-INF/container.xml")?;

    let mut reader = Reader::from_str(&container);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e))
                if local_name(e.name().as_ref()) == b"rootfile" =>
            {
                if let Some(path) = attr_value(&e, b"full-path")? {
                    return Ok(path);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    Err(Error::InvalidEpub(
        "No rootfile found in container.xml".into(),
    ))
}

fn parse_opf(content: &str) -> Result<OpfData> {
    let mut reader = Reader::from_str(content);
    // Text is trimmed once complete; trimming each event would eat the
    // spaces around entity references.
    reader.config_mut().trim_text(false);

    let mut metadata = Metadata::default();
    let mut manifest: HashMap<String, ManifestItem> = HashMap::new();
    let mut spine: Vec<ItemRef> = Vec::new();
    let mut ncx_id: Option<String> = None;

    let mut unique_identifier_id: Option<String> = None;
    // (element id, text) of every dc:identifier
    let mut identifiers: Vec<(Option<String>, String)> = Vec::new();

    let mut in_metadata = false;
    let mut current_element: Option<(Vec<u8>, Option<String>)> = None;
    let mut buf_text = String::new();

    loop {
        let event = reader.read_event();
        match event {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let is_empty = matches!(event, Ok(Event::Empty(_)));
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"package" => unique_identifier_id = attr_value(e, b"unique-identifier")?,
                    b"metadata" => in_metadata = !is_empty,
                    local @ (b"title" | b"creator" | b"language" | b"identifier")
                        if in_metadata && !is_empty =>
                    {
                        current_element = Some((local.to_vec(), attr_value(e, b"id")?));
                        buf_text.clear();
                    }
                    b"spine" => ncx_id = attr_value(e, b"toc")?,
                    b"item" => {
                        let id = attr_value(e, b"id")?.unwrap_or_default();
                        if !id.is_empty() {
                            manifest.insert(
                                id,
                                ManifestItem {
                                    href: attr_value(e, b"href")?.unwrap_or_default(),
                                    media_type: attr_value(e, b"media-type")?.unwrap_or_default(),
                                    properties: attr_value(e, b"properties")?,
                                },
                            );
                        }
                    }
                    b"itemref" => {
                        if let Some(idref) = attr_value(e, b"idref")? {
                            let linear = attr_value(e, b"linear")?
                                .is_none_or(|v| v.trim() != "no");
                            spine.push(ItemRef { idref, linear });
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                if current_element.is_some() {
                    buf_text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if current_element.is_some() {
                    buf_text.push_str(&resolve_entity(&String::from_utf8_lossy(e.as_ref())));
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());

                if local == b"metadata" {
                    in_metadata = false;
                }

                if let Some((elem, id)) = current_element.take_if(|(elem, _)| elem.as_slice() == local) {
                    let text = buf_text.trim().to_string();
                    match elem.as_slice() {
                        b"title" if metadata.title.is_empty() => metadata.title = text,
                        b"creator" => metadata.authors.push(text),
                        b"language" if metadata.language.is_empty() => metadata.language = text,
                        b"identifier" => identifiers.push((id, text)),
                        _ => {}
                    }
                    buf_text.clear();
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    // The package names which dc:identifier is the unique one
    metadata.identifier = unique_identifier_id
        .and_then(|uid| {
            identifiers
                .iter()
                .find(|(id, _)| id.as_deref() == Some(uid.as_str()))
                .map(|(_, text)| text.clone())
        })
        .or_else(|| identifiers.first().map(|(_, text)| text.clone()))
        .unwrap_or_default();

    Ok(OpfData {
        metadata,
        manifest,
        spine,
        ncx_id,
    })
}

/// Join a TOC href onto the path of the document that contains it.
fn toc_href(doc_path: &str, href: &str) -> String {
    let (path, fragment) = match href.split_once('#') {
        Some((p, f)) => (p, Some(f)),
        None => (href, None),
    };
    let decoded = percent_encoding::percent_decode_str(path).decode_utf8_lossy();
    let full = if decoded.is_empty() {
        doc_path.to_string()
    } else {
        resolve_path(doc_path, &decoded)
    };
    match fragment {
        Some(f) if !f.is_empty() => format!("{full}#{f}"),
        _ => full,
    }
}

fn parse_ncx(content: &str, ncx_path: &str) -> Result<Vec<TocEntry>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(false);

    struct NavPointState {
        children: Vec<TocEntry>,
        text: String,
        src: Option<String>,
        play_order: Option<usize>,
    }

    let new_state = |play_order| NavPointState {
        children: Vec::new(),
        text: String::new(),
        src: None,
        play_order,
    };

    let mut stack: Vec<NavPointState> = vec![new_state(None)];
    let mut in_text = false;
    // navLabel text only; docTitle/docAuthor text is ignored
    let mut in_nav_point = 0usize;

    loop {
        let event = reader.read_event();
        match event {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let is_empty = matches!(event, Ok(Event::Empty(_)));
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"navPoint" if !is_empty => {
                        let play_order = attr_value(e, b"playOrder")?.and_then(|v| v.parse().ok());
                        stack.push(new_state(play_order));
                        in_nav_point += 1;
                    }
                    b"text" if !is_empty && in_nav_point > 0 => in_text = true,
                    b"content" => {
                        if let Some(src) = attr_value(e, b"src")?
                            && let Some(state) = stack.last_mut()
                            && state.src.is_none()
                        {
                            state.src = Some(toc_href(ncx_path, &src));
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                if in_text && let Some(state) = stack.last_mut() {
                    state.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if in_text && let Some(state) = stack.last_mut() {
                    state
                        .text
                        .push_str(&resolve_entity(&String::from_utf8_lossy(e.as_ref())));
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"text" => in_text = false,
                    b"navPoint" => {
                        in_nav_point = in_nav_point.saturating_sub(1);
                        if stack.len() > 1
                            && let Some(state) = stack.pop()
                            && let Some(parent) = stack.last_mut()
                        {
                            let mut entry =
                                TocEntry::new(state.text.trim(), state.src.unwrap_or_default());
                            entry.children = state.children;
                            entry.play_order = state.play_order;
                            parent.children.push(entry);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    let mut toc = stack.into_iter().next().map(|s| s.children).unwrap_or_default();
    sort_by_play_order(&mut toc);
    Ok(toc)
}

fn sort_by_play_order(entries: &mut [TocEntry]) {
    if entries.iter().all(|e| e.play_order.is_some()) {
        entries.sort_by_key(|e| e.play_order);
    }
    for entry in entries.iter_mut() {
        sort_by_play_order(&mut entry.children);
    }
}

/// Parse the `<nav epub:type="toc">` list of an EPUB 3 navigation document.
fn parse_nav(content: &str, nav_path: &str) -> Result<Vec<TocEntry>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(false);
    reader.config_mut().check_end_names = false;

    let mut nav_depth = 0usize;
    let mut in_toc = false;
    // One list per open <ol>, with the root list at the bottom
    let mut lists: Vec<Vec<TocEntry>> = vec![Vec::new()];
    // One slot per open <li>
    let mut items: Vec<Option<TocEntry>> = Vec::new();
    let mut label: Option<(String, String)> = None;
    let mut label_depth = 0usize;

    loop {
        let event = reader.read_event();
        match event {
            Ok(Event::Start(ref e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                if local == b"nav" {
                    nav_depth += 1;
                    if !in_toc && is_toc_nav(e)? {
                        in_toc = true;
                        nav_depth = 1;
                    }
                    continue;
                }
                if !in_toc {
                    continue;
                }
                if label.is_some() {
                    label_depth += 1;
                    continue;
                }
                match local {
                    b"ol" | b"ul" => lists.push(Vec::new()),
                    b"li" => items.push(None),
                    b"a" | b"span" if !items.is_empty() => {
                        let href = attr_value(e, b"href")?
                            .map(|h| toc_href(nav_path, &h))
                            .unwrap_or_default();
                        label = Some((String::new(), href));
                        label_depth = 0;
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                if let Some((text, _)) = label.as_mut() {
                    text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if let Some((text, _)) = label.as_mut() {
                    text.push_str(&resolve_entity(&String::from_utf8_lossy(e.as_ref())));
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                if local == b"nav" {
                    nav_depth = nav_depth.saturating_sub(1);
                    if in_toc && nav_depth == 0 {
                        break;
                    }
                    continue;
                }
                if !in_toc {
                    continue;
                }
                if label.is_some() {
                    if label_depth > 0 {
                        label_depth -= 1;
                        continue;
                    }
                    if let Some((text, href)) = label.take()
                        && let Some(slot) = items.last_mut()
                        && slot.is_none()
                    {
                        let title = text.split_whitespace().collect::<Vec<_>>().join(" ");
                        *slot = Some(TocEntry::new(title, href));
                    }
                    continue;
                }
                match local {
                    b"ol" | b"ul" if lists.len() > 1 => {
                        let children = lists.pop().unwrap_or_default();
                        match items.last_mut() {
                            Some(Some(entry)) => entry.children.extend(children),
                            _ => {
                                if let Some(list) = lists.last_mut() {
                                    list.extend(children);
                                }
                            }
                        }
                    }
                    b"li" => {
                        if let Some(Some(entry)) = items.pop()
                            && let Some(list) = lists.last_mut()
                        {
                            list.push(entry);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    while lists.len() > 1 {
        let children = lists.pop().unwrap_or_default();
        if let Some(list) = lists.last_mut() {
            list.extend(children);
        }
    }
    Ok(lists.pop().unwrap_or_default())
}

fn is_toc_nav(e: &BytesStart<'_>) -> Result<bool> {
    for attr in e.attributes().flatten() {
        if local_name(attr.key.as_ref()) == b"type" {
            let value = String::from_utf8(attr.value.to_vec())?;
            return Ok(value.split_ascii_whitespace().any(|t| t == "toc"));
        }
    }
    Ok(false)
}

fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == key {
            let raw = String::from_utf8(attr.value.to_vec())?;
            return Ok(Some(unescape_attr(&raw)));
        }
    }
    Ok(None)
}

fn unescape_attr(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        match rest[amp + 1..].find(';') {
            Some(semi) => {
                out.push_str(&resolve_entity(&rest[amp + 1..amp + 1 + semi]));
                rest = &rest[amp + semi + 2..];
            }
            None => {
                out.push_str(&rest[amp..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Resolve a predefined or numeric XML entity name (without `&`/`;`).
fn resolve_entity(entity: &str) -> String {
    match entity {
        "apos" => "'".to_string(),
        "quot" => "\"".to_string(),
        "lt" => "<".to_string(),
        "gt" => ">".to_string(),
        "amp" => "&".to_string(),
        "nbsp" => "\u{a0}".to_string(),
        _ => {
            let code = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok()
            } else {
                entity.strip_prefix('#').and_then(|dec| dec.parse().ok())
            };
            code.and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_default()
        }
    }
}

fn read_archive_file<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<String> {
    let bytes = read_archive_file_bytes(archive, path)?;
    Ok(String::from_utf8(strip_bom(&bytes).to_vec())?)
}

fn read_archive_file_bytes<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> Result<Vec<u8>> {
    match archive.by_name(path) {
        Ok(mut file) => {
            let mut contents = Vec::new();
            file.read_to_end(&mut contents)?;
            return Ok(contents);
        }
        Err(zip::result::ZipError::FileNotFound) => {}
        Err(e) => return Err(e.into()),
    }

    // Some containers store entry names percent-encoded
    let encoded: String =
        percent_encoding::utf8_percent_encode(path, PATH_ENCODE_SET).to_string();
    let mut file = archive.by_name(&encoded)?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents)?;
    Ok(contents)
}

const PATH_ENCODE_SET: &percent_encoding::AsciiSet = &percent_encoding::CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Extract local name from potentially namespaced XML name
fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="isbn">978-0000000000</dc:identifier>
    <dc:identifier id="uid">urn:uuid:1234</dc:identifier>
    <dc:title>Don&apos;t Panic</dc:title>
    <dc:creator>A. Author</dc:creator>
    <dc:language>en</dc:language>
  </metadata>
  <manifest>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="c1" href="text/c1.xhtml" media-type="application/xhtml+xml"/>
    <item id="notes" href="text/notes.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine toc="ncx">
    <itemref idref="c1"/>
    <itemref idref="notes" linear="no"></itemref>
  </spine>
</package>"#;

    #[test]
    fn test_local_name() {
        assert_eq!(local_name(b"dc:title"), b"title");
        assert_eq!(local_name(b"title"), b"title");
    }

    #[test]
    fn test_parse_opf() {
        let opf = parse_opf(OPF).unwrap();
        assert_eq!(opf.metadata.title, "Don't Panic");
        assert_eq!(opf.metadata.identifier, "urn:uuid:1234");
        assert_eq!(opf.metadata.authors, vec!["A. Author"]);
        assert_eq!(opf.spine.len(), 2);
        assert!(opf.spine[0].linear);
        assert!(!opf.spine[1].linear);
        assert_eq!(opf.ncx_id.as_deref(), Some("ncx"));
        assert!(has_property(&opf.manifest["nav"], "nav"));
    }

    #[test]
    fn test_parse_ncx_resolves_against_ncx_path() {
        let ncx = r#"<ncx><docTitle><text>Book</text></docTitle><navMap>
            <navPoint id="a" playOrder="2"><navLabel><text>Two</text></navLabel><content src="text/c2.xhtml"/></navPoint>
            <navPoint id="b" playOrder="1"><navLabel><text>One &amp; Only</text></navLabel><content src="text/c1.xhtml#top"/>
                <navPoint id="c" playOrder="3"><navLabel><text>Sub</text></navLabel><content src="text/c1.xhtml#sub"/></navPoint>
            </navPoint>
        </navMap></ncx>"#;
        let toc = parse_ncx(ncx, "OEBPS/toc.ncx").unwrap();
        assert_eq!(toc.len(), 2);
        assert_eq!(toc[0].title, "One & Only");
        assert_eq!(toc[0].href, "OEBPS/text/c1.xhtml#top");
        assert_eq!(toc[0].children[0].href, "OEBPS/text/c1.xhtml#sub");
        assert_eq!(toc[1].href, "OEBPS/text/c2.xhtml");
    }

    #[test]
    fn test_parse_nav() {
        let nav = r#"<?xml version="1.0"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<body>
  <nav epub:type="landmarks"><ol><li><a href="c1.xhtml">Begin</a></li></ol></nav>
  <nav epub:type="toc" id="toc">
    <h1>Contents</h1>
    <ol>
      <li><a href="text/c1.xhtml">Chapter <em>One</em></a>
        <ol><li><a href="text/c1.xhtml#s1">Section&#160;1</a></li></ol>
      </li>
      <li><span>Part</span>
        <ol><li><a href="text/c2.xhtml">Chapter Two</a></li></ol>
      </li>
    </ol>
  </nav>
</body></html>"#;
        let toc = parse_nav(nav, "OEBPS/nav.xhtml").unwrap();
        assert_eq!(toc.len(), 2);
        assert_eq!(toc[0].title, "Chapter One");
        assert_eq!(toc[0].href, "OEBPS/text/c1.xhtml");
        assert_eq!(toc[0].children[0].title, "Section\u{a0}1");
        assert_eq!(toc[0].children[0].href, "OEBPS/text/c1.xhtml#s1");
        assert_eq!(toc[1].title, "Part");
        assert_eq!(toc[1].href, "");
        assert_eq!(toc[1].children[0].href, "OEBPS/text/c2.xhtml");
    }

    #[test]
    fn test_toc_href() {
        assert_eq!(toc_href("OEBPS/toc.ncx", "a%20b.xhtml#x"), "OEBPS/a b.xhtml#x");
        assert_eq!(toc_href("OEBPS/nav.xhtml", "#frag"), "OEBPS/nav.xhtml#frag");
    }

    #[test]
    fn test_resolve_entity() {
        assert_eq!(resolve_entity("amp"), "&");
        assert_eq!(resolve_entity("#160"), "\u{a0}");
        assert_eq!(resolve_entity("#x41"), "A");
        assert_eq!(resolve_entity("bogus"), "");
    }
}
