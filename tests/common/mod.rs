//! Builds small EPUB containers in memory.

#![allow(dead_code)]

use std::io::{Cursor, Write};

use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

/// Zip `files` into an EPUB. `mimetype` is written first, uncompressed.
pub fn build_epub(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    zip.start_file("mimetype", stored).unwrap();
    zip.write_all(b"application/epub+zip").unwrap();
    zip.start_file("META-INF/container.xml", stored).unwrap();
    zip.write_all(
        br#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#,
    )
    .unwrap();
    for (name, data) in files {
        zip.start_file(*name, stored).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

pub const OPF: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>Three Sections</dc:title>
    <dc:creator>A. Writer</dc:creator>
    <dc:language>ja</dc:language>
    <dc:identifier id="isbn">urn:isbn:0000000000</dc:identifier>
    <dc:identifier id="uid">urn:uuid:3f1c2a00-basalt</dc:identifier>
  </metadata>
  <manifest>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="s0" href="text/s0.xhtml" media-type="application/xhtml+xml"/>
    <item id="s1" href="text/s1.xhtml" media-type="application/xhtml+xml"/>
    <item id="s2" href="text/s2.xhtml" media-type="application/xhtml+xml"/>
    <item id="css" href="css/book.css" media-type="text/css"/>
    <item id="vertical" href="css/vertical.css" media-type="text/css"/>
    <item id="base" href="css/base.css" media-type="text/css"/>
    <item id="cover" href="img/cover.png" media-type="image/png"/>
  </manifest>
  <spine>
    <itemref idref="s0"/>
    <itemref idref="s1" linear="no"/>
    <itemref idref="s2"/>
  </spine>
</package>"#;

pub const NAV: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>Contents</title></head>
<body>
  <nav epub:type="toc">
    <ol>
      <li><a href="text/s0.xhtml">Opening</a></li>
      <li><a href="text/s1.xhtml">Notes</a>
        <ol><li><a href="text/s1.xhtml#n2">Note 2</a></li></ol>
      </li>
      <li><a href="text/s2.xhtml#start">Vertical</a></li>
    </ol>
  </nav>
</body>
</html>"#;

pub const S0: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" id="root">
<head>
  <title>Opening</title>
  <link rel="stylesheet" type="text/css" href="../css/book.css"/>
</head>
<body class="opening">
  <img src="../img/cover.png" alt="cover"/>
  <p>See <a href="s2.xhtml#start">the vertical part</a> or
     <a href="s1.xhtml#n2">note 2</a> or <a href="https://example.com/">elsewhere</a>.</p>
  <p class="basaltnav">A paragraph that already uses a chrome class.</p>
</body>
</html>"#;

pub const S1: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>Notes</title></head>
<body><p id="n1">Note 1</p><p id="n2">Note 2</p></body>
</html>"#;

pub const S2: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head>
  <title>Vertical</title>
  <link rel="stylesheet" type="text/css" href="../css/book.css"/>
  <link rel="stylesheet" type="text/css" href="../css/vertical.css"/>
</head>
<body>
  <div class="outer"><div class="inner" id="start"><p>縦書き</p><p>二段落</p></div></div>
</body>
</html>"#;

pub const BOOK_CSS: &str = r#"@charset "utf-8";
@import url("base.css") screen;
html { font-size: 100% }
body { margin: 0 5%; -webkit-hyphens: auto; background: url(../img/cover.png) }
h1 + body, .body, bodyfoo { color: red }
"#;

pub const BASE_CSS: &str = "p { text-indent: 1em }\n";

pub const VERTICAL_CSS: &str = r#"html { -epub-writing-mode: vertical-rl }
.outer { writing-mode: horizontal-tb }
div.inner { writing-mode: vertical-lr }
"#;

pub const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

/// Three sections; the middle one is non-linear.
pub fn sample_epub() -> Vec<u8> {
    build_epub(&[
        ("OEBPS/content.opf", OPF.as_bytes()),
        ("OEBPS/nav.xhtml", NAV.as_bytes()),
        ("OEBPS/text/s0.xhtml", S0.as_bytes()),
        ("OEBPS/text/s1.xhtml", S1.as_bytes()),
        ("OEBPS/text/s2.xhtml", S2.as_bytes()),
        ("OEBPS/css/book.css", BOOK_CSS.as_bytes()),
        ("OEBPS/css/base.css", BASE_CSS.as_bytes()),
        ("OEBPS/css/vertical.css", VERTICAL_CSS.as_bytes()),
        ("OEBPS/img/cover.png", PNG),
    ])
}
