//! Collision-free class and id names for injected chrome.
//!
//! Host chrome is injected into untrusted documents, so every class and id it
//! uses must be absent from the document. Names are probed against the live
//! DOM at allocation time and escaped by prepending `_` until free.

use crate::dom::ArenaDom;

/// Character prepended to a base name until it no longer collides.
pub const ESCAPE_CHAR: char = '_';

/// Return `base`, or `base` prefixed with as many `_` as needed so that no
/// attached element has it in its class list.
pub fn unique_class_name(dom: &ArenaDom, base: &str) -> String {
    unique_name(base, |probe| dom.count_elements_with_class(probe) > 0)
}

/// Return `base`, or `base` prefixed with as many `_` as needed so that no
/// attached element has it as its id.
pub fn unique_id_name(dom: &ArenaDom, base: &str) -> String {
    unique_name(base, |probe| dom.get_by_id(probe).is_some())
}

fn unique_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    let mut candidate = base.to_string();
    while taken(&candidate) {
        candidate.insert(0, ESCAPE_CHAR);
    }
    candidate
}

/// Every class and id the injected chrome uses in one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceSet {
    pub ignore_styles_class: String,
    pub header_id: String,
    pub footer_id: String,
    pub close_button_id: String,
    pub style_editor_toggle_id: String,
    pub return_to_top_id: String,
    pub nav_class: String,
    pub html_wrapper_class: String,
    pub body_wrapper_class: String,
    /// Used for the section wrapper when the body has no id of its own.
    pub outer_section_id: String,
}

impl NamespaceSet {
    /// Allocate every chrome name against the document as it stands now.
    ///
    /// Must run before any chrome is injected; names are not re-checked later.
    pub fn allocate(dom: &ArenaDom) -> Self {
        let set = Self {
            ignore_styles_class: unique_class_name(dom, "basaltignorestyles"),
            header_id: unique_id_name(dom, "basaltheader"),
            footer_id: unique_id_name(dom, "basaltfooter"),
            close_button_id: unique_id_name(dom, "basaltclosebook"),
            style_editor_toggle_id: unique_id_name(dom, "basaltstyleeditortoggle"),
            return_to_top_id: unique_id_name(dom, "basaltreturntotop"),
            nav_class: unique_class_name(dom, "basaltnav"),
            html_wrapper_class: unique_class_name(dom, "basaltmainhtml"),
            body_wrapper_class: unique_class_name(dom, "basaltmainbody"),
            outer_section_id: unique_id_name(dom, "basaltsection"),
        };
        log::debug!("allocated chrome namespace: {set:?}");
        set
    }

    /// All allocated class names.
    pub fn classes(&self) -> [&str; 4] {
        [
            &self.ignore_styles_class,
            &self.nav_class,
            &self.html_wrapper_class,
            &self.body_wrapper_class,
        ]
    }

    /// All allocated ids.
    pub fn ids(&self) -> [&str; 6] {
        [
            &self.header_id,
            &self.footer_id,
            &self.close_button_id,
            &self.style_editor_toggle_id,
            &self.return_to_top_id,
            &self.outer_section_id,
        ]
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::dom::parse_html;

    #[test]
    fn test_unused_name_is_returned_as_is() {
        let dom = parse_html("<p class='other'>x</p>");
        assert_eq!(unique_class_name(&dom, "basaltnav"), "basaltnav");
        assert_eq!(unique_id_name(&dom, "basaltheader"), "basaltheader");
    }

    #[test]
    fn test_collisions_are_escaped() {
        let dom = parse_html(
            r#"<p class="basaltnav">a</p><p class="_basaltnav x">b</p><p id="basaltheader">c</p>"#,
        );
        assert_eq!(unique_class_name(&dom, "basaltnav"), "__basaltnav");
        assert_eq!(unique_id_name(&dom, "basaltheader"), "_basaltheader");
    }

    #[test]
    fn test_class_and_id_spaces_are_independent() {
        let dom = parse_html(r#"<p id="basaltnav" class="basaltheader">a</p>"#);
        assert_eq!(unique_class_name(&dom, "basaltnav"), "basaltnav");
        assert_eq!(unique_id_name(&dom, "basaltheader"), "basaltheader");
    }

    #[test]
    fn test_allocate_avoids_document_names() {
        let dom = parse_html(
            r#"<body class="basaltmainbody"><div id="basaltfooter" class="basaltignorestyles"></div></body>"#,
        );
        let ns = NamespaceSet::allocate(&dom);
        assert_eq!(ns.body_wrapper_class, "_basaltmainbody");
        assert_eq!(ns.footer_id, "_basaltfooter");
        assert_eq!(ns.ignore_styles_class, "_basaltignorestyles");
        assert_eq!(ns.header_id, "basaltheader");
    }

    proptest! {
        #[test]
        fn allocated_names_never_collide(
            classes in proptest::collection::vec("_{0,3}basalt(nav|mainhtml|mainbody|ignorestyles)", 0..8),
            ids in proptest::collection::vec("_{0,3}basalt(header|footer|section|closebook)", 0..8),
        ) {
            let mut html = String::from("<body>");
            for (i, class) in classes.iter().enumerate() {
                let id = ids.get(i).map(String::as_str).unwrap_or("");
                html.push_str(&format!(r#"<div class="{class}" id="{id}"></div>"#));
            }
            for id in ids.iter().skip(classes.len()) {
                html.push_str(&format!(r#"<span id="{id}"></span>"#));
            }
            html.push_str("</body>");
            let dom = parse_html(&html);
            let ns = NamespaceSet::allocate(&dom);

            for class in ns.classes() {
                prop_assert_eq!(dom.count_elements_with_class(class), 0);
                prop_assert!(class.trim_start_matches(ESCAPE_CHAR).starts_with("basalt"));
            }
            for id in ns.ids() {
                prop_assert!(dom.get_by_id(id).is_none());
            }
        }
    }
}
