//! Reader chrome: navigation header/footer and the reader's own stylesheets.
//!
//! The body of a refactored section ends up as
//!
//! ```text
//! <body>
//!   <header id=basaltheader>  close, style editor, nav  </header>
//!   <main> ...book content... </main>
//!   <footer id=basaltfooter>  nav, return to top  </footer>
//! </body>
//! ```
//!
//! Every chrome element carries the ignore-styles class, which the chrome
//! layer reverts to user-agent styles so book CSS cannot restyle it.
//!
//! The reader's own CSS lives in three cascade layers, declared once as
//! `@layer basalt-chrome, basalt-override, basalt-theme`. Book styles are
//! unlayered, so they beat the theme layer; important declarations in the
//! override and chrome layers beat the book.

use crate::book::{TocIndex, TocPosition, TocTarget};
use crate::css::{ReaimMode, reaim_selectors};
use crate::dom::{ArenaDom, ArenaNodeId};
use crate::error::{Error, Result};
use crate::names::NamespaceSet;
use crate::prefs::StyleRecord;
use crate::resources::ResourceMinter;
use crate::writing_mode::WritingMode;

pub const CLOSE_BOOK_LABEL: &str = "Close book";
pub const STYLE_EDITOR_LABEL: &str = "Style editor";
pub const RETURN_TO_TOP_LABEL: &str = "Return to top";
pub const PREVIOUS_LABEL: &str = "Previous";
pub const NEXT_LABEL: &str = "Next";

/// Attribute on the root element naming the section's writing mode.
pub const WRITING_MODE_ATTR: &str = "data-basalt-writing-mode";

const LAYER_ORDER: &str = "@layer basalt-chrome, basalt-override, basalt-theme;";

/// Reader colors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    pub background: String,
    pub foreground: String,
    pub link: String,
    pub chrome_background: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: "darkslateblue".to_string(),
            foreground: "gold".to_string(),
            link: "orangered".to_string(),
            chrome_background: "slateblue".to_string(),
        }
    }
}

/// Everything user-controlled about how a page looks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Appearance {
    pub theme: Theme,
    /// Effective style preferences, `useGlobal` already resolved.
    pub style: StyleRecord,
}

/// The TOC `<select>` every section's navigation bars are built from.
#[derive(Debug, Clone)]
pub struct NavigationTemplate {
    options: Vec<NavOption>,
}

#[derive(Debug, Clone)]
struct NavOption {
    target: TocTarget,
    value: String,
    label: String,
}

/// One instantiated navigation bar.
struct NavBar {
    nav: ArenaNodeId,
    options: Vec<ArenaNodeId>,
}

impl NavigationTemplate {
    pub fn from_toc(toc: &TocIndex) -> Result<Self> {
        let options = toc
            .items()
            .iter()
            .map(|item| {
                Ok(NavOption {
                    target: item.target.clone(),
                    value: item.target.option_value()?,
                    label: item.label.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { options })
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// `<nav>` with Previous, the TOC select, and Next.
    fn instantiate(&self, dom: &mut ArenaDom, ns: &NamespaceSet) -> NavBar {
        let ignore = ns.ignore_styles_class.as_str();

        let nav = dom.create_html_element("nav");
        dom.add_class(nav, &ns.nav_class);
        dom.add_class(nav, ignore);

        let previous = button(dom, ignore, PREVIOUS_LABEL);
        dom.append(nav, previous);

        let select = dom.create_html_element("select");
        dom.add_class(select, ignore);
        let mut options = Vec::with_capacity(self.options.len());
        for option in &self.options {
            let node = dom.create_html_element("option");
            dom.add_class(node, ignore);
            dom.set_attr(node, "value", &option.value);
            dom.append_text(node, &option.label);
            dom.append(select, node);
            options.push(node);
        }
        dom.append(nav, select);

        let next = button(dom, ignore, NEXT_LABEL);
        dom.append(nav, next);

        NavBar { nav, options }
    }

    /// Index of the first (or last) option pointing at `target`.
    fn find(&self, target: &TocTarget, last: bool) -> Option<usize> {
        if last {
            self.options.iter().rposition(|o| o.target == *target)
        } else {
            self.options.iter().position(|o| o.target == *target)
        }
    }
}

fn button(dom: &mut ArenaDom, ignore_class: &str, label: &str) -> ArenaNodeId {
    let input = dom.create_html_element("input");
    dom.set_attr(input, "type", "button");
    dom.set_attr(input, "value", label);
    dom.add_class(input, ignore_class);
    input
}

/// Chrome nodes added to a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chrome {
    pub header: ArenaNodeId,
    pub footer: ArenaNodeId,
}

/// Add the header and footer navigation bars plus the reader stylesheets to
/// a refactored section.
///
/// `position` says which TOC entry each bar shows as selected; `None`, or a
/// position no option matches, is [`Error::MalformedBook`]. Stylesheet blobs
/// are minted through `minter` and owned by the current render.
pub fn inject_navigation(
    dom: &mut ArenaDom,
    ns: &NamespaceSet,
    template: &NavigationTemplate,
    position: Option<&TocPosition>,
    writing_mode: WritingMode,
    appearance: &Appearance,
    minter: &mut ResourceMinter<'_>,
) -> Result<Chrome> {
    let position = position
        .ok_or_else(|| Error::MalformedBook("section has no TOC position".to_string()))?;
    let header_option = template.find(&position.header, false).ok_or_else(|| {
        Error::MalformedBook(format!("no TOC entry for header {:?}", position.header))
    })?;
    let footer_option = template.find(&position.footer, true).ok_or_else(|| {
        Error::MalformedBook(format!("no TOC entry for footer {:?}", position.footer))
    })?;

    let body = dom
        .body()
        .ok_or_else(|| Error::Internal("document has no body".to_string()))?;
    let ignore = ns.ignore_styles_class.as_str();

    let header = dom.create_html_element("header");
    dom.set_attr(header, "id", &ns.header_id);
    dom.add_class(header, ignore);
    let close = button(dom, ignore, CLOSE_BOOK_LABEL);
    dom.set_attr(close, "id", &ns.close_button_id);
    dom.append(header, close);
    let toggle = button(dom, ignore, STYLE_EDITOR_LABEL);
    dom.set_attr(toggle, "id", &ns.style_editor_toggle_id);
    dom.append(header, toggle);
    let header_nav = template.instantiate(dom, ns);
    dom.set_attr(header_nav.options[header_option], "selected", "selected");
    dom.append(header, header_nav.nav);

    let footer = dom.create_html_element("footer");
    dom.set_attr(footer, "id", &ns.footer_id);
    dom.add_class(footer, ignore);
    let footer_nav = template.instantiate(dom, ns);
    dom.set_attr(footer_nav.options[footer_option], "selected", "selected");
    dom.append(footer, footer_nav.nav);
    let to_top = button(dom, ignore, RETURN_TO_TOP_LABEL);
    dom.set_attr(to_top, "id", &ns.return_to_top_id);
    dom.append(footer, to_top);

    dom.prepend(body, header);
    dom.append(body, footer);

    let content = format!(".{}", ns.html_wrapper_class);
    let custom_css = appearance
        .style
        .custom_css_no_override
        .value()
        .map(|css| {
            reaim_selectors(
                css,
                &ns.html_wrapper_class,
                &ns.body_wrapper_class,
                ReaimMode::AllOccurrences,
            )
        })
        .transpose()?;

    let head = head(dom)?;
    let theme = theme_sheet(appearance, &content, custom_css.as_deref());
    prepend_stylesheet(dom, head, minter, theme)?;
    if let Some(sheet) = override_sheet(appearance, &content) {
        append_stylesheet(dom, head, minter, sheet)?;
    }
    append_stylesheet(dom, head, minter, chrome_sheet(ns, &appearance.theme, writing_mode))?;

    if let Some(root) = dom.document_element() {
        dom.set_attr(root, WRITING_MODE_ATTR, writing_mode.as_css());
    }

    Ok(Chrome { header, footer })
}

/// Add the theme and override layers to a host page (library, style
/// editor). Book styles do not apply there, so no chrome layer is needed.
pub fn inject_host_styles(
    dom: &mut ArenaDom,
    appearance: &Appearance,
    minter: &mut ResourceMinter<'_>,
) -> Result<()> {
    let head = head(dom)?;
    let theme = theme_sheet(appearance, "body", appearance.style.custom_css_no_override.value());
    prepend_stylesheet(dom, head, minter, theme)?;
    if let Some(sheet) = override_sheet(appearance, "body") {
        append_stylesheet(dom, head, minter, sheet)?;
    }
    Ok(())
}

fn head(dom: &ArenaDom) -> Result<ArenaNodeId> {
    dom.head()
        .ok_or_else(|| Error::Internal("document has no head".to_string()))
}

fn stylesheet_link(
    dom: &mut ArenaDom,
    minter: &mut ResourceMinter<'_>,
    css: String,
) -> Result<ArenaNodeId> {
    let url = minter.mint_bytes(css.into_bytes(), "text/css")?;
    let link = dom.create_html_element("link");
    dom.set_attr(link, "rel", "stylesheet");
    dom.set_attr(link, "href", &url);
    Ok(link)
}

fn prepend_stylesheet(
    dom: &mut ArenaDom,
    head: ArenaNodeId,
    minter: &mut ResourceMinter<'_>,
    css: String,
) -> Result<ArenaNodeId> {
    let link = stylesheet_link(dom, minter, css)?;
    dom.prepend(head, link);
    Ok(link)
}

fn append_stylesheet(
    dom: &mut ArenaDom,
    head: ArenaNodeId,
    minter: &mut ResourceMinter<'_>,
    css: String,
) -> Result<ArenaNodeId> {
    let link = stylesheet_link(dom, minter, css)?;
    dom.append(head, link);
    Ok(link)
}

/// Lowest-priority layer: colors, non-overriding font, user CSS.
fn theme_sheet(appearance: &Appearance, content: &str, custom_css: Option<&str>) -> String {
    let theme = &appearance.theme;
    let mut css = format!(
        "{LAYER_ORDER}\n@layer basalt-theme {{\n\
         body {{ background: {}; color: {}; margin: 0; padding: 0; }}\n\
         a {{ color: {}; }}\n",
        theme.background, theme.foreground, theme.link
    );
    let font = &appearance.style.font;
    if let Some(family) = font.value()
        && !font.is_override()
    {
        css.push_str(&format!("{content} {{ font-family: {family}; }}\n"));
    }
    if let Some(custom) = custom_css {
        css.push_str(custom);
        css.push('\n');
    }
    css.push_str("}\n");
    css
}

/// Preferences that beat the book's own styles.
fn override_sheet(appearance: &Appearance, content: &str) -> Option<String> {
    let font = &appearance.style.font;
    let family = font.value().filter(|_| font.is_override())?;
    Some(format!(
        "@layer basalt-override {{\n\
         {content}, {content} * {{ font-family: {family} !important; }}\n\
         }}\n"
    ))
}

/// Header/footer layout, oriented for the section's writing mode.
fn chrome_sheet(ns: &NamespaceSet, theme: &Theme, writing_mode: WritingMode) -> String {
    let viewport = if writing_mode.is_vertical() { "100vw" } else { "100vh" };
    format!(
        "@layer basalt-chrome {{\n\
         .{ignore} {{ all: revert !important; }}\n\
         body {{ display: flex !important; flex-direction: column !important; \
         writing-mode: {mode} !important; min-block-size: {viewport} !important; }}\n\
         #{header}, #{footer} {{ background: {chrome} !important; padding: 10px !important; }}\n\
         #{footer} {{ margin-block-start: auto !important; }}\n\
         #{close}, #{toggle} {{ float: inline-start !important; }}\n\
         .{nav} {{ text-align: center !important; }}\n\
         }}\n",
        ignore = ns.ignore_styles_class,
        mode = writing_mode.as_css(),
        header = ns.header_id,
        footer = ns.footer_id,
        chrome = theme.chrome_background,
        close = ns.close_button_id,
        toggle = ns.style_editor_toggle_id,
        nav = ns.nav_class,
    )
}
