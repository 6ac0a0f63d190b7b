//! Style preferences persisted to disk and applied by the session.

mod common;

use basalt::blobs::MemoryBlobStore;
use basalt::prefs::{JsonPreferenceStore, PreferenceStore, StyleRecord, StyleScope, StyleSetting};
use basalt::session::{MemorySurface, Page, Session, SessionConfig};
use basalt::HostMessage;
use tempfile::TempDir;

const BOOK_ID: &str = "urn:uuid:3f1c2a00-basalt";

fn session_at(dir: &TempDir) -> Session<MemorySurface, MemoryBlobStore, JsonPreferenceStore> {
    let prefs = JsonPreferenceStore::open(dir.path().join("prefs.json")).unwrap();
    Session::new(
        SessionConfig::default(),
        MemorySurface::new(),
        MemoryBlobStore::new(),
        prefs,
    )
}

fn visible_css<P: PreferenceStore>(session: &Session<MemorySurface, MemoryBlobStore, P>) -> String {
    let job = session.visible_job().unwrap();
    session
        .tracker()
        .urls(job)
        .iter()
        .filter_map(|url| session.store().get(url))
        .filter(|(mime, _)| *mime == "text/css")
        .map(|(_, bytes)| String::from_utf8_lossy(bytes).into_owned())
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn test_style_update_message_persists_and_rerenders() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_at(&dir);
    let origin = session.config().origin.clone();
    session.open_book_bytes(common::sample_epub()).unwrap();
    assert!(!visible_css(&session).contains("basalt-override"));

    let message: HostMessage = serde_json::from_str(&format!(
        r#"{{"messageType": "BasaltUpdateStyle",
            "scope": {{"kind": "book", "id": "{BOOK_ID}"}},
            "style": {{"font": {{"value": "Literata", "override": true}},
                       "customCssNoOverride": {{"value": "body {{ line-height: 1.8 }}"}}}}}}"#
    ))
    .unwrap();
    session.handle_message(message, &origin).unwrap();

    assert_eq!(session.page(), Some(Page::Section(0)));
    let css = visible_css(&session);
    assert!(css.contains("@layer basalt-override"));
    assert!(css.contains("Literata !important"));
    // custom CSS is re-aimed into the theme layer
    assert!(css.contains(".basaltmainbody { line-height: 1.8 }"));

    let reopened = JsonPreferenceStore::open(dir.path().join("prefs.json")).unwrap();
    let saved = reopened
        .load(&StyleScope::Book(BOOK_ID.to_string()))
        .unwrap()
        .unwrap();
    assert_eq!(saved.font.value(), Some("Literata"));
}

#[test]
fn test_book_defers_to_global() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_at(&dir);
    session
        .update_style(
            &StyleScope::Global,
            &StyleRecord {
                font: StyleSetting::new("Georgia").overriding(),
                ..StyleRecord::default()
            },
        )
        .unwrap();
    session
        .update_style(
            &StyleScope::Book(BOOK_ID.to_string()),
            &StyleRecord {
                font: StyleSetting::new("Comic Sans MS").using_global(),
                ..StyleRecord::default()
            },
        )
        .unwrap();

    session.open_book_bytes(common::sample_epub()).unwrap();
    let css = visible_css(&session);
    assert!(css.contains("Georgia !important"));
    assert!(!css.contains("Comic Sans"));
}

#[test]
fn test_library_uses_its_own_scope() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_at(&dir);
    session
        .update_style(
            &StyleScope::Library,
            &StyleRecord {
                font: StyleSetting::new("Inter").overriding(),
                ..StyleRecord::default()
            },
        )
        .unwrap();
    session.show_library().unwrap();

    assert_eq!(session.page(), Some(Page::Library));
    let css = visible_css(&session);
    assert!(css.contains("body, body * { font-family: Inter !important; }"));
    let html = &session.surface().shown.as_ref().unwrap().html;
    assert!(html.contains("<h1>Library</h1>"));
}
