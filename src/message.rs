//! Messages the host page and the displayed document send to the reader.

use serde::{Deserialize, Serialize};

use crate::prefs::{StyleRecord, StyleScope};

/// A message, tagged by `messageType` on the wire.
///
/// ```
/// use basalt::message::HostMessage;
///
/// let msg: HostMessage =
///     serde_json::from_str(r#"{"messageType": "BasaltDisplaySection", "index": 2}"#).unwrap();
/// assert_eq!(msg, HostMessage::BasaltDisplaySection { index: 2, fragment: None });
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "messageType")]
pub enum HostMessage {
    BasaltDisplaySection {
        index: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fragment: Option<String>,
    },
    BasaltNextSection,
    BasaltPrevSection,
    /// A whole EPUB container.
    #[serde(alias = "BasaltBookLoad")]
    BasaltOpenBook {
        #[serde(alias = "messageContent")]
        book: Vec<u8>,
    },
    BasaltCloseBook,
    BasaltResumeBook,
    BasaltToggleStyleEditor,
    BasaltUpdateStyle {
        scope: StyleScope,
        style: StyleRecord,
    },
}

impl HostMessage {
    /// The `messageType` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            HostMessage::BasaltDisplaySection { .. } => "BasaltDisplaySection",
            HostMessage::BasaltNextSection => "BasaltNextSection",
            HostMessage::BasaltPrevSection => "BasaltPrevSection",
            HostMessage::BasaltOpenBook { .. } => "BasaltOpenBook",
            HostMessage::BasaltCloseBook => "BasaltCloseBook",
            HostMessage::BasaltResumeBook => "BasaltResumeBook",
            HostMessage::BasaltToggleStyleEditor => "BasaltToggleStyleEditor",
            HostMessage::BasaltUpdateStyle { .. } => "BasaltUpdateStyle",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::StyleSetting;

    #[test]
    fn test_wire_format() {
        let msg = HostMessage::BasaltDisplaySection {
            index: 4,
            fragment: Some("note-3".into()),
        };
        assert_eq!(
            serde_json::to_string(&msg).unwrap(),
            r#"{"messageType":"BasaltDisplaySection","index":4,"fragment":"note-3"}"#
        );
        assert_eq!(
            serde_json::to_string(&HostMessage::BasaltNextSection).unwrap(),
            r#"{"messageType":"BasaltNextSection"}"#
        );
    }

    #[test]
    fn test_parse_style_update() {
        let msg: HostMessage = serde_json::from_str(
            r#"{"messageType": "BasaltUpdateStyle",
                "scope": {"kind": "book", "id": "urn:uuid:1"},
                "style": {"font": {"value": "serif", "override": true, "useGlobal": false}}}"#,
        )
        .unwrap();
        let HostMessage::BasaltUpdateStyle { scope, style } = msg else {
            panic!("wrong variant");
        };
        assert_eq!(scope, StyleScope::Book("urn:uuid:1".into()));
        assert_eq!(style.font, StyleSetting {
            value: Some("serif".into()),
            overrides: Some(true),
            use_global: Some(false),
        });
    }

    #[test]
    fn test_unknown_message_is_rejected() {
        assert!(serde_json::from_str::<HostMessage>(r#"{"messageType": "Nope"}"#).is_err());
    }

    #[test]
    fn test_library_upload_alias() {
        let msg: HostMessage =
            serde_json::from_str(r#"{"messageType": "BasaltBookLoad", "messageContent": [80, 75]}"#)
                .unwrap();
        assert_eq!(msg, HostMessage::BasaltOpenBook { book: vec![80, 75] });
    }

    #[test]
    fn test_kind_matches_tag() {
        let msg = HostMessage::BasaltOpenBook { book: vec![1, 2] };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["messageType"], msg.kind());
    }
}
