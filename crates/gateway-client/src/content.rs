use serde::{Deserialize, Serialize};

/// Message content that is either a plain string or an ordered list of parts.
///
/// Resolved once when decoded; callers never see the raw wire shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text content (a JSON string on the wire).
    Text(String),
    /// Multi-part content (a JSON array on the wire).
    Parts(Vec<ContentPart>),
}

/// One typed part of multi-part content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text part.
    Text { text: String },
    /// Image referenced by URL or data URL (delta protocol style).
    ImageUrl { image_url: ImageUrl },
    /// Inline image source (block protocol style).
    Image { source: ImageSource },
}

/// Image reference for `ContentPart::ImageUrl`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Inline image payload for `ContentPart::Image`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageSource {
    #[serde(rename = "type")]
    pub source_type: String,
    pub media_type: String,
    pub data: String,
}

impl MessageContent {
    /// Concatenates all text in order and ignores non-text parts.
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => {
                let mut out = String::new();
                for part in parts {
                    if let ContentPart::Text { text } = part {
                        out.push_str(text);
                    }
                }
                out
            }
        }
    }

    /// Whether the content carries nothing at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Parts(parts) => parts.is_empty(),
        }
    }
}

impl From<&str> for MessageContent {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<ContentPart>> for MessageContent {
    fn from(value: Vec<ContentPart>) -> Self {
        Self::Parts(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_string_and_array_shapes() {
        let text: MessageContent = serde_json::from_str(r#""hello""#).expect("string");
        assert_eq!(text, MessageContent::Text("hello".into()));

        let parts: MessageContent = serde_json::from_str(
            r#"[{"type":"text","text":"a"},{"type":"image_url","image_url":{"url":"u"}},{"type":"text","text":"b"}]"#,
        )
        .expect("parts");
        assert!(matches!(parts, MessageContent::Parts(ref p) if p.len() == 3));
        assert_eq!(parts.text(), "ab");
    }

    #[test]
    fn serializes_back_to_wire_shapes() {
        let value = serde_json::to_value(MessageContent::from("hi")).expect("json");
        assert_eq!(value, serde_json::json!("hi"));

        let value = serde_json::to_value(MessageContent::from(vec![ContentPart::Image {
            source: ImageSource {
                source_type: "base64".into(),
                media_type: "image/png".into(),
                data: "AAAA".into(),
            },
        }]))
        .expect("json");
        assert_eq!(
            value,
            serde_json::json!([{"type":"image","source":{"type":"base64","media_type":"image/png","data":"AAAA"}}])
        );
    }

    #[test]
    fn empty_content() {
        assert!(MessageContent::from("").is_empty());
        assert!(MessageContent::Parts(Vec::new()).is_empty());
        assert!(!MessageContent::from("x").is_empty());
    }
}
