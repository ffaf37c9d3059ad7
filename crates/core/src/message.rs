//! Message and Conversation domain types.
//!
//! A [`Conversation`] is the per-session state: who the patient is, which
//! language they speak, and the ordered transcript that is sent in full to
//! the LLM on every call.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Conversation language. Selects the system prompt, greeting, disclaimer
/// and user-facing error messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Ru,
    Kk,
}

impl Language {
    /// Parse a language tag, returning `None` for anything unrecognized.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "ru" => Some(Language::Ru),
            "kk" => Some(Language::Kk),
            _ => None,
        }
    }

    /// Resolve an optional caller-supplied tag, falling back to `default`
    /// when it is absent or unrecognized.
    pub fn resolve(tag: Option<&str>, default: Language) -> Self {
        tag.and_then(Self::parse).unwrap_or(default)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Ru => "ru",
            Language::Kk => "kk",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Fixed instructions for the session's language
    System,
    /// The patient
    User,
    /// The model
    Assistant,
}

/// An inline image: base64-encoded bytes plus their MIME type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePart {
    pub mime_type: String,
    /// Standard base64 encoding of the image bytes.
    pub data: String,
}

impl ImagePart {
    /// Encode raw image bytes.
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: BASE64.encode(bytes),
        }
    }

    /// Render as a `data:` URI.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// One typed part of a multi-part message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Image(ImagePart),
    /// Legacy image-by-reference. Never dereferenced.
    ImageUrl { url: String },
}

/// Message content: plain text or an ordered list of parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Content {
    /// Concatenated text of all text parts (images are skipped).
    pub fn text(&self) -> String {
        match self {
            Content::Text(text) => text.clone(),
            Content::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Content::Text(s)
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Content::Text(s.to_string())
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    pub content: Content,

    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, content: Content) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            timestamp: Utc::now(),
        }
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, Content::Text(content.into()))
    }

    /// Create a new user message.
    pub fn user(content: impl Into<Content>) -> Self {
        Self::new(Role::User, content.into())
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, Content::Text(content.into()))
    }
}

/// Per-session conversation state.
///
/// The transcript always starts with exactly one `system` message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Patient display name
    pub fio: String,

    pub language: Language,

    /// Ordered transcript
    pub messages: Vec<Message>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Set when a finalize call produced a decision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finalized_at: Option<DateTime<Utc>>,
}

impl Conversation {
    /// Create a conversation seeded with its system instruction.
    pub fn new(fio: impl Into<String>, language: Language, system_prompt: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            fio: fio.into(),
            language,
            messages: vec![Message::system(system_prompt)],
            created_at: now,
            updated_at: now,
            finalized_at: None,
        }
    }

    /// Append a message to the transcript.
    pub fn push(&mut self, message: Message) {
        self.updated_at = Utc::now();
        self.messages.push(message);
    }

    /// Remove the message with the given id, if present.
    ///
    /// Used to roll back a user message whose completion failed.
    pub fn remove(&mut self, message_id: &str) -> Option<Message> {
        let idx = self.messages.iter().position(|m| m.id == message_id)?;
        self.updated_at = Utc::now();
        Some(self.messages.remove(idx))
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_resolution_falls_back_to_default() {
        assert_eq!(Language::resolve(Some("kk"), Language::Ru), Language::Kk);
        assert_eq!(Language::resolve(Some(" RU "), Language::Kk), Language::Ru);
        assert_eq!(Language::resolve(Some("en"), Language::Kk), Language::Kk);
        assert_eq!(Language::resolve(None, Language::Ru), Language::Ru);
    }

    #[test]
    fn new_conversation_starts_with_system_message() {
        let conv = Conversation::new("Иванов И.И.", Language::Ru, "instructions");
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.messages[0].role, Role::System);
        assert_eq!(conv.messages[0].content, Content::Text("instructions".into()));
        assert!(!conv.is_finalized());
    }

    #[test]
    fn remove_rolls_back_only_the_named_message() {
        let mut conv = Conversation::new("A", Language::Ru, "sys");
        let first = Message::user("one");
        let second = Message::user("two");
        let second_id = second.id.clone();
        conv.push(first);
        conv.push(second);

        assert!(conv.remove(&second_id).is_some());
        assert_eq!(conv.len(), 2);
        assert_eq!(conv.messages[1].content.text(), "one");
        assert!(conv.remove("missing").is_none());
    }

    #[test]
    fn image_part_renders_data_uri() {
        let part = ImagePart::from_bytes("image/png", &[0x89, b'P', b'N', b'G']);
        assert_eq!(part.data, "iVBORw==");
        assert_eq!(part.data_uri(), "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn parts_content_text_skips_images() {
        let content = Content::Parts(vec![
            ContentPart::Text { text: "rash on arm".into() },
            ContentPart::Image(ImagePart::from_bytes("image/jpeg", b"xyz")),
            ContentPart::ImageUrl { url: "https://example.com/a.jpg".into() },
        ]);
        assert_eq!(content.text(), "rash on arm");
    }

    #[test]
    fn content_part_serialization_is_tagged() {
        let part = ContentPart::ImageUrl { url: "https://x".into() };
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["type"], "image_url");
        assert_eq!(json["url"], "https://x");
    }
}
