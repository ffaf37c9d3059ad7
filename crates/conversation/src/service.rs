//! The conversation state machine.
//!
//! Per session key: no stored conversation (uninitialized), then an active
//! conversation created by [`ConversationService::initialize`], optionally
//! marked finalized by [`ConversationService::finalize`]. Every operation
//! loads the conversation from the store, mutates a copy and writes it back.
//!
//! Operations on the same key must be issued one at a time by the caller.
//! Concurrent calls on one key may interleave their reads and writes.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use medbridge_config::AppConfig;
use medbridge_core::decision::{DecisionKind, StructuredDecision};
use medbridge_core::error::{Error, Result};
use medbridge_core::extract::extract;
use medbridge_core::message::{Content, ContentPart, Conversation, ImagePart, Language, Message};
use medbridge_core::session::SessionStore;
use medbridge_providers::LlmGateway;
use tracing::{info, warn};

use crate::prompts;

/// Image attached to a user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageInput {
    /// Raw image bytes with their MIME type, sent inline.
    Inline { bytes: Vec<u8>, mime_type: String },
    /// Legacy reference. Passed to the model as text, never fetched.
    Url(String),
}

impl ImageInput {
    fn is_empty(&self) -> bool {
        match self {
            ImageInput::Inline { bytes, .. } => bytes.is_empty(),
            ImageInput::Url(url) => url.trim().is_empty(),
        }
    }

    fn into_part(self) -> Result<ContentPart> {
        match self {
            ImageInput::Inline { bytes, mime_type } => {
                let mime_type = mime_type.trim().to_ascii_lowercase();
                if !mime_type.starts_with("image/") {
                    return Err(Error::InvalidInput(format!(
                        "unsupported image MIME type `{mime_type}`"
                    )));
                }
                Ok(ContentPart::Image(ImagePart::from_bytes(mime_type, &bytes)))
            }
            ImageInput::Url(url) => Ok(ContentPart::ImageUrl {
                url: url.trim().to_string(),
            }),
        }
    }
}

/// The patient's answer to "were you helped?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Satisfaction {
    Yes,
    No,
}

impl Satisfaction {
    /// The decision shape this answer asks the model for.
    pub fn expected_kind(self) -> DecisionKind {
        match self {
            Satisfaction::Yes => DecisionKind::Referral,
            Satisfaction::No => DecisionKind::Handoff,
        }
    }
}

impl FromStr for Satisfaction {
    type Err = Error;

    /// Only the exact strings `yes` and `no` are accepted.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "yes" => Ok(Satisfaction::Yes),
            "no" => Ok(Satisfaction::No),
            other => Err(Error::InvalidInput(format!(
                "satisfaction must be 'yes' or 'no', got '{other}'"
            ))),
        }
    }
}

/// Text returned to the caller, with the language it is written in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub language: Language,
}

/// Orchestrates sessions: store, gateway and extractor.
pub struct ConversationService {
    store: Arc<dyn SessionStore>,
    gateway: LlmGateway,
    default_language: Language,
    lock_after_finalize: bool,
}

impl ConversationService {
    pub fn new(store: Arc<dyn SessionStore>, gateway: LlmGateway) -> Self {
        Self {
            store,
            gateway,
            default_language: Language::default(),
            lock_after_finalize: false,
        }
    }

    pub fn from_config(store: Arc<dyn SessionStore>, gateway: LlmGateway, config: &AppConfig) -> Self {
        Self::new(store, gateway)
            .with_default_language(config.default_language)
            .with_lock_after_finalize(config.sessions.lock_after_finalize)
    }

    /// Language used when `initialize` gets no recognizable tag.
    pub fn with_default_language(mut self, lang: Language) -> Self {
        self.default_language = lang;
        self
    }

    /// Reject `exchange` and `finalize` on sessions that already produced
    /// a decision.
    pub fn with_lock_after_finalize(mut self, enabled: bool) -> Self {
        self.lock_after_finalize = enabled;
        self
    }

    pub fn default_language(&self) -> Language {
        self.default_language
    }

    /// Start (or restart) a session and return the greeting.
    ///
    /// Any previous conversation under `key` is discarded.
    pub async fn initialize(&self, key: &str, fio: &str, lang: Option<&str>) -> Result<Reply> {
        if key.trim().is_empty() {
            return Err(Error::InvalidInput("sessionId is required".into()));
        }
        let fio = fio.trim();
        if fio.is_empty() {
            return Err(Error::InvalidInput("fio is required for init".into()));
        }

        let language = Language::resolve(lang, self.default_language);
        let greeting = prompts::greeting(language, fio);

        let mut conversation = Conversation::new(fio, language, prompts::system_prompt(language));
        conversation.push(Message::assistant(greeting.clone()));
        self.store.set(key, conversation).await?;

        info!(session = %key, lang = %language, "Session initialized");
        Ok(Reply {
            text: greeting,
            language,
        })
    }

    /// Send one user message and return the model's reply.
    ///
    /// If the completion fails the user message is removed again, so the
    /// stored transcript is left as it was before the call.
    pub async fn exchange(&self, key: &str, text: Option<&str>, image: Option<ImageInput>) -> Result<Reply> {
        let mut conversation = self.load(key).await?;
        if self.lock_after_finalize && conversation.is_finalized() {
            return Err(Error::SessionFinalized(key.to_string()));
        }

        let text = text.map(str::trim).filter(|t| !t.is_empty());
        let image = image.filter(|i| !i.is_empty());
        let content = match (text, image) {
            (None, None) => {
                return Err(Error::InvalidInput("message or image is required".into()));
            }
            (Some(text), None) => Content::Text(text.to_string()),
            (text, Some(image)) => {
                let mut parts = Vec::with_capacity(2);
                if let Some(text) = text {
                    parts.push(ContentPart::Text {
                        text: text.to_string(),
                    });
                }
                parts.push(image.into_part()?);
                Content::Parts(parts)
            }
        };

        let user_message = Message::user(content);
        let user_message_id = user_message.id.clone();
        conversation.push(user_message);
        self.store.set(key, conversation.clone()).await?;

        match self.gateway.complete(&conversation.messages).await {
            Ok(reply) => {
                self.append_after(key, &user_message_id, Message::assistant(reply.clone()), false)
                    .await?;
                info!(session = %key, "Message exchanged");
                Ok(Reply {
                    text: reply,
                    language: conversation.language,
                })
            }
            Err(e) => {
                warn!(session = %key, error = %e, "Completion failed, rolling back user message");
                self.rollback(key, &user_message_id).await?;
                Err(e.into())
            }
        }
    }

    /// Ask the model for the terminal decision of a session.
    ///
    /// `"no"` requests a handoff, `"yes"` a referral for the stored patient.
    /// A completion failure rolls the directive back. An extraction failure
    /// leaves the directive in the transcript and appends nothing else.
    pub async fn finalize(&self, key: &str, satisfaction: &str) -> Result<StructuredDecision> {
        let mut conversation = self.load(key).await?;
        let satisfaction: Satisfaction = satisfaction.parse()?;
        if self.lock_after_finalize && conversation.is_finalized() {
            return Err(Error::SessionFinalized(key.to_string()));
        }

        let directive = match satisfaction {
            Satisfaction::No => prompts::handoff_directive(),
            Satisfaction::Yes => prompts::referral_directive(&conversation.fio),
        };
        let expected = satisfaction.expected_kind();

        let directive_message = Message::user(directive);
        let directive_id = directive_message.id.clone();
        conversation.push(directive_message);
        self.store.set(key, conversation.clone()).await?;

        let raw = match self.gateway.complete(&conversation.messages).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(session = %key, error = %e, "Finalize completion failed, rolling back directive");
                self.rollback(key, &directive_id).await?;
                return Err(e.into());
            }
        };

        let decision = extract(&raw, expected).inspect_err(|e| {
            warn!(session = %key, expected = %expected, error = %e, "Finalize produced no valid decision");
        })?;

        self.append_after(key, &directive_id, Message::assistant(raw), true)
            .await?;
        info!(session = %key, intent = decision.intent(), "Session finalized");
        Ok(decision)
    }

    /// Number of stored sessions.
    pub async fn session_count(&self) -> Result<usize> {
        Ok(self.store.count().await?)
    }

    /// Language of the stored session, or the default when there is none.
    pub async fn language_of(&self, key: &str) -> Language {
        match self.store.get(key).await {
            Ok(Some(conversation)) => conversation.language,
            _ => self.default_language,
        }
    }

    async fn load(&self, key: &str) -> Result<Conversation> {
        self.store
            .get(key)
            .await?
            .ok_or_else(|| Error::SessionNotFound(key.to_string()))
    }

    /// Remove a message appended earlier in this call.
    ///
    /// Nothing happens if the session was replaced in the meantime.
    async fn rollback(&self, key: &str, message_id: &str) -> Result<()> {
        if let Some(mut conversation) = self.store.get(key).await? {
            if conversation.remove(message_id).is_some() {
                self.store.set(key, conversation).await?;
            }
        }
        Ok(())
    }

    /// Append `message` to the stored conversation if it still contains the
    /// request message `after_id`.
    async fn append_after(&self, key: &str, after_id: &str, message: Message, finalized: bool) -> Result<()> {
        let Some(mut conversation) = self.store.get(key).await? else {
            return Ok(());
        };
        if !conversation.messages.iter().any(|m| m.id == after_id) {
            warn!(session = %key, "Session replaced during completion, reply not stored");
            return Ok(());
        }
        conversation.push(message);
        if finalized {
            conversation.finalized_at = Some(Utc::now());
        }
        self.store.set(key, conversation).await?;
        Ok(())
    }
}
