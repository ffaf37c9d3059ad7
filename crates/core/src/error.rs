//! Error types for the MedBridge domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] is what the
//! conversation layer hands to its callers.

use thiserror::Error;

use crate::message::Language;

/// The top-level error type for all conversation operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Caller errors ---
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session already finalized: {0}")]
    SessionFinalized(String),

    // --- Upstream errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    // --- Storage ---
    #[error("Session store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error means the LLM service could not be reached or kept
    /// failing after the retry budget was spent.
    pub fn is_upstream_unavailable(&self) -> bool {
        match self {
            Error::Provider(e) => e.kind().is_retryable(),
            _ => false,
        }
    }

    /// The fixed, language-selected message shown to the end user.
    ///
    /// The `Display` output is the operator diagnostic and is never shown to
    /// end users.
    pub fn user_message(&self, lang: Language) -> &'static str {
        match (self, lang) {
            (Error::InvalidInput(_), Language::Ru) => "Некорректный запрос. Проверьте введённые данные.",
            (Error::InvalidInput(_), Language::Kk) => "Сұрау қате. Енгізілген деректерді тексеріңіз.",
            (Error::SessionNotFound(_), Language::Ru) => {
                "Сессия не найдена. Пожалуйста, начните диалог заново."
            }
            (Error::SessionNotFound(_), Language::Kk) => {
                "Сессия табылмады. Диалогты қайта бастаңыз."
            }
            (Error::SessionFinalized(_), Language::Ru) => {
                "Диалог уже завершён. Пожалуйста, начните новый диалог."
            }
            (Error::SessionFinalized(_), Language::Kk) => {
                "Диалог аяқталды. Жаңа диалогты бастаңыз."
            }
            (Error::Provider(e), lang) => e.user_message(lang),
            (Error::Extraction(_), Language::Ru) => {
                "Ошибка финализации. Пожалуйста, попробуйте снова."
            }
            (Error::Extraction(_), Language::Kk) => "Аяқтау қатесі. Қайталап көріңіз.",
            (Error::Store(_), Language::Ru) => "Внутренняя ошибка сервиса.",
            (Error::Store(_), Language::Kk) => "Қызметтің ішкі қатесі.",
        }
    }
}

// --- Bounded context errors ---

/// A failure of one completion attempt, classified by the transport itself.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Provider server error (status: {status_code}): {message}")]
    Server { status_code: u16, message: String },

    #[error("Provider rejected the request (status: {status_code}): {message}")]
    Client { status_code: u16, message: String },

    #[error("Response blocked by safety filters (reason: {reason})")]
    SafetyBlocked { reason: String },

    #[error("No content in provider response")]
    EmptyResponse,

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// The closed set of provider failure kinds the retry loop decides on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorKind {
    Timeout,
    Transport,
    Server,
    Client,
    SafetyBlocked,
    EmptyResponse,
    NotConfigured,
}

impl ProviderErrorKind {
    pub fn is_retryable(self) -> bool {
        is_retryable(self)
    }
}

/// Whether a failed attempt of this kind may be followed by another one.
pub fn is_retryable(kind: ProviderErrorKind) -> bool {
    matches!(
        kind,
        ProviderErrorKind::Timeout
            | ProviderErrorKind::Transport
            | ProviderErrorKind::Server
            | ProviderErrorKind::EmptyResponse
    )
}

impl ProviderError {
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            ProviderError::Timeout { .. } => ProviderErrorKind::Timeout,
            ProviderError::Transport(_) => ProviderErrorKind::Transport,
            ProviderError::Server { .. } => ProviderErrorKind::Server,
            ProviderError::Client { .. } => ProviderErrorKind::Client,
            ProviderError::SafetyBlocked { .. } => ProviderErrorKind::SafetyBlocked,
            ProviderError::EmptyResponse => ProviderErrorKind::EmptyResponse,
            ProviderError::NotConfigured(_) => ProviderErrorKind::NotConfigured,
        }
    }

    fn user_message(&self, lang: Language) -> &'static str {
        match (self.kind(), lang) {
            (ProviderErrorKind::SafetyBlocked, Language::Ru) => {
                "Запрос отклонён фильтрами безопасности. Пожалуйста, переформулируйте вопрос."
            }
            (ProviderErrorKind::SafetyBlocked, Language::Kk) => {
                "Сұрау қауіпсіздік сүзгілерімен қабылданбады. Сұрақты басқаша қойып көріңіз."
            }
            (kind, Language::Ru) if kind.is_retryable() => {
                "Сервис временно недоступен. Пожалуйста, попробуйте позже."
            }
            (kind, Language::Kk) if kind.is_retryable() => {
                "Қызмет уақытша қолжетімсіз. Кейінірек қайталап көріңіз."
            }
            (_, Language::Ru) => "Не удалось получить ответ. Пожалуйста, попробуйте позже.",
            (_, Language::Kk) => "Жауап алу мүмкін болмады. Кейінірек қайталап көріңіз.",
        }
    }
}

/// Maximum number of characters of raw model text carried in an
/// [`ExtractionError`].
pub const EXCERPT_CHARS: usize = 200;

/// Failure to turn raw model text into a structured decision.
#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    #[error("Malformed JSON: {reason}. Raw response: {excerpt}")]
    MalformedJson { reason: String, excerpt: String },

    #[error("Schema violation: {reason}. Raw response: {excerpt}")]
    SchemaViolation { reason: String, excerpt: String },
}

impl ExtractionError {
    /// The bounded prefix of the raw model text that failed.
    pub fn excerpt(&self) -> &str {
        match self {
            ExtractionError::MalformedJson { excerpt, .. }
            | ExtractionError::SchemaViolation { excerpt, .. } => excerpt,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::Server {
            status_code: 503,
            message: "overloaded".into(),
        });
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("overloaded"));
    }

    #[test]
    fn retry_classification() {
        assert!(is_retryable(ProviderErrorKind::Timeout));
        assert!(is_retryable(ProviderErrorKind::Transport));
        assert!(is_retryable(ProviderErrorKind::Server));
        assert!(is_retryable(ProviderErrorKind::EmptyResponse));
        assert!(!is_retryable(ProviderErrorKind::Client));
        assert!(!is_retryable(ProviderErrorKind::SafetyBlocked));
        assert!(!is_retryable(ProviderErrorKind::NotConfigured));
    }

    #[test]
    fn upstream_unavailable_groups_retryable_kinds() {
        assert!(Error::Provider(ProviderError::Timeout { timeout_ms: 10 }).is_upstream_unavailable());
        assert!(!Error::Provider(ProviderError::Client {
            status_code: 404,
            message: String::new(),
        })
        .is_upstream_unavailable());
        assert!(!Error::InvalidInput("x".into()).is_upstream_unavailable());
    }

    #[test]
    fn user_message_is_localized_and_hides_detail() {
        let err = Error::Provider(ProviderError::Transport("connection reset by peer".into()));
        let ru = err.user_message(Language::Ru);
        let kk = err.user_message(Language::Kk);
        assert_ne!(ru, kk);
        assert!(!ru.contains("connection reset"));

        let blocked = Error::Provider(ProviderError::SafetyBlocked {
            reason: "SAFETY".into(),
        });
        assert!(blocked.user_message(Language::Ru).contains("безопасности"));
    }

    #[test]
    fn extraction_error_exposes_excerpt() {
        let err = ExtractionError::SchemaViolation {
            reason: "bad".into(),
            excerpt: "{\"intent\":1}".into(),
        };
        assert_eq!(err.excerpt(), "{\"intent\":1}");
    }
}
