//! # MedBridge Core
//!
//! Domain types, traits, and error definitions for the MedBridge
//! conversation engine. This crate has **no framework dependencies**: it
//! defines the domain model every other crate implements against.
//!
//! ## Design Philosophy
//!
//! The two seams of the system are traits defined here:
//! - [`Provider`]: one attempt against a remote completion service
//! - [`SessionStore`]: keyed conversation state
//!
//! Structured decisions are validated by hand-written checks in
//! [`decision`], and [`extract`] turns raw model text into them.

pub mod decision;
pub mod error;
pub mod extract;
pub mod message;
pub mod provider;
pub mod session;

// Re-export key types at crate root for ergonomics
pub use decision::{DecisionKind, DoctorType, Handoff, Referral, StructuredDecision};
pub use error::{Error, ExtractionError, ProviderError, ProviderErrorKind, Result, StoreError};
pub use extract::extract;
pub use message::{Content, ContentPart, Conversation, ImagePart, Language, Message, Role};
pub use provider::{CompletionRequest, Provider};
pub use session::SessionStore;
