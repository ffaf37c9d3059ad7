//! The MedBridge conversation engine.
//!
//! [`ConversationService`] runs the per-session state machine:
//!
//! 1. **initialize**: seed the transcript with the language's system
//!    instruction and a greeting
//! 2. **exchange**: append a user message, complete the transcript through
//!    the LLM gateway, append the reply (or roll back on failure)
//! 3. **finalize**: ask for a handoff or referral decision and validate it
//!
//! [`prompts`] holds the fixed texts for both languages.

pub mod prompts;
pub mod service;

pub use service::{ConversationService, ImageInput, Reply, Satisfaction};
