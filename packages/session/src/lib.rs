//! # Screenplay Session
//!
//! Async wrapper around one open [`screenplay_editor::ScriptDocument`]: the
//! initial fetch with bounded retry, load-more and save with in-flight
//! guards, cancellation on close, an autosave reminder, and event
//! subscribers.
//!
//! ```rust,ignore
//! use screenplay_session::{InMemoryBackend, ScriptSession, SessionConfig};
//!
//! let backend = Arc::new(InMemoryBackend::new());
//! let session = ScriptSession::open("script-42", backend, SessionConfig::default()).await?;
//! let mut events = session.subscribe().await;
//!
//! session.apply(&mutation).await?;
//! session.save().await?;
//! ```

mod backend;
mod config;
mod errors;
mod memory;
mod reminder;
mod session;

pub use backend::ScriptBackend;
pub use config::{RetryPolicy, SessionConfig};
pub use errors::{BackendError, SessionError};
pub use memory::{InMemoryBackend, SaveGate};
pub use reminder::AutosaveReminder;
pub use session::{LoadOutcome, SaveOutcome, ScriptSession, SessionEvent};
