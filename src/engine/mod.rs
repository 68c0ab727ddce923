//! Engine context
//!
//! [`SpamEngine`] is constructed once, shared by reference across requests and
//! consumed by [`SpamEngine::shutdown`].

mod spam_engine;

pub use spam_engine::{EngineStats, PreparedMessage, SpamEngine};
