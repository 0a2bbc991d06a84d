//! Engine module owning the loaded model and the chat request lifecycle

mod builder;
mod engine;

pub use builder::EngineBuilder;
pub use engine::ChatEngine;

/// Externally visible lifecycle of the chat engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No model loaded yet; chat requests are refused
    NoModel,
    /// Model loaded and accepting chat requests
    Ready,
    /// Model released at shutdown; chat requests are refused
    Stopped,
}

impl LifecycleState {
    pub fn is_ready(self) -> bool {
        self == LifecycleState::Ready
    }
}
