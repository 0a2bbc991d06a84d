//! Request and response types exchanged over the chat API

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::error::{Result, ServiceError};

/// Speaker of a conversation turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    /// Any role the prompt template has no slot for
    #[serde(other)]
    Other,
}

/// One turn of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Body of `POST /chat`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub max_tokens: Option<usize>,
    #[serde(default)]
    pub temperature: Option<f64>,
}

/// Generation parameters a caller is allowed to choose
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_new_tokens: usize,
    pub temperature: f64,
}

/// Successful reply to `POST /chat`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: String,
    /// Length of the whole output sequence, echoed prompt included
    pub tokens_used: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub gpu_available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub service: String,
    pub status: String,
    pub version: String,
}

/// What the generation worker hands back for one prompt
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    /// Decoded output, prompt echo included
    pub text: String,
    /// Length of the raw output token sequence
    pub tokens_used: usize,
    /// Time spent inside the model
    pub processing_time: Duration,
    /// Time spent waiting for the worker
    pub wait_time: Duration,
}

/// Handle for a job submitted to the generation queue
#[derive(Debug)]
pub struct GenerationHandle {
    job_id: usize,
    receiver: oneshot::Receiver<Result<GenerationOutput>>,
}

impl GenerationHandle {
    pub(crate) fn new(
        job_id: usize,
        receiver: oneshot::Receiver<Result<GenerationOutput>>,
    ) -> Self {
        Self { job_id, receiver }
    }

    pub fn job_id(&self) -> usize {
        self.job_id
    }

    /// Wait for the worker to finish this job
    pub async fn wait(self) -> Result<GenerationOutput> {
        self.receiver.await.map_err(|_| ServiceError::GenerationFailed {
            message: "Generation worker stopped before replying".to_string(),
        })?
    }
}
