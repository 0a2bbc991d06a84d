//! Prompt framing for the instruction-tuned model
//!
//! Conversations are folded into the Alpaca-style template the model was
//! fine-tuned on, and the decoded output is cut back down to the reply.

use crate::types::{Message, Role};

pub const INSTRUCTION_MARKER: &str = "### Instruction:";
pub const RESPONSE_MARKER: &str = "### Response:";
pub const END_OF_TEXT: &str = "<|endoftext|>";

/// Render an ordered conversation into a single prompt string.
pub fn render_prompt(messages: &[Message]) -> String {
    let mut prompt = String::new();
    for message in messages {
        match message.role {
            Role::User => {
                prompt.push_str(INSTRUCTION_MARKER);
                prompt.push('\n');
                prompt.push_str(&message.content);
                prompt.push_str("\n\n");
                prompt.push_str(RESPONSE_MARKER);
                prompt.push('\n');
            }
            Role::Assistant => {
                prompt.push_str(&message.content);
                prompt.push_str("\n\n");
            }
            Role::Other => {}
        }
    }
    prompt
}

/// Pull the model's reply out of the decoded output, prompt echo included.
pub fn extract_response(decoded: &str) -> String {
    let tail = match decoded.rfind(RESPONSE_MARKER) {
        Some(idx) => &decoded[idx + RESPONSE_MARKER.len()..],
        None => decoded,
    };
    tail.trim().replace(END_OF_TEXT, "").trim().to_string()
}
