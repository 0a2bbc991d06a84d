//! HTTP surface of the chat service

mod handlers;
mod server;

pub use server::{create_router, serve};
