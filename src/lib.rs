//! WhatsApp admissions-essay assistant.

pub mod channels;
pub mod config;
pub mod draft;
pub mod error;
pub mod llm;
pub mod session;
pub mod store;
pub mod webhook;
