//! Channel abstraction for message I/O.

pub mod channel;
pub mod dispatcher;
pub mod whatsapp;

pub use channel::*;
pub use dispatcher::{ChunkedDispatcher, DispatchReport, split_chunks};
pub use whatsapp::WhatsAppChannel;
