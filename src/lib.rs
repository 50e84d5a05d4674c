//! `lurefill` — per-recipient personalization of phishing-simulation attachments.
//!
//! This crate provides the core library for classifying attachments by
//! extension, rendering `{{.Field}}` placeholders in text files and in the XML
//! parts of office documents, and remembering which attachments carry no
//! placeholders at all.

pub mod config;
pub mod error;
pub mod export;
pub mod format;
pub mod model;
pub mod render;
pub mod template;

pub use error::{LureError, Result};
pub use format::{FormatTable, Handling};
pub use model::attachment::Attachment;
pub use model::context::{BaseRecipient, TemplateContext};
pub use template::{PlaceholderEngine, TemplateError, TemplateExecutor};
