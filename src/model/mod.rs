//! Core data model types: attachment records and recipient contexts.

pub mod attachment;
pub mod context;
