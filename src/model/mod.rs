//! Core data model: the legacy header record and the destination message.

pub mod headers;
pub mod message;
