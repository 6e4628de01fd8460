//! `mbx2mbox` — convert legacy Eudora `.mbx` mailboxes to Unix mbox.
//!
//! This crate provides the core library for streaming a Eudora archive,
//! reconstructing each message's headers and MIME structure, resolving
//! detached attachments from disk, and writing standard mbox output.

pub mod attachment;
pub mod config;
pub mod convert;
pub mod error;
pub mod export;
pub mod model;
pub mod parser;
pub mod report;
