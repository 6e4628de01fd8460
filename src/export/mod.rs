//! Output side: the destination mbox container writer.

pub mod mbox;
