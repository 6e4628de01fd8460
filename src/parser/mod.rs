//! Legacy-archive parsing: the streaming `.mbx` reader, timestamp
//! reordering, TOC dump index, reply pre-scan, and HTML image scanning.

pub mod date;
pub mod html;
pub mod mbx;
pub mod replies;
pub mod toc;
