//! Reply cross-referencing pre-scan.
//!
//! Eudora records nothing in a message when it gets answered; the only
//! evidence is a later message in the same archive carrying an
//! `In-Reply-To:` pointing at it. Some destination clients (Pine's
//! `X-Status: A` flag) want exactly that fact, so before conversion starts
//! the archive is scanned once, front to back, with its own cursor, and
//! every id targeted by a reply is collected.
//!
//! The scan only looks at header blocks, honoring the same separator and
//! folding rules as the conversion pass. It is strictly best effort: any
//! read problem degrades to an empty graph rather than failing the run.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{debug, warn};

use crate::parser::mbx::{decode_line, is_message_start, strip_line_ending};

/// Message ids that some other message replies to.
#[derive(Debug, Default)]
pub struct ReplyGraph {
    answered: HashSet<String>,
}

impl ReplyGraph {
    /// Scan `archive` for reply references. Never fails; an unreadable
    /// archive yields an empty graph (the conversion pass will surface the
    /// real error on its own cursor).
    pub fn scan(archive: &Path) -> Self {
        match File::open(archive) {
            Ok(file) => Self::from_reader(BufReader::new(file)),
            Err(e) => {
                warn!(
                    archive = %archive.display(),
                    error = %e,
                    "Reply pre-scan skipped"
                );
                Self::default()
            }
        }
    }

    /// Collect reply targets from any reader.
    pub fn from_reader(mut reader: impl BufRead) -> Self {
        let mut answered = HashSet::new();
        let mut in_headers = false;
        // An In-Reply-To value still accepting folded continuations.
        let mut pending: Option<String> = None;
        let mut messages = 0u64;
        let mut line_buf = Vec::with_capacity(4096);

        loop {
            line_buf.clear();
            let read = match reader.read_until(b'\n', &mut line_buf) {
                Ok(read) => read,
                Err(e) => {
                    warn!(error = %e, "Reply pre-scan stopped early");
                    break;
                }
            };
            if read == 0 {
                break;
            }
            let line = decode_line(strip_line_ending(&line_buf));

            if is_message_start(&line) {
                flush_pending(&mut pending, &mut answered);
                in_headers = true;
                messages += 1;
                continue;
            }
            if !in_headers {
                continue;
            }
            if line.starts_with(' ') || line.starts_with('\t') {
                if let Some(value) = pending.as_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                continue;
            }
            // Any fresh header line (or the blank line ending the block)
            // terminates a fold in progress.
            flush_pending(&mut pending, &mut answered);
            if line.trim().is_empty() {
                in_headers = false;
            } else if let Some(value) = line.strip_prefix("In-Reply-To:") {
                pending = Some(value.trim().to_string());
            }
        }
        flush_pending(&mut pending, &mut answered);

        debug!(messages, targets = answered.len(), "Reply pre-scan complete");
        Self { answered }
    }

    /// Whether the message with this `Message-ID:` value was replied to
    /// somewhere in the archive. Accepts the raw header value; ids are
    /// normalized on both sides of the lookup.
    pub fn was_answered(&self, message_id: &str) -> bool {
        self.answered.contains(&normalize_id(message_id))
    }

    pub fn len(&self) -> usize {
        self.answered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answered.is_empty()
    }
}

fn flush_pending(pending: &mut Option<String>, answered: &mut HashSet<String>) {
    if let Some(value) = pending.take() {
        let id = normalize_id(&value);
        if !id.is_empty() {
            answered.insert(id);
        }
    }
}

/// Reduce a message-id header value to its `<...>` token when one is
/// present; otherwise the trimmed value stands as-is.
fn normalize_id(value: &str) -> String {
    let trimmed = value.trim();
    if let Some(start) = trimmed.find('<') {
        if let Some(end) = trimmed[start..].find('>') {
            return trimmed[start..=start + end].to_string();
        }
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    const ARCHIVE: &str = "\
From ???@??? Thu Jan 03 11:42:42 2002
Message-ID: <first@example.com>
Subject: question

body text
From ???@??? Thu Jan 03 12:00:00 2002
Message-ID: <second@example.com>
In-Reply-To: <first@example.com>
Subject: Re: question

answer
";

    #[test]
    fn test_collects_reply_targets() {
        let graph = ReplyGraph::from_reader(Cursor::new(ARCHIVE));
        assert_eq!(graph.len(), 1);
        assert!(graph.was_answered("<first@example.com>"));
        assert!(!graph.was_answered("<second@example.com>"));
    }

    #[test]
    fn test_lookup_normalizes_surrounding_text() {
        let graph = ReplyGraph::from_reader(Cursor::new(ARCHIVE));
        assert!(graph.was_answered("  <first@example.com>  "));
    }

    #[test]
    fn test_folded_in_reply_to() {
        let archive = "\
From ???@??? Thu Jan 03 12:00:00 2002
In-Reply-To: Your message of Thursday
\t<folded@example.com>

body
";
        let graph = ReplyGraph::from_reader(Cursor::new(archive));
        assert!(graph.was_answered("<folded@example.com>"));
    }

    #[test]
    fn test_in_reply_to_in_body_is_ignored() {
        let archive = "\
From ???@??? Thu Jan 03 12:00:00 2002
Subject: quoting a header

In-Reply-To: <quoted@example.com>
";
        let graph = ReplyGraph::from_reader(Cursor::new(archive));
        assert!(graph.is_empty());
    }

    #[test]
    fn test_unreadable_archive_degrades_to_empty() {
        let graph = ReplyGraph::scan(Path::new("/nonexistent/archive.mbx"));
        assert!(graph.is_empty());
        assert!(!graph.was_answered("<anything@example.com>"));
    }
}
