//! Insertion-ordered header record for one legacy message.
//!
//! Headers accumulate exactly as they appear in the archive (names keep
//! their trailing colon; folded continuations are joined with a single
//! space). The envelope pseudo-header `From ` holds the separator-line
//! remnant and is always the first field. `clean` repairs the record once:
//! date synthesis, sender substitution, and the read/answered status flags.

use tracing::debug;

use crate::parser::date;
use crate::parser::replies::ReplyGraph;
use crate::parser::toc::TocIndex;

/// Name of the envelope pseudo-header holding the separator-line remnant.
pub const ENVELOPE_FIELD: &str = "From ";

/// Eudora's placeholder sender token in separator lines.
pub const SENDER_PLACEHOLDER: &str = "???@???";

/// Substitute sender when no header yields an address. Deliberately
/// greppable in converted mailboxes.
pub const UNKNOWN_SENDER: &str = "unknown@unknown.unknown";

#[derive(Debug, Default)]
pub struct HeaderBlock {
    fields: Vec<(String, String)>,
    cleaned: bool,
}

impl HeaderBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field with an already-split name and value. `name` keeps
    /// whatever trailing colon it was stored with.
    pub fn add(&mut self, name: &str, value: &str) {
        self.fields.push((name.to_string(), value.to_string()));
    }

    /// Append a raw header line, splitting at the first colon. A line
    /// without a colon cannot be named and is treated as a continuation of
    /// the previous field so nothing is lost.
    pub fn add_line(&mut self, line: &str) {
        match line.find(':') {
            Some(pos) => {
                let name = &line[..=pos];
                let value = line[pos + 1..].trim();
                self.add(name, value);
            }
            None => self.append_to_last(line),
        }
    }

    /// Join a folded continuation line onto the most recent field with a
    /// single space.
    pub fn append_to_last(&mut self, line: &str) {
        let folded = line.trim();
        if folded.is_empty() {
            return;
        }
        if let Some((_, value)) = self.fields.last_mut() {
            if !value.is_empty() {
                value.push(' ');
            }
            value.push_str(folded);
        }
    }

    /// Value of the first field named `name` (exact match, colon included).
    pub fn value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// One-shot record repair; calling it again is a no-op.
    ///
    /// - Synthesizes `Date:` from the envelope timestamp when absent.
    /// - Substitutes the placeholder sender in the envelope with the first
    ///   address found in `From:`, `Sender:` or `Return-Path:`, falling
    ///   back to [`UNKNOWN_SENDER`].
    /// - Adds `Status: RO`/`Status: O` from the TOC read flag for this
    ///   message's offset (nothing when the flag is unknown).
    /// - Adds `X-Status: A` when the reply graph says this message was
    ///   answered.
    pub fn clean(&mut self, toc: &TocIndex, msg_offset: u64, replies: &ReplyGraph) {
        if self.cleaned {
            return;
        }
        self.cleaned = true;

        let envelope = self.value(ENVELOPE_FIELD).unwrap_or("").to_string();

        if self.value("Date:").is_none() {
            if let Some(stamp) = date::envelope_date(&envelope) {
                debug!(offset = msg_offset, date = %stamp, "Synthesized Date header");
                self.add("Date:", &stamp);
            }
        }

        if !envelope.is_empty() {
            let sender = self.resolve_sender();
            let patched = envelope.replacen(SENDER_PLACEHOLDER, &sender, 1);
            self.set_value(ENVELOPE_FIELD, &patched);
        }

        match toc.read_flag(msg_offset) {
            Some(true) => self.add("Status:", "RO"),
            Some(false) => self.add("Status:", "O"),
            None => {}
        }

        if let Some(id) = self.value("Message-ID:") {
            if replies.was_answered(id) {
                self.add("X-Status:", "A");
            }
        }
    }

    /// Fields for emission, in insertion order, names without the colon.
    /// The envelope pseudo-header and the `Content-Type` family are
    /// withheld: the writer derives content type from the message framing.
    pub fn emittable(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.fields.iter().filter_map(|(name, value)| {
            if name == ENVELOPE_FIELD {
                return None;
            }
            if name.to_ascii_lowercase().starts_with("content-type") {
                return None;
            }
            Some((name.trim_end_matches(':'), value.as_str()))
        })
    }

    /// Sender fallback chain: `From:`, then `Sender:`, then `Return-Path:`.
    fn resolve_sender(&self) -> String {
        for name in ["From:", "Sender:", "Return-Path:"] {
            if let Some(addr) = self.value(name).and_then(extract_address) {
                return addr;
            }
        }
        UNKNOWN_SENDER.to_string()
    }

    fn set_value(&mut self, name: &str, value: &str) {
        if let Some((_, v)) = self.fields.iter_mut().find(|(n, _)| n == name) {
            *v = value.to_string();
        }
    }
}

/// Pull a bare `user@domain` out of a header value: the `<...>` form when
/// present, otherwise the first token containing an `@`. `None` lets the
/// caller fall through to the next header in the chain.
fn extract_address(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if let Some(start) = trimmed.rfind('<') {
        if let Some(end) = trimmed[start..].find('>') {
            let addr = trimmed[start + 1..start + end].trim();
            if !addr.is_empty() {
                return Some(addr.to_string());
            }
        }
    }
    if trimmed.contains('@') {
        return trimmed
            .split_whitespace()
            .find(|token| token.contains('@'))
            .map(|token| token.trim_matches(['"', '<', '>', '(', ')', ',', ';']).to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn block_with_envelope(envelope: &str) -> HeaderBlock {
        let mut headers = HeaderBlock::new();
        headers.add(ENVELOPE_FIELD, envelope);
        headers
    }

    #[test]
    fn test_add_line_splits_at_first_colon() {
        let mut headers = HeaderBlock::new();
        headers.add_line("Subject: re: your mail");
        assert_eq!(headers.value("Subject:"), Some("re: your mail"));
    }

    #[test]
    fn test_folded_value_joins_with_single_space() {
        let mut headers = HeaderBlock::new();
        headers.add_line("To: alice@example.com,");
        headers.append_to_last("\tbob@example.com");
        assert_eq!(
            headers.value("To:"),
            Some("alice@example.com, bob@example.com")
        );
    }

    #[test]
    fn test_line_without_colon_continues_previous_field() {
        let mut headers = HeaderBlock::new();
        headers.add_line("Subject: broken");
        headers.add_line("over two lines");
        assert_eq!(headers.value("Subject:"), Some("broken over two lines"));
    }

    #[test]
    fn test_duplicate_lookup_returns_first() {
        let mut headers = HeaderBlock::new();
        headers.add("Received:", "from a");
        headers.add("Received:", "from b");
        assert_eq!(headers.value("Received:"), Some("from a"));
    }

    #[test]
    fn test_clean_synthesizes_date_when_absent() {
        let mut headers = block_with_envelope("???@??? Thu Jan 03 11:42:42 2002");
        headers.clean(&TocIndex::default(), 0, &ReplyGraph::default());
        assert_eq!(headers.value("Date:"), Some("Thu 03 Jan 2002 11:42:42"));
    }

    #[test]
    fn test_clean_keeps_existing_date() {
        let mut headers = block_with_envelope("???@??? Thu Jan 03 11:42:42 2002");
        headers.add("Date:", "Thu, 3 Jan 2002 11:42:42 +0100");
        headers.clean(&TocIndex::default(), 0, &ReplyGraph::default());
        assert_eq!(headers.value("Date:"), Some("Thu, 3 Jan 2002 11:42:42 +0100"));
    }

    #[test]
    fn test_clean_substitutes_sender_from_from_header() {
        let mut headers = block_with_envelope("???@??? Thu Jan 03 11:42:42 2002");
        headers.add("From:", "Jane Doe <jane@example.com>");
        headers.clean(&TocIndex::default(), 0, &ReplyGraph::default());
        assert_eq!(
            headers.value(ENVELOPE_FIELD),
            Some("jane@example.com Thu Jan 03 11:42:42 2002")
        );
    }

    #[test]
    fn test_clean_sender_fallback_chain() {
        let mut headers = block_with_envelope("???@??? Thu Jan 03 11:42:42 2002");
        headers.add("From:", "no address here");
        headers.add("Sender:", "relay@example.org");
        headers.clean(&TocIndex::default(), 0, &ReplyGraph::default());
        assert_eq!(
            headers.value(ENVELOPE_FIELD),
            Some("relay@example.org Thu Jan 03 11:42:42 2002")
        );
    }

    #[test]
    fn test_clean_uses_sentinel_when_no_sender_found() {
        let mut headers = block_with_envelope("???@??? Thu Jan 03 11:42:42 2002");
        headers.clean(&TocIndex::default(), 0, &ReplyGraph::default());
        assert_eq!(
            headers.value(ENVELOPE_FIELD),
            Some("unknown@unknown.unknown Thu Jan 03 11:42:42 2002")
        );
    }

    #[test]
    fn test_clean_is_idempotent() {
        let mut headers = block_with_envelope("???@??? Thu Jan 03 11:42:42 2002");
        headers.add("From:", "<jane@example.com>");
        headers.clean(&TocIndex::default(), 0, &ReplyGraph::default());
        let after_first = headers.value(ENVELOPE_FIELD).map(str::to_string);
        let len_after_first = headers.len();
        headers.clean(&TocIndex::default(), 0, &ReplyGraph::default());
        assert_eq!(headers.value(ENVELOPE_FIELD).map(str::to_string), after_first);
        assert_eq!(headers.len(), len_after_first);
    }

    #[test]
    fn test_clean_adds_status_from_toc() {
        let toc = TocIndex::from_reader(Cursor::new("offset: 0\nstatus: 1\noffset: 100\nstatus: 0\n"));

        let mut read = block_with_envelope("???@??? Thu Jan 03 11:42:42 2002");
        read.clean(&toc, 0, &ReplyGraph::default());
        assert_eq!(read.value("Status:"), Some("RO"));

        let mut unread = block_with_envelope("???@??? Thu Jan 03 11:42:42 2002");
        unread.clean(&toc, 100, &ReplyGraph::default());
        assert_eq!(unread.value("Status:"), Some("O"));

        let mut unknown = block_with_envelope("???@??? Thu Jan 03 11:42:42 2002");
        unknown.clean(&toc, 999, &ReplyGraph::default());
        assert_eq!(unknown.value("Status:"), None);
    }

    #[test]
    fn test_clean_adds_answered_flag() {
        let archive = "\
From ???@??? Thu Jan 03 12:00:00 2002
In-Reply-To: <first@example.com>

body
";
        let replies = ReplyGraph::from_reader(Cursor::new(archive));

        let mut headers = block_with_envelope("???@??? Thu Jan 03 11:42:42 2002");
        headers.add("Message-ID:", "<first@example.com>");
        headers.clean(&TocIndex::default(), 0, &replies);
        assert_eq!(headers.value("X-Status:"), Some("A"));
    }

    #[test]
    fn test_emittable_skips_envelope_and_content_type() {
        let mut headers = block_with_envelope("???@??? Thu Jan 03 11:42:42 2002");
        headers.add("Subject:", "hello");
        headers.add("Content-Type:", "text/plain; charset=us-ascii");
        headers.add("Content-type:", "duplicate, odd case");
        headers.add("X-Attachments:", "");

        let emitted: Vec<(&str, &str)> = headers.emittable().collect();
        assert_eq!(emitted, vec![("Subject", "hello"), ("X-Attachments", "")]);
    }

    #[test]
    fn test_extract_address_forms() {
        assert_eq!(
            extract_address("Jane Doe <jane@example.com>"),
            Some("jane@example.com".to_string())
        );
        assert_eq!(
            extract_address("jane@example.com"),
            Some("jane@example.com".to_string())
        );
        assert_eq!(
            extract_address("\"Doe, Jane\" <jane@example.com> (home)"),
            Some("jane@example.com".to_string())
        );
        assert_eq!(extract_address("no address"), None);
        assert_eq!(extract_address(""), None);
    }
}
