//! Reader for the companion table-of-contents dump.
//!
//! Eudora keeps per-message state (read/unread among it) in a binary `.toc`
//! file next to each mailbox. The binary layout is vendor-defined and
//! shifted between client versions, so this reader consumes the text dump
//! a TOC dumper produces instead: `offset:` / `status:` record lines, one
//! pair per message, keyed by the message's byte offset in the archive.
//!
//! A missing or unreadable dump never aborts a conversion; it only
//! downgrades every message to unknown read status.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Message-offset → read-flag associations from a TOC dump.
#[derive(Debug, Default)]
pub struct TocIndex {
    read_flags: HashMap<u64, bool>,
    present: bool,
}

impl TocIndex {
    /// Companion dump path for an archive: `In.mbx` → `In.mbx.toc.txt`.
    pub fn companion_path(archive: &Path) -> PathBuf {
        let mut name = archive.file_name().unwrap_or_default().to_os_string();
        name.push(".toc.txt");
        archive.with_file_name(name)
    }

    /// Load the TOC dump next to `archive`. Absence or parse trouble is
    /// not an error: the resulting index answers unknown for every offset.
    pub fn load(archive: &Path) -> Self {
        let path = Self::companion_path(archive);
        match File::open(&path) {
            Ok(file) => {
                let index = Self::from_reader(BufReader::new(file));
                debug!(
                    path = %path.display(),
                    entries = index.read_flags.len(),
                    "Loaded TOC dump"
                );
                index
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "No readable TOC dump; message read status will be unknown"
                );
                Self::default()
            }
        }
    }

    /// Parse a TOC dump from any reader.
    ///
    /// Status values: `0` unread, `1` read. Other values (replied,
    /// forwarded, redirected in some dumps) carry no read flag here and
    /// are skipped, as is any line that is neither record key.
    pub fn from_reader(reader: impl BufRead) -> Self {
        let mut read_flags = HashMap::new();
        let mut offset: Option<u64> = None;

        for line in reader.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "Stopped reading TOC dump early");
                    break;
                }
            };
            let line = line.trim();
            if let Some(rest) = line.strip_prefix("offset:") {
                offset = rest.trim().parse().ok();
            } else if let Some(rest) = line.strip_prefix("status:") {
                if let (Some(off), Ok(status)) = (offset.take(), rest.trim().parse::<u8>()) {
                    match status {
                        0 => {
                            read_flags.insert(off, false);
                        }
                        1 => {
                            read_flags.insert(off, true);
                        }
                        _ => {}
                    }
                }
            }
        }

        Self {
            read_flags,
            present: true,
        }
    }

    /// Read flag for the message starting at `offset`. `None` means the
    /// TOC and the archive have drifted apart, or no TOC was found.
    pub fn read_flag(&self, offset: u64) -> Option<bool> {
        self.read_flags.get(&offset).copied()
    }

    /// Whether a dump was found and parsed at all.
    pub fn present(&self) -> bool {
        self.present
    }

    pub fn len(&self) -> usize {
        self.read_flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_flags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_parse_dump() {
        let dump = "\
offset: 0
status: 1
offset: 2048
status: 0
";
        let index = TocIndex::from_reader(Cursor::new(dump));
        assert_eq!(index.len(), 2);
        assert_eq!(index.read_flag(0), Some(true));
        assert_eq!(index.read_flag(2048), Some(false));
        assert_eq!(index.read_flag(512), None);
    }

    #[test]
    fn test_unknown_status_values_are_skipped() {
        let dump = "offset: 0\nstatus: 2\noffset: 100\nstatus: 1\n";
        let index = TocIndex::from_reader(Cursor::new(dump));
        assert_eq!(index.read_flag(0), None);
        assert_eq!(index.read_flag(100), Some(true));
    }

    #[test]
    fn test_interleaved_junk_is_tolerated() {
        let dump = "\
# dumped 2002-01-03
offset: 16
subject: hello there
status: 1
label: 0
";
        let index = TocIndex::from_reader(Cursor::new(dump));
        assert_eq!(index.read_flag(16), Some(true));
    }

    #[test]
    fn test_status_without_offset_is_dropped() {
        let index = TocIndex::from_reader(Cursor::new("status: 1\n"));
        assert!(index.is_empty());
    }

    #[test]
    fn test_companion_path() {
        assert_eq!(
            TocIndex::companion_path(Path::new("/mail/In.mbx")),
            PathBuf::from("/mail/In.mbx.toc.txt")
        );
    }

    #[test]
    fn test_default_answers_unknown() {
        let index = TocIndex::default();
        assert!(!index.present());
        assert_eq!(index.read_flag(0), None);
    }
}
