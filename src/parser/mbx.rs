//! Streaming reader for legacy Eudora `.mbx` archives.
//!
//! Reads the archive line by line while tracking byte offsets, so the TOC
//! index (which is keyed by message start offset) can be consulted later.
//! The file is never loaded whole. Lines are decoded as UTF-8 with a
//! Windows-1252 fallback; Eudora predates UTF-8 and real archives mix both.
//! DOS line endings are normalized: a trailing carriage return is stripped
//! along with the newline.

use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};

use encoding_rs::WINDOWS_1252;

use crate::error::{ConvertError, Result};

const READ_BUFFER_SIZE: usize = 128 * 1024;

/// Prefix of a Eudora message separator: the placeholder sender token
/// right after `From `, then the client's out-of-order timestamp.
pub const SEPARATOR_PREFIX: &str = "From ???@???";

/// Eudora search-result artifacts prefix an embedded separator with
/// `Find `; such lines never start a message.
const FIND_PREFIX: &str = "Find ";

/// Line-oriented cursor over one `.mbx` archive.
pub struct MbxReader {
    path: PathBuf,
    reader: BufReader<File>,
    file_size: u64,
    offset: u64,
    line_buf: Vec<u8>,
}

impl MbxReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ConvertError::ArchiveNotFound(path.clone())
            } else {
                ConvertError::io(&path, e)
            }
        })?;
        let file_size = file
            .metadata()
            .map_err(|e| ConvertError::io(&path, e))?
            .len();

        Ok(Self {
            path,
            reader: BufReader::with_capacity(READ_BUFFER_SIZE, file),
            file_size,
            offset: 0,
            line_buf: Vec::with_capacity(4096),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Byte offset of the next unread line.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read the next line, returning `(start_offset, text)` with the line
    /// terminator removed, or `None` at end of stream.
    pub fn next_line(&mut self) -> Result<Option<(u64, String)>> {
        self.line_buf.clear();
        let read = self
            .reader
            .read_until(b'\n', &mut self.line_buf)
            .map_err(|e| ConvertError::io(&self.path, e))?;
        if read == 0 {
            return Ok(None);
        }
        let start = self.offset;
        self.offset += read as u64;
        Ok(Some((start, decode_line(strip_line_ending(&self.line_buf)))))
    }
}

/// Strip one trailing `\n`, and the `\r` before it if present.
pub(crate) fn strip_line_ending(bytes: &[u8]) -> &[u8] {
    let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    bytes.strip_suffix(b"\r").unwrap_or(bytes)
}

/// Decode a raw line: UTF-8 when valid, Windows-1252 otherwise.
/// Windows-1252 maps every byte, so this never fails.
pub(crate) fn decode_line(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Check whether a line starts a new Eudora message.
///
/// Only separator lines carrying the literal placeholder sender count;
/// quoted separators (`>From ???@???`) and `Find `-prefixed search
/// artifacts do not.
pub fn is_message_start(line: &str) -> bool {
    !line.starts_with(FIND_PREFIX) && line.starts_with(SEPARATOR_PREFIX)
}
