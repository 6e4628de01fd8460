//! Destination mbox container.
//!
//! Owns the output file for the whole run: `create` → `append`* → `close`.
//! Each message is serialized as one mbox record: the envelope `From ` line,
//! the carried headers, the derived MIME framing, a From-stuffed body, then
//! a blank separator line. `close` is explicit and checked; a flush failure
//! at close time usually means the disk filled up mid-run.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha256};

use crate::error::{ConvertError, Result};
use crate::model::message::{AttachmentPart, BodyKind, MessageKind, OutgoingMessage};

/// Column width for base64 part bodies.
const BASE64_LINE_WIDTH: usize = 76;

/// Writer over one destination mbox file.
pub struct MboxWriter {
    path: PathBuf,
    file: BufWriter<File>,
    messages_written: u64,
}

impl MboxWriter {
    /// Create (truncating) the destination mbox.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| ConvertError::CreateOutput {
            path: path.clone(),
            source: e,
        })?;
        Ok(Self {
            path,
            file: BufWriter::new(file),
            messages_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn messages_written(&self) -> u64 {
        self.messages_written
    }

    /// Append one message record.
    pub fn append(&mut self, message: &OutgoingMessage) -> Result<()> {
        let mut record = Vec::with_capacity(1024 + message.body.len());
        render_message(&mut record, message, self.messages_written);
        self.file
            .write_all(&record)
            .map_err(|e| ConvertError::io(&self.path, e))?;
        self.messages_written += 1;
        Ok(())
    }

    /// Flush, sync and close the container. Call exactly once.
    pub fn close(mut self) -> Result<()> {
        self.file.flush().map_err(|e| ConvertError::Close {
            path: self.path.clone(),
            source: e,
        })?;
        self.file
            .get_ref()
            .sync_all()
            .map_err(|e| ConvertError::Close {
                path: self.path.clone(),
                source: e,
            })
    }
}

fn render_message(out: &mut Vec<u8>, message: &OutgoingMessage, sequence: u64) {
    put_line(out, &format!("From {}", message.envelope));
    for (name, value) in &message.headers {
        put_line(out, &format!("{name}: {value}"));
    }
    put_line(out, "MIME-Version: 1.0");

    match &message.kind {
        MessageKind::Single { main, sub } => {
            if main.eq_ignore_ascii_case("text") {
                put_line(out, &format!("Content-Type: {main}/{sub}; charset=\"utf-8\""));
            } else {
                put_line(out, &format!("Content-Type: {main}/{sub}"));
            }
            out.push(b'\n');
            render_text(out, message.body.as_bytes());
        }
        MessageKind::Multipart { subtype } => {
            let boundary = boundary_for(message, sequence);
            put_line(
                out,
                &format!("Content-Type: multipart/{subtype}; boundary=\"{boundary}\""),
            );
            out.push(b'\n');

            // Body text rides as the first part.
            put_line(out, &format!("--{boundary}"));
            let body_type = match message.body_kind {
                BodyKind::Html => "text/html",
                BodyKind::Plain => "text/plain",
            };
            put_line(out, &format!("Content-Type: {body_type}; charset=\"utf-8\""));
            put_line(out, "Content-Transfer-Encoding: 8bit");
            out.push(b'\n');
            render_text(out, message.body.as_bytes());

            for part in &message.parts {
                render_part(out, part, &boundary);
            }
            put_line(out, &format!("--{boundary}--"));
        }
    }
    // Blank line separating records.
    out.push(b'\n');
}

fn render_part(out: &mut Vec<u8>, part: &AttachmentPart, boundary: &str) {
    put_line(out, &format!("--{boundary}"));
    let filename = part.file_name.replace('"', "'");
    if part.is_text {
        put_line(
            out,
            &format!("Content-Type: {}; charset=\"utf-8\"", part.content_type()),
        );
        put_line(
            out,
            &format!("Content-Disposition: attachment; filename=\"{filename}\""),
        );
        put_line(out, "Content-Transfer-Encoding: 8bit");
        out.push(b'\n');
        render_text(out, &part.data);
    } else {
        put_line(out, &format!("Content-Type: {}", part.content_type()));
        put_line(
            out,
            &format!("Content-Disposition: attachment; filename=\"{filename}\""),
        );
        put_line(out, "Content-Transfer-Encoding: base64");
        out.push(b'\n');
        render_base64(out, &part.data);
    }
}

/// Write text content line by line with mboxrd-style From-stuffing: any
/// line that already reads `From ` through any depth of `>` quoting gets
/// one more `>`. Guarantees a trailing newline on non-empty content.
fn render_text(out: &mut Vec<u8>, data: &[u8]) {
    if data.is_empty() {
        return;
    }
    let data = data.strip_suffix(b"\n").unwrap_or(data);
    for line in data.split(|&b| b == b'\n') {
        if needs_from_stuffing(line) {
            out.push(b'>');
        }
        out.extend_from_slice(line);
        out.push(b'\n');
    }
}

fn needs_from_stuffing(line: &[u8]) -> bool {
    let mut line = line;
    while let Some(rest) = line.strip_prefix(b">") {
        line = rest;
    }
    line.starts_with(b"From ")
}

fn render_base64(out: &mut Vec<u8>, data: &[u8]) {
    let encoded = BASE64.encode(data);
    for chunk in encoded.as_bytes().chunks(BASE64_LINE_WIDTH) {
        out.extend_from_slice(chunk);
        out.push(b'\n');
    }
}

/// Part boundary for one message: derived from the envelope and record
/// sequence number, so repeated runs over the same archive are stable.
fn boundary_for(message: &OutgoingMessage, sequence: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(message.envelope.as_bytes());
    hasher.update(sequence.to_le_bytes());
    let digest = hasher.finalize();

    let mut hex = String::with_capacity(2 * 12);
    for byte in digest.iter().take(12) {
        hex.push_str(&format!("{byte:02x}"));
    }
    format!("----=_{hex}")
}

fn put_line(out: &mut Vec<u8>, line: &str) {
    out.extend_from_slice(line.as_bytes());
    out.push(b'\n');
}
