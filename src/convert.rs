//! The conversion driver.
//!
//! A streaming state machine over the legacy archive: detect message
//! boundaries, accumulate headers and body, decide the MIME framing,
//! queue attachment lines for seal-time resolution, and emit each finished
//! message into the destination mbox. The TOC index and the reply graph
//! are both complete before the main pass starts; the reply scan uses its
//! own cursor over the archive.

use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::attachment::{self, AttachmentResolver, Outcome};
use crate::attachment::dialect::PathDialect;
use crate::error::Result;
use crate::export::mbox::MboxWriter;
use crate::model::headers::{HeaderBlock, ENVELOPE_FIELD};
use crate::model::message::{BodyKind, MessageKind, OutgoingMessage};
use crate::parser::html;
use crate::parser::mbx::{is_message_start, MbxReader};
use crate::parser::replies::ReplyGraph;
use crate::parser::toc::TocIndex;
use crate::report::ConversionReport;

/// How often the progress callback fires, in bytes read.
const PROGRESS_INTERVAL: u64 = 1024 * 1024;

/// Options for a single archive conversion.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Candidate attachment directories, probed in order. Empty disables
    /// attachment-line handling entirely.
    pub attachment_dirs: Vec<PathBuf>,
    /// Destination-client hint joined into attachment candidate paths.
    pub target: String,
    /// Output path; `<archive>.new` when unset.
    pub output: Option<PathBuf>,
    /// Remove `<x-flowed>`/`<x-html>`-style markup noise from body lines.
    pub scrub_markup: bool,
    /// Base for relative target hints; the user's home directory when
    /// unset.
    pub home: Option<PathBuf>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            attachment_dirs: Vec::new(),
            target: String::new(),
            output: None,
            scrub_markup: true,
            home: None,
        }
    }
}

/// Convert one legacy archive into a destination mbox.
///
/// The progress callback receives `(bytes_done, bytes_total)`. Fatal
/// conditions (unreadable archive, unwritable or uncloseable output) come
/// back as `Err`; everything else is counted in the returned report.
pub fn convert(
    archive: &Path,
    options: &ConvertOptions,
    progress: Option<&dyn Fn(u64, u64)>,
) -> Result<ConversionReport> {
    let mut reader = MbxReader::open(archive)?;
    let output = options
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(archive));
    info!(
        archive = %archive.display(),
        output = %output.display(),
        "Converting mailbox"
    );
    let writer = MboxWriter::create(&output)?;

    let toc = TocIndex::load(archive);
    let replies = ReplyGraph::scan(archive);

    let resolver = match &options.home {
        Some(home) => AttachmentResolver::with_home(options.attachment_dirs.clone(), home.clone()),
        None => AttachmentResolver::new(options.attachment_dirs.clone()),
    };

    let mut converter = Converter {
        options,
        writer,
        toc,
        replies,
        resolver,
        report: ConversionReport::default(),
        state: State::ExpectingStart,
        headers: None,
        pending: None,
        msg_offset: 0,
        body: Vec::new(),
        attachments: Vec::new(),
        is_html: false,
    };

    // The output handle is closed on every exit path; both results count.
    let run_result = converter.run(&mut reader, progress);
    let Converter { writer, report, .. } = converter;
    let close_result = writer.close();
    run_result?;
    close_result?;

    info!(
        messages = report.messages,
        warnings = report.warnings,
        errors = report.errors,
        "Conversion finished"
    );
    Ok(report)
}

/// Default output path: the archive name with `.new` appended.
pub fn default_output_path(archive: &Path) -> PathBuf {
    let mut name = archive.file_name().unwrap_or_default().to_os_string();
    name.push(".new");
    archive.with_file_name(name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    ExpectingStart,
    InHeaders,
    InBody,
}

/// An attachment line queued during body accumulation, resolved at seal.
struct QueuedAttachment {
    line: String,
    target: String,
}

struct Converter<'a> {
    options: &'a ConvertOptions,
    writer: MboxWriter,
    toc: TocIndex,
    replies: ReplyGraph,
    resolver: AttachmentResolver,
    report: ConversionReport,
    state: State,
    /// Header record of the message being accumulated (`InHeaders`).
    headers: Option<HeaderBlock>,
    /// Framed message awaiting its body and seal (`InBody`).
    pending: Option<OutgoingMessage>,
    /// Archive byte offset of the current message's boundary line.
    msg_offset: u64,
    body: Vec<String>,
    attachments: Vec<QueuedAttachment>,
    is_html: bool,
}

impl Converter<'_> {
    fn run(&mut self, reader: &mut MbxReader, progress: Option<&dyn Fn(u64, u64)>) -> Result<()> {
        let total = reader.file_size();
        let mut last_progress = 0u64;

        while let Some((offset, line)) = reader.next_line()? {
            self.report.lines += 1;
            self.handle_line(offset, &line)?;

            if let Some(callback) = progress {
                if reader.offset() - last_progress >= PROGRESS_INTERVAL {
                    callback(reader.offset(), total);
                    last_progress = reader.offset();
                }
            }
        }
        if let Some(callback) = progress {
            callback(total, total);
        }

        self.handle_eof()
    }

    fn handle_line(&mut self, offset: u64, line: &str) -> Result<()> {
        if is_message_start(line) {
            self.seal_pending(SealCause::Boundary)?;
            self.begin_message(offset, line);
            return Ok(());
        }
        match self.state {
            // Preamble junk before the first separator is nobody's message.
            State::ExpectingStart => {}
            State::InHeaders => self.header_line(line),
            State::InBody => self.body_line(line),
        }
        Ok(())
    }

    fn begin_message(&mut self, offset: u64, line: &str) {
        let mut headers = HeaderBlock::new();
        headers.add(ENVELOPE_FIELD, line["From ".len()..].trim());

        self.headers = Some(headers);
        self.pending = None;
        self.msg_offset = offset;
        self.body.clear();
        self.attachments.clear();
        self.is_html = false;
        self.state = State::InHeaders;
    }

    fn header_line(&mut self, line: &str) {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(headers) = self.headers.as_mut() {
                headers.append_to_last(line);
            }
            return;
        }
        if !line.trim().is_empty() {
            if let Some(headers) = self.headers.as_mut() {
                headers.add_line(line);
            }
            return;
        }
        // Blank line: headers are complete, frame the message.
        if let Some(headers) = self.headers.take() {
            self.pending = Some(self.frame_message(headers));
        }
        self.state = State::InBody;
    }

    /// Decide the MIME framing, clean the record, and copy its fields onto
    /// a fresh destination message.
    fn frame_message(&mut self, mut headers: HeaderBlock) -> OutgoingMessage {
        let content_type = headers.value("Content-Type:").map(str::to_string);
        let has_attachment_header = headers
            .value("X-Attachments:")
            .is_some_and(|v| !v.trim().is_empty());
        let kind = MessageKind::from_content_type(content_type.as_deref(), has_attachment_header);

        headers.clean(&self.toc, self.msg_offset, &self.replies);

        let envelope = headers.value(ENVELOPE_FIELD).unwrap_or_default().to_string();
        let mut message = OutgoingMessage::new(kind, envelope);
        for (name, value) in headers.emittable() {
            message.push_header(name, value);
        }
        message
    }

    fn body_line(&mut self, line: &str) {
        if line.contains("<x-html>") || line.contains("</x-html>") {
            self.is_html = true;
        }

        if self.resolver.is_configured() && attachment::is_attachment_line(line) {
            // Eudora put a blank line in front of the note; drop it.
            if self.body.last().is_some_and(|l| l.is_empty()) {
                self.body.pop();
            }
            debug!(offset = self.msg_offset, line = %line, "Queued attachment line");
            self.attachments.push(QueuedAttachment {
                line: line.to_string(),
                target: self.options.target.clone(),
            });
            return;
        }

        if self.options.scrub_markup {
            self.body.push(scrub_markup(line));
        } else {
            self.body.push(line.to_string());
        }
    }

    /// Seal and emit the message being accumulated, if any. Called on every
    /// boundary and once at end of stream.
    fn seal_pending(&mut self, cause: SealCause) -> Result<()> {
        // Headers still open: the message had no blank-line terminator.
        // Frame what we have rather than dropping it.
        if self.state == State::InHeaders {
            if let Some(headers) = self.headers.take() {
                match cause {
                    SealCause::Boundary => {
                        error!(offset = self.msg_offset, "Message start found inside message")
                    }
                    SealCause::EndOfStream => {
                        error!(offset = self.msg_offset, "Archive ended inside message headers")
                    }
                }
                self.report.record_error();
                self.pending = Some(self.frame_message(headers));
            }
        }

        let Some(mut message) = self.pending.take() else {
            return Ok(());
        };

        let body_kind = if self.is_html {
            BodyKind::Html
        } else {
            BodyKind::Plain
        };
        message.set_body(self.body.join("\n"), body_kind);

        for queued in std::mem::take(&mut self.attachments) {
            self.report.attachments.record_listed();
            let resolved = self.resolver.resolve(&queued.line, &queued.target);
            if resolved.dialect == PathDialect::Opaque {
                self.report.record_warning();
            }
            match resolved.outcome {
                Outcome::Attached(part) => {
                    self.report.attachments.record_found(&resolved.original_path);
                    message.attach(part);
                }
                Outcome::MissingFile { .. } => {
                    self.report.attachments.record_missing(&resolved.original_path);
                    self.report.record_warning();
                }
                // The file is there; only its category has no part shape.
                Outcome::UnsupportedType { .. } => {
                    self.report.attachments.record_found(&resolved.original_path);
                    self.report.record_error();
                }
            }
        }

        if message.body_kind == BodyKind::Html {
            let cids = html::embedded_image_cids(&message.body);
            if !cids.is_empty() {
                debug!(
                    offset = self.msg_offset,
                    count = cids.len(),
                    "HTML body references embedded images not present in the archive"
                );
                self.report.embedded_images += cids.len() as u64;
            }
        }

        self.writer.append(&message)?;
        self.report.messages += 1;
        self.body.clear();
        self.is_html = false;
        Ok(())
    }

    fn handle_eof(&mut self) -> Result<()> {
        self.seal_pending(SealCause::EndOfStream)?;

        if self.report.lines == 0 {
            warn!("empty file");
            self.report.record_warning();
        } else if self.report.messages == 0 {
            error!("no messages (not a Eudora mailbox file?)");
            self.report.record_error();
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum SealCause {
    Boundary,
    EndOfStream,
}

/// Remove Eudora's inline markup noise from a body line: `<x-flowed>` and
/// `<x-html>` pairs, plus `<!x-stuff-for-pete...>` junk tags.
fn scrub_markup(line: &str) -> String {
    let mut text = line
        .replace("<x-flowed>", "")
        .replace("</x-flowed>", "")
        .replace("<x-html>", "")
        .replace("</x-html>", "");
    while let Some(start) = text.find("<!x-stuff-for-pete") {
        match text[start..].find('>') {
            Some(rel) => text.replace_range(start..start + rel + 1, ""),
            None => break,
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrub_markup_tokens() {
        assert_eq!(scrub_markup("<x-flowed>hello</x-flowed>"), "hello");
        assert_eq!(scrub_markup("<x-html><b>hi</b></x-html>"), "<b>hi</b>");
        assert_eq!(
            scrub_markup("<!x-stuff-for-pete base=\"\" src=\"\" id=\"0\">text"),
            "text"
        );
        assert_eq!(scrub_markup("plain line"), "plain line");
    }

    #[test]
    fn test_scrub_keeps_unterminated_junk_tag() {
        assert_eq!(
            scrub_markup("<!x-stuff-for-pete without end"),
            "<!x-stuff-for-pete without end"
        );
    }

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("/mail/In.mbx")),
            PathBuf::from("/mail/In.mbx.new")
        );
        assert_eq!(
            default_output_path(Path::new("Out")),
            PathBuf::from("Out.new")
        );
    }
}
