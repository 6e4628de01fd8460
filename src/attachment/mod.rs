//! Attachment resolution: find the on-disk file behind an
//! `Attachment converted:` body line and load it as a MIME part.
//!
//! When Eudora detached an attachment it replaced the MIME part with a
//! one-line note naming where the file landed, in the client's native
//! path syntax. Decades of copying those trees between systems mangled
//! the names in predictable ways, so resolution walks an ordered chain of
//! name normalizations over each configured directory until a candidate
//! exists. Resolution never fails the message: an unresolvable attachment
//! is reported missing and the conversion moves on.

pub mod dialect;

use std::path::{Path, PathBuf};

use tracing::{debug, error, warn};

use crate::model::message::AttachmentPart;

use self::dialect::{ParsedDescription, PathDialect};

/// Marker prefix of attachment body lines. Mac Eudora wrote `converted`,
/// Windows `Converted`; matching is case-insensitive.
pub const ATTACHMENT_MARKER: &str = "attachment converted:";

/// Vendor artifact that shows up in descriptions but never on disk.
const VENDOR_PREFIX: &str = "OutboundG4:";

/// Check whether a body line is an attachment-description line.
pub fn is_attachment_line(line: &str) -> bool {
    line.get(..ATTACHMENT_MARKER.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(ATTACHMENT_MARKER))
}

/// Result of resolving one attachment description.
#[derive(Debug)]
pub struct Resolved {
    /// Reporting bucket: the description's own directory portion.
    pub original_path: String,
    /// Which path syntax the description used.
    pub dialect: PathDialect,
    pub outcome: Outcome,
}

#[derive(Debug)]
pub enum Outcome {
    /// A candidate existed and loaded.
    Attached(AttachmentPart),
    /// No candidate existed under any directory and normalization.
    MissingFile { description: String },
    /// The file exists but its MIME category has no part representation.
    UnsupportedType { path: PathBuf, mime: String },
}

/// Resolves attachment descriptions against the configured directories.
pub struct AttachmentResolver {
    search_dirs: Vec<PathBuf>,
    home: PathBuf,
}

impl AttachmentResolver {
    /// Resolver over `search_dirs`, probed in order. Relative target hints
    /// resolve against the user's home directory.
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::with_home(search_dirs, home)
    }

    /// Same, with an explicit home base.
    pub fn with_home(search_dirs: Vec<PathBuf>, home: PathBuf) -> Self {
        Self { search_dirs, home }
    }

    /// Attachment handling is enabled only when directories are configured.
    pub fn is_configured(&self) -> bool {
        !self.search_dirs.is_empty()
    }

    /// Resolve one `Attachment converted:` line. `target` is the
    /// destination-client hint joined into every candidate path.
    pub fn resolve(&self, line: &str, target: &str) -> Resolved {
        let description = extract_description(line);
        let parsed = dialect::parse(&description);
        if parsed.dialect == PathDialect::Opaque {
            warn!(
                description = %description,
                "Unrecognized attachment path style; trying the whole description as a file name"
            );
        }

        for dir in &self.search_dirs {
            for name in name_candidates(&parsed.file_name) {
                let path = self.candidate_path(target, dir, &name);
                if path.is_file() {
                    debug!(path = %path.display(), "Attachment resolved");
                    return self.load(&parsed, path, name);
                }
            }
        }

        warn!(
            description = %description,
            "Attachment not found under any search directory"
        );
        Resolved {
            original_path: parsed.original_path,
            dialect: parsed.dialect,
            outcome: Outcome::MissingFile { description },
        }
    }

    /// `home ⟩ target ⟩ dir ⟩ name`, where any absolute component
    /// discards what came before it (standard [`Path::join`] behavior).
    fn candidate_path(&self, target: &str, dir: &Path, name: &str) -> PathBuf {
        self.home.join(target).join(dir).join(name)
    }

    fn load(&self, parsed: &ParsedDescription, path: PathBuf, name: String) -> Resolved {
        let outcome = load_part(&path, &name);
        Resolved {
            original_path: parsed.original_path.clone(),
            dialect: parsed.dialect,
            outcome,
        }
    }
}

/// Load a resolved file into the part shape for its coarse MIME category.
/// The type is guessed from the extension of the disambiguator-trimmed
/// name; `video/*` data is carried as `application` since no richer part
/// shape exists for it here.
fn load_part(path: &Path, name: &str) -> Outcome {
    let trimmed = trim_disambiguator(name);
    let mime = mime_guess::from_path(Path::new(&trimmed)).first_or_octet_stream();
    let main = mime.type_().as_str().to_string();
    let sub = mime.subtype().as_str().to_string();

    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Attachment file became unreadable");
            return Outcome::MissingFile {
                description: name.to_string(),
            };
        }
    };

    match main.as_str() {
        "application" | "image" | "audio" => Outcome::Attached(AttachmentPart::binary(
            &main, &sub, name, data,
        )),
        "video" => Outcome::Attached(AttachmentPart::binary("application", &sub, name, data)),
        "text" => Outcome::Attached(AttachmentPart::text(&sub, name, data)),
        _ => {
            let mime = format!("{main}/{sub}");
            error!(path = %path.display(), mime = %mime, "Unrecognized MIME category; attachment dropped");
            Outcome::UnsupportedType {
                path: path.to_path_buf(),
                mime,
            }
        }
    }
}

/// Strip the marker and tidy the description: surrounding quotes removed,
/// the vendor `OutboundG4:` token dropped wherever it appears.
fn extract_description(line: &str) -> String {
    let rest = line.get(ATTACHMENT_MARKER.len()..).unwrap_or("").trim();
    let rest = if rest.len() >= 2 && rest.starts_with('"') && rest.ends_with('"') {
        &rest[1..rest.len() - 1]
    } else {
        rest
    };
    rest.replace(VENDOR_PREFIX, "")
}

/// Candidate file names in probe order. The chain is cumulative: each
/// normalization applies to the previous result, mirroring how the files
/// actually got mangled when copied off the original systems.
///
/// 1. the name as parsed
/// 2. vendor `OutboundG4:` prefix stripped
/// 3. `/` removed
/// 4. `_` replaced with spaces
/// 5. spaces replaced with `_`
/// 6. trailing copy-disambiguator trimmed (`report.ppt 1` → `report.ppt`),
///    both as-is and with underscores swapped back to spaces first, each
///    trimmed result also retried with its separators swapped
fn name_candidates(file_name: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut name = file_name.trim().to_string();
    push_unique(&mut names, name.clone());

    if let Some(stripped) = name.strip_prefix(VENDOR_PREFIX) {
        name = stripped.to_string();
        push_unique(&mut names, name.clone());
    }
    if name.contains('/') {
        name = name.replace('/', "");
        push_unique(&mut names, name.clone());
    }
    if name.contains('_') {
        name = name.replace('_', " ");
        push_unique(&mut names, name.clone());
    }
    if name.contains(' ') {
        name = name.replace(' ', "_");
        push_unique(&mut names, name.clone());
    }

    // The disambiguator only trims across whitespace, so underscored
    // names get their underscores swapped back before trimming.
    for base in [name.clone(), name.replace('_', " ")] {
        let trimmed = trim_disambiguator(&base);
        if trimmed == base {
            continue;
        }
        push_unique(&mut names, trimmed.clone());
        if trimmed.contains(' ') {
            push_unique(&mut names, trimmed.replace(' ', "_"));
        }
        if trimmed.contains('_') {
            push_unique(&mut names, trimmed.replace('_', " "));
        }
    }

    names
}

fn push_unique(names: &mut Vec<String>, name: String) {
    if !name.is_empty() && !names.contains(&name) {
        names.push(name);
    }
}

/// Trim a trailing copy-disambiguator: everything after the first
/// whitespace following the last `.ext` run goes
/// (`Q3 report.ppt 1` → `Q3 report.ppt`). Names without an extension, or
/// with nothing attached after it, pass through unchanged.
fn trim_disambiguator(name: &str) -> String {
    let Some(dot) = name.rfind('.') else {
        return name.to_string();
    };
    let after = &name[dot + 1..];
    match after.find(|c: char| c.is_whitespace()) {
        Some(ws) if ws > 0 => name[..dot + 1 + ws].to_string(),
        _ => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_line_detection() {
        assert!(is_attachment_line("Attachment converted: C:\\a\\b.doc"));
        assert!(is_attachment_line("attachment converted: HD:c.pdf (PDF /CARO)"));
        assert!(!is_attachment_line("Attachment: C:\\a\\b.doc"));
        assert!(!is_attachment_line("see the attachment converted earlier"));
        assert!(!is_attachment_line(""));
    }

    #[test]
    fn test_extract_description_strips_quotes_and_vendor_prefix() {
        assert_eq!(
            extract_description("Attachment converted: \"C:\\attach\\a.doc\""),
            "C:\\attach\\a.doc"
        );
        assert_eq!(
            extract_description("Attachment converted: OutboundG4:report.pdf (PDF /CARO)"),
            "report.pdf (PDF /CARO)"
        );
    }

    #[test]
    fn test_name_candidates_chain_order() {
        // The space→underscore step would re-create the original name;
        // deduplication drops it.
        assert_eq!(
            name_candidates("Q3_report.ppt"),
            vec!["Q3_report.ppt".to_string(), "Q3 report.ppt".to_string()]
        );
    }

    #[test]
    fn test_name_candidates_vendor_prefix_and_slash() {
        assert_eq!(
            name_candidates("OutboundG4:odd/name.doc"),
            vec![
                "OutboundG4:odd/name.doc".to_string(),
                "odd/name.doc".to_string(),
                "oddname.doc".to_string()
            ]
        );
    }

    #[test]
    fn test_disambiguator_retries_reapply_swaps() {
        let names = name_candidates("meeting notes.txt 1");
        // Space → underscore first, then the trimmed name, then its
        // underscore and space variants.
        assert!(names.contains(&"meeting notes.txt 1".to_string()));
        assert!(names.contains(&"meeting_notes.txt_1".to_string()));
        assert!(names.contains(&"meeting_notes.txt".to_string()));
        assert!(names.contains(&"meeting notes.txt".to_string()));
    }

    #[test]
    fn test_trim_disambiguator() {
        assert_eq!(trim_disambiguator("report.ppt 1"), "report.ppt");
        assert_eq!(trim_disambiguator("a.b.ppt 12"), "a.b.ppt");
        assert_eq!(trim_disambiguator("report.ppt"), "report.ppt");
        assert_eq!(trim_disambiguator("no extension"), "no extension");
        // Nothing usable right after the dot: leave it alone.
        assert_eq!(trim_disambiguator("odd. 1"), "odd. 1");
    }

    #[test]
    fn test_candidate_path_absolute_target_overrides_home() {
        let resolver =
            AttachmentResolver::with_home(vec![PathBuf::from("attach")], PathBuf::from("/home/u"));
        assert_eq!(
            resolver.candidate_path("/mnt/mail", Path::new("attach"), "a.doc"),
            PathBuf::from("/mnt/mail/attach/a.doc")
        );
        assert_eq!(
            resolver.candidate_path("mail", Path::new("attach"), "a.doc"),
            PathBuf::from("/home/u/mail/attach/a.doc")
        );
    }
}
