//! Path dialect detection for attachment descriptions.
//!
//! Eudora recorded an attachment's original location in the syntax of the
//! client it ran on: DOS paths on Windows (`C:\mail\attach\file.doc`),
//! colon-separated paths with a type/creator suffix on the Mac
//! (`Macintosh HD:Eudora Folder:file.pdf (PDF /CARO)`), and occasionally
//! something that is neither. Each dialect is a pure function from
//! description to file name plus original path; detection picks exactly
//! one per description.

/// Recognized description syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathDialect {
    Windows,
    Macintosh,
    /// Neither syntax matched; the whole description stands as file name.
    Opaque,
}

/// A description split into its searchable parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDescription {
    /// Candidate file name to look for on disk.
    pub file_name: String,
    /// The description's own directory portion, forward-slash joined.
    /// Used as the reporting bucket for found/missing tallies.
    pub original_path: String,
    pub dialect: PathDialect,
}

/// Split an attachment description according to its detected dialect.
pub fn parse(description: &str) -> ParsedDescription {
    let description = description.trim();
    if description.contains(":\\") {
        parse_windows(description)
    } else if let Some(name_part) = mac_name_part(description) {
        parse_macintosh(name_part)
    } else {
        ParsedDescription {
            file_name: description.to_string(),
            original_path: description.to_string(),
            dialect: PathDialect::Opaque,
        }
    }
}

fn parse_windows(description: &str) -> ParsedDescription {
    let mut segments: Vec<&str> = description.split('\\').collect();
    let name = segments.pop().unwrap_or("").trim();
    // Some clients wrapped the path in quotes; only the trailing one
    // survives the split.
    let name = name.strip_suffix('"').unwrap_or(name);
    ParsedDescription {
        file_name: name.to_string(),
        original_path: bucket(&segments, name),
        dialect: PathDialect::Windows,
    }
}

/// The Mac form is `path (extra-info)`: everything before the first
/// ` (` is the colon path, the parenthesized rest is type/creator data
/// (possibly followed by more, as in `(PDF /CARO) (00000645)`).
fn mac_name_part(description: &str) -> Option<&str> {
    let open = description.find(" (")?;
    description[open + 1..].find(')')?;
    Some(&description[..open])
}

fn parse_macintosh(name_part: &str) -> ParsedDescription {
    let mut segments: Vec<&str> = name_part.split(':').map(str::trim).collect();
    let name = segments.pop().unwrap_or("");
    ParsedDescription {
        file_name: name.to_string(),
        original_path: bucket(&segments, name),
        dialect: PathDialect::Macintosh,
    }
}

/// Reporting bucket: the directory segments joined with `/`, or the file
/// name itself when the description carried no directory at all.
fn bucket(segments: &[&str], name: &str) -> String {
    if segments.is_empty() {
        name.to_string()
    } else {
        segments.join("/")
    }
}
