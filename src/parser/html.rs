//! Embedded-image reference scanning for HTML bodies.
//!
//! Eudora HTML mail references inline images through `cid:` URLs on `img`
//! tags, with the image data held in the client's parts store rather than
//! the mailbox. The converter cannot recover those bytes, but it can count
//! and log the references so a migration knows what got left behind.

/// Collect the `cid:` target of every `<img src="cid:...">` in `html`,
/// in document order. Tag and attribute matching is case-insensitive;
/// an unterminated tag ends the scan.
pub fn embedded_image_cids(html: &str) -> Vec<String> {
    let lower = html.to_ascii_lowercase();
    let mut cids = Vec::new();
    let mut pos = 0;

    while let Some(rel) = lower[pos..].find("<img") {
        let tag_start = pos + rel;
        let Some(tag_len) = lower[tag_start..].find('>') else {
            break;
        };
        let tag_end = tag_start + tag_len;
        if let Some(cid) = cid_from_tag(&html[tag_start..tag_end], &lower[tag_start..tag_end]) {
            cids.push(cid);
        }
        pos = tag_end + 1;
    }
    cids
}

fn cid_from_tag(tag: &str, lower: &str) -> Option<String> {
    let value_at = lower.find("src=")? + 4;
    let mut value = &tag[value_at..];
    let mut value_lower = &lower[value_at..];

    let quote = match value.as_bytes().first() {
        Some(&q @ (b'"' | b'\'')) => {
            value = &value[1..];
            value_lower = &value_lower[1..];
            Some(q as char)
        }
        _ => None,
    };

    if !value_lower.starts_with("cid:") {
        return None;
    }
    let value = &value[4..];

    let end = match quote {
        Some(q) => value.find(q)?,
        None => value
            .find(|c: char| c.is_ascii_whitespace())
            .unwrap_or(value.len()),
    };
    let cid = value[..end].trim();
    (!cid.is_empty()).then(|| cid.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_cid_src() {
        let html = r#"<html><body><img src="cid:part1.abc@example.com" alt=""></body></html>"#;
        assert_eq!(embedded_image_cids(html), vec!["part1.abc@example.com"]);
    }

    #[test]
    fn test_unquoted_and_single_quoted() {
        let html = "<img src=cid:one@x> <img src='cid:two@x'>";
        assert_eq!(embedded_image_cids(html), vec!["one@x", "two@x"]);
    }

    #[test]
    fn test_case_insensitive_tag_and_scheme() {
        let html = r#"<IMG SRC="CID:Part7@Mac">"#;
        // The cid keeps its original casing.
        assert_eq!(embedded_image_cids(html), vec!["Part7@Mac"]);
    }

    #[test]
    fn test_external_src_is_skipped() {
        let html = r#"<img src="http://example.com/logo.gif"><img src="cid:kept@x">"#;
        assert_eq!(embedded_image_cids(html), vec!["kept@x"]);
    }

    #[test]
    fn test_img_without_src() {
        assert!(embedded_image_cids("<img alt=\"broken\">").is_empty());
        assert!(embedded_image_cids("plain text, no tags").is_empty());
    }

    #[test]
    fn test_unterminated_tag_stops_cleanly() {
        assert!(embedded_image_cids("<img src=\"cid:lost@x\"").is_empty());
    }
}
