//! Destination message model.
//!
//! The framing of an outgoing message is decided exactly once, from the
//! legacy `Content-Type:` value, as a closed choice: a single-part body of
//! some `main/sub` type, or a multipart container with a subtype.
//! Attachment parts only ever hang off a multipart message; attaching a
//! part to a single-part framing upgrades it to `multipart/mixed` first.

/// Framing of the destination message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    /// Non-multipart message of `main/sub` (e.g. `text/plain`).
    Single { main: String, sub: String },
    /// Multipart container (`multipart/<subtype>`).
    Multipart { subtype: String },
}

impl MessageKind {
    pub fn plain_text() -> Self {
        Self::Single {
            main: "text".to_string(),
            sub: "plain".to_string(),
        }
    }

    pub fn mixed() -> Self {
        Self::Multipart {
            subtype: "mixed".to_string(),
        }
    }

    /// Classify a raw `Content-Type:` header value (`None` when the legacy
    /// message had no such header).
    ///
    /// Without a content type the message is plain text, unless the
    /// Eudora `X-Attachments:` header was present and non-empty, in which
    /// case attachments are coming and the framing is `multipart/mixed`.
    /// Parameters after `;` are dropped; a bare main type gets the
    /// conventional default subtype.
    pub fn from_content_type(value: Option<&str>, has_attachment_header: bool) -> Self {
        let fallback = || {
            if has_attachment_header {
                Self::mixed()
            } else {
                Self::plain_text()
            }
        };

        let Some(raw) = value else {
            return fallback();
        };
        let mime = raw.split(';').next().unwrap_or("").trim();
        if mime.is_empty() {
            return fallback();
        }

        let lower = mime.to_ascii_lowercase();
        if let Some(sub) = lower.strip_prefix("multipart/") {
            // Slice the original spelling, not the lowered copy.
            let sub = mime[mime.len() - sub.len()..].trim();
            if sub.is_empty() {
                return Self::mixed();
            }
            return Self::Multipart {
                subtype: sub.to_string(),
            };
        }

        let (main, sub) = match mime.split_once('/') {
            Some((main, sub)) => (main.trim().to_string(), sub.trim().to_string()),
            None => (mime.to_string(), String::new()),
        };
        let sub = if sub.is_empty() {
            if main.eq_ignore_ascii_case("text") {
                "plain".to_string()
            } else {
                "octet-stream".to_string()
            }
        } else {
            sub
        };
        Self::Single { main, sub }
    }

    /// The framing once parts exist: single-part upgrades to
    /// `multipart/mixed`, multipart stays what it is.
    pub fn with_parts(self) -> Self {
        match self {
            Self::Single { .. } => Self::mixed(),
            multipart => multipart,
        }
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self, Self::Multipart { .. })
    }
}

/// What the body text turned out to be, decided while reading it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyKind {
    #[default]
    Plain,
    Html,
}

/// A resolved attachment loaded from disk, ready for emission.
#[derive(Debug, Clone)]
pub struct AttachmentPart {
    pub main_type: String,
    pub sub_type: String,
    /// File name carried in the part's `Content-Disposition`.
    pub file_name: String,
    pub data: Vec<u8>,
    /// Text parts are emitted inline; everything else as base64.
    pub is_text: bool,
}

impl AttachmentPart {
    pub fn binary(main_type: &str, sub_type: &str, file_name: &str, data: Vec<u8>) -> Self {
        Self {
            main_type: main_type.to_string(),
            sub_type: sub_type.to_string(),
            file_name: file_name.to_string(),
            data,
            is_text: false,
        }
    }

    pub fn text(sub_type: &str, file_name: &str, data: Vec<u8>) -> Self {
        Self {
            main_type: "text".to_string(),
            sub_type: sub_type.to_string(),
            file_name: file_name.to_string(),
            data,
            is_text: true,
        }
    }

    pub fn content_type(&self) -> String {
        format!("{}/{}", self.main_type, self.sub_type)
    }
}

/// A fully-reconstructed message on its way into the destination mbox.
#[derive(Debug)]
pub struct OutgoingMessage {
    pub kind: MessageKind,
    /// Envelope text after `From ` (sender already substituted).
    pub envelope: String,
    /// Emission headers in insertion order, names without the colon.
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub body_kind: BodyKind,
    pub parts: Vec<AttachmentPart>,
}

impl OutgoingMessage {
    pub fn new(kind: MessageKind, envelope: String) -> Self {
        Self {
            kind,
            envelope,
            headers: Vec::new(),
            body: String::new(),
            body_kind: BodyKind::Plain,
            parts: Vec::new(),
        }
    }

    pub fn push_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    pub fn set_body(&mut self, body: String, kind: BodyKind) {
        self.body = body;
        self.body_kind = kind;
    }

    /// Add an attachment part, upgrading the framing to multipart if the
    /// content type said single-part.
    pub fn attach(&mut self, part: AttachmentPart) {
        self.kind = self.kind.clone().with_parts();
        self.parts.push(part);
    }

    pub fn is_multipart(&self) -> bool {
        self.kind.is_multipart()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_content_type_is_plain_text() {
        assert_eq!(
            MessageKind::from_content_type(None, false),
            MessageKind::plain_text()
        );
    }

    #[test]
    fn test_attachment_header_promotes_to_multipart() {
        assert_eq!(
            MessageKind::from_content_type(None, true),
            MessageKind::mixed()
        );
    }

    #[test]
    fn test_multipart_subtype_with_parameters() {
        assert_eq!(
            MessageKind::from_content_type(
                Some("multipart/alternative; boundary=\"=-abc\""),
                false
            ),
            MessageKind::Multipart {
                subtype: "alternative".to_string()
            }
        );
    }

    #[test]
    fn test_multipart_without_parameters() {
        assert_eq!(
            MessageKind::from_content_type(Some("multipart/mixed"), false),
            MessageKind::mixed()
        );
    }

    #[test]
    fn test_single_with_parameters() {
        assert_eq!(
            MessageKind::from_content_type(Some("text/html; charset=iso-8859-1"), false),
            MessageKind::Single {
                main: "text".to_string(),
                sub: "html".to_string()
            }
        );
    }

    #[test]
    fn test_bare_main_type_gets_default_subtype() {
        assert_eq!(
            MessageKind::from_content_type(Some("text"), false),
            MessageKind::plain_text()
        );
        assert_eq!(
            MessageKind::from_content_type(Some("application"), false),
            MessageKind::Single {
                main: "application".to_string(),
                sub: "octet-stream".to_string()
            }
        );
    }

    #[test]
    fn test_attach_upgrades_single_to_mixed() {
        let mut message = OutgoingMessage::new(MessageKind::plain_text(), String::new());
        assert!(!message.is_multipart());
        message.attach(AttachmentPart::binary(
            "application",
            "pdf",
            "report.pdf",
            vec![1, 2, 3],
        ));
        assert_eq!(message.kind, MessageKind::mixed());
        assert_eq!(message.parts.len(), 1);
    }

    #[test]
    fn test_attach_keeps_declared_multipart_subtype() {
        let mut message = OutgoingMessage::new(
            MessageKind::Multipart {
                subtype: "alternative".to_string(),
            },
            String::new(),
        );
        message.attach(AttachmentPart::binary("image", "gif", "a.gif", vec![]));
        assert_eq!(
            message.kind,
            MessageKind::Multipart {
                subtype: "alternative".to_string()
            }
        );
    }
}
