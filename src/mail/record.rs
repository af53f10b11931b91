//! Normalized representation of one ingested message.

use super::address::EmailAddress;

/// A file attachment carried by the original message.
#[derive(Debug, Clone)]
pub struct AttachmentData {
    pub filename: String,
    pub data: Vec<u8>,
    /// MIME Content-ID for inline parts referenced as `cid:` from HTML.
    pub content_id: Option<String>,
}

/// Produced once by ingestion; immutable for the lifetime of a session.
#[derive(Debug, Clone)]
pub struct EmailRecord {
    pub sender: EmailAddress,
    pub subject: String,
    /// Canonical display form, see [`crate::mail::dates::normalize_date`].
    pub date: String,
    /// Plain-text body. Derived from the HTML body when no text part exists.
    pub body: String,
    pub html_body: Option<String>,
    pub to: Vec<EmailAddress>,
    pub cc: Vec<EmailAddress>,
    pub attachments: Vec<AttachmentData>,
    /// Set when character decoding was lossy instead of failing ingestion.
    pub encoding_issues: bool,
}

impl EmailRecord {
    pub const NO_SUBJECT: &'static str = "(No Subject)";
    pub const UNKNOWN_SENDER: &'static str = "Unknown";

    /// Subject with the literal placeholder applied when missing.
    pub fn subject_or_placeholder(&self) -> &str {
        if self.subject.trim().is_empty() {
            Self::NO_SUBJECT
        } else {
            &self.subject
        }
    }

    /// Sender display string with the literal placeholder applied when missing.
    pub fn sender_display(&self) -> String {
        if self.sender.is_empty() {
            Self::UNKNOWN_SENDER.to_string()
        } else {
            self.sender.display()
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_record() -> EmailRecord {
        EmailRecord {
            sender: EmailAddress::empty(),
            subject: String::new(),
            date: "Unknown".to_string(),
            body: String::new(),
            html_body: None,
            to: Vec::new(),
            cc: Vec::new(),
            attachments: Vec::new(),
            encoding_issues: false,
        }
    }

    #[test]
    fn test_placeholders_for_missing_fields() {
        let record = bare_record();
        assert_eq!(record.subject_or_placeholder(), EmailRecord::NO_SUBJECT);
        assert_eq!(record.sender_display(), EmailRecord::UNKNOWN_SENDER);
    }

    #[test]
    fn test_present_fields_pass_through() {
        let mut record = bare_record();
        record.subject = "Quarterly Report".to_string();
        record.sender = EmailAddress::parse("Alice <a@x.com>");
        assert_eq!(record.subject_or_placeholder(), "Quarterly Report");
        assert_eq!(record.sender_display(), "Alice <a@x.com>");
    }
}
