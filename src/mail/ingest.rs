//! Document ingestion: upload validation and the message parser adapter.
//!
//! The parser behind [`DocumentParser`] is an external collaborator as far
//! as the drafting core is concerned. [`EmlParser`] is the built-in adapter
//! for RFC 5322 messages; a proprietary-format parser plugs in through the
//! same trait.

use std::path::Path;

use mail_parser::{MessageParser, MimeHeaders, PartType};

use crate::constants::{MAX_UPLOAD_MB, PLAIN_WRAP_WIDTH};
use crate::error::{DraftError, Result};

use super::address::EmailAddress;
use super::dates::{UNKNOWN_DATE, canonical_from_timestamp};
use super::record::{AttachmentData, EmailRecord};

/// Turns one binary message payload into an [`EmailRecord`].
pub trait DocumentParser {
    /// Lowercase file extensions this parser accepts.
    fn extensions(&self) -> &'static [&'static str];

    /// Parse the payload. Implementations degrade gracefully on broken
    /// character encodings (set `encoding_issues`) whenever any content is
    /// recoverable, and only fail when nothing is.
    fn parse(&self, payload: &[u8]) -> Result<EmailRecord>;
}

/// Reject unsupported or oversized uploads before any parsing happens.
pub fn validate_upload(filename: &str, size: u64, parser: &dyn DocumentParser) -> Result<()> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    if !parser.extensions().contains(&extension.as_str()) {
        return Err(DraftError::Ingestion(format!(
            "unsupported file type '.{extension}', expected one of: {}",
            parser
                .extensions()
                .iter()
                .map(|e| format!(".{e}"))
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }

    let limit = MAX_UPLOAD_MB * 1024 * 1024;
    if size > limit {
        return Err(DraftError::Ingestion(format!(
            "file size {:.2} MB exceeds the {MAX_UPLOAD_MB} MB limit",
            size as f64 / (1024.0 * 1024.0)
        )));
    }

    Ok(())
}

/// Adapter for RFC 5322 `.eml` messages, built on mail-parser.
#[derive(Debug, Default)]
pub struct EmlParser;

impl DocumentParser for EmlParser {
    fn extensions(&self) -> &'static [&'static str] {
        &["eml"]
    }

    fn parse(&self, payload: &[u8]) -> Result<EmailRecord> {
        let message = MessageParser::default()
            .parse(payload)
            .ok_or_else(|| DraftError::Ingestion("not a parseable message".to_string()))?;

        // The parser is lenient; require at least one recognizable header
        // before treating the payload as a mail message.
        let has_headers = message.from().is_some()
            || message.to().is_some()
            || message.subject().is_some()
            || message.date().is_some();
        if !has_headers {
            return Err(DraftError::Ingestion(
                "not a recognizable mail message".to_string(),
            ));
        }

        let subject = message.subject().map(|s| s.to_string()).unwrap_or_default();

        let date = message
            .date()
            .map(|d| canonical_from_timestamp(d.to_timestamp()))
            .unwrap_or_else(|| UNKNOWN_DATE.to_string());

        let to = collect_addresses(message.to());
        let cc = collect_addresses(message.cc());

        let text = extract_text_body(&message);
        let html_body = extract_html_body(&message);

        let body = match (&text, &html_body) {
            (Some(text), _) => text.clone(),
            (None, Some(html)) => html2text::from_read(html.as_bytes(), PLAIN_WRAP_WIDTH),
            (None, None) => String::new(),
        };

        let attachments = collect_attachments(&message);

        if body.is_empty() && html_body.is_none() && attachments.is_empty() {
            return Err(DraftError::Ingestion(
                "message contains no recoverable content".to_string(),
            ));
        }

        let encoding_issues = has_replacement_chars(&body)
            || html_body.as_deref().is_some_and(has_replacement_chars);

        let sender = resolve_sender(&message, &body);

        Ok(EmailRecord {
            sender,
            subject,
            date,
            body,
            html_body,
            to,
            cc,
            attachments,
            encoding_issues,
        })
    }
}

/// Best-effort sender resolution.
///
/// Order: the structured From field, then an address embedded in the display
/// string, then the first address-shaped token in the body. Structured data
/// always wins over text scanning.
fn resolve_sender(message: &mail_parser::Message, body: &str) -> EmailAddress {
    let from = message.from().and_then(|a| a.first());

    let display_name = from
        .and_then(|f| f.name())
        .map(|n| n.trim().trim_matches('"').to_string())
        .unwrap_or_default();

    if let Some(address) = from.and_then(|f| f.address()) {
        return EmailAddress {
            display_name,
            address: address.to_string(),
        };
    }

    if let Some(address) = find_address_token(&display_name) {
        let name = display_name
            .replace(&format!("<{address}>"), "")
            .replace(&address, "")
            .trim()
            .trim_matches('"')
            .to_string();
        return EmailAddress {
            display_name: name,
            address,
        };
    }

    if let Some(address) = find_address_token(body) {
        return EmailAddress {
            display_name,
            address,
        };
    }

    EmailAddress {
        display_name,
        address: String::new(),
    }
}

/// First token that looks like a mail address: `local@domain.tld`.
fn find_address_token(text: &str) -> Option<String> {
    for token in text.split([' ', '\t', '\n', '\r', '<', '>', ',', ';', '(', ')']) {
        let candidate = token.trim_matches(['"', '\'', '.', ':']);
        if let Some((local, domain)) = candidate.split_once('@')
            && !local.is_empty()
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
        {
            return Some(candidate.to_string());
        }
    }
    None
}

fn collect_addresses(addresses: Option<&mail_parser::Address>) -> Vec<EmailAddress> {
    let Some(addresses) = addresses else {
        return Vec::new();
    };

    addresses
        .iter()
        .filter_map(|addr| {
            let address = addr.address()?.to_string();
            Some(EmailAddress {
                display_name: addr.name().map(|n| n.trim().to_string()).unwrap_or_default(),
                address,
            })
        })
        .collect()
}

fn collect_attachments(message: &mail_parser::Message) -> Vec<AttachmentData> {
    message
        .attachments()
        .map(|part| AttachmentData {
            filename: part
                .attachment_name()
                .unwrap_or("attachment")
                .to_string(),
            data: part.contents().to_vec(),
            content_id: part.content_id().map(|id| id.to_string()),
        })
        .collect()
}

fn extract_text_body(message: &mail_parser::Message) -> Option<String> {
    for part in message.text_bodies() {
        if let PartType::Text(text) = &part.body {
            return Some(text.to_string());
        }
    }
    None
}

fn extract_html_body(message: &mail_parser::Message) -> Option<String> {
    for part in message.html_bodies() {
        if let PartType::Html(html) = &part.body {
            return Some(html.to_string());
        }
    }
    None
}

fn has_replacement_chars(text: &str) -> bool {
    text.contains('\u{FFFD}')
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = b"From: Alice <a@x.com>\r\n\
To: Bob <b@x.com>\r\n\
Cc: Alice <a@x.com>, Carol <c@x.com>\r\n\
Subject: Quarterly Report\r\n\
Date: Tue, 3 Jun 2025 18:26:00 +0800\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Please review the attached numbers before Friday.\r\n";

    #[test]
    fn test_parse_plain_message() {
        let record = EmlParser.parse(SAMPLE).unwrap();
        assert_eq!(record.sender.address, "a@x.com");
        assert_eq!(record.sender.display_name, "Alice");
        assert_eq!(record.subject, "Quarterly Report");
        assert_eq!(record.to.len(), 1);
        assert_eq!(record.cc.len(), 2);
        assert!(record.body.contains("review the attached numbers"));
        assert!(record.html_body.is_none());
        assert!(!record.encoding_issues);
    }

    #[test]
    fn test_parse_date_is_canonical() {
        let record = EmlParser.parse(SAMPLE).unwrap();
        // 18:26 +0800 is 10:26 UTC.
        assert_eq!(record.date, "Tuesday, June 3, 2025 10:26 AM");
    }

    #[test]
    fn test_html_only_message_gets_plain_body() {
        let raw = b"From: a@x.com\r\n\
Subject: Hi\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<html><body><p>Hello <b>there</b></p></body></html>\r\n";
        let record = EmlParser.parse(raw).unwrap();
        assert!(record.html_body.is_some());
        assert!(record.body.contains("Hello"));
    }

    #[test]
    fn test_garbage_payload_is_rejected() {
        assert!(EmlParser.parse(&[0x84, 0x85, 0x86, 0x87]).is_err());
    }

    #[test]
    fn test_validate_upload_extension() {
        let err = validate_upload("mail.txt", 100, &EmlParser).unwrap_err();
        assert!(matches!(err, DraftError::Ingestion(_)));
        assert!(validate_upload("mail.eml", 100, &EmlParser).is_ok());
        assert!(validate_upload("MAIL.EML", 100, &EmlParser).is_ok());
    }

    #[test]
    fn test_validate_upload_size_cap() {
        let over = MAX_UPLOAD_MB * 1024 * 1024 + 1;
        assert!(validate_upload("mail.eml", over, &EmlParser).is_err());
    }

    #[test]
    fn test_sender_fallback_scans_body() {
        let raw = b"Subject: No sender header\r\n\
Content-Type: text/plain\r\n\
\r\n\
Regards,\r\nDave (dave@corp.example.com)\r\n";
        let record = EmlParser.parse(raw).unwrap();
        assert_eq!(record.sender.address, "dave@corp.example.com");
    }

    #[test]
    fn test_find_address_token() {
        assert_eq!(
            find_address_token("reach me at jane@x.com, thanks"),
            Some("jane@x.com".to_string())
        );
        assert_eq!(find_address_token("no address here"), None);
        assert_eq!(find_address_token("broken@nodot"), None);
    }
}
