//! Draft export: serialize a composed thread as a downloadable draft `.eml`.
//!
//! The draft is multipart/alternative with the plain and rich renderings
//! under one shared boundary, flagged `X-Unsent: 1` so mail clients open it
//! as an editable unsent message.

use chrono::Local;
use mail_builder::MessageBuilder;
use mail_builder::headers::address::Address;
use mail_builder::headers::raw::Raw;

use crate::compose::ComposedThread;
use crate::config::IdentityConfig;
use crate::error::{DraftError, Result};
use crate::mail::EmailAddress;

pub const DRAFT_EXTENSION: &str = "eml";

/// From header used when no identity is configured.
const DEFAULT_FROM: (&str, &str) = ("Redraft", "drafts@redraft.invalid");

/// Serialize the draft message. The Date header is written at serialization
/// time, which is the generation time.
pub fn draft_eml(thread: &ComposedThread, identity: &IdentityConfig) -> Result<String> {
    let mut builder = MessageBuilder::new();

    builder = if identity.email.trim().is_empty() {
        builder.from(DEFAULT_FROM)
    } else if identity.name.trim().is_empty() {
        builder.from(Address::new_address(None::<&str>, identity.email.trim()))
    } else {
        builder.from(Address::new_address(
            Some(identity.name.trim()),
            identity.email.trim(),
        ))
    };

    builder = builder.to(mailbox(&thread.to));
    if !thread.cc.is_empty() {
        builder = builder.cc(Address::new_list(
            thread.cc.iter().map(mailbox).collect(),
        ));
    }

    builder
        .subject(thread.subject.as_str())
        .header("X-Unsent", Raw::new("1"))
        .text_body(thread.plain.as_str())
        .html_body(wrap_html_document(&thread.html))
        .write_to_string()
        .map_err(|e| DraftError::Composition(format!("failed to serialize draft: {e}")))
}

/// Filename for the exported draft: sanitized subject plus a timestamp.
pub fn draft_filename(subject: &str) -> String {
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    format!(
        "Draft_{}_{stamp}.{DRAFT_EXTENSION}",
        sanitize_filename_part(subject)
    )
}

fn mailbox(address: &EmailAddress) -> Address<'_> {
    if address.display_name.is_empty() {
        Address::new_address(None::<&str>, address.address.as_str())
    } else {
        Address::new_address(
            Some(address.display_name.as_str()),
            address.address.as_str(),
        )
    }
}

/// Minimal self-contained document around the rich rendering.
fn wrap_html_document(body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Email Reply Draft</title>\n\
<style>\nbody {{ font-family: Calibri, Arial, sans-serif; font-size: 11pt; color: #000; }}\n\
a {{ color: #0563C1; }}\n</style>\n</head>\n<body>\n{body}\n</body>\n</html>\n"
    )
}

/// Keep alphanumerics, map runs of anything else to single underscores.
fn sanitize_filename_part(subject: &str) -> String {
    let mut out = String::new();
    let mut last_underscore = false;

    for c in subject.chars().take(80) {
        if c.is_alphanumeric() {
            out.push(c);
            last_underscore = false;
        } else if !last_underscore && !out.is_empty() {
            out.push('_');
            last_underscore = true;
        }
    }

    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "Email_Reply".to_string()
    } else {
        trimmed.to_string()
    }
}
