//! Reply/thread composition.
//!
//! Merges the generated reply with the quoted original into one threaded
//! document with two renderings: rich HTML for preview and export, and a
//! content-equivalent plain-text form. Runs on every streamed increment and
//! once at finalization.

pub mod markup;
pub mod recipients;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::constants::QUOTE_SEPARATOR;
use crate::error::{DraftError, Result};
use crate::mail::dates::normalize_date;
use crate::mail::{EmailAddress, EmailRecord};

pub use recipients::{reply_recipients, reply_subject};

/// Generated reply plus quoted original, in two content-equivalent
/// renderings with computed recipients. Derived; recomputed from its inputs
/// on every pass.
#[derive(Debug, Clone)]
pub struct ComposedThread {
    pub subject: String,
    /// The original sender, who becomes the reply's To recipient.
    pub to: EmailAddress,
    pub cc: Vec<EmailAddress>,
    pub html: String,
    pub plain: String,
}

/// Compose the threaded reply document.
///
/// Fails only when the reply text is empty once artifacts are stripped;
/// callers degrade to [`plain_fallback`] instead of aborting the stream.
pub fn compose_thread(
    reply_text: &str,
    record: &EmailRecord,
    user_email: &str,
) -> Result<ComposedThread> {
    let cleaned = markup::strip_subject_artifacts(reply_text);
    if cleaned.trim().is_empty() {
        return Err(DraftError::Composition(
            "reply text is empty after artifact cleanup".to_string(),
        ));
    }

    let (reply_html, reply_plain) = if markup::looks_like_markup(&cleaned) {
        // Model produced markup already: preserve it, derive the plain form.
        let html = markup::remove_scripts(&cleaned);
        let plain = markup::strip_markup(&html);
        (html, plain)
    } else {
        (markup::text_to_html(&cleaned), markup::text_to_plain(&cleaned))
    };

    let html = format!(
        "<div>\n{reply_html}\n<hr>\n{}\n</div>",
        quoted_original_html(record)
    );
    let plain = format!(
        "{reply_plain}\n\n{QUOTE_SEPARATOR}\n{}",
        quoted_original_plain(record)
    );

    Ok(ComposedThread {
        subject: reply_subject(record.subject_or_placeholder()),
        to: record.sender.clone(),
        cc: reply_recipients(record, user_email),
        html,
        plain,
    })
}

/// Degraded composition used when [`compose_thread`] fails: the raw reply
/// over the quoted original, plain text on both sides.
pub fn plain_fallback(reply_text: &str, record: &EmailRecord, user_email: &str) -> ComposedThread {
    let plain = format!(
        "{}\n\n{QUOTE_SEPARATOR}\n{}",
        reply_text.trim(),
        quoted_original_plain(record)
    );

    ComposedThread {
        subject: reply_subject(record.subject_or_placeholder()),
        to: record.sender.clone(),
        cc: reply_recipients(record, user_email),
        html: format!("<pre>{}</pre>", markup::escape_html(&plain)),
        plain,
    }
}

/// Quoted-original block: header lines then the original body, as HTML.
fn quoted_original_html(record: &EmailRecord) -> String {
    let mut out = String::new();

    out.push_str(&header_line_html("From", &record.sender_display()));
    out.push_str(&header_line_html("Sent", &normalize_date(&record.date)));
    if !record.to.is_empty() {
        out.push_str(&header_line_html("To", &join_display(&record.to)));
    }
    if !record.cc.is_empty() {
        out.push_str(&header_line_html("Cc", &join_display(&record.cc)));
    }
    out.push_str(&header_line_html("Subject", record.subject_or_placeholder()));

    match &record.html_body {
        Some(html) => {
            let safe = markup::remove_scripts(html);
            out.push_str(&inline_content_ids(&safe, record));
        }
        // Per-line plain rendering with bold-span conversion.
        None => out.push_str(&markup::text_to_html(&record.body)),
    }

    out
}

/// Quoted-original block as plain text, mirroring the HTML header order.
fn quoted_original_plain(record: &EmailRecord) -> String {
    let mut out = String::new();

    out.push_str(&format!("From: {}\n", record.sender_display()));
    out.push_str(&format!("Sent: {}\n", normalize_date(&record.date)));
    if !record.to.is_empty() {
        out.push_str(&format!("To: {}\n", join_display(&record.to)));
    }
    if !record.cc.is_empty() {
        out.push_str(&format!("Cc: {}\n", join_display(&record.cc)));
    }
    out.push_str(&format!("Subject: {}\n", record.subject_or_placeholder()));
    out.push('\n');
    out.push_str(record.body.trim_end());

    out
}

/// Resolve `cid:` references against the attachment list, inlining each as a
/// self-contained data URL.
fn inline_content_ids(html: &str, record: &EmailRecord) -> String {
    let mut out = html.to_string();

    for attachment in &record.attachments {
        let Some(cid) = &attachment.content_id else {
            continue;
        };
        let marker = format!("cid:{cid}");
        if !out.contains(&marker) {
            continue;
        }
        let data_url = format!(
            "data:{};base64,{}",
            mime_for_filename(&attachment.filename),
            STANDARD.encode(&attachment.data)
        );
        out = out.replace(&marker, &data_url);
    }

    out
}

/// Image MIME type by extension, with a fixed fallback for anything
/// unrecognized.
fn mime_for_filename(filename: &str) -> &'static str {
    let extension = filename
        .rsplit('.')
        .next()
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        _ => "image/jpeg",
    }
}

fn header_line_html(label: &str, value: &str) -> String {
    format!(
        "<p><strong>{label}:</strong> {}</p>\n",
        markup::escape_html(value)
    )
}

fn join_display(addresses: &[EmailAddress]) -> String {
    addresses
        .iter()
        .map(|a| a.display())
        .collect::<Vec<_>>()
        .join(", ")
}
