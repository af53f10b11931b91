//! Prompt assembly for reply generation.

use crate::config::IdentityConfig;
use crate::constants::CHARS_PER_TOKEN;
use crate::mail::EmailRecord;

/// Default reply-writing instructions, used whenever the configured
/// instructions are blank.
pub const DEFAULT_INSTRUCTIONS: &str = r#"You are an expert email assistant. Write professional email replies that incorporate the provided key messages.

FORMATTING REQUIREMENTS:
- Use British English spelling and grammar throughout
- Write only the email body content (no subject line)
- Use a professional greeting and closing with the sender's name
- Include proper paragraph spacing for readability
- Bold critical or actionable parts of the reply using **double asterisks**

CONTENT REQUIREMENTS:
- Address all key messages naturally in the email body
- Maintain a professional tone appropriate to the context
- Do not repeat or quote the original email content
- Ensure the response reflects the sender's professional identity"#;

/// Configured instructions with fallback to the defaults when blank.
pub fn effective_instructions(custom: &str) -> &str {
    let trimmed = custom.trim();
    if trimmed.is_empty() {
        DEFAULT_INSTRUCTIONS
    } else {
        trimmed
    }
}

/// Build the system turn: identity context, instructions and the original
/// email, with the body truncated to an approximate token budget.
pub fn system_context(
    record: &EmailRecord,
    identity: &IdentityConfig,
    instructions: &str,
    email_token_limit: usize,
) -> String {
    let mut context = String::new();

    if !identity.name.trim().is_empty() {
        context.push_str(&format!(
            "You are responding as: {}\n\n",
            identity.name.trim()
        ));
    }

    context.push_str(effective_instructions(instructions));
    context.push_str("\n\nOriginal Email:\n");
    context.push_str(&format!("From: {}\n", record.sender_display()));

    if !record.to.is_empty() {
        context.push_str(&format!("To: {}\n", join_addresses(&record.to)));
    }
    if !record.cc.is_empty() {
        context.push_str(&format!("Cc: {}\n", join_addresses(&record.cc)));
    }

    context.push_str(&format!("Subject: {}\n", record.subject_or_placeholder()));
    context.push_str(&format!("Date: {}\n\n", record.date));
    context.push_str(&truncate_context(&record.body, email_token_limit));

    context
}

/// Build the initial user turn from the key messages.
pub fn key_messages_turn(key_messages: &str) -> String {
    format!("Key Messages to Include:\n{}", key_messages.trim())
}

/// Truncate to roughly `token_limit` tokens, cutting at a word boundary when
/// one falls in the last fifth of the budget.
pub fn truncate_context(text: &str, token_limit: usize) -> String {
    if token_limit == 0 {
        return text.to_string();
    }

    let char_limit = token_limit * CHARS_PER_TOKEN;
    if text.chars().count() <= char_limit {
        return text.to_string();
    }

    let cut = text
        .char_indices()
        .nth(char_limit)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let mut truncated = &text[..cut];

    if let Some(space) = truncated.rfind(' ')
        && space > char_limit * 4 / 5
    {
        truncated = &truncated[..space];
    }

    format!("{truncated}...[content truncated]")
}

fn join_addresses(addresses: &[crate::mail::EmailAddress]) -> String {
    addresses
        .iter()
        .map(|a| a.display())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::EmailAddress;

    fn record() -> EmailRecord {
        EmailRecord {
            sender: EmailAddress::parse("Alice <a@x.com>"),
            subject: "Quarterly Report".to_string(),
            date: "Tuesday, June 3, 2025 6:26 PM".to_string(),
            body: "Please review the numbers.".to_string(),
            html_body: None,
            to: vec![EmailAddress::parse("Bob <b@x.com>")],
            cc: Vec::new(),
            attachments: Vec::new(),
            encoding_issues: false,
        }
    }

    fn identity() -> IdentityConfig {
        IdentityConfig {
            name: "Bob".to_string(),
            email: "b@x.com".to_string(),
        }
    }

    #[test]
    fn test_system_context_contains_identity_and_email() {
        let context = system_context(&record(), &identity(), "", 2000);
        assert!(context.starts_with("You are responding as: Bob"));
        assert!(context.contains(DEFAULT_INSTRUCTIONS));
        assert!(context.contains("From: Alice <a@x.com>"));
        assert!(context.contains("Subject: Quarterly Report"));
        assert!(context.contains("Please review the numbers."));
    }

    #[test]
    fn test_blank_instructions_fall_back_to_defaults() {
        assert_eq!(effective_instructions("   "), DEFAULT_INSTRUCTIONS);
        assert_eq!(effective_instructions("custom"), "custom");
    }

    #[test]
    fn test_truncation_marks_cut_content() {
        let long = "word ".repeat(5000);
        let truncated = truncate_context(&long, 100);
        assert!(truncated.ends_with("...[content truncated]"));
        assert!(truncated.len() < long.len());
    }

    #[test]
    fn test_short_content_untouched() {
        assert_eq!(truncate_context("short body", 2000), "short body");
    }

    #[test]
    fn test_key_messages_turn() {
        let turn = key_messages_turn("confirm the deadline\n");
        assert_eq!(turn, "Key Messages to Include:\nconfirm the deadline");
    }
}
