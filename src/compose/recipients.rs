//! Reply subject and recipient computation.

use crate::mail::{EmailAddress, EmailRecord};

/// Prefix the reply subject with "RE: " unless it is already there.
/// Idempotent and case-insensitive ("re:", "Re:", "RE:" all count).
pub fn reply_subject(original: &str) -> String {
    let subject = original.trim();
    let subject = if subject.is_empty() {
        EmailRecord::NO_SUBJECT
    } else {
        subject
    };

    if subject.to_lowercase().starts_with("re:") {
        subject.to_string()
    } else {
        format!("RE: {subject}")
    }
}

/// Compute the reply Cc set: everyone on the original To and Cc lists,
/// minus the original sender (they become the To recipient), minus the
/// current user, de-duplicated by normalized address.
pub fn reply_recipients(record: &EmailRecord, user_email: &str) -> Vec<EmailAddress> {
    let user = EmailAddress::parse(user_email);
    let mut seen: Vec<String> = Vec::new();
    let mut recipients = Vec::new();

    for recipient in record.to.iter().chain(record.cc.iter()) {
        let normalized = recipient.normalized();
        if normalized.is_empty() {
            continue;
        }
        if recipient.same_address(&record.sender) {
            continue;
        }
        if recipient.same_address(&user) {
            continue;
        }
        if seen.contains(&normalized) {
            continue;
        }
        seen.push(normalized);
        recipients.push(recipient.clone());
    }

    recipients
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(sender: &str, to: &[&str], cc: &[&str]) -> EmailRecord {
        EmailRecord {
            sender: EmailAddress::parse(sender),
            subject: "Quarterly Report".to_string(),
            date: "Unknown".to_string(),
            body: String::new(),
            html_body: None,
            to: to.iter().map(|a| EmailAddress::parse(a)).collect(),
            cc: cc.iter().map(|a| EmailAddress::parse(a)).collect(),
            attachments: Vec::new(),
            encoding_issues: false,
        }
    }

    #[test]
    fn test_reply_subject_prefixes_once() {
        assert_eq!(reply_subject("Quarterly Report"), "RE: Quarterly Report");
        assert_eq!(reply_subject("RE: Quarterly Report"), "RE: Quarterly Report");
        assert_eq!(reply_subject("re: Quarterly Report"), "re: Quarterly Report");
        // Applying it twice changes nothing.
        assert_eq!(
            reply_subject(&reply_subject("Quarterly Report")),
            "RE: Quarterly Report"
        );
    }

    #[test]
    fn test_reply_subject_missing_falls_back_to_placeholder() {
        assert_eq!(reply_subject("  "), "RE: (No Subject)");
    }

    #[test]
    fn test_excludes_sender_and_user() {
        let record = record(
            "Alice <a@x.com>",
            &["Bob <b@x.com>"],
            &["Alice <a@x.com>", "Carol <c@x.com>"],
        );
        let recipients = reply_recipients(&record, "Bob <b@x.com>");
        assert_eq!(recipients.len(), 1);
        assert_eq!(recipients[0].address, "c@x.com");
    }

    #[test]
    fn test_deduplicates_by_normalized_address() {
        let record = record(
            "Alice <a@x.com>",
            &["Carol <C@X.com>", "carol@x.com"],
            &["\"Carol D\" <carol@x.com>"],
        );
        let recipients = reply_recipients(&record, "b@x.com");
        assert_eq!(recipients.len(), 1);
    }

    #[test]
    fn test_user_match_is_case_insensitive() {
        let record = record("Alice <a@x.com>", &["Bob <Bob@X.com>", "Carol <c@x.com>"], &[]);
        let recipients = reply_recipients(&record, "bob@x.com");
        assert_eq!(recipients.len(), 1);
        assert_eq!(recipients[0].address, "c@x.com");
    }

    #[test]
    fn test_idempotent_on_result() {
        let record = record("Alice <a@x.com>", &["Bob <b@x.com>"], &["Carol <c@x.com>"]);
        let first = reply_recipients(&record, "b@x.com");
        // Feeding the computed set back through the same exclusions keeps it
        // stable.
        let mut second_record = record.clone();
        second_record.to = first.clone();
        second_record.cc = Vec::new();
        let second = reply_recipients(&second_record, "b@x.com");
        assert_eq!(first, second);
    }
}
