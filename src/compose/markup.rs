//! Narrow markup utility: plain text to block-level HTML and back.
//!
//! Supports the constructs replies actually use: paragraphs, `**bold**`
//! spans, bullet lists and line breaks. [`strip_markup`] is the definition
//! of content equivalence between the rich and plain renderings.

use crate::constants::QUOTE_SEPARATOR;

/// True when the text already contains tag-like markup.
pub fn looks_like_markup(text: &str) -> bool {
    for (idx, _) in text.match_indices('<') {
        let rest = &text[idx + 1..];
        let tag_start = rest
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '/');
        if tag_start && rest.contains('>') {
            return true;
        }
    }
    false
}

/// Convert plain reply text to block-level HTML.
///
/// Double newlines split paragraphs, single newlines become `<br>`, bullet
/// paragraphs become `<ul>` lists and `**bold**` pairs become `<strong>`.
pub fn text_to_html(text: &str) -> String {
    let mut blocks = Vec::new();

    for paragraph in text.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }

        if is_bullet_block(paragraph) {
            let items: String = paragraph
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(|line| format!("<li>{}</li>", bold_spans(&escape_html(strip_bullet(line)))))
                .collect();
            blocks.push(format!("<ul>{items}</ul>"));
        } else {
            let lines: Vec<String> = paragraph
                .lines()
                .map(|line| bold_spans(&escape_html(line.trim_end())))
                .collect();
            blocks.push(format!("<p>{}</p>", lines.join("<br>")));
        }
    }

    blocks.join("\n")
}

/// Normalize plain reply text: trimmed paragraphs, `-` bullets, bold
/// markers removed. The plain counterpart of [`text_to_html`].
pub fn text_to_plain(text: &str) -> String {
    let mut blocks = Vec::new();

    for paragraph in text.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }

        let lines: Vec<String> = paragraph
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                if is_bullet_line(line) {
                    format!("- {}", strip_bold_markers(strip_bullet(line)))
                } else {
                    strip_bold_markers(line.trim_end())
                }
            })
            .collect();
        blocks.push(lines.join("\n"));
    }

    blocks.join("\n\n")
}

/// Convert `**bold**` pairs to `<strong>` spans. Unpaired markers stay
/// literal.
pub fn bold_spans(text: &str) -> String {
    let mut out = String::new();
    let mut rest = text;

    while let Some(open) = rest.find("**") {
        let after = &rest[open + 2..];
        let Some(close) = after.find("**") else {
            break;
        };
        out.push_str(&rest[..open]);
        out.push_str("<strong>");
        out.push_str(&after[..close]);
        out.push_str("</strong>");
        rest = &after[close + 2..];
    }

    out.push_str(rest);
    out
}

/// Remove `**bold**` marker pairs, keeping the content.
pub fn strip_bold_markers(text: &str) -> String {
    let mut out = String::new();
    let mut rest = text;

    while let Some(open) = rest.find("**") {
        let after = &rest[open + 2..];
        let Some(close) = after.find("**") else {
            break;
        };
        out.push_str(&rest[..open]);
        out.push_str(&after[..close]);
        rest = &after[close + 2..];
    }

    out.push_str(rest);
    out
}

/// Remove artifact subject lines a model sometimes echoes at the top of a
/// reply ("Subject: ..." or "RE: ...").
pub fn strip_subject_artifacts(text: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut leading = true;

    for line in text.lines() {
        if leading {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let lower = trimmed.to_lowercase();
            if lower.starts_with("subject:") || lower.starts_with("re:") {
                continue;
            }
            leading = false;
        }
        kept.push(line);
    }

    kept.join("\n").trim_end().to_string()
}

/// Escape text content for embedding in HTML.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Strip tags and decode entities, producing the plain equivalent of a rich
/// rendering. `<br>` and closing blocks become newlines, `<li>` becomes a
/// `-` bullet and `<hr>` becomes the quote separator line.
pub fn strip_markup(html: &str) -> String {
    let html = remove_scripts(html);
    let mut out = String::new();
    let mut rest = html.as_str();

    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        let Some(rel) = rest[open..].find('>') else {
            out.push_str(&rest[open..]);
            rest = "";
            break;
        };

        let tag_body = &rest[open + 1..open + rel];
        let closing = tag_body.starts_with('/');
        let name = tag_body
            .trim_start_matches('/')
            .split([' ', '\t', '\n', '\r', '/'])
            .next()
            .unwrap_or("")
            .to_lowercase();

        match (name.as_str(), closing) {
            ("br", _) => out.push('\n'),
            ("hr", _) => {
                out.push('\n');
                out.push_str(QUOTE_SEPARATOR);
                out.push('\n');
            }
            ("li", false) => out.push_str("- "),
            ("li", true) => out.push('\n'),
            ("p" | "div" | "ul" | "ol" | "h1" | "h2" | "h3" | "tr", true) => out.push_str("\n\n"),
            _ => {}
        }

        rest = &rest[open + rel + 1..];
    }
    out.push_str(rest);

    collapse_blank_lines(&decode_entities(&out))
}

/// Drop `<script>` blocks, case-insensitively. An unterminated block drops
/// the rest of the input.
pub fn remove_scripts(html: &str) -> String {
    let mut out = String::new();
    let mut rest = html;

    loop {
        let Some(start) = find_ignore_ascii_case(rest, "<script") else {
            out.push_str(rest);
            break;
        };
        out.push_str(&rest[..start]);
        match find_ignore_ascii_case(&rest[start..], "</script>") {
            Some(rel) => rest = &rest[start + rel + "</script>".len()..],
            None => break,
        }
    }

    out
}

fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    let haystack = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn collapse_blank_lines(text: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut blank_run = 0;

    for line in text.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run == 1 {
                out.push("");
            }
        } else {
            blank_run = 0;
            out.push(line);
        }
    }

    out.join("\n").trim().to_string()
}

fn is_bullet_block(paragraph: &str) -> bool {
    paragraph
        .lines()
        .next()
        .is_some_and(|line| is_bullet_line(line))
}

fn is_bullet_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("- ")
        || trimmed.starts_with("* ")
        || trimmed.starts_with("• ")
        || trimmed == "-"
        || trimmed == "*"
}

fn strip_bullet(line: &str) -> &str {
    let trimmed = line.trim();
    trimmed
        .strip_prefix("- ")
        .or_else(|| trimmed.strip_prefix("* "))
        .or_else(|| trimmed.strip_prefix("• "))
        .unwrap_or(trimmed)
        .trim_start()
}
