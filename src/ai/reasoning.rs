//! Splits the delimited reasoning segment out of streamed reply text.
//!
//! Some models prefix their answer with a `<think>...</think>` block. The
//! block is shown in its own display and never enters composition or export.

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

/// Separate the user-visible reply from the optional reasoning segment.
///
/// While the closing tag has not streamed in yet, everything after the
/// opening tag counts as reasoning so both displays stay live mid-stream.
pub fn split_reasoning(text: &str) -> (String, Option<String>) {
    let Some(start) = text.find(THINK_OPEN) else {
        return (text.trim().to_string(), None);
    };

    let after_open = start + THINK_OPEN.len();
    match text[after_open..].find(THINK_CLOSE) {
        Some(rel) => {
            let close = after_open + rel;
            let reasoning = text[after_open..close].trim();
            let mut visible = text[..start].to_string();
            visible.push_str(&text[close + THINK_CLOSE.len()..]);
            (visible.trim().to_string(), non_empty(reasoning))
        }
        None => {
            let reasoning = text[after_open..].trim();
            (text[..start].trim().to_string(), non_empty(reasoning))
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_reasoning_passes_through() {
        let (visible, reasoning) = split_reasoning("Dear Bob,\n\nThanks.");
        assert_eq!(visible, "Dear Bob,\n\nThanks.");
        assert!(reasoning.is_none());
    }

    #[test]
    fn test_complete_block_is_split_out() {
        let (visible, reasoning) =
            split_reasoning("<think>they want brevity</think>\n\nDear Bob,");
        assert_eq!(visible, "Dear Bob,");
        assert_eq!(reasoning.as_deref(), Some("they want brevity"));
    }

    #[test]
    fn test_open_block_while_streaming() {
        let (visible, reasoning) = split_reasoning("<think>still working throu");
        assert!(visible.is_empty());
        assert_eq!(reasoning.as_deref(), Some("still working throu"));
    }

    #[test]
    fn test_empty_block_yields_no_reasoning() {
        let (visible, reasoning) = split_reasoning("<think></think>Dear Bob,");
        assert_eq!(visible, "Dear Bob,");
        assert!(reasoning.is_none());
    }
}
