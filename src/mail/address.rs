//! Email address parsing and normalized comparison.

/// One mailbox: an optional display name plus the bare address.
///
/// `"Jane Doe <jane@x.com>"` parses to `display_name = "Jane Doe"`,
/// `address = "jane@x.com"`; a bare `"jane@x.com"` has an empty name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress {
    pub display_name: String,
    pub address: String,
}

impl EmailAddress {
    /// Parse a single mailbox from a header-style value.
    ///
    /// Accepts `addr`, `<addr>`, `Name <addr>` and `"Quoted, Name" <addr>`.
    /// Anything unparseable is kept verbatim in `address` so nothing is lost.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::empty();
        }

        if let (Some(open), Some(close)) = (trimmed.rfind('<'), trimmed.rfind('>'))
            && close > open
        {
            let address = trimmed[open + 1..close].trim().to_string();
            let display_name = unquote(&trimmed[..open]);
            return Self {
                display_name,
                address,
            };
        }

        Self {
            display_name: String::new(),
            address: unquote(trimmed),
        }
    }

    pub fn empty() -> Self {
        Self {
            display_name: String::new(),
            address: String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.display_name.is_empty() && self.address.is_empty()
    }

    /// Lowercased bare address used for equality checks.
    /// Display name and quoting never participate in comparison.
    pub fn normalized(&self) -> String {
        self.address.trim().trim_matches(['"', '\'']).to_lowercase()
    }

    /// Case-insensitive, decoration-insensitive address equality.
    pub fn same_address(&self, other: &EmailAddress) -> bool {
        let mine = self.normalized();
        !mine.is_empty() && mine == other.normalized()
    }

    /// Format for display: `"Name <addr>"`, or just the address.
    pub fn display(&self) -> String {
        if self.display_name.is_empty() {
            self.address.clone()
        } else {
            format!("{} <{}>", self.display_name, self.address)
        }
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

fn unquote(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}
