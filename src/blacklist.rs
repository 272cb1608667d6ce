// Request-fingerprint blacklist. Matching requests are rejected with
// Forbidden before any parameter parsing or store access.

/// Case-insensitive User-Agent fragment blacklist.
#[derive(Debug, Clone, Default)]
pub struct Blacklist {
    fragments: Vec<String>,
}

impl Blacklist {
    /// Parse a comma-separated fragment list (empty entries dropped).
    pub fn from_fragments(raw: &str) -> Self {
        Blacklist {
            fragments: raw
                .split(',')
                .map(|f| f.trim().to_ascii_lowercase())
                .filter(|f| !f.is_empty())
                .collect(),
        }
    }

    pub fn is_blocked(&self, user_agent: Option<&str>) -> bool {
        let Some(ua) = user_agent else {
            return false;
        };
        let ua = ua.to_ascii_lowercase();
        self.fragments.iter().any(|f| ua.contains(f.as_str()))
    }
}
