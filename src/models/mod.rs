// src/models/mod.rs

use serde::Deserialize;

pub mod chapter;
pub mod question;
pub mod quiz;
pub mod score;
pub mod subject;
pub mod summary;
pub mod user;

/// Query parameters for the `/search` endpoints (`?search=keyword`).
#[derive(Debug, Deserialize, Default)]
pub struct SearchParams {
    pub search: Option<String>,
}

impl SearchParams {
    /// ILIKE pattern matching the keyword anywhere; an absent keyword matches all.
    pub fn pattern(&self) -> String {
        let keyword = self.search.as_deref().unwrap_or("").trim();
        let escaped = keyword
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        format!("%{}%", escaped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_pattern_escapes_wildcards() {
        let params = SearchParams {
            search: Some(" 50%_off ".to_string()),
        };
        assert_eq!(params.pattern(), "%50\\%\\_off%");
        assert_eq!(SearchParams::default().pattern(), "%%");
    }
}
