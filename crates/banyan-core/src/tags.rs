//! Tag-line parsing and formatting.
//!
//! Tags arrive from clients as a free-form line ("rust, async tokio")
//! and are stored one row per (tag, header). Parsing splits on commas
//! and whitespace, trims, drops empties, and deduplicates while
//! preserving first-seen order and case.

/// Parse a tag line into individual tags.
pub fn parse_tag_line(line: &str) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for raw in line.split(|c: char| c == ',' || c.is_whitespace()) {
        let tag = raw.trim();
        if tag.is_empty() {
            continue;
        }
        if !seen.iter().any(|t| t == tag) {
            seen.push(tag.to_string());
        }
    }
    seen
}

/// Join tags back into the canonical display line.
pub fn format_tag_line(tags: &[String]) -> String {
    tags.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_comma_separated() {
        assert_eq!(parse_tag_line("rust, async, tokio"), vec!["rust", "async", "tokio"]);
    }

    #[test]
    fn test_parse_space_separated() {
        assert_eq!(parse_tag_line("rust async tokio"), vec!["rust", "async", "tokio"]);
    }

    #[test]
    fn test_parse_mixed_separators_and_padding() {
        assert_eq!(parse_tag_line("  rust,,  async ,tokio  "), vec!["rust", "async", "tokio"]);
    }

    #[test]
    fn test_parse_deduplicates_preserving_order() {
        assert_eq!(parse_tag_line("b a b c a"), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_parse_preserves_case() {
        // Tags are case-preserving; "Rust" and "rust" are distinct rows.
        assert_eq!(parse_tag_line("Rust rust"), vec!["Rust", "rust"]);
    }

    #[test]
    fn test_parse_empty_line() {
        assert!(parse_tag_line("").is_empty());
        assert!(parse_tag_line("  , ,  ").is_empty());
    }

    #[test]
    fn test_format_round_trip() {
        let tags = parse_tag_line("one two three");
        assert_eq!(format_tag_line(&tags), "one two three");
    }
}
