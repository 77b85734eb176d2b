//! Filesystem-safe identifiers derived from display names

use regex::Regex;
use std::sync::OnceLock;

fn separators() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\s\-.:]").expect("static regex"))
}

fn non_word() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w]").expect("static regex"))
}

/// Turn a display name into a uuid usable as a file or directory name.
///
/// Separators (whitespace, `-`, `.`, `:`) become `_`, every other non-word
/// character is dropped and the result is lowercased. A leading digit gets a
/// `letter_` prefix so the identifier is also a valid module name.
pub fn clean_name(name: &str) -> String {
    let trimmed: String = name
        .chars()
        .filter(|c| !matches!(c, '\u{feff}' | '\u{200b}' | '\n' | '\t'))
        .collect();
    let underscored = separators().replace_all(trimmed.trim(), "_");
    let cleaned = non_word().replace_all(&underscored, "").to_lowercase();

    match cleaned.chars().next() {
        Some(c) if c.is_ascii_digit() => format!("letter_{}", cleaned),
        _ => cleaned,
    }
}
