use regex::Regex;
use std::sync::LazyLock;

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").expect("valid word regex"));

/// Lead-in words that models use to announce their answer ("Here is your chapter:").
const PREAMBLE_LEAD_INS: &[&str] = &["Here"];

/// Drops a leading "Here is ...:" line. Text without a line break is left alone.
pub fn strip_preamble(text: &str) -> &str {
    let Some((first, rest)) = text.split_once('\n') else {
        return text;
    };
    let announces = PREAMBLE_LEAD_INS.iter().any(|lead| {
        first
            .strip_prefix(lead)
            .is_some_and(|after| !after.starts_with(|c: char| c.is_alphanumeric()))
    });
    if announces && first.trim().ends_with(':') {
        rest
    } else {
        text
    }
}

/// Number of `\w+` tokens. Empty input counts as zero.
pub fn word_count(text: &str) -> usize {
    WORD.find_iter(text).count()
}

/// Builds a file stem from a book title: whitespace runs become `_`. Letters and
/// digits of any script are kept along with `_`, `-` and `.`; separators, quotes
/// and other punctuation are dropped.
pub fn sanitize_file_stem(title: &str) -> String {
    let stem = title
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    let stem = stem.trim_matches('.');
    if stem.is_empty() {
        "book".to_string()
    } else {
        stem.to_string()
    }
}
