//! Answer normalization for fuzzy comparison.

/// Substrings removed before whitespace is stripped. Matched case-sensitively,
/// so a leading "The" survives as "the" after lowercasing.
const FILLER_WORDS: [&str; 2] = [" and ", " the "];

/// Normalize an answer: drop commas and periods, drop the filler words
/// " and " / " the ", remove all whitespace, lowercase.
///
/// Normalizing an already normalized string returns it unchanged.
pub fn normalize_answer(text: &str) -> String {
    let mut normalized = text.replace([',', '.'], "");
    for filler in FILLER_WORDS {
        normalized = normalized.replace(filler, "");
    }

    normalized
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}
