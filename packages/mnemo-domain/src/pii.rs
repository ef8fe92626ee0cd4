use regex::Regex;

/// Longest excerpt of source text allowed into a classification prompt.
pub const CLASSIFICATION_EXCERPT_CHARS: usize = 500;

/// Unambiguous personal-information patterns: email addresses, phone
/// numbers, and national-id-like digit groups. A hit here decides retention
/// without any generation call.
pub fn matches_pii_pattern(text: &str) -> bool {
	let patterns = [
		r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
		r"\+?\d{2,3}[-.\s]\d{3,4}[-.\s]\d{4}",
		r"\b\d{6}-\d{7}\b",
		r"\b\d{3}-\d{2}-\d{4}\b",
	];

	patterns
		.into_iter()
		.any(|pattern| Regex::new(pattern).map(|re| re.is_match(text)).unwrap_or(false))
}

/// Keyword gate that must pass before a bounded classification prompt is
/// sent. Deliberately broad; the exact-match reply check is the narrow end.
pub fn matches_profile_keyword(text: &str) -> bool {
	const KEYWORDS: [&str; 9] = [
		"name",
		"major",
		"schedule",
		"preference",
		"birthday",
		"address",
		"contact",
		"phone",
		"email",
	];

	let folded = text.to_lowercase();

	KEYWORDS.into_iter().any(|keyword| folded.contains(keyword))
}

/// First `CLASSIFICATION_EXCERPT_CHARS` characters of the source text.
pub fn classification_excerpt(text: &str) -> String {
	text.chars().take(CLASSIFICATION_EXCERPT_CHARS).collect()
}
