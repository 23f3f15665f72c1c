//! Pure extraction functions for laser-machine trace files.
//!
//! One trace file describes one marked board: line 1 is a `;`-delimited header
//! carrying the board serial (PMJ), the order/part code pair and a trailing
//! machine id; every following line carries a printed pattern code in its 3rd
//! `;` field. The export format drifts between firmware versions, so board
//! extraction keeps a primary pattern plus a rare-format fallback, and
//! canonicalization truncates rather than strictly parses.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

/// Canonical board codes start with this marker instead of the raw `00`
/// prefix some firmware versions emit.
pub const CANONICAL_MARKER: &str = "VR";

static BOARD_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r";[a-zA-Z]{2}\d{8}.*?;").unwrap());

static RARE_BOARD_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r";00\w+([0-9]{5});").unwrap());

static ORDER_NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]{6,7}?-").unwrap());

static PART_CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-[0-9]{7};?").unwrap());

#[derive(Debug)]
pub enum ParseError {
    /// No 6-7-digit order number run in the header. Fatal for the file.
    OrderNumberNotFound(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::OrderNumberNotFound(line) => {
                write!(f, "Order number not found in line - {}", line)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Everything extracted from one trace file. Immutable once built.
#[derive(Debug, Clone)]
pub struct TraceRecord {
    /// Full board identifier from the header, non-word separators stripped.
    pub board_code: Option<String>,
    /// Normalized form of `board_code`, used as the duplicate-index key.
    pub canonical_board_code: Option<String>,
    pub machine_id: Option<String>,
    /// Internal part identifier ("smacode"); empty when absent.
    pub part_code: String,
    /// 6-7 digit manufacturing order id.
    pub order_number: String,
    /// One entry per body line, in file order.
    pub pattern_codes: Vec<String>,
    /// Content hash over the concatenated pattern codes.
    pub pattern_digest: String,
}

impl TraceRecord {
    pub fn from_lines(lines: &[String]) -> Result<Self, ParseError> {
        let header = lines
            .first()
            .map(String::as_str)
            .ok_or_else(|| ParseError::OrderNumberNotFound(String::new()))?;

        let board_code = extract_board_code(header);
        let canonical_board_code = board_code.as_deref().and_then(canonicalize);
        let order_number = extract_order_number(header)?;

        Ok(Self {
            board_code,
            canonical_board_code,
            machine_id: extract_machine_id(header),
            part_code: extract_part_code(header),
            order_number,
            pattern_codes: extract_pattern_codes(lines),
            pattern_digest: digest_patterns(lines),
        })
    }

    /// A record is only worth recording when both identifiers came through.
    pub fn is_valid(&self) -> bool {
        !self.part_code.is_empty() && !self.order_number.is_empty()
    }
}

fn strip_non_word(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

/// Extract the full board code from a header line.
///
/// The primary pattern matches a 2-letter-prefixed, 8-digit-suffixed token
/// bounded by `;` and at least 16 characters long. The rare pattern matches a
/// 49-character token beginning with `00`; it overrides the primary result
/// only when its embedded 5-digit group starts with `9` (a fixed rule
/// inherited from the machine's undocumented serial scheme).
pub fn extract_board_code(header: &str) -> Option<String> {
    let mut result = BOARD_CODE_RE
        .find(header)
        .filter(|m| m.as_str().len() >= 16)
        .map(|m| strip_non_word(m.as_str()));

    if let Some(caps) = RARE_BOARD_CODE_RE.captures(header) {
        let full = caps.get(0).map_or("", |m| m.as_str());
        let group = caps.get(1).map_or("", |m| m.as_str());
        if full.len() == 49 && group.starts_with('9') {
            result = Some(strip_non_word(full));
        }
    }

    result
}

/// Normalize a board code into the duplicate-index key form.
///
/// Raw `00…` codes get the leading two digits replaced with the marker and
/// are cut to 42 characters; already-marked codes are cut to 16. A 16-char
/// input is already canonical and passes through unchanged; anything else
/// that short (or unprefixed) yields None.
pub fn canonicalize(board_code: &str) -> Option<String> {
    if board_code.len() == 16 {
        return Some(board_code.to_string());
    }
    if board_code.len() < 16 {
        return None;
    }

    if board_code.starts_with("00") {
        let replaced = format!("{}{}", CANONICAL_MARKER, &board_code[2..]);
        let cut = replaced.len().min(42);
        return Some(replaced[..cut].to_string());
    }

    if board_code.starts_with(CANONICAL_MARKER) {
        return Some(board_code[..16].to_string());
    }

    None
}

/// Trailing `;` field of the header, whitespace stripped.
pub fn extract_machine_id(header: &str) -> Option<String> {
    if header.is_empty() {
        return None;
    }
    header
        .split(';')
        .next_back()
        .map(|field| field.split_whitespace().collect::<String>())
}

/// Digit run of a `-NNNNNNN` token; empty string when absent.
pub fn extract_part_code(header: &str) -> String {
    PART_CODE_RE
        .find(header)
        .map(|m| m.as_str().chars().filter(char::is_ascii_digit).collect())
        .unwrap_or_default()
}

/// Digit run of a 6-7-digit token followed by `-`, or `OrderNumberNotFound`.
pub fn extract_order_number(header: &str) -> Result<String, ParseError> {
    ORDER_NUMBER_RE
        .find(header)
        .map(|m| m.as_str().chars().filter(char::is_ascii_digit).collect())
        .ok_or_else(|| ParseError::OrderNumberNotFound(header.to_string()))
}

/// 3rd `;` field of every line after the header. Lines without a 3rd field
/// are skipped.
pub fn extract_pattern_codes(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .skip(1)
        .filter_map(|line| line.split(';').nth(2))
        .map(str::to_string)
        .collect()
}

/// Fixed-length content hash over the concatenated pattern codes.
pub fn digest_patterns(lines: &[String]) -> String {
    let joined: String = lines
        .iter()
        .skip(1)
        .filter_map(|line| line.split(';').nth(2))
        .collect();
    hex::encode(Sha256::digest(joined.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = ";AB12345678SOMEGARBAGE;1234567-1234567;MACHINE01";

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn board_code_primary_pattern() {
        let code = extract_board_code(HEADER).unwrap();
        // Separators stripped, 2-letter prefix and digit run preserved
        assert_eq!(code, "AB12345678SOMEGARBAGE");
    }

    #[test]
    fn board_code_too_short_is_rejected() {
        // Match is only 13 chars including the bounding semicolons
        assert_eq!(extract_board_code(";AB12345678;x"), None);
    }

    #[test]
    fn board_code_rare_format_wins_when_group_starts_with_nine() {
        // 49-char rare match (47 chars between semicolons) embedding a
        // 5-digit group starting with 9, on a line that also carries a
        // primary-format token.
        let rare_body = format!("00{}{}", "A".repeat(40), "91234");
        assert_eq!(rare_body.len(), 47);
        let header = format!(";AB12345678SOMEGARBAGE;{};MACHINE01", rare_body);

        let code = extract_board_code(&header).unwrap();
        assert_eq!(code, rare_body);
    }

    #[test]
    fn board_code_rare_format_ignored_when_group_not_nine() {
        let rare_body = format!("00{}{}", "A".repeat(40), "81234");
        let header = format!(";AB12345678SOMEGARBAGE;{};MACHINE01", rare_body);

        // Falls back to the primary result
        assert_eq!(
            extract_board_code(&header).unwrap(),
            "AB12345678SOMEGARBAGE"
        );
    }

    #[test]
    fn canonicalize_raw_prefix() {
        let raw = format!("00{}", "A".repeat(45));
        let canonical = canonicalize(&raw).unwrap();
        assert!(canonical.starts_with(CANONICAL_MARKER));
        assert_eq!(canonical.len(), 42);
    }

    #[test]
    fn canonicalize_marked_long_form() {
        let marked = format!("VR{}", "B".repeat(30));
        assert_eq!(canonicalize(&marked).unwrap().len(), 16);
    }

    #[test]
    fn canonicalize_is_idempotent_on_canonical_form() {
        let marked = format!("VR{}", "B".repeat(30));
        let once = canonicalize(&marked).unwrap();
        let twice = canonicalize(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn canonicalize_rejects_short_and_unprefixed() {
        assert_eq!(canonicalize("VR123"), None);
        assert_eq!(canonicalize(&format!("XX{}", "C".repeat(20))), None);
    }

    #[test]
    fn machine_id_is_last_field_trimmed() {
        assert_eq!(extract_machine_id(HEADER).unwrap(), "MACHINE01");
        assert_eq!(extract_machine_id("a;b; M 01 \t").unwrap(), "M01");
    }

    #[test]
    fn part_code_digits_only() {
        assert_eq!(extract_part_code(HEADER), "1234567");
        assert_eq!(extract_part_code("a;b;no code here"), "");
        // 7 digits required
        assert_eq!(extract_part_code("a;-123456;b"), "");
    }

    #[test]
    fn order_number_found_and_not_found() {
        assert_eq!(extract_order_number(HEADER).unwrap(), "1234567");

        // six-digit form
        assert_eq!(extract_order_number("x;123456-9999999;m").unwrap(), "123456");

        let err = extract_order_number("no digits at all").unwrap_err();
        assert!(matches!(err, ParseError::OrderNumberNotFound(_)));
    }

    #[test]
    fn pattern_codes_take_third_field() {
        let body = lines(&[HEADER, "x;y;PAT001;", "x;y;PAT002;z", "too;short"]);
        assert_eq!(extract_pattern_codes(&body), vec!["PAT001", "PAT002"]);
    }

    #[test]
    fn digest_is_stable_and_order_sensitive() {
        let a = lines(&[HEADER, "x;y;PAT001;", "x;y;PAT002;"]);
        let b = lines(&[HEADER, "x;y;PAT002;", "x;y;PAT001;"]);
        assert_eq!(digest_patterns(&a), digest_patterns(&a));
        assert_ne!(digest_patterns(&a), digest_patterns(&b));
        assert_eq!(digest_patterns(&a).len(), 64);
    }

    #[test]
    fn record_from_lines() {
        let body = lines(&[HEADER, "x;y;PAT001;"]);
        let record = TraceRecord::from_lines(&body).unwrap();

        assert_eq!(record.order_number, "1234567");
        assert_eq!(record.part_code, "1234567");
        assert_eq!(record.board_code.as_deref(), Some("AB12345678SOMEGARBAGE"));
        assert_eq!(record.pattern_codes, vec!["PAT001"]);
        assert_eq!(record.machine_id.as_deref(), Some("MACHINE01"));
        assert!(record.is_valid());
    }

    #[test]
    fn record_without_order_number_is_fatal() {
        let body = lines(&["just;a;header;MACHINE01"]);
        assert!(TraceRecord::from_lines(&body).is_err());
    }
}
