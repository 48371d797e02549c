//! Text cleanup for extracted PDF and OCR text.
//!
//! Block text coming out of layout analysis is a join of line texts. It
//! still carries ligatures, private-use glyphs from broken font encodings,
//! and words hyphenated across line ends.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static RE_HYPHEN_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-zA-Z])-\n\s*([a-z])").unwrap());
static RE_PAGE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-–—]\s*)?(?:page\s+)?\d+(?:\s*(?:/|of)\s*\d+)?(?:\s*[-–—])?\s*$").unwrap());

const LIGATURES: &[(char, &str)] = &[
    ('\u{FB00}', "ff"),
    ('\u{FB01}', "fi"),
    ('\u{FB02}', "fl"),
    ('\u{FB03}', "ffi"),
    ('\u{FB04}', "ffl"),
    ('\u{FB05}', "st"),
    ('\u{FB06}', "st"),
];

/// Normalize the text of one cell: NFC, ligatures expanded, private-use and
/// replacement characters dropped.
pub fn sanitize_cell(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.nfc() {
        if let Some((_, rep)) = LIGATURES.iter().find(|(l, _)| *l == c) {
            out.push_str(rep);
        } else if !is_private_use(c) && c != '\u{FFFD}' && c != '\u{0000}' {
            out.push(c);
        }
    }
    out
}

/// Join line texts into one paragraph.
///
/// Words hyphenated across a line break are rejoined. Lines of CJK text are
/// joined without a space; everything else with a single space.
pub fn join_lines<S: AsRef<str>>(lines: &[S]) -> String {
    let joined = lines
        .iter()
        .map(|l| l.as_ref().trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    let dehyphenated = RE_HYPHEN_BREAK.replace_all(&joined, "$1$2");

    let mut out = String::with_capacity(dehyphenated.len());
    let mut prev: Option<char> = None;
    let mut pending_break = false;
    for c in dehyphenated.chars() {
        if c == '\n' {
            pending_break = true;
            continue;
        }
        if pending_break {
            let cjk_join = prev.is_some_and(is_cjk) && is_cjk(c);
            if !cjk_join {
                out.push(' ');
            }
            pending_break = false;
        }
        out.push(c);
        prev = Some(c);
    }
    collapse_spaces(&out)
}

/// Whether a line is only a page number ("12", "- 3 -", "Page 4 of 10").
pub fn is_page_number(text: &str) -> bool {
    RE_PAGE_NUMBER.is_match(&text.to_lowercase())
}

fn collapse_spaces(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_private_use(c: char) -> bool {
    let code = c as u32;
    (0xE000..=0xF8FF).contains(&code)
        || (0xF0000..=0xFFFFD).contains(&code)
        || (0x100000..=0x10FFFD).contains(&code)
}

pub(crate) fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x1100..=0x11FF
        | 0x3040..=0x30FF
        | 0x3130..=0x318F
        | 0x3400..=0x4DBF
        | 0x4E00..=0x9FFF
        | 0xAC00..=0xD7AF
        | 0xF900..=0xFAFF
        | 0xFF00..=0xFFEF)
}
