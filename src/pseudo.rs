//! Pseudo-localization.
//!
//! A [`PseudoType`] rewrites translation text for layout and hard-coded
//! string testing. Printf placeholders, markup tags, escaped characters and
//! HTML entities are protected: the text is split around them and only the
//! free segments are transformed.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Segments that must survive pseudo-localization untouched:
    /// printf placeholders (`%s`, `%(name)s`, `%1$s`), markup tags,
    /// literal escapes (`\n`) and HTML entities (`&amp;`).
    static ref PROTECTED_RE: Regex = Regex::new(concat!(
        r"%(?:(?:\d+)\$|\(\w+\))?[+#-]*(?:\d+)?(?:\.\d+)?(?:hh|h|l|ll)?[\w%]",
        r"|(?s:(?:<|&lt;).*?(?:>|&gt;))",
        r"|\\\w",
        r"|&[a-zA-Z]+;",
    ))
    .expect("protected segment regex");
}

/// A pseudo-localization text transformation.
pub trait PseudoType {
    fn compile(&self, text: &str) -> String;
}

/// Applies `transform` to every unprotected segment of `text`.
fn transform_free_segments(text: &str, transform: impl Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for found in PROTECTED_RE.find_iter(text) {
        out.push_str(&transform(&text[last..found.start()]));
        out.push_str(found.as_str());
        last = found.end();
    }
    out.push_str(&transform(&text[last..]));
    out
}

fn free_length(text: &str) -> usize {
    let protected: usize = PROTECTED_RE
        .find_iter(text)
        .map(|found| found.as_str().chars().count())
        .sum();
    text.chars().count().saturating_sub(protected)
}

/// Wraps the whole string in brackets so truncated output is visible.
#[derive(Debug, Clone, Copy, Default)]
pub struct BracketsPseudo;

impl PseudoType for BracketsPseudo {
    fn compile(&self, text: &str) -> String {
        format!("[{text}]")
    }
}

/// Appends `~` padding sized at roughly 40% of the free text to simulate
/// the expansion of translated text.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtendPseudo;

impl PseudoType for ExtendPseudo {
    fn compile(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }
        let padding = (free_length(text) * 2).div_ceil(5).max(1);
        let mut out = String::from(text);
        out.extend(std::iter::repeat_n('~', padding));
        out
    }
}

/// Replaces free-segment vowels and a few consonants with accented
/// equivalents.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccentsPseudo;

fn accent(c: char) -> char {
    match c {
        'a' => 'á',
        'e' => 'é',
        'i' => 'í',
        'o' => 'ó',
        'u' => 'ú',
        'y' => 'ý',
        'c' => 'ç',
        'n' => 'ñ',
        'A' => 'Á',
        'E' => 'É',
        'I' => 'Í',
        'O' => 'Ó',
        'U' => 'Ú',
        'Y' => 'Ý',
        'C' => 'Ç',
        'N' => 'Ñ',
        other => other,
    }
}

impl PseudoType for AccentsPseudo {
    fn compile(&self, text: &str) -> String {
        transform_free_segments(text, |segment| segment.chars().map(accent).collect())
    }
}
