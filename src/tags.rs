//! Hash placeholder tags.
//!
//! Templates store every translatable string as a deterministic tag built
//! from an MD5 digest of the source string and its context. Singular slots
//! carry the `_tr` suffix, plural slots carry `_pl_<n>` where `n` is the
//! slot's position inside its plural group (not a plural rule number).
//! Tags are emitted lowercase; matching is case-insensitive.

use lazy_static::lazy_static;
use regex::Regex;

/// Suffix of a singular template tag.
pub const SINGULAR_SUFFIX: &str = "_tr";

/// Suffix prefix of a plural template tag; the slot position follows.
pub const PLURAL_SUFFIX: &str = "_pl_";

lazy_static! {
    /// Matches a singular tag anywhere in a template.
    pub static ref SINGULAR_TAG_RE: Regex =
        Regex::new(r"(?i)[0-9a-f]{32}_tr").expect("singular tag regex");

    /// Matches a plural tag and captures the rule digit.
    pub static ref PLURAL_TAG_RE: Regex =
        Regex::new(r"(?i)([0-9a-f]{32})_pl_([0-5])").expect("plural tag regex");

    /// Matches either tag kind; used by the single substitution pass.
    pub static ref ANY_TAG_RE: Regex =
        Regex::new(r"(?i)[0-9a-f]{32}(?:_pl_[0-5]|_tr)").expect("any tag regex");
}

/// Escapes the context separator inside a single context element.
pub fn escape_context_element(value: &str) -> String {
    value.replace(':', "\\:")
}

/// Joins context elements into the canonical hash input fragment.
///
/// Elements are colon-escaped first so `["a:b"]` and `["a", "b"]` stay
/// distinct. An empty context yields the empty string.
pub fn context_string(context: &[String]) -> String {
    context
        .iter()
        .map(|element| escape_context_element(element))
        .collect::<Vec<_>>()
        .join(":")
}

/// Normalizes a raw single-string context into the list form.
///
/// The literal string `"None"` and the empty string both mean "no context".
pub fn context_from_str(raw: &str) -> Vec<String> {
    if raw.is_empty() || raw == "None" {
        Vec::new()
    } else {
        vec![raw.to_string()]
    }
}

/// Returns the 32 lowercase hex digits identifying (source string, context).
///
/// The digest input is `source_entity + ":" + context_string`; the colon is
/// present even for an empty context.
pub fn entity_hash(source_entity: &str, context: &[String]) -> String {
    let input = format!("{}:{}", source_entity, context_string(context));
    format!("{:x}", md5::compute(input.as_bytes()))
}

/// Builds the singular template tag for an entity hash.
pub fn singular_tag(hash: &str) -> String {
    format!("{hash}{SINGULAR_SUFFIX}")
}

/// Builds the plural template tag for an entity hash and slot position.
///
/// A group with n forms is tagged `_pl_0` through `_pl_{n-1}`; when a
/// language uses rules `[One, Other]` the `Other` form still lives in
/// slot 1.
pub fn plural_tag(hash: &str, slot: u8) -> String {
    format!("{hash}{PLURAL_SUFFIX}{slot}")
}
