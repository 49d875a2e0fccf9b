//! Decoration of selected translations.
//!
//! Every string a builder selects passes through a [`Decorator`] before it
//! is substituted into the template: the format's escape function, then
//! optionally a pseudo-localization transform.

use crate::pseudo::PseudoType;

/// A format's escape function, applied to translation text on its way into
/// compiled output.
pub type EscapeFn = fn(&str) -> String;

/// Escape function for formats that write translation text verbatim.
pub fn no_escape(text: &str) -> String {
    text.to_string()
}

/// Post-processing applied to each selected translation.
pub enum Decorator<'a> {
    /// Escape only; empty input stays empty.
    Normal { escape: EscapeFn },
    /// Escape, then pseudo-localize. Runs on empty input too, so a pseudo
    /// type may make untranslated slots visible.
    Pseudo {
        escape: EscapeFn,
        pseudo: &'a dyn PseudoType,
    },
    /// Discards the text; every slot compiles to the empty string.
    Empty,
}

impl<'a> Decorator<'a> {
    pub fn normal(escape: EscapeFn) -> Self {
        Decorator::Normal { escape }
    }

    pub fn pseudo(escape: EscapeFn, pseudo: &'a dyn PseudoType) -> Self {
        Decorator::Pseudo { escape, pseudo }
    }

    pub fn empty() -> Self {
        Decorator::Empty
    }

    pub fn apply(&self, text: &str) -> String {
        match self {
            Decorator::Normal { escape } => {
                if text.is_empty() {
                    String::new()
                } else {
                    escape(text)
                }
            }
            Decorator::Pseudo { escape, pseudo } => pseudo.compile(&escape(text)),
            Decorator::Empty => String::new(),
        }
    }
}

impl std::fmt::Debug for Decorator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decorator::Normal { .. } => f.write_str("Decorator::Normal"),
            Decorator::Pseudo { .. } => f.write_str("Decorator::Pseudo"),
            Decorator::Empty => f.write_str("Decorator::Empty"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pseudo::BracketsPseudo;

    fn shout(s: &str) -> String {
        s.to_uppercase()
    }

    #[test]
    fn test_normal_escapes() {
        let decorator = Decorator::normal(shout);
        assert_eq!(decorator.apply("hello"), "HELLO");
    }

    #[test]
    fn test_normal_keeps_empty_empty() {
        let decorator = Decorator::normal(shout);
        assert_eq!(decorator.apply(""), "");
    }

    #[test]
    fn test_pseudo_runs_after_escape() {
        let pseudo = BracketsPseudo;
        let decorator = Decorator::pseudo(shout, &pseudo);
        assert_eq!(decorator.apply("hello"), "[HELLO]");
    }

    #[test]
    fn test_pseudo_has_no_empty_guard() {
        let pseudo = BracketsPseudo;
        let decorator = Decorator::pseudo(shout, &pseudo);
        assert_eq!(decorator.apply(""), "[]");
    }

    #[test]
    fn test_empty_discards() {
        let decorator = Decorator::empty();
        assert_eq!(decorator.apply("hello"), "");
    }
}
