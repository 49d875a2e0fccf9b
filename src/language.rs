//! Language metadata: plural rules, gettext equations, code resolution.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use serde::Serialize;
use unic_langid::LanguageIdentifier;

use crate::{error::Error, types::PluralRule};

/// Everything the engine needs to know about one target language.
///
/// `rules` is ordered and always ends with [`PluralRule::Other`]; its length
/// equals `nplurals`, and the gettext equation yields form indexes in the
/// same order, so `msgstr[i]` maps to `rules[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Language {
    pub code: String,
    pub name: String,
    pub nplurals: u8,
    pub plural_equation: String,
    pub rules: Vec<PluralRule>,
}

impl Language {
    /// Rule numbers in slot order, e.g. `[1, 5]` for English.
    pub fn rule_numbers(&self) -> Vec<u8> {
        self.rules.iter().map(|rule| rule.number()).collect()
    }

    /// The value of a gettext `Plural-Forms` header for this language.
    pub fn plural_forms_header(&self) -> String {
        format!(
            "nplurals={}; plural={};",
            self.nplurals, self.plural_equation
        )
    }
}

/// Resolves language codes to [`Language`] metadata.
pub trait LanguageCatalog {
    /// Looks a language up by code or alias.
    /// Fails with [`Error::UnknownLanguage`] when nothing matches.
    fn language_for(&self, code: &str) -> Result<Language, Error>;
}

struct LanguageSpec {
    name: &'static str,
    nplurals: u8,
    equation: &'static str,
    rules: &'static [PluralRule],
}

lazy_static! {
    /// Static language table keyed by normalized lowercase code.
    ///
    /// Equations are written so that form order matches the ascending rule
    /// lists; a handful of region variants get their own entries.
    static ref LANGUAGE_TABLE: BTreeMap<&'static str, LanguageSpec> = {
        use PluralRule::*;
        let mut m: BTreeMap<&'static str, LanguageSpec> = BTreeMap::new();

        fn spec(
            name: &'static str,
            nplurals: u8,
            equation: &'static str,
            rules: &'static [PluralRule],
        ) -> LanguageSpec {
            LanguageSpec { name, nplurals, equation, rules }
        }

        // Two forms, n != 1
        for (code, name) in [
            ("en", "English"), ("de", "German"), ("nl", "Dutch"), ("sv", "Swedish"),
            ("da", "Danish"), ("fi", "Finnish"), ("et", "Estonian"), ("el", "Greek"),
            ("es", "Spanish"), ("it", "Italian"), ("pt", "Portuguese"), ("hu", "Hungarian"),
            ("he", "Hebrew"), ("hi", "Hindi"), ("bn", "Bengali"),
        ] {
            m.insert(code, spec(name, 2, "(n != 1)", &[One, Other]));
        }

        // Two forms, n > 1
        for (code, name) in [
            ("fr", "French"), ("pt-br", "Portuguese (Brazil)"), ("tr", "Turkish"),
            ("fa", "Persian"),
        ] {
            m.insert(code, spec(name, 2, "(n > 1)", &[One, Other]));
        }

        // One form
        for (code, name) in [
            ("ja", "Japanese"), ("ko", "Korean"), ("zh-cn", "Chinese (China)"),
            ("zh-tw", "Chinese (Taiwan)"), ("th", "Thai"), ("vi", "Vietnamese"),
            ("id", "Indonesian"), ("ms", "Malay"),
        ] {
            m.insert(code, spec(name, 1, "0", &[Other]));
        }

        // East Slavic style: one, few, other
        for (code, name) in [
            ("ru", "Russian"), ("uk", "Ukrainian"), ("sr", "Serbian"),
            ("hr", "Croatian"), ("bs", "Bosnian"), ("be", "Belarusian"),
        ] {
            m.insert(code, spec(
                name,
                3,
                "(n%10==1 && n%100!=11 ? 0 : n%10>=2 && n%10<=4 && (n%100<10 || n%100>=20) ? 1 : 2)",
                &[One, Few, Other],
            ));
        }

        m.insert("pl", spec(
            "Polish",
            3,
            "(n==1 ? 0 : n%10>=2 && n%10<=4 && (n%100<10 || n%100>=20) ? 1 : 2)",
            &[One, Few, Other],
        ));

        for (code, name) in [("cs", "Czech"), ("sk", "Slovak")] {
            m.insert(code, spec(
                name,
                3,
                "(n==1) ? 0 : (n>=2 && n<=4) ? 1 : 2",
                &[One, Few, Other],
            ));
        }

        m.insert("sl", spec(
            "Slovenian",
            4,
            "(n%100==1 ? 0 : n%100==2 ? 1 : n%100==3 || n%100==4 ? 2 : 3)",
            &[One, Two, Few, Other],
        ));

        m.insert("ro", spec(
            "Romanian",
            3,
            "(n==1 ? 0 : (n==0 || (n%100 > 0 && n%100 < 20)) ? 1 : 2)",
            &[One, Few, Other],
        ));

        m.insert("lv", spec(
            "Latvian",
            3,
            "(n==0 ? 0 : n%10==1 && n%100!=11 ? 1 : 2)",
            &[Zero, One, Other],
        ));

        m.insert("ga", spec(
            "Irish",
            5,
            "n==1 ? 0 : n==2 ? 1 : n<7 ? 2 : n<11 ? 3 : 4",
            &[One, Two, Few, Many, Other],
        ));

        m.insert("ar", spec(
            "Arabic",
            6,
            "(n==0 ? 0 : n==1 ? 1 : n==2 ? 2 : n%100>=3 && n%100<=10 ? 3 : n%100>=11 ? 4 : 5)",
            &[Zero, One, Two, Few, Many, Other],
        ));

        m
    };
}

/// Lowercases a code and maps underscores to hyphens.
///
/// A `@modifier` suffix (desktop-entry style) is kept verbatim; codes
/// without one are validated syntactically through `unic-langid`.
pub fn normalize_code(code: &str) -> String {
    let trimmed = code.trim();
    if trimmed.contains('@') {
        return trimmed.replace('_', "-").to_ascii_lowercase();
    }
    let hyphenated = trimmed.replace('_', "-");
    match hyphenated.parse::<LanguageIdentifier>() {
        Ok(id) => {
            let mut normalized = id.language.as_str().to_ascii_lowercase();
            if let Some(region) = id.region {
                normalized.push('-');
                normalized.push_str(&region.as_str().to_ascii_lowercase());
            }
            normalized
        }
        Err(_) => hyphenated.to_ascii_lowercase(),
    }
}

fn base_code(code: &str) -> &str {
    code.split('-').next().unwrap_or(code)
}

/// The built-in catalog backed by the static table.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinCatalog;

impl LanguageCatalog for BuiltinCatalog {
    fn language_for(&self, code: &str) -> Result<Language, Error> {
        let normalized = normalize_code(code);
        let spec = LANGUAGE_TABLE
            .get(normalized.as_str())
            .or_else(|| LANGUAGE_TABLE.get(base_code(&normalized)))
            .ok_or_else(|| Error::UnknownLanguage(code.to_string()))?;
        let canonical = if LANGUAGE_TABLE.contains_key(normalized.as_str()) {
            normalized
        } else {
            base_code(&normalized).to_string()
        };
        Ok(Language {
            code: canonical,
            name: spec.name.to_string(),
            nplurals: spec.nplurals,
            plural_equation: spec.equation.to_string(),
            rules: spec.rules.to_vec(),
        })
    }
}

/// Shared instance of the built-in catalog.
pub fn builtin_catalog() -> &'static BuiltinCatalog {
    &BuiltinCatalog
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rules_end_with_other_and_match_nplurals() {
        for (code, spec) in LANGUAGE_TABLE.iter() {
            assert_eq!(
                spec.rules.len(),
                spec.nplurals as usize,
                "rule count mismatch for {code}"
            );
            assert_eq!(
                *spec.rules.last().unwrap(),
                PluralRule::Other,
                "missing sentinel rule for {code}"
            );
        }
    }

    #[test]
    fn test_lookup_by_code() {
        let en = builtin_catalog().language_for("en").unwrap();
        assert_eq!(en.nplurals, 2);
        assert_eq!(en.rule_numbers(), vec![1, 5]);

        let ar = builtin_catalog().language_for("ar").unwrap();
        assert_eq!(ar.nplurals, 6);
        assert_eq!(ar.rule_numbers(), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_alias_normalization() {
        let underscore = builtin_catalog().language_for("pt_BR").unwrap();
        let hyphen = builtin_catalog().language_for("pt-br").unwrap();
        assert_eq!(underscore, hyphen);
        assert_eq!(underscore.code, "pt-br");
    }

    #[test]
    fn test_region_falls_back_to_base() {
        let fr_fr = builtin_catalog().language_for("fr-FR").unwrap();
        assert_eq!(fr_fr.code, "fr");
        assert_eq!(fr_fr.nplurals, 2);
    }

    #[test]
    fn test_unknown_language_errors() {
        let err = builtin_catalog().language_for("tlh").unwrap_err();
        assert!(matches!(err, Error::UnknownLanguage(_)));
    }

    #[test]
    fn test_plural_forms_header() {
        let ja = builtin_catalog().language_for("ja").unwrap();
        assert_eq!(ja.plural_forms_header(), "nplurals=1; plural=0;");

        let en = builtin_catalog().language_for("en").unwrap();
        assert_eq!(en.plural_forms_header(), "nplurals=2; plural=(n != 1);");
    }

    #[test]
    fn test_modifier_codes_do_not_resolve() {
        let err = builtin_catalog().language_for("sr@latin").unwrap_err();
        assert!(matches!(err, Error::UnknownLanguage(_)));
    }
}
