//! Freedesktop `.desktop` entry files.
//!
//! Only the localestring keys `Name`, `GenericName`, `Comment` and `Icon`
//! are translatable. The template is not tag-based: bare lines survive
//! verbatim, localized lines (`Name[de]=...`) are stripped out, and
//! compilation appends one `Key[lang]=value` line per translated entity
//! after a `# Translations` marker. A translation parse therefore targets
//! exactly one language per call.

use crate::{
    compilation::{CompileContext, EscapeFn, Replacements, no_escape},
    error::{CompileError, Error, ParseError},
    formats::I18nMethod,
    handler::{FormatCodec, ParseOutcome, ParseRequest, decode_utf8},
    language::{LanguageCatalog, builtin_catalog},
    types::GenericTranslation,
};

const LOCALIZED_KEYS: [&str; 4] = ["Name", "GenericName", "Comment", "Icon"];

/// Drops a `.ENCODING` component from a desktop locale, keeping the
/// `@MODIFIER` that may follow it.
fn normalize_locale(locale: &str) -> String {
    match locale.find('.') {
        Some(dot) => {
            let modifier = locale.find('@').map(|at| &locale[at..]).unwrap_or("");
            format!("{}{}", &locale[..dot], modifier)
        }
        None => locale.to_string(),
    }
}

/// Desktop entry codec.
pub struct DesktopCodec;

impl FormatCodec for DesktopCodec {
    fn method(&self) -> I18nMethod {
        I18nMethod::Desktop
    }

    fn parse(&self, request: &ParseRequest<'_>) -> Result<ParseOutcome, Error> {
        let text = decode_utf8(self.method(), request.content)?;
        let mut outcome = ParseOutcome::default();
        let mut template_lines: Vec<&str> = Vec::new();

        for line in text.lines() {
            if line.trim_start().starts_with('#') {
                if request.is_source {
                    template_lines.push(line);
                }
                continue;
            }
            let Some((key_part, value)) = line.split_once('=') else {
                if request.is_source {
                    template_lines.push(line);
                }
                continue;
            };

            let bracketed = key_part.find('[').filter(|_| key_part.ends_with(']'));
            if let Some(bracket) = bracketed {
                let base = &key_part[..bracket];
                if !LOCALIZED_KEYS.contains(&base) {
                    continue;
                }
                let locale = normalize_locale(&key_part[bracket + 1..key_part.len() - 1]);
                if locale == "x-test" {
                    if request.is_source {
                        template_lines.push(line);
                    }
                    continue;
                }
                let language = builtin_catalog().language_for(&locale).map_err(|_| {
                    ParseError::syntax(self.method(), format!("unknown locale `{locale}`"))
                })?;
                if !request.is_source && language.code == request.language.code {
                    outcome.stringset.add(GenericTranslation::new(base, value));
                }
                continue;
            }

            if request.is_source {
                template_lines.push(line);
                if LOCALIZED_KEYS.contains(&key_part) {
                    outcome
                        .stringset
                        .add(GenericTranslation::new(key_part, value));
                }
            }
        }

        if request.is_source {
            outcome.template = template_lines.join("\n");
            outcome.template.push_str("\n# Translations\n");
        }
        Ok(outcome)
    }

    fn escape_fn(&self) -> EscapeFn {
        no_escape
    }

    fn assemble(
        &self,
        ctx: &CompileContext<'_>,
        replacements: &Replacements,
        content: String,
    ) -> Result<String, CompileError> {
        let mut out = content;
        for replacement in replacements.entities() {
            if replacement.raw.is_empty() {
                continue;
            }
            out.push_str(&format!(
                "{}[{}]={}\n",
                replacement.entity, ctx.language.code, replacement.decorated
            ));
        }
        Ok(out)
    }
}
