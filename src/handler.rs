//! The per-format codec seam.
//!
//! Every file format implements [`FormatCodec`]: one `parse` entry point that
//! extracts a stringset and a tagged template, plus the compile hooks the
//! [`crate::compilation::Compiler`] calls in order. Formats only override the
//! hooks they need; the defaults cover the common tag-substitution path.

use std::collections::HashSet;
use std::io::Read;

use encoding_rs::Encoding;
use encoding_rs_io::DecodeReaderBytesBuilder;
use serde::Serialize;

use crate::{
    compilation::{
        CompileContext, Compiler, EscapeFn, FactoryKind, Replacements,
        TranslationsBuilder, substitute_tags,
    },
    error::{CompileError, Error, ParseError},
    formats::I18nMethod,
    language::Language,
    mode::Mode,
    pseudo::PseudoType,
    store::TranslationStore,
    types::{Resource, StringSet},
};

/// Everything a codec gets handed to parse one file.
pub struct ParseRequest<'a> {
    /// The raw file body. Codecs decode it themselves; most formats are
    /// UTF-8 but Apple strings may be UTF-16 and Java properties Latin-1.
    pub content: &'a [u8],
    /// Source files produce a template; translation files do not.
    pub is_source: bool,
    pub language: &'a Language,
    pub resource: &'a Resource,
}

/// Everything one parse produces.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub stringset: StringSet,
    /// The file body with translatable text swapped for placeholder tags.
    /// Empty for translation files.
    pub template: String,
    /// Rows demoted from translations, such as fuzzy PO entries.
    pub suggestions: StringSet,
    pub warnings: Warnings,
}

/// One recoverable parse problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub key: String,
    pub message: String,
}

/// Parse warnings, deduplicated by key and kept in arrival order.
///
/// Keys group repeats of the same problem: a plural group whose form count
/// disagrees with the target language warns once per msgid, not once per
/// form.
#[derive(Debug, Default, Clone, Serialize)]
#[serde(transparent)]
pub struct Warnings {
    entries: Vec<Warning>,
    #[serde(skip)]
    seen: HashSet<String>,
}

impl Warnings {
    pub fn new() -> Self {
        Warnings::default()
    }

    /// Records a warning; returns false when the key was already seen.
    pub fn add(&mut self, key: impl Into<String>, message: impl Into<String>) -> bool {
        let key = key.into();
        if !self.seen.insert(key.clone()) {
            return false;
        }
        self.entries.push(Warning {
            key,
            message: message.into(),
        });
        true
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Warning> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One file format's parse and compile behavior.
pub trait FormatCodec {
    fn method(&self) -> I18nMethod;

    /// Parses one file. Source files additionally build the template.
    fn parse(&self, request: &ParseRequest<'_>) -> Result<ParseOutcome, Error>;

    /// The escape applied to translation text on its way into a compiled
    /// file.
    fn escape_fn(&self) -> EscapeFn;

    fn escape(&self, text: &str) -> String {
        (self.escape_fn())(text)
    }

    /// Which builder/decorator policy compilation uses for this format.
    fn factory_kind(&self) -> FactoryKind {
        FactoryKind::Simple
    }

    /// Whether templates of this format carry plural placeholder tags.
    fn plural(&self) -> bool {
        false
    }

    /// Runs before anything else touches the template.
    fn pre_compile(
        &self,
        _ctx: &CompileContext<'_>,
        content: String,
    ) -> Result<String, CompileError> {
        Ok(content)
    }

    /// Runs after `pre_compile`, before replacements are built.
    fn examine_content(
        &self,
        _ctx: &CompileContext<'_>,
        content: String,
    ) -> Result<String, CompileError> {
        Ok(content)
    }

    /// Last touch on each replacement text before it enters the template.
    fn visit_translation(&self, text: String) -> String {
        text
    }

    /// Rewrites the template's plural tags to the target language's slot
    /// count. Only plural formats implement this; the default rejects the
    /// compile.
    fn update_plural_hashes(
        &self,
        _ctx: &CompileContext<'_>,
        _replacements: &Replacements,
        _content: String,
    ) -> Result<String, CompileError> {
        Err(CompileError::UninitializedCompiler)
    }

    /// Merges the replacements into the template. The default substitutes
    /// placeholder tags in place; formats that never tag their source lines
    /// append instead.
    fn assemble(
        &self,
        _ctx: &CompileContext<'_>,
        replacements: &Replacements,
        content: String,
    ) -> Result<String, CompileError> {
        Ok(substitute_tags(&content, replacements))
    }

    /// Runs on the fully assembled file body.
    fn post_compile(
        &self,
        _ctx: &CompileContext<'_>,
        content: String,
    ) -> Result<String, CompileError> {
        Ok(content)
    }
}

/// Parses a source-language file: stringset plus template.
pub fn parse_source(
    codec: &dyn FormatCodec,
    resource: &Resource,
    language: &Language,
    content: &[u8],
) -> Result<ParseOutcome, Error> {
    codec.parse(&ParseRequest {
        content,
        is_source: true,
        language,
        resource,
    })
}

/// Parses a translation file: stringset only, no template.
pub fn parse_translation(
    codec: &dyn FormatCodec,
    resource: &Resource,
    language: &Language,
    content: &[u8],
) -> Result<ParseOutcome, Error> {
    codec.parse(&ParseRequest {
        content,
        is_source: false,
        language,
        resource,
    })
}

/// Options for [`compile`].
#[derive(Clone, Copy, Default)]
pub struct CompileOptions<'a> {
    pub mode: Mode,
    /// When set, every replacement goes through this transformation instead
    /// of plain escaping.
    pub pseudo: Option<&'a dyn PseudoType>,
}

/// Compiles a stored template into a translation file body.
pub fn compile(
    codec: &dyn FormatCodec,
    template: &str,
    resource: &Resource,
    language: &Language,
    store: &dyn TranslationStore,
    options: &CompileOptions<'_>,
) -> Result<String, Error> {
    let factory = codec.factory_kind();
    let mut builder = TranslationsBuilder::new(
        factory.builder_kind(options.mode),
        resource,
        language,
        store,
    );
    builder.set_pluralized(codec.plural());
    let decorator = factory.decorator(codec.escape_fn(), options.pseudo);
    Compiler::new(
        codec,
        builder,
        decorator,
        store,
        CompileContext { resource, language },
    )
    .compile(template)
}

/// A decoded file body plus where it came from.
#[derive(Debug)]
pub struct DecodedContent {
    pub text: String,
    pub encoding: &'static Encoding,
    pub had_bom: bool,
}

/// Strict UTF-8 decode; invalid bytes abort the parse.
pub fn decode_utf8(method: I18nMethod, content: &[u8]) -> Result<String, ParseError> {
    String::from_utf8(content.to_vec()).map_err(|_| ParseError::InvalidEncoding {
        method,
        encoding: "UTF-8",
    })
}

/// Decodes with BOM sniffing, falling back to UTF-8 when no BOM is present.
pub fn decode_sniffed(method: I18nMethod, content: &[u8]) -> Result<DecodedContent, ParseError> {
    let (encoding, had_bom) = match Encoding::for_bom(content) {
        Some((encoding, _)) => (encoding, true),
        None => (encoding_rs::UTF_8, false),
    };
    let mut decoder = DecodeReaderBytesBuilder::new()
        .bom_override(true)
        .build(content);
    let mut text = String::new();
    decoder
        .read_to_string(&mut text)
        .map_err(|_| ParseError::InvalidEncoding {
            method,
            encoding: encoding.name(),
        })?;
    Ok(DecodedContent {
        text,
        encoding,
        had_bom,
    })
}
