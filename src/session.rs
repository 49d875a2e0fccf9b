//! This module provides the `Session` struct, a convenience layer that ties
//! file I/O, the format registry, the in-memory store and the compiler
//! together. A `Session` reads source and translation files from disk,
//! remembers the template each source file produced, and compiles stored
//! translations back into complete files.
//!
//! Formats are inferred from file extensions through the registry; callers
//! that know better can pass a method explicitly via the byte-level
//! variants.

use std::{collections::HashMap, fs, path::Path};

use crate::{
    error::{CompileError, Error, ParseError},
    formats::{I18nMethod, codec_for, guess_method},
    handler::{self, CompileOptions, Warnings},
    language::{Language, LanguageCatalog, builtin_catalog},
    store::{MemoryStore, SuggestionSink, TranslationStore},
    types::{GenericTranslation, Resource, StringSet},
};

/// What one ingested file produced.
#[derive(Debug)]
pub struct IngestReport {
    /// The method the file was parsed with.
    pub method: I18nMethod,
    /// Rows accepted into the store.
    pub strings: usize,
    /// Rows demoted to suggestions, such as fuzzy entries.
    pub suggestions: usize,
    pub warnings: Warnings,
}

/// The template a source-file ingest left behind, keyed by resource slug.
struct StoredTemplate {
    method: I18nMethod,
    content: String,
}

/// Ties files, formats, storage and compilation together.
///
/// Source files are parsed once and their templates kept; translation files
/// add rows to the store; compiling merges the two back into a file body.
pub struct Session<'a> {
    /// The store every ingest lands in.
    pub store: MemoryStore,
    catalog: &'a dyn LanguageCatalog,
    templates: HashMap<String, StoredTemplate>,
}

impl Session<'static> {
    /// Creates a session backed by the built-in language catalog.
    pub fn new() -> Self {
        Session::with_catalog(builtin_catalog())
    }
}

impl Default for Session<'static> {
    fn default() -> Self {
        Session::new()
    }
}

impl<'a> Session<'a> {
    /// Creates a session that resolves language codes through `catalog`.
    pub fn with_catalog(catalog: &'a dyn LanguageCatalog) -> Self {
        Session {
            store: MemoryStore::new(),
            catalog,
            templates: HashMap::new(),
        }
    }

    /// Reads a source-language file and ingests its strings.
    ///
    /// # Parameters
    /// - `resource`: The resource the file belongs to.
    /// - `path`: Path to the source file; the format is inferred from its
    ///   extension.
    ///
    /// # Returns
    ///
    /// An [`IngestReport`], or an `Error` when the extension is unknown,
    /// the file cannot be read or parsed, or no strings were extracted.
    pub fn ingest_source_file<P: AsRef<Path>>(
        &mut self,
        resource: &Resource,
        path: P,
    ) -> Result<IngestReport, Error> {
        let path = path.as_ref();
        let method = method_for(path)?;
        let content = fs::read(path)?;
        self.ingest_source(resource, method, &content)
    }

    /// Parses source-file bytes with an explicit method and ingests them.
    ///
    /// The parse must extract at least one string; a source file without
    /// any is rejected rather than silently stored. The template the parse
    /// produced replaces any previous template of the resource.
    pub fn ingest_source(
        &mut self,
        resource: &Resource,
        method: I18nMethod,
        content: &[u8],
    ) -> Result<IngestReport, Error> {
        let codec = codec_for(method);
        let language = self.catalog.language_for(&resource.source_language)?;
        let outcome = handler::parse_source(codec, resource, &language, content)?;
        if outcome.stringset.is_empty() {
            return Err(ParseError::syntax(method, "no translatable strings found").into());
        }
        let strings = self.store.ingest_source(resource, &outcome.stringset);
        let suggestions = self.record_suggestions(resource, &language, &outcome.suggestions);
        self.templates.insert(
            resource.slug.clone(),
            StoredTemplate {
                method,
                content: outcome.template,
            },
        );
        Ok(IngestReport {
            method,
            strings,
            suggestions,
            warnings: outcome.warnings,
        })
    }

    /// Reads a translation file and ingests its rows for `language_code`.
    ///
    /// # Parameters
    /// - `resource`: The resource the file belongs to.
    /// - `language_code`: The language the file translates into.
    /// - `path`: Path to the translation file; the format is inferred from
    ///   its extension.
    ///
    /// # Returns
    ///
    /// An [`IngestReport`], or an `Error` when the extension or language is
    /// unknown, or the file cannot be read or parsed.
    pub fn ingest_translation_file<P: AsRef<Path>>(
        &mut self,
        resource: &Resource,
        language_code: &str,
        path: P,
    ) -> Result<IngestReport, Error> {
        let path = path.as_ref();
        let method = method_for(path)?;
        let content = fs::read(path)?;
        self.ingest_translation(resource, language_code, method, content.as_slice())
    }

    /// Parses translation-file bytes with an explicit method and ingests
    /// them.
    ///
    /// Rows land unreviewed; fuzzy and unapproved entries become stored
    /// suggestions instead of translations. Unlike source files, a
    /// translation file that yields no rows is fine and reports zero.
    pub fn ingest_translation(
        &mut self,
        resource: &Resource,
        language_code: &str,
        method: I18nMethod,
        content: &[u8],
    ) -> Result<IngestReport, Error> {
        let codec = codec_for(method);
        let language = self.catalog.language_for(language_code)?;
        let outcome = handler::parse_translation(codec, resource, &language, content)?;
        let strings = self
            .store
            .ingest_translations(resource, &language, &outcome.stringset, false);
        let suggestions = self.record_suggestions(resource, &language, &outcome.suggestions);
        Ok(IngestReport {
            method,
            strings,
            suggestions,
            warnings: outcome.warnings,
        })
    }

    /// Compiles the stored template of `resource` for one language.
    ///
    /// # Parameters
    /// - `resource`: The resource to compile; its template must have been
    ///   stored by an earlier source-file ingest.
    /// - `language_code`: The language to compile for.
    /// - `options`: Mode and pseudo-translation settings.
    ///
    /// # Returns
    ///
    /// The complete file body, or an `Error` when no template is stored,
    /// the language is unknown, or compilation fails.
    pub fn compile_to_string(
        &self,
        resource: &Resource,
        language_code: &str,
        options: &CompileOptions<'_>,
    ) -> Result<String, Error> {
        let stored = self.stored_template(resource)?;
        let language = self.catalog.language_for(language_code)?;
        let codec = codec_for(stored.method);
        handler::compile(
            codec,
            &stored.content,
            resource,
            &language,
            &self.store,
            options,
        )
    }

    /// Compiles the stored template of `resource` and writes the result to
    /// `path`, encoded the way the format expects on disk.
    ///
    /// Apple strings files are written as UTF-16LE with a BOM and Java
    /// properties as ISO-8859-1; everything else is UTF-8. A compiled Java
    /// properties body holding a character outside ISO-8859-1 is rejected.
    pub fn compile_to_file<P: AsRef<Path>>(
        &self,
        resource: &Resource,
        language_code: &str,
        options: &CompileOptions<'_>,
        path: P,
    ) -> Result<(), Error> {
        let method = self.stored_template(resource)?.method;
        let content = self.compile_to_string(resource, language_code, options)?;
        let bytes = encode_output(method, &content)?;
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Caches the stored translations of (resource, language) to a JSON
    /// file.
    ///
    /// # Parameters
    /// - `resource`: The resource whose translations to cache.
    /// - `language_code`: The language to cache.
    /// - `path`: Path to the JSON file to write.
    ///
    /// # Returns
    ///
    /// How many rows were written, or an `Error` if the language is
    /// unknown or writing fails.
    pub fn cache_translations_to_file<P: AsRef<Path>>(
        &self,
        resource: &Resource,
        language_code: &str,
        path: P,
    ) -> Result<usize, Error> {
        let language = self.catalog.language_for(language_code)?;
        let mut cached = Vec::new();
        if let Some(entities) = self.store.entities(resource) {
            for row in self.store.translations(resource, &language, false, None) {
                let Some(entity) = entities.get(row.source_entity) else {
                    continue;
                };
                let mut translation = GenericTranslation::new(entity.string.clone(), row.text);
                translation.context = entity.context.clone();
                translation.rule = row.rule;
                translation.pluralized = entity.pluralized;
                cached.push(translation);
            }
        }
        let json = serde_json::to_string_pretty(&cached)?;
        fs::write(path, json)?;
        Ok(cached.len())
    }

    /// Loads translations cached by [`Session::cache_translations_to_file`]
    /// back into the store.
    ///
    /// Loaded rows land unreviewed, like any other translation ingest.
    ///
    /// # Parameters
    /// - `resource`: The resource the cache belongs to; its source file
    ///   must already be ingested so rows can be matched to entities.
    /// - `language_code`: The language of the cached rows.
    /// - `path`: Path to the JSON file to read.
    ///
    /// # Returns
    ///
    /// How many rows were stored, or an `Error` if the language is
    /// unknown, the file cannot be read, or the JSON does not parse.
    pub fn load_translations_from_file<P: AsRef<Path>>(
        &mut self,
        resource: &Resource,
        language_code: &str,
        path: P,
    ) -> Result<usize, Error> {
        let language = self.catalog.language_for(language_code)?;
        let json = fs::read_to_string(path)?;
        let rows: Vec<GenericTranslation> = serde_json::from_str(&json)?;
        let mut stringset = StringSet::new();
        for row in rows {
            stringset.add(row);
        }
        Ok(self
            .store
            .ingest_translations(resource, &language, &stringset, false))
    }

    /// The template stored for `resource`, if a source file was ingested.
    pub fn template(&self, resource: &Resource) -> Option<&str> {
        self.templates
            .get(&resource.slug)
            .map(|stored| stored.content.as_str())
    }

    fn stored_template(&self, resource: &Resource) -> Result<&StoredTemplate, Error> {
        self.templates
            .get(&resource.slug)
            .ok_or_else(|| Error::MissingTemplate(resource.slug.clone()))
    }

    fn record_suggestions(
        &mut self,
        resource: &Resource,
        language: &Language,
        suggestions: &StringSet,
    ) -> usize {
        for row in suggestions.strings() {
            self.store.accept(resource, language, row);
        }
        suggestions.len()
    }
}

fn method_for(path: &Path) -> Result<I18nMethod, Error> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    guess_method(filename, None).ok_or_else(|| Error::UnknownMethod(path.display().to_string()))
}

/// Encodes a compiled body for disk.
fn encode_output(method: I18nMethod, content: &str) -> Result<Vec<u8>, Error> {
    match method {
        I18nMethod::Strings => {
            let mut bytes = Vec::with_capacity(2 + content.len() * 2);
            bytes.extend_from_slice(&[0xFF, 0xFE]);
            for unit in content.encode_utf16() {
                bytes.extend_from_slice(&unit.to_le_bytes());
            }
            Ok(bytes)
        }
        I18nMethod::JavaProperties => {
            let mut bytes = Vec::with_capacity(content.len());
            for ch in content.chars() {
                let code = ch as u32;
                if code > 0xFF {
                    return Err(CompileError::template(
                        method,
                        format!("character `{ch}` does not fit ISO-8859-1"),
                    )
                    .into());
                }
                bytes.push(code as u8);
            }
            Ok(bytes)
        }
        _ => Ok(content.as_bytes().to_vec()),
    }
}
