//! All error types for the trcodec crate.
//!
//! Parsing failures and compile failures keep their own enums so callers can
//! react to them separately; both fold into the top-level [`Error`].

use thiserror::Error;

use crate::formats::I18nMethod;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("unknown language `{0}`")]
    UnknownLanguage(String),

    #[error("unknown format method `{0}`")]
    UnknownMethod(String),

    /// Compiling needs the template stored by a source-file ingest.
    #[error("resource `{0}` has no stored template")]
    MissingTemplate(String),

    #[error("translation cache is not valid JSON: {0}")]
    Cache(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Recoverable problems during parsing are collected as warnings instead;
/// a `ParseError` aborts the parse of the whole file.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("{method} input is not valid {encoding}")]
    InvalidEncoding {
        method: I18nMethod,
        encoding: &'static str,
    },

    #[error("{method} syntax error: {detail}")]
    Syntax { method: I18nMethod, detail: String },

    #[error("{method} lexical error at byte {offset}: {detail}")]
    Lexical {
        method: I18nMethod,
        offset: usize,
        detail: String,
    },

    #[error("source plural entry `{msgid}` has {slots} msgstr slots, expected 2")]
    SourcePluralSlots { msgid: String, slots: usize },

    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("document root is `{found}`, expected `{expected}`")]
    UnexpectedRoot {
        expected: &'static str,
        found: String,
    },

    #[error("XLIFF file is missing the version attribute")]
    MissingXliffVersion,

    #[error("file source-language `{found}` does not match resource source language `{expected}`")]
    SourceLanguageMismatch { expected: String, found: String },

    #[error("file target-language `{found}` does not match requested language `{expected}`")]
    TargetLanguageMismatch { expected: String, found: String },

    #[error("translation variants are not supported in source files")]
    VariantsInSource,
}

impl ParseError {
    pub fn syntax(method: I18nMethod, detail: impl Into<String>) -> Self {
        ParseError::Syntax {
            method,
            detail: detail.into(),
        }
    }

    pub fn lexical(method: I18nMethod, offset: usize, detail: impl Into<String>) -> Self {
        ParseError::Lexical {
            method,
            offset,
            detail: detail.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum CompileError {
    /// Plural compilation was requested from a codec that has no plural
    /// template support.
    #[error("compiler is not initialized for plural compilation")]
    UninitializedCompiler,

    #[error("{method} template error: {detail}")]
    Template { method: I18nMethod, detail: String },

    #[error("XML error while compiling: {0}")]
    Xml(#[from] quick_xml::Error),
}

impl CompileError {
    pub fn template(method: I18nMethod, detail: impl Into<String>) -> Self {
        CompileError::Template {
            method,
            detail: detail.into(),
        }
    }
}
