#![forbid(unsafe_code)]
//! Translation file format engine for Rust.
//!
//! Parses localization files into a format-agnostic string model, stores the
//! extracted strings behind a pluggable storage seam, and compiles them back
//! into complete files of the same format. Source files additionally produce
//! a *template*: the original file body with every translatable text swapped
//! for a placeholder tag, which later compile runs fill with the stored
//! translations of any target language.
//!
//! # Quick Start
//!
//! ```rust
//! use trcodec::{CompileOptions, I18nMethod, Resource, Session};
//!
//! let resource = Resource::new("app", "en");
//! let mut session = Session::new();
//!
//! // Ingest the source file, then a French translation of it.
//! session.ingest_source(&resource, I18nMethod::Po, b"msgid \"Hello\"\nmsgstr \"\"\n")?;
//! session.ingest_translation(
//!     &resource,
//!     "fr",
//!     I18nMethod::Po,
//!     b"msgid \"Hello\"\nmsgstr \"Bonjour\"\n",
//! )?;
//!
//! // Compile the stored template back into a French PO file.
//! let compiled = session.compile_to_string(&resource, "fr", &CompileOptions::default())?;
//! assert!(compiled.contains("msgstr \"Bonjour\""));
//! # Ok::<(), trcodec::Error>(())
//! ```
//!
//! File-based workflows go through [`Session::ingest_source_file`] and
//! [`Session::compile_to_file`]; callers with their own storage implement
//! [`store::TranslationStore`] and use the [`handler`] functions directly.
//!
//! # Supported Formats
//!
//! - **Gettext PO/POT**: entries, plural groups, fuzzy and obsolete flags
//! - **XLIFF 1.2**: trans-units and plural groups, approval states
//! - **Qt Linguist TS**: contexts, numerus forms, unfinished states
//! - **Properties**: plain UTF-8, Java ISO-8859-1, Mozilla and Unicode dialects
//! - **XML DTD** entity declarations
//! - **Joomla INI**: old and new quoting styles
//! - **Apple `.strings`**: UTF-16 and UTF-8
//! - **Desktop entries**: `Key[lang]=value` lines
//! - **MediaWiki markup**
//!
//! # Features
//!
//! - 🔄 Template-based round trip: compiled files keep the source file's
//!   layout, comments and ordering
//! - 🌍 Plural handling per target language, including slot-count rewrites
//!   when source and target disagree
//! - 📦 In-memory store included; the storage seam is a trait
//! - 🧪 Pseudo-localization decorators for layout testing

pub mod compilation;
pub mod error;
pub mod formats;
pub mod handler;
pub mod language;
pub mod mode;
pub mod pseudo;
pub mod session;
pub mod store;
pub mod tags;
pub mod types;

// Re-export most used types for easy consumption
pub use crate::{
    error::{CompileError, Error, ParseError},
    formats::I18nMethod,
    handler::{CompileOptions, ParseOutcome, Warning, Warnings},
    language::{Language, LanguageCatalog, builtin_catalog},
    mode::Mode,
    session::{IngestReport, Session},
    store::MemoryStore,
    types::{GenericTranslation, PluralRule, Resource, StringSet},
};
