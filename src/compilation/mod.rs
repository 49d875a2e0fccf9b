//! Translation selection and template assembly.
//!
//! Compilation works in three layers: a [`TranslationsBuilder`] selects which
//! translations to use for a [`crate::mode::Mode`], a [`Decorator`] prepares
//! each one for output, and a [`Compiler`] drives the codec's hook pipeline
//! over the stored template. [`FactoryKind`] ties the first two together per
//! format.

pub mod builders;
pub mod compilers;
pub mod decorators;
pub mod factories;

pub use builders::{BuilderKind, BuiltTranslations, TranslationsBuilder, SOURCE_FILL_MARKER};
pub use compilers::{CompileContext, Compiler, EntityReplacement, Replacements, substitute_tags};
pub use decorators::{Decorator, EscapeFn, no_escape};
pub use factories::FactoryKind;
