//! Mapping from mode flags to compiler wiring.
//!
//! Each format names a [`FactoryKind`]; the kind decides which
//! [`BuilderKind`] serves a given [`Mode`] and which [`Decorator`] wraps
//! the format's escape function.

use crate::{
    compilation::{
        builders::BuilderKind,
        decorators::{Decorator, EscapeFn},
    },
    mode::Mode,
    pseudo::PseudoType,
};

/// Per-format compiler wiring policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactoryKind {
    /// Reviewed-or-all selection, nothing filled.
    Simple,
    /// Untranslated entities fill from source unless the mode asks for
    /// translated-only output.
    FillEmpty,
    /// Untranslated entities always fill from source.
    AlwaysFillEmpty,
    /// Source fill with the `_txss` marker, so the format can comment the
    /// filled lines out.
    MarkedSource,
    /// Marked source fill only when TRANSLATED is requested; otherwise a
    /// plain reviewed-or-all selection (Apple strings).
    TranslatedMarkedSource,
    /// No translations and no text: skeleton output (POT).
    Empty,
}

impl FactoryKind {
    /// The builder serving `mode` under this policy.
    pub fn builder_kind(self, mode: Mode) -> BuilderKind {
        let reviewed = mode.contains(Mode::REVIEWED);
        let translated = mode.contains(Mode::TRANSLATED);
        match self {
            FactoryKind::Simple => {
                if reviewed {
                    BuilderKind::Reviewed
                } else {
                    BuilderKind::All
                }
            }
            FactoryKind::FillEmpty => {
                if reviewed && translated {
                    BuilderKind::ReviewedSourceFill
                } else if reviewed {
                    BuilderKind::Reviewed
                } else if translated {
                    BuilderKind::All
                } else {
                    BuilderKind::SourceFill
                }
            }
            FactoryKind::AlwaysFillEmpty => {
                if reviewed {
                    BuilderKind::ReviewedSourceFill
                } else {
                    BuilderKind::SourceFill
                }
            }
            FactoryKind::MarkedSource => {
                if reviewed {
                    BuilderKind::ReviewedMarkedSourceFill
                } else {
                    BuilderKind::MarkedSourceFill
                }
            }
            FactoryKind::TranslatedMarkedSource => {
                if translated {
                    BuilderKind::MarkedSourceFill
                } else if reviewed {
                    BuilderKind::Reviewed
                } else {
                    BuilderKind::All
                }
            }
            FactoryKind::Empty => BuilderKind::Empty,
        }
    }

    /// The decorator for this policy.
    ///
    /// Decoration is independent of the mode: pseudo when a pseudo type is
    /// given, plain escaping otherwise. The `Empty` policy discards text
    /// and ignores `pseudo`.
    pub fn decorator<'a>(
        self,
        escape: EscapeFn,
        pseudo: Option<&'a dyn PseudoType>,
    ) -> Decorator<'a> {
        if self == FactoryKind::Empty {
            return Decorator::empty();
        }
        match pseudo {
            Some(pseudo) => Decorator::pseudo(escape, pseudo),
            None => Decorator::normal(escape),
        }
    }
}
