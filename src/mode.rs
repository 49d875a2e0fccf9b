//! Compilation mode flags.
//!
//! A [`Mode`] selects which translations a compile run includes. Flags are
//! power-of-two bits combined with `|` and queried with `contains`.

use bitflags::bitflags;

bitflags! {
    /// Compile-time switches for translation selection.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Mode: u32 {
        /// The format's default selection.
        const DEFAULT = 0b001;
        /// Include everything translated.
        const TRANSLATED = 0b010;
        /// Include reviewed translations only.
        const REVIEWED = 0b100;
    }
}

impl Default for Mode {
    fn default() -> Self {
        Mode::DEFAULT
    }
}
