//! All supported translation file formats.
//!
//! This module re-exports the codec of each format and provides the
//! [`I18nMethod`] enum plus the registry used to find a codec by method,
//! filename or mimetype.

pub mod desktop;
pub mod dtd;
pub mod joomla;
pub mod po;
pub mod properties;
pub mod qt;
pub mod strings;
pub mod wiki;
pub mod xliff;

mod xmlutil;

use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
    path::Path,
    str::FromStr,
};

use lazy_static::lazy_static;

// Reexporting the codecs for easier access
pub use desktop::DesktopCodec;
pub use dtd::DtdCodec;
pub use joomla::JoomlaCodec;
pub use po::{PoCodec, PotCodec};
pub use properties::{
    JavaPropertiesCodec, MozillaPropertiesCodec, PropertiesCodec, UnicodePropertiesCodec,
};
pub use qt::QtCodec;
pub use strings::StringsCodec;
pub use wiki::WikiCodec;
pub use xliff::XliffCodec;

use crate::{Error, handler::FormatCodec, language::Language};

/// Identifies one supported file format.
///
/// The four properties dialects are distinct methods because they disagree
/// on encoding and escaping even though they share a lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum I18nMethod {
    /// Gettext PO.
    Po,
    /// Gettext POT skeleton (empty msgstr output).
    Pot,
    /// Qt Linguist TS.
    Qt,
    /// XLIFF 1.2.
    Xliff,
    /// Plain UTF-8 properties.
    Properties,
    /// Java ISO-8859-1 properties with `\uXXXX` escapes.
    JavaProperties,
    /// Mozilla UTF-8 properties.
    MozillaProperties,
    /// Unicode (UTF-8) properties.
    UnicodeProperties,
    /// XML DTD entity declarations.
    Dtd,
    /// Joomla INI, old and new style.
    Ini,
    /// Apple strings.
    Strings,
    /// Freedesktop desktop entries.
    Desktop,
    /// MediaWiki markup.
    Wiki,
}

/// Registry metadata for one method.
#[derive(Debug, Clone, Copy)]
pub struct MethodInfo {
    pub description: &'static str,
    pub extensions: &'static [&'static str],
    pub mimetypes: &'static [&'static str],
}

impl I18nMethod {
    /// Every supported method, in registry order. Extension and mimetype
    /// guesses resolve ties by this order.
    pub const ALL: [I18nMethod; 13] = [
        I18nMethod::Po,
        I18nMethod::Pot,
        I18nMethod::Qt,
        I18nMethod::Xliff,
        I18nMethod::Properties,
        I18nMethod::JavaProperties,
        I18nMethod::MozillaProperties,
        I18nMethod::UnicodeProperties,
        I18nMethod::Dtd,
        I18nMethod::Ini,
        I18nMethod::Strings,
        I18nMethod::Desktop,
        I18nMethod::Wiki,
    ];

    pub fn info(&self) -> &'static MethodInfo {
        &REGISTRY[self]
    }

    /// The preferred file extension for this method.
    pub fn extension(&self) -> &'static str {
        self.info().extensions[0]
    }
}

lazy_static! {
    static ref REGISTRY: BTreeMap<I18nMethod, MethodInfo> = {
        let mut table = BTreeMap::new();
        table.insert(
            I18nMethod::Po,
            MethodInfo {
                description: "Gettext PO file",
                extensions: &["po"],
                mimetypes: &["text/x-po", "application/x-gettext"],
            },
        );
        table.insert(
            I18nMethod::Pot,
            MethodInfo {
                description: "Gettext POT file",
                extensions: &["pot"],
                mimetypes: &["text/x-pot"],
            },
        );
        table.insert(
            I18nMethod::Qt,
            MethodInfo {
                description: "Qt Linguist file",
                extensions: &["ts"],
                mimetypes: &["application/x-linguist"],
            },
        );
        table.insert(
            I18nMethod::Xliff,
            MethodInfo {
                description: "XLIFF 1.2 file",
                extensions: &["xlf", "xliff"],
                mimetypes: &["application/x-xliff+xml"],
            },
        );
        table.insert(
            I18nMethod::Properties,
            MethodInfo {
                description: "UTF-8 PROPERTIES file",
                extensions: &["properties"],
                mimetypes: &["text/x-properties"],
            },
        );
        table.insert(
            I18nMethod::JavaProperties,
            MethodInfo {
                description: "Java PROPERTIES file",
                extensions: &["properties"],
                mimetypes: &["text/x-java-properties"],
            },
        );
        table.insert(
            I18nMethod::MozillaProperties,
            MethodInfo {
                description: "Mozilla PROPERTIES file",
                extensions: &["properties"],
                mimetypes: &["text/x-mozilla-properties"],
            },
        );
        table.insert(
            I18nMethod::UnicodeProperties,
            MethodInfo {
                description: "Unicode PROPERTIES file",
                extensions: &["properties"],
                mimetypes: &["text/x-unicode-properties"],
            },
        );
        table.insert(
            I18nMethod::Dtd,
            MethodInfo {
                description: "DTD entity file",
                extensions: &["dtd"],
                mimetypes: &["application/xml-dtd"],
            },
        );
        table.insert(
            I18nMethod::Ini,
            MethodInfo {
                description: "Joomla INI file",
                extensions: &["ini"],
                mimetypes: &["text/x-joomla-ini"],
            },
        );
        table.insert(
            I18nMethod::Strings,
            MethodInfo {
                description: "Apple STRINGS file",
                extensions: &["strings"],
                mimetypes: &["text/x-strings"],
            },
        );
        table.insert(
            I18nMethod::Desktop,
            MethodInfo {
                description: "Desktop entry file",
                extensions: &["desktop"],
                mimetypes: &["application/x-desktop"],
            },
        );
        table.insert(
            I18nMethod::Wiki,
            MethodInfo {
                description: "MediaWiki markup",
                extensions: &["wiki"],
                mimetypes: &["text/x-wiki"],
            },
        );
        table
    };
}

/// Implements [`std::fmt::Display`] for [`I18nMethod`].
///
/// # Example
/// ```rust
/// use trcodec::formats::I18nMethod;
/// assert_eq!(I18nMethod::Po.to_string(), "PO");
/// assert_eq!(I18nMethod::MozillaProperties.to_string(), "MOZILLAPROPERTIES");
/// assert_eq!(I18nMethod::Ini.to_string(), "INI");
/// ```
impl Display for I18nMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            I18nMethod::Po => "PO",
            I18nMethod::Pot => "POT",
            I18nMethod::Qt => "QT",
            I18nMethod::Xliff => "XLIFF",
            I18nMethod::Properties => "PROPERTIES",
            I18nMethod::JavaProperties => "JAVAPROPERTIES",
            I18nMethod::MozillaProperties => "MOZILLAPROPERTIES",
            I18nMethod::UnicodeProperties => "UNICODEPROPERTIES",
            I18nMethod::Dtd => "DTD",
            I18nMethod::Ini => "INI",
            I18nMethod::Strings => "STRINGS",
            I18nMethod::Desktop => "DESKTOP",
            I18nMethod::Wiki => "WIKI",
        };
        write!(f, "{name}")
    }
}

/// Implements [`std::str::FromStr`] for [`I18nMethod`].
///
/// Accepts the `Display` names case-insensitively, plus `"joomla"` for
/// [`I18nMethod::Ini`]. Returns [`crate::Error::UnknownMethod`] otherwise.
///
/// # Example
/// ```rust
/// use trcodec::formats::I18nMethod;
/// use std::str::FromStr;
/// assert_eq!(I18nMethod::from_str("po").unwrap(), I18nMethod::Po);
/// assert_eq!(I18nMethod::from_str("joomla").unwrap(), I18nMethod::Ini);
/// assert!(I18nMethod::from_str("binary").is_err());
/// ```
impl FromStr for I18nMethod {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "po" => Ok(I18nMethod::Po),
            "pot" => Ok(I18nMethod::Pot),
            "qt" => Ok(I18nMethod::Qt),
            "xliff" => Ok(I18nMethod::Xliff),
            "properties" => Ok(I18nMethod::Properties),
            "javaproperties" | "java_properties" => Ok(I18nMethod::JavaProperties),
            "mozillaproperties" | "mozilla_properties" => Ok(I18nMethod::MozillaProperties),
            "unicodeproperties" | "unicode_properties" => Ok(I18nMethod::UnicodeProperties),
            "dtd" => Ok(I18nMethod::Dtd),
            "ini" | "joomla" => Ok(I18nMethod::Ini),
            "strings" => Ok(I18nMethod::Strings),
            "desktop" => Ok(I18nMethod::Desktop),
            "wiki" => Ok(I18nMethod::Wiki),
            other => Err(Error::UnknownMethod(other.to_string())),
        }
    }
}

/// The codec implementing a method.
pub fn codec_for(method: I18nMethod) -> &'static dyn FormatCodec {
    match method {
        I18nMethod::Po => &PoCodec,
        I18nMethod::Pot => &PotCodec,
        I18nMethod::Qt => &QtCodec,
        I18nMethod::Xliff => &XliffCodec,
        I18nMethod::Properties => &PropertiesCodec,
        I18nMethod::JavaProperties => &JavaPropertiesCodec,
        I18nMethod::MozillaProperties => &MozillaPropertiesCodec,
        I18nMethod::UnicodeProperties => &UnicodePropertiesCodec,
        I18nMethod::Dtd => &DtdCodec,
        I18nMethod::Ini => &JoomlaCodec,
        I18nMethod::Strings => &StringsCodec,
        I18nMethod::Desktop => &DesktopCodec,
        I18nMethod::Wiki => &WikiCodec,
    }
}

/// Guesses the method for a file, by extension first and mimetype second.
///
/// The bare `.properties` extension resolves to the plain UTF-8 dialect;
/// callers who know better pass the method explicitly.
pub fn guess_method(filename: &str, mimetype: Option<&str>) -> Option<I18nMethod> {
    if let Some(extension) = Path::new(filename).extension().and_then(|e| e.to_str()) {
        let extension = extension.to_ascii_lowercase();
        for method in I18nMethod::ALL {
            if method.info().extensions.contains(&extension.as_str()) {
                return Some(method);
            }
        }
    }
    if let Some(mimetype) = mimetype {
        for method in I18nMethod::ALL {
            if method.info().mimetypes.contains(&mimetype) {
                return Some(method);
            }
        }
    }
    None
}

/// Arbitrates between PO and POT; every other method passes through.
///
/// An explicit `wants_pot` wins. Otherwise a filename ending in `po`
/// selects PO and any other filename POT; without a filename the presence
/// of a target language decides.
pub fn appropriate_method(
    method: I18nMethod,
    language: Option<&Language>,
    filename: Option<&str>,
    wants_pot: bool,
) -> I18nMethod {
    if !matches!(method, I18nMethod::Po | I18nMethod::Pot) {
        return method;
    }
    if wants_pot {
        return I18nMethod::Pot;
    }
    if let Some(filename) = filename {
        if filename.to_ascii_lowercase().ends_with("po") {
            return I18nMethod::Po;
        }
        return I18nMethod::Pot;
    }
    if language.is_none() {
        I18nMethod::Pot
    } else {
        I18nMethod::Po
    }
}
