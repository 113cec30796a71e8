//! Types used throughout `rig`.
//!
//! The goal of this crate is to be very lightweight, so take care with adding dependencies.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use compact_str::CompactString;

/// Errors from parsing the textual forms of the types in this crate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid target name '{name}': {reason}")]
    InvalidTargetName {
        name: CompactString,
        reason: &'static str,
    },
    #[error("unknown option key '{0}'")]
    UnknownOptionKey(CompactString),
    #[error("unknown target kind '{0}'")]
    UnknownTargetKind(CompactString),
}

/// Unique name of a build target, e.g. `tagged-format-test-runner`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TargetName(CompactString);

impl TargetName {
    /// Validate and create a new [`TargetName`].
    ///
    /// # Errors
    ///
    /// * If `name` is empty.
    /// * If `name` contains whitespace or a path separator.
    pub fn new(name: &str) -> Result<Self, ParseError> {
        let invalid = |reason| ParseError::InvalidTargetName {
            name: CompactString::new(name),
            reason,
        };

        if name.is_empty() {
            return Err(invalid("name is empty"));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(invalid("name contains whitespace"));
        }
        if name.contains(['/', '\\']) {
            return Err(invalid("name contains a path separator"));
        }

        Ok(TargetName(CompactString::new(name)))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for TargetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TargetName {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TargetName::new(s)
    }
}

impl AsRef<str> for TargetName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Allows looking up maps keyed by [`TargetName`] with a plain `&str`.
impl Borrow<str> for TargetName {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

/// The kind of artifact a target produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TargetKind {
    Executable,
    StaticLibrary,
    SharedLibrary,
}

impl TargetKind {
    pub const ALL: &'static [TargetKind] = &[
        TargetKind::Executable,
        TargetKind::StaticLibrary,
        TargetKind::SharedLibrary,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Executable => "executable",
            TargetKind::StaticLibrary => "static-library",
            TargetKind::SharedLibrary => "shared-library",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TargetKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ParseError::UnknownTargetKind(CompactString::new(s)))
    }
}

/// The closed set of options a target can be configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OptionKey {
    /// Flags passed to the linker, e.g. `-lUnitTest`.
    LinkFlags,
    /// Flags passed to the C compiler.
    CFlags,
    /// Flags passed to the C++ compiler.
    CxxFlags,
    /// Preprocessor definitions, e.g. `NDEBUG` or `LEVEL=2`.
    Defines,
    /// Include search directories.
    Includes,
    /// Libraries to link against.
    Libs,
    /// Library search directories.
    LibDirs,
}

impl OptionKey {
    pub const ALL: &'static [OptionKey] = &[
        OptionKey::LinkFlags,
        OptionKey::CFlags,
        OptionKey::CxxFlags,
        OptionKey::Defines,
        OptionKey::Includes,
        OptionKey::Libs,
        OptionKey::LibDirs,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            OptionKey::LinkFlags => "linkflags",
            OptionKey::CFlags => "cflags",
            OptionKey::CxxFlags => "cxxflags",
            OptionKey::Defines => "defines",
            OptionKey::Includes => "includes",
            OptionKey::Libs => "libs",
            OptionKey::LibDirs => "libdirs",
        }
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionKey {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OptionKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| ParseError::UnknownOptionKey(CompactString::new(s)))
    }
}

/// Frozen, flattened configuration of a target.
///
/// Keys without any values are never stored, so `iter` only yields keys that matter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Configuration {
    options: BTreeMap<OptionKey, Vec<CompactString>>,
}

impl Configuration {
    /// An empty [`Configuration`].
    pub fn empty() -> Self {
        Configuration::default()
    }

    /// Build a [`Configuration`] from `(key, values)` pairs, dropping empty lists.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (OptionKey, Vec<CompactString>)>,
    {
        let options = entries
            .into_iter()
            .filter(|(_, values)| !values.is_empty())
            .collect();
        Configuration { options }
    }

    /// Values for `key`, empty if the key is not set.
    pub fn get(&self, key: OptionKey) -> &[CompactString] {
        self.options.get(&key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains(&self, key: OptionKey) -> bool {
        self.options.contains_key(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (OptionKey, &[CompactString])> + '_ {
        self.options
            .iter()
            .map(|(key, values)| (*key, values.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, values) in self.iter() {
            write!(f, "{key} =")?;
            for value in values {
                write!(f, " {value}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Reproducible 64-bit digest of a resolved target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub const fn new(val: u64) -> Self {
        Fingerprint(val)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_names() {
        assert!(TargetName::new("tagged-format-test-runner").is_ok());
        assert!(TargetName::new("lib_core.v2").is_ok());

        for bad in ["", "two words", "dir/name", "dir\\name", "tab\tname"] {
            let err = TargetName::new(bad).unwrap_err();
            assert!(
                matches!(err, ParseError::InvalidTargetName { .. }),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn option_keys_parse_from_names() {
        for key in OptionKey::ALL {
            assert_eq!(key.as_str().parse::<OptionKey>().unwrap(), *key);
        }
        assert_eq!(
            "ldflags".parse::<OptionKey>().unwrap_err(),
            ParseError::UnknownOptionKey("ldflags".into())
        );
    }

    #[test]
    fn target_kinds_parse_from_names() {
        assert_eq!(
            "executable".parse::<TargetKind>().unwrap(),
            TargetKind::Executable
        );
        assert_eq!(
            "shared-library".parse::<TargetKind>().unwrap(),
            TargetKind::SharedLibrary
        );
        assert!("dylib".parse::<TargetKind>().is_err());
    }

    #[test]
    fn configuration_drops_empty_keys() {
        let config = Configuration::from_entries([
            (OptionKey::LinkFlags, vec!["-lA".into(), "-lB".into()]),
            (OptionKey::Libs, vec![]),
        ]);

        assert_eq!(config.get(OptionKey::LinkFlags), ["-lA", "-lB"]);
        assert!(config.get(OptionKey::Libs).is_empty());
        assert!(!config.contains(OptionKey::Libs));
        assert_eq!(config.to_string(), "linkflags = -lA -lB\n");
    }

    #[test]
    fn fingerprint_display_is_fixed_width() {
        assert_eq!(Fingerprint::new(0xab).to_string(), "00000000000000ab");
    }
}
