use std::fmt;
use std::path::{Path, PathBuf};

use rig_ore::hash::Fingerprinter;
use rig_types::{Configuration, Fingerprint, TargetKind, TargetName};

/// A fully resolved target, ready to be handed to a build engine.
///
/// Sources are absolute, distinct, and sorted by their full path string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    name: TargetName,
    kind: TargetKind,
    /// Project root the target was resolved against.
    root: PathBuf,
    configuration: Configuration,
    sources: Vec<PathBuf>,
    fingerprint: Fingerprint,
}

impl ResolvedTarget {
    /// Create a new [`ResolvedTarget`], `sources` must already be sorted and deduplicated.
    pub(crate) fn new(
        name: TargetName,
        kind: TargetKind,
        root: PathBuf,
        configuration: Configuration,
        sources: Vec<PathBuf>,
    ) -> Self {
        let fingerprint = fingerprint(&name, kind, &root, &configuration, &sources);
        ResolvedTarget {
            name,
            kind,
            root,
            configuration,
            sources,
            fingerprint,
        }
    }

    pub fn name(&self) -> &TargetName {
        &self.name
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// Sources relative to the project root.
    pub fn relative_sources(&self) -> impl Iterator<Item = &Path> + '_ {
        self.sources
            .iter()
            .map(|source| source.strip_prefix(&self.root).unwrap_or(source.as_path()))
    }

    /// Digest of the name, kind, configuration and sources of this target.
    ///
    /// Sources are hashed relative to the project root so the same checkout produces the same
    /// fingerprint wherever it lives.
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }
}

impl fmt::Display for ResolvedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({}) [{}]", self.name, self.kind, self.fingerprint)?;
        for (key, values) in self.configuration.iter() {
            write!(f, "  {key}:")?;
            for value in values {
                write!(f, " {value}")?;
            }
            writeln!(f)?;
        }
        for source in self.relative_sources() {
            writeln!(f, "  - {}", source.display())?;
        }
        Ok(())
    }
}

fn fingerprint(
    name: &TargetName,
    kind: TargetKind,
    root: &Path,
    configuration: &Configuration,
    sources: &[PathBuf],
) -> Fingerprint {
    let mut hasher = Fingerprinter::new();
    hasher.update_str(name.as_str());
    hasher.update_str(kind.as_str());

    for (key, values) in configuration.iter() {
        hasher.update_str(key.as_str());
        hasher.update_u64(u64::try_from(values.len()).expect("fits in a u64"));
        for value in values {
            hasher.update_str(value);
        }
    }

    hasher.update_u64(u64::try_from(sources.len()).expect("fits in a u64"));
    for source in sources {
        let source = source.strip_prefix(root).unwrap_or(source.as_path());
        hasher.update_bytes(source.as_os_str().as_encoded_bytes());
    }

    hasher.digest()
}
