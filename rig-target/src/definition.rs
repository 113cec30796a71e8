use std::fmt;
use std::path::{Component, Path, PathBuf};

use rig_scope::{ConfigurationScope, Statement};
use rig_types::{TargetKind, TargetName};

use crate::{Error, SourceRule};

/// Lifecycle of a [`TargetDefinition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    /// Registered, nothing configured yet.
    Declared,
    /// At least one mutator has been called.
    Configuring,
    /// Handed off as a [`ResolvedTarget`], no further changes are allowed.
    ///
    /// [`ResolvedTarget`]: crate::ResolvedTarget
    Resolved,
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TargetState::Declared => "declared",
            TargetState::Configuring => "configuring",
            TargetState::Resolved => "resolved",
        };
        f.write_str(s)
    }
}

/// A named target along with its options and source rule.
#[derive(Debug)]
pub struct TargetDefinition {
    name: TargetName,
    kind: TargetKind,
    /// Directory of the target relative to the project root, empty for the root itself.
    directory: PathBuf,
    state: TargetState,
    scope: ConfigurationScope,
    /// Custom source rule, `None` means [`SourceRule::Default`].
    rule: Option<SourceRule>,
}

impl TargetDefinition {
    pub(crate) fn new(name: TargetName, kind: TargetKind) -> Self {
        TargetDefinition {
            name,
            kind,
            directory: PathBuf::new(),
            state: TargetState::Declared,
            scope: ConfigurationScope::new(),
            rule: None,
        }
    }

    /// Layer `statements` on top of whatever was configured before.
    ///
    /// # Errors
    ///
    /// * [`Error::TargetAlreadyResolved`] if this target has been resolved.
    pub fn configure<I>(&mut self, statements: I) -> Result<&mut Self, Error>
    where
        I: IntoIterator<Item = Statement>,
    {
        self.begin_mutation()?;
        for statement in statements {
            tracing::trace!(target_name = %self.name, ?statement, "configure");
            self.scope.apply(statement);
        }
        Ok(self)
    }

    /// Replace the default source rule, at most once.
    ///
    /// # Errors
    ///
    /// * [`Error::TargetAlreadyResolved`] if this target has been resolved.
    /// * [`Error::SourceRuleAlreadySet`] if a rule was set before, the first one stays active.
    pub fn set_source_rule(&mut self, rule: SourceRule) -> Result<&mut Self, Error> {
        self.ensure_mutable()?;
        if let Some(existing) = &self.rule {
            tracing::debug!(
                target_name = %self.name,
                existing = %existing.describe(),
                rejected = %rule.describe(),
                "source rule already set"
            );
            return Err(Error::SourceRuleAlreadySet(self.name.clone()));
        }

        self.begin_mutation()?;
        tracing::debug!(target_name = %self.name, rule = %rule.describe(), "set source rule");
        self.rule = Some(rule);
        Ok(self)
    }

    /// Set the directory, relative to the project root, that the default source rule scans.
    ///
    /// # Errors
    ///
    /// * [`Error::TargetAlreadyResolved`] if this target has been resolved.
    /// * [`Error::InvalidDirectory`] if `directory` is absolute or contains `..`.
    pub fn set_directory<P: AsRef<Path>>(&mut self, directory: P) -> Result<&mut Self, Error> {
        self.ensure_mutable()?;
        let directory = directory.as_ref();

        let mut normalized = PathBuf::new();
        for component in directory.components() {
            match component {
                Component::Normal(part) => normalized.push(part),
                Component::CurDir => (),
                Component::ParentDir => {
                    return Err(self.invalid_directory(directory, "must not contain '..'"));
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(self.invalid_directory(directory, "must be relative"));
                }
            }
        }

        self.begin_mutation()?;
        self.directory = normalized;
        Ok(self)
    }

    pub fn name(&self) -> &TargetName {
        &self.name
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    pub fn state(&self) -> TargetState {
        self.state
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn scope(&self) -> &ConfigurationScope {
        &self.scope
    }

    /// The active source rule.
    pub fn source_rule(&self) -> &SourceRule {
        self.rule.as_ref().unwrap_or(&SourceRule::Default)
    }

    pub fn is_resolved(&self) -> bool {
        self.state == TargetState::Resolved
    }

    pub(crate) fn mark_resolved(&mut self) {
        assert_ne!(
            self.state,
            TargetState::Resolved,
            "target '{}' resolved twice",
            self.name
        );
        tracing::debug!(target_name = %self.name, from = %self.state, "resolved");
        self.state = TargetState::Resolved;
    }

    fn ensure_mutable(&self) -> Result<(), Error> {
        match self.state {
            TargetState::Resolved => Err(Error::TargetAlreadyResolved(self.name.clone())),
            TargetState::Declared | TargetState::Configuring => Ok(()),
        }
    }

    fn begin_mutation(&mut self) -> Result<(), Error> {
        self.ensure_mutable()?;
        if self.state == TargetState::Declared {
            tracing::debug!(target_name = %self.name, "configuring");
            self.state = TargetState::Configuring;
        }
        Ok(())
    }

    fn invalid_directory(&self, directory: &Path, reason: &'static str) -> Error {
        Error::InvalidDirectory {
            target: self.name.clone(),
            directory: directory.to_path_buf(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use rig_types::OptionKey;

    use super::*;

    fn definition() -> TargetDefinition {
        let name = TargetName::new("runner").unwrap();
        TargetDefinition::new(name, TargetKind::Executable)
    }

    #[test]
    fn first_mutation_starts_configuring() {
        let mut def = definition();
        assert_eq!(def.state(), TargetState::Declared);

        def.configure([Statement::append(OptionKey::LinkFlags, ["-lA"])])
            .unwrap();
        assert_eq!(def.state(), TargetState::Configuring);
    }

    #[test]
    fn empty_configure_still_starts_configuring() {
        let mut def = definition();
        def.configure(Vec::new()).unwrap();
        assert_eq!(def.state(), TargetState::Configuring);
    }

    #[test]
    fn directories_are_normalized() {
        let mut def = definition();
        def.set_directory("./test/./unit").unwrap();
        assert_eq!(def.directory(), Path::new("test/unit"));

        let err = def.set_directory("../elsewhere").unwrap_err();
        assert!(matches!(err, Error::InvalidDirectory { .. }), "{err:?}");
        let err = def.set_directory("/abs").unwrap_err();
        assert!(matches!(err, Error::InvalidDirectory { .. }), "{err:?}");

        // Failed calls leave the previous value in place.
        assert_eq!(def.directory(), Path::new("test/unit"));
    }

    #[test]
    fn default_rule_until_set() {
        let mut def = definition();
        assert!(matches!(def.source_rule(), SourceRule::Default));

        let rule = SourceRule::glob(crate::Anchor::ProjectRoot, "**/*.cpp").unwrap();
        def.set_source_rule(rule).unwrap();
        assert!(matches!(def.source_rule(), SourceRule::Glob { .. }));
    }
}
