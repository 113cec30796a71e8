//! Registry of build targets and the resolution of their options and sources.
//!
//! Targets move through three states: `declared` when registered, `configuring` once anything
//! about them changes, and `resolved` once a [`ResolvedTarget`] has been handed out. Resolved
//! targets can no longer be changed.
//!
//! ```no_run
//! use rig_scope::Statement;
//! use rig_target::{Anchor, SourceRule, TargetRegistry};
//! use rig_types::{OptionKey, TargetKind};
//!
//! let mut registry = TargetRegistry::new("/path/to/project");
//! let id = registry.register("tagged-format-test-runner", TargetKind::Executable)?;
//! registry
//!     .target_mut(id)
//!     .expect("just registered")
//!     .configure([Statement::append(
//!         OptionKey::LinkFlags,
//!         ["-lUnitTest", "-lTaggedFormat"],
//!     )])?
//!     .set_source_rule(SourceRule::glob(Anchor::ProjectRoot, "**/*.cpp")?)?;
//!
//! let resolved = registry.resolve("tagged-format-test-runner")?;
//! println!("{resolved}");
//! # Ok::<(), rig_target::Error>(())
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use compact_str::CompactString;
use rayon::prelude::*;
use rig_matcher::{Matcher, Pattern};
use rig_ore::{assert_none, id_gen::Gen};
use rig_scope::{ConfigurationScope, Statement};
use rig_types::{Configuration, ParseError, TargetKind, TargetName};

mod definition;
mod resolved;
mod rule;


pub use definition::{TargetDefinition, TargetState};
pub use resolved::ResolvedTarget;
pub use rule::{Anchor, CustomRule, RuleFn, SourceContext, SourceRule};

/// Pattern used by [`SourceRule::Default`] unless configured otherwise.
pub const DEFAULT_SOURCE_PATTERN: &str = "*.{c,cc,cpp,cxx}";

/// Errors from declaring or resolving targets.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("target '{0}' is already registered")]
    DuplicateTarget(TargetName),
    #[error("no target named '{0}'")]
    UnknownTarget(CompactString),
    #[error("target '{0}' already has a source rule")]
    SourceRuleAlreadySet(TargetName),
    #[error("target '{0}' has already been resolved")]
    TargetAlreadyResolved(TargetName),
    #[error("invalid directory {directory:?} for target '{target}': {reason}")]
    InvalidDirectory {
        target: TargetName,
        directory: PathBuf,
        reason: &'static str,
    },
    #[error("project defaults can't change once a target has been resolved")]
    DefaultsFrozen,
    #[error(transparent)]
    InvalidName(#[from] ParseError),
    #[error("failed to resolve sources for target '{target}'")]
    Sources {
        target: TargetName,
        #[source]
        source: rig_matcher::Error,
    },
    #[error("source {path:?} of target '{target}' is outside of the project root")]
    SourceOutsideRoot { target: TargetName, path: PathBuf },
    #[error(transparent)]
    Matcher(#[from] rig_matcher::Error),
}

impl Error {
    /// The name of the target this error points at, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            Error::DuplicateTarget(name)
            | Error::SourceRuleAlreadySet(name)
            | Error::TargetAlreadyResolved(name)
            | Error::InvalidDirectory { target: name, .. }
            | Error::Sources { target: name, .. }
            | Error::SourceOutsideRoot { target: name, .. } => Some(name.as_str()),
            Error::UnknownTarget(name) => Some(name.as_str()),
            Error::DefaultsFrozen | Error::InvalidName(_) | Error::Matcher(_) => None,
        }
    }
}

/// All of the targets declared during one evaluation pass.
#[derive(Debug)]
pub struct TargetRegistry {
    /// Absolute root of the project.
    root: PathBuf,
    /// How we find files on disk.
    matcher: Matcher,
    /// Pattern for [`SourceRule::Default`].
    default_sources: Pattern,
    /// Whether [`TargetRegistry::resolve_all`] fans out across threads.
    parallel: bool,

    /// Options every target inherits.
    defaults: ConfigurationScope,
    /// Set once any target resolved against `defaults`.
    defaults_frozen: bool,

    /// Map of [`TargetName`] to [`TargetId`].
    names: BTreeMap<TargetName, TargetId>,
    /// Map of [`TargetId`] to [`TargetDefinition`], IDs increase so this is registration order.
    targets: BTreeMap<TargetId, TargetDefinition>,
    /// ID generator for targets.
    id_gen: Gen<TargetId>,
}

impl TargetRegistry {
    /// Create a new, empty [`TargetRegistry`] for the project at `root`.
    ///
    /// A relative `root` is resolved against the current directory, once, here.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        let root = root.into();
        let root = match std::env::current_dir() {
            Ok(cwd) => rig_matcher::normalize(&cwd.join(root)),
            Err(err) => {
                tracing::warn!(?root, %err, "no current directory, root stays as given");
                rig_matcher::normalize(&root)
            }
        };
        TargetRegistry {
            root,
            matcher: Matcher::new(),
            default_sources: Pattern::new(DEFAULT_SOURCE_PATTERN)
                .expect("default source pattern is valid"),
            parallel: false,
            defaults: ConfigurationScope::new(),
            defaults_frozen: false,
            names: BTreeMap::default(),
            targets: BTreeMap::default(),
            id_gen: Gen::default(),
        }
    }

    pub fn with_matcher(mut self, matcher: Matcher) -> Self {
        self.matcher = matcher;
        self
    }

    /// Use `pattern` for targets that don't set their own source rule.
    pub fn with_default_sources(mut self, pattern: Pattern) -> Self {
        self.default_sources = pattern;
        self
    }

    pub fn with_parallel_resolution(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Register a new target named `name`.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidName`] if `name` is not a valid [`TargetName`].
    /// * [`Error::DuplicateTarget`] if a target named `name` already exists.
    pub fn register(&mut self, name: &str, kind: TargetKind) -> Result<TargetId, Error> {
        let name = TargetName::new(name)?;
        if self.names.contains_key(&name) {
            return Err(Error::DuplicateTarget(name));
        }

        let id = self.id_gen.next();
        let prev = self.names.insert(name.clone(), id);
        assert_none!(prev);
        let prev = self
            .targets
            .insert(id, TargetDefinition::new(name.clone(), kind));
        assert_none!(prev);

        tracing::debug!(target_name = %name, %kind, ?id, "registered target");
        Ok(id)
    }

    /// Get the target named `name`.
    pub fn get(&self, name: &str) -> Result<&TargetDefinition, Error> {
        let id = self.lookup(name)?;
        Ok(self.targets.get(&id).expect("names and targets out of sync"))
    }

    /// Get the target named `name` for configuration.
    pub fn get_mut(&mut self, name: &str) -> Result<&mut TargetDefinition, Error> {
        let id = self.lookup(name)?;
        Ok(self
            .targets
            .get_mut(&id)
            .expect("names and targets out of sync"))
    }

    pub fn target(&self, id: TargetId) -> Option<&TargetDefinition> {
        self.targets.get(&id)
    }

    pub fn target_mut(&mut self, id: TargetId) -> Option<&mut TargetDefinition> {
        self.targets.get_mut(&id)
    }

    /// Every target, in the order they were registered.
    pub fn all(&self) -> impl Iterator<Item = &TargetDefinition> + '_ {
        self.targets.values()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Options inherited by every target.
    pub fn defaults(&self) -> &ConfigurationScope {
        &self.defaults
    }

    /// Layer `statements` onto the options every target inherits.
    ///
    /// # Errors
    ///
    /// * [`Error::DefaultsFrozen`] once any target has been resolved.
    pub fn configure_defaults<I>(&mut self, statements: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = Statement>,
    {
        if self.defaults_frozen {
            return Err(Error::DefaultsFrozen);
        }
        self.defaults.apply_all(statements);
        Ok(())
    }

    /// Resolve the target named `name`, freezing it.
    ///
    /// # Errors
    ///
    /// * [`Error::UnknownTarget`] if no such target exists.
    /// * [`Error::TargetAlreadyResolved`] if it was resolved before.
    /// * [`Error::Sources`] if its source rule fails, the target stays unresolved.
    pub fn resolve(&mut self, name: &str) -> Result<ResolvedTarget, Error> {
        let id = self.lookup(name)?;
        let definition = &self.targets[&id];
        if definition.is_resolved() {
            return Err(Error::TargetAlreadyResolved(definition.name().clone()));
        }

        let parent = self.defaults.resolve();
        let resolved = self.compute(definition, &parent)?;
        self.commit(id, &resolved);

        Ok(resolved)
    }

    /// Resolve every target that hasn't been resolved yet, in registration order.
    ///
    /// This is all-or-nothing: sources for every pending target are computed first, if any of
    /// them fail the error is returned and no target changes state.
    pub fn resolve_all(&mut self) -> Result<Vec<ResolvedTarget>, Error> {
        let pending: Vec<TargetId> = self
            .targets
            .iter()
            .filter(|(_, definition)| !definition.is_resolved())
            .map(|(id, _)| *id)
            .collect();
        let parent = self.defaults.resolve();

        let resolved: Vec<ResolvedTarget> = if self.parallel {
            pending
                .par_iter()
                .map(|id| self.compute(&self.targets[id], &parent))
                .collect::<Result<Vec<_>, Error>>()?
        } else {
            pending
                .iter()
                .map(|id| self.compute(&self.targets[id], &parent))
                .collect::<Result<Vec<_>, Error>>()?
        };

        for (id, target) in pending.iter().zip(&resolved) {
            self.commit(*id, target);
        }
        tracing::info!(
            count = resolved.len(),
            parallel = self.parallel,
            "resolved targets"
        );

        Ok(resolved)
    }

    /// Forget every target and default, ready for the next evaluation pass.
    pub fn reset(&mut self) {
        tracing::debug!(targets = self.targets.len(), "resetting registry");
        self.names.clear();
        self.targets.clear();
        self.defaults = ConfigurationScope::new();
        self.defaults_frozen = false;
        self.id_gen.reset();
    }

    fn lookup(&self, name: &str) -> Result<TargetId, Error> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownTarget(CompactString::new(name)))
    }

    /// Compute the [`ResolvedTarget`] for `definition` without changing any state.
    fn compute(
        &self,
        definition: &TargetDefinition,
        parent: &Configuration,
    ) -> Result<ResolvedTarget, Error> {
        let configuration = definition.scope().resolve_with(parent);
        let directory = self.root.join(definition.directory());

        let failed = |source| Error::Sources {
            target: definition.name().clone(),
            source,
        };

        let sources = match definition.source_rule() {
            SourceRule::Default => self
                .matcher
                .match_files(&directory, &self.default_sources)
                .map_err(failed)?,
            SourceRule::Glob { anchor, pattern } => {
                let base = match anchor {
                    Anchor::ProjectRoot => self.root.as_path(),
                    Anchor::TargetDirectory => directory.as_path(),
                };
                self.matcher.match_files(base, pattern).map_err(failed)?
            }
            SourceRule::Custom(custom) => {
                let context = SourceContext {
                    root: &self.root,
                    directory: &directory,
                    target: definition.name(),
                    matcher: &self.matcher,
                };
                let sources = custom.call(&context).map_err(failed)?;
                self.within_root(definition, sources)?
            }
        };

        Ok(ResolvedTarget::new(
            definition.name().clone(),
            definition.kind(),
            self.root.clone(),
            configuration,
            sources,
        ))
    }

    /// Make custom rule output absolute, sorted and distinct, all of it inside the root.
    fn within_root(
        &self,
        definition: &TargetDefinition,
        sources: Vec<PathBuf>,
    ) -> Result<Vec<PathBuf>, Error> {
        let mut absolute = Vec::with_capacity(sources.len());
        for source in sources {
            let path = rig_matcher::normalize(&self.root.join(&source));
            if !path.starts_with(&self.root) {
                return Err(Error::SourceOutsideRoot {
                    target: definition.name().clone(),
                    path: source,
                });
            }
            absolute.push(path);
        }
        rig_matcher::sort_paths(&mut absolute);
        Ok(absolute)
    }

    fn commit(&mut self, id: TargetId, resolved: &ResolvedTarget) {
        self.defaults_frozen = true;
        let definition = self
            .targets
            .get_mut(&id)
            .expect("committing unknown target");
        definition.mark_resolved();
        tracing::info!(
            target_name = %resolved.name(),
            sources = resolved.sources().len(),
            fingerprint = %resolved.fingerprint(),
            "resolved target"
        );
    }
}

/// ID for a [`TargetDefinition`] in a [`TargetRegistry`], also the handle returned by
/// [`TargetRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TargetId(u64);

impl From<u64> for TargetId {
    fn from(value: u64) -> Self {
        TargetId(value)
    }
}
