//! Source rules, i.e. how a target finds its source files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use compact_str::CompactString;
use derivative::Derivative;
use rig_matcher::{Matcher, Pattern};
use rig_types::TargetName;

/// Signature of a custom source rule.
pub type RuleFn =
    dyn Fn(&SourceContext<'_>) -> Result<Vec<PathBuf>, rig_matcher::Error> + Send + Sync;

/// Directory a glob [`SourceRule`] is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// The root of the project.
    ProjectRoot,
    /// The target's own directory.
    TargetDirectory,
}

/// Determines which files make up a target's sources.
#[derive(Debug, Clone)]
pub enum SourceRule {
    /// Files in the target's directory, non-recursively, matching the registry's default
    /// source pattern.
    Default,
    /// Files matching `pattern` underneath `anchor`.
    Glob { anchor: Anchor, pattern: Pattern },
    /// An arbitrary function.
    Custom(CustomRule),
}

impl SourceRule {
    /// A rule matching `pattern` underneath `anchor`.
    ///
    /// # Errors
    ///
    /// * [`rig_matcher::Error::InvalidGlobPattern`] if `pattern` is malformed.
    pub fn glob(anchor: Anchor, pattern: &str) -> Result<Self, rig_matcher::Error> {
        let pattern = Pattern::new(pattern)?;
        Ok(SourceRule::Glob { anchor, pattern })
    }

    /// A rule matching any of `patterns` underneath `anchor`.
    pub fn globs<I, S>(anchor: Anchor, patterns: I) -> Result<Self, rig_matcher::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let pattern = Pattern::any_of(patterns)?;
        Ok(SourceRule::Glob { anchor, pattern })
    }

    /// A rule backed by an arbitrary function, `label` shows up in logs.
    pub fn custom<F>(label: &str, func: F) -> Self
    where
        F: Fn(&SourceContext<'_>) -> Result<Vec<PathBuf>, rig_matcher::Error>
            + Send
            + Sync
            + 'static,
    {
        SourceRule::Custom(CustomRule {
            label: CompactString::new(label),
            func: Arc::new(func),
        })
    }

    /// Short description for logging.
    pub fn describe(&self) -> String {
        match self {
            SourceRule::Default => "default".to_string(),
            SourceRule::Glob { anchor, pattern } => format!("glob({anchor:?}, {pattern})"),
            SourceRule::Custom(custom) => format!("custom({})", custom.label()),
        }
    }
}

/// A [`SourceRule`] backed by a function.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct CustomRule {
    label: CompactString,
    #[derivative(Debug = "ignore")]
    func: Arc<RuleFn>,
}

impl CustomRule {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn call(
        &self,
        context: &SourceContext<'_>,
    ) -> Result<Vec<PathBuf>, rig_matcher::Error> {
        (self.func)(context)
    }
}

/// What a custom [`SourceRule`] gets to work with.
#[derive(Debug)]
pub struct SourceContext<'a> {
    pub(crate) root: &'a Path,
    pub(crate) directory: &'a Path,
    pub(crate) target: &'a TargetName,
    pub(crate) matcher: &'a Matcher,
}

impl<'a> SourceContext<'a> {
    /// Absolute path of the project root.
    pub fn root(&self) -> &'a Path {
        self.root
    }

    /// Absolute path of the target's directory.
    pub fn directory(&self) -> &'a Path {
        self.directory
    }

    pub fn target(&self) -> &'a TargetName {
        self.target
    }

    /// Files underneath the project root matching `pattern`.
    pub fn glob(&self, pattern: &str) -> Result<Vec<PathBuf>, rig_matcher::Error> {
        self.matcher.glob(self.root, pattern)
    }

    /// Files underneath the target's directory matching `pattern`.
    pub fn glob_directory(&self, pattern: &str) -> Result<Vec<PathBuf>, rig_matcher::Error> {
        self.matcher.glob(self.directory, pattern)
    }
}
