//! Drives a single evaluation pass of a build description.
//!
//! An [`Evaluation`] reads a [`BuildDescription`], declares every target in a fresh
//! [`TargetRegistry`], and resolves them into [`ResolvedTarget`]s for a build engine to consume.
//! Custom source rules can't be expressed in a description, callers that need them declare
//! targets directly through [`Evaluation::registry_mut`].

use std::path::{Path, PathBuf};

use anyhow::Context;
use rig_cfg::SettingSet;
use rig_matcher::{Matcher, Pattern};
use rig_scope::Statement;
use rig_target::{ResolvedTarget, SourceRule, TargetRegistry};
use rig_types::{OptionKey, TargetKind};

pub mod cfgs;
pub mod defs;

use crate::defs::{BuildDescription, TargetSpec, DESCRIPTION_FILENAME};

/// Prefix for environment variables that override settings, e.g. `RIG_FOLLOW_SYMLINKS`.
pub static ENV_PREFIX: &str = "RIG";

/// Configuration for creating an [`Evaluation`].
#[derive(Debug, Clone)]
pub struct EvaluationConfig {
    /// Root directory of the project, where the user's files live.
    pub root: PathBuf,
    /// Settings for the evaluation pass.
    pub settings: SettingSet,
}

impl EvaluationConfig {
    /// Config for the project at `root` with every setting at its default.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        let mut builder = SettingSet::builder();
        cfgs::all_settings(&mut builder);
        EvaluationConfig {
            root: root.into(),
            settings: builder.build(),
        }
    }

    /// Like [`EvaluationConfig::new`] but with settings overridden from the environment.
    pub fn from_env<P: Into<PathBuf>>(root: P) -> Result<Self, anyhow::Error> {
        let mut config = EvaluationConfig::new(root);
        let applied = config
            .settings
            .apply_env(ENV_PREFIX)
            .context("applying settings from the environment")?;
        tracing::debug!(applied, "read settings from the environment");
        Ok(config)
    }
}

/// State for evaluating build descriptions of a single project.
#[derive(Debug)]
pub struct Evaluation {
    /// Root directory of the project.
    root: PathBuf,
    /// Settings from the [`EvaluationConfig`], never modified.
    base: SettingSet,
    /// Settings for the current pass, `base` plus the description's overrides.
    settings: SettingSet,
    /// Targets declared during the current pass.
    registry: TargetRegistry,
}

impl Evaluation {
    pub fn new(config: EvaluationConfig) -> Result<Self, anyhow::Error> {
        let EvaluationConfig { root, settings } = config;
        let registry = build_registry(&root, &settings)?;

        Ok(Evaluation {
            root,
            base: settings.clone(),
            settings,
            registry,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Settings of the current pass, including overrides from its build description.
    pub fn settings(&self) -> &SettingSet {
        &self.settings
    }

    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    /// The registry for the current pass, for declaring targets programmatically.
    pub fn registry_mut(&mut self) -> &mut TargetRegistry {
        &mut self.registry
    }

    /// Read the build description at the root of the project.
    pub fn load(&self) -> Result<BuildDescription, anyhow::Error> {
        let filename = DESCRIPTION_FILENAME.read(&self.base);
        let path = self.root.join(filename.as_str());
        tracing::info!(?path, "reading build description");

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("reading build description {}", path.display()))?;
        BuildDescription::from_toml(&raw)
            .with_context(|| format!("parsing build description {}", path.display()))
    }

    /// [`Evaluation::load`] followed by [`Evaluation::evaluate`].
    pub fn evaluate_project(&mut self) -> Result<Vec<ResolvedTarget>, anyhow::Error> {
        let description = self.load()?;
        self.evaluate(&description)
    }

    /// Declare every target in `description` and resolve them, in declaration order.
    ///
    /// Each call is a new pass: targets, defaults and settings overrides from an earlier pass
    /// are all forgotten first.
    pub fn evaluate(
        &mut self,
        description: &BuildDescription,
    ) -> Result<Vec<ResolvedTarget>, anyhow::Error> {
        tracing::info!(
            root = ?self.root,
            targets = description.targets.len(),
            "evaluating build description"
        );

        let mut settings = self.base.clone();
        for (name, value) in description.setting_overrides()? {
            settings
                .try_update(name, &value)
                .context("applying settings from the build description")?;
        }
        self.registry = build_registry(&self.root, &settings)?;
        self.settings = settings;

        let defaults = description
            .defaults
            .iter()
            .map(|(key, values)| append(key, values))
            .collect::<Result<Vec<_>, _>>()
            .context("invalid project defaults")?;
        self.registry.configure_defaults(defaults)?;

        for spec in &description.targets {
            declare(&mut self.registry, spec)
                .with_context(|| format!("invalid declaration of target '{}'", spec.name))?;
        }

        let resolved = self.registry.resolve_all()?;
        tracing::info!(count = resolved.len(), "evaluated build description");

        Ok(resolved)
    }

    /// Forget every target and default from the current pass. Settings overrides are replaced
    /// by the next [`Evaluation::evaluate`].
    pub fn reset(&mut self) {
        self.registry.reset();
    }
}

fn build_registry(root: &Path, settings: &SettingSet) -> Result<TargetRegistry, anyhow::Error> {
    let default_pattern = cfgs::DEFAULT_SOURCE_PATTERN.read(settings);
    let default_sources = Pattern::new(&default_pattern)
        .with_context(|| format!("invalid '{}' setting", cfgs::DEFAULT_SOURCE_PATTERN.name()))?;

    let mut matcher = Matcher::new().with_follow_symlinks(cfgs::FOLLOW_SYMLINKS.read(settings));
    let ignore = cfgs::IGNORE_PATTERN.read(settings);
    let ignore: Vec<&str> = ignore
        .split(',')
        .map(str::trim)
        .filter(|pattern| !pattern.is_empty())
        .collect();
    if !ignore.is_empty() {
        let ignore = Pattern::any_of(ignore)
            .with_context(|| format!("invalid '{}' setting", cfgs::IGNORE_PATTERN.name()))?;
        matcher = matcher.with_ignore(ignore);
    }

    let registry = TargetRegistry::new(root)
        .with_matcher(matcher)
        .with_default_sources(default_sources)
        .with_parallel_resolution(cfgs::PARALLEL_RESOLUTION.read(settings));
    Ok(registry)
}

fn append(key: &str, values: &[String]) -> Result<Statement, anyhow::Error> {
    let key: OptionKey = key.parse()?;
    Ok(Statement::append(key, values.iter().map(String::as_str)))
}

fn declare(registry: &mut TargetRegistry, spec: &TargetSpec) -> Result<(), anyhow::Error> {
    let kind: TargetKind = spec.kind.parse()?;
    registry.register(&spec.name, kind)?;
    let target = registry.get_mut(&spec.name)?;

    if let Some(directory) = &spec.directory {
        target.set_directory(directory)?;
    }

    let mut statements = Vec::with_capacity(spec.clear.len() + spec.configure.len());
    for key in &spec.clear {
        statements.push(Statement::clear(key.parse()?));
    }
    for (key, values) in &spec.configure {
        statements.push(append(key, values)?);
    }
    target.configure(statements)?;

    if let Some(sources) = &spec.sources {
        let rule = SourceRule::globs(sources.anchor.into(), &sources.patterns)?;
        target.set_source_rule(rule)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn init_logging() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    fn relative(target: &ResolvedTarget) -> Vec<String> {
        target
            .relative_sources()
            .map(|path| path.to_string_lossy().replace('\\', "/"))
            .collect()
    }

    fn project(description: &str) -> tempfile::TempDir {
        let temp = tempfile::TempDir::new().unwrap();
        touch(temp.path(), "test/main.cpp");
        touch(temp.path(), "test/format/tagged.cpp");
        touch(temp.path(), "test/format/tagged.h");
        touch(temp.path(), "lib/format.cc");
        fs::write(temp.path().join("rig.toml"), description).unwrap();
        temp
    }

    #[test]
    fn smoketest_evaluate_project() {
        init_logging();
        let temp = project(
            r#"
[defaults]
cxxflags = ["-std=c++20"]

[[target]]
name = "tagged-format-test-runner"
directory = "test"
configure = { linkflags = ["-lUnitTest", "-lTaggedFormat"] }
sources = { patterns = ["**/*.cpp"] }

[[target]]
name = "format"
kind = "static-library"
directory = "lib"
            "#,
        );

        let mut evaluation = Evaluation::new(EvaluationConfig::new(temp.path())).unwrap();
        let resolved = evaluation.evaluate_project().unwrap();
        assert_eq!(resolved.len(), 2);

        let runner = &resolved[0];
        assert_eq!(runner.name().as_str(), "tagged-format-test-runner");
        assert_eq!(
            runner.configuration().get(OptionKey::LinkFlags),
            ["-lUnitTest", "-lTaggedFormat"]
        );
        assert_eq!(
            runner.configuration().get(OptionKey::CxxFlags),
            ["-std=c++20"]
        );
        assert_eq!(
            relative(runner),
            ["test/format/tagged.cpp", "test/main.cpp"]
        );

        let format = &resolved[1];
        assert_eq!(format.kind(), TargetKind::StaticLibrary);
        assert_eq!(relative(format), ["lib/format.cc"]);
    }

    #[test]
    fn description_settings_apply() {
        let temp = project(
            r#"
[settings]
default_source_pattern = "**/*.h"
parallel_resolution = true

[[target]]
name = "headers"
directory = "test"
            "#,
        );

        let mut evaluation = Evaluation::new(EvaluationConfig::new(temp.path())).unwrap();
        let resolved = evaluation.evaluate_project().unwrap();
        assert_eq!(relative(&resolved[0]), ["test/format/tagged.h"]);
        assert!(cfgs::PARALLEL_RESOLUTION.read(evaluation.settings()));
    }

    #[test]
    fn ignore_setting_skips_directories() {
        let temp = project(
            r#"
[settings]
ignore_pattern = "**/format, build"

[[target]]
name = "runner"
sources = { anchor = "root", patterns = ["**/*.cpp"] }
            "#,
        );

        let mut evaluation = Evaluation::new(EvaluationConfig::new(temp.path())).unwrap();
        let resolved = evaluation.evaluate_project().unwrap();
        assert_eq!(relative(&resolved[0]), ["test/main.cpp"]);
    }

    #[test]
    fn errors_name_the_target() {
        let temp = project(
            r#"
[[target]]
name = "runner"
configure = { ldflags = ["-lm"] }
            "#,
        );

        let mut evaluation = Evaluation::new(EvaluationConfig::new(temp.path())).unwrap();
        let err = evaluation.evaluate_project().unwrap_err();
        let rendered = format!("{err:#}");
        assert!(rendered.contains("target 'runner'"), "{rendered}");
        assert!(rendered.contains("unknown option key 'ldflags'"), "{rendered}");
    }

    #[test]
    fn malformed_patterns_fail_at_declaration() {
        let temp = project(
            r#"
[[target]]
name = "runner"
sources = { patterns = ["test**/*.cpp"] }
            "#,
        );

        let mut evaluation = Evaluation::new(EvaluationConfig::new(temp.path())).unwrap();
        let err = evaluation.evaluate_project().unwrap_err();
        let rendered = format!("{err:#}");
        assert!(rendered.contains("invalid declaration of target 'runner'"), "{rendered}");
        assert!(rendered.contains("invalid glob pattern"), "{rendered}");
        assert_eq!(
            evaluation.registry().get("runner").unwrap().state(),
            rig_target::TargetState::Declared
        );
    }

    #[test]
    fn duplicate_targets() {
        let description = BuildDescription::from_toml(
            r#"
[[target]]
name = "app"

[[target]]
name = "app"
            "#,
        )
        .unwrap();

        let temp = project("");
        let mut evaluation = Evaluation::new(EvaluationConfig::new(temp.path())).unwrap();
        let err = evaluation.evaluate(&description).unwrap_err();
        assert!(format!("{err:#}").contains("already registered"));
    }

    #[test]
    fn passes_do_not_leak() {
        let temp = project("");
        let first = BuildDescription::from_toml(
            r#"
[defaults]
linkflags = ["-lA"]

[[target]]
name = "a"
            "#,
        )
        .unwrap();
        let second = BuildDescription::from_toml(
            r#"
[[target]]
name = "a"

[[target]]
name = "b"
            "#,
        )
        .unwrap();

        let mut evaluation = Evaluation::new(EvaluationConfig::new(temp.path())).unwrap();
        evaluation.evaluate(&first).unwrap();
        let resolved = evaluation.evaluate(&second).unwrap();

        assert_eq!(resolved.len(), 2);
        assert!(resolved[0].configuration().is_empty());
        assert_eq!(evaluation.registry().len(), 2);
    }

    #[test]
    fn settings_do_not_leak_between_passes() {
        let temp = project("");
        touch(temp.path(), "a.cpp");
        touch(temp.path(), "a.h");
        let headers = BuildDescription::from_toml(
            r#"
[settings]
default_source_pattern = "*.h"
description_filename = "other.toml"

[[target]]
name = "app"
            "#,
        )
        .unwrap();
        let plain = BuildDescription::from_toml(
            r#"
[[target]]
name = "app"
            "#,
        )
        .unwrap();

        let mut evaluation = Evaluation::new(EvaluationConfig::new(temp.path())).unwrap();
        let resolved = evaluation.evaluate(&headers).unwrap();
        assert_eq!(relative(&resolved[0]), ["a.h"]);
        assert_eq!(
            cfgs::DEFAULT_SOURCE_PATTERN.read(evaluation.settings()),
            "*.h"
        );
        // Where the description lives can't be changed by the description itself.
        assert!(evaluation.load().is_ok());

        let resolved = evaluation.evaluate(&plain).unwrap();
        assert_eq!(relative(&resolved[0]), ["a.cpp"]);
        assert_eq!(
            cfgs::DEFAULT_SOURCE_PATTERN.read(evaluation.settings()),
            rig_target::DEFAULT_SOURCE_PATTERN
        );
    }

    #[test]
    fn programmatic_custom_rules() {
        let temp = project("");
        let mut evaluation = Evaluation::new(EvaluationConfig::new(temp.path())).unwrap();

        let registry = evaluation.registry_mut();
        let id = registry.register("generated", TargetKind::Executable).unwrap();
        registry
            .target_mut(id)
            .unwrap()
            .set_source_rule(SourceRule::custom("headers-and-sources", |ctx| {
                let mut sources = ctx.glob("test/**/*.cpp")?;
                sources.extend(ctx.glob("test/**/*.h")?);
                Ok(sources)
            }))
            .unwrap();

        let resolved = registry.resolve_all().unwrap();
        assert_eq!(
            relative(&resolved[0]),
            ["test/format/tagged.cpp", "test/format/tagged.h", "test/main.cpp"]
        );
    }

    #[test]
    fn missing_description() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut evaluation = Evaluation::new(EvaluationConfig::new(temp.path())).unwrap();
        let err = evaluation.evaluate_project().unwrap_err();
        assert!(format!("{err:#}").contains("reading build description"));
    }

    #[test]
    fn settings_from_env() {
        std::env::set_var("RIG_DESCRIPTION_FILENAME", "BUILD.rig.toml");
        let config = EvaluationConfig::from_env("/unused");
        std::env::remove_var("RIG_DESCRIPTION_FILENAME");

        let config = config.unwrap();
        assert_eq!(
            DESCRIPTION_FILENAME.read(&config.settings),
            "BUILD.rig.toml"
        );
    }

    #[test]
    fn invalid_settings_are_reported() {
        let mut config = EvaluationConfig::new("/unused");
        config
            .settings
            .try_update("default_source_pattern", "src**")
            .unwrap();
        let err = Evaluation::new(config).unwrap_err();
        assert!(format!("{err:#}").contains("default_source_pattern"));
    }
}
