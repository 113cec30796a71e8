use std::collections::BTreeMap;

use rig_cfg::Setting;
use serde::Deserialize;

pub static DESCRIPTION_FILENAME: Setting<&'static str> = Setting::new(
    "description_filename",
    "The filename of the build description at the root of a project.",
    "rig.toml",
);

/// A build description, parsed from a [`DESCRIPTION_FILENAME`].
///
/// ```toml
/// [settings]
/// default_source_pattern = "*.cpp"
///
/// [defaults]
/// cxxflags = ["-std=c++20"]
///
/// [[target]]
/// name = "tagged-format-test-runner"
/// kind = "executable"
/// configure = { linkflags = ["-lUnitTest", "-lTaggedFormat"] }
/// sources = { anchor = "root", patterns = ["**/*.cpp"] }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildDescription {
    /// Overrides for [`Setting`]s, by name.
    #[serde(default)]
    pub settings: BTreeMap<String, toml::Value>,
    /// Options inherited by every target.
    #[serde(default)]
    pub defaults: BTreeMap<String, Vec<String>>,
    /// Targets, in declaration order.
    #[serde(default, rename = "target")]
    pub targets: Vec<TargetSpec>,
}

impl BuildDescription {
    pub fn from_toml(raw: &str) -> Result<Self, anyhow::Error> {
        let description = toml::from_str(raw)?;
        Ok(description)
    }

    /// Settings overrides rendered as strings, ready for [`rig_cfg::SettingSet::try_update`].
    pub fn setting_overrides(&self) -> Result<Vec<(&str, String)>, anyhow::Error> {
        self.settings
            .iter()
            .map(|(name, value)| {
                let value = match value {
                    toml::Value::String(s) => s.clone(),
                    toml::Value::Boolean(b) => b.to_string(),
                    toml::Value::Integer(i) => i.to_string(),
                    other => anyhow::bail!(
                        "setting '{name}' must be a string, boolean or integer, found {}",
                        other.type_str()
                    ),
                };
                Ok((name.as_str(), value))
            })
            .collect()
    }
}

/// Declaration of a single target.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetSpec {
    pub name: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    /// Directory relative to the project root, defaults to the root.
    #[serde(default)]
    pub directory: Option<String>,
    /// Options to clear, applied before `configure`.
    #[serde(default)]
    pub clear: Vec<String>,
    /// Options to append to.
    #[serde(default)]
    pub configure: BTreeMap<String, Vec<String>>,
    /// Overrides the default source rule.
    #[serde(default)]
    pub sources: Option<SourcesSpec>,
}

fn default_kind() -> String {
    "executable".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourcesSpec {
    #[serde(default)]
    pub anchor: AnchorSpec,
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnchorSpec {
    /// The project root.
    #[default]
    Root,
    /// The target's directory.
    Directory,
}

impl From<AnchorSpec> for rig_target::Anchor {
    fn from(value: AnchorSpec) -> Self {
        match value {
            AnchorSpec::Root => rig_target::Anchor::ProjectRoot,
            AnchorSpec::Directory => rig_target::Anchor::TargetDirectory,
        }
    }
}
