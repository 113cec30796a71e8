//! Settings for `rig` itself.
//!
//! The types in this crate configure the evaluation pass, e.g. which files the default source
//! rule picks up. They should _not_ be used for the configuration of build targets, that's what
//! `rig-scope` is for.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fmt;

use compact_str::CompactString;
use rig_ore::assert_none;

/// A single named setting with a default value.
pub struct Setting<V: SettingDefault> {
    name: &'static str,
    desc: &'static str,
    default: V,
}

impl<V: SettingDefault> Setting<V> {
    /// Define a new [`Setting`] with a default value.
    pub const fn new(name: &'static str, desc: &'static str, default: V) -> Self {
        Setting {
            name,
            desc,
            default,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Read the value of this [`Setting`] from the provided [`SettingSet`].
    ///
    /// # Panics
    /// * If this [`Setting`] was never registered with the [`SettingSetBuilder`].
    pub fn read(&self, set: &SettingSet) -> V::Stored {
        let Some(entry) = set.settings.get(self.name) else {
            panic!("tried to read unregistered setting {}", self.name);
        };
        V::from_value(&entry.value)
    }
}

/// A set of [`Setting`]s and their current values.
#[derive(Clone, Debug)]
pub struct SettingSet {
    settings: BTreeMap<CompactString, SettingEntry>,
}

impl SettingSet {
    /// Returns a new [`SettingSetBuilder`].
    pub fn builder() -> SettingSetBuilder {
        SettingSetBuilder::default()
    }

    /// Update [`Setting`] in this [`SettingSet`] with the specified value.
    ///
    /// # Panics
    /// * If [`Setting`] was never registered with the [`SettingSetBuilder`] this set came from.
    pub fn update<V: SettingDefault>(&mut self, setting: &'static Setting<V>, value: V) {
        let entry = self
            .settings
            .get_mut(setting.name)
            .expect("tried to update unregistered setting");
        entry.value = value.to_value();
    }

    /// Update the [`Setting`] named `name` by parsing `value`.
    ///
    /// # Errors
    ///
    /// * If no setting named `name` exists in this set.
    /// * If the setting specified by `name` cannot parse `value`.
    pub fn try_update(&mut self, name: &str, value: &str) -> Result<(), anyhow::Error> {
        let entry = self
            .settings
            .get_mut(name)
            .ok_or_else(|| anyhow::anyhow!("no setting named '{name}' found"))?;
        entry.value = entry.value.parse_same(value).map_err(|err| {
            anyhow::anyhow!("invalid value '{value}' for setting '{name}': {err}")
        })?;
        tracing::debug!(setting = name, value, "updated setting");
        Ok(())
    }

    /// Override settings from environment variables named `<PREFIX>_<NAME>`.
    ///
    /// Returns the number of settings that were overridden.
    pub fn apply_env(&mut self, prefix: &str) -> Result<usize, anyhow::Error> {
        let names: Vec<_> = self.settings.keys().cloned().collect();
        let mut applied = 0;

        for name in names {
            let var = rig_ore::env::override_var(prefix, &name);
            let Some(value) = std::env::var_os(&var) else {
                continue;
            };
            let value = value
                .into_string()
                .map_err(|_| anyhow::anyhow!("environment variable {var} is not UTF-8"))?;
            self.try_update(&name, &value)?;
            applied += 1;
        }

        Ok(applied)
    }
}

impl fmt::Display for SettingSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, entry) in &self.settings {
            writeln!(f, "{} => {}\n\t└─ '{}'", name, entry.value, entry.desc)?;
        }
        Ok(())
    }
}

/// Single entry within a [`SettingSet`].
#[derive(Clone, Debug)]
struct SettingEntry {
    value: SettingValue,
    desc: &'static str,
}

/// A builder for a [`SettingSet`].
#[derive(Default, Debug)]
pub struct SettingSetBuilder {
    settings: BTreeMap<CompactString, SettingEntry>,
}

impl SettingSetBuilder {
    /// Register a [`Setting`] into this [`SettingSetBuilder`] with its default value.
    pub fn register<V: SettingDefault>(&mut self, setting: &'static Setting<V>) -> &mut Self {
        let entry = SettingEntry {
            value: setting.default.to_value(),
            desc: setting.desc,
        };
        let prev = self
            .settings
            .insert(CompactString::const_new(setting.name), entry);
        assert_none!(prev, "setting '{}' registered more than once", setting.name);
        self
    }

    /// Consumes this [`SettingSetBuilder`] constructing a [`SettingSet`].
    pub fn build(self) -> SettingSet {
        SettingSet {
            settings: self.settings,
        }
    }
}

/// Types that can be provided as a default to a [`Setting`].
pub trait SettingDefault {
    /// The type handed back when reading the setting.
    type Stored;

    fn to_value(&self) -> SettingValue;
    fn from_value(val: &SettingValue) -> Self::Stored;
}

impl SettingDefault for bool {
    type Stored = bool;

    fn to_value(&self) -> SettingValue {
        SettingValue::Bool(*self)
    }

    fn from_value(val: &SettingValue) -> Self::Stored {
        let SettingValue::Bool(val) = val else {
            panic!("programming error, found {val:?} for bool")
        };
        *val
    }
}

impl SettingDefault for &str {
    type Stored = CompactString;

    fn to_value(&self) -> SettingValue {
        SettingValue::Text(CompactString::new(self))
    }

    fn from_value(val: &SettingValue) -> Self::Stored {
        let SettingValue::Text(val) = val else {
            panic!("programming error, found {val:?} for string")
        };
        val.clone()
    }
}

/// "Type erased" setting values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SettingValue {
    Bool(bool),
    Text(CompactString),
}

impl SettingValue {
    /// Parse `raw` into a value of the same variant as `self`.
    fn parse_same(&self, raw: &str) -> Result<SettingValue, anyhow::Error> {
        let value = match self {
            SettingValue::Bool(_) => {
                let raw = raw.trim();
                match raw {
                    "1" | "yes" | "true" | "on" => SettingValue::Bool(true),
                    _ if rig_ore::env::is_falsey(OsStr::new(raw)) => SettingValue::Bool(false),
                    "off" => SettingValue::Bool(false),
                    other => anyhow::bail!("expected a boolean, found '{other}'"),
                }
            }
            SettingValue::Text(_) => SettingValue::Text(CompactString::new(raw)),
        };
        Ok(value)
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Bool(val) => write!(f, "{val}"),
            SettingValue::Text(val) => write!(f, "{val}"),
        }
    }
}
