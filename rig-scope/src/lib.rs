//! Layered option scopes.
//!
//! A [`ConfigurationScope`] records the options declared at one level, e.g. the project wide
//! defaults or a single target. Resolving a scope on top of its parent's [`Configuration`]
//! appends the scope's values to the inherited ones, unless the scope cleared that key.

use std::collections::BTreeMap;

use compact_str::CompactString;
use rig_types::{Configuration, OptionKey};
use smallvec::SmallVec;

/// A single typed configuration statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Append `values` to `key`.
    Append {
        key: OptionKey,
        values: Vec<CompactString>,
    },
    /// Drop every value for `key`, including inherited ones.
    Clear { key: OptionKey },
}

impl Statement {
    /// Returns a [`Statement::Append`].
    pub fn append<I, S>(key: OptionKey, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>,
    {
        Statement::Append {
            key,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns a [`Statement::Clear`].
    pub fn clear(key: OptionKey) -> Self {
        Statement::Clear { key }
    }

    pub fn key(&self) -> OptionKey {
        match self {
            Statement::Append { key, .. } | Statement::Clear { key } => *key,
        }
    }
}

/// Values declared for a single key at this level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Entry {
    /// Whether the parent's values for this key are cut off.
    cleared: bool,
    values: SmallVec<[CompactString; 4]>,
}

/// Options declared at one level of configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigurationScope {
    entries: BTreeMap<OptionKey, Entry>,
}

impl ConfigurationScope {
    /// Create a new empty [`ConfigurationScope`].
    pub fn new() -> Self {
        ConfigurationScope::default()
    }

    /// Append `values` to `key`, after anything already declared or inherited.
    pub fn merge<I, S>(&mut self, key: OptionKey, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>,
    {
        let entry = self.entries.entry(key).or_default();
        entry.values.extend(values.into_iter().map(Into::into));
    }

    /// Remove every value of `key` at this level and stop inheriting it from the parent.
    pub fn clear(&mut self, key: OptionKey) {
        let entry = self.entries.entry(key).or_default();
        entry.cleared = true;
        entry.values.clear();
    }

    /// Apply a single [`Statement`].
    pub fn apply(&mut self, statement: Statement) {
        tracing::trace!(?statement, "applying statement");
        match statement {
            Statement::Append { key, values } => self.merge(key, values),
            Statement::Clear { key } => self.clear(key),
        }
    }

    /// Apply `statements` in order.
    pub fn apply_all<I: IntoIterator<Item = Statement>>(&mut self, statements: I) {
        for statement in statements {
            self.apply(statement);
        }
    }

    /// Returns if `key` was cleared at this level.
    pub fn is_cleared(&self, key: OptionKey) -> bool {
        self.entries
            .get(&key)
            .map(|entry| entry.cleared)
            .unwrap_or(false)
    }

    /// Values declared for `key` at this level only.
    pub fn declared(&self, key: OptionKey) -> &[CompactString] {
        self.entries
            .get(&key)
            .map(|entry| &entry.values[..])
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flatten this scope on its own, as if it had no parent.
    pub fn resolve(&self) -> Configuration {
        self.resolve_with(&Configuration::empty())
    }

    /// Flatten this scope on top of an inherited `parent`.
    ///
    /// For each key the result is the parent's values followed by this scope's values, or only
    /// this scope's values if the key was cleared here.
    pub fn resolve_with(&self, parent: &Configuration) -> Configuration {
        let mut options: BTreeMap<OptionKey, Vec<CompactString>> = parent
            .iter()
            .map(|(key, values)| (key, values.to_vec()))
            .collect();

        for (key, entry) in &self.entries {
            let values = options.entry(*key).or_default();
            if entry.cleared {
                values.clear();
            }
            values.extend(entry.values.iter().cloned());
        }

        Configuration::from_entries(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_appends() {
        let mut scope = ConfigurationScope::new();
        scope.merge(OptionKey::LinkFlags, ["-lA"]);
        scope.merge(OptionKey::LinkFlags, ["-lB"]);

        let config = scope.resolve();
        assert_eq!(config.get(OptionKey::LinkFlags), ["-lA", "-lB"]);
    }

    #[test]
    fn resolve_is_idempotent() {
        let mut scope = ConfigurationScope::new();
        scope.apply_all([
            Statement::append(OptionKey::Defines, ["NDEBUG"]),
            Statement::append(OptionKey::Includes, ["include", "third-party"]),
        ]);

        assert_eq!(scope.resolve(), scope.resolve());
    }

    #[test]
    fn child_appends_to_parent() {
        let mut defaults = ConfigurationScope::new();
        defaults.merge(OptionKey::LinkFlags, ["-lA"]);
        defaults.merge(OptionKey::Libs, ["m"]);
        let parent = defaults.resolve();

        let mut target = ConfigurationScope::new();
        target.merge(OptionKey::LinkFlags, ["-lB"]);

        let config = target.resolve_with(&parent);
        assert_eq!(config.get(OptionKey::LinkFlags), ["-lA", "-lB"]);
        assert_eq!(config.get(OptionKey::Libs), ["m"]);
    }

    #[test]
    fn clear_stops_inheritance() {
        let mut defaults = ConfigurationScope::new();
        defaults.merge(OptionKey::Libs, ["m", "pthread"]);
        let parent = defaults.resolve();

        let mut target = ConfigurationScope::new();
        target.merge(OptionKey::Libs, ["dropped"]);
        target.clear(OptionKey::Libs);

        let config = target.resolve_with(&parent);
        assert!(config.get(OptionKey::Libs).is_empty());
        assert!(!config.contains(OptionKey::Libs));
        assert!(target.is_cleared(OptionKey::Libs));

        // Merging after a clear starts from empty, still cut off from the parent.
        target.merge(OptionKey::Libs, ["numa"]);
        let config = target.resolve_with(&parent);
        assert_eq!(config.get(OptionKey::Libs), ["numa"]);
    }

    #[test]
    fn statements_report_their_key() {
        assert_eq!(
            Statement::append(OptionKey::CFlags, ["-O2"]).key(),
            OptionKey::CFlags
        );
        assert_eq!(Statement::clear(OptionKey::Libs).key(), OptionKey::Libs);
    }

    #[test]
    fn declared_only_sees_this_level() {
        let mut scope = ConfigurationScope::new();
        assert!(scope.is_empty());
        scope.merge(OptionKey::CxxFlags, ["-std=c++20"]);
        assert_eq!(scope.declared(OptionKey::CxxFlags), ["-std=c++20"]);
        assert!(scope.declared(OptionKey::CFlags).is_empty());
    }
}
