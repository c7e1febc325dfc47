use indexmap::IndexMap;

/// Keys of a single group, in insertion order.
pub type Group = IndexMap<String, String>;

/// Name of the group holding keys that appear before any section.
pub const ROOT_GROUP: &str = "";
/// Only key of a guard file; points at the canonical host.
pub const REAL_CONFIG_KEY: &str = "realConfig";

/// Two-level settings tree: group -> key -> value.
///
/// Nothing here touches the filesystem; a tree is loaded and persisted through
/// [`crate::codec`] and distributed through [`crate::distribute`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SettingsTree {
    groups: IndexMap<String, Group>,
}

impl SettingsTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tree of a guard file pointing at `canonical_host`.
    pub fn guard(canonical_host: &str) -> Self {
        let mut tree = Self::new();
        tree.set(ROOT_GROUP, REAL_CONFIG_KEY, canonical_host);
        tree
    }

    /// Host a guard tree points at; `None` for anything but a pure guard tree.
    pub fn real_config(&self) -> Option<&str> {
        if self.groups.len() != 1 {
            return None;
        }
        let root = self.groups.get(ROOT_GROUP)?;
        if root.len() != 1 {
            return None;
        }
        root.get(REAL_CONFIG_KEY).map(String::as_str)
    }

    pub fn get(&self, group: &str, key: &str) -> Option<&str> {
        self.groups.get(group)?.get(key).map(String::as_str)
    }

    pub fn contains(&self, group: &str, key: &str) -> bool {
        self.get(group, key).is_some()
    }

    pub fn group(&self, group: &str) -> Option<&Group> {
        self.groups.get(group)
    }

    pub fn has_group(&self, group: &str) -> bool {
        self.groups.contains_key(group)
    }

    /// Stage a single value, creating the group if needed.
    pub fn set(&mut self, group: &str, key: &str, value: impl Into<String>) {
        self.groups
            .entry(group.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
    }

    /// Stage several values of one group at once. The group is created even if
    /// `values` is empty.
    pub fn set_bulk<K, V>(&mut self, group: &str, values: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        let entry = self.groups.entry(group.to_string()).or_default();
        for (k, v) in values {
            entry.insert(k.into(), v.into());
        }
    }

    pub fn remove(&mut self, group: &str, key: &str) -> Option<String> {
        self.groups.get_mut(group)?.shift_remove(key)
    }

    pub fn remove_group(&mut self, group: &str) -> Option<Group> {
        self.groups.shift_remove(group)
    }

    pub fn groups(&self) -> impl Iterator<Item = (&str, &Group)> {
        self.groups.iter().map(|(name, group)| (name.as_str(), group))
    }

    /// Every `(group, key, value)` triple, in tree order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.groups.iter().flat_map(|(g, keys)| {
            keys.iter()
                .map(move |(k, v)| (g.as_str(), k.as_str(), v.as_str()))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }
}
