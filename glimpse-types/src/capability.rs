//! Named capabilities negotiated between the host and the engine.
//!
//! A [`Capability`] is nothing but a name such as `render/markdown/alert`.
//! [`Capabilities`] is an ordered, duplicate-free set of them, and
//! [`CapabilityRegistry`] is the read-only catalog of every capability the
//! engine knows about.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Capability advertised for protocol version `1.0`.
pub const VERSION_1_0: &str = "version/1.0";

/// Capability shared by every markdown renderer.
pub const RENDER_MARKDOWN: &str = "render/markdown";

/// A single named capability.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capability(String);

impl Capability {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Capability {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Capability {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Capability {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Ordered set of capabilities.
///
/// Insertion order is preserved for display and serialization; membership is
/// answered from a name index.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    list: Vec<Capability>,
    names: HashSet<String>,
}

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from names, dropping duplicates after their first occurrence.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names.into_iter().map(|n| Capability::new(n)).collect()
    }

    /// Add a capability. Returns `false` if it was already present.
    pub fn insert(&mut self, capability: Capability) -> bool {
        if self.names.contains(capability.name()) {
            return false;
        }
        self.names.insert(capability.name().to_string());
        self.list.push(capability);
        true
    }

    pub fn has(&self, capability: impl AsRef<str>) -> bool {
        self.names.contains(capability.as_ref())
    }

    /// True when every member of `other` is present here.
    pub fn has_all(&self, other: &Capabilities) -> bool {
        if other.len() > self.len() {
            return false;
        }
        other.iter().all(|c| self.has(c))
    }

    /// True when at least one member of `other` is present here.
    pub fn has_any(&self, other: &Capabilities) -> bool {
        other.iter().any(|c| self.has(c))
    }

    /// Members of `self` that are also in `other`, in `self`'s order.
    pub fn intersection(&self, other: &Capabilities) -> Capabilities {
        self.iter().filter(|c| other.has(c)).cloned().collect()
    }

    /// Union of several sets, keeping the order of first occurrence.
    pub fn merge<'a, I>(sets: I) -> Capabilities
    where
        I: IntoIterator<Item = &'a Capabilities>,
    {
        let mut merged = Capabilities::new();
        for set in sets {
            for capability in set.iter() {
                merged.insert(capability.clone());
            }
        }
        merged
    }

    pub fn to_string_list(&self) -> Vec<String> {
        self.list.iter().map(|c| c.name().to_string()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.list.iter()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

impl PartialEq for Capabilities {
    fn eq(&self, other: &Self) -> bool {
        self.list == other.list
    }
}

impl Eq for Capabilities {}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        let mut set = Capabilities::new();
        for capability in iter {
            set.insert(capability);
        }
        set
    }
}

impl<'a> IntoIterator for &'a Capabilities {
    type Item = &'a Capability;
    type IntoIter = std::slice::Iter<'a, Capability>;

    fn into_iter(self) -> Self::IntoIter {
        self.list.iter()
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_list().join(", "))
    }
}

impl Serialize for Capabilities {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.list.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Capabilities {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let names = Vec::<String>::deserialize(deserializer)?;
        Ok(Capabilities::from_names(names))
    }
}

/// Read-only catalog of every capability the engine understands.
///
/// Built once at startup and handed to the factories that need to resolve
/// capability names.
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    known: Capabilities,
}

impl CapabilityRegistry {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known: Capabilities::from_names(names),
        }
    }

    /// Resolve a name to its registered capability.
    pub fn get(&self, name: &str) -> Option<&Capability> {
        if !self.known.has(name) {
            return None;
        }
        self.known.iter().find(|c| c.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.known.has(name)
    }

    pub fn all(&self) -> &Capabilities {
        &self.known
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(names: &[&str]) -> Capabilities {
        Capabilities::from_names(names.iter().copied())
    }

    #[test]
    fn test_duplicates_are_dropped() {
        let set = caps(&["a", "b", "a", "c", "b"]);
        assert_eq!(set.len(), 3);
        assert_eq!(set.to_string_list(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_has_accepts_names_and_capabilities() {
        let set = caps(&["render/markdown/alert"]);
        assert!(set.has("render/markdown/alert"));
        assert!(set.has(Capability::new("render/markdown/alert")));
        assert!(!set.has("render/markdown"));
    }

    #[test]
    fn test_has_all_subsets() {
        let set = caps(&["a", "b", "c"]);
        assert!(set.has_all(&Capabilities::new()));
        assert!(set.has_all(&caps(&["c", "a"])));
        assert!(set.has_all(&set.clone()));
        assert!(!set.has_all(&caps(&["a", "d"])));
        assert!(!set.has_all(&caps(&["a", "b", "c", "d"])));
    }

    #[test]
    fn test_has_any() {
        let set = caps(&["a", "b"]);
        assert!(!set.has_any(&Capabilities::new()));
        assert!(set.has_any(&caps(&["z", "b"])));
        assert!(!set.has_any(&caps(&["x", "y"])));
    }

    #[test]
    fn test_merge_keeps_first_occurrence_order() {
        let first = caps(&["a", "b"]);
        let second = caps(&["c", "a"]);
        let third = caps(&["b", "d"]);
        let merged = Capabilities::merge([&first, &second, &third]);
        assert_eq!(merged.to_string_list(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_intersection_uses_left_order() {
        let ours = caps(&["version/1.0", "render/markdown", "render/markdown/alert"]);
        let theirs = caps(&["render/markdown/alert", "version/1.0", "unknown"]);
        assert_eq!(
            ours.intersection(&theirs).to_string_list(),
            vec!["version/1.0", "render/markdown/alert"]
        );
    }

    #[test]
    fn test_serde_as_name_list() {
        let set = caps(&["a", "b"]);
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["a","b"]"#);
        let back: Capabilities = serde_json::from_str(r#"["a","b","a"]"#).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn test_registry_lookup() {
        let registry = CapabilityRegistry::new([VERSION_1_0, RENDER_MARKDOWN]);
        assert_eq!(
            registry.get(RENDER_MARKDOWN).map(|c| c.name()),
            Some(RENDER_MARKDOWN)
        );
        assert!(registry.get("render/html").is_none());
        assert_eq!(registry.all().len(), 2);
    }
}
