use std::{collections::HashMap, sync::Arc};

use crate::descriptor::ResourceDescriptor;

/// Descriptors of discovered kinds, keyed by group, then kind, then version.
///
/// A registry is repopulated from scratch by every discovery pass and is read-only in between.
#[derive(Debug, Default)]
pub struct Registry {
    groups: HashMap<String, HashMap<String, HashMap<String, Arc<ResourceDescriptor>>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a descriptor, replacing any previous descriptor with the same identity.
    pub fn register(&mut self, descriptor: ResourceDescriptor) -> Arc<ResourceDescriptor> {
        let descriptor = Arc::new(descriptor);
        self.groups
            .entry(descriptor.group().to_owned())
            .or_default()
            .entry(descriptor.kind().to_owned())
            .or_default()
            .insert(descriptor.version().to_owned(), Arc::clone(&descriptor));
        descriptor
    }

    pub fn lookup(&self, group: &str, kind: &str, version: &str) -> Option<Arc<ResourceDescriptor>> {
        self.groups.get(group)?.get(kind)?.get(version).cloned()
    }

    pub fn reset(&mut self) {
        self.groups.clear();
    }

    /// Snapshot of every registered descriptor, ordered by identity.
    pub fn all(&self) -> Vec<Arc<ResourceDescriptor>> {
        let mut all: Vec<_> = self
            .groups
            .values()
            .flat_map(HashMap::values)
            .flat_map(HashMap::values)
            .cloned()
            .collect();
        all.sort_by(|a, b| a.identity().cmp(b.identity()));
        all
    }

    pub fn len(&self) -> usize {
        self.groups
            .values()
            .flat_map(HashMap::values)
            .map(HashMap::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::Registry;
    use crate::descriptor::{synthesize, Annotations, ResourceDescriptor, Source, PRUNABLE_ANNOTATION};

    fn descriptor(group: &str, kind: &str, version: &str, prunable: bool) -> ResourceDescriptor {
        let mut annotations = Annotations::new();
        if prunable {
            annotations.insert(PRUNABLE_ANNOTATION.to_owned(), "true".to_owned());
        }
        synthesize(Source::Current, group, kind, version, &annotations).unwrap()
    }

    #[test]
    fn lookup_is_keyed_by_full_identity() {
        let mut registry = Registry::new();
        registry.register(descriptor("example.com", "Widget", "v1", false));
        registry.register(descriptor("example.com", "Widget", "v2", false));

        assert!(registry.lookup("example.com", "Widget", "v1").is_some());
        assert!(registry.lookup("example.com", "Widget", "v2").is_some());
        assert!(registry.lookup("example.com", "Widget", "v3").is_none());
        assert!(registry.lookup("example.org", "Widget", "v1").is_none());
        assert!(registry.lookup("example.com", "Gizmo", "v1").is_none());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn reregistering_overwrites() {
        let mut registry = Registry::new();
        registry.register(descriptor("example.com", "Widget", "v1", false));
        registry.register(descriptor("example.com", "Widget", "v1", true));

        assert_eq!(registry.len(), 1);
        assert!(registry.lookup("example.com", "Widget", "v1").unwrap().prunable());
    }

    #[test]
    fn reset_clears_everything() {
        let mut registry = Registry::new();
        registry.register(descriptor("example.com", "Widget", "v1", false));
        registry.reset();

        assert!(registry.is_empty());
        assert!(registry.all().is_empty());
    }

    #[test]
    fn all_is_sorted_snapshot() {
        let mut registry = Registry::new();
        registry.register(descriptor("example.com", "Widget", "v1", false));
        registry.register(descriptor("example.com", "Gizmo", "v1", false));

        let kinds: Vec<_> = registry.all().iter().map(|d| d.kind().to_owned()).collect();
        assert_eq!(kinds, ["Gizmo", "Widget"]);
    }
}
