//! The set of known backends, queried by id, readiness and allow-list.

use super::allow_list::AllowList;
use entity::Container;
use log::*;
use meeting_backend::{Backend, BackendDescriptor};
use std::sync::Arc;

/// Registered backends, kept sorted by display name.
///
/// Registration happens once while the process wires itself up; afterwards the
/// registry is shared read-only behind an `Arc`.
pub struct BackendRegistry {
    backends: Vec<Arc<dyn Backend>>,
    allow_list: AllowList,
}

impl BackendRegistry {
    pub fn new(allow_list: AllowList) -> Self {
        Self {
            backends: Vec::new(),
            allow_list,
        }
    }

    /// Adds `backend`, replacing any backend registered under the same id.
    pub fn register(&mut self, backend: Arc<dyn Backend>) {
        if let Some(index) = self.backends.iter().position(|b| b.id() == backend.id()) {
            debug!("Replacing registered backend {}", backend.id());
            self.backends.remove(index);
        } else {
            debug!("Registering backend {}", backend.id());
        }
        self.backends.push(backend);
        self.backends.sort_by(|a, b| a.name().cmp(b.name()));
    }

    /// Removes a backend. Meant for test setups that need to shrink the registry.
    pub fn unregister(&mut self, id: &str) -> Option<Arc<dyn Backend>> {
        let index = self.backends.iter().position(|b| b.id() == id)?;
        Some(self.backends.remove(index))
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Backend>> {
        self.backends.iter().find(|b| b.id() == id).cloned()
    }

    pub fn has(&self, id: &str) -> bool {
        self.backends.iter().any(|b| b.id() == id)
    }

    pub fn all(&self) -> &[Arc<dyn Backend>] {
        &self.backends
    }

    pub fn ids(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.id()).collect()
    }

    pub fn configured(&self) -> Vec<Arc<dyn Backend>> {
        self.backends
            .iter()
            .filter(|b| b.is_configured())
            .cloned()
            .collect()
    }

    /// Configured backends on the global allow-list.
    pub fn globally_allowed(&self) -> Vec<Arc<dyn Backend>> {
        let allowed = self.allow_list.global(&self.ids());
        self.configured()
            .into_iter()
            .filter(|b| allowed.iter().any(|id| id == b.id()))
            .collect()
    }

    /// Configured backends a session in `container` may use.
    pub fn allowed_for_container(&self, container: Option<&Container>) -> Vec<Arc<dyn Backend>> {
        let allowed = self.allow_list.effective(&self.ids(), container);
        self.configured()
            .into_iter()
            .filter(|b| allowed.iter().any(|id| id == b.id()))
            .collect()
    }

    /// Allow-list membership only; readiness is not considered.
    pub fn is_allowed_for_container(&self, id: &str, container: Option<&Container>) -> bool {
        self.allow_list
            .is_allowed_for_container(&self.ids(), id, container)
    }

    /// `(id, name)` pairs of the configured backends.
    pub fn options(&self) -> Vec<(String, String)> {
        to_options(&self.configured())
    }

    pub fn options_for_container(&self, container: Option<&Container>) -> Vec<(String, String)> {
        to_options(&self.allowed_for_container(container))
    }

    pub fn descriptors(&self) -> Vec<BackendDescriptor> {
        self.backends.iter().map(|b| b.descriptor()).collect()
    }

    /// The container's preferred backend when it is still allowed, else the first
    /// allowed one.
    pub fn default_backend(&self, container: Option<&Container>) -> Option<Arc<dyn Backend>> {
        let allowed = self.allowed_for_container(container);

        if let Some(preferred) = container.and_then(|c| self.allow_list.default_backend_setting(c))
        {
            if let Some(backend) = allowed.iter().find(|b| b.id() == preferred) {
                return Some(backend.clone());
            }
            debug!("Preferred backend {preferred} is no longer allowed, using the first allowed");
        }

        allowed.into_iter().next()
    }

    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }
}

fn to_options(backends: &[Arc<dyn Backend>]) -> Vec<(String, String)> {
    backends
        .iter()
        .map(|b| (b.id().to_string(), b.name().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubBackend;
    use entity::Id;
    use service::settings::MemorySettings;

    fn registry() -> BackendRegistry {
        let mut registry =
            BackendRegistry::new(AllowList::new(Arc::new(MemorySettings::new())));
        registry.register(StubBackend::new("zoom", "Zoom").into_arc());
        registry.register(StubBackend::new("bbb", "BigBlueButton").into_arc());
        registry.register(StubBackend::new("jitsi", "Jitsi Meet").unconfigured().into_arc());
        registry
    }

    fn ids(backends: &[Arc<dyn Backend>]) -> Vec<&str> {
        backends.iter().map(|b| b.id()).collect()
    }

    #[test]
    fn test_backends_are_sorted_by_name() {
        let registry = registry();

        assert_eq!(ids(registry.all()), vec!["bbb", "jitsi", "zoom"]);
    }

    #[test]
    fn test_register_replaces_same_id() {
        let mut registry = registry();
        registry.register(StubBackend::new("bbb", "BBB Cluster").into_arc());

        assert_eq!(registry.all().len(), 3);
        assert_eq!(registry.get("bbb").map(|b| b.name().to_string()).as_deref(), Some("BBB Cluster"));
    }

    #[test]
    fn test_unregister_removes_backend() {
        let mut registry = registry();

        assert!(registry.unregister("zoom").is_some());
        assert!(registry.unregister("zoom").is_none());
        assert!(!registry.has("zoom"));
    }

    #[test]
    fn test_unconfigured_backends_are_never_offered() {
        let registry = registry();

        assert_eq!(ids(&registry.configured()), vec!["bbb", "zoom"]);
        assert_eq!(ids(&registry.globally_allowed()), vec!["bbb", "zoom"]);
        assert_eq!(
            registry.options(),
            vec![
                ("bbb".to_string(), "BigBlueButton".to_string()),
                ("zoom".to_string(), "Zoom".to_string())
            ]
        );
        assert!(registry.is_allowed_for_container("jitsi", None));
    }

    #[test]
    fn test_container_override_narrows_options() {
        let registry = registry();
        let space = Container::space(Id::from_u128(3));
        registry.allow_list().set_container_policy(
            &space,
            &super::super::ContainerPolicy::Override(vec!["zoom".to_string()]),
        );

        assert_eq!(ids(&registry.allowed_for_container(Some(&space))), vec!["zoom"]);
        assert_eq!(
            registry.options_for_container(Some(&space)),
            vec![("zoom".to_string(), "Zoom".to_string())]
        );
        assert!(!registry.is_allowed_for_container("bbb", Some(&space)));
    }

    #[test]
    fn test_default_backend_prefers_allowed_container_setting() {
        let registry = registry();
        let space = Container::space(Id::from_u128(3));

        assert_eq!(registry.default_backend(Some(&space)).map(|b| b.id().to_string()).as_deref(), Some("bbb"));

        registry.allow_list().set_default_backend(&space, "zoom");
        assert_eq!(registry.default_backend(Some(&space)).map(|b| b.id().to_string()).as_deref(), Some("zoom"));

        registry.allow_list().set_global(&["bbb".to_string()]);
        assert_eq!(registry.default_backend(Some(&space)).map(|b| b.id().to_string()).as_deref(), Some("bbb"));

        registry.allow_list().set_global(&[]);
        assert!(registry.default_backend(Some(&space)).is_none());
    }

    #[test]
    fn test_descriptors_cover_every_registered_backend() {
        let registry = registry();
        let descriptors = registry.descriptors();

        assert_eq!(descriptors.len(), 3);
        assert!(!descriptors[1].configured);
        assert_eq!(descriptors[2].name, "Zoom");
    }
}
