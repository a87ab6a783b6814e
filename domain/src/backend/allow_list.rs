//! Two-level backend allow-list.
//!
//! The global list lives in the module settings. Each container either inherits
//! it or stores its own override, which is always intersected with the global
//! list when read so that tightening the global list also narrows every
//! container.

use entity::Container;
use log::*;
use service::settings::{Scope, Settings};
use std::sync::Arc;

pub(crate) const ALLOWED_BACKENDS_KEY: &str = "allowedBackends";
pub(crate) const INHERIT_BACKENDS_KEY: &str = "inheritBackends";
pub(crate) const DEFAULT_BACKEND_KEY: &str = "defaultBackend";

/// How a container picks its allowed backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerPolicy {
    Inherit,
    /// Stored as given; only ids that are also globally allowed take effect.
    Override(Vec<String>),
}

#[derive(Clone)]
pub struct AllowList {
    settings: Arc<dyn Settings>,
}

impl AllowList {
    pub fn new(settings: Arc<dyn Settings>) -> Self {
        Self { settings }
    }

    /// The global list, or every registered id when it was never configured.
    pub fn global(&self, registered: &[&str]) -> Vec<String> {
        match self
            .settings
            .get_json::<Vec<String>>(&Scope::Module, ALLOWED_BACKENDS_KEY)
        {
            Some(ids) => ids,
            None => registered.iter().map(|id| id.to_string()).collect(),
        }
    }

    pub fn set_global(&self, ids: &[String]) {
        info!("Global backend allow-list set to {ids:?}");
        self.settings
            .set_json(&Scope::Module, ALLOWED_BACKENDS_KEY, &ids);
    }

    pub fn container_policy(&self, container: &Container) -> ContainerPolicy {
        let scope = container_scope(container);
        if self.settings.get_bool(&scope, INHERIT_BACKENDS_KEY, true) {
            return ContainerPolicy::Inherit;
        }

        match self
            .settings
            .get_json::<Vec<String>>(&scope, ALLOWED_BACKENDS_KEY)
        {
            Some(ids) => ContainerPolicy::Override(ids),
            None => ContainerPolicy::Inherit,
        }
    }

    pub fn set_container_policy(&self, container: &Container, policy: &ContainerPolicy) {
        let scope = container_scope(container);
        debug!("Backend policy of {scope:?} set to {policy:?}");

        match policy {
            ContainerPolicy::Inherit => {
                self.settings.set_bool(&scope, INHERIT_BACKENDS_KEY, true);
            }
            ContainerPolicy::Override(ids) => {
                self.settings.set_bool(&scope, INHERIT_BACKENDS_KEY, false);
                self.settings.set_json(&scope, ALLOWED_BACKENDS_KEY, ids);
            }
        }
    }

    /// The ids allowed in `container`, or the global list for a global session.
    pub fn effective(&self, registered: &[&str], container: Option<&Container>) -> Vec<String> {
        let global = self.global(registered);

        let Some(container) = container else {
            return global;
        };

        match self.container_policy(container) {
            ContainerPolicy::Inherit => global,
            ContainerPolicy::Override(ids) => {
                let dropped: Vec<&String> = ids.iter().filter(|id| !global.contains(id)).collect();
                if !dropped.is_empty() {
                    debug!("Ignoring backends {dropped:?} of {container:?}, not globally allowed");
                }
                ids.iter()
                    .filter(|id| global.contains(id))
                    .cloned()
                    .collect()
            }
        }
    }

    pub fn is_allowed_for_container(
        &self,
        registered: &[&str],
        backend_id: &str,
        container: Option<&Container>,
    ) -> bool {
        self.effective(registered, container)
            .iter()
            .any(|id| id == backend_id)
    }

    /// The container's preferred backend as stored, not yet checked against anything.
    pub fn default_backend_setting(&self, container: &Container) -> Option<String> {
        self.settings
            .get(&container_scope(container), DEFAULT_BACKEND_KEY)
            .filter(|id| !id.trim().is_empty())
    }

    pub fn set_default_backend(&self, container: &Container, backend_id: &str) {
        self.settings.set(
            &container_scope(container),
            DEFAULT_BACKEND_KEY,
            backend_id.to_string(),
        );
    }
}

fn container_scope(container: &Container) -> Scope {
    Scope::Container(format!("{}:{}", container.kind, container.id))
}
