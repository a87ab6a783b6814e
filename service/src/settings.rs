//! String-keyed settings shared by the module, its providers and its containers.
//!
//! Values are opaque strings. Callers that need booleans or JSON read them through
//! the typed helpers on `dyn Settings`, which never fail: a malformed value is logged
//! and treated as absent.

use crate::config::Config;
use dashmap::DashMap;
use log::*;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

/// Where a setting lives.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Module-wide settings, including provider settings (`<providerId>.<key>`).
    Module,
    /// Settings of one container (space or profile), keyed by its id.
    Container(String),
}

pub trait Settings: Send + Sync {
    fn get(&self, scope: &Scope, key: &str) -> Option<String>;
    fn set(&self, scope: &Scope, key: &str, value: String);
    fn delete(&self, scope: &Scope, key: &str);
}

impl dyn Settings {
    /// `"1"` and `"true"` are true, any other stored value is false, absent is `default`.
    pub fn get_bool(&self, scope: &Scope, key: &str, default: bool) -> bool {
        match self.get(scope, key) {
            Some(value) => parse_bool(&value),
            None => default,
        }
    }

    pub fn set_bool(&self, scope: &Scope, key: &str, value: bool) {
        self.set(scope, key, if value { "1" } else { "0" }.to_string());
    }

    pub fn get_json<T: DeserializeOwned>(&self, scope: &Scope, key: &str) -> Option<T> {
        let raw = self.get(scope, key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring malformed JSON setting {key} in {scope:?}: {e}");
                None
            }
        }
    }

    pub fn set_json<T: Serialize>(&self, scope: &Scope, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(raw) => self.set(scope, key, raw),
            Err(e) => error!("Failed to serialize setting {key} in {scope:?}: {e}"),
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true")
}

/// Read/write view onto the `<providerId>.<key>` namespace of one provider.
#[derive(Clone)]
pub struct ProviderSettings {
    store: Arc<dyn Settings>,
    provider_id: String,
}

impl ProviderSettings {
    pub fn new(store: Arc<dyn Settings>, provider_id: &str) -> Self {
        Self {
            store,
            provider_id: provider_id.to_string(),
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}.{}", self.provider_id, key)
    }

    /// Returns the value only when it is present and not blank.
    pub fn get(&self, key: &str) -> Option<String> {
        self.store
            .get(&Scope::Module, &self.key(key))
            .filter(|value| !value.trim().is_empty())
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.store.get_bool(&Scope::Module, &self.key(key), default)
    }

    pub fn set(&self, key: &str, value: &str) {
        self.store.set(&Scope::Module, &self.key(key), value.to_string());
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }
}

/// In-process settings store.
#[derive(Default)]
pub struct MemorySettings {
    values: DashMap<(Scope, String), String>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store pre-populated with the provider settings and allow-list seed
    /// found in the process configuration.
    pub fn from_config(config: &Config) -> Self {
        let settings = Self::new();
        let seed = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                settings.set(&Scope::Module, key, value);
            }
        };

        seed("bbb.url", config.bbb_url());
        seed("bbb.secret", config.bbb_secret());
        seed("jitsi.domain", Some(config.jitsi_domain().to_string()));
        seed("jitsi.jwtAppId", config.jitsi_jwt_app_id());
        seed("jitsi.jwtSecret", config.jitsi_jwt_secret());
        seed("jitsi.roomPrefix", Some(config.jitsi_room_prefix().to_string()));
        seed("zoom.accountId", config.zoom_account_id());
        seed("zoom.clientId", config.zoom_client_id());
        seed("zoom.clientSecret", config.zoom_client_secret());
        seed("zoom.userId", Some(config.zoom_user_id().to_string()));
        seed("opentalk.apiUrl", config.opentalk_api_url());
        seed("opentalk.apiToken", config.opentalk_api_token());
        seed("opentalk.frontendUrl", config.opentalk_frontend_url());
        seed(
            "opentalk.enableRecordings",
            Some(if config.opentalk_enable_recordings { "1" } else { "0" }.to_string()),
        );

        if !config.allowed_backends.is_empty() {
            match serde_json::to_string(&config.allowed_backends) {
                Ok(raw) => settings.set(&Scope::Module, "allowedBackends", raw),
                Err(e) => error!("Failed to seed allowedBackends: {e}"),
            }
        }

        settings
    }
}

impl Settings for MemorySettings {
    fn get(&self, scope: &Scope, key: &str) -> Option<String> {
        self.values
            .get(&(scope.clone(), key.to_string()))
            .map(|value| value.value().clone())
    }

    fn set(&self, scope: &Scope, key: &str, value: String) {
        trace!("Setting {key} in {scope:?}");
        self.values.insert((scope.clone(), key.to_string()), value);
    }

    fn delete(&self, scope: &Scope, key: &str) {
        self.values.remove(&(scope.clone(), key.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn store() -> Arc<dyn Settings> {
        Arc::new(MemorySettings::new())
    }

    #[test]
    fn test_scopes_do_not_leak_into_each_other() {
        let settings = store();
        let container = Scope::Container("space-1".to_string());

        settings.set(&Scope::Module, "defaultBackend", "bbb".to_string());
        settings.set(&container, "defaultBackend", "jitsi".to_string());

        assert_eq!(settings.get(&Scope::Module, "defaultBackend").as_deref(), Some("bbb"));
        assert_eq!(settings.get(&container, "defaultBackend").as_deref(), Some("jitsi"));

        settings.delete(&container, "defaultBackend");
        assert_eq!(settings.get(&container, "defaultBackend"), None);
        assert!(settings.get(&Scope::Module, "defaultBackend").is_some());
    }

    #[test]
    fn test_get_bool_uses_default_only_when_absent() {
        let settings = store();
        let scope = Scope::Container("c".to_string());

        assert!(settings.get_bool(&scope, "inheritBackends", true));

        settings.set_bool(&scope, "inheritBackends", false);
        assert!(!settings.get_bool(&scope, "inheritBackends", true));

        settings.set(&scope, "inheritBackends", "true".to_string());
        assert!(settings.get_bool(&scope, "inheritBackends", false));

        settings.set(&scope, "inheritBackends", String::new());
        assert!(!settings.get_bool(&scope, "inheritBackends", true));
    }

    #[test]
    fn test_get_json_treats_garbage_as_absent() {
        let settings = store();

        settings.set(&Scope::Module, "allowedBackends", "[\"bbb\"".to_string());
        assert_eq!(settings.get_json::<Vec<String>>(&Scope::Module, "allowedBackends"), None);

        settings.set_json(&Scope::Module, "allowedBackends", &vec!["bbb", "zoom"]);
        assert_eq!(
            settings.get_json::<Vec<String>>(&Scope::Module, "allowedBackends"),
            Some(vec!["bbb".to_string(), "zoom".to_string()])
        );
    }

    #[test]
    fn test_provider_settings_are_namespaced_and_blank_is_absent() {
        let settings = store();
        let bbb = ProviderSettings::new(settings.clone(), "bbb");

        bbb.set("url", "https://bbb.example.com/bigbluebutton/");
        bbb.set("secret", "   ");

        assert_eq!(
            settings.get(&Scope::Module, "bbb.url").as_deref(),
            Some("https://bbb.example.com/bigbluebutton/")
        );
        assert_eq!(bbb.get("secret"), None);
        assert_eq!(bbb.get_or("secret", "fallback"), "fallback");
        assert_eq!(bbb.provider_id(), "bbb");
    }

    #[test]
    fn test_concurrent_writers_to_different_containers_all_land() {
        let settings = store();

        std::thread::scope(|threads| {
            for n in 0..8 {
                let settings = settings.clone();
                threads.spawn(move || {
                    let scope = Scope::Container(format!("space-{n}"));
                    for round in 0..50 {
                        settings.set(&scope, "defaultBackend", format!("bbb-{round}"));
                    }
                });
            }
        });

        for n in 0..8 {
            let scope = Scope::Container(format!("space-{n}"));
            assert_eq!(settings.get(&scope, "defaultBackend").as_deref(), Some("bbb-49"));
        }
    }

    #[test]
    fn test_from_config_seeds_provider_keys() {
        let config = Config::parse_from([
            "video_sessions",
            "--bbb-url",
            "https://bbb.example.com/bigbluebutton/",
            "--bbb-secret",
            "s3cret",
            "--allowed-backends",
            "bbb,jitsi",
        ]);

        let settings = MemorySettings::from_config(&config);

        assert_eq!(settings.get(&Scope::Module, "bbb.secret").as_deref(), Some("s3cret"));
        assert_eq!(settings.get(&Scope::Module, "zoom.userId").as_deref(), Some("me"));
        assert_eq!(settings.get(&Scope::Module, "zoom.clientId"), None);
        assert_eq!(
            settings.get(&Scope::Module, "allowedBackends").as_deref(),
            Some("[\"bbb\",\"jitsi\"]")
        );
    }
}
