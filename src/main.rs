use domain::backend::{AllowList, BackendContext, BackendLoader, BackendRegistry};
use domain::{Authorization, EventLogHandler, Flows, GroupPermissions, SessionForm, SessionService};
use events::EventPublisher;
use log::{error, info, warn};
use migration::{Migrator, MigratorTrait};
use service::settings::{MemorySettings, Settings};
use service::{config::Config, logging::Logger};
use std::sync::Arc;

/// Everything a calling layer needs, built once at startup.
struct App {
    registry: Arc<BackendRegistry>,
    sessions: Arc<SessionService>,
    form: SessionForm,
    /// Handed to the calling layer; startup never launches or joins.
    #[allow(dead_code)]
    flows: Flows,
}

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config);

    info!(
        "Starting video_sessions ({:?}) for {}",
        config.runtime_env(),
        config.base_url()
    );

    let db = match service::init_database(&config).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to establish database connection: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = Migrator::up(db.as_ref(), None).await {
        error!("Failed to run database migrations: {e}");
        std::process::exit(1);
    }

    let settings: Arc<dyn Settings> = Arc::new(MemorySettings::from_config(&config));

    let mut registry = BackendRegistry::new(AllowList::new(settings.clone()));
    let loader = BackendLoader::new(BackendContext::from_config(&config, settings));
    let loaded = loader.load_into(&mut registry);
    if loaded == 0 {
        warn!("No conferencing backend could be loaded");
    }
    let registry = Arc::new(registry);

    let events = EventPublisher::new().with_handler(Arc::new(EventLogHandler::new(db.clone())));
    let event_handlers = events.handler_count();
    let authorization = Arc::new(Authorization::new(
        db.clone(),
        Arc::new(GroupPermissions::new()),
    ));
    let sessions = Arc::new(SessionService::new(
        db.clone(),
        registry.clone(),
        authorization.clone(),
    ));

    let app = App {
        form: SessionForm::new(db.clone(), registry.clone()),
        flows: Flows::new(sessions.clone(), authorization, events),
        registry,
        sessions,
    };

    log_readiness(&app, event_handlers).await;
}

async fn log_readiness(app: &App, event_handlers: usize) {
    let allowed: Vec<String> = app
        .registry
        .globally_allowed()
        .iter()
        .map(|backend| backend.id().to_string())
        .collect();

    for descriptor in app.registry.descriptors() {
        info!(
            "Backend {} ({}): configured={}, allowed={}, features={:?}",
            descriptor.id,
            descriptor.name,
            descriptor.configured,
            allowed.contains(&descriptor.id),
            descriptor.features
        );
    }

    match app.form.draft_for_new(None, domain::Id::nil()) {
        Ok(draft) => info!("Global sessions default to backend {}", draft.backend_type),
        Err(e) => warn!("Global sessions cannot be created yet: {e}"),
    }

    let global = app.sessions.list(None, true).await;
    info!(
        "Ready: {} backends allowed, {} enabled global sessions, {} event handlers",
        allowed.len(),
        global.len(),
        event_handlers
    );
}
