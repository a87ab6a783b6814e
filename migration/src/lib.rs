pub use sea_orm_migration::prelude::*;

mod m20260203_000001_create_sessions;
mod m20260216_000001_create_session_event_logs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260203_000001_create_sessions::Migration),
            Box::new(m20260216_000001_create_session_event_logs::Migration),
        ]
    }
}
