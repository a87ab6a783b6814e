use sea_orm_migration::prelude::*;

use super::m20260203_000001_create_sessions::Sessions;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum SessionEventLogs {
    Table,
    Id,
    SessionId,
    UserId,
    EventType,
    CreatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SessionEventLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SessionEventLogs::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SessionEventLogs::SessionId).uuid().not_null())
                    .col(ColumnDef::new(SessionEventLogs::UserId).uuid())
                    .col(
                        ColumnDef::new(SessionEventLogs::EventType)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SessionEventLogs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_session_event_logs_session")
                            .from(SessionEventLogs::Table, SessionEventLogs::SessionId)
                            .to(Sessions::Table, Sessions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("session_event_logs_session_created")
                    .table(SessionEventLogs::Table)
                    .col(SessionEventLogs::SessionId)
                    .col(SessionEventLogs::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(SessionEventLogs::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await
    }
}
