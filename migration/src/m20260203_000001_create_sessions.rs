use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::{ConnectionTrait, DatabaseBackend};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
pub(crate) enum Sessions {
    Table,
    Id,
    BackendType,
    BackendMeetingId,
    Name,
    Title,
    Description,
    ModeratorPw,
    AttendeePw,
    ContainerId,
    ContainerKind,
    CreatorUserId,
    Enabled,
    Ord,
    PublicJoin,
    PublicToken,
    JoinCanStart,
    JoinCanModerate,
    HasWaitingRoom,
    AllowRecording,
    MuteOnEntry,
    ImageFileId,
    CameraBgImageFileId,
    PresentationFileId,
    PresentationPreviewFileId,
    BackendConfig,
    DeletedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum SessionUsers {
    Table,
    Id,
    SessionId,
    UserId,
    Role,
    CanStart,
    CanJoin,
    CreatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Postgres deployments keep everything in a dedicated schema (see service::init_database).
        if manager.get_database_backend() == DatabaseBackend::Postgres {
            manager
                .get_connection()
                .execute_unprepared("CREATE SCHEMA IF NOT EXISTS video_sessions")
                .await?;
        }

        manager
            .create_table(
                Table::create()
                    .table(Sessions::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Sessions::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Sessions::BackendType).string_len(20).not_null())
                    .col(ColumnDef::new(Sessions::BackendMeetingId).string_len(255))
                    .col(ColumnDef::new(Sessions::Name).string_len(100).not_null())
                    .col(ColumnDef::new(Sessions::Title).string_len(200))
                    .col(ColumnDef::new(Sessions::Description).text())
                    .col(ColumnDef::new(Sessions::ModeratorPw).string_len(255).not_null())
                    .col(ColumnDef::new(Sessions::AttendeePw).string_len(255).not_null())
                    .col(ColumnDef::new(Sessions::ContainerId).uuid())
                    .col(ColumnDef::new(Sessions::ContainerKind).string_len(16))
                    .col(ColumnDef::new(Sessions::CreatorUserId).uuid().not_null())
                    .col(
                        ColumnDef::new(Sessions::Enabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Sessions::Ord).integer().not_null().default(0))
                    .col(
                        ColumnDef::new(Sessions::PublicJoin)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Sessions::PublicToken).string_len(64))
                    .col(
                        ColumnDef::new(Sessions::JoinCanStart)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Sessions::JoinCanModerate)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Sessions::HasWaitingRoom)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Sessions::AllowRecording)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Sessions::MuteOnEntry)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Sessions::ImageFileId).uuid())
                    .col(ColumnDef::new(Sessions::CameraBgImageFileId).uuid())
                    .col(ColumnDef::new(Sessions::PresentationFileId).uuid())
                    .col(ColumnDef::new(Sessions::PresentationPreviewFileId).uuid())
                    .col(ColumnDef::new(Sessions::BackendConfig).json().not_null())
                    .col(ColumnDef::new(Sessions::DeletedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Sessions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Sessions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("sessions_public_token")
                    .table(Sessions::Table)
                    .col(Sessions::PublicToken)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("sessions_container_ord")
                    .table(Sessions::Table)
                    .col(Sessions::ContainerId)
                    .col(Sessions::Ord)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SessionUsers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SessionUsers::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SessionUsers::SessionId).uuid().not_null())
                    .col(ColumnDef::new(SessionUsers::UserId).uuid().not_null())
                    .col(ColumnDef::new(SessionUsers::Role).string_len(16).not_null())
                    .col(
                        ColumnDef::new(SessionUsers::CanStart)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(SessionUsers::CanJoin)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(SessionUsers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_session_users_session")
                            .from(SessionUsers::Table, SessionUsers::SessionId)
                            .to(Sessions::Table, Sessions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One override row per (session, user).
        manager
            .create_index(
                Index::create()
                    .name("session_users_session_user_unique")
                    .table(SessionUsers::Table)
                    .col(SessionUsers::SessionId)
                    .col(SessionUsers::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SessionUsers::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Sessions::Table).if_exists().to_owned())
            .await?;
        Ok(())
    }
}
