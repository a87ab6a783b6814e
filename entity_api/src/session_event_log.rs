use super::error::Error;
use entity::{
    event_kind::EventKind,
    session_event_logs::{ActiveModel, Column, Entity, Model},
    Id,
};
use log::*;
use sea_orm::{entity::prelude::*, ActiveValue::Set, QueryOrder};

/// Appends one audit row. Rows are never updated or deleted afterwards.
pub async fn append(
    db: &impl ConnectionTrait,
    session_id: Id,
    user_id: Option<Id>,
    event_type: EventKind,
) -> Result<Model, Error> {
    trace!("Logging {event_type} for session {session_id} (user {user_id:?})");

    let active_model = ActiveModel {
        id: Set(entity::new_id()),
        session_id: Set(session_id),
        user_id: Set(user_id),
        event_type: Set(event_type),
        created_at: Set(chrono::Utc::now().into()),
    };

    Ok(active_model.insert(db).await?)
}

/// Audit trail of one session, oldest first.
pub async fn find_by_session(db: &impl ConnectionTrait, session_id: Id) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::SessionId.eq(session_id))
        .order_by_asc(Column::CreatedAt)
        .order_by_asc(Column::Id)
        .all(db)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session;
    use crate::test_support::{database, session_model};

    #[tokio::test]
    async fn append_keeps_events_in_order() -> Result<(), Error> {
        let db = database().await;
        let session = session::create(&db, session_model("standup")).await?;
        let user_id = Id::from_u128(7);

        append(&db, session.id, None, EventKind::Started).await?;
        append(&db, session.id, Some(user_id), EventKind::Joined).await?;
        append(&db, session.id, Some(user_id), EventKind::Left).await?;

        let events: Vec<(Option<Id>, EventKind)> = find_by_session(&db, session.id)
            .await?
            .into_iter()
            .map(|entry| (entry.user_id, entry.event_type))
            .collect();

        assert_eq!(
            events,
            vec![
                (None, EventKind::Started),
                (Some(user_id), EventKind::Joined),
                (Some(user_id), EventKind::Left),
            ]
        );

        Ok(())
    }

    #[tokio::test]
    async fn append_requires_an_existing_session() {
        let db = database().await;

        let result = append(&db, Id::from_u128(404), None, EventKind::Started).await;

        assert!(result.is_err());
    }
}
