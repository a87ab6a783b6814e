use super::error::Error;
use entity::{
    session_role::SessionRole,
    session_users::{ActiveModel, Column, Entity, Model},
    Id,
};
use log::*;
use sea_orm::{entity::prelude::*, ActiveValue::Set, QueryOrder};

pub async fn find_by_session_and_user(
    db: &impl ConnectionTrait,
    session_id: Id,
    user_id: Id,
) -> Result<Option<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::SessionId.eq(session_id))
        .filter(Column::UserId.eq(user_id))
        .one(db)
        .await?)
}

/// Override rows of a session, optionally narrowed to one role, in insertion order.
pub async fn find_by_session(
    db: &impl ConnectionTrait,
    session_id: Id,
    role: Option<SessionRole>,
) -> Result<Vec<Model>, Error> {
    let mut query = Entity::find().filter(Column::SessionId.eq(session_id));
    if let Some(role) = role {
        query = query.filter(Column::Role.eq(role));
    }

    Ok(query.order_by_asc(Column::Id).all(db).await?)
}

pub async fn delete_for_role(
    db: &impl ConnectionTrait,
    session_id: Id,
    role: SessionRole,
) -> Result<u64, Error> {
    let result = Entity::delete_many()
        .filter(Column::SessionId.eq(session_id))
        .filter(Column::Role.eq(role))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}

/// Replaces every override row of `role` with one row per user in `user_ids`.
///
/// All existing rows of the role are deleted first so that users dropped from the
/// list lose their override. A listed user holding a row under the other role has
/// that row replaced as well, keeping (session, user) unique. Users in `exclude` and
/// duplicates are skipped. Run inside a transaction to make the swap atomic.
pub async fn replace_for_role(
    db: &impl ConnectionTrait,
    session_id: Id,
    role: SessionRole,
    user_ids: &[Id],
    exclude: &[Id],
) -> Result<Vec<Model>, Error> {
    let removed = delete_for_role(db, session_id, role).await?;
    debug!("Removed {removed} {role} override rows of session {session_id}");

    let mut unique: Vec<Id> = Vec::with_capacity(user_ids.len());
    for user_id in user_ids {
        if !exclude.contains(user_id) && !unique.contains(user_id) {
            unique.push(*user_id);
        }
    }
    let user_ids = unique;

    if user_ids.is_empty() {
        return Ok(Vec::new());
    }

    Entity::delete_many()
        .filter(Column::SessionId.eq(session_id))
        .filter(Column::UserId.is_in(user_ids.clone()))
        .exec(db)
        .await?;

    let now = chrono::Utc::now();
    let mut rows = Vec::with_capacity(user_ids.len());
    for user_id in user_ids {
        let active_model = ActiveModel {
            id: Set(entity::new_id()),
            session_id: Set(session_id),
            user_id: Set(user_id),
            role: Set(role),
            can_start: Set(role.default_can_start()),
            can_join: Set(true),
            created_at: Set(now.into()),
        };
        rows.push(active_model.insert(db).await?);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session;
    use crate::test_support::{database, session_model};

    fn user(n: u128) -> Id {
        Id::from_u128(n)
    }

    async fn user_ids(
        db: &impl ConnectionTrait,
        session_id: Id,
        role: SessionRole,
    ) -> Result<Vec<Id>, Error> {
        Ok(find_by_session(db, session_id, Some(role))
            .await?
            .into_iter()
            .map(|row| row.user_id)
            .collect())
    }

    #[tokio::test]
    async fn replace_for_role_applies_role_defaults() -> Result<(), Error> {
        let db = database().await;
        let session = session::create(&db, session_model("standup")).await?;

        replace_for_role(&db, session.id, SessionRole::Moderator, &[user(1)], &[]).await?;
        replace_for_role(&db, session.id, SessionRole::Attendee, &[user(2)], &[]).await?;

        let moderator = find_by_session_and_user(&db, session.id, user(1))
            .await?
            .expect("moderator row");
        assert!(moderator.can_start && moderator.can_join);

        let attendee = find_by_session_and_user(&db, session.id, user(2))
            .await?
            .expect("attendee row");
        assert!(!attendee.can_start && attendee.can_join);
        assert_eq!(attendee.role, SessionRole::Attendee);

        Ok(())
    }

    #[tokio::test]
    async fn switching_lists_leaves_only_the_new_set() -> Result<(), Error> {
        let db = database().await;
        let session = session::create(&db, session_model("standup")).await?;

        replace_for_role(&db, session.id, SessionRole::Attendee, &[user(1), user(2)], &[]).await?;
        delete_for_role(&db, session.id, SessionRole::Attendee).await?;
        assert!(user_ids(&db, session.id, SessionRole::Attendee).await?.is_empty());

        replace_for_role(&db, session.id, SessionRole::Attendee, &[user(3), user(2)], &[]).await?;
        replace_for_role(&db, session.id, SessionRole::Attendee, &[user(4)], &[]).await?;

        assert_eq!(
            user_ids(&db, session.id, SessionRole::Attendee).await?,
            vec![user(4)]
        );

        Ok(())
    }

    #[tokio::test]
    async fn excluded_and_duplicate_users_are_skipped() -> Result<(), Error> {
        let db = database().await;
        let session = session::create(&db, session_model("standup")).await?;

        replace_for_role(&db, session.id, SessionRole::Moderator, &[user(1)], &[]).await?;
        replace_for_role(
            &db,
            session.id,
            SessionRole::Attendee,
            &[user(1), user(2), user(2), user(3), user(2)],
            &[user(1)],
        )
        .await?;

        assert_eq!(
            user_ids(&db, session.id, SessionRole::Attendee).await?,
            vec![user(2), user(3)]
        );
        assert_eq!(
            user_ids(&db, session.id, SessionRole::Moderator).await?,
            vec![user(1)]
        );

        Ok(())
    }

    #[tokio::test]
    async fn promoting_an_attendee_replaces_their_row() -> Result<(), Error> {
        let db = database().await;
        let session = session::create(&db, session_model("standup")).await?;

        replace_for_role(&db, session.id, SessionRole::Attendee, &[user(5)], &[]).await?;
        replace_for_role(&db, session.id, SessionRole::Moderator, &[user(5)], &[]).await?;

        let rows = find_by_session(&db, session.id, None).await?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].role, SessionRole::Moderator);

        Ok(())
    }
}
