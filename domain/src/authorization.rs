//! Derived per-user capabilities on a session.
//!
//! Nothing here is stored as a flag. Each capability is recomputed from three inputs:
//! the module permissions the user holds in the session's owning container, the
//! session's delegation flags, and the optional explicit override row for the
//! (session, user) pair. Lookups never fail outward; a failed override read counts
//! as "no override row".

use crate::Id;
use entity::{session_role::SessionRole, session_users, sessions, Container, ContainerKind};
use entity_api::session_user;
use log::*;
use sea_orm::DatabaseConnection;
use dashmap::{DashMap, DashSet};
use serde::Serialize;
use std::sync::Arc;

/// Module-level permissions a container can grant to its groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ModulePermission {
    Admin,
    StartSession,
    JoinSession,
}

impl ModulePermission {
    fn default_groups(&self) -> &'static [Group] {
        match self {
            ModulePermission::Admin => &[Group::Owner, Group::Admin, Group::SelfUser],
            ModulePermission::StartSession => &[
                Group::Owner,
                Group::Admin,
                Group::Moderator,
                Group::SelfUser,
            ],
            ModulePermission::JoinSession => &[
                Group::Owner,
                Group::Admin,
                Group::Moderator,
                Group::Member,
                Group::SelfUser,
                Group::Other,
            ],
        }
    }
}

/// The collaborator answering role questions about users.
pub trait PermissionChecker: Send + Sync {
    /// Generic edit rights over the session as content.
    fn can_edit_content(&self, user_id: Id, session: &sessions::Model) -> bool;

    /// Whether the user holds `permission` in `container`, or application-wide when
    /// `container` is `None`.
    fn has_permission(
        &self,
        user_id: Id,
        permission: ModulePermission,
        container: Option<&Container>,
    ) -> bool;
}

/// Role of a user inside a space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MembershipRole {
    Owner,
    Admin,
    Moderator,
    Member,
}

/// The group a user falls into relative to one container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    Owner,
    Admin,
    Moderator,
    Member,
    /// The profile's own user.
    SelfUser,
    /// Anyone else with an account.
    Other,
}

impl From<MembershipRole> for Group {
    fn from(role: MembershipRole) -> Self {
        match role {
            MembershipRole::Owner => Group::Owner,
            MembershipRole::Admin => Group::Admin,
            MembershipRole::Moderator => Group::Moderator,
            MembershipRole::Member => Group::Member,
        }
    }
}

/// An explicit grant or revocation replacing a group's default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Allow,
    Deny,
}

/// Group-based permissions held in memory.
///
/// A user's group in a space comes from their membership; in a profile the owner is
/// `SelfUser` and everyone else `Other`. Without an explicit state, a permission is
/// granted to its default groups. System administrators always hold `StartSession`
/// and everything application-wide.
#[derive(Default)]
pub struct GroupPermissions {
    memberships: DashMap<(Id, Id), MembershipRole>,
    system_admins: DashSet<Id>,
    states: DashMap<(Container, ModulePermission, Group), PermissionState>,
}

impl GroupPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_member(&self, space_id: Id, user_id: Id, role: MembershipRole) {
        self.memberships.insert((space_id, user_id), role);
    }

    pub fn remove_member(&self, space_id: Id, user_id: Id) {
        self.memberships.remove(&(space_id, user_id));
    }

    pub fn set_system_admin(&self, user_id: Id, admin: bool) {
        if admin {
            self.system_admins.insert(user_id);
        } else {
            self.system_admins.remove(&user_id);
        }
    }

    /// Overrides the default for one group, or restores it with `None`.
    pub fn set_state(
        &self,
        container: Container,
        permission: ModulePermission,
        group: Group,
        state: Option<PermissionState>,
    ) {
        let key = (container, permission, group);
        match state {
            Some(state) => {
                self.states.insert(key, state);
            }
            None => {
                self.states.remove(&key);
            }
        }
    }

    fn is_system_admin(&self, user_id: Id) -> bool {
        self.system_admins.contains(&user_id)
    }

    fn membership(&self, space_id: Id, user_id: Id) -> Option<MembershipRole> {
        self.memberships
            .get(&(space_id, user_id))
            .map(|role| *role.value())
    }

    fn group_of(&self, user_id: Id, container: &Container) -> Group {
        match container.kind {
            ContainerKind::Space => self
                .membership(container.id, user_id)
                .map(Group::from)
                .unwrap_or(Group::Other),
            ContainerKind::User if container.id == user_id => Group::SelfUser,
            ContainerKind::User => Group::Other,
        }
    }
}

impl PermissionChecker for GroupPermissions {
    fn can_edit_content(&self, user_id: Id, session: &sessions::Model) -> bool {
        if session.creator_user_id == user_id || self.is_system_admin(user_id) {
            return true;
        }

        match session.container() {
            Some(container) => matches!(
                self.group_of(user_id, &container),
                Group::Owner | Group::Admin | Group::SelfUser
            ),
            None => false,
        }
    }

    fn has_permission(
        &self,
        user_id: Id,
        permission: ModulePermission,
        container: Option<&Container>,
    ) -> bool {
        let Some(container) = container else {
            return self.is_system_admin(user_id) || permission == ModulePermission::JoinSession;
        };

        if permission == ModulePermission::StartSession && self.is_system_admin(user_id) {
            return true;
        }

        let group = self.group_of(user_id, container);
        match self
            .states
            .get(&(*container, permission, group))
            .map(|state| *state.value())
        {
            Some(PermissionState::Allow) => true,
            Some(PermissionState::Deny) => false,
            None => permission.default_groups().contains(&group),
        }
    }
}

/// Everything one user may do with one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub administer: bool,
    pub start: bool,
    pub join: bool,
    pub moderate: bool,
}

/// Role facts gathered from the permission collaborator.
#[derive(Debug, Clone, Copy, Default)]
struct RoleFacts {
    edit_content: bool,
    admin: bool,
    start_session: bool,
    join_session: bool,
}

/// Combines role facts, session flags and the override row.
///
/// With `join_can_moderate` set, any override row makes its user a moderator even
/// when the row's role is attendee.
fn evaluate(
    session: &sessions::Model,
    roles: RoleFacts,
    row: Option<&session_users::Model>,
) -> Capabilities {
    let administer = roles.edit_content || roles.admin;
    let join_permission = roles.join_session || row.is_some_and(|row| row.can_join);

    let start = administer
        || (session.join_can_start && join_permission)
        || roles.start_session
        || row.is_some_and(|row| row.can_start);

    let join = start || join_permission;

    let moderate = roles.admin
        || (session.join_can_moderate && join)
        || row.is_some_and(|row| row.role == SessionRole::Moderator || session.join_can_moderate);

    Capabilities {
        administer,
        start,
        join,
        moderate,
    }
}

pub struct Authorization {
    db: Arc<DatabaseConnection>,
    permissions: Arc<dyn PermissionChecker>,
}

impl Authorization {
    pub fn new(db: Arc<DatabaseConnection>, permissions: Arc<dyn PermissionChecker>) -> Self {
        Self { db, permissions }
    }

    pub async fn capabilities(&self, session: &sessions::Model, user_id: Id) -> Capabilities {
        let row = match session_user::find_by_session_and_user(self.db.as_ref(), session.id, user_id)
            .await
        {
            Ok(row) => row,
            Err(e) => {
                error!(
                    "Failed to load override row of user {user_id} on session {}: {e}",
                    session.id
                );
                None
            }
        };

        let container = session.container();
        let has = |permission| {
            self.permissions
                .has_permission(user_id, permission, container.as_ref())
        };

        let roles = RoleFacts {
            edit_content: self.permissions.can_edit_content(user_id, session),
            admin: has(ModulePermission::Admin),
            start_session: has(ModulePermission::StartSession),
            join_session: has(ModulePermission::JoinSession),
        };

        let capabilities = evaluate(session, roles, row.as_ref());
        trace!(
            "Capabilities of user {user_id} on session {}: {capabilities:?}",
            session.id
        );
        capabilities
    }

    pub async fn can_administer(&self, session: &sessions::Model, user_id: Id) -> bool {
        self.capabilities(session, user_id).await.administer
    }

    pub async fn can_start(&self, session: &sessions::Model, user_id: Id) -> bool {
        self.capabilities(session, user_id).await.start
    }

    pub async fn can_join(&self, session: &sessions::Model, user_id: Id) -> bool {
        self.capabilities(session, user_id).await.join
    }

    pub async fn is_moderator(&self, session: &sessions::Model, user_id: Id) -> bool {
        self.capabilities(session, user_id).await.moderate
    }
}
