//! The access decision engine.
//!
//! [`can_access`] is a pure predicate over a [`Subject`] (the principal plus
//! the ids of the groups it belongs to) and a [`ResourceWithGrants`]. It
//! performs no I/O: callers load both sides up front and translate a
//! `false` into a forbidden outcome.
//!
//! Evaluation order:
//! 1. an inactive principal (blocked, or without a role) is denied;
//! 2. `admin` is allowed everything, on every resource;
//! 3. `view` is allowed to the owner, to a direct-share target, and to any
//!    member of a group the resource is shared with;
//! 4. `edit`/`delete` follow the same grant paths but only for
//!    `moderator`. A `viewer` can never mutate, not even what it owns.

pub mod audience;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StockroomError;
use crate::models::resource::ResourceWithGrants;
use crate::models::role::Role;
use crate::models::user::User;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    View,
    Edit,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Edit => "edit",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = StockroomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(Action::View),
            "edit" => Ok(Action::Edit),
            "delete" => Ok(Action::Delete),
            other => Err(StockroomError::Validation {
                message: format!("unknown action: {other}"),
            }),
        }
    }
}

/// An authenticated user making a request, as resolved by the
/// authenticator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub username: String,
    pub role: Option<Role>,
    pub blocked: bool,
}

impl Principal {
    /// Only unblocked principals holding a role may reach any resource.
    pub fn is_active(&self) -> bool {
        !self.blocked && self.role.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.is_active() && self.role == Some(Role::Admin)
    }

    /// Role gate used by administrative and discovery operations.
    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        self.is_active() && self.role.is_some_and(|r| roles.contains(&r))
    }
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role,
            blocked: user.blocked,
        }
    }
}

/// A principal together with the groups it is a member of.
#[derive(Debug, Clone)]
pub struct Subject {
    pub principal: Principal,
    pub group_ids: BTreeSet<Uuid>,
}

impl Subject {
    pub fn new(principal: Principal, group_ids: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            principal,
            group_ids: group_ids.into_iter().collect(),
        }
    }
}

/// Decide whether `subject` may perform `action` on `target`.
pub fn can_access(subject: &Subject, target: &ResourceWithGrants, action: Action) -> bool {
    let principal = &subject.principal;
    if principal.blocked {
        return false;
    }
    let Some(role) = principal.role else {
        return false;
    };

    if role == Role::Admin {
        return true;
    }

    match action {
        Action::View => has_grant(subject, target),
        Action::Edit | Action::Delete => role == Role::Moderator && has_grant(subject, target),
    }
}

/// Ownership, a direct share, or membership in a group the resource is
/// shared with. Share rows pointing at deleted users or groups simply never
/// match.
fn has_grant(subject: &Subject, target: &ResourceWithGrants) -> bool {
    let id = subject.principal.id;
    target.owner_id() == id
        || target.shared_user_ids.contains(&id)
        || !subject.group_ids.is_disjoint(&target.shared_group_ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resource::{Resource, ResourceKind};
    use chrono::Utc;

    fn principal(role: Option<Role>) -> Principal {
        Principal {
            id: Uuid::new_v4(),
            username: "someone".into(),
            role,
            blocked: false,
        }
    }

    fn resource_owned_by(owner_id: Uuid) -> ResourceWithGrants {
        let now = Utc::now();
        ResourceWithGrants {
            resource: Resource {
                id: Uuid::new_v4(),
                kind: ResourceKind::Inventory,
                name: "Pantry".into(),
                owner_id,
                updated_by: None,
                created_at: now,
                updated_at: now,
            },
            shared_user_ids: BTreeSet::new(),
            shared_group_ids: BTreeSet::new(),
        }
    }

    const ACTIONS: [Action; 3] = [Action::View, Action::Edit, Action::Delete];

    #[test]
    fn owner_can_always_view() {
        for role in Role::ALL {
            let p = principal(Some(role));
            let target = resource_owned_by(p.id);
            assert!(can_access(&Subject::new(p, []), &target, Action::View));
        }
    }

    #[test]
    fn viewer_owner_cannot_mutate() {
        let p = principal(Some(Role::Viewer));
        let target = resource_owned_by(p.id);
        let subject = Subject::new(p, []);
        assert!(can_access(&subject, &target, Action::View));
        assert!(!can_access(&subject, &target, Action::Edit));
        assert!(!can_access(&subject, &target, Action::Delete));
    }

    #[test]
    fn moderator_owner_can_mutate() {
        let p = principal(Some(Role::Moderator));
        let target = resource_owned_by(p.id);
        let subject = Subject::new(p, []);
        for action in ACTIONS {
            assert!(can_access(&subject, &target, action));
        }
    }

    #[test]
    fn admin_bypasses_ownership_and_sharing() {
        let subject = Subject::new(principal(Some(Role::Admin)), []);
        let target = resource_owned_by(Uuid::new_v4());
        for action in ACTIONS {
            assert!(can_access(&subject, &target, action));
        }
    }

    #[test]
    fn stranger_without_grant_is_denied() {
        for role in [Role::Moderator, Role::Viewer] {
            let subject = Subject::new(principal(Some(role)), []);
            let target = resource_owned_by(Uuid::new_v4());
            for action in ACTIONS {
                assert!(!can_access(&subject, &target, action), "{role} {action}");
            }
        }
    }

    #[test]
    fn direct_share_grants_view_and_moderator_edit() {
        let viewer = principal(Some(Role::Viewer));
        let moderator = principal(Some(Role::Moderator));
        let mut target = resource_owned_by(Uuid::new_v4());
        target.shared_user_ids.insert(viewer.id);
        target.shared_user_ids.insert(moderator.id);

        let viewer = Subject::new(viewer, []);
        let moderator = Subject::new(moderator, []);
        assert!(can_access(&viewer, &target, Action::View));
        assert!(!can_access(&viewer, &target, Action::Edit));
        assert!(can_access(&moderator, &target, Action::Edit));
        assert!(can_access(&moderator, &target, Action::Delete));
    }

    #[test]
    fn group_share_is_inherited_and_revoked_with_membership() {
        let group_id = Uuid::new_v4();
        let p = principal(Some(Role::Moderator));
        let mut target = resource_owned_by(Uuid::new_v4());
        target.shared_group_ids.insert(group_id);

        let member = Subject::new(p.clone(), [group_id]);
        assert!(can_access(&member, &target, Action::View));
        assert!(can_access(&member, &target, Action::Edit));

        let former_member = Subject::new(p, []);
        assert!(!can_access(&former_member, &target, Action::View));
    }

    #[test]
    fn blocked_or_roleless_principal_is_denied() {
        let mut blocked = principal(Some(Role::Admin));
        blocked.blocked = true;
        let target = resource_owned_by(blocked.id);
        assert!(!can_access(&Subject::new(blocked, []), &target, Action::View));

        let roleless = principal(None);
        let target = resource_owned_by(roleless.id);
        assert!(!can_access(&Subject::new(roleless, []), &target, Action::View));
    }

    #[test]
    fn dangling_grants_do_not_match() {
        let p = principal(Some(Role::Viewer));
        let mut target = resource_owned_by(Uuid::new_v4());
        target.shared_user_ids.insert(Uuid::new_v4());
        target.shared_group_ids.insert(Uuid::new_v4());
        assert!(!can_access(&Subject::new(p, [Uuid::new_v4()]), &target, Action::View));
    }

    #[test]
    fn action_names_round_trip() {
        for action in ACTIONS {
            assert_eq!(action.as_str().parse::<Action>().unwrap(), action);
        }
        assert!("share".parse::<Action>().is_err());
    }
}
