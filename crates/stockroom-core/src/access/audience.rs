//! Read-only views over everyone who can reach a resource.
//!
//! A [`ResourceAudience`] is loaded once per request and then projected
//! three ways: a flat audit listing, a deduplicated per-level count, and
//! the set of users a resource could still be shared with. The listing and
//! the count always agree on the set of distinct usernames.

use std::collections::{BTreeSet, HashMap};

use uuid::Uuid;

use crate::models::group::Group;
use crate::models::role::Role;
use crate::models::share::{AccessCounts, AccessEntry, AccessLevel, AccessVia};
use crate::models::user::User;

/// A group the resource is shared with, and its members in iteration
/// order.
#[derive(Debug, Clone)]
pub struct GroupAudience {
    pub group: Group,
    pub members: Vec<User>,
}

#[derive(Debug, Clone)]
pub struct ResourceAudience {
    /// `None` when the owning account no longer exists.
    pub owner: Option<User>,
    pub admins: Vec<User>,
    pub direct_shares: Vec<User>,
    pub group_shares: Vec<GroupAudience>,
}

/// Level granted through a share: moderators and admins may edit, anyone
/// else may only view.
pub fn granted_level(user: &User) -> AccessLevel {
    match user.role {
        Some(Role::Admin) | Some(Role::Moderator) => AccessLevel::Edit,
        _ => AccessLevel::View,
    }
}

impl ResourceAudience {
    /// Flat audit log: owner, then admins, then direct shares, then group
    /// members. A user appears once per grant path.
    pub fn access_details(&self) -> Vec<AccessEntry> {
        let mut entries = Vec::new();

        if let Some(owner) = &self.owner {
            entries.push(AccessEntry {
                username: owner.username.clone(),
                access_level: AccessLevel::Edit,
                via: AccessVia::Owner,
                group_name: None,
            });
        }

        let owner_id = self.owner.as_ref().map(|o| o.id);
        for admin in self.admins.iter().filter(|a| Some(a.id) != owner_id) {
            entries.push(AccessEntry {
                username: admin.username.clone(),
                access_level: AccessLevel::Edit,
                via: AccessVia::Admin,
                group_name: None,
            });
        }

        for user in &self.direct_shares {
            entries.push(AccessEntry {
                username: user.username.clone(),
                access_level: granted_level(user),
                via: AccessVia::Share,
                group_name: None,
            });
        }

        for share in &self.group_shares {
            for member in &share.members {
                entries.push(AccessEntry {
                    username: member.username.clone(),
                    access_level: granted_level(member),
                    via: AccessVia::Group,
                    group_name: Some(share.group.name.clone()),
                });
            }
        }

        entries
    }

    /// Distinct users per best access level.
    ///
    /// The owner is seeded as `edit`, then every admin not yet seen as
    /// `admin`. Share paths only ever upgrade `view` to `edit`; an `edit` or
    /// `admin` entry is never overwritten.
    pub fn access_counts(&self) -> AccessCounts {
        let mut best: HashMap<&str, AccessLevel> = HashMap::new();

        if let Some(owner) = &self.owner {
            best.insert(owner.username.as_str(), AccessLevel::Edit);
        }
        for admin in &self.admins {
            best.entry(admin.username.as_str())
                .or_insert(AccessLevel::Admin);
        }

        let shared = self
            .direct_shares
            .iter()
            .chain(self.group_shares.iter().flat_map(|g| g.members.iter()));
        for user in shared {
            let level = granted_level(user);
            best.entry(user.username.as_str())
                .and_modify(|current| {
                    if *current == AccessLevel::View && level == AccessLevel::Edit {
                        *current = AccessLevel::Edit;
                    }
                })
                .or_insert(level);
        }

        best.values()
            .fold(AccessCounts::default(), |mut counts, level| {
                match level {
                    AccessLevel::View => counts.view += 1,
                    AccessLevel::Edit => counts.edit += 1,
                    AccessLevel::Admin => counts.admin += 1,
                }
                counts
            })
    }

    /// Ids of users already reached through a direct or group share.
    pub fn covered_user_ids(&self) -> BTreeSet<Uuid> {
        self.direct_shares
            .iter()
            .chain(self.group_shares.iter().flat_map(|g| g.members.iter()))
            .map(|u| u.id)
            .collect()
    }

    /// Non-admin users from `candidates` that no share covers yet.
    ///
    /// The owner is not excluded: only share grants count as coverage.
    pub fn shareable_among(&self, candidates: Vec<User>) -> Vec<User> {
        let covered = self.covered_user_ids();
        candidates
            .into_iter()
            .filter(|u| !u.is_admin() && !covered.contains(&u.id))
            .collect()
    }
}
