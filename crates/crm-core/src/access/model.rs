//! Roles, resource categories, operations and the per-member access map.
//!
//! Both sides of the access map are closed enums so that an invalid
//! category or operation string is unrepresentable in stored state.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Result;

/// Coarse-grained privilege level of a team member.
///
/// `Admin` bypasses the access map entirely; the remaining roles are
/// governed per category by [`AccessMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    Agent,
    Bot,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Agent => "agent",
            Self::Bot => "bot",
        }
    }
}

/// A team-owned resource category governed by the access map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceCategory {
    Leads,
    Tasks,
    Meetings,
    Categories,
    Products,
    Forms,
    Campaigns,
    Teams,
    Analytics,
    KnowledgeBase,
    WidgetSnippet,
    Dashboard,
}

impl ResourceCategory {
    pub const ALL: [ResourceCategory; 12] = [
        Self::Leads,
        Self::Tasks,
        Self::Meetings,
        Self::Categories,
        Self::Products,
        Self::Forms,
        Self::Campaigns,
        Self::Teams,
        Self::Analytics,
        Self::KnowledgeBase,
        Self::WidgetSnippet,
        Self::Dashboard,
    ];
}

/// A permitted operation on a resource category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Read,
    Write,
    Update,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 4] = [Self::Read, Self::Write, Self::Update, Self::Delete];
}

/// Per-category set of permitted operations for non-admin roles.
///
/// A missing category means no operations are permitted on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessMap {
    entries: HashMap<ResourceCategory, BTreeSet<Operation>>,
}

impl AccessMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default grants for a role, used when a member is added without an
    /// explicit map.
    pub fn for_role(role: Role) -> Self {
        match role {
            // Admins bypass the map; an empty one keeps stored state small.
            Role::Admin => Self::new(),
            Role::Manager => {
                let mut map = Self::new();
                for category in ResourceCategory::ALL {
                    map.grant_all(category);
                }
                map
            }
            Role::Agent => {
                let mut map = Self::new();
                for category in ResourceCategory::ALL {
                    map.grant(category, Operation::Read);
                }
                for category in [
                    ResourceCategory::Leads,
                    ResourceCategory::Tasks,
                    ResourceCategory::Meetings,
                ] {
                    map.grant(category, Operation::Write);
                    map.grant(category, Operation::Update);
                }
                map
            }
            Role::Bot => {
                let mut map = Self::new();
                map.grant(ResourceCategory::Leads, Operation::Write);
                map.grant(ResourceCategory::Forms, Operation::Write);
                map
            }
        }
    }

    pub fn grant(&mut self, category: ResourceCategory, operation: Operation) {
        self.entries.entry(category).or_default().insert(operation);
    }

    pub fn grant_all(&mut self, category: ResourceCategory) {
        let ops = self.entries.entry(category).or_default();
        for operation in Operation::ALL {
            ops.insert(operation);
        }
    }

    pub fn revoke(&mut self, category: ResourceCategory, operation: Operation) {
        if let Some(ops) = self.entries.get_mut(&category) {
            ops.remove(&operation);
            if ops.is_empty() {
                self.entries.remove(&category);
            }
        }
    }

    pub fn contains(&self, category: ResourceCategory, operation: Operation) -> bool {
        self.entries
            .get(&category)
            .is_some_and(|ops| ops.contains(&operation))
    }
}

/// The outcome of a successful permission check: the caller's role and
/// access map within the team.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberAccess {
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    pub access: AccessMap,
}

impl MemberAccess {
    /// Whether the member may perform `operation` on `category`.
    ///
    /// Admins bypass the access map by policy.
    pub fn allows(&self, category: ResourceCategory, operation: Operation) -> bool {
        self.role == Role::Admin || self.access.contains(category, operation)
    }
}

/// The permission-check collaborator used by route handlers.
///
/// Loads the caller's membership in a team, or signals denial:
/// [`crate::Error::TeamNotFound`] when the team is absent,
/// [`crate::Error::NoAccess`] when the caller is not a member.
#[async_trait]
pub trait AccessCheck: Send + Sync {
    async fn member_access(&self, team_id: Uuid, user_id: Uuid) -> Result<MemberAccess>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_bypasses_access_map() {
        let access = MemberAccess {
            team_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            role: Role::Admin,
            access: AccessMap::new(),
        };
        for category in ResourceCategory::ALL {
            for operation in Operation::ALL {
                assert!(access.allows(category, operation));
            }
        }
    }

    #[test]
    fn non_admin_is_limited_to_granted_operations() {
        let mut map = AccessMap::new();
        map.grant(ResourceCategory::Leads, Operation::Read);
        let access = MemberAccess {
            team_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            role: Role::Agent,
            access: map,
        };

        assert!(access.allows(ResourceCategory::Leads, Operation::Read));
        assert!(!access.allows(ResourceCategory::Leads, Operation::Write));
        assert!(!access.allows(ResourceCategory::Tasks, Operation::Read));
    }

    #[test]
    fn revoke_drops_empty_categories() {
        let mut map = AccessMap::new();
        map.grant(ResourceCategory::Products, Operation::Delete);
        map.revoke(ResourceCategory::Products, Operation::Delete);
        assert!(!map.contains(ResourceCategory::Products, Operation::Delete));
    }

    #[test]
    fn manager_defaults_cover_every_category() {
        let map = AccessMap::for_role(Role::Manager);
        for category in ResourceCategory::ALL {
            for operation in Operation::ALL {
                assert!(map.contains(category, operation));
            }
        }
    }

    #[test]
    fn bot_defaults_are_write_only_capture() {
        let map = AccessMap::for_role(Role::Bot);
        assert!(map.contains(ResourceCategory::Leads, Operation::Write));
        assert!(map.contains(ResourceCategory::Forms, Operation::Write));
        assert!(!map.contains(ResourceCategory::Leads, Operation::Read));
        assert!(!map.contains(ResourceCategory::Products, Operation::Write));
    }

    #[test]
    fn access_map_serializes_as_plain_object() {
        let mut map = AccessMap::new();
        map.grant(ResourceCategory::Leads, Operation::Read);
        map.grant(ResourceCategory::Leads, Operation::Write);
        let value = serde_json::to_value(&map).unwrap();
        assert_eq!(value["leads"], serde_json::json!(["read", "write"]));
    }
}
