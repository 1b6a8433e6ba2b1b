//! Team and membership models

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::{AccessMap, ResourceCategory, Role};

/// Team-wide visibility toggle per resource category.
///
/// A category missing from the map is visible; only explicit opt-outs are
/// stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisibilityMap {
    hidden: HashMap<ResourceCategory, bool>,
}

impl VisibilityMap {
    pub fn is_visible(&self, category: ResourceCategory) -> bool {
        !self.hidden.get(&category).copied().unwrap_or(false)
    }

    pub fn set_visible(&mut self, category: ResourceCategory, visible: bool) {
        if visible {
            self.hidden.remove(&category);
        } else {
            self.hidden.insert(category, true);
        }
    }
}

/// The tenant boundary. Memberships are stored separately, keyed by
/// `(team_id, user_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    pub created_by: Uuid,
    #[serde(default)]
    pub visibility: VisibilityMap,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Team {
    pub fn new(name: impl Into<String>, created_by: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_by,
            visibility: VisibilityMap::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A user's association with a team: role plus access map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    pub access: AccessMap,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Membership {
    pub fn new(team_id: Uuid, user_id: Uuid, role: Role, access: AccessMap) -> Self {
        let now = Utc::now();
        Self {
            team_id,
            user_id,
            role,
            access,
            created_at: now,
            updated_at: now,
        }
    }
}
