//! File-backed team and membership storage
//!
//! Teams and memberships are kept in memory behind a lock and persisted as
//! JSON. Memberships are indexed by `(team_id, user_id)`, which both gives
//! O(1) permission checks and makes a duplicate membership for the same
//! user unrepresentable.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::model::{Membership, Team};
use crate::access::{AccessCheck, AccessMap, MemberAccess, ResourceCategory, Role};
use crate::{Error, Result};

#[derive(Debug, Default)]
struct TeamState {
    teams: HashMap<Uuid, Team>,
    memberships: HashMap<(Uuid, Uuid), Membership>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredTeamState {
    teams: Vec<Team>,
    memberships: Vec<Membership>,
}

impl From<StoredTeamState> for TeamState {
    fn from(value: StoredTeamState) -> Self {
        Self {
            teams: value.teams.into_iter().map(|team| (team.id, team)).collect(),
            memberships: value
                .memberships
                .into_iter()
                .map(|member| ((member.team_id, member.user_id), member))
                .collect(),
        }
    }
}

impl From<&TeamState> for StoredTeamState {
    fn from(value: &TeamState) -> Self {
        Self {
            teams: value.teams.values().cloned().collect(),
            memberships: value.memberships.values().cloned().collect(),
        }
    }
}

/// File-backed team store using JSON
pub struct FileTeamStore {
    path: PathBuf,
    state: RwLock<TeamState>,
}

impl FileTeamStore {
    /// Create a new store; the file is created on first write.
    pub async fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = load_state(&path).await?;
        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    async fn persist(&self) -> Result<()> {
        let state = self.state.read().await;
        let content = serde_json::to_string_pretty(&StoredTeamState::from(&*state))?;
        drop(state);
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }

    /// Create a team; the creator becomes its first admin member.
    pub async fn create_team(&self, name: &str, created_by: Uuid) -> Result<Team> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("Team name cannot be empty".to_string()));
        }

        let team = Team::new(name, created_by);
        let membership = Membership::new(team.id, created_by, Role::Admin, AccessMap::new());
        {
            let mut state = self.state.write().await;
            state.teams.insert(team.id, team.clone());
            state
                .memberships
                .insert((team.id, created_by), membership);
        }
        self.persist().await?;
        Ok(team)
    }

    pub async fn get_team(&self, team_id: Uuid) -> Result<Team> {
        let state = self.state.read().await;
        state
            .teams
            .get(&team_id)
            .cloned()
            .ok_or_else(|| Error::TeamNotFound(team_id.to_string()))
    }

    /// Teams the user belongs to, with their role in each.
    pub async fn list_teams_for_user(&self, user_id: Uuid) -> Result<Vec<(Team, Role)>> {
        let state = self.state.read().await;
        let mut teams = Vec::new();
        for membership in state
            .memberships
            .values()
            .filter(|membership| membership.user_id == user_id)
        {
            if let Some(team) = state.teams.get(&membership.team_id) {
                teams.push((team.clone(), membership.role));
            }
        }
        teams.sort_by(|left, right| left.0.name.cmp(&right.0.name));
        Ok(teams)
    }

    /// Rename a team. Only the creator or an admin member may rename.
    pub async fn rename_team(&self, team_id: Uuid, actor: Uuid, name: &str) -> Result<Team> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("Team name cannot be empty".to_string()));
        }

        let team = {
            let mut state = self.state.write().await;
            ensure_manage_rights(&state, team_id, actor)?;
            let team = state
                .teams
                .get_mut(&team_id)
                .ok_or_else(|| Error::TeamNotFound(team_id.to_string()))?;
            team.name = name.to_string();
            team.updated_at = Utc::now();
            team.clone()
        };
        self.persist().await?;
        Ok(team)
    }

    /// Toggle team-wide visibility of a resource category.
    pub async fn set_visibility(
        &self,
        team_id: Uuid,
        actor: Uuid,
        category: ResourceCategory,
        visible: bool,
    ) -> Result<Team> {
        let team = {
            let mut state = self.state.write().await;
            ensure_manage_rights(&state, team_id, actor)?;
            let team = state
                .teams
                .get_mut(&team_id)
                .ok_or_else(|| Error::TeamNotFound(team_id.to_string()))?;
            team.visibility.set_visible(category, visible);
            team.updated_at = Utc::now();
            team.clone()
        };
        self.persist().await?;
        Ok(team)
    }

    /// Add a member or update an existing member's role and access map.
    ///
    /// Omitting the access map applies the role's defaults.
    pub async fn upsert_member(
        &self,
        team_id: Uuid,
        actor: Uuid,
        user_id: Uuid,
        role: Role,
        access: Option<AccessMap>,
    ) -> Result<Membership> {
        let membership = {
            let mut state = self.state.write().await;
            ensure_manage_rights(&state, team_id, actor)?;

            let now = Utc::now();
            let access = access.unwrap_or_else(|| AccessMap::for_role(role));
            let entry = state
                .memberships
                .entry((team_id, user_id))
                .and_modify(|member| {
                    member.role = role;
                    member.access = access.clone();
                    member.updated_at = now;
                })
                .or_insert_with(|| Membership::new(team_id, user_id, role, access));
            entry.clone()
        };
        self.persist().await?;
        Ok(membership)
    }

    /// List the team's members. Any member may read the roster.
    pub async fn list_members(&self, team_id: Uuid, actor: Uuid) -> Result<Vec<Membership>> {
        let state = self.state.read().await;
        ensure_membership(&state, team_id, actor)?;
        let mut members: Vec<Membership> = state
            .memberships
            .values()
            .filter(|membership| membership.team_id == team_id)
            .cloned()
            .collect();
        members.sort_by(|left, right| left.created_at.cmp(&right.created_at));
        Ok(members)
    }

    /// Remove a member. The creator's membership cannot be removed.
    pub async fn remove_member(&self, team_id: Uuid, actor: Uuid, user_id: Uuid) -> Result<()> {
        {
            let mut state = self.state.write().await;
            ensure_manage_rights(&state, team_id, actor)?;
            let team = state
                .teams
                .get(&team_id)
                .ok_or_else(|| Error::TeamNotFound(team_id.to_string()))?;
            if team.created_by == user_id {
                return Err(Error::InvalidInput(
                    "Cannot remove the team creator".to_string(),
                ));
            }
            if state.memberships.remove(&(team_id, user_id)).is_none() {
                return Err(Error::NotFound(format!(
                    "User {} is not a member of team {}",
                    user_id, team_id
                )));
            }
        }
        self.persist().await?;
        Ok(())
    }
}

#[async_trait]
impl AccessCheck for FileTeamStore {
    async fn member_access(&self, team_id: Uuid, user_id: Uuid) -> Result<MemberAccess> {
        let state = self.state.read().await;
        let membership = ensure_membership(&state, team_id, user_id)?;
        Ok(MemberAccess {
            team_id,
            user_id,
            role: membership.role,
            access: membership.access.clone(),
        })
    }
}

fn ensure_membership(state: &TeamState, team_id: Uuid, user_id: Uuid) -> Result<&Membership> {
    if !state.teams.contains_key(&team_id) {
        return Err(Error::TeamNotFound(team_id.to_string()));
    }
    state
        .memberships
        .get(&(team_id, user_id))
        .ok_or_else(|| Error::NoAccess(format!("User {} is not a member of the team", user_id)))
}

/// Member management requires the admin role or being the team creator.
fn ensure_manage_rights(state: &TeamState, team_id: Uuid, actor: Uuid) -> Result<()> {
    let team = state
        .teams
        .get(&team_id)
        .ok_or_else(|| Error::TeamNotFound(team_id.to_string()))?;
    if team.created_by == actor {
        return Ok(());
    }
    let membership = state
        .memberships
        .get(&(team_id, actor))
        .ok_or_else(|| Error::NoAccess(format!("User {} is not a member of the team", actor)))?;
    if membership.role != Role::Admin {
        return Err(Error::NoAccess(
            "Only admins can manage the team".to_string(),
        ));
    }
    Ok(())
}

async fn load_state(path: &Path) -> Result<TeamState> {
    if !path.exists() {
        return Ok(TeamState::default());
    }
    let content = tokio::fs::read_to_string(path).await?;
    if content.trim().is_empty() {
        return Ok(TeamState::default());
    }
    let stored: StoredTeamState = serde_json::from_str(&content)?;
    debug!(
        teams = stored.teams.len(),
        memberships = stored.memberships.len(),
        "loaded team state"
    );
    Ok(stored.into())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::access::Operation;

    async fn build_store() -> (FileTeamStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileTeamStore::new(temp_dir.path().join("teams.json"))
            .await
            .unwrap();
        (store, temp_dir)
    }

    #[tokio::test]
    async fn creator_becomes_admin_member() {
        let (store, _temp) = build_store().await;
        let creator = Uuid::new_v4();
        let team = store.create_team("Sales", creator).await.unwrap();

        let access = store.member_access(team.id, creator).await.unwrap();
        assert_eq!(access.role, Role::Admin);
        assert!(access.allows(ResourceCategory::Leads, Operation::Delete));
    }

    #[tokio::test]
    async fn member_access_denies_unknown_team_and_non_member() {
        let (store, _temp) = build_store().await;
        let creator = Uuid::new_v4();
        let team = store.create_team("Sales", creator).await.unwrap();

        let missing = store.member_access(Uuid::new_v4(), creator).await;
        assert!(matches!(missing, Err(Error::TeamNotFound(_))));

        let outsider = store.member_access(team.id, Uuid::new_v4()).await;
        assert!(matches!(outsider, Err(Error::NoAccess(_))));
    }

    #[tokio::test]
    async fn upsert_member_is_idempotent_per_user() {
        let (store, _temp) = build_store().await;
        let creator = Uuid::new_v4();
        let agent = Uuid::new_v4();
        let team = store.create_team("Sales", creator).await.unwrap();

        store
            .upsert_member(team.id, creator, agent, Role::Agent, None)
            .await
            .unwrap();
        store
            .upsert_member(team.id, creator, agent, Role::Manager, None)
            .await
            .unwrap();

        let members = store.list_members(team.id, creator).await.unwrap();
        assert_eq!(members.len(), 2);
        let access = store.member_access(team.id, agent).await.unwrap();
        assert_eq!(access.role, Role::Manager);
    }

    #[tokio::test]
    async fn non_admin_cannot_manage_members() {
        let (store, _temp) = build_store().await;
        let creator = Uuid::new_v4();
        let agent = Uuid::new_v4();
        let team = store.create_team("Sales", creator).await.unwrap();
        store
            .upsert_member(team.id, creator, agent, Role::Agent, None)
            .await
            .unwrap();

        let result = store
            .upsert_member(team.id, agent, Uuid::new_v4(), Role::Agent, None)
            .await;
        assert!(matches!(result, Err(Error::NoAccess(_))));
    }

    #[tokio::test]
    async fn creator_membership_cannot_be_removed() {
        let (store, _temp) = build_store().await;
        let creator = Uuid::new_v4();
        let team = store.create_team("Sales", creator).await.unwrap();

        let result = store.remove_member(team.id, creator, creator).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn custom_access_map_survives_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("teams.json");
        let creator = Uuid::new_v4();
        let agent = Uuid::new_v4();
        let team_id;

        {
            let store = FileTeamStore::new(&path).await.unwrap();
            let team = store.create_team("Sales", creator).await.unwrap();
            team_id = team.id;
            let mut access = AccessMap::new();
            access.grant(ResourceCategory::Leads, Operation::Read);
            store
                .upsert_member(team_id, creator, agent, Role::Agent, Some(access))
                .await
                .unwrap();
        }

        {
            let store = FileTeamStore::new(&path).await.unwrap();
            let access = store.member_access(team_id, agent).await.unwrap();
            assert!(access.allows(ResourceCategory::Leads, Operation::Read));
            assert!(!access.allows(ResourceCategory::Leads, Operation::Write));
        }
    }

    #[tokio::test]
    async fn rename_requires_manage_rights() {
        let (store, _temp) = build_store().await;
        let creator = Uuid::new_v4();
        let agent = Uuid::new_v4();
        let team = store.create_team("Sales", creator).await.unwrap();
        store
            .upsert_member(team.id, creator, agent, Role::Agent, None)
            .await
            .unwrap();

        assert!(matches!(
            store.rename_team(team.id, agent, "Revenue").await,
            Err(Error::NoAccess(_))
        ));
        let renamed = store.rename_team(team.id, creator, "Revenue").await.unwrap();
        assert_eq!(renamed.name, "Revenue");
    }
}
