//! File-backed CRM resource storage
//!
//! All team-owned resources live in one JSON-backed document store, kept in
//! memory behind a lock, mirroring the single-file layout the rest of the
//! service uses. Every lookup is scoped by team: a record from another team
//! is reported as missing, never leaked.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::model::{
    Category, CustomForm, FormResponse, Lead, Meeting, Organization, Product, TaskItem, TaskStatus,
};
use crate::{Error, Result};

#[derive(Debug, Default)]
struct CrmState {
    leads: HashMap<Uuid, Lead>,
    tasks: HashMap<Uuid, TaskItem>,
    meetings: HashMap<Uuid, Meeting>,
    products: HashMap<Uuid, Product>,
    categories: HashMap<Uuid, Category>,
    organizations: HashMap<Uuid, Organization>,
    forms: HashMap<Uuid, CustomForm>,
    form_responses: HashMap<Uuid, FormResponse>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredCrmState {
    leads: Vec<Lead>,
    tasks: Vec<TaskItem>,
    meetings: Vec<Meeting>,
    products: Vec<Product>,
    categories: Vec<Category>,
    organizations: Vec<Organization>,
    forms: Vec<CustomForm>,
    form_responses: Vec<FormResponse>,
}

impl From<StoredCrmState> for CrmState {
    fn from(value: StoredCrmState) -> Self {
        fn index<T>(items: Vec<T>, id: impl Fn(&T) -> Uuid) -> HashMap<Uuid, T> {
            items.into_iter().map(|item| (id(&item), item)).collect()
        }
        Self {
            leads: index(value.leads, |item| item.id),
            tasks: index(value.tasks, |item| item.id),
            meetings: index(value.meetings, |item| item.id),
            products: index(value.products, |item| item.id),
            categories: index(value.categories, |item| item.id),
            organizations: index(value.organizations, |item| item.id),
            forms: index(value.forms, |item| item.id),
            form_responses: index(value.form_responses, |item| item.id),
        }
    }
}

impl From<&CrmState> for StoredCrmState {
    fn from(value: &CrmState) -> Self {
        Self {
            leads: value.leads.values().cloned().collect(),
            tasks: value.tasks.values().cloned().collect(),
            meetings: value.meetings.values().cloned().collect(),
            products: value.products.values().cloned().collect(),
            categories: value.categories.values().cloned().collect(),
            organizations: value.organizations.values().cloned().collect(),
            forms: value.forms.values().cloned().collect(),
            form_responses: value.form_responses.values().cloned().collect(),
        }
    }
}

/// Ownership filter for lead listings, applied inside the store query
/// rather than after retrieval.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeadFilter {
    pub assigned_to: Option<Uuid>,
    pub created_by: Option<Uuid>,
}

/// Dashboard aggregation across three resource kinds.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_leads: usize,
    pub pending_tasks: usize,
    pub completed_tasks: usize,
    pub upcoming_meetings: Vec<Meeting>,
}

/// File-backed CRM store using JSON
pub struct FileCrmStore {
    path: PathBuf,
    state: RwLock<CrmState>,
}

impl FileCrmStore {
    /// Create a new store; the file is created on first write.
    pub async fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = load_state(&path).await?;
        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    fn required_text(field: &str, value: &str) -> Result<String> {
        let value = value.trim();
        if value.is_empty() {
            return Err(Error::InvalidInput(format!("{} cannot be empty", field)));
        }
        Ok(value.to_string())
    }

    fn normalized_email(value: &str) -> Result<String> {
        let value = value.trim().to_lowercase();
        if value.is_empty() || !value.contains('@') {
            return Err(Error::InvalidInput("Invalid lead email".to_string()));
        }
        Ok(value)
    }

    async fn persist(&self) -> Result<()> {
        let state = self.state.read().await;
        let content = serde_json::to_string_pretty(&StoredCrmState::from(&*state))?;
        drop(state);
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }

    // ========================================================================
    // Leads
    // ========================================================================

    /// Insert a lead. Email must be unique within the team; the same email
    /// under another team is a different lead.
    pub async fn create_lead(&self, mut lead: Lead) -> Result<Lead> {
        lead.name = Self::required_text("Lead name", &lead.name)?;
        lead.email = Self::normalized_email(&lead.email)?;
        {
            let mut state = self.state.write().await;
            if state
                .leads
                .values()
                .any(|existing| existing.team_id == lead.team_id && existing.email == lead.email)
            {
                return Err(Error::Conflict(format!(
                    "A lead with email '{}' already exists in this team",
                    lead.email
                )));
            }
            state.leads.insert(lead.id, lead.clone());
        }
        self.persist().await?;
        Ok(lead)
    }

    pub async fn get_lead(&self, team_id: Uuid, id: Uuid) -> Result<Lead> {
        let state = self.state.read().await;
        state
            .leads
            .get(&id)
            .filter(|lead| lead.team_id == team_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Lead {} not found", id)))
    }

    pub async fn list_leads(&self, team_id: Uuid, filter: LeadFilter) -> Result<Vec<Lead>> {
        let state = self.state.read().await;
        let mut leads: Vec<Lead> = state
            .leads
            .values()
            .filter(|lead| lead.team_id == team_id)
            .filter(|lead| {
                filter
                    .assigned_to
                    .is_none_or(|user| lead.assigned_to == Some(user))
            })
            .filter(|lead| filter.created_by.is_none_or(|user| lead.created_by == user))
            .cloned()
            .collect();
        leads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(leads)
    }

    /// Replace an existing lead after a partial merge done by the caller.
    pub async fn update_lead(&self, mut lead: Lead) -> Result<Lead> {
        lead.updated_at = Utc::now();
        lead.name = Self::required_text("Lead name", &lead.name)?;
        lead.email = Self::normalized_email(&lead.email)?;
        {
            let mut state = self.state.write().await;
            let existing = state
                .leads
                .get(&lead.id)
                .filter(|existing| existing.team_id == lead.team_id)
                .ok_or_else(|| Error::NotFound(format!("Lead {} not found", lead.id)))?;
            if existing.email != lead.email
                && state.leads.values().any(|other| {
                    other.team_id == lead.team_id && other.id != lead.id && other.email == lead.email
                })
            {
                return Err(Error::Conflict(format!(
                    "A lead with email '{}' already exists in this team",
                    lead.email
                )));
            }
            state.leads.insert(lead.id, lead.clone());
        }
        self.persist().await?;
        Ok(lead)
    }

    pub async fn delete_lead(&self, team_id: Uuid, id: Uuid) -> Result<()> {
        {
            let mut state = self.state.write().await;
            match state.leads.get(&id) {
                Some(lead) if lead.team_id == team_id => {
                    state.leads.remove(&id);
                }
                _ => return Err(Error::NotFound(format!("Lead {} not found", id))),
            }
        }
        self.persist().await
    }

    // ========================================================================
    // Tasks
    // ========================================================================

    pub async fn create_task(&self, mut task: TaskItem) -> Result<TaskItem> {
        task.title = Self::required_text("Task title", &task.title)?;
        {
            let mut state = self.state.write().await;
            state.tasks.insert(task.id, task.clone());
        }
        self.persist().await?;
        Ok(task)
    }

    pub async fn get_task(&self, team_id: Uuid, id: Uuid) -> Result<TaskItem> {
        let state = self.state.read().await;
        state
            .tasks
            .get(&id)
            .filter(|task| task.team_id == team_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Task {} not found", id)))
    }

    pub async fn list_tasks(&self, team_id: Uuid, assigned_to: Option<Uuid>) -> Result<Vec<TaskItem>> {
        let state = self.state.read().await;
        let mut tasks: Vec<TaskItem> = state
            .tasks
            .values()
            .filter(|task| task.team_id == team_id)
            .filter(|task| assigned_to.is_none_or(|user| task.assigned_to == Some(user)))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    pub async fn update_task(&self, mut task: TaskItem) -> Result<TaskItem> {
        task.updated_at = Utc::now();
        task.title = Self::required_text("Task title", &task.title)?;
        {
            let mut state = self.state.write().await;
            if !state
                .tasks
                .get(&task.id)
                .is_some_and(|existing| existing.team_id == task.team_id)
            {
                return Err(Error::NotFound(format!("Task {} not found", task.id)));
            }
            state.tasks.insert(task.id, task.clone());
        }
        self.persist().await?;
        Ok(task)
    }

    pub async fn delete_task(&self, team_id: Uuid, id: Uuid) -> Result<()> {
        {
            let mut state = self.state.write().await;
            match state.tasks.get(&id) {
                Some(task) if task.team_id == team_id => {
                    state.tasks.remove(&id);
                }
                _ => return Err(Error::NotFound(format!("Task {} not found", id))),
            }
        }
        self.persist().await
    }

    // ========================================================================
    // Meetings
    // ========================================================================

    pub async fn create_meeting(&self, mut meeting: Meeting) -> Result<Meeting> {
        meeting.title = Self::required_text("Meeting title", &meeting.title)?;
        {
            let mut state = self.state.write().await;
            state.meetings.insert(meeting.id, meeting.clone());
        }
        self.persist().await?;
        Ok(meeting)
    }

    pub async fn get_meeting(&self, team_id: Uuid, id: Uuid) -> Result<Meeting> {
        let state = self.state.read().await;
        state
            .meetings
            .get(&id)
            .filter(|meeting| meeting.team_id == team_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Meeting {} not found", id)))
    }

    pub async fn list_meetings(&self, team_id: Uuid) -> Result<Vec<Meeting>> {
        let state = self.state.read().await;
        let mut meetings: Vec<Meeting> = state
            .meetings
            .values()
            .filter(|meeting| meeting.team_id == team_id)
            .cloned()
            .collect();
        meetings.sort_by(|a, b| a.starts_at.cmp(&b.starts_at));
        Ok(meetings)
    }

    pub async fn update_meeting(&self, mut meeting: Meeting) -> Result<Meeting> {
        meeting.updated_at = Utc::now();
        meeting.title = Self::required_text("Meeting title", &meeting.title)?;
        {
            let mut state = self.state.write().await;
            if !state
                .meetings
                .get(&meeting.id)
                .is_some_and(|existing| existing.team_id == meeting.team_id)
            {
                return Err(Error::NotFound(format!("Meeting {} not found", meeting.id)));
            }
            state.meetings.insert(meeting.id, meeting.clone());
        }
        self.persist().await?;
        Ok(meeting)
    }

    pub async fn delete_meeting(&self, team_id: Uuid, id: Uuid) -> Result<()> {
        {
            let mut state = self.state.write().await;
            match state.meetings.get(&id) {
                Some(meeting) if meeting.team_id == team_id => {
                    state.meetings.remove(&id);
                }
                _ => return Err(Error::NotFound(format!("Meeting {} not found", id))),
            }
        }
        self.persist().await
    }

    // ========================================================================
    // Products
    // ========================================================================

    pub async fn create_product(&self, mut product: Product) -> Result<Product> {
        product.name = Self::required_text("Product name", &product.name)?;
        {
            let mut state = self.state.write().await;
            state.products.insert(product.id, product.clone());
        }
        self.persist().await?;
        Ok(product)
    }

    pub async fn get_product(&self, team_id: Uuid, id: Uuid) -> Result<Product> {
        let state = self.state.read().await;
        state
            .products
            .get(&id)
            .filter(|product| product.team_id == team_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Product {} not found", id)))
    }

    pub async fn list_products(&self, team_id: Uuid) -> Result<Vec<Product>> {
        let state = self.state.read().await;
        let mut products: Vec<Product> = state
            .products
            .values()
            .filter(|product| product.team_id == team_id)
            .cloned()
            .collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(products)
    }

    pub async fn update_product(&self, mut product: Product) -> Result<Product> {
        product.updated_at = Utc::now();
        product.name = Self::required_text("Product name", &product.name)?;
        {
            let mut state = self.state.write().await;
            if !state
                .products
                .get(&product.id)
                .is_some_and(|existing| existing.team_id == product.team_id)
            {
                return Err(Error::NotFound(format!("Product {} not found", product.id)));
            }
            state.products.insert(product.id, product.clone());
        }
        self.persist().await?;
        Ok(product)
    }

    pub async fn delete_product(&self, team_id: Uuid, id: Uuid) -> Result<()> {
        {
            let mut state = self.state.write().await;
            match state.products.get(&id) {
                Some(product) if product.team_id == team_id => {
                    state.products.remove(&id);
                }
                _ => return Err(Error::NotFound(format!("Product {} not found", id))),
            }
        }
        self.persist().await
    }

    // ========================================================================
    // Categories
    // ========================================================================

    /// Insert a category. Name is unique within the team.
    pub async fn create_category(&self, mut category: Category) -> Result<Category> {
        category.name = Self::required_text("Category name", &category.name)?;
        {
            let mut state = self.state.write().await;
            if state.categories.values().any(|existing| {
                existing.team_id == category.team_id
                    && existing.name.eq_ignore_ascii_case(&category.name)
            }) {
                return Err(Error::Conflict(format!(
                    "A category named '{}' already exists in this team",
                    category.name
                )));
            }
            state.categories.insert(category.id, category.clone());
        }
        self.persist().await?;
        Ok(category)
    }

    pub async fn get_category(&self, team_id: Uuid, id: Uuid) -> Result<Category> {
        let state = self.state.read().await;
        state
            .categories
            .get(&id)
            .filter(|category| category.team_id == team_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Category {} not found", id)))
    }

    pub async fn list_categories(&self, team_id: Uuid) -> Result<Vec<Category>> {
        let state = self.state.read().await;
        let mut categories: Vec<Category> = state
            .categories
            .values()
            .filter(|category| category.team_id == team_id)
            .cloned()
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    pub async fn update_category(&self, mut category: Category) -> Result<Category> {
        category.updated_at = Utc::now();
        category.name = Self::required_text("Category name", &category.name)?;
        {
            let mut state = self.state.write().await;
            if !state
                .categories
                .get(&category.id)
                .is_some_and(|existing| existing.team_id == category.team_id)
            {
                return Err(Error::NotFound(format!(
                    "Category {} not found",
                    category.id
                )));
            }
            state.categories.insert(category.id, category.clone());
        }
        self.persist().await?;
        Ok(category)
    }

    pub async fn delete_category(&self, team_id: Uuid, id: Uuid) -> Result<()> {
        {
            let mut state = self.state.write().await;
            match state.categories.get(&id) {
                Some(category) if category.team_id == team_id => {
                    state.categories.remove(&id);
                }
                _ => return Err(Error::NotFound(format!("Category {} not found", id))),
            }
        }
        self.persist().await
    }

    // ========================================================================
    // Organizations
    // ========================================================================

    pub async fn create_organization(&self, mut organization: Organization) -> Result<Organization> {
        organization.name = Self::required_text("Organization name", &organization.name)?;
        {
            let mut state = self.state.write().await;
            state
                .organizations
                .insert(organization.id, organization.clone());
        }
        self.persist().await?;
        Ok(organization)
    }

    pub async fn get_organization(&self, team_id: Uuid, id: Uuid) -> Result<Organization> {
        let state = self.state.read().await;
        state
            .organizations
            .get(&id)
            .filter(|organization| organization.team_id == team_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Organization {} not found", id)))
    }

    pub async fn list_organizations(&self, team_id: Uuid) -> Result<Vec<Organization>> {
        let state = self.state.read().await;
        let mut organizations: Vec<Organization> = state
            .organizations
            .values()
            .filter(|organization| organization.team_id == team_id)
            .cloned()
            .collect();
        organizations.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(organizations)
    }

    pub async fn update_organization(&self, mut organization: Organization) -> Result<Organization> {
        organization.updated_at = Utc::now();
        organization.name = Self::required_text("Organization name", &organization.name)?;
        {
            let mut state = self.state.write().await;
            if !state
                .organizations
                .get(&organization.id)
                .is_some_and(|existing| existing.team_id == organization.team_id)
            {
                return Err(Error::NotFound(format!(
                    "Organization {} not found",
                    organization.id
                )));
            }
            state
                .organizations
                .insert(organization.id, organization.clone());
        }
        self.persist().await?;
        Ok(organization)
    }

    pub async fn delete_organization(&self, team_id: Uuid, id: Uuid) -> Result<()> {
        {
            let mut state = self.state.write().await;
            match state.organizations.get(&id) {
                Some(organization) if organization.team_id == team_id => {
                    state.organizations.remove(&id);
                }
                _ => return Err(Error::NotFound(format!("Organization {} not found", id))),
            }
        }
        self.persist().await
    }

    // ========================================================================
    // Custom forms and responses
    // ========================================================================

    pub async fn create_form(&self, mut form: CustomForm) -> Result<CustomForm> {
        form.name = Self::required_text("Form name", &form.name)?;
        {
            let mut state = self.state.write().await;
            state.forms.insert(form.id, form.clone());
        }
        self.persist().await?;
        Ok(form)
    }

    pub async fn get_form(&self, team_id: Uuid, id: Uuid) -> Result<CustomForm> {
        let state = self.state.read().await;
        state
            .forms
            .get(&id)
            .filter(|form| form.team_id == team_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Form {} not found", id)))
    }

    pub async fn list_forms(&self, team_id: Uuid) -> Result<Vec<CustomForm>> {
        let state = self.state.read().await;
        let mut forms: Vec<CustomForm> = state
            .forms
            .values()
            .filter(|form| form.team_id == team_id)
            .cloned()
            .collect();
        forms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(forms)
    }

    pub async fn update_form(&self, mut form: CustomForm) -> Result<CustomForm> {
        form.updated_at = Utc::now();
        form.name = Self::required_text("Form name", &form.name)?;
        {
            let mut state = self.state.write().await;
            if !state
                .forms
                .get(&form.id)
                .is_some_and(|existing| existing.team_id == form.team_id)
            {
                return Err(Error::NotFound(format!("Form {} not found", form.id)));
            }
            state.forms.insert(form.id, form.clone());
        }
        self.persist().await?;
        Ok(form)
    }

    pub async fn delete_form(&self, team_id: Uuid, id: Uuid) -> Result<()> {
        {
            let mut state = self.state.write().await;
            match state.forms.get(&id) {
                Some(form) if form.team_id == team_id => {
                    state.forms.remove(&id);
                }
                _ => return Err(Error::NotFound(format!("Form {} not found", id))),
            }
        }
        self.persist().await
    }

    pub async fn create_form_response(&self, response: FormResponse) -> Result<FormResponse> {
        {
            let mut state = self.state.write().await;
            if !state
                .forms
                .get(&response.form_id)
                .is_some_and(|form| form.team_id == response.team_id)
            {
                return Err(Error::NotFound(format!(
                    "Form {} not found",
                    response.form_id
                )));
            }
            state.form_responses.insert(response.id, response.clone());
        }
        self.persist().await?;
        Ok(response)
    }

    /// Back-reference the lead captured from a stored submission.
    pub async fn link_response_lead(&self, response_id: Uuid, lead_id: Uuid) -> Result<()> {
        {
            let mut state = self.state.write().await;
            let response = state
                .form_responses
                .get_mut(&response_id)
                .ok_or_else(|| Error::NotFound(format!("Response {} not found", response_id)))?;
            response.lead_id = Some(lead_id);
        }
        self.persist().await
    }

    pub async fn list_form_responses(
        &self,
        team_id: Uuid,
        form_id: Uuid,
    ) -> Result<Vec<FormResponse>> {
        let state = self.state.read().await;
        if !state
            .forms
            .get(&form_id)
            .is_some_and(|form| form.team_id == team_id)
        {
            return Err(Error::NotFound(format!("Form {} not found", form_id)));
        }
        let mut responses: Vec<FormResponse> = state
            .form_responses
            .values()
            .filter(|response| response.form_id == form_id)
            .cloned()
            .collect();
        responses.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(responses)
    }

    // ========================================================================
    // Dashboard aggregation
    // ========================================================================

    /// Counts across three resource kinds plus the caller's upcoming
    /// meetings, sorted by start time ascending. Each count is computed
    /// independently; no pagination.
    pub async fn dashboard_summary(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<DashboardSummary> {
        let state = self.state.read().await;

        let total_leads = state
            .leads
            .values()
            .filter(|lead| lead.team_id == team_id)
            .count();
        let pending_tasks = state
            .tasks
            .values()
            .filter(|task| task.team_id == team_id && task.status == TaskStatus::Pending)
            .count();
        let completed_tasks = state
            .tasks
            .values()
            .filter(|task| task.team_id == team_id && task.status == TaskStatus::Completed)
            .count();

        let mut upcoming_meetings: Vec<Meeting> = state
            .meetings
            .values()
            .filter(|meeting| {
                meeting.team_id == team_id
                    && meeting.created_by == user_id
                    && meeting.starts_at >= now
            })
            .cloned()
            .collect();
        upcoming_meetings.sort_by(|a, b| a.starts_at.cmp(&b.starts_at));

        Ok(DashboardSummary {
            total_leads,
            pending_tasks,
            completed_tasks,
            upcoming_meetings,
        })
    }
}

async fn load_state(path: &Path) -> Result<CrmState> {
    if !path.exists() {
        return Ok(CrmState::default());
    }
    let content = tokio::fs::read_to_string(path).await?;
    if content.trim().is_empty() {
        return Ok(CrmState::default());
    }
    let stored: StoredCrmState = serde_json::from_str(&content)?;
    debug!(
        leads = stored.leads.len(),
        tasks = stored.tasks.len(),
        forms = stored.forms.len(),
        "loaded resource state"
    );
    Ok(stored.into())
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use tempfile::TempDir;

    use super::*;

    async fn build_store() -> (FileCrmStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileCrmStore::new(temp_dir.path().join("crm.json"))
            .await
            .unwrap();
        (store, temp_dir)
    }

    #[tokio::test]
    async fn duplicate_lead_email_conflicts_within_team_only() {
        let (store, _temp) = build_store().await;
        let team_a = Uuid::new_v4();
        let team_b = Uuid::new_v4();
        let user = Uuid::new_v4();

        store
            .create_lead(Lead::new(team_a, "Ada", "ada@example.com", user))
            .await
            .unwrap();

        let duplicate = store
            .create_lead(Lead::new(team_a, "Ada Again", "Ada@Example.com", user))
            .await;
        assert!(matches!(duplicate, Err(Error::Conflict(_))));

        // Same email under a different team succeeds.
        store
            .create_lead(Lead::new(team_b, "Ada", "ada@example.com", user))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn blank_required_fields_are_rejected() {
        let (store, _temp) = build_store().await;
        let team = Uuid::new_v4();
        let user = Uuid::new_v4();

        let blank_name = store
            .create_lead(Lead::new(team, "   ", "ada@example.com", user))
            .await;
        assert!(matches!(blank_name, Err(Error::InvalidInput(_))));

        let cases = [
            store.create_task(TaskItem::new(team, "", user)).await.err(),
            store
                .create_meeting(Meeting::new(team, "  ", Utc::now(), user))
                .await
                .err(),
            store
                .create_product(Product::new(team, "", 9.0, user))
                .await
                .err(),
            store
                .create_category(Category::new(team, "", user))
                .await
                .err(),
            store
                .create_organization(Organization::new(team, " ", user))
                .await
                .err(),
            store
                .create_form(CustomForm::new(team, "", user))
                .await
                .err(),
        ];
        for case in cases {
            assert!(matches!(case, Some(Error::InvalidInput(_))));
        }
    }

    #[tokio::test]
    async fn lead_update_revalidates_the_email() {
        let (store, _temp) = build_store().await;
        let team = Uuid::new_v4();
        let user = Uuid::new_v4();

        let lead = store
            .create_lead(Lead::new(team, "Ada", "ada@example.com", user))
            .await
            .unwrap();

        let mut broken = lead.clone();
        broken.email = "not-an-email".to_string();
        let result = store.update_lead(broken).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));

        // The stored record is untouched.
        let stored = store.get_lead(team, lead.id).await.unwrap();
        assert_eq!(stored.email, "ada@example.com");
    }

    #[tokio::test]
    async fn lead_lookup_is_team_scoped() {
        let (store, _temp) = build_store().await;
        let team_a = Uuid::new_v4();
        let team_b = Uuid::new_v4();
        let user = Uuid::new_v4();

        let lead = store
            .create_lead(Lead::new(team_a, "Ada", "ada@example.com", user))
            .await
            .unwrap();

        let cross_team = store.get_lead(team_b, lead.id).await;
        assert!(matches!(cross_team, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn lead_filter_is_applied_in_the_query() {
        let (store, _temp) = build_store().await;
        let team = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();

        let mut assigned = Lead::new(team, "Assigned", "assigned@example.com", other);
        assigned.assigned_to = Some(owner);
        store.create_lead(assigned).await.unwrap();
        store
            .create_lead(Lead::new(team, "Unassigned", "unassigned@example.com", other))
            .await
            .unwrap();

        let mine = store
            .list_leads(
                team,
                LeadFilter {
                    assigned_to: Some(owner),
                    created_by: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].email, "assigned@example.com");
    }

    #[tokio::test]
    async fn delete_of_missing_resource_is_not_found() {
        let (store, _temp) = build_store().await;
        let team = Uuid::new_v4();

        let result = store.delete_lead(team, Uuid::new_v4()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        let result = store.delete_task(team, Uuid::new_v4()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn duplicate_category_name_conflicts() {
        let (store, _temp) = build_store().await;
        let team = Uuid::new_v4();
        let user = Uuid::new_v4();

        store
            .create_category(Category::new(team, "Hardware", user))
            .await
            .unwrap();
        let duplicate = store
            .create_category(Category::new(team, "hardware", user))
            .await;
        assert!(matches!(duplicate, Err(Error::Conflict(_))));
    }

    #[tokio::test]
    async fn dashboard_counts_are_exact() {
        let (store, _temp) = build_store().await;
        let team = Uuid::new_v4();
        let user = Uuid::new_v4();

        for index in 0..5 {
            store
                .create_lead(Lead::new(
                    team,
                    format!("Lead {}", index),
                    format!("lead{}@example.com", index),
                    user,
                ))
                .await
                .unwrap();
        }
        for _ in 0..2 {
            store
                .create_task(TaskItem::new(team, "Pending", user))
                .await
                .unwrap();
        }
        for _ in 0..3 {
            let mut task = TaskItem::new(team, "Done", user);
            task.status = TaskStatus::Completed;
            store.create_task(task).await.unwrap();
        }

        let now = Utc::now();
        store
            .create_meeting(Meeting::new(team, "Soon", now + Duration::hours(1), user))
            .await
            .unwrap();
        store
            .create_meeting(Meeting::new(team, "Later", now + Duration::hours(4), user))
            .await
            .unwrap();
        store
            .create_meeting(Meeting::new(team, "Past", now - Duration::hours(1), user))
            .await
            .unwrap();
        // Another member's meeting is not part of the caller's agenda.
        store
            .create_meeting(Meeting::new(
                team,
                "Theirs",
                now + Duration::hours(2),
                Uuid::new_v4(),
            ))
            .await
            .unwrap();

        let summary = store.dashboard_summary(team, user, now).await.unwrap();
        assert_eq!(summary.total_leads, 5);
        assert_eq!(summary.pending_tasks, 2);
        assert_eq!(summary.completed_tasks, 3);
        assert_eq!(summary.upcoming_meetings.len(), 2);
        assert_eq!(summary.upcoming_meetings[0].title, "Soon");
        assert_eq!(summary.upcoming_meetings[1].title, "Later");
    }

    #[tokio::test]
    async fn form_response_requires_existing_form() {
        let (store, _temp) = build_store().await;
        let team = Uuid::new_v4();

        let response = FormResponse::new(team, Uuid::new_v4(), HashMap::new());
        let result = store.create_form_response(response).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn resources_persist_across_instances() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("crm.json");
        let team = Uuid::new_v4();
        let user = Uuid::new_v4();
        let lead_id;

        {
            let store = FileCrmStore::new(&path).await.unwrap();
            let lead = store
                .create_lead(Lead::new(team, "Ada", "ada@example.com", user))
                .await
                .unwrap();
            lead_id = lead.id;
        }

        {
            let store = FileCrmStore::new(&path).await.unwrap();
            let lead = store.get_lead(team, lead_id).await.unwrap();
            assert_eq!(lead.name, "Ada");
        }
    }
}
