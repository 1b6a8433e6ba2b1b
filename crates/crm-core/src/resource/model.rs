//! CRM resource models
//!
//! Every entity carries its owning `team_id`, the creating user and server
//! assigned timestamps. Deleting a team does not cascade into these records.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lead pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Converted,
    Lost,
}

impl Default for LeadStatus {
    fn default() -> Self {
        Self::New
    }
}

/// A sales lead. Email is unique within a team.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: Uuid,
    pub team_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub status: LeadStatus,
    pub source: Option<String>,
    pub notes: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    pub fn new(
        team_id: Uuid,
        name: impl Into<String>,
        email: impl Into<String>,
        created_by: Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            team_id,
            name: name.into(),
            email: email.into(),
            phone: None,
            status: LeadStatus::default(),
            source: None,
            notes: None,
            assigned_to: None,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Completed,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::Medium
    }
}

/// A follow-up task tracked against the team.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskItem {
    pub id: Uuid,
    pub team_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_at: Option<DateTime<Utc>>,
    pub assigned_to: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskItem {
    pub fn new(team_id: Uuid, title: impl Into<String>, created_by: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            team_id,
            title: title.into(),
            description: None,
            status: TaskStatus::default(),
            priority: TaskPriority::default(),
            due_at: None,
            assigned_to: None,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A scheduled meeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    pub id: Uuid,
    pub team_id: Uuid,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Meeting {
    pub fn new(
        team_id: Uuid,
        title: impl Into<String>,
        starts_at: DateTime<Utc>,
        created_by: Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            team_id,
            title: title.into(),
            starts_at,
            ends_at: None,
            location: None,
            notes: None,
            assigned_to: None,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A sellable product.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub team_id: Uuid,
    pub name: String,
    pub sku: Option<String>,
    pub price: f64,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(team_id: Uuid, name: impl Into<String>, price: f64, created_by: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            team_id,
            name: name.into(),
            sku: None,
            price,
            description: None,
            category_id: None,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A product/content category. Name is unique within a team.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub team_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    pub fn new(team_id: Uuid, name: impl Into<String>, created_by: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            team_id,
            name: name.into(),
            description: None,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A company associated with the team's pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: Uuid,
    pub team_id: Uuid,
    pub name: String,
    pub domain: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Organization {
    pub fn new(team_id: Uuid, name: impl Into<String>, created_by: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            team_id,
            name: name.into(),
            domain: None,
            phone: None,
            address: None,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Input type of a custom form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Number,
    Date,
    Boolean,
    Select,
    Multiselect,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub key: String,
    pub label: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Vec<String>,
}

/// A custom lead-capture form. When `creates_lead` is set, submissions
/// carrying an `email` value spawn a Lead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomForm {
    pub id: Uuid,
    pub team_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub fields: Vec<FormField>,
    pub creates_lead: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CustomForm {
    pub fn new(team_id: Uuid, name: impl Into<String>, created_by: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            team_id,
            name: name.into(),
            description: None,
            fields: Vec::new(),
            creates_lead: false,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A stored form submission. `lead_id` back-references the Lead captured
/// from this submission, when one was created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormResponse {
    pub id: Uuid,
    pub team_id: Uuid,
    pub form_id: Uuid,
    pub values: HashMap<String, serde_json::Value>,
    pub lead_id: Option<Uuid>,
    pub submitted_at: DateTime<Utc>,
}

impl FormResponse {
    pub fn new(team_id: Uuid, form_id: Uuid, values: HashMap<String, serde_json::Value>) -> Self {
        Self {
            id: Uuid::new_v4(),
            team_id,
            form_id,
            values,
            lead_id: None,
            submitted_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_lead_defaults() {
        let team_id = Uuid::new_v4();
        let user = Uuid::new_v4();
        let lead = Lead::new(team_id, "Ada Lovelace", "ada@example.com", user);
        assert_eq!(lead.status, LeadStatus::New);
        assert_eq!(lead.team_id, team_id);
        assert!(lead.assigned_to.is_none());
    }

    #[test]
    fn new_task_is_pending_medium() {
        let task = TaskItem::new(Uuid::new_v4(), "Call back", Uuid::new_v4());
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, TaskPriority::Medium);
    }
}
