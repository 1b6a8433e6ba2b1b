//! CRM resource module
//!
//! Team-owned business entities and their file-backed store.

mod model;
mod store;

pub use model::{
    Category, CustomForm, FieldType, FormField, FormResponse, Lead, LeadStatus, Meeting,
    Organization, Product, TaskItem, TaskPriority, TaskStatus,
};
pub use store::{DashboardSummary, FileCrmStore, LeadFilter};
