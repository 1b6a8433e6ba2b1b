//! Route handlers

pub mod auth;
pub mod categories;
pub mod dashboard;
pub mod forms;
pub mod health;
pub mod integrations;
pub mod leads;
pub mod meetings;
pub mod organizations;
pub mod products;
pub mod tasks;
pub mod teams;
