//! Core library for the CRM service
//!
//! This crate contains the domain models and storage layer, including:
//! - Teams, memberships and the access-control model
//! - CRM resources (leads, tasks, meetings, products, categories,
//!   organizations, custom forms)
//! - File-backed document stores

pub mod access;
pub mod error;
pub mod resource;
pub mod team;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
