//! Third-party integration status aggregation.

mod client;

pub use client::{IntegrationKind, IntegrationStatus, IntegrationsClient};
