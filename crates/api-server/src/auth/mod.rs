//! Session authentication: user profiles, credentials and JWT issuance.

mod store;

pub use store::{AuthClaims, AuthError, AuthStore, ProfileSummary};
