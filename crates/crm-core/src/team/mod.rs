//! Team module
//!
//! Teams are the tenant boundary: they own resources and memberships.

mod model;
mod store;

pub use model::{Membership, Team, VisibilityMap};
pub use store::FileTeamStore;
