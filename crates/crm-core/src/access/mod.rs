//! Access-control primitives shared by teams and route handlers.

mod model;

pub use model::{AccessCheck, AccessMap, MemberAccess, Operation, ResourceCategory, Role};
