//! Domain model for user management.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//!
//! # Invariants
//! - Every persisted user is identified by a store-assigned `UserId`.
//! - There is no deletion path; ids are never reused.

pub mod user;
