//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the storage capability set the service depends on.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`ConstraintViolation`) in
//!   addition to DB transport errors.

pub mod user_repo;
