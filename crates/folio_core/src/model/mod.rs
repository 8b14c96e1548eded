//! Domain model for portfolio projects.
//!
//! # Responsibility
//! - Define canonical data structures used by the store and gateways.
//!
//! # Invariants
//! - Every project is identified by a gateway-assigned `ProjectId`.
//! - Deletion is a hard delete; ids are never reused by the store.

pub mod project;
