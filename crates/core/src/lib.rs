//! Domain types shared across the scriptmark backend.
//!
//! This crate has no internal dependencies and no I/O: payload definitions,
//! the grading result shapes, the deterministic fallback policy, and the
//! error/role/type primitives used by every other crate live here.

pub mod error;
pub mod extraction;
pub mod fallback;
pub mod grading;
pub mod payload;
pub mod roles;
pub mod types;
