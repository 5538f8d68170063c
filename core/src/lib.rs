//! # DATASCOPE CORE LIBRARY
//!
//! **HIERARCHICAL DATA SCOPE RESOLUTION FOR ELEMENT TREES**
//!
//! **ARCHITECTURE**: Static scope provider tree resolved once at startup, per-request data
//! context trees built from it, and a deferred name binding registry
//! **GUARANTEE**: Each dependency is supplied at most once along any root-to-leaf path
//! **CONCURRENCY**: Resolved trees are shared across request threads; each request owns its
//! contexts exclusively

pub mod api;
pub mod config;
pub mod context;
pub mod dependencies;
pub mod errors;
pub mod naming;
pub mod scoping;
