//! # External API Surfaces
//!
//! Interfaces for collaborators explicitly out of the core per spec.md §1:
//! the REST transport adapter. Only the shape of the boundary is defined
//! here, not a working HTTP server — wiring an actual framework in is left
//! to whatever embeds this crate.

pub mod rest;

pub use rest::{classify_request, RestOperation};
