//! Router Module Index
//!
//! Splits the routing table by access level. Authentication is applied once,
//! as a layer over the whole `authenticated` router, so no protected endpoint
//! can be registered without it.

/// Routes accessible to anonymous clients: login, registration, health, docs entry.
pub mod public;

/// Routes protected by the `AuthUser` extractor middleware.
pub mod authenticated;
