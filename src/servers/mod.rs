//! Server implementation
//!
//! One process serves both client-facing surfaces:
//! - SOAP: the legacy envelope protocol game clients speak
//! - REST: the JSON interface for operators and tooling

pub mod auth;
