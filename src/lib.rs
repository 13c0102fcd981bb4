//! Tanya - Legacy Game Auth Server
//!
//! A Rust reimplementation of the authentication and session service behind a
//! legacy RTS game's online mode. Speaks the original SOAP envelope protocol
//! to game clients and a JSON interface to operators, over one shared core.

/// Server configuration (bind address, store location, session policy)
pub mod config;
/// Error taxonomy shared across the service and adapters
pub mod error;
/// Database modules (account_db, session_db)
pub mod database;
/// Network utilities (login throttle)
pub mod network;
/// Session registry (token issue/validate/revoke)
pub mod session;
/// Server implementation (service core, SOAP and REST adapters)
pub mod servers;
