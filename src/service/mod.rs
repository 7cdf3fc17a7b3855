//! # Services
//!
//! The composed multiplexer and its outbound and bootstrap helpers.
//!
//! ## Components
//! - **Mux**: Dial/close lifecycle, receive path and send path
//! - **Client**: Outbound-only send path over a connection pool
//! - **Launcher**: Up/down with redial when the configuration changes

pub mod client;
pub mod launcher;
pub mod mux;

pub use client::Client;
pub use launcher::Launcher;
pub use mux::Mux;
