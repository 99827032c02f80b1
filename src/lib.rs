// Library root
// -----------
// This crate exposes the session layer shared by every command of the
// `cohesity` binary, plus the commands themselves.
//
// Module responsibilities:
// - `api`: the blocking API client, the default session context and the
//   generic `call` with its normalized `ApiResponse`.
// - `auth`: authentication handshakes (hosted service, API key,
//   username/password with MFA and session fallback).
// - `credentials`: secret resolution and the on-disk credential store.
// - `session`: the `SessionContext` value (URL roots, headers, flag).
// - `transport`: the HTTP seam and its reqwest implementation.
// - `ui`: terminal prompts and spinners.
// - `dates`, `display`: helpers the commands use to filter and print.
// - `cli`, `commands`: argument parsing and the command implementations.
pub mod api;
pub mod auth;
pub mod cli;
pub mod commands;
pub mod config;
pub mod credentials;
pub mod dates;
pub mod display;
pub mod error;
pub mod logging;
pub mod session;
pub mod transport;
pub mod ui;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiClient, ApiResponse};
pub use auth::{AuthFailure, AuthOptions};
pub use error::{Error, Result};
pub use session::{EndpointKind, SessionContext};
