//! # Agencyhub API Server Library
//!
//! HTTP surface of Agencyhub: authentication, team management, clients,
//! projects, tasks with timers, invoicing, quotations and analytics, all
//! scoped to the caller's organization.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration from the environment
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: Extractors that reject with JSON errors
//! - `response`: The `{statusCode, data, message}` success envelope
//! - `middleware`: Security headers
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod response;
pub mod routes;
