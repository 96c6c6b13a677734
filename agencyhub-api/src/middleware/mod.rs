/// Middleware for the API server
///
/// Authentication lives in `agencyhub_shared::auth::middleware` and is
/// attached in the router; this module holds the response-side layers.

pub mod security;
