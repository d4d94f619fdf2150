//! Backend API client: the reqwest side of the enrichment collaborators.
//!
//! Implements [`HttpClient`](semtab_enrich::HttpClient),
//! [`TokenProvider`](semtab_enrich::TokenProvider) and
//! [`TableStore`](semtab_enrich::TableStore) over a blocking client.
//!
//! No login flow. No retries.

mod auth;
mod client;
mod error;
mod http;

pub use auth::{auth_file_path, delete_auth, load_auth, load_auth_from, save_auth, save_auth_to, AuthCredentials};
pub use client::{BackendClient, ServiceKind, DEFAULT_TIMEOUT};
pub use error::ClientError;
pub use http::ReqwestHttp;
