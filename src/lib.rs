//! # Efihub Client
//! Http client for the Efihub api, which is protected by oauth 2.0 client credentials authorization.
//! The client is based on the `Reqwest` library.
//!
//! A bearer token is exchanged on the first call and cached until it expires.
//! When the api answers `401 Unauthorized` the token is dropped, a new one is exchanged
//! and the request is retried exactly once.
//!
//! Responses are handed back as `reqwest::Response`, 4xx and 5xx statuses as [`Error::Status`]
//! which keeps the status, headers and body of the response.
//!
//! ## Example code
//! ```no_run
//!# async fn doc_test() -> anyhow::Result<()> {
//!# use serde::Deserialize;
//!# #[derive(Deserialize)]
//!# struct User {}
//! use efihub_client::{AuthorizedClient, RequestOptions, Settings};
//!
//! // Set up the client, token_url and api_base_url default to the Efihub endpoints
//! let settings = Settings::new("xxxxxxxxxx", "xxxxxxxxxx");
//!
//! // Creating the client does not contact the auth server yet
//! let client = AuthorizedClient::new(settings)?;
//!
//! // The first call exchanges the client credentials for a bearer token
//! let users: Vec<User> = client
//!     .get("/users", RequestOptions::new())
//!     .await?
//!     .json()
//!     .await?;
//!
//!# Ok(())
//!# }
//! ```
mod authorized_client;
mod error;
mod settings;
mod token;

pub use crate::authorized_client::{AuthorizedClient, RequestOptions};
pub use crate::error::{AuthError, Error, ErrorResponse};
pub use crate::settings::{
    Settings, DEFAULT_API_BASE_URL, DEFAULT_REQUEST_TIMEOUT, DEFAULT_TOKEN_URL,
};
pub use reqwest::{header, Response, StatusCode};
