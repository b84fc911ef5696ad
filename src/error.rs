use reqwest::header::{HeaderMap, InvalidHeaderValue};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use thiserror::Error;
use url::Url;

/// Everything that can go wrong while talking to the api.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid url '{url}'")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to build the http client")]
    Client(#[source] reqwest::Error),

    #[error("failed to obtain a bearer token")]
    Auth(#[from] AuthError),

    /// The api answered with a 4xx or 5xx status.
    #[error("{} returned {}", .0.url(), .0.status())]
    Status(ErrorResponse),

    /// The transport error of the request, untouched.
    #[error(transparent)]
    Request(reqwest::Error),
}

impl Error {
    /// Status code of the failed api request.
    ///
    /// `None` for errors that did not come from an api response, token
    /// endpoint failures included.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Status(response) => Some(response.status()),
            Error::Request(error) => error.status(),
            _ => None,
        }
    }

    /// The bearer token could not be obtained, no api request was made.
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Auth(_))
    }
}

/// A 4xx or 5xx api response with its body already read.
#[derive(Debug)]
pub struct ErrorResponse {
    status: StatusCode,
    url: Url,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ErrorResponse {
    pub(crate) async fn read(response: Response) -> Result<Self, reqwest::Error> {
        let status = response.status();
        let url = response.url().clone();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        Ok(ErrorResponse {
            status,
            url,
            headers,
            body,
        })
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Deserialize the body, e.g. into the api's validation errors.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Failure of the client credentials exchange.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token request failed")]
    Http(#[source] reqwest::Error),

    #[error("token endpoint returned {status}: {body}")]
    Endpoint { status: StatusCode, body: String },

    #[error("token endpoint returned an invalid response")]
    InvalidResponse(#[source] serde_json::Error),

    #[error("access token can not be used in an authorization header")]
    InvalidToken(#[source] InvalidHeaderValue),

    #[error("expires_in ({expires_in}s) is too large")]
    ExpiryOverflow { expires_in: u64 },
}
