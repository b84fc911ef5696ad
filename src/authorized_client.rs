use crate::error::{Error, ErrorResponse};
use crate::settings::Settings;
use crate::token::{CachedToken, TokenEndpoint};
use log::{debug, trace};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use url::Url;

/// Http client for an api protected by oauth 2.0 client credentials.
///
/// Clones share the same bearer token, separately constructed clients never do.
#[derive(Clone)]
pub struct AuthorizedClient {
    credentials: Arc<RwLock<Option<CachedToken>>>,
    token_endpoint: Arc<TokenEndpoint>,
    http_client: Client,
    api_base_url: Url,
}

impl AuthorizedClient {
    /// Create a client, no request is made until the first api call.
    pub fn new(settings: Settings) -> Result<Self, Error> {
        let api_base_url =
            Url::parse(&settings.api_base_url).map_err(|source| Error::InvalidUrl {
                url: settings.api_base_url.clone(),
                source,
            })?;

        let token_endpoint =
            TokenEndpoint::from_settings(&settings).map_err(|source| Error::InvalidUrl {
                url: settings.token_url.clone(),
                source,
            })?;

        // Create the underlying http client, will be reused for every call, token exchange included
        let http_client = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(Error::Client)?;

        trace!(
            "Created client for '{}' authorized by '{}'",
            api_base_url,
            settings.token_url
        );

        Ok(AuthorizedClient {
            credentials: Arc::new(RwLock::new(None)),
            token_endpoint: Arc::new(token_endpoint),
            http_client,
            api_base_url,
        })
    }

    pub async fn get(&self, url: &str, options: RequestOptions) -> Result<Response, Error> {
        self.dispatch(Method::GET, url, None::<&()>, options).await
    }

    pub async fn post<B>(
        &self,
        url: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<Response, Error>
    where
        B: Serialize + ?Sized,
    {
        self.dispatch(Method::POST, url, Some(body), options).await
    }

    pub async fn put<B>(
        &self,
        url: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<Response, Error>
    where
        B: Serialize + ?Sized,
    {
        self.dispatch(Method::PUT, url, Some(body), options).await
    }

    pub async fn delete(&self, url: &str, options: RequestOptions) -> Result<Response, Error> {
        self.dispatch(Method::DELETE, url, None::<&()>, options).await
    }

    /// Drop the cached bearer token, the next call exchanges the credentials again.
    pub async fn invalidate_token(&self) {
        debug!("Invalidating bearer token");
        *self.credentials.write().await = None;
    }

    /// Resolve `url` against the api base url, absolute urls are used as is.
    fn resolve(&self, url: &str) -> Result<Url, Error> {
        let invalid = |source| Error::InvalidUrl {
            url: url.to_string(),
            source,
        };

        if is_absolute(url) {
            // Protocol relative urls take the scheme of the api base url
            return self.api_base_url.join(url).map_err(invalid);
        }

        let joined = format!(
            "{}/{}",
            self.api_base_url.as_str().trim_end_matches('/'),
            url.trim_start_matches('/')
        );

        Url::parse(&joined).map_err(invalid)
    }

    /// Authorization header of a valid bearer token, exchanging the credentials when there is none.
    async fn valid_token(&self) -> Result<HeaderValue, Error> {
        // read lock: This will block until the write lock (if present) is released
        {
            let credentials = self.credentials.read().await;
            if let Some(token) = credentials.as_ref().filter(|token| token.is_valid()) {
                return Ok(token.authorization().clone());
            }
        }

        trace!("No valid bearer token, preparing to double check in a write lock and refresh if required");

        // Acquire a write lock, only one write lock can access the data at once
        let mut credentials = self.credentials.write().await;

        // We make sure no other task has refreshed the credentials in the time we were waiting to acquire the write lock
        if let Some(token) = credentials.as_ref().filter(|token| token.is_valid()) {
            return Ok(token.authorization().clone());
        }

        debug!("Refreshing bearer token");
        let token = self.token_endpoint.exchange(&self.http_client).await?;
        let authorization = token.authorization().clone();
        *credentials = Some(token);
        debug!("Refreshed bearer token");

        Ok(authorization)
    }

    /// Forget `rejected` unless it was already replaced by another task.
    async fn invalidate(&self, rejected: &HeaderValue) {
        let mut credentials = self.credentials.write().await;
        if credentials
            .as_ref()
            .map_or(false, |token| token.authorization() == rejected)
        {
            *credentials = None;
        }
    }

    async fn dispatch<B>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
        options: RequestOptions,
    ) -> Result<Response, Error>
    where
        B: Serialize + ?Sized,
    {
        let url = self.resolve(url)?;
        let request_builder = || {
            let request = self.http_client.request(method.clone(), url.clone());
            match body {
                Some(body) => request.json(body),
                None => request,
            }
        };

        let authorization = self.valid_token().await?;
        let response = self.send(&request_builder, &options, authorization.clone()).await?;

        // When the server returns 401: refresh authentication and retry once
        // In other cases, hand the response (or its error status) to the caller
        if response.status() != StatusCode::UNAUTHORIZED {
            return check_status(response).await;
        }

        debug!("{} {} returned 401, retrying with a fresh bearer token", method, url);
        drop(response);
        self.invalidate(&authorization).await;

        let authorization = self.valid_token().await?;
        let response = self.send(&request_builder, &options, authorization).await?;

        check_status(response).await
    }

    async fn send(
        &self,
        request_builder: &impl Fn() -> RequestBuilder,
        options: &RequestOptions,
        authorization: HeaderValue,
    ) -> Result<Response, Error> {
        // The bearer token always wins over a caller supplied authorization header
        let mut headers = options.headers.clone();
        headers.insert(AUTHORIZATION, authorization);

        let mut request = request_builder().headers(headers);
        if !options.query.is_empty() {
            request = request.query(&options.query);
        }
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }

        trace!("Sending request");
        request.send().await.map_err(Error::Request)
    }
}

/// Turn a 4xx or 5xx response into [`Error::Status`].
async fn check_status(response: Response) -> Result<Response, Error> {
    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return Ok(response);
    }

    trace!("Request to '{}' failed with {}", response.url(), status);
    let response = ErrorResponse::read(response).await.map_err(Error::Request)?;
    Err(Error::Status(response))
}

/// `scheme://host` or protocol relative `//host`, anything else is a path below the api base url.
fn is_absolute(url: &str) -> bool {
    let rest = match url.split_once(':') {
        Some((scheme, rest)) if is_scheme(scheme) => rest,
        _ => url,
    };
    rest.starts_with("//")
}

fn is_scheme(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    chars.next().map_or(false, |first| first.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Per request additions: headers, query parameters and a timeout override.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    headers: HeaderMap,
    query: Vec<(String, String)>,
    timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header, an `Authorization` header is ignored.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
