use crate::error::AuthError;
use crate::settings::Settings;
use log::trace;
use oauth2::{AccessToken, ClientId, ClientSecret, Scope, TokenUrl};
use reqwest::header::HeaderValue;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// A bearer token together with the moment it stops being usable.
pub(crate) struct CachedToken {
    authorization: HeaderValue,
    expires_at: Instant,
}

impl CachedToken {
    pub(crate) fn new(access_token: AccessToken, expires_at: Instant) -> Result<Self, AuthError> {
        let bearer = format!("Bearer {}", access_token.secret());
        let mut authorization = HeaderValue::from_str(&bearer).map_err(AuthError::InvalidToken)?;
        authorization.set_sensitive(true);

        Ok(CachedToken {
            authorization,
            expires_at,
        })
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.is_valid_at(Instant::now())
    }

    fn is_valid_at(&self, now: Instant) -> bool {
        now < self.expires_at
    }

    /// The `Bearer {token}` header value.
    pub(crate) fn authorization(&self) -> &HeaderValue {
        &self.authorization
    }
}

#[derive(Serialize)]
struct ClientCredentialsRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Where and how client credentials are exchanged for a bearer token.
pub(crate) struct TokenEndpoint {
    client_id: ClientId,
    client_secret: ClientSecret,
    token_url: TokenUrl,
    scopes: Vec<Scope>,
}

impl TokenEndpoint {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self, url::ParseError> {
        Ok(TokenEndpoint {
            client_id: ClientId::new(settings.client_id.clone()),
            client_secret: ClientSecret::new(settings.client_secret.clone()),
            token_url: TokenUrl::new(settings.token_url.clone())?,
            scopes: settings.scopes.iter().cloned().map(Scope::new).collect(),
        })
    }

    fn scope(&self) -> Option<String> {
        if self.scopes.is_empty() {
            return None;
        }

        let scopes: Vec<&str> = self.scopes.iter().map(|scope| scope.as_str()).collect();
        Some(scopes.join(" "))
    }

    /// Exchange the client id and secret for a fresh bearer token.
    pub(crate) async fn exchange(&self, http_client: &Client) -> Result<CachedToken, AuthError> {
        trace!("Exchanging client credentials at '{}'", self.token_url.as_str());

        let request = ClientCredentialsRequest {
            grant_type: "client_credentials",
            client_id: self.client_id.as_str(),
            client_secret: self.client_secret.secret(),
            scope: self.scope(),
        };

        let response = http_client
            .post(self.token_url.url().clone())
            .json(&request)
            .send()
            .await
            .map_err(AuthError::Http)?;

        let status = response.status();
        let body = response.bytes().await.map_err(AuthError::Http)?;

        if !status.is_success() {
            return Err(AuthError::Endpoint {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let token: TokenResponse =
            serde_json::from_slice(&body).map_err(AuthError::InvalidResponse)?;

        // The lifetime starts counting when the response arrives
        let expires_at = Instant::now()
            .checked_add(Duration::from_secs(token.expires_in))
            .ok_or(AuthError::ExpiryOverflow {
                expires_in: token.expires_in,
            })?;

        trace!(
            "Exchanged client credentials for a bearer token valid for {}s",
            token.expires_in
        );

        CachedToken::new(AccessToken::new(token.access_token), expires_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(expires_at: Instant) -> CachedToken {
        CachedToken::new(AccessToken::new("abc".to_string()), expires_at).unwrap()
    }

    #[test]
    fn token_is_valid_strictly_before_expiry() {
        let now = Instant::now();
        let token = token(now + Duration::from_secs(60));

        assert!(token.is_valid_at(now));
        assert!(token.is_valid_at(now + Duration::from_secs(59)));
        assert!(!token.is_valid_at(now + Duration::from_secs(60)));
        assert!(!token.is_valid_at(now + Duration::from_secs(61)));
    }

    #[test]
    fn authorization_header_is_bearer_and_sensitive() {
        let token = token(Instant::now());

        assert_eq!(token.authorization(), "Bearer abc");
        assert!(token.authorization().is_sensitive());
    }

    #[test]
    fn token_with_newline_is_rejected() {
        let result = CachedToken::new(AccessToken::new("abc\ndef".to_string()), Instant::now());

        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn scope_is_space_separated_and_omitted_when_empty() {
        let mut settings = Settings::new("a", "b");
        let endpoint = TokenEndpoint::from_settings(&settings).unwrap();
        assert_eq!(endpoint.scope(), None);

        settings.scopes = vec!["profile".to_string(), "email".to_string()];
        let endpoint = TokenEndpoint::from_settings(&settings).unwrap();
        assert_eq!(endpoint.scope().as_deref(), Some("profile email"));
    }

    #[test]
    fn token_response_requires_expires_in() {
        let result = serde_json::from_str::<TokenResponse>(r#"{ "access_token": "abc" }"#);

        assert!(result.is_err());
    }
}
