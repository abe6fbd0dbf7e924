//! Token exchange: one POST to the Zoho accounts server, no retries.

use crate::error::Result;
use crate::options::ResolvedOptions;

/// Token endpoint for an accounts-server location suffix.
pub fn token_url(location: &str) -> String {
    format!("https://accounts.zoho.{location}/oauth/v2/token")
}

/// A single token-endpoint request. Built once from the resolved options
/// and sent exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenRequest {
    /// Exchange a freshly captured or supplied grant token for an access
    /// and refresh token pair.
    AuthorizationCode {
        code: String,
        redirect_uri: String,
        client_id: String,
        client_secret: String,
    },
    /// Mint a new access token from a long-lived refresh token.
    RefreshToken {
        refresh_token: String,
        client_id: String,
        client_secret: String,
    },
}

impl TokenRequest {
    /// Authorization-code grant for `code`.
    pub fn authorization_code(options: &ResolvedOptions, code: String) -> Self {
        TokenRequest::AuthorizationCode {
            code,
            redirect_uri: options.redirect_uri.clone(),
            client_id: options.client_id.clone(),
            client_secret: options.client_secret.clone(),
        }
    }

    /// Refresh-token grant.
    pub fn refresh_token(options: &ResolvedOptions, refresh_token: String) -> Self {
        TokenRequest::RefreshToken {
            refresh_token,
            client_id: options.client_id.clone(),
            client_secret: options.client_secret.clone(),
        }
    }

    /// Query parameters for the token endpoint, grant type included.
    fn params(&self) -> Vec<(&'static str, &str)> {
        match self {
            TokenRequest::AuthorizationCode {
                code,
                redirect_uri,
                client_id,
                client_secret,
            } => vec![
                ("code", code.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("grant_type", "authorization_code"),
            ],
            TokenRequest::RefreshToken {
                refresh_token,
                client_id,
                client_secret,
            } => vec![
                ("refresh_token", refresh_token.as_str()),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("grant_type", "refresh_token"),
            ],
        }
    }
}

/// Send `request` to `token_url` and hand back the raw response body.
///
/// Only transport failures are fatal. The HTTP status does not gate the
/// result: whatever the accounts server answers, success payload or error
/// document, is passed through for the caller to persist as-is.
pub async fn exchange(request: &TokenRequest, token_url: &str) -> Result<String> {
    let client = reqwest::Client::new();
    let response = client
        .post(token_url)
        .query(&request.params())
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        tracing::warn!(%status, "token endpoint answered with a non-success status");
    }

    Ok(response.text().await?)
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::error::Error;
    use crate::options::{RawOptions, resolve};

    fn exchange_options() -> ResolvedOptions {
        resolve(
            RawOptions {
                id: Some("1000.CLIENT".into()),
                secret: Some("sauce".into()),
                redirect: Some("http://localhost:8000/callback".into()),
                ..RawOptions::default()
            },
            None,
        )
        .expect("options should resolve")
    }

    #[test]
    fn the_token_url_embeds_the_location_suffix() {
        assert_eq!(token_url("eu"), "https://accounts.zoho.eu/oauth/v2/token");
        assert_eq!(
            token_url("com.au"),
            "https://accounts.zoho.com.au/oauth/v2/token"
        );
    }

    #[tokio::test]
    async fn the_authorization_code_grant_sends_the_expected_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/v2/token"))
            .and(query_param("grant_type", "authorization_code"))
            .and(query_param("code", "1000.grant"))
            .and(query_param("redirect_uri", "http://localhost:8000/callback"))
            .and(query_param("client_id", "1000.CLIENT"))
            .and(query_param("client_secret", "sauce"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"access_token":"1000.access"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let request = TokenRequest::authorization_code(&exchange_options(), "1000.grant".into());
        let body = exchange(&request, &format!("{}/oauth/v2/token", server.uri()))
            .await
            .expect("exchange");
        assert_eq!(body, r#"{"access_token":"1000.access"}"#);
    }

    #[tokio::test]
    async fn the_refresh_token_grant_sends_the_expected_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/v2/token"))
            .and(query_param("grant_type", "refresh_token"))
            .and(query_param("refresh_token", "1000.refresh"))
            .and(query_param("client_id", "1000.CLIENT"))
            .and(query_param("client_secret", "sauce"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"access_token":"1000.access"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let request = TokenRequest::refresh_token(&exchange_options(), "1000.refresh".into());
        let body = exchange(&request, &format!("{}/oauth/v2/token", server.uri()))
            .await
            .expect("exchange");
        assert_eq!(body, r#"{"access_token":"1000.access"}"#);
    }

    #[tokio::test]
    async fn provider_error_documents_pass_through_unchanged() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/v2/token"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_code"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let request = TokenRequest::authorization_code(&exchange_options(), "stale".into());
        let body = exchange(&request, &format!("{}/oauth/v2/token", server.uri()))
            .await
            .expect("non-success statuses still carry a body");
        assert_eq!(body, r#"{"error":"invalid_code"}"#);
    }

    #[tokio::test]
    async fn transport_failures_are_fatal() {
        let request = TokenRequest::refresh_token(&exchange_options(), "1000.refresh".into());
        let err = exchange(&request, "http://127.0.0.1:1/oauth/v2/token")
            .await
            .expect_err("nothing listens on port 1");
        assert!(matches!(err, Error::Network(_)));
    }
}
