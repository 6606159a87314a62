//! Google ID token verification through the tokeninfo endpoint.

use serde::Deserialize;
use tracing::{debug, instrument};

use crate::{config::GoogleAuthConfig, errors::Error};

/// Claims we use from a verified Google ID token.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleIdentity {
    /// OAuth client the token was issued for
    pub aud: String,
    /// Stable Google account id
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// Verifies ID tokens issued to one of the configured client ids.
#[derive(Clone)]
pub struct GoogleVerifier {
    client: reqwest::Client,
    config: GoogleAuthConfig,
}

impl GoogleVerifier {
    pub fn new(config: GoogleAuthConfig) -> Self {
        let client = crate::http_client(config.timeout);
        Self { client, config }
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Verify `id_token` and check that it belongs to `google_id` / `email`.
    #[instrument(skip(self, id_token), err)]
    pub async fn verify(&self, id_token: &str, google_id: &str, email: &str) -> Result<GoogleIdentity, Error> {
        let invalid = || Error::Unauthenticated {
            message: Some("Invalid Google token".to_string()),
        };

        let mut url = self.config.tokeninfo_url.clone();
        url.query_pairs_mut().append_pair("id_token", id_token);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Internal {
                operation: format!("reach Google token verification: {e}"),
            })?;

        if !response.status().is_success() {
            debug!(status = %response.status(), "Google rejected ID token");
            return Err(invalid());
        }

        let identity: GoogleIdentity = response.json().await.map_err(|_| invalid())?;

        if !self.config.client_ids.iter().any(|id| id == &identity.aud) {
            debug!(aud = %identity.aud, "ID token issued for an unknown client");
            return Err(invalid());
        }

        if identity.sub != google_id || !identity.email.trim().eq_ignore_ascii_case(email.trim()) {
            return Err(Error::Unauthenticated {
                message: Some("Google token does not match the supplied account".to_string()),
            });
        }

        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn verifier(server: &MockServer) -> GoogleVerifier {
        GoogleVerifier::new(GoogleAuthConfig {
            enabled: true,
            client_ids: vec!["web-client".to_string(), "ios-client".to_string()],
            tokeninfo_url: format!("{}/tokeninfo", server.uri()).parse().unwrap(),
            timeout: Duration::from_secs(2),
        })
    }

    async fn mount_tokeninfo(server: &MockServer, token: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/tokeninfo"))
            .and(query_param("id_token", token))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_valid_token() {
        let server = MockServer::start().await;
        mount_tokeninfo(
            &server,
            "good",
            json!({"aud": "ios-client", "sub": "g-123", "email": "Ana@Example.com", "name": "Ana", "email_verified": "true"}),
        )
        .await;

        let identity = verifier(&server).await.verify("good", "g-123", "ana@example.com").await.unwrap();
        assert_eq!(identity.sub, "g-123");
        assert_eq!(identity.name.as_deref(), Some("Ana"));
    }

    #[tokio::test]
    async fn test_wrong_audience() {
        let server = MockServer::start().await;
        mount_tokeninfo(&server, "other", json!({"aud": "someone-else", "sub": "g-123", "email": "ana@example.com"})).await;

        let result = verifier(&server).await.verify("other", "g-123", "ana@example.com").await;
        assert!(matches!(result, Err(Error::Unauthenticated { .. })));
    }

    #[tokio::test]
    async fn test_subject_or_email_mismatch() {
        let server = MockServer::start().await;
        mount_tokeninfo(&server, "tok", json!({"aud": "web-client", "sub": "g-123", "email": "ana@example.com"})).await;
        let verifier = verifier(&server).await;

        match verifier.verify("tok", "g-999", "ana@example.com").await {
            Err(Error::Unauthenticated { message }) => assert!(message.unwrap().contains("does not match")),
            other => panic!("expected mismatch, got {other:?}"),
        }
        assert!(verifier.verify("tok", "g-123", "bob@example.com").await.is_err());
    }

    #[tokio::test]
    async fn test_rejected_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tokeninfo"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_token"})))
            .mount(&server)
            .await;

        let result = verifier(&server).await.verify("bad", "g-123", "ana@example.com").await;
        assert!(matches!(result, Err(Error::Unauthenticated { .. })));
    }
}
