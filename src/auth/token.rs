// Bearer token issuance
//
// Each call reads the private key, signs a fresh assertion and performs one
// token-endpoint round trip. Nothing is cached.

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::client::{Body, RestClient};
use crate::errors::{Error, Result};

/// Offset allowed between client and server clocks
const JWT_CLIENT_SERVER_OFFSET_SEC: i64 = 60;
/// Validity period of the signed assertion
const JWT_VALIDITY_SEC: i64 = 600;
const IETF_GRANT_JWT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Parameters needed to obtain a bearer token
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthContext {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// PEM-encoded RSA private key
    pub key_pem_path: PathBuf,
    pub iss: String,
    pub aud: String,
    pub sub: String,
    /// Optional organization claim
    pub org: Option<String>,
    /// Scope requested when the caller does not pass one
    pub scope: Option<String>,
}

impl AuthContext {
    /// Names of mandatory fields that are absent (empty)
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        let checks: [(&'static str, bool); 7] = [
            ("token_url", self.token_url.is_empty()),
            ("aud", self.aud.is_empty()),
            ("client_id", self.client_id.is_empty()),
            ("client_secret", self.client_secret.is_empty()),
            ("key_pem_path", self.key_pem_path.as_os_str().is_empty()),
            ("iss", self.iss.is_empty()),
            ("sub", self.sub.is_empty()),
        ];
        for (name, absent) in checks {
            if absent {
                missing.push(name);
            }
        }
        missing
    }
}

/// JWT claims of the signed assertion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub jti: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
}

/// `Authorization` header value of the form `Bearer <access token>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    fn from_access_token(access_token: &str) -> Self {
        Self(format!("Bearer {access_token}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The opaque token without the `Bearer ` prefix
    pub fn access_token(&self) -> &str {
        self.0.trim_start_matches("Bearer ")
    }
}

impl fmt::Display for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Issues bearer tokens through the OAuth2 JWT-bearer grant
#[derive(Debug, Clone)]
pub struct AuthTokenProvider {
    context: AuthContext,
    verify_tls: bool,
}

impl AuthTokenProvider {
    /// Validate the context eagerly; fails before any network activity
    pub fn new(context: AuthContext) -> Result<Self> {
        let missing = context.missing_fields();
        if !missing.is_empty() {
            return Err(Error::AuthConfig { missing });
        }
        Ok(Self {
            context,
            verify_tls: true,
        })
    }

    /// Disable certificate verification towards the token endpoint
    pub fn with_tls_verification(mut self, verify_tls: bool) -> Self {
        self.verify_tls = verify_tls;
        self
    }

    pub fn context(&self) -> &AuthContext {
        &self.context
    }

    /// Claims for an assertion issued at `now` (seconds since epoch)
    pub fn claims(&self, now: i64) -> Claims {
        Claims {
            iss: self.context.iss.clone(),
            sub: self.context.sub.clone(),
            aud: self.context.aud.clone(),
            iat: now - JWT_CLIENT_SERVER_OFFSET_SEC,
            nbf: now - JWT_CLIENT_SERVER_OFFSET_SEC,
            exp: now + JWT_VALIDITY_SEC,
            jti: uuid::Uuid::new_v4().to_string(),
            org: self.context.org.clone(),
        }
    }

    fn load_key(&self) -> Result<EncodingKey> {
        let path = &self.context.key_pem_path;
        let pem = std::fs::read(path).map_err(|e| Error::KeyLoad {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        EncodingKey::from_rsa_pem(&pem).map_err(|e| Error::KeyLoad {
            path: path.clone(),
            reason: e.to_string(),
        })
    }

    /// Compact RS256 JWS for the token request
    pub fn sign_assertion(&self) -> Result<String> {
        let key = self.load_key()?;
        let claims = self.claims(Utc::now().timestamp());
        debug!(?claims, "JWT claims");

        let mut header = Header::new(Algorithm::RS256);
        header.typ = Some("JWT".to_string());
        jsonwebtoken::encode(&header, &claims, &key).map_err(|e| Error::KeyLoad {
            path: self.context.key_pem_path.clone(),
            reason: e.to_string(),
        })
    }

    /// Issue a token for `scope`, falling back to the context's default scope
    pub async fn issue_token(&self, scope: Option<&str>) -> Result<BearerToken> {
        info!(token_url = %self.context.token_url, "Getting API authorization");
        let assertion = self.sign_assertion()?;

        let mut form = vec![
            ("grant_type".to_string(), IETF_GRANT_JWT.to_string()),
            ("assertion".to_string(), assertion),
            ("client_id".to_string(), self.context.client_id.clone()),
        ];
        if let Some(scope) = scope.or(self.context.scope.as_deref()) {
            form.push(("scope".to_string(), scope.to_string()));
        }

        let mut rest = RestClient::new(&self.context.token_url, self.verify_tls)?;
        rest.set_basic(&self.context.client_id, &self.context.client_secret);

        let response = rest
            .send(Method::POST, "", Some(&Body::Form(form)), &[], &[])
            .await
            .map_err(|e| match e {
                Error::HttpStatus { status, body } => Error::TokenExchange { status, body },
                other => other,
            })?;

        let access_token = response
            .as_ref()
            .and_then(|data| data.get("access_token"))
            .and_then(|token| token.as_str())
            .ok_or_else(|| Error::TokenExchange {
                status: 200,
                body: "response has no access_token".to_string(),
            })?;
        debug!("Bearer token received");
        Ok(BearerToken::from_access_token(access_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> AuthContext {
        AuthContext {
            token_url: "https://idp.example.com/oauth2/token".to_string(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            key_pem_path: PathBuf::from("/nonexistent/key.pem"),
            iss: "client".to_string(),
            aud: "https://idp.example.com/oauth2/token".to_string(),
            sub: "user@example.com".to_string(),
            org: None,
            scope: None,
        }
    }

    #[test]
    fn test_complete_context_is_accepted() {
        assert!(AuthTokenProvider::new(context()).is_ok());
    }

    #[test]
    fn test_each_missing_field_is_reported() {
        let cases: [(&str, fn(&mut AuthContext)); 7] = [
            ("token_url", |c| c.token_url.clear()),
            ("aud", |c| c.aud.clear()),
            ("client_id", |c| c.client_id.clear()),
            ("client_secret", |c| c.client_secret.clear()),
            ("key_pem_path", |c| c.key_pem_path = PathBuf::new()),
            ("iss", |c| c.iss.clear()),
            ("sub", |c| c.sub.clear()),
        ];
        for (field, clear) in cases {
            let mut ctx = context();
            clear(&mut ctx);
            match AuthTokenProvider::new(ctx) {
                Err(Error::AuthConfig { missing }) => assert_eq!(missing, vec![field]),
                other => panic!("expected AuthConfig for {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_empty_context_lists_all_fields() {
        let missing = AuthContext::default().missing_fields();
        assert_eq!(missing.len(), 7);
    }

    #[test]
    fn test_claims_time_window() {
        let mut ctx = context();
        ctx.org = Some("acme".to_string());
        let provider = AuthTokenProvider::new(ctx).unwrap();

        let claims = provider.claims(1_700_000_000);
        assert_eq!(claims.iat, 1_700_000_000 - 60);
        assert_eq!(claims.nbf, claims.iat);
        assert_eq!(claims.exp, 1_700_000_000 + 600);
        assert_eq!(claims.org.as_deref(), Some("acme"));
        assert_ne!(claims.jti, provider.claims(1_700_000_000).jti);
    }

    #[test]
    fn test_org_claim_omitted_when_absent() {
        let provider = AuthTokenProvider::new(context()).unwrap();
        let json = serde_json::to_value(provider.claims(0)).unwrap();
        assert!(json.get("org").is_none());
    }

    #[test]
    fn test_unreadable_key_is_key_load_error() {
        let provider = AuthTokenProvider::new(context()).unwrap();
        assert!(matches!(
            provider.sign_assertion(),
            Err(Error::KeyLoad { .. })
        ));
    }

    #[test]
    fn test_garbage_key_is_key_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("key.pem");
        std::fs::write(&key_path, "not a pem").unwrap();

        let mut ctx = context();
        ctx.key_pem_path = key_path;
        let provider = AuthTokenProvider::new(ctx).unwrap();
        assert!(matches!(
            provider.sign_assertion(),
            Err(Error::KeyLoad { .. })
        ));
    }

    #[test]
    fn test_bearer_token_format() {
        let token = BearerToken::from_access_token("abc.def");
        assert_eq!(token.as_str(), "Bearer abc.def");
        assert_eq!(token.access_token(), "abc.def");
    }
}
