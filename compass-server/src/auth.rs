use base64::Engine;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use compass_types::Identity;

/// Claims issued by the hosted auth service for a signed-in user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub sub: Option<String>,  // Subject (user ID)
    pub aud: Option<String>,  // Audience
    pub exp: u64,             // Expiry
    pub iat: Option<u64>,     // Issued at
    pub email: Option<String>,
    pub role: Option<String>, // Database role, not the site role
    pub user_metadata: Option<UserMetadata>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserMetadata {
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedUser {
    pub identity: Identity,
    pub full_name: Option<String>,
    /// Unix seconds; `None` for dev tokens without an `exp` claim.
    pub expires_at: Option<u64>,
}

pub struct AuthService {
    decoding_key: Option<DecodingKey>,
    audience: String,
    dev_mode: bool,
}

impl AuthService {
    pub fn new(jwt_secret: &str, audience: String) -> Self {
        Self {
            decoding_key: Some(DecodingKey::from_secret(jwt_secret.as_bytes())),
            audience,
            dev_mode: false,
        }
    }

    pub fn new_dev_mode() -> Self {
        Self {
            decoding_key: None,
            audience: "dev".to_string(),
            dev_mode: true,
        }
    }

    pub fn is_dev_mode(&self) -> bool {
        self.dev_mode
    }

    pub fn validate_token(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        if self.dev_mode {
            return self.validate_dev_token(token);
        }

        let decoding_key = self.decoding_key.as_ref().ok_or(AuthError::InvalidKey)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[&self.audience]);
        validation.validate_exp = true;

        tracing::debug!("Validating token with audience: {}", self.audience);

        let token_data = decode::<AccessTokenClaims>(token, decoding_key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => {
                    tracing::warn!("Token expired");
                    AuthError::TokenExpired
                }
                ErrorKind::InvalidAudience => {
                    tracing::warn!("Token audience mismatch");
                    AuthError::AudienceMismatch
                }
                _ => {
                    tracing::warn!("JWT token validation failed: {:?}", e);
                    AuthError::InvalidToken
                }
            })?;

        Self::user_from_claims(token_data.claims)
    }

    fn user_from_claims(claims: AccessTokenClaims) -> Result<AuthenticatedUser, AuthError> {
        let user_id = claims
            .sub
            .as_deref()
            .and_then(|id| Uuid::parse_str(id).ok())
            .ok_or(AuthError::MissingSubject)?;

        Ok(AuthenticatedUser {
            identity: Identity {
                user_id,
                email: claims.email.unwrap_or_default(),
            },
            full_name: claims.user_metadata.and_then(|m| m.full_name),
            expires_at: Some(claims.exp),
        })
    }

    fn validate_dev_token(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        // In dev mode, we expect a JWT-like token but we parse it without validation
        tracing::debug!(
            "Validating dev token (first 20 chars): {}",
            token.chars().take(20).collect::<String>()
        );

        // JWT segments are base64url, so a ':' means the simple format
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() == 3 && !token.contains(':') {
            let payload_bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
                .decode(parts[1].trim_end_matches('='))
                .map_err(|e| {
                    tracing::warn!("Failed to decode JWT payload in dev mode: {:?}", e);
                    AuthError::InvalidToken
                })?;

            let claims: AccessTokenClaims =
                serde_json::from_slice(&payload_bytes).map_err(|e| {
                    tracing::warn!("Failed to parse JWT claims in dev mode: {:?}", e);
                    AuthError::InvalidToken
                })?;

            return Self::user_from_claims(claims);
        }

        if token.starts_with('{') && token.ends_with('}') {
            #[derive(serde::Deserialize)]
            struct DevClaims {
                user_id: String,
                email: String,
                name: Option<String>,
            }

            let claims: DevClaims =
                serde_json::from_str(token).map_err(|_| AuthError::InvalidToken)?;
            let user_id = Uuid::parse_str(&claims.user_id).map_err(|_| AuthError::MissingSubject)?;

            return Ok(AuthenticatedUser {
                identity: Identity {
                    user_id,
                    email: claims.email,
                },
                full_name: claims.name,
                expires_at: None,
            });
        }

        // Simple string format: "user_id:email[:name]"
        let string_parts: Vec<&str> = token.splitn(3, ':').collect();
        if string_parts.len() >= 2 {
            let user_id =
                Uuid::parse_str(string_parts[0]).map_err(|_| AuthError::MissingSubject)?;
            Ok(AuthenticatedUser {
                identity: Identity {
                    user_id,
                    email: string_parts[1].to_string(),
                },
                full_name: string_parts.get(2).map(|name| name.to_string()),
                expires_at: None,
            })
        } else {
            Err(AuthError::InvalidToken)
        }
    }
}

/// Pull the token out of an `Authorization` header value.
pub fn bearer_token(header: Option<&str>) -> Option<String> {
    let header = header?.trim();
    let token = header.strip_prefix("Bearer ").unwrap_or(header).trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Token has no usable subject")]
    MissingSubject,
    #[error("Invalid key")]
    InvalidKey,
    #[error("Audience mismatch")]
    AudienceMismatch,
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};

    const SECRET: &str = "test-secret";

    fn claims(sub: &str, exp_offset: i64) -> AccessTokenClaims {
        let now = chrono::Utc::now().timestamp();
        AccessTokenClaims {
            sub: Some(sub.to_string()),
            aud: Some("authenticated".to_string()),
            exp: (now + exp_offset) as u64,
            iat: Some(now as u64),
            email: Some("artist@example.com".to_string()),
            role: Some("authenticated".to_string()),
            user_metadata: Some(UserMetadata {
                full_name: Some("Artist".to_string()),
            }),
        }
    }

    fn sign(claims: &AccessTokenClaims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_token() {
        let auth_service = AuthService::new(SECRET, "authenticated".to_string());
        let user_id = Uuid::new_v4();
        let token_claims = claims(&user_id.to_string(), 3600);
        let token = sign(&token_claims, SECRET);

        let user = auth_service.validate_token(&token).unwrap();
        assert_eq!(user.identity.user_id, user_id);
        assert_eq!(user.identity.email, "artist@example.com");
        assert_eq!(user.full_name.as_deref(), Some("Artist"));
        assert_eq!(user.expires_at, Some(token_claims.exp));
    }

    #[test]
    fn test_invalid_token_validation() {
        let auth_service = AuthService::new(SECRET, "authenticated".to_string());

        let result = auth_service.validate_token("invalid-token");
        assert!(matches!(result.unwrap_err(), AuthError::InvalidToken));

        let forged = sign(&claims(&Uuid::new_v4().to_string(), 3600), "other-secret");
        assert!(matches!(
            auth_service.validate_token(&forged).unwrap_err(),
            AuthError::InvalidToken
        ));
    }

    #[test]
    fn test_expired_token() {
        let auth_service = AuthService::new(SECRET, "authenticated".to_string());
        let token = sign(&claims(&Uuid::new_v4().to_string(), -3600), SECRET);
        assert!(matches!(
            auth_service.validate_token(&token).unwrap_err(),
            AuthError::TokenExpired
        ));
    }

    #[test]
    fn test_subject_must_be_uuid() {
        let auth_service = AuthService::new(SECRET, "authenticated".to_string());
        let token = sign(&claims("not-a-uuid", 3600), SECRET);
        assert!(matches!(
            auth_service.validate_token(&token).unwrap_err(),
            AuthError::MissingSubject
        ));
    }

    #[test]
    fn test_dev_mode_formats() {
        let auth_service = AuthService::new_dev_mode();
        let user_id = Uuid::new_v4();

        let jwt = sign(&claims(&user_id.to_string(), 3600), "anything");
        assert_eq!(
            auth_service.validate_token(&jwt).unwrap().identity.user_id,
            user_id
        );

        let json = format!(
            r#"{{"user_id":"{}","email":"dev@example.com","name":"Dev"}}"#,
            user_id
        );
        let user = auth_service.validate_token(&json).unwrap();
        assert_eq!(user.identity.email, "dev@example.com");

        let simple = format!("{}:dev@example.com:Dev User", user_id);
        let user = auth_service.validate_token(&simple).unwrap();
        assert_eq!(user.full_name.as_deref(), Some("Dev User"));

        assert!(auth_service.validate_token("garbage").is_err());
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(Some("Bearer abc")), Some("abc".to_string()));
        assert_eq!(bearer_token(Some("abc")), Some("abc".to_string()));
        assert_eq!(bearer_token(Some("Bearer ")), None);
        assert_eq!(bearer_token(None), None);
    }
}
