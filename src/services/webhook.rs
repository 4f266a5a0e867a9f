//! Auth-provider webhooks
//!
//! The auth provider pushes user lifecycle events (`user.created`,
//! `user.updated`, `user.deleted`) signed with the Svix scheme:
//!
//! - `svix-id`, `svix-timestamp` and `svix-signature` headers
//! - signed content is `"{id}.{timestamp}.{body}"`
//! - HMAC-SHA256 keyed with the base64 part of a `whsec_...` secret
//! - `svix-signature` is a space separated list of `v1,<base64>` entries,
//!   any one of which may match
//!
//! Verified events are turned into user upserts and deletes.

use crate::models::{ExternalUserInput, UserRole};
use crate::services::user::{UserService, UserServiceError};
use data_encoding::BASE64;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

const SECRET_PREFIX: &str = "whsec_";

/// Error types for webhook handling
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Webhook secret is not configured")]
    NotConfigured,

    #[error("Missing header: {0}")]
    MissingHeader(&'static str),

    #[error("Invalid webhook secret")]
    InvalidSecret,

    #[error("Invalid timestamp")]
    InvalidTimestamp,

    #[error("Timestamp outside the accepted window")]
    TimestampExpired,

    #[error("No matching signature")]
    InvalidSignature,

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<UserServiceError> for WebhookError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::InternalError(e) => WebhookError::InternalError(e),
            other => WebhookError::InvalidPayload(other.to_string()),
        }
    }
}

/// The three signature headers of a delivery
#[derive(Debug, Clone, Copy)]
pub struct SignatureHeaders<'a> {
    pub id: &'a str,
    pub timestamp: &'a str,
    pub signature: &'a str,
}

/// Check a delivery's signature.
///
/// `now` and `tolerance` are unix seconds; a timestamp further than
/// `tolerance` from `now` in either direction is rejected.
pub fn verify_signature(
    secret: &str,
    headers: SignatureHeaders<'_>,
    body: &[u8],
    now: i64,
    tolerance: i64,
) -> Result<(), WebhookError> {
    let timestamp: i64 = headers
        .timestamp
        .trim()
        .parse()
        .map_err(|_| WebhookError::InvalidTimestamp)?;
    if now.abs_diff(timestamp) > tolerance.max(0).unsigned_abs() {
        return Err(WebhookError::TimestampExpired);
    }

    let key = secret_key(secret)?;
    let mut mac = HmacSha256::new_from_slice(&key).map_err(|_| WebhookError::InvalidSecret)?;
    mac.update(headers.id.as_bytes());
    mac.update(b".");
    mac.update(headers.timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);

    let matched = headers
        .signature
        .split_whitespace()
        .filter_map(|entry| entry.strip_prefix("v1,"))
        .filter_map(|sig| BASE64.decode(sig.as_bytes()).ok())
        .any(|sig| mac.clone().verify_slice(&sig).is_ok());

    if matched {
        Ok(())
    } else {
        Err(WebhookError::InvalidSignature)
    }
}

fn secret_key(secret: &str) -> Result<Vec<u8>, WebhookError> {
    let encoded = secret.strip_prefix(SECRET_PREFIX).unwrap_or(secret);
    BASE64
        .decode(encoded.as_bytes())
        .map_err(|_| WebhookError::InvalidSecret)
}

/// Envelope of every delivery
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
struct EmailAddress {
    id: String,
    email_address: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PublicMetadata {
    #[serde(default)]
    role: Option<String>,
}

/// `data` of `user.created` and `user.updated`
#[derive(Debug, Clone, Deserialize)]
struct ProviderUser {
    id: String,
    #[serde(default)]
    email_addresses: Vec<EmailAddress>,
    #[serde(default)]
    primary_email_address_id: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    public_metadata: Option<PublicMetadata>,
}

impl ProviderUser {
    fn primary_email(&self) -> Option<&str> {
        let primary = self.primary_email_address_id.as_deref().and_then(|pid| {
            self.email_addresses.iter().find(|e| e.id == pid)
        });
        primary
            .or_else(|| self.email_addresses.first())
            .map(|e| e.email_address.as_str())
    }

    fn into_input(self) -> Result<ExternalUserInput, WebhookError> {
        let email = self
            .primary_email()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| WebhookError::InvalidPayload("user has no email address".into()))?;

        let full_name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let name = if full_name.is_empty() {
            email.split('@').next().unwrap_or(&email).to_string()
        } else {
            full_name
        };

        let role = self
            .public_metadata
            .and_then(|m| m.role)
            .and_then(|r| r.parse::<UserRole>().ok())
            .filter(|r| matches!(r, UserRole::Student | UserRole::Instructor));

        Ok(ExternalUserInput {
            external_id: self.id,
            email,
            name,
            image_url: self.image_url.filter(|u| !u.is_empty()),
            role,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
struct DeletedUser {
    id: String,
}

/// What a delivery did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Upserted { user_id: i64 },
    Deleted { existed: bool },
    Ignored { event_type: String },
}

/// Verifies deliveries and applies them to the user store
pub struct WebhookService {
    users: Arc<UserService>,
    secret: Option<String>,
    tolerance_seconds: i64,
}

impl WebhookService {
    pub fn new(users: Arc<UserService>, secret: Option<String>, tolerance_seconds: i64) -> Self {
        Self {
            users,
            secret: secret.filter(|s| !s.trim().is_empty()),
            tolerance_seconds,
        }
    }

    /// Verify and apply one delivery
    pub async fn receive(
        &self,
        headers: SignatureHeaders<'_>,
        body: &[u8],
    ) -> Result<WebhookOutcome, WebhookError> {
        let secret = self.secret.as_deref().ok_or(WebhookError::NotConfigured)?;
        verify_signature(
            secret,
            headers,
            body,
            chrono::Utc::now().timestamp(),
            self.tolerance_seconds,
        )?;

        let event: WebhookEvent = serde_json::from_slice(body)
            .map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;
        self.handle_event(event).await
    }

    /// Apply an already verified event
    pub async fn handle_event(&self, event: WebhookEvent) -> Result<WebhookOutcome, WebhookError> {
        match event.event_type.as_str() {
            "user.created" | "user.updated" => {
                let data: ProviderUser = serde_json::from_value(event.data)
                    .map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;
                let user = self.users.upsert_external(data.into_input()?).await?;
                tracing::info!(user_id = user.id, event = %event.event_type, "provider user synced");
                Ok(WebhookOutcome::Upserted { user_id: user.id })
            }
            "user.deleted" => {
                let data: DeletedUser = serde_json::from_value(event.data)
                    .map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;
                let existed = self.users.delete_external(&data.id).await?;
                tracing::info!(external_id = %data.id, existed, "provider user deleted");
                Ok(WebhookOutcome::Deleted { existed })
            }
            other => {
                tracing::debug!(event = other, "ignoring webhook event");
                Ok(WebhookOutcome::Ignored {
                    event_type: other.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};
    use proptest::prelude::*;
    use serde_json::json;

    const SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";

    fn sign(secret: &str, id: &str, ts: &str, body: &[u8]) -> String {
        let key = secret_key(secret).unwrap();
        let mut mac = HmacSha256::new_from_slice(&key).unwrap();
        mac.update(format!("{}.{}.", id, ts).as_bytes());
        mac.update(body);
        format!("v1,{}", BASE64.encode(&mac.finalize().into_bytes()))
    }

    fn headers<'a>(ts: &'a str, signature: &'a str) -> SignatureHeaders<'a> {
        SignatureHeaders {
            id: "msg_1",
            timestamp: ts,
            signature,
        }
    }

    #[test]
    fn test_valid_signature_accepted() {
        let body = br#"{"type":"user.created"}"#;
        let sig = sign(SECRET, "msg_1", "1700000000", body);
        assert!(verify_signature(SECRET, headers("1700000000", &sig), body, 1700000010, 300).is_ok());
    }

    #[test]
    fn test_any_listed_signature_may_match() {
        let body = b"{}";
        let good = sign(SECRET, "msg_1", "1700000000", body);
        let list = format!("v1,AAAA v2,whatever {}", good);
        assert!(verify_signature(SECRET, headers("1700000000", &list), body, 1700000000, 300).is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let sig = sign(SECRET, "msg_1", "1700000000", b"{\"a\":1}");
        assert!(matches!(
            verify_signature(SECRET, headers("1700000000", &sig), b"{\"a\":2}", 1700000000, 300),
            Err(WebhookError::InvalidSignature)
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let other = "whsec_c2VjcmV0LW51bWJlci10d28=";
        let sig = sign(other, "msg_1", "1700000000", b"{}");
        assert!(matches!(
            verify_signature(SECRET, headers("1700000000", &sig), b"{}", 1700000000, 300),
            Err(WebhookError::InvalidSignature)
        ));
    }

    #[test]
    fn test_timestamp_window() {
        let sig = sign(SECRET, "msg_1", "1700000000", b"{}");
        assert!(matches!(
            verify_signature(SECRET, headers("1700000000", &sig), b"{}", 1700000301, 300),
            Err(WebhookError::TimestampExpired)
        ));
        assert!(matches!(
            verify_signature(SECRET, headers("1700000000", &sig), b"{}", 1699999699, 300),
            Err(WebhookError::TimestampExpired)
        ));
        assert!(matches!(
            verify_signature(SECRET, headers("yesterday", &sig), b"{}", 1700000000, 300),
            Err(WebhookError::InvalidTimestamp)
        ));
    }

    #[test]
    fn test_extreme_timestamps_expire() {
        for ts in ["-9223372036854775808", "9223372036854775807"] {
            assert!(matches!(
                verify_signature(SECRET, headers(ts, "v1,AAAA"), b"{}", 1700000000, 300),
                Err(WebhookError::TimestampExpired)
            ));
        }
    }

    #[test]
    fn test_malformed_secret_rejected() {
        assert!(matches!(
            verify_signature("whsec_not base64!", headers("1", "v1,AAAA"), b"", 1, 300),
            Err(WebhookError::InvalidSecret)
        ));
    }

    #[test]
    fn test_provider_user_mapping() {
        let data: ProviderUser = serde_json::from_value(json!({
            "id": "user_1",
            "email_addresses": [
                {"id": "e1", "email_address": "Other@Example.com"},
                {"id": "e2", "email_address": "Primary@Example.com"}
            ],
            "primary_email_address_id": "e2",
            "first_name": "Ada",
            "last_name": null,
            "public_metadata": {"role": "instructor"}
        }))
        .unwrap();
        let input = data.into_input().unwrap();
        assert_eq!(input.email, "primary@example.com");
        assert_eq!(input.name, "Ada");
        assert_eq!(input.role, Some(UserRole::Instructor));
    }

    #[test]
    fn test_provider_user_fallbacks() {
        let data: ProviderUser = serde_json::from_value(json!({
            "id": "user_2",
            "email_addresses": [{"id": "e1", "email_address": "grace@example.com"}],
            "primary_email_address_id": "missing",
            "public_metadata": {"role": "admin"}
        }))
        .unwrap();
        let input = data.into_input().unwrap();
        assert_eq!(input.email, "grace@example.com");
        assert_eq!(input.name, "grace");
        assert_eq!(input.role, None);

        let no_email: ProviderUser =
            serde_json::from_value(json!({"id": "user_3", "email_addresses": []})).unwrap();
        assert!(matches!(
            no_email.into_input(),
            Err(WebhookError::InvalidPayload(_))
        ));
    }

    async fn setup_service() -> WebhookService {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let users = Arc::new(UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool),
        ));
        WebhookService::new(users, Some(SECRET.to_string()), 300)
    }

    #[tokio::test]
    async fn test_receive_signed_lifecycle() {
        let service = setup_service().await;
        let now = chrono::Utc::now().timestamp().to_string();

        let created = serde_json::to_vec(&json!({
            "type": "user.created",
            "data": {
                "id": "user_9",
                "email_addresses": [{"id": "e", "email_address": "nine@example.com"}],
                "primary_email_address_id": "e",
                "first_name": "Nine"
            }
        }))
        .unwrap();
        let sig = sign(SECRET, "msg_1", &now, &created);
        let outcome = service.receive(headers(&now, &sig), &created).await.unwrap();
        assert!(matches!(outcome, WebhookOutcome::Upserted { .. }));

        let deleted = serde_json::to_vec(&json!({"type": "user.deleted", "data": {"id": "user_9"}})).unwrap();
        let sig = sign(SECRET, "msg_1", &now, &deleted);
        let outcome = service.receive(headers(&now, &sig), &deleted).await.unwrap();
        assert_eq!(outcome, WebhookOutcome::Deleted { existed: true });
    }

    #[tokio::test]
    async fn test_unknown_event_ignored() {
        let service = setup_service().await;
        let outcome = service
            .handle_event(WebhookEvent {
                event_type: "session.created".to_string(),
                data: json!({}),
            })
            .await
            .unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::Ignored {
                event_type: "session.created".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_unconfigured_secret() {
        let pool = create_test_pool().await.unwrap();
        let users = Arc::new(UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool),
        ));
        let service = WebhookService::new(users, Some("  ".to_string()), 300);
        assert!(matches!(
            service.receive(headers("1", "v1,AAAA"), b"{}").await,
            Err(WebhookError::NotConfigured)
        ));
    }

    proptest! {
        #[test]
        fn signed_bodies_verify_and_altered_bodies_do_not(
            body in proptest::collection::vec(any::<u8>(), 0..256),
            flip in any::<u8>(),
        ) {
            let sig = sign(SECRET, "msg_1", "1700000000", &body);
            prop_assert!(verify_signature(SECRET, headers("1700000000", &sig), &body, 1700000000, 300).is_ok());

            let mut altered = body.clone();
            altered.push(flip);
            prop_assert!(verify_signature(SECRET, headers("1700000000", &sig), &altered, 1700000000, 300).is_err());
        }
    }
}
