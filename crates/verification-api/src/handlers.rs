//! API request handlers

use attest_common::{
    normalize, DisclosurePreferences, Error, NormalizedResponse, VerificationVerdict,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::store::{PreferenceRecord, PreferenceStore};
use crate::verifier::VerificationRequest;
use crate::AppState;

pub const REQUIRED_FIELDS_MESSAGE: &str =
    "Proof, publicSignals, attestationId and userContextData are required";

/// Proof submission as posted by the companion app
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    #[serde(default)]
    pub attestation_id: Option<Value>,
    #[serde(default)]
    pub proof: Option<Value>,
    #[serde(default)]
    pub public_signals: Option<Value>,
    #[serde(default)]
    pub user_context_data: Option<Value>,
}

impl VerifyRequest {
    /// Check that every field is present and non-empty
    pub fn validate(self) -> Result<VerificationRequest, Error> {
        Ok(VerificationRequest {
            attestation_id: required(self.attestation_id, "attestationId")?,
            proof: required(self.proof, "proof")?,
            public_signals: required(self.public_signals, "publicSignals")?,
            user_context_data: required(self.user_context_data, "userContextData")?,
        })
    }
}

fn required(value: Option<Value>, field: &'static str) -> Result<Value, Error> {
    match value {
        None | Some(Value::Null) => Err(Error::MissingField(field)),
        Some(Value::String(s)) if s.is_empty() => Err(Error::MissingField(field)),
        Some(value) => Ok(value),
    }
}

/// Descriptor the front end uses to build its QR code
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDescriptor {
    pub app_name: String,
    pub scope: String,
    pub endpoint: String,
    pub user_id: Uuid,
    pub user_id_type: &'static str,
    pub mock_passport: bool,
    pub disclosures: DisclosurePreferences,
}

/// Response from saving preferences
#[derive(Debug, Serialize)]
pub struct SavePreferencesResponse {
    pub success: bool,
    pub record: PreferenceRecord,
}

/// API Error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    /// Stable machine-readable category
    pub kind: &'static str,
    pub message: String,
}

impl ApiError {
    fn internal() -> Self {
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            kind: "internal",
            message: "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "status": "error",
            "result": false,
            "error": self.kind,
            "message": self.message
        });

        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::MissingField(field) => {
                warn!("Rejected verification request, missing {}", field);
                ApiError {
                    status: StatusCode::BAD_REQUEST,
                    kind: "invalid_request",
                    message: REQUIRED_FIELDS_MESSAGE.to_string(),
                }
            }
            Error::PreferencesNotFound(_) | Error::MissingUserIdentifier => {
                error!("Configuration fault: {}", err);
                ApiError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    kind: "preferences_unavailable",
                    message: "Disclosure preferences are not configured for this user".to_string(),
                }
            }
            Error::Verifier(ref detail) => {
                error!("Verifier unavailable: {}", detail);
                ApiError {
                    status: StatusCode::BAD_GATEWAY,
                    kind: "verifier_unavailable",
                    message: "Verification service unavailable".to_string(),
                }
            }
            Error::ReadOnlyStore => ApiError {
                status: StatusCode::CONFLICT,
                kind: "read_only",
                message: err.to_string(),
            },
            Error::UnknownDisclosureField(_) => ApiError {
                status: StatusCode::BAD_REQUEST,
                kind: "invalid_request",
                message: err.to_string(),
            },
            other => {
                error!("Unexpected error: {}", other);
                ApiError::internal()
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err).into()
    }
}

/// Health check endpoint
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "verification-api"
    }))
}

/// Verify a submitted proof and return the normalized result
pub async fn verify_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<VerifyRequest>,
) -> Result<(StatusCode, Json<NormalizedResponse>), ApiError> {
    let request = payload.validate()?;

    info!("Verifying proof for attestation: {}", request.attestation_id);

    let verdict = state.verifier.verify(&request).await?;

    let response = resolve_response(
        &verdict,
        state.store.as_ref(),
        &state.config.default_preferences,
    )
    .await?;

    let status = match &response {
        NormalizedResponse::Success { .. } => {
            info!(
                "Verification succeeded for user: {}",
                verdict.user_identifier.as_deref().unwrap_or("unknown")
            );
            StatusCode::OK
        }
        NormalizedResponse::Error { message, .. } => {
            info!("Verification failed: {}", message);
            StatusCode::BAD_REQUEST
        }
    };

    Ok((status, Json(response)))
}

/// Look up the subject's preferences and normalize the verdict.
///
/// A valid verdict requires stored preferences for its user; their absence
/// is a configuration fault. Failed verdicts fall back to the default policy
/// so the failure message can still name the configured limits.
pub async fn resolve_response(
    verdict: &VerificationVerdict,
    store: &dyn PreferenceStore,
    fallback: &DisclosurePreferences,
) -> Result<NormalizedResponse, Error> {
    if verdict.is_valid {
        let user_identifier = verdict
            .user_identifier
            .as_deref()
            .ok_or(Error::MissingUserIdentifier)?;

        let prefs = store
            .get_preferences(user_identifier)
            .await?
            .ok_or_else(|| Error::PreferencesNotFound(user_identifier.to_string()))?;

        return Ok(normalize(verdict, &prefs));
    }

    let stored = match verdict.user_identifier.as_deref() {
        Some(user_identifier) => match store.get_preferences(user_identifier).await {
            Ok(prefs) => prefs,
            Err(e) => {
                warn!("Preference lookup failed for rejected proof: {}", e);
                None
            }
        },
        None => None,
    };

    Ok(normalize(verdict, stored.as_ref().unwrap_or(fallback)))
}

/// Descriptor for building the verification QR code
pub async fn app_handler(State(state): State<Arc<AppState>>) -> Json<AppDescriptor> {
    let config = &state.config;

    Json(AppDescriptor {
        app_name: config.app_name.clone(),
        scope: config.scope.clone(),
        endpoint: config.verify_endpoint(),
        user_id: Uuid::new_v4(),
        user_id_type: "uuid",
        mock_passport: config.mock_passport,
        disclosures: config.default_preferences.clone(),
    })
}

/// Get the stored preferences for a user
pub async fn get_preferences_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<PreferenceRecord>, ApiError> {
    info!("Getting preferences for user: {}", user_id);

    match state.store.get_record(&user_id).await? {
        Some(record) => Ok(Json(record)),
        None => Err(ApiError {
            status: StatusCode::NOT_FOUND,
            kind: "not_found",
            message: format!("No preferences stored for user: {}", user_id),
        }),
    }
}

/// Save preferences for a user
pub async fn put_preferences_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(preferences): Json<DisclosurePreferences>,
) -> Result<Json<SavePreferencesResponse>, ApiError> {
    info!("Saving preferences for user: {}", user_id);

    let record = state.store.save(&user_id, preferences).await?;

    Ok(Json(SavePreferencesResponse {
        success: true,
        record,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryPreferenceStore;
    use attest_common::{DisclosedAttributes, NOT_DISCLOSED};
    use serde_json::json;

    #[test]
    fn test_validate_requires_every_field() {
        let complete = VerifyRequest {
            attestation_id: Some(json!(1)),
            proof: Some(json!({})),
            public_signals: Some(json!([])),
            user_context_data: Some(json!("0x00")),
        };
        assert!(complete.validate().is_ok());

        let missing = VerifyRequest {
            attestation_id: Some(json!(1)),
            proof: Some(json!({})),
            public_signals: Some(Value::Null),
            user_context_data: Some(json!("0x00")),
        };
        assert!(matches!(
            missing.validate(),
            Err(Error::MissingField("publicSignals"))
        ));

        let empty = VerifyRequest {
            user_context_data: Some(json!("")),
            ..Default::default()
        };
        assert!(matches!(empty.validate(), Err(Error::MissingField(_))));
    }

    #[tokio::test]
    async fn test_valid_verdict_requires_stored_preferences() {
        let store = MemoryPreferenceStore::new();
        let verdict = VerificationVerdict::valid(DisclosedAttributes::new().with("name", "Alice"))
            .with_user_identifier("user-1");

        let result = resolve_response(&verdict, &store, &DisclosurePreferences::default()).await;

        match result {
            Err(Error::PreferencesNotFound(user)) => assert_eq!(user, "user-1"),
            other => panic!("expected PreferencesNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_valid_verdict_without_user_is_configuration_fault() {
        let store = MemoryPreferenceStore::new();
        let verdict = VerificationVerdict::valid(DisclosedAttributes::new());

        let err = resolve_response(&verdict, &store, &DisclosurePreferences::default())
            .await
            .unwrap_err();

        assert!(err.is_configuration_fault());
    }

    #[tokio::test]
    async fn test_stored_preferences_are_applied() {
        let store = MemoryPreferenceStore::new();
        store
            .save(
                "user-1",
                DisclosurePreferences {
                    nationality: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let verdict = VerificationVerdict::valid(
            DisclosedAttributes::new()
                .with("name", "Alice")
                .with("nationality", "ITA"),
        )
        .with_user_identifier("user-1");

        let response = resolve_response(&verdict, &store, &DisclosurePreferences::default())
            .await
            .unwrap();
        let subject = response.credential_subject().unwrap();

        assert_eq!(subject["name"], NOT_DISCLOSED);
        assert_eq!(subject["nationality"], "ITA");
    }

    #[tokio::test]
    async fn test_failed_verdict_uses_fallback_policy() {
        let store = MemoryPreferenceStore::new();
        let mut verdict = VerificationVerdict::invalid(Vec::<(String, bool)>::new())
            .with_user_identifier("stranger");
        verdict.disclosed_attributes = DisclosedAttributes::new().with("older_than", "0");
        let fallback = DisclosurePreferences {
            minimum_age: Some(21),
            ..Default::default()
        };

        let response = resolve_response(&verdict, &store, &fallback).await.unwrap();

        assert_eq!(
            response.message(),
            Some("Age verification failed. You must be at least 21 years old.")
        );
    }

    #[test]
    fn test_error_mapping_keeps_faults_distinct() {
        let config_fault = ApiError::from(Error::PreferencesNotFound("user-1".into()));
        let verifier_fault = ApiError::from(Error::Verifier("timeout".into()));
        let unexpected = ApiError::from(Error::MalformedVerdict("bad shape".into()));

        assert_eq!(config_fault.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(config_fault.kind, "preferences_unavailable");
        assert_eq!(verifier_fault.status, StatusCode::BAD_GATEWAY);
        assert_eq!(unexpected.kind, "internal");
        assert!(!unexpected.message.contains("bad shape"));
    }
}
