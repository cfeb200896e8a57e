//! Client for the external proof verifier

use async_trait::async_trait;
use attest_common::{DisclosedAttributes, Error, Result, VerificationVerdict};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Proof submission forwarded to the verifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRequest {
    pub attestation_id: Value,
    pub proof: Value,
    pub public_signals: Value,
    pub user_context_data: Value,
}

/// Verifies zero-knowledge identity proofs
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, request: &VerificationRequest) -> Result<VerificationVerdict>;
}

/// Verifier reached over HTTP.
///
/// Built once at startup and shared by all requests.
pub struct RemoteVerifier {
    base_url: String,
    scope: String,
    mock_passport: bool,
    client: reqwest::Client,
}

/// Body sent to the verifier
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RemoteVerifyBody<'a> {
    scope: &'a str,
    mock_passport: bool,
    #[serde(flatten)]
    request: &'a VerificationRequest,
}

/// Result as reported by the verification SDK
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SdkVerificationResult {
    #[serde(default)]
    pub is_valid: Option<bool>,

    #[serde(default)]
    pub is_valid_details: Map<String, Value>,

    #[serde(default, alias = "credentialSubject")]
    pub disclose_output: Map<String, Value>,

    #[serde(default)]
    pub user_data: Option<SdkUserData>,

    #[serde(default)]
    pub error: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SdkUserData {
    pub user_identifier: String,

    #[serde(default)]
    pub user_defined_data: Option<String>,
}

impl TryFrom<SdkVerificationResult> for VerificationVerdict {
    type Error = Error;

    fn try_from(result: SdkVerificationResult) -> Result<Self> {
        let is_valid = result
            .is_valid
            .or_else(|| result.is_valid_details.get("isValid").and_then(Value::as_bool))
            .ok_or_else(|| Error::MalformedVerdict("missing isValid flag".to_string()))?;

        // Non-boolean detail entries carry no pass/fail signal
        let checks = result
            .is_valid_details
            .iter()
            .filter_map(|(key, value)| value.as_bool().map(|flag| (key.clone(), flag)))
            .collect();

        Ok(VerificationVerdict {
            is_valid,
            checks,
            disclosed_attributes: DisclosedAttributes::from(result.disclose_output),
            user_identifier: result.user_data.map(|data| data.user_identifier),
            error: result.error,
        })
    }
}

impl RemoteVerifier {
    /// Create a new verifier client
    pub fn new(base_url: String, scope: String, mock_passport: bool) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            scope,
            mock_passport,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Verifier for RemoteVerifier {
    async fn verify(&self, request: &VerificationRequest) -> Result<VerificationVerdict> {
        let url = format!("{}/verify", self.base_url);

        debug!("Forwarding proof to verifier: {}", url);

        let body = RemoteVerifyBody {
            scope: &self.scope,
            mock_passport: self.mock_passport,
            request,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Verifier(format!("request failed: {}", e)))?;

        // Rejected proofs still come back as a normal result body
        let status = response.status();
        if status.is_server_error() {
            return Err(Error::Verifier(format!("verifier returned {}", status)));
        }

        let result: SdkVerificationResult = response
            .json()
            .await
            .map_err(|e| Error::MalformedVerdict(format!("unreadable verifier response: {}", e)))?;

        VerificationVerdict::try_from(result)
    }
}
