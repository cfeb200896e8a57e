//! Verification verdict as returned by the external verifier

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Outcome of a zero-knowledge proof verification.
///
/// Produced by the verifier and treated as read-only from then on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationVerdict {
    /// Overall validity
    pub is_valid: bool,

    /// Named validation checks, e.g. `isValidProof`
    #[serde(default)]
    pub checks: BTreeMap<String, bool>,

    /// Attributes revealed by the proof
    #[serde(default)]
    pub disclosed_attributes: DisclosedAttributes,

    /// Identifier of the verified subject, used to look up preferences
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_identifier: Option<String>,

    /// Raw error payload reported by the verifier, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl VerificationVerdict {
    /// Create a passing verdict with the given attributes
    pub fn valid(disclosed_attributes: DisclosedAttributes) -> Self {
        Self {
            is_valid: true,
            disclosed_attributes,
            ..Default::default()
        }
    }

    /// Create a failing verdict from a set of checks
    pub fn invalid<I, K>(checks: I) -> Self
    where
        I: IntoIterator<Item = (K, bool)>,
        K: Into<String>,
    {
        Self {
            is_valid: false,
            checks: checks.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            ..Default::default()
        }
    }

    pub fn with_user_identifier(mut self, user_identifier: impl Into<String>) -> Self {
        self.user_identifier = Some(user_identifier.into());
        self
    }

    pub fn with_error(mut self, error: Value) -> Self {
        self.error = Some(error);
        self
    }
}

/// Attribute bundle disclosed by a proof.
///
/// Keys are kept as the verifier sends them; a missing key means the proof
/// did not reveal that attribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisclosedAttributes(Map<String, Value>);

impl DisclosedAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Nationality as a 3-letter code, when disclosed as a string
    pub fn nationality(&self) -> Option<&str> {
        self.0.get("nationality").and_then(Value::as_str)
    }

    /// True when the age check output reports the minimum age was not met.
    ///
    /// The verifier encodes this as `older_than` equal to `"0"`.
    pub fn age_check_failed(&self) -> bool {
        match self.0.get("older_than") {
            Some(Value::String(s)) => s == "0",
            Some(Value::Number(n)) => n.as_u64() == Some(0),
            _ => false,
        }
    }

    /// True when any OFAC sub-check reports a failure
    pub fn ofac_check_failed(&self) -> bool {
        const OFAC_KEYS: [&str; 3] = ["name_and_dob_ofac", "name_and_yob_ofac", "passport_no_ofac"];

        let named = OFAC_KEYS
            .iter()
            .any(|key| self.0.get(*key) == Some(&Value::Bool(false)));

        let listed = match self.0.get("ofac") {
            Some(Value::Array(flags)) => flags.iter().any(|f| f == &Value::Bool(false)),
            _ => false,
        };

        named || listed
    }
}

impl From<Map<String, Value>> for DisclosedAttributes {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
