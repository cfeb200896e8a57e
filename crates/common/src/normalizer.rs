//! Disclosure normalization
//!
//! Turns a verifier verdict plus the subject's disclosure preferences into
//! the response a client sees. On success the credential subject is redacted
//! according to the preferences. On failure every failing check is collected
//! into one readable message.
//!
//! Everything here is pure: no I/O, and the inputs are only borrowed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::preferences::{DisclosureField, DisclosurePreferences, VerificationOptions};
use crate::verdict::VerificationVerdict;

/// Placeholder for attributes the subject chose not to reveal
pub const NOT_DISCLOSED: &str = "Not disclosed";

/// Message used when a failure carries no further detail
pub const GENERIC_FAILURE: &str = "Verification failed. Please try again.";

/// Checks with a dedicated message, in reporting order
const KNOWN_CHECKS: [(&str, &str); 4] = [
    (
        "isValidProof",
        "Invalid verification proof. Please try scanning the QR code again.",
    ),
    ("isValidScope", "The verification scope is invalid."),
    (
        "isValidAttestationId",
        "Your attestation couldn't be verified.",
    ),
    (
        "isValidNationality",
        "Your nationality couldn't be verified.",
    ),
];

/// Aggregate flag some verifiers include alongside the individual checks
const AGGREGATE_CHECK: &str = "isValid";

/// Client-facing verification response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum NormalizedResponse {
    Success {
        result: bool,
        #[serde(rename = "credentialSubject")]
        credential_subject: Map<String, Value>,
        #[serde(rename = "verificationOptions")]
        verification_options: VerificationOptions,
    },
    Error {
        result: bool,
        message: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        details: BTreeMap<String, bool>,
    },
}

impl NormalizedResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, NormalizedResponse::Success { .. })
    }

    /// Failure message, if this is an error response
    pub fn message(&self) -> Option<&str> {
        match self {
            NormalizedResponse::Error { message, .. } => Some(message),
            NormalizedResponse::Success { .. } => None,
        }
    }

    /// Redacted subject, if this is a success response
    pub fn credential_subject(&self) -> Option<&Map<String, Value>> {
        match self {
            NormalizedResponse::Success {
                credential_subject, ..
            } => Some(credential_subject),
            NormalizedResponse::Error { .. } => None,
        }
    }
}

/// Normalize a verdict against the subject's preferences
pub fn normalize(
    verdict: &VerificationVerdict,
    prefs: &DisclosurePreferences,
) -> NormalizedResponse {
    if verdict.is_valid {
        NormalizedResponse::Success {
            result: true,
            credential_subject: redact(verdict, prefs),
            verification_options: prefs.verification_options(),
        }
    } else {
        NormalizedResponse::Error {
            result: false,
            message: failure_message(verdict, prefs),
            details: verdict.checks.clone(),
        }
    }
}

/// Apply the disclosure flags to the disclosed attributes.
///
/// Every gated field is present in the output, either with its original
/// value or with [`NOT_DISCLOSED`]. Other attributes pass through.
pub fn redact(verdict: &VerificationVerdict, prefs: &DisclosurePreferences) -> Map<String, Value> {
    let mut subject = verdict.disclosed_attributes.clone().into_map();

    for field in DisclosureField::ALL {
        if !prefs.discloses(field) {
            subject.insert(
                field.subject_key().to_string(),
                Value::String(NOT_DISCLOSED.to_string()),
            );
        }
    }

    subject
}

/// Collect one sentence per detected failure.
///
/// Known checks come first in fixed order, then any other failing check in
/// key order, then failures inferred from the disclosed attributes.
pub fn failure_reasons(
    verdict: &VerificationVerdict,
    prefs: &DisclosurePreferences,
) -> Vec<String> {
    let mut reasons = Vec::new();

    for (key, message) in KNOWN_CHECKS {
        if verdict.checks.get(key) == Some(&false) {
            reasons.push(message.to_string());
        }
    }

    for (key, passed) in &verdict.checks {
        if *passed || key == AGGREGATE_CHECK || is_known_check(key) {
            continue;
        }
        let label = readable_check_label(key);
        if !label.is_empty() {
            reasons.push(format!("{} verification failed.", label));
        }
    }

    let attributes = &verdict.disclosed_attributes;

    if attributes.age_check_failed() {
        reasons.push(match prefs.minimum_age {
            Some(age) => format!(
                "Age verification failed. You must be at least {} years old.",
                age
            ),
            None => "Age verification failed. The minimum age requirement was not met."
                .to_string(),
        });
    }

    if attributes.ofac_check_failed() {
        reasons.push("Verification failed due to OFAC restrictions.".to_string());
    }

    if let Some(country) = attributes
        .nationality()
        .and_then(|nationality| prefs.excluded_country_for(nationality))
    {
        reasons.push(format!(
            "Your country ({}) is not eligible for this verification.",
            country
        ));
    }

    reasons
}

/// Build the single message returned for a failed verification
pub fn failure_message(verdict: &VerificationVerdict, prefs: &DisclosurePreferences) -> String {
    let reasons = failure_reasons(verdict, prefs);

    match reasons.len() {
        0 => raw_error_message(verdict.error.as_ref()).unwrap_or_else(|| GENERIC_FAILURE.to_string()),
        1 => reasons.into_iter().next().unwrap_or_default(),
        _ => reasons
            .iter()
            .enumerate()
            .map(|(i, reason)| format!("{}. {}", i + 1, reason))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn raw_error_message(error: Option<&Value>) -> Option<String> {
    match error? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn is_known_check(key: &str) -> bool {
    KNOWN_CHECKS.iter().any(|(known, _)| *known == key)
}

/// Turn a check name like `isValidDocumentType` into `Document Type`.
///
/// Strips a leading `isValid` (or `is` before a capital) and a trailing
/// `Valid`, then splits on capitals.
pub fn readable_check_label(key: &str) -> String {
    let stem = key
        .strip_prefix("isValid")
        .or_else(|| {
            key.strip_prefix("is")
                .filter(|rest| rest.starts_with(|c: char| c.is_ascii_uppercase()))
        })
        .unwrap_or(key);
    let stem = stem.strip_suffix("Valid").unwrap_or(stem);

    let mut label = String::with_capacity(stem.len() + 4);
    for ch in stem.chars() {
        if ch.is_ascii_uppercase() && !label.is_empty() && !label.ends_with(' ') {
            label.push(' ');
        }
        label.push(ch);
    }

    label.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::DisclosedAttributes;
    use serde_json::json;

    fn sample_attributes() -> DisclosedAttributes {
        DisclosedAttributes::new()
            .with("issuingState", "ITA")
            .with("name", "Alice")
            .with("nationality", "ITA")
            .with("dateOfBirth", "01-01-90")
            .with("idNumber", "X1")
            .with("gender", "F")
            .with("expiryDate", "01-01-30")
            .with("minimumAge", "18")
    }

    #[test]
    fn test_hidden_fields_are_replaced() {
        let verdict = VerificationVerdict::valid(
            DisclosedAttributes::new()
                .with("name", "Alice")
                .with("nationality", "ITA")
                .with("idNumber", "X1"),
        );
        let prefs = DisclosurePreferences {
            nationality: true,
            ..Default::default()
        };

        let response = normalize(&verdict, &prefs);
        let subject = response.credential_subject().expect("expected success");

        assert_eq!(subject["name"], NOT_DISCLOSED);
        assert_eq!(subject["nationality"], "ITA");
        assert_eq!(subject["idNumber"], NOT_DISCLOSED);
        assert_eq!(subject["issuingState"], NOT_DISCLOSED);
        assert_eq!(subject["dateOfBirth"], NOT_DISCLOSED);
        assert_eq!(subject["gender"], NOT_DISCLOSED);
        assert_eq!(subject["expiryDate"], NOT_DISCLOSED);
        assert_eq!(subject.len(), 7);
    }

    #[test]
    fn test_disclosed_fields_keep_original_values() {
        let verdict = VerificationVerdict::valid(sample_attributes());
        let mut prefs = DisclosurePreferences::default();
        for field in DisclosureField::ALL {
            prefs.set_disclosure(field, true);
        }

        let response = normalize(&verdict, &prefs);
        let subject = response.credential_subject().unwrap();

        for field in DisclosureField::ALL {
            assert_eq!(
                Some(&subject[field.subject_key()]),
                verdict.disclosed_attributes.get(field.subject_key())
            );
        }
    }

    #[test]
    fn test_each_flag_controls_only_its_field() {
        let verdict = VerificationVerdict::valid(sample_attributes());

        for field in DisclosureField::ALL {
            let mut prefs = DisclosurePreferences::default();
            prefs.set_disclosure(field, true);

            let subject = redact(&verdict, &prefs);
            for other in DisclosureField::ALL {
                let value = &subject[other.subject_key()];
                if other == field {
                    assert_ne!(value, NOT_DISCLOSED);
                } else {
                    assert_eq!(value, NOT_DISCLOSED);
                }
            }
        }
    }

    #[test]
    fn test_ungated_attributes_pass_through() {
        let verdict = VerificationVerdict::valid(
            sample_attributes()
                .with("ofac", json!([true, true, true]))
                .with("nullifier", "0xabc"),
        );

        let subject = redact(&verdict, &DisclosurePreferences::default());

        assert_eq!(subject["minimumAge"], "18");
        assert_eq!(subject["ofac"], json!([true, true, true]));
        assert_eq!(subject["nullifier"], "0xabc");
    }

    #[test]
    fn test_success_echoes_verification_options() {
        let verdict = VerificationVerdict::valid(sample_attributes());
        let prefs = DisclosurePreferences {
            minimum_age: Some(15),
            excluded_countries: vec!["North Korea".into()],
            ..Default::default()
        };

        let body = serde_json::to_value(normalize(&verdict, &prefs)).unwrap();

        assert_eq!(body["status"], "success");
        assert_eq!(body["result"], true);
        assert_eq!(body["verificationOptions"]["minimumAge"], 15);
        assert_eq!(body["verificationOptions"]["ofac"], false);
        assert_eq!(body["verificationOptions"]["excludedCountries"], json!(["PRK"]));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let verdict = VerificationVerdict::valid(sample_attributes());
        let prefs = DisclosurePreferences {
            name: true,
            ..Default::default()
        };

        let first = serde_json::to_string(&normalize(&verdict, &prefs)).unwrap();
        let second = serde_json::to_string(&normalize(&verdict, &prefs)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_single_failure_is_unprefixed() {
        let verdict = VerificationVerdict::invalid([("isValidProof", false), ("isValidScope", true)]);

        let response = normalize(&verdict, &DisclosurePreferences::default());

        assert_eq!(
            response.message(),
            Some("Invalid verification proof. Please try scanning the QR code again.")
        );
    }

    #[test]
    fn test_multiple_failures_are_numbered_in_order() {
        let verdict = VerificationVerdict::invalid([
            ("isValidAttestationId", false),
            ("isValidProof", false),
        ]);

        let message = failure_message(&verdict, &DisclosurePreferences::default());

        assert_eq!(
            message,
            "1. Invalid verification proof. Please try scanning the QR code again.\n\
             2. Your attestation couldn't be verified."
        );
    }

    #[test]
    fn test_empty_checks_fall_back_to_generic_message() {
        let verdict = VerificationVerdict::invalid(Vec::<(String, bool)>::new());
        assert_eq!(
            failure_message(&verdict, &DisclosurePreferences::default()),
            GENERIC_FAILURE
        );
    }

    #[test]
    fn test_raw_error_payload_used_when_nothing_specific() {
        let prefs = DisclosurePreferences::default();

        let text = VerificationVerdict::invalid(Vec::<(String, bool)>::new())
            .with_error(json!("circuit mismatch"));
        assert_eq!(failure_message(&text, &prefs), "circuit mismatch");

        let structured = VerificationVerdict::invalid(Vec::<(String, bool)>::new())
            .with_error(json!({ "code": 7 }));
        assert_eq!(failure_message(&structured, &prefs), r#"{"code":7}"#);

        let specific = VerificationVerdict::invalid([("isValidScope", false)])
            .with_error(json!("ignored"));
        assert_eq!(
            failure_message(&specific, &prefs),
            "The verification scope is invalid."
        );
    }

    #[test]
    fn test_unknown_checks_get_readable_labels() {
        let verdict = VerificationVerdict::invalid([
            ("isValid", false),
            ("isValidDocumentType", false),
            ("isMinimumAgeValid", false),
            ("isOfacValid", true),
        ]);

        let reasons = failure_reasons(&verdict, &DisclosurePreferences::default());

        assert_eq!(
            reasons,
            vec![
                "Minimum Age verification failed.",
                "Document Type verification failed.",
            ]
        );
    }

    #[test]
    fn test_readable_check_label() {
        assert_eq!(readable_check_label("isValidDocumentType"), "Document Type");
        assert_eq!(readable_check_label("isOfacValid"), "Ofac");
        assert_eq!(readable_check_label("expiryChecked"), "expiry Checked");
        assert_eq!(readable_check_label("isValid"), "");
    }

    #[test]
    fn test_attribute_signals_follow_check_messages() {
        let mut verdict = VerificationVerdict::invalid([
            ("isValidNationality", false),
            ("isValidCustom", false),
        ]);
        verdict.disclosed_attributes = DisclosedAttributes::new()
            .with("older_than", "0")
            .with("passport_no_ofac", false)
            .with("nationality", "FRA");
        let prefs = DisclosurePreferences {
            minimum_age: Some(30),
            excluded_countries: vec!["France".into()],
            ..Default::default()
        };

        let reasons = failure_reasons(&verdict, &prefs);

        assert_eq!(
            reasons,
            vec![
                "Your nationality couldn't be verified.",
                "Custom verification failed.",
                "Age verification failed. You must be at least 30 years old.",
                "Verification failed due to OFAC restrictions.",
                "Your country (France) is not eligible for this verification.",
            ]
        );
    }

    #[test]
    fn test_error_response_shape() {
        let verdict = VerificationVerdict::invalid([("isValidProof", false)]);
        let body = serde_json::to_value(normalize(&verdict, &DisclosurePreferences::default()))
            .unwrap();

        assert_eq!(body["status"], "error");
        assert_eq!(body["result"], false);
        assert_eq!(body["details"]["isValidProof"], false);
        assert!(body.get("credentialSubject").is_none());
    }
}
