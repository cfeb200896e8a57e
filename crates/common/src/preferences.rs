//! Per-user disclosure preferences and the verification policy they carry

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::countries;
use crate::error::Error;

/// What a user agreed to disclose, plus the policy enforced on their proof.
///
/// Flags that are absent deserialize to `false`, so nothing is disclosed
/// unless explicitly requested.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisclosurePreferences {
    #[serde(default)]
    pub issuing_state: bool,

    #[serde(default)]
    pub name: bool,

    #[serde(default)]
    pub nationality: bool,

    #[serde(default)]
    pub date_of_birth: bool,

    #[serde(default)]
    pub passport_number: bool,

    #[serde(default)]
    pub gender: bool,

    #[serde(default)]
    pub expiry_date: bool,

    #[serde(default, rename = "minimumAge", skip_serializing_if = "Option::is_none")]
    pub minimum_age: Option<u32>,

    #[serde(default)]
    pub ofac: bool,

    /// Country names (or 3-letter codes) whose nationals are rejected
    #[serde(default, rename = "excludedCountries")]
    pub excluded_countries: Vec<String>,
}

impl DisclosurePreferences {
    /// Whether the given field should be revealed
    pub fn discloses(&self, field: DisclosureField) -> bool {
        match field {
            DisclosureField::IssuingState => self.issuing_state,
            DisclosureField::Name => self.name,
            DisclosureField::Nationality => self.nationality,
            DisclosureField::DateOfBirth => self.date_of_birth,
            DisclosureField::PassportNumber => self.passport_number,
            DisclosureField::Gender => self.gender,
            DisclosureField::ExpiryDate => self.expiry_date,
        }
    }

    pub fn set_disclosure(&mut self, field: DisclosureField, disclose: bool) {
        let flag = match field {
            DisclosureField::IssuingState => &mut self.issuing_state,
            DisclosureField::Name => &mut self.name,
            DisclosureField::Nationality => &mut self.nationality,
            DisclosureField::DateOfBirth => &mut self.date_of_birth,
            DisclosureField::PassportNumber => &mut self.passport_number,
            DisclosureField::Gender => &mut self.gender,
            DisclosureField::ExpiryDate => &mut self.expiry_date,
        };
        *flag = disclose;
    }

    /// The policy section echoed back to clients
    pub fn verification_options(&self) -> VerificationOptions {
        VerificationOptions {
            minimum_age: self.minimum_age,
            ofac: self.ofac,
            excluded_countries: self
                .excluded_countries
                .iter()
                .map(|c| countries::to_display_code(c))
                .collect(),
        }
    }

    /// Canonical name of the excluded country matching a nationality code
    pub fn excluded_country_for(&self, nationality: &str) -> Option<String> {
        let nationality_name = countries::name_for_code(nationality);

        self.excluded_countries.iter().find_map(|excluded| {
            let excluded_name = countries::canonical_name(excluded);
            let matches = excluded.eq_ignore_ascii_case(nationality)
                || (excluded_name.is_some() && excluded_name == nationality_name);

            matches.then(|| {
                excluded_name
                    .map(str::to_string)
                    .unwrap_or_else(|| excluded.clone())
            })
        })
    }
}

/// Policy actually enforced for a verification, rendered for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_age: Option<u32>,
    pub ofac: bool,
    /// 3-letter codes where known
    pub excluded_countries: Vec<String>,
}

/// Attributes whose disclosure is controlled per user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisclosureField {
    IssuingState,
    Name,
    Nationality,
    DateOfBirth,
    PassportNumber,
    Gender,
    ExpiryDate,
}

impl DisclosureField {
    pub const ALL: [DisclosureField; 7] = [
        DisclosureField::IssuingState,
        DisclosureField::Name,
        DisclosureField::Nationality,
        DisclosureField::DateOfBirth,
        DisclosureField::PassportNumber,
        DisclosureField::Gender,
        DisclosureField::ExpiryDate,
    ];

    /// Key of the flag in stored preferences
    pub fn preference_key(self) -> &'static str {
        match self {
            DisclosureField::IssuingState => "issuing_state",
            DisclosureField::Name => "name",
            DisclosureField::Nationality => "nationality",
            DisclosureField::DateOfBirth => "date_of_birth",
            DisclosureField::PassportNumber => "passport_number",
            DisclosureField::Gender => "gender",
            DisclosureField::ExpiryDate => "expiry_date",
        }
    }

    /// Key of the attribute in the credential subject
    pub fn subject_key(self) -> &'static str {
        match self {
            DisclosureField::IssuingState => "issuingState",
            DisclosureField::Name => "name",
            DisclosureField::Nationality => "nationality",
            DisclosureField::DateOfBirth => "dateOfBirth",
            DisclosureField::PassportNumber => "idNumber",
            DisclosureField::Gender => "gender",
            DisclosureField::ExpiryDate => "expiryDate",
        }
    }
}

impl fmt::Display for DisclosureField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.preference_key())
    }
}

impl FromStr for DisclosureField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        DisclosureField::ALL
            .into_iter()
            .find(|field| field.preference_key() == s || field.subject_key() == s)
            .ok_or_else(|| Error::UnknownDisclosureField(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_flags_default_to_hidden() {
        let prefs: DisclosurePreferences =
            serde_json::from_value(json!({ "name": true, "minimumAge": 18 })).unwrap();

        assert!(prefs.discloses(DisclosureField::Name));
        for field in DisclosureField::ALL {
            if field != DisclosureField::Name {
                assert!(!prefs.discloses(field), "{} should be hidden", field);
            }
        }
        assert_eq!(prefs.minimum_age, Some(18));
        assert!(!prefs.ofac);
        assert!(prefs.excluded_countries.is_empty());
    }

    #[test]
    fn test_field_parsing() {
        assert_eq!(
            "passport_number".parse::<DisclosureField>().unwrap(),
            DisclosureField::PassportNumber
        );
        assert_eq!(
            "idNumber".parse::<DisclosureField>().unwrap(),
            DisclosureField::PassportNumber
        );
        assert!(matches!(
            "shoe_size".parse::<DisclosureField>(),
            Err(Error::UnknownDisclosureField(_))
        ));
    }

    #[test]
    fn test_set_disclosure() {
        let mut prefs = DisclosurePreferences::default();
        prefs.set_disclosure(DisclosureField::Gender, true);
        assert!(prefs.gender);
        assert!(prefs.discloses(DisclosureField::Gender));
    }

    #[test]
    fn test_verification_options_render_codes() {
        let prefs = DisclosurePreferences {
            minimum_age: Some(21),
            ofac: true,
            excluded_countries: vec!["North Korea".into(), "Atlantis".into()],
            ..Default::default()
        };

        let options = prefs.verification_options();
        assert_eq!(options.minimum_age, Some(21));
        assert!(options.ofac);
        assert_eq!(options.excluded_countries, vec!["PRK", "Atlantis"]);
    }

    #[test]
    fn test_excluded_country_matching() {
        let prefs = DisclosurePreferences {
            excluded_countries: vec!["France".into(), "IRN".into()],
            ..Default::default()
        };

        assert_eq!(prefs.excluded_country_for("FRA").as_deref(), Some("France"));
        assert_eq!(prefs.excluded_country_for("IRN").as_deref(), Some("Iran"));
        assert_eq!(prefs.excluded_country_for("ITA"), None);
    }
}
