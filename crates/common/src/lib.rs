//! Shared types for the attestation gateway: verifier verdicts, disclosure
//! preferences and the normalizer that combines them into client responses.

pub mod countries;
pub mod error;
pub mod normalizer;
pub mod preferences;
pub mod verdict;

pub use error::{Error, Result};
pub use normalizer::{normalize, NormalizedResponse, GENERIC_FAILURE, NOT_DISCLOSED};
pub use preferences::{DisclosureField, DisclosurePreferences, VerificationOptions};
pub use verdict::{DisclosedAttributes, VerificationVerdict};
