//! Identity assertions returned by the identity provider

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Country used when the claimant doesn't carry a recognizable code
pub const FALLBACK_COUNTRY_CODE: &str = "us";

static COUNTRY_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Country Code: ([A-Z]{2})").expect("valid hardcoded regex"));

/// A verified identity, as handed out by the identity provider once the
/// user completed the out-of-band verification.
///
/// Assertions are never mutated. A new login replaces the persisted one wholesale.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct IdentityAssertion {
    /// Display name
    #[validate(length(min = 1))]
    pub name: String,
    /// Canonical account key
    #[validate(length(min = 1), contains = "@")]
    pub email: String,
    /// Free-text attestation, embeds a `Country Code: XX` marker
    #[validate(length(min = 1))]
    pub claimant: String,
}

impl IdentityAssertion {
    /// Lower-cased two letter country code from the claimant,
    /// or [`FALLBACK_COUNTRY_CODE`] if there is none.
    pub fn country_code(&self) -> String {
        country_code(&self.claimant)
    }

    /// The flag image used as avatar for externally verified users
    pub fn flag_image_url(&self) -> String {
        flag_image_url(&self.country_code())
    }
}

/// Extract the first `Country Code: XX` marker from a claimant string
pub fn country_code(claimant: &str) -> String {
    COUNTRY_CODE
        .captures(claimant)
        .and_then(|captures| captures.get(1))
        .map_or_else(
            || FALLBACK_COUNTRY_CODE.to_string(),
            |code| code.as_str().to_lowercase(),
        )
}

/// Flag image for a lower-cased country code
pub fn flag_image_url(code: &str) -> String {
    format!("https://flagcdn.com/w80/{code}.png")
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn assertion(claimant: &str) -> IdentityAssertion {
        IdentityAssertion {
            name: "Ada".to_string(),
            email: "ada@example.test".to_string(),
            claimant: claimant.to_string(),
        }
    }

    #[test]
    fn test_country_code_embedded() {
        assert_eq!(country_code("Some text Country Code: DE more text"), "de");
    }

    #[test]
    fn test_country_code_fallback() {
        assert_eq!(country_code("no marker in here"), "us");
        assert_eq!(country_code(""), "us");
    }

    #[test]
    fn test_country_code_requires_uppercase() {
        assert_eq!(country_code("Country Code: de"), "us");
        assert_eq!(country_code("country code: DE"), "us");
    }

    #[test]
    fn test_country_code_first_match_wins() {
        assert_eq!(
            country_code("Country Code: FR, formerly Country Code: BE"),
            "fr"
        );
    }

    #[test]
    fn test_flag_image_url() {
        assert_eq!(
            assertion("Verified. Country Code: IN").flag_image_url(),
            "https://flagcdn.com/w80/in.png"
        );
    }

    #[test]
    fn test_validation() {
        assert_matches!(assertion("Country Code: FR").validate(), Ok(()));
        assert_matches!(assertion("").validate(), Err(_));

        let mut no_at = assertion("Country Code: FR");
        no_at.email = "ada.example.test".to_string();
        assert_matches!(no_at.validate(), Err(_));

        let mut no_name = assertion("Country Code: FR");
        no_name.name = String::new();
        assert_matches!(no_name.validate(), Err(_));
    }
}
