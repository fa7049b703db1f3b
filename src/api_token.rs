use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result, ValidationError};

/// Scheme used in the `Authorization` header.
pub(crate) const AUTH_SCHEME: &str = "ApiToken";

/// Console API token, sent as `Authorization: ApiToken <token>`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiToken(String);

impl ApiToken {
    /// Accepts a bare token or one already prefixed with `ApiToken `.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self> {
        let value = raw.as_ref().trim();
        let value = value
            .strip_prefix("ApiToken ")
            .or_else(|| value.strip_prefix("apitoken "))
            .unwrap_or(value)
            .trim();
        if value.is_empty() || value.eq_ignore_ascii_case(AUTH_SCHEME) {
            return Err(Error::Validation(
                ValidationError::new("API token is required").with_field("apiToken"),
            ));
        }
        if value.chars().any(char::is_whitespace) {
            return Err(Error::Validation(
                ValidationError::new("API token must not contain whitespace")
                    .with_field("apiToken"),
            ));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn header_value(&self) -> String {
        format!("{AUTH_SCHEME} {}", self.0)
    }
}

// Tokens are credentials; keep them out of logs.
impl std::fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let visible: String = self.0.chars().take(4).collect();
        write!(f, "ApiToken({visible}…)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_strips_scheme_prefix() {
        let token = ApiToken::parse("  ApiToken abc123 ").unwrap();
        assert_eq!(token.as_str(), "abc123");
        assert_eq!(token.header_value(), "ApiToken abc123");
    }

    #[test]
    fn parse_rejects_blank() {
        assert!(matches!(
            ApiToken::parse("   "),
            Err(Error::Validation(_))
        ));
        assert!(ApiToken::parse("ApiToken ").is_err());
        assert!(ApiToken::parse("abc def").is_err());
    }

    #[test]
    fn debug_masks_token() {
        let token = ApiToken::parse("supersecretvalue").unwrap();
        assert_eq!(format!("{token:?}"), "ApiToken(supe…)");
    }
}
