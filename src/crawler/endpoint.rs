//! Page addressing: `GET <base>/<id>`

use crate::{ConfigError, Identifier};
use url::Url;

/// Base URL that identifiers are appended to
#[derive(Debug, Clone)]
pub struct Endpoint {
    base: String,
}

impl Endpoint {
    /// Creates an endpoint from a base such as `https://howlongtobeat.com/game`
    ///
    /// A trailing slash on the base is ignored.
    pub fn new(base: &str) -> Result<Self, ConfigError> {
        let trimmed = base.trim().trim_end_matches('/');
        let parsed = Url::parse(trimmed)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", base, e)))?;

        if parsed.cannot_be_a_base() {
            return Err(ConfigError::InvalidUrl(format!(
                "{} cannot have identifiers appended",
                base
            )));
        }

        Ok(Self {
            base: trimmed.to_string(),
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// URL of the page for `id`
    pub fn url_for(&self, id: Identifier) -> Result<Url, url::ParseError> {
        Url::parse(&format!("{}/{}", self.base, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for() {
        let endpoint = Endpoint::new("https://howlongtobeat.com/game").unwrap();
        assert_eq!(
            endpoint.url_for(10270).unwrap().as_str(),
            "https://howlongtobeat.com/game/10270"
        );
    }

    #[test]
    fn test_trailing_slash_ignored() {
        let endpoint = Endpoint::new("http://127.0.0.1:8080/game/").unwrap();
        assert_eq!(endpoint.base(), "http://127.0.0.1:8080/game");
        assert_eq!(
            endpoint.url_for(1).unwrap().as_str(),
            "http://127.0.0.1:8080/game/1"
        );
    }

    #[test]
    fn test_rejects_non_base_urls() {
        assert!(Endpoint::new("not a url").is_err());
        assert!(Endpoint::new("mailto:someone@example.com").is_err());
    }
}
