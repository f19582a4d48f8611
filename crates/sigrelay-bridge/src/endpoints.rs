//! URL templating for the bridge REST surface.

use crate::error::BridgeResult;
use sigrelay_types::config::AdapterConfig;
use sigrelay_types::error::ConfigError;
use url::Url;

pub const ABOUT_PATH: &str = "/v1/about";
pub const RECEIVE_PATH: &str = "/v1/receive/{number}";
pub const SEND_PATH: &str = "/v2/send";
pub const TYPING_PATH: &str = "/v1/typing-indicator/{number}";
pub const REACTIONS_PATH: &str = "/v1/reactions/{number}";

/// Builds bridge URLs. `{number}` in a path template is replaced with the
/// percent-encoded account number.
#[derive(Debug, Clone)]
pub struct BridgeEndpoints {
    base: Url,
    number: String,
}

fn encode_segment(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

impl BridgeEndpoints {
    pub fn new(base_url: &str, number: &str) -> BridgeResult<Self> {
        let base = Url::parse(base_url).map_err(|e| ConfigError::Invalid {
            key: "url",
            reason: e.to_string(),
        })?;
        Ok(Self {
            base,
            number: number.to_string(),
        })
    }

    pub fn from_config(config: &AdapterConfig) -> BridgeResult<Self> {
        Self::new(&config.url, &config.bot_number)
    }

    /// The account number, unencoded.
    pub fn number(&self) -> &str {
        &self.number
    }

    /// Replace the base URL's path with `template`, substituting `{number}`.
    pub fn make_url(&self, template: &str) -> Url {
        let path = template.replace("{number}", &encode_segment(&self.number));
        let mut url = self.base.clone();
        url.set_path(&path);
        url
    }

    pub fn about(&self) -> Url {
        self.make_url(ABOUT_PATH)
    }

    pub fn receive(&self) -> Url {
        self.make_url(RECEIVE_PATH)
    }

    /// Receive endpoint with a `ws`/`wss` scheme for streaming mode.
    pub fn receive_stream(&self) -> Url {
        let mut url = self.receive();
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        // http(s) -> ws(s) keeps the URL "special", so this cannot fail.
        let _ = url.set_scheme(scheme);
        url
    }

    pub fn send(&self) -> Url {
        self.make_url(SEND_PATH)
    }

    pub fn typing_indicator(&self) -> Url {
        self.make_url(TYPING_PATH)
    }

    pub fn reactions(&self) -> Url {
        self.make_url(REACTIONS_PATH)
    }

    /// Download URL of an inbound attachment.
    pub fn attachment(&self, id: &str) -> Url {
        self.make_url(&format!("/v1/attachments/{}", encode_segment(id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints() -> BridgeEndpoints {
        BridgeEndpoints::new("http://localhost:8080", "+15550000").unwrap()
    }

    #[test]
    fn test_number_is_percent_encoded() {
        assert_eq!(
            endpoints().receive().as_str(),
            "http://localhost:8080/v1/receive/%2B15550000"
        );
        assert_eq!(
            endpoints().reactions().as_str(),
            "http://localhost:8080/v1/reactions/%2B15550000"
        );
    }

    #[test]
    fn test_path_replaces_base_path() {
        let endpoints = BridgeEndpoints::new("http://bridge:9000/ignored", "+1").unwrap();
        assert_eq!(endpoints.send().as_str(), "http://bridge:9000/v2/send");
        assert_eq!(endpoints.about().as_str(), "http://bridge:9000/v1/about");
    }

    #[test]
    fn test_stream_scheme() {
        assert_eq!(
            endpoints().receive_stream().as_str(),
            "ws://localhost:8080/v1/receive/%2B15550000"
        );
        let secure = BridgeEndpoints::new("https://bridge.example", "+1").unwrap();
        assert!(secure.receive_stream().as_str().starts_with("wss://"));
    }

    #[test]
    fn test_attachment_url() {
        assert_eq!(
            endpoints().attachment("abc123.png").as_str(),
            "http://localhost:8080/v1/attachments/abc123.png"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(BridgeEndpoints::new("::nope::", "+1").is_err());
    }
}
