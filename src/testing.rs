use crate::{Client, Config, RetryConfig};

/// Token used by [`test_client`]; requests carry `Authorization: ApiToken test-token`.
pub const TEST_TOKEN: &str = "test-token";

/// Create a test client configured to use a wiremock server.
/// Disables retries by default for predictable test behavior.
pub fn test_client(base_url: &str) -> Client {
    Client::new(Config {
        api_url: Some(base_url.to_string()),
        api_token: Some(TEST_TOKEN.to_string()),
        retry: Some(RetryConfig::disabled()),
        ..Default::default()
    })
    .expect("client")
}

/// Same as [`test_client`] with a ceiling on "return all" pagination.
pub fn test_client_with_max_pages(base_url: &str, max_pages: usize) -> Client {
    Client::new(Config {
        api_url: Some(base_url.to_string()),
        api_token: Some(TEST_TOKEN.to_string()),
        retry: Some(RetryConfig::disabled()),
        max_pages: Some(max_pages),
        ..Default::default()
    })
    .expect("client")
}
