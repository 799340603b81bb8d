//! Client for a SHARD index server.
//!
//! The server is not trusted. Every record it returns is checked against the
//! key that was asked for before an address is handed back.

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, instrument, warn};

use shard_core::constants::{MAX_ERROR_BODY, MAX_RECORD_SIZE, MAX_SCALAR_BODY};
use shard_core::error::{Result, ShardError};
use shard_core::traits::HostKeyResolver;
use shard_core::types::{AnnouncementRecord, HostPublicKey, NetAddress};
use shard_crypto::verify_record;

use crate::config::ClientConfig;
use crate::http::{build_client, read_limited, read_truncated, transport_error};

/// Verified index client.
#[derive(Clone, Debug)]
pub struct ShardClient {
    config: ClientConfig,
    http_client: reqwest::Client,
}

impl ShardClient {
    /// Creates a client for the server at `addr` with default settings.
    pub fn new(addr: &str) -> Result<Self> {
        Self::with_config(ClientConfig::new(addr)?)
    }

    /// Creates a client with custom configuration.
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let http_client = build_client(config.timeout, None)?;
        Ok(Self {
            config,
            http_client,
        })
    }

    /// Returns the server base URL.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    async fn get(&self, route: &str) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.config.base_url, route);
        self.http_client
            .get(&url)
            .send()
            .await
            .map_err(transport_error)
    }

    /// Turns a non-2xx response into [`ShardError::Server`] carrying the raw
    /// body, truncated.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = read_truncated(response, MAX_ERROR_BODY).await;
        Err(ShardError::Server {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_text(&self, route: &str) -> Result<String> {
        let response = Self::check(self.get(route).await?).await?;
        let body = read_limited(response, MAX_SCALAR_BODY).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Returns the number of blocks the server has processed.
    #[instrument(skip(self))]
    pub async fn chain_height(&self) -> Result<u64> {
        let body = self.get_text("/height").await?;
        body.trim()
            .parse()
            .map_err(|_| ShardError::Protocol(format!("invalid height {:?}", body)))
    }

    /// Returns whether the server's chain observer is caught up.
    #[instrument(skip(self))]
    pub async fn synced(&self) -> Result<bool> {
        let body = self.get_text("/synced").await?;
        body.trim()
            .parse()
            .map_err(|_| ShardError::Protocol(format!("invalid synced flag {:?}", body)))
    }

    /// Fetches the raw signed record for `key` without verifying it.
    pub async fn fetch_record(&self, key: &HostPublicKey) -> Result<AnnouncementRecord> {
        let response = self.get(&format!("/host/{}", key)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(host = %key, "No announcement on index server");
            return Err(ShardError::NoAnnouncement);
        }

        let body = read_limited(Self::check(response).await?, MAX_RECORD_SIZE).await?;
        if body.is_empty() {
            return Err(ShardError::NoAnnouncement);
        }

        AnnouncementRecord::from_bytes(&body)
    }
}

#[async_trait]
impl HostKeyResolver for ShardClient {
    #[instrument(skip(self), fields(host = %key))]
    async fn resolve_host_key(&self, key: &HostPublicKey) -> Result<NetAddress> {
        let record = self.fetch_record(key).await?;

        let announcement = verify_record(&record, key).map_err(|e| match e {
            ShardError::InvalidAnnouncement(reason) => ShardError::Protocol(reason),
            other => other,
        });
        match announcement {
            Ok(announcement) => Ok(announcement.net_address),
            Err(e) => {
                warn!(error = %e, "Rejected record from index server");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use shard_crypto::{host_public_key, sign_announcement, SigningKey};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn host(seed: u64) -> SigningKey {
        SigningKey::generate(&mut ChaCha20Rng::seed_from_u64(seed))
    }

    async fn serve(route: &str, response: ResponseTemplate) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(response)
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_resolve_valid_record() {
        let key = host(1);
        let pubkey = host_public_key(&key);
        let record = sign_announcement(&key, NetAddress::parse("host.example.com:9982").unwrap());

        let server = serve(
            &format!("/host/{}", pubkey),
            ResponseTemplate::new(200).set_body_bytes(record.to_bytes()),
        )
        .await;

        let client = ShardClient::new(&server.uri()).unwrap();
        let addr = client.resolve_host_key(&pubkey).await.unwrap();
        assert_eq!(addr.as_str(), "host.example.com:9982");
    }

    #[tokio::test]
    async fn test_not_found_and_empty_body() {
        let pubkey = host_public_key(&host(2));

        let server = serve(
            &format!("/host/{}", pubkey),
            ResponseTemplate::new(404).set_body_string("no record of that host"),
        )
        .await;
        let client = ShardClient::new(&server.uri()).unwrap();
        assert!(matches!(
            client.resolve_host_key(&pubkey).await,
            Err(ShardError::NoAnnouncement)
        ));

        let server = serve(&format!("/host/{}", pubkey), ResponseTemplate::new(200)).await;
        let client = ShardClient::new(&server.uri()).unwrap();
        assert!(matches!(
            client.resolve_host_key(&pubkey).await,
            Err(ShardError::NoAnnouncement)
        ));
    }

    #[tokio::test]
    async fn test_record_for_other_key_rejected() {
        let asked = host_public_key(&host(3));
        let impostor = sign_announcement(&host(4), NetAddress::parse("evil:1").unwrap());

        let server = serve(
            &format!("/host/{}", asked),
            ResponseTemplate::new(200).set_body_bytes(impostor.to_bytes()),
        )
        .await;

        let client = ShardClient::new(&server.uri()).unwrap();
        assert!(matches!(
            client.resolve_host_key(&asked).await,
            Err(ShardError::InvalidSignature)
        ));
    }

    #[tokio::test]
    async fn test_garbage_is_protocol_error() {
        let pubkey = host_public_key(&host(5));

        for body in [vec![0u8; 10], vec![0u8; 200]] {
            let server = serve(
                &format!("/host/{}", pubkey),
                ResponseTemplate::new(200).set_body_bytes(body),
            )
            .await;
            let client = ShardClient::new(&server.uri()).unwrap();
            assert!(matches!(
                client.resolve_host_key(&pubkey).await,
                Err(ShardError::Protocol(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_server_error_carries_body() {
        let pubkey = host_public_key(&host(6));
        let server = serve(
            &format!("/host/{}", pubkey),
            ResponseTemplate::new(500).set_body_string("database is locked"),
        )
        .await;

        let client = ShardClient::new(&server.uri()).unwrap();
        let err = client.resolve_host_key(&pubkey).await.unwrap_err();
        assert!(matches!(err, ShardError::Server { status: 500, .. }));
        assert_eq!(err.to_string(), "database is locked");
    }

    #[tokio::test]
    async fn test_oversized_bodies_rejected() {
        let pubkey = host_public_key(&host(7));
        let huge = vec![b'x'; 4 * 1024 * 1024];

        let server = MockServer::start().await;
        for route in ["/synced".to_string(), "/height".to_string(), format!("/host/{}", pubkey)] {
            Mock::given(method("GET"))
                .and(path(route))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(huge.clone()))
                .mount(&server)
                .await;
        }

        let client = ShardClient::new(&server.uri()).unwrap();
        for err in [
            client.synced().await.unwrap_err(),
            client.chain_height().await.unwrap_err(),
            client.resolve_host_key(&pubkey).await.unwrap_err(),
        ] {
            assert!(matches!(err, ShardError::Protocol(_)));
            assert!(err.to_string().len() < 100);
        }
    }

    #[tokio::test]
    async fn test_error_body_truncated() {
        let pubkey = host_public_key(&host(8));
        let server = serve(
            &format!("/host/{}", pubkey),
            ResponseTemplate::new(500).set_body_string("e".repeat(1024 * 1024)),
        )
        .await;

        let client = ShardClient::new(&server.uri()).unwrap();
        match client.resolve_host_key(&pubkey).await {
            Err(ShardError::Server { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message.len(), MAX_ERROR_BODY);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_height_and_synced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/height"))
            .respond_with(ResponseTemplate::new(200).set_body_string("1234"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/synced"))
            .respond_with(ResponseTemplate::new(200).set_body_string("false"))
            .mount(&server)
            .await;

        let client = ShardClient::new(&server.uri()).unwrap();
        assert_eq!(client.chain_height().await.unwrap(), 1234);
        assert!(!client.synced().await.unwrap());
    }

    #[tokio::test]
    async fn test_timeout() {
        let server = serve(
            "/height",
            ResponseTemplate::new(200)
                .set_body_string("1")
                .set_delay(Duration::from_millis(500)),
        )
        .await;

        let config = ClientConfig::new(&server.uri())
            .unwrap()
            .timeout(Duration::from_millis(50));
        let client = ShardClient::with_config(config).unwrap();
        let err = client.chain_height().await.unwrap_err();
        assert!(matches!(err, ShardError::Timeout(_)));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };

        let client = ShardClient::new(&addr.to_string()).unwrap();
        assert!(matches!(
            client.synced().await,
            Err(ShardError::Transport(_))
        ));
    }
}
