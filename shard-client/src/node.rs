//! Client for a full node's HTTP API.
//!
//! The node keeps its own host database, so lookups are answered without
//! signature checks: a renter that uses this backend trusts the node it runs.
//! Wallet and transaction-pool calls are thin pass-throughs for callers that
//! already talk to the node. [`NodeClient::scan`] goes one step further and
//! checks the announced address is actually reachable.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tracing::{debug, info, instrument};

use shard_core::constants::MAX_ERROR_BODY;
use shard_core::error::{Result, ShardError};
use shard_core::traits::HostKeyResolver;
use shard_core::types::{HostPublicKey, NetAddress};

use crate::config::NodeConfig;
use crate::http::{build_client, read_truncated, transport_error};

/// A transaction in the node's own JSON encoding.
pub type NodeTransaction = serde_json::Value;

// ═══════════════════════════════════════════════════════════════════════════════
// NODE API TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Consensus summary from `GET /consensus`.
#[derive(Clone, Debug, Deserialize)]
pub struct ConsensusInfo {
    /// Whether the node believes it is caught up
    pub synced: bool,
    /// Current block height
    pub height: u64,
}

/// Host database entry.
#[derive(Clone, Debug, Deserialize)]
pub struct HostEntry {
    /// Most recently announced address
    #[serde(rename = "netaddress")]
    pub net_address: String,
    /// Host key in `ed25519:<hex>` form
    #[serde(rename = "publickeystring", default)]
    pub public_key: String,
}

#[derive(Deserialize)]
struct HostResponse {
    entry: HostEntry,
}

#[derive(Deserialize)]
struct HostsResponse {
    #[serde(default)]
    hosts: Option<Vec<HostEntry>>,
}

/// Fee estimate in hastings per byte, as decimal strings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct FeeEstimate {
    /// Minimum recommended fee
    pub minimum: String,
    /// Maximum recommended fee
    pub maximum: String,
}

#[derive(Deserialize)]
struct AddressResponse {
    address: String,
}

#[derive(Serialize)]
struct SignRequest<'a> {
    transaction: &'a NodeTransaction,
    tosign: &'a [String],
}

#[derive(Deserialize)]
struct SignResponse {
    transaction: NodeTransaction,
}

/// Spendable output tracked by the node's wallet.
#[derive(Clone, Debug, Deserialize)]
pub struct UnspentOutput {
    /// Output ID
    pub id: String,
    /// Output type
    #[serde(rename = "fundtype", default)]
    pub fund_type: String,
    /// Height at which the output was confirmed
    #[serde(rename = "confirmationheight", default)]
    pub confirmation_height: u64,
    /// Address the output is sent to
    #[serde(rename = "unlockhash")]
    pub unlock_hash: String,
    /// Value in hastings
    pub value: String,
    /// Whether the wallet only watches this output
    #[serde(rename = "iswatchonly", default)]
    pub is_watch_only: bool,
}

#[derive(Deserialize)]
struct UnspentResponse {
    #[serde(default)]
    outputs: Option<Vec<UnspentOutput>>,
}

/// A public key as the node encodes it.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct NodePublicKey {
    /// Signature algorithm
    pub algorithm: String,
    /// Key bytes in the node's encoding
    pub key: String,
}

/// Conditions under which an address can be spent from.
#[derive(Clone, Debug, Deserialize)]
pub struct UnlockConditions {
    /// Height before which outputs cannot be spent
    #[serde(default)]
    pub timelock: u64,
    /// Keys that may sign
    #[serde(rename = "publickeys", default)]
    pub public_keys: Vec<NodePublicKey>,
    /// Signatures needed to spend
    #[serde(rename = "signaturesrequired")]
    pub signatures_required: u64,
}

#[derive(Deserialize)]
struct UnlockConditionsResponse {
    #[serde(rename = "unlockconditions")]
    unlock_conditions: UnlockConditions,
}

/// Outcome of a successful host scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScannedHost {
    /// Host that was scanned
    pub public_key: HostPublicKey,
    /// Address taken from the node's host database
    pub net_address: NetAddress,
    /// Time to open a connection to the host
    pub latency: Duration,
}

/// Error body the node sends with non-2xx responses.
#[derive(Deserialize)]
struct NodeErrorBody {
    message: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLIENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Full-node resolver and API client.
///
/// Trust root: the node itself. Addresses come straight from its host
/// database and are not signature-checked here.
#[derive(Clone, Debug)]
pub struct NodeClient {
    config: NodeConfig,
    http_client: reqwest::Client,
}

impl NodeClient {
    /// Creates a client for the node at `addr` with an optional API password.
    pub fn new(addr: &str, password: Option<String>) -> Result<Self> {
        let mut config = NodeConfig::new(addr)?;
        config.password = password;
        Self::with_config(config)
    }

    /// Creates a client with custom configuration.
    pub fn with_config(config: NodeConfig) -> Result<Self> {
        let http_client = build_client(config.timeout, Some(&config.user_agent))?;
        Ok(Self {
            config,
            http_client,
        })
    }

    fn request(&self, method: reqwest::Method, route: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.base_url, route);
        let builder = self.http_client.request(method, &url);
        match &self.config.password {
            Some(password) => builder.basic_auth("", Some(password)),
            None => builder,
        }
    }

    /// Sends a request and decodes node errors once, here.
    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = read_truncated(response, MAX_ERROR_BODY).await;
        let message = serde_json::from_str::<NodeErrorBody>(&body)
            .map(|e| e.message)
            .unwrap_or(body);
        Err(ShardError::Node {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, route: &str) -> Result<T> {
        let response = self.send(self.request(reqwest::Method::GET, route)).await?;
        decode(response).await
    }

    /// Returns the node's consensus summary.
    #[instrument(skip(self))]
    pub async fn consensus(&self) -> Result<ConsensusInfo> {
        self.get_json("/consensus").await
    }

    /// Returns the current block height.
    pub async fn chain_height(&self) -> Result<u64> {
        Ok(self.consensus().await?.height)
    }

    /// Returns whether the node believes it is synchronized.
    pub async fn synced(&self) -> Result<bool> {
        Ok(self.consensus().await?.synced)
    }

    /// Returns the keys of every host that has announced.
    #[instrument(skip(self))]
    pub async fn hosts(&self) -> Result<Vec<HostPublicKey>> {
        let response: HostsResponse = self.get_json("/hostdb/all").await?;
        response
            .hosts
            .unwrap_or_default()
            .iter()
            .map(|entry| {
                entry.public_key.parse().map_err(|e: ShardError| {
                    ShardError::Protocol(format!("node returned bad host key: {}", e))
                })
            })
            .collect()
    }

    /// Submits a transaction set; the last transaction is the one being
    /// broadcast and the rest are its parents.
    #[instrument(skip(self, txn_set), fields(len = txn_set.len()))]
    pub async fn accept_transaction_set(&self, txn_set: &[NodeTransaction]) -> Result<()> {
        let (txn, parents) = txn_set
            .split_last()
            .ok_or_else(|| ShardError::InvalidTransaction("empty transaction set".into()))?;

        let form = [
            ("parents", serde_json::to_string(parents)?),
            ("transaction", serde_json::to_string(txn)?),
        ];
        self.send(self.request(reqwest::Method::POST, "/tpool/raw").form(&form))
            .await?;
        Ok(())
    }

    /// Returns the current transaction fee estimate.
    pub async fn fee_estimate(&self) -> Result<FeeEstimate> {
        self.get_json("/tpool/fee").await
    }

    /// Returns a fresh address from the node's wallet.
    pub async fn new_wallet_address(&self) -> Result<String> {
        let response: AddressResponse = self.get_json("/wallet/address").await?;
        Ok(response.address)
    }

    /// Has the wallet sign the listed signature fields of `txn`.
    #[instrument(skip(self, txn, to_sign))]
    pub async fn sign_transaction(
        &self,
        txn: &NodeTransaction,
        to_sign: &[String],
    ) -> Result<NodeTransaction> {
        let request = SignRequest {
            transaction: txn,
            tosign: to_sign,
        };
        let response = self
            .send(self.request(reqwest::Method::POST, "/wallet/sign").json(&request))
            .await?;
        let signed: SignResponse = decode(response).await?;
        Ok(signed.transaction)
    }

    /// Returns the wallet's spendable outputs.
    pub async fn unspent_outputs(&self) -> Result<Vec<UnspentOutput>> {
        let response: UnspentResponse = self.get_json("/wallet/unspent").await?;
        Ok(response.outputs.unwrap_or_default())
    }

    /// Looks the host up in the node's database, then connects to the
    /// announced address.
    ///
    /// The connection attempt, including name resolution, is bounded by
    /// [`NodeConfig::scan_timeout`]; running out of time is a
    /// [`ShardError::Timeout`] and a refused or failed connection is a
    /// [`ShardError::Transport`].
    #[instrument(skip(self), fields(host = %key))]
    pub async fn scan(&self, key: &HostPublicKey) -> Result<ScannedHost> {
        let net_address = self.resolve_host_key(key).await?;
        let deadline = self.config.scan_timeout;

        let started = Instant::now();
        match tokio::time::timeout(deadline, TcpStream::connect(net_address.as_str())).await {
            Ok(Ok(_stream)) => {
                let latency = started.elapsed();
                info!(addr = %net_address, ?latency, "Host reachable");
                Ok(ScannedHost {
                    public_key: *key,
                    net_address,
                    latency,
                })
            }
            Ok(Err(e)) => Err(ShardError::Transport(format!(
                "host {} unreachable: {}",
                net_address, e
            ))),
            Err(_) => Err(ShardError::Timeout(format!(
                "no answer from {} within {:?}",
                net_address, deadline
            ))),
        }
    }

    /// Returns the unlock conditions of a wallet address.
    pub async fn unlock_conditions(&self, addr: &str) -> Result<UnlockConditions> {
        let response: UnlockConditionsResponse = self
            .get_json(&format!("/wallet/unlockconditions/{}", addr))
            .await?;
        Ok(response.unlock_conditions)
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let body = response.bytes().await.map_err(transport_error)?;
    serde_json::from_slice(&body)
        .map_err(|e| ShardError::Protocol(format!("unexpected node response: {}", e)))
}

#[async_trait]
impl HostKeyResolver for NodeClient {
    #[instrument(skip(self), fields(host = %key))]
    async fn resolve_host_key(&self, key: &HostPublicKey) -> Result<NetAddress> {
        let route = format!("/hostdb/hosts/{}", key);
        let response = match self.send(self.request(reqwest::Method::GET, &route)).await {
            Err(ShardError::Node { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                debug!("Host unknown to node");
                return Err(ShardError::NoAnnouncement);
            }
            other => other?,
        };

        let host: HostResponse = decode(response).await?;
        NetAddress::parse(host.entry.net_address)
            .map_err(|e| ShardError::Protocol(format!("node returned bad address: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn pubkey() -> HostPublicKey {
        HostPublicKey::ed25519([0xAB; 32])
    }

    async fn node() -> (MockServer, NodeClient) {
        let server = MockServer::start().await;
        let client = NodeClient::new(&server.uri(), Some("password".into())).unwrap();
        (server, client)
    }

    #[tokio::test]
    async fn test_resolve_known_host() {
        let (server, client) = node().await;
        Mock::given(method("GET"))
            .and(path(format!("/hostdb/hosts/{}", pubkey())))
            .and(header("user-agent", "Sia-Agent"))
            .and(header("authorization", "Basic OnBhc3N3b3Jk"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "entry": {
                    "netaddress": "host.example.com:9982",
                    "publickeystring": pubkey().to_string(),
                }
            })))
            .mount(&server)
            .await;

        let addr = client.resolve_host_key(&pubkey()).await.unwrap();
        assert_eq!(addr.as_str(), "host.example.com:9982");
    }

    #[tokio::test]
    async fn test_unknown_host_is_not_found() {
        let (server, client) = node().await;
        Mock::given(method("GET"))
            .and(path(format!("/hostdb/hosts/{}", pubkey())))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({ "message": "requested host does not exist" })),
            )
            .mount(&server)
            .await;

        let err = client.resolve_host_key(&pubkey()).await.unwrap_err();
        assert!(matches!(err, ShardError::NoAnnouncement));
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_node_error_propagated() {
        let (server, client) = node().await;
        Mock::given(method("GET"))
            .and(path(format!("/hostdb/hosts/{}", pubkey())))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({ "message": "hostdb is not ready" })),
            )
            .mount(&server)
            .await;

        match client.resolve_host_key(&pubkey()).await {
            Err(ShardError::Node { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "hostdb is not ready");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    async fn mount_host(server: &MockServer, netaddress: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/hostdb/hosts/{}", pubkey())))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "entry": { "netaddress": netaddress }
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_scan_reachable_host() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let host_addr = listener.local_addr().unwrap().to_string();

        let (server, client) = node().await;
        mount_host(&server, &host_addr).await;

        let scanned = client.scan(&pubkey()).await.unwrap();
        assert_eq!(scanned.public_key, pubkey());
        assert_eq!(scanned.net_address.as_str(), host_addr);
        assert!(scanned.latency < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_scan_unreachable_host() {
        let host_addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().to_string()
        };

        let (server, client) = node().await;
        mount_host(&server, &host_addr).await;

        assert!(matches!(
            client.scan(&pubkey()).await,
            Err(ShardError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_scan_bounded_by_deadline() {
        let (server, _) = node().await;
        // Non-routable: either the connect hangs until the deadline or the
        // network refuses it outright
        mount_host(&server, "10.255.255.1:9982").await;

        let config = NodeConfig::new(&server.uri())
            .unwrap()
            .scan_timeout(Duration::from_millis(100));
        let client = NodeClient::with_config(config).unwrap();

        let started = Instant::now();
        let err = client.scan(&pubkey()).await.unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(matches!(err, ShardError::Timeout(_) | ShardError::Transport(_)));
    }

    #[tokio::test]
    async fn test_scan_unknown_host() {
        let (server, client) = node().await;
        Mock::given(method("GET"))
            .and(path(format!("/hostdb/hosts/{}", pubkey())))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert!(matches!(
            client.scan(&pubkey()).await,
            Err(ShardError::NoAnnouncement)
        ));
    }

    #[tokio::test]
    async fn test_consensus_passthrough() {
        let (server, client) = node().await;
        Mock::given(method("GET"))
            .and(path("/consensus"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "synced": true,
                "height": 250_000,
                "currentblock": "00000000",
            })))
            .mount(&server)
            .await;

        assert_eq!(client.chain_height().await.unwrap(), 250_000);
        assert!(client.synced().await.unwrap());
    }

    #[tokio::test]
    async fn test_hosts() {
        let (server, client) = node().await;
        Mock::given(method("GET"))
            .and(path("/hostdb/all"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hosts": [
                    { "netaddress": "a:1", "publickeystring": pubkey().to_string() },
                ]
            })))
            .mount(&server)
            .await;

        assert_eq!(client.hosts().await.unwrap(), vec![pubkey()]);
    }

    #[tokio::test]
    async fn test_accept_transaction_set() {
        let (server, client) = node().await;
        Mock::given(method("POST"))
            .and(path("/tpool/raw"))
            .and(body_string_contains("transaction="))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        assert!(client.accept_transaction_set(&[]).await.is_err());
        client
            .accept_transaction_set(&[json!({ "arbitrarydata": [] })])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_wallet_passthroughs() {
        let (server, client) = node().await;
        Mock::given(method("GET"))
            .and(path("/tpool/fee"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "minimum": "10", "maximum": "20"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/wallet/address"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "address": "abcd" })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/wallet/unspent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "outputs": [{
                    "id": "01", "fundtype": "siacoin output", "confirmationheight": 5,
                    "unlockhash": "abcd", "value": "1000", "iswatchonly": false
                }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/wallet/unlockconditions/abcd"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "unlockconditions": {
                    "timelock": 0,
                    "publickeys": [{ "algorithm": "ed25519", "key": "AAAA" }],
                    "signaturesrequired": 1
                }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/wallet/sign"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "transaction": { "signed": true }
            })))
            .mount(&server)
            .await;

        assert_eq!(
            client.fee_estimate().await.unwrap(),
            FeeEstimate { minimum: "10".into(), maximum: "20".into() }
        );
        assert_eq!(client.new_wallet_address().await.unwrap(), "abcd");

        let outputs = client.unspent_outputs().await.unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].value, "1000");

        let conditions = client.unlock_conditions("abcd").await.unwrap();
        assert_eq!(conditions.signatures_required, 1);
        assert_eq!(conditions.public_keys[0].algorithm, "ed25519");

        let signed = client
            .sign_transaction(&json!({}), &["00".into()])
            .await
            .unwrap();
        assert_eq!(signed, json!({ "signed": true }));
    }
}
