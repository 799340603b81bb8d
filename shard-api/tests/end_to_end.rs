//! Real index server, real indexer, real verified client over HTTP.

use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use shard_api::IndexServer;
use shard_client::{HostKeyResolver, Resolver, ResolverConfig, ShardClient};
use shard_core::traits::IndexReader;
use shard_core::types::{Block, NetAddress, Transaction};
use shard_core::{ErrorKind, ShardError};
use shard_crypto::{host_public_key, sign_announcement, SigningKey};
use shard_indexer::Indexer;
use shard_store::{FileStore, MemoryStore};

struct Harness {
    indexer: Arc<Indexer>,
    client: ShardClient,
    addr: String,
    _shutdown: oneshot::Sender<()>,
}

async fn start(indexer: Arc<Indexer>) -> Harness {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let (tx, rx) = oneshot::channel::<()>();

    let reader: Arc<dyn IndexReader> = indexer.clone();
    tokio::spawn(IndexServer::new(reader).serve(listener, async {
        let _ = rx.await;
    }));

    Harness {
        indexer,
        client: ShardClient::new(&addr).unwrap(),
        addr,
        _shutdown: tx,
    }
}

fn host(seed: u64) -> SigningKey {
    SigningKey::generate(&mut ChaCha20Rng::seed_from_u64(seed))
}

fn announcement_block(height: u64, key: &SigningKey, addr: &str) -> Block {
    let record = sign_announcement(key, NetAddress::parse(addr).unwrap());
    Block::with_transactions(
        height,
        vec![Transaction::with_arbitrary_data(vec![record.to_bytes()])],
    )
}

#[tokio::test]
async fn test_unknown_key_not_found() {
    let indexer = Arc::new(Indexer::new(Arc::new(MemoryStore::new())).await.unwrap());
    let h = start(indexer).await;

    let err = h
        .client
        .resolve_host_key(&host_public_key(&host(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, ShardError::NoAnnouncement));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_observe_then_resolve() {
    let indexer = Arc::new(Indexer::new(Arc::new(MemoryStore::new())).await.unwrap());
    let h = start(indexer).await;
    let k1 = host(1);
    let k2 = host(2);

    h.indexer
        .observe(&announcement_block(0, &k1, "one.example.com:9982"))
        .await
        .unwrap();
    assert_eq!(h.client.chain_height().await.unwrap(), 1);
    assert_eq!(
        h.client
            .resolve_host_key(&host_public_key(&k1))
            .await
            .unwrap()
            .as_str(),
        "one.example.com:9982"
    );

    // One more block with one announcement for k2
    h.indexer
        .observe(&announcement_block(1, &k2, "two.example.com:9982"))
        .await
        .unwrap();
    assert_eq!(h.client.chain_height().await.unwrap(), 2);
    assert_eq!(
        h.client
            .resolve_host_key(&host_public_key(&k2))
            .await
            .unwrap()
            .as_str(),
        "two.example.com:9982"
    );

    assert!(!h.client.synced().await.unwrap());
    h.indexer.set_synced(true);
    assert!(h.client.synced().await.unwrap());
}

#[tokio::test]
async fn test_tampered_record_rejected() {
    // Store a record whose signature was corrupted after indexing
    let store = Arc::new(MemoryStore::new());
    let key = host(3);
    let pubkey = host_public_key(&key);
    let mut record = sign_announcement(&key, NetAddress::parse("h:1").unwrap());
    record.signature.0[17] ^= 0x40;

    let mut batch = shard_core::types::StoreBatch::at_height(1);
    batch.put(pubkey, record);
    store.apply_batch(batch);

    let indexer = Arc::new(Indexer::new(store).await.unwrap());
    let h = start(indexer).await;

    assert!(matches!(
        h.client.resolve_host_key(&pubkey).await,
        Err(ShardError::InvalidSignature)
    ));
}

#[tokio::test]
async fn test_resolver_enum_and_persistence() {
    let dir = tempfile::tempdir().unwrap();
    let key = host(4);
    let pubkey = host_public_key(&key);

    {
        let store = FileStore::open_dir(dir.path()).await.unwrap();
        let indexer = Indexer::new(Arc::new(store)).await.unwrap();
        indexer
            .observe(&announcement_block(0, &key, "persisted.example.com:1"))
            .await
            .unwrap();
    }

    let store = FileStore::open_dir(dir.path()).await.unwrap();
    let indexer = Arc::new(Indexer::new(Arc::new(store)).await.unwrap());
    let h = start(indexer).await;

    let resolver = Resolver::from_config(ResolverConfig::shard(&h.addr).unwrap()).unwrap();
    assert_eq!(resolver.chain_height().await.unwrap(), 1);
    assert_eq!(
        resolver.resolve_host_key(&pubkey).await.unwrap().as_str(),
        "persisted.example.com:1"
    );
}
