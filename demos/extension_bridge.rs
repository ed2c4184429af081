//! End-to-end bridge demo: an in-memory data source standing in for the
//! chain indexer, a store, a dispatcher, and a bridge answering the full set
//! of request kinds.
//!
//! Run with `RUST_LOG=walletsync=debug` to watch the fetch lifecycle.

use std::sync::Arc;
use std::time::Duration;

use walletsync::bridge::{Bridge, BridgeRequest};
use walletsync::fetch::{DataSource, Dispatcher, FetchError, FetchFuture};
use walletsync::store::Store;
use walletsync::wallet::{AddressKind, Balance, NetworkId, OwnedAsset, WalletAddress};

/// Fake indexer with a couple of hardcoded accounts and a small artificial
/// latency so the fetch/wait machinery actually suspends.
struct DemoIndexer;

const PLATFORM_ADDRESS: &str = "cccq9h7vnl68frvqapz5wdcqpmx0naww6ryxqpzy2lr";
const ASSET_ADDRESS: &str = "ccaq9h7vnl68frvqapz5wdcqpmx0naww6ryxqtjc60k";

impl DataSource for DemoIndexer {
    fn platform_addresses(&self) -> FetchFuture<Vec<WalletAddress>> {
        Box::pin(async {
            tokio::time::sleep(Duration::from_millis(150)).await;
            Ok(vec![WalletAddress {
                name: "spending".to_owned(),
                kind: AddressKind::Platform,
                address: PLATFORM_ADDRESS.to_owned(),
            }])
        })
    }

    fn asset_addresses(&self) -> FetchFuture<Vec<WalletAddress>> {
        Box::pin(async {
            tokio::time::sleep(Duration::from_millis(150)).await;
            Ok(vec![WalletAddress {
                name: "collectibles".to_owned(),
                kind: AddressKind::Asset,
                address: ASSET_ADDRESS.to_owned(),
            }])
        })
    }

    fn available_balance(&self, address: &str) -> FetchFuture<Balance> {
        let known = address == PLATFORM_ADDRESS;
        let address = address.to_owned();
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(80)).await;
            if known {
                Ok(Balance { quark: 1_000_000 })
            } else {
                Err(FetchError::UnknownAddress(address))
            }
        })
    }

    fn available_assets(&self, _address: &str) -> FetchFuture<Vec<OwnedAsset>> {
        Box::pin(async {
            tokio::time::sleep(Duration::from_millis(80)).await;
            Ok(vec![OwnedAsset {
                asset_type: "0x416c69656e2047656d".to_owned(),
                quantity: 3,
            }])
        })
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "walletsync=info".into()),
        )
        .init();

    let store = Arc::new(Store::new(NetworkId::from("tc")));
    let dispatcher = Dispatcher::new(Arc::clone(&store), Arc::new(DemoIndexer));
    let bridge = Bridge::new(Arc::clone(&store), dispatcher);

    // Before unlocking, wallet reads are refused.
    show(&bridge, BridgeRequest::new("is-authenticated")).await;
    show(
        &bridge,
        BridgeRequest::new("get-available-balance").param("address", PLATFORM_ADDRESS),
    )
    .await;

    // Simulate the user unlocking the wallet.
    store.set_keystore_present(true);
    store.set_passphrase_present(true);

    show(&bridge, BridgeRequest::new("get-network-id")).await;
    show(&bridge, BridgeRequest::new("get-platform-addresses")).await;
    show(
        &bridge,
        BridgeRequest::new("get-available-balance").param("address", PLATFORM_ADDRESS),
    )
    .await;
    // Served from the cache: inside the balance freshness window.
    show(
        &bridge,
        BridgeRequest::new("get-available-balance").param("address", PLATFORM_ADDRESS),
    )
    .await;
    show(
        &bridge,
        BridgeRequest::new("get-available-assets").param("address", ASSET_ADDRESS),
    )
    .await;
    // An address the indexer does not know: the upstream error comes back
    // in the envelope instead of a timeout.
    show(
        &bridge,
        BridgeRequest::new("get-available-balance").param("address", "cccq9unknown"),
    )
    .await;
    // Malformed and unknown requests.
    show(&bridge, BridgeRequest::new("get-available-balance")).await;
    show(&bridge, BridgeRequest::new("get-parcel-history")).await;
}

async fn show(bridge: &Bridge, request: BridgeRequest) {
    let kind = request.kind.clone();
    match bridge.handle(request).await {
        Some(reply) => {
            let json = serde_json::to_string(&reply).unwrap_or_default();
            println!("{kind:>24} -> {json}");
        }
        None => println!("{kind:>24} -> (dropped)"),
    }
}
