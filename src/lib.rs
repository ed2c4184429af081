//! # walletsync
//!
//! Store-mediated async state synchronization for a browser-wallet extension
//! bridge.
//!
//! The crate has four layers, leaves first:
//!
//! - [`wallet`] — domain types: addresses, balances, assets, network id.
//! - [`store`] — a process-wide keyed cache of [`store::CacheEntry`] records
//!   with change notification, plus the freshness policy that decides when a
//!   cached record warrants a refetch.
//! - [`fetch`] — the [`fetch::DataSource`] seam to the external indexer and
//!   the [`fetch::Dispatcher`] that loads resources into the store.
//! - [`bridge`] — translates page-script requests into store-mediated
//!   fetch + wait + reply, with a flat success/failure envelope.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use walletsync::bridge::{Bridge, BridgeRequest};
//! use walletsync::fetch::{DataSource, Dispatcher, FetchFuture};
//! use walletsync::store::Store;
//! use walletsync::wallet::{Balance, NetworkId, OwnedAsset, WalletAddress};
//!
//! struct Indexer;
//!
//! impl DataSource for Indexer {
//!     fn platform_addresses(&self) -> FetchFuture<Vec<WalletAddress>> {
//!         Box::pin(async { Ok(vec![]) })
//!     }
//!     fn asset_addresses(&self) -> FetchFuture<Vec<WalletAddress>> {
//!         Box::pin(async { Ok(vec![]) })
//!     }
//!     fn available_balance(&self, _address: &str) -> FetchFuture<Balance> {
//!         Box::pin(async { Ok(Balance { quark: 0 }) })
//!     }
//!     fn available_assets(&self, _address: &str) -> FetchFuture<Vec<OwnedAsset>> {
//!         Box::pin(async { Ok(vec![]) })
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(Store::new(NetworkId::from("tc")));
//!     let dispatcher = Dispatcher::new(Arc::clone(&store), Arc::new(Indexer));
//!     let bridge = Bridge::new(Arc::clone(&store), dispatcher);
//!
//!     let reply = bridge.handle(BridgeRequest::new("get-network-id")).await;
//!     println!("{reply:?}");
//! }
//! ```

pub mod bridge;
pub mod fetch;
pub mod store;
pub mod wallet;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use bridge::{Bridge, BridgeConfig, BridgeRequest, Envelope, UnknownKindPolicy};
pub use fetch::{DataSource, Dispatcher, FetchError, FetchFuture};
pub use store::{CacheEntry, ResourceKey, Store, WaitError};
pub use wallet::{Balance, NetworkId, OwnedAsset, Resource, WalletAddress};
