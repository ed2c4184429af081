//! Wallet domain types shared by the store, the fetch dispatcher, and the
//! bridge.
//!
//! These are plain data carriers: the store caches them, the dispatcher
//! fetches them, and the bridge serializes them into reply envelopes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of the chain network the wallet is connected to.
///
/// # Examples
///
/// ```
/// use walletsync::wallet::NetworkId;
///
/// let id = NetworkId::from("tc");
/// assert_eq!(id.as_str(), "tc");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkId(String);

impl NetworkId {
    /// Returns the network id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NetworkId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for NetworkId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The two key derivation families a wallet manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressKind {
    /// Holds the platform currency and pays transaction fees.
    Platform,
    /// Holds minted assets.
    Asset,
}

/// A named address managed by the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletAddress {
    pub name: String,
    pub kind: AddressKind,
    pub address: String,
}

/// Spendable balance of a platform address, in the smallest unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub quark: u64,
}

/// Aggregated holdings of a single asset type at an asset address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedAsset {
    pub asset_type: String,
    pub quantity: u64,
}

/// The payload shapes the store can hold for a resource key.
///
/// Serialized untagged so a reply envelope carries the flat payload rather
/// than a variant wrapper.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Resource {
    Addresses(Vec<WalletAddress>),
    Balance(Balance),
    Assets(Vec<OwnedAsset>),
}
