//! Entities the world state commands read and write.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type AccountId = String;
pub type RoleId = String;
pub type DomainId = String;
pub type AssetId = String;
pub type PermissionName = String;

/// Raw public key bytes. Rendered and serialized as lowercase hex.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PublicKey(Vec<u8>);

impl PublicKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn from_hex(text: &str) -> Result<Self, hex::FromHexError> {
        hex::decode(text).map(Self)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self)
    }
}

impl TryFrom<String> for PublicKey {
    type Error = hex::FromHexError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Self::from_hex(&text)
    }
}

impl From<PublicKey> for String {
    fn from(key: PublicKey) -> Self {
        key.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub account_id: AccountId,
    pub domain_id: DomainId,
    pub quorum: u32,
    /// `{creator account id: {key: value}}`
    pub json_data: serde_json::Value,
}

impl Account {
    pub fn new(account_id: &str, domain_id: &str, quorum: u32) -> Self {
        Self {
            account_id: account_id.to_string(),
            domain_id: domain_id.to_string(),
            quorum,
            json_data: serde_json::Value::Object(Default::default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub asset_id: AssetId,
    pub domain_id: DomainId,
    pub precision: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountAsset {
    pub account_id: AccountId,
    pub asset_id: AssetId,
    pub balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub address: String,
    pub public_key: PublicKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub domain_id: DomainId,
    pub default_role: RoleId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_key_hex() {
        let key = PublicKey::new(vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(key.to_string(), "deadbeef");
        assert_eq!(PublicKey::from_hex("DEADBEEF").unwrap(), key);
        assert!(PublicKey::from_hex("xyz").is_err());
    }

    #[test]
    fn test_public_key_serializes_as_hex_string() {
        let peer = Peer {
            address: "10.0.0.1:10001".to_string(),
            public_key: PublicKey::new(vec![1, 2]),
        };
        let json = serde_json::to_value(&peer).unwrap();
        assert_eq!(json["public_key"], "0102");
        assert_eq!(serde_json::from_value::<Peer>(json).unwrap(), peer);
    }
}
