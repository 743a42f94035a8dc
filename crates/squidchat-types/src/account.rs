use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Free balance of an account, in the chain's smallest unit.
pub type Balance = u128;

/// Opaque 32-byte on-chain account identifier.
///
/// Serialized as a lowercase hex string; `short()` gives the abbreviated
/// form used in logs and user-facing listings.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountId(pub [u8; 32]);

impl AccountId {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Abbreviated display form: first six and last four hex characters.
    pub fn short(&self) -> String {
        let full = hex::encode(self.0);
        format!("{}..{}", &full[..6], &full[full.len() - 4..])
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self.short())
    }
}

impl From<[u8; 32]> for AccountId {
    fn from(bytes: [u8; 32]) -> Self {
        AccountId(bytes)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid account id: {0}")]
pub struct ParseAccountError(String);

impl FromStr for AccountId {
    type Err = ParseAccountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| ParseAccountError(e.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| ParseAccountError("expected 32 bytes".into()))?;
        Ok(AccountId(bytes))
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AccountId {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xab;
        bytes[31] = 0xcd;
        AccountId(bytes)
    }

    #[test]
    fn test_hex_round_trip() {
        let id = sample();
        let encoded = id.to_string();
        assert_eq!(encoded.len(), 64);
        assert_eq!(encoded.parse::<AccountId>().unwrap(), id);
    }

    #[test]
    fn test_short_form() {
        let id = sample();
        assert_eq!(id.short(), "ab0000..00cd");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!("zz".parse::<AccountId>().is_err());
        assert!("abcd".parse::<AccountId>().is_err()); // too short
    }

    #[test]
    fn test_serde_as_hex_string() {
        let id = sample();
        let json = serde_json::to_string(&id).unwrap();
        assert!(json.starts_with("\"ab00"));
        let back: AccountId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
