use sha2::{Digest, Sha256};

use squidchat_types::AccountId;

/// Derive a deterministic dev account from a seed name ("alice", "bob", ...).
/// The same seed always yields the same address, across runs and nodes.
pub fn dev_account(seed: &str) -> AccountId {
    let mut hasher = Sha256::new();
    hasher.update(b"squidchat-devnet//");
    hasher.update(seed.as_bytes());
    AccountId(hasher.finalize().into())
}

/// A fresh random account, unrelated to any seed.
pub fn random_account() -> AccountId {
    AccountId(rand::random())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dev_account_is_deterministic() {
        assert_eq!(dev_account("alice"), dev_account("alice"));
        assert_ne!(dev_account("alice"), dev_account("bob"));
    }

    #[test]
    fn test_random_accounts_differ() {
        assert_ne!(random_account(), random_account());
    }
}
