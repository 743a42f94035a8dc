use serde::{Deserialize, Serialize};

/// Messages fetched per feed window.
pub const MESSAGES_PER_PAGE: u32 = 15;
/// Channels shown per directory page.
pub const DIRECTORY_PER_PAGE: u32 = 5;
/// Pending requests shown per owner-panel page.
pub const REQUESTS_PER_PAGE: u32 = 5;

/// Networks the contract is deployed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkId {
    Development,
    PopTestnet,
    AlephZeroTestnet,
}

/// A known contract deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractDeployment {
    pub network: NetworkId,
    pub address: &'static str,
}

pub const DEPLOYMENTS: &[ContractDeployment] = &[
    ContractDeployment {
        network: NetworkId::Development,
        address: "5Euwy4dtPtgq3XkqSYT5Z3SyCiJPKsApCcUfsHyaN8CZWH4E",
    },
    ContractDeployment {
        network: NetworkId::PopTestnet,
        address: "13uEYiYAnCKDp7S1A99Gc1iaipXAB6D3rzdn7gwQ5fCJenfc",
    },
    ContractDeployment {
        network: NetworkId::AlephZeroTestnet,
        address: "5HFkbGoUUVLfgFRq5zZMJdPb8cF78GL3qP5vGXGHqLc9keoQ",
    },
];

/// Deployment record for a network, if the contract is deployed there.
pub fn deployment(network: NetworkId) -> Option<&'static ContractDeployment> {
    DEPLOYMENTS.iter().find(|d| d.network == network)
}

/// Page sizes per view surface plus the target network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub network: NetworkId,
    pub messages_per_page: u32,
    pub directory_per_page: u32,
    pub requests_per_page: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            network: NetworkId::Development,
            messages_per_page: MESSAGES_PER_PAGE,
            directory_per_page: DIRECTORY_PER_PAGE,
            requests_per_page: REQUESTS_PER_PAGE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_view_surfaces() {
        let config = ClientConfig::default();
        assert_eq!(config.messages_per_page, 15);
        assert_eq!(config.directory_per_page, 5);
        assert_eq!(config.requests_per_page, 5);
    }

    #[test]
    fn test_every_network_has_a_deployment() {
        for network in [
            NetworkId::Development,
            NetworkId::PopTestnet,
            NetworkId::AlephZeroTestnet,
        ] {
            assert!(deployment(network).is_some());
        }
    }
}
