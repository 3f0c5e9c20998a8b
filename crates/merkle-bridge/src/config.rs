//! Bridge client configuration from TOML.

use std::path::Path;

use alloy::primitives::{Address, address};
use serde::{Deserialize, Serialize};

use crate::{
    address::AergoAddress,
    error::{BridgeError, Result},
    layout::StorageLayout,
};

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub ethereum: EthereumConfig,

    pub aergo: AergoConfig,

    /// Bridge contract storage layout (defaults to the deployed v1 contracts)
    #[serde(default)]
    pub layout: StorageLayout,
}

/// Ethereum side
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EthereumConfig {
    /// JSON-RPC URL
    pub rpc_url: String,

    /// EthMerkleBridge contract address
    pub bridge_address: Address,

    /// ERC20 contract of the native Aergo token, frozen/unfrozen rather than minted
    pub aergo_erc20: Address,

    /// Gas limit for bridge transactions sent directly
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
}

/// Aergo side
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AergoConfig {
    /// JSON-RPC gateway URL
    pub rpc_url: String,

    /// Aergo bridge contract address
    pub bridge_address: AergoAddress,
}

fn default_gas_limit() -> u64 {
    crate::transfer::DEFAULT_GAS_LIMIT
}

impl BridgeConfig {
    /// Load and validate configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| BridgeError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ethereum.rpc_url.is_empty() {
            return Err(BridgeError::Config("ethereum.rpc_url is empty".to_string()));
        }
        if self.aergo.rpc_url.is_empty() {
            return Err(BridgeError::Config("aergo.rpc_url is empty".to_string()));
        }
        if self.ethereum.gas_limit == 0 {
            return Err(BridgeError::Config("ethereum.gas_limit must be positive".to_string()));
        }
        self.layout.validate()
    }

    /// Configuration for local devnets
    pub fn default_test_config() -> Result<Self> {
        Ok(Self {
            ethereum: EthereumConfig {
                rpc_url: "http://localhost:8545".to_string(),
                bridge_address: address!("0x89eD1D1C145F6bF3A7e62d2B8eB0e1Bf15Cb2374"),
                aergo_erc20: address!("0xd898383A12CDE0eDF7642F7dD4D7006FdE5c433e"),
                gas_limit: default_gas_limit(),
            },
            aergo: AergoConfig {
                rpc_url: "http://127.0.0.1:7845".to_string(),
                bridge_address: "AmgQqVWX3JADRBEVkVCM4CyWdoeXuumeYGGJJxEeoAukRC26hxmw".parse()?,
            },
            layout: StorageLayout::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CONFIG: &str = r#"
[ethereum]
rpc_url = "http://localhost:8545"
bridge_address = "0x89eD1D1C145F6bF3A7e62d2B8eB0e1Bf15Cb2374"
aergo_erc20 = "0xd898383A12CDE0eDF7642F7dD4D7006FdE5c433e"

[aergo]
rpc_url = "http://localhost:7845"
bridge_address = "AmgQqVWX3JADRBEVkVCM4CyWdoeXuumeYGGJJxEeoAukRC26hxmw"
"#;

    #[test]
    fn test_parse_config() {
        let config: BridgeConfig = toml::from_str(CONFIG).unwrap();
        assert_eq!(config.ethereum.gas_limit, crate::transfer::DEFAULT_GAS_LIMIT);
        assert_eq!(config.layout, StorageLayout::default());
        assert_eq!(
            config.aergo.bridge_address.as_str(),
            "AmgQqVWX3JADRBEVkVCM4CyWdoeXuumeYGGJJxEeoAukRC26hxmw"
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_config_with_layout() {
        let toml = format!(
            r#"{CONFIG}
[layout]
version = 2
code_hash = "0x1111111111111111111111111111111111111111111111111111111111111111"

[layout.ethereum]
unlocks = 8

[layout.aergo]
burns = "_sv__burnt-"
"#
        );
        let config: BridgeConfig = toml::from_str(&toml).unwrap();
        assert_eq!(config.layout.version, 2);
        assert!(config.layout.code_hash.is_some());
        assert_eq!(config.layout.ethereum.unlocks, 8);
        assert_eq!(config.layout.ethereum.locks, 3);
        assert_eq!(config.layout.aergo.burns, "_sv__burnt-");
        assert_eq!(config.layout.aergo.unfreezes, "_sv__unfreezes-");
    }

    #[test]
    fn test_reject_bad_aergo_address() {
        let toml = CONFIG.replace("hxmw", "hxmx");
        assert!(toml::from_str::<BridgeConfig>(&toml).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();
        let config = BridgeConfig::load(file.path()).unwrap();
        assert_eq!(config.ethereum.rpc_url, "http://localhost:8545");

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        bad.write_all(CONFIG.replace("[aergo]", "[aergo]\ngas = [").as_bytes())
            .unwrap();
        assert!(matches!(BridgeConfig::load(bad.path()), Err(BridgeError::Config(_))));

        assert!(matches!(
            BridgeConfig::load("/nonexistent/bridge.toml"),
            Err(BridgeError::Io(_))
        ));
    }

    #[test]
    fn test_load_rejects_invalid_layout() {
        let toml = format!("{CONFIG}\n[layout.ethereum]\nlocks = 6\n");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(toml.as_bytes()).unwrap();
        assert!(matches!(BridgeConfig::load(file.path()), Err(BridgeError::Config(_))));
    }

    #[test]
    fn test_default_test_config() {
        let config = BridgeConfig::default_test_config().unwrap();
        config.validate().unwrap();
        assert_eq!(config.ethereum.gas_limit, crate::transfer::DEFAULT_GAS_LIMIT);
    }
}
