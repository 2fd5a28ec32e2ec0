use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub chain: ChainConfig,
    pub content_store: ContentStoreConfig,
    pub platform: PlatformConfig,
    pub allocator: AllocatorConfig,
    pub wallet_flow: WalletFlowConfig,
    pub missions: MissionsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Maximum concurrent connections
    pub max_connections: u32,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
    /// Enable CORS for web clients
    pub enable_cors: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage type: "memory" (durable backends reserved)
    pub storage_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Chain node JSON-RPC endpoint
    pub rpc_endpoint: String,
    /// Custodial account that funds reward transfers and mints
    pub custodial_address: String,
    /// Custodial account private key. Never logged, never sent to clients.
    pub custodial_private_key: String,
    /// Gas price for all submissions, in gwei
    pub gas_price_gwei: u64,
    /// Gas limit for a plain value transfer
    pub transfer_gas: u64,
    /// Gas limit for an NFT mint call
    pub mint_gas: u64,
    /// Deployed NFT contract address
    pub nft_contract_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentStoreConfig {
    /// Content store type: "memory" (pinning backends reserved)
    pub store_type: String,
    /// Gateway base URL for resolving content URIs
    pub gateway_base: String,
    /// Pinning service credentials, unused by the memory store
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Bot secret used to verify signed login payloads
    pub bot_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocatorConfig {
    /// Fall back to wall-clock seconds when token-id allocation keeps
    /// failing. Collision-prone; off by default.
    pub clock_fallback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletFlowConfig {
    /// How long an initiated wallet flow stays pending before it counts as
    /// declined / not installed
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionsConfig {
    /// Path to the authored mission catalog (JSON)
    pub catalog_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                max_connections: 1000,
                request_timeout_secs: 30,
                enable_cors: true,
            },
            storage: StorageConfig {
                storage_type: "memory".to_string(),
            },
            chain: ChainConfig {
                rpc_endpoint: "http://127.0.0.1:8545".to_string(),
                custodial_address: String::new(),
                custodial_private_key: String::new(),
                gas_price_gwei: 10,
                transfer_gas: 21_000,
                mint_gas: 500_000,
                nft_contract_address: String::new(),
            },
            content_store: ContentStoreConfig {
                store_type: "memory".to_string(),
                gateway_base: "https://gateway.ipfs.io/ipfs".to_string(),
                api_key: None,
                api_secret: None,
            },
            platform: PlatformConfig {
                bot_secret: String::new(),
            },
            allocator: AllocatorConfig {
                clock_fallback: false,
            },
            wallet_flow: WalletFlowConfig { timeout_ms: 1500 },
            missions: MissionsConfig {
                catalog_path: "missions.json".to_string(),
            },
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            // Create default config file
            let config = Config::default();
            let content = toml::to_string_pretty(&config)?;
            std::fs::write(path, content)?;
            Ok(config)
        }
    }

    #[allow(dead_code)]
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
