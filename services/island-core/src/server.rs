use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;

use island_chain::{ChainClient, ContentStore, JsonRpcChainClient, MemoryContentStore};
use island_core_types::MissionCatalog;
use island_storage::{DocumentStore, MemoryStore};

use crate::config::Config;
use crate::service::IslandService;

pub struct IslandServer {
    service: IslandService,
}

impl IslandServer {
    pub async fn new(config: Config) -> Result<Self> {
        // Initialize storage based on config
        let store: Arc<dyn DocumentStore> = match config.storage.storage_type.as_str() {
            "memory" => Arc::new(MemoryStore::new()),
            other => {
                anyhow::bail!("Unsupported storage type: {}", other);
            }
        };

        let chain: Arc<dyn ChainClient> =
            Arc::new(JsonRpcChainClient::new(&config.chain.rpc_endpoint)?);

        let content: Arc<dyn ContentStore> = match config.content_store.store_type.as_str() {
            "memory" => Arc::new(MemoryContentStore::new(
                config.content_store.gateway_base.clone(),
            )),
            other => {
                anyhow::bail!("Unsupported content store type: {}", other);
            }
        };

        let raw_catalog = std::fs::read_to_string(&config.missions.catalog_path)
            .with_context(|| {
                format!("reading mission catalog {}", config.missions.catalog_path)
            })?;
        let catalog = Arc::new(
            MissionCatalog::from_json_str(&raw_catalog)
                .with_context(|| format!("parsing {}", config.missions.catalog_path))?,
        );

        let service = IslandService::new(store, chain, content, catalog, config);

        Ok(Self { service })
    }

    pub async fn start_json_rpc_server(
        &self,
        addr: SocketAddr,
    ) -> Result<impl std::future::Future<Output = ()>> {
        use crate::json_rpc::JsonRpcServerImpl;

        let server_impl = JsonRpcServerImpl::new(self.service.clone());
        let server = server_impl.start(addr).await?;

        Ok(async move { server.await })
    }
}
