//! JSON-RPC chain client.
//!
//! Speaks the node's `chain_*` method family over HTTP. Wei values travel as
//! decimal strings to stay within JSON number limits.

use async_trait::async_trait;
use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ChainClient, ChainError, GasParams, SendOptions, TxRecord, TxSubmission};

pub struct JsonRpcChainClient {
    client: HttpClient,
}

#[derive(Debug, Deserialize)]
struct RawTx {
    hash: String,
    from: String,
    to: String,
    #[serde(rename = "valueWei")]
    value_wei: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueTransferRequest<'a> {
    from: &'a str,
    to: &'a str,
    value_wei: String,
    gas: u64,
    gas_price_gwei: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContractCallRequest<'a> {
    contract: &'a str,
    method: &'a str,
    args: &'a [Value],
    from: &'a str,
    gas: u64,
    gas_price_gwei: u64,
}

impl JsonRpcChainClient {
    pub fn new(endpoint: &str) -> Result<Self, ChainError> {
        let client = HttpClientBuilder::default()
            .build(endpoint)
            .map_err(|e| ChainError::Rpc(e.to_string()))?;
        Ok(JsonRpcChainClient { client })
    }
}

#[async_trait]
impl ChainClient for JsonRpcChainClient {
    async fn get_transaction(&self, hash: &str) -> Result<Option<TxRecord>, ChainError> {
        let raw: Option<RawTx> = self
            .client
            .request("chain_getTransaction", rpc_params![hash])
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;

        raw.map(|tx| {
            let value_wei = tx
                .value_wei
                .parse::<u128>()
                .map_err(|_| ChainError::Decode(format!("bad wei value: {}", tx.value_wei)))?;
            Ok(TxRecord {
                hash: tx.hash,
                from: tx.from,
                to: tx.to,
                value_wei,
            })
        })
        .transpose()
    }

    async fn get_code(&self, address: &str) -> Result<String, ChainError> {
        self.client
            .request("chain_getCode", rpc_params![address])
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))
    }

    async fn send_value_transfer(
        &self,
        from: &str,
        to: &str,
        value_wei: u128,
        gas: GasParams,
    ) -> Result<TxSubmission, ChainError> {
        let request = ValueTransferRequest {
            from,
            to,
            value_wei: value_wei.to_string(),
            gas: gas.gas,
            gas_price_gwei: gas.gas_price_gwei,
        };
        let tx_hash: String = self
            .client
            .request("chain_sendValueTransfer", rpc_params![request])
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;
        Ok(TxSubmission { tx_hash })
    }

    async fn call_contract_method(
        &self,
        contract: &str,
        method: &str,
        args: Vec<Value>,
        opts: SendOptions,
    ) -> Result<TxSubmission, ChainError> {
        let request = ContractCallRequest {
            contract,
            method,
            args: &args,
            from: &opts.from,
            gas: opts.gas,
            gas_price_gwei: opts.gas_price_gwei,
        };
        let tx_hash: String = self
            .client
            .request("chain_callContractMethod", rpc_params![request])
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;
        Ok(TxSubmission { tx_hash })
    }

    async fn recover_signer(&self, message: &str, signature: &str) -> Result<String, ChainError> {
        self.client
            .request("chain_recoverSigner", rpc_params![message, signature])
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))
    }
}
