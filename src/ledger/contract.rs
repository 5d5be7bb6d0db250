//! On-chain ledger backend
//!
//! Anchors entries in an `IAuditLedger` contract. The contract records
//! `msg.sender` as the creator, so the signer's address is the only identity
//! this backend can anchor for.

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, FixedBytes};
use alloy::providers::ProviderBuilder;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use async_trait::async_trait;
use tracing::info;

use super::{LedgerBackend, LedgerError, LedgerWriteError};
use crate::domain::{Digest, Identity, LedgerEntry, RecordId, StorageLink};

// Generate contract bindings
sol! {
    #[sol(rpc)]
    interface IAuditLedger {
        struct AuditEntry {
            string recordId;
            address creator;
            uint64 timestampSeconds;
            bytes32 digest;
            string storageLink;
        }

        function storeAudit(
            string recordId,
            uint64 timestampSeconds,
            bytes32 digest,
            string storageLink
        ) external;

        function auditCount() external view returns (uint64);

        function getAudits(uint64 offset, uint64 limit) external view returns (AuditEntry[] memory);

        function getAudit(string recordId) external view returns (AuditEntry memory entry, bool found);
    }
}

/// Contract ledger configuration
#[derive(Debug, Clone)]
pub struct ContractLedgerConfig {
    /// JSON-RPC URL of the chain
    pub rpc_url: String,
    /// IAuditLedger contract address
    pub contract_address: Address,
    /// Private key for signing transactions
    pub private_key: String,
    /// Chain ID
    pub chain_id: u64,
}

impl ContractLedgerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Option<Self> {
        let rpc_url = std::env::var("LEDGER_RPC_URL").ok()?;
        let contract_address = std::env::var("LEDGER_CONTRACT_ADDRESS")
            .ok()
            .and_then(|s| s.parse().ok())?;
        let private_key = std::env::var("LEDGER_PRIVATE_KEY").ok()?;
        let chain_id = std::env::var("LEDGER_CHAIN_ID")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(11155111);

        Some(Self {
            rpc_url,
            contract_address,
            private_key,
            chain_id,
        })
    }
}

/// Ledger backed by an `IAuditLedger` contract
pub struct ContractLedger {
    config: ContractLedgerConfig,
    signer: PrivateKeySigner,
}

impl std::fmt::Debug for ContractLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractLedger")
            .field("rpc_url", &self.config.rpc_url)
            .field("contract_address", &self.config.contract_address)
            .field("chain_id", &self.config.chain_id)
            .field("signer", &self.signer.address())
            .finish()
    }
}

/// Identity string for an address (lowercase `0x` hex)
pub fn address_identity(address: &Address) -> Identity {
    Identity::new(address.to_string().to_lowercase())
}

impl ContractLedger {
    /// Create a contract ledger, validating the signing key
    pub fn new(config: ContractLedgerConfig) -> Result<Self, LedgerError> {
        let signer: PrivateKeySigner = config
            .private_key
            .parse()
            .map_err(|e| LedgerError::Configuration(format!("Invalid private key: {}", e)))?;
        Ok(Self { config, signer })
    }

    pub fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    /// Identity of the transaction signer; the creator of every appended entry
    pub fn signer_identity(&self) -> Identity {
        address_identity(&self.signer.address())
    }

    fn rpc_url<T: std::str::FromStr>(&self) -> Result<T, LedgerError>
    where
        T::Err: std::fmt::Display,
    {
        self.config
            .rpc_url
            .parse()
            .map_err(|e| LedgerError::Configuration(format!("Invalid RPC URL: {}", e)))
    }

    /// Number of entries the contract holds
    pub async fn count(&self) -> Result<u64, LedgerError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url()?);
        let contract = IAuditLedger::new(self.config.contract_address, &provider);
        let result = contract
            .auditCount()
            .call()
            .await
            .map_err(|e| LedgerError::Read(format!("Contract call failed: {}", e)))?;
        Ok(result._0)
    }

    fn to_entry(raw: IAuditLedger::AuditEntry) -> LedgerEntry {
        LedgerEntry {
            record_id: RecordId::new(raw.recordId),
            creator_identity: address_identity(&raw.creator),
            timestamp_seconds: raw.timestampSeconds,
            digest: Digest::from_bytes(raw.digest.0),
            storage_link: StorageLink::new(raw.storageLink),
        }
    }
}

#[async_trait]
impl LedgerBackend for ContractLedger {
    async fn append(&self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        let signer_identity = self.signer_identity();
        if !entry.creator_identity.matches(&signer_identity) {
            return Err(LedgerWriteError::Unauthorized {
                creator: entry.creator_identity.to_string(),
                signer: signer_identity.to_string(),
            }
            .into());
        }

        if self.find(&entry.record_id).await?.is_some() {
            return Err(LedgerWriteError::Duplicate(entry.record_id.clone()).into());
        }

        info!(
            "Anchoring record {} to chain {} (digest {})",
            entry.record_id, self.config.chain_id, entry.digest
        );

        // Create provider with signer and recommended fillers
        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(EthereumWallet::from(self.signer.clone()))
            .on_http(
                self.rpc_url()
                    .map_err(|e| LedgerWriteError::Transport(e.to_string()))?,
            );

        let contract = IAuditLedger::new(self.config.contract_address, &provider);

        let tx = contract.storeAudit(
            entry.record_id.as_str().to_string(),
            entry.timestamp_seconds,
            FixedBytes::from(*entry.digest.as_bytes()),
            entry.storage_link.as_str().to_string(),
        );

        let pending = tx.send().await.map_err(|e| {
            let message = e.to_string();
            if message.contains("revert") {
                LedgerWriteError::Rejected(message)
            } else {
                LedgerWriteError::Transport(message)
            }
        })?;

        info!("Transaction sent: {:?}", pending.tx_hash());

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| LedgerWriteError::Transport(format!("Failed to get receipt: {}", e)))?;

        if !receipt.status() {
            return Err(LedgerWriteError::Rejected(format!(
                "transaction {} reverted",
                receipt.transaction_hash
            ))
            .into());
        }

        info!(
            "Record {} anchored in tx {} (block {})",
            entry.record_id,
            receipt.transaction_hash,
            receipt.block_number.unwrap_or(0)
        );

        Ok(())
    }

    async fn fetch_page(&self, offset: u64, limit: u64) -> Result<Vec<LedgerEntry>, LedgerError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url()?);
        let contract = IAuditLedger::new(self.config.contract_address, &provider);
        let result = contract
            .getAudits(offset, limit)
            .call()
            .await
            .map_err(|e| LedgerError::Read(format!("Contract call failed: {}", e)))?;

        Ok(result._0.into_iter().map(Self::to_entry).collect())
    }

    async fn find(&self, record_id: &RecordId) -> Result<Option<LedgerEntry>, LedgerError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url()?);
        let contract = IAuditLedger::new(self.config.contract_address, &provider);
        let result = contract
            .getAudit(record_id.as_str().to_string())
            .call()
            .await
            .map_err(|e| LedgerError::Read(format!("Contract call failed: {}", e)))?;

        Ok(result.found.then(|| Self::to_entry(result.entry)))
    }

    fn name(&self) -> &'static str {
        "contract"
    }
}
