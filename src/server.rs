//! HTTP server bootstrap for the provenance service.
//!
//! This module wires together:
//! - configuration
//! - the ledger backend (contract, SQLite or in-memory)
//! - the blob store and connected identity
//! - the notification channel
//! - the Axum router

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::crypto::IdentityCipher;
use crate::domain::Identity;
use crate::identity::{IdentityProvider, StaticIdentity};
use crate::infra::{shutdown_signal, ShutdownCoordinator};
use crate::ledger::{
    ContractLedger, ContractLedgerConfig, LedgerClient, MemoryLedger, SqliteLedger,
};
use crate::metrics::MetricsRegistry;
use crate::notifications::{NotificationChannel, NotificationConfig};
use crate::orchestrator::ProvenanceOrchestrator;
use crate::store::{MemoryBlobStore, PinningConfig, PinningStore, StoreClient};
use crate::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig};

/// Which ledger backend to anchor to.
#[derive(Debug, Clone)]
pub enum LedgerBackendConfig {
    Contract(ContractLedgerConfig),
    Sqlite { url: String },
    Memory,
    None,
}

/// Which blob store to upload to.
#[derive(Debug, Clone)]
pub enum StoreBackendConfig {
    Pinning(PinningConfig),
    Memory,
    None,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub ledger: LedgerBackendConfig,
    pub store: StoreBackendConfig,
    /// Connected identity; falls back to the contract signer
    pub identity_address: Option<String>,
    pub notifications: Option<NotificationConfig>,
    /// PBKDF2 iteration count for new records
    pub kdf_iterations: Option<u32>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let listen_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .with_context(|| format!("Invalid listen address {host}:{port}"))?;

        let ledger = match std::env::var("LEDGER_BACKEND").ok().as_deref() {
            Some("contract") => LedgerBackendConfig::Contract(
                ContractLedgerConfig::from_env()
                    .context("LEDGER_BACKEND=contract requires LEDGER_RPC_URL, LEDGER_CONTRACT_ADDRESS and LEDGER_PRIVATE_KEY")?,
            ),
            Some("sqlite") => LedgerBackendConfig::Sqlite {
                url: sqlite_url_from_env(),
            },
            Some("memory") => LedgerBackendConfig::Memory,
            Some(other) => anyhow::bail!("Unknown LEDGER_BACKEND {other:?}"),
            None => match ContractLedgerConfig::from_env() {
                Some(contract) => LedgerBackendConfig::Contract(contract),
                None if std::env::var("LEDGER_DATABASE_URL").is_ok() => {
                    LedgerBackendConfig::Sqlite {
                        url: sqlite_url_from_env(),
                    }
                }
                None => LedgerBackendConfig::None,
            },
        };

        let store = match std::env::var("STORE_BACKEND").ok().as_deref() {
            Some("memory") => StoreBackendConfig::Memory,
            Some("pinning") | None => match PinningConfig::from_env() {
                Some(pinning) => StoreBackendConfig::Pinning(pinning),
                None => StoreBackendConfig::None,
            },
            Some("none") => StoreBackendConfig::None,
            Some(other) => anyhow::bail!("Unknown STORE_BACKEND {other:?}"),
        };

        let kdf_iterations = match std::env::var("KDF_ITERATIONS") {
            Ok(v) => Some(
                v.parse()
                    .with_context(|| format!("Invalid KDF_ITERATIONS {v:?}"))?,
            ),
            Err(_) => None,
        };

        Ok(Self {
            listen_addr,
            ledger,
            store,
            identity_address: std::env::var("IDENTITY_ADDRESS")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            notifications: NotificationConfig::from_env(),
            kdf_iterations,
        })
    }
}

fn sqlite_url_from_env() -> String {
    std::env::var("LEDGER_DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://provenance-ledger.db?mode=rwc".to_string())
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: ProvenanceOrchestrator,
    pub metrics: Arc<MetricsRegistry>,
    pub notifications: Option<Arc<NotificationChannel>>,
}

impl AppState {
    pub fn new(orchestrator: ProvenanceOrchestrator) -> Self {
        Self {
            orchestrator,
            metrics: Arc::new(MetricsRegistry::new()),
            notifications: None,
        }
    }

    pub fn with_notifications(mut self, channel: Arc<NotificationChannel>) -> Self {
        self.notifications = Some(channel);
        self
    }
}

/// Assemble the orchestrator from configuration.
pub async fn build_orchestrator(config: &Config) -> anyhow::Result<ProvenanceOrchestrator> {
    let mut signer_identity = None;

    let ledger = match &config.ledger {
        LedgerBackendConfig::Contract(contract) => {
            let ledger = ContractLedger::new(contract.clone())?;
            signer_identity = Some(ledger.signer_identity());
            info!(
                chain_id = ledger.chain_id(),
                contract = %contract.contract_address,
                "Contract ledger configured"
            );
            LedgerClient::new(Arc::new(ledger))
        }
        LedgerBackendConfig::Sqlite { url } => {
            let ledger = SqliteLedger::connect(url).await?;
            ledger.initialize().await?;
            info!(url = %url, "SQLite ledger configured");
            LedgerClient::new(Arc::new(ledger))
        }
        LedgerBackendConfig::Memory => {
            warn!("In-memory ledger configured; entries are lost on restart");
            LedgerClient::new(Arc::new(MemoryLedger::new()))
        }
        LedgerBackendConfig::None => {
            warn!("No ledger configured; store and verify requests will fail");
            LedgerClient::unconfigured()
        }
    };

    let store = match &config.store {
        StoreBackendConfig::Pinning(pinning) => {
            info!(api = %pinning.api_url, gateway = %pinning.gateway_url, "Pinning store configured");
            StoreClient::new(Arc::new(PinningStore::new(pinning.clone())))
        }
        StoreBackendConfig::Memory => {
            warn!("In-memory blob store configured; content is lost on restart");
            StoreClient::new(Arc::new(MemoryBlobStore::new()))
        }
        StoreBackendConfig::None => {
            info!("No blob store configured; uploads will be skipped");
            StoreClient::unconfigured()
        }
    };

    let identity: Arc<dyn IdentityProvider> =
        match config.identity_address.clone().map(Identity::new).or(signer_identity) {
            Some(identity) => {
                info!(identity = %identity, "Connected identity");
                Arc::new(StaticIdentity::new(identity))
            }
            None => {
                warn!("No identity connected; set IDENTITY_ADDRESS");
                Arc::new(StaticIdentity::none())
            }
        };

    let cipher = match config.kdf_iterations {
        Some(iterations) => IdentityCipher::with_iterations(iterations)?,
        None => IdentityCipher::new(),
    };

    Ok(ProvenanceOrchestrator::builder()
        .cipher(Arc::new(cipher))
        .store(store)
        .ledger(ledger)
        .identity(identity)
        .build())
}

/// Start the HTTP server.
pub async fn run() -> anyhow::Result<()> {
    init_telemetry(&TelemetryConfig::from_env())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {e}"))?;

    let config = Config::from_env()?;
    let orchestrator = build_orchestrator(&config).await?;
    let coordinator = ShutdownCoordinator::new();

    let mut state = AppState::new(orchestrator);
    if let Some(notifications) = &config.notifications {
        let channel = Arc::new(NotificationChannel::sse(notifications));
        let handle = channel.spawn(coordinator.signal());
        tokio::spawn(async move {
            match handle.await {
                Ok(Ok(())) => info!("Notification channel stopped"),
                Ok(Err(e)) => warn!(error = %e, "Notification channel gave up"),
                Err(e) => warn!(error = %e, "Notification task failed"),
            }
        });
        info!(url = %notifications.url, "Notification channel started");
        state = state.with_notifications(channel);
    }

    let app = build_router()?.with_state(state);

    info!("Starting HTTP server on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            coordinator.shutdown();
        })
        .await?;

    shutdown_telemetry();
    Ok(())
}

/// Router with tracing and optional CORS layers.
pub fn build_router() -> anyhow::Result<Router<AppState>> {
    let mut router = crate::api::router().layer(TraceLayer::new_for_http());

    if let Some(cors_layer) = cors_layer_from_env()? {
        router = router.layer(cors_layer);
    }

    Ok(router)
}

fn cors_layer_from_env() -> anyhow::Result<Option<CorsLayer>> {
    let origins = match std::env::var("CORS_ALLOW_ORIGINS") {
        Ok(v) => v,
        Err(_) => return Ok(None),
    };

    let origins = origins.trim();
    if origins.is_empty() {
        return Ok(None);
    }

    let allow_origin = if origins == "*" {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = origins
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<HeaderValue>()
                    .map_err(|e| anyhow::anyhow!("Invalid CORS origin {s:?}: {e}"))
            })
            .collect::<anyhow::Result<_>>()?;
        AllowOrigin::list(origins)
    };

    Ok(Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([axum::http::header::CONTENT_TYPE]),
    ))
}
