//! Connected identity (wallet account) capability
//!
//! Flows bind the identity that is current when they start and watch
//! [`IdentityProvider::changes`] to notice an account switch.

use tokio::sync::watch;
use tracing::info;

use crate::domain::Identity;

/// Source of the connected identity
pub trait IdentityProvider: Send + Sync {
    /// Currently connected identity, if any
    fn current(&self) -> Option<Identity>;

    /// Account-change notifications
    fn changes(&self) -> watch::Receiver<Option<Identity>>;
}

/// Identity that never changes
#[derive(Debug)]
pub struct StaticIdentity {
    tx: watch::Sender<Option<Identity>>,
}

impl StaticIdentity {
    pub fn new(identity: impl Into<Identity>) -> Self {
        let (tx, _) = watch::channel(Some(identity.into()));
        Self { tx }
    }

    /// No identity connected
    pub fn none() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Load `IDENTITY_ADDRESS` from the environment
    pub fn from_env() -> Option<Self> {
        std::env::var("IDENTITY_ADDRESS")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(Self::new)
    }
}

impl IdentityProvider for StaticIdentity {
    fn current(&self) -> Option<Identity> {
        self.tx.borrow().clone()
    }

    fn changes(&self) -> watch::Receiver<Option<Identity>> {
        self.tx.subscribe()
    }
}

/// Identity that can be switched or disconnected at runtime
#[derive(Debug)]
pub struct SwitchableIdentity {
    tx: watch::Sender<Option<Identity>>,
}

impl SwitchableIdentity {
    pub fn new(initial: Option<Identity>) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// Switch to another account and notify watchers
    pub fn switch_to(&self, identity: impl Into<Identity>) {
        let identity = identity.into();
        info!(identity = %identity, "Identity switched");
        self.tx.send_replace(Some(identity));
    }

    /// Disconnect the current account and notify watchers
    pub fn disconnect(&self) {
        info!("Identity disconnected");
        self.tx.send_replace(None);
    }
}

impl IdentityProvider for SwitchableIdentity {
    fn current(&self) -> Option<Identity> {
        self.tx.borrow().clone()
    }

    fn changes(&self) -> watch::Receiver<Option<Identity>> {
        self.tx.subscribe()
    }
}
