use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Credential-selection capabilities offered by an embedding host.
///
/// Both operations are optional. The default bodies report the capability
/// as absent, so a host may implement either one, both, or neither.
#[async_trait]
pub trait KeySelectionHost: Send + Sync {
    /// Whether the user currently has a billing-capable key selected.
    /// `None` means the host cannot answer.
    async fn has_selected_key(&self) -> Option<bool> {
        None
    }

    /// Open the host's interactive key picker and wait for the user to close it.
    /// Completion says nothing about whether a key was actually chosen.
    async fn open_key_selection(&self) -> Result<(), GateError> {
        Err(GateError::SelectionUnavailable)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("Interactive key selection is not available in this environment")]
    SelectionUnavailable,

    #[error("Key selection failed: {0}")]
    Host(String),
}

/// Decides whether video generation may be attempted.
pub struct KeyGate {
    host: Option<Arc<dyn KeySelectionHost>>,
    local_key_configured: bool,
    selected: AtomicBool,
}

impl KeyGate {
    pub fn new(host: Option<Arc<dyn KeySelectionHost>>, local_key: Option<&str>) -> Self {
        let local_key_configured = local_key.map(|k| !k.trim().is_empty()).unwrap_or(false);
        Self {
            host,
            local_key_configured,
            selected: AtomicBool::new(false),
        }
    }

    /// Gate with no host, backed only by the locally configured key.
    pub fn local(local_key: Option<&str>) -> Self {
        Self::new(None, local_key)
    }

    /// Ask the host (or fall back to local configuration) and cache the answer.
    pub async fn has_usable_credential(&self) -> bool {
        let usable = match &self.host {
            Some(host) => match host.has_selected_key().await {
                Some(selected) => selected,
                None => self.local_key_configured,
            },
            None => self.local_key_configured,
        };
        self.selected.store(usable, Ordering::SeqCst);
        usable
    }

    /// Re-evaluate the credential state. Called once at startup.
    pub async fn refresh(&self) -> bool {
        let usable = self.has_usable_credential().await;
        tracing::info!(
            credential_selected = usable,
            host_present = self.host.is_some(),
            "Credential state evaluated"
        );
        usable
    }

    /// Last evaluated credential state, without asking the host again.
    pub fn credential_state(&self) -> bool {
        self.selected.load(Ordering::SeqCst)
    }

    /// Forget the cached selection after the remote service rejected the key.
    pub fn invalidate(&self) {
        self.selected.store(false, Ordering::SeqCst);
        tracing::warn!("Selected credential was rejected; a new selection is required");
    }

    /// Run the host's interactive selection, then re-check rather than trusting completion.
    ///
    /// Without a host picker this fails with `SelectionUnavailable`; the cached
    /// state is still re-evaluated from the local fallback.
    pub async fn request_credential_selection(&self) -> Result<bool, GateError> {
        let Some(host) = &self.host else {
            self.has_usable_credential().await;
            return Err(GateError::SelectionUnavailable);
        };

        let opened = host.open_key_selection().await;
        let usable = self.has_usable_credential().await;
        match opened {
            Ok(()) => {
                tracing::info!(credential_selected = usable, "Key selection completed");
                Ok(usable)
            }
            Err(e) => {
                tracing::warn!(error = %e, credential_selected = usable, "Key selection unavailable");
                Err(e)
            }
        }
    }
}
