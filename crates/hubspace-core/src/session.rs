// ── Session facade ──
//
// Owns one account's components and their lifecycle: log in (or resume),
// resolve the account, load the catalog, then poll in the background.
// Everything is constructed here and handed around by `Arc`; nothing is
// resolved through global state.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use hubspace_api::{AferoClient, TokenBroker, TransportConfig};

use crate::anonymize::Anonymizer;
use crate::command::CommandDispatcher;
use crate::config::{SessionConfig, SessionCredentials};
use crate::error::CoreError;
use crate::model::{MetaDevice, Room};
use crate::store::DeviceCatalog;
use crate::sync::{Availability, StateSyncCoordinator, SyncEvent, SyncEventStream};

/// Session lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// Cheaply cloneable handle to one account session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: SessionConfig,
    broker: Arc<TokenBroker>,
    catalog: Arc<DeviceCatalog>,
    dispatcher: CommandDispatcher,
    coordinator: Arc<StateSyncCoordinator>,
    state: watch::Sender<SessionState>,
    cancel: CancellationToken,
    /// Child token for the current poll task; replaced on shutdown so the
    /// session can be started again.
    cancel_child: Mutex<CancellationToken>,
    poll_task: Mutex<Option<JoinHandle<Result<(), CoreError>>>>,
}

impl Session {
    /// Build the session's components. Does NOT connect; call
    /// [`connect()`](Self::connect).
    pub fn new(config: SessionConfig) -> Result<Self, CoreError> {
        config.validate()?;

        let transport = TransportConfig {
            timeout: config.request_timeout,
            ..TransportConfig::default()
        };
        let broker = Arc::new(TokenBroker::new(
            config.endpoints.clone(),
            &transport,
            config.token_validity,
        )?);
        let catalog = Arc::new(DeviceCatalog::new(AferoClient::new(Arc::clone(&broker))));
        let dispatcher = CommandDispatcher::new(Arc::clone(&catalog));
        let coordinator = Arc::new(StateSyncCoordinator::new(
            Arc::clone(&catalog),
            config.discovery_filter(),
            config.sync_config(),
        )?);

        let (state, _) = watch::channel(SessionState::Disconnected);
        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();

        Ok(Self {
            inner: Arc::new(SessionInner {
                config,
                broker,
                catalog,
                dispatcher,
                coordinator,
                state,
                cancel,
                cancel_child: Mutex::new(cancel_child),
                poll_task: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn broker(&self) -> &Arc<TokenBroker> {
        &self.inner.broker
    }

    pub fn catalog(&self) -> &Arc<DeviceCatalog> {
        &self.inner.catalog
    }

    pub fn coordinator(&self) -> &Arc<StateSyncCoordinator> {
        &self.inner.coordinator
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.inner.dispatcher
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Authenticate, resolve the account and load the catalog.
    pub async fn connect(&self) -> Result<(), CoreError> {
        let _ = self.inner.state.send(SessionState::Connecting);

        match self.establish().await {
            Ok(()) => {
                let _ = self.inner.state.send(SessionState::Connected);
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "session connect failed");
                let _ = self.inner.state.send(SessionState::Failed);
                Err(err)
            }
        }
    }

    async fn establish(&self) -> Result<(), CoreError> {
        let broker = &self.inner.broker;
        match &self.inner.config.credentials {
            SessionCredentials::Password { username, password } => {
                broker.login(username, password).await?;
            }
            SessionCredentials::RefreshToken(token) => {
                broker.restore(token.clone()).await;
            }
        }

        let account_id = broker.get_account_id().await?;
        let snapshot = self.inner.catalog.refresh().await?;
        self.inner.coordinator.prime().await;

        info!(
            %account_id,
            devices = snapshot.len(),
            "session connected"
        );
        Ok(())
    }

    /// Spawn the background poll loop. A no-op if it is already running.
    pub async fn start(&self) -> Result<(), CoreError> {
        if *self.inner.state.borrow() != SessionState::Connected {
            return Err(CoreError::Internal("session is not connected".into()));
        }

        let mut task = self.inner.poll_task.lock().await;
        if task.as_ref().is_some_and(|h| !h.is_finished()) {
            return Ok(());
        }

        let cancel = self.inner.cancel_child.lock().await.clone();
        let coordinator = Arc::clone(&self.inner.coordinator);
        let state = self.inner.state.clone();
        *task = Some(tokio::spawn(async move {
            let result = coordinator.run(cancel).await;
            if let Err(ref err) = result {
                warn!(error = %err, "poll loop ended");
                let _ = state.send(SessionState::Failed);
            }
            result
        }));
        debug!("poll loop spawned");
        Ok(())
    }

    /// Stop the poll loop and wait for it to finish.
    pub async fn shutdown(&self) {
        {
            let mut child = self.inner.cancel_child.lock().await;
            child.cancel();
            *child = self.inner.cancel.child_token();
        }

        if let Some(handle) = self.inner.poll_task.lock().await.take() {
            let _ = handle.await;
        }

        let _ = self.inner.state.send(SessionState::Disconnected);
        debug!("session shut down");
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Devices selected by the configured allow-lists, in display order.
    pub fn devices(&self) -> Vec<Arc<MetaDevice>> {
        self.inner
            .coordinator
            .filter()
            .select(&self.inner.catalog.snapshot())
    }

    pub fn get(&self, device_id: &str) -> Result<Arc<MetaDevice>, CoreError> {
        self.inner.catalog.get(device_id)
    }

    pub fn get_state(
        &self,
        device_id: &str,
        function_class: &str,
        function_instance: Option<&str>,
    ) -> Result<Value, CoreError> {
        self.inner
            .catalog
            .get_state(device_id, function_class, function_instance)
    }

    pub fn list_rooms(&self) -> Vec<Room> {
        self.inner.catalog.list_rooms()
    }

    pub async fn refresh_device(&self, device_id: &str) -> Result<Arc<MetaDevice>, CoreError> {
        self.inner.catalog.refresh_device_state(device_id).await
    }

    // ── Writes ───────────────────────────────────────────────────────

    pub async fn set_state(
        &self,
        device_id: &str,
        function_class: &str,
        value: Value,
        function_instance: Option<&str>,
    ) -> Result<Value, CoreError> {
        self.inner
            .dispatcher
            .set_state(device_id, function_class, value, function_instance)
            .await
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<SyncEvent>> {
        self.inner.coordinator.subscribe()
    }

    pub fn events(&self) -> SyncEventStream {
        self.inner.coordinator.events()
    }

    pub fn availability(&self) -> watch::Receiver<Availability> {
        self.inner.coordinator.availability()
    }

    // ── Diagnostics ──────────────────────────────────────────────────

    /// The raw metadevice list, pretty-printed and anonymized for sharing.
    pub async fn anonymized_dump(&self) -> Result<String, CoreError> {
        let raw = self.inner.catalog.client().list_metadevices_raw().await?;
        let text = serde_json::to_string_pretty(&raw)
            .map_err(|e| CoreError::Internal(format!("dump serialization failed: {e}")))?;
        Ok(Anonymizer::new().redact(&text))
    }
}
