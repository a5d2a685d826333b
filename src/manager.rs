//! Adapter lifecycle manager (C5): connects every registered adapter,
//! pumps its live events into the store, and reconnects with exponential
//! backoff on failure — one adapter's trouble never affects the rest.
//!
//! Grounded on `lumehaven/adapters/manager.py`'s `AdapterManager`. Where the
//! original stores `asyncio.Task` handles and relies on `CancelledError`,
//! this stores `JoinHandle`s and relies on `JoinHandle::abort`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::adapters::SmartHomeAdapter;
use crate::error::ConfigError;
use crate::store::SignalStore;

/// Backoff cursor parameters for reconnects. Defaults match the upstream's
/// `INITIAL = 5s`, `MAX = 300s`, `BACKOFF = 2.0`.
#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        BackoffConfig {
            initial: Duration::from_secs(5),
            max: Duration::from_secs(300),
            multiplier: 2.0,
        }
    }
}

struct AdapterState {
    connected: bool,
    last_error: Option<String>,
    retry_delay: Duration,
    pump_task: Option<JoinHandle<()>>,
}

impl AdapterState {
    fn new(initial_delay: Duration) -> Self {
        AdapterState {
            connected: false,
            last_error: None,
            retry_delay: initial_delay,
            pump_task: None,
        }
    }
}

/// Status of one adapter, shaped for `GET /health`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AdapterStatus {
    pub name: String,
    #[serde(rename = "type")]
    pub adapter_type: String,
    pub connected: bool,
}

pub struct AdapterManager {
    store: Arc<SignalStore>,
    backoff: BackoffConfig,
    adapters: Mutex<HashMap<String, Arc<dyn SmartHomeAdapter>>>,
    states: Mutex<HashMap<String, AdapterState>>,
    pending_retries: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl AdapterManager {
    pub fn new(store: Arc<SignalStore>, backoff: BackoffConfig) -> Arc<Self> {
        Arc::new(AdapterManager {
            store,
            backoff,
            adapters: Mutex::new(HashMap::new()),
            states: Mutex::new(HashMap::new()),
            pending_retries: Mutex::new(HashMap::new()),
        })
    }

    /// Register an adapter. Fails if another adapter with the same name is
    /// already registered.
    pub async fn add(&self, adapter: Arc<dyn SmartHomeAdapter>) -> Result<(), ConfigError> {
        let name = adapter.name().to_string();
        let mut adapters = self.adapters.lock().await;
        if adapters.contains_key(&name) {
            return Err(ConfigError::DuplicateAdapterName(name));
        }
        adapters.insert(name.clone(), adapter);
        drop(adapters);
        self.states
            .lock()
            .await
            .insert(name, AdapterState::new(self.backoff.initial));
        Ok(())
    }

    /// Status of every registered adapter, for `/health`.
    pub async fn adapter_statuses(&self) -> Vec<AdapterStatus> {
        let adapters = self.adapters.lock().await;
        let states = self.states.lock().await;
        adapters
            .iter()
            .map(|(name, adapter)| AdapterStatus {
                name: name.clone(),
                adapter_type: adapter.adapter_type().to_string(),
                connected: states.get(name).map(|s| s.connected).unwrap_or(false),
            })
            .collect()
    }

    pub async fn is_adapter_connected(&self, name: &str) -> bool {
        self.states
            .lock()
            .await
            .get(name)
            .map(|s| s.connected)
            .unwrap_or(false)
    }

    /// Attempt to connect every registered adapter. Adapters that fail are
    /// scheduled for retry; this never fails as a whole.
    pub async fn start_all(self: &Arc<Self>) {
        let names: Vec<String> = self.adapters.lock().await.keys().cloned().collect();
        for name in names {
            self.start_adapter(&name).await;
        }
    }

    async fn adapter_handle(&self, name: &str) -> Option<Arc<dyn SmartHomeAdapter>> {
        self.adapters.lock().await.get(name).cloned()
    }

    async fn start_adapter(self: &Arc<Self>, name: &str) {
        let Some(adapter) = self.adapter_handle(name).await else {
            return;
        };

        info!(adapter = name, "connecting");
        match adapter.snapshot().await {
            Ok(signals) => {
                self.store.set_many(signals.into_values()).await;
                let pump = self.spawn_pump(name.to_string(), adapter);
                let mut states = self.states.lock().await;
                if let Some(state) = states.get_mut(name) {
                    state.pump_task = Some(pump);
                    state.connected = true;
                    state.last_error = None;
                    state.retry_delay = self.backoff.initial;
                }
            }
            Err(e) => {
                warn!(adapter = name, error = %e, "failed to connect");
                self.mark_disconnected(name, e.to_string()).await;
                self.schedule_retry(name.to_string()).await;
            }
        }
    }

    fn spawn_pump(
        self: &Arc<Self>,
        name: String,
        adapter: Arc<dyn SmartHomeAdapter>,
    ) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move { manager.pump_loop(name, adapter).await })
    }

    /// The per-adapter live-sync task: drain the adapter's event stream
    /// into the store forever, reconnecting with backoff whenever the
    /// stream ends or errors.
    async fn pump_loop(self: Arc<Self>, name: String, adapter: Arc<dyn SmartHomeAdapter>) {
        loop {
            match adapter.subscribe_events().await {
                Ok(mut events) => loop {
                    match events.next().await {
                        Some(signal) => self.store.publish(signal).await,
                        None => {
                            warn!(adapter = %name, "event stream closed");
                            self.mark_disconnected(&name, "stream closed").await;
                            break;
                        }
                    }
                },
                Err(e) => {
                    warn!(adapter = %name, error = %e, "event stream failed");
                    self.mark_disconnected(&name, e.to_string()).await;
                }
            }

            let delay = self.current_retry_delay(&name).await;
            tokio::time::sleep(delay).await;
            self.advance_retry_delay(&name).await;

            match adapter.snapshot().await {
                Ok(signals) => {
                    self.store.set_many(signals.into_values()).await;
                    self.mark_connected(&name).await;
                }
                Err(e) => {
                    warn!(adapter = %name, error = %e, "resync failed, will retry");
                }
            }
        }
    }

    /// Called when `start_adapter` fails. Idempotent: does nothing if a
    /// retry for `name` is already pending.
    async fn schedule_retry(self: &Arc<Self>, name: String) {
        let mut pending = self.pending_retries.lock().await;
        if pending.contains_key(&name) {
            return;
        }
        let delay = self.current_retry_delay(&name).await;
        let manager = self.clone();
        let task_name = name.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            manager.advance_retry_delay(&task_name).await;
            manager.pending_retries.lock().await.remove(&task_name);
            manager.start_adapter(&task_name).await;
        });
        pending.insert(name, handle);
    }

    async fn mark_disconnected(&self, name: &str, error: impl Into<String>) {
        let mut states = self.states.lock().await;
        if let Some(state) = states.get_mut(name) {
            state.connected = false;
            state.last_error = Some(error.into());
        }
    }

    async fn mark_connected(&self, name: &str) {
        let mut states = self.states.lock().await;
        if let Some(state) = states.get_mut(name) {
            state.connected = true;
            state.last_error = None;
            state.retry_delay = self.backoff.initial;
        }
    }

    async fn current_retry_delay(&self, name: &str) -> Duration {
        self.states
            .lock()
            .await
            .get(name)
            .map(|s| s.retry_delay)
            .unwrap_or(self.backoff.initial)
    }

    async fn advance_retry_delay(&self, name: &str) {
        let mut states = self.states.lock().await;
        if let Some(state) = states.get_mut(name) {
            let next = state.retry_delay.mul_f64(self.backoff.multiplier);
            state.retry_delay = next.min(self.backoff.max);
        }
    }

    /// Cancel every pending retry and pump task, await their settlement,
    /// then close every adapter. Idempotent.
    pub async fn stop_all(&self) {
        let retries: Vec<JoinHandle<()>> = {
            let mut pending = self.pending_retries.lock().await;
            pending.drain().map(|(_, handle)| handle).collect()
        };
        for handle in retries {
            handle.abort();
            let _ = handle.await;
        }

        let pumps: Vec<JoinHandle<()>> = {
            let mut states = self.states.lock().await;
            states
                .values_mut()
                .filter_map(|state| state.pump_task.take())
                .collect()
        };
        for handle in pumps {
            handle.abort();
            let _ = handle.await;
        }

        let adapters: Vec<Arc<dyn SmartHomeAdapter>> =
            self.adapters.lock().await.values().cloned().collect();
        for adapter in adapters {
            adapter.close().await;
        }
    }
}
