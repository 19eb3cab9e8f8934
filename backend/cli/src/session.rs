use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::info;
use uuid::Uuid;

use sketchnote_config::{ProviderConfig, SketchnoteConfig};
use sketchnote_core::{ApiKeySlot, GenerationSettings, NoteModel};
use sketchnote_provider::{GeminiProvider, MockModel};
use sketchnote_workflow::{KeySlotCredentials, LoadingFlag, WorkflowController, WorkflowSnapshot};

/// Key placed in the slot for offline runs so the wizard skips setup.
const OFFLINE_KEY: &str = "offline";

/// Builds the model for one workflow around that workflow's key slot.
pub type ModelFactory = Arc<dyn Fn(ApiKeySlot) -> Arc<dyn NoteModel> + Send + Sync>;

/// Gemini configured from `provider`, or the canned mock when offline.
pub fn model_factory(provider: &ProviderConfig) -> ModelFactory {
    if provider.offline {
        return Arc::new(|_slot| Arc::new(MockModel::new("offline")) as Arc<dyn NoteModel>);
    }
    let provider = provider.clone();
    Arc::new(move |slot| {
        Arc::new(
            GeminiProvider::new(slot)
                .with_base_url(provider.base_url.clone())
                .with_models(provider.analysis_model.clone(), provider.image_model.clone()),
        ) as Arc<dyn NoteModel>
    })
}

/// The key a fresh workflow starts with.
pub fn initial_key(provider: &ProviderConfig) -> ApiKeySlot {
    match (&provider.api_key, provider.offline) {
        (Some(key), _) => ApiKeySlot::new(Some(key.clone())),
        (None, true) => ApiKeySlot::new(Some(OFFLINE_KEY.to_string())),
        (None, false) => ApiKeySlot::default(),
    }
}

/// One wizard run served over HTTP.
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Milliseconds since the epoch of the last request touching this session.
    last_active_ms: AtomicI64,
    key: ApiKeySlot,
    loading: LoadingFlag,
    controller: Mutex<WorkflowController>,
    /// Last state published by an action, served while a call holds the lock.
    last: RwLock<WorkflowSnapshot>,
}

impl Session {
    pub async fn start(
        factory: &ModelFactory,
        key: ApiKeySlot,
        defaults: GenerationSettings,
    ) -> Self {
        let model = factory(key.clone());
        let credentials = Arc::new(KeySlotCredentials::new(key.clone()));
        let mut controller = WorkflowController::new(model, credentials).with_settings(defaults);
        controller.check_entry_point().await;

        let created_at = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at,
            last_active_ms: AtomicI64::new(created_at.timestamp_millis()),
            key,
            loading: controller.loading_flag(),
            last: RwLock::new(controller.snapshot()),
            controller: Mutex::new(controller),
        }
    }

    /// Record activity now.
    pub fn touch(&self) {
        self.touch_at(Utc::now());
    }

    fn touch_at(&self, at: DateTime<Utc>) {
        self.last_active_ms
            .fetch_max(at.timestamp_millis(), Ordering::AcqRel);
    }

    pub fn last_active(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_active_ms.load(Ordering::Acquire))
            .unwrap_or(self.created_at)
    }

    pub fn key(&self) -> &ApiKeySlot {
        &self.key
    }

    /// Exclusive access to the controller, or `None` while another action
    /// is running.
    pub fn try_controller(&self) -> Option<MutexGuard<'_, WorkflowController>> {
        self.controller.try_lock().ok()
    }

    /// Current state. While a model call is in flight this is the state the
    /// call started from, with `loading` set and the error banner cleared.
    pub async fn snapshot(&self) -> WorkflowSnapshot {
        if let Some(controller) = self.try_controller() {
            return controller.snapshot();
        }
        let mut snapshot = self.last.read().await.clone();
        if self.loading.is_set() {
            snapshot.loading = true;
            snapshot.error = None;
        }
        snapshot
    }

    /// Record the state left by an action.
    pub async fn publish(&self, snapshot: WorkflowSnapshot) {
        *self.last.write().await = snapshot;
    }
}

/// In-memory session registry.
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Arc<Session>>>,
    factory: ModelFactory,
    provider_key: ApiKeySlot,
    defaults: GenerationSettings,
}

impl SessionStore {
    pub fn new(factory: ModelFactory, provider_key: ApiKeySlot, defaults: GenerationSettings) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            factory,
            provider_key,
            defaults,
        }
    }

    pub fn from_config(config: &SketchnoteConfig) -> Self {
        Self::new(
            model_factory(&config.provider),
            initial_key(&config.provider),
            config.defaults,
        )
    }

    /// Start a new workflow. Each session gets its own copy of the configured key.
    pub async fn create(&self) -> Arc<Session> {
        let key = ApiKeySlot::new(self.provider_key.get().await);
        let session = Arc::new(Session::start(&self.factory, key, self.defaults).await);
        self.sessions
            .write()
            .await
            .insert(session.id, Arc::clone(&session));
        session
    }

    pub async fn get(&self, id: &Uuid) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &Uuid) -> Option<Arc<Session>> {
        self.sessions.write().await.remove(id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop sessions untouched for at least `max_idle` as of `now`. Sessions
    /// with an action in progress are kept. Returns how many were removed.
    pub async fn evict_idle(&self, max_idle: TimeDelta, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, session| {
            let idle = now - session.last_active();
            let keep = idle < max_idle || session.try_controller().is_none();
            if !keep {
                info!(session = %id, idle_secs = idle.num_seconds(), "Evicting idle session");
            }
            keep
        });
        before - sessions.len()
    }
}
