//! In-memory generation history with a single-flight busy guard.
//!
//! [`GenerationStore`] is the only owner of the history and of the busy
//! flag. A submission moves the store from `Idle` to `Generating` before the
//! image request is awaited, and back to `Idle` exactly once afterwards,
//! whether the request succeeded, failed, or the future was dropped.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::{
    error::{GenerationError, SubmitError},
    models::{GenerationRecord, RecordId},
    together::{ImageClient, ImageGenerator},
};

pub type SubmitResult = std::result::Result<Arc<GenerationRecord>, SubmitError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Generating { prompt: String },
}

/// What a renderer needs to draw the current state.
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    /// Newest first.
    pub history: Vec<Arc<GenerationRecord>>,
    pub busy: bool,
    pub pending_prompt: Option<String>,
    pub last_error: Option<GenerationError>,
}

struct StoreState {
    history: VecDeque<Arc<GenerationRecord>>,
    phase: Phase,
    last_error: Option<GenerationError>,
    next_id: u64,
}

impl StoreState {
    fn new() -> Self {
        Self {
            history: VecDeque::new(),
            phase: Phase::Idle,
            last_error: None,
            next_id: 0,
        }
    }

    fn snapshot(&self) -> StoreSnapshot {
        let pending_prompt = match &self.phase {
            Phase::Idle => None,
            Phase::Generating { prompt } => Some(prompt.clone()),
        };
        StoreSnapshot {
            history: self.history.iter().cloned().collect(),
            busy: pending_prompt.is_some(),
            pending_prompt,
            last_error: self.last_error.clone(),
        }
    }
}

#[derive(Clone)]
pub struct GenerationStore {
    generator: Arc<dyn ImageGenerator>,
    state: Arc<Mutex<StoreState>>,
    updates: Arc<watch::Sender<StoreSnapshot>>,
}

impl GenerationStore {
    pub fn new(generator: Arc<dyn ImageGenerator>) -> Self {
        let state = StoreState::new();
        let (updates, _) = watch::channel(state.snapshot());
        Self {
            generator,
            state: Arc::new(Mutex::new(state)),
            updates: Arc::new(updates),
        }
    }

    pub fn with_client(client: ImageClient) -> Self {
        Self::new(Arc::new(client))
    }

    /// Generates an image for `prompt` and resolves once the record is in
    /// the history, or with the reason nothing was added.
    pub async fn submit(&self, prompt: impl Into<String>) -> SubmitResult {
        let in_flight = self.begin(prompt.into())?;
        in_flight.run().await
    }

    /// Same as [`submit`](Self::submit), but the request runs on a spawned
    /// task. Validation and the busy transition happen before this returns.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit_detached(
        &self,
        prompt: impl Into<String>,
    ) -> std::result::Result<JoinHandle<SubmitResult>, SubmitError> {
        let in_flight = self.begin(prompt.into())?;
        Ok(tokio::spawn(in_flight.run()))
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.lock().snapshot()
    }

    /// Receives a fresh snapshot after every state transition.
    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.updates.subscribe()
    }

    pub fn history(&self) -> Vec<Arc<GenerationRecord>> {
        self.lock().history.iter().cloned().collect()
    }

    pub fn get(&self, id: RecordId) -> Option<Arc<GenerationRecord>> {
        self.lock()
            .history
            .iter()
            .find(|record| record.id() == id)
            .cloned()
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.lock().phase, Phase::Generating { .. })
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase.clone()
    }

    pub fn last_error(&self) -> Option<GenerationError> {
        self.lock().last_error.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn begin(&self, prompt: String) -> std::result::Result<InFlight, SubmitError> {
        if prompt.trim().is_empty() {
            log::debug!("Ignoring empty prompt");
            return Err(SubmitError::InvalidInput);
        }

        let mut state = self.lock();
        if let Phase::Generating { prompt: pending } = &state.phase {
            log::warn!(
                "Generation already in progress for {:?}; rejecting {:?}",
                pending,
                prompt
            );
            return Err(SubmitError::AlreadyInProgress);
        }

        state.phase = Phase::Generating {
            prompt: prompt.clone(),
        };
        self.publish(&state);
        log::debug!("Generating: {:?}", prompt);

        Ok(InFlight {
            store: self.clone(),
            prompt,
            finished: false,
        })
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        // Every critical section leaves the state consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &StoreState) {
        self.updates.send_replace(state.snapshot());
    }
}

/// The one outstanding request. Returns the store to `Idle` when it
/// completes or, failing that, when it is dropped.
struct InFlight {
    store: GenerationStore,
    prompt: String,
    finished: bool,
}

impl InFlight {
    async fn run(mut self) -> SubmitResult {
        let result = self.store.generator.generate(&self.prompt).await;

        let mut state = self.store.lock();
        state.phase = Phase::Idle;
        self.finished = true;

        let outcome = match result {
            Ok(image) => {
                state.next_id += 1;
                let record = Arc::new(GenerationRecord::new(
                    RecordId(state.next_id),
                    std::mem::take(&mut self.prompt),
                    image,
                ));
                state.history.push_front(Arc::clone(&record));
                state.last_error = None;
                log::info!(
                    "🖼️  Image {} generated ({} in history)",
                    record.id(),
                    state.history.len()
                );
                Ok(record)
            }
            Err(e) => {
                log::error!("Image generation failed for {:?}: {}", self.prompt, e);
                state.last_error = Some(e.clone());
                Err(SubmitError::Generation(e))
            }
        };

        self.store.publish(&state);
        outcome
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        log::warn!("Generation for {:?} was cancelled", self.prompt);
        let mut state = self.store.lock();
        state.phase = Phase::Idle;
        self.store.publish(&state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::models::ImagePayload;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Replays queued results; optionally blocks every call until released.
    struct ScriptedGenerator {
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
        results: Mutex<VecDeque<Result<ImagePayload>>>,
        hold: bool,
        release: Notify,
    }

    impl ScriptedGenerator {
        fn new(results: Vec<Result<ImagePayload>>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
                results: Mutex::new(results.into()),
                hold: false,
                release: Notify::new(),
            })
        }

        fn held(results: Vec<Result<ImagePayload>>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
                results: Mutex::new(results.into()),
                hold: true,
                release: Notify::new(),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ImageGenerator for ScriptedGenerator {
        async fn generate(&self, prompt: &str) -> Result<ImagePayload> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            if self.hold {
                self.release.notified().await;
            }
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(GenerationError::ResponseError("script exhausted".into())))
        }
    }

    fn image(bytes: &[u8]) -> ImagePayload {
        ImagePayload::from_bytes(bytes)
    }

    #[tokio::test]
    async fn test_submit_prepends_record_with_exact_prompt() {
        let generator = ScriptedGenerator::new(vec![Ok(image(b"first")), Ok(image(b"second"))]);
        let store = GenerationStore::new(generator.clone());

        let first = store.submit("  a red fox in snow \n").await.unwrap();
        let second = store.submit("blue whale").await.unwrap();

        assert_eq!(first.prompt(), "  a red fox in snow \n");
        assert_eq!(generator.prompts(), vec!["  a red fox in snow \n", "blue whale"]);
        assert!(second.id() > first.id());

        let history = store.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].prompt(), "blue whale");
        assert_eq!(history[1].prompt(), "  a red fox in snow \n");
        assert_eq!(store.get(first.id()).unwrap().image(), first.image());
        assert!(!store.is_busy());
    }

    #[tokio::test]
    async fn test_blank_prompts_are_ignored() {
        let generator = ScriptedGenerator::new(vec![]);
        let store = GenerationStore::new(generator.clone());

        for prompt in ["", "   ", "\n\t "] {
            assert_eq!(store.submit(prompt).await.unwrap_err(), SubmitError::InvalidInput);
            assert!(matches!(
                store.submit_detached(prompt),
                Err(SubmitError::InvalidInput)
            ));
        }

        assert_eq!(generator.calls(), 0);
        assert!(store.is_empty());
        assert!(!store.is_busy());
    }

    #[tokio::test]
    async fn test_second_submission_rejected_while_busy() {
        let generator = ScriptedGenerator::held(vec![Ok(image(b"fox"))]);
        let store = GenerationStore::new(generator.clone());
        assert!(!store.is_busy());

        let handle = store.submit_detached("a red fox in snow").unwrap();
        assert!(store.is_busy());
        assert_eq!(
            store.phase(),
            Phase::Generating {
                prompt: "a red fox in snow".into()
            }
        );

        assert_eq!(
            store.submit("blue whale").await.unwrap_err(),
            SubmitError::AlreadyInProgress
        );
        assert!(matches!(
            store.submit_detached("blue whale"),
            Err(SubmitError::AlreadyInProgress)
        ));
        assert!(store.is_empty());
        assert!(store.is_busy());

        generator.release.notify_one();
        let record = handle.await.unwrap().unwrap();

        assert!(!store.is_busy());
        assert_eq!(generator.calls(), 1);
        assert_eq!(store.history(), vec![record]);
    }

    #[tokio::test]
    async fn test_failure_leaves_history_and_clears_busy() {
        let service_error = GenerationError::ServiceError {
            status: 503,
            message: "model overloaded".into(),
        };
        let generator =
            ScriptedGenerator::new(vec![Ok(image(b"ok")), Err(service_error.clone()), Ok(image(b"again"))]);
        let store = GenerationStore::new(generator.clone());

        store.submit("lighthouse").await.unwrap();
        let before = store.history();

        let err = store.submit("storm").await.unwrap_err();
        assert_eq!(err, SubmitError::Generation(service_error.clone()));
        assert_eq!(store.history(), before);
        assert!(!store.is_busy());
        assert_eq!(store.last_error(), Some(service_error));

        store.submit("calm sea").await.unwrap();
        assert_eq!(store.last_error(), None);
        assert_eq!(store.len(), 2);
        assert_eq!(generator.calls(), 3);
    }

    #[tokio::test]
    async fn test_payload_is_stored_unmodified() {
        let bytes = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 1, 2, 3, 254, 255];
        let returned = image(&bytes);
        let generator = ScriptedGenerator::new(vec![Ok(returned.clone())]);
        let store = GenerationStore::new(generator);

        let record = store.submit("raw bytes").await.unwrap();
        assert_eq!(record.image().base64(), returned.base64());
        assert_eq!(record.image().decode().unwrap(), bytes);
    }

    #[tokio::test]
    async fn test_fox_whale_scenario() {
        let generator = ScriptedGenerator::held(vec![Ok(image(b"X")), Ok(image(b"Y"))]);
        let store = GenerationStore::new(generator.clone());

        let (fox, whale) = futures::future::join(store.submit("a red fox in snow"), async {
            assert_eq!(store.submit("").await.unwrap_err(), SubmitError::InvalidInput);
            let rejected = store.submit("blue whale").await.unwrap_err();
            assert_eq!(store.len(), 0);
            generator.release.notify_one();
            rejected
        })
        .await;

        let fox = fox.unwrap();
        assert_eq!(whale, SubmitError::AlreadyInProgress);
        assert_eq!(fox.image(), &image(b"X"));
        assert_eq!(store.len(), 1);

        generator.release.notify_one();
        let whale = store.submit("blue whale").await.unwrap();
        let history = store.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], whale);
        assert_eq!(history[1], fox);
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn test_subscribers_see_busy_transitions() {
        let generator = ScriptedGenerator::held(vec![Ok(image(b"frame"))]);
        let store = GenerationStore::new(generator.clone());
        let mut updates = store.subscribe();
        assert!(!updates.borrow_and_update().busy);

        let handle = store.submit_detached("neon city").unwrap();
        {
            let snapshot = updates.borrow_and_update();
            assert!(snapshot.busy);
            assert_eq!(snapshot.pending_prompt.as_deref(), Some("neon city"));
            assert!(snapshot.history.is_empty());
        }

        generator.release.notify_one();
        handle.await.unwrap().unwrap();

        assert!(updates.has_changed().unwrap());
        let snapshot = updates.borrow_and_update().clone();
        assert!(!snapshot.busy);
        assert_eq!(snapshot.pending_prompt, None);
        assert_eq!(snapshot.history.len(), 1);
        assert_eq!(snapshot.history[0].prompt(), "neon city");
    }

    #[tokio::test]
    async fn test_dropped_request_clears_busy() {
        let generator = ScriptedGenerator::held(vec![Ok(image(b"never"))]);
        let store = GenerationStore::new(generator.clone());

        let timed_out =
            tokio::time::timeout(Duration::from_millis(20), store.submit("slow prompt")).await;
        assert!(timed_out.is_err());
        assert!(!store.is_busy());
        assert!(store.is_empty());

        let handle = store.submit_detached("aborted prompt").unwrap();
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
        assert!(!store.is_busy());
        assert!(store.is_empty());
    }
}
