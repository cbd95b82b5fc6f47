//! Headless front end over a [`GenerationStore`].
//!
//! `Studio` turns user intents (submit, download, preview) into store calls
//! and capability calls. Drawing is left to whoever owns the
//! [`PreviewSurface`] and watches [`GenerationStore::subscribe`].

pub mod download;
pub mod preview;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::{
    error::{DownloadError, SubmitError},
    models::{GenerationRecord, RecordId},
    store::{GenerationStore, SubmitResult},
};

pub use download::{download_filename, DirectorySaver, ImageSaver};
pub use preview::{PreviewSurface, TerminalPreview};

pub struct Studio<S, P> {
    store: GenerationStore,
    saver: S,
    preview_surface: P,
    previewed: Option<RecordId>,
}

impl<S: ImageSaver, P: PreviewSurface> Studio<S, P> {
    pub fn new(store: GenerationStore, saver: S, preview_surface: P) -> Self {
        Self {
            store,
            saver,
            preview_surface,
            previewed: None,
        }
    }

    pub fn store(&self) -> &GenerationStore {
        &self.store
    }

    /// Whether a submit control for `text` should be enabled.
    pub fn can_submit(&self, text: &str) -> bool {
        !text.trim().is_empty() && !self.store.is_busy()
    }

    /// Starts a generation in the background. Returns `None` when the store
    /// refused it; blank input is dropped without a warning.
    pub fn on_submit(&self, text: &str) -> Option<JoinHandle<SubmitResult>> {
        match self.store.submit_detached(text) {
            Ok(handle) => Some(handle),
            Err(SubmitError::InvalidInput) => None,
            Err(e) => {
                log::warn!("⚠️  Submission rejected: {}", e);
                None
            }
        }
    }

    pub fn on_download(&self, id: RecordId) -> Result<PathBuf, DownloadError> {
        let record = self
            .store
            .get(id)
            .ok_or(DownloadError::UnknownRecord(id))?;
        let bytes = record.image().decode()?;
        let filename = download_filename(record.prompt());

        let path = self.saver.save(&bytes, &filename)?;
        log::info!("💾 Saved image {} to {}", id, path.display());
        Ok(path)
    }

    /// Opens the preview on `id`, or closes it with `None`. An id that is
    /// not in the history closes the preview as well.
    pub fn on_select_for_preview(&mut self, id: Option<RecordId>) -> Option<Arc<GenerationRecord>> {
        let record = id.and_then(|id| self.store.get(id));
        if let (Some(id), None) = (id, &record) {
            log::warn!("No generated image with id {}", id);
        }

        self.previewed = record.as_ref().map(|r| r.id());
        self.preview_surface.set_preview(record.as_deref());
        record
    }

    pub fn preview(&self) -> Option<Arc<GenerationRecord>> {
        self.previewed.and_then(|id| self.store.get(id))
    }
}
