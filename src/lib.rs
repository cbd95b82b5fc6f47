//! Prompt-to-image client with an in-memory generation history.
//!
//! ```no_run
//! use fluxgen::{GenerationStore, ImageClient, TogetherConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ImageClient::new(TogetherConfig::from_env())?;
//!     let store = GenerationStore::with_client(client);
//!
//!     let record = store.submit("a red fox in snow").await?;
//!     std::fs::write("fox.png", record.image().decode()?)?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod store;
pub mod studio;
pub mod together;

pub use config::{Config, TogetherConfig};
pub use error::{DownloadError, GenerationError, Result, SubmitError};
pub use models::{GenerationRecord, ImageFormat, ImagePayload, RecordId};
pub use store::{GenerationStore, Phase, StoreSnapshot, SubmitResult};
pub use studio::{DirectorySaver, ImageSaver, PreviewSurface, Studio, TerminalPreview};
pub use together::{ImageClient, ImageGenerator};
