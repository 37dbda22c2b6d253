//! Quest download sessions.
//!
//! A [`DownloadSession`] fetches every quest type for one tile region in a
//! fixed order, skipping types whose download is still fresh, and reports
//! fractional progress while honouring cooperative cancellation.
//!
//! # Architecture
//!
//! ```text
//! DownloadSession
//!         │
//!         ├── WorkTypeRegistry (ranks quest types)
//!         ├── FreshnessIndex (skip fresh types, stored note positions)
//!         ├── NoteProvider (always first)
//!         ├── GeographicProvider (one call per quest type)
//!         │
//!         ├── ProgressCounters ──► SessionHandle (read-only view)
//!         └── SessionListener / VisibleQuestListener
//! ```
//!
//! # Example
//!
//! ```ignore
//! use questsync::session::{DownloadSession, SessionConfig, SessionDeps};
//! use tokio_util::sync::CancellationToken;
//!
//! let mut session = DownloadSession::new(deps, SessionConfig::default());
//! session.init(tiles, Some(5), false, CancellationToken::new())?;
//! session.download()?;
//! assert!(session.is_finished());
//! ```

mod download;
mod error;
mod progress;
mod traits;
mod types;

pub use download::{
    freshness_cutoff, DownloadSession, SessionConfig, SessionDeps, DEFAULT_MAX_NOTES,
};
pub use error::{ProviderError, SessionError, SessionResult};
pub use progress::SessionHandle;
pub use traits::{
    FreshnessIndex, GeographicProvider, NoopListener, NoteProvider, SessionListener,
    VisibleQuestListener,
};
pub use types::{StaticWorkTypeRegistry, WorkType, WorkTypeKind, WorkTypeRegistry, NOTES_TYPE_NAME};
