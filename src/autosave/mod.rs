//! # Draft auto-save.
//!
//! - [`draft`]: envelope format, [`DraftStore`] implementations and store-wide
//!   utilities ([`cleanup_expired`], [`stats`], [`clear_all`]);
//! - [`saver`]: [`AutoSaver`], the debounced per-form writer.

mod draft;
mod saver;

pub use draft::{
    DEFAULT_DEBOUNCE, DEFAULT_MAX_AGE, DRAFT_VERSION, DraftEnvelope, DraftStats, DraftStore,
    FileDraftStore, MemoryDraftStore, STORAGE_PREFIX, all_keys, cleanup_expired, clear_all, stats,
    storage_key,
};
pub use saver::{AutoSaveOptions, AutoSaver, DraftInfo, ExitMode};

#[cfg(feature = "journal")]
pub(crate) use draft::encode_file_stem;
