// src/output/mod.rs
//! Where collected data lands on disk.
//!
//! Two artifacts per page: the raw response body under `raw/`, written
//! before anything is derived from it, and one normalized JSONL line per
//! new item under `data/`.

mod normalize;
mod sink;
mod snapshots;

pub use normalize::{derive_flags, local_temporal, normalize_item, LocalTemporal, TextFlags};
pub use sink::{ItemSink, JsonlSink, ITEMS_FILE, USERS_FILE};
pub use snapshots::{snapshot_name, RawSnapshots};
