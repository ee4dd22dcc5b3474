//! Image reference handling
//!
//! [`ImageReference`] is the parsed `host/namespace/repository:tag` form used
//! everywhere an image is named. [`MirrorDestination`] and [`SyncPair`] derive
//! destination references for the two replication flows.

pub mod reference;

pub use reference::{ImageReference, LATEST_TAG, MirrorDestination, SyncPair};
