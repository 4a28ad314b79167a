//! Progress-callback trait for per-unit pipeline events.
//!
//! Inject an [`Arc<dyn ProgressObserver>`] via
//! [`crate::config::RoundTripConfigBuilder::progress_callback`] to receive
//! events as the pipeline walks the source units and restoration stages.
//!
//! # Example
//!
//! ```rust
//! use texround::{ProgressObserver, RoundTripConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingObserver {
//!     units: AtomicUsize,
//! }
//!
//! impl ProgressObserver for CountingObserver {
//!     fn on_unit_complete(&self, ordinal: usize, total: usize, path: &str, listings: usize) {
//!         self.units.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("[{}/{}] {} ({} listings)", ordinal + 1, total, path, listings);
//!     }
//! }
//!
//! let observer = Arc::new(CountingObserver { units: AtomicUsize::new(0) });
//! let config = RoundTripConfig::builder()
//!     .progress_callback(observer as Arc<dyn ProgressObserver>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it processes units and stages.
///
/// The pipeline is single-threaded, but the trait is `Send + Sync` so the
/// same observer can be shared with a UI thread. All methods have default
/// no-op implementations.
pub trait ProgressObserver: Send + Sync {
    /// Called once before the first unit is processed.
    fn on_run_start(&self, total_units: usize) {
        let _ = total_units;
    }

    /// Called after a unit has been normalized and written.
    ///
    /// # Arguments
    /// * `ordinal`  - 0-indexed position in lexical path order
    /// * `total`    - number of units in the run
    /// * `path`     - unit path relative to the project root
    /// * `listings` - listings numbered in this unit
    fn on_unit_complete(&self, ordinal: usize, total: usize, path: &str, listings: usize) {
        let _ = (ordinal, total, path, listings);
    }

    /// Called when a named stage (converter call, repair, restore) begins.
    fn on_stage(&self, stage: &str) {
        let _ = stage;
    }

    /// Called once when the run finished successfully.
    ///
    /// `restored` and `unresolved` sum anchor and asset outcomes.
    fn on_run_complete(&self, restored: usize, unresolved: usize) {
        let _ = (restored, unresolved);
    }
}

/// Type stored in [`crate::config::RoundTripConfig`].
pub type ProgressCallback = Arc<dyn ProgressObserver>;
