//! Exactly-once admission of incoming files.
//!
//! A file is admitted when it has no durable marker and no other handler
//! in this process holds it. Admission hands out an [`InFlightPermit`]
//! that releases the path when dropped.

pub mod marker;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

pub use marker::{
    sidecar_path, DatabaseMarkerStore, MarkerError, MarkerStore, ProcessingMarker,
    SidecarMarkerStore, SIDECAR_SUFFIX,
};

type InFlightSet = Arc<Mutex<HashSet<PathBuf>>>;

fn lock(set: &InFlightSet) -> MutexGuard<'_, HashSet<PathBuf>> {
    // The set holds plain paths; a panic elsewhere cannot leave it inconsistent.
    match set.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Outcome of [`IdempotencyGuard::try_admit`].
#[derive(Debug)]
pub enum Admission {
    Admitted(InFlightPermit),
    AlreadyProcessed,
    InFlight,
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted(_))
    }
}

/// Exclusive claim on one path. Dropping it removes the path from the
/// in-flight set, whatever the handler's outcome.
#[derive(Debug)]
pub struct InFlightPermit {
    path: PathBuf,
    in_flight: InFlightSet,
}

impl InFlightPermit {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InFlightPermit {
    fn drop(&mut self) {
        lock(&self.in_flight).remove(&self.path);
    }
}

#[derive(Clone)]
pub struct IdempotencyGuard {
    markers: Arc<dyn MarkerStore>,
    in_flight: InFlightSet,
}

impl IdempotencyGuard {
    pub fn new(markers: Arc<dyn MarkerStore>) -> Self {
        Self {
            markers,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Claims `path` for processing.
    ///
    /// The in-flight check and insert happen under one lock, so two callers
    /// racing on the same path can never both be admitted.
    pub fn try_admit(&self, path: &Path) -> Result<Admission, MarkerError> {
        {
            let mut set = lock(&self.in_flight);
            if !set.insert(path.to_path_buf()) {
                return Ok(Admission::InFlight);
            }
        }

        let permit = InFlightPermit {
            path: path.to_path_buf(),
            in_flight: Arc::clone(&self.in_flight),
        };

        if self.markers.is_marked(path)? {
            return Ok(Admission::AlreadyProcessed);
        }

        Ok(Admission::Admitted(permit))
    }

    /// Writes the durable marker for an admitted file.
    ///
    /// Call only after the report is persisted. If this fails the file stays
    /// unmarked and will be processed again on the next run.
    pub fn mark_processed(&self, permit: &InFlightPermit) -> Result<(), MarkerError> {
        self.markers.mark(&permit.path)
    }

    pub fn is_in_flight(&self, path: &Path) -> bool {
        lock(&self.in_flight).contains(path)
    }

    pub fn in_flight_count(&self) -> usize {
        lock(&self.in_flight).len()
    }
}
