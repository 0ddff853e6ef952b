//! Collaborators shared by the availability and booking managers.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::{Result, SchedulingError};
use crate::locks::ProfessionalLocks;
use crate::store::SchedulingStore;

/// Store, clock, lock registry and configuration, cheaply cloneable.
///
/// Both managers must be built from clones of the same context so that they share
/// one [`ProfessionalLocks`] registry.
#[derive(Clone)]
pub struct SchedulingContext {
    pub store: Arc<dyn SchedulingStore>,
    pub clock: Arc<dyn Clock>,
    pub locks: Arc<ProfessionalLocks>,
    pub config: EngineConfig,
}

impl SchedulingContext {
    pub fn new(store: Arc<dyn SchedulingStore>, clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        Self {
            store,
            clock,
            locks: Arc::new(ProfessionalLocks::new()),
            config,
        }
    }

    /// Context on the system clock with default configuration.
    pub fn with_store(store: Arc<dyn SchedulingStore>) -> Self {
        Self::new(store, Arc::new(SystemClock), EngineConfig::default())
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Reject start times that are not strictly after the current instant.
    pub(crate) fn ensure_future(&self, start: DateTime<Utc>) -> Result<()> {
        let now = self.now();
        if start <= now {
            return Err(SchedulingError::Validation(format!(
                "start {} must be in the future (now {})",
                start.to_rfc3339(),
                now.to_rfc3339()
            )));
        }
        Ok(())
    }
}
