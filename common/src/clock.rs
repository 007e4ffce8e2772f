//! [`Clock`] definitions.

use std::{
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};

use crate::DateTime;

/// Source of the current [`DateTime`].
///
/// Every time-sensitive decision (token expiry, session expiry) is made
/// against a [`Clock`], so it can be moved manually in tests.
#[derive(Clone, Debug, Default)]
pub struct Clock(Source);

/// Kind of a [`Clock`].
#[derive(Clone, Debug, Default)]
enum Source {
    /// Wall clock of the operating system.
    #[default]
    System,

    /// Clock only moved explicitly.
    Manual(Arc<RwLock<DateTime>>),
}

impl Clock {
    /// Creates a new [`Clock`] following the system time.
    #[must_use]
    pub fn system() -> Self {
        Self(Source::System)
    }

    /// Creates a new manually driven [`Clock`] stopped at the provided
    /// [`DateTime`].
    #[must_use]
    pub fn manual(at: DateTime) -> Self {
        Self(Source::Manual(Arc::new(RwLock::new(at))))
    }

    /// Returns the current [`DateTime`] of this [`Clock`].
    #[must_use]
    pub fn now(&self) -> DateTime {
        match &self.0 {
            Source::System => DateTime::now(),
            Source::Manual(at) => {
                *at.read().unwrap_or_else(PoisonError::into_inner)
            }
        }
    }

    /// Moves this [`Clock`] forward by the provided [`Duration`].
    ///
    /// No-op for a [`Clock::system()`].
    pub fn advance(&self, by: Duration) {
        if let Source::Manual(at) = &self.0 {
            let mut at = at.write().unwrap_or_else(PoisonError::into_inner);
            *at = *at + by;
        }
    }
}
