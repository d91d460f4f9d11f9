//! Single-subscriber delivery of fresh temperature readings.

use crate::hardware::TemperatureReading;
use std::sync::{Arc, Mutex, PoisonError};

type Callback = Arc<dyn Fn(TemperatureReading) + Send + Sync>;

/// Holds at most one temperature-changed callback.
///
/// Registering replaces the previous callback rather than adding to it.
#[derive(Default)]
pub struct TemperatureObserver {
    slot: Mutex<Option<Callback>>,
}

impl TemperatureObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `callback`, returning `true` if it replaced an earlier one.
    pub fn register<F>(&self, callback: F) -> bool
    where
        F: Fn(TemperatureReading) + Send + Sync + 'static,
    {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.replace(Arc::new(callback)).is_some()
    }

    #[cfg(test)]
    fn clear(&self) {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    #[cfg(test)]
    fn is_registered(&self) -> bool {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Deliver `reading` to the current subscriber, if any.
    pub fn notify(&self, reading: TemperatureReading) {
        // Release the lock before calling out so the callback may re-register.
        let callback = self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(callback) = callback {
            callback(reading);
        }
    }
}
