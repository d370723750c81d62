//! Cancellable waits with countdown reporting

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use super::events::{EventBus, HuntEvent};
use crate::{HunterError, Result};

/// Granularity at which waits notice a cancel request
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Sleeps in small slices, bailing out as soon as `cancel` is raised
pub struct Countdown<'a> {
    cancel: &'a AtomicBool,
    events: Option<&'a EventBus>,
}

impl<'a> Countdown<'a> {
    pub fn new(cancel: &'a AtomicBool) -> Self {
        Self {
            cancel,
            events: None,
        }
    }

    /// Report remaining whole seconds to `events`
    pub fn with_events(mut self, events: &'a EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Wait `secs` seconds.
    ///
    /// Returns [`HunterError::Cancelled`] if the cancel flag is (or becomes)
    /// set. A countdown event is emitted when the wait starts and whenever
    /// the rounded-up remaining seconds change.
    pub fn wait(&self, secs: f64, label: &str) -> Result<()> {
        if self.is_cancelled() {
            return Err(HunterError::Cancelled);
        }
        if !secs.is_finite() || secs <= 0.0 {
            return Ok(());
        }

        let total = Duration::from_secs_f64(secs);
        let start = Instant::now();
        let mut last_reported = None;

        loop {
            let elapsed = start.elapsed();
            if elapsed >= total {
                return Ok(());
            }
            let remaining = total - elapsed;

            if let Some(events) = self.events {
                let whole = remaining.as_secs_f64().ceil() as u64;
                if last_reported != Some(whole) {
                    last_reported = Some(whole);
                    events.emit(HuntEvent::Countdown {
                        remaining_secs: whole,
                        label: label.to_string(),
                    });
                }
            }

            thread::sleep(remaining.min(POLL_INTERVAL));
            if self.is_cancelled() {
                log::debug!("Wait '{}' cancelled", label);
                return Err(HunterError::Cancelled);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_wait_elapses() {
        let cancel = AtomicBool::new(false);
        let start = Instant::now();
        Countdown::new(&cancel).wait(0.12, "short").unwrap();
        assert!(start.elapsed() >= Duration::from_millis(120));
    }

    #[test]
    fn test_zero_wait_returns_at_once() {
        let cancel = AtomicBool::new(false);
        let start = Instant::now();
        Countdown::new(&cancel).wait(0.0, "none").unwrap();
        assert!(start.elapsed() < POLL_INTERVAL);
    }

    #[test]
    fn test_already_cancelled() {
        let cancel = AtomicBool::new(true);
        let err = Countdown::new(&cancel).wait(0.0, "x").unwrap_err();
        assert!(matches!(err, HunterError::Cancelled));
    }

    #[test]
    fn test_cancel_interrupts_long_wait() {
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = cancel.clone();
        let setter = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            flag.store(true, Ordering::SeqCst);
        });

        let start = Instant::now();
        let result = Countdown::new(&cancel).wait(30.0, "long");
        setter.join().unwrap();

        assert!(matches!(result, Err(HunterError::Cancelled)));
        assert!(start.elapsed() < Duration::from_millis(100) + Duration::from_millis(200));
    }

    #[test]
    fn test_countdown_events() {
        let cancel = AtomicBool::new(false);
        let bus = EventBus::new();
        let rx = bus.subscribe();

        Countdown::new(&cancel)
            .with_events(&bus)
            .wait(1.2, "Retry")
            .unwrap();

        let seconds: Vec<u64> = rx
            .try_iter()
            .filter_map(|e| match e {
                HuntEvent::Countdown { remaining_secs, label } => {
                    assert_eq!(label, "Retry");
                    Some(remaining_secs)
                }
                _ => None,
            })
            .collect();
        assert_eq!(seconds, vec![2, 1]);
    }
}
