//! Progress reporting side channel.

/// A progress update for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// Fraction of the run completed, within `[0, 1]`.
    pub fraction: f32,
    pub message: String,
}

/// Callback for progress events.
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;

/// Forwards events to an optional callback, keeping fractions monotonic.
#[derive(Default)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    last: f32,
}

impl ProgressReporter {
    pub fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            callback,
            last: 0.0,
        }
    }

    /// Start a new run at zero.
    pub fn reset(&mut self) {
        self.last = 0.0;
    }

    /// Emit an event; fractions below the last one are raised to it.
    pub fn report(&mut self, fraction: f32, message: impl Into<String>) {
        let fraction = if fraction.is_nan() {
            self.last
        } else {
            fraction.clamp(0.0, 1.0).max(self.last)
        };
        self.last = fraction;

        if let Some(ref callback) = self.callback {
            callback(ProgressEvent {
                fraction,
                message: message.into(),
            });
        }
    }

    /// Report `done` of `total` units within the band `[start, end]`.
    pub fn report_within(
        &mut self,
        start: f32,
        end: f32,
        done: usize,
        total: usize,
        message: impl Into<String>,
    ) {
        let ratio = if total == 0 {
            1.0
        } else {
            done as f32 / total as f32
        };
        self.report(start + (end - start) * ratio, message);
    }

    pub fn last_fraction(&self) -> f32 {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording() -> (ProgressReporter, Arc<Mutex<Vec<ProgressEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let reporter = ProgressReporter::new(Some(Box::new(move |event| {
            sink.lock().unwrap().push(event);
        })));
        (reporter, events)
    }

    #[test]
    fn test_fractions_never_decrease() {
        let (mut reporter, events) = recording();
        reporter.report(0.5, "half");
        reporter.report(0.2, "late event");
        reporter.report(1.5, "overshoot");

        let fractions: Vec<f32> = events.lock().unwrap().iter().map(|e| e.fraction).collect();
        assert_eq!(fractions, vec![0.5, 0.5, 1.0]);
    }

    #[test]
    fn test_report_within_band() {
        let (mut reporter, events) = recording();
        reporter.report_within(0.2, 0.6, 1, 4, "one of four");
        reporter.report_within(0.2, 0.6, 0, 0, "nothing to do");

        let events = events.lock().unwrap();
        assert!((events[0].fraction - 0.3).abs() < 1e-6);
        assert!((events[1].fraction - 0.6).abs() < 1e-6);
        assert_eq!(events[0].message, "one of four");
    }

    #[test]
    fn test_without_callback() {
        let mut reporter = ProgressReporter::default();
        reporter.report(0.7, "silent");
        assert_eq!(reporter.last_fraction(), 0.7);
        reporter.reset();
        assert_eq!(reporter.last_fraction(), 0.0);
    }
}
