//! One line per experiment.

use std::fmt;
use std::time::Duration;

use crate::Experiment;

/// Result of a single experiment.
///
/// `expected` is `None` for experiments that only measure (the timed loop),
/// which always pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Which experiment ran.
    pub experiment: Experiment,
    /// What a correct run observes.
    pub expected: Option<String>,
    /// What this run observed.
    pub observed: String,
    /// Wall-clock time of the workload. Informational only.
    pub elapsed: Duration,
}

impl Report {
    /// Returns `true` if the observed result matches the expected one.
    pub fn passed(&self) -> bool {
        self.expected
            .as_deref()
            .map_or(true, |expected| expected == self.observed)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.passed() { "ok  " } else { "FAIL" };
        write!(f, "{status} {:<15} {}", self.experiment, self.observed)?;
        if let Some(expected) = &self.expected {
            write!(f, " (expected {expected})")?;
        }
        write!(f, " in {:.2?}", self.elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_when_equal() {
        let report = Report {
            experiment: Experiment::AtomicCounter,
            expected: Some("40000".into()),
            observed: "40000".into(),
            elapsed: Duration::from_millis(3),
        };
        assert!(report.passed());
        assert_eq!(
            report.to_string(),
            "ok   atomic-counter  40000 (expected 40000) in 3.00ms"
        );
    }

    #[test]
    fn fails_when_different() {
        let report = Report {
            experiment: Experiment::LockedCounter,
            expected: Some("40000".into()),
            observed: "39999".into(),
            elapsed: Duration::ZERO,
        };
        assert!(!report.passed());
        assert!(report.to_string().starts_with("FAIL locked-counter"));
    }

    #[test]
    fn measurement_only_always_passes() {
        let report = Report {
            experiment: Experiment::TimedLoop,
            expected: None,
            observed: "1000000 iterations".into(),
            elapsed: Duration::from_micros(250),
        };
        assert!(report.passed());
        assert!(!report.to_string().contains("expected"));
    }
}
