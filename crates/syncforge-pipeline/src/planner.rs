//! Sync/trim planning from an alignment result.

use syncforge_av::AlignmentResult;
use syncforge_core::{Error, Result};

/// Where each source starts and how long both run after alignment.
///
/// At most one of `start_a` / `start_b` is non-zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimPlan {
    pub start_a: f64,
    pub start_b: f64,
    pub final_duration: f64,
}

impl TrimPlan {
    /// Pure planning rule.
    ///
    /// A positive offset means A lags, so B is cut at the front; a negative
    /// offset cuts A instead. The common duration is what remains of the
    /// shorter source after its cut.
    pub fn compute(duration_a: f64, duration_b: f64, alignment: &AlignmentResult) -> Self {
        let offset = alignment.offset_seconds;
        let (start_a, start_b) = if offset > 0.0 {
            (0.0, offset)
        } else if offset < 0.0 {
            (-offset, 0.0)
        } else {
            (0.0, 0.0)
        };

        Self {
            start_a,
            start_b,
            final_duration: (duration_a - start_a).min(duration_b - start_b),
        }
    }

    /// Reject plans with nothing left to encode.
    pub fn ensure_positive(self) -> Result<Self> {
        if self.final_duration.is_finite() && self.final_duration > 0.0 {
            Ok(self)
        } else {
            Err(Error::InvalidTrimPlan(format!(
                "final duration {:.3}s is not positive (startA={:.3}s, startB={:.3}s)",
                self.final_duration, self.start_a, self.start_b
            )))
        }
    }
}

/// Warning shown for results below the confidence threshold.
pub fn confidence_warning(alignment: &AlignmentResult) -> Option<String> {
    alignment.is_low_confidence().then(|| {
        format!(
            "Low alignment confidence ({:.2}, quality: {}); check the sync manually",
            alignment.confidence,
            if alignment.quality.is_empty() { "unknown" } else { alignment.quality.as_str() }
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn alignment(offset: f64, confidence: f64) -> AlignmentResult {
        AlignmentResult {
            offset_seconds: offset,
            confidence,
            quality: "good".into(),
            method: None,
            checkpoints: Vec::new(),
        }
    }

    #[test]
    fn positive_offset_cuts_b() {
        let plan = TrimPlan::compute(60.0, 70.0, &alignment(2.5, 0.9));
        assert_eq!(plan, TrimPlan { start_a: 0.0, start_b: 2.5, final_duration: 60.0 });
    }

    #[test]
    fn negative_offset_cuts_a() {
        let plan = TrimPlan::compute(60.0, 50.0, &alignment(-4.0, 0.9));
        assert_eq!(plan, TrimPlan { start_a: 4.0, start_b: 0.0, final_duration: 50.0 });
    }

    #[test]
    fn zero_offset_cuts_nothing() {
        let plan = TrimPlan::compute(30.0, 31.0, &alignment(0.0, 0.9));
        assert_eq!(plan, TrimPlan { start_a: 0.0, start_b: 0.0, final_duration: 30.0 });
    }

    #[test]
    fn property_grid() {
        let durations = [0.5, 3.0, 59.94, 61.2, 600.0];
        let offsets = [-30.0, -2.0, -0.04, 0.0, 0.01, 1.5, 25.0];
        for &da in &durations {
            for &db in &durations {
                for &o in &offsets {
                    let plan = TrimPlan::compute(da, db, &alignment(o, 0.8));
                    assert!(plan.start_a >= 0.0 && plan.start_b >= 0.0);
                    if o == 0.0 {
                        assert_eq!((plan.start_a, plan.start_b), (0.0, 0.0));
                    } else {
                        // Exactly one start carries |o|, the other is zero.
                        let starts = [plan.start_a, plan.start_b];
                        assert_eq!(starts.iter().filter(|&&s| s == o.abs()).count(), 1);
                        assert_eq!(starts.iter().filter(|&&s| s == 0.0).count(), 1);
                    }
                    assert_eq!(
                        plan.final_duration,
                        (da - plan.start_a).min(db - plan.start_b)
                    );
                    if o.abs() < da.min(db) {
                        assert!(plan.final_duration > 0.0, "da={da} db={db} o={o}");
                        assert!(plan.ensure_positive().is_ok());
                    }
                }
            }
        }
    }

    #[test]
    fn offset_beyond_duration_is_rejected() {
        let plan = TrimPlan::compute(10.0, 5.0, &alignment(6.0, 0.9));
        assert_matches!(plan.ensure_positive(), Err(Error::InvalidTrimPlan(_)));
    }

    #[test]
    fn low_confidence_only_warns() {
        assert!(confidence_warning(&alignment(1.0, 0.49)).is_some());
        assert!(confidence_warning(&alignment(1.0, 0.5)).is_none());
        let plan = TrimPlan::compute(10.0, 10.0, &alignment(1.0, 0.1));
        assert!(plan.ensure_positive().is_ok());
    }
}
