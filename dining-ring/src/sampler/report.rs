//! Fairness statistics of one sampling epoch.

use std::fmt;

use serde::Serialize;

/// Per-epoch eating statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FairnessReport {
    /// Ticks counted, at most the sampler cap.
    pub samples: u64,
    /// Ticks during which each actor was eating.
    pub eat_counts: Vec<u64>,
    /// Fraction of ticks each actor spent eating.
    pub normalized: Vec<f64>,
    /// Optimal ticks.
    pub optimal: u64,
    /// Suboptimal ticks.
    pub suboptimal: u64,
    /// Share of optimal ticks, as a percentage.
    pub percent_optimal: f64,
    /// Invariant violations observed during the epoch.
    pub invariant_violations: Vec<String>,
}

impl FairnessReport {
    /// Build a report from raw counters.
    pub fn new(
        samples: u64,
        eat_counts: Vec<u64>,
        optimal: u64,
        suboptimal: u64,
        invariant_violations: Vec<String>,
    ) -> Self {
        let ratio = |count: u64| {
            if samples == 0 {
                0.0
            } else {
                count as f64 / samples as f64
            }
        };
        Self {
            samples,
            normalized: eat_counts.iter().map(|&count| ratio(count)).collect(),
            eat_counts,
            optimal,
            suboptimal,
            percent_optimal: ratio(optimal) * 100.0,
            invariant_violations,
        }
    }

    /// Smallest normalized eating frequency across actors.
    pub fn min_normalized(&self) -> f64 {
        self.normalized.iter().copied().fold(f64::INFINITY, f64::min)
    }
}

impl fmt::Display for FairnessReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "samples- {}", self.samples)?;
        write!(f, "aggregate eating-")?;
        for count in &self.eat_counts {
            write!(f, " {count}")?;
        }
        writeln!(f)?;
        write!(f, "aggregate eating(normalized)-")?;
        for freq in &self.normalized {
            write!(f, " {freq:.3}")?;
        }
        writeln!(f)?;
        writeln!(f, "optimal- {}", self.optimal)?;
        writeln!(f, "suboptimal- {}", self.suboptimal)?;
        write!(f, "percentOpt = {:.2}", self.percent_optimal)?;

        if !self.invariant_violations.is_empty() {
            writeln!(f)?;
            writeln!(f)?;
            write!(f, "Invariant violations:")?;
            for violation in &self.invariant_violations {
                write!(f, "\n  {violation}")?;
            }
        }
        Ok(())
    }
}
