//! Tick counts.

/// A count of master clock ticks.
///
/// The CPU is the only clock source, so a tick is one CPU cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Ticks(u64);

impl Ticks {
    #[must_use]
    pub const fn new(count: u64) -> Self {
        Self(count)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// The count as a signed cycle budget, for countdowns that run below
    /// zero before being topped up.
    #[must_use]
    pub const fn as_budget(self) -> i64 {
        self.0 as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_matches_count() {
        assert_eq!(Ticks::new(50_000).as_budget(), 50_000);
        assert!(Ticks::new(1) < Ticks::new(2));
    }
}
