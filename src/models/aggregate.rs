use crate::models::Tenths;

/// Running statistics for one station, all in tenths.
///
/// Invariant: `min <= every observed value <= max`, `sum` is the exact sum of
/// observed tenths and `count >= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StationAggregate {
    pub min: i32,
    pub max: i32,
    pub sum: i64,
    pub count: u64,
}

impl StationAggregate {
    /// Seed an aggregate from its first observation
    pub fn new(value: i32) -> Self {
        Self {
            min: value,
            max: value,
            sum: i64::from(value),
            count: 1,
        }
    }

    #[inline]
    pub fn observe(&mut self, value: i32) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += i64::from(value);
        self.count += 1;
    }

    /// Combine another partial aggregate for the same station into this one
    #[inline]
    pub fn merge(&mut self, other: &StationAggregate) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.sum += other.sum;
        self.count += other.count;
    }

    /// Mean in tenths, rounded half up (towards positive infinity).
    ///
    /// `floor(sum / count + 1/2)` computed as `floor((2 * sum + count) / (2 * count))`
    /// in integers, so 15.25 becomes 15.3 and -0.15 becomes -0.1.
    pub fn mean_tenths(&self) -> i64 {
        let count = self.count as i128;
        let numerator = 2 * self.sum as i128 + count;
        numerator.div_euclid(2 * count) as i64
    }

    pub fn min_display(&self) -> Tenths {
        Tenths::from(self.min)
    }

    pub fn mean_display(&self) -> Tenths {
        Tenths(self.mean_tenths())
    }

    pub fn max_display(&self) -> Tenths {
        Tenths::from(self.max)
    }
}
