use std::fmt;

/// A single parsed row, borrowing its name from the chunk it came from.
///
/// The value is held in tenths of a unit (`-9.3` is `-93`), so accumulation
/// never touches floating point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StationRecord<'a> {
    pub name: &'a [u8],
    pub value: i32,
}

impl<'a> StationRecord<'a> {
    pub fn new(name: &'a [u8], value: i32) -> Self {
        Self { name, value }
    }
}

/// Display adapter rendering a tenths value with exactly one fractional digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tenths(pub i64);

impl Tenths {
    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 10.0
    }
}

impl fmt::Display for Tenths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{}", sign, abs / 10, abs % 10)
    }
}

impl From<i32> for Tenths {
    fn from(value: i32) -> Self {
        Tenths(i64::from(value))
    }
}
