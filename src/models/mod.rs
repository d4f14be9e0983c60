pub mod aggregate;
pub mod measurement;
pub mod table;

pub use aggregate::StationAggregate;
pub use measurement::{StationRecord, Tenths};
pub use table::{GlobalTable, PartialTable, StationTable};
