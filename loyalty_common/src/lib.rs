mod minor_units;

pub mod helpers;
pub mod op;

pub use minor_units::{AmountConversionError, MinorUnits, MINOR_UNIT_SCALE};
