pub mod luhn;

pub use luhn::is_valid_luhn;
