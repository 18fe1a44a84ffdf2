//! Validated primitives shared across the oBDS pipeline crates.
//!
//! - [`NonEmptyText`]: trimmed text that is guaranteed to contain something.
//! - [`ReportDate`]: a registry date with explicit precision, as reported by cancer registries
//!   where day or month may be unknown.

mod date;
mod text;

pub use date::{DateError, DatePrecision, ReportDate};
pub use text::{NonEmptyText, TextError};
