//! Historical data access port trait.

use crate::domain::dataset::Series;
use crate::domain::error::ArborError;

pub trait DataPort {
    /// The full price/indicator table for one identifier. `Ok(None)` means
    /// the provider has nothing for it, which is a diagnosable condition
    /// rather than an error.
    fn fetch_series(&self, identifier: &str) -> Result<Option<Series>, ArborError>;
}
