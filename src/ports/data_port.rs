//! Market data access port trait.

use crate::domain::bar::Bar;
use crate::domain::error::ScannerError;

pub trait DataPort {
    /// The most recent `limit` bars for `symbol`, oldest first.
    fn fetch_ohlcv(&self, symbol: &str, limit: usize) -> Result<Vec<Bar>, ScannerError>;

    /// Bars for a macro asset (gold, dollar index, ...), oldest first.
    fn fetch_macro(&self, asset: &str) -> Result<Vec<Bar>, ScannerError>;

    fn list_symbols(&self) -> Result<Vec<String>, ScannerError>;
}
