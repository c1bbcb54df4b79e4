//! Port trait exposed to host query engines.
//!
//! A row source is a pull-based cursor: the host calls [`RowSource::advance`]
//! until it reports [`Advance::End`], reading cells of the current row with
//! [`RowSource::value_at`] in between.

use async_trait::async_trait;

use crate::error::{ScanError, ScanResult};
use crate::schema::{Column, ColumnDef, Value};

/// Outcome of a successful advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// A row is available for projection.
    Row,
    /// No more rows. Not an error.
    End,
}

/// Pull-based row source.
#[async_trait]
pub trait RowSource: Send {
    /// Columns produced by this source.
    fn schema(&self) -> &'static [ColumnDef];

    /// Move to the next row.
    ///
    /// After an `Err`, the source must not be advanced again.
    async fn advance(&mut self) -> ScanResult<Advance>;

    /// Cell of the current row.
    fn value_at(&self, column: Column) -> ScanResult<Value>;

    /// Cell of the current row, addressed by schema position.
    fn value_at_index(&self, index: usize) -> ScanResult<Value> {
        let column = Column::from_index(index).ok_or(ScanError::UnknownColumn(index))?;
        self.value_at(column)
    }

    /// All cells of the current row, in schema order.
    fn row(&self) -> ScanResult<Vec<Value>> {
        self.schema()
            .iter()
            .map(|def| self.value_at(def.column))
            .collect()
    }
}
