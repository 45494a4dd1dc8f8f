//! Cursors over materialized table rows

use crate::table::Value;
use crate::vm::row_source::TableRows;
use crate::vm::value::Scalar;

/// Iteration state for one open table
///
/// `position` is -1 before the first `Rewind`/`Next`, and equal to the row
/// count once the cursor has walked off the end.
#[derive(Debug)]
pub struct Cursor {
    data: TableRows,
    position: isize,
}

impl Cursor {
    pub fn new(data: TableRows) -> Self {
        Cursor {
            data,
            position: -1,
        }
    }

    pub fn len(&self) -> usize {
        self.data.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.rows.is_empty()
    }

    /// Move to the first row. Returns false when there are no rows.
    pub fn rewind(&mut self) -> bool {
        self.position = 0;
        !self.is_empty()
    }

    /// Advance one row. Returns true while the cursor is still on a row.
    pub fn advance(&mut self) -> bool {
        let len = self.len() as isize;
        if self.position < len {
            self.position += 1;
        }
        self.position < len
    }

    fn current_index(&self) -> Option<usize> {
        usize::try_from(self.position)
            .ok()
            .filter(|&idx| idx < self.len())
    }

    /// Value of column `col` on the current row; NULL when unpositioned or
    /// out of range.
    pub fn column(&self, col: i32) -> Scalar {
        let (Some(row_idx), Ok(col_idx)) = (self.current_index(), usize::try_from(col)) else {
            return Scalar::Null;
        };
        self.data
            .columns
            .get(col_idx)
            .and_then(|name| self.data.rows[row_idx].get(name))
            .map(Scalar::from)
            .unwrap_or(Scalar::Null)
    }

    /// 1-based row number of the current row; NULL when unpositioned
    pub fn rowid(&self) -> Scalar {
        match self.current_index() {
            Some(idx) => Scalar::Integer(idx as i64 + 1),
            None => Scalar::Null,
        }
    }

    /// Raw row access, mainly for diagnostics
    pub fn current_row(&self) -> Option<&std::collections::HashMap<String, Value>> {
        self.current_index().map(|idx| &self.data.rows[idx])
    }
}
