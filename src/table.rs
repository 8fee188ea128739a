use arrow::array::{
    new_empty_array, new_null_array, Array, ArrayRef, PrimitiveArray, StringArray,
    TimestampMillisecondArray, UInt64Array,
};
use arrow::compute;
use arrow::datatypes::{
    ArrowPrimitiveType, DataType, Field, FieldRef, Schema, SchemaRef, TimeUnit,
    TimestampMillisecondType,
};
use arrow::error::ArrowError;
use std::ops::Range;
use std::slice;
use std::sync::Arc;

use crate::timestamp;

/// Rows of cells represented in a column-oriented form.
#[derive(Debug, Clone)]
pub struct Table {
    schema: SchemaRef,
    columns: Vec<Column>,
}

impl Table {
    /// Creates a table without columns or rows.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            schema: Arc::new(Schema::empty()),
            columns: Vec::new(),
        }
    }

    /// Builds a table of text columns named `names` from row-major cells.
    ///
    /// Rows shorter than `names` are padded with nulls; extra cells are
    /// ignored.
    #[must_use]
    pub fn from_rows(names: &[String], rows: &[Vec<Option<String>>]) -> Self {
        let fields: Vec<Field> = names
            .iter()
            .map(|name| Field::new(name, DataType::Utf8, true))
            .collect();
        let columns = (0..names.len())
            .map(|i| {
                let array: StringArray = rows
                    .iter()
                    .map(|row| row.get(i).and_then(Option::as_deref))
                    .collect();
                Column::from(Arc::new(array) as ArrayRef)
            })
            .collect();
        Self {
            schema: Arc::new(Schema::new(fields)),
            columns,
        }
    }

    /// Moves all the rows of `other` into `self`, leaving `other` empty.
    ///
    /// Columns are matched by name. A column missing on either side is
    /// filled with nulls, and columns new to `self` are added after its
    /// existing ones.
    pub fn append(&mut self, other: &mut Self) {
        let self_rows = self.num_rows();
        let other_rows = other.num_rows();
        let existing = self.columns.len();
        let mut fields: Vec<FieldRef> = self.schema.fields().iter().cloned().collect();
        let mut matched = vec![false; existing];

        let other_fields = other.schema.fields().clone();
        for (field, other_col) in other_fields.iter().zip(other.columns.iter_mut()) {
            if let Some(i) = fields.iter().position(|f| f.name() == field.name()) {
                self.columns[i].append(other_col);
                if i < existing {
                    matched[i] = true;
                }
            } else {
                let mut column = Column::nulls(field.data_type(), self_rows);
                column.append(other_col);
                fields.push(field.clone());
                self.columns.push(column);
            }
        }
        for (column, _) in self
            .columns
            .iter_mut()
            .zip(matched)
            .filter(|(_, matched)| !matched)
        {
            let mut padding = Column::nulls(column.data_type(), other_rows);
            column.append(&mut padding);
        }
        self.schema = Arc::new(Schema::new(fields));
        other.schema = Arc::new(Schema::empty());
        other.columns.clear();
    }

    /// Returns an `Iterator` for columns.
    pub fn columns(&self) -> slice::Iter<Column> {
        self.columns.iter()
    }

    /// Returns an immutable reference of a specific column
    #[must_use]
    pub fn column(&self, i: usize) -> Option<&Column> {
        self.columns.get(i)
    }

    /// Returns the position of the column named `name`.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.schema.fields().iter().position(|f| f.name() == name)
    }

    /// Returns the column names in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.schema.fields().iter().map(|f| f.name().as_str())
    }

    /// Returns the number of columns in the table.
    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Returns the number of rows in the table.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    /// Returns the schema of the table.
    #[must_use]
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Replaces the `i`-th column, updating its type in the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no `i`-th column or `column` has a
    /// different length.
    pub fn replace_column(&mut self, i: usize, column: Column) -> Result<(), &'static str> {
        let Some(current) = self.columns.get(i) else {
            return Err("column index out of range");
        };
        if current.len() != column.len() {
            return Err("columns must have the same length");
        }
        let fields: Vec<FieldRef> = self
            .schema
            .fields()
            .iter()
            .enumerate()
            .map(|(j, f)| {
                if j == i {
                    Arc::new(Field::new(f.name(), column.data_type().clone(), true))
                } else {
                    f.clone()
                }
            })
            .collect();
        self.schema = Arc::new(Schema::new(fields));
        self.columns[i] = column;
        Ok(())
    }

    /// Builds a new table whose `k`-th row is row `indices[k]` of `self`.
    ///
    /// # Errors
    ///
    /// Returns an error if an index is out of range.
    pub fn take(&self, indices: &UInt64Array) -> Result<Self, ArrowError> {
        let columns = self
            .columns
            .iter()
            .map(|c| c.take(indices))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            schema: self.schema.clone(),
            columns,
        })
    }
}

/// A single column in a table, kept as a sequence of arrays.
#[derive(Clone, Debug)]
pub struct Column {
    data_type: DataType,
    arrays: Vec<ArrayRef>,
    cumlen: Vec<usize>,
    len: usize,
}

impl Column {
    /// Creates a column of the given type without any cell.
    #[must_use]
    pub fn empty(data_type: DataType) -> Self {
        Self {
            data_type,
            arrays: Vec::new(),
            cumlen: vec![0],
            len: 0,
        }
    }

    /// Creates a column of `len` nulls.
    #[must_use]
    pub fn nulls(data_type: &DataType, len: usize) -> Self {
        new_null_array(data_type, len).into()
    }

    /// Creates a column of millisecond timestamps.
    #[must_use]
    pub fn timestamps(values: Vec<Option<i64>>) -> Self {
        (Arc::new(TimestampMillisecondArray::from(values)) as ArrayRef).into()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    fn locate(&self, index: usize) -> Option<(usize, usize)> {
        if index >= self.len {
            return None;
        }
        // Empty arrays are never stored, so `cumlen` is strictly increasing.
        Some(match self.cumlen.binary_search(&index) {
            Ok(i) => (i, 0),
            Err(i) => (i - 1, index - self.cumlen[i - 1]),
        })
    }

    /// Return the value specified by the index as type T
    ///
    /// # Errors
    ///
    /// Returns an error if it's fail to convert the value to the specified type
    pub fn primitive_try_get<T>(&self, index: usize) -> Result<Option<T::Native>, TypeError>
    where
        T: ArrowPrimitiveType,
    {
        let Some((array_index, inner_index)) = self.locate(index) else {
            return Ok(None);
        };
        let Some(typed_arr) = self.arrays[array_index]
            .as_any()
            .downcast_ref::<PrimitiveArray<T>>()
        else {
            return Err(TypeError());
        };
        if typed_arr.is_null(inner_index) {
            Ok(None)
        } else {
            Ok(Some(typed_arr.value(inner_index)))
        }
    }

    /// Return the value specified by the index as string
    ///
    /// # Errors
    ///
    /// Returns an error if it's fail to convert the value to string
    pub fn string_try_get(&self, index: usize) -> Result<Option<&str>, TypeError> {
        let Some((array_index, inner_index)) = self.locate(index) else {
            return Ok(None);
        };
        let Some(typed_arr) = self.arrays[array_index]
            .as_any()
            .downcast_ref::<StringArray>()
        else {
            return Err(TypeError());
        };
        if typed_arr.is_null(inner_index) {
            Ok(None)
        } else {
            Ok(Some(typed_arr.value(inner_index)))
        }
    }

    /// Renders the cell at `index` as text; `None` for a null cell.
    #[must_use]
    pub fn display_value(&self, index: usize) -> Option<String> {
        match self.data_type {
            DataType::Utf8 => self
                .string_try_get(index)
                .ok()
                .flatten()
                .map(ToString::to_string),
            DataType::Timestamp(TimeUnit::Millisecond, _) => self
                .primitive_try_get::<TimestampMillisecondType>(index)
                .ok()
                .flatten()
                .and_then(timestamp::format_millis),
            _ => None,
        }
    }

    fn append(&mut self, other: &mut Self) {
        for array in other.arrays.drain(..) {
            self.len += array.len();
            self.cumlen.push(self.len);
            self.arrays.push(array);
        }
        other.cumlen.truncate(1);
        other.len = 0;
    }

    /// Concatenates the arrays of this column into one.
    ///
    /// # Errors
    ///
    /// Returns an error if the arrays have different types.
    pub fn flatten(&self) -> Result<ArrayRef, ArrowError> {
        match self.arrays.as_slice() {
            [] => Ok(new_empty_array(&self.data_type)),
            [array] => Ok(array.clone()),
            arrays => {
                let arrays: Vec<&dyn Array> = arrays.iter().map(|a| a.as_ref()).collect();
                compute::concat(&arrays)
            }
        }
    }

    /// Gathers the cells at `indices` into a new single-array column.
    ///
    /// # Errors
    ///
    /// Returns an error if an index is out of range.
    pub fn take(&self, indices: &UInt64Array) -> Result<Self, ArrowError> {
        let array = self.flatten()?;
        Ok(compute::take(array.as_ref(), indices, None)?.into())
    }

    /// Creates an iterator over the text cells of this column.
    ///
    /// # Errors
    ///
    /// Returns an error if this is not a text column.
    pub fn string_iter(&self) -> Result<StringIter<'_>, TypeError> {
        if self.data_type == DataType::Utf8 {
            Ok(StringIter::new(self, 0..self.len))
        } else {
            Err(TypeError())
        }
    }
}

impl From<ArrayRef> for Column {
    fn from(array: ArrayRef) -> Self {
        let mut column = Self::empty(array.data_type().clone());
        if !array.is_empty() {
            column.len = array.len();
            column.cumlen.push(column.len);
            column.arrays.push(array);
        }
        column
    }
}

#[derive(Debug, Eq, PartialEq)]
pub struct TypeError();

pub struct StringIter<'a> {
    column: &'a Column,
    rows: Range<usize>,
}

impl<'a> StringIter<'a> {
    fn new(column: &'a Column, rows: Range<usize>) -> Self {
        Self { column, rows }
    }
}

impl<'a> Iterator for StringIter<'a> {
    type Item = Option<&'a str>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        Some(self.column.string_try_get(row).ok().flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    fn row(cells: &[&str]) -> Vec<Option<String>> {
        cells
            .iter()
            .map(|c| {
                if c.is_empty() {
                    None
                } else {
                    Some((*c).to_string())
                }
            })
            .collect()
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    fn cells(table: &Table) -> Vec<Vec<Option<String>>> {
        (0..table.num_rows())
            .map(|r| table.columns().map(|c| c.display_value(r)).collect())
            .collect()
    }

    #[test]
    fn column_new() {
        let column = Column::empty(DataType::Utf8);
        assert_eq!(column.len(), 0);
        assert_eq!(column.string_try_get(0), Ok(None));
        assert!(column.is_empty());

        let column = Column::timestamps(vec![Some(4), Some(5)]);
        assert_eq!(
            column.primitive_try_get::<TimestampMillisecondType>(1),
            Ok(Some(5))
        );
        assert_eq!(column.string_try_get(1), Err(TypeError()));
        assert!(column.string_iter().is_err());
    }

    #[test]
    fn rows_are_padded() {
        let table = Table::from_rows(
            &names(&["ts", "temp", "hum"]),
            &[row(&["09:00", "21.5"]), row(&["10:00", "", "40", "extra"])],
        );
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.num_columns(), 3);
        assert_eq!(
            table.column_names().collect::<Vec<_>>(),
            ["ts", "temp", "hum"]
        );
        assert_eq!(
            cells(&table),
            [row(&["09:00", "21.5", ""]), row(&["10:00", "", "40"])]
        );
    }

    #[test]
    fn append_same_columns() {
        let mut first = Table::from_rows(&names(&["a", "b"]), &[row(&["1", "x"])]);
        let mut second =
            Table::from_rows(&names(&["a", "b"]), &[row(&["2", "y"]), row(&["3", "z"])]);
        first.append(&mut second);
        assert_eq!(second.num_rows(), 0);
        assert_eq!(first.num_rows(), 3);
        assert_eq!(
            cells(&first),
            [row(&["1", "x"]), row(&["2", "y"]), row(&["3", "z"])]
        );
        let column = first.column(0).unwrap();
        assert_eq!(
            column.string_iter().unwrap().collect::<Vec<_>>(),
            [Some("1"), Some("2"), Some("3")]
        );
    }

    #[test]
    fn append_unions_columns() {
        let mut combined = Table::empty();
        let mut first = Table::from_rows(&names(&["a", "b"]), &[row(&["1", "x"])]);
        let mut second = Table::from_rows(&names(&["c", "a"]), &[row(&["k", "2"])]);
        let mut third = Table::from_rows(&names(&["a"]), &[]);
        combined.append(&mut first);
        combined.append(&mut second);
        combined.append(&mut third);
        assert_eq!(combined.column_names().collect::<Vec<_>>(), ["a", "b", "c"]);
        assert_eq!(combined.num_rows(), 2);
        assert_eq!(cells(&combined), [row(&["1", "x", ""]), row(&["2", "", "k"])]);
        assert!(combined.columns().all(|c| c.len() == 2));
    }

    #[test]
    fn take_reorders_rows() {
        let mut first = Table::from_rows(&names(&["a"]), &[row(&["1"]), row(&["2"])]);
        let mut second = Table::from_rows(&names(&["a"]), &[row(&["3"])]);
        first.append(&mut second);
        let taken = first.take(&UInt64Array::from(vec![2, 0, 1])).unwrap();
        assert_eq!(cells(&taken), [row(&["3"]), row(&["1"]), row(&["2"])]);
        assert_eq!(taken.column(0).unwrap().flatten().unwrap().len(), 3);
    }

    #[test]
    fn replace_with_timestamps() {
        let mut table = Table::from_rows(&names(&["ts"]), &[row(&["a"]), row(&[""])]);
        let column = Column::timestamps(vec![Some(1_000), None]);
        table.replace_column(0, column).unwrap();
        assert_eq!(
            table.schema().field(0).data_type(),
            &DataType::Timestamp(TimeUnit::Millisecond, None)
        );
        assert_eq!(
            cells(&table),
            [vec![Some("1970-01-01 00:00:01".to_string())], vec![None]]
        );
        let column = table.column(0).unwrap();
        let values: Vec<_> = (0..column.len())
            .map(|i| column.primitive_try_get::<TimestampMillisecondType>(i))
            .collect();
        assert_eq!(values, [Ok(Some(1_000)), Ok(None)]);
        assert!(table.replace_column(0, Column::timestamps(vec![Some(1)])).is_err());
        assert!(table.replace_column(1, Column::timestamps(vec![Some(1)])).is_err());
    }
}
