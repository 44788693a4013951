use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::{
    error::{StorageError, StorageResult},
    storage::tuple::Tuple,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Boolean,
    SmallInt,
    Int,
    BigInt,
    Decimal,
    // Fixed length, zero padded
    Char(u16),
}

impl DataType {
    pub fn width(&self) -> usize {
        match self {
            DataType::Boolean => 1,
            DataType::SmallInt => 2,
            DataType::Int => 4,
            DataType::BigInt => 8,
            DataType::Decimal => 4,
            DataType::Char(len) => *len as usize,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Boolean(bool),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Decimal(f32),
    Char(String),
}

impl Field {
    fn matches(&self, data_type: &DataType) -> bool {
        matches!(
            (self, data_type),
            (Field::Boolean(_), DataType::Boolean)
                | (Field::SmallInt(_), DataType::SmallInt)
                | (Field::Int(_), DataType::Int)
                | (Field::BigInt(_), DataType::BigInt)
                | (Field::Decimal(_), DataType::Decimal)
                | (Field::Char(_), DataType::Char(_))
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub column_name: String,
    pub column_type: DataType,
}

impl Column {
    pub(crate) fn new(name: &str, column_type: DataType) -> Self {
        Self {
            column_name: name.to_string(),
            column_type,
        }
    }
}

pub struct SchemaBuilder {
    columns: Vec<Column>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    pub fn add_boolean(self, column_name: &str) -> Self {
        self.add(column_name, DataType::Boolean)
    }

    pub fn add_small_int(self, column_name: &str) -> Self {
        self.add(column_name, DataType::SmallInt)
    }

    pub fn add_int(self, column_name: &str) -> Self {
        self.add(column_name, DataType::Int)
    }

    pub fn add_big_int(self, column_name: &str) -> Self {
        self.add(column_name, DataType::BigInt)
    }

    pub fn add_decimal(self, column_name: &str) -> Self {
        self.add(column_name, DataType::Decimal)
    }

    pub fn add_char(self, column_name: &str, size: u16) -> Self {
        self.add(column_name, DataType::Char(size))
    }

    fn add(mut self, column_name: &str, column_type: DataType) -> Self {
        self.columns.push(Column::new(column_name, column_type));
        self
    }

    pub fn build(self) -> Schema {
        let width = self
            .columns
            .iter()
            .map(|column| column.column_type.width())
            .sum();

        Schema {
            columns: self.columns,
            width,
        }
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Column list of a table. Every tuple of the table is exactly `width()` bytes,
/// fields laid out back to back in column order, little endian.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
    width: usize,
}

impl Schema {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get_columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn get_col_idx(&self, col_name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| column.column_name == col_name)
    }

    pub fn validate_fields(&self, values: &[Field]) -> bool {
        values.len() == self.columns.len()
            && values
                .iter()
                .zip(&self.columns)
                .all(|(value, column)| value.matches(&column.column_type))
    }

    pub fn encode(&self, values: &[Field]) -> StorageResult<Tuple> {
        if !self.validate_fields(values) {
            return Err(mismatch(format!(
                "expected {} fields of types {:?}",
                self.columns.len(),
                self.columns
                    .iter()
                    .map(|column| column.column_type)
                    .collect::<Vec<_>>()
            )));
        }

        let mut buffer: Vec<u8> = Vec::with_capacity(self.width);

        for (value, column) in values.iter().zip(&self.columns) {
            match value {
                Field::Boolean(val) => buffer.write_u8(*val as u8)?,
                Field::SmallInt(val) => buffer.write_i16::<LittleEndian>(*val)?,
                Field::Int(val) => buffer.write_i32::<LittleEndian>(*val)?,
                Field::BigInt(val) => buffer.write_i64::<LittleEndian>(*val)?,
                Field::Decimal(val) => buffer.write_f32::<LittleEndian>(*val)?,
                Field::Char(val) => {
                    let len = column.column_type.width();
                    let raw = val.as_bytes();
                    if raw.len() > len {
                        return Err(mismatch(format!(
                            "column {} holds {} bytes, value has {}",
                            column.column_name,
                            len,
                            raw.len()
                        )));
                    }
                    buffer.extend_from_slice(raw);
                    buffer.resize(buffer.len() + len - raw.len(), 0);
                }
            }
        }

        Ok(Tuple::new(buffer))
    }

    pub fn decode(&self, tuple: &Tuple) -> StorageResult<Vec<Field>> {
        if tuple.len() != self.width {
            return Err(mismatch(format!(
                "expected a {} byte tuple, got {} bytes",
                self.width,
                tuple.len()
            )));
        }

        let mut cursor = Cursor::new(&tuple.data[..]);
        let mut values = Vec::with_capacity(self.columns.len());

        for column in &self.columns {
            let value = match column.column_type {
                DataType::Boolean => Field::Boolean(cursor.read_u8()? != 0),
                DataType::SmallInt => Field::SmallInt(cursor.read_i16::<LittleEndian>()?),
                DataType::Int => Field::Int(cursor.read_i32::<LittleEndian>()?),
                DataType::BigInt => Field::BigInt(cursor.read_i64::<LittleEndian>()?),
                DataType::Decimal => Field::Decimal(cursor.read_f32::<LittleEndian>()?),
                DataType::Char(len) => {
                    let mut raw = vec![0u8; len as usize];
                    cursor.read_exact(&mut raw)?;

                    let end = raw.iter().rposition(|byte| *byte != 0).map_or(0, |i| i + 1);
                    raw.truncate(end);

                    let text = String::from_utf8(raw).map_err(|err| {
                        mismatch(format!("column {} is not utf-8: {}", column.column_name, err))
                    })?;
                    Field::Char(text)
                }
            };
            values.push(value);
        }

        Ok(values)
    }
}

fn mismatch(reason: String) -> StorageError {
    StorageError::SchemaMismatch { reason }
}
