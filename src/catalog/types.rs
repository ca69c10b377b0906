//! Generic SQL data types
//!
//! This module defines the SQL type vocabulary shared by every dialect. Each
//! variant corresponds to one JDBC/ODBC type code and knows how to render its
//! DDL fragment and how to parse a textual literal into a [`Value`].

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ParseError;
use crate::row::Value;

/// SQL Data Types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SqlType {
    /// Single bit
    Bit,
    /// 8-bit integer
    TinyInt,
    /// 16-bit integer
    SmallInt,
    /// 32-bit integer
    Integer,
    /// 64-bit integer
    BigInt,
    /// Floating point (double precision in JDBC terms)
    Float,
    /// Single-precision floating point
    Real,
    /// Double-precision floating point
    Double,
    /// Exact numeric with precision and scale
    Numeric,
    /// Exact decimal with precision and scale
    Decimal,
    /// Fixed-length character string
    Char,
    /// Variable-length character string
    Varchar,
    /// Long variable-length character string
    LongVarchar,
    /// Calendar date
    Date,
    /// Time of day
    Time,
    /// Date and time
    Timestamp,
    /// Fixed-length binary
    Binary,
    /// Variable-length binary
    VarBinary,
    /// Binary large object
    Blob,
    /// Character large object
    Clob,
    /// Boolean
    Boolean,
}

impl SqlType {
    /// Every supported type, in type-code registry order
    pub const ALL: [SqlType; 21] = [
        SqlType::Bit,
        SqlType::TinyInt,
        SqlType::SmallInt,
        SqlType::Integer,
        SqlType::BigInt,
        SqlType::Float,
        SqlType::Real,
        SqlType::Double,
        SqlType::Numeric,
        SqlType::Decimal,
        SqlType::Char,
        SqlType::Varchar,
        SqlType::LongVarchar,
        SqlType::Date,
        SqlType::Time,
        SqlType::Timestamp,
        SqlType::Binary,
        SqlType::VarBinary,
        SqlType::Blob,
        SqlType::Clob,
        SqlType::Boolean,
    ];

    /// Look up a type by its native (JDBC) type code.
    ///
    /// Unsupported codes yield `None`; callers skip the column rather than fail.
    pub fn from_code(code: i32) -> Option<SqlType> {
        SqlType::ALL.iter().copied().find(|t| t.code() == code)
    }

    /// The JDBC type code of this type
    pub fn code(&self) -> i32 {
        match self {
            SqlType::Bit => -7,
            SqlType::TinyInt => -6,
            SqlType::SmallInt => 5,
            SqlType::Integer => 4,
            SqlType::BigInt => -5,
            SqlType::Float => 6,
            SqlType::Real => 7,
            SqlType::Double => 8,
            SqlType::Numeric => 2,
            SqlType::Decimal => 3,
            SqlType::Char => 1,
            SqlType::Varchar => 12,
            SqlType::LongVarchar => -1,
            SqlType::Date => 91,
            SqlType::Time => 92,
            SqlType::Timestamp => 93,
            SqlType::Binary => -2,
            SqlType::VarBinary => -3,
            SqlType::Blob => 2004,
            SqlType::Clob => 2005,
            SqlType::Boolean => 16,
        }
    }

    /// Canonical (ANSI) type name
    pub fn name(&self) -> &'static str {
        match self {
            SqlType::Bit => "BIT",
            SqlType::TinyInt => "TINYINT",
            SqlType::SmallInt => "SMALLINT",
            SqlType::Integer => "INTEGER",
            SqlType::BigInt => "BIGINT",
            SqlType::Float => "FLOAT",
            SqlType::Real => "REAL",
            SqlType::Double => "DOUBLE",
            SqlType::Numeric => "NUMERIC",
            SqlType::Decimal => "DECIMAL",
            SqlType::Char => "CHAR",
            SqlType::Varchar => "VARCHAR",
            SqlType::LongVarchar => "LONGVARCHAR",
            SqlType::Date => "DATE",
            SqlType::Time => "TIME",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::Binary => "BINARY",
            SqlType::VarBinary => "VARBINARY",
            SqlType::Blob => "BLOB",
            SqlType::Clob => "CLOB",
            SqlType::Boolean => "BOOLEAN",
        }
    }

    /// Does the DDL for this type carry a `(size)` suffix?
    pub fn is_sized(&self) -> bool {
        matches!(
            self,
            SqlType::Char
                | SqlType::Varchar
                | SqlType::Numeric
                | SqlType::Decimal
                | SqlType::Binary
                | SqlType::VarBinary
        )
    }

    /// Check if this type is an integer type
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            SqlType::TinyInt | SqlType::SmallInt | SqlType::Integer | SqlType::BigInt
        )
    }

    /// Check if this type is an approximate or exact non-integer numeric
    pub fn is_fractional(&self) -> bool {
        matches!(
            self,
            SqlType::Float | SqlType::Real | SqlType::Double | SqlType::Numeric | SqlType::Decimal
        )
    }

    /// Check if this type is a string type
    pub fn is_string(&self) -> bool {
        matches!(
            self,
            SqlType::Char | SqlType::Varchar | SqlType::LongVarchar | SqlType::Clob
        )
    }

    /// Render a column type fragment: `<native>[(size)][ NOT NULL]`
    pub fn ddl(&self, native_name: &str, size: i32, nullable: bool) -> String {
        self.ddl_with_digits(native_name, size, 0, nullable)
    }

    /// Like [`SqlType::ddl`], with the scale of exact numerics
    pub fn ddl_with_digits(
        &self,
        native_name: &str,
        size: i32,
        decimal_digits: i32,
        nullable: bool,
    ) -> String {
        let mut ddl = native_name.to_string();
        if self.is_sized() && size > 0 {
            let scaled = matches!(self, SqlType::Numeric | SqlType::Decimal);
            if scaled && decimal_digits > 0 {
                ddl.push_str(&format!("({},{})", size, decimal_digits));
            } else {
                ddl.push_str(&format!("({})", size));
            }
        }
        if !nullable {
            ddl.push_str(" NOT NULL");
        }
        ddl
    }

    /// Parse a textual literal into a value of this type
    pub fn parse(&self, text: &str) -> Result<Value, ParseError> {
        let err = || ParseError::new(text, *self);
        let trimmed = text.trim();
        match self {
            SqlType::TinyInt | SqlType::SmallInt | SqlType::Integer | SqlType::BigInt => {
                let v: i64 = trimmed.parse().map_err(|_| err())?;
                let fits = match self {
                    SqlType::TinyInt => i8::try_from(v).is_ok(),
                    SqlType::SmallInt => i16::try_from(v).is_ok(),
                    SqlType::Integer => i32::try_from(v).is_ok(),
                    _ => true,
                };
                if fits {
                    Ok(Value::Integer(v))
                } else {
                    Err(err())
                }
            }
            SqlType::Float
            | SqlType::Real
            | SqlType::Double
            | SqlType::Numeric
            | SqlType::Decimal => trimmed.parse::<f64>().map(Value::Float).map_err(|_| err()),
            SqlType::Bit | SqlType::Boolean => parse_bool(trimmed).map(Value::Boolean).ok_or_else(err),
            SqlType::Char | SqlType::Varchar | SqlType::LongVarchar | SqlType::Clob => {
                Ok(Value::Text(text.to_string()))
            }
            SqlType::Date => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .map(Value::Date)
                .map_err(|_| err()),
            SqlType::Time => NaiveTime::parse_from_str(trimmed, "%H:%M:%S%.f")
                .map(Value::Time)
                .map_err(|_| err()),
            SqlType::Timestamp => parse_timestamp(trimmed).map(Value::Timestamp).ok_or_else(err),
            SqlType::Binary | SqlType::VarBinary | SqlType::Blob => {
                decode_hex(trimmed).map(Value::Bytes).ok_or_else(err)
            }
        }
    }

    /// Reinterpret a raw driver value in terms of this type.
    ///
    /// Drivers with loose storage classes hand back dates as text and booleans
    /// as integers; this restores the declared type where the conversion is
    /// lossless and leaves the value untouched otherwise.
    pub fn from_raw(&self, raw: Value) -> Value {
        match (self, raw) {
            (SqlType::Bit | SqlType::Boolean, Value::Integer(i)) => Value::Boolean(i != 0),
            (t, Value::Integer(i)) if t.is_fractional() => Value::Float(i as f64),
            (SqlType::Date | SqlType::Time | SqlType::Timestamp, Value::Text(s)) => {
                match self.parse(&s) {
                    Ok(v) => v,
                    Err(_) => Value::Text(s),
                }
            }
            (_, raw) => raw,
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Some(true),
        "false" | "f" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    let text = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    if text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| text.get(i..i + 2).and_then(|b| u8::from_str_radix(b, 16).ok()))
        .collect()
}
