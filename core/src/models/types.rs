//! Column type descriptors
//!
//! The grouping engine only needs to know how a type is categorised (for join
//! compatibility) and whether moving between two types changes the physical
//! encoding of a row (for change classification).

use std::fmt::{Display, Formatter, Result as FmtResult};
use serde::{Serialize, Deserialize};

/// Type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// 8-bit integer
    TinyInt,

    /// 16-bit integer
    SmallInt,

    /// 32-bit integer
    Int,

    /// 64-bit integer
    BigInt,

    /// Exact decimal
    Decimal {
        /// Total digits
        precision: u8,
        /// Digits after the point
        scale: u8,
    },

    /// Double precision float
    Double,

    /// Variable-length string with a maximum length
    Varchar(u32),

    /// Fixed-length string
    Char(u32),

    /// Unbounded string
    Text,

    /// Binary data
    Blob,

    /// Calendar date
    Date,

    /// Timestamp
    Timestamp,

    /// Boolean
    Boolean,

    /// 128-bit GUID
    Guid,
}

/// Coarse category used to decide whether two types may be joined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeCategory {
    /// Integers of any width
    Integer,
    /// Exact decimals
    Decimal,
    /// Approximate numerics
    Float,
    /// Character strings
    String,
    /// Binary strings
    Binary,
    /// Dates and timestamps
    Temporal,
    /// Booleans
    Boolean,
    /// GUIDs
    Guid,
}

impl DataType {
    /// Category of this type
    pub fn category(&self) -> TypeCategory {
        match self {
            DataType::TinyInt | DataType::SmallInt | DataType::Int | DataType::BigInt => TypeCategory::Integer,
            DataType::Decimal { .. } => TypeCategory::Decimal,
            DataType::Double => TypeCategory::Float,
            DataType::Varchar(_) | DataType::Char(_) | DataType::Text => TypeCategory::String,
            DataType::Blob => TypeCategory::Binary,
            DataType::Date | DataType::Timestamp => TypeCategory::Temporal,
            DataType::Boolean => TypeCategory::Boolean,
            DataType::Guid => TypeCategory::Guid,
        }
    }

    /// Fixed storage width in bytes, `None` for variable-length types
    pub fn fixed_width(&self) -> Option<u32> {
        match self {
            DataType::TinyInt | DataType::Boolean => Some(1),
            DataType::SmallInt => Some(2),
            DataType::Int | DataType::Date => Some(4),
            DataType::BigInt | DataType::Double | DataType::Timestamp => Some(8),
            DataType::Guid => Some(16),
            DataType::Decimal { precision, .. } => Some(u32::from(*precision) / 2 + 1),
            DataType::Char(length) => Some(*length),
            DataType::Varchar(_) | DataType::Text | DataType::Blob => None,
        }
    }

    /// Whether a grouping join may connect a child column of this type to a
    /// parent column of `parent`. Integers of different widths are allowed.
    pub fn joinable_with(&self, parent: &DataType) -> bool {
        self.category() == parent.category()
    }

    /// Whether converting stored values from `self` to `target` changes the
    /// physical encoding of existing rows
    pub fn encoding_changes_to(&self, target: &DataType) -> bool {
        match (self, target) {
            (a, b) if a == b => false,
            (DataType::Varchar(old), DataType::Varchar(new)) => new < old,
            (DataType::Varchar(_), DataType::Text) => false,
            _ => true,
        }
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            DataType::TinyInt => write!(f, "TINYINT"),
            DataType::SmallInt => write!(f, "SMALLINT"),
            DataType::Int => write!(f, "INT"),
            DataType::BigInt => write!(f, "BIGINT"),
            DataType::Decimal { precision, scale } => write!(f, "DECIMAL({}, {})", precision, scale),
            DataType::Double => write!(f, "DOUBLE"),
            DataType::Varchar(length) => write!(f, "VARCHAR({})", length),
            DataType::Char(length) => write!(f, "CHAR({})", length),
            DataType::Text => write!(f, "TEXT"),
            DataType::Blob => write!(f, "BLOB"),
            DataType::Date => write!(f, "DATE"),
            DataType::Timestamp => write!(f, "TIMESTAMP"),
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::Guid => write!(f, "GUID"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_widths_are_joinable() {
        assert!(DataType::Int.joinable_with(&DataType::BigInt));
        assert!(DataType::BigInt.joinable_with(&DataType::SmallInt));
        assert!(!DataType::Varchar(10).joinable_with(&DataType::BigInt));
        assert!(!DataType::Double.joinable_with(&DataType::Int));
    }

    #[test]
    fn test_encoding_changes() {
        assert!(!DataType::Varchar(10).encoding_changes_to(&DataType::Varchar(20)));
        assert!(DataType::Varchar(20).encoding_changes_to(&DataType::Varchar(10)));
        assert!(DataType::Int.encoding_changes_to(&DataType::BigInt));
        assert!(DataType::Date.encoding_changes_to(&DataType::Timestamp));
        assert!(!DataType::Date.encoding_changes_to(&DataType::Date));
    }

    #[test]
    fn test_display() {
        assert_eq!(DataType::Varchar(32).to_string(), "VARCHAR(32)");
        assert_eq!(DataType::Decimal { precision: 10, scale: 2 }.to_string(), "DECIMAL(10, 2)");
    }
}
