//! Scan filters: compare one field of a record against a constant.

use crate::error::{Result, StorageError};
use std::cmp::Ordering;
use std::str::FromStr;

/// How the filtered field is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Datatype {
    /// 4-byte little-endian signed integer
    Integer,
    /// 4-byte little-endian IEEE-754 float
    Float,
    /// Fixed-width byte string, compared like C `strncmp`
    String,
}

impl Datatype {
    /// Field width required by numeric types
    pub fn native_size(self) -> Option<usize> {
        match self {
            Datatype::Integer => Some(std::mem::size_of::<i32>()),
            Datatype::Float => Some(std::mem::size_of::<f32>()),
            Datatype::String => None,
        }
    }
}

impl FromStr for Datatype {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "int" | "integer" => Ok(Datatype::Integer),
            "float" => Ok(Datatype::Float),
            "str" | "string" => Ok(Datatype::String),
            _ => Err(StorageError::bad_scan(format!("unknown datatype {}", s))),
        }
    }
}

/// Comparison applied between the record field and the filter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Lt,
    Lte,
    Eq,
    Gte,
    Gt,
    Ne,
}

impl Operator {
    /// Whether `field.cmp(value) == ordering` satisfies this operator
    pub fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Operator::Lt => ordering == Ordering::Less,
            Operator::Lte => ordering != Ordering::Greater,
            Operator::Eq => ordering == Ordering::Equal,
            Operator::Gte => ordering != Ordering::Less,
            Operator::Gt => ordering == Ordering::Greater,
            Operator::Ne => ordering != Ordering::Equal,
        }
    }
}

impl FromStr for Operator {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "<" | "lt" => Ok(Operator::Lt),
            "<=" | "lte" => Ok(Operator::Lte),
            "=" | "==" | "eq" => Ok(Operator::Eq),
            ">=" | "gte" => Ok(Operator::Gte),
            ">" | "gt" => Ok(Operator::Gt),
            "!=" | "<>" | "ne" => Ok(Operator::Ne),
            _ => Err(StorageError::bad_scan(format!("unknown operator {}", s))),
        }
    }
}

/// Decoded filter constant
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Integer(i32),
    Float(f32),
    /// Exactly `length` bytes, zero padded
    Bytes(Vec<u8>),
}

/// A validated predicate over `record[offset..offset + length]`
#[derive(Debug, Clone, PartialEq)]
pub struct ScanFilter {
    offset: usize,
    length: usize,
    value: FilterValue,
    op: Operator,
}

impl ScanFilter {
    /// Build a filter from raw filter bytes.
    ///
    /// Numeric types need `length` equal to their native size and exactly that
    /// many value bytes. Strings accept up to `length` bytes; shorter values
    /// behave as if NUL terminated.
    pub fn new(
        offset: usize,
        length: usize,
        datatype: Datatype,
        value: &[u8],
        op: Operator,
    ) -> Result<Self> {
        if length == 0 {
            return Err(StorageError::bad_scan("filter length must be at least 1"));
        }
        if offset.checked_add(length).is_none() {
            return Err(StorageError::bad_scan("filter offset overflows"));
        }

        let value = match datatype.native_size() {
            Some(size) => {
                if length != size {
                    return Err(StorageError::bad_scan(format!(
                        "{:?} filter needs length {}, got {}",
                        datatype, size, length
                    )));
                }
                if value.len() != size {
                    return Err(StorageError::bad_scan(format!(
                        "{:?} filter needs a {} byte value, got {}",
                        datatype,
                        size,
                        value.len()
                    )));
                }
                let bytes = le_bytes(value);
                match datatype {
                    Datatype::Integer => FilterValue::Integer(i32::from_le_bytes(bytes)),
                    _ => FilterValue::Float(f32::from_le_bytes(bytes)),
                }
            }
            None => {
                if value.len() > length {
                    return Err(StorageError::bad_scan(format!(
                        "string value of {} bytes exceeds filter length {}",
                        value.len(),
                        length
                    )));
                }
                let mut bytes = value.to_vec();
                bytes.resize(length, 0);
                FilterValue::Bytes(bytes)
            }
        };

        Ok(Self {
            offset,
            length,
            value,
            op,
        })
    }

    /// Filter on a 4-byte integer field
    pub fn integer(offset: usize, value: i32, op: Operator) -> Self {
        Self {
            offset,
            length: 4,
            value: FilterValue::Integer(value),
            op,
        }
    }

    /// Filter on a 4-byte float field
    pub fn float(offset: usize, value: f32, op: Operator) -> Self {
        Self {
            offset,
            length: 4,
            value: FilterValue::Float(value),
            op,
        }
    }

    /// Filter on a fixed-width string field
    pub fn string(offset: usize, length: usize, value: &[u8], op: Operator) -> Result<Self> {
        Self::new(offset, length, Datatype::String, value, op)
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn value(&self) -> &FilterValue {
        &self.value
    }

    pub fn op(&self) -> Operator {
        self.op
    }

    /// Whether `record` satisfies the predicate.
    ///
    /// Records too short to hold the field never match.
    pub fn matches(&self, record: &[u8]) -> bool {
        let end = match self.offset.checked_add(self.length) {
            Some(end) if end <= record.len() => end,
            _ => return false,
        };
        let field = &record[self.offset..end];

        let ordering = match &self.value {
            FilterValue::Integer(value) => i32::from_le_bytes(le_bytes(field)).cmp(value),
            FilterValue::Float(value) => f32::from_le_bytes(le_bytes(field)).total_cmp(value),
            FilterValue::Bytes(value) => compare_c_strings(field, value),
        };
        self.op.accepts(ordering)
    }
}

fn le_bytes(bytes: &[u8]) -> [u8; 4] {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    buf
}

/// Compare two equal-width byte strings, stopping after the first NUL
fn compare_c_strings(a: &[u8], b: &[u8]) -> Ordering {
    for (&x, &y) in a.iter().zip(b) {
        match x.cmp(&y) {
            Ordering::Equal if x == 0 => return Ordering::Equal,
            Ordering::Equal => {}
            other => return other,
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn int_record(value: i32) -> Vec<u8> {
        let mut record = vec![0xAA; 4];
        record.extend_from_slice(&value.to_le_bytes());
        record
    }

    #[test]
    fn test_parse_datatype_and_operator() {
        assert_eq!("INTEGER".parse::<Datatype>().unwrap(), Datatype::Integer);
        assert_eq!("float".parse::<Datatype>().unwrap(), Datatype::Float);
        assert_eq!("string".parse::<Datatype>().unwrap(), Datatype::String);
        assert!("double".parse::<Datatype>().is_err());

        assert_eq!("<=".parse::<Operator>().unwrap(), Operator::Lte);
        assert_eq!("<>".parse::<Operator>().unwrap(), Operator::Ne);
        assert_eq!("gt".parse::<Operator>().unwrap(), Operator::Gt);
        assert!(matches!(
            "~".parse::<Operator>(),
            Err(StorageError::BadScanParameter(_))
        ));
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let bad = |r: Result<ScanFilter>| matches!(r, Err(StorageError::BadScanParameter(_)));

        assert!(bad(ScanFilter::new(0, 0, Datatype::String, b"", Operator::Eq)));
        assert!(bad(ScanFilter::new(0, 8, Datatype::Integer, &[0; 8], Operator::Eq)));
        assert!(bad(ScanFilter::new(0, 4, Datatype::Float, &[0; 3], Operator::Eq)));
        assert!(bad(ScanFilter::new(0, 2, Datatype::String, b"abc", Operator::Eq)));
        assert!(bad(ScanFilter::new(usize::MAX, 1, Datatype::String, b"a", Operator::Eq)));

        assert!(ScanFilter::new(3, 4, Datatype::Integer, &7i32.to_le_bytes(), Operator::Eq).is_ok());
    }

    #[test]
    fn test_integer_operators() {
        let record = int_record(5);
        let cases = [
            (Operator::Lt, 6, true),
            (Operator::Lt, 5, false),
            (Operator::Lte, 5, true),
            (Operator::Eq, 5, true),
            (Operator::Eq, -5, false),
            (Operator::Gte, 5, true),
            (Operator::Gt, 4, true),
            (Operator::Gt, 5, false),
            (Operator::Ne, 5, false),
            (Operator::Ne, 0, true),
        ];
        for (op, value, expected) in cases {
            assert_eq!(
                ScanFilter::integer(4, value, op).matches(&record),
                expected,
                "5 {:?} {}",
                op,
                value
            );
        }
    }

    #[test]
    fn test_integer_matches_random_values() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let field: i32 = rng.gen();
            let value: i32 = rng.gen();
            let record = int_record(field);

            assert_eq!(
                ScanFilter::integer(4, value, Operator::Lt).matches(&record),
                field < value
            );
            assert_eq!(
                ScanFilter::integer(4, value, Operator::Gte).matches(&record),
                field >= value
            );
            assert!(ScanFilter::integer(4, field, Operator::Eq).matches(&record));
        }
    }

    #[test]
    fn test_float_compare() {
        let record = 2.5f32.to_le_bytes();
        assert!(ScanFilter::float(0, 3.0, Operator::Lt).matches(&record));
        assert!(ScanFilter::float(0, 2.5, Operator::Eq).matches(&record));
        assert!(ScanFilter::float(0, -1.0, Operator::Gt).matches(&record));

        let negative_zero = (-0.0f32).to_le_bytes();
        assert!(ScanFilter::float(0, 0.0, Operator::Ne).matches(&negative_zero));
    }

    #[test]
    fn test_string_stops_at_nul() {
        let filter = ScanFilter::string(0, 8, b"abc", Operator::Eq).unwrap();
        assert!(filter.matches(b"abc\0garb"));
        assert!(!filter.matches(b"abcd\0\0\0\0"));

        let filter = ScanFilter::string(2, 3, b"bcd", Operator::Gt).unwrap();
        assert!(filter.matches(b"xxbce"));
        assert!(!filter.matches(b"xxbcd"));
        assert!(!filter.matches(b"xxabz"));
    }

    #[test]
    fn test_short_record_never_matches() {
        let filter = ScanFilter::integer(4, 0, Operator::Ne);
        assert!(!filter.matches(&[1, 2, 3, 4, 5, 6, 7]));
        assert!(filter.matches(&[0, 0, 0, 0, 1, 0, 0, 0]));
    }

    #[test]
    fn test_offset_past_address_space_never_matches() {
        let record = [0u8; 8];
        assert!(!ScanFilter::integer(usize::MAX, 1, Operator::Eq).matches(&record));
        assert!(!ScanFilter::float(usize::MAX - 2, 0.0, Operator::Ne).matches(&record));
    }
}
