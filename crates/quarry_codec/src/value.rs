//! Dynamic SQL value type and its collation.

use std::cmp::Ordering;
use std::fmt;

/// A dynamically typed value stored in a row or produced by an expression.
///
/// Equality (`PartialEq`) is structural: `Int(1)` and `Float(1.0)` are not
/// equal under `==`. Use [`Value::collate`] for the ordering used by
/// `ORDER BY`, `DISTINCT` and `GROUP BY`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// UTF-8 string.
    Text(String),
    /// Byte string.
    Blob(Vec<u8>),
}

impl Value {
    /// Total order over heterogeneous values.
    ///
    /// `Null` sorts before everything and equals itself, then booleans,
    /// then numbers (integers and floats compared numerically, NaN last),
    /// then strings, then blobs.
    #[must_use]
    pub fn collate(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => cmp_f64(*a, *b),
            (Value::Int(a), Value::Float(b)) => cmp_int_f64(*a, *b),
            (Value::Float(a), Value::Int(b)) => cmp_int_f64(*b, *a).reverse(),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Blob(a), Value::Blob(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    /// Compares two rows element by element with [`Value::collate`].
    ///
    /// A shorter row that is a prefix of a longer one sorts first.
    #[must_use]
    pub fn collate_rows(a: &[Value], b: &[Value]) -> Ordering {
        for (x, y) in a.iter().zip(b.iter()) {
            let ord = x.collate(y);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.len().cmp(&b.len())
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::Text(_) => 3,
            Value::Blob(_) => 4,
        }
    }

    /// Returns the type name used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int64",
            Value::Float(_) => "float64",
            Value::Text(_) => "string",
            Value::Blob(_) => "blob",
        }
    }

    /// Whether the value may appear in an `ORDER BY` key.
    ///
    /// Numbers, strings, blobs and NULL are ordered; booleans are not.
    #[must_use]
    pub fn is_ordered(&self) -> bool {
        !matches!(self, Value::Bool(_))
    }

    /// Check if this value is null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether the value is an integer or a float.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Get this value as a boolean, if it is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a float, converting integers.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Get this value as a string, if it is one.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as bytes, if it is a blob.
    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(b) => Some(b),
            _ => None,
        }
    }
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b)
        .unwrap_or_else(|| a.is_nan().cmp(&b.is_nan()))
}

/// Exact comparison of an integer with a float; NaN sorts after every int.
fn cmp_int_f64(a: i64, b: f64) -> Ordering {
    // 2^63, the first float above i64::MAX
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if b.is_nan() || b >= LIMIT {
        return Ordering::Less;
    }
    if b < -LIMIT {
        return Ordering::Greater;
    }
    let whole = b.trunc();
    #[allow(clippy::cast_possible_truncation)]
    let ord = a.cmp(&(whole as i64));
    ord.then_with(|| cmp_f64(0.0, b - whole))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => {
                if x.is_finite() && x.fract() == 0.0 {
                    write!(f, "{x:.1}")
                } else {
                    write!(f, "{x}")
                }
            }
            Value::Text(s) => f.write_str(s),
            Value::Blob(b) => {
                f.write_str("x'")?;
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                f.write_str("'")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Blob(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Blob(b.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_sorts_first_and_equals_itself() {
        assert_eq!(Value::Null.collate(&Value::Null), Ordering::Equal);
        assert_eq!(Value::Null.collate(&Value::Int(-5)), Ordering::Less);
        assert_eq!(Value::Text(String::new()).collate(&Value::Null), Ordering::Greater);
    }

    #[test]
    fn numbers_compare_across_widths() {
        assert_eq!(Value::Int(1).collate(&Value::Float(1.0)), Ordering::Equal);
        assert_eq!(Value::Int(2).collate(&Value::Float(1.5)), Ordering::Greater);
        assert_eq!(Value::Float(-0.5).collate(&Value::Int(0)), Ordering::Less);
    }

    #[test]
    fn large_ints_compare_exactly_with_floats() {
        let two_53 = 1i64 << 53;
        let f = Value::Float(two_53 as f64);
        assert_eq!(Value::Int(two_53).collate(&f), Ordering::Equal);
        assert_eq!(Value::Int(two_53 + 1).collate(&f), Ordering::Greater);
        assert_eq!(f.collate(&Value::Int(two_53 + 1)), Ordering::Less);
        let min = i64::MIN as f64;
        assert_eq!(Value::Int(i64::MAX).collate(&Value::Float(-min)), Ordering::Less);
        assert_eq!(Value::Int(i64::MIN).collate(&Value::Float(min)), Ordering::Equal);
        assert_eq!(Value::Int(i64::MAX).collate(&Value::Float(f64::INFINITY)), Ordering::Less);
        assert_eq!(Value::Int(i64::MIN).collate(&Value::Float(f64::NEG_INFINITY)), Ordering::Greater);
        assert_eq!(Value::Int(i64::MAX).collate(&Value::Float(f64::NAN)), Ordering::Less);
        assert_eq!(Value::Int(-3).collate(&Value::Float(-2.5)), Ordering::Less);
        assert_eq!(Value::Int(-2).collate(&Value::Float(-2.5)), Ordering::Greater);
    }

    #[test]
    fn nan_sorts_after_numbers() {
        assert_eq!(
            Value::Float(f64::NAN).collate(&Value::Float(f64::INFINITY)),
            Ordering::Greater
        );
        assert_eq!(
            Value::Float(f64::NAN).collate(&Value::Float(f64::NAN)),
            Ordering::Equal
        );
    }

    #[test]
    fn type_ranks() {
        let mut values = vec![
            Value::Blob(vec![0]),
            Value::Text("a".into()),
            Value::Int(3),
            Value::Bool(true),
            Value::Null,
        ];
        values.sort_by(Value::collate);
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Bool(true),
                Value::Int(3),
                Value::Text("a".into()),
                Value::Blob(vec![0]),
            ]
        );
    }

    #[test]
    fn row_collation_is_lexicographic() {
        let a = [Value::Int(1), Value::Text("b".into())];
        let b = [Value::Int(1), Value::Text("c".into())];
        assert_eq!(Value::collate_rows(&a, &b), Ordering::Less);
        assert_eq!(Value::collate_rows(&a[..1], &a), Ordering::Less);
        assert_eq!(Value::collate_rows(&b, &b), Ordering::Equal);
    }

    #[test]
    fn ordered_types() {
        assert!(Value::Null.is_ordered());
        assert!(Value::Int(1).is_ordered());
        assert!(Value::Blob(vec![]).is_ordered());
        assert!(!Value::Bool(false).is_ordered());
    }

    #[test]
    fn display() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Blob(vec![0xab, 1]).to_string(), "x'ab01'");
    }

    #[test]
    fn from_impls() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(42i64), Value::Int(42));
        assert_eq!(Value::from(42i32), Value::Int(42));
        assert_eq!(Value::from(1.5f64), Value::Float(1.5));
        assert_eq!(Value::from("hello"), Value::Text("hello".to_string()));
        assert_eq!(Value::from(vec![1u8, 2, 3]), Value::Blob(vec![1, 2, 3]));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(()), Value::Null);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn near_2_53() -> impl Strategy<Value = Value> {
            let base = 1i64 << 53;
            prop_oneof![
                (-4i64..4).prop_map(move |d| Value::Int(base + d)),
                (-4i64..4).prop_map(move |d| Value::Float((base + d) as f64)),
                (-4i64..4).prop_map(|d| Value::Int(d)),
                (-8i64..8).prop_map(|d| Value::Float(d as f64 / 2.0)),
            ]
        }

        proptest! {
            #[test]
            fn numeric_collation_is_transitive(
                a in near_2_53(),
                b in near_2_53(),
                c in near_2_53(),
            ) {
                let mut sorted = [a, b, c];
                sorted.sort_by(Value::collate);
                prop_assert_ne!(sorted[0].collate(&sorted[1]), Ordering::Greater);
                prop_assert_ne!(sorted[1].collate(&sorted[2]), Ordering::Greater);
                prop_assert_ne!(sorted[0].collate(&sorted[2]), Ordering::Greater);
                if sorted[0].collate(&sorted[1]) == Ordering::Equal
                    && sorted[1].collate(&sorted[2]) == Ordering::Equal
                {
                    prop_assert_eq!(sorted[0].collate(&sorted[2]), Ordering::Equal);
                }
            }
        }
    }
}
