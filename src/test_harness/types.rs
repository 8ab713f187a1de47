//! Row-set types produced by the engine contract
//!
//! A [`RowSet`] is an ordered list of [`Row`]s; each row is an ordered list
//! of opaque [`ScalarValue`]s. Booleans are the only kind the validator
//! interprets, everything else is carried for display.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single scalar returned by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl ScalarValue {
    /// Parse a textual field as printed by a SQL command-line client
    ///
    /// `true`/`false` (any case) become booleans, then integers, then
    /// floats; `null_literal` maps to [`ScalarValue::Null`]; anything else
    /// stays a string.
    pub fn parse_field(field: &str, null_literal: &str) -> Self {
        let trimmed = field.trim();
        if trimmed == null_literal {
            return ScalarValue::Null;
        }
        if trimmed.eq_ignore_ascii_case("true") {
            return ScalarValue::Boolean(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return ScalarValue::Boolean(false);
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return ScalarValue::Integer(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            if f.is_finite() {
                return ScalarValue::Float(f);
            }
        }
        ScalarValue::String(field.to_string())
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null => write!(f, "NULL"),
            ScalarValue::Boolean(b) => write!(f, "{}", b),
            ScalarValue::Integer(i) => write!(f, "{}", i),
            ScalarValue::Float(v) => write!(f, "{}", v),
            ScalarValue::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for ScalarValue {
    fn from(b: bool) -> Self {
        ScalarValue::Boolean(b)
    }
}

impl From<i64> for ScalarValue {
    fn from(i: i64) -> Self {
        ScalarValue::Integer(i)
    }
}

impl From<f64> for ScalarValue {
    fn from(f: f64) -> Self {
        ScalarValue::Float(f)
    }
}

impl From<&str> for ScalarValue {
    fn from(s: &str) -> Self {
        ScalarValue::String(s.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(s: String) -> Self {
        ScalarValue::String(s)
    }
}

/// One result row
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Row(pub Vec<ScalarValue>);

impl Row {
    pub fn new(values: Vec<ScalarValue>) -> Self {
        Row(values)
    }

    pub fn values(&self) -> &[ScalarValue] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Renders as `[v1, v2, ...]`, the form persisted to case output files
impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, "]")
    }
}

impl<V: Into<ScalarValue>> FromIterator<V> for Row {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Row(iter.into_iter().map(Into::into).collect())
    }
}

/// Ordered rows returned by one or more statements
pub type RowSet = Vec<Row>;

/// Build a row from heterogeneous values
///
/// ```
/// use hqlunit::row;
/// let r = row![true, 1i64, "x"];
/// assert_eq!(r.to_string(), "[true, 1, x]");
/// ```
#[macro_export]
macro_rules! row {
    ($($value:expr),* $(,)?) => {
        $crate::test_harness::types::Row::new(vec![
            $($crate::test_harness::types::ScalarValue::from($value)),*
        ])
    };
}
