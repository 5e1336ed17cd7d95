//! Tagged scalar value used on the publish path (spec §9 "Dynamic typing →
//! tagged variants").
//!
//! The source system's payload renderer mixes numeric, boolean, text, and
//! datetime values behind a single dynamically-typed scalar. We represent
//! that as an explicit enum with total, logged coercions instead of runtime
//! type inspection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "value_type", rename_all = "lowercase")]
pub enum TaggedValue {
    Num(f64),
    Text(String),
    Bool(bool),
    Datetime(DateTime<Utc>),
}

/// Tri-state boolean used by the node-group AND-reduce (spec §4.7): any
/// `false` member forces the group `false`; otherwise any `unknown` member
/// forces `unknown`; otherwise the group is `true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriBool {
    True,
    False,
    Unknown,
}

impl TaggedValue {
    /// Coerce to a tri-state boolean the way the node-group reducer needs:
    /// real booleans pass through, numbers are non-zero-is-true, text is
    /// parsed case-insensitively ("true"/"false"), anything else (including
    /// quality-bad upstream reads the caller never constructs as `Text`) is
    /// `Unknown`.
    pub fn to_tri_bool(&self) -> TriBool {
        match self {
            TaggedValue::Bool(b) => {
                if *b {
                    TriBool::True
                } else {
                    TriBool::False
                }
            }
            TaggedValue::Num(n) => {
                if *n == 0.0 {
                    TriBool::False
                } else {
                    TriBool::True
                }
            }
            TaggedValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => TriBool::True,
                "false" | "0" => TriBool::False,
                _ => TriBool::Unknown,
            },
            TaggedValue::Datetime(_) => TriBool::Unknown,
        }
    }

    /// First good numeric among an iterator of values, for the cycle-group
    /// reducer (spec §4.7 "first good numeric among members").
    pub fn first_numeric<'a, I: IntoIterator<Item = &'a TaggedValue>>(values: I) -> Option<f64> {
        values.into_iter().find_map(|v| match v {
            TaggedValue::Num(n) => Some(*n),
            _ => None,
        })
    }
}

/// AND-reduce per spec §4.7: any `False` wins, else any `Unknown` wins,
/// else `True`. An empty group reduces to `Unknown`.
pub fn and_reduce(values: impl IntoIterator<Item = TriBool>) -> TriBool {
    let mut saw_unknown = false;
    let mut saw_any = false;
    for v in values {
        saw_any = true;
        match v {
            TriBool::False => return TriBool::False,
            TriBool::Unknown => saw_unknown = true,
            TriBool::True => {}
        }
    }
    if !saw_any {
        TriBool::Unknown
    } else if saw_unknown {
        TriBool::Unknown
    } else {
        TriBool::True
    }
}
