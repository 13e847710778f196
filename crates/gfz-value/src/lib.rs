#![forbid(unsafe_code)]

//! Fuzz payload values.
//!
//! Every test value the harness can feed a target function is one variant of
//! [`Value`]: a closed tagged union over the semantic types the catalog
//! covers. Keeping the union closed means outcome handling and suite
//! construction stay exhaustively matchable instead of leaning on an open
//! "any" type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which typed missing marker a bare NA carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NaKind {
    Logical,
    Int,
    Double,
    Str,
}

impl NaKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Logical => "na",
            Self::Int => "na_int",
            Self::Double => "na_dbl",
            Self::Str => "na_chr",
        }
    }
}

/// Semantic kind label for a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Null,
    Missing,
    Logical,
    Integer,
    Double,
    Character,
    Date,
    Factor,
    List,
    Raw,
}

impl ValueKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Missing => "missing",
            Self::Logical => "logical",
            Self::Integer => "integer",
            Self::Double => "double",
            Self::Character => "character",
            Self::Date => "date",
            Self::Factor => "factor",
            Self::List => "list",
            Self::Raw => "raw",
        }
    }
}

/// One concrete fuzz payload.
///
/// Vector variants hold `Option` elements so a missing slot can sit inside an
/// otherwise well-typed vector (`[1, na]`). `Date` payloads are days since
/// the Unix epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Null,
    Na(NaKind),
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    Date(i64),
    Factor {
        levels: Vec<String>,
        codes: Vec<Option<u32>>,
    },
    List(Vec<Value>),
    Raw(Vec<u8>),
    Bools(Vec<Option<bool>>),
    Ints(Vec<Option<i64>>),
    Doubles(Vec<Option<f64>>),
    Strs(Vec<Option<String>>),
    Dates(Vec<Option<i64>>),
}

impl Value {
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Na(_) => ValueKind::Missing,
            Self::Bool(_) | Self::Bools(_) => ValueKind::Logical,
            Self::Int(_) | Self::Ints(_) => ValueKind::Integer,
            Self::Double(_) | Self::Doubles(_) => ValueKind::Double,
            Self::Str(_) | Self::Strs(_) => ValueKind::Character,
            Self::Date(_) | Self::Dates(_) => ValueKind::Date,
            Self::Factor { .. } => ValueKind::Factor,
            Self::List(_) => ValueKind::List,
            Self::Raw(_) => ValueKind::Raw,
        }
    }

    /// Deterministic textual rendering used inside call expressions.
    ///
    /// Identical values always render identically, including the float
    /// specials (`nan`, `inf`, `-inf`), so a rendered call expression is
    /// reproducible across runs.
    #[must_use]
    pub fn render(&self) -> String {
        self.to_string()
    }
}

fn render_f64(v: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if v.is_nan() {
        write!(f, "nan")
    } else if v == f64::INFINITY {
        write!(f, "inf")
    } else if v == f64::NEG_INFINITY {
        write!(f, "-inf")
    } else {
        write!(f, "{v}")
    }
}

fn render_slots<T>(
    f: &mut fmt::Formatter<'_>,
    slots: &[Option<T>],
    mut one: impl FnMut(&T, &mut fmt::Formatter<'_>) -> fmt::Result,
) -> fmt::Result {
    write!(f, "[")?;
    for (i, slot) in slots.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        match slot {
            Some(v) => one(v, f)?,
            None => write!(f, "na")?,
        }
    }
    write!(f, "]")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Na(kind) => write!(f, "{}", kind.name()),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Double(v) => render_f64(*v, f),
            Self::Str(v) => write!(f, "{v:?}"),
            Self::Date(v) => write!(f, "date({v})"),
            Self::Factor { levels, codes } => {
                write!(f, "factor([")?;
                for (i, code) in codes.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match code.and_then(|c| levels.get(c as usize)) {
                        Some(level) => write!(f, "{level:?}")?,
                        None => write!(f, "na")?,
                    }
                }
                write!(f, "], levels = [")?;
                for (i, level) in levels.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{level:?}")?;
                }
                write!(f, "])")
            }
            Self::List(items) => {
                write!(f, "list(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            Self::Raw(bytes) => {
                write!(f, "raw([")?;
                for (i, b) in bytes.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "0x{b:02x}")?;
                }
                write!(f, "])")
            }
            Self::Bools(slots) => render_slots(f, slots, |v, f| write!(f, "{v}")),
            Self::Ints(slots) => render_slots(f, slots, |v, f| write!(f, "{v}")),
            Self::Doubles(slots) => render_slots(f, slots, |v, f| render_f64(*v, f)),
            Self::Strs(slots) => render_slots(f, slots, |v, f| write!(f, "{v:?}")),
            Self::Dates(slots) => render_slots(f, slots, |v, f| write!(f, "date({v})")),
        }
    }
}

fn eq_f64(a: f64, b: f64) -> bool {
    // NaN compares equal to itself so catalog values behave set-like.
    (a.is_nan() && b.is_nan()) || a == b
}

fn eq_f64_slots(a: &[Option<f64>], b: &[Option<f64>]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(x, y)| match (x, y) {
            (Some(x), Some(y)) => eq_f64(*x, *y),
            (None, None) => true,
            _ => false,
        })
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Na(a), Self::Na(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => eq_f64(*a, *b),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (
                Self::Factor {
                    levels: al,
                    codes: ac,
                },
                Self::Factor {
                    levels: bl,
                    codes: bc,
                },
            ) => al == bl && ac == bc,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Raw(a), Self::Raw(b)) => a == b,
            (Self::Bools(a), Self::Bools(b)) => a == b,
            (Self::Ints(a), Self::Ints(b)) => a == b,
            (Self::Doubles(a), Self::Doubles(b)) => eq_f64_slots(a, b),
            (Self::Strs(a), Self::Strs(b)) => a == b,
            (Self::Dates(a), Self::Dates(b)) => a == b,
            _ => false,
        }
    }
}
