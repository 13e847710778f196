#![forbid(unsafe_code)]

//! Built-in test suite catalog.
//!
//! A [`TestSuite`] is an ordered, immutable set of named adversarial
//! literals for one semantic kind. The built-in constructors are pure: they
//! return the same suite on every call, so suites can be reused across fuzz
//! runs without cross-run interference. [`all_suites`] exposes the full
//! catalog behind a process-wide lazily built registry that is never mutated
//! after first construction.

use gfz_value::{NaKind, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// One named adversarial literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestValue {
    pub name: String,
    pub value: Value,
}

impl TestValue {
    #[must_use]
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Ordered catalog of [`TestValue`]s for one semantic kind.
///
/// Entry names are unique within a suite; iteration order is insertion
/// order and never changes after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSuite {
    kind_label: String,
    entries: Vec<TestValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    DuplicateName { suite: String, name: String },
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateName { suite, name } => {
                write!(f, "duplicate test value name '{name}' in suite '{suite}'")
            }
        }
    }
}

impl std::error::Error for CatalogError {}

impl CatalogError {
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::DuplicateName { .. } => "catalog_duplicate_test_value_name",
        }
    }
}

impl TestSuite {
    /// Builds a caller-authored suite, rejecting duplicate entry names.
    pub fn new(
        kind_label: impl Into<String>,
        entries: Vec<TestValue>,
    ) -> Result<Self, CatalogError> {
        let kind_label = kind_label.into();
        let mut seen = BTreeSet::new();
        for entry in &entries {
            if !seen.insert(entry.name.clone()) {
                return Err(CatalogError::DuplicateName {
                    suite: kind_label,
                    name: entry.name.clone(),
                });
            }
        }
        Ok(Self {
            kind_label,
            entries,
        })
    }

    /// Merges several suites into one, preserving per-suite internal order
    /// and the given concatenation order.
    pub fn concat(
        kind_label: impl Into<String>,
        suites: &[TestSuite],
    ) -> Result<Self, CatalogError> {
        let entries = suites
            .iter()
            .flat_map(|s| s.entries.iter().cloned())
            .collect();
        Self::new(kind_label, entries)
    }

    #[must_use]
    pub fn kind_label(&self) -> &str {
        &self.kind_label
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TestValue> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TestValue> {
        self.entries.iter()
    }

    #[must_use]
    pub fn entries(&self) -> &[TestValue] {
        &self.entries
    }

    // Built-in suite data is static with hand-checked unique names.
    fn built_in(kind_label: &str, pairs: Vec<(&str, Value)>) -> Self {
        let entries = pairs
            .into_iter()
            .map(|(name, value)| TestValue::new(name, value))
            .collect::<Vec<_>>();
        debug_assert!(
            entries
                .iter()
                .map(|e| e.name.as_str())
                .collect::<BTreeSet<_>>()
                .len()
                == entries.len()
        );
        Self {
            kind_label: kind_label.to_string(),
            entries,
        }
    }
}

impl<'a> IntoIterator for &'a TestSuite {
    type Item = &'a TestValue;
    type IntoIter = std::slice::Iter<'a, TestValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Character payloads: empty vector, empty string, singles, multiples,
/// embedded NA, non-ASCII.
#[must_use]
pub fn suite_char() -> TestSuite {
    TestSuite::built_in(
        "character",
        vec![
            ("char_empty", Value::Strs(vec![])),
            ("char_empty_string", Value::Str(String::new())),
            ("char_single", Value::Str("a".into())),
            (
                "char_multiple",
                Value::Strs(vec![Some("a".into()), Some("b".into()), Some("c".into())]),
            ),
            ("char_with_na", Value::Strs(vec![Some("a".into()), None])),
            ("char_unicode", Value::Str("κόσμε".into())),
        ],
    )
}

/// Integer payloads, including both extremes of the representable range.
#[must_use]
pub fn suite_int() -> TestSuite {
    TestSuite::built_in(
        "integer",
        vec![
            ("int_empty", Value::Ints(vec![])),
            ("int_single", Value::Int(1)),
            ("int_zero", Value::Int(0)),
            ("int_neg", Value::Int(-1)),
            (
                "int_multiple",
                Value::Ints(vec![Some(1), Some(2), Some(3)]),
            ),
            ("int_with_na", Value::Ints(vec![Some(1), None])),
            ("int_max", Value::Int(i64::MAX)),
            ("int_min", Value::Int(i64::MIN)),
        ],
    )
}

/// Double payloads, including the float specials and magnitude extremes.
#[must_use]
pub fn suite_dbl() -> TestSuite {
    TestSuite::built_in(
        "double",
        vec![
            ("dbl_empty", Value::Doubles(vec![])),
            ("dbl_single", Value::Double(1.5)),
            ("dbl_zero", Value::Double(0.0)),
            ("dbl_neg", Value::Double(-1.5)),
            (
                "dbl_multiple",
                Value::Doubles(vec![Some(1.5), Some(2.5), Some(3.5)]),
            ),
            ("dbl_with_na", Value::Doubles(vec![Some(1.5), None])),
            ("dbl_max", Value::Double(f64::MAX)),
            ("dbl_min_pos", Value::Double(f64::MIN_POSITIVE)),
            ("dbl_inf", Value::Double(f64::INFINITY)),
            ("dbl_neg_inf", Value::Double(f64::NEG_INFINITY)),
            ("dbl_nan", Value::Double(f64::NAN)),
        ],
    )
}

/// Logical payloads.
#[must_use]
pub fn suite_lgl() -> TestSuite {
    TestSuite::built_in(
        "logical",
        vec![
            ("lgl_empty", Value::Bools(vec![])),
            ("lgl_true", Value::Bool(true)),
            ("lgl_false", Value::Bool(false)),
            (
                "lgl_multiple",
                Value::Bools(vec![Some(true), Some(false), Some(true)]),
            ),
            ("lgl_with_na", Value::Bools(vec![Some(true), None])),
        ],
    )
}

/// Factor payloads, including an NA code and unused levels.
#[must_use]
pub fn suite_fct() -> TestSuite {
    TestSuite::built_in(
        "factor",
        vec![
            (
                "fct_empty",
                Value::Factor {
                    levels: vec![],
                    codes: vec![],
                },
            ),
            (
                "fct_single",
                Value::Factor {
                    levels: vec!["a".into()],
                    codes: vec![Some(0)],
                },
            ),
            (
                "fct_multiple",
                Value::Factor {
                    levels: vec!["a".into(), "b".into()],
                    codes: vec![Some(0), Some(1), Some(0)],
                },
            ),
            (
                "fct_with_na",
                Value::Factor {
                    levels: vec!["a".into(), "b".into()],
                    codes: vec![Some(0), None],
                },
            ),
            (
                "fct_unused_levels",
                Value::Factor {
                    levels: vec!["a".into(), "b".into(), "c".into()],
                    codes: vec![Some(0)],
                },
            ),
        ],
    )
}

/// Date payloads (days since the Unix epoch), including the epoch itself and
/// a pre-epoch day.
#[must_use]
pub fn suite_date() -> TestSuite {
    TestSuite::built_in(
        "date",
        vec![
            ("date_empty", Value::Dates(vec![])),
            ("date_single", Value::Date(11016)),
            ("date_epoch", Value::Date(0)),
            ("date_pre_epoch", Value::Date(-365)),
            (
                "date_multiple",
                Value::Dates(vec![Some(11016), Some(11017)]),
            ),
            ("date_with_na", Value::Dates(vec![Some(11016), None])),
        ],
    )
}

/// Heterogeneous list payloads, including nesting and embedded null.
#[must_use]
pub fn suite_list() -> TestSuite {
    TestSuite::built_in(
        "list",
        vec![
            ("list_empty", Value::List(vec![])),
            ("list_single", Value::List(vec![Value::Int(1)])),
            (
                "list_mixed",
                Value::List(vec![Value::Int(1), Value::Str("a".into()), Value::Bool(true)]),
            ),
            (
                "list_nested",
                Value::List(vec![Value::List(vec![Value::Int(1)])]),
            ),
            ("list_with_null", Value::List(vec![Value::Null])),
        ],
    )
}

/// Raw byte payloads.
#[must_use]
pub fn suite_raw() -> TestSuite {
    TestSuite::built_in(
        "raw",
        vec![
            ("raw_empty", Value::Raw(vec![])),
            ("raw_single", Value::Raw(vec![0x01])),
            ("raw_multiple", Value::Raw(vec![0x00, 0x7f, 0xff])),
        ],
    )
}

/// Null and typed missing payloads.
#[must_use]
pub fn suite_null_na() -> TestSuite {
    TestSuite::built_in(
        "null_na",
        vec![
            ("null", Value::Null),
            ("na", Value::Na(NaKind::Logical)),
            ("na_int", Value::Na(NaKind::Int)),
            ("na_dbl", Value::Na(NaKind::Double)),
            ("na_chr", Value::Na(NaKind::Str)),
        ],
    )
}

static ALL_SUITES: OnceLock<Vec<TestSuite>> = OnceLock::new();

/// Every built-in suite in a stable concatenation order.
///
/// Built once on first use and never mutated afterwards.
#[must_use]
pub fn all_suites() -> &'static [TestSuite] {
    ALL_SUITES.get_or_init(|| {
        vec![
            suite_char(),
            suite_int(),
            suite_dbl(),
            suite_lgl(),
            suite_fct(),
            suite_date(),
            suite_list(),
            suite_raw(),
            suite_null_na(),
        ]
    })
}
