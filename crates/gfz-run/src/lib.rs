#![forbid(unsafe_code)]

//! Safe invocation and the queryable fuzz report.
//!
//! The runner walks a validated [`FuzzPlan`] strictly in plan order, invokes
//! the target once per combination inside a panic boundary, and classifies
//! every call as success, warning, or error. A raised condition of any class
//! never escapes the invoker: it is converted into an [`Outcome`] and the
//! batch proceeds. A completed run always holds exactly one record per
//! planned combination, however many calls failed.

use gfz_catalog::TestSuite;
use gfz_plan::{
    check_batch_size, Combination, FuzzPlan, GuardError, GuardPolicy, ParamPlan, PlanError,
    Signature,
};
use gfz_value::Value;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::debug;

/// The fully-resolved argument set handed to a target for one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Args {
    bindings: BTreeMap<String, Value>,
}

impl Args {
    #[must_use]
    pub fn from_combination(combination: &Combination) -> Self {
        let mut bindings = combination.fixed.clone();
        for (param, tv) in &combination.chosen {
            bindings.insert(param.clone(), tv.value.clone());
        }
        Self { bindings }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    #[must_use]
    pub fn get_or<'a>(&'a self, name: &str, default: &'a Value) -> &'a Value {
        self.bindings.get(name).unwrap_or(default)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }
}

/// Collects recoverable warnings the target emits during one call.
#[derive(Debug, Default)]
pub struct WarningSink {
    messages: Vec<String>,
}

impl WarningSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    fn into_messages(self) -> Vec<String> {
        self.messages
    }
}

/// A fuzzable target: a declared signature plus the call itself.
///
/// The target signals a recoverable condition through the [`WarningSink`]
/// and a terminating one by returning `Err`. Panics are also contained and
/// classified as errors.
pub trait Callable {
    fn signature(&self) -> &Signature;
    fn call(&self, args: &Args, warnings: &mut WarningSink) -> Result<Value, String>;
}

/// Lifts a closure plus a declared [`Signature`] into a [`Callable`].
pub struct FnTarget<F> {
    signature: Signature,
    f: F,
}

impl<F> FnTarget<F>
where
    F: Fn(&Args, &mut WarningSink) -> Result<Value, String>,
{
    pub fn new(signature: Signature, f: F) -> Self {
        Self { signature, f }
    }
}

impl<F> Callable for FnTarget<F>
where
    F: Fn(&Args, &mut WarningSink) -> Result<Value, String>,
{
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn call(&self, args: &Args, warnings: &mut WarningSink) -> Result<Value, String> {
        (self.f)(args, warnings)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeKind {
    Success,
    Warning,
    Error,
}

impl OutcomeKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// Classified result of one invocation. Exactly one per combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    Success(Value),
    Warning {
        message: String,
        value: Option<Value>,
    },
    Error {
        message: String,
    },
}

impl Outcome {
    #[must_use]
    pub const fn kind(&self) -> OutcomeKind {
        match self {
            Self::Success(_) => OutcomeKind::Success,
            Self::Warning { .. } => OutcomeKind::Warning,
            Self::Error { .. } => OutcomeKind::Error,
        }
    }

    /// The captured value, when one exists. Error records never carry one.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Success(v) => Some(v),
            Self::Warning { value, .. } => value.as_ref(),
            Self::Error { .. } => None,
        }
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Warning { message, .. } | Self::Error { message } => Some(message),
        }
    }
}

/// Whether a warning record keeps the value the call still produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WarningValuePolicy {
    #[default]
    KeepValue,
    DropValue,
}

/// One record of the result store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub combination: Combination,
    pub call_expression: String,
    pub outcome: Outcome,
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "target panicked".to_string()
    }
}

/// Deterministic rendering of the invocation: planned parameters in plan
/// order, then fixed parameters in name order. Produced before the call so
/// it exists even when the call errors.
fn render_call(fn_name: &str, combination: &Combination) -> String {
    let mut parts = Vec::with_capacity(combination.chosen.len() + combination.fixed.len());
    for (param, tv) in &combination.chosen {
        parts.push(format!("{param} = {}", tv.value.render()));
    }
    for (param, value) in &combination.fixed {
        parts.push(format!("{param} = {}", value.render()));
    }
    format!("{fn_name}({})", parts.join(", "))
}

fn invoke_one(
    target: &dyn Callable,
    combination: &Combination,
    policy: WarningValuePolicy,
) -> CallRecord {
    let args = Args::from_combination(combination);
    let call_expression = render_call(&target.signature().fn_name, combination);

    let caught = catch_unwind(AssertUnwindSafe(|| {
        let mut sink = WarningSink::new();
        let result = target.call(&args, &mut sink);
        (result, sink.into_messages())
    }));

    let outcome = match caught {
        Err(payload) => Outcome::Error {
            message: panic_message(payload),
        },
        Ok((Err(message), _)) => Outcome::Error { message },
        Ok((Ok(value), warnings)) => {
            if warnings.is_empty() {
                Outcome::Success(value)
            } else {
                Outcome::Warning {
                    message: warnings.join("; "),
                    value: match policy {
                        WarningValuePolicy::KeepValue => Some(value),
                        WarningValuePolicy::DropValue => None,
                    },
                }
            }
        }
    };

    CallRecord {
        combination: combination.clone(),
        call_expression,
        outcome,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    BadPattern { pattern: String, detail: String },
    NoMatch { param: String, pattern: String },
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadPattern { pattern, detail } => {
                write!(f, "invalid query pattern '{pattern}': {detail}")
            }
            Self::NoMatch { param, pattern } => {
                write!(
                    f,
                    "no record for parameter '{param}' matches pattern '{pattern}'"
                )
            }
        }
    }
}

impl std::error::Error for QueryError {}

impl QueryError {
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::BadPattern { .. } => "query_bad_pattern",
            Self::NoMatch { .. } => "query_no_match",
        }
    }
}

/// Flat row projection of one record, for external rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    /// `param = test-value-name` pairs in plan order.
    pub fuzz_input: String,
    pub outcome: String,
    pub message: Option<String>,
    pub value: Option<String>,
}

/// The ordered result store of one completed run.
///
/// Append-only during the run, immutable afterwards, exclusively owned by
/// the caller that ran the batch. `len()` always equals the planned
/// combination count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzReport {
    fn_name: String,
    records: Vec<CallRecord>,
}

impl FuzzReport {
    #[must_use]
    pub fn fn_name(&self) -> &str {
        &self.fn_name
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn records(&self) -> &[CallRecord] {
        &self.records
    }

    /// Row-per-record projection for the external reporting layer.
    #[must_use]
    pub fn rows(&self) -> Vec<ReportRow> {
        self.records
            .iter()
            .map(|r| ReportRow {
                fuzz_input: r
                    .combination
                    .chosen
                    .iter()
                    .map(|(param, tv)| format!("{param} = {}", tv.name))
                    .collect::<Vec<_>>()
                    .join(", "),
                outcome: r.outcome.kind().name().to_string(),
                message: r.outcome.message().map(str::to_owned),
                value: r.outcome.value().map(Value::render),
            })
            .collect()
    }

    /// The row projection as a JSON array.
    pub fn rows_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.rows())
    }

    // Both queries share one matching rule: regex search over the chosen
    // test-value name for `param`, first match wins.
    fn find_record(&self, param: &str, pattern: &str) -> Result<&CallRecord, QueryError> {
        let re = Regex::new(pattern).map_err(|e| QueryError::BadPattern {
            pattern: pattern.to_string(),
            detail: e.to_string(),
        })?;
        self.records
            .iter()
            .find(|r| {
                r.combination
                    .chosen_name(param)
                    .is_some_and(|name| re.is_match(name))
            })
            .ok_or_else(|| QueryError::NoMatch {
                param: param.to_string(),
                pattern: pattern.to_string(),
            })
    }

    /// Rendered call expression of the first matching record.
    pub fn call_expression(&self, param: &str, pattern: &str) -> Result<&str, QueryError> {
        Ok(&self.find_record(param, pattern)?.call_expression)
    }

    /// Captured value of the first matching record; `Ok(None)` when that
    /// record is an error (or a warning whose value was dropped).
    pub fn value(&self, param: &str, pattern: &str) -> Result<Option<&Value>, QueryError> {
        Ok(self.find_record(param, pattern)?.outcome.value())
    }
}

#[derive(Debug)]
pub enum RunError {
    Plan(PlanError),
    Guard(GuardError),
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plan(e) => write!(f, "plan error: {e}"),
            Self::Guard(e) => write!(f, "guard error: {e}"),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Plan(e) => Some(e),
            Self::Guard(e) => Some(e),
        }
    }
}

impl RunError {
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Plan(e) => e.reason_code(),
            Self::Guard(e) => e.reason_code(),
        }
    }
}

impl From<PlanError> for RunError {
    fn from(e: PlanError) -> Self {
        Self::Plan(e)
    }
}

impl From<GuardError> for RunError {
    fn from(e: GuardError) -> Self {
        Self::Guard(e)
    }
}

/// Sequential batch runner. Configuration errors abort before any
/// invocation; per-call conditions never cross the batch boundary.
#[derive(Debug)]
pub struct Runner {
    warning_values: WarningValuePolicy,
    guard: GuardPolicy,
}

impl Default for Runner {
    fn default() -> Self {
        Self {
            warning_values: WarningValuePolicy::KeepValue,
            guard: GuardPolicy::AutoDeny,
        }
    }
}

impl Runner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn warning_values(mut self, policy: WarningValuePolicy) -> Self {
        self.warning_values = policy;
        self
    }

    #[must_use]
    pub fn guard(mut self, policy: GuardPolicy) -> Self {
        self.guard = policy;
        self
    }

    /// Runs the whole plan to completion, one combination at a time, in
    /// plan order.
    pub fn run(&self, target: &dyn Callable, plan: &FuzzPlan) -> Result<FuzzReport, RunError> {
        plan.validate(target.signature())?;
        let count = plan.combination_count()?;
        check_batch_size(count, &self.guard)?;

        let combinations = plan.combinations()?;
        let mut records = Vec::with_capacity(combinations.len());
        for combination in &combinations {
            let record = invoke_one(target, combination, self.warning_values);
            debug!(
                call = %record.call_expression,
                outcome = record.outcome.kind().name(),
                "invoked target"
            );
            records.push(record);
        }
        Ok(FuzzReport {
            fn_name: target.signature().fn_name.clone(),
            records,
        })
    }
}

/// Fuzzes a single parameter over a suite, holding the remaining parameters
/// at the given fixed values.
pub fn fuzz_function(
    target: &dyn Callable,
    param: &str,
    fixed: BTreeMap<String, Value>,
    suite: &TestSuite,
) -> Result<FuzzReport, RunError> {
    let mut plan = FuzzPlan::new().with_plan(ParamPlan::from_suite(param, suite));
    for (name, value) in fixed {
        plan = plan.with_fixed(name, value);
    }
    Runner::default().run(target, &plan)
}

/// Fuzzes several parameters at once over the full cross-product of their
/// candidate sets.
pub fn fuzz_all(
    target: &dyn Callable,
    plans: Vec<ParamPlan>,
    fixed: BTreeMap<String, Value>,
) -> Result<FuzzReport, RunError> {
    let mut plan = FuzzPlan::new();
    for p in plans {
        plan = plan.with_plan(p);
    }
    for (name, value) in fixed {
        plan = plan.with_fixed(name, value);
    }
    Runner::default().run(target, &plan)
}
