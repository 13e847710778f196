#![forbid(unsafe_code)]

//! Combination planning and the batch size guard.
//!
//! A [`FuzzPlan`] binds one or more target parameters to candidate test
//! values and carries fixed values for the rest. Planning is pure: the plan
//! validates against the target's formal [`Signature`], reports its total
//! cardinality without materializing anything, and enumerates the full
//! cross-product deterministically. The first-listed parameter varies
//! slowest (outer loop) and the last-listed varies fastest, matching a
//! nested-iteration reading of the plan declaration.

use gfz_catalog::{TestSuite, TestValue};
use gfz_value::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// One formal parameter of the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub has_default: bool,
}

/// The target's introspectable formal-parameter list. The harness never
/// infers this; the caller declares it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub fn_name: String,
    pub params: Vec<Param>,
}

impl Signature {
    #[must_use]
    pub fn new(fn_name: impl Into<String>, params: &[(&str, bool)]) -> Self {
        Self {
            fn_name: fn_name.into(),
            params: params
                .iter()
                .map(|(name, has_default)| Param {
                    name: (*name).to_string(),
                    has_default: *has_default,
                })
                .collect(),
        }
    }

    #[must_use]
    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// Binds one parameter to its ordered candidate values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamPlan {
    pub param: String,
    pub candidates: Vec<TestValue>,
}

impl ParamPlan {
    /// Plan a parameter over a suite, in suite order.
    #[must_use]
    pub fn from_suite(param: impl Into<String>, suite: &TestSuite) -> Self {
        Self {
            param: param.into(),
            candidates: suite.entries().to_vec(),
        }
    }

    /// Plan a parameter over a caller-authored named value list.
    #[must_use]
    pub fn from_pairs(param: impl Into<String>, pairs: Vec<(&str, Value)>) -> Self {
        Self {
            param: param.into(),
            candidates: pairs
                .into_iter()
                .map(|(name, value)| TestValue::new(name, value))
                .collect(),
        }
    }
}

/// One fully-resolved argument assignment: a chosen test value per fuzzed
/// parameter plus the fixed values for everything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combination {
    pub chosen: Vec<(String, TestValue)>,
    pub fixed: BTreeMap<String, Value>,
}

impl Combination {
    /// The chosen test-value name for a fuzzed parameter.
    #[must_use]
    pub fn chosen_name(&self, param: &str) -> Option<&str> {
        self.chosen
            .iter()
            .find(|(p, _)| p == param)
            .map(|(_, tv)| tv.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    NoParams,
    UnknownParam { param: String },
    DuplicateParam { param: String },
    PlannedAndFixed { param: String },
    MissingFixed { param: String },
    EmptySuite { param: String },
    CountOverflow,
}

impl std::fmt::Display for PlanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoParams => write!(f, "plan fuzzes no parameters"),
            Self::UnknownParam { param } => {
                write!(f, "parameter '{param}' is not in the target signature")
            }
            Self::DuplicateParam { param } => {
                write!(f, "parameter '{param}' is planned more than once")
            }
            Self::PlannedAndFixed { param } => {
                write!(f, "parameter '{param}' is both planned and fixed")
            }
            Self::MissingFixed { param } => {
                write!(
                    f,
                    "required parameter '{param}' has no default and no fixed value"
                )
            }
            Self::EmptySuite { param } => {
                write!(f, "parameter '{param}' has an empty candidate set")
            }
            Self::CountOverflow => write!(f, "combination count overflows u64"),
        }
    }
}

impl std::error::Error for PlanError {}

impl PlanError {
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::NoParams => "plan_no_params",
            Self::UnknownParam { .. } => "plan_unknown_param",
            Self::DuplicateParam { .. } => "plan_duplicate_param",
            Self::PlannedAndFixed { .. } => "plan_planned_and_fixed",
            Self::MissingFixed { .. } => "plan_missing_fixed",
            Self::EmptySuite { .. } => "plan_empty_suite",
            Self::CountOverflow => "plan_count_overflow",
        }
    }
}

/// A full fuzz plan: parameter plans in declaration order plus fixed values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FuzzPlan {
    plans: Vec<ParamPlan>,
    fixed: BTreeMap<String, Value>,
}

impl FuzzPlan {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_plan(mut self, plan: ParamPlan) -> Self {
        self.plans.push(plan);
        self
    }

    #[must_use]
    pub fn with_fixed(mut self, param: impl Into<String>, value: Value) -> Self {
        self.fixed.insert(param.into(), value);
        self
    }

    #[must_use]
    pub fn plans(&self) -> &[ParamPlan] {
        &self.plans
    }

    #[must_use]
    pub fn fixed(&self) -> &BTreeMap<String, Value> {
        &self.fixed
    }

    /// Pre-flight validation against the target signature. Raised before any
    /// invocation; a failed plan aborts the whole run.
    pub fn validate(&self, signature: &Signature) -> Result<(), PlanError> {
        if self.plans.is_empty() {
            return Err(PlanError::NoParams);
        }
        let mut planned = BTreeSet::new();
        for plan in &self.plans {
            if signature.param(&plan.param).is_none() {
                return Err(PlanError::UnknownParam {
                    param: plan.param.clone(),
                });
            }
            if !planned.insert(plan.param.as_str()) {
                return Err(PlanError::DuplicateParam {
                    param: plan.param.clone(),
                });
            }
            if self.fixed.contains_key(&plan.param) {
                return Err(PlanError::PlannedAndFixed {
                    param: plan.param.clone(),
                });
            }
            if plan.candidates.is_empty() {
                return Err(PlanError::EmptySuite {
                    param: plan.param.clone(),
                });
            }
        }
        for name in self.fixed.keys() {
            if signature.param(name).is_none() {
                return Err(PlanError::UnknownParam {
                    param: name.clone(),
                });
            }
        }
        for param in &signature.params {
            let covered = planned.contains(param.name.as_str())
                || self.fixed.contains_key(&param.name)
                || param.has_default;
            if !covered {
                return Err(PlanError::MissingFixed {
                    param: param.name.clone(),
                });
            }
        }
        debug!(
            fn_name = %signature.fn_name,
            planned = self.plans.len(),
            fixed = self.fixed.len(),
            "plan validated"
        );
        Ok(())
    }

    /// Total combination cardinality, computed without materializing the
    /// cross-product. Always equals `combinations()?.len()`.
    pub fn combination_count(&self) -> Result<u64, PlanError> {
        if self.plans.is_empty() {
            return Err(PlanError::NoParams);
        }
        let mut total: u64 = 1;
        for plan in &self.plans {
            if plan.candidates.is_empty() {
                return Err(PlanError::EmptySuite {
                    param: plan.param.clone(),
                });
            }
            total = total
                .checked_mul(plan.candidates.len() as u64)
                .ok_or(PlanError::CountOverflow)?;
        }
        Ok(total)
    }

    /// Materializes the full cross-product in deterministic order: the
    /// first-listed parameter varies slowest, the last varies fastest.
    pub fn combinations(&self) -> Result<Vec<Combination>, PlanError> {
        let total = self.combination_count()?;
        let total = usize::try_from(total).map_err(|_| PlanError::CountOverflow)?;
        let k = self.plans.len();
        let sizes: Vec<usize> = self.plans.iter().map(|p| p.candidates.len()).collect();

        let mut out = Vec::with_capacity(total);
        let mut idx = vec![0usize; k];
        for _ in 0..total {
            let chosen = self
                .plans
                .iter()
                .zip(&idx)
                .map(|(plan, &i)| (plan.param.clone(), plan.candidates[i].clone()))
                .collect();
            out.push(Combination {
                chosen,
                fixed: self.fixed.clone(),
            });
            // Odometer increment: rightmost digit first.
            for j in (0..k).rev() {
                idx[j] += 1;
                if idx[j] < sizes[j] {
                    break;
                }
                idx[j] = 0;
            }
        }
        Ok(out)
    }
}

/// Batch sizes above this require explicit confirmation before running.
pub const GUARD_THRESHOLD: u64 = 500_000;

/// How the host resolves an over-threshold batch. Silently running an
/// arbitrarily large batch is never an option.
pub enum GuardPolicy {
    /// Refuse over-threshold batches outright (non-interactive default).
    AutoDeny,
    /// Run over-threshold batches without asking.
    AutoConfirm,
    /// Ask the host; the callback receives the planned count.
    Interactive(Box<dyn Fn(u64) -> bool + Send + Sync>),
}

impl std::fmt::Debug for GuardPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AutoDeny => write!(f, "AutoDeny"),
            Self::AutoConfirm => write!(f, "AutoConfirm"),
            Self::Interactive(_) => write!(f, "Interactive(..)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// At or under the threshold; runs immediately.
    WithinLimit,
    /// Over the threshold and explicitly confirmed.
    Confirmed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    Refused { count: u64 },
}

impl std::fmt::Display for GuardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Refused { count } => {
                write!(
                    f,
                    "batch of {count} combinations exceeds the {GUARD_THRESHOLD} limit and was not confirmed"
                )
            }
        }
    }
}

impl std::error::Error for GuardError {}

impl GuardError {
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Refused { .. } => "guard_batch_refused",
        }
    }
}

/// Gate on the planned cardinality. Counts at or below [`GUARD_THRESHOLD`]
/// pass without confirmation; anything above consults the policy.
pub fn check_batch_size(count: u64, policy: &GuardPolicy) -> Result<GuardDecision, GuardError> {
    if count <= GUARD_THRESHOLD {
        debug!(count, "batch within size limit");
        return Ok(GuardDecision::WithinLimit);
    }
    warn!(count, threshold = GUARD_THRESHOLD, "large batch needs confirmation");
    let confirmed = match policy {
        GuardPolicy::AutoDeny => false,
        GuardPolicy::AutoConfirm => true,
        GuardPolicy::Interactive(confirm) => confirm(count),
    };
    if confirmed {
        Ok(GuardDecision::Confirmed)
    } else {
        Err(GuardError::Refused { count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gfz_catalog::{suite_int, suite_lgl};

    fn sig() -> Signature {
        Signature::new("target", &[("x", false), ("n", false), ("opt", true)])
    }

    // ── Validation ──

    #[test]
    fn validate_accepts_covered_plan() {
        let plan = FuzzPlan::new()
            .with_plan(ParamPlan::from_suite("n", &suite_int()))
            .with_fixed("x", Value::Str("z".into()));
        assert!(plan.validate(&sig()).is_ok());
    }

    #[test]
    fn validate_rejects_unknown_planned_param() {
        let plan = FuzzPlan::new().with_plan(ParamPlan::from_suite("nope", &suite_int()));
        assert_eq!(
            plan.validate(&sig()),
            Err(PlanError::UnknownParam {
                param: "nope".into()
            })
        );
    }

    #[test]
    fn validate_rejects_unknown_fixed_param() {
        let plan = FuzzPlan::new()
            .with_plan(ParamPlan::from_suite("n", &suite_int()))
            .with_fixed("x", Value::Int(0))
            .with_fixed("ghost", Value::Null);
        assert_eq!(
            plan.validate(&sig()),
            Err(PlanError::UnknownParam {
                param: "ghost".into()
            })
        );
    }

    #[test]
    fn validate_rejects_missing_required_fixed() {
        let plan = FuzzPlan::new().with_plan(ParamPlan::from_suite("n", &suite_int()));
        assert_eq!(
            plan.validate(&sig()),
            Err(PlanError::MissingFixed { param: "x".into() })
        );
    }

    #[test]
    fn validate_allows_defaulted_param_to_stay_uncovered() {
        // "opt" has a default and appears nowhere in the plan.
        let plan = FuzzPlan::new()
            .with_plan(ParamPlan::from_suite("n", &suite_int()))
            .with_fixed("x", Value::Int(0));
        assert!(plan.validate(&sig()).is_ok());
    }

    #[test]
    fn validate_rejects_planned_and_fixed_conflict() {
        let plan = FuzzPlan::new()
            .with_plan(ParamPlan::from_suite("n", &suite_int()))
            .with_fixed("n", Value::Int(1))
            .with_fixed("x", Value::Int(0));
        assert_eq!(
            plan.validate(&sig()),
            Err(PlanError::PlannedAndFixed { param: "n".into() })
        );
    }

    #[test]
    fn validate_rejects_duplicate_plans_and_empty_suites() {
        let plan = FuzzPlan::new()
            .with_plan(ParamPlan::from_suite("n", &suite_int()))
            .with_plan(ParamPlan::from_suite("n", &suite_lgl()))
            .with_fixed("x", Value::Int(0));
        assert_eq!(
            plan.validate(&sig()),
            Err(PlanError::DuplicateParam { param: "n".into() })
        );

        let plan = FuzzPlan::new()
            .with_plan(ParamPlan {
                param: "n".into(),
                candidates: vec![],
            })
            .with_fixed("x", Value::Int(0));
        assert_eq!(
            plan.validate(&sig()),
            Err(PlanError::EmptySuite { param: "n".into() })
        );
        assert!(matches!(plan.validate(&sig()), Err(e) if e.reason_code() == "plan_empty_suite"));
    }

    #[test]
    fn empty_plan_is_rejected_everywhere() {
        let plan = FuzzPlan::new();
        assert_eq!(plan.validate(&sig()), Err(PlanError::NoParams));
        assert_eq!(plan.combination_count(), Err(PlanError::NoParams));
    }

    // ── Enumeration order ──

    fn two_by_three() -> FuzzPlan {
        FuzzPlan::new()
            .with_plan(ParamPlan::from_pairs(
                "a",
                vec![("a0", Value::Int(0)), ("a1", Value::Int(1))],
            ))
            .with_plan(ParamPlan::from_pairs(
                "b",
                vec![
                    ("b0", Value::Int(0)),
                    ("b1", Value::Int(1)),
                    ("b2", Value::Int(2)),
                ],
            ))
    }

    #[test]
    fn single_plan_enumerates_in_suite_order() {
        let plan = FuzzPlan::new().with_plan(ParamPlan::from_suite("n", &suite_int()));
        let combos = plan.combinations().unwrap();
        assert_eq!(combos.len(), suite_int().len());
        let names: Vec<&str> = combos
            .iter()
            .map(|c| c.chosen_name("n").unwrap())
            .collect();
        assert_eq!(names, suite_int().names());
    }

    #[test]
    fn first_listed_param_varies_slowest() {
        let combos = two_by_three().combinations().unwrap();
        let pairs: Vec<(String, String)> = combos
            .iter()
            .map(|c| {
                (
                    c.chosen_name("a").unwrap().to_string(),
                    c.chosen_name("b").unwrap().to_string(),
                )
            })
            .collect();
        let want: Vec<(String, String)> = [
            ("a0", "b0"),
            ("a0", "b1"),
            ("a0", "b2"),
            ("a1", "b0"),
            ("a1", "b1"),
            ("a1", "b2"),
        ]
        .iter()
        .map(|(a, b)| ((*a).to_string(), (*b).to_string()))
        .collect();
        assert_eq!(pairs, want);
    }

    #[test]
    fn count_matches_materialized_len() {
        let plan = two_by_three();
        assert_eq!(plan.combination_count().unwrap(), 6);
        assert_eq!(plan.combinations().unwrap().len(), 6);
    }

    #[test]
    fn count_overflow_is_reported_not_wrapped() {
        // 65 binary parameters: 2^65 overflows u64.
        let mut plan = FuzzPlan::new();
        for i in 0..65 {
            plan = plan.with_plan(ParamPlan::from_pairs(
                format!("p{i}"),
                vec![("off", Value::Bool(false)), ("on", Value::Bool(true))],
            ));
        }
        assert_eq!(plan.combination_count(), Err(PlanError::CountOverflow));
        assert_eq!(plan.combinations(), Err(PlanError::CountOverflow));
    }

    #[test]
    fn combinations_carry_fixed_values() {
        let plan = FuzzPlan::new()
            .with_plan(ParamPlan::from_pairs("a", vec![("a0", Value::Int(0))]))
            .with_fixed("x", Value::Str("z".into()));
        let combos = plan.combinations().unwrap();
        assert_eq!(combos[0].fixed.get("x"), Some(&Value::Str("z".into())));
    }

    // ── Size guard ──

    #[test]
    fn guard_threshold_is_inclusive() {
        assert_eq!(
            check_batch_size(500_000, &GuardPolicy::AutoDeny),
            Ok(GuardDecision::WithinLimit)
        );
        assert_eq!(
            check_batch_size(500_001, &GuardPolicy::AutoDeny),
            Err(GuardError::Refused { count: 500_001 })
        );
    }

    #[test]
    fn guard_auto_confirm_runs_large_batches() {
        assert_eq!(
            check_batch_size(500_001, &GuardPolicy::AutoConfirm),
            Ok(GuardDecision::Confirmed)
        );
    }

    #[test]
    fn guard_interactive_consults_callback() {
        let yes = GuardPolicy::Interactive(Box::new(|_| true));
        let no = GuardPolicy::Interactive(Box::new(|count| count < 600_000));
        assert_eq!(
            check_batch_size(500_001, &yes),
            Ok(GuardDecision::Confirmed)
        );
        assert_eq!(
            check_batch_size(700_000, &no),
            Err(GuardError::Refused { count: 700_000 })
        );
    }
}
