use std::collections::BTreeMap;

use gfz_catalog::{all_suites, TestSuite};
use gfz_plan::{FuzzPlan, ParamPlan, Signature};
use gfz_run::{fuzz_function, Args, FnTarget, OutcomeKind, Runner, WarningSink};
use gfz_value::{Value, ValueKind};

// A target with real mixed behavior: lengths for vectors, warnings for
// missing slots, errors for everything it cannot measure.
fn measure_target() -> FnTarget<impl Fn(&Args, &mut WarningSink) -> Result<Value, String>> {
    FnTarget::new(
        Signature::new("measure", &[("input", false), ("label", false)]),
        |args, warnings| {
            let input = args.get("input").ok_or("missing input".to_string())?;
            match input {
                Value::Null => Err("cannot measure null".to_string()),
                Value::Na(_) => Err("cannot measure a missing value".to_string()),
                Value::Strs(slots) => {
                    if slots.iter().any(Option::is_none) {
                        warnings.warn("input has missing slots");
                    }
                    Ok(Value::Int(slots.len() as i64))
                }
                Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
                Value::Ints(slots) => Ok(Value::Int(slots.len() as i64)),
                Value::Int(_) | Value::Double(_) | Value::Bool(_) | Value::Date(_) => {
                    Ok(Value::Int(1))
                }
                other => Err(format!("unsupported kind {}", other.kind().name())),
            }
        },
    )
}

#[test]
fn full_catalog_run_completes_with_one_record_per_value() {
    let catalog = TestSuite::concat("all", all_suites()).expect("built-in names are unique");
    let mut fixed = BTreeMap::new();
    fixed.insert("label".to_string(), Value::Str("smoke".into()));

    let target = measure_target();
    let report = fuzz_function(&target, "input", fixed, &catalog).expect("run should complete");

    let total: usize = all_suites().iter().map(TestSuite::len).sum();
    assert_eq!(report.len(), total);

    // Plan order is catalog order.
    let names: Vec<&str> = report
        .records()
        .iter()
        .map(|r| r.combination.chosen_name("input").unwrap())
        .collect();
    assert_eq!(names, catalog.names());

    // Every record is classified, none aborted the batch.
    for record in report.records() {
        match record.outcome.kind() {
            OutcomeKind::Success | OutcomeKind::Warning => {
                assert!(record.outcome.value().is_some());
            }
            OutcomeKind::Error => assert!(record.outcome.value().is_none()),
        }
        assert!(record.call_expression.starts_with("measure(input = "));
    }
}

#[test]
fn queries_work_against_a_catalog_run() {
    let catalog = TestSuite::concat("all", all_suites()).unwrap();
    let mut fixed = BTreeMap::new();
    fixed.insert("label".to_string(), Value::Str("smoke".into()));
    let target = measure_target();
    let report = fuzz_function(&target, "input", fixed, &catalog).unwrap();

    // char_with_na triggers the warning path; value is kept by default.
    assert_eq!(
        report.value("input", "^char_with_na$").unwrap(),
        Some(&Value::Int(2))
    );

    // null errors, so the value is absent while the expression remains.
    assert_eq!(report.value("input", "^null$").unwrap(), None);
    assert_eq!(
        report.call_expression("input", "^null$").unwrap(),
        "measure(input = null, label = \"smoke\")"
    );

    // Lists are unsupported by this target and surface as errors.
    assert_eq!(
        report
            .records()
            .iter()
            .find(|r| r.combination.chosen_name("input") == Some("list_mixed"))
            .unwrap()
            .outcome
            .kind(),
        OutcomeKind::Error
    );
}

#[test]
fn multi_parameter_catalog_run_has_product_cardinality() {
    let target = FnTarget::new(
        Signature::new("combine", &[("a", false), ("b", false)]),
        |args, _w| {
            let a = args.get("a").ok_or("missing a")?;
            let b = args.get("b").ok_or("missing b")?;
            if a.kind() == ValueKind::Null || b.kind() == ValueKind::Null {
                Err("null operand".to_string())
            } else {
                Ok(Value::List(vec![a.clone(), b.clone()]))
            }
        },
    );

    let plan = FuzzPlan::new()
        .with_plan(ParamPlan::from_suite("a", &gfz_catalog::suite_lgl()))
        .with_plan(ParamPlan::from_suite("b", &gfz_catalog::suite_null_na()));
    let report = Runner::default().run(&target, &plan).unwrap();

    assert_eq!(
        report.len(),
        gfz_catalog::suite_lgl().len() * gfz_catalog::suite_null_na().len()
    );

    // Rows project one line per record and round-trip through JSON.
    let rows = report.rows();
    assert_eq!(rows.len(), report.len());
    assert_eq!(rows[0].fuzz_input, "a = lgl_empty, b = null");
    assert_eq!(rows[0].outcome, "error");
    let json = report.rows_json().unwrap();
    assert!(json.contains("lgl_true"));
}
