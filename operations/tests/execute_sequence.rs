//! End-to-end tests for sequence execution and report-tree linkage.
//!
//! Sequences run real operations against a shared memory reporter and the
//! tests inspect the stored history afterwards.

use std::sync::Arc;

use anyhow::anyhow;
use operations::bundle::Bundle;
use operations::core::report::{GenericReport, Report};
use operations::core::retry::RetryPolicy;
use operations::core::unrecoverable::{is_unrecoverable, unrecoverable};
use operations::execute::{FailureKind, execute_operation, execute_sequence};
use operations::operation::{Operation, Sequence};
use operations::reporter::{MemoryReporter, Reporter};
use operations::test_support::{ErrorReporter, definition, test_bundle};

fn plus1() -> Operation<i64, i64, ()> {
    Operation::new(definition("plus1"), |_, _, input: &i64| Ok(input + 1))
}

fn ids(reports: &[GenericReport]) -> Vec<String> {
    reports.iter().map(|report| report.id.clone()).collect()
}

/// Sequence that runs `plus1` twice and returns the final value.
fn double_plus1() -> Sequence<i64, i64, ()> {
    let op = plus1();
    Sequence::new(definition("seq-plus2"), move |bundle: &Bundle, deps, input: &i64| {
        let first = execute_operation(bundle, &op, deps, *input, [])?;
        let second = execute_operation(bundle, &op, deps, first.output.unwrap_or_default(), [])?;
        Ok(second.output.unwrap_or_default())
    })
}

#[test]
fn sequence_links_exactly_its_direct_children() {
    let (bundle, reporter) = test_bundle();

    let result = execute_sequence(&bundle, &double_plus1(), &(), 1).expect("sequence");

    assert_eq!(result.report.output, Some(3));
    assert_eq!(result.report.child_operation_reports.len(), 2);

    let stored = reporter.get_reports().expect("reports");
    assert_eq!(stored.len(), 3);
    // Children are stored in call order, the sequence last.
    assert_eq!(
        result.report.child_operation_reports,
        vec![stored[0].id.clone(), stored[1].id.clone()]
    );
    assert_eq!(stored[2].id, result.report.id);

    assert_eq!(ids(&result.execution_reports), ids(&stored));
    assert_eq!(
        reporter
            .get_execution_reports(&result.report.id)
            .expect("subtree"),
        result.execution_reports
    );
}

#[test]
fn nested_sequences_keep_grandchildren_under_their_own_parent() {
    let (bundle, reporter) = test_bundle();
    let op = plus1();
    let inner = double_plus1();
    let outer = Sequence::new(
        definition("seq-outer"),
        move |bundle: &Bundle, deps, input: &i64| {
            let before = execute_operation(bundle, &op, deps, *input, [])?;
            let nested = execute_sequence(
                bundle,
                &inner,
                deps,
                before.output.unwrap_or_default(),
            )?;
            Ok(nested.report.output.unwrap_or_default())
        },
    );

    let result = execute_sequence(&bundle, &outer, &(), 0).expect("sequence");
    assert_eq!(result.report.output, Some(3));

    let stored = reporter.get_reports().expect("reports");
    // plus1, plus1 (inner), plus1 (inner), seq-plus2, seq-outer
    assert_eq!(stored.len(), 5);
    let names: Vec<&str> = stored.iter().map(|report| report.def.id.as_str()).collect();
    assert_eq!(
        names,
        vec!["plus1", "plus1", "plus1", "seq-plus2", "seq-outer"]
    );

    let inner_report = &stored[3];
    assert_eq!(
        inner_report.child_operation_reports,
        vec![stored[1].id.clone(), stored[2].id.clone()]
    );
    assert_eq!(
        result.report.child_operation_reports,
        vec![stored[0].id.clone(), inner_report.id.clone()]
    );

    // Post-order: every report appears after all of its descendants.
    assert_eq!(ids(&result.execution_reports), ids(&stored));
}

#[test]
fn sibling_and_deeper_sequences_only_claim_their_own_children() {
    let (bundle, reporter) = test_bundle();
    let first = double_plus1();
    let second = double_plus1();
    let middle = Sequence::new(
        definition("seq-middle"),
        move |bundle: &Bundle, deps, input: &i64| {
            let left = execute_sequence(bundle, &first, deps, *input)?;
            let right = execute_sequence(
                bundle,
                &second,
                deps,
                left.report.output.unwrap_or_default(),
            )?;
            Ok(right.report.output.unwrap_or_default())
        },
    );
    let top = Sequence::new(
        definition("seq-top"),
        move |bundle: &Bundle, deps, input: &i64| {
            let nested = execute_sequence(bundle, &middle, deps, *input)?;
            Ok(nested.report.output.unwrap_or_default())
        },
    );

    let result = execute_sequence(&bundle, &top, &(), 0).expect("sequence");
    assert_eq!(result.report.output, Some(4));

    let stored = reporter.get_reports().expect("reports");
    // 2 x (plus1, plus1, seq-plus2), seq-middle, seq-top
    assert_eq!(stored.len(), 8);
    let left = &stored[2];
    let right = &stored[5];
    let middle_report = &stored[6];
    assert_eq!(
        left.child_operation_reports,
        vec![stored[0].id.clone(), stored[1].id.clone()]
    );
    assert_eq!(
        right.child_operation_reports,
        vec![stored[3].id.clone(), stored[4].id.clone()]
    );
    assert_eq!(
        middle_report.child_operation_reports,
        vec![left.id.clone(), right.id.clone()]
    );
    assert_eq!(
        result.report.child_operation_reports,
        vec![middle_report.id.clone()]
    );
    assert_eq!(ids(&result.execution_reports), ids(&stored));
}

#[test]
fn sequence_report_records_handler_failure() {
    let (bundle, reporter) = test_bundle();
    let op: Operation<i64, i64, ()> = Operation::new(definition("plus1"), |_, _, _| {
        Err(unrecoverable(anyhow!("fatal error")))
    });
    let sequence = Sequence::new(
        definition("seq-plus1"),
        move |bundle: &Bundle, deps, input: &i64| {
            let report = execute_operation(bundle, &op, deps, *input, [])?;
            Ok(report.output.unwrap_or_default() + 1)
        },
    );

    let err = execute_sequence(&bundle, &sequence, &(), 1).expect_err("failure");

    assert_eq!(err.kind(), FailureKind::Handler);
    assert!(is_unrecoverable(err.error()));
    assert!(format!("{:#}", err.error()).contains("fatal error"));

    let result = err.report();
    assert_eq!(result.report.output, None);
    assert_eq!(
        result.report.err.as_deref(),
        Some("execute plus1: fatal error")
    );
    assert_eq!(result.report.child_operation_reports.len(), 1);
    assert_eq!(result.execution_reports.len(), 2);

    // The failed sequence is still durably recorded.
    let stored = reporter.get_report(&result.report.id).expect("stored");
    assert_eq!(stored.err, result.report.err);
    assert_eq!(
        result.execution_reports[0],
        reporter
            .get_report(&result.report.child_operation_reports[0])
            .expect("child")
    );
    assert_eq!(result.execution_reports[1], stored);
}

#[test]
fn handler_may_tolerate_a_failed_child() {
    let (bundle, _) = test_bundle();
    let op: Operation<i64, i64, ()> = Operation::new(definition("flaky"), |_, _, _| {
        Err(unrecoverable(anyhow!("rejected")))
    });
    let sequence = Sequence::new(
        definition("seq-tolerant"),
        move |bundle: &Bundle, deps, input: &i64| {
            let fallback = match execute_operation(bundle, &op, deps, *input, []) {
                Ok(report) => report.output.unwrap_or_default(),
                Err(_) => -1,
            };
            Ok(fallback)
        },
    );

    let result = execute_sequence(&bundle, &sequence, &(), 1).expect("sequence");

    assert_eq!(result.report.output, Some(-1));
    assert!(result.report.err.is_none());
    assert_eq!(result.execution_reports.len(), 2);
    assert!(result.execution_reports[0].err.is_some());
}

#[test]
fn sequence_without_children_has_single_report_tree() {
    let (bundle, _) = test_bundle();
    let sequence: Sequence<i64, i64, ()> =
        Sequence::new(definition("seq-noop"), |_, _, input: &i64| Ok(*input));

    let result = execute_sequence(&bundle, &sequence, &(), 7).expect("sequence");

    assert!(result.report.child_operation_reports.is_empty());
    assert_eq!(ids(&result.execution_reports), vec![result.report.id.clone()]);
}

#[test]
fn sequence_report_storage_failure_is_surfaced() {
    let reporter = Arc::new(ErrorReporter::failing_add("add report error"));
    let bundle = Bundle::new(reporter).with_retry_policy(RetryPolicy::immediate());

    let err = execute_sequence(&bundle, &double_plus1(), &(), 1).expect_err("storage");

    assert!(err.is_storage());
    assert!(format!("{:#}", err.error()).contains("add report error"));
    assert!(err.report().execution_reports.is_empty());
}

#[test]
fn execution_tree_read_failure_is_surfaced() {
    let reporter = Arc::new(ErrorReporter::failing_execution_reports(
        "get execution reports error",
    ));
    let bundle = Bundle::new(reporter.clone()).with_retry_policy(RetryPolicy::immediate());

    let err = execute_sequence(&bundle, &double_plus1(), &(), 1).expect_err("storage");

    assert!(err.is_storage());
    assert!(format!("{:#}", err.error()).contains("get execution reports error"));
    // The report itself was stored before the read failed.
    assert_eq!(err.report().report.output, Some(3));
    reporter
        .get_report(&err.report().report.id)
        .expect("sequence report stored");
}

#[test]
fn typed_child_reports_can_be_recovered_from_the_tree() {
    let (bundle, _) = test_bundle();

    let result = execute_sequence(&bundle, &double_plus1(), &(), 1).expect("sequence");

    let children: Vec<Report<i64, i64>> = result.execution_reports[..2]
        .iter()
        .map(|report| Report::from_generic(report).expect("typed"))
        .collect();
    assert_eq!(children[0].input, 1);
    assert_eq!(children[0].output, Some(2));
    assert_eq!(children[1].input, 2);
    assert_eq!(children[1].output, Some(3));
}

#[test]
fn concurrent_sequences_share_one_reporter() {
    let reporter = Arc::new(MemoryReporter::new());
    let bundle = Bundle::new(reporter.clone()).with_retry_policy(RetryPolicy::immediate());
    let sequence = Arc::new(double_plus1());

    let handles: Vec<_> = (0..4)
        .map(|input| {
            let bundle = bundle.clone();
            let sequence = Arc::clone(&sequence);
            std::thread::spawn(move || {
                execute_sequence(&bundle, &sequence, &(), input).expect("sequence")
            })
        })
        .collect();

    for handle in handles {
        let result = handle.join().expect("join");
        assert_eq!(result.report.child_operation_reports.len(), 2);
        assert_eq!(result.execution_reports.len(), 3);
    }
    assert_eq!(reporter.len().expect("len"), 12);
}
