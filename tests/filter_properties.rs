//! Property tests for criteria compilation.

use inventory_report::search::filter::compile_criteria;
use inventory_report::search::{Bound, Clause, Criterion, FieldKind, SearchError};
use proptest::prelude::*;

fn field_name() -> impl Strategy<Value = String> {
    "[a-z][a-z_]{0,12}(\\.[a-z]{1,6})?"
}

fn numeric_kind() -> impl Strategy<Value = FieldKind> {
    prop_oneof![Just(FieldKind::Int), Just(FieldKind::Float)]
}

fn any_kind() -> impl Strategy<Value = FieldKind> {
    prop_oneof![
        Just(FieldKind::String),
        Just(FieldKind::Int),
        Just(FieldKind::Float)
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn string_equal_compiles_to_exact_match(field in field_name(), value in "\\PC{1,24}") {
        let filter = compile_criteria(&[Criterion::equal(&field, FieldKind::String, &value)]).unwrap();
        prop_assert_eq!(filter.len(), 1);
        prop_assert_eq!(filter.get(&field), Some(&Clause::String(value)));
    }

    #[test]
    fn numeric_equal_fails_iff_unparseable(
        field in field_name(),
        kind in numeric_kind(),
        value in prop_oneof!["-?[0-9]{1,12}", "-?[0-9]{1,6}\\.[0-9]{1,4}", "[a-z]{1,6}", "\\PC{1,8}"],
    ) {
        let parses = match kind {
            FieldKind::Int => value.parse::<i64>().is_ok(),
            FieldKind::Float => value.parse::<f64>().is_ok(),
            FieldKind::String => unreachable!(),
        };
        let result = compile_criteria(&[Criterion::equal(&field, kind, &value)]);
        match result {
            Ok(filter) => {
                prop_assert!(parses, "{value:?} compiled as {kind}");
                prop_assert_eq!(filter.get(&field).map(Clause::kind), Some(kind));
            }
            Err(SearchError::ValueParse { index, kind: k, value: v, .. }) => {
                prop_assert!(!parses, "{value:?} rejected as {kind}");
                prop_assert_eq!(index, 0);
                prop_assert_eq!(k, kind);
                prop_assert_eq!(v, value);
            }
            Err(other) => prop_assert!(false, "unexpected error {other:?}"),
        }
    }

    #[test]
    fn missing_type_wins_over_everything(
        field in prop_oneof![Just(String::new()), field_name()],
        equal in prop_oneof![Just(String::new()), "[0-9]{1,4}"],
        lower in proptest::option::of(-1e6f64..1e6),
        upper in proptest::option::of(-1e6f64..1e6),
    ) {
        let c = Criterion { field, kind: String::new(), equal, lower_limit: lower, upper_limit: upper };
        let result = compile_criteria(&[c]);
        prop_assert!(
            matches!(result, Err(SearchError::MissingType { index: 0 })),
            "expected a missing type error, got {:?}",
            result
        );
    }

    #[test]
    fn missing_field_reported_when_type_present(
        kind in any_kind(),
        equal in prop_oneof![Just(String::new()), "[0-9]{1,4}"],
        lower in proptest::option::of(-1e6f64..1e6),
    ) {
        let c = Criterion { field: String::new(), kind: kind.to_string(), equal, lower_limit: lower, upper_limit: None };
        let result = compile_criteria(&[c]);
        prop_assert!(
            matches!(result, Err(SearchError::MissingField { index: 0 })),
            "expected a missing field error, got {:?}",
            result
        );
    }

    #[test]
    fn no_value_and_no_limits_is_missing_value(field in field_name(), kind in any_kind()) {
        let c = Criterion { field: field.clone(), kind: kind.to_string(), ..Criterion::default() };
        match compile_criteria(&[c]) {
            Err(SearchError::MissingValue { index: 0, field: f }) => prop_assert_eq!(f, field),
            other => prop_assert!(false, "unexpected {other:?}"),
        }
    }

    #[test]
    fn later_criterion_on_same_field_wins(
        field in field_name(),
        first in -1000i64..1000,
        second in -1000i64..1000,
    ) {
        let filter = compile_criteria(&[
            Criterion::equal(&field, FieldKind::Int, first.to_string()),
            Criterion::equal(&field, FieldKind::Int, second.to_string()),
        ]).unwrap();
        prop_assert_eq!(filter.len(), 1);
        prop_assert_eq!(filter.get(&field), Some(&Clause::Int(Bound::Eq(second))));
    }

    #[test]
    fn float_limits_are_kept_verbatim(
        field in field_name(),
        lower in proptest::option::of(-1e9f64..1e9),
        upper in proptest::option::of(-1e9f64..1e9),
    ) {
        prop_assume!(lower.is_some() || upper.is_some());
        let filter = compile_criteria(&[Criterion::range(&field, FieldKind::Float, lower, upper)]).unwrap();
        prop_assert_eq!(
            filter.get(&field),
            Some(&Clause::Float(Bound::Range { gte: lower, lte: upper }))
        );
    }
}

#[test]
fn zero_lower_limit_is_a_real_bound() {
    let filter =
        compile_criteria(&[Criterion::range("price", FieldKind::Float, Some(0.0), None)]).unwrap();
    assert_eq!(
        filter.get("price"),
        Some(&Clause::Float(Bound::Range {
            gte: Some(0.0),
            lte: None
        }))
    );
}

#[test]
fn limits_without_field_or_type_are_rejected() {
    let c = Criterion {
        upper_limit: Some(4000.0),
        lower_limit: Some(3000.0),
        ..Criterion::default()
    };
    let err = compile_criteria(&[c]).unwrap_err();
    assert!(matches!(
        err,
        SearchError::MissingType { .. } | SearchError::MissingField { .. }
    ));
    assert!(err.is_invalid_request());
}
