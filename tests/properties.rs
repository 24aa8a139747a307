//! Property-based tests for the token grammar, the binary codec and row parsing.

use proptest::collection::vec as prop_vec;
use proptest::option;
use proptest::prelude::*;

use fmfeature::{
    parse, parse_into, parse_row, ByteReader, Feature, FeatureArena, FeatureMode, IndexFeature,
    NamedFeature,
};

// =============================================================================
// Generators
// =============================================================================

/// Strategy for finite doubles (no NaN/Inf).
fn arb_finite_f64() -> impl Strategy<Value = f64> {
    prop::num::f64::ANY.prop_filter("must be finite", |v| v.is_finite())
}

fn arb_mode() -> impl Strategy<Value = FeatureMode> {
    prop_oneof![Just(FeatureMode::Indexed), Just(FeatureMode::Named)]
}

fn arb_index_feature() -> impl Strategy<Value = Feature> {
    (0..=i32::MAX, arb_finite_f64())
        .prop_map(|(index, value)| IndexFeature::new(index, value).expect("valid").into())
}

fn named(field: Option<String>, name: String, value: f64) -> Feature {
    match field {
        Some(field) => NamedFeature::with_field(field, name, value),
        None => NamedFeature::new(name, value),
    }
    .expect("valid")
    .into()
}

/// Named features whose names and fields survive token splitting.
fn arb_plain_named_feature() -> impl Strategy<Value = Feature> {
    (
        option::of("[a-z0-9_.\\-]{1,8}"),
        "[A-Za-z0-9_.\\-]{1,12}",
        arb_finite_f64(),
    )
        .prop_map(|(field, name, value)| named(field, name, value))
}

/// Named features over arbitrary printable UTF-8, separators included.
fn arb_any_named_feature() -> impl Strategy<Value = Feature> {
    (option::of("\\PC{0,8}"), "\\PC{1,12}", arb_finite_f64())
        .prop_map(|(field, name, value)| named(field, name, value))
}

fn arb_plain_feature() -> impl Strategy<Value = Feature> {
    prop_oneof![arb_index_feature(), arb_plain_named_feature()]
}

/// Well-formed tokens of either mode mixed with arbitrary short text.
fn arb_token() -> impl Strategy<Value = String> {
    prop_oneof![
        arb_plain_feature().prop_map(|f| f.to_string()),
        (0..64i32).prop_map(|i| i.to_string()),
        "[a-z0-9:.\\-]{0,10}",
    ]
}

fn arb_row() -> impl Strategy<Value = Option<Vec<Option<String>>>> {
    option::weighted(0.9, prop_vec(option::of(arb_token()), 0..8))
}

// =============================================================================
// Token grammar
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn indexed_tokens_recover_their_parts(index in 0..=i32::MAX, value in arb_finite_f64()) {
        let expected = Feature::from(IndexFeature::new(index, value).expect("valid"));
        prop_assert_eq!(parse(&format!("{index}:{value}"), FeatureMode::Indexed).unwrap(), expected);

        let bare = parse(&index.to_string(), FeatureMode::Indexed).unwrap();
        prop_assert_eq!(bare.as_index().map(IndexFeature::index), Some(index));
        prop_assert_eq!(bare.value(), 1.0);
    }

    #[test]
    fn named_tokens_recover_their_parts(
        field in "[a-z]{1,6}",
        name in "[A-Za-z0-9_]{1,10}",
        value in arb_finite_f64()
    ) {
        let parsed = parse(&format!("{field}:{name}:{value}"), FeatureMode::Named).unwrap();
        prop_assert_eq!(parsed, named(Some(field), name.clone(), value));

        let parsed = parse(&format!("{name}:{value}"), FeatureMode::Named).unwrap();
        prop_assert_eq!(parsed, named(None, name.clone(), value));

        let parsed = parse(&name, FeatureMode::Named).unwrap();
        prop_assert_eq!(parsed, named(None, name, 1.0));
    }

    #[test]
    fn display_parses_back_to_the_same_feature(feature in arb_plain_feature()) {
        prop_assert!(feature.is_token_safe());
        prop_assert_eq!(parse(&feature.to_string(), feature.mode()).unwrap(), feature);
    }

    #[test]
    fn parse_into_agrees_with_parse(
        token in arb_token(),
        mode in arb_mode(),
        seed in arb_plain_feature()
    ) {
        let mut slot = seed.clone();
        let result = parse_into(&token, &mut slot, mode);
        match parse(&token, mode) {
            Ok(expected) => {
                prop_assert!(result.is_ok());
                prop_assert_eq!(slot, expected);
            }
            Err(expected) => {
                prop_assert_eq!(result.unwrap_err().to_string(), expected.to_string());
                prop_assert_eq!(slot, seed);
            }
        }
    }
}

// =============================================================================
// Binary codec
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn records_round_trip_in_exactly_byte_size(
        feature in prop_oneof![arb_index_feature(), arb_any_named_feature()]
    ) {
        let mut buf = Vec::new();
        feature.write_to(&mut buf).unwrap();
        prop_assert_eq!(buf.len(), feature.byte_size());

        let mut src = ByteReader::new(&buf);
        let decoded = Feature::read_from(&mut src, feature.mode()).unwrap();
        prop_assert_eq!(src.position(), feature.byte_size());
        prop_assert!(src.is_empty());
        prop_assert_eq!(decoded, feature);
    }

    #[test]
    fn total_bytes_is_sum_of_record_sizes(
        features in prop_vec(prop_oneof![arb_index_feature(), arb_any_named_feature()], 0..16)
    ) {
        let expected: usize = features.iter().map(Feature::byte_size).sum();
        prop_assert_eq!(fmfeature::total_bytes(&features), expected);
    }
}

// =============================================================================
// Row parsing
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn arena_rows_match_fresh_rows(rows in prop_vec(arb_row(), 1..6), mode in arb_mode()) {
        let mut arena = FeatureArena::new();
        for row in &rows {
            let fresh = parse_row(row.as_ref(), mode);
            let reused = arena.parse_row(row.as_ref(), mode);
            match (fresh, reused) {
                (Ok(fresh), Ok(reused)) => {
                    prop_assert_eq!(fresh.as_deref(), reused);
                }
                (Err(fresh), Err(reused)) => {
                    prop_assert_eq!(fresh.to_string(), reused.to_string());
                }
                (fresh, reused) => {
                    prop_assert!(false, "fresh {:?} differs from arena {:?}", fresh, reused);
                }
            }
        }
    }
}
