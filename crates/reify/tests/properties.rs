//! Property tests for the fingerprint contract.
//!
//! Invariants checked for arbitrary plain values:
//! - Round trip: decode(encode(v)) == v
//! - Determinism: equal values encode to identical bytes
//! - Reconstruction: a handle reproduces the wrapped value
//! - Memoization: equal values hit the same cache entry

use std::cell::Cell;
use std::collections::BTreeMap;

use proptest::prelude::*;
use reify::{Context, MapKey, Reconstruct, Value};

// ============================================================================
// Strategies
// ============================================================================

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Unit),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        any::<f64>().prop_map(Value::Float),
        prop::sample::select(vec![f64::NAN, f64::INFINITY, f64::NEG_INFINITY, 0.0, -0.0])
            .prop_map(Value::Float),
        ".*".prop_map(Value::Str),
    ]
}

fn map_key() -> impl Strategy<Value = MapKey> {
    prop_oneof![
        any::<bool>().prop_map(MapKey::Bool),
        any::<i64>().prop_map(MapKey::Int),
        "[a-z]{0,8}".prop_map(MapKey::Str),
    ]
}

fn value() -> impl Strategy<Value = Value> {
    scalar().prop_recursive(4, 64, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..8).prop_map(Value::Seq),
            prop::collection::vec(inner.clone(), 0..8).prop_map(Value::Tuple),
            prop::collection::btree_map(map_key(), inner, 0..8).prop_map(Value::Map),
        ]
    })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_decode_inverts_encode(v in value()) {
        let ctx: Context = Context::default();
        let fingerprint = ctx.encode(&v).unwrap();
        prop_assert_eq!(fingerprint.type_tag(), v.type_tag());
        prop_assert_eq!(ctx.decode(&fingerprint).unwrap(), v);
    }

    #[test]
    fn prop_encoding_is_deterministic(v in value()) {
        let ctx: Context = Context::default();
        let first = ctx.encode(&v).unwrap();
        let second = ctx.encode(&v.clone()).unwrap();
        prop_assert_eq!(first.as_bytes(), second.as_bytes());

        // Re-encoding the decoded value reproduces the same bytes.
        let again = ctx.encode(&ctx.decode(&first).unwrap()).unwrap();
        prop_assert_eq!(&first, &again);
        prop_assert_eq!(first.content_hash(), again.content_hash());
    }

    #[test]
    fn prop_handle_reconstructs_input(v in value()) {
        let ctx: Context = Context::default();
        let handle = ctx.wrap(v.clone()).unwrap();
        prop_assert_eq!(ctx.reconstruct(&handle).unwrap(), v.clone());

        let detached = handle.into_detached();
        prop_assert!(detached.original().is_none());
        prop_assert_eq!(detached.reconstruct_value(ctx.engine()).unwrap(), v);
    }

    #[test]
    fn prop_equal_values_generate_once(v in value(), copies in 1usize..6) {
        let mut ctx: Context<usize> = Context::default();
        let runs = Cell::new(0usize);
        for _ in 0..copies {
            let handle = ctx.wrap(v.clone()).unwrap();
            let artifact = ctx
                .generate("arity", &[&handle], |values| {
                    runs.set(runs.get() + 1);
                    Ok::<_, std::convert::Infallible>(values.len())
                })
                .unwrap();
            prop_assert_eq!(artifact, 1);
        }
        prop_assert_eq!(runs.get(), 1);
        prop_assert_eq!(ctx.stats().hits, copies as u64 - 1);
    }

    #[test]
    fn prop_distinct_ints_get_distinct_identities(a in any::<i64>(), b in any::<i64>()) {
        prop_assume!(a != b);
        let ctx: Context = Context::default();
        let fa = ctx.encode(&Value::Int(a)).unwrap();
        let fb = ctx.encode(&Value::Int(b)).unwrap();
        prop_assert_ne!(fa, fb);
    }
}

// ============================================================================
// Edge cases
// ============================================================================

#[test]
fn float_specials_compare_bit_exact() {
    let ctx: Context = Context::default();
    for x in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, f64::MIN_POSITIVE] {
        let fingerprint = ctx.encode(&Value::Float(x)).unwrap();
        let Value::Float(y) = ctx.decode(&fingerprint).unwrap() else {
            panic!("expected a float");
        };
        assert_eq!(x.to_bits(), y.to_bits());
    }

    let pos = ctx.encode(&Value::Float(0.0)).unwrap();
    let neg = ctx.encode(&Value::Float(-0.0)).unwrap();
    assert_ne!(pos, neg);
}

#[test]
fn multibyte_strings_round_trip() {
    let ctx: Context = Context::default();
    for s in ["", "ü", "日本語", "🦀 crab", "a\u{0}b"] {
        let value = Value::from(s);
        let fingerprint = ctx.encode(&value).unwrap();
        assert_eq!(ctx.decode(&fingerprint).unwrap(), value);
    }
}

#[test]
fn nested_and_empty_containers_round_trip() {
    let ctx: Context = Context::default();
    let values = [
        Value::seq(Vec::<Value>::new()),
        Value::tuple(Vec::<Value>::new()),
        Value::Map(BTreeMap::new()),
        Value::seq([Value::seq([Value::seq([Value::Unit])])]),
        Value::map([("inner", Value::map([("xs", Value::seq([1, 2]))]))]),
    ];
    for value in values {
        let fingerprint = ctx.encode(&value).unwrap();
        assert_eq!(ctx.decode(&fingerprint).unwrap(), value);
    }
}

#[test]
fn empty_sequence_and_empty_tuple_differ() {
    let ctx: Context = Context::default();
    let seq = ctx.encode(&Value::seq(Vec::<Value>::new())).unwrap();
    let tuple = ctx.encode(&Value::tuple(Vec::<Value>::new())).unwrap();
    assert_ne!(seq, tuple);
}
