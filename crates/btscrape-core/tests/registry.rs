//! Variable definition grammar tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use btscrape_core::registry::{
    parse_var_defs, probes_metric_name, script_identifier, Cardinality, Semantics, ValueKind,
};
use btscrape_core::BtscrapeError;

#[test]
fn modifier_table() {
    let vars = parse_var_defs("a,b:counter,c:map,d:countermap,e:hist,f:histmap").unwrap();
    assert_eq!(vars.len(), 6);

    let expect = [
        ("a", ValueKind::Number(Semantics::Gauge), Cardinality::Scalar),
        ("b", ValueKind::Number(Semantics::Counter), Cardinality::Scalar),
        ("c", ValueKind::Number(Semantics::Gauge), Cardinality::Keyed),
        ("d", ValueKind::Number(Semantics::Counter), Cardinality::Keyed),
        ("e", ValueKind::Histogram, Cardinality::Scalar),
        ("f", ValueKind::Histogram, Cardinality::Keyed),
    ];
    for (name, value_kind, cardinality) in expect {
        let d = &vars[name];
        assert_eq!(d.name, name);
        assert_eq!(d.value_kind, value_kind, "value kind of {name}");
        assert_eq!(d.cardinality, cardinality, "cardinality of {name}");
    }
}

#[test]
fn unknown_modifier_names_the_token() {
    let err = parse_var_defs("a,b:sketch").expect_err("must fail");
    match err {
        BtscrapeError::Config(msg) => assert!(msg.contains("\"sketch\""), "got: {msg}"),
        other => panic!("expected Config error, got {other:?}"),
    }
}

#[test]
fn duplicate_name_is_a_config_error() {
    let err = parse_var_defs("a:counter,a:map").expect_err("must fail");
    match err {
        BtscrapeError::Config(msg) => assert!(msg.contains("\"a\""), "got: {msg}"),
        other => panic!("expected Config error, got {other:?}"),
    }
}

#[test]
fn empty_entries_are_skipped() {
    let vars = parse_var_defs(",a,,b:counter,").unwrap();
    assert_eq!(vars.len(), 2);
    assert!(vars.contains_key("a"));
    assert!(vars.contains_key("b"));

    assert!(parse_var_defs("").unwrap().is_empty());
}

#[test]
fn parsing_is_idempotent() {
    let defs = "a,b:counter,c:map,d:countermap,e:hist,f:histmap";
    assert_eq!(parse_var_defs(defs).unwrap(), parse_var_defs(defs).unwrap());
}

#[test]
fn exported_name_contract() {
    let vars = parse_var_defs("bytes:counter").unwrap();
    assert_eq!(vars["bytes"].metric_name("biolatency"), "bpftrace_biolatency_bytes");
    assert_eq!(probes_metric_name("biolatency"), "bpftrace_biolatency_probes_total");
}

#[test]
fn help_text_per_shape() {
    let vars = parse_var_defs("a,b:map,c:hist,d:histmap").unwrap();
    assert_eq!(vars["a"].help(), "bpftrace variable @a");
    assert_eq!(vars["b"].help(), "bpftrace map @b");
    assert_eq!(vars["c"].help(), "bpftrace histogram @c");
    assert_eq!(vars["d"].help(), "bpftrace histogram @d");
}

#[test]
fn script_identifier_is_the_first_stem() {
    assert_eq!(script_identifier("/opt/scripts/biolatency.bt"), "biolatency");
    assert_eq!(script_identifier("runqlat.d.txt"), "runqlat");
    assert_eq!(script_identifier("plain"), "plain");
}
