//! Output-record vector tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::fs;

use btscrape_core::record::{decode_line, strip_sigil, OutputRecord};

fn load(name: &str) -> String {
    fs::read_to_string(format!("tests/vectors/{name}")).unwrap()
}

#[test]
fn decode_attached_probes() {
    let rec = decode_line(&load("attached.json")).unwrap();
    match rec {
        OutputRecord::AttachedProbes { probes } => assert_eq!(probes, 2),
        other => panic!("expected AttachedProbes, got {other:?}"),
    }
}

#[test]
fn decode_printf() {
    let rec = decode_line(&load("printf.json")).unwrap();
    match rec {
        OutputRecord::Printf(data) => assert!(data.get().contains("/etc/hosts")),
        other => panic!("expected Printf, got {other:?}"),
    }
}

#[test]
fn decode_map_dump() {
    let rec = decode_line(&load("map.json")).unwrap();
    match rec {
        OutputRecord::MapDump(data) => {
            assert_eq!(data.len(), 2);
            assert_eq!(data["@bytes"].get(), "1234");
            assert!(data["@reads"].get().contains("\"sda\""));
        }
        other => panic!("expected MapDump, got {other:?}"),
    }
}

#[test]
fn decode_hist_dump() {
    let rec = decode_line(&load("hist.json")).unwrap();
    match rec {
        OutputRecord::HistDump(data) => {
            assert!(data.contains_key("@usecs"));
        }
        other => panic!("expected HistDump, got {other:?}"),
    }
}

#[test]
fn unknown_kind_is_not_an_error() {
    let rec = decode_line(&load("unknown.json")).unwrap();
    match rec {
        OutputRecord::Unknown { kind } => assert_eq!(kind, "lost_events"),
        other => panic!("expected Unknown, got {other:?}"),
    }
}

#[test]
fn malformed_line_is_a_decode_error() {
    assert!(decode_line("this is not json").is_err());
    assert!(decode_line("{\"no_type_field\": 1}").is_err());
}

#[test]
fn sigil_stripping() {
    assert_eq!(strip_sigil("@bytes"), Some("bytes"));
    assert_eq!(strip_sigil("bytes"), None);
    assert_eq!(strip_sigil("@"), Some(""));
}
