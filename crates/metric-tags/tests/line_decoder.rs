//! Metric line decoder vectors.

use metric_tags::{decode_line, DecodeError, MessageType, MetricValue, NoitField};

const IDENTITY: &str = "push`httptrap`c_933_247631::httptrap`43e5c324-44c2-4877-a625-3b4c8230f2eb";
const HISTOGRAM: &str = "AAUK/wACDP8AARH/AAEa/wABVP8AAQ==";

struct Case {
    name: &'static str,
    input: String,
    output: Option<&'static str>,
    code: i32,
    allocated: bool,
}

fn h_line(name: &str) -> String {
    format!("H1\t1525385460.000\t{IDENTITY}\t{name}\t{HISTOGRAM}")
}

fn cases() -> Vec<Case> {
    vec![
        Case {
            name: "simple",
            input: h_line("SuperSimpleMetricName|ST[a:b,c:d]"),
            output: Some("SuperSimpleMetricName|ST[a:b,c:d]"),
            code: 1,
            allocated: false,
        },
        Case {
            name: "unordered and overly encoded",
            input: h_line("/transmissions`latency|ST[b\"bjo6Og==\":b\"YT1i\",customer:noone,node:j.mta2vrest.cc.aws-usw2a.prd.acme,cluster:mta2]"),
            output: Some("/transmissions`latency|ST[cluster:mta2,customer:noone,b\"bjo6Og==\":a=b,node:j.mta2vrest.cc.aws-usw2a.prd.acme]"),
            code: 1,
            allocated: true,
        },
        Case {
            name: "invalid tag",
            input: h_line("/transmissions`latency|ST[b\"bjo6Og==\":b\"YT1i\",c{ustomer:noone,node:j.mta2vrest.cc.aws-usw2a.prd.acme,cluster:mta2]"),
            output: None,
            code: -7,
            allocated: false,
        },
        Case {
            name: "spacefest",
            input: h_line(" \u{8}SuperSpacey\r\n|ST[a:b,c:d]"),
            output: Some("SuperSpacey|ST[a:b,c:d]"),
            code: 1,
            allocated: true,
        },
        Case {
            name: "source column",
            input: "M\t127.0.0.1\t1526493506.214\tunknown`fault`c_1_77`4766c496-2173-4f60-9607-6449d29cac56\tfoo|ST[color:orange]\ti\t100\n".to_string(),
            output: Some("foo|ST[color:orange]"),
            code: 1,
            allocated: false,
        },
    ]
}

#[test]
fn test_decode_vectors() {
    for case in cases() {
        match decode_line(case.input.as_bytes(), NoitField::Auto) {
            Ok(msg) => {
                assert_eq!(case.code, 1, "{}: decoded but expected {}", case.name, case.code);
                let name = msg.id.name.as_ref().unwrap();
                assert_eq!(Some(name.with_tags()), case.output, "{}", case.name);
                assert_eq!(name.is_allocated(), case.allocated, "{}", case.name);
            }
            Err(err) => {
                assert_eq!(err.code(), case.code, "{}: {err}", case.name);
                assert!(case.output.is_none(), "{}", case.name);
            }
        }
    }
}

#[test]
fn test_histogram_fields() {
    let line = h_line("SuperSimpleMetricName|ST[a:b,c:d]");
    let msg = decode_line(line.as_bytes(), NoitField::Auto).unwrap();
    assert_eq!(msg.kind, MessageType::Histogram);
    assert_eq!(msg.timestamp_ms, 1_525_385_460_000);
    assert_eq!(msg.source, None);
    assert_eq!(msg.id.account_id, Some(933));
    assert_eq!(msg.id.identity, "push`httptrap`c_933_247631::httptrap");
    assert_eq!(msg.value, MetricValue::Histogram(HISTOGRAM.into()));
    let name = msg.id.name.as_ref().unwrap();
    assert_eq!(name.name(), "SuperSimpleMetricName");
    assert_eq!(name.stream().len(), 2);
    assert!(name.measurement().is_empty());
}

#[test]
fn test_source_column_modes() {
    let with_source = "M\t127.0.0.1\t1526493506.214\tunknown`fault`c_1_77`4766c496-2173-4f60-9607-6449d29cac56\tfoo\ti\t100";
    let msg = decode_line(with_source.as_bytes(), NoitField::Present).unwrap();
    assert_eq!(msg.source.as_deref(), Some("127.0.0.1"));
    assert_eq!(msg.timestamp_ms, 1_526_493_506_214);
    assert_eq!(msg.value, MetricValue::Int32(100));

    // the address is read as the timestamp and the fields shift
    let err = decode_line(with_source.as_bytes(), NoitField::Absent).unwrap_err();
    assert_eq!(err, DecodeError::IdentityTooShort(14));
}

#[test]
fn test_missing_fields() {
    let uuid = "4766c496-2173-4f60-9607-6449d29cac56";
    let cases = [
        ("M".to_string(), DecodeError::MissingTimestamp),
        ("M\t1.000".to_string(), DecodeError::MissingIdentity),
        (format!("M\t1.000\tx`{uuid}"), DecodeError::MissingName),
        (format!("M\t1.000\tx`{uuid}\tfoo"), DecodeError::MissingType),
        (format!("M\t1.000\tx`{uuid}\tfoo\ti"), DecodeError::MissingValue),
        (format!("H\t1.000\tx`{uuid}\tfoo"), DecodeError::MissingType),
        ("M\t1.000\tshort\tfoo\ti\t1".to_string(), DecodeError::IdentityTooShort(5)),
        (
            "M\t1.000\tx`zzzzzzzz-2173-4f60-9607-6449d29cac56\tfoo\ti\t1".to_string(),
            DecodeError::InvalidUuid,
        ),
        (format!("Q\t1.000\tx`{uuid}\tfoo"), DecodeError::UnknownRecordType('Q')),
    ];
    for (line, expected) in cases {
        assert_eq!(
            decode_line(line.as_bytes(), NoitField::Absent).unwrap_err(),
            expected,
            "{line:?}"
        );
    }
}

#[test]
fn test_name_too_long() {
    let name = "n".repeat(4097);
    let line = format!("M\t1.000\t{IDENTITY}\t{name}\ti\t1");
    assert_eq!(
        decode_line(line.as_bytes(), NoitField::Auto).unwrap_err(),
        DecodeError::NameTooLong(4097)
    );
}

#[test]
fn test_invalid_utf8() {
    let mut line = h_line("foo").into_bytes();
    line.push(0xff);
    assert_eq!(
        decode_line(&line, NoitField::Auto).unwrap_err(),
        DecodeError::InvalidUtf8
    );
}

#[test]
fn test_check_records_carry_payload() {
    let line = format!("C\t1525385460.000\t{IDENTITY}\tpush\thttptrap\tconfig");
    let msg = decode_line(line.as_bytes(), NoitField::Auto).unwrap();
    assert_eq!(msg.kind, MessageType::Check);
    assert!(msg.kind.is_check_record());
    assert_eq!(msg.payload.as_deref(), Some("push\thttptrap\tconfig"));
    assert_eq!(msg.value, MetricValue::Absent);
    assert!(msg.id.name.is_none());
}
