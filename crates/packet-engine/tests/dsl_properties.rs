//! Property tests: condition DSL algebra and field value round-trips.

use std::sync::Arc;

use proptest::prelude::*;

use netvine_core::error::ShellError;
use netvine_core::shell::CommandRunner;
use netvine_core::storage::{MemoryStore, Storage};
use netvine_core::types::{Field, FieldKind, FieldValue, Rule};
use netvine_packet_engine::{
    evaluate_condition, parse_packet, serialize_with_fixups, ConfigCache, PacketProcessor,
};

struct NoShell;

impl CommandRunner for NoShell {
    fn run(&self, command: &str) -> Result<String, ShellError> {
        Err(ShellError::Failed {
            command: command.to_owned(),
            status: None,
            stderr: "shell disabled in tests".to_owned(),
        })
    }
}

fn tcp_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::new();
    frame.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x02]);
    frame.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
    frame.extend_from_slice(&[0x08, 0x00]);

    let total_len = 20 + 20 + payload.len();
    frame.push(0x45);
    frame.push(0x00);
    frame.extend_from_slice(&(total_len as u16).to_be_bytes());
    frame.extend_from_slice(&[0x00, 0x01, 0x00, 0x00]);
    frame.push(64);
    frame.push(6);
    frame.extend_from_slice(&[0x00, 0x00]);
    frame.extend_from_slice(&[10, 0, 0, 1]);
    frame.extend_from_slice(&[10, 0, 0, 2]);

    frame.extend_from_slice(&1234u16.to_be_bytes());
    frame.extend_from_slice(&80u16.to_be_bytes());
    frame.extend_from_slice(&100u32.to_be_bytes());
    frame.extend_from_slice(&0u32.to_be_bytes());
    frame.push(0x50);
    frame.push(0x10);
    frame.extend_from_slice(&[0x10, 0x00]);
    frame.extend_from_slice(&[0x00, 0x00]);
    frame.extend_from_slice(&[0x00, 0x00]);
    frame.extend_from_slice(payload);

    serialize_with_fixups(&frame)
}

fn dsl_fields() -> Vec<Field> {
    vec![
        Field {
            id: 1,
            name: "etype".to_owned(),
            offset: 12,
            length: 2,
            kind: FieldKind::Hex,
        },
        Field {
            id: 2,
            name: "ttl".to_owned(),
            offset: 22,
            length: 1,
            kind: FieldKind::Decimal,
        },
    ]
}

/// Small expression tree rendered into DSL text.
#[derive(Debug, Clone)]
enum Expr {
    Atom(bool),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Paren(Box<Expr>),
}

impl Expr {
    fn render(&self) -> String {
        match self {
            // atoms chosen to be true/false against the sample frame
            Expr::Atom(true) => r#"etype == "0800""#.to_owned(),
            Expr::Atom(false) => r#"ttl == "1""#.to_owned(),
            Expr::Not(e) => format!("!({})", e.render()),
            Expr::And(a, b) => format!("({}) && ({})", a.render(), b.render()),
            Expr::Or(a, b) => format!("({}) || ({})", a.render(), b.render()),
            Expr::Paren(e) => format!("({})", e.render()),
        }
    }

    fn truth(&self) -> bool {
        match self {
            Expr::Atom(v) => *v,
            Expr::Not(e) => !e.truth(),
            Expr::And(a, b) => a.truth() && b.truth(),
            Expr::Or(a, b) => a.truth() || b.truth(),
            Expr::Paren(e) => e.truth(),
        }
    }
}

fn expr_strategy() -> impl Strategy<Value = Expr> {
    let leaf = any::<bool>().prop_map(Expr::Atom);
    leaf.prop_recursive(4, 32, 2, |inner| {
        prop_oneof![
            inner.clone().prop_map(|e| Expr::Not(Box::new(e))),
            inner.clone().prop_map(|e| Expr::Paren(Box::new(e))),
            (inner.clone(), inner.clone())
                .prop_map(|(a, b)| Expr::And(Box::new(a), Box::new(b))),
            (inner.clone(), inner).prop_map(|(a, b)| Expr::Or(Box::new(a), Box::new(b))),
        ]
    })
}

fn eval_dsl(condition: &str) -> bool {
    let fields = dsl_fields();
    let mut ctx = parse_packet(tcp_frame(b"x")).unwrap();
    netvine_packet_engine::field::extract_all(&mut ctx, &fields);
    evaluate_condition(condition, &ctx, &fields).unwrap()
}

proptest! {
    #[test]
    fn evaluator_agrees_with_model(expr in expr_strategy()) {
        prop_assert_eq!(eval_dsl(&expr.render()), expr.truth());
    }

    #[test]
    fn double_negation_is_identity(expr in expr_strategy()) {
        let rendered = expr.render();
        let doubled = format!("!(!({rendered}))");
        prop_assert_eq!(eval_dsl(&doubled), eval_dsl(&rendered));
    }

    #[test]
    fn parenthesization_is_identity(expr in expr_strategy()) {
        let rendered = expr.render();
        let wrapped = format!("({rendered})");
        prop_assert_eq!(eval_dsl(&wrapped), eval_dsl(&rendered));
    }

    #[test]
    fn or_and_are_idempotent(expr in expr_strategy()) {
        let rendered = expr.render();
        let or_dup = format!("({rendered}) || ({rendered})");
        let and_dup = format!("({rendered}) && ({rendered})");
        prop_assert_eq!(eval_dsl(&or_dup), eval_dsl(&rendered));
        prop_assert_eq!(eval_dsl(&and_dup), eval_dsl(&rendered));
    }
}

/// Runs one value through set -> repackage -> re-extract on a payload field.
fn roundtrip(kind: FieldKind, length: usize, value: FieldValue) -> FieldValue {
    let payload = vec![0u8; length];
    let frame = tcp_frame(&payload);
    let offset = frame.len() - length;

    let store = MemoryStore::new();
    store
        .insert_field(Field {
            id: 0,
            name: "probe".to_owned(),
            offset,
            length,
            kind,
        })
        .unwrap();

    let literal = match &value {
        FieldValue::Int(v) => v.to_string(),
        FieldValue::Text(s) => s.clone(),
        FieldValue::Null => String::new(),
    };
    store
        .insert_rule(Rule {
            id: 0,
            name: "probe-set".to_owned(),
            enabled: true,
            priority: 0,
            match_condition: String::new(),
            actions: format!(r#"[{{"field": "probe", "op": "set", "value": "{literal}"}}]"#),
            output_options: String::new(),
        })
        .unwrap();

    let cache = Arc::new(ConfigCache::new());
    cache.reload(&store).unwrap();
    let processor = PacketProcessor::new(cache, Arc::new(NoShell));

    let out = processor.process(&frame).payload.expect("modified frame");

    let mut ctx = parse_packet(out).unwrap();
    netvine_packet_engine::field::extract_all(&mut ctx, &store.fields().unwrap());
    ctx.fields["probe"].clone()
}

proptest! {
    #[test]
    fn decimal_roundtrip_width_1(v in 0i64..=0xff) {
        prop_assert_eq!(roundtrip(FieldKind::Decimal, 1, FieldValue::Int(v)), FieldValue::Int(v));
    }

    #[test]
    fn decimal_roundtrip_width_2(v in 0i64..=0xffff) {
        prop_assert_eq!(roundtrip(FieldKind::Decimal, 2, FieldValue::Int(v)), FieldValue::Int(v));
    }

    #[test]
    fn decimal_roundtrip_width_4(v in 0i64..=0xffff_ffff) {
        prop_assert_eq!(roundtrip(FieldKind::Decimal, 4, FieldValue::Int(v)), FieldValue::Int(v));
    }

    #[test]
    fn decimal_roundtrip_width_8(v in 0i64..) {
        prop_assert_eq!(roundtrip(FieldKind::Decimal, 8, FieldValue::Int(v)), FieldValue::Int(v));
    }

    #[test]
    fn hex_roundtrip_is_lowercase_identity(bytes in proptest::collection::vec(any::<u8>(), 1..16)) {
        let hex_value = hex::encode(&bytes);
        let out = roundtrip(FieldKind::Hex, bytes.len(), FieldValue::Text(hex_value.clone()));
        prop_assert_eq!(out, FieldValue::Text(hex_value));
    }
}
