//! 조건식 평가기 -- 규칙 매칭용 불리언 DSL
//!
//! 문법 (우선순위 낮은 것부터): `||`, `&&`, 단항 `!`, 괄호, 비교.
//! 비교 원자는 `IDENT == "LITERAL"` 또는 `IDENT != "LITERAL"` 형태이며
//! IDENT는 `[A-Za-z0-9_]+`, LITERAL에 큰따옴표는 올 수 없습니다.
//!
//! 식별자는 전체 토큰으로 검증됩니다. 선언되지 않은 필드를 참조하면
//! 평가가 실패합니다. 단락 평가는 필수입니다: `||`는 첫 참에서,
//! `&&`는 첫 거짓에서 멈춥니다.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use netvine_core::types::{Field, FieldValue};

use crate::codec::PacketContext;
use crate::error::EngineError;
use crate::field::compare_value;

// 원자 전체에 앵커를 걸어 식별자가 부분 문자열로 매칭되는 것을 막는다.
static COMPARISON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^([A-Za-z0-9_]+)\s*(==|!=)\s*"([^"]*)"$"#).expect("comparison regex is valid")
});

/// 조건식을 패킷 컨텍스트에 대해 평가합니다.
///
/// 공백 제거 후 빈 식은 항상 참입니다 (규칙이 모든 패킷에 매칭).
pub fn evaluate_condition(
    condition: &str,
    ctx: &PacketContext,
    fields: &[Field],
) -> Result<bool, EngineError> {
    if condition.trim().is_empty() {
        return Ok(true);
    }

    let field_map: HashMap<&str, &Field> =
        fields.iter().map(|f| (f.name.as_str(), f)).collect();

    evaluate_expression(condition, ctx, &field_map)
}

fn evaluate_expression(
    expr: &str,
    ctx: &PacketContext,
    field_map: &HashMap<&str, &Field>,
) -> Result<bool, EngineError> {
    let expr = expr.trim();

    // OR (가장 낮은 우선순위)
    let or_parts = split_by_operator(expr, "||");
    if or_parts.len() > 1 {
        for part in or_parts {
            if evaluate_expression(part, ctx, field_map)? {
                return Ok(true);
            }
        }
        return Ok(false);
    }

    // AND
    let and_parts = split_by_operator(expr, "&&");
    if and_parts.len() > 1 {
        for part in and_parts {
            if !evaluate_expression(part, ctx, field_map)? {
                return Ok(false);
            }
        }
        return Ok(true);
    }

    // NOT
    if let Some(inner) = expr.strip_prefix('!') {
        // `!=`는 비교 연산자의 일부
        if !inner.starts_with('=') {
            return Ok(!evaluate_expression(inner, ctx, field_map)?);
        }
    }

    // 괄호 (어휘적 처리: 식 전체를 감싸는 경우만)
    if expr.starts_with('(') && expr.ends_with(')') && expr.len() >= 2 {
        return evaluate_expression(&expr[1..expr.len() - 1], ctx, field_map);
    }

    evaluate_comparison(expr, ctx, field_map)
}

fn evaluate_comparison(
    expr: &str,
    ctx: &PacketContext,
    field_map: &HashMap<&str, &Field>,
) -> Result<bool, EngineError> {
    let expr = expr.trim();

    let Some(captures) = COMPARISON_RE.captures(expr) else {
        return Err(EngineError::InvalidCondition(expr.to_owned()));
    };

    let name = &captures[1];
    let equality = &captures[2] == "==";
    let expected = &captures[3];

    let Some(field) = field_map.get(name) else {
        return Err(EngineError::UnknownField(name.to_owned()));
    };

    let actual = ctx.fields.get(name).unwrap_or(&FieldValue::Null);
    let matched = compare_value(actual, expected, field.kind);

    Ok(if equality { matched } else { !matched })
}

/// 괄호 깊이를 존중하며 연산자로 식을 분할합니다.
///
/// 괄호 안의 연산자에서는 분할하지 않습니다.
fn split_by_operator<'a>(expr: &'a str, operator: &str) -> Vec<&'a str> {
    let bytes = expr.as_bytes();
    let op = operator.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut i = 0usize;

    while i < bytes.len() {
        match bytes[i] {
            b'(' => {
                depth += 1;
                i += 1;
            }
            b')' => {
                depth = depth.saturating_sub(1);
                i += 1;
            }
            _ if depth == 0
                && i + op.len() <= bytes.len()
                && &bytes[i..i + op.len()] == op =>
            {
                parts.push(&expr[start..i]);
                i += op.len();
                start = i;
            }
            _ => i += 1,
        }
    }

    if start < bytes.len() {
        parts.push(&expr[start..]);
    }

    if parts.is_empty() {
        return vec![expr];
    }
    parts
}
