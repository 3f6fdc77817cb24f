//! 필드 추출 -- 필드 정의를 패킷 컨텍스트에 적용
//!
//! 내장 필드는 파싱된 레이어에서, 위치 기반 필드는 원시 바이트에서
//! 값을 얻습니다. 일괄 추출은 개별 실패를 `Null`로 기록하고 계속합니다.

use netvine_core::types::{Field, FieldKind, FieldValue};

use crate::codec::PacketContext;
use crate::error::EngineError;

/// 필드 하나를 추출합니다.
pub fn extract_field(ctx: &PacketContext, field: &Field) -> Result<FieldValue, EngineError> {
    if field.kind == FieldKind::Builtin {
        return extract_builtin(ctx, &field.name);
    }

    let raw = ctx.raw();
    let end = field.offset.checked_add(field.length);
    let Some(end) = end.filter(|&e| e <= raw.len()) else {
        return Err(EngineError::InvalidRange(field.name.clone()));
    };
    let data = &raw[field.offset..end];

    Ok(match field.kind {
        FieldKind::Decimal => FieldValue::Int(bytes_to_decimal(data)),
        FieldKind::Text => {
            FieldValue::Text(String::from_utf8_lossy(data).trim_end_matches('\0').to_owned())
        }
        // hex 및 그 외
        _ => FieldValue::Text(hex::encode(data)),
    })
}

/// 내장 5-tuple 필드를 추출합니다.
fn extract_builtin(ctx: &PacketContext, name: &str) -> Result<FieldValue, EngineError> {
    match name.to_lowercase().as_str() {
        "src_ip" => {
            if let Some(ipv4) = &ctx.ipv4 {
                return Ok(FieldValue::Text(ipv4.source.to_string()));
            }
        }
        "dst_ip" => {
            if let Some(ipv4) = &ctx.ipv4 {
                return Ok(FieldValue::Text(ipv4.destination.to_string()));
            }
        }
        "src_port" => {
            if let Some(t) = &ctx.transport {
                return Ok(FieldValue::Int(i64::from(t.src_port())));
            }
        }
        "dst_port" => {
            if let Some(t) = &ctx.transport {
                return Ok(FieldValue::Int(i64::from(t.dst_port())));
            }
        }
        "protocol" => {
            if let Some(ipv4) = &ctx.ipv4 {
                return Ok(FieldValue::Int(i64::from(ipv4.protocol)));
            }
        }
        _ => {}
    }
    Err(EngineError::BuiltinUnavailable(name.to_owned()))
}

/// 정의된 모든 필드를 컨텍스트의 필드 환경으로 추출합니다.
///
/// 개별 추출 실패는 파이프라인을 중단하지 않고 `Null`로 기록됩니다.
pub fn extract_all(ctx: &mut PacketContext, fields: &[Field]) {
    for field in fields {
        let value = match extract_field(ctx, field) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(field = field.name.as_str(), error = %e, "field extraction failed");
                FieldValue::Null
            }
        };
        ctx.fields.insert(field.name.clone(), value);
    }
}

/// 빅엔디안 바이트를 i64로 해석합니다.
///
/// 표준 폭(1/2/4/8)이 아니면 시프트 누적으로 해석합니다.
pub fn bytes_to_decimal(data: &[u8]) -> i64 {
    match data.len() {
        1 => i64::from(data[0]),
        2 => i64::from(u16::from_be_bytes([data[0], data[1]])),
        4 => i64::from(u32::from_be_bytes([data[0], data[1], data[2], data[3]])),
        8 => i64::from_be_bytes([
            data[0], data[1], data[2], data[3], data[4], data[5], data[6], data[7],
        ]),
        _ => {
            let mut result: i64 = 0;
            for &b in data {
                result = result.wrapping_shl(8) | i64::from(b);
            }
            result
        }
    }
}

/// 추출된 값을 기대 리터럴과 비교합니다.
///
/// `Null`은 어떤 값과도 같지 않습니다.
pub fn compare_value(actual: &FieldValue, expected: &str, kind: FieldKind) -> bool {
    if actual.is_null() {
        return false;
    }

    match kind {
        FieldKind::Hex => {
            let Some(actual) = actual.as_text() else {
                return false;
            };
            let actual = actual.to_lowercase().replace(' ', "");
            let expected = expected.to_lowercase().replace(' ', "");
            actual == expected
        }
        FieldKind::Decimal => {
            let Some(actual) = actual.as_int() else {
                return false;
            };
            match expected.parse::<i64>() {
                Ok(expected) => actual == expected,
                Err(_) => false,
            }
        }
        FieldKind::Text => {
            let Some(actual) = actual.as_text() else {
                return false;
            };
            actual == expected.trim_matches('"')
        }
        _ => actual.to_string() == expected,
    }
}

/// 표시용 필드 값 형식화
pub fn format_value(value: &FieldValue, kind: FieldKind) -> String {
    if value.is_null() {
        return "<not available>".to_owned();
    }
    match (kind, value) {
        (FieldKind::Text, FieldValue::Text(s)) => format!("{s:?}"),
        _ => value.to_string(),
    }
}
