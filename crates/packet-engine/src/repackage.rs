//! 재조립 -- 세그먼트 기반 프레임 재구성
//!
//! 선언된 위치 기반 필드로 `[0, len)`을 정확히 분할하는 세그먼트 목록을
//! 만들고, 보존 세그먼트는 원본에서 복사, 사용자 세그먼트는 (변형됐을 수
//! 있는) 필드 환경 값을 필드 유형에 따라 인코딩해 이어 붙입니다.
//! 값 인코딩에 실패한 세그먼트는 원본 바이트로 대체됩니다.
//!
//! 마지막으로 출력 옵션을 적용합니다. 인식되는 옵션은 `compute_checksum`
//! 하나이며 나머지는 무시됩니다.

use netvine_core::types::{Field, FieldKind, FieldValue};

use crate::checksum::serialize_with_fixups;
use crate::codec::PacketContext;
use crate::error::EngineError;

/// 프레임 한 구간
#[derive(Debug, Clone)]
struct Segment {
    offset: usize,
    length: usize,
    /// None이면 보존 세그먼트 (원본 복사)
    field: Option<Field>,
}

/// 필드 환경을 반영해 프레임을 재조립하고 출력 옵션을 적용합니다.
///
/// 위치 기반 필드가 하나도 없으면 원본 프레임을 그대로 반환합니다.
pub fn repackage(
    output_options: &str,
    ctx: &PacketContext,
    fields: &[Field],
) -> Result<Vec<u8>, EngineError> {
    let raw = ctx.raw();

    let segments = build_segments(raw.len(), fields);
    if segments.iter().all(|s| s.field.is_none()) {
        return apply_output_options(raw.to_vec(), output_options);
    }

    let mut output = Vec::with_capacity(raw.len());
    for segment in &segments {
        match &segment.field {
            Some(field) => {
                let value = ctx.fields.get(&field.name).unwrap_or(&FieldValue::Null);
                match value_to_bytes(value, field) {
                    Ok(bytes) => output.extend_from_slice(&bytes),
                    Err(e) => {
                        // 인코딩 실패 세그먼트는 원본 바이트로 대체
                        tracing::debug!(
                            field = field.name.as_str(),
                            error = %e,
                            "value encoding failed, preserving original bytes"
                        );
                        output.extend_from_slice(
                            &raw[segment.offset..segment.offset + segment.length],
                        );
                    }
                }
            }
            None => {
                output.extend_from_slice(&raw[segment.offset..segment.offset + segment.length]);
            }
        }
    }

    apply_output_options(output, output_options)
}

/// 정렬된 사용자 필드 사이의 틈을 보존 세그먼트로 채워
/// `[0, frame_len)`을 분할합니다.
///
/// 내장 필드와 프레임 범위를 벗어나는 필드는 계획에서 제외됩니다.
fn build_segments(frame_len: usize, fields: &[Field]) -> Vec<Segment> {
    let mut user_fields: Vec<&Field> = fields
        .iter()
        .filter(|f| f.kind != FieldKind::Builtin)
        .filter(|f| f.length > 0 && f.offset + f.length <= frame_len)
        .collect();
    user_fields.sort_by_key(|f| f.offset);

    let mut segments = Vec::new();
    let mut current = 0usize;

    for field in user_fields {
        if current < field.offset {
            segments.push(Segment {
                offset: current,
                length: field.offset - current,
                field: None,
            });
        }
        segments.push(Segment {
            offset: field.offset,
            length: field.length,
            field: Some(field.clone()),
        });
        current = field.offset + field.length;
    }

    if current < frame_len {
        segments.push(Segment {
            offset: current,
            length: frame_len - current,
            field: None,
        });
    }

    segments
}

/// 필드 값을 필드 유형에 따라 정확히 `field.length` 바이트로 인코딩합니다.
fn value_to_bytes(value: &FieldValue, field: &Field) -> Result<Vec<u8>, EngineError> {
    if value.is_null() {
        return Ok(vec![0u8; field.length]);
    }

    match field.kind {
        FieldKind::Decimal => {
            let v = match value {
                FieldValue::Int(v) => *v,
                FieldValue::Text(s) => s.trim().parse::<i64>().map_err(|_| EngineError::Encode {
                    field: field.name.clone(),
                    reason: format!("'{s}' is not an integer"),
                })?,
                FieldValue::Null => unreachable!(),
            };
            Ok(int_to_bytes(v, field.length))
        }
        FieldKind::Text => {
            let s = value.to_string();
            Ok(pad_or_truncate(s.into_bytes(), field.length))
        }
        // hex 및 그 외
        _ => {
            let Some(s) = value.as_text() else {
                return Err(EngineError::Encode {
                    field: field.name.clone(),
                    reason: "expected string for hex field".to_owned(),
                });
            };
            let bytes = hex::decode(s).map_err(|e| EngineError::Encode {
                field: field.name.clone(),
                reason: e.to_string(),
            })?;
            Ok(pad_or_truncate(bytes, field.length))
        }
    }
}

/// 길이에 맞게 0으로 패딩하거나 잘라냅니다.
fn pad_or_truncate(mut data: Vec<u8>, length: usize) -> Vec<u8> {
    data.resize(length, 0);
    data
}

/// i64를 빅엔디안으로 정확히 `length` 바이트에 직렬화합니다
/// (하위 바이트가 오른쪽부터 채워짐).
fn int_to_bytes(mut value: i64, length: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; length];
    for slot in bytes.iter_mut().rev() {
        *slot = (value & 0xff) as u8;
        value >>= 8;
    }
    bytes
}

/// 출력 옵션을 적용합니다.
///
/// 옵션은 JSON 문자열 배열입니다. 유효하지 않은 JSON은 옵션 없음으로
/// 취급합니다. 인식되지 않는 옵션은 무시합니다.
fn apply_output_options(packet: Vec<u8>, options_json: &str) -> Result<Vec<u8>, EngineError> {
    if options_json.trim().is_empty() {
        return Ok(packet);
    }

    let Ok(options) = serde_json::from_str::<Vec<String>>(options_json) else {
        return Ok(packet);
    };

    let mut result = packet;
    for option in &options {
        match option.as_str() {
            "compute_checksum" => {
                result = serialize_with_fixups(&result);
            }
            other => {
                tracing::debug!(option = other, "ignoring unknown output option");
            }
        }
    }

    Ok(result)
}
