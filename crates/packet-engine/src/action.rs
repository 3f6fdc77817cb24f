//! 액션 실행기 -- 매칭된 규칙의 변형 액션을 필드 환경에 적용
//!
//! 액션 목록은 JSON 배열로 직렬화되어 있습니다. 순서대로 적용하며
//! 첫 실패에서 규칙 전체가 중단됩니다 (핸들러는 에러 로그 후
//! 패킷을 원본 그대로 통과시킵니다).

use serde::{Deserialize, Serialize};

use netvine_core::shell::CommandRunner;
use netvine_core::types::FieldValue;

use crate::codec::PacketContext;
use crate::error::EngineError;

/// 변형 액션 하나
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// 대상 필드 이름
    pub field: String,
    /// 연산
    pub op: ActionOp,
    /// 피연산자 또는 셸 명령
    pub value: String,
}

/// 액션 연산 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionOp {
    /// 리터럴 대입
    Set,
    /// 덧셈
    Add,
    /// 뺄셈
    Sub,
    /// 곱셈
    Mul,
    /// 나눗셈 (0으로 나누면 에러)
    Div,
    /// 셸 명령 실행, 정리된 stdout을 새 값으로 사용
    Shell,
}

/// 직렬화된 액션 목록을 디코딩합니다.
///
/// 빈 문자열은 빈 목록입니다. JSON 배열 형식이 아니면 실패합니다
/// (레거시 `+` 구분 템플릿 형태는 여기서 거부됩니다).
pub fn decode_actions(actions_json: &str) -> Result<Vec<Action>, EngineError> {
    if actions_json.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(actions_json).map_err(|e| EngineError::ActionDecode(e.to_string()))
}

/// 규칙의 액션 목록을 순서대로 실행합니다.
pub fn run_actions(
    actions_json: &str,
    ctx: &mut PacketContext,
    runner: &dyn CommandRunner,
) -> Result<(), EngineError> {
    let actions = decode_actions(actions_json)?;

    for action in &actions {
        run_action(action, ctx, runner)?;
    }

    Ok(())
}

fn run_action(
    action: &Action,
    ctx: &mut PacketContext,
    runner: &dyn CommandRunner,
) -> Result<(), EngineError> {
    let new_value = match action.op {
        ActionOp::Set => FieldValue::Text(action.value.clone()),

        ActionOp::Add | ActionOp::Sub | ActionOp::Mul | ActionOp::Div => {
            let current = ctx.fields.get(&action.field).unwrap_or(&FieldValue::Null);
            FieldValue::Int(arithmetic(current, &action.value, action.op)?)
        }

        ActionOp::Shell => {
            let output = runner.run(&action.value)?;
            FieldValue::Text(output.trim().to_owned())
        }
    };

    ctx.fields.insert(action.field.clone(), new_value);
    Ok(())
}

/// 현재 값을 i64로 강제 변환해 산술 연산을 수행합니다.
///
/// 정수, 정수 문자열만 허용됩니다.
fn arithmetic(current: &FieldValue, operand: &str, op: ActionOp) -> Result<i64, EngineError> {
    let current = match current {
        FieldValue::Int(v) => *v,
        FieldValue::Text(s) => s
            .parse::<i64>()
            .map_err(|_| EngineError::TypeCoercion(s.clone()))?,
        FieldValue::Null => {
            return Err(EngineError::TypeCoercion("<not available>".to_owned()));
        }
    };

    let operand: i64 = operand
        .parse()
        .map_err(|_| EngineError::TypeCoercion(operand.to_owned()))?;

    Ok(match op {
        ActionOp::Add => current.wrapping_add(operand),
        ActionOp::Sub => current.wrapping_sub(operand),
        ActionOp::Mul => current.wrapping_mul(operand),
        ActionOp::Div => {
            if operand == 0 {
                return Err(EngineError::DivisionByZero);
            }
            current / operand
        }
        // set/shell은 이 경로로 오지 않음
        _ => current,
    })
}
