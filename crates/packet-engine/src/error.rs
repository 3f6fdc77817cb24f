//! 패킷 엔진 에러 타입
//!
//! [`EngineError`]는 패킷 경로에서 발생하는 모든 에러를 표현합니다.
//! 규칙 매칭 이후의 에러는 로그에 기록되고 패킷은 원본 그대로 통과합니다.
//! 패킷이 내부 실패로 폐기되는 일은 없습니다.

use netvine_core::error::{NetvineError, PipelineError, ShellError};

/// 패킷 엔진 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// 빈 입력
    #[error("empty packet")]
    EmptyPacket,

    /// 프레임 파싱 실패
    #[error("failed to parse packet: {0}")]
    Parse(String),

    /// 조건식이 선언되지 않은 필드를 참조
    #[error("field not found: {0}")]
    UnknownField(String),

    /// 문법에 맞지 않는 비교식
    #[error("invalid comparison expression: {0}")]
    InvalidCondition(String),

    /// 산술 연산 대상이 정수로 강제 변환 불가
    #[error("cannot convert value to number: {0}")]
    TypeCoercion(String),

    /// 0으로 나누기
    #[error("division by zero")]
    DivisionByZero,

    /// 필드 값의 바이트 인코딩 실패
    #[error("failed to encode field '{field}': {reason}")]
    Encode {
        /// 대상 필드 이름
        field: String,
        /// 실패 사유
        reason: String,
    },

    /// 액션 목록 디코딩 실패 (JSON 배열 형식만 허용)
    #[error("failed to parse actions: {0}")]
    ActionDecode(String),

    /// 필드 오프셋/길이가 프레임 범위를 벗어남
    #[error("invalid offset/length for field {0}")]
    InvalidRange(String),

    /// 내장 필드에 해당하는 레이어가 없음
    #[error("builtin field {0} not available")]
    BuiltinUnavailable(String),

    /// 셸 액션 실패
    #[error("shell command failed: {0}")]
    Shell(#[from] ShellError),
}

impl From<EngineError> for NetvineError {
    fn from(err: EngineError) -> Self {
        NetvineError::Pipeline(PipelineError::Processing(err.to_string()))
    }
}
