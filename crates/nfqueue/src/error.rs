//! 큐 워커 에러 타입

use netvine_core::error::{NetvineError, PipelineError};

/// 큐 바인딩/판정 에러
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// 큐 지정 문자열 파싱 실패
    #[error("invalid queue spec '{spec}': {reason}")]
    InvalidSpec {
        /// 입력 문자열
        spec: String,
        /// 실패 사유
        reason: String,
    },

    /// 큐 열기 실패
    #[error("failed to open nfqueue: {0}")]
    Open(#[source] std::io::Error),

    /// 큐 설정(바인딩, 복사 모드 등) 실패
    #[error("failed to configure queue {queue}: {source}")]
    Configure {
        /// 큐 번호
        queue: u16,
        /// 하위 I/O 에러
        source: std::io::Error,
    },
}

impl From<QueueError> for NetvineError {
    fn from(err: QueueError) -> Self {
        NetvineError::Pipeline(PipelineError::InitFailed(err.to_string()))
    }
}
