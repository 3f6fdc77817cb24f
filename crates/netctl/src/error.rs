//! 네트워크 제어 에러 타입

use netvine_core::error::{ConfigError, NetvineError, ShellError, StorageError};

/// 네트워크 제어 도메인 에러
///
/// 제어 경로의 에러는 호출자에게 반환됩니다. 부트스트랩은 재조정 실패를
/// 로그로 남기고 계속 진행합니다.
#[derive(Debug, thiserror::Error)]
pub enum NetctlError {
    /// 호스트 명령 실패
    #[error("shell error: {0}")]
    Shell(#[from] ShellError),

    /// 스토리지 에러
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// trunk VLAN 범위 형식 오류
    #[error("invalid trunk VLAN ID format: {0}")]
    InvalidVlanRange(String),

    /// 서브넷 마스크 형식 오류
    #[error("invalid subnet mask: {0}")]
    InvalidMask(String),

    /// 대상 인터페이스 없음
    #[error("VLAN interface {0} does not exist")]
    MissingInterface(String),
}

impl From<NetctlError> for NetvineError {
    fn from(err: NetctlError) -> Self {
        match err {
            NetctlError::Shell(e) => NetvineError::Shell(e),
            NetctlError::Storage(e) => NetvineError::Storage(e),
            other => NetvineError::Config(ConfigError::InvalidValue {
                field: "network".to_owned(),
                reason: other.to_string(),
            }),
        }
    }
}
