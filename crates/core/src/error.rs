//! 에러 타입 -- 도메인별 에러 정의

/// Netvine 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum NetvineError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 스토리지 에러
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// 셸 명령 실행 에러
    #[error("shell error: {0}")]
    Shell(#[from] ShellError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 이미 실행 중
    #[error("pipeline is already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline is not running")]
    NotRunning,

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 패킷 처리 중 에러
    #[error("packet processing failed: {0}")]
    Processing(String),
}

/// 스토리지 에러
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// 레코드를 찾을 수 없음
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// 제약 조건 위반 (중복 이름 등)
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// 조회/갱신 실패
    #[error("query failed: {0}")]
    Query(String),
}

/// 셸 명령 실행 에러
///
/// 종료 코드가 0이 아니거나 stderr 출력이 있으면 실패로 취급합니다.
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    /// 프로세스 생성 실패
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        /// 실행하려던 명령
        command: String,
        /// 하위 I/O 에러
        source: std::io::Error,
    },

    /// 명령 실패 (종료 코드 또는 stderr)
    #[error("command '{command}' failed (status {status:?}): {stderr}")]
    Failed {
        /// 실행한 명령
        command: String,
        /// 종료 코드 (시그널 종료 시 None)
        status: Option<i32>,
        /// stderr 출력
        stderr: String,
    },

    /// 실행 시간 초과
    #[error("command '{command}' timed out after {secs}s")]
    Timeout {
        /// 실행한 명령
        command: String,
        /// 제한 시간 (초)
        secs: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::InvalidValue {
            field: "queue.queues".to_owned(),
            reason: "must not be empty".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("queue.queues"));
        assert!(msg.contains("must not be empty"));
    }

    #[test]
    fn shell_error_display_includes_stderr() {
        let err = ShellError::Failed {
            command: "ip link set eth0 up".to_owned(),
            status: Some(1),
            stderr: "Cannot find device \"eth0\"".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("ip link set eth0 up"));
        assert!(msg.contains("Cannot find device"));
    }

    #[test]
    fn sub_errors_convert_to_netvine_error() {
        let err: NetvineError = PipelineError::AlreadyRunning.into();
        assert!(matches!(err, NetvineError::Pipeline(_)));

        let err: NetvineError = StorageError::Query("locked".to_owned()).into();
        assert!(matches!(err, NetvineError::Storage(_)));
    }

    #[test]
    fn storage_not_found_display() {
        let err = StorageError::NotFound {
            entity: "vlan config",
            key: "vlan_30".to_owned(),
        };
        assert_eq!(err.to_string(), "vlan config not found: vlan_30");
    }
}
