//! 파이프라인 trait -- 모듈 생명주기 정의
//!
//! [`Pipeline`] trait은 데몬이 관리하는 모듈의 생명주기 인터페이스입니다.
//! 큐 워커가 이를 구현하며, 데몬은 start/stop/health_check만 호출합니다.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::NetvineError;

/// 데몬이 관리하는 모듈의 생명주기 trait
///
/// 이미 실행 중인 모듈의 `start`는 `PipelineError::AlreadyRunning`을,
/// 실행 중이 아닌 모듈의 `stop`은 `PipelineError::NotRunning`을 반환합니다.
pub trait Pipeline: Send + Sync {
    /// 모듈을 시작합니다.
    ///
    /// 리소스 초기화와 워커 스폰을 수행합니다.
    fn start(&mut self) -> impl std::future::Future<Output = Result<(), NetvineError>> + Send;

    /// 모듈을 정지합니다.
    ///
    /// 진행 중인 작업을 완료하고 리소스를 정리합니다.
    fn stop(&mut self) -> impl std::future::Future<Output = Result<(), NetvineError>> + Send;

    /// 모듈의 현재 상태를 확인합니다.
    fn health_check(&self) -> impl std::future::Future<Output = HealthStatus> + Send;
}

/// 모듈 헬스 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// 정상 동작 중
    Healthy,
    /// 성능 저하 또는 부분적 장애 (서비스는 계속 동작)
    Degraded(String),
    /// 비정상 -- 서비스 불가 상태
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 비정상 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}
