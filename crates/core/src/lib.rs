#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod pipeline;
pub mod shell;
pub mod storage;
pub mod types;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 에러
pub use error::{ConfigError, NetvineError, PipelineError, ShellError, StorageError};

// 설정
pub use config::NetvineConfig;

// 파이프라인 trait
pub use pipeline::{HealthStatus, Pipeline};

// 셸 실행기
pub use shell::{CommandRunner, ShellRunner};

// 스토리지
pub use storage::{MemoryStore, Storage};

// 도메인 타입
pub use types::{
    Field, FieldKind, FieldValue, InterfaceConfig, LinkType, NftAction, NftProtocol, NftRule,
    ProcessLog, ProcessResult, Rule, VlanConfig, VlanConfigIp, VlanKind,
};
