#![doc = include_str!("../README.md")]

pub mod action;
pub mod cache;
pub mod checksum;
pub mod codec;
pub mod condition;
pub mod error;
pub mod field;
pub mod process;
pub mod repackage;

// --- 주요 타입 re-export ---

// 에러
pub use error::EngineError;

// 코덱
pub use codec::{hex_dump, parse_packet, PacketContext};

// 체크섬
pub use checksum::serialize_with_fixups;

// 조건/액션
pub use action::{Action, ActionOp};
pub use condition::evaluate_condition;

// 캐시와 프로세서
pub use cache::ConfigCache;
pub use process::{PacketDecision, PacketProcessor};
