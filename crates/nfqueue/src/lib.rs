#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod worker;

// --- 주요 타입 re-export ---

pub use config::{parse_queue_spec, QueueConfig, QueueFamily};
pub use error::QueueError;
pub use worker::{QueueWorker, QueueWorkerBuilder};
