//! 큐 워커 설정
//!
//! core의 [`QueueSettings`](netvine_core::config::QueueSettings)에서
//! 파생되며 큐 바인딩 파라미터를 포함합니다.

use std::fmt;

use serde::{Deserialize, Serialize};

use netvine_core::config::QueueSettings;

use crate::error::QueueError;

/// 분류기 패밀리
///
/// bridge 분류기가 의도된 트래픽 소스입니다. netlink 기반 바인딩은
/// 패밀리와 무관하게 이벤트를 받으므로 이 값은 설정 의도를 기록하고
/// 기동 로그에 남기는 용도입니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueFamily {
    /// L3 (AF_INET) 분류기
    Inet,
    /// L2 브리지 분류기
    #[default]
    Bridge,
}

impl QueueFamily {
    /// 문자열에서 패밀리를 파싱합니다. 알 수 없는 값은 `Bridge`입니다.
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "inet" => Self::Inet,
            _ => Self::Bridge,
        }
    }
}

impl fmt::Display for QueueFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inet => write!(f, "inet"),
            Self::Bridge => write!(f, "bridge"),
        }
    }
}

/// 큐 워커 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// 수신할 큐 번호 지정 (예: "0", "0-3", "0,1,2")
    pub queues: String,
    /// 분류기 패밀리
    pub family: QueueFamily,
    /// 패킷 복사 최대 길이
    pub max_packet_len: u16,
    /// 커널 큐 최대 적체 수
    pub max_queue_len: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            queues: "0".to_owned(),
            family: QueueFamily::Bridge,
            max_packet_len: 0xffff,
            max_queue_len: 0xff,
        }
    }
}

impl QueueConfig {
    /// core 설정에서 큐 워커 설정을 만듭니다.
    pub fn from_core(core: &QueueSettings) -> Self {
        Self {
            queues: core.queues.clone(),
            family: QueueFamily::from_str_loose(&core.family),
            ..Self::default()
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), QueueError> {
        parse_queue_spec(&self.queues)?;
        Ok(())
    }
}

/// 큐 지정 문자열을 큐 번호 목록으로 파싱합니다.
///
/// 콤마 구분 항목은 숫자이거나 `A-B` 폐구간 범위입니다.
/// 빈 결과는 에러입니다.
pub fn parse_queue_spec(spec: &str) -> Result<Vec<u16>, QueueError> {
    let mut queues = Vec::new();

    for part in spec.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if let Some((start, end)) = part.split_once('-') {
            let start: u16 = start.trim().parse().map_err(|_| QueueError::InvalidSpec {
                spec: spec.to_owned(),
                reason: format!("invalid start of range: {start}"),
            })?;
            let end: u16 = end.trim().parse().map_err(|_| QueueError::InvalidSpec {
                spec: spec.to_owned(),
                reason: format!("invalid end of range: {end}"),
            })?;
            if start > end {
                return Err(QueueError::InvalidSpec {
                    spec: spec.to_owned(),
                    reason: format!("invalid range: start {start} > end {end}"),
                });
            }
            queues.extend(start..=end);
        } else {
            let queue: u16 = part.parse().map_err(|_| QueueError::InvalidSpec {
                spec: spec.to_owned(),
                reason: format!("invalid queue number: {part}"),
            })?;
            queues.push(queue);
        }
    }

    if queues.is_empty() {
        return Err(QueueError::InvalidSpec {
            spec: spec.to_owned(),
            reason: "no valid queues specified".to_owned(),
        });
    }

    Ok(queues)
}
