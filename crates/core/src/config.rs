//! 설정 관리 -- netvine.toml 파싱 및 검증

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Netvine 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetvineConfig {
    /// 일반 설정
    pub general: GeneralConfig,
    /// 큐 워커 설정
    pub queue: QueueSettings,
    /// 네트워크 제어 설정
    pub network: NetworkSettings,
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 시드 파일 경로 (필드/규칙/분류기 규칙/인터페이스 설정, 빈 값 = 없음)
    pub seed_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            seed_file: String::new(),
        }
    }
}

/// 큐 워커 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// 활성화 여부
    pub enabled: bool,
    /// 수신할 큐 번호 (예: "0", "0-3", "0,1,2")
    pub queues: String,
    /// 분류기 패밀리 (inet, bridge)
    pub family: String,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            queues: "0".to_owned(),
            family: "bridge".to_owned(),
        }
    }
}

/// 네트워크 제어 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// 기동 시 브리지/VLAN/분류기 재조정 수행 여부
    pub reconcile_on_start: bool,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            reconcile_on_start: true,
        }
    }
}

impl NetvineConfig {
    /// TOML 파일에서 설정을 읽습니다.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                ConfigError::ParseFailed {
                    reason: e.to_string(),
                }
            }
        })?;
        toml::from_str(&raw).map_err(|e| ConfigError::ParseFailed {
            reason: e.to_string(),
        })
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
        if !LOG_LEVELS.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("'{}' is not one of {:?}", self.general.log_level, LOG_LEVELS),
            });
        }

        if self.general.log_format != "json" && self.general.log_format != "pretty" {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!(
                    "'{}' is not 'json' or 'pretty'",
                    self.general.log_format
                ),
            });
        }

        if self.queue.enabled && self.queue.queues.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "queue.queues".to_owned(),
                reason: "must not be empty when the queue worker is enabled".to_owned(),
            });
        }

        if self.queue.family != "inet" && self.queue.family != "bridge" {
            return Err(ConfigError::InvalidValue {
                field: "queue.family".to_owned(),
                reason: format!("'{}' is not 'inet' or 'bridge'", self.queue.family),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        NetvineConfig::default().validate().unwrap();
    }

    #[test]
    fn load_parses_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[general]
log_level = "debug"
log_format = "pretty"

[queue]
queues = "0-3"
family = "inet"
"#
        )
        .unwrap();

        let config = NetvineConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.queue.queues, "0-3");
        assert_eq!(config.queue.family, "inet");
        // 생략된 섹션은 기본값
        assert!(config.network.reconcile_on_start);
        config.validate().unwrap();
    }

    #[test]
    fn load_missing_file_fails() {
        let err = NetvineConfig::load(Path::new("/nonexistent/netvine.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn validate_rejects_bad_log_format() {
        let config = NetvineConfig {
            general: GeneralConfig {
                log_format: "xml".to_owned(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_queues_when_enabled() {
        let config = NetvineConfig {
            queue: QueueSettings {
                enabled: true,
                queues: "  ".to_owned(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_family() {
        let config = NetvineConfig {
            queue: QueueSettings {
                family: "af_packet".to_owned(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_queues_allowed_when_disabled() {
        let config = NetvineConfig {
            queue: QueueSettings {
                enabled: false,
                queues: String::new(),
                ..Default::default()
            },
            ..Default::default()
        };
        config.validate().unwrap();
    }
}
