//! 패킷 프로세서 -- 패킷 하나의 전체 처리 흐름
//!
//! parse -> extract -> match -> actions -> repackage를 한 곳에 구현합니다.
//! 큐 워커와 테스트가 같은 경로를 공유합니다.
//!
//! 에러 정책: 규칙 매칭 이후의 실패는 `result="error"` 로그로 남기고
//! 패킷을 원본 그대로 통과시킵니다. 매칭 전 실패(파싱, 추출)는 debug
//! 로그만 남깁니다. 내부 실패로 패킷이 폐기되는 일은 없습니다.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;

use netvine_core::shell::CommandRunner;
use netvine_core::types::{FieldValue, ProcessLog, ProcessResult, Rule};

use crate::action::run_actions;
use crate::cache::ConfigCache;
use crate::codec::{parse_packet, PacketContext};
use crate::condition::evaluate_condition;
use crate::field::extract_all;
use crate::repackage::repackage;

/// 패킷 하나에 대한 처리 결과
///
/// `payload`가 `Some`이면 변형된 바이트로 accept 판정을,
/// `None`이면 원본 그대로 accept 판정을 내립니다.
/// `log`는 규칙이 매칭된 경우에만 만들어집니다.
#[derive(Debug)]
pub struct PacketDecision {
    /// 변형된 프레임 (성공적으로 재조립된 경우)
    pub payload: Option<Vec<u8>>,
    /// 처리 로그 (규칙 매칭 시)
    pub log: Option<ProcessLog>,
}

impl PacketDecision {
    fn pass() -> Self {
        Self {
            payload: None,
            log: None,
        }
    }
}

/// 패킷 프로세서
///
/// 설정 캐시와 셸 실행기를 소유하며, 호출마다 캐시 스냅샷을 떠서
/// 패킷 하나를 처리합니다. 핸들러는 재진입 가능합니다.
pub struct PacketProcessor {
    cache: Arc<ConfigCache>,
    runner: Arc<dyn CommandRunner>,
}

impl PacketProcessor {
    /// 새 프로세서를 생성합니다.
    pub fn new(cache: Arc<ConfigCache>, runner: Arc<dyn CommandRunner>) -> Self {
        Self { cache, runner }
    }

    /// 설정 캐시 참조를 반환합니다.
    pub fn cache(&self) -> &Arc<ConfigCache> {
        &self.cache
    }

    /// 원시 프레임 하나를 처리합니다.
    pub fn process(&self, raw: &[u8]) -> PacketDecision {
        // 1. 파싱 (실패 시 원본 통과)
        let mut ctx = match parse_packet(raw.to_vec()) {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::debug!(error = %e, len = raw.len(), "failed to parse packet");
                return PacketDecision::pass();
            }
        };

        tracing::debug!(five_tuple = ctx.five_tuple().as_str(), "packet received");

        // 2. 캐시 스냅샷
        let (fields, rules) = self.cache.snapshot();

        // 3. 필드 추출 (개별 실패는 Null)
        extract_all(&mut ctx, &fields);

        // 4. 규칙 매칭 (첫 매칭에서 멈춤)
        let mut matched: Option<&Rule> = None;
        for rule in rules.iter() {
            match evaluate_condition(&rule.match_condition, &ctx, &fields) {
                Ok(true) => {
                    matched = Some(rule);
                    break;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(
                        rule = rule.name.as_str(),
                        error = %e,
                        "failed to evaluate condition"
                    );
                }
            }
        }

        let Some(rule) = matched else {
            // 매칭 없음: 로그 없이 원본 통과
            return PacketDecision::pass();
        };

        // 5. 로그 골격 + 변형 전 필드 스냅샷
        let mut log = self.log_skeleton(rule, &ctx, raw);
        let original_fields = ctx.fields.clone();

        // 6. 액션 실행
        if let Err(e) = run_actions(&rule.actions, &mut ctx, self.runner.as_ref()) {
            tracing::error!(rule = rule.name.as_str(), error = %e, "failed to execute actions");
            log.result = ProcessResult::Error;
            log.error_message = e.to_string();
            return PacketDecision {
                payload: None,
                log: Some(log),
            };
        }

        // 7. 재조립
        let modified = match repackage(&rule.output_options, &ctx, &fields) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(rule = rule.name.as_str(), error = %e, "failed to repackage packet");
                log.result = ProcessResult::Error;
                log.error_message = e.to_string();
                return PacketDecision {
                    payload: None,
                    log: Some(log),
                };
            }
        };

        // 8. 성공 로그: 필드 before/after 맵과 변형 패킷
        log.field_values = field_comparison_json(&original_fields, &ctx.fields);
        log.modified_packet = hex::encode(&modified);
        log.result = ProcessResult::Success;

        PacketDecision {
            payload: Some(modified),
            log: Some(log),
        }
    }

    /// 5-tuple과 원본 패킷이 채워진 로그 골격을 만듭니다.
    fn log_skeleton(&self, rule: &Rule, ctx: &PacketContext, raw: &[u8]) -> ProcessLog {
        let mut log = ProcessLog::new(rule.id, rule.name.clone());
        log.original_packet = hex::encode(raw);

        if let Some(ipv4) = &ctx.ipv4 {
            log.src_ip = ipv4.source.to_string();
            log.dst_ip = ipv4.destination.to_string();
        }
        log.protocol = ctx.protocol_name();
        if let Some(t) = &ctx.transport {
            log.src_port = t.src_port();
            log.dst_port = t.dst_port();
        }

        log
    }
}

/// `{필드: {"before": .., "after": ..}}` 형태의 JSON을 만듭니다.
fn field_comparison_json(
    before: &HashMap<String, FieldValue>,
    after: &HashMap<String, FieldValue>,
) -> String {
    let mut comparison = serde_json::Map::new();
    for (name, after_value) in after {
        let before_value = before.get(name).cloned().unwrap_or_default();
        comparison.insert(
            name.clone(),
            json!({ "before": before_value, "after": after_value }),
        );
    }
    serde_json::Value::Object(comparison).to_string()
}
