//! 분류기 관리 -- 트래픽을 큐로 보내는 nftables 규칙의 재조정
//!
//! bridge 패밀리 테이블 `netvine-table`의 포워드 훅 체인
//! `base-rule-chain`(priority 0, policy accept)을 관리합니다.
//! 적용은 체인 플러시 후 활성 규칙을 `(priority ASC, id ASC)` 순서로
//! 다시 넣는 방식이며, 개별 규칙 실패는 로그로 남기고 계속합니다.

use std::sync::Arc;

use netvine_core::shell::CommandRunner;
use netvine_core::storage::Storage;
use netvine_core::types::{NftAction, NftProtocol, NftRule};

use crate::error::NetctlError;

/// 분류기 테이블 이름
pub const TABLE_NAME: &str = "netvine-table";

/// 분류기 체인 이름
pub const CHAIN_NAME: &str = "base-rule-chain";

/// queue 판정의 기본 큐 지정
const DEFAULT_QUEUE_SPEC: &str = "0-3";

/// nftables 분류기 관리자
pub struct NftManager {
    runner: Arc<dyn CommandRunner>,
    storage: Arc<dyn Storage>,
}

impl NftManager {
    /// 새 관리자를 생성합니다.
    pub fn new(runner: Arc<dyn CommandRunner>, storage: Arc<dyn Storage>) -> Self {
        Self { runner, storage }
    }

    /// 테이블과 체인이 존재함을 보장합니다.
    ///
    /// 생성 명령의 실패는 이미 존재하는 경우일 수 있으므로 무시합니다.
    /// 혼동을 피하기 위해 구버전 ip 패밀리 테이블은 제거합니다.
    pub fn ensure_infrastructure(&self) -> Result<(), NetctlError> {
        tracing::info!("ensuring nftables infrastructure exists");

        let _ = self.runner.run(&format!("nft delete table ip {TABLE_NAME}"));
        let _ = self
            .runner
            .run(&format!("nft add table bridge {TABLE_NAME}"));
        let _ = self.runner.run(&format!(
            "nft add chain bridge {TABLE_NAME} {CHAIN_NAME} {{ type filter hook forward priority 0\\; policy accept\\; }}"
        ));

        tracing::info!("nftables infrastructure ready");
        Ok(())
    }

    /// 체인의 모든 규칙을 제거합니다.
    pub fn clear_rules(&self) -> Result<(), NetctlError> {
        tracing::info!("clearing existing nftables rules");
        self.runner
            .run(&format!("nft flush chain bridge {TABLE_NAME} {CHAIN_NAME}"))?;
        Ok(())
    }

    /// 저장된 활성 규칙을 모두 적용합니다.
    ///
    /// 인프라 보장 -> 체인 플러시 -> `(priority ASC, id ASC)` 순서로
    /// 규칙별 명령 실행. 개별 실패는 로그로 남기고 계속합니다.
    pub fn apply(&self) -> Result<(), NetctlError> {
        tracing::info!("applying nftables rules");

        self.ensure_infrastructure()?;
        self.clear_rules()?;

        let mut rules = self.storage.enabled_nft_rules()?;
        rules.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.id.cmp(&b.id)));

        tracing::info!(count = rules.len(), "found enabled rules to apply");

        let mut success = 0usize;
        for rule in &rules {
            let command = build_command(rule);
            tracing::info!(
                name = rule.name.as_str(),
                command = command.as_str(),
                "applying rule"
            );

            if let Err(e) = self.runner.run(&command) {
                tracing::error!(name = rule.name.as_str(), error = %e, "failed to apply rule");
                continue;
            }
            success += 1;
        }

        tracing::info!(
            success = success,
            failed = rules.len() - success,
            "nftables rules applied"
        );
        Ok(())
    }
}

/// 규칙 하나를 nft 명령으로 변환합니다.
///
/// 절의 순서는 고정입니다: src IP, dst IP, (프로토콜 + sport/dport),
/// 로그 프리픽스, 최종 판정.
pub fn build_command(rule: &NftRule) -> String {
    let mut parts = vec![format!("nft add rule bridge {TABLE_NAME} {CHAIN_NAME}")];

    if !rule.src_ip.is_empty() {
        parts.push(format!("ip saddr {}", rule.src_ip));
    }
    if !rule.dst_ip.is_empty() {
        parts.push(format!("ip daddr {}", rule.dst_ip));
    }

    match rule.protocol {
        NftProtocol::Tcp | NftProtocol::Udp => {
            let proto = rule.protocol.to_string();
            if !rule.src_port.is_empty() {
                parts.push(format!("{proto} sport {}", rule.src_port));
            }
            if !rule.dst_port.is_empty() {
                parts.push(format!("{proto} dport {}", rule.dst_port));
            }
            if rule.src_port.is_empty() && rule.dst_port.is_empty() {
                parts.push(proto);
            }
        }
        NftProtocol::Icmp => parts.push("icmp".to_owned()),
        NftProtocol::Any => {}
    }

    if rule.log_enabled {
        let prefix = if rule.log_prefix.is_empty() {
            &rule.name
        } else {
            &rule.log_prefix
        };
        parts.push(format!("log prefix \"{prefix}\""));
    }

    match rule.action {
        NftAction::Accept => parts.push("accept".to_owned()),
        NftAction::Drop => parts.push("drop".to_owned()),
        NftAction::Queue => {
            let spec = if rule.queue_num.is_empty() {
                DEFAULT_QUEUE_SPEC
            } else {
                &rule.queue_num
            };
            parts.push(format!("queue num {spec} bypass"));
        }
    }

    parts.join(" ")
}
