//! 브리지 관리 -- 커널 브리지와 포트 VLAN 멤버십의 멱등 재조정
//!
//! 브리지 이름은 `Bridge`로 고정되어 있으며 VLAN 필터링이 켜진 상태를
//! 보장합니다. 포트는 access(단일 pvid) 또는 trunk(태그드 목록 + 기본
//! pvid)로 구성됩니다. 모든 명령은 부분 실패 후 재실행해도 같은 최종
//! 상태에 도달합니다.
//!
//! 포트 상태 전이: 미할당 -> 부착 -> 구성(access|trunk) -> 분리.
//! 구성 상태에서 다시 구성하는 것은 허용되며 멱등합니다.

use std::sync::Arc;
use std::time::Duration;

use netvine_core::shell::CommandRunner;
use netvine_core::storage::Storage;
use netvine_core::types::{InterfaceConfig, LinkType};

use crate::error::NetctlError;
use crate::vlan::{split_and_add_list, split_vlan_list};

/// 관리 대상 브리지 이름
pub const BRIDGE_NAME: &str = "Bridge";

/// 브리지 포트 확인 재시도 횟수 (총 5초)
const PORT_WAIT_ATTEMPTS: usize = 50;

/// 브리지/VLAN 관리자
///
/// 호스트 명령은 [`CommandRunner`]를 통해, 레코드는 [`Storage`]를 통해
/// 다룹니다. 둘 다 주입되므로 테스트에서 페이크로 대체할 수 있습니다.
pub struct BridgeManager {
    runner: Arc<dyn CommandRunner>,
    storage: Arc<dyn Storage>,
    port_wait_interval: Duration,
}

impl BridgeManager {
    /// 새 관리자를 생성합니다.
    pub fn new(runner: Arc<dyn CommandRunner>, storage: Arc<dyn Storage>) -> Self {
        Self {
            runner,
            storage,
            port_wait_interval: Duration::from_millis(100),
        }
    }

    /// 브리지 포트 확인 대기 간격을 바꿉니다 (테스트용 단축).
    pub fn with_port_wait_interval(mut self, interval: Duration) -> Self {
        self.port_wait_interval = interval;
        self
    }

    pub(crate) fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    pub(crate) fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    /// `Bridge`가 존재하고 VLAN 필터링이 켜진 채 up 상태임을 보장합니다.
    ///
    /// 생성 실패는 이미 존재하는 경우일 수 있으므로 무시되고, 이후의
    /// 필터링 설정과 up 명령이 성공하면 전체가 성공으로 취급됩니다.
    pub fn ensure_bridge(&self) -> Result<(), NetctlError> {
        tracing::info!("ensuring Bridge exists and is configured");

        // 이미 존재하면 실패하므로 결과는 무시
        let _ = self
            .runner
            .run("ip link add Bridge type bridge vlan_filtering 1");

        // 존재하되 필터링이 꺼져 있었을 수 있으니 강제
        if let Err(e) = self.runner.run("ip link set Bridge type bridge vlan_filtering 1") {
            tracing::warn!(error = %e, "failed to enforce vlan_filtering on Bridge");
        }

        self.runner.run("ip link set Bridge up")?;
        Ok(())
    }

    /// 인터페이스에 VLAN 설정을 적용합니다.
    ///
    /// 브리지에 부착되어 있지 않으면 기존 master에서 떼어낸 뒤 부착하고,
    /// 포트로 인식될 때까지 최대 5초 폴링합니다 (타임아웃 시 경고 후 진행).
    /// 이어서 access/trunk 멤버십을 바인딩하고 `vlan_<id>` 서브
    /// 인터페이스를 만듭니다.
    pub fn add_vlan(&self, config: &InterfaceConfig) -> Result<(), NetctlError> {
        let interface = &config.out_interface;
        tracing::info!(
            interface = interface.as_str(),
            link_type = %config.link_type,
            vlan_id = config.vlan_id.as_str(),
            "configuring VLAN on interface"
        );

        if !self.has_master(interface) {
            // 다른 master에 붙어 있었다면 떼어냄
            let _ = self.runner.run(&format!("ip link set {interface} nomaster"));

            self.runner
                .run(&format!("ip link set {interface} master Bridge"))?;
            self.runner.run(&format!("ip link set {interface} up"))?;

            for attempt in 0..PORT_WAIT_ATTEMPTS {
                if self.has_master(interface) {
                    break;
                }
                if attempt == PORT_WAIT_ATTEMPTS - 1 {
                    tracing::warn!(
                        interface = interface.as_str(),
                        "interface did not become bridge port in time, proceeding anyway"
                    );
                }
                std::thread::sleep(self.port_wait_interval);
            }
        } else {
            tracing::info!(
                interface = interface.as_str(),
                "interface already in Bridge, skipping attachment"
            );
            let _ = self.runner.run(&format!("ip link set {interface} up"));
        }

        match config.link_type {
            LinkType::Access => {
                self.runner.run(&format!(
                    "bridge vlan add vid {} dev Bridge self",
                    config.vlan_id
                ))?;
                self.runner.run(&format!(
                    "bridge vlan add vid {} dev {} master pvid untagged",
                    config.vlan_id, interface
                ))?;
            }
            LinkType::Trunk => {
                if !config.trunk_vlan_id.is_empty() {
                    for vid in split_vlan_list(&config.trunk_vlan_id)? {
                        self.runner.run(&format!(
                            "bridge vlan add vid {vid} dev {interface} master"
                        ))?;
                    }
                }
                // 기본 VLAN은 untagged pvid로
                self.runner.run(&format!(
                    "bridge vlan add vid {} dev {} master pvid untagged",
                    config.default_id, interface
                ))?;
            }
        }

        tracing::info!(interface = interface.as_str(), "creating VLAN interfaces");
        self.add_vlan_subifs(config)?;

        Ok(())
    }

    /// 인터페이스에서 VLAN 설정을 제거합니다.
    ///
    /// 브리지에서 떼어내고, 영향을 받는 `vlan_<id>` 레코드의 물리 멤버를
    /// 줄입니다. 멤버가 비는 서브 인터페이스는 커널과 스토리지 양쪽에서
    /// 삭제됩니다.
    pub fn remove_vlan(&self, interface: &str) -> Result<(), NetctlError> {
        tracing::info!(interface = interface, "removing VLAN from interface");

        let config = self.storage.interface_config(interface)?;

        if let Err(e) = self.runner.run(&format!("ip link set {interface} nomaster")) {
            tracing::error!(interface = interface, error = %e, "failed to remove from bridge");
            return Err(e.into());
        }

        if let Some(config) = config {
            let vlan_ids = match config.link_type {
                LinkType::Access => vec![config.vlan_id.clone()],
                LinkType::Trunk => {
                    split_and_add_list(&config.trunk_vlan_id, &config.default_id)?
                }
            };

            if let Err(e) = self.remove_vlan_members(interface, &vlan_ids) {
                tracing::error!(interface = interface, error = %e, "failed to cleanup VLAN interfaces");
            }

            self.storage.delete_interface_config(interface)?;
        }

        tracing::info!(interface = interface, "successfully removed VLAN configuration");
        Ok(())
    }

    /// 저장된 모든 인터페이스 설정을 적용합니다.
    ///
    /// 개별 실패는 로그로 남기고 계속합니다. 부트스트랩 경로에서
    /// 호출됩니다.
    pub fn reconcile(&self) -> Result<(), NetctlError> {
        tracing::info!("loading network configurations");
        self.ensure_bridge()?;

        let configs = self.storage.interface_configs()?;
        tracing::info!(count = configs.len(), "found configurations to apply");

        let mut success = 0usize;
        let mut failed = 0usize;
        for config in &configs {
            match self.add_vlan(config) {
                Ok(()) => success += 1,
                Err(e) => {
                    tracing::error!(
                        interface = config.out_interface.as_str(),
                        error = %e,
                        "failed to apply configuration"
                    );
                    failed += 1;
                }
            }
        }

        tracing::info!(success = success, failed = failed, "configuration loading complete");
        Ok(())
    }

    /// 인터페이스가 `Bridge`의 포트인지 확인합니다.
    ///
    /// `ip -d link show` 출력에 `master Bridge`가 포함되는지로 판단하며,
    /// 조회 실패는 "포트 아님"으로 취급합니다.
    fn has_master(&self, interface: &str) -> bool {
        match self.runner.run(&format!("ip -d link show {interface}")) {
            Ok(output) => output.contains(&format!("master {BRIDGE_NAME}")),
            Err(_) => false,
        }
    }
}
