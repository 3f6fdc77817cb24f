//! VLAN 서브 인터페이스 관리 -- `vlan_<N>` 생명주기와 IP 할당
//!
//! 서브 인터페이스 레코드는 물리 멤버 목록(정렬/중복 제거된 콤마 구분
//! 문자열)을 추적합니다. 마지막 멤버가 빠지면 레코드와 커널 인터페이스를
//! 함께 삭제합니다.

use netvine_core::types::{InterfaceConfig, LinkType, VlanConfig, VlanConfigIp, VlanKind};

use crate::bridge::BridgeManager;
use crate::error::NetctlError;

impl BridgeManager {
    /// 설정에 해당하는 `vlan_<id>` 서브 인터페이스들을 만들거나 멤버를
    /// 추가합니다.
    pub(crate) fn add_vlan_subifs(&self, config: &InterfaceConfig) -> Result<(), NetctlError> {
        match config.link_type {
            LinkType::Access => {
                self.ensure_vlan_subif(&config.out_interface, &config.vlan_id)?;
            }
            LinkType::Trunk => {
                for vid in split_and_add_list(&config.trunk_vlan_id, &config.default_id)? {
                    self.ensure_vlan_subif(&config.out_interface, &vid)?;
                }
            }
        }
        Ok(())
    }

    /// `vlan_<vid>`가 없으면 만들고, 있으면 물리 멤버에 합류시킵니다.
    fn ensure_vlan_subif(&self, physical: &str, vid: &str) -> Result<(), NetctlError> {
        let name = format!("vlan_{vid}");
        match self.storage().vlan_config(&name)? {
            None => {
                let vlan_id: u16 = vid
                    .trim()
                    .parse()
                    .map_err(|_| NetctlError::InvalidVlanRange(vid.to_owned()))?;

                self.storage().insert_vlan_config(VlanConfig {
                    out_interface: name.clone(),
                    vlan_id,
                    kind: VlanKind::Transparent,
                    physical_interfaces: physical.to_owned(),
                    up: true,
                })?;

                // 인터페이스가 이미 있으면 실패하므로 결과는 무시
                let _ = self.runner().run(&format!(
                    "ip link add link Bridge name {name} up type vlan id {vid}"
                ));
            }
            Some(existing) => {
                let members = combine_and_sort_strings(&existing.physical_interfaces, physical);
                self.storage().update_vlan_members(&name, &members)?;
            }
        }
        Ok(())
    }

    /// 물리 인터페이스를 각 `vlan_<id>` 레코드에서 제거합니다.
    ///
    /// 멤버가 비는 서브 인터페이스는 커널과 스토리지에서 삭제됩니다.
    pub(crate) fn remove_vlan_members(
        &self,
        physical: &str,
        vlan_ids: &[String],
    ) -> Result<(), NetctlError> {
        tracing::info!(
            physical_interface = physical,
            vlan_ids = ?vlan_ids,
            "removing physical interface from VLAN tracking"
        );

        for vid in vlan_ids {
            let name = format!("vlan_{vid}");
            let Some(vlan) = self.storage().vlan_config(&name)? else {
                tracing::warn!(vlan_interface = name.as_str(), "VLAN interface not tracked");
                continue;
            };

            let remaining: Vec<&str> = vlan
                .physical_interfaces
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty() && *p != physical)
                .collect();

            if remaining.is_empty() {
                tracing::info!(
                    vlan_interface = name.as_str(),
                    "no interfaces using VLAN, deleting vlan interface"
                );
                if let Err(e) = self.runner().run(&format!("ip link del {name}")) {
                    tracing::warn!(
                        vlan_interface = name.as_str(),
                        error = %e,
                        "failed to delete vlan interface (may not exist)"
                    );
                }
                self.storage().delete_vlan_config(&name)?;
            } else {
                let members = remaining.join(",");
                tracing::info!(
                    vlan_interface = name.as_str(),
                    members = members.as_str(),
                    "updating VLAN interface physical list"
                );
                self.storage().update_vlan_members(&name, &members)?;
            }
        }

        Ok(())
    }

    /// VLAN 서브 인터페이스가 커널에 존재하는지 확인합니다.
    pub fn validate_vlan_interface(&self, vlan_interface: &str) -> Result<(), NetctlError> {
        self.runner()
            .run(&format!("ip link show {vlan_interface}"))
            .map_err(|_| NetctlError::MissingInterface(vlan_interface.to_owned()))?;
        Ok(())
    }

    /// VLAN 서브 인터페이스에 IP 주소들을 추가합니다.
    ///
    /// 대상 인터페이스 존재를 먼저 검증하고, CIDR 형태로 하나씩
    /// 추가합니다. 첫 실패에서 배치가 중단됩니다. 마스크의 프리픽스
    /// 길이 표기는 점 표기로 정규화되어 저장됩니다.
    pub fn vlan_if_ip_add(
        &self,
        vlan_interface: &str,
        entries: &[VlanConfigIp],
    ) -> Result<(), NetctlError> {
        tracing::info!(
            interface = vlan_interface,
            count = entries.len(),
            "adding IP addresses to VLAN interface"
        );

        self.validate_vlan_interface(vlan_interface)?;

        for entry in entries {
            let mask = normalize_mask(&entry.subnet_mask)?;
            let prefix = mask_to_prefix(&mask)?;
            let address = format!("{}/{}", entry.ip_address, prefix);

            self.runner()
                .run(&format!("ip addr add {address} dev {vlan_interface}"))?;

            self.storage().insert_vlan_ip(VlanConfigIp {
                out_interface: vlan_interface.to_owned(),
                ip_address: entry.ip_address.clone(),
                subnet_mask: mask,
            })?;

            tracing::info!(
                interface = vlan_interface,
                address = address.as_str(),
                "added IP address"
            );
        }

        Ok(())
    }

    /// VLAN 서브 인터페이스의 모든 IPv4 주소를 제거합니다.
    pub fn vlan_if_ip_flush(&self, vlan_interface: &str) -> Result<(), NetctlError> {
        self.runner()
            .run(&format!("ip -4 addr flush dev {vlan_interface}"))?;
        self.storage().delete_vlan_ips(vlan_interface)?;
        Ok(())
    }

    /// VLAN 서브 인터페이스를 올리거나 내립니다.
    pub fn vlan_if_up_down(&self, vlan_interface: &str, up: bool) -> Result<(), NetctlError> {
        let action = if up { "up" } else { "down" };
        self.runner()
            .run(&format!("ip link set dev {vlan_interface} {action}"))?;
        Ok(())
    }
}

/// trunk VLAN 목록을 정수 vid 목록으로 확장합니다.
///
/// 각 콤마 구분 항목은 정수이거나 `A-B` 폐구간 범위입니다.
pub fn split_vlan_list(trunk_vlan_id: &str) -> Result<Vec<String>, NetctlError> {
    let mut result = Vec::new();

    for part in trunk_vlan_id.split(',') {
        let part = part.trim();
        if let Some((start, end)) = part.split_once('-') {
            let start: u16 = start
                .trim()
                .parse()
                .map_err(|_| NetctlError::InvalidVlanRange(part.to_owned()))?;
            let end: u16 = end
                .trim()
                .parse()
                .map_err(|_| NetctlError::InvalidVlanRange(part.to_owned()))?;
            if start > end {
                return Err(NetctlError::InvalidVlanRange(part.to_owned()));
            }
            for vid in start..=end {
                result.push(vid.to_string());
            }
        } else {
            let vid: u16 = part
                .parse()
                .map_err(|_| NetctlError::InvalidVlanRange(part.to_owned()))?;
            result.push(vid.to_string());
        }
    }

    Ok(result)
}

/// trunk 목록을 확장하고 기본 vid가 없으면 덧붙입니다.
///
/// 기본 vid는 결과에 정확히 한 번 존재합니다.
pub fn split_and_add_list(
    trunk_vlan_id: &str,
    default_id: &str,
) -> Result<Vec<String>, NetctlError> {
    let mut result = split_vlan_list(trunk_vlan_id)?;
    if !result.iter().any(|vid| vid == default_id) {
        result.push(default_id.to_owned());
    }
    Ok(result)
}

/// 두 콤마 구분 목록을 합쳐 정렬된 중복 없는 목록 문자열을 만듭니다.
pub fn combine_and_sort_strings(a: &str, b: &str) -> String {
    let mut list: Vec<String> = a.split(',').map(|s| s.trim().to_owned()).collect();

    for item in b.split(',') {
        let item = item.trim();
        if !list.iter().any(|existing| existing == item) {
            list.push(item.to_owned());
        }
    }

    list.sort();
    list.join(",")
}

/// 서브넷 마스크를 점 표기로 정규화합니다.
///
/// 프리픽스 길이(`"24"`)와 점 표기(`"255.255.255.0"`) 둘 다 받으며,
/// 점 표기는 비트가 연속인지 검증합니다.
pub fn normalize_mask(mask: &str) -> Result<String, NetctlError> {
    let mask = mask.trim();

    // 프리픽스 길이 표기
    if !mask.contains('.') {
        let prefix: u8 = mask
            .parse()
            .map_err(|_| NetctlError::InvalidMask(mask.to_owned()))?;
        if prefix > 32 {
            return Err(NetctlError::InvalidMask(mask.to_owned()));
        }
        return Ok(prefix_to_dotted(prefix));
    }

    // 점 표기: 파싱 후 연속 비트 검증
    let bits = dotted_to_bits(mask)?;
    let inverted = !bits;
    if inverted & inverted.wrapping_add(1) != 0 {
        return Err(NetctlError::InvalidMask(mask.to_owned()));
    }
    Ok(prefix_to_dotted(bits.count_ones() as u8))
}

/// 점 표기 마스크의 프리픽스 길이를 구합니다.
pub fn mask_to_prefix(mask: &str) -> Result<u8, NetctlError> {
    let normalized = normalize_mask(mask)?;
    let bits = dotted_to_bits(&normalized)?;
    Ok(bits.count_ones() as u8)
}

fn prefix_to_dotted(prefix: u8) -> String {
    let bits: u32 = if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    };
    let octets = bits.to_be_bytes();
    format!("{}.{}.{}.{}", octets[0], octets[1], octets[2], octets[3])
}

fn dotted_to_bits(mask: &str) -> Result<u32, NetctlError> {
    let mut octets = [0u8; 4];
    let mut parts = mask.split('.');
    for slot in &mut octets {
        let part = parts
            .next()
            .ok_or_else(|| NetctlError::InvalidMask(mask.to_owned()))?;
        *slot = part
            .trim()
            .parse()
            .map_err(|_| NetctlError::InvalidMask(mask.to_owned()))?;
    }
    if parts.next().is_some() {
        return Err(NetctlError::InvalidMask(mask.to_owned()));
    }
    Ok(u32::from_be_bytes(octets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeRunner;
    use netvine_core::storage::{MemoryStore, Storage};
    use std::sync::Arc;

    fn manager_with_store() -> (BridgeManager, Arc<MemoryStore>, Arc<std::sync::Mutex<Vec<String>>>) {
        let runner = FakeRunner::new();
        let log = runner.log_handle();
        let storage = Arc::new(MemoryStore::new());
        (
            BridgeManager::new(Arc::new(runner), Arc::clone(&storage) as _),
            storage,
            log,
        )
    }

    #[test]
    fn split_vlan_list_expands_ranges() {
        assert_eq!(split_vlan_list("2,3,5-7").unwrap(), ["2", "3", "5", "6", "7"]);
        assert_eq!(split_vlan_list("10").unwrap(), ["10"]);
        assert_eq!(split_vlan_list(" 4 , 8 - 9 ").unwrap(), ["4", "8", "9"]);
    }

    #[test]
    fn split_vlan_list_rejects_garbage() {
        assert!(split_vlan_list("a").is_err());
        assert!(split_vlan_list("5-").is_err());
        assert!(split_vlan_list("7-5").is_err());
        assert!(split_vlan_list("1,,2").is_err());
    }

    #[test]
    fn split_and_add_list_appends_missing_default() {
        assert_eq!(
            split_and_add_list("2,3,5-7", "1").unwrap(),
            ["2", "3", "5", "6", "7", "1"]
        );
    }

    #[test]
    fn split_and_add_list_keeps_existing_default_once() {
        assert_eq!(split_and_add_list("1,2", "1").unwrap(), ["1", "2"]);
        let result = split_and_add_list("5-8", "6").unwrap();
        assert_eq!(result.iter().filter(|v| *v == "6").count(), 1);
    }

    #[test]
    fn combine_and_sort_merges_and_dedups() {
        assert_eq!(combine_and_sort_strings("eth2,eth1", "eth3,eth1"), "eth1,eth2,eth3");
        assert_eq!(combine_and_sort_strings("eth1", "eth1"), "eth1");
    }

    #[test]
    fn normalize_mask_prefix_form() {
        assert_eq!(normalize_mask("24").unwrap(), "255.255.255.0");
        assert_eq!(normalize_mask("16").unwrap(), "255.255.0.0");
        assert_eq!(normalize_mask("32").unwrap(), "255.255.255.255");
        assert_eq!(normalize_mask("0").unwrap(), "0.0.0.0");
    }

    #[test]
    fn normalize_mask_dotted_form() {
        assert_eq!(normalize_mask("255.255.255.0").unwrap(), "255.255.255.0");
        assert_eq!(normalize_mask("255.128.0.0").unwrap(), "255.128.0.0");
    }

    #[test]
    fn normalize_mask_rejects_invalid() {
        assert!(normalize_mask("33").is_err());
        assert!(normalize_mask("255.0.255.0").is_err()); // 비연속 비트
        assert!(normalize_mask("255.255.255").is_err());
        assert!(normalize_mask("nonsense").is_err());
    }

    #[test]
    fn mask_to_prefix_roundtrip() {
        assert_eq!(mask_to_prefix("255.255.255.0").unwrap(), 24);
        assert_eq!(mask_to_prefix("24").unwrap(), 24);
        assert_eq!(mask_to_prefix("0.0.0.0").unwrap(), 0);
    }

    #[test]
    fn ip_add_validates_interface_first() {
        let (manager, _, _) = manager_with_store();
        // FakeRunner는 기본적으로 성공하므로 실패 주입으로 부재를 흉내
        let runner = FakeRunner::new();
        runner.fail_on("ip link show vlan_99");
        let storage = Arc::new(MemoryStore::new());
        let manager2 = BridgeManager::new(Arc::new(runner), storage as _);

        let entry = VlanConfigIp {
            out_interface: String::new(),
            ip_address: "192.168.10.1".to_owned(),
            subnet_mask: "24".to_owned(),
        };
        assert!(manager.vlan_if_ip_add("vlan_10", std::slice::from_ref(&entry)).is_ok());
        let err = manager2
            .vlan_if_ip_add("vlan_99", &[entry])
            .unwrap_err();
        assert!(matches!(err, NetctlError::MissingInterface(_)));
    }

    #[test]
    fn ip_add_composes_cidr_and_normalizes_mask() {
        let (manager, storage, log) = manager_with_store();

        let entries = vec![
            VlanConfigIp {
                out_interface: String::new(),
                ip_address: "192.168.10.1".to_owned(),
                subnet_mask: "24".to_owned(),
            },
            VlanConfigIp {
                out_interface: String::new(),
                ip_address: "10.1.0.1".to_owned(),
                subnet_mask: "255.255.0.0".to_owned(),
            },
        ];
        manager.vlan_if_ip_add("vlan_10", &entries).unwrap();

        let commands = log.lock().unwrap().clone();
        assert!(commands.contains(&"ip addr add 192.168.10.1/24 dev vlan_10".to_owned()));
        assert!(commands.contains(&"ip addr add 10.1.0.1/16 dev vlan_10".to_owned()));

        let stored = storage.vlan_ips("vlan_10").unwrap();
        assert_eq!(stored.len(), 2);
        // 프리픽스 표기가 점 표기로 정규화되어 저장됨
        assert_eq!(stored[0].subnet_mask, "255.255.255.0");
        assert_eq!(stored[1].subnet_mask, "255.255.0.0");
    }

    #[test]
    fn ip_add_first_failure_aborts_batch() {
        let runner = FakeRunner::new();
        let log = runner.log_handle();
        runner.fail_on("ip addr add 192.168.10.1/24 dev vlan_10");
        let storage = Arc::new(MemoryStore::new());
        let manager = BridgeManager::new(Arc::new(runner), Arc::clone(&storage) as _);

        let entries = vec![
            VlanConfigIp {
                out_interface: String::new(),
                ip_address: "192.168.10.1".to_owned(),
                subnet_mask: "24".to_owned(),
            },
            VlanConfigIp {
                out_interface: String::new(),
                ip_address: "192.168.10.2".to_owned(),
                subnet_mask: "24".to_owned(),
            },
        ];
        assert!(manager.vlan_if_ip_add("vlan_10", &entries).is_err());

        // 두 번째 주소는 시도조차 되지 않음
        let commands = log.lock().unwrap().clone();
        assert!(!commands
            .iter()
            .any(|c| c.contains("192.168.10.2")));
        assert!(storage.vlan_ips("vlan_10").unwrap().is_empty());
    }

    #[test]
    fn ip_flush_clears_records() {
        let (manager, storage, log) = manager_with_store();
        storage
            .insert_vlan_ip(VlanConfigIp {
                out_interface: "vlan_10".to_owned(),
                ip_address: "192.168.10.1".to_owned(),
                subnet_mask: "255.255.255.0".to_owned(),
            })
            .unwrap();

        manager.vlan_if_ip_flush("vlan_10").unwrap();

        assert!(log
            .lock()
            .unwrap()
            .contains(&"ip -4 addr flush dev vlan_10".to_owned()));
        assert!(storage.vlan_ips("vlan_10").unwrap().is_empty());
    }

    #[test]
    fn up_down_commands() {
        let (manager, _, log) = manager_with_store();

        manager.vlan_if_up_down("vlan_10", true).unwrap();
        manager.vlan_if_up_down("vlan_10", false).unwrap();

        let commands = log.lock().unwrap().clone();
        assert_eq!(
            commands,
            vec![
                "ip link set dev vlan_10 up".to_owned(),
                "ip link set dev vlan_10 down".to_owned(),
            ]
        );
    }
}
