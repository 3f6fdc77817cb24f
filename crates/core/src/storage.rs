//! 스토리지 경계 -- 레코드 영속화 계약과 인메모리 구현
//!
//! 관계형 영속화는 외부 협력자입니다. 코어는 [`Storage`] trait을 통해서만
//! 레코드를 주고받으며, [`MemoryStore`]가 데몬과 테스트에서 사용되는
//! 인프로세스 구현입니다.
//!
//! 인터페이스 설정은 소프트 삭제를 지원합니다. upsert는 삭제된 레코드까지
//! 조회하여 되살립니다 (중복 레코드 생성 방지).

use std::sync::{PoisonError, RwLock};

use crate::error::StorageError;
use crate::types::{Field, InterfaceConfig, NftRule, ProcessLog, Rule, VlanConfig, VlanConfigIp};

/// 레코드 영속화 계약
///
/// 구현은 동시 호출에 안전해야 합니다. 패킷 경로는 로그 기록에만
/// 이 trait을 사용하며, 규칙/필드 조회는 설정 캐시를 거칩니다.
/// 정렬은 호출자의 책임입니다.
pub trait Storage: Send + Sync {
    /// 모든 필드 정의를 반환합니다.
    fn fields(&self) -> Result<Vec<Field>, StorageError>;

    /// 활성화된 규칙을 반환합니다.
    fn enabled_rules(&self) -> Result<Vec<Rule>, StorageError>;

    /// 활성화된 분류기 규칙을 반환합니다.
    fn enabled_nft_rules(&self) -> Result<Vec<NftRule>, StorageError>;

    /// 필드를 추가합니다 (이름 고유).
    fn insert_field(&self, field: Field) -> Result<(), StorageError>;

    /// 규칙을 추가합니다 (이름 고유).
    fn insert_rule(&self, rule: Rule) -> Result<(), StorageError>;

    /// 분류기 규칙을 추가합니다 (이름 고유).
    fn insert_nft_rule(&self, rule: NftRule) -> Result<(), StorageError>;

    /// 삭제되지 않은 모든 인터페이스 설정을 반환합니다.
    fn interface_configs(&self) -> Result<Vec<InterfaceConfig>, StorageError>;

    /// 인터페이스 설정을 조회합니다 (삭제된 레코드 제외).
    fn interface_config(&self, out_interface: &str)
        -> Result<Option<InterfaceConfig>, StorageError>;

    /// 인터페이스 설정을 저장합니다.
    ///
    /// 같은 인터페이스의 레코드가 있으면 (소프트 삭제된 것 포함) 갱신하고
    /// 되살립니다. 없으면 새로 만듭니다.
    fn upsert_interface_config(&self, config: InterfaceConfig) -> Result<(), StorageError>;

    /// 인터페이스 설정을 소프트 삭제합니다.
    fn delete_interface_config(&self, out_interface: &str) -> Result<(), StorageError>;

    /// 모든 VLAN 서브 인터페이스 레코드를 반환합니다.
    fn vlan_configs(&self) -> Result<Vec<VlanConfig>, StorageError>;

    /// VLAN 서브 인터페이스 레코드를 조회합니다.
    fn vlan_config(&self, out_interface: &str) -> Result<Option<VlanConfig>, StorageError>;

    /// VLAN 서브 인터페이스 레코드를 추가합니다.
    fn insert_vlan_config(&self, config: VlanConfig) -> Result<(), StorageError>;

    /// 물리 멤버 목록을 갱신합니다.
    fn update_vlan_members(
        &self,
        out_interface: &str,
        physical_interfaces: &str,
    ) -> Result<(), StorageError>;

    /// VLAN 서브 인터페이스 레코드를 삭제합니다.
    fn delete_vlan_config(&self, out_interface: &str) -> Result<(), StorageError>;

    /// VLAN IP 할당을 추가합니다.
    fn insert_vlan_ip(&self, ip: VlanConfigIp) -> Result<(), StorageError>;

    /// 서브 인터페이스의 IP 할당을 반환합니다.
    fn vlan_ips(&self, out_interface: &str) -> Result<Vec<VlanConfigIp>, StorageError>;

    /// 서브 인터페이스의 IP 할당을 모두 삭제합니다.
    fn delete_vlan_ips(&self, out_interface: &str) -> Result<(), StorageError>;

    /// 처리 로그를 기록합니다.
    fn insert_process_log(&self, log: ProcessLog) -> Result<(), StorageError>;

    /// 모든 처리 로그를 반환합니다.
    fn process_logs(&self) -> Result<Vec<ProcessLog>, StorageError>;
}

#[derive(Debug, Clone)]
struct StoredInterface {
    config: InterfaceConfig,
    deleted: bool,
}

#[derive(Debug, Default)]
struct Inner {
    fields: Vec<Field>,
    rules: Vec<Rule>,
    nft_rules: Vec<NftRule>,
    interfaces: Vec<StoredInterface>,
    vlans: Vec<VlanConfig>,
    vlan_ips: Vec<VlanConfigIp>,
    logs: Vec<ProcessLog>,
    next_id: i64,
}

impl Inner {
    fn alloc_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// 인메모리 스토리지
///
/// `RwLock` 기반이며 모든 메서드가 동시 호출에 안전합니다.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// 빈 스토어를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Storage for MemoryStore {
    fn fields(&self) -> Result<Vec<Field>, StorageError> {
        Ok(self.read().fields.clone())
    }

    fn enabled_rules(&self) -> Result<Vec<Rule>, StorageError> {
        Ok(self
            .read()
            .rules
            .iter()
            .filter(|r| r.enabled)
            .cloned()
            .collect())
    }

    fn enabled_nft_rules(&self) -> Result<Vec<NftRule>, StorageError> {
        Ok(self
            .read()
            .nft_rules
            .iter()
            .filter(|r| r.enabled)
            .cloned()
            .collect())
    }

    fn insert_field(&self, mut field: Field) -> Result<(), StorageError> {
        let mut inner = self.write();
        if inner.fields.iter().any(|f| f.name == field.name) {
            return Err(StorageError::Constraint(format!(
                "duplicate field name: {}",
                field.name
            )));
        }
        if field.id == 0 {
            field.id = inner.alloc_id();
        }
        inner.fields.push(field);
        Ok(())
    }

    fn insert_rule(&self, mut rule: Rule) -> Result<(), StorageError> {
        let mut inner = self.write();
        if inner.rules.iter().any(|r| r.name == rule.name) {
            return Err(StorageError::Constraint(format!(
                "duplicate rule name: {}",
                rule.name
            )));
        }
        if rule.id == 0 {
            rule.id = inner.alloc_id();
        }
        inner.rules.push(rule);
        Ok(())
    }

    fn insert_nft_rule(&self, mut rule: NftRule) -> Result<(), StorageError> {
        let mut inner = self.write();
        if inner.nft_rules.iter().any(|r| r.name == rule.name) {
            return Err(StorageError::Constraint(format!(
                "duplicate nft rule name: {}",
                rule.name
            )));
        }
        if rule.id == 0 {
            rule.id = inner.alloc_id();
        }
        inner.nft_rules.push(rule);
        Ok(())
    }

    fn interface_configs(&self) -> Result<Vec<InterfaceConfig>, StorageError> {
        Ok(self
            .read()
            .interfaces
            .iter()
            .filter(|s| !s.deleted)
            .map(|s| s.config.clone())
            .collect())
    }

    fn interface_config(
        &self,
        out_interface: &str,
    ) -> Result<Option<InterfaceConfig>, StorageError> {
        Ok(self
            .read()
            .interfaces
            .iter()
            .find(|s| !s.deleted && s.config.out_interface == out_interface)
            .map(|s| s.config.clone()))
    }

    fn upsert_interface_config(&self, mut config: InterfaceConfig) -> Result<(), StorageError> {
        let mut inner = self.write();
        // 소프트 삭제된 레코드 포함 조회 후 되살리기
        if let Some(stored) = inner
            .interfaces
            .iter_mut()
            .find(|s| s.config.out_interface == config.out_interface)
        {
            config.id = stored.config.id;
            stored.config = config;
            stored.deleted = false;
            return Ok(());
        }
        if config.id == 0 {
            config.id = inner.alloc_id();
        }
        inner.interfaces.push(StoredInterface {
            config,
            deleted: false,
        });
        Ok(())
    }

    fn delete_interface_config(&self, out_interface: &str) -> Result<(), StorageError> {
        let mut inner = self.write();
        match inner
            .interfaces
            .iter_mut()
            .find(|s| !s.deleted && s.config.out_interface == out_interface)
        {
            Some(stored) => {
                stored.deleted = true;
                Ok(())
            }
            None => Err(StorageError::NotFound {
                entity: "interface config",
                key: out_interface.to_owned(),
            }),
        }
    }

    fn vlan_configs(&self) -> Result<Vec<VlanConfig>, StorageError> {
        Ok(self.read().vlans.clone())
    }

    fn vlan_config(&self, out_interface: &str) -> Result<Option<VlanConfig>, StorageError> {
        Ok(self
            .read()
            .vlans
            .iter()
            .find(|v| v.out_interface == out_interface)
            .cloned())
    }

    fn insert_vlan_config(&self, config: VlanConfig) -> Result<(), StorageError> {
        let mut inner = self.write();
        if inner
            .vlans
            .iter()
            .any(|v| v.out_interface == config.out_interface)
        {
            return Err(StorageError::Constraint(format!(
                "duplicate vlan interface: {}",
                config.out_interface
            )));
        }
        inner.vlans.push(config);
        Ok(())
    }

    fn update_vlan_members(
        &self,
        out_interface: &str,
        physical_interfaces: &str,
    ) -> Result<(), StorageError> {
        let mut inner = self.write();
        match inner
            .vlans
            .iter_mut()
            .find(|v| v.out_interface == out_interface)
        {
            Some(vlan) => {
                vlan.physical_interfaces = physical_interfaces.to_owned();
                Ok(())
            }
            None => Err(StorageError::NotFound {
                entity: "vlan config",
                key: out_interface.to_owned(),
            }),
        }
    }

    fn delete_vlan_config(&self, out_interface: &str) -> Result<(), StorageError> {
        let mut inner = self.write();
        let before = inner.vlans.len();
        inner.vlans.retain(|v| v.out_interface != out_interface);
        if inner.vlans.len() == before {
            return Err(StorageError::NotFound {
                entity: "vlan config",
                key: out_interface.to_owned(),
            });
        }
        // IP 할당도 함께 제거
        inner.vlan_ips.retain(|ip| ip.out_interface != out_interface);
        Ok(())
    }

    fn insert_vlan_ip(&self, ip: VlanConfigIp) -> Result<(), StorageError> {
        self.write().vlan_ips.push(ip);
        Ok(())
    }

    fn vlan_ips(&self, out_interface: &str) -> Result<Vec<VlanConfigIp>, StorageError> {
        Ok(self
            .read()
            .vlan_ips
            .iter()
            .filter(|ip| ip.out_interface == out_interface)
            .cloned()
            .collect())
    }

    fn delete_vlan_ips(&self, out_interface: &str) -> Result<(), StorageError> {
        self.write()
            .vlan_ips
            .retain(|ip| ip.out_interface != out_interface);
        Ok(())
    }

    fn insert_process_log(&self, log: ProcessLog) -> Result<(), StorageError> {
        self.write().logs.push(log);
        Ok(())
    }

    fn process_logs(&self) -> Result<Vec<ProcessLog>, StorageError> {
        Ok(self.read().logs.clone())
    }
}
