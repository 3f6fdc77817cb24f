//! 설정 캐시 -- 핫 패스가 참조하는 규칙/필드 스냅샷
//!
//! 패킷 경로는 스토리지를 조회하지 않습니다. [`ConfigCache`]가 유일한
//! 설정 출처이며, 리로드는 명시적입니다: 관리 변경 후 [`ConfigCache::reload`]
//! 호출이 스토리지를 다시 읽어 스냅샷을 원자적으로 교체합니다.
//!
//! 읽기는 공유 락을 잡고 `Arc` 참조 두 개만 복사한 뒤 즉시 해제합니다.

use std::sync::{Arc, PoisonError, RwLock};

use netvine_core::error::StorageError;
use netvine_core::storage::Storage;
use netvine_core::types::{Field, Rule};

/// 캐시 스냅샷
#[derive(Debug, Default, Clone)]
struct Snapshot {
    fields: Arc<Vec<Field>>,
    rules: Arc<Vec<Rule>>,
}

/// 규칙/필드 설정 캐시
///
/// 프로세스 전역 수명을 가지며 읽기 위주 워크로드에 맞춰
/// reader/writer 락으로 보호됩니다.
#[derive(Debug, Default)]
pub struct ConfigCache {
    snapshot: RwLock<Snapshot>,
}

impl ConfigCache {
    /// 빈 캐시를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 스토리지에서 필드와 활성 규칙을 다시 읽어 스냅샷을 교체합니다.
    ///
    /// 규칙은 `(priority DESC, id ASC)`로 정렬되어 저장됩니다.
    pub fn reload(&self, storage: &dyn Storage) -> Result<(), StorageError> {
        let fields = storage.fields()?;
        let mut rules = storage.enabled_rules()?;
        rules.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));

        let fields_count = fields.len();
        let rules_count = rules.len();

        {
            let mut snapshot = self
                .snapshot
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            snapshot.fields = Arc::new(fields);
            snapshot.rules = Arc::new(rules);
        }

        tracing::info!(
            fields_count = fields_count,
            rules_count = rules_count,
            "configuration reloaded"
        );
        Ok(())
    }

    /// 현재 스냅샷의 (필드, 규칙) 참조를 복사해 반환합니다.
    pub fn snapshot(&self) -> (Arc<Vec<Field>>, Arc<Vec<Rule>>) {
        let snapshot = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        (Arc::clone(&snapshot.fields), Arc::clone(&snapshot.rules))
    }
}
