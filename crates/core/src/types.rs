//! 도메인 타입 -- 시스템 전역에서 사용되는 공통 타입
//!
//! 패킷 엔진, 네트워크 제어, 큐 워커가 공유하는 레코드를 정의합니다.
//! 관리 표면과 스토리지는 이 형태 그대로 레코드를 주고받습니다.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 필드 해석 방식
///
/// `Builtin`은 offset/length를 무시하고 파싱된 레이어에서 값을 얻습니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FieldKind {
    /// 소문자 16진수 문자열
    #[default]
    Hex,
    /// 빅엔디안 부호 없는 정수 (i64로 해석)
    Decimal,
    /// 우측 NUL 제거된 UTF-8 문자열
    Text,
    /// 5-tuple 내장 필드 (src_ip, dst_ip, src_port, dst_port, protocol)
    Builtin,
}

impl FieldKind {
    /// 문자열에서 해석 방식을 파싱합니다.
    ///
    /// 알 수 없는 값은 `Hex`로 취급합니다.
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "decimal" => Self::Decimal,
            "string" => Self::Text,
            "builtin" => Self::Builtin,
            _ => Self::Hex,
        }
    }

    /// 직렬화에 사용하는 표준 이름을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hex => "hex",
            Self::Decimal => "decimal",
            Self::Text => "string",
            Self::Builtin => "builtin",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FieldKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FieldKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_str_loose(&s))
    }
}

/// 필드 정의 -- 패킷의 특정 바이트 범위에 대한 이름 있는 뷰
///
/// 위치 기반 필드의 추출은 `offset + length <= frame.len()`일 때만 성공합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    /// 레코드 ID
    #[serde(default)]
    pub id: i64,
    /// 필드 이름 (고유)
    pub name: String,
    /// 시작 오프셋 (바이트)
    #[serde(default)]
    pub offset: usize,
    /// 길이 (바이트)
    #[serde(default)]
    pub length: usize,
    /// 해석 방식
    #[serde(default, rename = "type")]
    pub kind: FieldKind,
}

/// 패킷 변형 규칙
///
/// 활성 규칙은 `(priority DESC, id ASC)` 순서로 평가되며 첫 매칭에서 멈춥니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// 레코드 ID
    #[serde(default)]
    pub id: i64,
    /// 규칙 이름 (고유)
    pub name: String,
    /// 활성화 여부
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 우선순위 (높을수록 먼저 평가)
    #[serde(default)]
    pub priority: i32,
    /// 매칭 조건식 (예: `tag == "aabb" && port != "80"`)
    #[serde(default)]
    pub match_condition: String,
    /// 액션 목록 (JSON 배열: `[{"field": .., "op": .., "value": ..}]`)
    #[serde(default)]
    pub actions: String,
    /// 출력 옵션 (JSON 배열: `["compute_checksum"]`)
    #[serde(default)]
    pub output_options: String,
}

fn default_true() -> bool {
    true
}

/// 필드 환경의 동적 값
///
/// 추출 실패는 `Null`로 기록되고 파이프라인은 계속 진행합니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// 값 없음 (추출 실패 또는 미정의)
    #[default]
    Null,
    /// 64비트 부호 있는 정수
    Int(i64),
    /// 문자열
    Text(String),
}

impl FieldValue {
    /// `Null` 여부를 확인합니다.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// 정수 값이면 반환합니다.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// 문자열 값이면 반환합니다.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "<not available>"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

/// 포트 링크 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    /// 단일 VLAN 접속 포트
    Access,
    /// 다중 VLAN 트렁크 포트
    Trunk,
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Access => write!(f, "access"),
            Self::Trunk => write!(f, "trunk"),
        }
    }
}

/// 물리 인터페이스의 VLAN 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceConfig {
    /// 레코드 ID
    #[serde(default)]
    pub id: i64,
    /// 대상 인터페이스 이름 (고유)
    pub out_interface: String,
    /// access 또는 trunk
    pub link_type: LinkType,
    /// access 모드 VLAN ID
    #[serde(default)]
    pub vlan_id: String,
    /// trunk 모드 VLAN 목록 (예: "2,3,5-10")
    #[serde(default)]
    pub trunk_vlan_id: String,
    /// trunk 기본 VLAN ID
    #[serde(default = "default_vlan_id")]
    pub default_id: String,
}

fn default_vlan_id() -> String {
    "1".to_owned()
}

/// 파생 VLAN 서브 인터페이스 (`vlan_<N>`)
///
/// 물리 멤버 집합이 비면 레코드와 커널 인터페이스를 함께 삭제합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VlanConfig {
    /// 서브 인터페이스 이름 (`vlan_<N>`, 고유)
    pub out_interface: String,
    /// VLAN ID
    pub vlan_id: u16,
    /// 동작 유형
    #[serde(default)]
    pub kind: VlanKind,
    /// 물리 멤버 인터페이스 (정렬/중복 제거된 콤마 구분 목록)
    #[serde(default)]
    pub physical_interfaces: String,
    /// 관리 상태
    #[serde(default = "default_up")]
    pub up: bool,
}

fn default_up() -> bool {
    true
}

/// VLAN 서브 인터페이스 동작 유형
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VlanKind {
    /// 라우팅 참여
    Route,
    /// 투명 전달
    #[default]
    Transparent,
}

/// VLAN 서브 인터페이스의 IP 할당
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VlanConfigIp {
    /// 대상 서브 인터페이스 이름
    pub out_interface: String,
    /// IPv4 주소
    pub ip_address: String,
    /// 서브넷 마스크 (점 표기 또는 CIDR 프리픽스 길이, 수신 시 점 표기로 정규화)
    pub subnet_mask: String,
}

/// 분류기 규칙의 프로토콜 선택
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NftProtocol {
    /// TCP
    Tcp,
    /// UDP
    Udp,
    /// ICMP
    Icmp,
    /// 모든 프로토콜
    #[default]
    Any,
}

impl fmt::Display for NftProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Udp => write!(f, "udp"),
            Self::Icmp => write!(f, "icmp"),
            Self::Any => write!(f, "any"),
        }
    }
}

/// 분류기 규칙의 최종 판정
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NftAction {
    /// 통과
    Accept,
    /// 폐기
    Drop,
    /// 사용자 공간 큐로 전달
    Queue,
}

impl fmt::Display for NftAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accept => write!(f, "accept"),
            Self::Drop => write!(f, "drop"),
            Self::Queue => write!(f, "queue"),
        }
    }
}

/// 호스트 분류기(nftables) 규칙
///
/// 브리지 포워드 훅에서 `(priority ASC, id ASC)` 순서로 적용됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NftRule {
    /// 레코드 ID
    #[serde(default)]
    pub id: i64,
    /// 규칙 이름 (고유)
    pub name: String,
    /// 활성화 여부
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 우선순위 (낮을수록 먼저)
    #[serde(default = "default_nft_priority")]
    pub priority: i32,
    /// 출발지 IP 또는 CIDR (빈 값 = any)
    #[serde(default)]
    pub src_ip: String,
    /// 목적지 IP 또는 CIDR (빈 값 = any)
    #[serde(default)]
    pub dst_ip: String,
    /// 출발지 포트 또는 범위 (빈 값 = any)
    #[serde(default)]
    pub src_port: String,
    /// 목적지 포트 또는 범위 (빈 값 = any)
    #[serde(default)]
    pub dst_port: String,
    /// 프로토콜
    #[serde(default)]
    pub protocol: NftProtocol,
    /// 커널 로그 기록 여부
    #[serde(default)]
    pub log_enabled: bool,
    /// 로그 프리픽스 (빈 값이면 규칙 이름 사용)
    #[serde(default)]
    pub log_prefix: String,
    /// 최종 판정
    pub action: NftAction,
    /// queue 판정 시 큐 번호 또는 범위 (빈 값 = "0-3")
    #[serde(default)]
    pub queue_num: String,
}

fn default_nft_priority() -> i32 {
    100
}

/// 처리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessResult {
    /// 규칙 매칭 후 변형 성공
    Success,
    /// 규칙 매칭 후 액션/재조립 실패 (원본 통과)
    Error,
}

impl fmt::Display for ProcessResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// 패킷 처리 로그 -- 규칙이 매칭된 패킷마다 한 건
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessLog {
    /// 레코드 ID (UUID v4)
    pub id: String,
    /// 매칭된 규칙 ID
    pub rule_id: i64,
    /// 매칭된 규칙 이름
    pub rule_name: String,
    /// 원본 패킷 (16진수 문자열)
    pub original_packet: String,
    /// 변형된 패킷 (16진수 문자열, 실패 시 빈 값)
    pub modified_packet: String,
    /// 필드별 before/after 맵 (JSON)
    pub field_values: String,
    /// 처리 결과
    pub result: ProcessResult,
    /// 실패 사유 (성공 시 빈 값)
    pub error_message: String,
    /// 처리 시각
    pub processed_at: SystemTime,
    /// 출발지 IP
    pub src_ip: String,
    /// 목적지 IP
    pub dst_ip: String,
    /// 출발지 포트
    pub src_port: u16,
    /// 목적지 포트
    pub dst_port: u16,
    /// 프로토콜 이름
    pub protocol: String,
}

impl ProcessLog {
    /// 새 로그 레코드를 생성합니다.
    pub fn new(rule_id: i64, rule_name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            rule_id,
            rule_name: rule_name.into(),
            original_packet: String::new(),
            modified_packet: String::new(),
            field_values: String::new(),
            result: ProcessResult::Success,
            error_message: String::new(),
            processed_at: SystemTime::now(),
            src_ip: String::new(),
            dst_ip: String::new(),
            src_port: 0,
            dst_port: 0,
            protocol: String::new(),
        }
    }
}

impl fmt::Display for ProcessLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] rule={} {}:{} -> {}:{} ({})",
            self.result,
            self.rule_name,
            self.src_ip,
            self.src_port,
            self.dst_ip,
            self.dst_port,
            self.protocol,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_kind_from_str_loose() {
        assert_eq!(FieldKind::from_str_loose("hex"), FieldKind::Hex);
        assert_eq!(FieldKind::from_str_loose("DECIMAL"), FieldKind::Decimal);
        assert_eq!(FieldKind::from_str_loose("string"), FieldKind::Text);
        assert_eq!(FieldKind::from_str_loose("builtin"), FieldKind::Builtin);
        // 알 수 없는 유형은 hex로
        assert_eq!(FieldKind::from_str_loose("octal"), FieldKind::Hex);
        assert_eq!(FieldKind::from_str_loose(""), FieldKind::Hex);
    }

    #[test]
    fn field_kind_serde_roundtrip() {
        let json = serde_json::to_string(&FieldKind::Text).unwrap();
        assert_eq!(json, "\"string\"");
        let kind: FieldKind = serde_json::from_str("\"decimal\"").unwrap();
        assert_eq!(kind, FieldKind::Decimal);
        // 미지의 값도 디코딩은 성공
        let kind: FieldKind = serde_json::from_str("\"whatever\"").unwrap();
        assert_eq!(kind, FieldKind::Hex);
    }

    #[test]
    fn field_deserializes_with_defaults() {
        let field: Field =
            serde_json::from_str(r#"{"name": "tag", "offset": 40, "length": 6, "type": "hex"}"#)
                .unwrap();
        assert_eq!(field.id, 0);
        assert_eq!(field.name, "tag");
        assert_eq!(field.offset, 40);
        assert_eq!(field.length, 6);
        assert_eq!(field.kind, FieldKind::Hex);
    }

    #[test]
    fn rule_enabled_defaults_to_true() {
        let rule: Rule = serde_json::from_str(r#"{"name": "r1"}"#).unwrap();
        assert!(rule.enabled);
        assert_eq!(rule.priority, 0);
        assert!(rule.match_condition.is_empty());
    }

    #[test]
    fn field_value_display() {
        assert_eq!(FieldValue::Null.to_string(), "<not available>");
        assert_eq!(FieldValue::Int(42).to_string(), "42");
        assert_eq!(FieldValue::Text("abc".to_owned()).to_string(), "abc");
    }

    #[test]
    fn field_value_serializes_untagged() {
        assert_eq!(serde_json::to_string(&FieldValue::Null).unwrap(), "null");
        assert_eq!(serde_json::to_string(&FieldValue::Int(7)).unwrap(), "7");
        assert_eq!(
            serde_json::to_string(&FieldValue::Text("x".to_owned())).unwrap(),
            "\"x\""
        );
    }

    #[test]
    fn field_value_accessors() {
        assert!(FieldValue::Null.is_null());
        assert_eq!(FieldValue::Int(5).as_int(), Some(5));
        assert_eq!(FieldValue::Text("a".to_owned()).as_text(), Some("a"));
        assert_eq!(FieldValue::Int(5).as_text(), None);
    }

    #[test]
    fn link_type_serde() {
        let lt: LinkType = serde_json::from_str("\"access\"").unwrap();
        assert_eq!(lt, LinkType::Access);
        assert_eq!(LinkType::Trunk.to_string(), "trunk");
    }

    #[test]
    fn nft_rule_defaults() {
        let rule: NftRule =
            serde_json::from_str(r#"{"name": "steer", "action": "queue"}"#).unwrap();
        assert!(rule.enabled);
        assert_eq!(rule.priority, 100);
        assert_eq!(rule.protocol, NftProtocol::Any);
        assert_eq!(rule.action, NftAction::Queue);
        assert!(rule.queue_num.is_empty());
    }

    #[test]
    fn process_log_new_has_uuid() {
        let log = ProcessLog::new(3, "rewrite-tag");
        assert_eq!(log.id.len(), 36);
        assert_eq!(log.rule_id, 3);
        assert_eq!(log.rule_name, "rewrite-tag");
        assert_eq!(log.result, ProcessResult::Success);
    }

    #[test]
    fn process_log_display() {
        let mut log = ProcessLog::new(1, "r");
        log.src_ip = "10.0.0.1".to_owned();
        log.dst_ip = "10.0.0.2".to_owned();
        log.src_port = 1234;
        log.dst_port = 80;
        log.protocol = "TCP".to_owned();
        log.result = ProcessResult::Error;
        let s = log.to_string();
        assert!(s.contains("error"));
        assert!(s.contains("10.0.0.1:1234"));
    }
}
