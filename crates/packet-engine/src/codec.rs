//! 패킷 코덱 -- 원시 프레임 파싱과 레이어 요약
//!
//! 첫 니블로 프레임 시작 레이어를 판별합니다: `4` -> IPv4, `6` -> IPv6,
//! 그 외 -> Ethernet. 파싱된 레이어는 원시 버퍼를 소유한
//! [`PacketContext`]에 작은 요약 구조체로 복사됩니다 (자기 참조 없음).

use std::collections::HashMap;
use std::fmt::Write as _;
use std::net::Ipv4Addr;

use bytes::Bytes;
use etherparse::{LinkSlice, NetSlice, SlicedPacket, TransportSlice};

use netvine_core::types::FieldValue;

use crate::error::EngineError;

/// Ethernet 레이어 요약
#[derive(Debug, Clone, Copy)]
pub struct EtherInfo {
    /// 출발지 MAC
    pub source: [u8; 6],
    /// 목적지 MAC
    pub destination: [u8; 6],
    /// EtherType
    pub ether_type: u16,
}

/// IPv4 레이어 요약
#[derive(Debug, Clone, Copy)]
pub struct Ipv4Info {
    /// 출발지 주소
    pub source: Ipv4Addr,
    /// 목적지 주소
    pub destination: Ipv4Addr,
    /// 프로토콜 번호
    pub protocol: u8,
    /// 헤더 길이 (바이트)
    pub header_len: usize,
    /// Total Length 필드
    pub total_len: u16,
}

/// 전송 레이어 요약
#[derive(Debug, Clone, Copy)]
pub enum TransportInfo {
    /// TCP 세그먼트
    Tcp {
        /// 출발지 포트
        src_port: u16,
        /// 목적지 포트
        dst_port: u16,
    },
    /// UDP 데이터그램
    Udp {
        /// 출발지 포트
        src_port: u16,
        /// 목적지 포트
        dst_port: u16,
    },
}

impl TransportInfo {
    /// 출발지 포트를 반환합니다.
    pub fn src_port(&self) -> u16 {
        match self {
            Self::Tcp { src_port, .. } | Self::Udp { src_port, .. } => *src_port,
        }
    }

    /// 목적지 포트를 반환합니다.
    pub fn dst_port(&self) -> u16 {
        match self {
            Self::Tcp { dst_port, .. } | Self::Udp { dst_port, .. } => *dst_port,
        }
    }

    /// 프로토콜 이름을 반환합니다.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tcp { .. } => "TCP",
            Self::Udp { .. } => "UDP",
        }
    }
}

/// 패킷 컨텍스트 -- 처리 중인 패킷 하나의 상태
///
/// 원시 바이트 버퍼와 파싱된 레이어 요약, 추출된 필드 환경을 담습니다.
/// 판정이 내려지면 함께 소멸합니다.
#[derive(Debug, Clone)]
pub struct PacketContext {
    raw: Bytes,
    /// 필드 이름 -> 값 환경 (추출 실패는 Null)
    pub fields: HashMap<String, FieldValue>,
    /// Ethernet 레이어 (있을 경우)
    pub ether: Option<EtherInfo>,
    /// IPv4 레이어 (있을 경우)
    pub ipv4: Option<Ipv4Info>,
    /// TCP/UDP 레이어 (있을 경우)
    pub transport: Option<TransportInfo>,
}

impl PacketContext {
    /// 원시 프레임 바이트를 반환합니다.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// 5-tuple 문자열을 반환합니다.
    ///
    /// 형식: `"10.0.0.1:1234 -> 10.0.0.2:80 [TCP]"`.
    /// IPv4 레이어가 없으면 `"Non-IP Packet"`.
    pub fn five_tuple(&self) -> String {
        let Some(ipv4) = &self.ipv4 else {
            return "Non-IP Packet".to_owned();
        };

        let (src_port, dst_port, proto) = match &self.transport {
            Some(t) => (t.src_port(), t.dst_port(), t.name().to_owned()),
            None => (0, 0, ipv4_protocol_name(ipv4.protocol)),
        };

        format!(
            "{}:{} -> {}:{} [{}]",
            ipv4.source, src_port, ipv4.destination, dst_port, proto,
        )
    }

    /// 로그용 프로토콜 이름을 반환합니다 (전송 레이어 우선).
    pub fn protocol_name(&self) -> String {
        match (&self.transport, &self.ipv4) {
            (Some(t), _) => t.name().to_owned(),
            (None, Some(ipv4)) => ipv4_protocol_name(ipv4.protocol),
            (None, None) => String::new(),
        }
    }
}

/// IPv4 프로토콜 번호의 표시 이름
pub fn ipv4_protocol_name(protocol: u8) -> String {
    match protocol {
        1 => "ICMPv4".to_owned(),
        2 => "IGMP".to_owned(),
        6 => "TCP".to_owned(),
        17 => "UDP".to_owned(),
        47 => "GRE".to_owned(),
        50 => "ESP".to_owned(),
        51 => "AH".to_owned(),
        132 => "SCTP".to_owned(),
        other => format!("proto-{other}"),
    }
}

/// 원시 프레임을 파싱하여 패킷 컨텍스트를 만듭니다.
///
/// 빈 입력은 [`EngineError::EmptyPacket`], 형식 오류는
/// [`EngineError::Parse`]로 실패합니다.
pub fn parse_packet(raw: impl Into<Bytes>) -> Result<PacketContext, EngineError> {
    let raw: Bytes = raw.into();
    if raw.is_empty() {
        return Err(EngineError::EmptyPacket);
    }

    // IPv4는 0x4x, IPv6는 0x6x로 시작. 그 외는 Ethernet으로 간주.
    let version = raw[0] >> 4;
    let sliced = if version == 4 || version == 6 {
        SlicedPacket::from_ip(&raw)
    } else {
        SlicedPacket::from_ethernet(&raw)
    }
    .map_err(|e| EngineError::Parse(e.to_string()))?;

    let ether = match &sliced.link {
        Some(LinkSlice::Ethernet2(eth)) => Some(EtherInfo {
            source: eth.source(),
            destination: eth.destination(),
            ether_type: eth.ether_type().0,
        }),
        _ => None,
    };

    let ipv4 = match &sliced.net {
        Some(NetSlice::Ipv4(ip)) => {
            let header = ip.header();
            Some(Ipv4Info {
                source: header.source_addr(),
                destination: header.destination_addr(),
                protocol: header.protocol().0,
                header_len: usize::from(header.ihl()) * 4,
                total_len: header.total_len(),
            })
        }
        _ => None,
    };

    let transport = match &sliced.transport {
        Some(TransportSlice::Tcp(tcp)) => Some(TransportInfo::Tcp {
            src_port: tcp.source_port(),
            dst_port: tcp.destination_port(),
        }),
        Some(TransportSlice::Udp(udp)) => Some(TransportInfo::Udp {
            src_port: udp.source_port(),
            dst_port: udp.destination_port(),
        }),
        _ => None,
    };

    Ok(PacketContext {
        raw,
        fields: HashMap::new(),
        ether,
        ipv4,
        transport,
    })
}

/// Wireshark 스타일 헥스 덤프를 생성합니다.
///
/// 행마다 4자리 16진수 오프셋, 16바이트 (8번째 뒤 추가 공백),
/// ASCII 열 (비인쇄 문자는 `.`)을 출력합니다.
pub fn hex_dump(data: &[u8]) -> String {
    let mut out = String::new();
    for (row_start, row) in data.chunks(16).enumerate().map(|(i, c)| (i * 16, c)) {
        let _ = write!(out, "{row_start:04x}  ");

        for j in 0..16 {
            match row.get(j) {
                Some(b) => {
                    let _ = write!(out, "{b:02x} ");
                }
                None => out.push_str("   "),
            }
            if j == 7 {
                out.push(' ');
            }
        }

        out.push_str("  ");

        for j in 0..16 {
            match row.get(j) {
                Some(&b) if (0x20..=0x7e).contains(&b) => out.push(b as char),
                Some(_) => out.push('.'),
                None => out.push(' '),
            }
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
pub(crate) mod testutil {
    /// Ethernet+IPv4+TCP 테스트 프레임을 만듭니다.
    ///
    /// 페이로드 길이만큼 TCP 세그먼트 뒤에 0x00이 아닌 패턴 바이트를 붙이고
    /// 체크섬을 올바르게 채웁니다.
    pub fn tcp_frame(
        src: [u8; 4],
        dst: [u8; 4],
        src_port: u16,
        dst_port: u16,
        payload: &[u8],
    ) -> Vec<u8> {
        let mut frame = Vec::new();
        // Ethernet: dst MAC, src MAC, ethertype IPv4
        frame.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x02]);
        frame.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
        frame.extend_from_slice(&[0x08, 0x00]);

        let total_len = 20 + 20 + payload.len();
        // IPv4 헤더 (옵션 없음)
        frame.push(0x45);
        frame.push(0x00);
        frame.extend_from_slice(&(total_len as u16).to_be_bytes());
        frame.extend_from_slice(&[0x00, 0x01, 0x00, 0x00]); // id, flags/frag
        frame.push(64); // ttl
        frame.push(6); // TCP
        frame.extend_from_slice(&[0x00, 0x00]); // checksum (아래에서 채움)
        frame.extend_from_slice(&src);
        frame.extend_from_slice(&dst);

        // TCP 헤더 (옵션 없음)
        frame.extend_from_slice(&src_port.to_be_bytes());
        frame.extend_from_slice(&dst_port.to_be_bytes());
        frame.extend_from_slice(&100u32.to_be_bytes()); // seq
        frame.extend_from_slice(&0u32.to_be_bytes()); // ack
        frame.push(0x50); // data offset = 5
        frame.push(0x10); // ACK
        frame.extend_from_slice(&[0x10, 0x00]); // window
        frame.extend_from_slice(&[0x00, 0x00]); // checksum
        frame.extend_from_slice(&[0x00, 0x00]); // urgent
        frame.extend_from_slice(payload);

        crate::checksum::serialize_with_fixups(&frame)
    }

    /// Ethernet+IPv4+UDP 테스트 프레임을 만듭니다.
    pub fn udp_frame(
        src: [u8; 4],
        dst: [u8; 4],
        src_port: u16,
        dst_port: u16,
        payload: &[u8],
    ) -> Vec<u8> {
        let mut frame = Vec::new();
        frame.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x02]);
        frame.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
        frame.extend_from_slice(&[0x08, 0x00]);

        let total_len = 20 + 8 + payload.len();
        frame.push(0x45);
        frame.push(0x00);
        frame.extend_from_slice(&(total_len as u16).to_be_bytes());
        frame.extend_from_slice(&[0x00, 0x01, 0x00, 0x00]);
        frame.push(64);
        frame.push(17); // UDP
        frame.extend_from_slice(&[0x00, 0x00]);
        frame.extend_from_slice(&src);
        frame.extend_from_slice(&dst);

        frame.extend_from_slice(&src_port.to_be_bytes());
        frame.extend_from_slice(&dst_port.to_be_bytes());
        frame.extend_from_slice(&((8 + payload.len()) as u16).to_be_bytes());
        frame.extend_from_slice(&[0x00, 0x00]);
        frame.extend_from_slice(payload);

        crate::checksum::serialize_with_fixups(&frame)
    }
}
