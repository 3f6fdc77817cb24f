//! 조건식 평가기 퍼징 -- 임의 조건 문자열이 패닉 없이 처리되는지 확인

#![no_main]

use libfuzzer_sys::fuzz_target;

use netvine_core::types::{Field, FieldKind};
use netvine_packet_engine::{evaluate_condition, parse_packet};

fuzz_target!(|condition: &str| {
    // 최소 IPv4+UDP 프레임 (L3에서 시작)
    let frame: Vec<u8> = vec![
        0x45, 0x00, 0x00, 0x1c, 0x00, 0x01, 0x00, 0x00, 0x40, 0x11, 0x00, 0x00, // IPv4
        10, 0, 0, 1, 10, 0, 0, 2, // src/dst
        0x04, 0xd2, 0x00, 0x35, 0x00, 0x08, 0x00, 0x00, // UDP
    ];
    let Ok(mut ctx) = parse_packet(frame) else {
        return;
    };

    let fields = vec![
        Field {
            id: 1,
            name: "ver".to_owned(),
            offset: 0,
            length: 1,
            kind: FieldKind::Hex,
        },
        Field {
            id: 2,
            name: "ttl".to_owned(),
            offset: 8,
            length: 1,
            kind: FieldKind::Decimal,
        },
    ];
    netvine_packet_engine::field::extract_all(&mut ctx, &fields);

    // 평가는 실패할 수 있지만 패닉해서는 안 됨
    let _ = evaluate_condition(condition, &ctx, &fields);
});
