//! 패킷 파서 퍼징 -- 임의 바이트 입력이 패닉 없이 처리되는지 확인

#![no_main]

use libfuzzer_sys::fuzz_target;

use netvine_packet_engine::{hex_dump, parse_packet, serialize_with_fixups};

fuzz_target!(|data: &[u8]| {
    // 파싱은 실패할 수 있지만 패닉해서는 안 됨
    if let Ok(ctx) = parse_packet(data.to_vec()) {
        let _ = ctx.five_tuple();
        let _ = ctx.protocol_name();
    }

    // 체크섬 보정과 헥스 덤프는 모든 입력을 받아들임
    let _ = serialize_with_fixups(data);
    let _ = hex_dump(data);
});
