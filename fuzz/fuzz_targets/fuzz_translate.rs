#![no_main]
use libfuzzer_sys::fuzz_target;

use dbt_rs::{translate_block, CpuContext, TranslatorConfig};

fuzz_target!(|data: &[u8]| {
    let Some((&knobs, rest)) = data.split_first() else {
        return;
    };
    let words: Vec<u32> = rest
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    let mut ctx = CpuContext::new(0x40_0000);
    ctx.fp_mut().set_fpcr(u32::from(knobs) << 22);
    let config = TranslatorConfig::default()
        .with_avx(knobs & 1 != 0)
        .with_buffer_capacity(if knobs & 2 != 0 { 64 } else { 4096 });

    let Ok(block) = translate_block(&words, 0x40_0000, &ctx, config) else {
        return;
    };
    let len = block.code().len();
    if let Ok(finished) = block.link(|exit| exit.guest_target.or(Some(0x40_0000))) {
        // Peephole never changes the size of linked code.
        assert_eq!(finished.len(), len);
    }
});
