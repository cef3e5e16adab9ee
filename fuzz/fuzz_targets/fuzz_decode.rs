#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    for (i, chunk) in data.chunks_exact(4).enumerate() {
        let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        let pc = 0x40_0000 + 4 * i as u64;

        let insn = dbt_rs::decode(word);
        assert_eq!(dbt_rs::try_decode(word, pc).is_ok(), insn.is_known());
        if dbt_rs::compute_branch_target(word, pc).is_some() {
            assert_eq!(insn.class(), dbt_rs::InstrClass::Branch);
        }
    }
});
