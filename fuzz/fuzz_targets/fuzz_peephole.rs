#![no_main]
use libfuzzer_sys::fuzz_target;

use dbt_rs::{PeepholeContext, PeepholeFlags};

fuzz_target!(|data: &[u8]| {
    let Some((&bits, rest)) = data.split_first() else {
        return;
    };
    let mut code = rest.to_vec();
    let protect: Vec<usize> = (0..code.len()).step_by(usize::from(bits % 7) + 3).collect();

    let mut flags = PeepholeFlags::NONE;
    for (i, flag) in [
        PeepholeFlags::REDUNDANT_MOV,
        PeepholeFlags::CONST_FOLD,
        PeepholeFlags::STRENGTH_RED,
        PeepholeFlags::INSN_COMBINE,
        PeepholeFlags::NOP_COMPACT,
    ]
    .into_iter()
    .enumerate()
    {
        if bits & (1 << i) != 0 {
            flags |= flag;
        }
    }

    let stats = PeepholeContext::new(&mut code, flags).protect(&protect).run();
    assert_eq!(code.len(), rest.len());
    assert!(stats.instructions_seen <= code.len());
});
