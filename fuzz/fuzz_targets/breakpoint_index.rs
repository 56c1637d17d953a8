#![no_main]

use libfuzzer_sys::fuzz_target;
use steptrace_engine::BreakpointIndex;

fn unit_name(seed: u8) -> &'static str {
    match seed % 4 {
        0 => "a.src",
        1 => "B.src",
        2 => "b.src",
        _ => "long/path/to/unit.src",
    }
}

fuzz_target!(|data: &[u8]| {
    let fold_case = data.first().is_some_and(|byte| byte & 1 == 1);
    let mut index = BreakpointIndex::new(fold_case);
    let mut ids = Vec::new();

    for chunk in data.chunks_exact(4) {
        let unit = unit_name(chunk[1]);
        let entry_line = u32::from(chunk[2] % 8);
        let line = u32::from(chunk[3]);
        match chunk[0] % 6 {
            0 => ids.push(index.set_break(unit, entry_line, line)),
            1 => {
                if let Some(id) = ids.pop() {
                    let _ = index.clear_breakpoint(id);
                }
            }
            2 => {
                let _ = index.resolve_line(unit, entry_line, line);
            }
            3 => {
                let _ = index.unit_has_breakpoints(unit, entry_line);
            }
            4 => {
                let _ = index.breakpoints_at(unit, entry_line, line);
            }
            _ => {
                if let Some(id) = ids.last() {
                    let _ = index.set_enabled(*id, chunk[1] & 1 == 1);
                }
            }
        }
    }

    // Draining everything must always leave an empty, still-usable index.
    index.clear_all_breaks();
    assert!(!index.any_breakpoints());
    assert!(index.resolve_line("a.src", 0, 0).is_none());
});
