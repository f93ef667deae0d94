#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Both stat parsers must reject arbitrary input without panicking.
        let _ = centinela::procfs::parse_stat_line(input);
        let _ = centinela::procfs::parse_cpu_line(input);
    }
});
