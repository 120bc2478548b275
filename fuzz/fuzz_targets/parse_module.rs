#![no_main]

use libfuzzer_sys::fuzz_target;

use kast::wat::parse_module;

fuzz_target!(|data: &[u8]| {
    let source = String::from_utf8_lossy(data);

    // Errors are expected; only panics are interesting
    let _ = parse_module(&source);
});
