#![no_main]

use libfuzzer_sys::fuzz_target;

use kast::wat::Lexer;

fuzz_target!(|data: &[u8]| {
    let source = String::from_utf8_lossy(data);

    // Drain the lexer up to the first error
    for result in Lexer::new(&source) {
        if result.is_err() {
            break;
        }
    }
});
