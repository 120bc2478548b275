#![no_main]

use libfuzzer_sys::fuzz_target;

use kast::wast::parse_file;

fuzz_target!(|data: &[u8]| {
    let source = String::from_utf8_lossy(data);
    let file = parse_file(&source);

    // Every directive must target a module that exists
    for (module, _) in file.directives() {
        assert!(module < file.modules.len());
    }
});
