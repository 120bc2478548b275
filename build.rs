fn main() {
    // The fixture-driven tests enumerate tests/fixtures at compile time, so a
    // new or edited fixture has to trigger a rebuild.
    println!("cargo:rerun-if-changed=tests/fixtures");

    let fixture_dir = std::path::Path::new("tests/fixtures");
    if let Ok(entries) = std::fs::read_dir(fixture_dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("wast") {
                println!("cargo:rerun-if-changed={}", path.display());
            }
        }
    }
}
