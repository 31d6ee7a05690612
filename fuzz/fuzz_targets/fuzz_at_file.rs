#![no_main]

use flaglayer::expand_at_file;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|rest: &str| {
    // Escaped references never touch the filesystem.
    let escaped = format!("@@{rest}");
    assert_eq!(
        expand_at_file(&escaped).expect("escape never fails"),
        Some(format!("@{rest}"))
    );

    // Values without a leading `@` are returned untouched.
    if !rest.starts_with('@') {
        assert_eq!(expand_at_file(rest).expect("plain value never fails"), None);
    }
});
