#![no_main]

use flaglayer::pass::parse_line;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|line: &str| {
    let Some(directive) = parse_line(line) else {
        let trimmed = line.trim();
        assert!(trimmed.is_empty() || trimmed.starts_with('#'));
        return;
    };

    // The name never contains a separator.
    assert!(!directive.name.contains(['=', ' ']));

    // Re-joining the parts reproduces the trimmed line.
    let rejoined = match directive.value {
        Some(value) => format!("{} {value}", directive.name),
        None => directive.name.to_string(),
    };
    assert_eq!(rejoined.len(), line.trim().len());
});
