#![no_main]

use arbitrary::Arbitrary;
use flaglayer::{ErrorHandling, FlagSet};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    args: Vec<String>,
    env: Vec<(String, String)>,
}

fuzz_target!(|input: FuzzInput| {
    let mut flags = FlagSet::new("fuzz").with_error_handling(ErrorHandling::ContinueOnError);
    flags.set_output(std::io::sink());
    let _ = flags.int("port", 8080, "");
    let _ = flags.bool("debug", false, "");
    let _ = flags.string("name", String::new(), "");
    let _ = flags.string_slice("tags", ",", Vec::new(), "");
    let _ = flags.mark_sensitive("name");

    // Any input either resolves or returns an error; it never panics.
    let env: Vec<(String, String)> = input
        .env
        .into_iter()
        .filter(|(key, value)| !key.contains(['=', '\0']) && !value.contains('\0'))
        .collect();
    if flags.parse_with_env(input.args, env).is_ok() {
        let report = flags.introspect();
        assert_eq!(report.len(), 4);
        assert!(flags.n_arg() <= flags.args().len());
    }
});
