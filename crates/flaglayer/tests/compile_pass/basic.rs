//! Plain fields with defaults and a field that is not a flag.

use flaglayer::{FlagSet, FlagStruct, StructOptions};

#[derive(FlagStruct, Default)]
struct Config {
    /// Listen port
    #[flag(default = "8080")]
    port: u16,

    #[flag(name = "verbose")]
    debug: bool,

    scratch: Vec<u8>,
}

fn main() {
    let mut config = Config::default();
    let mut flags = FlagSet::new("basic");
    flags
        .register_struct(
            &mut config,
            StructOptions::auto()
                .with_args(["-verbose"])
                .with_env(Vec::<(String, String)>::new()),
        )
        .unwrap();

    assert_eq!(config.port, 8080);
    assert!(config.debug);
    assert!(config.scratch.is_empty());
    assert_eq!(flags.lookup("port").unwrap().usage(), "Listen port");
}
