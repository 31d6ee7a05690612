//! Nested structs with and without a prefix.

use flaglayer::{FlagSet, FlagStruct, StructOptions};

#[derive(FlagStruct, Default)]
struct Tls {
    #[flag(default = "false")]
    enabled: bool,
}

#[derive(FlagStruct, Default)]
struct Limits {
    #[flag(default = "100")]
    max_conns: i32,
}

#[derive(FlagStruct, Default)]
struct Config {
    #[flag(nested, prefix = "tls")]
    tls: Tls,

    #[flag(nested)]
    limits: Limits,
}

fn main() {
    let mut config = Config::default();
    let mut flags = FlagSet::new("nested");
    flags
        .register_struct(
            &mut config,
            StructOptions::auto()
                .with_args(["-tls.enabled", "-max-conns", "5"])
                .with_env(Vec::<(String, String)>::new()),
        )
        .unwrap();

    assert!(config.tls.enabled);
    assert_eq!(config.limits.max_conns, 5);
}
