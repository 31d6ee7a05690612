//! Sensitive fields are masked in the generated `Debug`.

use flaglayer::{FlagSet, FlagStruct, StructOptions};

#[derive(FlagStruct, Default)]
struct Credentials {
    #[flag(default = "admin")]
    user: String,

    #[flag(sensitive, default = "changeme")]
    password: String,
}

fn main() {
    let mut creds = Credentials::default();
    FlagSet::new("sensitive")
        .register_struct(
            &mut creds,
            StructOptions::auto()
                .with_args(Vec::<String>::new())
                .with_env(Vec::<(String, String)>::new()),
        )
        .unwrap();

    let debug = format!("{creds:?}");
    assert!(debug.contains("admin"));
    assert!(!debug.contains("changeme"));
}
