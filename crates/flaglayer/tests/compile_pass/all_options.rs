//! Every field option together.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use flaglayer::{ByteSize, FlagSet, FlagStruct, StructOptions};

#[derive(FlagStruct, Default)]
struct Everything {
    #[flag(name = "listen-port", help = "port to bind", default = "80", min = "1", max = "65535")]
    port: u16,

    #[flag(required)]
    token: String,

    #[flag(deprecated = "use -listen-port")]
    old_port: u16,

    #[flag(choices = "json, text", default = "text")]
    format: String,

    #[flag(sep = "|", default = "a|b")]
    hosts: Vec<String>,

    #[flag(pattern = "^[a-z]+$", default = "abc")]
    zone: String,

    #[flag(layout = "%Y-%m-%d %H:%M:%S%z", default = "2024-01-02 03:04:05+0000")]
    since: DateTime<Utc>,

    #[flag(default = "1m30s")]
    grace: Duration,

    #[flag(default = "1KiB")]
    buffer: ByteSize,

    #[flag]
    tags: HashMap<String, String>,

    #[flag]
    r#type: String,
}

fn main() {
    let mut everything = Everything::default();
    let mut flags = FlagSet::new("all");
    flags.set_output(std::io::sink());
    flags
        .register_struct(
            &mut everything,
            StructOptions::auto()
                .with_args(["-token", "t", "-type", "kind"])
                .with_env(Vec::<(String, String)>::new()),
        )
        .unwrap();

    assert_eq!(everything.port, 80);
    assert_eq!(everything.format, "text");
    assert_eq!(everything.hosts, ["a", "b"]);
    assert_eq!(everything.grace, Duration::from_secs(90));
    assert_eq!(everything.buffer, ByteSize(1024));
    assert_eq!(everything.r#type, "kind");
    assert_eq!(flags.required(), ["token"]);
}
