use crate::models::{ProbeDescriptor, Purpose};

pub struct HeaderFanout;

impl HeaderFanout {
    pub const AUTH_BYPASS: &'static [(&'static str, &'static str)] = &[
        ("X-Original-URL", "/"),
        ("X-Rewrite-URL", "/"),
        ("X-Custom-IP-Authorization", "127.0.0.1"),
        ("X-Forwarded-For", "127.0.0.1"),
        ("X-Forwarded-Host", "localhost"),
        ("X-Host", "localhost"),
        ("X-Remote-IP", "127.0.0.1"),
        ("X-Remote-Addr", "127.0.0.1"),
        ("X-Originating-IP", "127.0.0.1"),
        ("X-Client-IP", "127.0.0.1"),
        ("X-Real-IP", "127.0.0.1"),
        ("True-Client-IP", "127.0.0.1"),
        ("Cluster-Client-IP", "127.0.0.1"),
        ("X-ProxyUser-Ip", "127.0.0.1"),
        ("X-Original-Remote-Addr", "127.0.0.1"),
    ];

    pub const METHOD_OVERRIDE: &'static [&'static str] =
        &["X-HTTP-Method-Override", "X-HTTP-Method", "X-Method-Override"];

    pub const UNKEYED: &'static [&'static str] = &[
        "X-Forwarded-Host",
        "X-Forwarded-Proto",
        "X-Original-URL",
        "X-Host",
        "X-Forwarded-Server",
    ];

    pub const WEBSOCKET_UPGRADE: &'static [(&'static str, &'static str)] = &[
        ("Upgrade", "websocket"),
        ("Connection", "Upgrade"),
        ("Sec-WebSocket-Key", "dGhlIHNhbXBsZSBub25jZQ=="),
        ("Sec-WebSocket-Version", "13"),
    ];

    pub fn fan_out(url: &str, table: &[(&str, &str)]) -> Vec<ProbeDescriptor> {
        table
            .iter()
            .map(|(name, value)| {
                ProbeDescriptor::get(url, Purpose::HeaderBypass)
                    .with_header(*name, *value)
                    .with_label(format!("header:{}", name))
            })
            .collect()
    }
}
