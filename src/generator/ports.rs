use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::models::Severity;

pub const MAX_PORTS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PortPreset {
    Common,
    Web,
    Top100,
}

impl PortPreset {
    pub fn ports(self) -> &'static [u16] {
        match self {
            PortPreset::Common => COMMON_PORTS,
            PortPreset::Web => WEB_PORTS,
            PortPreset::Top100 => TOP100_PORTS,
        }
    }
}

const COMMON_PORTS: &[u16] = &[
    21, 22, 23, 25, 53, 80, 110, 111, 135, 139, 143, 443, 445, 993, 995, 1723, 3306, 3389, 5432, 8080,
];

const WEB_PORTS: &[u16] = &[80, 443, 8080, 8443, 8000, 8888, 9000, 9090, 9443, 3000, 5000];

const TOP100_PORTS: &[u16] = &[
    7, 9, 13, 21, 22, 23, 25, 26, 37, 53, 79, 80, 81, 88, 106, 110, 111, 113, 119, 135,
    139, 143, 144, 179, 199, 389, 427, 443, 444, 445, 465, 513, 514, 515, 543, 544, 548,
    554, 587, 631, 646, 873, 990, 993, 995, 1025, 1026, 1027, 1028, 1029, 1110, 1433, 1720,
    1723, 1755, 1900, 2000, 2001, 2049, 2121, 2717, 3000, 3128, 3306, 3389, 3986, 4899, 5000,
    5009, 5051, 5060, 5101, 5190, 5357, 5432, 5631, 5666, 5800, 5900, 6000, 6001, 6646, 7070,
    8000, 8008, 8009, 8080, 8081, 8443, 8888, 9100, 9999, 10000, 32768, 49152, 49153, 49154,
];

const SERVICES: &[(u16, &str)] = &[
    (21, "FTP"),
    (22, "SSH"),
    (23, "Telnet"),
    (25, "SMTP"),
    (53, "DNS"),
    (80, "HTTP"),
    (110, "POP3"),
    (111, "RPC"),
    (135, "MSRPC"),
    (139, "NetBIOS"),
    (143, "IMAP"),
    (443, "HTTPS"),
    (445, "SMB"),
    (993, "IMAPS"),
    (995, "POP3S"),
    (1433, "MSSQL"),
    (1521, "Oracle"),
    (3306, "MySQL"),
    (3389, "RDP"),
    (5432, "PostgreSQL"),
    (5900, "VNC"),
    (6379, "Redis"),
    (8080, "HTTP-Proxy"),
    (8443, "HTTPS-Alt"),
    (27017, "MongoDB"),
];

pub fn service_name(port: u16) -> &'static str {
    SERVICES
        .iter()
        .find(|(p, _)| *p == port)
        .map(|(_, name)| *name)
        .unwrap_or("Unknown")
}

pub fn port_severity(port: u16) -> Severity {
    match port {
        21 | 22 | 23 | 3389 | 5900 | 6379 | 27017 => Severity::High,
        1433 | 1521 | 3306 | 5432 => Severity::Medium,
        80 | 443 | 8080 | 8443 => Severity::Info,
        _ => Severity::Low,
    }
}

pub fn parse_port_spec(spec: &str) -> Vec<u16> {
    let mut seen = HashSet::new();
    let mut ports = Vec::new();

    for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let contribution: Vec<u16> = match part.split_once('-') {
            Some((start, end)) => match (start.trim().parse::<u32>(), end.trim().parse::<u32>()) {
                (Ok(start), Ok(end)) => (start.max(1)..=end.min(65535))
                    .filter_map(|p| u16::try_from(p).ok())
                    .collect(),
                _ => Vec::new(),
            },
            None => match part.parse::<u32>() {
                Ok(p) if (1..=65535).contains(&p) => vec![p as u16],
                _ => Vec::new(),
            },
        };

        for port in contribution {
            if ports.len() == MAX_PORTS {
                return ports;
            }
            if seen.insert(port) {
                ports.push(port);
            }
        }
    }

    ports
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_spec() {
        assert_eq!(parse_port_spec("80, 443,8000-8002,80"), vec![80, 443, 8000, 8001, 8002]);
    }

    #[test]
    fn test_reversed_range_is_empty() {
        assert_eq!(parse_port_spec("100-90"), Vec::<u16>::new());
        assert_eq!(parse_port_spec("100-90,22"), vec![22]);
    }

    #[test]
    fn test_invalid_entries_skipped() {
        assert_eq!(parse_port_spec("0,70000,abc,22,a-b"), vec![22]);
        assert_eq!(parse_port_spec("65530-70000").len(), 6);
    }

    #[test]
    fn test_capped_at_1000() {
        let ports = parse_port_spec("1-5000");
        assert_eq!(ports.len(), MAX_PORTS);
        assert_eq!(ports[0], 1);
        assert_eq!(ports[999], 1000);
    }

    #[test]
    fn test_severity_and_service_tables() {
        assert_eq!(port_severity(22), Severity::High);
        assert_eq!(port_severity(3306), Severity::Medium);
        assert_eq!(port_severity(80), Severity::Info);
        assert_eq!(port_severity(9999), Severity::Low);
        assert_eq!(service_name(6379), "Redis");
        assert_eq!(service_name(9999), "Unknown");
    }

    #[test]
    fn test_presets() {
        assert_eq!(PortPreset::Common.ports().len(), 20);
        assert_eq!(PortPreset::Web.ports().len(), 11);
        let top = PortPreset::Top100.ports();
        assert_eq!(top.iter().collect::<HashSet<_>>().len(), top.len());
        assert!(top.contains(&3389));
    }
}
