//! Parsing and generation of port addresses.

use serde::{Deserialize, Serialize};

use crate::error::OvnError;

/// A MAC/IP pair as reported by the northbound database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortAddress {
    pub mac: String,
    pub ip: String,
}

/// Gateway address and prefix length of a logical switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gateway {
    pub ip: String,
    pub mask: String,
}

/// What a pod needs to configure its interface, persisted by the caller
/// as pod metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodInterface {
    pub ip_address: String,
    pub mac_address: String,
    pub gateway_ip: String,
    pub default_gateway: bool,
    pub interface: String,
}

/// Parses `"<mac> <ip>"`, optionally wrapped as `["..."]`. An empty value
/// (including the `[]` token) means nothing is assigned yet.
pub fn parse_port_address(raw: &str) -> Result<Option<PortAddress>, OvnError> {
    let trimmed = raw.trim().trim_matches(|c| c == '[' || c == ']' || c == '"').trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let mut fields = trimmed.split_whitespace();
    match (fields.next(), fields.next()) {
        (Some(mac), Some(ip)) => Ok(Some(PortAddress {
            mac: mac.to_string(),
            ip: ip.to_string(),
        })),
        _ => Err(OvnError::MalformedAddress(raw.to_string())),
    }
}

/// Splits `10.1.1.1/24` into address and mask. Surrounding quotes are
/// ignored.
pub fn split_cidr(raw: &str) -> Option<Gateway> {
    let (ip, mask) = raw.trim().trim_matches('"').split_once('/')?;
    if ip.is_empty() || mask.is_empty() {
        return None;
    }
    Some(Gateway {
        ip: ip.to_string(),
        mask: mask.to_string(),
    })
}

/// Random unicast MAC with the locally administered bit set.
pub fn generate_mac() -> String {
    let low: [u8; 3] = rand::random();
    format!("0a:00:00:{:02x}:{:02x}:{:02x}", low[0], low[1], low[2])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wrapped_dynamic_address() {
        let addr = parse_port_address("\"0a:00:00:00:00:06 10.154.142.6\"\n")
            .unwrap()
            .unwrap();
        assert_eq!(addr.mac, "0a:00:00:00:00:06");
        assert_eq!(addr.ip, "10.154.142.6");

        let addr = parse_port_address(r#"["0a:00:00:11:22:33 172.16.33.5"]"#)
            .unwrap()
            .unwrap();
        assert_eq!(addr.ip, "172.16.33.5");
    }

    #[test]
    fn empty_list_token_is_unassigned() {
        assert_eq!(parse_port_address("[]").unwrap(), None);
        assert_eq!(parse_port_address("").unwrap(), None);
    }

    #[test]
    fn single_field_is_malformed() {
        assert!(matches!(
            parse_port_address("\"dynamic\""),
            Err(OvnError::MalformedAddress(_))
        ));
    }

    #[test]
    fn cidr_split() {
        assert_eq!(
            split_cidr("\"10.154.142.1/18\""),
            Some(Gateway {
                ip: "10.154.142.1".into(),
                mask: "18".into()
            })
        );
        assert_eq!(split_cidr("10.154.142.1"), None);
        assert_eq!(split_cidr(""), None);
    }

    #[test]
    fn generated_mac_is_locally_administered() {
        let mac = generate_mac();
        assert!(mac.starts_with("0a:00:00:"));
        assert_eq!(mac.split(':').count(), 6);
    }
}
