//! The endpoint model (C1): parses raw config target entries into
//! [`Endpoint`] records and derives each one's `applicable_checks`.
//!
//! This mirrors the reference monitor's `records.rs` in spirit (a closed
//! enum with a `Display` impl and a pure classification method), but the
//! polymorphism here is over the *shape of a target* rather than over a
//! result's flags: the four endpoint kinds differ only in which checks
//! apply to them, so a tagged sum type with a pure derivation function is
//! the natural fit, exactly as spec's design notes call for.

use std::fmt::{self, Display};
use std::net::IpAddr;

use serde::Deserialize;

use crate::errors::ConfigError;
use crate::model::CheckKind;

/// Transport protocol for a bare `ip:port` target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortProtocol {
    Tcp,
    Udp,
}

impl Display for PortProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        })
    }
}

/// Restricts which IP family a Dns/Icmp check may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpVersionPref {
    Any,
    V4,
    V6,
}

/// HTTP vs HTTPS scheme of an [`Endpoint::Http`] target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpScheme {
    Http,
    Https,
}

impl HttpScheme {
    /// The TCP port this scheme implies absent an explicit port in the url.
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }
}

/// The variant-specific payload of an [`Endpoint`].
#[derive(Debug, Clone, PartialEq)]
pub enum EndpointKind {
    /// A bare IP literal; only ICMP applies.
    Ip { addr: IpAddr },
    /// An `ip:port` or `[ipv6]:port` literal with an explicit transport.
    IpPort { addr: IpAddr, port: u16, protocol: PortProtocol },
    /// A DNS hostname with no scheme; probed on both well-known TCP ports.
    Domain { host: String },
    /// An `http://` or `https://` url.
    Http { host: String, port: u16, scheme: HttpScheme, path: String },
}

/// An immutable, parsed monitoring target.
///
/// `id` is derived from the normalized url so it is stable across restarts
/// even if `label` is customized, since the Timeline Store keys its ring
/// buffers by `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub id: String,
    pub label: String,
    pub kind: EndpointKind,
    pub ip_version_pref: IpVersionPref,
    pub applicable_checks: Vec<CheckKind>,
    pub primary_check_override: Option<CheckKind>,
}

impl Endpoint {
    /// Builds an endpoint from a parsed kind, deriving `applicable_checks`
    /// per the exhaustive table in the data model (Ip/IpPort/Domain/Http).
    fn new(
        raw: &str,
        label: Option<String>,
        kind: EndpointKind,
        ip_version_pref: IpVersionPref,
        primary_check_type: Option<&str>,
        index: usize,
    ) -> Result<Self, ConfigError> {
        let applicable_checks = applicable_checks_for(&kind);
        let id = normalize_id(&kind);
        let label = label.unwrap_or_else(|| raw.to_string());

        let primary_check_override = match primary_check_type {
            None => None,
            Some(raw_kind) => {
                let parsed = parse_check_kind(raw_kind).ok_or_else(|| ConfigError::UnknownProtocol {
                    index,
                    raw: raw.to_string(),
                    protocol: raw_kind.to_string(),
                })?;
                if !applicable_checks.contains(&parsed) {
                    return Err(ConfigError::IncompatiblePrimaryCheck {
                        index,
                        raw: raw.to_string(),
                        check: raw_kind.to_string(),
                        applicable: applicable_checks.iter().map(|c| c.short_name().to_string()).collect(),
                    });
                }
                Some(parsed)
            }
        };

        Ok(Self {
            id,
            label,
            kind,
            ip_version_pref,
            applicable_checks,
            primary_check_override,
        })
    }
}

fn parse_check_kind(s: &str) -> Option<CheckKind> {
    match s.to_ascii_lowercase().as_str() {
        "dns" => Some(CheckKind::Dns),
        "icmp" => Some(CheckKind::Icmp),
        "tcp" => Some(CheckKind::Tcp),
        "udp" => Some(CheckKind::Udp),
        "http" => Some(CheckKind::Http),
        _ => None,
    }
}

/// Applicable-check derivation, exhaustive per the data model table.
fn applicable_checks_for(kind: &EndpointKind) -> Vec<CheckKind> {
    match kind {
        EndpointKind::Ip { .. } => vec![CheckKind::Icmp],
        EndpointKind::IpPort { protocol: PortProtocol::Tcp, .. } => vec![CheckKind::Icmp, CheckKind::Tcp],
        EndpointKind::IpPort { protocol: PortProtocol::Udp, .. } => vec![CheckKind::Icmp, CheckKind::Udp],
        EndpointKind::Domain { .. } => vec![CheckKind::Dns, CheckKind::Icmp, CheckKind::Tcp],
        EndpointKind::Http { .. } => vec![CheckKind::Dns, CheckKind::Icmp, CheckKind::Tcp, CheckKind::Http],
    }
}

fn normalize_id(kind: &EndpointKind) -> String {
    match kind {
        EndpointKind::Ip { addr } => addr.to_string(),
        EndpointKind::IpPort { addr, port, protocol } => format!("{protocol}://{addr}:{port}"),
        EndpointKind::Domain { host } => host.clone(),
        EndpointKind::Http { host, port, scheme, path } => {
            let scheme_str = match scheme {
                HttpScheme::Http => "http",
                HttpScheme::Https => "https",
            };
            format!("{scheme_str}://{host}:{port}{path}")
        }
    }
}

/// Raw, still-unvalidated config entry for one target: either a bare string
/// or the structured object form from spec §6.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawTarget {
    Bare(String),
    Structured {
        url: String,
        name: Option<String>,
        protocol: Option<String>,
        ip_version: Option<u8>,
        primary_check_type: Option<String>,
    },
}

/// Parses every raw target entry into an [`Endpoint`], in order.
///
/// Entry `index` (0-based) is threaded through every error so the CLI can
/// point at the exact offending line in `targets = [...]`.
pub fn parse_targets(raw_targets: &[RawTarget]) -> Result<Vec<Endpoint>, ConfigError> {
    if raw_targets.is_empty() {
        return Err(ConfigError::EmptyTargetList);
    }

    raw_targets
        .iter()
        .enumerate()
        .map(|(index, raw)| parse_one(raw, index))
        .collect()
}

fn parse_one(raw: &RawTarget, index: usize) -> Result<Endpoint, ConfigError> {
    let (url, name, protocol, ip_version, primary_check_type) = match raw {
        RawTarget::Bare(url) => (url.as_str(), None, None, None, None),
        RawTarget::Structured { url, name, protocol, ip_version, primary_check_type } => (
            url.as_str(),
            name.clone(),
            protocol.as_deref(),
            *ip_version,
            primary_check_type.as_deref(),
        ),
    };

    let ip_version_pref = match ip_version {
        None => IpVersionPref::Any,
        Some(4) => IpVersionPref::V4,
        Some(6) => IpVersionPref::V6,
        Some(other) => {
            return Err(ConfigError::MalformedTarget {
                index,
                raw: url.to_string(),
                reason: format!("ip_version must be 4 or 6, got {other}"),
            })
        }
    };

    let kind = classify(url, protocol, index)?;
    Endpoint::new(url, name, kind, ip_version_pref, primary_check_type, index)
}

/// Classifies a raw url string into an [`EndpointKind`], per the parsing
/// rules in spec §4.1: scheme prefix, then bracketed/plain `ip:port`, then
/// bare IP literal, else a DNS hostname.
fn classify(url: &str, protocol: Option<&str>, index: usize) -> Result<EndpointKind, ConfigError> {
    if let Some(rest) = url.strip_prefix("https://") {
        return parse_http(rest, HttpScheme::Https, url, index);
    }
    if let Some(rest) = url.strip_prefix("http://") {
        return parse_http(rest, HttpScheme::Http, url, index);
    }

    if let Some((addr, port)) = split_ip_port(url) {
        let port: u16 = port.parse().map_err(|_| ConfigError::MalformedTarget {
            index,
            raw: url.to_string(),
            reason: format!("'{port}' is not a valid port number"),
        })?;
        let addr: IpAddr = addr.parse().map_err(|_| ConfigError::MalformedTarget {
            index,
            raw: url.to_string(),
            reason: format!("'{addr}' is not a valid IP literal"),
        })?;
        let protocol = match protocol {
            None | Some("tcp") => PortProtocol::Tcp,
            Some("udp") => PortProtocol::Udp,
            Some(other) => {
                return Err(ConfigError::UnknownProtocol {
                    index,
                    raw: url.to_string(),
                    protocol: other.to_string(),
                })
            }
        };
        return Ok(EndpointKind::IpPort { addr, port, protocol });
    }

    if let Ok(addr) = url.parse::<IpAddr>() {
        return Ok(EndpointKind::Ip { addr });
    }

    if url.is_empty() || url.contains(char::is_whitespace) {
        return Err(ConfigError::MalformedTarget {
            index,
            raw: url.to_string(),
            reason: "not a valid hostname".to_string(),
        });
    }

    Ok(EndpointKind::Domain { host: url.to_string() })
}

fn parse_http(rest: &str, scheme: HttpScheme, original: &str, index: usize) -> Result<EndpointKind, ConfigError> {
    let (authority, path) = rest.split_once('/').map(|(a, p)| (a, format!("/{p}"))).unwrap_or((rest, "/".to_string()));

    if authority.is_empty() {
        return Err(ConfigError::MalformedTarget {
            index,
            raw: original.to_string(),
            reason: "missing host".to_string(),
        });
    }

    let (host, port) = match authority.split_once(':') {
        Some((h, p)) => {
            let port: u16 = p.parse().map_err(|_| ConfigError::MalformedTarget {
                index,
                raw: original.to_string(),
                reason: format!("'{p}' is not a valid port number"),
            })?;
            (h.to_string(), port)
        }
        None => (authority.to_string(), scheme.default_port()),
    };

    Ok(EndpointKind::Http { host, port, scheme, path })
}

/// Splits a `host:port` or `[v6host]:port` literal. Returns `None` if there
/// is no trailing `:port`, so bare IPv6 literals like `::1` fall through to
/// the plain-IP branch untouched.
fn split_ip_port(url: &str) -> Option<(&str, &str)> {
    if let Some(rest) = url.strip_prefix('[') {
        let (host, rest) = rest.split_once(']')?;
        let port = rest.strip_prefix(':')?;
        return Some((host, port));
    }
    // A bare IPv4:port has exactly one colon; a bare IPv6 literal has more
    // than one, so reject ambiguous cases rather than guess.
    let mut parts = url.rsplitn(2, ':');
    let port = parts.next()?;
    let host = parts.next()?;
    if host.contains(':') {
        return None;
    }
    if port.chars().all(|c| c.is_ascii_digit()) && !port.is_empty() {
        Some((host, port))
    } else {
        None
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare(s: &str) -> RawTarget {
        RawTarget::Bare(s.to_string())
    }

    #[test]
    fn plain_ip_gets_icmp_only() {
        let eps = parse_targets(&[bare("8.8.8.8")]).unwrap();
        assert_eq!(eps[0].applicable_checks, vec![CheckKind::Icmp]);
        assert!(matches!(eps[0].kind, EndpointKind::Ip { .. }));
    }

    #[test]
    fn ip_port_udp_gets_icmp_and_udp() {
        let eps = parse_targets(&[RawTarget::Structured {
            url: "1.1.1.1:53".to_string(),
            name: None,
            protocol: Some("udp".to_string()),
            ip_version: None,
            primary_check_type: None,
        }])
        .unwrap();
        assert_eq!(eps[0].applicable_checks, vec![CheckKind::Icmp, CheckKind::Udp]);
    }

    #[test]
    fn domain_gets_dns_icmp_tcp() {
        let eps = parse_targets(&[bare("example.com")]).unwrap();
        assert_eq!(eps[0].applicable_checks, vec![CheckKind::Dns, CheckKind::Icmp, CheckKind::Tcp]);
    }

    #[test]
    fn https_url_gets_dns_icmp_tcp_http_and_defaults_to_port_443() {
        let eps = parse_targets(&[bare("https://example.com/health")]).unwrap();
        match &eps[0].kind {
            EndpointKind::Http { port, scheme, .. } => {
                assert_eq!(*port, 443);
                assert_eq!(*scheme, HttpScheme::Https);
            }
            other => panic!("expected Http, got {other:?}"),
        }
        assert_eq!(
            eps[0].applicable_checks,
            vec![CheckKind::Dns, CheckKind::Icmp, CheckKind::Tcp, CheckKind::Http]
        );
    }

    #[test]
    fn empty_target_list_is_a_config_error() {
        let err = parse_targets(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyTargetList));
    }

    #[test]
    fn incompatible_primary_check_type_is_rejected() {
        let err = parse_targets(&[RawTarget::Structured {
            url: "example.com".to_string(),
            name: None,
            protocol: None,
            ip_version: None,
            primary_check_type: Some("udp".to_string()),
        }])
        .unwrap_err();
        assert!(matches!(err, ConfigError::IncompatiblePrimaryCheck { .. }));
    }

    #[test]
    fn bracketed_ipv6_port_parses_as_ip_port() {
        let eps = parse_targets(&[bare("[2606:4700:4700::1111]:853")]).unwrap();
        match &eps[0].kind {
            EndpointKind::IpPort { port, protocol, .. } => {
                assert_eq!(*port, 853);
                assert_eq!(*protocol, PortProtocol::Tcp);
            }
            other => panic!("expected IpPort, got {other:?}"),
        }
    }

    #[test]
    fn bare_ipv6_literal_without_port_is_ip() {
        let eps = parse_targets(&[bare("2606:4700:4700::1111")]).unwrap();
        assert!(matches!(eps[0].kind, EndpointKind::Ip { .. }));
    }
}
