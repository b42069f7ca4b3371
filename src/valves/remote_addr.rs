//! Remote address access control.
//!
//! Allows or denies requests based on the client address. Rules are single
//! addresses or CIDR blocks, for both IPv4 and IPv6.
//!
//! # Design Decisions
//! - Deny rules are checked first and always win
//! - With no allow rules, anything not denied passes
//! - A request without a remote address is denied

use std::net::IpAddr;

use crate::error::{Error, Result};
use crate::http::{status, Request, Response};
use crate::pipeline::{Next, Valve};
use crate::registry::Params;

/// A network block in CIDR form. A bare address is a full-length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddrRule {
    network: IpAddr,
    prefix: u8,
}

impl AddrRule {
    pub fn parse(rule: &str) -> Option<Self> {
        let rule = rule.trim();
        let (addr, prefix) = match rule.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix.parse::<u8>().ok()?)),
            None => (rule, None),
        };
        let network: IpAddr = addr.parse().ok()?;
        let max = match network {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        let prefix = prefix.unwrap_or(max);
        if prefix > max {
            return None;
        }
        Some(Self { network, prefix })
    }

    pub fn contains(&self, addr: IpAddr) -> bool {
        match (self.network, addr) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = u32::MAX.checked_shl(32 - u32::from(self.prefix)).unwrap_or(0);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = u128::MAX.checked_shl(128 - u32::from(self.prefix)).unwrap_or(0);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemoteAddrValve {
    allow: Vec<AddrRule>,
    deny: Vec<AddrRule>,
    deny_status: u16,
}

impl Default for RemoteAddrValve {
    fn default() -> Self {
        Self {
            allow: Vec::new(),
            deny: Vec::new(),
            deny_status: status::FORBIDDEN,
        }
    }
}

impl RemoteAddrValve {
    pub const ID: &'static str = "remote-addr";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(mut self, rule: AddrRule) -> Self {
        self.allow.push(rule);
        self
    }

    pub fn deny(mut self, rule: AddrRule) -> Self {
        self.deny.push(rule);
        self
    }

    pub fn deny_status(mut self, status: u16) -> Self {
        self.deny_status = status;
        self
    }

    /// Parameters: `allow` and `deny` (comma-separated rules) and
    /// `deny_status` (defaults to 403).
    pub fn from_params(params: &Params) -> Result<Self> {
        super::reject_unknown(Self::ID, params, &["allow", "deny", "deny_status"])?;

        let mut valve = Self::new();
        if let Some(list) = params.get("allow") {
            valve.allow = parse_rules("allow", list)?;
        }
        if let Some(list) = params.get("deny") {
            valve.deny = parse_rules("deny", list)?;
        }
        if let Some(value) = params.get("deny_status") {
            valve.deny_status = match value.parse::<u16>() {
                Ok(code) if (400..600).contains(&code) => code,
                _ => return Err(invalid("deny_status", format!("'{value}' is not an error status"))),
            };
        }
        Ok(valve)
    }

    pub fn is_allowed(&self, addr: Option<IpAddr>) -> bool {
        let Some(addr) = addr else {
            return false;
        };
        if self.deny.iter().any(|rule| rule.contains(addr)) {
            return false;
        }
        self.allow.is_empty() || self.allow.iter().any(|rule| rule.contains(addr))
    }
}

fn invalid(param: &str, reason: String) -> Error {
    Error::InvalidParameter {
        id: RemoteAddrValve::ID.to_string(),
        param: param.to_string(),
        reason,
    }
}

fn parse_rules(param: &str, list: &str) -> Result<Vec<AddrRule>> {
    list.split(',')
        .map(str::trim)
        .filter(|rule| !rule.is_empty())
        .map(|rule| AddrRule::parse(rule).ok_or_else(|| invalid(param, format!("'{rule}' is not an address or CIDR block"))))
        .collect()
}

impl Valve for RemoteAddrValve {
    fn name(&self) -> &str {
        "RemoteAddrValve"
    }

    fn invoke(&self, request: &mut Request, response: &mut Response, next: Next<'_>) -> Result<()> {
        if self.is_allowed(request.remote_addr()) {
            return next.invoke(request, response);
        }
        tracing::debug!(
            request_id = %request.id(),
            remote_addr = ?request.remote_addr(),
            status = self.deny_status,
            "Request denied by address filter"
        );
        response.send_error(self.deny_status, "Access denied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> Option<IpAddr> {
        Some(s.parse().unwrap())
    }

    #[test]
    fn test_rule_parsing() {
        assert!(AddrRule::parse("10.0.0.0/8").is_some());
        assert!(AddrRule::parse("127.0.0.1").is_some());
        assert!(AddrRule::parse("fe80::/10").is_some());
        assert!(AddrRule::parse("10.0.0.0/33").is_none());
        assert!(AddrRule::parse("localhost").is_none());
    }

    #[test]
    fn test_cidr_contains() {
        let rule = AddrRule::parse("192.168.0.0/16").unwrap();
        assert!(rule.contains("192.168.4.20".parse().unwrap()));
        assert!(!rule.contains("192.169.0.1".parse().unwrap()));
        assert!(!rule.contains("::1".parse().unwrap()));

        let any = AddrRule::parse("0.0.0.0/0").unwrap();
        assert!(any.contains("8.8.8.8".parse().unwrap()));

        let v6 = AddrRule::parse("fe80::/10").unwrap();
        assert!(v6.contains("fe80::1".parse().unwrap()));
        assert!(!v6.contains("2001:db8::1".parse().unwrap()));
    }

    #[test]
    fn test_deny_wins() {
        let valve = RemoteAddrValve::new()
            .allow(AddrRule::parse("10.0.0.0/8").unwrap())
            .deny(AddrRule::parse("10.0.0.13").unwrap());

        assert!(valve.is_allowed(ip("10.1.2.3")));
        assert!(!valve.is_allowed(ip("10.0.0.13")));
        assert!(!valve.is_allowed(ip("172.16.0.1")));
        assert!(!valve.is_allowed(None));
    }

    #[test]
    fn test_deny_only() {
        let valve = RemoteAddrValve::new().deny(AddrRule::parse("203.0.113.0/24").unwrap());
        assert!(valve.is_allowed(ip("198.51.100.1")));
        assert!(!valve.is_allowed(ip("203.0.113.7")));
    }

    #[test]
    fn test_from_params() {
        let mut params = Params::new();
        params.insert("allow".into(), "127.0.0.1, ::1".into());
        params.insert("deny_status".into(), "404".into());
        let valve = RemoteAddrValve::from_params(&params).unwrap();
        assert!(valve.is_allowed(ip("::1")));
        assert_eq!(valve.deny_status, 404);

        params.insert("allow".into(), "not-an-ip".into());
        assert!(matches!(
            RemoteAddrValve::from_params(&params),
            Err(Error::InvalidParameter { .. })
        ));
    }
}
