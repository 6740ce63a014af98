/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::net::{IpAddr, Ipv6Addr};
use std::str::FromStr;

use crate::error::FtpConnectError;

pub const FTP_DEFAULT_CONTROL_PORT: u16 = 21;

#[derive(Debug, Clone, PartialEq, Eq)]
enum FtpHost {
    Ip(IpAddr),
    Domain(String),
}

/// The control connection target, parsed from `host`, `host:port`,
/// `[ipv6]:port` or a bare ipv6 address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpServerAddr {
    host: FtpHost,
    port: u16,
}

impl FtpServerAddr {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        FtpServerAddr {
            host: FtpHost::Ip(ip),
            port,
        }
    }

    #[inline]
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn host(&self) -> String {
        match &self.host {
            FtpHost::Ip(ip) => ip.to_string(),
            FtpHost::Domain(domain) => domain.clone(),
        }
    }

    pub fn ip(&self) -> Option<IpAddr> {
        match &self.host {
            FtpHost::Ip(ip) => Some(*ip),
            FtpHost::Domain(_) => None,
        }
    }

    fn parse_port(s: &str, port: &str) -> Result<u16, FtpConnectError> {
        match u16::from_str(port) {
            Ok(0) | Err(_) => Err(FtpConnectError::InvalidServerAddr(s.to_string())),
            Ok(port) => Ok(port),
        }
    }

    fn parse_host(s: &str, host: &str) -> Result<FtpHost, FtpConnectError> {
        if host.is_empty() || host.bytes().any(|c| c.is_ascii_whitespace() || c == b'/') {
            return Err(FtpConnectError::InvalidServerAddr(s.to_string()));
        }
        match IpAddr::from_str(host) {
            Ok(ip) => Ok(FtpHost::Ip(ip)),
            Err(_) => Ok(FtpHost::Domain(host.to_ascii_lowercase())),
        }
    }
}

impl FromStr for FtpServerAddr {
    type Err = FtpConnectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(left) = s.strip_prefix('[') {
            let Some((ip6, tail)) = left.split_once(']') else {
                return Err(FtpConnectError::InvalidServerAddr(s.to_string()));
            };
            let ip6 = Ipv6Addr::from_str(ip6)
                .map_err(|_| FtpConnectError::InvalidServerAddr(s.to_string()))?;
            let port = match tail {
                "" => FTP_DEFAULT_CONTROL_PORT,
                _ => match tail.strip_prefix(':') {
                    Some(port) => FtpServerAddr::parse_port(s, port)?,
                    None => return Err(FtpConnectError::InvalidServerAddr(s.to_string())),
                },
            };
            return Ok(FtpServerAddr::new(IpAddr::V6(ip6), port));
        }

        match memchr::memchr_iter(b':', s.as_bytes()).count() {
            0 => Ok(FtpServerAddr {
                host: FtpServerAddr::parse_host(s, s)?,
                port: FTP_DEFAULT_CONTROL_PORT,
            }),
            1 => {
                let (host, port) = s
                    .split_once(':')
                    .ok_or_else(|| FtpConnectError::InvalidServerAddr(s.to_string()))?;
                Ok(FtpServerAddr {
                    host: FtpServerAddr::parse_host(s, host)?,
                    port: FtpServerAddr::parse_port(s, port)?,
                })
            }
            _ => {
                let ip6 = Ipv6Addr::from_str(s)
                    .map_err(|_| FtpConnectError::InvalidServerAddr(s.to_string()))?;
                Ok(FtpServerAddr::new(
                    IpAddr::V6(ip6),
                    FTP_DEFAULT_CONTROL_PORT,
                ))
            }
        }
    }
}

impl fmt::Display for FtpServerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.host {
            FtpHost::Ip(IpAddr::V6(ip6)) => write!(f, "[{ip6}]:{}", self.port),
            FtpHost::Ip(IpAddr::V4(ip4)) => write!(f, "{ip4}:{}", self.port),
            FtpHost::Domain(domain) => write!(f, "{domain}:{}", self.port),
        }
    }
}
