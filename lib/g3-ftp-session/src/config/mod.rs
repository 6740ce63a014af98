/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

#[cfg(feature = "yaml")]
mod yaml;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FtpDataConnectionMode {
    /// the client connects to the address advertised in reply to PASV
    #[default]
    Passive,
    /// the client listens and advertises the address with PORT
    Active,
}

impl FromStr for FtpDataConnectionMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "passive" | "pasv" => Ok(FtpDataConnectionMode::Passive),
            "active" | "port" => Ok(FtpDataConnectionMode::Active),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpControlConfig {
    /// max length of a reply line, 0 for no limit
    pub max_line_len: usize,
    /// max number of lines in a multi-line reply, 0 for no limit
    pub max_multi_lines: usize,
    pub command_timeout: Duration,
}

impl Default for FtpControlConfig {
    fn default() -> Self {
        FtpControlConfig {
            max_line_len: 0,
            max_multi_lines: 0,
            command_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpTransferConfig {
    pub buffer_size: usize,
    pub accept_timeout: Duration,
    pub data_idle_timeout: Duration,
    pub end_wait_timeout: Duration,
}

impl Default for FtpTransferConfig {
    fn default() -> Self {
        FtpTransferConfig {
            buffer_size: 16 * 1024,
            accept_timeout: Duration::from_secs(30),
            data_idle_timeout: Duration::from_secs(60),
            end_wait_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpClientConfig {
    pub control: FtpControlConfig,
    pub transfer: FtpTransferConfig,
    pub connect_timeout: Duration,
    pub greeting_timeout: Duration,
    pub data_connection: FtpDataConnectionMode,
    /// connect to the control peer ip instead of the one in the PASV reply
    pub pasv_use_control_ip: bool,
    /// local ip to listen on in active mode, the control local ip if not set
    pub active_bind_ip: Option<IpAddr>,
}

impl Default for FtpClientConfig {
    fn default() -> Self {
        FtpClientConfig {
            control: Default::default(),
            transfer: Default::default(),
            connect_timeout: Duration::from_secs(30),
            greeting_timeout: Duration::from_secs(10),
            data_connection: FtpDataConnectionMode::Passive,
            pasv_use_control_ip: false,
            active_bind_ip: None,
        }
    }
}
