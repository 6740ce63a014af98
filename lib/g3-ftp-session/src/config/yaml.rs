/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};
use humanize_rs::ParseError;
use humanize_rs::bytes::Bytes;
use yaml_rust::Yaml;
use yaml_rust::yaml::Hash;

use super::{FtpClientConfig, FtpControlConfig, FtpDataConnectionMode, FtpTransferConfig};

fn normalize_key(raw: &str) -> String {
    raw.to_lowercase().replace('-', "_")
}

fn foreach_kv<F>(map: &Hash, mut f: F) -> anyhow::Result<()>
where
    F: FnMut(&str, &Yaml) -> anyhow::Result<()>,
{
    for (k, v) in map.iter() {
        if let Yaml::String(key) = k {
            f(key, v).context(format!("failed to parse value of key {key}"))?;
        } else {
            return Err(anyhow!("key in hash should be string"));
        }
    }
    Ok(())
}

fn as_humanize_usize(v: &Yaml) -> anyhow::Result<usize> {
    match v {
        Yaml::String(value) => {
            let v = value.parse::<Bytes>()?;
            Ok(v.size())
        }
        Yaml::Integer(value) => Ok(usize::try_from(*value)?),
        _ => Err(anyhow!(
            "yaml value type for humanize usize should be 'string' or 'integer'"
        )),
    }
}

fn as_usize(v: &Yaml) -> anyhow::Result<usize> {
    match v {
        Yaml::String(s) => Ok(usize::from_str(s)?),
        Yaml::Integer(i) => Ok(usize::try_from(*i)?),
        _ => Err(anyhow!(
            "yaml value type for 'usize' should be 'string' or 'integer'"
        )),
    }
}

fn as_duration(v: &Yaml) -> anyhow::Result<Duration> {
    match v {
        Yaml::String(value) => match humanize_rs::duration::parse(value) {
            Ok(v) => Ok(v),
            Err(ParseError::MissingUnit) => {
                if let Ok(u) = u64::from_str(value) {
                    Ok(Duration::from_secs(u))
                } else {
                    Err(anyhow!("invalid duration string"))
                }
            }
            Err(e) => Err(anyhow!("invalid humanize duration string: {e}")),
        },
        Yaml::Integer(value) => {
            let u = u64::try_from(*value).map_err(|_| anyhow!("negative duration"))?;
            Ok(Duration::from_secs(u))
        }
        _ => Err(anyhow!(
            "yaml value type for humanize duration should be 'string' or 'integer'"
        )),
    }
}

fn as_bool(v: &Yaml) -> anyhow::Result<bool> {
    match v {
        Yaml::String(s) => match s.to_lowercase().as_str() {
            "on" | "true" | "yes" | "1" => Ok(true),
            "off" | "false" | "no" | "0" => Ok(false),
            _ => Err(anyhow!("invalid yaml string value for 'bool': {s}")),
        },
        Yaml::Boolean(value) => Ok(*value),
        Yaml::Integer(i) => Ok(*i != 0),
        _ => Err(anyhow!(
            "yaml value type for 'bool' should be 'boolean' / 'string' / 'integer'"
        )),
    }
}

fn as_ip_addr(v: &Yaml) -> anyhow::Result<IpAddr> {
    if let Yaml::String(s) = v {
        IpAddr::from_str(s).map_err(|e| anyhow!("invalid ip address {s}: {e}"))
    } else {
        Err(anyhow!("yaml value type for 'IpAddr' should be 'string'"))
    }
}

fn as_data_connection_mode(v: &Yaml) -> anyhow::Result<FtpDataConnectionMode> {
    if let Yaml::String(s) = v {
        FtpDataConnectionMode::from_str(s)
            .map_err(|_| anyhow!("invalid ftp data connection mode {s}"))
    } else {
        Err(anyhow!(
            "yaml value type for ftp data connection mode should be 'string'"
        ))
    }
}

impl FtpControlConfig {
    pub fn parse_yaml(value: &Yaml) -> anyhow::Result<Self> {
        if let Yaml::Hash(map) = value {
            let mut config = FtpControlConfig::default();
            foreach_kv(map, |k, v| match normalize_key(k).as_str() {
                "max_line_len" | "max_line_length" => {
                    config.max_line_len = as_humanize_usize(v)
                        .context(format!("invalid humanize usize value for key {k}"))?;
                    Ok(())
                }
                "max_multi_lines" => {
                    config.max_multi_lines =
                        as_usize(v).context(format!("invalid usize value for key {k}"))?;
                    Ok(())
                }
                "command_timeout" => {
                    config.command_timeout = as_duration(v)
                        .context(format!("invalid humanize duration value for key {k}"))?;
                    Ok(())
                }
                _ => Err(anyhow!("invalid key {k}")),
            })?;
            Ok(config)
        } else {
            Err(anyhow!("invalid yaml type"))
        }
    }
}

impl FtpTransferConfig {
    pub fn parse_yaml(value: &Yaml) -> anyhow::Result<Self> {
        if let Yaml::Hash(map) = value {
            let mut config = FtpTransferConfig::default();
            foreach_kv(map, |k, v| match normalize_key(k).as_str() {
                "buffer_size" => {
                    config.buffer_size = as_humanize_usize(v)
                        .context(format!("invalid humanize usize value for key {k}"))?;
                    if config.buffer_size == 0 {
                        return Err(anyhow!("buffer size should not be zero"));
                    }
                    Ok(())
                }
                "accept_timeout" => {
                    config.accept_timeout = as_duration(v)
                        .context(format!("invalid humanize duration value for key {k}"))?;
                    Ok(())
                }
                "data_idle_timeout" | "idle_timeout" => {
                    config.data_idle_timeout = as_duration(v)
                        .context(format!("invalid humanize duration value for key {k}"))?;
                    Ok(())
                }
                "end_wait_timeout" => {
                    config.end_wait_timeout = as_duration(v)
                        .context(format!("invalid humanize duration value for key {k}"))?;
                    Ok(())
                }
                _ => Err(anyhow!("invalid key {k}")),
            })?;
            Ok(config)
        } else {
            Err(anyhow!("invalid yaml type"))
        }
    }
}

impl FtpClientConfig {
    pub fn parse_yaml(value: &Yaml) -> anyhow::Result<Self> {
        if let Yaml::Hash(map) = value {
            let mut config = FtpClientConfig::default();
            foreach_kv(map, |k, v| match normalize_key(k).as_str() {
                "control" => {
                    config.control = FtpControlConfig::parse_yaml(v).context(format!(
                        "invalid ftp control connection config value for key {k}"
                    ))?;
                    Ok(())
                }
                "transfer" => {
                    config.transfer = FtpTransferConfig::parse_yaml(v).context(format!(
                        "invalid ftp transfer connection config value for key {k}"
                    ))?;
                    Ok(())
                }
                "connect_timeout" => {
                    config.connect_timeout = as_duration(v)
                        .context(format!("invalid humanize duration value for key {k}"))?;
                    Ok(())
                }
                "greeting_timeout" => {
                    config.greeting_timeout = as_duration(v)
                        .context(format!("invalid humanize duration value for key {k}"))?;
                    Ok(())
                }
                "data_connection" | "data_connection_mode" => {
                    config.data_connection = as_data_connection_mode(v)
                        .context(format!("invalid data connection mode value for key {k}"))?;
                    Ok(())
                }
                "pasv_use_control_ip" => {
                    config.pasv_use_control_ip =
                        as_bool(v).context(format!("invalid bool value for key {k}"))?;
                    Ok(())
                }
                "active_bind_ip" => {
                    config.active_bind_ip =
                        Some(as_ip_addr(v).context(format!("invalid ip value for key {k}"))?);
                    Ok(())
                }
                _ => Err(anyhow!("invalid key {k}")),
            })?;
            Ok(config)
        } else {
            Err(anyhow!("invalid yaml type"))
        }
    }
}
