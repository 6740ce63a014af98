/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::net::IpAddr;

use thiserror::Error;

use super::FtpReplyParseError;

#[derive(Debug, Error)]
pub enum FtpConnectError {
    #[error("invalid server address {0}")]
    InvalidServerAddr(String),
    #[error("connect failed: {0:?}")]
    ConnectIoError(io::Error),
    #[error("timed out to connect")]
    ConnectTimedOut,
    #[error("timed out to receive greetings")]
    GreetingTimedOut,
    #[error("greeting failed: {0}")]
    GreetingFailed(FtpReplyParseError),
    #[error("service not available")]
    ServiceNotAvailable,
    #[error("invalid greeting reply code {0}")]
    InvalidReplyCode(u16),
    #[error("data connect failed: {0:?}")]
    DataConnectFailed(io::Error),
    #[error("timed out to connect data channel")]
    DataConnectTimedOut,
    #[error("unable to listen for data connection: {0:?}")]
    DataListenFailed(io::Error),
    #[error("unable to accept data connection: {0:?}")]
    DataAcceptFailed(io::Error),
    #[error("timed out to accept data connection")]
    DataAcceptTimedOut,
    #[error("active mode needs an ipv4 local address, got {0}")]
    ActiveModeNeedIpv4(IpAddr),
}
