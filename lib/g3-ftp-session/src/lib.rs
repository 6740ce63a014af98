/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

#[macro_use]
mod debug;

mod addr;
mod config;
mod connection;
mod control;
mod data;
mod error;
mod io;
mod session;
mod transfer;

pub use addr::{FTP_DEFAULT_CONTROL_PORT, FtpServerAddr};
pub use config::{FtpClientConfig, FtpControlConfig, FtpDataConnectionMode, FtpTransferConfig};
pub use connection::{FtpConnectionProvider, LocalConnectionProvider};
pub use control::{FtpCommand, FtpReply};
pub use data::FtpDataEndpoint;
pub use debug::{FTP_DEBUG_LOG_LEVEL, FTP_DEBUG_LOG_TARGET};
pub use error::{
    FtpCommandError, FtpConnectError, FtpReplyParseError, FtpSessionError, FtpTransferError,
};
pub use session::{FtpSession, FtpSessionState};
pub use transfer::FtpTransferMode;
