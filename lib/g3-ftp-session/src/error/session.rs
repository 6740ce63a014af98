/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;

use thiserror::Error;

use super::{FtpCommandError, FtpConnectError, FtpReplyParseError, FtpTransferError};
use crate::control::{FtpCommand, FtpReply};

#[derive(Debug, Error)]
pub enum FtpSessionError {
    #[error("not connected to server")]
    NotConnected,
    #[error("not logged in")]
    NotLoggedIn,
    #[error("already connected to remote server")]
    AlreadyConnected,
    #[error("already logged on remote server")]
    AlreadyLoggedIn,
    #[error("connect failed: {0}")]
    ConnectFailed(#[from] FtpConnectError),
    #[error("command {0} failed: {1}")]
    CommandFailed(FtpCommand, FtpReply),
    #[error("protocol error: {0}")]
    ProtocolError(FtpReplyParseError),
    #[error("control connection lost")]
    ConnectionLost,
    #[error("timed out at stage '{0}'")]
    TimedOut(&'static str),
    #[error("transfer failed: {0}")]
    TransferFailed(#[from] FtpTransferError),
    #[error("io error: {0:?}")]
    IoError(#[from] io::Error),
}

impl FtpSessionError {
    /// The server reply attached to a command failure.
    pub fn reply(&self) -> Option<&FtpReply> {
        match self {
            FtpSessionError::CommandFailed(_, reply) => Some(reply),
            _ => None,
        }
    }

    pub fn is_state_error(&self) -> bool {
        matches!(
            self,
            FtpSessionError::NotConnected
                | FtpSessionError::NotLoggedIn
                | FtpSessionError::AlreadyConnected
                | FtpSessionError::AlreadyLoggedIn
        )
    }
}

impl From<FtpReplyParseError> for FtpSessionError {
    fn from(e: FtpReplyParseError) -> Self {
        match e {
            FtpReplyParseError::ConnectionClosed | FtpReplyParseError::ReadFailed(_) => {
                FtpSessionError::ConnectionLost
            }
            FtpReplyParseError::ReadReplyTimedOut(stage) => FtpSessionError::TimedOut(stage),
            _ => FtpSessionError::ProtocolError(e),
        }
    }
}

impl From<FtpCommandError> for FtpSessionError {
    fn from(e: FtpCommandError) -> Self {
        match e {
            FtpCommandError::SendFailed(e) => FtpSessionError::IoError(e),
            FtpCommandError::RecvFailed(e) => e.into(),
            FtpCommandError::Rejected(cmd, reply) => FtpSessionError::CommandFailed(cmd, reply),
        }
    }
}
