/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;

use thiserror::Error;

use super::FtpReplyParseError;
use crate::control::{FtpCommand, FtpReply};

#[derive(Debug, Error)]
pub enum FtpCommandError {
    #[error("unable to send command: {0:?}")]
    SendFailed(io::Error),
    #[error("unable to recv reply: {0}")]
    RecvFailed(#[from] FtpReplyParseError),
    #[error("command {0} rejected by server: {1}")]
    Rejected(FtpCommand, FtpReply),
}
