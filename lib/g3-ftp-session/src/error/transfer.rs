/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;

use thiserror::Error;

/// Data stream failure, carrying the number of local bytes moved so far.
#[derive(Debug, Error)]
pub enum FtpTransferError {
    #[error("local read failed after {0} bytes: {1:?}")]
    LocalReadFailed(u64, io::Error),
    #[error("local write failed after {0} bytes: {1:?}")]
    LocalWriteFailed(u64, io::Error),
    #[error("data read failed after {0} bytes: {1:?}")]
    DataReadFailed(u64, io::Error),
    #[error("data write failed after {0} bytes: {1:?}")]
    DataWriteFailed(u64, io::Error),
    #[error("data channel idle timeout after {0} bytes")]
    IdleTimeout(u64),
}

impl FtpTransferError {
    pub fn transferred(&self) -> u64 {
        match self {
            FtpTransferError::LocalReadFailed(n, _)
            | FtpTransferError::LocalWriteFailed(n, _)
            | FtpTransferError::DataReadFailed(n, _)
            | FtpTransferError::DataWriteFailed(n, _)
            | FtpTransferError::IdleTimeout(n) => *n,
        }
    }
}
