/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::FtpTransferConfig;
use crate::error::FtpTransferError;

mod text;
use text::CrlfDecoder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FtpTransferMode {
    /// `TYPE A`, line endings converted to and from CRLF
    Text,
    /// `TYPE I`, bytes as is
    Binary,
}

impl FtpTransferMode {
    fn translate_line_endings(&self) -> bool {
        match self {
            FtpTransferMode::Text => !cfg!(windows),
            FtpTransferMode::Binary => false,
        }
    }
}

/// Copy `source` to the data channel until EOF, then shut the data channel
/// down. Returns the number of local bytes read.
pub(crate) async fn send_data<R, W>(
    source: &mut R,
    data: &mut W,
    mode: FtpTransferMode,
    config: &FtpTransferConfig,
) -> Result<u64, FtpTransferError>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin,
{
    let translate = mode.translate_line_endings();
    let mut buf = vec![0u8; config.buffer_size];
    let mut wire_buf = Vec::<u8>::new();
    let mut total: u64 = 0;

    loop {
        let nr = match source.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => return Err(FtpTransferError::LocalReadFailed(total, e)),
        };

        let chunk = if translate {
            wire_buf.clear();
            text::encode_crlf(&buf[..nr], &mut wire_buf);
            wire_buf.as_slice()
        } else {
            &buf[..nr]
        };

        match tokio::time::timeout(config.data_idle_timeout, data.write_all(chunk)).await {
            Ok(Ok(_)) => total += nr as u64,
            Ok(Err(e)) => return Err(FtpTransferError::DataWriteFailed(total, e)),
            Err(_) => return Err(FtpTransferError::IdleTimeout(total)),
        }
    }

    match tokio::time::timeout(config.data_idle_timeout, data.shutdown()).await {
        Ok(Ok(_)) => Ok(total),
        Ok(Err(e)) => Err(FtpTransferError::DataWriteFailed(total, e)),
        Err(_) => Err(FtpTransferError::IdleTimeout(total)),
    }
}

/// Copy the data channel to `sink` until the server closes it. Returns the
/// number of local bytes written.
pub(crate) async fn receive_data<R, W>(
    data: &mut R,
    sink: &mut W,
    mode: FtpTransferMode,
    config: &FtpTransferConfig,
) -> Result<u64, FtpTransferError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut decoder = mode
        .translate_line_endings()
        .then(CrlfDecoder::default);
    let mut buf = vec![0u8; config.buffer_size];
    let mut local_buf = Vec::<u8>::new();
    let mut total: u64 = 0;

    loop {
        let nr = match tokio::time::timeout(config.data_idle_timeout, data.read(&mut buf)).await {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(FtpTransferError::DataReadFailed(total, e)),
            Err(_) => return Err(FtpTransferError::IdleTimeout(total)),
        };

        let chunk = match decoder.as_mut() {
            Some(decoder) => {
                local_buf.clear();
                decoder.decode(&buf[..nr], &mut local_buf);
                local_buf.as_slice()
            }
            None => &buf[..nr],
        };

        sink.write_all(chunk)
            .await
            .map_err(|e| FtpTransferError::LocalWriteFailed(total, e))?;
        total += chunk.len() as u64;
    }

    if let Some(decoder) = decoder.as_mut() {
        local_buf.clear();
        decoder.finish(&mut local_buf);
        if !local_buf.is_empty() {
            sink.write_all(&local_buf)
                .await
                .map_err(|e| FtpTransferError::LocalWriteFailed(total, e))?;
            total += local_buf.len() as u64;
        }
    }

    sink.flush()
        .await
        .map_err(|e| FtpTransferError::LocalWriteFailed(total, e))?;
    Ok(total)
}
