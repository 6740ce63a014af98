/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Read into `buf` until `delimiter` is found or `max_len` bytes have been read.
///
/// Returns whether the delimiter was found, and the number of bytes read.
/// A return of `(false, 0)` means EOF.
pub(crate) async fn limited_read_until<R>(
    reader: &mut R,
    delimiter: u8,
    max_len: usize,
    buf: &mut Vec<u8>,
) -> io::Result<(bool, usize)>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    let mut read = 0usize;
    while read < max_len {
        let (found, used) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                return Ok((false, read));
            }
            let limit = available.len().min(max_len - read);
            match memchr::memchr(delimiter, &available[..limit]) {
                Some(i) => {
                    buf.extend_from_slice(&available[..=i]);
                    (true, i + 1)
                }
                None => {
                    buf.extend_from_slice(&available[..limit]);
                    (false, limit)
                }
            }
        };
        reader.consume(used);
        read += used;
        if found {
            return Ok((true, read));
        }
    }
    Ok((false, read))
}

/// Discard data up to and including `delimiter`.
///
/// Returns false if EOF comes first.
pub(crate) async fn skip_until<R>(reader: &mut R, delimiter: u8) -> io::Result<bool>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    loop {
        let (found, used) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(false);
            }
            match memchr::memchr(delimiter, available) {
                Some(i) => (true, i + 1),
                None => (false, available.len()),
            }
        };
        reader.consume(used);
        if found {
            return Ok(true);
        }
    }
}
