/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::io;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use super::FtpControlChannel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FtpCommand(&'static str);

impl FtpCommand {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for FtpCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! ftp_commands {
    (
        $(
            $(#[$docs:meta])*
            ($konst:ident, $phrase:expr);
        )+
    ) => {
        impl FtpCommand {
        $(
            $(#[$docs])*
            pub const $konst: FtpCommand = FtpCommand($phrase);
        )+
        }
    };
}

ftp_commands! {
    (USER, "USER");
    (PASS, "PASS");
    (QUIT, "QUIT");
    (CWD, "CWD");
    (CDUP, "CDUP");
    (MKD, "MKD");
    (RMD, "RMD");
    (PWD, "PWD");
    (DELE, "DELE");
    (RNFR, "RNFR");
    (RNTO, "RNTO");
    (SIZE, "SIZE");
    (SITE, "SITE");
    (TYPE_A, "TYPE A");
    (TYPE_I, "TYPE I");
    (PASV, "PASV");
    (PORT, "PORT");
    (LIST, "LIST");
    (NLST, "NLST");
    (RETR, "RETR");
    (STOR, "STOR");
}

impl<T> FtpControlChannel<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    async fn send_all(&mut self, buf: &[u8]) -> io::Result<()> {
        #[cfg(feature = "log-raw-io")]
        crate::debug::log_cmd(String::from_utf8_lossy(buf).trim_end());

        self.stream.write_all(buf).await?;
        self.stream.flush().await?;
        Ok(())
    }

    pub(crate) async fn send_cmd(&mut self, cmd: FtpCommand) -> io::Result<()> {
        let len = cmd.0.len() + 2;
        let mut buf: Vec<u8> = Vec::with_capacity(len);
        buf.extend_from_slice(cmd.0.as_bytes());
        buf.extend_from_slice(b"\r\n");

        self.send_all(buf.as_ref()).await
    }

    pub(crate) async fn send_cmd1(&mut self, cmd: FtpCommand, param1: &str) -> io::Result<()> {
        if param1.bytes().any(|c| c == b'\r' || c == b'\n') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "command parameter contains line break",
            ));
        }

        let len = cmd.0.len() + 1 + param1.len() + 2;
        let mut buf: Vec<u8> = Vec::with_capacity(len);
        buf.extend_from_slice(cmd.0.as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(param1.as_bytes());
        buf.extend_from_slice(b"\r\n");

        self.send_all(buf.as_ref()).await
    }
}
