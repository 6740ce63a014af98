/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::net::{SocketAddr, SocketAddrV4};
use std::str::FromStr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, BufStream};

use crate::config::FtpControlConfig;
use crate::error::{FtpCommandError, FtpConnectError, FtpReplyParseError};
use crate::transfer::FtpTransferMode;

mod response;
pub use response::FtpReply;

mod command;
pub use command::FtpCommand;

pub(crate) enum FtpAuthStatus {
    LoggedIn,
    NeedPassword,
}

pub(crate) struct FtpControlChannel<T>
where
    T: AsyncRead + AsyncWrite,
{
    config: FtpControlConfig,
    stream: BufStream<T>,
    last_reply: Option<FtpReply>,
}

impl<T> FtpControlChannel<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) fn new(stream: T, config: FtpControlConfig) -> Self {
        FtpControlChannel {
            config,
            stream: BufStream::new(stream),
            last_reply: None,
        }
    }

    #[inline]
    pub(crate) fn get_ref(&self) -> &T {
        self.stream.get_ref()
    }

    #[inline]
    pub(crate) fn last_reply(&self) -> Option<&FtpReply> {
        self.last_reply.as_ref()
    }

    pub(crate) fn take_last_reply(&mut self) -> Option<FtpReply> {
        self.last_reply.take()
    }

    pub(crate) async fn read_reply(&mut self) -> Result<FtpReply, FtpReplyParseError> {
        let reply = response::read_reply(&mut self.stream, &self.config).await?;
        self.last_reply = Some(reply.clone());
        Ok(reply)
    }

    pub(crate) async fn timed_read_reply(
        &mut self,
        stage: &'static str,
    ) -> Result<FtpReply, FtpReplyParseError> {
        self.timed_read_reply_within(self.config.command_timeout, stage)
            .await
    }

    pub(crate) async fn timed_read_reply_within(
        &mut self,
        timeout: Duration,
        stage: &'static str,
    ) -> Result<FtpReply, FtpReplyParseError> {
        match tokio::time::timeout(timeout, self.read_reply()).await {
            Ok(r) => r,
            Err(_) => Err(FtpReplyParseError::ReadReplyTimedOut(stage)),
        }
    }

    async fn execute(
        &mut self,
        cmd: FtpCommand,
        stage: &'static str,
    ) -> Result<FtpReply, FtpCommandError> {
        self.send_cmd(cmd)
            .await
            .map_err(FtpCommandError::SendFailed)?;
        let reply = self.timed_read_reply(stage).await?;
        Ok(reply)
    }

    async fn execute1(
        &mut self,
        cmd: FtpCommand,
        param: &str,
        stage: &'static str,
    ) -> Result<FtpReply, FtpCommandError> {
        self.send_cmd1(cmd, param)
            .await
            .map_err(FtpCommandError::SendFailed)?;
        let reply = self.timed_read_reply(stage).await?;
        Ok(reply)
    }

    pub(crate) async fn wait_greetings(&mut self) -> Result<(), FtpConnectError> {
        loop {
            let reply = self
                .read_reply()
                .await
                .map_err(FtpConnectError::GreetingFailed)?;
            match reply.code() {
                120 => continue,
                421 => return Err(FtpConnectError::ServiceNotAvailable),
                n if n / 100 == 2 => return Ok(()),
                n => return Err(FtpConnectError::InvalidReplyCode(n)),
            }
        }
    }

    pub(crate) async fn send_username(
        &mut self,
        username: &str,
    ) -> Result<FtpAuthStatus, FtpCommandError> {
        let cmd = FtpCommand::USER;
        let reply = self.execute1(cmd, username, "send username").await?;
        match reply.code() / 100 {
            2 => Ok(FtpAuthStatus::LoggedIn),
            3 => Ok(FtpAuthStatus::NeedPassword),
            _ => Err(FtpCommandError::Rejected(cmd, reply)),
        }
    }

    pub(crate) async fn send_password(&mut self, password: &str) -> Result<(), FtpCommandError> {
        let cmd = FtpCommand::PASS;
        let reply = self.execute1(cmd, password, "send password").await?;
        match reply.code() / 100 {
            2 => Ok(()),
            _ => Err(FtpCommandError::Rejected(cmd, reply)),
        }
    }

    pub(crate) async fn send_quit(&mut self) -> Result<(), FtpCommandError> {
        let cmd = FtpCommand::QUIT;
        let reply = self.execute(cmd, "send quit").await?;
        match reply.code() / 100 {
            2 => Ok(()),
            _ => Err(FtpCommandError::Rejected(cmd, reply)),
        }
    }

    /// Send a command whose only success class is 2xx.
    async fn simple_command(
        &mut self,
        cmd: FtpCommand,
        param: Option<&str>,
        stage: &'static str,
    ) -> Result<FtpReply, FtpCommandError> {
        let reply = match param {
            Some(param) => self.execute1(cmd, param, stage).await?,
            None => self.execute(cmd, stage).await?,
        };
        if reply.is_completion() {
            Ok(reply)
        } else {
            Err(FtpCommandError::Rejected(cmd, reply))
        }
    }

    pub(crate) async fn change_dir(&mut self, path: &str) -> Result<(), FtpCommandError> {
        self.simple_command(FtpCommand::CWD, Some(path), "change dir")
            .await?;
        Ok(())
    }

    pub(crate) async fn change_dir_up(&mut self) -> Result<(), FtpCommandError> {
        self.simple_command(FtpCommand::CDUP, None, "change dir up")
            .await?;
        Ok(())
    }

    pub(crate) async fn make_dir(&mut self, path: &str) -> Result<(), FtpCommandError> {
        self.simple_command(FtpCommand::MKD, Some(path), "make dir")
            .await?;
        Ok(())
    }

    pub(crate) async fn remove_dir(&mut self, path: &str) -> Result<(), FtpCommandError> {
        self.simple_command(FtpCommand::RMD, Some(path), "remove dir")
            .await?;
        Ok(())
    }

    pub(crate) async fn delete_file(&mut self, path: &str) -> Result<(), FtpCommandError> {
        self.simple_command(FtpCommand::DELE, Some(path), "delete file")
            .await?;
        Ok(())
    }

    pub(crate) async fn site(&mut self, arg: &str) -> Result<(), FtpCommandError> {
        self.simple_command(FtpCommand::SITE, Some(arg), "site").await?;
        Ok(())
    }

    pub(crate) async fn print_working_dir(&mut self) -> Result<String, FtpCommandError> {
        let cmd = FtpCommand::PWD;
        let reply = self.simple_command(cmd, None, "print working dir").await?;
        match reply.parse_pwd_257_reply() {
            Some(path) => Ok(path),
            None => Err(FtpReplyParseError::InvalidReplySyntax(cmd, reply.code()).into()),
        }
    }

    pub(crate) async fn rename_from(&mut self, path: &str) -> Result<(), FtpCommandError> {
        let cmd = FtpCommand::RNFR;
        let reply = self.execute1(cmd, path, "rename from").await?;
        if reply.is_intermediate() {
            Ok(())
        } else {
            Err(FtpCommandError::Rejected(cmd, reply))
        }
    }

    pub(crate) async fn rename_to(&mut self, path: &str) -> Result<(), FtpCommandError> {
        self.simple_command(FtpCommand::RNTO, Some(path), "rename to")
            .await?;
        Ok(())
    }

    pub(crate) async fn request_size(&mut self, path: &str) -> Result<u64, FtpCommandError> {
        let cmd = FtpCommand::SIZE;
        let reply = self.simple_command(cmd, Some(path), "request size").await?;
        let size = reply
            .line_trimmed()
            .and_then(|s| s.split_ascii_whitespace().next())
            .and_then(|s| u64::from_str(s).ok());
        match size {
            Some(size) => Ok(size),
            None => Err(FtpReplyParseError::InvalidReplySyntax(cmd, reply.code()).into()),
        }
    }

    pub(crate) async fn request_transfer_type(
        &mut self,
        mode: FtpTransferMode,
    ) -> Result<(), FtpCommandError> {
        let cmd = match mode {
            FtpTransferMode::Text => FtpCommand::TYPE_A,
            FtpTransferMode::Binary => FtpCommand::TYPE_I,
        };
        self.simple_command(cmd, None, "request transfer type")
            .await?;
        Ok(())
    }

    pub(crate) async fn request_pasv_port(&mut self) -> Result<SocketAddr, FtpCommandError> {
        let cmd = FtpCommand::PASV;
        let reply = self.simple_command(cmd, None, "request pasv port").await?;
        match reply.parse_pasv_227_reply() {
            Some(addr) => Ok(addr),
            None => Err(FtpReplyParseError::InvalidReplySyntax(cmd, reply.code()).into()),
        }
    }

    pub(crate) async fn request_port(&mut self, addr: SocketAddrV4) -> Result<(), FtpCommandError> {
        let [h1, h2, h3, h4] = addr.ip().octets();
        let [p1, p2] = addr.port().to_be_bytes();
        let param = format!("{h1},{h2},{h3},{h4},{p1},{p2}");
        self.simple_command(FtpCommand::PORT, Some(&param), "request port")
            .await?;
        Ok(())
    }

    /// Send a transfer command and wait for the 1xx mark.
    pub(crate) async fn start_transfer(
        &mut self,
        cmd: FtpCommand,
        path: Option<&str>,
    ) -> Result<(), FtpCommandError> {
        let reply = match path {
            Some(path) => self.execute1(cmd, path, "start transfer").await?,
            None => self.execute(cmd, "start transfer").await?,
        };
        if reply.is_preliminary() {
            Ok(())
        } else {
            Err(FtpCommandError::Rejected(cmd, reply))
        }
    }

    /// Wait for the final reply of a transfer command.
    pub(crate) async fn wait_transfer_end(
        &mut self,
        cmd: FtpCommand,
        timeout: Duration,
    ) -> Result<(), FtpCommandError> {
        let reply = self
            .timed_read_reply_within(timeout, "wait transfer end")
            .await?;
        if reply.is_completion() {
            Ok(())
        } else {
            Err(FtpCommandError::Rejected(cmd, reply))
        }
    }
}
