/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::mem;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use log::warn;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::addr::FtpServerAddr;
use crate::config::{FtpClientConfig, FtpDataConnectionMode};
use crate::connection::{FtpConnectionProvider, LocalConnectionProvider};
use crate::control::{FtpAuthStatus, FtpCommand, FtpControlChannel, FtpReply};
use crate::data::{self, FtpControlAddrs};
use crate::error::{FtpCommandError, FtpConnectError, FtpSessionError, FtpTransferError};
use crate::transfer::{self, FtpTransferMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FtpSessionState {
    Uninitialized,
    Closed,
    Connected,
    LoggedIn,
}

impl FtpSessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FtpSessionState::Uninitialized => "uninitialized",
            FtpSessionState::Closed => "closed",
            FtpSessionState::Connected => "connected",
            FtpSessionState::LoggedIn => "logged in",
        }
    }
}

impl fmt::Display for FtpSessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

enum FtpSessionStage {
    Uninitialized,
    Closed,
    Connected(FtpControlChannel<TcpStream>),
    LoggedIn(FtpControlChannel<TcpStream>),
}

impl FtpSessionStage {
    fn state(&self) -> FtpSessionState {
        match self {
            FtpSessionStage::Uninitialized => FtpSessionState::Uninitialized,
            FtpSessionStage::Closed => FtpSessionState::Closed,
            FtpSessionStage::Connected(_) => FtpSessionState::Connected,
            FtpSessionStage::LoggedIn(_) => FtpSessionState::LoggedIn,
        }
    }

    fn control(&self) -> Option<&FtpControlChannel<TcpStream>> {
        match self {
            FtpSessionStage::Connected(control) | FtpSessionStage::LoggedIn(control) => {
                Some(control)
            }
            FtpSessionStage::Uninitialized | FtpSessionStage::Closed => None,
        }
    }

    fn logged_in_control(
        &mut self,
    ) -> Result<&mut FtpControlChannel<TcpStream>, FtpSessionError> {
        match self {
            FtpSessionStage::LoggedIn(control) => Ok(control),
            FtpSessionStage::Connected(_) => Err(FtpSessionError::NotLoggedIn),
            FtpSessionStage::Uninitialized | FtpSessionStage::Closed => {
                Err(FtpSessionError::NotConnected)
            }
        }
    }
}

/// Map the rejection of a command to `false`, keeping every other error.
fn command_status(r: Result<(), FtpSessionError>) -> Result<bool, FtpSessionError> {
    match r {
        Ok(_) => Ok(true),
        Err(FtpSessionError::CommandFailed(cmd, reply)) => {
            log_msg!("command {} rejected: {}", cmd, reply);
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Keep the control channel in sync after an aborted transfer.
async fn discard_transfer_end(
    control: &mut FtpControlChannel<TcpStream>,
    cmd: FtpCommand,
    timeout: Duration,
) {
    match control
        .timed_read_reply_within(timeout, "discard transfer end")
        .await
    {
        Ok(reply) => log_msg!("discarded end reply of {}: {}", cmd, reply),
        Err(e) => log_msg!("no end reply of {} after abort: {}", cmd, e),
    }
}

/// A client session with one FTP server.
///
/// Every operation needs `&mut self`, so there is at most one command in
/// flight. Dropping the session closes all sockets without sending `QUIT`.
pub struct FtpSession {
    config: FtpClientConfig,
    provider: Box<dyn FtpConnectionProvider>,
    data_connection: FtpDataConnectionMode,
    server: Option<FtpServerAddr>,
    stage: FtpSessionStage,
    last_reply: Option<FtpReply>,
}

impl Default for FtpSession {
    fn default() -> Self {
        FtpSession::new(FtpClientConfig::default())
    }
}

impl FtpSession {
    pub fn new(config: FtpClientConfig) -> Self {
        FtpSession::with_provider(config, Box::new(LocalConnectionProvider::default()))
    }

    pub fn with_provider(config: FtpClientConfig, provider: Box<dyn FtpConnectionProvider>) -> Self {
        FtpSession {
            data_connection: config.data_connection,
            config,
            provider,
            server: None,
            stage: FtpSessionStage::Uninitialized,
            last_reply: None,
        }
    }

    /// Connect to `host` and log in.
    pub async fn connect(
        host: &str,
        username: &str,
        password: &str,
        config: FtpClientConfig,
    ) -> Result<Self, FtpSessionError> {
        let mut session = FtpSession::new(config);
        session.open(host).await?;
        session.login(username, password).await?;
        Ok(session)
    }

    #[inline]
    pub fn state(&self) -> FtpSessionState {
        self.stage.state()
    }

    /// Whether the session has been closed. A session that was never opened
    /// is not closed.
    pub fn is_closed(&self) -> bool {
        matches!(self.stage, FtpSessionStage::Closed)
    }

    #[inline]
    pub fn server_addr(&self) -> Option<&FtpServerAddr> {
        self.server.as_ref()
    }

    #[inline]
    pub fn data_connection_mode(&self) -> FtpDataConnectionMode {
        self.data_connection
    }

    pub fn set_data_connection_mode(&mut self, mode: FtpDataConnectionMode) {
        self.data_connection = mode;
    }

    /// The last server reply as `<code> <text>`, empty if there is none yet.
    pub fn last_message(&self) -> String {
        self.last_reply()
            .map(|reply| reply.to_string())
            .unwrap_or_default()
    }

    pub fn last_reply(&self) -> Option<&FtpReply> {
        self.stage
            .control()
            .and_then(|control| control.last_reply())
            .or(self.last_reply.as_ref())
    }

    pub async fn open(&mut self, host: &str) -> Result<(), FtpSessionError> {
        match self.stage {
            FtpSessionStage::Uninitialized | FtpSessionStage::Closed => {}
            FtpSessionStage::Connected(_) => return Err(FtpSessionError::AlreadyConnected),
            FtpSessionStage::LoggedIn(_) => return Err(FtpSessionError::AlreadyLoggedIn),
        }
        self.last_reply = None;

        let server = FtpServerAddr::from_str(host)?;
        let stream = match tokio::time::timeout(
            self.config.connect_timeout,
            self.provider.new_control_connection(&server),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(FtpConnectError::ConnectIoError(e).into()),
            Err(_) => return Err(FtpConnectError::ConnectTimedOut.into()),
        };

        let mut control = FtpControlChannel::new(stream, self.config.control.clone());
        let r = match tokio::time::timeout(self.config.greeting_timeout, control.wait_greetings())
            .await
        {
            Ok(r) => r,
            Err(_) => Err(FtpConnectError::GreetingTimedOut),
        };
        if let Err(e) = r {
            if let Some(reply) = control.take_last_reply() {
                self.last_reply = Some(reply);
            }
            return Err(e.into());
        }

        log_msg!("connected to {}", server);
        self.server = Some(server);
        self.stage = FtpSessionStage::Connected(control);
        Ok(())
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<(), FtpSessionError> {
        let control = match &mut self.stage {
            FtpSessionStage::Connected(control) => control,
            FtpSessionStage::LoggedIn(_) => return Err(FtpSessionError::AlreadyLoggedIn),
            FtpSessionStage::Uninitialized | FtpSessionStage::Closed => {
                return Err(FtpSessionError::NotConnected);
            }
        };

        match control.send_username(username).await? {
            FtpAuthStatus::LoggedIn => {}
            FtpAuthStatus::NeedPassword => control.send_password(password).await?,
        }

        self.stage = match mem::replace(&mut self.stage, FtpSessionStage::Closed) {
            FtpSessionStage::Connected(control) => FtpSessionStage::LoggedIn(control),
            stage => stage,
        };
        log_msg!("logged in as {}", username);
        Ok(())
    }

    pub async fn login_anonymous(&mut self) -> Result<(), FtpSessionError> {
        self.login("anonymous", "").await
    }

    /// Change the working directory and return the new one.
    pub async fn chdir(&mut self, path: &str) -> Result<String, FtpSessionError> {
        let control = self.stage.logged_in_control()?;
        control.change_dir(path).await?;
        let cwd = control.print_working_dir().await?;
        Ok(cwd)
    }

    pub async fn cdup(&mut self) -> Result<bool, FtpSessionError> {
        let control = self.stage.logged_in_control()?;
        command_status(control.change_dir_up().await.map_err(FtpSessionError::from))
    }

    pub async fn mkdir(&mut self, path: &str) -> Result<bool, FtpSessionError> {
        let control = self.stage.logged_in_control()?;
        command_status(control.make_dir(path).await.map_err(FtpSessionError::from))
    }

    pub async fn rmdir(&mut self, path: &str) -> Result<bool, FtpSessionError> {
        let control = self.stage.logged_in_control()?;
        command_status(control.remove_dir(path).await.map_err(FtpSessionError::from))
    }

    pub async fn pwd(&mut self) -> Result<String, FtpSessionError> {
        let control = self.stage.logged_in_control()?;
        let cwd = control.print_working_dir().await?;
        Ok(cwd)
    }

    pub async fn delete(&mut self, path: &str) -> Result<bool, FtpSessionError> {
        let control = self.stage.logged_in_control()?;
        command_status(control.delete_file(path).await.map_err(FtpSessionError::from))
    }

    pub async fn rename(&mut self, from: &str, to: &str) -> Result<bool, FtpSessionError> {
        let control = self.stage.logged_in_control()?;
        if let Err(e) = control.rename_from(from).await {
            return command_status(Err(e.into()));
        }
        command_status(control.rename_to(to).await.map_err(FtpSessionError::from))
    }

    pub async fn site(&mut self, arg: &str) -> Result<bool, FtpSessionError> {
        let control = self.stage.logged_in_control()?;
        command_status(control.site(arg).await.map_err(FtpSessionError::from))
    }

    /// The size of a remote file, `None` if the server can not report it.
    pub async fn size(&mut self, path: &str) -> Result<Option<u64>, FtpSessionError> {
        let control = self.stage.logged_in_control()?;
        match control.request_transfer_type(FtpTransferMode::Text).await {
            Ok(_) => {}
            Err(FtpCommandError::Rejected(cmd, reply)) => {
                log_msg!("command {} rejected: {}", cmd, reply);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }
        match control.request_size(path).await {
            Ok(size) => Ok(Some(size)),
            Err(FtpCommandError::Rejected(_, reply)) => {
                log_msg!("size of {} not available: {}", path, reply);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Long listing (`LIST`) of `path`, or of the working directory.
    pub async fn dir(&mut self, path: Option<&str>) -> Result<String, FtpSessionError> {
        self.list(FtpCommand::LIST, path).await
    }

    /// Name listing (`NLST`) of `path`, or of the working directory.
    pub async fn nlst(&mut self, path: Option<&str>) -> Result<String, FtpSessionError> {
        self.list(FtpCommand::NLST, path).await
    }

    async fn list(
        &mut self,
        cmd: FtpCommand,
        path: Option<&str>,
    ) -> Result<String, FtpSessionError> {
        let mode = FtpTransferMode::Text;
        let mut data = self.begin_transfer(cmd, path.unwrap_or("."), mode).await?;
        let mut buf = Vec::<u8>::with_capacity(1024);
        let r = transfer::receive_data(&mut data, &mut buf, mode, &self.config.transfer).await;
        drop(data);
        self.complete_transfer(cmd, r).await?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Upload the local file at `local` to `remote`.
    pub async fn put<P: AsRef<Path>>(
        &mut self,
        local: P,
        remote: &str,
        mode: FtpTransferMode,
    ) -> Result<bool, FtpSessionError> {
        self.stage.logged_in_control()?;
        let mut file = tokio::fs::File::open(local).await?;
        self.put_from(&mut file, remote, mode).await
    }

    pub async fn put_from<R>(
        &mut self,
        source: &mut R,
        remote: &str,
        mode: FtpTransferMode,
    ) -> Result<bool, FtpSessionError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let cmd = FtpCommand::STOR;
        let mut data = match self.begin_transfer(cmd, remote, mode).await {
            Ok(data) => data,
            Err(e) => return command_status(Err(e)),
        };
        let r = transfer::send_data(source, &mut data, mode, &self.config.transfer).await;
        drop(data);
        command_status(self.complete_transfer(cmd, r).await)
    }

    /// Download `remote` into the local file at `local`.
    ///
    /// The local file is created, or truncated, only after the server has
    /// accepted the transfer.
    pub async fn get<P: AsRef<Path>>(
        &mut self,
        remote: &str,
        local: P,
        mode: FtpTransferMode,
    ) -> Result<bool, FtpSessionError> {
        let cmd = FtpCommand::RETR;
        let mut data = match self.begin_transfer(cmd, remote, mode).await {
            Ok(data) => data,
            Err(e) => return command_status(Err(e)),
        };
        let mut file = match tokio::fs::File::create(local).await {
            Ok(file) => file,
            Err(e) => {
                drop(data);
                let control = self.stage.logged_in_control()?;
                discard_transfer_end(control, cmd, self.config.transfer.end_wait_timeout).await;
                return Err(e.into());
            }
        };
        let r = transfer::receive_data(&mut data, &mut file, mode, &self.config.transfer).await;
        drop(data);
        command_status(self.complete_transfer(cmd, r).await)
    }

    pub async fn get_into<W>(
        &mut self,
        remote: &str,
        sink: &mut W,
        mode: FtpTransferMode,
    ) -> Result<bool, FtpSessionError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let cmd = FtpCommand::RETR;
        let mut data = match self.begin_transfer(cmd, remote, mode).await {
            Ok(data) => data,
            Err(e) => return command_status(Err(e)),
        };
        let r = transfer::receive_data(&mut data, sink, mode, &self.config.transfer).await;
        drop(data);
        command_status(self.complete_transfer(cmd, r).await)
    }

    pub async fn get_binary_file<P: AsRef<Path>>(
        &mut self,
        remote: &str,
        local: P,
    ) -> Result<bool, FtpSessionError> {
        self.get(remote, local, FtpTransferMode::Binary).await
    }

    pub async fn get_text_file<P: AsRef<Path>>(
        &mut self,
        remote: &str,
        local: P,
    ) -> Result<bool, FtpSessionError> {
        self.get(remote, local, FtpTransferMode::Text).await
    }

    pub async fn put_binary_file<P: AsRef<Path>>(
        &mut self,
        local: P,
        remote: &str,
    ) -> Result<bool, FtpSessionError> {
        self.put(local, remote, FtpTransferMode::Binary).await
    }

    pub async fn put_text_file<P: AsRef<Path>>(
        &mut self,
        local: P,
        remote: &str,
    ) -> Result<bool, FtpSessionError> {
        self.put(local, remote, FtpTransferMode::Text).await
    }

    /// Set the transfer type, negotiate the data channel and send the
    /// transfer command. Returns the data stream once the server has
    /// answered with a 1xx mark.
    async fn begin_transfer(
        &mut self,
        cmd: FtpCommand,
        path: &str,
        mode: FtpTransferMode,
    ) -> Result<TcpStream, FtpSessionError> {
        let control = self.stage.logged_in_control()?;
        control.request_transfer_type(mode).await?;

        let stream = control.get_ref();
        let control_addrs = FtpControlAddrs {
            local: stream.local_addr()?,
            peer: stream.peer_addr()?,
        };
        let connector = data::open_data_channel(
            control,
            self.provider.as_mut(),
            &self.config,
            self.data_connection,
            &control_addrs,
        )
        .await?;

        control.start_transfer(cmd, Some(path)).await?;
        match connector
            .establish(self.config.transfer.accept_timeout)
            .await
        {
            Ok(stream) => Ok(stream),
            Err(e) => {
                discard_transfer_end(control, cmd, self.config.transfer.end_wait_timeout).await;
                Err(e.into())
            }
        }
    }

    /// Wait for the final reply of a transfer whose data stream has been
    /// dropped already.
    async fn complete_transfer(
        &mut self,
        cmd: FtpCommand,
        transferred: Result<u64, FtpTransferError>,
    ) -> Result<(), FtpSessionError> {
        let control = self.stage.logged_in_control()?;
        let timeout = self.config.transfer.end_wait_timeout;
        match transferred {
            Ok(n) => {
                control.wait_transfer_end(cmd, timeout).await?;
                log_msg!("{} finished with {} bytes", cmd, n);
                Ok(())
            }
            Err(e) => {
                discard_transfer_end(control, cmd, timeout).await;
                Err(e.into())
            }
        }
    }

    /// Send `QUIT` if connected and drop the control connection.
    ///
    /// This never fails and may be called in any state. Returns `false` only
    /// if the `QUIT` exchange went wrong.
    pub async fn close(&mut self) -> bool {
        let mut control = match mem::replace(&mut self.stage, FtpSessionStage::Closed) {
            FtpSessionStage::Connected(control) | FtpSessionStage::LoggedIn(control) => control,
            FtpSessionStage::Uninitialized | FtpSessionStage::Closed => return true,
        };

        let quit_ok = match control.send_quit().await {
            Ok(_) => true,
            Err(e) => {
                warn!("ftp: failed to quit from server: {e}");
                false
            }
        };
        if let Some(reply) = control.take_last_reply() {
            self.last_reply = Some(reply);
        }
        log_msg!("session closed");
        quit_ok
    }
}
