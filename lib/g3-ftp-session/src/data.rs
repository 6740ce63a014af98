/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};

use crate::config::{FtpClientConfig, FtpDataConnectionMode};
use crate::connection::FtpConnectionProvider;
use crate::control::FtpControlChannel;
use crate::error::{FtpConnectError, FtpSessionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FtpDataEndpoint {
    /// the server address we connect to
    Passive(SocketAddr),
    /// the local address the server connects to
    Active(SocketAddr),
}

pub(crate) enum FtpDataConnector {
    Connected(FtpDataEndpoint, TcpStream),
    PendingAccept(FtpDataEndpoint, TcpListener),
}

impl FtpDataConnector {
    pub(crate) fn endpoint(&self) -> FtpDataEndpoint {
        match self {
            FtpDataConnector::Connected(endpoint, _) => *endpoint,
            FtpDataConnector::PendingAccept(endpoint, _) => *endpoint,
        }
    }

    /// Get the data stream. In active mode this waits for the server to
    /// connect, so the transfer command should have been sent already.
    pub(crate) async fn establish(
        self,
        accept_timeout: Duration,
    ) -> Result<TcpStream, FtpConnectError> {
        match self {
            FtpDataConnector::Connected(_, stream) => Ok(stream),
            FtpDataConnector::PendingAccept(_, listener) => {
                match tokio::time::timeout(accept_timeout, listener.accept()).await {
                    Ok(Ok((stream, peer))) => {
                        log_msg!("data connection accepted from {}", peer);
                        Ok(stream)
                    }
                    Ok(Err(e)) => Err(FtpConnectError::DataAcceptFailed(e)),
                    Err(_) => Err(FtpConnectError::DataAcceptTimedOut),
                }
            }
        }
    }
}

pub(crate) struct FtpControlAddrs {
    pub(crate) local: SocketAddr,
    pub(crate) peer: SocketAddr,
}

pub(crate) async fn open_data_channel<T, P>(
    control: &mut FtpControlChannel<T>,
    provider: &mut P,
    config: &FtpClientConfig,
    mode: FtpDataConnectionMode,
    control_addrs: &FtpControlAddrs,
) -> Result<FtpDataConnector, FtpSessionError>
where
    T: AsyncRead + AsyncWrite + Unpin,
    P: FtpConnectionProvider + ?Sized,
{
    let connector = match mode {
        FtpDataConnectionMode::Passive => {
            open_passive(control, provider, config, control_addrs.peer.ip()).await?
        }
        FtpDataConnectionMode::Active => {
            let bind_ip = config
                .active_bind_ip
                .unwrap_or_else(|| control_addrs.local.ip());
            open_active(control, provider, bind_ip).await?
        }
    };
    log_msg!("data channel {:?} negotiated", connector.endpoint());
    Ok(connector)
}

async fn open_passive<T, P>(
    control: &mut FtpControlChannel<T>,
    provider: &mut P,
    config: &FtpClientConfig,
    control_peer_ip: IpAddr,
) -> Result<FtpDataConnector, FtpSessionError>
where
    T: AsyncRead + AsyncWrite + Unpin,
    P: FtpConnectionProvider + ?Sized,
{
    let mut addr = control.request_pasv_port().await?;
    if config.pasv_use_control_ip {
        addr.set_ip(control_peer_ip);
    }

    match tokio::time::timeout(config.connect_timeout, provider.new_data_connection(addr)).await {
        Ok(Ok(stream)) => Ok(FtpDataConnector::Connected(
            FtpDataEndpoint::Passive(addr),
            stream,
        )),
        Ok(Err(e)) => Err(FtpConnectError::DataConnectFailed(e).into()),
        Err(_) => Err(FtpConnectError::DataConnectTimedOut.into()),
    }
}

async fn open_active<T, P>(
    control: &mut FtpControlChannel<T>,
    provider: &mut P,
    bind_ip: IpAddr,
) -> Result<FtpDataConnector, FtpSessionError>
where
    T: AsyncRead + AsyncWrite + Unpin,
    P: FtpConnectionProvider + ?Sized,
{
    let IpAddr::V4(_) = bind_ip else {
        return Err(FtpConnectError::ActiveModeNeedIpv4(bind_ip).into());
    };

    let listener = provider
        .new_data_listener(bind_ip)
        .await
        .map_err(FtpConnectError::DataListenFailed)?;
    let local_addr = listener
        .local_addr()
        .map_err(FtpConnectError::DataListenFailed)?;
    let SocketAddr::V4(port_addr) = local_addr else {
        return Err(FtpConnectError::ActiveModeNeedIpv4(local_addr.ip()).into());
    };

    control.request_port(port_addr).await?;
    Ok(FtpDataConnector::PendingAccept(
        FtpDataEndpoint::Active(local_addr),
        listener,
    ))
}
