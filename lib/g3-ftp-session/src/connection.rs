/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::net::{IpAddr, SocketAddr};

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpSocket, TcpStream};

use crate::FtpServerAddr;

#[async_trait]
pub trait FtpConnectionProvider: Send {
    async fn new_control_connection(&mut self, server: &FtpServerAddr) -> io::Result<TcpStream>;

    async fn new_data_connection(&mut self, addr: SocketAddr) -> io::Result<TcpStream>;

    /// Listen on an ephemeral port for an active mode data connection.
    async fn new_data_listener(&mut self, ip: IpAddr) -> io::Result<TcpListener>;
}

#[derive(Default)]
pub struct LocalConnectionProvider {
    bind_ip: Option<IpAddr>,
}

impl LocalConnectionProvider {
    pub fn set_bind_ip(&mut self, ip: IpAddr) {
        self.bind_ip = Some(ip);
    }

    fn new_socket_to(&self, peer: IpAddr) -> io::Result<TcpSocket> {
        let socket = match peer {
            IpAddr::V4(_) => TcpSocket::new_v4()?,
            IpAddr::V6(_) => TcpSocket::new_v6()?,
        };
        if let Some(ip) = self.bind_ip {
            if ip.is_ipv4() == peer.is_ipv4() {
                socket.bind(SocketAddr::new(ip, 0))?;
            }
        }
        Ok(socket)
    }
}

#[async_trait]
impl FtpConnectionProvider for LocalConnectionProvider {
    async fn new_control_connection(&mut self, server: &FtpServerAddr) -> io::Result<TcpStream> {
        let mut err = io::Error::new(io::ErrorKind::AddrNotAvailable, "no addr resolved");
        let addrs = match server.ip() {
            Some(ip) => vec![SocketAddr::new(ip, server.port())],
            None => tokio::net::lookup_host((server.host(), server.port()))
                .await?
                .collect(),
        };
        for addr in addrs {
            let socket = self.new_socket_to(addr.ip())?;
            match socket.connect(addr).await {
                Ok(stream) => {
                    log_msg!("control connection to {} established", addr);
                    return Ok(stream);
                }
                Err(e) => {
                    log_msg!("connect to {} failed: {:?}", addr, e);
                    err = e;
                }
            }
        }

        Err(err)
    }

    async fn new_data_connection(&mut self, addr: SocketAddr) -> io::Result<TcpStream> {
        let socket = self.new_socket_to(addr.ip())?;
        socket.connect(addr).await
    }

    async fn new_data_listener(&mut self, ip: IpAddr) -> io::Result<TcpListener> {
        TcpListener::bind(SocketAddr::new(ip, 0)).await
    }
}
