/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::collections::{BTreeMap, BTreeSet};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};

pub const USERNAME: &str = "alice";
pub const PASSWORD: &str = "secret";

/// File name that makes RETR end with a 451 after the data was sent.
pub const BROKEN_FILE: &str = "broken.bin";
/// File name that makes RETR stall after half of the data, then end with a 426.
pub const STALLED_FILE: &str = "stalled.bin";
/// How long a stalled transfer waits before the 426.
pub const STALL_TIME: Duration = Duration::from_millis(600);
/// Number of lines in the reply to SITE HELP.
pub const HELP_LINES: usize = 200;

#[derive(Default)]
struct MockFs {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, Vec<u8>>,
}

impl MockFs {
    fn new() -> Self {
        let mut fs = MockFs::default();
        fs.dirs.insert("/".to_string());
        fs
    }

    fn has_children(&self, dir: &str) -> bool {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        self.dirs.iter().any(|d| d.starts_with(&prefix))
            || self.files.keys().any(|f| f.starts_with(&prefix))
    }

    fn children(&self, dir: &str) -> Vec<(String, Option<usize>)> {
        let mut entries = Vec::new();
        for d in &self.dirs {
            if d != "/" && parent_of(d) == dir {
                entries.push((base_name(d).to_string(), None));
            }
        }
        for (f, content) in &self.files {
            if parent_of(f) == dir {
                entries.push((base_name(f).to_string(), Some(content.len())));
            }
        }
        entries
    }
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(p) => &path[..p],
    }
}

fn base_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(p) => &path[p + 1..],
        None => path,
    }
}

fn resolve(cwd: &str, path: &str) -> String {
    let full = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("{cwd}/{path}")
    };
    let mut parts: Vec<&str> = Vec::new();
    for part in full.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            p => parts.push(p),
        }
    }
    format!("/{}", parts.join("/"))
}

pub struct MockFtpServer {
    addr: SocketAddr,
    fs: Arc<Mutex<MockFs>>,
}

impl MockFtpServer {
    pub async fn start() -> Self {
        MockFtpServer::start_with_banner(0).await
    }

    /// Start a server whose greeting carries `extra_lines` more banner lines.
    pub async fn start_with_banner(extra_lines: usize) -> Self {
        let mut greeting = "220-Welcome to the mock ftp server\r\n".to_string();
        for i in 0..extra_lines {
            greeting.push_str(&format!("220-banner line {i}\r\n"));
        }
        greeting.push_str("220 ready");
        let greeting = Arc::new(greeting);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let fs = Arc::new(Mutex::new(MockFs::new()));
        let server_fs = fs.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let fs = server_fs.clone();
                let greeting = greeting.clone();
                tokio::spawn(async move {
                    MockConnection::new(fs).serve(stream, &greeting).await;
                });
            }
        });
        MockFtpServer { addr, fs }
    }

    pub fn host(&self) -> String {
        self.addr.to_string()
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.fs.lock().unwrap().files.get(path).cloned()
    }

    pub fn add_file(&self, path: &str, content: &[u8]) {
        self.fs
            .lock()
            .unwrap()
            .files
            .insert(path.to_string(), content.to_vec());
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.fs.lock().unwrap().dirs.contains(path)
    }
}

enum DataSetup {
    None,
    Passive(TcpListener),
    Active(SocketAddr),
}

struct MockConnection {
    fs: Arc<Mutex<MockFs>>,
    user: Option<String>,
    logged_in: bool,
    cwd: String,
    ascii: bool,
    rename_from: Option<String>,
    data: DataSetup,
}

async fn send(w: &mut OwnedWriteHalf, reply: &str) -> bool {
    w.write_all(format!("{reply}\r\n").as_bytes()).await.is_ok()
}

impl MockConnection {
    fn new(fs: Arc<Mutex<MockFs>>) -> Self {
        MockConnection {
            fs,
            user: None,
            logged_in: false,
            cwd: "/".to_string(),
            ascii: true,
            rename_from: None,
            data: DataSetup::None,
        }
    }

    async fn serve(mut self, stream: TcpStream, greeting: &str) {
        let (r, mut w) = stream.into_split();
        let mut lines = BufReader::new(r).lines();
        if !send(&mut w, greeting).await {
            return;
        }
        while let Ok(Some(line)) = lines.next_line().await {
            let (verb, arg) = match line.split_once(' ') {
                Some((verb, arg)) => (verb.to_ascii_uppercase(), arg.to_string()),
                None => (line.to_ascii_uppercase(), String::new()),
            };
            match self.handle(&verb, &arg, &mut w).await {
                Some(reply) => {
                    if !send(&mut w, &reply).await {
                        return;
                    }
                }
                None => return,
            }
            if verb == "QUIT" {
                return;
            }
        }
    }

    /// Returns the final reply, or `None` to drop the connection.
    async fn handle(&mut self, verb: &str, arg: &str, w: &mut OwnedWriteHalf) -> Option<String> {
        match verb {
            "USER" => {
                if arg == "anonymous" {
                    self.logged_in = true;
                    return Some("230 Anonymous access granted.".to_string());
                }
                self.user = Some(arg.to_string());
                self.logged_in = false;
                return Some("331 Please specify the password.".to_string());
            }
            "PASS" => {
                return if self.user.as_deref() == Some(USERNAME) && arg == PASSWORD {
                    self.logged_in = true;
                    Some("230 Login successful.".to_string())
                } else {
                    Some("530 Login incorrect.".to_string())
                };
            }
            "QUIT" => return Some("221 Goodbye.".to_string()),
            _ => {}
        }
        if !self.logged_in {
            return Some("530 Please login with USER and PASS.".to_string());
        }

        let reply = match verb {
            "PWD" => format!("257 \"{}\" is the current directory", self.cwd),
            "CWD" => {
                let path = resolve(&self.cwd, arg);
                if self.fs.lock().unwrap().dirs.contains(&path) {
                    self.cwd = path;
                    "250 Directory successfully changed.".to_string()
                } else {
                    "550 Failed to change directory.".to_string()
                }
            }
            "CDUP" => {
                self.cwd = parent_of(&self.cwd).to_string();
                "250 Directory successfully changed.".to_string()
            }
            "MKD" => {
                let path = resolve(&self.cwd, arg);
                let mut fs = self.fs.lock().unwrap();
                if fs.dirs.contains(&path)
                    || fs.files.contains_key(&path)
                    || !fs.dirs.contains(parent_of(&path))
                {
                    "550 Create directory operation failed.".to_string()
                } else {
                    fs.dirs.insert(path.clone());
                    format!("257 \"{path}\" created")
                }
            }
            "RMD" => {
                let path = resolve(&self.cwd, arg);
                let mut fs = self.fs.lock().unwrap();
                if path != "/" && fs.dirs.contains(&path) && !fs.has_children(&path) {
                    fs.dirs.remove(&path);
                    "250 Remove directory operation successful.".to_string()
                } else {
                    "550 Remove directory operation failed.".to_string()
                }
            }
            "DELE" => {
                let path = resolve(&self.cwd, arg);
                match self.fs.lock().unwrap().files.remove(&path) {
                    Some(_) => "250 Delete operation successful.".to_string(),
                    None => "550 Delete operation failed.".to_string(),
                }
            }
            "RNFR" => {
                let path = resolve(&self.cwd, arg);
                if self.fs.lock().unwrap().files.contains_key(&path) {
                    self.rename_from = Some(path);
                    "350 Ready for RNTO.".to_string()
                } else {
                    "550 RNFR command failed.".to_string()
                }
            }
            "RNTO" => match self.rename_from.take() {
                Some(from) => {
                    let to = resolve(&self.cwd, arg);
                    let mut fs = self.fs.lock().unwrap();
                    if let Some(content) = fs.files.remove(&from) {
                        fs.files.insert(to, content);
                    }
                    "250 Rename successful.".to_string()
                }
                None => "503 RNFR required first.".to_string(),
            },
            "SIZE" => {
                let path = resolve(&self.cwd, arg);
                match self.fs.lock().unwrap().files.get(&path) {
                    Some(content) => format!("213 {}", content.len()),
                    None => "550 Could not get file size.".to_string(),
                }
            }
            "SITE" => {
                let arg = arg.to_ascii_uppercase();
                if arg == "DROP" {
                    return None;
                } else if arg.starts_with("CHMOD ") {
                    "200 SITE CHMOD command ok.".to_string()
                } else if arg == "HELP" {
                    let mut reply = "214-The following SITE commands are recognized.\r\n".to_string();
                    for i in 1..HELP_LINES - 1 {
                        reply.push_str(&format!(" COMMAND{i}\r\n"));
                    }
                    reply.push_str("214 Help OK.");
                    reply
                } else {
                    "500 Unknown SITE command.".to_string()
                }
            }
            "TYPE" => match arg {
                "A" => {
                    self.ascii = true;
                    "200 Switching to ASCII mode.".to_string()
                }
                "I" => {
                    self.ascii = false;
                    "200 Switching to Binary mode.".to_string()
                }
                _ => "504 Bad TYPE command.".to_string(),
            },
            "PASV" => {
                let listener = TcpListener::bind("127.0.0.1:0").await.ok()?;
                let port = listener.local_addr().ok()?.port();
                self.data = DataSetup::Passive(listener);
                format!(
                    "227 Entering Passive Mode (127,0,0,1,{},{}).",
                    port >> 8,
                    port & 0xff
                )
            }
            "PORT" => {
                let v: Vec<u8> = arg.split(',').filter_map(|s| s.trim().parse().ok()).collect();
                if v.len() == 6 {
                    let ip = Ipv4Addr::new(v[0], v[1], v[2], v[3]);
                    let port = u16::from_be_bytes([v[4], v[5]]);
                    self.data = DataSetup::Active(SocketAddr::V4(SocketAddrV4::new(ip, port)));
                    "200 PORT command successful.".to_string()
                } else {
                    "501 Illegal PORT command.".to_string()
                }
            }
            "LIST" | "NLST" => {
                let path = resolve(&self.cwd, if arg.is_empty() { "." } else { arg });
                let listing = {
                    let fs = self.fs.lock().unwrap();
                    if !fs.dirs.contains(&path) {
                        None
                    } else {
                        let mut out = String::new();
                        for (name, size) in fs.children(&path) {
                            if verb == "NLST" {
                                out.push_str(&format!("{name}\r\n"));
                            } else {
                                match size {
                                    Some(size) => out.push_str(&format!(
                                        "-rw-r--r--    1 ftp      ftp      {size:>8} Jan 01 00:00 {name}\r\n"
                                    )),
                                    None => out.push_str(&format!(
                                        "drwxr-xr-x    2 ftp      ftp          4096 Jan 01 00:00 {name}\r\n"
                                    )),
                                }
                            }
                        }
                        Some(out)
                    }
                };
                match listing {
                    Some(out) => self.send_data(w, out.into_bytes(), "226 Directory send OK.").await?,
                    None => {
                        self.data = DataSetup::None;
                        "550 No such directory.".to_string()
                    }
                }
            }
            "RETR" => {
                let path = resolve(&self.cwd, arg);
                let content = self.fs.lock().unwrap().files.get(&path).cloned();
                match content {
                    Some(content) => {
                        let wire = if self.ascii {
                            String::from_utf8_lossy(&content)
                                .replace('\n', "\r\n")
                                .into_bytes()
                        } else {
                            content
                        };
                        match base_name(&path) {
                            BROKEN_FILE => {
                                self.send_data(w, wire, "451 Local error in processing.")
                                    .await?
                            }
                            STALLED_FILE => self.send_stalled_data(w, wire).await?,
                            _ => self.send_data(w, wire, "226 Transfer complete.").await?,
                        }
                    }
                    None => {
                        self.data = DataSetup::None;
                        "550 Failed to open file.".to_string()
                    }
                }
            }
            "STOR" => {
                let path = resolve(&self.cwd, arg);
                let parent_ok = self.fs.lock().unwrap().dirs.contains(parent_of(&path));
                if !parent_ok {
                    self.data = DataSetup::None;
                    "553 Could not create file.".to_string()
                } else {
                    send(w, "150 Ok to send data.").await.then_some(())?;
                    let mut stream = self.open_data().await?;
                    let mut wire = Vec::new();
                    stream.read_to_end(&mut wire).await.ok()?;
                    let content = if self.ascii {
                        String::from_utf8_lossy(&wire)
                            .replace("\r\n", "\n")
                            .into_bytes()
                    } else {
                        wire
                    };
                    self.fs.lock().unwrap().files.insert(path, content);
                    "226 Transfer complete.".to_string()
                }
            }
            _ => "502 Command not implemented.".to_string(),
        };
        Some(reply)
    }

    async fn open_data(&mut self) -> Option<TcpStream> {
        match std::mem::replace(&mut self.data, DataSetup::None) {
            DataSetup::Passive(listener) => {
                let (stream, _) = tokio::time::timeout(Duration::from_secs(5), listener.accept())
                    .await
                    .ok()?
                    .ok()?;
                Some(stream)
            }
            DataSetup::Active(addr) => TcpStream::connect(addr).await.ok(),
            DataSetup::None => None,
        }
    }

    async fn send_data(&mut self, w: &mut OwnedWriteHalf, data: Vec<u8>, end: &str) -> Option<String> {
        if matches!(self.data, DataSetup::None) {
            return Some("425 Use PORT or PASV first.".to_string());
        }
        send(w, "150 Here comes the data.").await.then_some(())?;
        let mut stream = self.open_data().await?;
        stream.write_all(&data).await.ok()?;
        stream.shutdown().await.ok()?;
        drop(stream);
        Some(end.to_string())
    }

    async fn send_stalled_data(&mut self, w: &mut OwnedWriteHalf, data: Vec<u8>) -> Option<String> {
        send(w, "150 Here comes the data.").await.then_some(())?;
        let mut stream = self.open_data().await?;
        stream.write_all(&data[..data.len() / 2]).await.ok()?;
        stream.flush().await.ok()?;
        tokio::time::sleep(STALL_TIME).await;
        drop(stream);
        Some("426 Connection closed; transfer aborted.".to_string())
    }
}
