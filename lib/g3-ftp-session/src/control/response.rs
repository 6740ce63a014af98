/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use tokio::io::AsyncBufRead;

use crate::config::FtpControlConfig;
use crate::error::FtpReplyParseError;
use crate::io::{limited_read_until, skip_until};

/// A complete server reply: the status code and the message lines with
/// the status prefixes removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpReply {
    code: u16,
    lines: Vec<String>,
}

macro_rules! char_to_u16 {
    ($c:expr) => {
        ($c - b'0') as u16
    };
}

fn parse_reply_code(line: &[u8]) -> Result<u16, FtpReplyParseError> {
    if line.len() < 3 || !line[..3].iter().all(u8::is_ascii_digit) {
        return Err(FtpReplyParseError::InvalidLineFormat);
    }
    let code = char_to_u16!(line[0]) * 100 + char_to_u16!(line[1]) * 10 + char_to_u16!(line[2]);
    if !(100..600).contains(&code) {
        return Err(FtpReplyParseError::InvalidReplyCode(code));
    }
    Ok(code)
}

fn line_to_message(line: &[u8]) -> Result<String, FtpReplyParseError> {
    let msg = std::str::from_utf8(line).map_err(|_| FtpReplyParseError::LineIsNotUtf8)?;
    Ok(msg.trim_end().to_string())
}

impl FtpReply {
    pub fn new(code: u16, lines: Vec<String>) -> Self {
        FtpReply { code, lines }
    }

    #[inline]
    pub fn code(&self) -> u16 {
        self.code
    }

    #[inline]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    #[inline]
    pub fn is_multi_line(&self) -> bool {
        self.lines.len() > 1
    }

    /// All message lines joined by `\n`
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    #[inline]
    pub fn is_preliminary(&self) -> bool {
        self.code / 100 == 1
    }

    #[inline]
    pub fn is_completion(&self) -> bool {
        self.code / 100 == 2
    }

    #[inline]
    pub fn is_intermediate(&self) -> bool {
        self.code / 100 == 3
    }

    #[inline]
    pub fn is_failure(&self) -> bool {
        self.code >= 400
    }

    pub(crate) fn parse_single_line(line: &[u8]) -> Result<Self, FtpReplyParseError> {
        let code = parse_reply_code(line)?;
        let msg = line_to_message(&line[4..])?;
        Ok(FtpReply {
            code,
            lines: vec![msg],
        })
    }

    pub(crate) fn get_multi_line_parser(
        line: &[u8],
    ) -> Result<FtpMultiLineReplyParser, FtpReplyParseError> {
        let code = parse_reply_code(line)?;
        let continue_prefix = [line[0], line[1], line[2], b'-'];
        let end_prefix = [line[0], line[1], line[2], b' '];
        Ok(FtpMultiLineReplyParser {
            code,
            continue_prefix,
            end_prefix,
            lines: Vec::new(),
        })
    }

    /// The message of a single line reply, without surrounding whitespace
    pub(crate) fn line_trimmed(&self) -> Option<&str> {
        match self.lines.as_slice() {
            [line] => Some(line.trim()),
            _ => None,
        }
    }

    /// Extract `h1,h2,h3,h4,p1,p2` from the parentheses of a 227 reply.
    pub(crate) fn parse_pasv_227_reply(&self) -> Option<SocketAddr> {
        self.lines.iter().find_map(|line| parse_pasv_tuple(line))
    }

    /// Extract the quoted directory name from a 257 reply, where `""`
    /// stands for an embedded quote.
    pub(crate) fn parse_pwd_257_reply(&self) -> Option<String> {
        let line = self.lines.first()?;
        let p_start = memchr::memchr(b'"', line.as_bytes())?;

        let mut path = String::with_capacity(line.len());
        let mut chars = line[p_start + 1..].chars().peekable();
        while let Some(c) = chars.next() {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    path.push('"');
                } else {
                    return Some(path);
                }
            } else {
                path.push(c);
            }
        }

        None
    }
}

pub(crate) fn parse_pasv_tuple(line: &str) -> Option<SocketAddr> {
    let p_start = memchr::memchr(b'(', line.as_bytes())?;
    let p_end = memchr::memchr(b')', &line.as_bytes()[p_start..])? + p_start;

    let a: Vec<&str> = line[p_start + 1..p_end].split(',').collect();
    if a.len() != 6 {
        return None;
    }

    let h1 = u8::from_str(a[0].trim()).ok()?;
    let h2 = u8::from_str(a[1].trim()).ok()?;
    let h3 = u8::from_str(a[2].trim()).ok()?;
    let h4 = u8::from_str(a[3].trim()).ok()?;
    let p1 = u8::from_str(a[4].trim()).ok()?;
    let p2 = u8::from_str(a[5].trim()).ok()?;

    let ip = IpAddr::V4(Ipv4Addr::new(h1, h2, h3, h4));
    let port = ((p1 as u16) << 8) + (p2 as u16);
    Some(SocketAddr::new(ip, port))
}

impl fmt::Display for FtpReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.text())
    }
}

pub(crate) struct FtpMultiLineReplyParser {
    code: u16,
    continue_prefix: [u8; 4],
    end_prefix: [u8; 4],
    lines: Vec<String>,
}

impl FtpMultiLineReplyParser {
    /// Whether `line` terminates the reply.
    pub(crate) fn is_end_line(&self, line: &[u8]) -> bool {
        // a bare code terminator has empty text
        line.starts_with(&self.end_prefix) || line.trim_ascii_end() == &self.end_prefix[..3]
    }

    pub(crate) fn push_line(&mut self, line: &[u8]) -> Result<(), FtpReplyParseError> {
        let msg = if line.starts_with(&self.end_prefix) || line.starts_with(&self.continue_prefix)
        {
            &line[4..]
        } else if line.trim_ascii_end() == &self.end_prefix[..3] {
            &line[..0]
        } else {
            // do not trim whitespace at beginning
            line
        };
        self.lines.push(line_to_message(msg)?);
        Ok(())
    }

    #[inline]
    pub(crate) fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub(crate) fn finish(self) -> FtpReply {
        FtpReply {
            code: self.code,
            lines: self.lines,
        }
    }
}

/// Read one line into `buf`, returning whether it was cut at `max_line_len`.
///
/// The rest of a cut line is discarded. A `max_line_len` of 0 means no limit.
async fn read_reply_line<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max_line_len: usize,
) -> Result<bool, FtpReplyParseError>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();

    let max_len = if max_line_len == 0 {
        usize::MAX
    } else {
        max_line_len
    };
    let (found, len) = limited_read_until(reader, b'\n', max_len, buf)
        .await
        .map_err(FtpReplyParseError::ReadFailed)?;

    #[cfg(feature = "log-raw-io")]
    crate::debug::log_rsp(String::from_utf8_lossy(buf).trim_end());

    if found {
        Ok(false)
    } else if len < max_len {
        // eof in the middle of a reply
        Err(FtpReplyParseError::ConnectionClosed)
    } else if skip_until(reader, b'\n')
        .await
        .map_err(FtpReplyParseError::ReadFailed)?
    {
        Ok(true)
    } else {
        Err(FtpReplyParseError::ConnectionClosed)
    }
}

/// Read one complete reply, following multi-line continuations.
///
/// A reply over the configured limits is an error, but it is still read up
/// to its terminator so that the next reply starts at a line boundary.
pub(crate) async fn read_reply<R>(
    reader: &mut R,
    config: &FtpControlConfig,
) -> Result<FtpReply, FtpReplyParseError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::<u8>::with_capacity(256);
    let mut error = read_reply_line(reader, &mut buf, config.max_line_len)
        .await?
        .then_some(FtpReplyParseError::LineTooLong);
    if buf.len() < 5 {
        // at least <code>\n
        return Err(FtpReplyParseError::InvalidLineFormat);
    }

    match buf[3] {
        b' ' => match error {
            Some(e) => Err(e),
            None => FtpReply::parse_single_line(&buf),
        },
        b'-' => {
            let mut ml_parser = FtpReply::get_multi_line_parser(&buf)?;
            if error.is_none() {
                error = ml_parser.push_line(&buf).err();
            }
            loop {
                let cut = read_reply_line(reader, &mut buf, config.max_line_len).await?;
                let end = ml_parser.is_end_line(&buf);
                if error.is_none() {
                    if cut {
                        error = Some(FtpReplyParseError::LineTooLong);
                    } else if config.max_multi_lines > 0
                        && ml_parser.line_count() >= config.max_multi_lines
                    {
                        error = Some(FtpReplyParseError::TooManyLines);
                    } else {
                        error = ml_parser.push_line(&buf).err();
                    }
                }
                if end {
                    return match error {
                        Some(e) => Err(e),
                        None => Ok(ml_parser.finish()),
                    };
                }
            }
        }
        _ => Err(FtpReplyParseError::InvalidLineFormat),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn parse(data: &'static [u8]) -> Result<FtpReply, FtpReplyParseError> {
        let mut reader = data;
        read_reply(&mut reader, &FtpControlConfig::default()).await
    }

    #[tokio::test]
    async fn single_line() {
        let reply = parse(b"550 No such file\r\n").await.unwrap();
        assert_eq!(reply.code(), 550);
        assert!(!reply.is_multi_line());
        assert!(reply.is_failure());
        assert_eq!(reply.text(), "No such file");
        assert_eq!(reply.to_string(), "550 No such file");
    }

    #[tokio::test]
    async fn multi_line() {
        let reply = parse(b"230-Welcome\r\n230-line2\r\n230 done\r\n")
            .await
            .unwrap();
        assert_eq!(reply.code(), 230);
        assert!(reply.is_multi_line());
        assert!(reply.is_completion());
        assert_eq!(reply.lines(), &["Welcome", "line2", "done"]);
        assert!(!reply.text().contains("230"));
    }

    #[tokio::test]
    async fn multi_line_free_body() {
        let reply = parse(b"211-Features:\r\n MDTM\r\n\r\n SIZE\r\n211 End\r\n")
            .await
            .unwrap();
        assert_eq!(reply.code(), 211);
        assert_eq!(reply.lines(), &["Features:", " MDTM", "", " SIZE", "End"]);
    }

    #[tokio::test]
    async fn multi_line_other_code_inside() {
        let reply = parse(b"220-hello\r\n221 not the end\r\n220 end\r\n")
            .await
            .unwrap();
        assert_eq!(reply.code(), 220);
        assert_eq!(reply.lines(), &["hello", "221 not the end", "end"]);
    }

    #[tokio::test]
    async fn multi_line_bare_terminator() {
        let reply = parse(b"250-first\r\n250\r\n").await.unwrap();
        assert_eq!(reply.lines(), &["first", ""]);
    }

    #[tokio::test]
    async fn two_replies_in_stream() {
        let mut reader: &[u8] = b"150 Opening\r\n226 Done\r\n";
        let config = FtpControlConfig::default();
        let reply = read_reply(&mut reader, &config).await.unwrap();
        assert!(reply.is_preliminary());
        let reply = read_reply(&mut reader, &config).await.unwrap();
        assert_eq!(reply.code(), 226);
    }

    #[tokio::test]
    async fn eof_before_terminator() {
        let r = parse(b"230-Welcome\r\n230-line2\r\n").await;
        assert!(matches!(r, Err(FtpReplyParseError::ConnectionClosed)));

        let r = parse(b"").await;
        assert!(matches!(r, Err(FtpReplyParseError::ConnectionClosed)));

        let r = parse(b"220 half a li").await;
        assert!(matches!(r, Err(FtpReplyParseError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn malformed() {
        let r = parse(b"22\r\n").await;
        assert!(matches!(r, Err(FtpReplyParseError::InvalidLineFormat)));

        let r = parse(b"abc hello\r\n").await;
        assert!(matches!(r, Err(FtpReplyParseError::InvalidLineFormat)));

        let r = parse(b"220+hello\r\n").await;
        assert!(matches!(r, Err(FtpReplyParseError::InvalidLineFormat)));

        let r = parse(b"999 hello\r\n").await;
        assert!(matches!(r, Err(FtpReplyParseError::InvalidReplyCode(999))));

        let r = parse(b"220 \xff\xfe\r\n").await;
        assert!(matches!(r, Err(FtpReplyParseError::LineIsNotUtf8)));
    }

    #[tokio::test]
    async fn limits() {
        let config = FtpControlConfig {
            max_line_len: 16,
            max_multi_lines: 2,
            ..Default::default()
        };

        let mut reader: &[u8] = b"220 this line is much too long\r\n200 next\r\n";
        let r = read_reply(&mut reader, &config).await;
        assert!(matches!(r, Err(FtpReplyParseError::LineTooLong)));
        let reply = read_reply(&mut reader, &config).await.unwrap();
        assert_eq!(reply.code(), 200);

        let mut reader: &[u8] = b"220-a\r\n220-b\r\n220-c\r\n220 d\r\n200 next\r\n";
        let r = read_reply(&mut reader, &config).await;
        assert!(matches!(r, Err(FtpReplyParseError::TooManyLines)));
        let reply = read_reply(&mut reader, &config).await.unwrap();
        assert_eq!(reply.code(), 200);

        let mut reader: &[u8] = b"220-a\r\n220-this body line is too long\r\n220 d\r\n200 next\r\n";
        let r = read_reply(&mut reader, &config).await;
        assert!(matches!(r, Err(FtpReplyParseError::LineTooLong)));
        let reply = read_reply(&mut reader, &config).await.unwrap();
        assert_eq!(reply.code(), 200);

        let mut reader: &[u8] = b"220-this first line is too long\r\n220 d\r\n200 next\r\n";
        let r = read_reply(&mut reader, &config).await;
        assert!(matches!(r, Err(FtpReplyParseError::LineTooLong)));
        let reply = read_reply(&mut reader, &config).await.unwrap();
        assert_eq!(reply.code(), 200);

        let mut reader: &[u8] = b"220-a\r\n\xff\r\n220 d\r\n200 next\r\n";
        let r = read_reply(&mut reader, &config).await;
        assert!(matches!(r, Err(FtpReplyParseError::LineIsNotUtf8)));
        let reply = read_reply(&mut reader, &config).await.unwrap();
        assert_eq!(reply.code(), 200);
    }

    #[tokio::test]
    async fn unbounded_by_default() {
        let config = FtpControlConfig::default();
        assert_eq!(config.max_line_len, 0);
        assert_eq!(config.max_multi_lines, 0);

        let mut data = Vec::new();
        for i in 0..500 {
            data.extend_from_slice(format!("214-help line {i}\r\n").as_bytes());
        }
        let long_line = "x".repeat(64 * 1024);
        data.extend_from_slice(format!("214-{long_line}\r\n214 end\r\n").as_bytes());

        let mut reader = data.as_slice();
        let reply = read_reply(&mut reader, &config).await.unwrap();
        assert_eq!(reply.code(), 214);
        assert_eq!(reply.lines().len(), 502);
        assert_eq!(reply.lines()[499], "help line 499");
        assert_eq!(reply.lines()[500], long_line);
        assert!(reader.is_empty());
    }

    #[test]
    fn pasv_tuple() {
        let reply = FtpReply::new(
            227,
            vec!["Entering Passive Mode (127,0,0,1,19,136).".to_string()],
        );
        let addr = reply.parse_pasv_227_reply().unwrap();
        assert_eq!(addr, SocketAddr::from_str("127.0.0.1:5000").unwrap());

        let addr = parse_pasv_tuple("=(192, 168, 1, 2, 0, 21)").unwrap();
        assert_eq!(addr, SocketAddr::from_str("192.168.1.2:21").unwrap());

        assert!(parse_pasv_tuple("Entering Passive Mode").is_none());
        assert!(parse_pasv_tuple("(127,0,0,1,19)").is_none());
        assert!(parse_pasv_tuple("(127,0,0,1,19,256)").is_none());
        assert!(parse_pasv_tuple("(127,0,0,1,19,136").is_none());
    }

    #[test]
    fn pwd_path() {
        let reply = FtpReply::new(257, vec!["\"/home/ftp\" is current directory".to_string()]);
        assert_eq!(reply.parse_pwd_257_reply().unwrap(), "/home/ftp");

        let reply = FtpReply::new(257, vec!["\"/a \"\"b\"\"\" created".to_string()]);
        assert_eq!(reply.parse_pwd_257_reply().unwrap(), "/a \"b\"");

        let reply = FtpReply::new(257, vec!["no quote here".to_string()]);
        assert!(reply.parse_pwd_257_reply().is_none());

        let reply = FtpReply::new(257, vec!["\"/unterminated".to_string()]);
        assert!(reply.parse_pwd_257_reply().is_none());
    }
}
