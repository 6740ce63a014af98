/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

/// Local LF to wire CRLF.
pub(crate) fn encode_crlf(input: &[u8], output: &mut Vec<u8>) {
    output.reserve(input.len() + input.len() / 32);
    let mut start = 0;
    for pos in memchr::memchr_iter(b'\n', input) {
        output.extend_from_slice(&input[start..pos]);
        output.extend_from_slice(b"\r\n");
        start = pos + 1;
    }
    output.extend_from_slice(&input[start..]);
}

/// Wire CRLF to local LF.
///
/// A CR at the end of one chunk is held back until the next chunk shows
/// whether it starts a CRLF pair.
#[derive(Default)]
pub(crate) struct CrlfDecoder {
    pending_cr: bool,
}

impl CrlfDecoder {
    pub(crate) fn decode(&mut self, input: &[u8], output: &mut Vec<u8>) {
        output.reserve(input.len() + 1);
        for &b in input {
            if self.pending_cr {
                self.pending_cr = false;
                if b == b'\n' {
                    output.push(b'\n');
                    continue;
                }
                output.push(b'\r');
            }
            if b == b'\r' {
                self.pending_cr = true;
            } else {
                output.push(b);
            }
        }
    }

    pub(crate) fn finish(&mut self, output: &mut Vec<u8>) {
        if self.pending_cr {
            self.pending_cr = false;
            output.push(b'\r');
        }
    }
}
