/// Splits an arbitrarily chunked byte stream into logical lines.
///
/// The unterminated tail is carried across calls to [`LineDecoder::feed`].
/// Lines are decoded as UTF-8 only once complete, so a multi-byte character
/// split across two chunks survives intact. `\n` and `\r\n` both terminate a
/// line; the terminator is not part of the yielded line.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return every line it completed, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        // Only the new bytes can contain a newline not seen before.
        let mut scan_from = self.buf.len();
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(pos) = self.buf[scan_from..].iter().position(|b| *b == b'\n') {
            let end = scan_from + pos;
            lines.push(decode_line(&self.buf[start..end]));
            start = end + 1;
            scan_from = start;
        }
        self.buf.drain(..start);
        lines
    }

    /// End of stream: emit the remainder, if any, as a final line.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buf);
        Some(decode_line(&rest))
    }

    /// Bytes held back waiting for a newline.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}
