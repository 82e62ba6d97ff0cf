//! Byte-counting stream wrappers used by the readers and writers.
//!
//! [`ByteCountingReader`] tracks the number of bytes consumed from the
//! underlying transport and supports pushing bytes back (format
//! auto-detection peeks at the stream head without disturbing the count).
//! [`CountingWriter`] is the write-side mirror.

use std::io::{self, Read, Write};

/// A reader that counts consumed bytes and supports push-back.
///
/// Pushed-back bytes are re-delivered before any further transport reads,
/// and `consumed()` is decremented on push-back so the counter always
/// reflects bytes the *caller* has seen exactly once.
pub struct ByteCountingReader<R: Read> {
    inner:    R,
    pushback: Vec<u8>,
    consumed: u64,
}

impl<R: Read> ByteCountingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pushback: Vec::new(),
            consumed: 0,
        }
    }

    /// Total bytes delivered to the caller so far.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Push bytes back onto the stream head.  The next reads return them
    /// first, in the original order.
    pub fn unread(&mut self, bytes: &[u8]) {
        // Pushback is a stack of single bytes; insert in reverse so the
        // first byte of `bytes` pops first.
        for &b in bytes.iter().rev() {
            self.pushback.push(b);
        }
        self.consumed = self.consumed.saturating_sub(bytes.len() as u64);
    }

    /// Read a single byte, or `None` at end of stream.
    pub fn read_byte(&mut self) -> io::Result<Option<u8>> {
        if let Some(b) = self.pushback.pop() {
            self.consumed += 1;
            return Ok(Some(b));
        }
        let mut buf = [0u8; 1];
        loop {
            match self.inner.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.consumed += 1;
                    return Ok(Some(buf[0]));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Read one `\n`-terminated line, returning its bytes without the
    /// terminator (a preceding `\r` is also stripped).  Returns `None` at
    /// end of stream; a final line without a terminator is still returned.
    pub fn read_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut line = Vec::new();
        loop {
            match self.read_byte()? {
                None => {
                    if line.is_empty() {
                        return Ok(None);
                    }
                    return Ok(Some(line));
                }
                Some(b'\n') => {
                    if line.last() == Some(&b'\r') {
                        line.pop();
                    }
                    return Ok(Some(line));
                }
                Some(b) => line.push(b),
            }
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for ByteCountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if !self.pushback.is_empty() {
            let mut n = 0;
            while n < buf.len() {
                match self.pushback.pop() {
                    Some(b) => {
                        buf[n] = b;
                        n += 1;
                    }
                    None => break,
                }
            }
            self.consumed += n as u64;
            return Ok(n);
        }
        let n = self.inner.read(buf)?;
        self.consumed += n as u64;
        Ok(n)
    }
}

/// A writer that counts bytes pushed into the underlying sink.
pub struct CountingWriter<W: Write> {
    inner:   W,
    written: u64,
}

impl<W: Write> CountingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
