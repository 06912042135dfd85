//! Buffered line source with mark/seek/reset.
//!
//! While a stream's format is still being probed every line pulled from the source is
//! retained, so the probe engine can rewind to any earlier line offset and offer the same
//! bytes to the next candidate decoder. Once a format is pinned the cursor is marked
//! unbuffered and consumed lines are released as they are handed out.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CursorError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Cannot seek to offset {offset}: outside the buffered window {start}..={end}")]
    OutOfBuffer { offset: u64, start: u64, end: u64 },
}

struct BufferedLine {
    offset: u64,
    bytes: Vec<u8>,
}

pub struct LineCursor {
    source: Box<dyn BufRead>,
    lines: VecDeque<BufferedLine>,
    /// Index in `lines` of the next line to hand out
    next: usize,
    /// Offset of the first byte not yet pulled from `source`
    source_offset: u64,
    source_done: bool,
    buffered: bool,
}

impl LineCursor {
    pub fn new(source: impl BufRead + 'static) -> Self {
        Self {
            source: Box::new(source),
            lines: VecDeque::new(),
            next: 0,
            source_offset: 0,
            source_done: false,
            buffered: true,
        }
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(Cursor::new(bytes.into()))
    }

    /// Open a file as a line source
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the file cannot be opened.
    pub fn from_path(path: &Path) -> io::Result<Self> {
        File::open(path).map(BufReader::new).map(Self::new)
    }

    /// Read the next line into `buf`, without its line terminator.
    ///
    /// Returns `false` once the source is exhausted.
    ///
    /// # Errors
    ///
    /// Returns `CursorError::Io` if the source cannot be read.
    pub fn read_line(&mut self, buf: &mut String) -> Result<bool, CursorError> {
        buf.clear();
        if self.next == self.lines.len() && !self.pull()? {
            return Ok(false);
        }

        let mut bytes = self.lines[self.next].bytes.as_slice();
        if let Some(stripped) = bytes.strip_suffix(b"\n") {
            bytes = stripped;
        }
        if let Some(stripped) = bytes.strip_suffix(b"\r") {
            bytes = stripped;
        }
        buf.push_str(&String::from_utf8_lossy(bytes));

        self.next += 1;
        if !self.buffered {
            self.release();
        }
        Ok(true)
    }

    /// Offset of the next line [`read_line`](Self::read_line) will return
    #[must_use]
    pub fn position(&self) -> u64 {
        self.lines
            .get(self.next)
            .map_or(self.source_offset, |line| line.offset)
    }

    /// Reposition to a line start previously reported by [`position`](Self::position)
    ///
    /// # Errors
    ///
    /// Returns `CursorError::OutOfBuffer` if the offset is not a retained line start.
    pub fn seek(&mut self, offset: u64) -> Result<(), CursorError> {
        if offset == self.source_offset {
            self.next = self.lines.len();
            return Ok(());
        }
        match self.lines.iter().position(|line| line.offset == offset) {
            Some(index) => {
                self.next = index;
                Ok(())
            }
            None => Err(CursorError::OutOfBuffer {
                offset,
                start: self
                    .lines
                    .front()
                    .map_or(self.source_offset, |line| line.offset),
                end: self.source_offset,
            }),
        }
    }

    /// True when no line remains, buffered or in the source
    ///
    /// # Errors
    ///
    /// Returns `CursorError::Io` if the source cannot be read.
    pub fn is_eof(&mut self) -> Result<bool, CursorError> {
        if self.next < self.lines.len() {
            return Ok(false);
        }
        Ok(!self.pull()?)
    }

    /// Skip blank lines, returning whether a non-blank line follows
    ///
    /// # Errors
    ///
    /// Returns `CursorError::Io` if the source cannot be read.
    pub fn skip_blank_lines(&mut self) -> Result<bool, CursorError> {
        let mut line = String::new();
        loop {
            let position = self.position();
            if !self.read_line(&mut line)? {
                return Ok(false);
            }
            if !line.trim().is_empty() {
                self.seek(position)?;
                return Ok(true);
            }
        }
    }

    #[must_use]
    pub fn is_buffered(&self) -> bool {
        self.buffered
    }

    /// Stop retaining consumed lines. Only the most recently read line can still be
    /// revisited.
    pub fn mark_unbuffered(&mut self) {
        self.buffered = false;
        self.release();
    }

    fn pull(&mut self) -> io::Result<bool> {
        if self.source_done {
            return Ok(false);
        }
        let mut bytes = Vec::new();
        let n = self.source.read_until(b'\n', &mut bytes)?;
        if n == 0 {
            self.source_done = true;
            return Ok(false);
        }
        self.lines.push_back(BufferedLine {
            offset: self.source_offset,
            bytes,
        });
        self.source_offset += n as u64;
        Ok(true)
    }

    /// Drop consumed lines, keeping the last one handed out so it can be pushed back
    fn release(&mut self) {
        let keep_from = self.next.saturating_sub(1);
        self.lines.drain(..keep_from);
        self.next -= keep_from;
    }
}
