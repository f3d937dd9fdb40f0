use std::collections::VecDeque;
use std::io::{self, Read, Write};

/// In-memory socket that hands out its input in caller-chosen pieces and
/// records everything written to it.
#[derive(Debug, Default)]
pub struct ScriptedStream {
    pieces: VecDeque<Vec<u8>>,
    pub written: Vec<u8>,
    pub reads: usize,
}

impl ScriptedStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues bytes that will be returned by at most one read call each.
    pub fn push(&mut self, piece: &[u8]) -> &mut Self {
        self.pieces.push_back(piece.to_vec());
        self
    }

    pub fn pending(&self) -> usize {
        self.pieces.iter().map(Vec::len).sum()
    }
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reads += 1;
        let Some(mut piece) = self.pieces.pop_front() else {
            return Ok(0);
        };
        let n = piece.len().min(buf.len());
        buf[..n].copy_from_slice(&piece[..n]);
        if n < piece.len() {
            self.pieces.push_front(piece.split_off(n));
        }
        Ok(n)
    }
}

impl Write for ScriptedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
