//! Buffered stream handles.

use super::AtomicFile;
use crate::error::{AtomError, Result};
use crate::flock::AccessMode;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// A locked file behind a buffer.
///
/// Same contract as [`AtomicFile`]: end it with [`AtomicStream::close`],
/// which flushes the buffer into the commit, or [`AtomicStream::cancel`],
/// which drops buffered bytes along with everything else.
#[derive(Debug)]
pub struct AtomicStream {
    inner: Buffered,
}

#[derive(Debug)]
enum Buffered {
    Reader(BufReader<AtomicFile>),
    Writer(BufWriter<AtomicFile>),
}

impl AtomicStream {
    pub(super) fn new(file: AtomicFile, capacity: usize) -> Self {
        let inner = match file.mode() {
            AccessMode::Read => Buffered::Reader(BufReader::with_capacity(capacity, file)),
            AccessMode::Write => Buffered::Writer(BufWriter::with_capacity(capacity, file)),
        };
        Self { inner }
    }

    fn file(&self) -> &AtomicFile {
        match &self.inner {
            Buffered::Reader(r) => r.get_ref(),
            Buffered::Writer(w) => w.get_ref(),
        }
    }

    pub fn path(&self) -> &Path {
        self.file().path()
    }

    pub fn mode(&self) -> AccessMode {
        self.file().mode()
    }

    pub fn is_created(&self) -> bool {
        self.file().is_created()
    }

    /// Flush buffered bytes, commit, and release the lock.
    ///
    /// If the flush fails nothing is committed: the stream is canceled and
    /// `Fault` returned.
    pub fn close(self) -> Result<()> {
        match self.inner {
            Buffered::Reader(r) => r.into_inner().close(),
            Buffered::Writer(w) => match w.into_inner() {
                Ok(file) => file.close(),
                Err(err) => {
                    let (source, writer) = err.into_parts();
                    let (file, _unflushed) = writer.into_parts();
                    let path = file.path().to_path_buf();
                    file.cancel();
                    Err(AtomError::fault("flush", &path, source))
                }
            },
        }
    }

    /// Drop buffered and staged writes and release the lock.
    pub fn cancel(self) {
        match self.inner {
            Buffered::Reader(r) => r.into_inner().cancel(),
            Buffered::Writer(w) => {
                let (file, _unflushed) = w.into_parts();
                file.cancel();
            }
        }
    }
}

impl Read for AtomicStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            Buffered::Reader(r) => r.read(buf),
            Buffered::Writer(w) => {
                w.flush()?;
                w.get_mut().read(buf)
            }
        }
    }
}

impl Write for AtomicStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.inner {
            Buffered::Reader(r) => r.get_mut().write(buf),
            Buffered::Writer(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.inner {
            Buffered::Reader(_) => Ok(()),
            Buffered::Writer(w) => w.flush(),
        }
    }
}

impl Seek for AtomicStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match &mut self.inner {
            Buffered::Reader(r) => r.seek(pos),
            Buffered::Writer(w) => w.seek(pos),
        }
    }
}
