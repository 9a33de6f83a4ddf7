//! Byte stream over an open file handle

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use crate::error::FsResult;
use crate::ops::{CloseHandle, Engine, HandleLength, ReadAt, SetLength, WriteAt};
use crate::path::AbsolutePath;
use crate::types::{FileAccess, HandleId};

/// Open file. Dropping the stream closes its handle.
pub struct FileStream {
    engine: Arc<Engine>,
    handle: Option<HandleId>,
    path: AbsolutePath,
    access: FileAccess,
    position: u64,
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "Cannot access a closed file.")
}

impl FileStream {
    pub(crate) fn new(
        engine: Arc<Engine>,
        handle: HandleId,
        path: AbsolutePath,
        access: FileAccess,
        position: u64,
    ) -> Self {
        Self {
            engine,
            handle: Some(handle),
            path,
            access,
            position,
        }
    }

    /// Path the stream was opened with.
    pub fn path(&self) -> &AbsolutePath {
        &self.path
    }

    pub fn handle(&self) -> Option<HandleId> {
        self.handle
    }

    pub fn can_read(&self) -> bool {
        self.handle.is_some() && self.access.can_read()
    }

    pub fn can_write(&self) -> bool {
        self.handle.is_some() && self.access.can_write()
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn set_position(&mut self, position: u64) {
        self.position = position;
    }

    fn open_handle(&self) -> io::Result<HandleId> {
        self.handle.ok_or_else(closed)
    }

    pub fn len(&self) -> io::Result<u64> {
        let handle = self.open_handle()?;
        Ok(self.engine.execute(HandleLength {
            handle,
            path: &self.path,
        })?)
    }

    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Grow or cut the file. The position is clamped to the new length.
    pub fn set_len(&mut self, len: u64) -> io::Result<()> {
        let handle = self.open_handle()?;
        if !self.access.can_write() {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "Stream does not support writing.",
            ));
        }
        self.engine.execute(SetLength {
            handle,
            path: &self.path,
            len,
        })?;
        self.position = self.position.min(len);
        Ok(())
    }

    /// Release the handle. Further I/O fails.
    pub fn close(&mut self) -> FsResult<()> {
        match self.handle.take() {
            Some(handle) => self.engine.execute(CloseHandle { handle }),
            None => Ok(()),
        }
    }
}

impl Read for FileStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let handle = self.open_handle()?;
        if !self.access.can_read() {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "Stream does not support reading.",
            ));
        }
        let bytes = self.engine.execute(ReadAt {
            handle,
            path: &self.path,
            offset: self.position,
            len: buf.len(),
        })?;
        buf[..bytes.len()].copy_from_slice(&bytes);
        self.position += bytes.len() as u64;
        Ok(bytes.len())
    }
}

impl Write for FileStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let handle = self.open_handle()?;
        if !self.access.can_write() {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "Stream does not support writing.",
            ));
        }
        self.engine.execute(WriteAt {
            handle,
            path: &self.path,
            offset: self.position,
            data: buf,
        })?;
        self.position += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.open_handle().map(|_| ())
    }
}

impl Seek for FileStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (base, offset) = match pos {
            SeekFrom::Start(offset) => {
                self.position = offset;
                return Ok(offset);
            }
            SeekFrom::End(offset) => (self.len()?, offset),
            SeekFrom::Current(offset) => (self.position, offset),
        };
        let target = i128::from(base) + i128::from(offset);
        let position = u64::try_from(target).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "An attempt was made to move the position before the beginning of the stream.",
            )
        })?;
        self.position = position;
        Ok(position)
    }
}

impl Drop for FileStream {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl std::fmt::Debug for FileStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStream")
            .field("path", &self.path.to_string())
            .field("handle", &self.handle)
            .field("access", &self.access)
            .field("position", &self.position)
            .finish()
    }
}
