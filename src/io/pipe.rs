//! Anonymous pipes.

use log::warn;

use crate::error::{Error, Result};
use crate::fd::{FileDescriptor, FileNum};

/// An anonymous pipe with both ends owned by this object.
///
/// Created with the close-on-exec flag; ends intended for a child process
/// must be handed over explicitly (see `ChildCloner`). Individual ends can
/// be closed or taken out for transferring ownership.
#[derive(Debug)]
pub struct Pipe {
    read_end: FileDescriptor,
    write_end: FileDescriptor,
}

impl Pipe {
    /// Creates a new pipe with CLOEXEC applied to both ends.
    pub fn new() -> Result<Pipe> {
        Self::with_flags(libc::O_CLOEXEC)
    }

    /// Creates a new non-blocking pipe with CLOEXEC applied to both ends.
    pub fn new_nonblocking() -> Result<Pipe> {
        Self::with_flags(libc::O_CLOEXEC | libc::O_NONBLOCK)
    }

    fn with_flags(flags: libc::c_int) -> Result<Pipe> {
        let mut fds = [0 as libc::c_int; 2];
        if unsafe { libc::pipe2(fds.as_mut_ptr(), flags) } == -1 {
            return Err(Error::api("pipe2"));
        }
        Ok(Pipe {
            read_end: FileDescriptor::new(FileNum::new(fds[0])),
            write_end: FileDescriptor::new(FileNum::new(fds[1])),
        })
    }

    pub fn read_end(&self) -> FileDescriptor {
        self.read_end
    }

    pub fn write_end(&self) -> FileDescriptor {
        self.write_end
    }

    pub fn have_read_end(&self) -> bool {
        self.read_end.valid()
    }

    pub fn have_write_end(&self) -> bool {
        self.write_end.valid()
    }

    pub fn close_read_end(&mut self) -> Result<()> {
        if self.read_end.valid() {
            self.read_end.close()?;
        }
        Ok(())
    }

    pub fn close_write_end(&mut self) -> Result<()> {
        if self.write_end.valid() {
            self.write_end.close()?;
        }
        Ok(())
    }

    /// Transfers ownership of the read end to the caller.
    pub fn take_read_end(&mut self) -> FileDescriptor {
        let fd = self.read_end;
        self.read_end.reset();
        fd
    }

    /// Transfers ownership of the write end to the caller.
    pub fn take_write_end(&mut self) -> FileDescriptor {
        let fd = self.write_end;
        self.write_end.reset();
        fd
    }

    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        self.read_end.read(buf)
    }

    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        self.write_end.write(buf)
    }
}

impl Drop for Pipe {
    fn drop(&mut self) {
        for end in [&mut self.read_end, &mut self.write_end] {
            if end.valid() {
                if let Err(err) = end.close() {
                    warn!("failed to close pipe end: {err}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let mut pipe = Pipe::new().unwrap();
        pipe.write(b"through the pipe").unwrap();
        let mut buf = [0u8; 32];
        let len = pipe.read(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"through the pipe");
        pipe.close_write_end().unwrap();
        // EOF after the write end is gone
        assert_eq!(pipe.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn pipe_buffer_size() {
        let pipe = Pipe::new().unwrap();
        let size = pipe.write_end().get_pipe_size().unwrap();
        assert!(size > 0);
        let new_size = pipe.write_end().set_pipe_size(size * 2).unwrap();
        assert!(new_size >= size * 2);
    }

    #[test]
    fn taken_end_survives_drop() {
        let mut taken = {
            let mut pipe = Pipe::new().unwrap();
            pipe.write(b"x").unwrap();
            pipe.take_read_end()
        };
        let mut buf = [0u8; 4];
        assert_eq!(taken.read(&mut buf).unwrap(), 1);
        taken.close().unwrap();
    }
}
