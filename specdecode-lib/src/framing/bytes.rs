use std::io::{self, ErrorKind};

/// Byte-at-a-time reader used while hunting for a sync marker, with bulk fills
/// once a marker has been located. Tracks the number of bytes consumed so frames
/// can report their stream offset.
pub(crate) struct Bytes<R>
where
    R: io::Read + Send,
{
    reader: R,
    num_read: usize,
    buf: [u8; 1],
}

impl<R> Bytes<R>
where
    R: io::Read + Send,
{
    pub fn new(reader: R) -> Self {
        Bytes {
            reader,
            num_read: 0,
            buf: [0u8; 1],
        }
    }

    /// Next byte, or `Ok(None)` at end of input.
    pub fn next(&mut self) -> Result<Option<u8>, io::Error> {
        loop {
            match self.reader.read(&mut self.buf) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.num_read += 1;
                    return Ok(Some(self.buf[0]));
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }

    /// Fill `buf` completely. Returns `Ok(false)` if the input ended first, in which
    /// case the contents of `buf` are unspecified.
    pub fn fill(&mut self, buf: &mut [u8]) -> Result<bool, io::Error> {
        if let Err(err) = self.reader.read_exact(buf) {
            if err.kind() == ErrorKind::UnexpectedEof {
                return Ok(false);
            }
            return Err(err);
        }
        self.num_read += buf.len();
        Ok(true)
    }

    pub fn offset(&self) -> usize {
        self.num_read
    }
}
