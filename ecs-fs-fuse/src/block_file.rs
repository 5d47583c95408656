use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use block_dev::{check_request, BlockDevice, BLOCK_SIZE};
use send_wrapper::SendWrapper;

/// A disk image on the host, read and written one whole block at a time.
#[derive(Debug)]
pub struct BlockFile {
    inner: SendWrapper<RefCell<File>>,
    blocks: usize,
}

impl BlockFile {
    /// Opens an existing image. Its length must be a multiple of [`BLOCK_SIZE`].
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let fd = OpenOptions::new().read(true).write(true).open(path)?;
        let len = fd.metadata()?.len() as usize;
        if len % BLOCK_SIZE != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("image of {len} bytes isn't made of whole blocks"),
            ));
        }

        Ok(Self::new(fd, len / BLOCK_SIZE))
    }

    /// Creates a zero-filled image of `blocks` blocks, truncating any existing file.
    pub fn create(path: impl AsRef<Path>, blocks: usize) -> io::Result<Self> {
        let fd = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        fd.set_len((blocks * BLOCK_SIZE) as u64)?;

        Ok(Self::new(fd, blocks))
    }

    fn new(fd: File, blocks: usize) -> Self {
        Self {
            inner: SendWrapper::new(RefCell::new(fd)),
            blocks,
        }
    }
}

fn device_error(block_id: usize, e: io::Error) -> block_dev::Error {
    log::error!("block {block_id}: {e}");
    block_dev::Error::Device
}

impl BlockDevice for BlockFile {
    fn block_count(&self) -> usize {
        self.blocks
    }

    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), block_dev::Error> {
        check_request(block_id, self.blocks, buf.len())?;
        let mut file = self.inner.borrow_mut();
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))
            .and_then(|_| file.read_exact(buf))
            .map_err(|e| device_error(block_id, e))
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), block_dev::Error> {
        check_request(block_id, self.blocks, buf.len())?;
        let mut file = self.inner.borrow_mut();
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))
            .and_then(|_| file.write_all(buf))
            .map_err(|e| device_error(block_id, e))
    }
}
