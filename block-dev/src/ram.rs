use alloc::vec;
use alloc::vec::Vec;

use spin::Mutex;

use crate::{check_request, BlockDevice, Error, BLOCK_SIZE};

/// 内存中的块设备，整块镜像放在一个[`Vec`]里。
#[derive(Debug)]
pub struct RamDisk {
    data: Mutex<Vec<u8>>,
}

impl RamDisk {
    /// 创建`blocks`个全零块。
    pub fn new(blocks: usize) -> Self {
        Self {
            data: Mutex::new(vec![0; blocks * BLOCK_SIZE]),
        }
    }

    /// 由现成的镜像创建，镜像长度必须是块大小的整数倍。
    pub fn from_image(image: Vec<u8>) -> Result<Self, Error> {
        if image.len() % BLOCK_SIZE != 0 {
            return Err(Error::BadBuffer(image.len()));
        }
        Ok(Self {
            data: Mutex::new(image),
        })
    }

    /// 整个镜像的拷贝
    pub fn image(&self) -> Vec<u8> {
        self.data.lock().clone()
    }
}

impl BlockDevice for RamDisk {
    fn block_count(&self) -> usize {
        self.data.lock().len() / BLOCK_SIZE
    }

    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), Error> {
        let data = self.data.lock();
        check_request(block_id, data.len() / BLOCK_SIZE, buf.len())?;
        let start = block_id * BLOCK_SIZE;
        buf.copy_from_slice(&data[start..start + BLOCK_SIZE]);
        Ok(())
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), Error> {
        let mut data = self.data.lock();
        check_request(block_id, data.len() / BLOCK_SIZE, buf.len())?;
        let start = block_id * BLOCK_SIZE;
        data[start..start + BLOCK_SIZE].copy_from_slice(buf);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;

    #[test]
    fn block_passthrough() {
        let disk = RamDisk::new(2);
        assert_eq!(disk.block_count(), 2);

        let block = [0xAB; BLOCK_SIZE];
        disk.write_block(1, &block).unwrap();

        let mut read = vec![0; BLOCK_SIZE];
        disk.read_block(1, &mut read).unwrap();
        assert_eq!(read, block);

        disk.read_block(0, &mut read).unwrap();
        assert!(read.iter().all(|&b| b == 0));
    }

    #[test]
    fn rejects_bad_requests() {
        let disk = RamDisk::new(1);
        let mut buf = [0; BLOCK_SIZE];
        assert_eq!(disk.read_block(1, &mut buf), Err(Error::OutOfRange(1)));
        assert_eq!(disk.write_block(0, &buf[..10]), Err(Error::BadBuffer(10)));
        assert_eq!(
            RamDisk::from_image(vec![0; 100]).unwrap_err(),
            Error::BadBuffer(100)
        );
    }
}
