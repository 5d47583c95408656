use std::sync::{Arc, Mutex};

use block_dev::{BlockDevice, RamDisk, BLOCK_SIZE};
use ecs_fs::FileSystem;

/// 对指定的设备块返回读写错误
#[derive(Debug)]
struct FaultyDisk {
    inner: RamDisk,
    faulty_blocks: Mutex<Vec<usize>>,
}

impl FaultyDisk {
    fn new(blocks: usize) -> Self {
        Self {
            inner: RamDisk::new(blocks),
            faulty_blocks: Mutex::new(Vec::new()),
        }
    }

    fn break_block(&self, block_id: usize) {
        self.faulty_blocks.lock().unwrap().push(block_id);
    }

    fn check(&self, block_id: usize) -> Result<(), block_dev::Error> {
        if self.faulty_blocks.lock().unwrap().contains(&block_id) {
            Err(block_dev::Error::Device)
        } else {
            Ok(())
        }
    }
}

impl BlockDevice for FaultyDisk {
    fn block_count(&self) -> usize {
        self.inner.block_count()
    }

    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), block_dev::Error> {
        self.check(block_id)?;
        self.inner.read_block(block_id, buf)
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), block_dev::Error> {
        self.check(block_id)?;
        self.inner.write_block(block_id, buf)
    }
}

const IO_ERROR: vfs::Error = vfs::Error::Io(block_dev::Error::Device);

/// 100块的磁盘：0号超级块，1号FAT，2号根目录，数据区从3号开始
fn setup() -> (Arc<FaultyDisk>, FileSystem) {
    let disk = Arc::new(FaultyDisk::new(100));
    let fs = FileSystem::format(disk.clone()).unwrap();
    (disk, fs)
}

#[test]
fn mount_reports_device_errors() {
    let (disk, fs) = setup();
    fs.unmount().unwrap();

    disk.break_block(1);
    assert_eq!(FileSystem::mount(disk.clone()).unwrap_err(), IO_ERROR);
}

#[test]
fn failed_first_block_writes_nothing() {
    let (disk, mut fs) = setup();
    fs.create("f").unwrap();
    let fd = fs.open("f").unwrap();

    let free = fs.info().fat_free;

    // 首次分配得到1号数据块
    disk.break_block(3 + 1);
    assert_eq!(fs.write(fd, b"data"), Err(IO_ERROR));
    assert_eq!(fs.stat(fd), Ok(0));
    assert_eq!(fs.tell(fd), Ok(0));

    // 没写成的块退回空闲
    assert_eq!(fs.metadata(fd).unwrap().blocks, 0);
    assert_eq!(fs.info().fat_free, free);
    assert_eq!(fs.ls().next().unwrap().first_block, 0xFFFF);
}

#[test]
fn failure_midway_returns_short_count() {
    let (disk, mut fs) = setup();
    fs.create("f").unwrap();
    let fd = fs.open("f").unwrap();

    let free = fs.info().fat_free;

    disk.break_block(3 + 2);
    let data = vec![0x5A; 2 * BLOCK_SIZE];
    assert_eq!(fs.write(fd, &data), Ok(BLOCK_SIZE));
    assert_eq!(fs.stat(fd), Ok(BLOCK_SIZE));
    assert_eq!(fs.tell(fd), Ok(BLOCK_SIZE));
    assert_eq!(fs.metadata(fd).unwrap().blocks, 1);
    assert_eq!(fs.info().fat_free, free - 1);

    // 错误留给下一次调用，追加的块同样退回
    assert_eq!(fs.write(fd, &data), Err(IO_ERROR));
    assert_eq!(fs.metadata(fd).unwrap().blocks, 1);
    assert_eq!(fs.info().fat_free, free - 1);

    fs.seek(fd, 0).unwrap();
    let mut buf = vec![0; 2 * BLOCK_SIZE];
    assert_eq!(fs.read(fd, &mut buf), Ok(BLOCK_SIZE));
    assert!(buf[..BLOCK_SIZE].iter().all(|&b| b == 0x5A));
}

#[test]
fn read_failure_surfaces() {
    let (disk, mut fs) = setup();
    fs.create("f").unwrap();
    let fd = fs.open("f").unwrap();
    fs.write(fd, &vec![1; BLOCK_SIZE + 1]).unwrap();

    disk.break_block(3 + 1);
    fs.seek(fd, 0).unwrap();
    let mut buf = [0; 16];
    assert_eq!(fs.read(fd, &mut buf), Err(IO_ERROR));
    assert_eq!(fs.tell(fd), Ok(0));

    // 不满一块的覆盖写须先读出旧块
    assert_eq!(fs.write(fd, b"x"), Err(IO_ERROR));
}

#[test]
fn unmount_reports_flush_errors() {
    let (disk, fs) = setup();
    disk.break_block(2);
    assert_eq!(fs.unmount().unwrap_err(), IO_ERROR);
}
