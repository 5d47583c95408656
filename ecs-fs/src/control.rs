use alloc::sync::Arc;

use block_dev::BlockDevice;
use derive_more::Display;

use crate::block::Block;
use crate::fd::FdTable;
use crate::volume::fat::FatTable;
use crate::volume::root_dir::RootDir;
use crate::volume::super_block::SuperBlock;
use crate::MAX_FILES;

/// 一次挂载期间的全部状态：超级块、FAT、根目录与打开文件表。
///
/// 元数据只在挂载时读入、在[`FileSystem::sync`]或卸载时写回，
/// 文件内容则直接读写设备。
#[derive(Debug)]
pub struct FileSystem {
    pub(crate) dev: Arc<dyn BlockDevice>,
    pub(crate) sb: SuperBlock,
    pub(crate) fat: FatTable,
    pub(crate) root: RootDir,
    pub(crate) fds: FdTable,
    /// 读写引擎的暂存块
    pub(crate) scratch: Block,
}

/// 文件系统概况
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
#[display(
    fmt = "FS Info:\ntotal_blk_count={}\nfat_blk_count={}\nrdir_blk={}\ndata_blk={}\ndata_blk_count={}\nfat_free_ratio={}/{}\nrdir_free_ratio={}/{}",
    total_blocks,
    fat_blocks,
    root_block,
    data_start,
    data_blocks,
    fat_free,
    data_blocks,
    dir_free,
    MAX_FILES
)]
pub struct FsInfo {
    pub total_blocks: usize,
    pub fat_blocks: usize,
    pub root_block: usize,
    pub data_start: usize,
    pub data_blocks: usize,
    /// 空闲的FAT条目数，分母为`data_blocks`
    pub fat_free: usize,
    /// 空闲的目录槽位数，分母为[`MAX_FILES`]
    pub dir_free: usize,
}

impl FileSystem {
    /// 读取并校验超级块，再把FAT和根目录读入内存。
    pub fn mount(dev: Arc<dyn BlockDevice>) -> vfs::Result<Self> {
        let mut scratch = Block::zeroed();
        scratch.load(&*dev, 0)?;

        let sb = SuperBlock::decode(&scratch)?;
        sb.validate(dev.block_count())?;

        let fat = FatTable::load(&*dev, &sb)?;
        let root = RootDir::load(&*dev, &sb)?;
        log::info!(
            "mounted: {} blocks, {} data blocks ({} free)",
            sb.total_blocks(),
            sb.data_blocks(),
            fat.free_count()
        );

        Ok(Self {
            dev,
            sb,
            fat,
            root,
            fds: FdTable::new(),
            scratch,
        })
    }

    /// 在设备上铺设一个空文件系统并挂载。
    ///
    /// 只写超级块、FAT和根目录，数据区保持原样。
    pub fn format(dev: Arc<dyn BlockDevice>) -> vfs::Result<Self> {
        let total_blocks = dev.block_count();
        let sb = SuperBlock::new(total_blocks).ok_or_else(|| {
            log::warn!("No valid layout for a device of {total_blocks} blocks");
            vfs::Error::InvalidImage
        })?;

        let mut fs = Self {
            fat: FatTable::new(sb.data_blocks()),
            root: RootDir::new(),
            fds: FdTable::new(),
            scratch: Block::zeroed(),
            dev,
            sb,
        };
        fs.sync()?;
        log::info!(
            "formatted: {} FAT blocks, {} data blocks",
            fs.sb.fat_blocks(),
            fs.sb.data_blocks()
        );

        Ok(fs)
    }

    /// 把超级块、FAT和根目录写回设备。
    pub fn sync(&mut self) -> vfs::Result<()> {
        self.sb.encode(&mut self.scratch)?;
        self.scratch.store(&*self.dev, 0)?;
        self.fat.persist(&*self.dev, &self.sb)?;
        self.root.persist(&*self.dev, &self.sb)
    }

    /// 写回元数据并结束本次挂载，交还块设备。
    ///
    /// 仍打开的句柄随之失效。
    pub fn unmount(mut self) -> vfs::Result<Arc<dyn BlockDevice>> {
        if self.fds.open_count() > 0 {
            log::warn!("unmount with {} open files", self.fds.open_count());
        }
        self.sync()?;
        log::info!("unmounted");
        Ok(self.dev)
    }

    pub fn info(&self) -> FsInfo {
        FsInfo {
            total_blocks: self.sb.total_blocks(),
            fat_blocks: self.sb.fat_blocks(),
            root_block: self.sb.root_block(),
            data_start: self.sb.data_start(),
            data_blocks: self.sb.data_blocks(),
            fat_free: self.fat.free_count(),
            dir_free: self.root.free_count(),
        }
    }

    /// 打开的句柄数
    pub fn open_files(&self) -> usize {
        self.fds.open_count()
    }
}

/// 挂载窗口：未挂载时一切操作都得到[`vfs::Error::NotMounted`]。
#[derive(Debug, Default)]
pub struct Session {
    fs: Option<FileSystem>,
}

impl Session {
    pub const fn new() -> Self {
        Self { fs: None }
    }

    pub fn mount(&mut self, dev: Arc<dyn BlockDevice>) -> vfs::Result<()> {
        if self.fs.is_some() {
            return Err(vfs::Error::AlreadyMounted);
        }
        self.fs = Some(FileSystem::mount(dev)?);
        Ok(())
    }

    /// 仍有打开的文件时拒绝卸载，文件系统保持挂载。
    /// 写回失败时本次挂载同样结束。
    pub fn unmount(&mut self) -> vfs::Result<Arc<dyn BlockDevice>> {
        let fs = self.fs.as_ref().ok_or(vfs::Error::NotMounted)?;
        if fs.open_files() > 0 {
            return Err(vfs::Error::FileOpen);
        }
        self.fs.take().ok_or(vfs::Error::NotMounted)?.unmount()
    }

    #[inline]
    pub fn is_mounted(&self) -> bool {
        self.fs.is_some()
    }

    pub fn fs(&self) -> vfs::Result<&FileSystem> {
        self.fs.as_ref().ok_or(vfs::Error::NotMounted)
    }

    pub fn fs_mut(&mut self) -> vfs::Result<&mut FileSystem> {
        self.fs.as_mut().ok_or(vfs::Error::NotMounted)
    }
}
