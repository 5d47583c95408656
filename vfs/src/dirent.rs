use alloc::string::String;

/// `ls`产出的目录项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    /// 文件大小（字节）
    pub size: usize,
    /// 首个数据块的编号，空文件为链尾标记
    pub first_block: u16,
}
