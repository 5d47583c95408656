#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    /// File size
    pub size: usize,
    /// Occupying blocks
    pub blocks: usize,
    /// Optimal I/O block size
    pub block_size: usize,
}
