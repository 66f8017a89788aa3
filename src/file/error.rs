//! Error types for minidump-file-writer
//!
//! minidump-file-writer 的错误类型

use std::io;
use thiserror::Error;

/// Error type for dump file operations
///
/// 转储文件操作的错误类型
///
/// Every variant is an environmental failure. Programmer errors (writing through
/// a writer that holds no file) panic instead of surfacing here.
///
/// 所有变体都是环境性失败。编程错误（在未持有文件的写入器上写入）会直接 panic。
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error
    ///
    /// I/O 错误
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The writer already holds a file
    ///
    /// 写入器已持有文件
    #[error("Writer already holds an open file / 写入器已持有打开的文件")]
    AlreadyOpen,

    /// Extending the backing file failed; allocator state is unchanged
    ///
    /// 扩展底层文件失败；分配器状态未改变
    #[error("Failed to grow dump file to {new_size} bytes / 无法将转储文件扩展到 {new_size} 字节: {source}")]
    Grow {
        new_size: u64,
        #[source]
        source: io::Error,
    },

    /// The allocation would end beyond what a 32-bit RVA can address
    ///
    /// 分配的结束位置超出 32 位 RVA 的寻址范围
    #[error(
        "Allocation of {requested} bytes at {position} exceeds the RVA range / 在 {position} 处分配 {requested} 字节超出 RVA 范围"
    )]
    AddressSpaceExhausted { position: u64, requested: u64 },

    /// Write outside the backed region or outside the reserved section
    ///
    /// 写入超出已扩展区域或预留段
    #[error(
        "Write of {len} bytes at offset {offset} exceeds limit {limit} / 在偏移 {offset} 处写入 {len} 字节超出上限 {limit}"
    )]
    OutOfBounds { offset: u64, len: u64, limit: u64 },

    /// Zero-length copy or allocation
    ///
    /// 零长度的复制或分配
    #[error("Zero-length write / 零长度写入")]
    ZeroLength,

    /// Source text could not be decoded
    ///
    /// 源文本无法解码
    #[error("Undecodable source text at element {index} / 源文本在第 {index} 个元素处无法解码")]
    InvalidText { index: usize },

    /// String byte length does not fit the 32-bit length field
    ///
    /// 字符串字节长度超出 32 位长度字段
    #[error("String of {units} UTF-16 units is too long / {units} 个 UTF-16 单元的字符串过长")]
    StringTooLong { units: u64 },

    /// A record failed to serialize
    ///
    /// 记录序列化失败
    #[error("Failed to encode record: {0}")]
    Encode(#[from] scroll::Error),
}

/// Convert from Error to io::Error for compatibility
///
/// 从 Error 转换到 io::Error 以保持兼容性
impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(io_err) => io_err,
            Error::Grow { source, .. } => source,
            Error::AlreadyOpen => io::Error::new(io::ErrorKind::AlreadyExists, err.to_string()),
            Error::AddressSpaceExhausted { .. } => {
                io::Error::new(io::ErrorKind::OutOfMemory, err.to_string())
            }
            Error::InvalidText { .. } => io::Error::new(io::ErrorKind::InvalidData, err.to_string()),
            Error::OutOfBounds { .. }
            | Error::ZeroLength
            | Error::StringTooLong { .. }
            | Error::Encode(_) => io::Error::new(io::ErrorKind::InvalidInput, err.to_string()),
        }
    }
}

/// Result type alias using our custom Error type
///
/// 使用自定义 Error 类型的 Result 类型别名
pub type Result<T> = std::result::Result<T, Error>;
