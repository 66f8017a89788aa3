//! Relative virtual addresses and on-disk descriptors
//!
//! 相对虚拟地址与磁盘描述符类型

use scroll::{Pread, Pwrite, SizeWith};
use std::fmt;

/// Relative virtual address
///
/// 相对虚拟地址
///
/// Byte offset from the start of the dump file. It is never a pointer: resolving
/// an RVA means reading the file at that offset.
///
/// 从转储文件开头起算的字节偏移。它从不是指针：解析 RVA 意味着在该偏移处读取文件。
///
/// # Examples
///
/// ```
/// use minidump_file_writer::Rva;
///
/// let rva = Rva::new(64);
/// assert!(rva.is_valid());
/// assert_eq!(rva.get(), 64);
/// assert!(!Rva::INVALID.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rva(u32);

impl Rva {
    /// Sentinel for "no allocation"
    ///
    /// 表示"无分配"的哨兵值
    pub const INVALID: Rva = Rva(u32::MAX);

    /// Wrap a raw offset
    ///
    /// 包装原始偏移
    #[inline]
    pub const fn new(offset: u32) -> Self {
        Self(offset)
    }

    /// Narrow a 64-bit file offset, `None` if it is not addressable
    ///
    /// 收窄 64 位文件偏移，无法寻址时返回 `None`
    #[inline]
    pub(crate) fn from_offset(offset: u64) -> Option<Self> {
        u32::try_from(offset)
            .ok()
            .filter(|&raw| raw != u32::MAX)
            .map(Self)
    }

    /// Get the raw offset
    ///
    /// 获取原始偏移
    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Get the offset widened for file arithmetic
    ///
    /// 获取用于文件运算的扩展偏移
    #[inline]
    pub const fn offset(self) -> u64 {
        self.0 as u64
    }

    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

impl Default for Rva {
    #[inline]
    fn default() -> Self {
        Self::INVALID
    }
}

impl From<Rva> for u32 {
    #[inline]
    fn from(rva: Rva) -> Self {
        rva.0
    }
}

impl fmt::Display for Rva {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Location descriptor
///
/// 位置描述符
///
/// Embeddable `(data_size, rva)` pair describing where a written object lives.
/// Laid out as in `MINIDUMP_LOCATION_DESCRIPTOR`: size first, then offset.
///
/// 可嵌入的 `(data_size, rva)` 对，描述已写入对象的位置。
/// 布局与 `MINIDUMP_LOCATION_DESCRIPTOR` 相同：先大小，后偏移。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pread, Pwrite, SizeWith)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LocationDescriptor {
    /// Object length in bytes
    ///
    /// 对象长度（字节）
    pub data_size: u32,

    /// Object start
    ///
    /// 对象起始位置
    pub rva: u32,
}

impl LocationDescriptor {
    #[inline]
    pub fn new(rva: Rva, data_size: u32) -> Self {
        Self {
            data_size,
            rva: rva.get(),
        }
    }

    /// Get the start as an [`Rva`]
    ///
    /// 以 [`Rva`] 形式获取起始位置
    #[inline]
    pub fn start(&self) -> Rva {
        Rva::new(self.rva)
    }

    /// Get the exclusive end offset
    ///
    /// 获取结束偏移（不包含）
    #[inline]
    pub fn end(&self) -> u64 {
        u64::from(self.rva) + u64::from(self.data_size)
    }
}

/// Memory descriptor
///
/// 内存描述符
///
/// Pairs the address a region had in the crashed process with the location of
/// its bytes in the dump.
///
/// 将区域在崩溃进程中的地址与其字节在转储中的位置配对。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pread, Pwrite, SizeWith)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemoryDescriptor {
    /// Address of the region in the source process
    ///
    /// 区域在源进程中的地址
    pub start_of_memory_range: u64,

    /// Where the captured bytes live in the file
    ///
    /// 捕获的字节在文件中的位置
    pub memory: LocationDescriptor,
}
