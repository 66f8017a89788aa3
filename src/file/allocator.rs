//! Bump allocator bookkeeping
//!
//! 线性（bump）分配器记账
//!
//! Pure arithmetic over `(position, size)`. The writer asks for a [`Grant`],
//! performs any file growth the grant requires, and only then commits it, so a
//! failed extension never leaves a half-applied state behind.
//!
//! 对 `(position, size)` 的纯运算。写入器先获取 [`Grant`]，执行其要求的文件扩展，
//! 然后才提交，因此扩展失败不会留下部分应用的状态。

use super::error::{Error, Result};
use super::rva::Rva;
use std::num::NonZeroU64;

/// Allocation alignment in bytes
///
/// 分配对齐（字节）
pub const ALIGNMENT: u64 = 8;

/// Round `value` up to the next multiple of [`ALIGNMENT`], `None` on overflow
#[inline]
const fn align_up(value: u64) -> Option<u64> {
    match value.checked_add(ALIGNMENT - 1) {
        Some(padded) => Some(padded & !(ALIGNMENT - 1)),
        None => None,
    }
}

#[inline]
fn round_up_to(value: u64, granularity: u64) -> Option<u64> {
    value.checked_next_multiple_of(granularity)
}

/// An allocation that has been planned but not yet applied
///
/// 已规划但尚未应用的分配
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Grant {
    /// Returned RVA
    pub(crate) rva: Rva,

    /// Cursor after commit
    pub(crate) end: u64,

    /// New backing size when the file must grow first
    pub(crate) grow_to: Option<u64>,
}

/// Cursor and backing size of a dump file
///
/// 转储文件的游标与底层大小
#[derive(Debug, Clone)]
pub(crate) struct BumpAllocator {
    /// Next allocation position (logical size)
    ///
    /// 下一个分配位置（逻辑大小）
    position: u64,

    /// Bytes currently backed by the file
    ///
    /// 文件当前已扩展的字节数
    size: u64,

    /// Minimum growth step, a multiple of the page size
    ///
    /// 最小扩展步长，页大小的倍数
    granularity: NonZeroU64,
}

impl BumpAllocator {
    #[inline]
    pub(crate) fn new(granularity: NonZeroU64) -> Self {
        Self {
            position: 0,
            size: 0,
            granularity,
        }
    }

    /// Plan an allocation of `size` bytes
    ///
    /// 规划一次 `size` 字节的分配
    ///
    /// The range starts at the current position and covers `align_up(size)`
    /// bytes. If that overruns the backed region the grant asks for growth by
    /// `align_up(size)` rounded up to the granularity.
    ///
    /// 范围从当前位置开始，覆盖 `align_up(size)` 字节。如果超出已扩展区域，
    /// 授权会要求扩展 `align_up(size)` 向上取整到步长的字节数。
    pub(crate) fn plan(&self, size: NonZeroU64) -> Result<Grant> {
        let exhausted = || Error::AddressSpaceExhausted {
            position: self.position,
            requested: size.get(),
        };

        let aligned = align_up(size.get()).ok_or_else(exhausted)?;
        let end = self.position.checked_add(aligned).ok_or_else(exhausted)?;

        // The whole range must stay addressable by 32-bit RVAs.
        if end > u64::from(u32::MAX) {
            return Err(exhausted());
        }
        let rva = Rva::from_offset(self.position).ok_or_else(exhausted)?;

        let grow_to = if end > self.size {
            let growth = round_up_to(aligned, self.granularity.get()).ok_or_else(exhausted)?;
            Some(self.size.checked_add(growth).ok_or_else(exhausted)?)
        } else {
            None
        };

        Ok(Grant { rva, end, grow_to })
    }

    /// Apply a grant produced by [`plan`](Self::plan)
    ///
    /// 应用由 [`plan`](Self::plan) 产生的授权
    #[inline]
    pub(crate) fn commit(&mut self, grant: Grant) {
        debug_assert_eq!(grant.rva.offset(), self.position);
        if let Some(new_size) = grant.grow_to {
            self.size = new_size;
        }
        self.position = grant.end;
    }

    /// Check that `[offset, offset + len)` lies inside the backed region
    ///
    /// 检查 `[offset, offset + len)` 是否位于已扩展区域内
    #[inline]
    pub(crate) fn check_backed(&self, offset: u64, len: u64) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.size => Ok(()),
            _ => Err(Error::OutOfBounds {
                offset,
                len,
                limit: self.size,
            }),
        }
    }

    #[inline]
    pub(crate) fn position(&self) -> u64 {
        self.position
    }

    #[inline]
    pub(crate) fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub(crate) fn granularity(&self) -> NonZeroU64 {
        self.granularity
    }
}
