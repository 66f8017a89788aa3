//! Reserved sections of the dump file
//!
//! 转储文件中的预留段
//!
//! A section is the result of exactly one allocation. It remembers where it
//! starts and how long it is, and every write through it is checked against
//! those bounds before reaching the writer (which then checks the backed size).
//! Sections do not borrow the writer, so several can be filled in any order.
//!
//! 段是一次分配的结果。它记录起始位置和长度，所有通过它的写入在到达写入器之前
//! 都会先按这些边界检查（写入器随后再检查已扩展大小）。
//! 段不借用写入器，因此可以以任意顺序填充多个段。

use super::error::{Error, Result};
use super::platform::DumpFile;
use super::rva::{LocationDescriptor, Rva};
use super::writer::FileWriter;
use scroll::ctx::{SizeWith, TryIntoCtx};
use scroll::{Endian, Pwrite, LE};
use std::marker::PhantomData;
use std::num::NonZeroU64;

/// Fixed-size little-endian record
///
/// 固定大小的小端记录
///
/// Anything `scroll` can write with a size known from the type alone, e.g.
/// primitives and `#[derive(Pwrite, SizeWith)]` structs.
///
/// 任何 `scroll` 能写入且大小仅由类型决定的值，例如基本类型和
/// `#[derive(Pwrite, SizeWith)]` 结构体。
pub trait Record: TryIntoCtx<Endian, Error = scroll::Error> + SizeWith<Endian> + Copy {
    /// Encoded size in bytes
    ///
    /// 编码后的字节数
    #[inline]
    fn encoded_size() -> usize {
        Self::size_with(&LE)
    }
}

impl<T> Record for T where T: TryIntoCtx<Endian, Error = scroll::Error> + SizeWith<Endian> + Copy {}

/// Stack buffer used to encode records before writing them
const ENCODE_BUFFER: usize = 512;

/// Untyped reserved range
///
/// 无类型的预留范围
///
/// # Examples
///
/// ```
/// # use minidump_file_writer::{FileWriter, Result, UntypedSection};
/// # use tempfile::tempdir;
/// # fn main() -> Result<()> {
/// # let dir = tempdir()?;
/// # let path = dir.path().join("section.dmp");
/// # use std::num::NonZeroU64;
/// let mut writer = FileWriter::create(&path)?;
/// let section = UntypedSection::allocate(&mut writer, NonZeroU64::new(8).unwrap())?;
///
/// // Fill the second half first, then the first
/// // 先填充后半部分，再填充前半部分
/// section.copy(&mut writer, section.rva_at(4).unwrap(), b"tail")?;
/// section.write(&mut writer, b"head")?;
///
/// assert_eq!(section.location().data_size, 8);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, PartialEq, Eq)]
pub struct UntypedSection {
    /// Range start
    ///
    /// 范围起始
    position: Rva,

    /// Requested length (before alignment)
    ///
    /// 请求的长度（对齐前）
    size: u64,
}

impl UntypedSection {
    /// Reserve `size` bytes from the writer
    ///
    /// 从写入器预留 `size` 字节
    ///
    /// This is the only way to obtain a section, so each one is allocated exactly once.
    ///
    /// 这是获取段的唯一方式，因此每个段只被分配一次。
    pub fn allocate<F: DumpFile>(writer: &mut FileWriter<F>, size: NonZeroU64) -> Result<Self> {
        let position = writer.allocate(size)?;
        Ok(Self {
            position,
            size: size.get(),
        })
    }

    /// Write `src` at the absolute offset `at` inside this section
    ///
    /// 在本段内的绝对偏移 `at` 处写入 `src`
    ///
    /// # Errors
    /// [`Error::OutOfBounds`] unless `position <= at` and
    /// `at + src.len() <= position + size`, plus any error of [`FileWriter::copy`].
    ///
    /// # Errors
    /// 除非 `position <= at` 且 `at + src.len() <= position + size`，否则返回
    /// [`Error::OutOfBounds`]；另外还可能返回 [`FileWriter::copy`] 的任何错误。
    pub fn copy<F: DumpFile>(&self, writer: &mut FileWriter<F>, at: Rva, src: &[u8]) -> Result<()> {
        let offset = at.offset();
        let len = src.len() as u64;
        let in_bounds = offset >= self.position.offset()
            && offset.checked_add(len).is_some_and(|end| end <= self.end());
        if !in_bounds {
            return Err(Error::OutOfBounds {
                offset,
                len,
                limit: self.end(),
            });
        }
        writer.copy(at, src)
    }

    /// Write `src` at the start of this section
    ///
    /// 在本段起始处写入 `src`
    #[inline]
    pub fn write<F: DumpFile>(&self, writer: &mut FileWriter<F>, src: &[u8]) -> Result<()> {
        self.copy(writer, self.position, src)
    }

    /// RVA of the byte `offset` bytes into this section
    ///
    /// 本段内偏移 `offset` 字节处的 RVA
    #[inline]
    pub fn rva_at(&self, offset: u64) -> Option<Rva> {
        if offset > self.size {
            return None;
        }
        u32::try_from(self.position.offset() + offset)
            .ok()
            .map(Rva::new)
    }

    #[inline]
    pub fn position(&self) -> Rva {
        self.position
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    fn end(&self) -> u64 {
        self.position.offset() + self.size
    }

    /// Location descriptor covering the whole section
    ///
    /// 覆盖整个段的位置描述符
    #[inline]
    pub fn location(&self) -> LocationDescriptor {
        // Allocation keeps every range below 4 GiB, so the size always fits.
        LocationDescriptor::new(self.position, self.size as u32)
    }
}

/// Section holding a `T`, an array of `T`, or a `T` followed by an array
///
/// 存放一个 `T`、一个 `T` 数组，或一个 `T` 后跟数组的段
///
/// # Examples
///
/// ```
/// # use minidump_file_writer::{FileWriter, LocationDescriptor, Result, Rva, TypedSection};
/// # use tempfile::tempdir;
/// # fn main() -> Result<()> {
/// # let dir = tempdir()?;
/// # let path = dir.path().join("typed.dmp");
/// let mut writer = FileWriter::create(&path)?;
///
/// // A u32 count followed by three locations
/// // 一个 u32 计数后跟三个位置
/// let list = TypedSection::<u32>::alloc_object_and_array(&mut writer, 3, 8)?;
/// list.set(&mut writer, 3)?;
/// let entries = [LocationDescriptor::new(Rva::new(0), 4); 3];
/// list.copy_index_after_object(&mut writer, 0, &entries)?;
///
/// assert_eq!(list.location().data_size, 4 + 3 * 8);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TypedSection<T> {
    section: UntypedSection,
    _record: PhantomData<T>,
}

impl<T: Record> TypedSection<T> {
    fn from_section(section: UntypedSection) -> Self {
        Self {
            section,
            _record: PhantomData,
        }
    }

    fn record_size() -> u64 {
        T::encoded_size() as u64
    }

    /// Reserve room for one `T`
    ///
    /// 预留一个 `T` 的空间
    pub fn alloc<F: DumpFile>(writer: &mut FileWriter<F>) -> Result<Self> {
        let size = NonZeroU64::new(Self::record_size()).ok_or(Error::ZeroLength)?;
        UntypedSection::allocate(writer, size).map(Self::from_section)
    }

    /// Reserve room for one `T` and write it
    ///
    /// 预留一个 `T` 的空间并写入
    pub fn alloc_with_val<F: DumpFile>(writer: &mut FileWriter<F>, value: T) -> Result<Self> {
        let section = Self::alloc(writer)?;
        section.set(writer, value)?;
        Ok(section)
    }

    /// Reserve room for `count` consecutive `T`
    ///
    /// 预留 `count` 个连续 `T` 的空间
    ///
    /// # Errors
    /// [`Error::ZeroLength`] if `count` is zero.
    ///
    /// # Errors
    /// `count` 为零时返回 [`Error::ZeroLength`]。
    pub fn alloc_array<F: DumpFile>(writer: &mut FileWriter<F>, count: usize) -> Result<Self> {
        let size = Self::record_size()
            .checked_mul(count as u64)
            .ok_or(Error::AddressSpaceExhausted {
                position: writer.position(),
                requested: u64::MAX,
            })?;
        let size = NonZeroU64::new(size).ok_or(Error::ZeroLength)?;
        UntypedSection::allocate(writer, size).map(Self::from_section)
    }

    /// Reserve one `T` followed by `count` elements of `element_size` bytes
    ///
    /// 预留一个 `T`，其后跟 `count` 个 `element_size` 字节的元素
    pub fn alloc_object_and_array<F: DumpFile>(
        writer: &mut FileWriter<F>,
        count: usize,
        element_size: usize,
    ) -> Result<Self> {
        let exhausted = || Error::AddressSpaceExhausted {
            position: writer.position(),
            requested: u64::MAX,
        };
        let size = (count as u64)
            .checked_mul(element_size as u64)
            .and_then(|array| array.checked_add(Self::record_size()))
            .ok_or_else(exhausted)?;
        let size = NonZeroU64::new(size).ok_or(Error::ZeroLength)?;
        UntypedSection::allocate(writer, size).map(Self::from_section)
    }

    /// Write the `T` at the start of the section
    ///
    /// 在段的起始处写入 `T`
    #[inline]
    pub fn set<F: DumpFile>(&self, writer: &mut FileWriter<F>, value: T) -> Result<()> {
        self.set_value_at(writer, value, 0)
    }

    /// Write element `index` of an array section
    ///
    /// 写入数组段的第 `index` 个元素
    pub fn set_value_at<F: DumpFile>(
        &self,
        writer: &mut FileWriter<F>,
        value: T,
        index: usize,
    ) -> Result<()> {
        let at = self.element_rva(0, Self::record_size(), index)?;
        write_records(&self.section, writer, at, std::slice::from_ref(&value))
    }

    /// Write `items` into the array that follows the `T`, starting at `index`
    ///
    /// 从 `index` 开始，将 `items` 写入紧随 `T` 之后的数组
    ///
    /// Elements are encoded through a fixed stack buffer, so arbitrarily long
    /// slices never need a heap copy. A record too large for that buffer is
    /// encoded one at a time through a buffer of its own size.
    ///
    /// 元素通过固定大小的栈缓冲区编码，因此任意长度的切片都不需要堆拷贝。
    /// 超出该缓冲区的记录会逐个通过与其大小相同的缓冲区编码。
    pub fn copy_index_after_object<F: DumpFile, E: Record>(
        &self,
        writer: &mut FileWriter<F>,
        index: usize,
        items: &[E],
    ) -> Result<()> {
        let at = self.element_rva(Self::record_size(), E::encoded_size() as u64, index)?;
        write_records(&self.section, writer, at, items)
    }

    fn element_rva(&self, base: u64, element_size: u64, index: usize) -> Result<Rva> {
        let offset = element_size
            .checked_mul(index as u64)
            .and_then(|offset| offset.checked_add(base));
        offset
            .and_then(|offset| self.section.rva_at(offset))
            .ok_or(Error::OutOfBounds {
                offset: offset.unwrap_or(u64::MAX),
                len: element_size,
                limit: self.section.end(),
            })
    }

    /// Location descriptor covering the whole section
    ///
    /// 覆盖整个段的位置描述符
    #[inline]
    pub fn location(&self) -> LocationDescriptor {
        self.section.location()
    }

    #[inline]
    pub fn position(&self) -> Rva {
        self.section.position()
    }

    /// The untyped section underneath
    ///
    /// 底层的无类型段
    #[inline]
    pub fn as_untyped(&self) -> &UntypedSection {
        &self.section
    }
}

/// Encode `items` chunk by chunk and write them contiguously from `at`
fn write_records<F: DumpFile, E: Record>(
    section: &UntypedSection,
    writer: &mut FileWriter<F>,
    at: Rva,
    items: &[E],
) -> Result<()> {
    let element_size = E::encoded_size();
    if element_size == 0 || items.is_empty() {
        return Err(Error::ZeroLength);
    }

    // Records larger than the stack buffer (CPU contexts) get a buffer of
    // exactly one record, so memory still does not grow with the slice.
    let mut stack = [0u8; ENCODE_BUFFER];
    let mut heap = Vec::new();
    let buf: &mut [u8] = if element_size <= ENCODE_BUFFER {
        &mut stack
    } else {
        heap.resize(element_size, 0);
        &mut heap
    };
    let per_chunk = buf.len() / element_size;
    let mut offset = at.offset();
    for chunk in items.chunks(per_chunk) {
        let mut len = 0;
        for item in chunk {
            len += buf.pwrite_with(*item, len, LE)?;
        }
        let chunk_at = u32::try_from(offset).map(Rva::new).map_err(|_| Error::OutOfBounds {
            offset,
            len: len as u64,
            limit: section.end(),
        })?;
        section.copy(writer, chunk_at, &buf[..len])?;
        offset += len as u64;
    }
    Ok(())
}
