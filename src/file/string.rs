//! Wire string encoding
//!
//! 线上字符串编码
//!
//! A wire string is a `u32` byte length (terminator excluded) followed by
//! UTF-16LE code units and a zero terminator unit. Sources may be UTF-8,
//! UTF-16 or UTF-32; each character is converted and written on its own, so
//! memory use does not depend on the string length.
//!
//! 线上字符串由 `u32` 字节长度（不含终止符）、UTF-16LE 码元和一个零终止码元组成。
//! 源可以是 UTF-8、UTF-16 或 UTF-32；每个字符单独转换并写入，
//! 因此内存占用与字符串长度无关。

use super::error::{Error, Result};
use super::platform::DumpFile;
use super::rva::LocationDescriptor;
use super::section::TypedSection;
use super::writer::FileWriter;
use scroll::{Pread, Pwrite, SizeWith};

/// Header of a wire string
///
/// 线上字符串头部
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pread, Pwrite, SizeWith)]
pub struct WireStringHeader {
    /// Length of the UTF-16 buffer in bytes, excluding the terminator
    ///
    /// UTF-16 缓冲区的字节长度，不含终止符
    pub length: u32,
}

/// A code unit of some source text encoding
///
/// 某种源文本编码的码元
///
/// Implemented for `u8` (UTF-8), `u16` (UTF-16), `u32` (UTF-32) and `char`.
///
/// 已为 `u8`（UTF-8）、`u16`（UTF-16）、`u32`（UTF-32）和 `char` 实现。
pub trait SourceUnit: Copy + Eq {
    /// Terminator value
    ///
    /// 终止符值
    const NUL: Self;

    /// Decode the character at the front of `units`
    ///
    /// 解码 `units` 开头的字符
    ///
    /// Returns the character and how many units it consumed, or `None` if the
    /// front of `units` is not a valid encoding.
    ///
    /// 返回字符及其消耗的码元数；如果 `units` 开头不是合法编码则返回 `None`。
    fn decode(units: &[Self]) -> Option<(char, usize)>;

    /// View `units` as UTF-16 when they already are
    ///
    /// 当 `units` 本身就是 UTF-16 时将其视为 UTF-16
    #[inline]
    fn as_utf16(_units: &[Self]) -> Option<&[u16]> {
        None
    }
}

impl SourceUnit for u8 {
    const NUL: Self = 0;

    fn decode(units: &[Self]) -> Option<(char, usize)> {
        let width = utf8_width(*units.first()?)?;
        let bytes = units.get(..width)?;
        let ch = std::str::from_utf8(bytes).ok()?.chars().next()?;
        Some((ch, width))
    }
}

impl SourceUnit for u16 {
    const NUL: Self = 0;

    fn decode(units: &[Self]) -> Option<(char, usize)> {
        let ch = char::decode_utf16(units.iter().copied()).next()?.ok()?;
        Some((ch, ch.len_utf16()))
    }

    #[inline]
    fn as_utf16(units: &[Self]) -> Option<&[u16]> {
        Some(units)
    }
}

impl SourceUnit for u32 {
    const NUL: Self = 0;

    #[inline]
    fn decode(units: &[Self]) -> Option<(char, usize)> {
        let ch = char::from_u32(*units.first()?)?;
        Some((ch, 1))
    }
}

impl SourceUnit for char {
    const NUL: Self = '\0';

    #[inline]
    fn decode(units: &[Self]) -> Option<(char, usize)> {
        Some((*units.first()?, 1))
    }
}

/// Byte length of a UTF-8 sequence from its lead byte
#[inline]
fn utf8_width(lead: u8) -> Option<usize> {
    match lead {
        0x00..=0x7f => Some(1),
        0xc2..=0xdf => Some(2),
        0xe0..=0xef => Some(3),
        0xf0..=0xf4 => Some(4),
        _ => None,
    }
}

/// Characters of `text`, with the source index of the first bad sequence
struct Chars<'a, U> {
    text: &'a [U],
    index: usize,
}

impl<U: SourceUnit> Iterator for Chars<'_, U> {
    type Item = Result<char>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.text.get(self.index..).filter(|rest| !rest.is_empty())?;
        match U::decode(rest) {
            Some((ch, consumed)) => {
                self.index += consumed;
                Some(Ok(ch))
            }
            None => {
                let index = self.index;
                // Stop after the first failure.
                self.index = self.text.len();
                Some(Err(Error::InvalidText { index }))
            }
        }
    }
}

#[inline]
fn chars<U: SourceUnit>(text: &[U]) -> Chars<'_, U> {
    Chars { text, index: 0 }
}

/// Cut `text` at `length` and at its first terminator
///
/// 在 `length` 处和第一个终止符处截断 `text`
///
/// A zero `length` is treated like `None`.
///
/// 零 `length` 与 `None` 等同。
fn terminated<U: SourceUnit>(text: &[U], length: Option<usize>) -> &[U] {
    let limit = length
        .filter(|&length| length != 0)
        .map_or(text.len(), |length| length.min(text.len()));
    let text = &text[..limit];
    let end = text.iter().position(|&unit| unit == U::NUL).unwrap_or(text.len());
    &text[..end]
}

/// Number of UTF-16 units needed for `text`, validating it on the way
fn utf16_len<U: SourceUnit>(text: &[U]) -> Result<usize> {
    chars(text).try_fold(0usize, |units, ch| Ok(units + ch?.len_utf16()))
}

impl<F: DumpFile> FileWriter<F> {
    /// Write `text` as a wire string
    ///
    /// 将 `text` 写为线上字符串
    ///
    /// `length` caps how many source units are read; `None` or `Some(0)` reads
    /// up to the first zero unit or the end of the slice. A zero unit before the
    /// cap also ends the string.
    ///
    /// `length` 限制读取的源码元数；`None` 或 `Some(0)` 表示读到第一个零码元或切片末尾。
    /// 在上限之前出现的零码元同样会结束字符串。
    ///
    /// The text is validated before anything is allocated. UTF-16 input is
    /// copied as is; other encodings are converted one character at a time and
    /// each character's one or two units are written immediately.
    ///
    /// 分配之前先校验文本。UTF-16 输入原样复制；其他编码逐字符转换，
    /// 每个字符的一到两个码元会立即写入。
    ///
    /// # Errors
    /// - [`Error::InvalidText`] if the source is not valid in its encoding
    /// - [`Error::StringTooLong`] if the byte length does not fit in `u32`
    /// - any allocation or copy error
    ///
    /// # Errors
    /// - 源文本在其编码下不合法时返回 [`Error::InvalidText`]
    /// - 字节长度超出 `u32` 时返回 [`Error::StringTooLong`]
    /// - 任何分配或复制错误
    ///
    /// # Examples
    ///
    /// ```
    /// # use minidump_file_writer::{FileWriter, Result};
    /// # use tempfile::tempdir;
    /// # fn main() -> Result<()> {
    /// # let dir = tempdir()?;
    /// # let path = dir.path().join("strings.dmp");
    /// let mut writer = FileWriter::create(&path)?;
    ///
    /// // NUL-terminated UTF-32 input; U+1F600 needs a surrogate pair
    /// // 以 NUL 结尾的 UTF-32 输入；U+1F600 需要代理对
    /// let location = writer.write_string(&[0x68u32, 0x1f600, 0], None)?;
    ///
    /// // 4 byte header + 3 units + terminator
    /// // 4 字节头部 + 3 个码元 + 终止符
    /// assert_eq!(location.data_size, 4 + 4 * 2);
    /// # Ok(())
    /// # }
    /// ```
    pub fn write_string<U: SourceUnit>(
        &mut self,
        text: &[U],
        length: Option<usize>,
    ) -> Result<LocationDescriptor> {
        let text = terminated(text, length);
        let units = utf16_len(text)?;
        let length = units
            .checked_mul(size_of::<u16>())
            .and_then(|bytes| u32::try_from(bytes).ok())
            .ok_or(Error::StringTooLong {
                units: units as u64,
            })?;

        let string = TypedSection::<WireStringHeader>::alloc_object_and_array(
            self,
            units + 1,
            size_of::<u16>(),
        )?;
        string.set(self, WireStringHeader { length })?;

        if let Some(wide) = U::as_utf16(text) {
            if !wide.is_empty() {
                string.copy_index_after_object(self, 0, wide)?;
            }
        } else {
            let mut index = 0;
            for ch in chars(text) {
                let mut buf = [0u16; 2];
                let encoded = ch?.encode_utf16(&mut buf);
                string.copy_index_after_object(self, index, encoded)?;
                index += encoded.len();
            }
            debug_assert_eq!(index, units);
        }

        string.copy_index_after_object(self, units, &[0u16])?;
        Ok(string.location())
    }

    /// Write a Rust string as a wire string
    ///
    /// 将 Rust 字符串写为线上字符串
    #[inline]
    pub fn write_str(&mut self, text: &str) -> Result<LocationDescriptor> {
        self.write_string(text.as_bytes(), None)
    }
}
