//! 测试模块

use super::*;
use scroll::{Pread, Pwrite, SizeWith, LE};
use std::cell::RefCell;
use std::io;
use std::num::NonZeroU64;
use std::rc::Rc;
use tempfile::tempdir;

fn non_zero(val: u64) -> NonZeroU64 {
    NonZeroU64::new(val).unwrap()
}

/// 内存中的 DumpFile，可注入失败
#[derive(Debug, Default)]
struct MockState {
    data: Vec<u8>,
    fail_extend: bool,
    fail_write: bool,
    extends: Vec<u64>,
    closed: bool,
}

#[derive(Debug, Clone, Default)]
struct MockFile {
    state: Rc<RefCell<MockState>>,
}

impl MockFile {
    fn data(&self) -> Vec<u8> {
        self.state.borrow().data.clone()
    }
}

impl DumpFile for MockFile {
    fn extend_to(&mut self, len: u64) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_extend {
            return Err(io::Error::other("injected extend failure"));
        }
        state.extends.push(len);
        state.data.resize(len as usize, 0);
        Ok(())
    }

    fn write_all_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_write {
            return Err(io::Error::other("injected write failure"));
        }
        let start = offset as usize;
        let end = start + buf.len();
        if end > state.data.len() {
            return Err(io::Error::from(io::ErrorKind::WriteZero));
        }
        state.data[start..end].copy_from_slice(buf);
        Ok(())
    }

    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.state.borrow_mut().data.truncate(len as usize);
        Ok(())
    }

    fn close(self) -> io::Result<()> {
        self.state.borrow_mut().closed = true;
        Ok(())
    }
}

fn mock_writer() -> (FileWriter<MockFile>, MockFile) {
    let file = MockFile::default();
    let mut writer = FileWriter::with_options(WriterOptions::default());
    writer.attach(file.clone()).unwrap();
    (writer, file)
}

/// 解析线上字符串：返回 (length 字段, 全部码元含终止符)
fn read_wire_string(data: &[u8], location: LocationDescriptor) -> (u32, Vec<u16>) {
    let start = location.rva as usize;
    let length: u32 = data.pread_with(start, LE).unwrap();
    let unit_count = (location.data_size as usize - 4) / 2;
    let units = (0..unit_count)
        .map(|i| data.pread_with::<u16>(start + 4 + i * 2, LE).unwrap())
        .collect();
    (length, units)
}

/// FileWriter 生命周期测试（真实文件）
mod lifecycle_tests {
    use super::*;

    #[test]
    fn test_create_allocate_close_truncates_to_cursor() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("truncate.dmp");

        let mut writer = FileWriter::create(&path).unwrap();
        let first = writer.allocate(non_zero(10)).unwrap();
        let second = writer.allocate(non_zero(3)).unwrap();
        writer.copy(first, b"0123456789").unwrap();
        writer.copy(second, b"abc").unwrap();

        assert_eq!(writer.size(), page_size().get());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), page_size().get());

        writer.close().unwrap();
        assert!(!writer.is_open());

        let data = std::fs::read(&path).unwrap();
        assert_eq!(data.len(), 24);
        assert_eq!(&data[..10], b"0123456789");
        assert_eq!(&data[16..19], b"abc");
    }

    #[test]
    fn test_close_after_multi_page_growth() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("multi_page.dmp");
        let page = page_size().get();

        let mut writer = FileWriter::create(&path).unwrap();
        writer.allocate(non_zero(8)).unwrap();
        writer.allocate(non_zero(3 * page + 1)).unwrap();
        writer.allocate(non_zero(5)).unwrap();
        let position = writer.position();
        assert!(writer.size() > position);
        assert_eq!(writer.size() % page, 0);

        writer.close().unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), position);
    }

    #[test]
    fn test_open_existing_path_fails_and_keeps_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("existing.dmp");
        std::fs::write(&path, b"precious").unwrap();

        let err = FileWriter::create(&path).unwrap_err();
        match err {
            Error::Io(io_err) => assert_eq!(io_err.kind(), io::ErrorKind::AlreadyExists),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(std::fs::read(&path).unwrap(), b"precious");
    }

    #[test]
    fn test_open_twice_fails() {
        let dir = tempdir().unwrap();
        let mut writer = FileWriter::create(dir.path().join("first.dmp")).unwrap();

        let err = writer.open(dir.path().join("second.dmp")).unwrap_err();
        assert!(matches!(err, Error::AlreadyOpen));
        assert!(!dir.path().join("second.dmp").exists());
    }

    #[test]
    fn test_reopen_after_close_starts_fresh() {
        let dir = tempdir().unwrap();
        let mut writer = FileWriter::create(dir.path().join("a.dmp")).unwrap();
        writer.allocate(non_zero(100)).unwrap();
        writer.close().unwrap();

        writer.open(dir.path().join("b.dmp")).unwrap();
        assert_eq!(writer.position(), 0);
        assert_eq!(writer.size(), 0);
        assert_eq!(writer.allocate(non_zero(1)).unwrap(), Rva::new(0));
    }

    #[test]
    fn test_close_without_file_is_noop() {
        let mut writer = FileWriter::new();
        assert!(writer.close().is_ok());
        assert!(writer.close().is_ok());
    }

    #[test]
    fn test_drop_truncates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("drop.dmp");
        {
            let mut writer = FileWriter::create(&path).unwrap();
            writer.write_memory(0x1000, &[7u8; 12]).unwrap();
        }
        assert_eq!(std::fs::read(&path).unwrap().len(), 16);
    }

    #[cfg(unix)]
    #[test]
    fn test_adopted_handle_is_truncated_but_left_open() {
        use std::io::{Read, Seek, SeekFrom};

        let mut file = tempfile::tempfile().unwrap();
        let mut writer = FileWriter::new();
        writer.adopt_handle(&file).unwrap();
        assert!(!writer.owns_file());

        let location = writer.write_str("adopted").unwrap();
        writer.close().unwrap();

        // The caller's handle still works after the writer is done
        assert_eq!(file.metadata().unwrap().len(), writer.position());
        let mut data = Vec::new();
        file.seek(SeekFrom::Start(0)).unwrap();
        file.read_to_end(&mut data).unwrap();

        let (length, units) = read_wire_string(&data, location);
        assert_eq!(length, 14);
        assert_eq!(String::from_utf16(&units[..7]).unwrap(), "adopted");
    }

    #[test]
    #[should_panic(expected = "without an open file")]
    fn test_allocate_without_file_panics() {
        let mut writer = FileWriter::new();
        let _ = writer.allocate(non_zero(8));
    }

    #[test]
    #[should_panic(expected = "without an open file")]
    fn test_copy_without_file_panics() {
        let mut writer = FileWriter::new();
        let _ = writer.copy(Rva::new(0), b"x");
    }
}

/// 分配与复制测试（内存文件）
mod allocation_tests {
    use super::*;

    #[test]
    fn test_allocations_are_aligned_and_disjoint() {
        let (mut writer, _file) = mock_writer();
        let sizes = [1u64, 2, 8, 15, 16, 17, 4000, 9000, 3, 70000];

        let mut ranges = Vec::new();
        for size in sizes {
            let before_size = writer.size();
            let rva = writer.allocate(non_zero(size)).unwrap();
            assert_eq!(rva.offset() % allocator::ALIGNMENT, 0);
            ranges.push((rva.offset(), rva.offset() + size));

            assert!(writer.size() >= before_size);
            assert_eq!(writer.size() % writer.granularity().get(), 0);
            assert!(writer.position() <= writer.size());
        }

        for (i, a) in ranges.iter().enumerate() {
            for b in &ranges[i + 1..] {
                assert!(a.1 <= b.0, "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn test_growth_uses_granularity() {
        let file = MockFile::default();
        let options = WriterOptions {
            growth_pages: non_zero(4),
        };
        let mut writer = FileWriter::with_options(options);
        writer.attach(file.clone()).unwrap();

        writer.allocate(non_zero(1)).unwrap();
        assert_eq!(writer.granularity().get(), 4 * page_size().get());
        assert_eq!(file.state.borrow().extends, vec![4 * page_size().get()]);
    }

    #[test]
    fn test_failed_extend_leaves_state_unchanged() {
        let (mut writer, file) = mock_writer();
        writer.allocate(non_zero(16)).unwrap();
        let (position, size) = (writer.position(), writer.size());

        file.state.borrow_mut().fail_extend = true;
        let err = writer.allocate(non_zero(size)).unwrap_err();
        assert!(matches!(err, Error::Grow { .. }));
        assert_eq!(writer.position(), position);
        assert_eq!(writer.size(), size);

        // Small allocations that fit still succeed
        let rva = writer.allocate(non_zero(8)).unwrap();
        assert_eq!(rva.offset(), position);
    }

    #[test]
    fn test_copy_past_backing_size_fails() {
        let (mut writer, _file) = mock_writer();
        writer.allocate(non_zero(8)).unwrap();
        let size = writer.size();
        let last = Rva::new(size as u32 - 1);

        assert!(writer.copy(last, b"x").is_ok());
        assert!(matches!(
            writer.copy(last, b"xy"),
            Err(Error::OutOfBounds { .. })
        ));
        assert!(matches!(
            writer.copy(Rva::new(size as u32), b"x"),
            Err(Error::OutOfBounds { .. })
        ));
        assert!(writer.copy(Rva::INVALID, b"x").is_err());
    }

    #[test]
    fn test_zero_length_copy_fails_even_at_boundary() {
        let (mut writer, _file) = mock_writer();
        writer.allocate(non_zero(8)).unwrap();
        let boundary = Rva::new(writer.size() as u32);

        assert!(matches!(writer.copy(boundary, &[]), Err(Error::ZeroLength)));
        assert!(matches!(writer.copy(Rva::new(0), &[]), Err(Error::ZeroLength)));
    }

    #[test]
    fn test_copy_reports_write_failure() {
        let (mut writer, file) = mock_writer();
        let rva = writer.allocate(non_zero(4)).unwrap();
        file.state.borrow_mut().fail_write = true;

        assert!(matches!(writer.copy(rva, b"data"), Err(Error::Io(_))));
    }

    #[test]
    fn test_attach_closes_and_adopt_does_not() {
        let (mut writer, file) = mock_writer();
        writer.allocate(non_zero(5)).unwrap();
        writer.close().unwrap();
        assert!(file.state.borrow().closed);
        assert_eq!(file.data().len(), 8);

        let adopted = MockFile::default();
        let mut writer = FileWriter::with_options(WriterOptions::default());
        writer.adopt(adopted.clone()).unwrap();
        writer.allocate(non_zero(5)).unwrap();
        writer.close().unwrap();
        assert!(!adopted.state.borrow().closed);
        assert_eq!(adopted.data().len(), 8);
    }

    #[test]
    fn test_adopt_while_open_fails() {
        let (mut writer, _file) = mock_writer();
        assert!(matches!(
            writer.adopt(MockFile::default()),
            Err(Error::AlreadyOpen)
        ));
    }
}

/// 段测试
mod section_tests {
    use super::*;

    #[test]
    fn test_untyped_section_out_of_order_writes() {
        let (mut writer, file) = mock_writer();
        let section = UntypedSection::allocate(&mut writer, non_zero(12)).unwrap();

        section
            .copy(&mut writer, section.rva_at(8).unwrap(), b"3333")
            .unwrap();
        section.write(&mut writer, b"1111").unwrap();
        section
            .copy(&mut writer, section.rva_at(4).unwrap(), b"2222")
            .unwrap();

        assert_eq!(&file.data()[..12], b"111122223333");
        assert_eq!(section.location(), LocationDescriptor::new(Rva::new(0), 12));
    }

    #[test]
    fn test_untyped_section_rejects_writes_outside_range() {
        let (mut writer, _file) = mock_writer();
        let _before = UntypedSection::allocate(&mut writer, non_zero(8)).unwrap();
        let section = UntypedSection::allocate(&mut writer, non_zero(5)).unwrap();
        let _after = UntypedSection::allocate(&mut writer, non_zero(8)).unwrap();

        // Still inside the backed file, but outside this section
        let before = Rva::new(section.position().get() - 1);
        assert!(matches!(
            section.copy(&mut writer, before, b"x"),
            Err(Error::OutOfBounds { .. })
        ));
        // Alignment padding does not belong to the section
        assert!(matches!(
            section.copy(&mut writer, section.rva_at(4).unwrap(), b"xy"),
            Err(Error::OutOfBounds { .. })
        ));
        assert!(section.write(&mut writer, b"12345").is_ok());
    }

    #[test]
    fn test_typed_section_header_and_trailing_array() {
        let (mut writer, file) = mock_writer();
        let list = TypedSection::<u32>::alloc_object_and_array(&mut writer, 3, 16).unwrap();
        list.set(&mut writer, 3).unwrap();

        let regions = [
            MemoryDescriptor {
                start_of_memory_range: 0x1000,
                memory: LocationDescriptor::new(Rva::new(64), 32),
            },
            MemoryDescriptor {
                start_of_memory_range: 0x2000,
                memory: LocationDescriptor::new(Rva::new(96), 16),
            },
        ];
        list.copy_index_after_object(&mut writer, 1, &regions).unwrap();

        let data = file.data();
        assert_eq!(list.location().data_size, 4 + 3 * 16);
        assert_eq!(data.pread_with::<u32>(0, LE).unwrap(), 3);
        let second: MemoryDescriptor = data.pread_with(4 + 16, LE).unwrap();
        assert_eq!(second, regions[0]);
        let third: MemoryDescriptor = data.pread_with(4 + 32, LE).unwrap();
        assert_eq!(third, regions[1]);

        // Index 2 has room for only one element
        assert!(list.copy_index_after_object(&mut writer, 2, &regions).is_err());
        assert!(list.copy_index_after_object(&mut writer, 4, &regions[..1]).is_err());
    }

    #[test]
    fn test_typed_array_set_value_at() {
        let (mut writer, file) = mock_writer();
        let array = TypedSection::<u64>::alloc_array(&mut writer, 2).unwrap();
        array.set_value_at(&mut writer, 0xaaaa, 1).unwrap();
        array.set_value_at(&mut writer, 0xbbbb, 0).unwrap();

        let data = file.data();
        assert_eq!(data.pread_with::<u64>(0, LE).unwrap(), 0xbbbb);
        assert_eq!(data.pread_with::<u64>(8, LE).unwrap(), 0xaaaa);
        assert!(array.set_value_at(&mut writer, 1, 2).is_err());

        assert!(matches!(
            TypedSection::<u64>::alloc_array(&mut writer, 0),
            Err(Error::ZeroLength)
        ));
    }

    /// A register file larger than the section encode buffer
    #[derive(Debug, Clone, Copy, Pwrite, SizeWith)]
    struct BigContext {
        regs: [u64; 128],
    }

    fn big_context(seed: u64) -> BigContext {
        let mut regs = [0u64; 128];
        for (i, reg) in regs.iter_mut().enumerate() {
            *reg = seed + i as u64;
        }
        BigContext { regs }
    }

    #[test]
    fn test_records_larger_than_encode_buffer() {
        let (mut writer, file) = mock_writer();
        let context =
            TypedSection::<BigContext>::alloc_with_val(&mut writer, big_context(0x1000)).unwrap();
        assert_eq!(context.location().data_size, 1024);

        let contexts = TypedSection::<u32>::alloc_object_and_array(&mut writer, 3, 1024).unwrap();
        contexts.set(&mut writer, 3).unwrap();
        let values = [big_context(0x2000), big_context(0x3000), big_context(0x4000)];
        contexts.copy_index_after_object(&mut writer, 0, &values).unwrap();

        let array = TypedSection::<BigContext>::alloc_array(&mut writer, 2).unwrap();
        array.set_value_at(&mut writer, big_context(0x5000), 1).unwrap();

        let data = file.data();
        let read = |offset: u64, reg: usize| -> u64 {
            data.pread_with(offset as usize + reg * 8, LE).unwrap()
        };
        let base = context.position().offset();
        assert_eq!(read(base, 0), 0x1000);
        assert_eq!(read(base, 127), 0x1000 + 127);

        let base = contexts.position().offset() + 4;
        for (i, seed) in [0x2000u64, 0x3000, 0x4000].into_iter().enumerate() {
            let start = base + i as u64 * 1024;
            assert_eq!(read(start, 0), seed);
            assert_eq!(read(start, 127), seed + 127);
        }

        let base = array.position().offset() + 1024;
        assert_eq!(read(base, 0), 0x5000);
        assert_eq!(read(base, 127), 0x5000 + 127);
        assert!(array.set_value_at(&mut writer, big_context(0), 2).is_err());
    }

    #[test]
    fn test_large_array_is_written_in_chunks() {
        let (mut writer, file) = mock_writer();
        let values: Vec<u32> = (0..1000).collect();
        let array = TypedSection::<u32>::alloc_array(&mut writer, values.len()).unwrap();
        array
            .as_untyped()
            .copy(&mut writer, array.position(), &[0xff])
            .unwrap();
        TypedSection::<u32>::alloc_with_val(&mut writer, 7).unwrap();

        let list = TypedSection::<u32>::alloc_object_and_array(&mut writer, values.len(), 4)
            .unwrap();
        list.copy_index_after_object(&mut writer, 0, &values).unwrap();

        let data = file.data();
        let base = list.position().offset() as usize + 4;
        for (i, value) in values.iter().enumerate() {
            assert_eq!(data.pread_with::<u32>(base + i * 4, LE).unwrap(), *value);
        }
    }
}

/// 字符串编码测试
mod string_tests {
    use super::*;

    #[test]
    fn test_ascii_string() {
        let (mut writer, file) = mock_writer();
        let location = writer.write_str("crash").unwrap();

        let (length, units) = read_wire_string(&file.data(), location);
        assert_eq!(length, 10);
        assert_eq!(units.len(), 6);
        assert_eq!(units.last(), Some(&0));
        assert_eq!(String::from_utf16(&units[..5]).unwrap(), "crash");
    }

    #[test]
    fn test_empty_string_is_just_a_terminator() {
        let (mut writer, file) = mock_writer();
        let location = writer.write_str("").unwrap();

        assert_eq!(location.data_size, 6);
        let (length, units) = read_wire_string(&file.data(), location);
        assert_eq!(length, 0);
        assert_eq!(units, vec![0]);
    }

    #[test]
    fn test_supplementary_character_from_each_encoding() {
        let expected: Vec<u16> = "a😀b".encode_utf16().chain([0]).collect();
        assert_eq!(expected.len(), 5);

        let (mut writer, file) = mock_writer();
        let from_utf8 = writer.write_string("a😀b".as_bytes(), None).unwrap();
        let from_utf32 = writer.write_string(&[0x61u32, 0x1f600, 0x62], None).unwrap();
        let from_chars = writer.write_string(&['a', '😀', 'b'], None).unwrap();
        let wide: Vec<u16> = "a😀b".encode_utf16().collect();
        let from_utf16 = writer.write_string(&wide, None).unwrap();

        let data = file.data();
        for location in [from_utf8, from_utf32, from_chars, from_utf16] {
            let (length, units) = read_wire_string(&data, location);
            assert_eq!(length, 8);
            assert_eq!(units, expected);
            assert_ne!(units[1], 0);
            assert_ne!(units[2], 0);
        }
    }

    #[test]
    fn test_explicit_length_and_embedded_terminator() {
        let (mut writer, file) = mock_writer();
        let capped = writer.write_string(b"module.so", Some(6)).unwrap();
        let terminated = writer.write_string(&[0x68u16, 0x69, 0, 0x78], None).unwrap();
        let zero = writer.write_string(b"ignored", Some(0)).unwrap();
        let zero_terminated = writer.write_string(b"module\0", Some(0)).unwrap();

        let data = file.data();
        let (_, units) = read_wire_string(&data, capped);
        assert_eq!(String::from_utf16(&units[..6]).unwrap(), "module");
        let (length, units) = read_wire_string(&data, terminated);
        assert_eq!(length, 4);
        assert_eq!(units, vec![0x68, 0x69, 0]);
        // A zero cap reads up to the terminator
        let (length, units) = read_wire_string(&data, zero);
        assert_eq!(length, 14);
        assert_eq!(String::from_utf16(&units[..7]).unwrap(), "ignored");
        assert_eq!(units[7], 0);
        let (length, units) = read_wire_string(&data, zero_terminated);
        assert_eq!(length, 12);
        assert_eq!(String::from_utf16(&units[..6]).unwrap(), "module");
    }

    #[test]
    fn test_invalid_text_fails_without_allocating() {
        let (mut writer, _file) = mock_writer();
        writer.allocate(non_zero(8)).unwrap();
        let position = writer.position();

        let err = writer.write_string(&[0x61u8, 0xc3], None).unwrap_err();
        assert!(matches!(err, Error::InvalidText { index: 1 }));
        let err = writer.write_string(&[0x61u32, 0xd800], None).unwrap_err();
        assert!(matches!(err, Error::InvalidText { index: 1 }));
        let err = writer.write_string(&[0xdc00u16], None).unwrap_err();
        assert!(matches!(err, Error::InvalidText { index: 0 }));

        assert_eq!(writer.position(), position);
    }

    #[test]
    fn test_string_write_failure_is_reported() {
        let (mut writer, file) = mock_writer();
        file.state.borrow_mut().fail_write = true;
        assert!(matches!(writer.write_str("lost"), Err(Error::Io(_))));
    }
}

/// 内存区域测试
mod memory_tests {
    use super::*;

    #[test]
    fn test_write_memory_round_trip() {
        let (mut writer, file) = mock_writer();
        writer.write_str("pad").unwrap();
        let start = writer.position();

        let bytes: Vec<u8> = (0..=200).collect();
        let desc = writer.write_memory(0xdead_beef_0000, &bytes).unwrap();

        assert_eq!(desc.start_of_memory_range, 0xdead_beef_0000);
        assert_eq!(desc.memory.rva as u64, start);
        assert_eq!(desc.memory.data_size, 201);
        assert_eq!(writer.position(), start + 208);

        let data = file.data();
        assert_eq!(&data[start as usize..start as usize + 201], &bytes[..]);
    }

    #[test]
    fn test_empty_memory_region_fails() {
        let (mut writer, _file) = mock_writer();
        assert!(matches!(writer.write_memory(0x1000, &[]), Err(Error::ZeroLength)));
        assert_eq!(writer.position(), 0);
    }

    #[test]
    fn test_write_memory_grow_failure() {
        let (mut writer, file) = mock_writer();
        file.state.borrow_mut().fail_extend = true;
        assert!(matches!(
            writer.write_memory(0x1000, &[1, 2, 3]),
            Err(Error::Grow { .. })
        ));
        assert_eq!(writer.size(), 0);
    }
}
