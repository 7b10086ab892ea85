mod common;

use common::fresh_volume;
use toy_fs::{BLOCK_SIZE, MAX_FILE_SIZE, Mode, ToyFileSystem};
use vfs::Error;

#[test]
fn write_then_read() {
    let (_disk, fs) = fresh_volume();
    let root = ToyFileSystem::root_inode(&fs).unwrap();
    let file = root.create("f", Mode::regular()).unwrap();

    let data: Vec<u8> = (0..3 * BLOCK_SIZE + 100).map(|i| (i % 251) as u8).collect();
    assert_eq!(file.write_at(0, &data), Ok(data.len()));
    let stat = file.stat().unwrap();
    assert_eq!(stat.size, data.len() as u64);
    assert_eq!(stat.blocks, 4);
    assert_eq!(stat.direct, [3, 4, 5, 6]);

    assert_eq!(file.read_all().unwrap(), data);

    // 跨块的部分读
    let mut buf = [0; 100];
    let offset = BLOCK_SIZE - 50;
    assert_eq!(file.read_at(offset, &mut buf), Ok(100));
    assert_eq!(&buf[..], &data[offset..offset + 100]);

    // 读到文件末尾为止
    assert_eq!(file.read_at(data.len() - 10, &mut buf), Ok(10));
    assert_eq!(file.read_at(data.len() + 10, &mut buf), Ok(0));
    fs.lock().verify().unwrap();
}

#[test]
fn holes_read_as_zeros() {
    let (_disk, fs) = fresh_volume();
    let root = ToyFileSystem::root_inode(&fs).unwrap();
    let file = root.create("f", Mode::regular()).unwrap();

    file.write_at(2 * BLOCK_SIZE, b"tail").unwrap();
    let stat = file.stat().unwrap();
    assert_eq!(stat.size, (2 * BLOCK_SIZE + 4) as u64);
    assert_eq!(stat.blocks, 1);

    let content = file.read_all().unwrap();
    assert!(content[..2 * BLOCK_SIZE].iter().all(|&b| b == 0));
    assert_eq!(&content[2 * BLOCK_SIZE..], b"tail");
}

#[test]
fn file_size_limit() {
    let (_disk, fs) = fresh_volume();
    let root = ToyFileSystem::root_inode(&fs).unwrap();
    let file = root.create("f", Mode::regular()).unwrap();
    let free = fs.lock().statfs().free_blocks;

    assert_eq!(
        file.write_at(MAX_FILE_SIZE - 1, b"xy"),
        Err(Error::FileTooBig)
    );
    assert_eq!(fs.lock().statfs().free_blocks, free);
    assert_eq!(file.write_at(MAX_FILE_SIZE - 1, b"x"), Ok(1));
    assert_eq!(file.stat().unwrap().size, MAX_FILE_SIZE as u64);
    assert_eq!(file.truncate(MAX_FILE_SIZE + 1), Err(Error::FileTooBig));
}

#[test]
fn write_runs_out_of_blocks() {
    let (_disk, fs) = fresh_volume();
    let root = ToyFileSystem::root_inode(&fs).unwrap();
    let file = root.create("f", Mode::regular()).unwrap();
    {
        let mut fs = fs.lock();
        while fs.statfs().free_blocks > 2 {
            fs.alloc_block().unwrap();
        }
    }

    assert_eq!(
        file.write_at(0, &[1; 3 * BLOCK_SIZE]),
        Err(Error::NoSpace)
    );
    // 已分配的两块留在文件上
    assert_eq!(file.stat().unwrap().blocks, 2);
    assert_eq!(file.stat().unwrap().size, 0);
    fs.lock().verify().unwrap();

    drop(file);
    root.unlink("f").unwrap();
    assert_eq!(fs.lock().statfs().free_blocks, 2);
}

#[test]
fn truncate_frees_tail() {
    let (_disk, fs) = fresh_volume();
    let root = ToyFileSystem::root_inode(&fs).unwrap();
    let file = root.create("f", Mode::regular()).unwrap();
    let free = fs.lock().statfs().free_blocks;

    file.write_at(0, &[9; 3 * BLOCK_SIZE]).unwrap();
    assert_eq!(fs.lock().statfs().free_blocks, free - 3);

    file.truncate(BLOCK_SIZE + 10).unwrap();
    let stat = file.stat().unwrap();
    assert_eq!(stat.size, (BLOCK_SIZE + 10) as u64);
    assert_eq!(stat.blocks, 2);
    assert_eq!(fs.lock().statfs().free_blocks, free - 2);

    // 截断掉的字节不会在重新增长后出现
    file.truncate(2 * BLOCK_SIZE).unwrap();
    let content = file.read_all().unwrap();
    assert!(content[..BLOCK_SIZE + 10].iter().all(|&b| b == 9));
    assert!(content[BLOCK_SIZE + 10..].iter().all(|&b| b == 0));

    file.truncate(0).unwrap();
    assert_eq!(file.stat().unwrap().blocks, 0);
    assert_eq!(fs.lock().statfs().free_blocks, free);
    fs.lock().verify().unwrap();
}

#[test]
fn data_ops_check_kind() {
    let (_disk, fs) = fresh_volume();
    let root = ToyFileSystem::root_inode(&fs).unwrap();

    assert_eq!(root.write_at(0, b"x"), Err(Error::IsADirectory));
    assert_eq!(root.read_at(0, &mut [0; 1]), Err(Error::IsADirectory));
    assert_eq!(root.truncate(0), Err(Error::IsADirectory));
    assert_eq!(root.read_link(), Err(Error::InvalidArgument));

    let file = root.create("f", Mode::regular()).unwrap();
    assert_eq!(file.read_link(), Err(Error::InvalidArgument));
    assert_eq!(file.write_at(0, b""), Ok(0));
}

#[test]
fn offsets_near_usize_max() {
    let (_disk, fs) = fresh_volume();
    let root = ToyFileSystem::root_inode(&fs).unwrap();
    let file = root.create("f", Mode::regular()).unwrap();
    file.write_at(0, b"data").unwrap();
    let free = fs.lock().statfs();

    assert_eq!(
        file.write_at(usize::MAX - 1, b"abcd"),
        Err(Error::FileTooBig)
    );
    assert_eq!(file.read_at(usize::MAX - 1, &mut [0; 4]), Ok(0));
    assert_eq!(file.read_at(usize::MAX, &mut [0; 4]), Ok(0));

    // 长缓冲区从文件内的偏移开始读，只读到文件末尾
    let mut buf = [0; 8];
    assert_eq!(file.read_at(2, &mut buf), Ok(2));
    assert_eq!(&buf[..2], b"ta");

    assert_eq!(file.stat().unwrap().size, 4);
    assert_eq!(fs.lock().statfs(), free);
}
