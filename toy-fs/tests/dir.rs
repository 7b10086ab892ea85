mod common;

use common::fresh_volume;
use toy_fs::layout::DirEntry;
use toy_fs::{Mode, ROOT_INO, ToyFileSystem};
use vfs::Error;

#[test]
fn insert_then_lookup() {
    let (_disk, fs) = fresh_volume();
    let mut fs = fs.lock();

    fs.dir_insert(ROOT_INO, "x", 5).unwrap();
    assert_eq!(fs.dir_lookup(ROOT_INO, "x"), Ok(5));
    assert_eq!(fs.dir_lookup(ROOT_INO, "."), Ok(ROOT_INO));
    assert_eq!(fs.dir_lookup(ROOT_INO, ".."), Ok(ROOT_INO));
    assert_eq!(fs.dir_lookup(ROOT_INO, "y"), Err(Error::NotFound));
}

#[test]
fn insert_overwrites_same_name() {
    let (_disk, fs) = fresh_volume();
    let mut fs = fs.lock();

    let before = fs.stat(ROOT_INO).unwrap();
    fs.dir_insert(ROOT_INO, "x", 5).unwrap();
    fs.dir_insert(ROOT_INO, "x", 6).unwrap();
    assert_eq!(fs.dir_lookup(ROOT_INO, "x"), Ok(6));

    let after = fs.stat(ROOT_INO).unwrap();
    // 覆盖不占用新槽位，但链接数照样增加
    assert_eq!(after.size, before.size + DirEntry::SIZE as u64);
    assert_eq!(after.links, before.links + 2);
    let names = fs.dir_entries(ROOT_INO).unwrap();
    assert_eq!(names.iter().filter(|e| e.name == "x").count(), 1);
}

#[test]
fn remove_then_lookup() {
    let (_disk, fs) = fresh_volume();
    let mut fs = fs.lock();

    let before = fs.stat(ROOT_INO).unwrap();
    fs.dir_insert(ROOT_INO, "x", 5).unwrap();
    assert_eq!(fs.dir_remove(ROOT_INO, "x"), Ok(5));
    assert_eq!(fs.dir_lookup(ROOT_INO, "x"), Err(Error::NotFound));
    assert_eq!(fs.dir_remove(ROOT_INO, "x"), Err(Error::NotFound));

    let after = fs.stat(ROOT_INO).unwrap();
    assert_eq!(after.size, before.size);
    assert_eq!(after.links, before.links);
}

#[test]
fn removed_slot_is_reused_first() {
    let (_disk, fs) = fresh_volume();
    let mut fs = fs.lock();

    for (ino, name) in ["a", "b", "c"].into_iter().enumerate() {
        fs.dir_insert(ROOT_INO, name, ino as u32 + 10).unwrap();
    }
    fs.dir_remove(ROOT_INO, "b").unwrap();
    fs.dir_insert(ROOT_INO, "d", 20).unwrap();

    let names: Vec<_> = fs
        .dir_entries(ROOT_INO)
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, [".", "..", "a", "d", "c"]);
}

#[test]
fn full_directory_block() {
    let (_disk, fs) = fresh_volume();
    let mut fs = fs.lock();

    // "." 与 ".." 之外还剩 62 个槽位
    for i in 0..DirEntry::PER_BLOCK - 2 {
        fs.dir_insert(ROOT_INO, &format!("e{i}"), 9).unwrap();
    }
    assert_eq!(fs.dir_insert(ROOT_INO, "one-more", 9), Err(Error::NoSpace));
    // 同名覆盖不需要空槽位
    fs.dir_insert(ROOT_INO, "e0", 10).unwrap();
    assert_eq!(fs.dir_lookup(ROOT_INO, "e0"), Ok(10));

    let stat = fs.stat(ROOT_INO).unwrap();
    assert_eq!(stat.size, (DirEntry::PER_BLOCK * DirEntry::SIZE) as u64);
    assert_eq!(stat.blocks, 1);
    assert_eq!(fs.dir_entries(ROOT_INO).unwrap().len(), DirEntry::PER_BLOCK);
}

#[test]
fn name_validation() {
    let (_disk, fs) = fresh_volume();
    let mut fs = fs.lock();

    let longest = "n".repeat(28);
    fs.dir_insert(ROOT_INO, &longest, 4).unwrap();
    assert_eq!(fs.dir_lookup(ROOT_INO, &longest), Ok(4));

    assert_eq!(
        fs.dir_insert(ROOT_INO, &"n".repeat(29), 4),
        Err(Error::NameTooLong)
    );
    assert_eq!(fs.dir_insert(ROOT_INO, "", 4), Err(Error::InvalidArgument));
    assert_eq!(fs.dir_insert(ROOT_INO, "a/b", 4), Err(Error::InvalidArgument));
    assert_eq!(fs.dir_insert(ROOT_INO, "a\0b", 4), Err(Error::InvalidArgument));
}

#[test]
fn lookup_in_regular_file() {
    let (_disk, fs) = fresh_volume();
    let ino = {
        let root = ToyFileSystem::root_inode(&fs).unwrap();
        root.create("file", Mode::regular()).unwrap().ino()
    };

    let mut fs = fs.lock();
    assert_eq!(fs.dir_lookup(ino, "x"), Err(Error::NotADirectory));
    assert_eq!(fs.dir_insert(ino, "x", 3), Err(Error::NotADirectory));
    assert_eq!(fs.dir_entries(ino), Err(Error::NotADirectory));
}

#[test]
fn read_dir_lists_children() {
    let (_disk, fs) = fresh_volume();
    let root = ToyFileSystem::root_inode(&fs).unwrap();
    let sub = root.mkdir("sub").unwrap();
    let file = root.create("file", Mode::regular()).unwrap();

    let entries = root.read_dir().unwrap();
    let listed: Vec<_> = entries
        .iter()
        .filter(|e| !e.is_dot())
        .map(|e| (e.name.as_str(), e.ino))
        .collect();
    assert_eq!(listed, [("sub", sub.ino()), ("file", file.ino())]);

    let sub_entries = sub.read_dir().unwrap();
    assert_eq!(sub_entries.len(), 2);
    assert!(sub_entries.iter().all(|e| e.is_dot()));
    assert_eq!(file.read_dir(), Err(Error::NotADirectory));
}
