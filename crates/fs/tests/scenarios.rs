mod common;

use std::sync::Arc;

use common::{boot, raw_disk};
use device::config::DISK0_BLKSIZE;
use fs::fs_cleanup;
use vfs::{FdStatus, FilesStruct, FsError, Inode, OpenFlags, SeekWhence, Vfs};

fn read_all(files: &FilesStruct, fd: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = [0u8; 7];
    loop {
        let n = files.read(fd, &mut buf).unwrap();
        if n == 0 {
            return out;
        }
        out.extend_from_slice(&buf[..n]);
    }
}

#[test]
fn test_create_write_reopen_read() {
    let sys = boot();
    let files = &sys.files;

    let fd = files
        .open("disk0:/x", OpenFlags::O_CREAT | OpenFlags::O_RDWR)
        .unwrap();
    assert_eq!(files.write(fd, b"hello"), Ok(5));
    files.close(fd).unwrap();
    assert_eq!(files.status(fd), Some(FdStatus::None));

    let fd = files.open("disk0:/x", OpenFlags::O_RDONLY).unwrap();
    let mut buf = [0u8; 16];
    assert_eq!(files.read(fd, &mut buf), Ok(5));
    assert_eq!(&buf[..5], b"hello");
    assert_eq!(files.read(fd, &mut buf), Ok(0));
    assert_eq!(files.fstat(fd).unwrap().size, 5);
    files.close(fd).unwrap();
}

#[test]
fn test_exclusive_create_and_missing_target() {
    let sys = boot();
    let files = &sys.files;

    let fd = files
        .open("/x", OpenFlags::O_CREAT | OpenFlags::O_WRONLY)
        .unwrap();
    files.close(fd).unwrap();

    assert_eq!(
        files.open("/x", OpenFlags::O_CREAT | OpenFlags::O_EXCL | OpenFlags::O_RDWR),
        Err(FsError::AlreadyExists)
    );
    assert_eq!(
        files.open("/missing", OpenFlags::O_RDONLY),
        Err(FsError::NotFound)
    );
    assert_eq!(
        files.open("/nodir/x", OpenFlags::O_CREAT | OpenFlags::O_RDWR),
        Err(FsError::NotFound)
    );
    assert_eq!(
        files.open("/x", OpenFlags::O_RDONLY | OpenFlags::O_TRUNC),
        Err(FsError::InvalidArgument)
    );
    // 失败的 open 不占用描述符
    assert_eq!(files.status(0), Some(FdStatus::None));
}

#[test]
fn test_dup_outlives_source_fd() {
    let sys = boot();
    let files = &sys.files;

    let fd = files
        .open("/f", OpenFlags::O_CREAT | OpenFlags::O_RDWR)
        .unwrap();
    let copy = files.dup(fd, None).unwrap();
    files.close(fd).unwrap();

    assert_eq!(files.write(copy, b"abc"), Ok(3));
    assert_eq!(files.seek(copy, 0, SeekWhence::Set), Ok(0));
    assert_eq!(read_all(files, copy), b"abc");

    let node = files.lookup("/f").unwrap();
    assert_eq!(node.open_count(), 1);
    files.close(copy).unwrap();
    assert_eq!(node.open_count(), 0);
    node.put();
}

#[test]
fn test_four_path_forms() {
    let sys = boot();
    let files = &sys.files;
    files.mkdir("/a").unwrap();
    files.mkdir("disk0:a/b").unwrap();

    let by_device = files.lookup("disk0:/a/b").unwrap();
    let by_boot = files.lookup("//a/b").unwrap();
    assert!(Inode::ptr_eq(&by_device, &by_boot));

    files.chdir("/a").unwrap();
    let relative = files.lookup("b").unwrap();
    let current_device = files.lookup(":a/b").unwrap();
    let dotted = files.lookup("./b/../b").unwrap();
    assert!(Inode::ptr_eq(&by_device, &relative));
    assert!(Inode::ptr_eq(&by_device, &current_device));
    assert!(Inode::ptr_eq(&by_device, &dotted));
    assert_eq!(by_device.ref_count(), 5);

    for node in [by_device, by_boot, relative, current_device, dotted] {
        node.put();
    }

    let mut buf = [0u8; 64];
    let n = files.getcwd(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"disk0:/a");
    files.chdir("b").unwrap();
    let n = files.getcwd(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"disk0:/a/b");
    files.chdir("/").unwrap();
    let n = files.getcwd(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"disk0:/");

    assert_eq!(files.chdir("/nowhere"), Err(FsError::NotFound));
    assert_eq!(files.lookup("nope:/a").unwrap_err(), FsError::NoDevice);
}

#[test]
fn test_raw_disk_roundtrip() {
    test_support::init_arch_ops();
    let vfs = Arc::new(Vfs::new());
    let (raw, disk) = raw_disk(4);
    vfs.add_dev("raw0", Inode::new_device(disk), false).unwrap();
    let files = FilesStruct::new(vfs);

    let fd = files.open("raw0:", OpenFlags::O_RDWR).unwrap();
    let block: Vec<u8> = (0..2 * DISK0_BLKSIZE).map(|i| i as u8).collect();
    assert_eq!(files.seek(fd, DISK0_BLKSIZE as i64, SeekWhence::Set), Ok(4096));
    assert_eq!(files.write(fd, &block), Ok(block.len()));
    assert_eq!(files.seek(fd, DISK0_BLKSIZE as i64, SeekWhence::Set), Ok(4096));
    let mut back = vec![0u8; block.len()];
    assert_eq!(files.read(fd, &mut back), Ok(block.len()));
    assert_eq!(back, block);

    let before = raw.raw_data();
    assert_eq!(files.seek(fd, 0, SeekWhence::Set), Ok(0));
    assert_eq!(files.write(fd, &block[..100]), Err(FsError::InvalidArgument));
    assert_eq!(files.seek(fd, 7, SeekWhence::Set), Err(FsError::InvalidArgument));
    assert_eq!(
        files.seek(fd, 4 * DISK0_BLKSIZE as i64, SeekWhence::Set),
        Err(FsError::InvalidArgument)
    );
    assert_eq!(raw.raw_data(), before);
    assert_eq!(
        files.open("raw0:", OpenFlags::O_RDWR | OpenFlags::O_APPEND),
        Err(FsError::InvalidArgument)
    );
    files.close(fd).unwrap();
}

#[test]
fn test_console_devices() {
    let sys = boot();
    let files = &sys.files;

    for &c in b"ls\n" {
        sys.stdin.push(c);
    }
    let input = files.open("stdin:", OpenFlags::O_RDONLY).unwrap();
    let mut buf = [0u8; 3];
    assert_eq!(files.read(input, &mut buf), Ok(3));
    assert_eq!(&buf, b"ls\n");
    assert_eq!(files.write(input, b"x"), Err(FsError::InvalidArgument));
    assert_eq!(files.seek(input, 0, SeekWhence::Set), Err(FsError::InvalidArgument));

    let output = files.open("stdout:", OpenFlags::O_WRONLY).unwrap();
    assert_eq!(files.write(output, b"ok"), Ok(2));
    assert_eq!(&sys.screen.0.lock().unwrap()[..], b"ok");

    assert_eq!(
        files.open("stdin:", OpenFlags::O_RDWR),
        Err(FsError::InvalidArgument)
    );
    assert_eq!(
        files.open("stdout:", OpenFlags::O_RDONLY),
        Err(FsError::InvalidArgument)
    );
    let stat = files.fstat(output).unwrap();
    assert_eq!((stat.blocks, stat.size, stat.nlinks), (0, 0, 1));
    files.destroy();
}

#[test]
fn test_fork_exec_exit() {
    let sys = boot();
    let files = &sys.files;
    files.chdir("/").unwrap();
    for _ in 0..3 {
        files
            .open("/shared", OpenFlags::O_CREAT | OpenFlags::O_RDWR)
            .unwrap();
    }
    assert_eq!(files.write(2, b"parent"), Ok(6));

    let child = files.fork();
    assert_eq!(child.status(2), Some(FdStatus::Opened));
    // 子进程继承游标
    assert_eq!(child.seek(2, 0, SeekWhence::Cur), Ok(6));
    child.close_all();
    assert_eq!(child.status(1), Some(FdStatus::Opened));
    assert_eq!(child.status(2), Some(FdStatus::None));

    let node = files.lookup("/shared").unwrap();
    assert_eq!(node.open_count(), 5);
    child.destroy();
    files.destroy();
    assert_eq!(node.open_count(), 0);
    assert_eq!(node.ref_count(), 1);
    node.put();
}

#[test]
fn test_cleanup_unmounts_once_idle() {
    let sys = boot();
    let fd = sys
        .files
        .open("/busy", OpenFlags::O_CREAT | OpenFlags::O_RDWR)
        .unwrap();

    // 仍有打开的文件时卸载失败，文件系统保持挂载
    fs_cleanup(&sys.vfs);
    let root = sys.vfs.get_root("disk0").unwrap();
    root.put();
    assert_eq!(sys.files.write(fd, b"still here"), Ok(10));

    sys.files.destroy();
    fs_cleanup(&sys.vfs);
    assert_eq!(
        sys.vfs.get_root("disk0").unwrap_err(),
        FsError::DeviceNotAvailable
    );
    assert_eq!(sys.vfs.get_bootfs().unwrap_err(), FsError::NotFound);
    assert_eq!(sys.vfs.unmount("disk0"), Err(FsError::InvalidArgument));
}
