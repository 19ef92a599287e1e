use std::sync::{Arc, Mutex};

use device::{Console, Disk, RamDisk, Stdin, Stdout, WaitQueue, WakeReason};
use fs::fs_init;
use vfs::{FilesStruct, Vfs};

pub const DISK_BLOCKS: usize = 16;

/// 测试中读者不应阻塞：缓冲区总是先喂好数据
pub struct NoWait;

impl WaitQueue for NoWait {
    fn has_waiters(&self) -> bool {
        false
    }

    fn prepare_to_wait(&self, _reason: WakeReason) -> usize {
        0
    }

    fn schedule(&self) {
        panic!("reader would block forever");
    }

    fn finish_wait(&self, _token: usize) -> Option<WakeReason> {
        None
    }

    fn wake_up_all(&self, _reason: WakeReason) {}
}

#[derive(Default)]
pub struct Screen(pub Mutex<Vec<u8>>);

impl Console for Screen {
    fn put_char(&self, c: u8) {
        self.0.lock().unwrap().push(c);
    }
}

pub struct System {
    pub vfs: Arc<Vfs>,
    pub files: FilesStruct,
    pub stdin: Arc<Stdin>,
    pub screen: Arc<Screen>,
}

pub fn raw_disk(blocks: usize) -> (Arc<RamDisk>, Arc<Disk>) {
    let raw = RamDisk::new(blocks * device::config::DISK0_BLKSIZE, 512, 0);
    let disk = Arc::new(Disk::new(raw.clone()).unwrap());
    (raw, disk)
}

pub fn boot() -> System {
    test_support::init_arch_ops();
    let stdin = Arc::new(Stdin::new(Arc::new(NoWait)));
    let screen = Arc::new(Screen::default());
    let stdout = Arc::new(Stdout::new(screen.clone()));
    let (_raw, disk) = raw_disk(DISK_BLOCKS);
    let vfs = fs_init(stdin.clone(), stdout, disk).unwrap();
    let files = FilesStruct::new(vfs.clone());
    System {
        vfs,
        files,
        stdin,
        screen,
    }
}
