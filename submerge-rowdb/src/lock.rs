use std::sync::{Condvar, Mutex};

#[cfg(test)]
use test_log::test;

/// A node-level reader/writer permit, exposed as plain lock/unlock calls
/// rather than RAII guards.
///
/// Hand-over-hand descent needs to hold a parent's permit and a child's
/// permit at the same time and then drop only the parent's; that shape does
/// not fit a guard whose lifetime is borrowed from `&self`, since the next
/// node to lock is only known once the parent's own data has been read.
/// Plain `lock_*`/`unlock_*` methods sidestep the borrow entirely, mirroring
/// the explicit `pthread_rwlock`-style discipline this was translated from.
///
/// Policy is writer-preference: once a writer is waiting, newly arriving
/// readers queue behind it rather than continuing to pile in ahead of it.
#[derive(Debug, Default)]
pub struct NodeLock {
    state: Mutex<LockState>,
    cv: Condvar,
}

#[derive(Debug, Default)]
struct LockState {
    readers: u32,
    writer: bool,
    waiting_writers: u32,
}

impl NodeLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_read(&self) {
        let mut state = self.state.lock().expect("node lock poisoned");
        while state.writer || state.waiting_writers > 0 {
            state = self.cv.wait(state).expect("node lock poisoned");
        }
        state.readers += 1;
    }

    pub fn unlock_read(&self) {
        let mut state = self.state.lock().expect("node lock poisoned");
        assert!(state.readers > 0, "unlock_read with no readers held");
        state.readers -= 1;
        if state.readers == 0 {
            self.cv.notify_all();
        }
    }

    pub fn lock_write(&self) {
        let mut state = self.state.lock().expect("node lock poisoned");
        state.waiting_writers += 1;
        while state.writer || state.readers > 0 {
            state = self.cv.wait(state).expect("node lock poisoned");
        }
        state.waiting_writers -= 1;
        state.writer = true;
    }

    pub fn unlock_write(&self) {
        let mut state = self.state.lock().expect("node lock poisoned");
        assert!(state.writer, "unlock_write without holding the writer permit");
        state.writer = false;
        self.cv.notify_all();
    }
}

#[test]
fn read_locks_are_shared() {
    use std::sync::Arc;
    use std::thread;

    let lock = Arc::new(NodeLock::new());
    lock.lock_read();
    let l2 = Arc::clone(&lock);
    let handle = thread::spawn(move || {
        l2.lock_read();
        l2.unlock_read();
    });
    handle.join().unwrap();
    lock.unlock_read();
}

#[test]
fn write_excludes_everything() {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    let lock = Arc::new(NodeLock::new());
    let writer_done = Arc::new(AtomicBool::new(false));

    lock.lock_write();
    let l2 = Arc::clone(&lock);
    let wd2 = Arc::clone(&writer_done);
    let handle = thread::spawn(move || {
        l2.lock_read();
        assert!(wd2.load(Ordering::SeqCst), "reader got in before writer left");
        l2.unlock_read();
    });

    thread::sleep(Duration::from_millis(20));
    writer_done.store(true, Ordering::SeqCst);
    lock.unlock_write();
    handle.join().unwrap();
}

#[test]
fn waiting_writer_blocks_new_readers() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    let lock = Arc::new(NodeLock::new());
    let order = Arc::new(AtomicUsize::new(0));
    let start = Arc::new(Barrier::new(3));

    // Hold a read lock so the writer below has to wait.
    lock.lock_read();

    let writer_lock = Arc::clone(&lock);
    let writer_order = Arc::clone(&order);
    let writer_start = Arc::clone(&start);
    let writer = thread::spawn(move || {
        writer_start.wait();
        thread::sleep(Duration::from_millis(10));
        writer_lock.lock_write();
        writer_order.fetch_add(1, Ordering::SeqCst);
        writer_lock.unlock_write();
    });

    let reader_lock = Arc::clone(&lock);
    let reader_order = Arc::clone(&order);
    let reader_start = Arc::clone(&start);
    let reader = thread::spawn(move || {
        reader_start.wait();
        thread::sleep(Duration::from_millis(20));
        reader_lock.lock_read();
        // The writer queued up before this reader arrived, so it must run first.
        assert_eq!(reader_order.load(Ordering::SeqCst), 1);
        reader_lock.unlock_read();
    });

    start.wait();
    thread::sleep(Duration::from_millis(15));
    lock.unlock_read();

    writer.join().unwrap();
    reader.join().unwrap();
}
