// Copyright @yucwang 2026

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

pub type TaskFn = Arc<dyn Fn(u32, u32) + Send + Sync>;
type CompletionFn = Box<dyn FnOnce() + Send>;

/// Handle on one enqueued batch of indexed tasks.
pub struct TaskGroup {
    // Dropped once the batch completes, so captures do not outlive it.
    task: Mutex<Option<TaskFn>>,
    count: u32,
    next: AtomicU32,
    dispatched: AtomicU32,
    finished: AtomicU32,
    aborted: AtomicBool,
    exhausted: AtomicBool,
    completion: Mutex<Option<CompletionFn>>,
    done: Mutex<bool>,
    done_cv: Condvar,
}

impl TaskGroup {
    fn new(task: TaskFn, count: u32, completion: CompletionFn) -> Self {
        Self {
            task: Mutex::new(Some(task)),
            count,
            next: AtomicU32::new(0),
            dispatched: AtomicU32::new(0),
            finished: AtomicU32::new(0),
            aborted: AtomicBool::new(false),
            exhausted: AtomicBool::new(false),
            completion: Mutex::new(Some(completion)),
            done: Mutex::new(false),
            done_cv: Condvar::new(),
        }
    }

    // Claims the next work item, or None when the batch is drained/aborted.
    fn claim(&self) -> Option<u32> {
        if self.aborted.load(Ordering::Acquire) {
            return None;
        }
        let item = self.next.fetch_add(1, Ordering::AcqRel);
        if item >= self.count {
            return None;
        }
        self.dispatched.fetch_add(1, Ordering::AcqRel);
        Some(item)
    }

    fn finish_item(&self) {
        self.finished.fetch_add(1, Ordering::AcqRel);
        self.try_complete();
    }

    fn try_complete(&self) {
        if !self.exhausted.load(Ordering::Acquire) {
            return;
        }
        if self.finished.load(Ordering::Acquire) != self.dispatched.load(Ordering::Acquire) {
            return;
        }

        let completion = self.completion.lock().unwrap().take();
        if let Some(cb) = completion {
            cb();
            *self.task.lock().unwrap() = None;
            let mut done = self.done.lock().unwrap();
            *done = true;
            self.done_cv.notify_all();
        }
    }

    /// Blocks until every dispatched item has finished and the completion
    /// callback has run.
    pub fn wait(&self) {
        let mut done = self.done.lock().unwrap();
        while !*done {
            done = self.done_cv.wait(done).unwrap();
        }
    }

    /// Stops dispatching further items. In-flight items finish naturally.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }
}

struct PoolShared {
    queue: Mutex<VecDeque<Arc<TaskGroup>>>,
    work_cv: Condvar,
    shutdown: AtomicBool,
}

/// Fixed-size worker pool executing indexed task batches. Tasks receive
/// (work item id, worker id); the worker id indexes per-worker scratch.
pub struct ThreadPool {
    shared: Arc<PoolShared>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl ThreadPool {
    pub fn new(thread_count: usize) -> Self {
        let thread_count = thread_count.max(1);
        let shared = Arc::new(PoolShared {
            queue: Mutex::new(VecDeque::new()),
            work_cv: Condvar::new(),
            shutdown: AtomicBool::new(false),
        });

        let workers = (0..thread_count)
            .map(|worker_id| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || worker_loop(shared, worker_id as u32))
            })
            .collect();

        Self { shared, workers }
    }

    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }

    pub fn enqueue(
        &self,
        task: TaskFn,
        count: u32,
        completion: impl FnOnce() + Send + 'static,
    ) -> Arc<TaskGroup> {
        let group = Arc::new(TaskGroup::new(task, count, Box::new(completion)));
        {
            let mut queue = self.shared.queue.lock().unwrap();
            queue.push_back(Arc::clone(&group));
        }
        self.shared.work_cv.notify_all();
        group
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.work_cv.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(shared: Arc<PoolShared>, worker_id: u32) {
    loop {
        let group = {
            let mut queue = shared.queue.lock().unwrap();
            loop {
                if shared.shutdown.load(Ordering::Acquire) {
                    return;
                }
                if let Some(group) = queue.front() {
                    break Arc::clone(group);
                }
                queue = shared.work_cv.wait(queue).unwrap();
            }
        };

        // Drain this batch, then retire it from the queue.
        let task = group.task.lock().unwrap().clone();
        if let Some(task) = task {
            while let Some(item) = group.claim() {
                task(item, worker_id);
                group.finish_item();
            }
        }

        group.exhausted.store(true, Ordering::Release);
        {
            let mut queue = shared.queue.lock().unwrap();
            if let Some(front) = queue.front() {
                if Arc::ptr_eq(front, &group) {
                    queue.pop_front();
                }
            }
        }
        group.try_complete();
    }
}

/* Tests for the thread pool */
