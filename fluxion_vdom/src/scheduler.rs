use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    rc::Rc,
};

/// A unit of deferred work. Jobs with an id are deduplicated: queueing an
/// id already present is a no-op. Render jobs carry their component
/// instance's monotonic id, so components update in creation order.
#[derive(Clone)]
pub(crate) struct Job {
    pub id: Option<u64>,
    pub f: Rc<dyn Fn()>,
}

impl Job {
    pub fn new(id: Option<u64>, f: impl Fn() + 'static) -> Self {
        Job {
            id,
            f: Rc::new(f),
        }
    }
}

/// The three flush phases of a tick: pre-flush callbacks, render jobs
/// (component effects and the patches they cause), and post-flush
/// callbacks (`mounted`, `updated`, and friends queued during patching).
///
/// Each phase drains in insertion order (render and post additionally
/// order by job id), jobs queued during a phase drain before the next
/// phase begins, and a flush guard keeps nested renders from
/// double-flushing.
#[derive(Default)]
pub(crate) struct Scheduler {
    pre: RefCell<VecDeque<Job>>,
    queue: RefCell<Vec<Job>>,
    post: RefCell<Vec<Job>>,
    is_flushing: Cell<bool>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` inside the flush guard: jobs queued during `f` drain once
    /// when the outermost guarded region ends.
    pub fn with_guard<T>(&self, f: impl FnOnce() -> T) -> T {
        if self.is_flushing.get() {
            return f();
        }
        self.is_flushing.set(true);
        let result = f();
        self.drain();
        self.is_flushing.set(false);
        result
    }

    pub fn queue_pre(&self, job: Job) {
        {
            let mut pre = self.pre.borrow_mut();
            if job.id.is_some() && pre.iter().any(|j| j.id == job.id) {
                return;
            }
            pre.push_back(job);
        }
        self.flush();
    }

    pub fn queue_job(&self, job: Job) {
        {
            let mut queue = self.queue.borrow_mut();
            if job.id.is_some() && queue.iter().any(|j| j.id == job.id) {
                return;
            }
            let at = queue
                .iter()
                .position(|j| j.id > job.id)
                .unwrap_or(queue.len());
            queue.insert(at, job);
        }
        self.flush();
    }

    pub fn queue_post(&self, job: Job) {
        {
            let mut post = self.post.borrow_mut();
            if job.id.is_some() && post.iter().any(|j| j.id == job.id) {
                return;
            }
            post.push(job);
        }
        self.flush();
    }

    /// Drops a pending render job, e.g. when its component unmounts
    /// before the flush reaches it.
    pub fn invalidate(&self, id: u64) {
        self.queue.borrow_mut().retain(|j| j.id != Some(id));
        self.post.borrow_mut().retain(|j| j.id != Some(id));
    }

    fn flush(&self) {
        if self.is_flushing.get() {
            return;
        }
        self.is_flushing.set(true);
        self.drain();
        self.is_flushing.set(false);
    }

    fn drain(&self) {
        loop {
            // pre-flush callbacks run ahead of every render job
            let pre_job = self.pre.borrow_mut().pop_front();
            if let Some(job) = pre_job {
                (job.f)();
                continue;
            }
            let render_job = {
                let mut queue = self.queue.borrow_mut();
                if queue.is_empty() {
                    None
                } else {
                    Some(queue.remove(0))
                }
            };
            if let Some(job) = render_job {
                (job.f)();
                continue;
            }
            // render settled: deliver this tick's post-flush callbacks
            let post_jobs = std::mem::take(&mut *self.post.borrow_mut());
            if post_jobs.is_empty() {
                break;
            }
            for job in post_jobs {
                (job.f)();
            }
        }
    }
}
