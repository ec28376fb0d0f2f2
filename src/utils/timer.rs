use std::{
    collections::BTreeMap,
    future::Future,
    pin::Pin,
    sync::{Condvar, Mutex, OnceLock},
    task::{Context, Poll, Waker},
    thread,
    time::{Duration, Instant},
};

static REGISTRY: OnceLock<SleepRegistry> = OnceLock::new();

fn registry() -> &'static SleepRegistry {
    REGISTRY.get_or_init(|| {
        thread::Builder::new()
            .name("sigform-timer".into())
            .spawn(|| registry().run_worker())
            .expect("failed to spawn timer thread");
        SleepRegistry {
            queue: Mutex::new(SleepQueue {
                tasks: BTreeMap::new(),
                next_seq: 0,
            }),
            condvar: Condvar::new(),
        }
    })
}

struct SleepRegistry {
    queue: Mutex<SleepQueue>,
    condvar: Condvar,
}

struct SleepQueue {
    tasks: BTreeMap<Key, Waker>,
    next_seq: u64,
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Key {
    at: Instant,
    seq: u64,
}

impl SleepRegistry {
    fn run_worker(&self) {
        let mut wakes = Vec::new();
        let mut queue = self.queue.lock().unwrap();
        loop {
            let now = Instant::now();
            while let Some(entry) = queue.tasks.first_entry() {
                if entry.key().at > now {
                    break;
                }
                wakes.push(entry.remove());
            }
            if !wakes.is_empty() {
                drop(queue);
                for waker in wakes.drain(..) {
                    waker.wake();
                }
                queue = self.queue.lock().unwrap();
                continue;
            }
            queue = if let Some((key, _)) = queue.tasks.first_key_value() {
                let wait = key.at.saturating_duration_since(now);
                self.condvar.wait_timeout(queue, wait).unwrap().0
            } else {
                self.condvar.wait(queue).unwrap()
            };
        }
    }

    fn insert(&self, at: Instant, waker: Waker) -> Key {
        let mut queue = self.queue.lock().unwrap();
        let key = Key {
            at,
            seq: queue.next_seq,
        };
        queue.next_seq += 1;
        queue.tasks.insert(key, waker);
        drop(queue);
        self.condvar.notify_one();
        key
    }

    fn set_waker(&self, key: Key, waker: &Waker) {
        let mut queue = self.queue.lock().unwrap();
        if let Some(entry) = queue.tasks.get_mut(&key) {
            if !entry.will_wake(waker) {
                *entry = waker.clone();
            }
        }
    }

    fn remove(&self, key: Key) {
        self.queue.lock().unwrap().tasks.remove(&key);
    }
}

/// Completes once `duration` has elapsed.
///
/// Wake-ups are delivered by a shared worker thread, so the future can be
/// awaited from the single-threaded reactive runtime.
pub(crate) fn sleep(duration: Duration) -> Sleep {
    Sleep {
        at: Instant::now() + duration,
        key: None,
    }
}

pub(crate) struct Sleep {
    at: Instant,
    key: Option<Key>,
}

impl Future for Sleep {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<()> {
        if Instant::now() >= self.at {
            if let Some(key) = self.key.take() {
                registry().remove(key);
            }
            return Poll::Ready(());
        }
        match self.key {
            Some(key) => registry().set_waker(key, cx.waker()),
            None => self.key = Some(registry().insert(self.at, cx.waker().clone())),
        }
        Poll::Pending
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            registry().remove(key);
        }
    }
}
