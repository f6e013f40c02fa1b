//! 单槽邮箱（最新值覆盖）
//!
//! 生产者随时写入，消费者按自己的节拍读取最新值。
//! 写入永不阻塞；消费者读取前的多次写入只保留最后一次，被覆盖的次数会计数。

use arc_swap::ArcSwap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

struct Inner<T> {
    slot: ArcSwap<T>,
    fresh: AtomicBool,
    posts: AtomicU64,
    overwrites: AtomicU64,
}

/// 单槽邮箱
///
/// 克隆得到的句柄共享同一个槽位。
pub struct Mailbox<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Mailbox<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Mailbox<T> {
    /// 以初始值创建（初始值不算作未读）
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                slot: ArcSwap::from_pointee(initial),
                fresh: AtomicBool::new(false),
                posts: AtomicU64::new(0),
                overwrites: AtomicU64::new(0),
            }),
        }
    }

    /// 写入新值（覆盖旧值）
    pub fn post(&self, value: T) {
        self.inner.slot.store(Arc::new(value));
        let posts = self.inner.posts.fetch_add(1, Ordering::Relaxed) + 1;
        if self.inner.fresh.swap(true, Ordering::AcqRel) {
            let overwrites = self.inner.overwrites.fetch_add(1, Ordering::Relaxed) + 1;
            debug!("mailbox overwrite ({} of {} posts)", overwrites, posts);
        }
    }

    /// 读取最新值并标记为已读
    pub fn latest(&self) -> Arc<T> {
        self.inner.fresh.store(false, Ordering::Release);
        self.inner.slot.load_full()
    }

    /// 只在有未读值时返回
    pub fn take_fresh(&self) -> Option<Arc<T>> {
        if self.inner.fresh.swap(false, Ordering::AcqRel) {
            Some(self.inner.slot.load_full())
        } else {
            None
        }
    }

    /// 是否有未读值
    pub fn has_fresh(&self) -> bool {
        self.inner.fresh.load(Ordering::Acquire)
    }

    pub fn posts(&self) -> u64 {
        self.inner.posts.load(Ordering::Relaxed)
    }

    /// 未被读取就被覆盖的次数
    pub fn overwrites(&self) -> u64 {
        self.inner.overwrites.load(Ordering::Relaxed)
    }
}

impl<T: Default> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Copy> Mailbox<T> {
    /// 读取最新值的拷贝
    pub fn get(&self) -> T {
        *self.latest()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Mailbox<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailbox")
            .field("value", &*self.inner.slot.load_full())
            .field("fresh", &self.has_fresh())
            .field("posts", &self.posts())
            .field("overwrites", &self.overwrites())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_latest_value_wins() {
        let mailbox = Mailbox::new(0u32);
        mailbox.post(1);
        mailbox.post(2);
        mailbox.post(3);
        assert_eq!(mailbox.get(), 3);
        assert_eq!(mailbox.posts(), 3);
        assert_eq!(mailbox.overwrites(), 2);
    }

    #[test]
    fn test_read_clears_fresh() {
        let mailbox = Mailbox::new(0u32);
        assert!(mailbox.take_fresh().is_none());

        mailbox.post(7);
        assert!(mailbox.has_fresh());
        assert_eq!(mailbox.take_fresh().as_deref(), Some(&7));
        assert!(mailbox.take_fresh().is_none());

        // 读过之后再写不算覆盖
        mailbox.post(8);
        assert_eq!(mailbox.overwrites(), 0);
        // 非消费式读取仍然拿到最新值
        assert_eq!(mailbox.get(), 8);
        assert_eq!(mailbox.get(), 8);
    }

    #[test]
    fn test_shared_across_threads() {
        let mailbox = Mailbox::new(0u64);
        let producer = mailbox.clone();
        let handle = thread::spawn(move || {
            for i in 1..=1000 {
                producer.post(i);
            }
        });
        handle.join().unwrap();
        assert_eq!(mailbox.get(), 1000);
        assert_eq!(mailbox.posts(), 1000);
    }
}
