//! 单生产者单消费者（SPSC）帧环形缓冲区
//!
//! 捕获上下文（生产者）和 tick 上下文（消费者）之间唯一共享的数据结构。
//!
//! # 协议
//!
//! - `head` 只由生产者推进，`tail` 只由消费者推进，两者都是单调递增的计数器
//! - 槽位下标为 `counter % capacity`，`head - tail` 即为当前帧数，满时恰好容纳 `capacity` 帧
//! - 生产者先写槽位，再以 `Release` 发布 `head`；消费者以 `Acquire` 读取 `head` 后才读槽位
//! - 消费者读完槽位后以 `Release` 发布 `tail`；生产者以 `Acquire` 读取 `tail` 后才复用槽位
//!
//! 单生产者/单消费者由类型系统保证：[`FrameRing::split`] 返回的两个句柄都不是 `Clone`，
//! 且 `push` / `pop` 需要 `&mut self`。

use carbus_protocol::RawFrame;
use std::cell::UnsafeCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

struct Shared {
    slots: Box<[UnsafeCell<RawFrame>]>,
    /// 下一个写入位置（生产者独占写）
    head: AtomicUsize,
    /// 下一个读取位置（消费者独占写）
    tail: AtomicUsize,
}

// SAFETY: 槽位只会被一个生产者和一个消费者访问，
// 且同一槽位的读写由 head/tail 的 Release/Acquire 配对严格分隔（见模块文档）。
unsafe impl Sync for Shared {}

impl Shared {
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        head.wrapping_sub(tail)
    }
}

/// 环形缓冲区构造入口
pub struct FrameRing;

impl FrameRing {
    /// 创建容量为 `capacity` 的缓冲区并拆分为生产者 / 消费者
    ///
    /// # Panics
    ///
    /// `capacity` 为 0 时 panic（配置校验阶段已拒绝该值）。
    pub fn split(capacity: usize) -> (RingProducer, RingConsumer) {
        assert!(capacity > 0, "ring capacity must be non-zero");

        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(RawFrame::default()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let shared = Arc::new(Shared {
            slots,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        });

        (
            RingProducer {
                shared: Arc::clone(&shared),
            },
            RingConsumer { shared },
        )
    }
}

/// 生产者句柄（捕获上下文）
pub struct RingProducer {
    shared: Arc<Shared>,
}

impl RingProducer {
    /// 写入一帧，从不阻塞
    ///
    /// 缓冲区已满时返回 `Err(frame)`，缓冲区内容保持不变（丢弃最新帧）。
    pub fn push(&mut self, frame: RawFrame) -> Result<(), RawFrame> {
        let shared = &*self.shared;
        let head = shared.head.load(Ordering::Relaxed);
        let tail = shared.tail.load(Ordering::Acquire);

        if head.wrapping_sub(tail) == shared.capacity() {
            return Err(frame);
        }

        let slot = &shared.slots[head % shared.capacity()];
        // SAFETY: head - tail < capacity，该槽位不在消费者可读范围内，
        // 消费者对它的最后一次读取已由 tail 的 Acquire 同步。
        unsafe { *slot.get() = frame };

        // 槽位写入完成后才发布
        shared.head.store(head.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.shared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }
}

/// 消费者句柄（tick 上下文）
pub struct RingConsumer {
    shared: Arc<Shared>,
}

impl RingConsumer {
    /// 取出最早的一帧，从不阻塞；缓冲区为空时返回 `None`
    pub fn pop(&mut self) -> Option<RawFrame> {
        let shared = &*self.shared;
        let tail = shared.tail.load(Ordering::Relaxed);
        let head = shared.head.load(Ordering::Acquire);

        if head == tail {
            return None;
        }

        let slot = &shared.slots[tail % shared.capacity()];
        // SAFETY: tail < head，生产者已通过 head 的 Release 发布该槽位，
        // 且在 tail 推进之前不会再写它。
        let frame = unsafe { *slot.get() };

        shared.tail.store(tail.wrapping_add(1), Ordering::Release);
        Some(frame)
    }

    /// 取出当前所有帧
    pub fn drain(&mut self) -> impl Iterator<Item = RawFrame> + '_ {
        std::iter::from_fn(move || self.pop())
    }

    pub fn len(&self) -> usize {
        self.shared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }
}
