//! 异步帧记录钩子
//!
//! 把经过 tick 上下文的帧（接收和发送）放进有界通道，由其他线程负责输出或落盘。
//! 通道满时丢弃新帧并计数，而不是阻塞 tick 或无限增长。
//!
//! 输出格式与串口日志相同（`RX: 0x0AA Data: ...` / `TX: ...`），
//! 回放工具可以直接读取这种格式。

use crate::hooks::FrameCallback;
use carbus_protocol::RawFrame;
use crossbeam_channel::{Receiver, Sender, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// 默认通道容量（约 10 秒 @ 500 帧/秒）
pub const DEFAULT_RECORDING_CAPACITY: usize = 5_000;

/// 帧方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Rx,
    Tx,
}

/// 带方向和时间戳的记录帧
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedFrame {
    pub direction: Direction,
    /// 捕获时间戳（微秒），直接取自帧本身
    pub timestamp_us: u64,
    pub frame: RawFrame,
}

impl std::fmt::Display for RecordedFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self.direction {
            Direction::Rx => "RX",
            Direction::Tx => "TX",
        };
        write!(f, "{}: 0x{:03X} Data:", tag, self.frame.id)?;
        for byte in self.frame.data_slice() {
            write!(f, " {:02X}", byte)?;
        }
        Ok(())
    }
}

/// 异步记录钩子
pub struct AsyncRecordingHook {
    tx: Sender<RecordedFrame>,
    dropped_frames: Arc<AtomicU64>,
    frame_counter: Arc<AtomicU64>,
    /// 是否记录发送帧
    record_tx: bool,
}

impl AsyncRecordingHook {
    /// 使用默认容量创建，同时记录接收和发送帧
    #[must_use]
    pub fn new() -> (Self, Receiver<RecordedFrame>) {
        Self::with_capacity(DEFAULT_RECORDING_CAPACITY, true)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize, record_tx: bool) -> (Self, Receiver<RecordedFrame>) {
        let (tx, rx) = bounded(capacity);
        let hook = Self {
            tx,
            dropped_frames: Arc::new(AtomicU64::new(0)),
            frame_counter: Arc::new(AtomicU64::new(0)),
            record_tx,
        };
        (hook, rx)
    }

    /// 丢帧计数器（创建后直接持有 `Arc`，注册为回调后仍可读取）
    #[must_use]
    pub fn dropped_frames(&self) -> &Arc<AtomicU64> {
        &self.dropped_frames
    }

    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn frame_counter(&self) -> &Arc<AtomicU64> {
        &self.frame_counter
    }

    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_counter.load(Ordering::Relaxed)
    }

    #[inline]
    fn record(&self, direction: Direction, frame: &RawFrame) {
        let recorded = RecordedFrame {
            direction,
            timestamp_us: frame.timestamp_us,
            frame: *frame,
        };
        if self.tx.try_send(recorded).is_err() {
            self.dropped_frames.fetch_add(1, Ordering::Relaxed);
        } else {
            self.frame_counter.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl FrameCallback for AsyncRecordingHook {
    #[inline]
    fn on_frame_received(&self, frame: &RawFrame) {
        self.record(Direction::Rx, frame);
    }

    #[inline]
    fn on_frame_sent(&self, frame: &RawFrame) {
        if self.record_tx {
            self.record(Direction::Tx, frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_records_rx_and_tx() {
        let (hook, rx) = AsyncRecordingHook::new();
        let callback = Arc::new(hook) as Arc<dyn FrameCallback>;

        let frame = RawFrame::new_standard(0x0AA, &[0, 0, 0xFF, 0, 0xA0, 0x07]).with_timestamp(777);
        callback.on_frame_received(&frame);
        callback.on_frame_sent(&RawFrame::new_standard(0x24B, &[0x01, 0xF8]));

        let first = rx.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(first.direction, Direction::Rx);
        assert_eq!(first.timestamp_us, 777);
        assert_eq!(first.to_string(), "RX: 0x0AA Data: 00 00 FF 00 A0 07");

        let second = rx.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(second.to_string(), "TX: 0x24B Data: 01 F8");
    }

    #[test]
    fn test_tx_recording_can_be_disabled() {
        let (hook, rx) = AsyncRecordingHook::with_capacity(4, false);
        hook.on_frame_sent(&RawFrame::new_standard(0x24B, &[0x01, 0xF8]));
        assert!(rx.try_recv().is_err());
        assert_eq!(hook.frame_count(), 0);
    }

    #[test]
    fn test_full_channel_drops_newest() {
        let (hook, rx) = AsyncRecordingHook::with_capacity(2, true);
        let dropped = hook.dropped_frames().clone();

        for n in 0..5u8 {
            hook.on_frame_received(&RawFrame::new_standard(0x100, &[n]));
        }

        assert_eq!(hook.frame_count(), 2);
        assert_eq!(dropped.load(Ordering::Relaxed), 3);
        assert_eq!(rx.try_recv().unwrap().frame.data_slice(), &[0]);
        assert_eq!(rx.try_recv().unwrap().frame.data_slice(), &[1]);
    }

    #[test]
    fn test_closed_receiver_counts_drops() {
        let (hook, rx) = AsyncRecordingHook::new();
        drop(rx);
        hook.on_frame_received(&RawFrame::new_standard(0x130, &[0x41]));
        assert_eq!(hook.dropped_count(), 1);
    }
}
