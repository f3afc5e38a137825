//! 总线运行指标
//!
//! 零开销的原子计数器，捕获线程和 tick 上下文都可以无锁更新，任何线程都可以读取快照。
//! 运行期的异常情况（溢出、未知 ID、发送失败）只计数和记录日志，不会作为 `Err` 向上传播。

use std::sync::atomic::{AtomicU64, Ordering};

/// 总线实时指标
///
/// # 使用示例
///
/// ```rust
/// use carbus_driver::BusMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = BusMetrics::new();
/// metrics.frames_captured.fetch_add(1, Ordering::Relaxed);
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.frames_captured, 1);
/// ```
#[derive(Debug, Default)]
pub struct BusMetrics {
    /// 成功写入环形缓冲区的帧数
    pub frames_captured: AtomicU64,

    /// 缓冲区满被丢弃的帧数
    ///
    /// 持续增长说明 tick 周期太长，或者缓冲区容量不足以吸收总线突发。
    pub overflow_drops: AtomicU64,

    /// 捕获阶段的传输错误次数
    pub capture_errors: AtomicU64,

    /// 有解码规则并已应用到状态的帧数（不含未知 ID）
    pub frames_decoded: AtomicU64,

    /// 没有解码规则的帧数
    pub unknown_ids: AtomicU64,

    /// 载荷过短、只解码了部分字段的帧数
    pub partial_decodes: AtomicU64,

    /// 成功发送的控制帧数
    pub tx_frames: AtomicU64,

    /// 发送失败次数
    pub tx_failures: AtomicU64,

    /// 正常完成的命令数
    pub commands_completed: AtomicU64,

    /// 因发送失败被放弃的命令数
    pub commands_abandoned: AtomicU64,

    /// 被同类新请求更新的命令数
    pub commands_superseded: AtomicU64,
}

impl BusMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取所有计数器（`Relaxed`，计数器之间可能有微小的时间差）
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            overflow_drops: self.overflow_drops.load(Ordering::Relaxed),
            capture_errors: self.capture_errors.load(Ordering::Relaxed),
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            unknown_ids: self.unknown_ids.load(Ordering::Relaxed),
            partial_decodes: self.partial_decodes.load(Ordering::Relaxed),
            tx_frames: self.tx_frames.load(Ordering::Relaxed),
            tx_failures: self.tx_failures.load(Ordering::Relaxed),
            commands_completed: self.commands_completed.load(Ordering::Relaxed),
            commands_abandoned: self.commands_abandoned.load(Ordering::Relaxed),
            commands_superseded: self.commands_superseded.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        self.frames_captured.store(0, Ordering::Relaxed);
        self.overflow_drops.store(0, Ordering::Relaxed);
        self.capture_errors.store(0, Ordering::Relaxed);
        self.frames_decoded.store(0, Ordering::Relaxed);
        self.unknown_ids.store(0, Ordering::Relaxed);
        self.partial_decodes.store(0, Ordering::Relaxed);
        self.tx_frames.store(0, Ordering::Relaxed);
        self.tx_failures.store(0, Ordering::Relaxed);
        self.commands_completed.store(0, Ordering::Relaxed);
        self.commands_abandoned.store(0, Ordering::Relaxed);
        self.commands_superseded.store(0, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub frames_captured: u64,
    pub overflow_drops: u64,
    pub capture_errors: u64,
    pub frames_decoded: u64,
    pub unknown_ids: u64,
    pub partial_decodes: u64,
    pub tx_frames: u64,
    pub tx_failures: u64,
    pub commands_completed: u64,
    pub commands_abandoned: u64,
    pub commands_superseded: u64,
}

impl MetricsSnapshot {
    /// 溢出丢帧率（百分比）
    ///
    /// 返回 0.0 到 100.0 之间的值。没有任何帧到达时返回 0.0。
    pub fn overflow_rate(&self) -> f64 {
        let offered = self.frames_captured + self.overflow_drops;
        if offered == 0 {
            return 0.0;
        }
        (self.overflow_drops as f64 / offered as f64) * 100.0
    }

    /// 已知 ID 占比（百分比）
    pub fn known_id_rate(&self) -> f64 {
        let processed = self.frames_decoded + self.unknown_ids;
        if processed == 0 {
            return 0.0;
        }
        (self.frames_decoded as f64 / processed as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_metrics_default() {
        let snapshot = BusMetrics::new().snapshot();
        assert_eq!(snapshot, MetricsSnapshot::default());
    }

    #[test]
    fn test_metrics_reset() {
        let metrics = BusMetrics::new();
        metrics.frames_captured.fetch_add(100, Ordering::Relaxed);
        metrics.tx_failures.fetch_add(3, Ordering::Relaxed);
        assert_eq!(metrics.snapshot().frames_captured, 100);

        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_metrics_concurrent_updates() {
        let metrics = Arc::new(BusMetrics::new());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let m = metrics.clone();
                thread::spawn(move || {
                    for _ in 0..250 {
                        m.frames_captured.fetch_add(1, Ordering::Relaxed);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.snapshot().frames_captured, 1000);
    }

    #[test]
    fn test_snapshot_rates() {
        let snapshot = MetricsSnapshot {
            frames_captured: 32,
            overflow_drops: 8,
            frames_decoded: 24,
            unknown_ids: 8,
            ..Default::default()
        };
        assert_eq!(snapshot.overflow_rate(), 20.0);
        assert_eq!(snapshot.known_id_rate(), 75.0);
        assert_eq!(MetricsSnapshot::default().overflow_rate(), 0.0);
    }
}
