//! 解码流水线
//!
//! 每个 tick 运行一次：从环形缓冲区取出所有帧（直到为空），按 ID 查找解码规则，
//! 把部分更新应用到工作副本上，然后整帧发布到 [`StateStore`]。
//!
//! 帧按 FIFO 顺序处理，下一帧开始之前上一帧的所有字段已经发布完毕。

use crate::capture::monotonic_micros;
use crate::hooks::HookManager;
use crate::metrics::BusMetrics;
use crate::ring::RingConsumer;
use crate::state::{StateHandle, StateStore, VehicleState};
use carbus_protocol::{RawFrame, rule_for};
use std::sync::atomic::Ordering;
use std::sync::{Arc, RwLock};
use tracing::{debug, trace, warn};

/// 单次 drain 的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// 出队的帧数
    pub frames: usize,
    /// 其中有解码规则的帧数
    pub decoded: usize,
    /// 距上次 drain 新增的溢出丢帧数
    pub new_overflows: u64,
}

/// 状态解码器（tick 上下文独占）
pub struct Decoder {
    consumer: RingConsumer,
    working: VehicleState,
    store: StateStore,
    metrics: Arc<BusMetrics>,
    hooks: Arc<RwLock<HookManager>>,
    overflow_seen: u64,
    /// 最近一次取出帧的时刻（`monotonic_micros`，0 表示从未收到）
    last_activity_us: u64,
}

impl Decoder {
    pub fn new(
        consumer: RingConsumer,
        metrics: Arc<BusMetrics>,
        hooks: Arc<RwLock<HookManager>>,
    ) -> Self {
        Self {
            consumer,
            working: VehicleState::default(),
            store: StateStore::new(),
            metrics,
            hooks,
            overflow_seen: 0,
            last_activity_us: 0,
        }
    }

    /// 状态读取句柄
    pub fn handle(&self) -> StateHandle {
        self.store.handle()
    }

    /// 解码器内部的最新状态（与最近一次发布的快照相同）
    pub fn state(&self) -> &VehicleState {
        &self.working
    }

    /// 最近一次取出帧的单调时间戳
    ///
    /// 帧自带的时间戳可能来自适配器的时钟，这里始终使用 [`monotonic_micros`]。
    pub fn last_activity_us(&self) -> u64 {
        self.last_activity_us
    }

    /// 取出并处理缓冲区中的所有帧
    pub fn drain(&mut self) -> DrainReport {
        let mut report = DrainReport::default();

        while let Some(frame) = self.consumer.pop() {
            report.frames += 1;
            if self.process_frame(&frame) {
                report.decoded += 1;
            }
        }
        if report.frames > 0 {
            self.last_activity_us = monotonic_micros();
        }

        let overflows = self.metrics.overflow_drops.load(Ordering::Relaxed);
        // reset() 之后计数器可能小于上次看到的值
        report.new_overflows = overflows.saturating_sub(self.overflow_seen);
        self.overflow_seen = overflows;
        if report.new_overflows > 0 {
            warn!(
                "Frame ring overflow: {} frame(s) dropped since last tick (capacity {})",
                report.new_overflows,
                self.consumer.capacity()
            );
        }

        report
    }

    /// 处理单帧；返回 `false` 表示 ID 未知
    pub fn process_frame(&mut self, frame: &RawFrame) -> bool {
        if let Ok(hooks) = self.hooks.read() {
            hooks.trigger_all(frame);
        }

        let Some(rule) = rule_for(frame.id) else {
            self.metrics.unknown_ids.fetch_add(1, Ordering::Relaxed);
            trace!("ignoring unknown id 0x{:03X}", frame.id);
            return false;
        };
        self.metrics.frames_decoded.fetch_add(1, Ordering::Relaxed);

        if rule.is_partial(frame.len()) {
            self.metrics.partial_decodes.fetch_add(1, Ordering::Relaxed);
            debug!(
                "partial decode of {} (0x{:03X}): {} of {} bytes",
                rule.name,
                frame.id,
                frame.len(),
                rule.full_len
            );
        }

        let feedback = (rule.decode)(frame.data_slice());
        trace!("{} → {:?}", frame, feedback);

        self.working.apply(&feedback, frame.timestamp_us);
        self.store.publish(&self.working);
        true
    }
}
