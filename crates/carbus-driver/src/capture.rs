//! 中断上下文帧捕获
//!
//! 由传输层的"有帧可读"通知驱动。每次通知只做三件事：读一帧、打时间戳、写入环形缓冲区。
//! 这里不解码、不分配内存、不记录日志，也不接触 `VehicleState`；
//! 缓冲区满时丢弃新帧并计数，溢出告警由 tick 上下文的解码器负责。

use crate::metrics::BusMetrics;
use crate::ring::RingProducer;
use carbus_can::{CanError, RxAdapter};
use carbus_protocol::RawFrame;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::{debug, error, trace};

/// 单调时钟锚点（首次访问时设置）
static APP_START: OnceLock<Instant> = OnceLock::new();

/// 进程启动以来的单调微秒数（不受系统时钟调整影响）
pub fn monotonic_micros() -> u64 {
    let start = APP_START.get_or_init(Instant::now);
    // 0 保留为"时间戳不可用"
    (start.elapsed().as_micros() as u64).max(1)
}

/// 单次通知的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// 帧已写入缓冲区
    Queued,
    /// 缓冲区已满，帧被丢弃
    Dropped,
    /// 通知到达但没有可读的帧
    Empty,
    /// 传输层读取失败
    TransportError,
}

/// 帧捕获器（持有环形缓冲区的生产者端）
pub struct FrameCapture {
    producer: RingProducer,
    metrics: Arc<BusMetrics>,
}

impl FrameCapture {
    pub fn new(producer: RingProducer, metrics: Arc<BusMetrics>) -> Self {
        Self { producer, metrics }
    }

    /// 写入一帧已经读出的帧（传输层直接把帧交给通知回调时使用）
    ///
    /// 时间戳为 0 的帧会被打上捕获时刻。返回 `false` 表示缓冲区已满、帧被丢弃。
    #[inline]
    pub fn capture(&mut self, mut frame: RawFrame) -> bool {
        if frame.timestamp_us == 0 {
            frame.timestamp_us = monotonic_micros();
        }

        match self.producer.push(frame) {
            Ok(()) => {
                self.metrics.frames_captured.fetch_add(1, Ordering::Relaxed);
                true
            },
            Err(_) => {
                self.metrics.overflow_drops.fetch_add(1, Ordering::Relaxed);
                false
            },
        }
    }

    /// "有帧可读"通知处理：非阻塞地读取恰好一帧并写入缓冲区
    #[inline]
    pub fn on_frame_available<R: RxAdapter + ?Sized>(&mut self, rx: &mut R) -> CaptureOutcome {
        match rx.try_receive() {
            Ok(Some(frame)) => {
                if self.capture(frame) {
                    CaptureOutcome::Queued
                } else {
                    CaptureOutcome::Dropped
                }
            },
            Ok(None) => CaptureOutcome::Empty,
            Err(_) => {
                self.metrics.capture_errors.fetch_add(1, Ordering::Relaxed);
                CaptureOutcome::TransportError
            },
        }
    }

    /// 当前缓冲区中的帧数
    pub fn buffered(&self) -> usize {
        self.producer.len()
    }

    pub fn capacity(&self) -> usize {
        self.producer.capacity()
    }
}

/// 捕获线程主循环（宿主环境下模拟中断上下文）
///
/// 阻塞在 `rx.receive()` 上（超时由适配器决定），每收到一帧调用一次 [`FrameCapture::capture`]。
/// `is_running` 被清除或遇到致命传输错误时退出。
pub fn capture_loop<R: RxAdapter>(
    mut rx: R,
    mut capture: FrameCapture,
    is_running: Arc<AtomicBool>,
) {
    debug!("capture loop started (ring capacity {})", capture.capacity());

    while is_running.load(Ordering::Acquire) {
        match rx.receive() {
            Ok(frame) => {
                trace!("captured {}", frame);
                capture.capture(frame);
            },
            Err(CanError::Timeout) => continue,
            Err(e) if e.is_fatal() => {
                capture.metrics.capture_errors.fetch_add(1, Ordering::Relaxed);
                error!("capture loop: fatal transport error, exiting: {}", e);
                break;
            },
            Err(e) => {
                capture.metrics.capture_errors.fetch_add(1, Ordering::Relaxed);
                error!("capture loop: receive error: {}", e);
            },
        }
    }

    debug!("capture loop stopped");
}
