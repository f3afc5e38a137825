//! 车辆总线根对象
//!
//! [`VehicleBus`] 持有每个子系统的唯一实例（解码器、调度器、指标、钩子），
//! 以及可选的捕获线程。宿主的协作循环每个周期调用一次 [`VehicleBus::tick`]：
//! 先把环形缓冲区中的帧全部解码，再用最新状态推进调度器。

use crate::capture::monotonic_micros;
use crate::command::{CommandRequest, FrameBuffer};
use crate::config::DriverConfig;
use crate::hooks::{FrameCallback, HookManager};
use crate::metrics::{BusMetrics, MetricsSnapshot};
use crate::pipeline::{Decoder, DrainReport};
use crate::scheduler::CommandScheduler;
use crate::state::{StateHandle, VehicleState};
use carbus_can::TxAdapter;
use crossbeam_channel::{RecvTimeoutError, bounded};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::{JoinHandle, spawn};
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// 可超时的线程 join
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        let (tx, rx) = bounded(1);

        // 看门狗线程负责真正的 join；超时后它会继续运行直到目标线程退出
        spawn(move || {
            let _ = tx.send(self.join());
        });

        match rx.recv_timeout(timeout) {
            Ok(result) => result.map(|_| ()),
            Err(RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

/// 单个 tick 的结果
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub drain: DrainReport,
    /// 本 tick 发出的帧
    pub sent: FrameBuffer,
    pub completed: usize,
    pub abandoned: usize,
}

/// 车辆总线
pub struct VehicleBus<Tx: TxAdapter> {
    decoder: Decoder,
    scheduler: CommandScheduler,
    tx: Tx,
    metrics: Arc<BusMetrics>,
    hooks: Arc<RwLock<HookManager>>,
    config: DriverConfig,
    /// 捕获线程（只有 `build_split` 构建时存在）
    capture_thread: Option<JoinHandle<()>>,
    is_running: Arc<AtomicBool>,
}

impl<Tx: TxAdapter> VehicleBus<Tx> {
    pub(crate) fn new(
        decoder: Decoder,
        scheduler: CommandScheduler,
        tx: Tx,
        metrics: Arc<BusMetrics>,
        hooks: Arc<RwLock<HookManager>>,
        config: DriverConfig,
    ) -> Self {
        Self {
            decoder,
            scheduler,
            tx,
            metrics,
            hooks,
            config,
            capture_thread: None,
            is_running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub(crate) fn attach_capture_thread(
        &mut self,
        handle: JoinHandle<()>,
        is_running: Arc<AtomicBool>,
    ) {
        self.capture_thread = Some(handle);
        self.is_running = is_running;
    }

    /// 以当前时间运行一个周期
    pub fn tick(&mut self) -> TickReport {
        self.tick_at(Instant::now())
    }

    /// 以给定时间运行一个周期：解码所有缓冲帧，然后推进调度器
    pub fn tick_at(&mut self, now: Instant) -> TickReport {
        let drain = self.decoder.drain();
        let schedule = self.scheduler.tick_at(now, self.decoder.state(), &mut self.tx);

        TickReport {
            drain,
            sent: schedule.sent,
            completed: schedule.completed,
            abandoned: schedule.abandoned,
        }
    }

    /// 提交控制请求，第一帧在下一个 tick 发出
    ///
    /// 目标是否已经达成按最近一次 tick 解码出的状态判断。
    pub fn request(&mut self, request: CommandRequest) -> bool {
        self.scheduler.request(request, self.decoder.state())
    }

    /// 状态读取句柄（可克隆，可发送到其他线程）
    pub fn state(&self) -> StateHandle {
        self.decoder.handle()
    }

    /// 最近一次发布的状态
    pub fn snapshot(&self) -> Arc<VehicleState> {
        self.decoder.handle().snapshot()
    }

    pub fn scheduler(&self) -> &CommandScheduler {
        &self.scheduler
    }

    pub fn metrics(&self) -> &Arc<BusMetrics> {
        &self.metrics
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// 注册帧回调
    pub fn add_hook(&self, callback: Arc<dyn FrameCallback>) {
        if let Ok(mut hooks) = self.hooks.write() {
            hooks.add_callback(callback);
        } else {
            error!("hook registry lock poisoned, callback not added");
        }
    }

    /// 最近 `timeout` 内是否从缓冲区取出过任何帧（按本地单调时钟计算）
    pub fn is_bus_active(&self, timeout: Duration) -> bool {
        let last = self.decoder.last_activity_us();
        if last == 0 {
            return false;
        }
        monotonic_micros().saturating_sub(last) <= timeout.as_micros() as u64
    }

    /// 捕获线程是否仍在运行（外部驱动捕获时恒为 `true`）
    pub fn is_capture_alive(&self) -> bool {
        self.capture_thread
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(true)
    }

    /// 发送半边（测试和诊断用）
    pub fn tx(&self) -> &Tx {
        &self.tx
    }
}

impl<Tx: TxAdapter> Drop for VehicleBus<Tx> {
    fn drop(&mut self) {
        self.is_running.store(false, Ordering::Release);

        let join_timeout = Duration::from_secs(2);
        if let Some(handle) = self.capture_thread.take() {
            match handle.join_timeout(join_timeout) {
                Ok(()) => debug!("capture thread stopped"),
                Err(_) => error!(
                    "capture thread panicked or failed to shut down within {:?}",
                    join_timeout
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::VehicleBusBuilder;
    use crate::command::CommandKind;
    use carbus_can::{MockCanAdapter, SplittableAdapter};
    use carbus_protocol::RawFrame;

    #[test]
    fn test_satisfied_dome_light_request_schedules_nothing() {
        let bus_handle = MockCanAdapter::new();
        let (_rx, tx) = bus_handle.clone().split().unwrap();
        let (mut bus, mut capture) = VehicleBusBuilder::new().build(tx).unwrap();

        capture.capture(RawFrame::new_standard(0x286, &[0x00, 0x64]));
        bus.tick();

        assert!(bus.request(CommandRequest::DomeLight { on: true }));
        assert!(bus.scheduler().is_idle());

        let report = bus.tick();
        assert_eq!(report.completed, 0);
        assert_eq!(bus.metrics_snapshot().commands_completed, 0);
        assert!(bus_handle.sent_frames().is_empty());
    }

    #[test]
    fn test_tick_decodes_before_scheduling() {
        let bus_handle = MockCanAdapter::new();
        let (_rx, tx) = bus_handle.clone().split().unwrap();
        let (mut bus, mut capture) = VehicleBusBuilder::new().build(tx).unwrap();

        // 顶灯已亮（亮度 > 50）：开灯请求不发送任何帧
        capture.capture(RawFrame::new_standard(0x286, &[0x00, 0x64]));
        assert!(bus.request(CommandRequest::DomeLight { on: true }));

        let report = bus.tick();
        assert_eq!(report.drain.frames, 1);
        assert!(report.sent.is_empty());
        assert_eq!(report.completed, 1);
        assert!(!bus.scheduler().is_active(CommandKind::DomeLight));
        assert!(bus_handle.sent_frames().is_empty());
    }

    #[test]
    fn test_bus_activity() {
        let bus_handle = MockCanAdapter::new();
        let (_rx, tx) = bus_handle.split().unwrap();
        let (mut bus, mut capture) = VehicleBusBuilder::new().build(tx).unwrap();
        assert!(!bus.is_bus_active(Duration::from_secs(1)));

        capture.capture(RawFrame::new_standard(0x1A1, &[0, 0, 0x10, 0x27]));
        bus.tick();
        assert!(bus.is_bus_active(Duration::from_secs(1)));
        assert!(bus.is_capture_alive());
    }

    #[test]
    fn test_bus_activity_ignores_adapter_clock() {
        let bus_handle = MockCanAdapter::new();
        let (_rx, tx) = bus_handle.split().unwrap();
        let (mut bus, mut capture) = VehicleBusBuilder::new().build(tx).unwrap();

        // 帧时间戳来自适配器时钟，远小于本地单调时钟
        monotonic_micros();
        std::thread::sleep(Duration::from_millis(20));
        capture.capture(RawFrame::new_standard(0x1A1, &[0, 0, 0x10, 0x27]).with_timestamp(1));
        bus.tick();

        assert_eq!(bus.snapshot().last_frame_us(), 1);
        assert!(bus.is_bus_active(Duration::from_millis(10)));
    }
}
