//! Builder 模式实现
//!
//! 提供链式构造 [`VehicleBus`] 的方式。两种捕获方式：
//!
//! - [`VehicleBusBuilder::build`]：只接管发送半边，返回 [`FrameCapture`]，
//!   由宿主在自己的"有帧可读"通知里调用（真正的中断上下文）。
//! - [`VehicleBusBuilder::build_split`]：拆分适配器，为接收半边启动捕获线程。

use crate::bus::VehicleBus;
use crate::capture::{FrameCapture, capture_loop};
use crate::config::DriverConfig;
use crate::error::DriverError;
use crate::hooks::{FrameCallback, HookManager};
use crate::metrics::BusMetrics;
use crate::pipeline::Decoder;
use crate::ring::FrameRing;
use crate::scheduler::CommandScheduler;
use carbus_can::{SplittableAdapter, TxAdapter};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, RwLock};
use tracing::info;

/// VehicleBus Builder（链式构造）
///
/// # Example
///
/// ```
/// use carbus_can::{MockCanAdapter, SplittableAdapter};
/// use carbus_driver::{CommandRequest, DriverConfig, VehicleBusBuilder};
///
/// let (_rx, tx) = MockCanAdapter::new().split().unwrap();
/// let (mut bus, mut capture) = VehicleBusBuilder::new()
///     .config(DriverConfig::default())
///     .build(tx)
///     .unwrap();
///
/// capture.capture(carbus_protocol::RawFrame::new_standard(0x304, &[0xC7]));
/// bus.request(CommandRequest::Chime);
/// let report = bus.tick();
/// assert_eq!(report.drain.frames, 1);
/// assert_eq!(report.sent.len(), 1);
/// ```
#[derive(Default)]
pub struct VehicleBusBuilder {
    config: DriverConfig,
    hooks: Vec<Arc<dyn FrameCallback>>,
}

impl VehicleBusBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置完整配置
    pub fn config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }

    /// 设置环形缓冲区容量（覆盖配置中的值）
    pub fn ring_capacity(mut self, capacity: usize) -> Self {
        self.config.capture.ring_capacity = capacity;
        self
    }

    /// 预先注册帧回调
    pub fn hook(mut self, callback: Arc<dyn FrameCallback>) -> Self {
        self.hooks.push(callback);
        self
    }

    /// 构建总线，捕获由调用方驱动
    ///
    /// # Errors
    /// - `DriverError::InvalidConfig`: 配置校验失败
    pub fn build<Tx: TxAdapter>(
        self,
        tx: Tx,
    ) -> Result<(VehicleBus<Tx>, FrameCapture), DriverError> {
        self.config.validate()?;

        let (producer, consumer) = FrameRing::split(self.config.capture.ring_capacity);
        let metrics = Arc::new(BusMetrics::new());

        let mut hook_manager = HookManager::new();
        for callback in self.hooks {
            hook_manager.add_callback(callback);
        }
        let hooks = Arc::new(RwLock::new(hook_manager));

        let decoder = Decoder::new(consumer, metrics.clone(), hooks.clone());
        let scheduler = CommandScheduler::new(
            self.config.scheduler.clone(),
            metrics.clone(),
            hooks.clone(),
        );
        let capture = FrameCapture::new(producer, metrics.clone());

        info!(
            "vehicle bus ready (ring capacity {})",
            self.config.capture.ring_capacity
        );
        let bus = VehicleBus::new(decoder, scheduler, tx, metrics, hooks, self.config);
        Ok((bus, capture))
    }

    /// 拆分适配器并启动捕获线程
    ///
    /// # Errors
    /// - `DriverError::InvalidConfig`: 配置校验失败
    /// - `DriverError::Can`: 拆分适配器失败
    /// - `DriverError::CaptureThread`: 捕获线程启动失败
    pub fn build_split<C>(self, mut can: C) -> Result<VehicleBus<C::TxAdapter>, DriverError>
    where
        C: SplittableAdapter,
        C::RxAdapter: Send + 'static,
    {
        self.config.validate()?;

        can.set_receive_timeout(self.config.capture.receive_timeout());
        let (rx_adapter, tx_adapter) = can.split()?;

        let (mut bus, capture) = self.build(tx_adapter)?;

        let is_running = Arc::new(AtomicBool::new(true));
        let is_running_clone = is_running.clone();
        let handle = std::thread::Builder::new()
            .name("carbus-capture".into())
            .spawn(move || capture_loop(rx_adapter, capture, is_running_clone))
            .map_err(|e| DriverError::CaptureThread(e.to_string()))?;

        bus.attach_capture_thread(handle, is_running);
        Ok(bus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carbus_can::{MockCanAdapter, SplittableAdapter};

    #[test]
    fn test_build_rejects_zero_capacity() {
        let (_rx, tx) = MockCanAdapter::new().split().unwrap();
        let result = VehicleBusBuilder::new().ring_capacity(0).build(tx);
        assert!(matches!(result, Err(DriverError::InvalidConfig(_))));
    }

    #[test]
    fn test_build_uses_configured_capacity() {
        let (_rx, tx) = MockCanAdapter::new().split().unwrap();
        let (bus, capture) = VehicleBusBuilder::new().ring_capacity(8).build(tx).unwrap();
        assert_eq!(capture.capacity(), 8);
        assert_eq!(bus.config().capture.ring_capacity, 8);
    }
}
