//! 内存 Mock 适配器
//!
//! 接收队列和已发送帧保存在共享状态中：克隆出的句柄、拆分出的收发半边
//! 看到的是同一条"总线"，测试可以在适配器被移交后继续注入帧、检查发送结果。

use crate::{CanAdapter, CanDeviceError, CanDeviceErrorKind, CanError, RawFrame};
use crate::{RxAdapter, SplittableAdapter, TxAdapter};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

#[derive(Debug, Default)]
struct MockBus {
    rx_queue: VecDeque<RawFrame>,
    sent_frames: Vec<RawFrame>,
    /// 剩余需要失败的发送次数
    failing_sends: usize,
    /// 设备已断开：接收返回致命错误
    disconnected: bool,
}

/// Mock 总线适配器
#[derive(Debug, Clone, Default)]
pub struct MockCanAdapter {
    bus: Arc<Mutex<MockBus>>,
    receive_timeout: Duration,
}

impl MockCanAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注入一帧（车辆 → 本设备）
    pub fn queue_frame(&self, frame: RawFrame) {
        self.bus.lock().rx_queue.push_back(frame);
    }

    pub fn queue_frames(&self, frames: impl IntoIterator<Item = RawFrame>) {
        self.bus.lock().rx_queue.extend(frames);
    }

    /// 尚未被接收的帧数
    pub fn pending_rx(&self) -> usize {
        self.bus.lock().rx_queue.len()
    }

    /// 已发送帧（本设备 → 车辆）的拷贝
    pub fn sent_frames(&self) -> Vec<RawFrame> {
        self.bus.lock().sent_frames.clone()
    }

    pub fn take_sent_frames(&self) -> Vec<RawFrame> {
        std::mem::take(&mut self.bus.lock().sent_frames)
    }

    /// 接下来的 `count` 次发送返回错误
    pub fn fail_next_sends(&self, count: usize) {
        self.bus.lock().failing_sends = count;
    }

    /// 模拟设备断开
    pub fn set_disconnected(&self, disconnected: bool) {
        self.bus.lock().disconnected = disconnected;
    }

    fn send_frame(bus: &Mutex<MockBus>, frame: RawFrame) -> Result<(), CanError> {
        let mut bus = bus.lock();
        if bus.failing_sends > 0 {
            bus.failing_sends -= 1;
            return Err(CanError::Device(CanDeviceError::new(
                CanDeviceErrorKind::Backend,
                "injected send failure",
            )));
        }
        trace!("mock tx: {}", frame);
        bus.sent_frames.push(frame);
        Ok(())
    }

    fn poll_frame(bus: &Mutex<MockBus>) -> Result<Option<RawFrame>, CanError> {
        let mut bus = bus.lock();
        if bus.disconnected {
            return Err(CanError::Device(CanDeviceError::new(
                CanDeviceErrorKind::NoDevice,
                "mock device disconnected",
            )));
        }
        Ok(bus.rx_queue.pop_front())
    }

    /// 阻塞接收：队列为空时等待 `timeout` 后返回 `Timeout`
    fn receive_frame(bus: &Mutex<MockBus>, timeout: Duration) -> Result<RawFrame, CanError> {
        if let Some(frame) = Self::poll_frame(bus)? {
            return Ok(frame);
        }
        if !timeout.is_zero() {
            std::thread::sleep(timeout);
            if let Some(frame) = Self::poll_frame(bus)? {
                return Ok(frame);
            }
        }
        Err(CanError::Timeout)
    }
}

impl CanAdapter for MockCanAdapter {
    fn send(&mut self, frame: RawFrame) -> Result<(), CanError> {
        Self::send_frame(&self.bus, frame)
    }

    fn receive(&mut self) -> Result<RawFrame, CanError> {
        Self::receive_frame(&self.bus, self.receive_timeout)
    }

    fn set_receive_timeout(&mut self, timeout: Duration) {
        self.receive_timeout = timeout;
    }

    fn try_receive(&mut self) -> Result<Option<RawFrame>, CanError> {
        Self::poll_frame(&self.bus)
    }
}

impl SplittableAdapter for MockCanAdapter {
    type RxAdapter = MockRxAdapter;
    type TxAdapter = MockTxAdapter;

    fn split(self) -> Result<(MockRxAdapter, MockTxAdapter), CanError> {
        Ok((
            MockRxAdapter {
                bus: Arc::clone(&self.bus),
                receive_timeout: self.receive_timeout,
            },
            MockTxAdapter { bus: self.bus },
        ))
    }
}

/// Mock 接收半边
#[derive(Debug)]
pub struct MockRxAdapter {
    bus: Arc<Mutex<MockBus>>,
    receive_timeout: Duration,
}

impl RxAdapter for MockRxAdapter {
    fn receive(&mut self) -> Result<RawFrame, CanError> {
        MockCanAdapter::receive_frame(&self.bus, self.receive_timeout)
    }

    fn try_receive(&mut self) -> Result<Option<RawFrame>, CanError> {
        MockCanAdapter::poll_frame(&self.bus)
    }
}

/// Mock 发送半边
#[derive(Debug)]
pub struct MockTxAdapter {
    bus: Arc<Mutex<MockBus>>,
}

impl TxAdapter for MockTxAdapter {
    fn send(&mut self, frame: RawFrame) -> Result<(), CanError> {
        MockCanAdapter::send_frame(&self.bus, frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_halves_share_bus() {
        let handle = MockCanAdapter::new();
        let (mut rx, mut tx) = handle.clone().split().unwrap();

        handle.queue_frame(RawFrame::new_standard(0x1A1, &[0, 0, 0x10, 0x27]));
        assert_eq!(rx.try_receive().unwrap().map(|f| f.id), Some(0x1A1));
        assert!(rx.try_receive().unwrap().is_none());

        tx.send(RawFrame::new_standard(0x1E3, &[0xF1, 0xFF])).unwrap();
        assert_eq!(handle.sent_frames().len(), 1);
        assert_eq!(handle.take_sent_frames()[0].id, 0x1E3);
        assert!(handle.sent_frames().is_empty());
    }

    #[test]
    fn test_injected_send_failures() {
        let mut adapter = MockCanAdapter::new();
        adapter.fail_next_sends(1);

        let frame = RawFrame::new_standard(0x24B, &[0x01, 0xF8]);
        assert!(adapter.send(frame).is_err());
        assert!(adapter.send(frame).is_ok());
        assert_eq!(adapter.sent_frames(), vec![frame]);
    }

    #[test]
    fn test_receive_timeout_when_empty() {
        let mut adapter = MockCanAdapter::new();
        let result = adapter.receive_timeout(Duration::from_millis(1));
        assert!(matches!(result, Err(CanError::Timeout)));
    }

    #[test]
    fn test_disconnected_is_fatal() {
        let handle = MockCanAdapter::new();
        let (mut rx, _tx) = handle.clone().split().unwrap();
        handle.set_disconnected(true);

        let err = rx.receive().unwrap_err();
        assert!(err.is_fatal());
    }
}
