//! # Carbus CAN Adapter Layer
//!
//! 总线传输抽象层。实际的总线控制器驱动（MCP2515、SocketCAN 等）在本仓库之外实现，
//! 只需要提供阻塞的单帧发送、单帧接收和"有帧可读"通知。

use std::time::Duration;
use thiserror::Error;

// 重新导出 carbus-protocol 中的 RawFrame
pub use carbus_protocol::RawFrame;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockCanAdapter, MockRxAdapter, MockTxAdapter};

/// CAN 适配层统一错误类型
#[derive(Error, Debug)]
pub enum CanError {
    #[error("Device Error: {0}")]
    Device(#[from] CanDeviceError),
    #[error("Read timeout")]
    Timeout,
    #[error("Bus off")]
    BusOff,
    #[error("Device not started")]
    NotStarted,
}

impl CanError {
    /// 不可恢复的错误（接收线程应退出）
    pub fn is_fatal(&self) -> bool {
        match self {
            CanError::Device(e) => e.is_fatal(),
            CanError::BusOff | CanError::NotStarted => true,
            _ => false,
        }
    }
}

/// 设备/后端错误的结构化分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanDeviceErrorKind {
    Unknown,
    NoDevice,
    Busy,
    InvalidFrame,
    Backend,
}

/// 结构化设备错误
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct CanDeviceError {
    pub kind: CanDeviceErrorKind,
    pub message: String,
}

impl CanDeviceError {
    pub fn new(kind: CanDeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self.kind, CanDeviceErrorKind::NoDevice)
    }
}

impl From<String> for CanDeviceError {
    fn from(message: String) -> Self {
        Self::new(CanDeviceErrorKind::Unknown, message)
    }
}

impl From<&str> for CanDeviceError {
    fn from(message: &str) -> Self {
        Self::new(CanDeviceErrorKind::Unknown, message)
    }
}

/// 完整的（未拆分）总线适配器
pub trait CanAdapter {
    /// 阻塞发送单帧
    fn send(&mut self, frame: RawFrame) -> Result<(), CanError>;
    /// 接收单帧（超时返回 `CanError::Timeout`）
    fn receive(&mut self) -> Result<RawFrame, CanError>;
    fn set_receive_timeout(&mut self, _timeout: Duration) {}
    fn receive_timeout(&mut self, timeout: Duration) -> Result<RawFrame, CanError> {
        self.set_receive_timeout(timeout);
        self.receive()
    }
    /// 非阻塞接收：没有帧时返回 `Ok(None)`
    fn try_receive(&mut self) -> Result<Option<RawFrame>, CanError> {
        match self.receive_timeout(Duration::ZERO) {
            Ok(frame) => Ok(Some(frame)),
            Err(CanError::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }
    fn send_timeout(&mut self, frame: RawFrame, _timeout: Duration) -> Result<(), CanError> {
        self.send(frame)
    }
}

/// 接收半边（捕获上下文独占）
pub trait RxAdapter {
    /// 阻塞接收单帧，超时时间由适配器在拆分时确定
    fn receive(&mut self) -> Result<RawFrame, CanError>;

    /// 非阻塞接收（"有帧可读"通知中调用）：没有帧时立即返回 `Ok(None)`
    ///
    /// 实现必须立即返回，不能等待接收超时。
    fn try_receive(&mut self) -> Result<Option<RawFrame>, CanError>;
}

/// 发送半边（tick 上下文独占）
pub trait TxAdapter {
    fn send(&mut self, frame: RawFrame) -> Result<(), CanError>;
}

/// 可拆分为独立收发半边的适配器
pub trait SplittableAdapter: CanAdapter {
    type RxAdapter: RxAdapter;
    type TxAdapter: TxAdapter;
    fn split(self) -> Result<(Self::RxAdapter, Self::TxAdapter), CanError>;
}

impl<T: TxAdapter + ?Sized> TxAdapter for Box<T> {
    fn send(&mut self, frame: RawFrame) -> Result<(), CanError> {
        (**self).send(frame)
    }
}
