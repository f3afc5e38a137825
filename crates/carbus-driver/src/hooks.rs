//! 钩子系统
//!
//! 在帧被解码（接收）或被成功发送时触发自定义回调。
//!
//! 回调只在 tick 上下文中触发，从不在捕获（中断）上下文中执行。
//! 即便如此，回调也不应阻塞：tick 上下文承担解码和命令调度，阻塞会推迟按键释放帧。
//! 需要做 I/O 的回调应该像 [`AsyncRecordingHook`](crate::recording::AsyncRecordingHook)
//! 一样把帧 `try_send` 到通道里，在其他线程处理。
//!
//! # 使用示例
//!
//! ```rust
//! use carbus_driver::hooks::{FrameCallback, HookManager};
//! use carbus_driver::recording::AsyncRecordingHook;
//! use carbus_protocol::RawFrame;
//! use std::sync::Arc;
//!
//! let mut hooks = HookManager::new();
//! let (hook, rx) = AsyncRecordingHook::new();
//! hooks.add_callback(Arc::new(hook) as Arc<dyn FrameCallback>);
//!
//! hooks.trigger_all(&RawFrame::new_standard(0x1A1, &[0, 0, 0x10, 0x27]));
//! assert_eq!(rx.len(), 1);
//! ```

use carbus_protocol::RawFrame;
use std::sync::Arc;

/// 帧回调
pub trait FrameCallback: Send + Sync {
    /// 解码器处理一帧之前调用（包括未知 ID 的帧）
    fn on_frame_received(&self, frame: &RawFrame);

    /// 调度器成功发送一帧之后调用
    ///
    /// 只在 `send()` 成功后触发，发送失败的帧不会出现在这里。默认不处理。
    fn on_frame_sent(&self, frame: &RawFrame) {
        let _ = frame;
    }
}

/// 钩子管理器
///
/// 回调列表本身不做同步，`VehicleBus` 把它放在 `RwLock` 里，
/// 由解码器和调度器共享读锁。
#[derive(Default)]
pub struct HookManager {
    callbacks: Vec<Arc<dyn FrameCallback>>,
}

impl HookManager {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            callbacks: Vec::new(),
        }
    }

    pub fn add_callback(&mut self, callback: Arc<dyn FrameCallback>) {
        self.callbacks.push(callback);
    }

    pub fn clear(&mut self) {
        self.callbacks.clear();
    }

    /// 触发所有接收回调（解码器中调用）
    pub fn trigger_all(&self, frame: &RawFrame) {
        for callback in self.callbacks.iter() {
            callback.on_frame_received(frame);
        }
    }

    /// 触发所有发送回调（调度器发送成功后调用）
    pub fn trigger_all_sent(&self, frame: &RawFrame) {
        for callback in self.callbacks.iter() {
            callback.on_frame_sent(frame);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl std::fmt::Debug for HookManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookManager")
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}
