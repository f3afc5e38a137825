//! # Carbus Protocol
//!
//! 车辆 CAN 总线协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `ids`: CAN ID 常量定义
//! - `constants`: 协议常量定义（阈值、比例系数、按键码）
//! - `feedback`: 反馈帧解码规则（静态规则表）
//! - `control`: 控制帧构建（模拟物理按键）
//!
//! ## 字节序
//!
//! 与单一字节序的协议不同，车身总线上各 ID 的约定并不统一：
//! 大多数数值是 Intel（LSB 在前，小端），方向盘按键等少数字段是 Motorola（MSB 在前）。
//! 因此每个字段都显式指定字节序，本模块提供对应的工具函数。

pub mod constants;
pub mod control;
pub mod feedback;
pub mod ids;

// 重新导出常用类型
pub use constants::*;
pub use control::*;
pub use feedback::*;
pub use ids::*;

/// 标准帧（11-bit）ID 的最大值
pub const MAX_STANDARD_ID: u32 = 0x7FF;

/// CAN 2.0 单帧的统一抽象
///
/// # 设计目的
///
/// `RawFrame` 是协议层和传输层之间的中间抽象：
/// - **层次解耦**：协议层不依赖底层总线控制器（MCP2515 / SocketCAN / Mock）
/// - **统一接口**：上层通过 `CanAdapter` trait 使用统一的帧类型
/// - **捕获后不可变**：中断上下文只做拷贝，之后任何阶段都不修改帧内容
///
/// # 在架构中的位置
///
/// ```text
/// Transport (carbus-can)
///     ↓ 中断上下文拷贝
/// RawFrame (此类型) → 环形缓冲区
///     ↓ tick 上下文
/// Decoder → VehicleState
/// ```
///
/// # 设计特性
///
/// - **Copy trait**：环形缓冲区按值拷贝，没有堆分配
/// - **固定 8 字节**：未使用部分为 0
/// - **时间戳**：`timestamp_us` 由捕获阶段写入，0 表示不可用
///
/// # 示例
///
/// ```rust
/// use carbus_protocol::RawFrame;
///
/// let frame = RawFrame::new_standard(0x0AA, &[0, 0, 0xFF, 0, 0xA0, 0x07]);
/// assert_eq!(frame.id(), 0x0AA);
/// assert_eq!(frame.data_slice(), &[0, 0, 0xFF, 0, 0xA0, 0x07]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawFrame {
    /// CAN ID（标准帧）
    pub id: u32,

    /// 帧数据（固定 8 字节，未使用部分为 0）
    pub data: [u8; 8],

    /// 有效数据长度 (0-8)
    pub len: u8,

    /// 捕获时间戳（微秒，单调时钟），0 表示不可用
    pub timestamp_us: u64,
}

impl RawFrame {
    /// 创建标准帧
    ///
    /// 超过 8 字节的数据会被截断。需要校验的场景使用 [`RawFrame::try_new`]。
    pub fn new_standard(id: u16, data: &[u8]) -> Self {
        let mut fixed_data = [0u8; 8];
        let len = data.len().min(8);
        fixed_data[..len].copy_from_slice(&data[..len]);

        Self {
            id: id as u32,
            data: fixed_data,
            len: len as u8,
            timestamp_us: 0, // 默认无时间戳
        }
    }

    /// 创建并校验帧（ID 必须是 11-bit，数据不超过 8 字节）
    pub fn try_new(id: u32, data: &[u8]) -> Result<Self, ProtocolError> {
        if id > MAX_STANDARD_ID {
            return Err(ProtocolError::InvalidCanId { id });
        }
        if data.len() > 8 {
            return Err(ProtocolError::InvalidLength {
                expected: 8,
                actual: data.len(),
            });
        }
        Ok(Self::new_standard(id as u16, data))
    }

    /// 附带时间戳（捕获阶段使用）
    pub fn with_timestamp(mut self, timestamp_us: u64) -> Self {
        self.timestamp_us = timestamp_us;
        self
    }

    /// 获取数据切片（只包含有效数据）
    pub fn data_slice(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// 获取 CAN ID
    pub fn id(&self) -> u32 {
        self.id
    }

    /// 获取有效数据长度
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// 是否为空帧（DLC = 0）
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl std::fmt::Display for RawFrame {
    /// 与固件串口日志相同的格式：`RX: 0x0AA Data: 00 00 FF ...`
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RX: 0x{:03X} Data:", self.id)?;
        for byte in self.data_slice() {
            write!(f, " {:02X}", byte)?;
        }
        Ok(())
    }
}

use thiserror::Error;

/// 协议错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid frame length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid CAN ID: 0x{id:X}")]
    InvalidCanId { id: u32 },
}

// ============================================================================
// 字节序与位操作工具函数
// ============================================================================
//
// 所有函数都接收有效数据切片，越界时返回 None（由调用方跳过该字段）。

/// 小端（Intel）u16：`data[lo]` 为低字节，`data[lo + 1]` 为高字节
pub fn u16_le(data: &[u8], lo: usize) -> Option<u16> {
    Some(u16::from_le_bytes([*data.get(lo)?, *data.get(lo + 1)?]))
}

/// 大端（Motorola）u16：`data[hi]` 为高字节
pub fn u16_be(data: &[u8], hi: usize) -> Option<u16> {
    Some(u16::from_be_bytes([*data.get(hi)?, *data.get(hi + 1)?]))
}

/// 小端 24-bit 无符号整数
pub fn u24_le(data: &[u8], lo: usize) -> Option<u32> {
    Some(u32::from_le_bytes([
        *data.get(lo)?,
        *data.get(lo + 1)?,
        *data.get(lo + 2)?,
        0,
    ]))
}

/// 半字节提取：`index = 0` 为低 4 位，`index = 1` 为高 4 位
pub fn nibble(byte: u8, index: u8) -> u8 {
    if index == 0 { byte & 0x0F } else { (byte >> 4) & 0x0F }
}

/// 位提取
pub fn bit(byte: u8, pos: u8) -> bool {
    byte & (1 << pos) != 0
}

/// 二进制补码重解释：原始值超过 `threshold` 时视为负数
///
/// `threshold` 为该字段声明的最大正值（16 位字段为 32767）。
pub fn twos_complement_16(raw: u16, threshold: u16) -> i32 {
    if raw > threshold {
        raw as i32 - 0x1_0000
    } else {
        raw as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_standard_truncates() {
        let frame = RawFrame::new_standard(0x123, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(frame.len(), 8);
        assert_eq!(frame.data, [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_try_new_rejects_extended_id() {
        let err = RawFrame::try_new(0x800, &[1]).unwrap_err();
        assert_eq!(err, ProtocolError::InvalidCanId { id: 0x800 });
    }

    #[test]
    fn test_try_new_rejects_long_payload() {
        let err = RawFrame::try_new(0x100, &[0; 9]).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::InvalidLength {
                expected: 8,
                actual: 9
            }
        );
    }

    #[test]
    fn test_display_matches_serial_log_format() {
        let frame = RawFrame::new_standard(0x0A9, &[0x5E, 0x47, 0xB3]);
        assert_eq!(frame.to_string(), "RX: 0x0A9 Data: 5E 47 B3");
    }

    #[test]
    fn test_u16_le_and_be() {
        let data = [0xA0, 0x07, 0x12];
        assert_eq!(u16_le(&data, 0), Some(0x07A0));
        assert_eq!(u16_be(&data, 0), Some(0xA007));
        assert_eq!(u16_le(&data, 2), None);
    }

    #[test]
    fn test_u24_le() {
        let data = [0x01, 0x02, 0x03];
        assert_eq!(u24_le(&data, 0), Some(0x030201));
        assert_eq!(u24_le(&data[..2], 0), None);
    }

    #[test]
    fn test_nibble_and_bit() {
        assert_eq!(nibble(0x6A, 0), 0x0A);
        assert_eq!(nibble(0x6A, 1), 0x06);
        assert!(bit(0b0000_0100, 2));
        assert!(!bit(0b0000_0100, 1));
    }

    #[test]
    fn test_twos_complement_16() {
        assert_eq!(twos_complement_16(0, 32767), 0);
        assert_eq!(twos_complement_16(32767, 32767), 32767);
        assert_eq!(twos_complement_16(32768, 32767), -32768);
        assert_eq!(twos_complement_16(0xFFFF, 32767), -1);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_raw_frame_serde() {
        let frame = RawFrame::new_standard(0x304, &[0xC7]).with_timestamp(5);
        let json = serde_json::to_string(&frame).unwrap();
        let back: RawFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(back, frame);
    }
}
