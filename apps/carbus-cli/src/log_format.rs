//! 串口日志格式
//!
//! 固件的原始帧输出格式：`RX: 0x0A9 Data: 5E 47 B3 9F 2B B3 3F FB`
//! （ID 和数据不区分大小写，数据可以为空）。

use anyhow::{Context, Result, bail};
use carbus_protocol::RawFrame;

/// 解析一行日志
///
/// 不是接收帧的行（状态行、发送帧、空行）返回 `Ok(None)`。
pub fn parse_line(line: &str) -> Result<Option<RawFrame>> {
    let Some(rest) = line.trim().strip_prefix("RX:") else {
        return Ok(None);
    };

    let (id_part, data_part) = rest
        .split_once("Data:")
        .with_context(|| format!("missing 'Data:' in line: {}", line.trim()))?;

    let id = parse_id(id_part.trim())?;
    let data: String = data_part.split_whitespace().collect();
    let bytes =
        hex::decode(&data).with_context(|| format!("invalid payload: {}", data_part.trim()))?;

    Ok(Some(RawFrame::try_new(id, &bytes)?))
}

/// 解析 `ID:HEX` 形式的单帧（例如 `0AA:0000FF00A007` 或 `0x1A1:00001027`）
pub fn parse_frame_spec(spec: &str) -> Result<RawFrame> {
    let (id_part, data_part) = spec
        .split_once(':')
        .with_context(|| format!("expected ID:HEX, got '{}'", spec))?;

    let id = parse_id(id_part.trim())?;
    let data: String = data_part.split_whitespace().collect();
    let bytes = hex::decode(&data).with_context(|| format!("invalid payload: {}", data_part))?;

    Ok(RawFrame::try_new(id, &bytes)?)
}

fn parse_id(text: &str) -> Result<u32> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    if digits.is_empty() {
        bail!("missing frame id");
    }
    u32::from_str_radix(digits, 16).with_context(|| format!("invalid frame id: {}", text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rx_line() {
        let frame = parse_line("RX: 0x0a9 Data: 5e 47 b3 9f 2b b3 3f fb").unwrap().unwrap();
        assert_eq!(frame.id, 0x0A9);
        assert_eq!(frame.data_slice(), &[0x5E, 0x47, 0xB3, 0x9F, 0x2B, 0xB3, 0x3F, 0xFB]);
    }

    #[test]
    fn test_parse_empty_payload() {
        let frame = parse_line("RX: 0x7FF Data:").unwrap().unwrap();
        assert!(frame.is_empty());
    }

    #[test]
    fn test_non_rx_lines_are_skipped() {
        assert!(parse_line("").unwrap().is_none());
        assert!(parse_line("TX: 0x24B Data: 01 F8").unwrap().is_none());
        assert!(parse_line("Engine RUNNING, Battery: 14.10V").unwrap().is_none());
    }

    #[test]
    fn test_malformed_lines_are_errors() {
        assert!(parse_line("RX: 0x0AA 00 00").is_err());
        assert!(parse_line("RX: 0xZZZ Data: 00").is_err());
        assert!(parse_line("RX: 0x0AA Data: 0").is_err());
        // 超过 8 字节
        assert!(parse_line("RX: 0x0AA Data: 00 00 00 00 00 00 00 00 00").is_err());
        // 超出 11-bit
        assert!(parse_line("RX: 0x800 Data: 00").is_err());
    }

    #[test]
    fn test_parse_frame_spec() {
        let frame = parse_frame_spec("0AA:0000FF00A007").unwrap();
        assert_eq!(frame.id, 0x0AA);
        assert_eq!(frame.len(), 6);

        let frame = parse_frame_spec("0x1A1:00001027").unwrap();
        assert_eq!(frame.id, 0x1A1);

        assert!(parse_frame_spec("0AA").is_err());
    }
}
