//! 命令定义和实现

pub mod decode;
pub mod replay;

pub use decode::DecodeCommand;
pub use replay::ReplayCommand;
