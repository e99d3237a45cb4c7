//! # ying-format
//!
//! Ying 容器解析库, 提供 SWF 与 FLV 两种容器的增量解析引擎.
//!
//! 两个引擎都以 `parse(bytes)` 为入口, 可以在任意字节边界被切断后继续:
//! 数据不足时返回 [`ParseStatus::NeedMoreData`], 调用方拿到更多数据后再次调用即可.
//! 结构性错误只报告一次, 之后引擎永久停止, 但已解析出的内容仍然可用.

pub mod flv;
pub mod swf;

pub use flv::{FlvDecoder, FlvEvent};
pub use swf::{SwfDecoder, SwfHeader};

/// 增量解析的正常结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStatus {
    /// 已缓冲的数据不足以完成下一步, 等待更多输入
    NeedMoreData,
    /// 到达流末尾
    Eof,
}
