//! 汇编器错误类型.

use thiserror::Error;
use ying_core::YingError;

use crate::instruction::Label;

/// 汇编与动作流解码错误
///
/// 生成阶段的任何错误都会放弃整个输出.
#[derive(Debug, Error)]
pub enum AsmError {
    /// 引用的标签从未定义
    #[error("{construct}: 标签 {label} 未定义")]
    UndefinedLabel { construct: &'static str, label: Label },

    /// 同一个标签被定义了两次
    #[error("标签 {label} 重复定义 (先在 {first}, 又在 {second})")]
    DuplicateLabel {
        label: Label,
        first: usize,
        second: usize,
    },

    /// 偏移超出字段宽度
    #[error("{construct}: 到标签 {label} 的偏移 {offset} 超出字段范围")]
    OffsetOutOfRange {
        construct: &'static str,
        label: Label,
        offset: i64,
    },

    /// 只允许向前引用的长度字段指向了前面的位置
    #[error("{construct}: 标签 {label} 位于引用位置之前 (偏移 {offset})")]
    BackwardReference {
        construct: &'static str,
        label: Label,
        offset: i64,
    },

    /// 动作数据超过 16 位长度字段
    #[error("{construct}: 动作数据 {len} 字节超过 65535")]
    ActionTooLong { construct: &'static str, len: usize },

    /// 指令参数不合法
    #[error("{construct}: {reason}")]
    InvalidInstruction {
        construct: &'static str,
        reason: String,
    },

    /// 动作流在 `offset` 处被截断
    #[error("动作流在偏移 {offset} 处被截断")]
    Truncated { offset: usize },

    /// 读取动作数据失败
    #[error(transparent)]
    Read(#[from] YingError),
}

pub type AsmResult<T> = Result<T, AsmError>;
