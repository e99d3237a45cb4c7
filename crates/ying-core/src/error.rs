//! 统一错误类型定义.
//!
//! 所有 Ying crate 共用的错误类型, 支持跨模块传播.

use thiserror::Error;

/// Ying 统一错误类型
#[derive(Debug, Error)]
pub enum YingError {
    /// 数据不足, 需要更多输入
    ///
    /// 不是真正的错误: 流式解析器遇到它时应停下来等待下一批数据.
    #[error("数据不足, 需要更多输入")]
    NeedMoreData,

    /// 结构损坏 (错误的签名、非法长度、解压失败等)
    #[error("结构损坏: {0}")]
    Malformed(String),

    /// 解码器已因先前的结构错误永久停止
    #[error("解码器已停止")]
    Halted,

    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 不支持的操作
    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// 编解码器错误
    #[error("编解码器错误: {0}")]
    Codec(String),

    /// 未找到指定的编解码器
    #[error("未找到编解码器: {0}")]
    CodecNotFound(String),

    /// zlib 解压失败
    #[error("解压失败: {0}")]
    Inflate(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 内部错误 (不应发生)
    #[error("内部错误: {0}")]
    Internal(String),
}

impl YingError {
    /// 是否为 "数据不足" (流式解析的正常停顿)
    pub fn is_need_more_data(&self) -> bool {
        matches!(self, Self::NeedMoreData)
    }
}

/// Ying 统一 Result 类型
pub type YingResult<T> = Result<T, YingError>;
