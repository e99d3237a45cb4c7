//! 音频解码器 trait 定义.
//!
//! 所有音频解码器 (内置或外部后端) 都实现 [`AudioDecoder`].

use bytes::Bytes;
use ying_core::YingResult;

use crate::audio_format::AudioFormat;
use crate::codec_id::AudioCodec;

/// 音频解码器 trait
///
/// 解码流程:
/// 1. 调用 `push(Some(data))` 送入一块压缩数据, 不阻塞
/// 2. 循环调用 `pull()` 直到返回 `None`
/// 3. 数据结束时调用 `push(None)` 刷新, 再次循环 `pull()`
///
/// `pull()` 返回的每个缓冲区都是 44.1kHz 立体声 s16 小端交错数据,
/// 长度是 4 字节的整数倍.
pub trait AudioDecoder: Send {
    /// 编解码器
    fn codec(&self) -> AudioCodec;

    /// 解码器名称
    fn name(&self) -> &str;

    /// 源格式
    fn format(&self) -> AudioFormat;

    /// 送入一块压缩数据, `None` 表示流结束
    fn push(&mut self, data: Option<&Bytes>) -> YingResult<()>;

    /// 取出一块已解码的规范格式数据
    fn pull(&mut self) -> Option<Bytes>;

    /// 解码器是否处于错误状态 (之后不会再产生数据)
    fn has_error(&self) -> bool {
        false
    }
}
