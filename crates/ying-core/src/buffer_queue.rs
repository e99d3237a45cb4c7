//! 字节缓冲队列.
//!
//! 多个 [`Bytes`] 块首尾相接组成的逻辑字节流. 音频解码器用它排队已解码的输出块,
//! 既可以整块取出, 也可以按任意字节数读取.

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};

/// 字节缓冲队列
#[derive(Debug, Default, Clone)]
pub struct BufferQueue {
    chunks: VecDeque<Bytes>,
    /// 队列中的总字节数
    size: usize,
    /// 自创建以来已移出队列的字节数
    offset: u64,
}

impl BufferQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 队列中的总字节数
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// 已移出队列的累计字节数
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// 追加一个块, 空块被忽略
    pub fn push(&mut self, chunk: Bytes) {
        if chunk.is_empty() {
            return;
        }
        self.size += chunk.len();
        self.chunks.push_back(chunk);
    }

    /// 取出队首的整个块
    pub fn pull_chunk(&mut self) -> Option<Bytes> {
        let chunk = self.chunks.pop_front()?;
        self.size -= chunk.len();
        self.offset += chunk.len() as u64;
        Some(chunk)
    }

    /// 复制前 `len` 字节但不移除; 数据不足返回 None
    pub fn peek(&self, len: usize) -> Option<Bytes> {
        if len > self.size {
            return None;
        }
        if let Some(front) = self.chunks.front() {
            if front.len() >= len {
                return Some(front.slice(..len));
            }
        }
        let mut out = BytesMut::with_capacity(len);
        for chunk in &self.chunks {
            let need = len - out.len();
            if need == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..need.min(chunk.len())]);
        }
        Some(out.freeze())
    }

    /// 取出前 `len` 字节; 数据不足返回 None 且队列不变
    pub fn pull(&mut self, len: usize) -> Option<Bytes> {
        let out = self.peek(len)?;
        self.flush(len);
        Some(out)
    }

    /// 丢弃前 `len` 字节 (超过总长时清空), 返回实际丢弃的字节数
    pub fn flush(&mut self, len: usize) -> usize {
        let mut remaining = len.min(self.size);
        let flushed = remaining;
        while remaining > 0 {
            let Some(front) = self.chunks.front_mut() else {
                break;
            };
            if front.len() <= remaining {
                remaining -= front.len();
                self.chunks.pop_front();
            } else {
                let _ = front.split_to(remaining);
                remaining = 0;
            }
        }
        self.size -= flushed;
        self.offset += flushed as u64;
        flushed
    }

    /// 从队列内 `offset` 处开始复制数据到 `dest`, 返回复制的字节数
    pub fn copy_to(&self, offset: usize, dest: &mut [u8]) -> usize {
        let mut skip = offset;
        let mut written = 0;
        for chunk in &self.chunks {
            if written == dest.len() {
                break;
            }
            if skip >= chunk.len() {
                skip -= chunk.len();
                continue;
            }
            let src = &chunk[skip..];
            skip = 0;
            let n = src.len().min(dest.len() - written);
            dest[written..written + n].copy_from_slice(&src[..n]);
            written += n;
        }
        written
    }

    pub fn clear(&mut self) {
        self.offset += self.size as u64;
        self.chunks.clear();
        self.size = 0;
    }
}
