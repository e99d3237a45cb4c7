//! 流式声音.
//!
//! 编码数据按块陆续到达 (时间轴上每帧一个 SoundStreamBlock, 或 FLV 的音频 Tag),
//! [`StreamSound`] 按需取块解码, 把规范采样放进播放队列.
//! 数据源通过 [`BlockSource`] 抽象, 数据尚未到达时声音保持开放状态.

use std::cell::RefCell;
use std::rc::Rc;

use bytes::Bytes;
use log::{debug, trace, warn};
use ying_codec::{AudioCodec, AudioDecoder, AudioFormat, CodecRegistry};
use ying_format::flv::FlvState;
use ying_format::swf::{DecoderState, Sprite};
use ying_format::{FlvDecoder, SwfDecoder};

use crate::{AudioSource, Remaining, drain_decoder, mix_into};

/// 队列前部累计丢弃多少采样后整理一次
const COMPACT_THRESHOLD: usize = 8192;

/// 数据源中的一块
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// 编码数据; `seek` 是从这一块开始播放时需要丢弃的源采样数
    Data { data: Bytes, seek: usize },
    /// 流已结束
    End,
    /// 数据尚未到达
    Pending,
}

/// 按序号取块的数据源
pub trait BlockSource {
    /// 流的编码与格式, 第一块尚未到达时为 `None`
    fn format(&self) -> Option<(AudioCodec, AudioFormat)>;

    /// 第 `index` 块 (从播放起点算起)
    fn block(&self, index: usize) -> Block;
}

impl<T: BlockSource + ?Sized> BlockSource for &T {
    fn format(&self) -> Option<(AudioCodec, AudioFormat)> {
        (**self).format()
    }

    fn block(&self, index: usize) -> Block {
        (**self).block(index)
    }
}

/// 时间轴上的流式声音: 从 `start` 帧开始, 每帧一个 SoundStreamBlock
///
/// 与解析器共享同一个 [`SwfDecoder`], 声音存活期间仍可继续调用 `parse`.
/// 遇到没有声音块的帧或时间轴末尾时流结束; 主时间轴的帧还没解析到时返回
/// [`Block::Pending`]. 字典中的精灵在定义时已经完整, 不会再等待数据.
#[derive(Clone)]
pub struct SpriteBlocks {
    swf: Rc<RefCell<SwfDecoder>>,
    /// `None` 为主时间轴
    sprite: Option<u16>,
    start: usize,
}

impl SpriteBlocks {
    /// 主时间轴上的流式声音
    pub fn main(swf: Rc<RefCell<SwfDecoder>>, start: usize) -> Self {
        Self {
            swf,
            sprite: None,
            start,
        }
    }

    /// 字典中精灵 `id` 的流式声音
    pub fn sprite(swf: Rc<RefCell<SwfDecoder>>, id: u16, start: usize) -> Self {
        Self {
            swf,
            sprite: Some(id),
            start,
        }
    }

    fn with_sprite<R>(&self, f: impl FnOnce(Option<&Sprite>, bool) -> R) -> R {
        let swf = self.swf.borrow();
        let loading = !matches!(swf.state(), DecoderState::Eof | DecoderState::Error);
        match self.sprite {
            None => f(Some(swf.main_sprite()), loading),
            Some(id) => f(swf.dictionary().sprite(id), false),
        }
    }
}

impl BlockSource for SpriteBlocks {
    fn format(&self) -> Option<(AudioCodec, AudioFormat)> {
        self.with_sprite(|sprite, _| {
            let head = sprite?.frames.get(self.start)?.sound_head.as_ref()?;
            Some((head.codec, head.format))
        })
    }

    fn block(&self, index: usize) -> Block {
        let frame = self.start + index;
        self.with_sprite(|sprite, loading| {
            let Some(sprite) = sprite else {
                return Block::End;
            };
            if frame >= sprite.frame_count() {
                return Block::End;
            }
            if frame >= sprite.parse_frame {
                return if loading { Block::Pending } else { Block::End };
            }
            match &sprite.frames[frame].sound_block {
                Some(block) => Block::Data {
                    data: block.data.clone(),
                    seek: usize::try_from(block.seek).unwrap_or(0),
                },
                None => Block::End,
            }
        })
    }
}

/// FLV 中的音频 Tag 序列
///
/// 与解析器共享同一个 [`FlvDecoder`], 新到达的 Tag 会被后续的 `block` 看到.
/// 编码或格式中途改变时流在该 Tag 之前结束.
#[derive(Clone)]
pub struct FlvBlocks {
    flv: Rc<RefCell<FlvDecoder>>,
    start: usize,
}

impl FlvBlocks {
    /// 从第 `start` 个音频 Tag 开始
    pub fn new(flv: Rc<RefCell<FlvDecoder>>, start: usize) -> Self {
        Self { flv, start }
    }

    /// 从时间戳 ≤ `timestamp` 的最后一个音频 Tag 开始
    pub fn at_time(flv: Rc<RefCell<FlvDecoder>>, timestamp: u32) -> Self {
        let start = flv
            .borrow()
            .get_audio(timestamp)
            .map_or(0, |lookup| lookup.index);
        Self { flv, start }
    }
}

impl BlockSource for FlvBlocks {
    fn format(&self) -> Option<(AudioCodec, AudioFormat)> {
        let flv = self.flv.borrow();
        let tag = flv.audio_tags().get(self.start)?;
        Some((tag.codec, tag.format))
    }

    fn block(&self, index: usize) -> Block {
        let flv = self.flv.borrow();
        let Some(tag) = flv.audio_tags().get(self.start + index) else {
            return match flv.state() {
                FlvState::Eof | FlvState::Error => Block::End,
                _ => Block::Pending,
            };
        };
        if let Some(first) = flv.audio_tags().get(self.start) {
            if tag.codec != first.codec || tag.format != first.format {
                warn!(
                    "FLV 音频在 {}ms 处从 {} {} 变为 {} {}, 声音结束",
                    tag.timestamp, first.codec, first.format, tag.codec, tag.format
                );
                return Block::End;
            }
        }
        Block::Data {
            data: tag.data.clone(),
            seek: 0,
        }
    }
}

#[derive(Debug, Default)]
struct QueueState {
    blocks: Vec<(Bytes, usize)>,
    closed: bool,
}

/// 由调用方逐块喂入的数据源
///
/// 克隆得到的句柄共享同一个队列: 一份交给 [`StreamSound`], 另一份留给喂数据的一方.
#[derive(Debug, Clone)]
pub struct BlockQueue {
    codec: AudioCodec,
    format: AudioFormat,
    state: Rc<RefCell<QueueState>>,
}

impl BlockQueue {
    pub fn new(codec: AudioCodec, format: AudioFormat) -> Self {
        Self {
            codec,
            format,
            state: Rc::default(),
        }
    }

    /// 追加一块数据
    pub fn push(&self, data: Bytes, seek: usize) {
        let mut state = self.state.borrow_mut();
        if state.closed {
            warn!("声音队列已关闭, 丢弃 {} 字节", data.len());
            return;
        }
        state.blocks.push((data, seek));
    }

    /// 标记不会再有数据
    pub fn close(&self) {
        self.state.borrow_mut().closed = true;
    }

    pub fn len(&self) -> usize {
        self.state.borrow().blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlockSource for BlockQueue {
    fn format(&self) -> Option<(AudioCodec, AudioFormat)> {
        Some((self.codec, self.format))
    }

    fn block(&self, index: usize) -> Block {
        let state = self.state.borrow();
        match state.blocks.get(index) {
            Some((data, seek)) => Block::Data {
                data: data.clone(),
                seek: *seek,
            },
            None if state.closed => Block::End,
            None => Block::Pending,
        }
    }
}

/// 流式声音
pub struct StreamSound<S> {
    source: S,
    decoder: Box<dyn AudioDecoder>,
    granularity: usize,
    /// 下一个要取的块
    next_block: usize,
    /// 已解码的规范采样, `head` 之前的部分已经播放
    queue: Vec<i16>,
    head: usize,
    /// 后续解码数据开头还需要丢弃的帧数
    skip: u64,
    /// 数据源已结束且解码器已刷新
    finished: bool,
}

/// FLV 音频 Tag 驱动的声音
pub type FlvSound = StreamSound<FlvBlocks>;

impl<S: BlockSource> StreamSound<S> {
    /// 创建流式声音, 数据源还不知道格式时返回 `None`
    pub fn new(source: S, registry: &CodecRegistry) -> Option<Self> {
        let (codec, format) = source.format()?;
        debug!("创建流式声音: {} {}", codec, format);
        Some(Self {
            decoder: registry.create(codec, format),
            source,
            granularity: format.granularity(),
            next_block: 0,
            queue: Vec::new(),
            head: 0,
            skip: 0,
            finished: false,
        })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// 已解码但尚未播放的帧数
    pub fn buffered(&self) -> usize {
        (self.queue.len() - self.head) / 2
    }

    /// 数据源已经结束, 剩余长度确定
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// 继续取块解码, 直到缓冲至少 `frames` 帧、数据源结束或数据尚未到达
    fn fill(&mut self, frames: usize) {
        while !self.finished && self.buffered() < frames {
            match self.source.block(self.next_block) {
                Block::Data { data, seek } => {
                    if self.next_block == 0 {
                        self.skip += (seek * self.granularity) as u64;
                    }
                    self.next_block += 1;
                    trace!("流式声音解码第 {} 块 ({} 字节)", self.next_block, data.len());
                    if let Err(e) = self.decoder.push(Some(&data)) {
                        warn!("流式声音解码失败: {}", e);
                        self.finished = true;
                    }
                    self.collect();
                }
                Block::End => {
                    if let Err(e) = self.decoder.push(None) {
                        debug!("流式声音刷新解码器失败: {}", e);
                    }
                    self.collect();
                    self.finished = true;
                }
                Block::Pending => break,
            }
        }
    }

    /// 把解码器输出移入队列, 先抵扣待丢弃的帧
    fn collect(&mut self) {
        let mut decoded = Vec::new();
        drain_decoder(self.decoder.as_mut(), &mut decoded);
        let frames = decoded.len() / 2;
        let dropped = usize::try_from(self.skip).unwrap_or(usize::MAX).min(frames);
        self.skip -= dropped as u64;
        self.queue.extend_from_slice(&decoded[dropped * 2..frames * 2]);
    }

    fn remaining(&self) -> Remaining {
        if self.finished {
            Remaining::Exact(self.buffered() as u64)
        } else {
            Remaining::Open
        }
    }
}

impl<S: BlockSource> AudioSource for StreamSound<S> {
    fn render(&mut self, dest: &mut [i16], offset: usize, n_frames: usize) -> usize {
        let n_frames = n_frames.min(dest.len() / 2);
        self.fill(offset + n_frames);
        let available = self.buffered();
        if offset >= available {
            return 0;
        }
        let count = n_frames.min(available - offset);
        let begin = self.head + offset * 2;
        mix_into(dest, &self.queue[begin..begin + count * 2])
    }

    fn iterate(&mut self, n_frames: usize) -> Remaining {
        self.fill(n_frames);
        let dropped = n_frames.min(self.buffered());
        self.head += dropped * 2;
        if dropped < n_frames && !self.finished {
            // 数据还没到, 到达后再补上丢弃
            self.skip += (n_frames - dropped) as u64;
        }
        if self.head >= COMPACT_THRESHOLD && self.head * 2 >= self.queue.len() {
            self.queue.drain(..self.head);
            self.head = 0;
        }
        self.remaining()
    }
}
