//! # ying-audio
//!
//! Ying 音频渲染图: 把解码器组合成可以连续渲染的声音源.
//!
//! 所有声音源都输出 44.1kHz 立体声 s16 交错采样, 并实现 [`AudioSource`]:
//! - [`AudioSource::render`] 把一段采样混入目标缓冲区, 不改变播放位置,
//!   同一区间渲染多少次结果都相同
//! - [`AudioSource::iterate`] 是唯一推进播放位置的操作
//!
//! 声音源:
//! - [`EventSound`]: DefineSound 定义、StartSound 触发的事件声音, 处理起止点、循环和音量包络
//! - [`StreamSound`]: 按块到达的流式声音, 数据来自时间轴 ([`SpriteBlocks`])、
//!   FLV ([`FlvBlocks`]) 或外部喂入的 [`BlockQueue`]. 前两者与解析器共享
//!   `Rc<RefCell<..>>` 句柄, 加载过程中声音可以一直播放下去
//! - [`AudioMixer`]: 把多个声音源饱和相加, 并移除已播放完的源

pub mod event;
pub mod mixer;
pub mod stream;

pub use event::EventSound;
pub use mixer::AudioMixer;
pub use stream::{Block, BlockQueue, BlockSource, FlvBlocks, FlvSound, SpriteBlocks, StreamSound};

use ying_codec::AudioDecoder;
use ying_codec::canonical::canonical_samples;

/// `iterate` 之后剩余的播放长度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remaining {
    /// 剩余的确切采样帧数
    Exact(u64),
    /// 数据还在到达, 总长度未知
    Open,
}

impl Remaining {
    /// 声音是否已经播放完
    pub fn is_finished(self) -> bool {
        self == Remaining::Exact(0)
    }
}

/// 可连续渲染的声音源
///
/// 采样帧是 44.1kHz 下的一个立体声采样对, 目标缓冲区按 `[左, 右, 左, 右, ...]` 交错排列.
pub trait AudioSource {
    /// 把从当前播放位置起偏移 `offset` 帧、长 `n_frames` 帧的采样饱和地加到 `dest` 上
    ///
    /// 返回实际写入的帧数, 小于 `n_frames` 表示声音在这之前结束或数据尚未到达.
    /// 可以为了补足数据而继续解码, 但不会改变播放位置.
    fn render(&mut self, dest: &mut [i16], offset: usize, n_frames: usize) -> usize;

    /// 丢弃开头的 `n_frames` 帧, 返回剩余长度
    fn iterate(&mut self, n_frames: usize) -> Remaining;
}

impl<T: AudioSource + ?Sized> AudioSource for Box<T> {
    fn render(&mut self, dest: &mut [i16], offset: usize, n_frames: usize) -> usize {
        (**self).render(dest, offset, n_frames)
    }

    fn iterate(&mut self, n_frames: usize) -> Remaining {
        (**self).iterate(n_frames)
    }
}

/// 把 `samples` (交错立体声) 饱和地加到 `dest` 开头, 返回写入的帧数
pub fn mix_into(dest: &mut [i16], samples: &[i16]) -> usize {
    let len = dest.len().min(samples.len()) & !1;
    for (d, &s) in dest[..len].iter_mut().zip(&samples[..len]) {
        *d = d.saturating_add(s);
    }
    len / 2
}

/// 取出解码器中所有已解码的数据, 追加到 `out`
pub(crate) fn drain_decoder(decoder: &mut dyn AudioDecoder, out: &mut Vec<i16>) {
    while let Some(buf) = decoder.pull() {
        out.extend(canonical_samples(&buf));
    }
}
