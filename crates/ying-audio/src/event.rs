//! 事件声音.
//!
//! DefineSound 的数据在创建时一次性解码为规范采样, 之后渲染只做查表:
//! 先去掉 MP3 延迟并截到声明的采样数, 再按 SOUNDINFO 的起止点、循环次数和包络播放.

use log::{debug, warn};
use ying_codec::CodecRegistry;
use ying_format::swf::sound::{ENVELOPE_MAX, EnvelopePoint, Sound, SoundInfo};

use crate::{AudioSource, Remaining, drain_decoder};

/// 事件声音
pub struct EventSound {
    id: u16,
    /// 规范采样 (交错立体声)
    samples: Vec<i16>,
    /// 播放区间 [start, end), 单位为采样帧
    start: usize,
    end: usize,
    loops: u32,
    /// 包络位置从播放开始算起
    envelope: Vec<EnvelopePoint>,
    /// 已经被 iterate 丢弃的帧数
    position: u64,
}

impl EventSound {
    /// 解码声音并按 SOUNDINFO 设置播放参数
    ///
    /// 解码失败时记录告警, 得到的声音长度为 0.
    pub fn new(sound: &Sound, info: &SoundInfo, registry: &CodecRegistry) -> Self {
        let mut decoder = registry.create(sound.codec, sound.format);
        let mut samples = Vec::new();
        let result = decoder
            .push(Some(&sound.data))
            .and_then(|()| decoder.push(None));
        drain_decoder(decoder.as_mut(), &mut samples);
        if let Err(e) = result {
            warn!("事件声音 {} 解码失败: {}", sound.id, e);
        }

        let skip = usize::from(sound.skip) * sound.format.granularity() * 2;
        samples.drain(..skip.min(samples.len()));
        let expected = usize::try_from(sound.canonical_samples())
            .unwrap_or(usize::MAX)
            .saturating_mul(2);
        if samples.len() > expected {
            samples.truncate(expected);
        } else if samples.len() < expected {
            debug!(
                "事件声音 {} 解码出 {} 帧, 少于声明的 {} 帧",
                sound.id,
                samples.len() / 2,
                expected / 2
            );
        }
        Self::from_samples(sound.id, samples, info)
    }

    /// 直接由规范采样构造
    pub fn from_samples(id: u16, samples: Vec<i16>, info: &SoundInfo) -> Self {
        let frames = samples.len() / 2;
        let start = info.in_point.map_or(0, |p| p as usize).min(frames);
        let end = info
            .out_point
            .map_or(frames, |p| p as usize)
            .clamp(start, frames);
        Self {
            id,
            samples,
            start,
            end,
            loops: u32::from(info.loops.max(1)),
            envelope: info.envelope.clone(),
            position: 0,
        }
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    /// 包括所有循环在内的总帧数
    pub fn total_frames(&self) -> u64 {
        (self.end - self.start) as u64 * u64::from(self.loops)
    }

    /// 当前播放位置
    pub fn position(&self) -> u64 {
        self.position
    }

    /// 播放位置 `pos` 处的左右声道音量 (0-32768), 控制点之间线性插值
    fn volume_at(&self, pos: u64) -> (i64, i64) {
        let Some(first) = self.envelope.first() else {
            return (i64::from(ENVELOPE_MAX), i64::from(ENVELOPE_MAX));
        };
        let idx = self
            .envelope
            .partition_point(|p| u64::from(p.position) <= pos);
        if idx == 0 {
            return (i64::from(first.left), i64::from(first.right));
        }
        let a = &self.envelope[idx - 1];
        let Some(b) = self.envelope.get(idx) else {
            return (i64::from(a.left), i64::from(a.right));
        };
        let span = i64::from(b.position - a.position);
        let t = (pos - u64::from(a.position)) as i64;
        let lerp = |from: u16, to: u16| {
            let from = i64::from(from);
            from + (i64::from(to) - from) * t / span
        };
        (lerp(a.left, b.left), lerp(a.right, b.right))
    }
}

fn scale(sample: i16, volume: i64) -> i16 {
    ((i64::from(sample) * volume) >> 15).clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i16
}

impl AudioSource for EventSound {
    fn render(&mut self, dest: &mut [i16], offset: usize, n_frames: usize) -> usize {
        let total = self.total_frames();
        let first = self.position + offset as u64;
        if first >= total {
            return 0;
        }
        let count = (total - first).min(n_frames.min(dest.len() / 2) as u64) as usize;
        let len = (self.end - self.start) as u64;
        for i in 0..count {
            let pos = first + i as u64;
            let frame = self.start + (pos % len) as usize;
            let (left, right) = self.volume_at(pos);
            let l = scale(self.samples[2 * frame], left);
            let r = scale(self.samples[2 * frame + 1], right);
            dest[2 * i] = dest[2 * i].saturating_add(l);
            dest[2 * i + 1] = dest[2 * i + 1].saturating_add(r);
        }
        count
    }

    fn iterate(&mut self, n_frames: usize) -> Remaining {
        let total = self.total_frames();
        self.position = (self.position + n_frames as u64).min(total);
        Remaining::Exact(total - self.position)
    }
}
