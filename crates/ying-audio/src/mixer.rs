//! 混音器: 把所有活动声音源饱和相加.

use log::debug;

use crate::{AudioSource, Remaining};

/// 混音器
///
/// 每个源由调用方给定的 ID 标识, 用于 StartSound 的停止与 "不重复播放" 语义.
#[derive(Default)]
pub struct AudioMixer<'a> {
    sources: Vec<(u32, Box<dyn AudioSource + 'a>)>,
}

impl<'a> AudioMixer<'a> {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// 加入一个声音源
    pub fn add(&mut self, id: u32, source: Box<dyn AudioSource + 'a>) {
        debug!("混音器加入声音源 {}", id);
        self.sources.push((id, source));
    }

    /// 移除 ID 相同的所有源, 返回移除的个数
    pub fn stop(&mut self, id: u32) -> usize {
        let before = self.sources.len();
        self.sources.retain(|(sid, _)| *sid != id);
        before - self.sources.len()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.sources.iter().any(|(sid, _)| *sid == id)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// 把所有源从当前位置起的 `n_frames` 帧混入 `dest`, 返回最长的写入帧数
    ///
    /// `dest` 中原有的内容会保留, 调用方需要自行清零.
    pub fn render(&mut self, dest: &mut [i16], n_frames: usize) -> usize {
        self.sources
            .iter_mut()
            .map(|(_, source)| source.render(&mut *dest, 0, n_frames))
            .max()
            .unwrap_or(0)
    }

    /// 推进所有源, 移除已经播放完的源
    pub fn iterate(&mut self, n_frames: usize) {
        self.sources.retain_mut(|(id, source)| {
            let remaining = source.iterate(n_frames);
            if remaining.is_finished() {
                debug!("声音源 {} 播放完毕", id);
                false
            } else {
                true
            }
        });
    }

    /// 渲染并推进 `n_frames` 帧, 覆盖 `dest` 原有内容
    pub fn mix(&mut self, dest: &mut [i16], n_frames: usize) -> usize {
        let n_frames = n_frames.min(dest.len() / 2);
        dest[..n_frames * 2].fill(0);
        let written = self.render(&mut dest[..n_frames * 2], n_frames);
        self.iterate(n_frames);
        written
    }

    /// 所有源中最长的剩余长度, 有开放的源时为 [`Remaining::Open`]
    pub fn remaining(&mut self) -> Remaining {
        let mut longest = 0;
        for (_, source) in &mut self.sources {
            match source.iterate(0) {
                Remaining::Open => return Remaining::Open,
                Remaining::Exact(n) => longest = longest.max(n),
            }
        }
        Remaining::Exact(longest)
    }
}
