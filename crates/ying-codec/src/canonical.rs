//! 规范输出格式转换.
//!
//! 所有解码器输出 44.1kHz、立体声、s16 小端交错数据.
//! 低采样率按整数倍重复上采样, 单声道复制到左右两个声道.

use bytes::Bytes;
use log::warn;

use crate::audio_format::{CANONICAL_FRAME_BYTES, CANONICAL_RATE};

/// 把交错 s16 采样扩展为规范格式
///
/// - `channels`: 源声道数 (1 或 2)
/// - `granularity`: 每个源采样重复的次数
pub fn expand_to_canonical(samples: &[i16], channels: usize, granularity: usize) -> Bytes {
    let frames = samples.len() / channels.max(1);
    let mut out = Vec::with_capacity(frames * granularity * CANONICAL_FRAME_BYTES);
    for frame in samples.chunks_exact(channels.max(1)) {
        let left = frame[0];
        let right = if channels >= 2 { frame[1] } else { frame[0] };
        for _ in 0..granularity {
            out.extend_from_slice(&left.to_le_bytes());
            out.extend_from_slice(&right.to_le_bytes());
        }
    }
    Bytes::from(out)
}

/// 任意采样率的交错 s16 采样转为规范格式
///
/// 44100 能被源采样率整除时按整数倍重复; 否则按最近采样映射并告警.
pub fn resample_to_canonical(samples: &[i16], channels: usize, rate: u32) -> Bytes {
    if rate == 0 || channels == 0 {
        return Bytes::new();
    }
    if CANONICAL_RATE % rate == 0 {
        return expand_to_canonical(samples, channels, (CANONICAL_RATE / rate) as usize);
    }
    warn!("采样率 {}Hz 不是 44100Hz 的整数约数, 使用最近采样映射", rate);
    let in_frames = samples.len() / channels;
    let out_frames = (in_frames as u64 * u64::from(CANONICAL_RATE) / u64::from(rate)) as usize;
    let mut out = Vec::with_capacity(out_frames * CANONICAL_FRAME_BYTES);
    for i in 0..out_frames {
        let src = ((i as u64 * u64::from(rate)) / u64::from(CANONICAL_RATE)) as usize;
        let src = src.min(in_frames.saturating_sub(1));
        let left = samples[src * channels];
        let right = if channels >= 2 {
            samples[src * channels + 1]
        } else {
            left
        };
        out.extend_from_slice(&left.to_le_bytes());
        out.extend_from_slice(&right.to_le_bytes());
    }
    Bytes::from(out)
}

/// 把规范格式字节解释为交错 s16 采样
pub fn canonical_samples(data: &[u8]) -> Vec<i16> {
    data.chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_upsample() {
        let out = expand_to_canonical(&[1, -2], 1, 2);
        assert_eq!(canonical_samples(&out), vec![1, 1, 1, 1, -2, -2, -2, -2]);
        assert_eq!(out.len() % CANONICAL_FRAME_BYTES, 0);
    }

    #[test]
    fn test_stereo_passthrough() {
        let out = expand_to_canonical(&[5, 6, 7, 8], 2, 1);
        assert_eq!(canonical_samples(&out), vec![5, 6, 7, 8]);
    }

    #[test]
    fn test_resample_non_divisor_rate() {
        // 48000Hz 的 480 帧约等于 441 帧
        let input: Vec<i16> = (0..480).collect();
        let out = resample_to_canonical(&input, 1, 48000);
        let samples = canonical_samples(&out);
        assert_eq!(samples.len(), 441 * 2);
        assert_eq!(samples[0], 0);
        assert!(samples.windows(2).all(|w| w[0] <= w[1]));
        let out = resample_to_canonical(&[3, 4], 2, 11025);
        assert_eq!(canonical_samples(&out), vec![3, 4, 3, 4, 3, 4, 3, 4]);
    }
}
