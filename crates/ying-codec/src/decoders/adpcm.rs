//! SWF ADPCM 解码器.
//!
//! IMA ADPCM 的 SWF 变体: 每个送入的数据块以 2 位字段给出码字宽度 (2-5 位),
//! 随后是若干独立编码的分块. 每个分块先为每个声道给出 16 位初始采样和 6 位步长索引,
//! 再跟最多 4095 个码字. 预测值钳位到 i16, 步长索引钳位到 [0, 88].

use bytes::Bytes;
use log::{debug, warn};
use ying_core::{BitReader, BufferQueue, YingResult};

use crate::audio_format::AudioFormat;
use crate::canonical::expand_to_canonical;
use crate::codec_id::AudioCodec;
use crate::decoder::AudioDecoder;

/// IMA ADPCM 步长表
pub const STEP_TABLE: [i32; 89] = [
    7, 8, 9, 10, 11, 12, 13, 14, 16, 17, 19, 21, 23, 25, 28, 31, 34, 37, 41, 45, 50, 55, 60, 66,
    73, 80, 88, 97, 107, 118, 130, 143, 157, 173, 190, 209, 230, 253, 279, 307, 337, 371, 408,
    449, 494, 544, 598, 658, 724, 796, 876, 963, 1060, 1166, 1282, 1411, 1552, 1707, 1878, 2066,
    2272, 2499, 2749, 3024, 3327, 3660, 4026, 4428, 4871, 5358, 5894, 6484, 7132, 7845, 8630,
    9493, 10442, 11487, 12635, 13899, 15289, 16818, 18500, 20350, 22385, 24623, 27086, 29794,
    32767,
];

/// 各码字宽度的步长索引调整表, 以去掉符号位后的码字为下标
const INDEX_TABLE_2: [i32; 2] = [-1, 2];
const INDEX_TABLE_3: [i32; 4] = [-1, -1, 2, 4];
const INDEX_TABLE_4: [i32; 8] = [-1, -1, -1, -1, 2, 4, 6, 8];
const INDEX_TABLE_5: [i32; 16] = [-1, -1, -1, -1, -1, -1, -1, -1, 1, 2, 4, 6, 8, 10, 13, 16];

/// 每个分块的采样数 (含初始采样)
const SAMPLES_PER_CHUNK: usize = 4096;

fn index_table(nb_bits: u32) -> &'static [i32] {
    match nb_bits {
        2 => &INDEX_TABLE_2,
        3 => &INDEX_TABLE_3,
        4 => &INDEX_TABLE_4,
        _ => &INDEX_TABLE_5,
    }
}

/// 单个声道的解码状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdpcmChannel {
    /// 预测值
    pub predictor: i32,
    /// 步长索引
    pub step_index: i32,
}

impl AdpcmChannel {
    /// 展开一个码字, 返回新的预测值
    pub fn expand(&mut self, delta: u32, nb_bits: u32) -> i16 {
        let sign_mask = 1u32 << (nb_bits - 1);
        let mut step = STEP_TABLE[self.step_index as usize];
        // vpdiff = (delta + 0.5) * step / 4, 逐位累加以保持位精确
        let mut vpdiff = 0;
        let mut k = 1u32 << (nb_bits - 2);
        while k != 0 {
            if delta & k != 0 {
                vpdiff += step;
            }
            step >>= 1;
            k >>= 1;
        }
        vpdiff += step;

        if delta & sign_mask != 0 {
            self.predictor -= vpdiff;
        } else {
            self.predictor += vpdiff;
        }
        self.predictor = self.predictor.clamp(i32::from(i16::MIN), i32::from(i16::MAX));

        let table = index_table(nb_bits);
        self.step_index =
            (self.step_index + table[(delta & !sign_mask) as usize]).clamp(0, 88);
        self.predictor as i16
    }
}

/// 解码一整块 SWF ADPCM 数据为交错 s16 采样
///
/// 数据不足以构成一个完整分块头时停止, 尾部残余位被忽略.
pub fn decode_adpcm_block(data: &Bytes, channels: usize) -> YingResult<Vec<i16>> {
    let mut br = BitReader::new(data.clone());
    let nb_bits = br.read_bits(2)? + 2;
    let mut out = Vec::new();
    let mut state = [AdpcmChannel::default(); 2];

    while br.bits_left() >= 22 * channels {
        for ch in state.iter_mut().take(channels) {
            ch.predictor = br.read_bits_signed(16)?;
            ch.step_index = br.read_bits(6)? as i32;
            out.push(ch.predictor as i16);
        }
        let mut n = 1;
        while n < SAMPLES_PER_CHUNK && br.bits_left() >= channels * nb_bits as usize {
            for ch in state.iter_mut().take(channels) {
                let delta = br.read_bits(nb_bits)?;
                out.push(ch.expand(delta, nb_bits));
            }
            n += 1;
        }
    }
    if br.bits_left() >= 8 {
        debug!("ADPCM 块尾部剩余 {} 位未解码", br.bits_left());
    }
    Ok(out)
}

/// SWF ADPCM 解码器
pub struct AdpcmDecoder {
    format: AudioFormat,
    output: BufferQueue,
    error: bool,
}

impl AdpcmDecoder {
    pub fn new(format: AudioFormat) -> Self {
        Self {
            format,
            output: BufferQueue::new(),
            error: false,
        }
    }
}

impl AudioDecoder for AdpcmDecoder {
    fn codec(&self) -> AudioCodec {
        AudioCodec::Adpcm
    }

    fn name(&self) -> &str {
        "adpcm"
    }

    fn format(&self) -> AudioFormat {
        self.format
    }

    fn push(&mut self, data: Option<&Bytes>) -> YingResult<()> {
        let Some(data) = data else {
            return Ok(());
        };
        if data.is_empty() {
            return Ok(());
        }
        let channels = self.format.channels();
        match decode_adpcm_block(data, channels) {
            Ok(samples) => {
                if !samples.is_empty() {
                    self.output.push(expand_to_canonical(
                        &samples,
                        channels,
                        self.format.granularity(),
                    ));
                }
                Ok(())
            }
            Err(e) if e.is_need_more_data() => {
                warn!("ADPCM 数据块过短 ({} 字节), 已忽略", data.len());
                Ok(())
            }
            Err(e) => {
                self.error = true;
                Err(e)
            }
        }
    }

    fn pull(&mut self) -> Option<Bytes> {
        self.output.pull_chunk()
    }

    fn has_error(&self) -> bool {
        self.error
    }
}
