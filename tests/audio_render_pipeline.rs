//! 端到端集成测试: 音频渲染图.
//!
//! 测试流程: SWF 中的 DefineSound + StartSound → EventSound 渲染 → 验证起止点、循环与包络
//! 以及: BlockQueue 喂入的流式声音、ADPCM 解码、混音器的饱和相加与移除

use bytes::Bytes;
use ying::audio::{AudioMixer, AudioSource, BlockQueue, EventSound, Remaining, StreamSound};
use ying::codec::{AudioCodec, AudioFormat, BackendKind, CodecConfig, CodecRegistry};
use ying::core::{BitReader, BitWriter};
use ying::format::SwfDecoder;
use ying::format::swf::sound::{SoundInfo, parse_start_sound};
use ying::format::swf::{SwfWriter, tags};

/// 确定性的伪随机数 (xorshift64)
struct Rng(u64);

impl Rng {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next() % n as u64) as usize
    }
}

fn registry() -> CodecRegistry {
    CodecRegistry::from_config(&CodecConfig::default())
}

fn stereo_pcm() -> (AudioCodec, AudioFormat) {
    (AudioCodec::UncompressedLe, AudioFormat::from_bits(0x0F))
}

/// 第 `i` 帧为 ((i+1)*1000, -(i+1)*1000)
fn ramp_bytes(frames: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(frames * 4);
    for i in 0..frames {
        let v = ((i + 1) * 1000) as i16;
        out.extend_from_slice(&v.to_le_bytes());
        out.extend_from_slice(&(-v).to_le_bytes());
    }
    out
}

fn constant_bytes(value: i16, frames: usize) -> Bytes {
    let mut out = Vec::with_capacity(frames * 4);
    for _ in 0..frames {
        out.extend_from_slice(&value.to_le_bytes());
        out.extend_from_slice(&value.to_le_bytes());
    }
    Bytes::from(out)
}

/// 影片: DefineSound 1 (8 帧斜坡), 第一帧 StartSound 1 (起点 2, 终点 6, 循环 2 次, 两点包络)
fn movie_with_start_sound() -> Vec<u8> {
    let mut define = vec![1, 0, 0x3F];
    define.extend_from_slice(&8u32.to_le_bytes());
    define.extend(ramp_bytes(8));

    let mut start = BitWriter::new();
    start.write_u16(1);
    // 无 stop / no_multiple, 有包络、循环、终点、起点
    start.write_u8(0x0F);
    start.write_u32(2);
    start.write_u32(6);
    start.write_u16(2);
    start.write_u8(2);
    for (position, left, right) in [(0u32, 32768u16, 32768u16), (4, 0, 32768)] {
        start.write_u32(position);
        start.write_u16(left);
        start.write_u16(right);
    }

    let mut w = SwfWriter::new(9);
    w.tag(tags::DEFINE_SOUND, &define)
        .tag(tags::START_SOUND, &start.finish())
        .show_frame()
        .end();
    w.finish().unwrap()
}

fn render_fresh<S: AudioSource>(sound: &mut S, frames: usize) -> Vec<i16> {
    let mut out = vec![0i16; frames * 2];
    sound.render(&mut out, 0, frames);
    out
}

#[test]
fn test_event_sound_from_start_sound() {
    let data = movie_with_start_sound();
    let mut decoder = SwfDecoder::new();
    decoder.parse(&data).unwrap();
    assert!(decoder.is_eof());
    let version = decoder.header().unwrap().version;

    let actions = decoder.main_sprite().frame_actions(0);
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].tag, tags::START_SOUND);
    let mut reader = BitReader::from_slice(&actions[0].data);
    let start = parse_start_sound(&mut reader, actions[0].tag, version).unwrap();
    assert_eq!(start.sound_id, Some(1));
    assert_eq!(start.info.in_point, Some(2));
    assert_eq!(start.info.out_point, Some(6));
    assert_eq!(start.info.loops, 2);
    assert_eq!(start.info.envelope.len(), 2);

    let sound = decoder.dictionary().sound(1).unwrap();
    let mut event = EventSound::new(sound, &start.info, &registry());
    assert_eq!(event.id(), 1);
    assert_eq!(event.total_frames(), 8);

    // 播放帧 2..6 两遍; 左声道在前 4 帧内从满音量降到 0, 右声道保持满音量
    let out = render_fresh(&mut event, 10);
    let left: Vec<i16> = out.iter().step_by(2).copied().collect();
    let right: Vec<i16> = out.iter().skip(1).step_by(2).copied().collect();
    assert_eq!(left, vec![3000, 3000, 2500, 1500, 0, 0, 0, 0, 0, 0]);
    assert_eq!(
        right,
        vec![-3000, -4000, -5000, -6000, -3000, -4000, -5000, -6000, 0, 0]
    );

    assert_eq!(event.iterate(3), Remaining::Exact(5));
    assert_eq!(event.position(), 3);
    assert_eq!(event.iterate(100), Remaining::Exact(0));
}

#[test]
fn test_event_sound_random_splits() {
    let data = movie_with_start_sound();
    let mut decoder = SwfDecoder::new();
    decoder.parse(&data).unwrap();
    let sound = decoder.dictionary().sound(1).unwrap();
    let info = SoundInfo {
        in_point: Some(1),
        loops: 3,
        ..SoundInfo::default()
    };
    let registry = registry();
    let total = EventSound::new(sound, &info, &registry).total_frames() as usize;
    assert_eq!(total, 21);
    let whole = render_fresh(&mut EventSound::new(sound, &info, &registry), total);

    let mut rng = Rng(0xE7E7_0001);
    for _ in 0..50 {
        let k = rng.below(total + 1);
        let mut event = EventSound::new(sound, &info, &registry);
        let mut out = vec![0i16; total * 2];
        event.render(&mut out[..k * 2], 0, k);
        event.render(&mut out[k * 2..], k, total - k);
        assert_eq!(out, whole, "render split {}", k);

        let mut out = vec![0i16; total * 2];
        event.render(&mut out[..k * 2], 0, k);
        assert_eq!(event.iterate(k), Remaining::Exact((total - k) as u64));
        event.render(&mut out[k * 2..], 0, total - k);
        assert_eq!(out, whole, "iterate split {}", k);
    }
}

#[test]
fn test_stream_sound_random_splits() {
    let (codec, format) = stereo_pcm();
    let registry = registry();
    let make = || {
        let queue = BlockQueue::new(codec, format);
        for block in 0..5 {
            let start = block * 3;
            let bytes = ramp_bytes(start + 3);
            queue.push(Bytes::from(bytes[start * 4..].to_vec()), 0);
        }
        queue.close();
        StreamSound::new(queue, &registry).unwrap()
    };

    let total = 15;
    let whole = render_fresh(&mut make(), total);
    let expected: Vec<u8> = ramp_bytes(total);
    let expected: Vec<i16> = expected
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect();
    assert_eq!(whole, expected);

    let mut rng = Rng(0x57EA_0002);
    for _ in 0..50 {
        let k = rng.below(total + 1);
        let mut sound = make();
        let mut out = vec![0i16; total * 2];
        // 同一区间渲染两次结果相同, 不改变播放位置
        let mut again = vec![0i16; k * 2];
        sound.render(&mut again, 0, k);
        sound.render(&mut out[..k * 2], 0, k);
        assert_eq!(&again[..], &out[..k * 2]);
        sound.render(&mut out[k * 2..], k, total - k);
        assert_eq!(out, whole, "render split {}", k);

        let mut sound = make();
        let mut out = vec![0i16; total * 2];
        sound.render(&mut out[..k * 2], 0, k);
        sound.iterate(k);
        sound.render(&mut out[k * 2..], 0, total - k);
        assert_eq!(out, whole, "iterate split {}", k);
    }
}

#[test]
fn test_stream_sound_owes_skip_until_data_arrives() {
    let (codec, format) = stereo_pcm();
    let queue = BlockQueue::new(codec, format);
    let registry = registry();
    let mut sound = StreamSound::new(queue.clone(), &registry).unwrap();

    queue.push(constant_bytes(100, 4), 0);
    // 只有 4 帧, 另外 2 帧要从之后到达的数据里扣除
    assert_eq!(sound.iterate(6), Remaining::Open);
    assert_eq!(sound.buffered(), 0);

    queue.push(Bytes::from(ramp_bytes(4)), 0);
    let mut out = vec![0i16; 8];
    assert_eq!(sound.render(&mut out, 0, 4), 2);
    assert_eq!(&out[..4], &[3000, -3000, 4000, -4000]);

    queue.close();
    assert_eq!(sound.render(&mut vec![0i16; 8], 0, 4), 2);
    assert!(sound.is_finished());
    assert_eq!(sound.iterate(2), Remaining::Exact(0));
}

#[test]
fn test_first_block_seek_is_dropped() {
    let (codec, format) = stereo_pcm();
    let queue = BlockQueue::new(codec, format);
    queue.push(Bytes::from(ramp_bytes(4)), 1);
    // 后续块的 seek 不生效
    queue.push(Bytes::from(ramp_bytes(2)), 1);
    queue.close();
    let mut sound = StreamSound::new(queue, &registry()).unwrap();
    let out = render_fresh(&mut sound, 8);
    assert_eq!(
        out,
        vec![2000, -2000, 3000, -3000, 4000, -4000, 1000, -1000, 2000, -2000, 0, 0, 0, 0, 0, 0]
    );
}

/// 单声道 4 位 ADPCM 块: 初始采样 `initial`, 之后 `codes` 个 0 码字 (预测值不变)
fn adpcm_block(initial: i16, codes: usize) -> Bytes {
    let mut w = BitWriter::new();
    w.write_bits(2, 2);
    w.write_bits_signed(i32::from(initial), 16);
    w.write_bits(0, 6);
    for _ in 0..codes {
        w.write_bits(0, 4);
    }
    Bytes::from(w.finish())
}

#[test]
fn test_adpcm_stream_through_registry() {
    let format = AudioFormat::from_bits(0x0E);
    let registry = registry();
    assert!(registry.prepare(AudioCodec::Adpcm, format).is_ready());

    let queue = BlockQueue::new(AudioCodec::Adpcm, format);
    queue.push(adpcm_block(1000, 10), 0);
    queue.push(adpcm_block(-500, 10), 0);
    queue.close();
    let mut sound = StreamSound::new(queue, &registry).unwrap();
    let out = render_fresh(&mut sound, 30);
    let expected: Vec<i16> = std::iter::repeat_n(1000, 22)
        .chain(std::iter::repeat_n(-500, 22))
        .chain(std::iter::repeat_n(0, 16))
        .collect();
    assert_eq!(out, expected);
    assert_eq!(sound.iterate(22), Remaining::Exact(0));
}

#[test]
fn test_missing_backend_stream_is_silent() {
    let builtin_only = CodecRegistry::from_config(&CodecConfig {
        backends: vec![BackendKind::Builtin],
    });
    let format = AudioFormat::from_bits(0x0F);
    assert!(!builtin_only.prepare(AudioCodec::Mp3, format).is_ready());

    let queue = BlockQueue::new(AudioCodec::Mp3, format);
    queue.push(Bytes::from_static(&[0xFF, 0xFB, 0x90, 0x00]), 0);
    let mut sound = StreamSound::new(queue, &builtin_only).unwrap();
    let mut out = vec![0i16; 16];
    assert_eq!(sound.render(&mut out, 0, 8), 0);
    assert!(out.iter().all(|&s| s == 0));
    assert_eq!(sound.iterate(8), Remaining::Exact(0));
}

#[test]
fn test_mixer_saturates_and_removes_finished_sources() {
    let (codec, format) = stereo_pcm();
    let registry = registry();
    let queue = BlockQueue::new(codec, format);
    queue.push(constant_bytes(10000, 6), 0);

    let mut mixer = AudioMixer::new();
    mixer.add(
        1,
        Box::new(EventSound::from_samples(
            1,
            vec![30000; 8],
            &SoundInfo::default(),
        )),
    );
    mixer.add(2, Box::new(StreamSound::new(queue.clone(), &registry).unwrap()));
    assert_eq!(mixer.len(), 2);

    let mut out = vec![-1i16; 8];
    assert_eq!(mixer.mix(&mut out, 4), 4);
    assert_eq!(out, vec![i16::MAX; 8]);
    // 事件声音已播放完, 流式声音还开着
    assert!(!mixer.contains(1));
    assert!(mixer.contains(2));
    assert_eq!(mixer.remaining(), Remaining::Open);

    let mut out = vec![0i16; 8];
    assert_eq!(mixer.mix(&mut out, 4), 2);
    assert_eq!(out, vec![10000, 10000, 10000, 10000, 0, 0, 0, 0]);
    assert_eq!(mixer.len(), 1);

    queue.close();
    assert_eq!(mixer.mix(&mut out, 4), 0);
    assert!(mixer.is_empty());
    assert_eq!(mixer.remaining(), Remaining::Exact(0));
}

#[test]
fn test_mixer_stop_by_id() {
    let mut mixer = AudioMixer::new();
    for id in [5, 5, 6] {
        mixer.add(
            id,
            Box::new(EventSound::from_samples(
                0,
                vec![1; 20],
                &SoundInfo::default(),
            )),
        );
    }
    assert_eq!(mixer.stop(5), 2);
    assert_eq!(mixer.stop(5), 0);
    assert_eq!(mixer.len(), 1);

    let mut out = vec![0i16; 4];
    assert_eq!(mixer.mix(&mut out, 2), 2);
    assert_eq!(out, vec![1, 1, 1, 1]);
    assert_eq!(mixer.remaining(), Remaining::Exact(8));
}
