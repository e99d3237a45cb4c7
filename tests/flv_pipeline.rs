//! 端到端集成测试: FLV 增量解析与 FLV 声音.
//!
//! 测试流程: FlvWriter 生成文件 → 随机切块送入 FlvDecoder → 验证 Tag 序列与按时间查找
//! 以及: 解析出的音频 Tag → FlvSound 渲染 → 验证采样

use std::cell::RefCell;
use std::rc::Rc;

use ying::audio::{AudioSource, FlvBlocks, FlvSound, Remaining, StreamSound};
use ying::codec::{AudioCodec, AudioFormat, CodecConfig, CodecRegistry, VideoCodec};
use ying::core::YingError;
use ying::format::flv::{FRAME_INTER, FRAME_KEY, FlvEvent, FlvState, FlvWriter, TAG_SCRIPT};
use ying::format::{FlvDecoder, ParseStatus};

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

fn pcm() -> (AudioCodec, AudioFormat) {
    (AudioCodec::UncompressedLe, AudioFormat::from_bits(0x0F))
}

fn registry() -> CodecRegistry {
    CodecRegistry::from_config(&CodecConfig::default())
}

/// 第 `tag` 个音频 Tag 的第 `i` 帧为 (tag*100+i, -(tag*100+i))
fn pcm_tag(tag: usize, frames: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(frames * 4);
    for i in 0..frames {
        let v = (tag * 100 + i) as i16;
        out.extend_from_slice(&v.to_le_bytes());
        out.extend_from_slice(&(-v).to_le_bytes());
    }
    out
}

/// 每 10ms 一个音频 Tag (4 帧), 每 33ms 一个视频 Tag, 每 5 个视频 Tag 一个关键帧
fn build_flv(audio_tags: usize) -> Vec<u8> {
    let (codec, format) = pcm();
    let mut w = FlvWriter::new(true, true);
    w.metadata_duration(2.5);
    let end = audio_tags as u32 * 10;
    let mut video_ts = 0;
    let mut video_index = 0;
    for i in 0..audio_tags {
        let ts = i as u32 * 10;
        while video_ts <= ts && video_ts < end {
            let frame_type = if video_index % 5 == 0 { FRAME_KEY } else { FRAME_INTER };
            w.video(video_ts, frame_type, VideoCodec::Vp6, &[0x00, video_index as u8]);
            video_ts += 33;
            video_index += 1;
        }
        w.audio(ts, codec, format, &pcm_tag(i, 4));
    }
    w.finish()
}

fn decode_in_chunks(data: &[u8], rng: &mut Rng) -> FlvDecoder {
    let mut dec = FlvDecoder::new();
    let mut pos = 0;
    while pos < data.len() {
        let n = 1 + rng.below(40);
        let end = (pos + n).min(data.len());
        assert_eq!(dec.parse(&data[pos..end]).unwrap(), ParseStatus::NeedMoreData);
        pos = end;
    }
    assert_eq!(dec.finish().unwrap(), ParseStatus::Eof);
    dec
}

#[test]
fn test_random_chunks_match_single_push() {
    let data = build_flv(30);
    let mut reference = FlvDecoder::new();
    reference.parse(&data).unwrap();
    reference.finish().unwrap();
    let reference_events = reference.take_events();

    let mut rng = Rng(0x5EED_F1F0);
    for _ in 0..32 {
        let mut dec = decode_in_chunks(&data, &mut rng);
        assert_eq!(dec.header(), reference.header());
        assert_eq!(dec.audio_tags(), reference.audio_tags());
        assert_eq!(dec.video_tags(), reference.video_tags());
        assert_eq!(dec.data_tags(), reference.data_tags());
        assert_eq!(dec.duration(), reference.duration());
        assert_eq!(dec.bytes_parsed(), data.len() as u64);
        assert_eq!(dec.take_events(), reference_events);
    }
}

#[test]
fn test_header_and_events() {
    let mut dec = FlvDecoder::new();
    dec.parse(&build_flv(3)).unwrap();
    let header = dec.header().unwrap();
    assert_eq!(header.version, 1);
    assert!(header.has_audio);
    assert!(header.has_video);
    assert_eq!(header.header_len, 9);
    assert_eq!(dec.duration(), Some(2.5));

    let (codec, format) = pcm();
    // 视频 Tag 先于同一时间戳的音频 Tag 写入
    assert_eq!(
        dec.take_events(),
        vec![
            FlvEvent::VideoCodec {
                codec: VideoCodec::Vp6
            },
            FlvEvent::AudioCodec { codec, format },
        ]
    );
}

#[test]
fn test_audio_lookup_matches_linear_scan() {
    let (codec, format) = pcm();
    let mut rng = Rng(0xA0D1_0000_0001);
    let mut w = FlvWriter::new(true, false);
    let mut timestamps = Vec::new();
    let mut ts = 100u32;
    for i in 0..50 {
        // 允许相同的时间戳
        ts += rng.below(3) as u32 * 7;
        timestamps.push(ts);
        w.audio(ts, codec, format, &pcm_tag(i, 1));
    }
    let mut dec = FlvDecoder::new();
    dec.parse(&w.finish()).unwrap();
    dec.finish().unwrap();
    assert_eq!(dec.audio_tags().len(), timestamps.len());

    let last = *timestamps.last().unwrap();
    let mut queries: Vec<u32> = (0..200).map(|_| rng.below(last as usize + 50) as u32).collect();
    queries.extend([0, 99, 100, last, last + 1, u32::MAX]);
    for q in queries {
        let expected = timestamps.iter().rposition(|&t| t <= q).unwrap_or(0);
        let lookup = dec.get_audio(q).unwrap();
        assert_eq!(lookup.index, expected, "query {}", q);
        assert_eq!(lookup.tag.timestamp, timestamps[expected]);
        assert_eq!(lookup.next_timestamp, timestamps.get(expected + 1).copied());
    }
    assert!(FlvDecoder::new().get_audio(0).is_none());
}

#[test]
fn test_video_lookup_rewinds_to_keyframe() {
    let mut dec = FlvDecoder::new();
    dec.parse(&build_flv(30)).unwrap();
    let video = dec.video_tags().to_vec();
    assert!(video[0].is_keyframe());

    for q in [0u32, 40, 99, 165, 200, 290, 10_000] {
        let plain = dec.get_video(q, false).unwrap();
        let expected = video.iter().rposition(|t| t.timestamp <= q).unwrap_or(0);
        assert_eq!(plain.index, expected);

        let key = dec.get_video(q, true).unwrap();
        assert!(key.tag.is_keyframe());
        assert!(key.index <= plain.index);
        assert!(video[key.index + 1..=plain.index].iter().all(|t| !t.is_keyframe()));
    }
}

#[test]
fn test_extended_timestamp() {
    let (codec, format) = pcm();
    let ts = 0x0123_4567;
    let mut w = FlvWriter::new(true, false);
    w.audio(ts, codec, format, &pcm_tag(0, 1));
    let mut dec = FlvDecoder::new();
    dec.parse(&w.finish()).unwrap();
    assert_eq!(dec.audio_tags()[0].timestamp, ts);
    // 没有 onMetaData 时用最后一个 Tag 的时间戳作为时长
    assert_eq!(dec.duration(), Some(f64::from(ts) / 1000.0));
}

#[test]
fn test_unknown_tag_type_skipped() {
    let (codec, format) = pcm();
    let mut w = FlvWriter::new(true, false);
    w.tag(15, 0, &[1, 2, 3])
        .audio(5, codec, format, &pcm_tag(0, 1))
        .tag(TAG_SCRIPT, 6, &[0x02, 0x00, 0x00]);
    let mut dec = FlvDecoder::new();
    dec.parse(&w.finish()).unwrap();
    assert_eq!(dec.audio_tags().len(), 1);
    assert_eq!(dec.data_tags().len(), 1);
    assert_eq!(dec.duration(), Some(0.005));
}

#[test]
fn test_out_of_order_tags_are_sorted() {
    let (codec, format) = pcm();
    let mut w = FlvWriter::new(true, false);
    w.audio(0, codec, format, &pcm_tag(0, 1))
        .audio(30, codec, format, &pcm_tag(1, 1))
        .audio(20, codec, format, &pcm_tag(2, 1));
    let mut dec = FlvDecoder::new();
    dec.parse(&w.finish()).unwrap();
    let order: Vec<u32> = dec.audio_tags().iter().map(|t| t.timestamp).collect();
    assert_eq!(order, vec![0, 20, 30]);
}

#[test]
fn test_truncated_file_drops_partial_tag() {
    let data = build_flv(10);
    let mut dec = FlvDecoder::new();
    // 截掉最后一个 Tag 的 PreviousTagSize 和一个数据字节
    dec.parse(&data[..data.len() - 5]).unwrap();
    assert_eq!(dec.audio_tags().len(), 9);
    assert_eq!(dec.finish().unwrap(), ParseStatus::Eof);
    assert!(dec.is_eof());
    assert_eq!(dec.audio_tags().len(), 9);
    // 结束之后的数据被忽略
    assert_eq!(dec.parse(&[0; 16]).unwrap(), ParseStatus::Eof);
}

#[test]
fn test_bad_signature_halts() {
    let mut data = build_flv(2);
    data[2] = b'X';
    let mut dec = FlvDecoder::new();
    assert!(matches!(dec.parse(&data), Err(YingError::Malformed(_))));
    assert_eq!(dec.state(), FlvState::Error);
    assert!(matches!(dec.parse(&data), Err(YingError::Halted)));
    assert!(matches!(dec.finish(), Err(YingError::Halted)));
    assert!(dec.header().is_none());
}

#[test]
fn test_short_header_length_rejected() {
    let mut data = build_flv(1);
    data[8] = 4;
    let mut dec = FlvDecoder::new();
    assert!(matches!(dec.parse(&data), Err(YingError::Malformed(_))));
}

#[test]
fn test_flv_sound_from_timestamp() {
    let data = build_flv(6);
    let dec = Rc::new(RefCell::new(FlvDecoder::new()));
    dec.borrow_mut().parse(&data).unwrap();
    dec.borrow_mut().finish().unwrap();

    let registry = registry();
    // 25ms 落在第 2 个音频 Tag (20ms) 内
    let mut sound: FlvSound = StreamSound::new(FlvBlocks::at_time(dec, 25), &registry).unwrap();
    let mut out = vec![0i16; 64];
    assert_eq!(sound.render(&mut out, 0, 32), 16);
    let expected: Vec<i16> = (2..6)
        .flat_map(|tag| {
            (0..4).flat_map(move |i| {
                let v = (tag * 100 + i) as i16;
                [v, -v]
            })
        })
        .collect();
    assert_eq!(&out[..32], &expected[..]);
    assert!(out[32..].iter().all(|&s| s == 0));
    assert_eq!(sound.iterate(10), Remaining::Exact(6));
    assert_eq!(sound.iterate(6), Remaining::Exact(0));
}

#[test]
fn test_flv_sound_plays_through_loading() {
    let data = build_flv(8);
    let dec = Rc::new(RefCell::new(FlvDecoder::new()));
    let mut rng = Rng(0x5EED_F1F0);
    let mut pos = 0;
    // 先喂到出现第一个音频 Tag
    while dec.borrow().audio_tags().is_empty() {
        let end = (pos + 1 + rng.below(16)).min(data.len());
        dec.borrow_mut().parse(&data[pos..end]).unwrap();
        pos = end;
    }

    let registry = registry();
    let mut sound = StreamSound::new(FlvBlocks::new(dec.clone(), 0), &registry).unwrap();
    let mut played = Vec::new();
    let mut rounds = 0;
    // 同一个声音: 渲染一步, 再喂一段数据, 直到流结束
    let status = loop {
        let mut out = vec![0i16; 6];
        let n = sound.render(&mut out, 0, 3);
        played.extend_from_slice(&out[..n * 2]);
        let status = sound.iterate(n);
        rounds += 1;
        if status == Remaining::Exact(0) || rounds == 1000 {
            break status;
        }
        if pos < data.len() {
            let end = (pos + 1 + rng.below(16)).min(data.len());
            dec.borrow_mut().parse(&data[pos..end]).unwrap();
            pos = end;
        } else if !dec.borrow().is_eof() {
            dec.borrow_mut().finish().unwrap();
        }
    };
    assert_eq!(status, Remaining::Exact(0));

    let expected: Vec<i16> = (0..8)
        .flat_map(|tag| {
            (0..4).flat_map(move |i| {
                let v = (tag * 100 + i) as i16;
                [v, -v]
            })
        })
        .collect();
    assert_eq!(played, expected);
}

#[test]
fn test_flv_sound_stops_on_format_change() {
    let (codec, format) = pcm();
    let mono = AudioFormat::from_bits(0x0E);
    let mut w = FlvWriter::new(true, false);
    w.audio(0, codec, format, &pcm_tag(0, 2))
        .audio(10, codec, format, &pcm_tag(1, 2))
        .audio(20, codec, mono, &[0x10, 0x00]);
    let dec = Rc::new(RefCell::new(FlvDecoder::new()));
    dec.borrow_mut().parse(&w.finish()).unwrap();
    dec.borrow_mut().finish().unwrap();

    let registry = registry();
    let mut sound = StreamSound::new(FlvBlocks::new(dec, 0), &registry).unwrap();
    let mut out = vec![0i16; 32];
    assert_eq!(sound.render(&mut out, 0, 16), 4);
    assert!(sound.is_finished());
}
