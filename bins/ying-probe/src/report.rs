//! 探测逻辑与输出结构.
//!
//! 输入按固定大小的块送进增量解码器, 与播放器边下载边解析的方式一致.
//! 解析出错时保留已经得到的内容, 错误信息记录在报告中.

use std::collections::BTreeMap;
use std::io::{ErrorKind, Read};

use log::{debug, info};
use serde::Serialize;
use ying_codec::{AudioCodec, AudioFormat, CANONICAL_RATE, CodecRegistry, Prepared};
use ying_core::{TWIPS_PER_PIXEL, YingError, YingResult};
use ying_format::flv::FRAME_KEY;
use ying_format::swf::{Character, Sprite, tags};
use ying_format::{FlvDecoder, ParseStatus, SwfDecoder};

/// 容器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Swf,
    Flv,
}

impl Container {
    /// 按文件签名识别容器
    pub fn detect(head: &[u8]) -> Option<Self> {
        match head.get(..3)? {
            b"FWS" | b"CWS" | b"ZWS" => Some(Self::Swf),
            b"FLV" => Some(Self::Flv),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Swf => "swf",
            Self::Flv => "flv",
        }
    }
}

// ============================================================
// 输出结构体
// ============================================================

/// 完整探测结果
#[derive(Debug, Serialize)]
pub struct ProbeReport {
    pub filename: String,
    pub container: String,
    pub bytes_read: u64,
    /// 按优先级排列的解码后端
    pub backends: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swf: Option<SwfSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flv: Option<FlvSummary>,
    /// 解析中止的原因
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SwfSummary {
    pub compressed: bool,
    pub version: u8,
    pub file_length: u32,
    pub width: f64,
    pub height: f64,
    pub frame_rate: f32,
    pub frame_count: u16,
    pub frames_loaded: usize,
    pub complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    pub characters: BTreeMap<String, usize>,
    pub exports: usize,
    pub frame_labels: usize,
    pub actions: ActionSummary,
    pub stream_sounds: Vec<StreamSoundInfo>,
    pub event_sounds: Vec<EventSoundInfo>,
}

/// DoAction / DoInitAction 统计
#[derive(Debug, Default, Serialize)]
pub struct ActionSummary {
    /// 动作块数量
    pub blocks: usize,
    pub init_blocks: usize,
    /// 动作总数
    pub total: usize,
    pub by_name: BTreeMap<String, usize>,
    /// 无法完整解码的动作块
    pub broken_blocks: usize,
}

/// 时间轴流式声音
#[derive(Debug, Serialize)]
pub struct StreamSoundInfo {
    pub sprite: u16,
    pub codec: String,
    pub format: String,
    pub blocks: usize,
    /// 44.1kHz 规范流中的采样帧数
    pub samples: u64,
    pub decodable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing: Option<String>,
}

/// 事件声音 (DefineSound)
#[derive(Debug, Serialize)]
pub struct EventSoundInfo {
    pub id: u16,
    pub codec: String,
    pub format: String,
    pub sample_count: u32,
    pub duration: f64,
    pub bytes: usize,
    pub decodable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FlvSummary {
    pub version: u8,
    pub has_audio: bool,
    pub has_video: bool,
    pub audio_tags: usize,
    pub video_tags: usize,
    pub keyframes: usize,
    pub data_tags: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_codec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_decodable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_missing: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_codec: Option<String>,
}

// ============================================================
// 探测
// ============================================================

/// 读取失败时重试被信号打断的调用
fn read_chunk<R: Read>(reader: &mut R, buf: &mut [u8]) -> YingResult<usize> {
    loop {
        match reader.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

/// 送数据的结果
struct Feed {
    bytes_read: u64,
    error: Option<String>,
}

/// 先送入 `first`, 再按块读取并送入, 直到解码器到达 Eof、出错或输入结束
fn feed<R, F>(reader: &mut R, first: &[u8], chunk_size: usize, mut parse: F) -> YingResult<Feed>
where
    R: Read,
    F: FnMut(&[u8]) -> YingResult<ParseStatus>,
{
    let mut feed = Feed {
        bytes_read: first.len() as u64,
        error: None,
    };
    let mut status = match parse(first) {
        Ok(status) => status,
        Err(e) => {
            feed.error = Some(e.to_string());
            return Ok(feed);
        }
    };
    let mut buf = vec![0u8; chunk_size];
    while status != ParseStatus::Eof {
        let n = read_chunk(reader, &mut buf)?;
        if n == 0 {
            break;
        }
        feed.bytes_read += n as u64;
        status = match parse(&buf[..n]) {
            Ok(status) => status,
            Err(e) => {
                feed.error = Some(e.to_string());
                break;
            }
        };
    }
    Ok(feed)
}

/// 探测一个输入流
///
/// 无法识别的签名与读取失败返回错误; 容器解析错误记录在报告的 `error` 字段中.
pub fn probe<R: Read>(
    filename: &str,
    mut reader: R,
    chunk_size: usize,
    registry: &CodecRegistry,
) -> YingResult<ProbeReport> {
    if chunk_size == 0 {
        return Err(YingError::InvalidArgument("块大小不能为 0".into()));
    }

    // 签名可能被切在多个块中
    let mut head = Vec::new();
    let mut buf = vec![0u8; chunk_size];
    while head.len() < 3 {
        let n = read_chunk(&mut reader, &mut buf)?;
        if n == 0 {
            break;
        }
        head.extend_from_slice(&buf[..n]);
    }
    let container = Container::detect(&head).ok_or_else(|| {
        let signature = &head[..head.len().min(3)];
        YingError::Unsupported(format!("无法识别的文件签名: {:02X?}", signature))
    })?;
    info!("{}: 识别为 {}", filename, container.name());

    let mut report = ProbeReport {
        filename: filename.to_string(),
        container: container.name().to_string(),
        bytes_read: 0,
        backends: registry
            .backend_names()
            .into_iter()
            .map(String::from)
            .collect(),
        swf: None,
        flv: None,
        error: None,
    };

    match container {
        Container::Swf => {
            let mut decoder = SwfDecoder::new();
            let fed = feed(&mut reader, &head, chunk_size, |data| decoder.parse(data))?;
            if fed.error.is_none() {
                decoder.finish()?;
            }
            report.bytes_read = fed.bytes_read;
            report.error = fed.error;
            report.swf = summarize_swf(&decoder, registry);
        }
        Container::Flv => {
            let mut decoder = FlvDecoder::new();
            let fed = feed(&mut reader, &head, chunk_size, |data| decoder.parse(data))?;
            if fed.error.is_none() {
                decoder.finish()?;
            }
            report.bytes_read = fed.bytes_read;
            report.error = fed.error;
            report.flv = summarize_flv(&decoder, registry);
        }
    }
    Ok(report)
}

fn availability(
    registry: &CodecRegistry,
    codec: AudioCodec,
    format: AudioFormat,
) -> (bool, Option<String>) {
    match registry.prepare(codec, format) {
        Prepared::Ready => (true, None),
        Prepared::Missing { description } => (false, Some(description)),
    }
}

/// 统计动作块
fn count_actions(summary: &mut ActionSummary, data: &[u8]) {
    match ying_asm::decode_actions(data) {
        Ok(records) => {
            for record in &records {
                summary.total += 1;
                *summary.by_name.entry(record.name().to_string()).or_insert(0) += 1;
            }
        }
        Err(e) => {
            debug!("动作块解码失败: {}", e);
            summary.broken_blocks += 1;
        }
    }
}

fn stream_sound(sprite: &Sprite, registry: &CodecRegistry) -> Option<StreamSoundInfo> {
    let head = sprite.frames.iter().find_map(|f| f.sound_head.as_ref())?;
    let (decodable, missing) = availability(registry, head.codec, head.format);
    Some(StreamSoundInfo {
        sprite: sprite.id,
        codec: head.codec.to_string(),
        format: head.format.to_string(),
        blocks: sprite.frames.iter().filter(|f| f.sound_block.is_some()).count(),
        samples: sprite.frames.iter().map(|f| u64::from(f.sound_samples)).sum(),
        decodable,
        missing,
    })
}

fn summarize_swf(decoder: &SwfDecoder, registry: &CodecRegistry) -> Option<SwfSummary> {
    let header = decoder.header()?;
    let movie = decoder.movie();
    let dictionary = decoder.dictionary();

    let mut entries: Vec<_> = dictionary.iter().collect();
    entries.sort_by_key(|(id, _)| *id);

    let mut characters = BTreeMap::new();
    let mut sprites = vec![decoder.main_sprite()];
    let mut event_sounds = Vec::new();
    for (_, character) in &entries {
        *characters.entry(character.kind_name().to_string()).or_insert(0) += 1;
        match character {
            Character::Sprite(sprite) => sprites.push(sprite),
            Character::Sound(sound) => {
                let (decodable, missing) = availability(registry, sound.codec, sound.format);
                event_sounds.push(EventSoundInfo {
                    id: sound.id,
                    codec: sound.codec.to_string(),
                    format: sound.format.to_string(),
                    sample_count: sound.sample_count,
                    duration: sound.canonical_samples() as f64 / f64::from(CANONICAL_RATE),
                    bytes: sound.data.len(),
                    decodable,
                    missing,
                });
            }
            _ => {}
        }
    }

    let mut actions = ActionSummary::default();
    for sprite in &sprites {
        for action in sprite.actions.iter().filter(|a| a.tag == tags::DO_ACTION) {
            actions.blocks += 1;
            count_actions(&mut actions, &action.data);
        }
    }
    for init in &movie.init_actions {
        actions.init_blocks += 1;
        count_actions(&mut actions, &init.data);
    }

    let twips = f64::from(TWIPS_PER_PIXEL);
    Some(SwfSummary {
        compressed: header.compressed,
        version: header.version,
        file_length: header.file_length,
        width: f64::from(header.frame_size.width()) / twips,
        height: f64::from(header.frame_size.height()) / twips,
        frame_rate: header.frame_rate,
        frame_count: header.frame_count,
        frames_loaded: decoder.frames_loaded(),
        complete: decoder.main_sprite().is_complete(),
        background: movie
            .background
            .map(|c| format!("#{:02X}{:02X}{:02X}", c.r, c.g, c.b)),
        characters,
        exports: movie.exports.len(),
        frame_labels: movie.frame_labels.len(),
        actions,
        stream_sounds: sprites
            .iter()
            .filter_map(|s| stream_sound(s, registry))
            .collect(),
        event_sounds,
    })
}

fn summarize_flv(decoder: &FlvDecoder, registry: &CodecRegistry) -> Option<FlvSummary> {
    let header = decoder.header()?;
    let first_audio = decoder.audio_tags().first();
    let (audio_decodable, audio_missing) = match first_audio {
        Some(tag) => {
            let (ready, missing) = availability(registry, tag.codec, tag.format);
            (Some(ready), missing)
        }
        None => (None, None),
    };
    Some(FlvSummary {
        version: header.version,
        has_audio: header.has_audio,
        has_video: header.has_video,
        audio_tags: decoder.audio_tags().len(),
        video_tags: decoder.video_tags().len(),
        keyframes: decoder
            .video_tags()
            .iter()
            .filter(|t| t.frame_type == FRAME_KEY)
            .count(),
        data_tags: decoder.data_tags().len(),
        duration: decoder.duration(),
        audio_codec: first_audio.map(|t| t.codec.to_string()),
        audio_format: first_audio.map(|t| t.format.to_string()),
        audio_decodable,
        audio_missing,
        video_codec: decoder.video_tags().first().map(|t| t.codec.to_string()),
    })
}

// ============================================================
// 文本输出
// ============================================================

fn yes_no(value: bool) -> &'static str {
    if value { "是" } else { "否" }
}

pub fn print_text(report: &ProbeReport) {
    println!("[FORMAT]");
    println!("  文件名       : {}", report.filename);
    println!("  容器         : {}", report.container);
    println!("  已读取       : {} 字节", report.bytes_read);
    println!("  解码后端     : {}", report.backends.join(", "));
    if let Some(ref error) = report.error {
        println!("  解析错误     : {error}");
    }
    println!("[/FORMAT]");
    println!();

    if let Some(ref swf) = report.swf {
        print_swf_text(swf);
    }
    if let Some(ref flv) = report.flv {
        print_flv_text(flv);
    }
}

fn print_swf_text(swf: &SwfSummary) {
    println!("[SWF]");
    println!("  版本         : {}", swf.version);
    println!("  压缩         : {}", yes_no(swf.compressed));
    println!("  文件长度     : {} 字节", swf.file_length);
    println!("  舞台尺寸     : {}x{}", swf.width, swf.height);
    println!("  帧率         : {:.2} fps", swf.frame_rate);
    println!("  帧数         : {}/{}", swf.frames_loaded, swf.frame_count);
    println!("  完整         : {}", yes_no(swf.complete));
    if let Some(ref bg) = swf.background {
        println!("  背景色       : {bg}");
    }
    println!("  导出         : {}", swf.exports);
    println!("  帧标签       : {}", swf.frame_labels);
    println!("[/SWF]");
    println!();

    println!("[CHARACTERS]");
    for (kind, count) in &swf.characters {
        println!("  {kind:<12} : {count}");
    }
    println!("[/CHARACTERS]");
    println!();

    let actions = &swf.actions;
    println!("[ACTIONS]");
    println!("  动作块       : {}", actions.blocks);
    println!("  初始化动作块 : {}", actions.init_blocks);
    println!("  动作总数     : {}", actions.total);
    if actions.broken_blocks > 0 {
        println!("  损坏的动作块 : {}", actions.broken_blocks);
    }
    for (name, count) in &actions.by_name {
        println!("    {name:<20} {count}");
    }
    println!("[/ACTIONS]");
    println!();

    for stream in &swf.stream_sounds {
        println!("[SOUND STREAM sprite={}]", stream.sprite);
        println!("  编码         : {}", stream.codec);
        println!("  格式         : {}", stream.format);
        println!("  数据块       : {}", stream.blocks);
        println!("  采样帧       : {}", stream.samples);
        print_availability(stream.decodable, stream.missing.as_deref());
        println!("[/SOUND STREAM]");
        println!();
    }

    for sound in &swf.event_sounds {
        println!("[SOUND #{}]", sound.id);
        println!("  编码         : {}", sound.codec);
        println!("  格式         : {}", sound.format);
        println!("  采样数       : {}", sound.sample_count);
        println!("  时长         : {:.3} 秒", sound.duration);
        println!("  数据大小     : {} 字节", sound.bytes);
        print_availability(sound.decodable, sound.missing.as_deref());
        println!("[/SOUND]");
        println!();
    }
}

fn print_flv_text(flv: &FlvSummary) {
    println!("[FLV]");
    println!("  版本         : {}", flv.version);
    println!("  音频         : {}", yes_no(flv.has_audio));
    println!("  视频         : {}", yes_no(flv.has_video));
    println!("  音频 Tag     : {}", flv.audio_tags);
    println!("  视频 Tag     : {} (关键帧 {})", flv.video_tags, flv.keyframes);
    println!("  脚本 Tag     : {}", flv.data_tags);
    if let Some(duration) = flv.duration {
        println!("  时长         : {duration:.3} 秒");
    }
    if let Some(ref codec) = flv.audio_codec {
        println!("  音频编码     : {codec}");
    }
    if let Some(ref format) = flv.audio_format {
        println!("  音频格式     : {format}");
    }
    if let Some(decodable) = flv.audio_decodable {
        print_availability(decodable, flv.audio_missing.as_deref());
    }
    if let Some(ref codec) = flv.video_codec {
        println!("  视频编码     : {codec}");
    }
    println!("[/FLV]");
    println!();
}

fn print_availability(decodable: bool, missing: Option<&str>) {
    match missing {
        Some(missing) if !decodable => println!("  可解码       : 否 (缺少 {missing})"),
        _ => println!("  可解码       : {}", yes_no(decodable)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use ying_asm::{Assembler, Instruction, PushValue, action};
    use ying_codec::{BackendKind, CodecConfig, VideoCodec};
    use ying_format::flv::{FRAME_INTER, FlvWriter};
    use ying_format::swf::SwfWriter;

    fn registry() -> CodecRegistry {
        CodecRegistry::from_config(&CodecConfig {
            backends: vec![BackendKind::Builtin],
        })
    }

    fn action_block() -> Vec<u8> {
        let mut asm = Assembler::new(6);
        asm.push(Instruction::Push(vec![PushValue::String("x".into())]))
            .simple(action::TRACE)
            .simple(action::STOP)
            .simple(action::END);
        asm.assemble().unwrap().into_bytes()
    }

    fn sample_swf() -> Vec<u8> {
        // DefineSound: id 1, 未压缩小端 44.1kHz 16bit 立体声, 2 个采样
        let mut sound = vec![1, 0, 0x3F, 2, 0, 0, 0];
        sound.extend_from_slice(&[0; 8]);
        // SoundStreamHead: ADPCM 22kHz 16bit 单声道, 每帧 100 采样
        let head = [0x0A, 0x1A, 100, 0];

        let mut w = SwfWriter::new(6);
        w.tag(tags::SET_BACKGROUND_COLOR, &[0xFF, 0x80, 0x00])
            .tag(tags::DEFINE_SOUND, &sound)
            .tag(tags::SOUND_STREAM_HEAD, &head)
            .tag(tags::DO_ACTION, &action_block())
            .show_frame()
            .tag(tags::DO_ACTION, &action_block())
            .show_frame()
            .end();
        w.finish().unwrap()
    }

    #[test]
    fn test_detect_container() {
        assert_eq!(Container::detect(b"FWS\x06"), Some(Container::Swf));
        assert_eq!(Container::detect(b"CWS"), Some(Container::Swf));
        assert_eq!(Container::detect(b"FLV\x01"), Some(Container::Flv));
        assert_eq!(Container::detect(b"FL"), None);
        assert_eq!(Container::detect(b"RIFF"), None);
    }

    #[test]
    fn test_probe_swf_in_small_chunks() {
        let data = sample_swf();
        let report = probe("a.swf", Cursor::new(&data), 5, &registry()).unwrap();
        assert_eq!(report.container, "swf");
        assert_eq!(report.bytes_read, data.len() as u64);
        assert!(report.error.is_none());
        assert_eq!(report.backends, vec!["builtin".to_string()]);

        let swf = report.swf.unwrap();
        assert_eq!(swf.version, 6);
        assert_eq!(swf.frame_count, 2);
        assert_eq!(swf.frames_loaded, 2);
        assert!(swf.complete);
        assert_eq!(swf.width, 550.0);
        assert_eq!(swf.background.as_deref(), Some("#FF8000"));
        assert_eq!(swf.characters.get("sound"), Some(&1));

        assert_eq!(swf.actions.blocks, 2);
        assert_eq!(swf.actions.total, 8);
        assert_eq!(swf.actions.by_name.get("Trace"), Some(&2));
        assert_eq!(swf.actions.broken_blocks, 0);

        assert_eq!(swf.stream_sounds.len(), 1);
        assert_eq!(swf.stream_sounds[0].codec, "adpcm");
        assert!(swf.stream_sounds[0].decodable);

        assert_eq!(swf.event_sounds.len(), 1);
        let sound = &swf.event_sounds[0];
        assert_eq!(sound.id, 1);
        assert_eq!(sound.sample_count, 2);
        assert!(sound.decodable);
    }

    #[test]
    fn test_probe_reports_truncated_swf() {
        let data = sample_swf();
        let cut = &data[..data.len() - 6];
        let report = probe("cut.swf", Cursor::new(cut), 64, &registry()).unwrap();
        assert!(report.error.is_none());
        let swf = report.swf.unwrap();
        assert_eq!(swf.frames_loaded, 1);
        assert!(!swf.complete);
    }

    #[test]
    fn test_probe_records_parse_error() {
        let data = b"ZWS\x0d\x20\0\0\0\x01\x02\x03\x04".to_vec();
        let report = probe("lzma.swf", Cursor::new(&data), 3, &registry()).unwrap();
        assert_eq!(report.container, "swf");
        assert!(report.error.is_some());
        assert!(report.swf.is_none());
    }

    #[test]
    fn test_probe_flv() {
        let pcm = AudioFormat::from_bits(0x0F);
        let mut w = FlvWriter::new(true, true);
        w.metadata_duration(2.0)
            .video(0, FRAME_KEY, VideoCodec::Vp6, &[0, 1])
            .audio(0, AudioCodec::UncompressedLe, pcm, &[0; 4])
            .video(40, FRAME_INTER, VideoCodec::Vp6, &[0, 2])
            .audio(23, AudioCodec::UncompressedLe, pcm, &[0; 4]);
        let data = w.finish();
        let report = probe("a.flv", Cursor::new(&data), 7, &registry()).unwrap();
        assert_eq!(report.container, "flv");
        let flv = report.flv.unwrap();
        assert_eq!(flv.audio_tags, 2);
        assert_eq!(flv.video_tags, 2);
        assert_eq!(flv.keyframes, 1);
        assert_eq!(flv.data_tags, 1);
        assert_eq!(flv.duration, Some(2.0));
        assert_eq!(flv.audio_decodable, Some(true));
        assert_eq!(flv.audio_codec.as_deref(), Some("uncompressed_le"));
    }

    #[test]
    fn test_probe_rejects_unknown_signature() {
        let err = probe("x.bin", Cursor::new(b"RIFF....".to_vec()), 4, &registry()).unwrap_err();
        assert!(matches!(err, YingError::Unsupported(_)));
        let err = probe("x.swf", Cursor::new(Vec::new()), 0, &registry()).unwrap_err();
        assert!(matches!(err, YingError::InvalidArgument(_)));
    }

    #[test]
    fn test_json_output_shape() {
        let report = probe("a.swf", Cursor::new(sample_swf()), 4096, &registry()).unwrap();
        let json: serde_json::Value = serde_json::to_value(&report).unwrap();
        assert_eq!(json["container"], "swf");
        assert!(json.get("flv").is_none());
        assert!(json.get("error").is_none());
        assert_eq!(json["swf"]["actions"]["by_name"]["Stop"], 2);
    }
}
