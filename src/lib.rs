//! # Ying (影)
//!
//! 纯 Rust 实现的 Flash 媒体解码核心.
//!
//! Ying 提供了播放器底层需要的全部解析与音频能力:
//! - **比特流**: SWF 位打包结构的读写 (RECT, MATRIX, CXFORM, 变长整数...)
//! - **容器解析**: 可在任意字节边界暂停的 SWF 标签引擎与 FLV 解析器
//! - **音频解码**: PCM / ADPCM 内置解码, MP3 经 symphonia 后端, 统一输出 44.1kHz 立体声
//! - **音频渲染**: 事件声音、时间轴流式声音、FLV 声音与混音
//! - **动作汇编**: 带标签回填的动作字节码生成
//!
//! # 快速开始
//!
//! ```rust
//! use ying::format::{ParseStatus, SwfDecoder};
//! use ying::format::swf::SwfWriter;
//!
//! let mut writer = SwfWriter::new(6);
//! writer.show_frame().end();
//! let data = writer.finish().unwrap();
//!
//! let mut decoder = SwfDecoder::new();
//! for chunk in data.chunks(3) {
//!     decoder.parse(chunk).unwrap();
//! }
//! assert!(decoder.is_eof());
//! assert_eq!(decoder.frames_loaded(), 1);
//! # let _ = ParseStatus::Eof;
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `ying-core` | 比特流读写、几何类型与统一错误 |
//! | `ying-codec` | 音频解码管线与后端注册表 |
//! | `ying-format` | SWF / FLV 增量解析 |
//! | `ying-audio` | 音频渲染图与混音 |
//! | `ying-asm` | 动作字节码汇编器 |

/// 核心类型与工具
pub use ying_core as core;

/// 音频解码管线
pub use ying_codec as codec;

/// SWF / FLV 容器解析
pub use ying_format as format;

/// 音频渲染图
pub use ying_audio as audio;

/// 动作字节码汇编器
pub use ying_asm as asm;

/// 获取 Ying 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// 创建按默认优先级注册了全部已编译后端的解码注册表
pub fn default_codec_registry() -> ying_codec::CodecRegistry {
    ying_codec::CodecRegistry::from_config(&ying_codec::CodecConfig::default())
}
