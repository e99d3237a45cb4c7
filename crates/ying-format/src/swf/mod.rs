//! SWF 容器解析.
//!
//! # SWF 文件结构
//! ```text
//! Signature (3 bytes): "FWS" 未压缩 / "CWS" zlib 压缩
//! Version (1 byte)
//! FileLength (4 bytes, LE): 含 8 字节文件头的解压后总长度
//! --- CWS 时以下内容经 zlib 压缩 ---
//! FrameSize (RECT, twips)
//! FrameRate (2 bytes, 8.8 定点)
//! FrameCount (2 bytes, LE)
//! Tag*:
//!   TagCodeAndLength (2 bytes, LE): 高 10 位类型, 低 6 位长度
//!   [Length (4 bytes, LE)]: 低 6 位为 0x3F 时出现
//!   Payload
//! End (类型 0)
//! ```
//!
//! [`SwfDecoder`] 是增量解析引擎; 各标签的子结构解析器位于同级模块中,
//! 它们既由引擎调用, 也可以单独用于解析已保存的标签数据.

pub mod button;
pub mod character;
pub mod context;
pub mod decoder;
pub mod font;
pub mod image;
pub mod movie;
pub mod place;
pub mod shape;
pub mod sound;
pub mod sprite;
pub mod tags;
pub mod text;
pub mod video;
pub mod writer;

pub use character::{Character, Dictionary};
pub use decoder::{DecoderState, SwfDecoder, SwfHeader};
pub use movie::MovieInfo;
pub use sprite::{Frame, Sprite, SpriteAction};
pub use writer::SwfWriter;
