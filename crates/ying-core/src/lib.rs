//! # ying-core
//!
//! Ying 核心库, 提供比特流读写、SWF 几何类型、缓冲队列和统一错误处理.
//!
//! 其他 ying crate 都建立在本 crate 之上, 本 crate 不依赖任何其他 ying crate.

pub mod bitreader;
pub mod bitwriter;
pub mod buffer_queue;
pub mod error;
pub mod geometry;

// 重导出常用类型
pub use bitreader::BitReader;
pub use bitwriter::BitWriter;
pub use buffer_queue::BufferQueue;
pub use error::{YingError, YingResult};
pub use geometry::{Color, ColorTransform, Matrix, Rect, TWIPS_PER_PIXEL};
