//! # ying-asm
//!
//! Ying 动作字节码汇编器.
//!
//! 调用方把抽象指令按顺序交给 [`Assembler`], 跳转目标、函数体与 Try 区域的结束位置
//! 用 [`Label`] 表示. [`Assembler::assemble`] 分两遍生成字节码:
//! 第一遍写出编码与占位, 第二遍按标签偏移回填. 回填失败时不返回任何输出.
//!
//! [`decode_actions`] 把字节码拆回动作记录, 用于回读检查与探测工具.
//!
//! ## 使用示例
//!
//! ```rust
//! use ying_asm::{Assembler, Instruction, action, decode_actions};
//!
//! let mut asm = Assembler::new(6);
//! let skip = asm.new_label();
//! asm.push(Instruction::Jump(skip))
//!     .simple(action::STOP)
//!     .label(skip)
//!     .simple(action::END);
//! let out = asm.assemble().unwrap();
//! let records = decode_actions(&out.data).unwrap();
//! assert_eq!(records[0].branch_target(), out.offset(skip));
//! ```

pub mod action;
pub mod assembler;
pub mod decode;
pub mod error;
pub mod instruction;

pub use assembler::{Assembled, Assembler};
pub use decode::{ActionRecord, decode_actions};
pub use error::{AsmError, AsmResult};
pub use instruction::{CatchTarget, FunctionFlags, Instruction, Label, PushValue, UrlMethod};
