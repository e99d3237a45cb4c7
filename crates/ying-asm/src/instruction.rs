//! 抽象指令.

use std::fmt;

use bitflags::bitflags;
use ying_core::BitWriter;

use crate::action;

/// 尚未确定偏移的位置, 由 [`crate::Assembler::new_label`] 分配
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub(crate) u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Push 的操作数
#[derive(Debug, Clone, PartialEq)]
pub enum PushValue {
    String(String),
    Float(f32),
    Null,
    Undefined,
    Register(u8),
    Boolean(bool),
    /// 以高低 32 位互换的顺序存储
    Double(f64),
    Integer(i32),
    /// 常量池下标, 小于 256 时用 8 位编码
    Constant(u16),
}

impl PushValue {
    /// 类型字节
    pub fn type_id(&self) -> u8 {
        match self {
            PushValue::String(_) => 0,
            PushValue::Float(_) => 1,
            PushValue::Null => 2,
            PushValue::Undefined => 3,
            PushValue::Register(_) => 4,
            PushValue::Boolean(_) => 5,
            PushValue::Double(_) => 6,
            PushValue::Integer(_) => 7,
            PushValue::Constant(i) if *i < 256 => 8,
            PushValue::Constant(_) => 9,
        }
    }

    pub(crate) fn write(&self, w: &mut BitWriter, version: u8) {
        w.write_u8(self.type_id());
        match self {
            PushValue::String(s) => w.write_string(s, version),
            PushValue::Float(v) => w.write_float(*v),
            PushValue::Null | PushValue::Undefined => {}
            PushValue::Register(r) => w.write_u8(*r),
            PushValue::Boolean(b) => w.write_u8(u8::from(*b)),
            PushValue::Double(v) => w.write_bdouble(*v),
            PushValue::Integer(v) => w.write_u32(*v as u32),
            PushValue::Constant(i) if *i < 256 => w.write_u8(*i as u8),
            PushValue::Constant(i) => w.write_u16(*i),
        }
    }
}

bitflags! {
    /// DefineFunction2 的寄存器预加载与抑制标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FunctionFlags: u16 {
        const PRELOAD_THIS = 0x0001;
        const SUPPRESS_THIS = 0x0002;
        const PRELOAD_ARGUMENTS = 0x0004;
        const SUPPRESS_ARGUMENTS = 0x0008;
        const PRELOAD_SUPER = 0x0010;
        const SUPPRESS_SUPER = 0x0020;
        const PRELOAD_ROOT = 0x0040;
        const PRELOAD_PARENT = 0x0080;
        const PRELOAD_GLOBAL = 0x0100;
    }
}

/// Try 捕获的异常存放位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatchTarget {
    Variable(String),
    Register(u8),
}

/// GetURL2 发送变量的方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UrlMethod {
    #[default]
    None,
    Get,
    Post,
}

impl UrlMethod {
    pub fn bits(self) -> u8 {
        match self {
            UrlMethod::None => 0,
            UrlMethod::Get => 1,
            UrlMethod::Post => 2,
        }
    }
}

/// 一条抽象指令
///
/// 带标签的指令 (跳转、函数体、With 块、Try 区域) 在第一遍生成时写入占位,
/// 第二遍按标签的最终偏移回填.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// 在当前输出位置定义标签, 不产生字节
    Label(Label),
    /// 不带数据的动作 (编码 < 0x80)
    Simple(u8),
    /// 原样输出的动作
    Raw { code: u8, data: Vec<u8> },
    GotoFrame(u16),
    GetUrl { url: String, target: String },
    StoreRegister(u8),
    ConstantPool(Vec<String>),
    WaitForFrame { frame: u16, skip: u8 },
    WaitForFrame2 { skip: u8 },
    SetTarget(String),
    GotoLabel(String),
    GotoFrame2 { play: bool, scene_bias: Option<u16> },
    GetUrl2 {
        method: UrlMethod,
        load_target: bool,
        load_variables: bool,
    },
    Push(Vec<PushValue>),
    /// 无条件跳转到标签
    Jump(Label),
    /// 栈顶为真时跳转到标签
    If(Label),
    /// 函数体从本指令之后开始, 到 `end` 结束
    DefineFunction {
        name: String,
        params: Vec<String>,
        end: Label,
    },
    DefineFunction2 {
        name: String,
        register_count: u8,
        flags: FunctionFlags,
        /// (寄存器, 参数名), 寄存器为 0 表示不分配寄存器
        params: Vec<(u8, String)>,
        end: Label,
    },
    /// With 块从本指令之后开始, 到 `end` 结束
    With { end: Label },
    /// try 块从本指令之后开始; catch 与 finally 块分别从各自标签开始, 全部在 `end` 结束
    Try {
        target: CatchTarget,
        catch: Option<Label>,
        finally: Option<Label>,
        end: Label,
    },
}

impl Instruction {
    /// 动作编码, 标签定义没有编码
    pub fn code(&self) -> Option<u8> {
        Some(match self {
            Instruction::Label(_) => return None,
            Instruction::Simple(code) | Instruction::Raw { code, .. } => *code,
            Instruction::GotoFrame(_) => action::GOTO_FRAME,
            Instruction::GetUrl { .. } => action::GET_URL,
            Instruction::StoreRegister(_) => action::STORE_REGISTER,
            Instruction::ConstantPool(_) => action::CONSTANT_POOL,
            Instruction::WaitForFrame { .. } => action::WAIT_FOR_FRAME,
            Instruction::WaitForFrame2 { .. } => action::WAIT_FOR_FRAME2,
            Instruction::SetTarget(_) => action::SET_TARGET,
            Instruction::GotoLabel(_) => action::GOTO_LABEL,
            Instruction::GotoFrame2 { .. } => action::GOTO_FRAME2,
            Instruction::GetUrl2 { .. } => action::GET_URL2,
            Instruction::Push(_) => action::PUSH,
            Instruction::Jump(_) => action::JUMP,
            Instruction::If(_) => action::IF,
            Instruction::DefineFunction { .. } => action::DEFINE_FUNCTION,
            Instruction::DefineFunction2 { .. } => action::DEFINE_FUNCTION2,
            Instruction::With { .. } => action::WITH,
            Instruction::Try { .. } => action::TRY,
        })
    }

    /// 指令名称, 用于错误信息
    pub fn name(&self) -> &'static str {
        match self.code() {
            None => "Label",
            Some(code) => action::action_name(code).unwrap_or("Unknown"),
        }
    }
}
