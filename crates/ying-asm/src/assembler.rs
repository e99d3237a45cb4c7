//! 两遍汇编.
//!
//! 第一遍按顺序输出每条指令的编码, 记录每个标签的偏移,
//! 遇到对标签的引用时写入全零占位并登记一个回填项.
//! 第二遍对已定长的输出逐个回填: 计算 `标签偏移 - 动作末尾偏移`, 检查字段宽度后按小端写入.
//! 任何回填失败都会放弃整个输出.

use std::collections::HashMap;

use log::{debug, trace};
use ying_core::BitWriter;

use crate::action;
use crate::error::{AsmError, AsmResult};
use crate::instruction::{CatchTarget, Instruction, Label};

/// 占位的种类
#[derive(Debug, Clone, Copy)]
enum PatchKind {
    /// 16 位有符号跳转偏移
    Branch(Label),
    /// 16 位无符号长度, 只能向前
    Length(Label),
    /// Try 的 try/catch/finally 三个区域长度
    TryRegions {
        catch: Option<Label>,
        finally: Option<Label>,
        end: Label,
    },
}

/// 回填项
#[derive(Debug)]
struct Resolver {
    construct: &'static str,
    /// 占位在输出中的位置
    at: usize,
    /// 偏移的起点: 带占位的动作的末尾
    base: usize,
    kind: PatchKind,
}

impl Resolver {
    fn lookup(&self, labels: &HashMap<Label, usize>, label: Label) -> AsmResult<usize> {
        labels
            .get(&label)
            .copied()
            .ok_or(AsmError::UndefinedLabel {
                construct: self.construct,
                label,
            })
    }

    /// `from` 到 `label` 的无符号 16 位长度
    fn length(&self, labels: &HashMap<Label, usize>, from: usize, label: Label) -> AsmResult<u16> {
        let offset = self.lookup(labels, label)? as i64 - from as i64;
        if offset < 0 {
            return Err(AsmError::BackwardReference {
                construct: self.construct,
                label,
                offset,
            });
        }
        u16::try_from(offset).map_err(|_| AsmError::OffsetOutOfRange {
            construct: self.construct,
            label,
            offset,
        })
    }

    fn resolve(&self, output: &mut [u8], labels: &HashMap<Label, usize>) -> AsmResult<()> {
        match self.kind {
            PatchKind::Branch(label) => {
                let offset = self.lookup(labels, label)? as i64 - self.base as i64;
                let value = i16::try_from(offset).map_err(|_| AsmError::OffsetOutOfRange {
                    construct: self.construct,
                    label,
                    offset,
                })?;
                output[self.at..self.at + 2].copy_from_slice(&value.to_le_bytes());
            }
            PatchKind::Length(label) => {
                let value = self.length(labels, self.base, label)?;
                output[self.at..self.at + 2].copy_from_slice(&value.to_le_bytes());
            }
            PatchKind::TryRegions {
                catch,
                finally,
                end,
            } => {
                let try_end = catch.or(finally).unwrap_or(end);
                let try_size = self.length(labels, self.base, try_end)?;
                let catch_size = match catch {
                    Some(label) => {
                        let start = self.lookup(labels, label)?;
                        self.length(labels, start, finally.unwrap_or(end))?
                    }
                    None => 0,
                };
                let finally_size = match finally {
                    Some(label) => {
                        let start = self.lookup(labels, label)?;
                        self.length(labels, start, end)?
                    }
                    None => 0,
                };
                for (i, size) in [try_size, catch_size, finally_size].into_iter().enumerate() {
                    let at = self.at + i * 2;
                    output[at..at + 2].copy_from_slice(&size.to_le_bytes());
                }
            }
        }
        Ok(())
    }
}

/// 一条指令的编码: 动作数据与其中的占位
struct Encoded {
    code: u8,
    payload: Vec<u8>,
    patch: Option<(usize, PatchKind)>,
}

fn invalid(construct: &'static str, reason: impl Into<String>) -> AsmError {
    AsmError::InvalidInstruction {
        construct,
        reason: reason.into(),
    }
}

fn count_u16(construct: &'static str, what: &str, n: usize) -> AsmResult<u16> {
    u16::try_from(n).map_err(|_| invalid(construct, format!("{} 个{}超过 65535", n, what)))
}

/// 编码一条指令, 标签定义返回 `None`
fn encode(ins: &Instruction, version: u8) -> AsmResult<Option<Encoded>> {
    let construct = ins.name();
    let Some(code) = ins.code() else {
        return Ok(None);
    };
    let mut w = BitWriter::new();
    let mut patch = None;
    match ins {
        Instruction::Label(_) => return Ok(None),
        Instruction::Simple(code) => {
            if action::has_payload(*code) {
                return Err(invalid(construct, format!("动作 0x{:02X} 需要数据", code)));
            }
        }
        Instruction::Raw { code, data } => {
            if !action::has_payload(*code) && !data.is_empty() {
                return Err(invalid(
                    construct,
                    format!("动作 0x{:02X} 不能带数据", code),
                ));
            }
            w.write_bytes(data);
        }
        Instruction::GotoFrame(frame) => w.write_u16(*frame),
        Instruction::GetUrl { url, target } => {
            w.write_string(url, version);
            w.write_string(target, version);
        }
        Instruction::StoreRegister(reg) => w.write_u8(*reg),
        Instruction::ConstantPool(pool) => {
            w.write_u16(count_u16(construct, "常量", pool.len())?);
            for s in pool {
                w.write_string(s, version);
            }
        }
        Instruction::WaitForFrame { frame, skip } => {
            w.write_u16(*frame);
            w.write_u8(*skip);
        }
        Instruction::WaitForFrame2 { skip } => w.write_u8(*skip),
        Instruction::SetTarget(target) => w.write_string(target, version),
        Instruction::GotoLabel(label) => w.write_string(label, version),
        Instruction::GotoFrame2 { play, scene_bias } => {
            w.write_u8(u8::from(scene_bias.is_some()) << 1 | u8::from(*play));
            if let Some(bias) = scene_bias {
                w.write_u16(*bias);
            }
        }
        Instruction::GetUrl2 {
            method,
            load_target,
            load_variables,
        } => {
            w.write_u8(method.bits() << 6 | u8::from(*load_target) << 1 | u8::from(*load_variables));
        }
        Instruction::Push(values) => {
            for value in values {
                value.write(&mut w, version);
            }
        }
        Instruction::Jump(label) | Instruction::If(label) => {
            patch = Some((w.len(), PatchKind::Branch(*label)));
            w.write_u16(0);
        }
        Instruction::DefineFunction { name, params, end } => {
            w.write_string(name, version);
            w.write_u16(count_u16(construct, "参数", params.len())?);
            for param in params {
                w.write_string(param, version);
            }
            patch = Some((w.len(), PatchKind::Length(*end)));
            w.write_u16(0);
        }
        Instruction::DefineFunction2 {
            name,
            register_count,
            flags,
            params,
            end,
        } => {
            w.write_string(name, version);
            w.write_u16(count_u16(construct, "参数", params.len())?);
            w.write_u8(*register_count);
            w.write_u16(flags.bits());
            for (reg, param) in params {
                if *reg != 0 && *reg >= *register_count {
                    return Err(invalid(
                        construct,
                        format!("参数 {} 的寄存器 {} 超出 {} 个寄存器", param, reg, register_count),
                    ));
                }
                w.write_u8(*reg);
                w.write_string(param, version);
            }
            patch = Some((w.len(), PatchKind::Length(*end)));
            w.write_u16(0);
        }
        Instruction::With { end } => {
            patch = Some((w.len(), PatchKind::Length(*end)));
            w.write_u16(0);
        }
        Instruction::Try {
            target,
            catch,
            finally,
            end,
        } => {
            let in_register = matches!(target, CatchTarget::Register(_));
            w.write_u8(
                u8::from(in_register) << 2 | u8::from(finally.is_some()) << 1 | u8::from(catch.is_some()),
            );
            patch = Some((
                w.len(),
                PatchKind::TryRegions {
                    catch: *catch,
                    finally: *finally,
                    end: *end,
                },
            ));
            w.write_bytes(&[0; 6]);
            match target {
                CatchTarget::Variable(name) => w.write_string(name, version),
                CatchTarget::Register(reg) => w.write_u8(*reg),
            }
        }
    }
    Ok(Some(Encoded {
        code,
        payload: w.finish(),
        patch,
    }))
}

/// 汇编结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembled {
    pub data: Vec<u8>,
    /// 每个标签的最终偏移
    pub labels: HashMap<Label, usize>,
}

impl Assembled {
    pub fn offset(&self, label: Label) -> Option<usize> {
        self.labels.get(&label).copied()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

/// 动作字节码汇编器
#[derive(Debug, Clone)]
pub struct Assembler {
    /// 目标 SWF 版本, 决定字符串编码
    version: u8,
    instructions: Vec<Instruction>,
    next_label: u32,
}

impl Assembler {
    pub fn new(version: u8) -> Self {
        Self {
            version,
            instructions: Vec::new(),
            next_label: 0,
        }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// 分配一个新标签
    pub fn new_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    /// 追加一条指令
    pub fn push(&mut self, instruction: Instruction) -> &mut Self {
        self.instructions.push(instruction);
        self
    }

    /// 在当前位置定义标签
    pub fn label(&mut self, label: Label) -> &mut Self {
        self.push(Instruction::Label(label))
    }

    /// 追加不带数据的动作
    pub fn simple(&mut self, code: u8) -> &mut Self {
        self.push(Instruction::Simple(code))
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// 生成字节码
    ///
    /// 输出不会自动追加 End 动作.
    pub fn assemble(&self) -> AsmResult<Assembled> {
        let mut out = Vec::new();
        let mut labels = HashMap::new();
        let mut resolvers = Vec::new();

        for ins in &self.instructions {
            if let Instruction::Label(label) = ins {
                if let Some(first) = labels.insert(*label, out.len()) {
                    return Err(AsmError::DuplicateLabel {
                        label: *label,
                        first,
                        second: out.len(),
                    });
                }
                continue;
            }
            let Some(encoded) = encode(ins, self.version)? else {
                continue;
            };
            out.push(encoded.code);
            if !action::has_payload(encoded.code) {
                continue;
            }
            let len = u16::try_from(encoded.payload.len()).map_err(|_| AsmError::ActionTooLong {
                construct: ins.name(),
                len: encoded.payload.len(),
            })?;
            out.extend_from_slice(&len.to_le_bytes());
            let payload_start = out.len();
            out.extend_from_slice(&encoded.payload);
            if let Some((pos, kind)) = encoded.patch {
                trace!("{} 在偏移 {} 登记回填", ins.name(), payload_start + pos);
                resolvers.push(Resolver {
                    construct: ins.name(),
                    at: payload_start + pos,
                    base: out.len(),
                    kind,
                });
            }
        }

        for resolver in &resolvers {
            resolver.resolve(&mut out, &labels)?;
        }
        debug!(
            "汇编完成: {} 条指令, {} 字节, {} 处回填",
            self.instructions.len(),
            out.len(),
            resolvers.len()
        );
        Ok(Assembled { data: out, labels })
    }
}
