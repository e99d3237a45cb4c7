//! 动作流解码: 把字节码拆回动作记录.

use bytes::Bytes;
use log::debug;
use ying_core::{BitReader, YingError};

use crate::action;
use crate::error::{AsmError, AsmResult};
use crate::instruction::PushValue;

/// 一条已编码的动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRecord {
    /// 动作在流中的起始偏移
    pub offset: usize,
    pub code: u8,
    pub data: Bytes,
}

impl ActionRecord {
    pub fn name(&self) -> &'static str {
        action::action_name(self.code).unwrap_or("Unknown")
    }

    /// 编码后的总长度
    pub fn encoded_len(&self) -> usize {
        if action::has_payload(self.code) {
            3 + self.data.len()
        } else {
            1
        }
    }

    pub fn end_offset(&self) -> usize {
        self.offset + self.encoded_len()
    }

    /// Jump / If 的目标偏移
    pub fn branch_target(&self) -> Option<usize> {
        if self.code != action::JUMP && self.code != action::IF {
            return None;
        }
        let bytes: [u8; 2] = self.data.get(..2)?.try_into().ok()?;
        let target = self.end_offset() as i64 + i64::from(i16::from_le_bytes(bytes));
        usize::try_from(target).ok()
    }

    /// 解出 Push 的操作数
    pub fn push_values(&self, version: u8) -> AsmResult<Vec<PushValue>> {
        if self.code != action::PUSH {
            return Err(AsmError::InvalidInstruction {
                construct: self.name(),
                reason: "不是 Push 动作".into(),
            });
        }
        let truncated = |e: YingError| match e {
            YingError::NeedMoreData => AsmError::Truncated {
                offset: self.offset,
            },
            other => AsmError::Read(other),
        };
        let mut r = BitReader::new(self.data.clone());
        let mut values = Vec::new();
        while r.bytes_left() > 0 {
            let value = match r.read_u8().map_err(truncated)? {
                0 => PushValue::String(r.read_string(version).map_err(truncated)?),
                1 => PushValue::Float(r.read_float().map_err(truncated)?),
                2 => PushValue::Null,
                3 => PushValue::Undefined,
                4 => PushValue::Register(r.read_u8().map_err(truncated)?),
                5 => PushValue::Boolean(r.read_u8().map_err(truncated)? != 0),
                6 => PushValue::Double(r.read_bdouble().map_err(truncated)?),
                7 => PushValue::Integer(r.read_u32().map_err(truncated)? as i32),
                8 => PushValue::Constant(u16::from(r.read_u8().map_err(truncated)?)),
                9 => PushValue::Constant(r.read_u16().map_err(truncated)?),
                other => {
                    return Err(AsmError::InvalidInstruction {
                        construct: "Push",
                        reason: format!("未知的操作数类型 {}", other),
                    });
                }
            };
            values.push(value);
        }
        Ok(values)
    }
}

/// 把动作流拆成记录, 遇到 End 动作后停止 (End 本身也会返回)
pub fn decode_actions(data: &[u8]) -> AsmResult<Vec<ActionRecord>> {
    let mut r = BitReader::from_slice(data);
    let mut records = Vec::new();
    while r.bytes_left() > 0 {
        let offset = r.position();
        let truncated = |_| AsmError::Truncated { offset };
        let code = r.read_u8().map_err(truncated)?;
        let payload = if action::has_payload(code) {
            let len = r.read_u16().map_err(truncated)?;
            r.read_buffer(usize::from(len)).map_err(truncated)?
        } else {
            Bytes::new()
        };
        records.push(ActionRecord {
            offset,
            code,
            data: payload,
        });
        if code == action::END {
            if r.bytes_left() > 0 {
                debug!("End 动作之后还有 {} 字节", r.bytes_left());
            }
            break;
        }
    }
    Ok(records)
}
