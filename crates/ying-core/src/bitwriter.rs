//! 比特流写入器.
//!
//! [`BitReader`](crate::bitreader::BitReader) 的写端镜像: 按大端位序 (MSB first) 写入位级字段,
//! 对齐后的多字节字段提供 SWF 小端与 FLV 大端两套写入函数.
//! 测试夹具、SWF 写出器和字节码汇编器都基于它构造二进制数据.

use encoding_rs::WINDOWS_1252;

use crate::geometry::{Color, ColorTransform, Matrix, Rect};

/// 比特流写入器
///
/// # 示例
/// ```
/// use ying_core::bitwriter::BitWriter;
///
/// let mut bw = BitWriter::new();
/// bw.write_bits(0b1011, 4);
/// bw.write_u16(0x1234);
/// assert_eq!(bw.finish(), vec![0b1011_0000, 0x34, 0x12]);
/// ```
pub struct BitWriter {
    /// 输出缓冲区
    data: Vec<u8>,
    /// 当前字节 (正在填充)
    current_byte: u8,
    /// 当前字节中已填充的位数 (0-7)
    bit_count: u8,
}

impl BitWriter {
    /// 创建新的比特流写入器
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            current_byte: 0,
            bit_count: 0,
        }
    }

    /// 以指定容量创建比特流写入器
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            current_byte: 0,
            bit_count: 0,
        }
    }

    /// 已写入的总位数
    pub fn bits_written(&self) -> usize {
        self.data.len() * 8 + self.bit_count as usize
    }

    /// 已完成的字节数 (不含正在填充的字节)
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.bit_count == 0
    }

    /// 写入 1 个位
    pub fn write_bit(&mut self, bit: bool) {
        self.current_byte = (self.current_byte << 1) | u8::from(bit);
        self.bit_count += 1;
        if self.bit_count >= 8 {
            self.data.push(self.current_byte);
            self.current_byte = 0;
            self.bit_count = 0;
        }
    }

    /// 写入 N 个位 (最多 32 位)
    ///
    /// 值的低 N 位被写入, 高位在前.
    pub fn write_bits(&mut self, value: u32, n: u32) {
        debug_assert!(n <= 32, "write_bits: n={} 超过 32 位", n);

        let mut remaining = n;
        while remaining > 0 {
            let available = 8 - u32::from(self.bit_count);
            let to_write = remaining.min(available);

            let shift = remaining - to_write;
            let mask = (1u32 << to_write) - 1;
            let bits = ((value >> shift) & mask) as u8;

            self.current_byte = if to_write >= 8 {
                bits
            } else {
                (self.current_byte << to_write) | bits
            };
            self.bit_count += to_write as u8;

            if self.bit_count >= 8 {
                self.data.push(self.current_byte);
                self.current_byte = 0;
                self.bit_count = 0;
            }
            remaining -= to_write;
        }
    }

    /// 写入有符号整数 (二进制补码)
    pub fn write_bits_signed(&mut self, value: i32, n: u32) {
        let mask = ((1u64 << n) - 1) as u32;
        self.write_bits((value as u32) & mask, n);
    }

    /// 对齐到字节边界 (用 0 填充)
    pub fn align_to_byte(&mut self) {
        if self.bit_count > 0 {
            let pad = 8 - self.bit_count;
            self.current_byte <<= pad;
            self.data.push(self.current_byte);
            self.current_byte = 0;
            self.bit_count = 0;
        }
    }

    /// 完成写入, 返回字节数据
    ///
    /// 如果当前不在字节边界, 自动用 0 填充.
    pub fn finish(mut self) -> Vec<u8> {
        self.align_to_byte();
        self.data
    }

    /// 已完成的字节数据引用 (不包括正在填充的当前字节)
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// 覆盖已写入位置的字节 (回填用)
    ///
    /// 越界时返回 false, 不修改任何数据.
    pub fn patch(&mut self, offset: usize, bytes: &[u8]) -> bool {
        match self.data.get_mut(offset..offset + bytes.len()) {
            Some(dst) => {
                dst.copy_from_slice(bytes);
                true
            }
            None => false,
        }
    }

    /// 写入完整字节
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        if self.bit_count == 0 {
            self.data.extend_from_slice(bytes);
        } else {
            for &b in bytes {
                self.write_bits(u32::from(b), 8);
            }
        }
    }

    // ========================
    // 对齐后的多字节字段
    // ========================

    pub fn write_u8(&mut self, v: u8) {
        self.align_to_byte();
        self.data.push(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.align_to_byte();
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_s16(&mut self, v: i16) {
        self.align_to_byte();
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.align_to_byte();
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_bu16(&mut self, v: u16) {
        self.align_to_byte();
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_bu24(&mut self, v: u32) {
        self.align_to_byte();
        self.data.extend_from_slice(&v.to_be_bytes()[1..]);
    }

    pub fn write_bu32(&mut self, v: u32) {
        self.align_to_byte();
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_float(&mut self, v: f32) {
        self.write_u32(v.to_bits());
    }

    pub fn write_double(&mut self, v: f64) {
        self.align_to_byte();
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    /// 混合字节序双精度浮点: 高 32 位在前, 每半部分小端
    pub fn write_bdouble(&mut self, v: f64) {
        let bits = v.to_bits();
        self.write_u32((bits >> 32) as u32);
        self.write_u32(bits as u32);
    }

    /// 8.8 无符号定点数
    pub fn write_ufixed8(&mut self, v: f32) {
        self.write_u16((v * 256.0).round() as u16);
    }

    /// SWF 变长无符号整数
    pub fn write_encoded_u32(&mut self, mut v: u32) {
        self.align_to_byte();
        loop {
            let byte = (v & 0x7F) as u8;
            v >>= 7;
            if v == 0 {
                self.data.push(byte);
                break;
            }
            self.data.push(byte | 0x80);
        }
    }

    /// 写入以 NUL 结尾的字符串, `version < 6` 时按 Windows-1252 编码
    pub fn write_string(&mut self, s: &str, version: u8) {
        self.align_to_byte();
        if version >= 6 {
            self.data.extend_from_slice(s.as_bytes());
        } else {
            let (encoded, _, _) = WINDOWS_1252.encode(s);
            self.data.extend_from_slice(&encoded);
        }
        self.data.push(0);
    }

    // ========================
    // SWF 结构化记录
    // ========================

    pub fn write_rect(&mut self, rect: &Rect) {
        self.align_to_byte();
        let nbits = signed_bits_for(&[rect.x0, rect.x1, rect.y0, rect.y1]);
        self.write_bits(nbits, 5);
        for v in [rect.x0, rect.x1, rect.y0, rect.y1] {
            self.write_bits_signed(v, nbits);
        }
        self.align_to_byte();
    }

    pub fn write_matrix(&mut self, m: &Matrix) {
        self.align_to_byte();
        let fixed = |v: f64| (v * 65536.0).round() as i32;
        let has_scale = m.xx != 1.0 || m.yy != 1.0;
        self.write_bit(has_scale);
        if has_scale {
            let (sx, sy) = (fixed(m.xx), fixed(m.yy));
            let nbits = signed_bits_for(&[sx, sy]);
            self.write_bits(nbits, 5);
            self.write_bits_signed(sx, nbits);
            self.write_bits_signed(sy, nbits);
        }
        let has_rotate = m.yx != 0.0 || m.xy != 0.0;
        self.write_bit(has_rotate);
        if has_rotate {
            let (r0, r1) = (fixed(m.yx), fixed(m.xy));
            let nbits = signed_bits_for(&[r0, r1]);
            self.write_bits(nbits, 5);
            self.write_bits_signed(r0, nbits);
            self.write_bits_signed(r1, nbits);
        }
        let (tx, ty) = (m.x0.round() as i32, m.y0.round() as i32);
        let nbits = signed_bits_for(&[tx, ty]);
        self.write_bits(nbits, 5);
        self.write_bits_signed(tx, nbits);
        self.write_bits_signed(ty, nbits);
        self.align_to_byte();
    }

    pub fn write_color_transform(&mut self, cx: &ColorTransform, with_alpha: bool) {
        self.align_to_byte();
        let mut mult = vec![cx.ra, cx.ga, cx.ba];
        let mut add = vec![cx.rb, cx.gb, cx.bb];
        if with_alpha {
            mult.push(cx.aa);
            add.push(cx.ab);
        }
        let has_mult = mult.iter().any(|&v| v != 256);
        let has_add = add.iter().any(|&v| v != 0);
        let mut values = Vec::new();
        if has_mult {
            values.extend(mult.iter().map(|&v| i32::from(v)));
        }
        if has_add {
            values.extend(add.iter().map(|&v| i32::from(v)));
        }
        let nbits = signed_bits_for(&values);
        self.write_bit(has_add);
        self.write_bit(has_mult);
        self.write_bits(nbits, 4);
        for v in values {
            self.write_bits_signed(v, nbits);
        }
        self.align_to_byte();
    }

    pub fn write_color_rgb(&mut self, c: Color) {
        self.write_bytes_aligned(&[c.r, c.g, c.b]);
    }

    pub fn write_color_rgba(&mut self, c: Color) {
        self.write_bytes_aligned(&[c.r, c.g, c.b, c.a]);
    }

    fn write_bytes_aligned(&mut self, bytes: &[u8]) {
        self.align_to_byte();
        self.data.extend_from_slice(bytes);
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// 容纳一组有符号值所需的最小位宽; 全为 0 时返回 0
pub fn signed_bits_for(values: &[i32]) -> u32 {
    values
        .iter()
        .filter(|&&v| v != 0)
        .map(|&v| {
            let magnitude = if v < 0 { !v } else { v };
            32 - magnitude.leading_zeros() + 1
        })
        .max()
        .unwrap_or(0)
}

/// 容纳一个无符号值所需的最小位宽
pub fn unsigned_bits_for(value: u32) -> u32 {
    32 - value.leading_zeros()
}
