//! SWF/FLV 比特流读取器.
//!
//! 提供从共享字节缓冲区中按位、按字节读取数据的能力, 是 SWF 标签解析、
//! FLV 解析和 ADPCM 解码的基础设施.
//!
//! 位级字段按大端位序读取 (MSB first), 与 SWF 的位打包方式一致.
//! 对齐后的多字节字段: SWF 为小端 (`read_u16` 等), FLV 为大端 (`read_bu16` 等).
//! 所有多字节读取都会先丢弃当前未读完的部分字节.
//!
//! 读取越界永远不会 panic, 而是返回 [`YingError::NeedMoreData`], 且游标保持不动.

use std::io::Read;

use bytes::Bytes;
use encoding_rs::WINDOWS_1252;
use flate2::read::ZlibDecoder;
use log::warn;

use crate::geometry::{Color, ColorTransform, Matrix, Rect};
use crate::{YingError, YingResult};

/// 比特流读取器
///
/// 持有一个 [`Bytes`] 视图, 子区间 ([`BitReader::split`]) 与父读取器共享同一块底层内存.
///
/// # 示例
/// ```
/// use ying_core::bitreader::BitReader;
///
/// let mut br = BitReader::from_slice(&[0b1011_0001, 0x34, 0x12]);
/// assert_eq!(br.read_bits(4).unwrap(), 0b1011);
/// // 多字节读取先对齐到字节边界
/// assert_eq!(br.read_u16().unwrap(), 0x1234);
/// ```
#[derive(Debug, Clone)]
pub struct BitReader {
    /// 源数据 (仅本读取器可见的区间)
    data: Bytes,
    /// 当前字节索引
    ptr: usize,
    /// 当前字节中的位位置 (0-7, 0 表示最高位)
    idx: u8,
}

impl BitReader {
    /// 创建新的比特流读取器
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            ptr: 0,
            idx: 0,
        }
    }

    /// 从切片复制数据创建读取器
    pub fn from_slice(data: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(data))
    }

    /// 剩余可读位数
    pub fn bits_left(&self) -> usize {
        if self.ptr >= self.data.len() {
            return 0;
        }
        (self.data.len() - self.ptr) * 8 - self.idx as usize
    }

    /// 剩余完整字节数 (不计当前未读完的部分字节)
    pub fn bytes_left(&self) -> usize {
        let ptr = if self.idx == 0 { self.ptr } else { self.ptr + 1 };
        self.data.len().saturating_sub(ptr)
    }

    /// 当前字节位置 (相对于本读取器的起点)
    pub fn position(&self) -> usize {
        self.ptr
    }

    /// 区间总长度
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 是否已到达末尾
    pub fn is_eof(&self) -> bool {
        self.bits_left() == 0
    }

    /// 当前是否处于字节边界
    pub fn is_aligned(&self) -> bool {
        self.idx == 0
    }

    /// 对齐到下一个字节边界, 丢弃当前字节剩余的位
    pub fn align_to_byte(&mut self) {
        if self.idx != 0 {
            self.idx = 0;
            self.ptr += 1;
        }
    }

    /// 从当前 (对齐后) 位置到区间末尾的只读切片, 不移动游标
    pub fn remaining_slice(&self) -> &[u8] {
        let ptr = if self.idx == 0 { self.ptr } else { self.ptr + 1 };
        self.data.get(ptr..).unwrap_or(&[])
    }

    /// 对齐后至少还有 `n` 字节时才对齐, 否则游标保持不动
    fn check_bytes(&mut self, n: usize) -> YingResult<()> {
        let ptr = if self.idx == 0 { self.ptr } else { self.ptr + 1 };
        if ptr + n > self.data.len() {
            return Err(YingError::NeedMoreData);
        }
        self.align_to_byte();
        Ok(())
    }

    fn take_array<const N: usize>(&mut self) -> YingResult<[u8; N]> {
        self.check_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.ptr..self.ptr + N]);
        self.ptr += N;
        Ok(out)
    }

    // ========================
    // 位级读取
    // ========================

    /// 读取 1 个位
    pub fn read_bit(&mut self) -> YingResult<bool> {
        if self.ptr >= self.data.len() {
            return Err(YingError::NeedMoreData);
        }
        let bit = (self.data[self.ptr] >> (7 - self.idx)) & 1;
        self.idx += 1;
        if self.idx >= 8 {
            self.idx = 0;
            self.ptr += 1;
        }
        Ok(bit != 0)
    }

    /// 读取 N 个位 (0 到 32 位)
    ///
    /// 按大端位序读取, 返回值的低 N 位有效. 位置在多次调用之间保留,
    /// 直到调用 [`BitReader::align_to_byte`] 或任意字节读取.
    pub fn read_bits(&mut self, n: u32) -> YingResult<u32> {
        if n == 0 {
            return Ok(0);
        }
        if n > 32 {
            return Err(YingError::InvalidArgument(format!(
                "read_bits: n={} 超过 32 位",
                n,
            )));
        }
        if (n as usize) > self.bits_left() {
            return Err(YingError::NeedMoreData);
        }

        let mut result: u64 = 0;
        let mut remaining = n;
        while remaining > 0 {
            let available = 8 - u32::from(self.idx);
            let to_read = remaining.min(available);

            // 从当前字节中提取位
            let shift = available - to_read;
            let mask = ((1u32 << to_read) - 1) as u8;
            let bits = (self.data[self.ptr] >> shift) & mask;
            result = (result << to_read) | u64::from(bits);

            self.idx += to_read as u8;
            if self.idx >= 8 {
                self.idx = 0;
                self.ptr += 1;
            }
            remaining -= to_read;
        }
        Ok(result as u32)
    }

    /// 读取有符号整数 (二进制补码, 对第 n-1 位做符号扩展)
    pub fn read_bits_signed(&mut self, n: u32) -> YingResult<i32> {
        let val = self.read_bits(n)?;
        if n == 0 {
            return Ok(0);
        }
        if n >= 32 {
            return Ok(val as i32);
        }
        if (val >> (n - 1)) & 1 != 0 {
            Ok(val as i32 | !((1i32 << n) - 1))
        } else {
            Ok(val as i32)
        }
    }

    /// 跳过 N 个位
    pub fn skip_bits(&mut self, n: usize) -> YingResult<()> {
        if n > self.bits_left() {
            return Err(YingError::NeedMoreData);
        }
        let total = usize::from(self.idx) + n;
        self.ptr += total / 8;
        self.idx = (total % 8) as u8;
        Ok(())
    }

    // ========================
    // 字节级读取 (先对齐)
    // ========================

    pub fn read_u8(&mut self) -> YingResult<u8> {
        Ok(self.take_array::<1>()?[0])
    }

    /// 小端 u16 (SWF)
    pub fn read_u16(&mut self) -> YingResult<u16> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    /// 小端 i16 (SWF)
    pub fn read_s16(&mut self) -> YingResult<i16> {
        Ok(i16::from_le_bytes(self.take_array()?))
    }

    /// 小端 u32 (SWF)
    pub fn read_u32(&mut self) -> YingResult<u32> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    /// 大端 u16 (FLV)
    pub fn read_bu16(&mut self) -> YingResult<u16> {
        Ok(u16::from_be_bytes(self.take_array()?))
    }

    /// 大端 24 位无符号整数 (FLV)
    pub fn read_bu24(&mut self) -> YingResult<u32> {
        let b: [u8; 3] = self.take_array()?;
        Ok((u32::from(b[0]) << 16) | (u32::from(b[1]) << 8) | u32::from(b[2]))
    }

    /// 大端 u32 (FLV)
    pub fn read_bu32(&mut self) -> YingResult<u32> {
        Ok(u32::from_be_bytes(self.take_array()?))
    }

    /// IEEE 单精度浮点 (小端)
    pub fn read_float(&mut self) -> YingResult<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// IEEE 双精度浮点 (小端)
    pub fn read_double(&mut self) -> YingResult<f64> {
        Ok(f64::from_le_bytes(self.take_array()?))
    }

    /// 混合字节序双精度浮点
    ///
    /// 高 32 位在前, 每半部分内部为小端. ActionScript 的 Push 常量使用此布局.
    pub fn read_bdouble(&mut self) -> YingResult<f64> {
        let b: [u8; 8] = self.take_array()?;
        let hi = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
        let lo = u32::from_le_bytes([b[4], b[5], b[6], b[7]]);
        Ok(f64::from_bits((u64::from(hi) << 32) | u64::from(lo)))
    }

    /// 8.8 有符号定点数
    pub fn read_fixed8(&mut self) -> YingResult<f32> {
        Ok(f32::from(self.read_s16()?) / 256.0)
    }

    /// 8.8 无符号定点数 (SWF 头部帧率)
    pub fn read_ufixed8(&mut self) -> YingResult<f32> {
        Ok(f32::from(self.read_u16()?) / 256.0)
    }

    /// 16.16 有符号定点数
    pub fn read_fixed16(&mut self) -> YingResult<f64> {
        Ok(f64::from(self.read_u32()? as i32) / 65536.0)
    }

    /// SWF 变长无符号整数 (每字节 7 位, 低位在前, 最多 5 字节)
    pub fn read_encoded_u32(&mut self) -> YingResult<u32> {
        let start = (self.ptr, self.idx);
        let mut result: u32 = 0;
        for i in 0..5 {
            let byte = match self.read_u8() {
                Ok(b) => b,
                Err(e) => {
                    (self.ptr, self.idx) = start;
                    return Err(e);
                }
            };
            result |= u32::from(byte & 0x7F) << (7 * i);
            if byte & 0x80 == 0 {
                break;
            }
        }
        Ok(result)
    }

    // ========================
    // 字符串与缓冲区
    // ========================

    /// 读取以 NUL 结尾的字符串
    ///
    /// `version >= 6` 按 UTF-8 解码 (非法序列替换并告警), 更低版本按 Windows-1252 解码.
    pub fn read_string(&mut self, version: u8) -> YingResult<String> {
        let rest = self.remaining_slice();
        let Some(len) = rest.iter().position(|&b| b == 0) else {
            return Err(YingError::Malformed("字符串缺少结尾 NUL".into()));
        };
        let s = decode_string(&rest[..len], version);
        self.align_to_byte();
        self.ptr += len + 1;
        Ok(s)
    }

    /// 读取恰好 `len` 字节的共享子缓冲区 (零拷贝)
    pub fn read_buffer(&mut self, len: usize) -> YingResult<Bytes> {
        self.check_bytes(len)?;
        let buf = self.data.slice(self.ptr..self.ptr + len);
        self.ptr += len;
        Ok(buf)
    }

    /// 读取区间剩余的全部字节 (零拷贝)
    pub fn read_remaining(&mut self) -> Bytes {
        self.align_to_byte();
        let start = self.ptr.min(self.data.len());
        self.ptr = self.data.len();
        self.data.slice(start..)
    }

    /// 跳过 `len` 字节
    pub fn skip_bytes(&mut self, len: usize) -> YingResult<()> {
        self.check_bytes(len)?;
        self.ptr += len;
        Ok(())
    }

    /// 切出接下来 `len` 字节作为独立读取器, 与本读取器共享底层内存
    pub fn split(&mut self, len: usize) -> YingResult<BitReader> {
        Ok(BitReader::new(self.read_buffer(len)?))
    }

    /// 对接下来的数据做 zlib 解压
    ///
    /// - `compressed_len`: 压缩数据长度, `None` 表示到区间末尾
    /// - `expected_len`: 解压后长度, `None` 表示未知 (按需增长)
    ///
    /// 解压失败或输出短于预期长度时返回 [`YingError::Inflate`], 不返回部分数据.
    pub fn decompress(
        &mut self,
        compressed_len: Option<usize>,
        expected_len: Option<usize>,
    ) -> YingResult<Bytes> {
        let input = match compressed_len {
            Some(len) => self.read_buffer(len)?,
            None => self.read_remaining(),
        };
        inflate(&input, expected_len)
    }

    // ========================
    // SWF 结构化记录
    // ========================

    /// 读取 RECT 记录 (5 位宽度前缀 + 4 个有符号字段), 读完后对齐
    pub fn read_rect(&mut self) -> YingResult<Rect> {
        self.align_to_byte();
        let nbits = self.read_bits(5)?;
        let x0 = self.read_bits_signed(nbits)?;
        let x1 = self.read_bits_signed(nbits)?;
        let y0 = self.read_bits_signed(nbits)?;
        let y1 = self.read_bits_signed(nbits)?;
        self.align_to_byte();
        Ok(Rect { x0, x1, y0, y1 })
    }

    /// 读取 MATRIX 记录, 读完后对齐
    ///
    /// 缩放与旋转为 16.16 定点数, 平移为 twips.
    pub fn read_matrix(&mut self) -> YingResult<Matrix> {
        self.align_to_byte();
        let mut m = Matrix::IDENTITY;
        if self.read_bit()? {
            let nbits = self.read_bits(5)?;
            m.xx = f64::from(self.read_bits_signed(nbits)?) / 65536.0;
            m.yy = f64::from(self.read_bits_signed(nbits)?) / 65536.0;
        }
        if self.read_bit()? {
            let nbits = self.read_bits(5)?;
            m.yx = f64::from(self.read_bits_signed(nbits)?) / 65536.0;
            m.xy = f64::from(self.read_bits_signed(nbits)?) / 65536.0;
        }
        let nbits = self.read_bits(5)?;
        m.x0 = f64::from(self.read_bits_signed(nbits)?);
        m.y0 = f64::from(self.read_bits_signed(nbits)?);
        self.align_to_byte();
        Ok(m)
    }

    /// 读取 CXFORM (`with_alpha = false`) 或 CXFORMWITHALPHA 记录, 读完后对齐
    pub fn read_color_transform(&mut self, with_alpha: bool) -> YingResult<ColorTransform> {
        self.align_to_byte();
        let has_add = self.read_bit()?;
        let has_mult = self.read_bit()?;
        let nbits = self.read_bits(4)?;
        let mut cx = ColorTransform::IDENTITY;
        if has_mult {
            cx.ra = self.read_bits_signed(nbits)? as i16;
            cx.ga = self.read_bits_signed(nbits)? as i16;
            cx.ba = self.read_bits_signed(nbits)? as i16;
            if with_alpha {
                cx.aa = self.read_bits_signed(nbits)? as i16;
            }
        }
        if has_add {
            cx.rb = self.read_bits_signed(nbits)? as i16;
            cx.gb = self.read_bits_signed(nbits)? as i16;
            cx.bb = self.read_bits_signed(nbits)? as i16;
            if with_alpha {
                cx.ab = self.read_bits_signed(nbits)? as i16;
            }
        }
        self.align_to_byte();
        Ok(cx)
    }

    /// RGB 颜色 (alpha = 255)
    pub fn read_color_rgb(&mut self) -> YingResult<Color> {
        let [r, g, b] = self.take_array()?;
        Ok(Color::rgb(r, g, b))
    }

    /// RGBA 颜色
    pub fn read_color_rgba(&mut self) -> YingResult<Color> {
        let [r, g, b, a] = self.take_array()?;
        Ok(Color::rgba(r, g, b, a))
    }

    /// ARGB 颜色 (DefineBitsLossless2 的像素顺序)
    pub fn read_color_argb(&mut self) -> YingResult<Color> {
        let [a, r, g, b] = self.take_array()?;
        Ok(Color::rgba(r, g, b, a))
    }
}

/// 按 SWF 版本解码字符串字节
pub fn decode_string(raw: &[u8], version: u8) -> String {
    if version >= 6 {
        match std::str::from_utf8(raw) {
            Ok(s) => s.to_owned(),
            Err(_) => {
                warn!("字符串不是合法 UTF-8, 已替换非法序列");
                String::from_utf8_lossy(raw).into_owned()
            }
        }
    } else {
        let (s, _) = WINDOWS_1252.decode_without_bom_handling(raw);
        s.into_owned()
    }
}

/// zlib 解压整块数据
///
/// `expected_len` 已知时输出恰好截断到该长度; 实际输出更短则视为失败.
pub fn inflate(input: &[u8], expected_len: Option<usize>) -> YingResult<Bytes> {
    let decoder = ZlibDecoder::new(input);
    // 期望长度来自未校验的头部, 初始容量不超过输入的若干倍
    let hint = input.len().saturating_mul(4);
    let mut out = Vec::with_capacity(expected_len.map_or(hint, |len| len.min(hint)));
    let result = match expected_len {
        Some(len) => decoder.take(len as u64).read_to_end(&mut out),
        None => {
            let mut decoder = decoder;
            decoder.read_to_end(&mut out)
        }
    };
    if let Err(e) = result {
        return Err(YingError::Inflate(e.to_string()));
    }
    if let Some(len) = expected_len {
        if out.len() != len {
            return Err(YingError::Inflate(format!(
                "解压长度不足: 期望 {} 字节, 实际 {} 字节",
                len,
                out.len(),
            )));
        }
    }
    Ok(Bytes::from(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitwriter::BitWriter;

    #[test]
    fn test_read_bits_basic() {
        let mut br = BitReader::from_slice(&[0b1011_0001, 0b0101_0101]);
        assert_eq!(br.read_bits(4).unwrap(), 0b1011);
        assert_eq!(br.read_bits(4).unwrap(), 0b0001);
        assert_eq!(br.read_bits(8).unwrap(), 0b0101_0101);
        assert!(br.is_eof());
    }

    #[test]
    fn test_bit_round_trip_all_widths() {
        // 确定性伪随机: 每个宽度写入若干随机值再读回
        let mut seed: u32 = 0x1234_5678;
        let mut next = || {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            seed
        };
        let mut values = Vec::new();
        let mut bw = BitWriter::new();
        for _ in 0..8 {
            for n in 0..=32u32 {
                let v = if n == 32 {
                    next()
                } else {
                    next() & ((1u32 << n) - 1)
                };
                bw.write_bits(v, n);
                values.push((v, n));
            }
        }
        let mut br = BitReader::new(Bytes::from(bw.finish()));
        for (v, n) in values {
            assert_eq!(br.read_bits(n).unwrap(), v, "宽度 {} 往返失败", n);
        }
    }

    #[test]
    fn test_read_bits_signed() {
        let mut br = BitReader::from_slice(&[0b1110_0111]);
        assert_eq!(br.read_bits_signed(3).unwrap(), -1);
        assert_eq!(br.read_bits_signed(5).unwrap(), 7);
    }

    #[test]
    fn test_over_wide_request_rejected() {
        let mut br = BitReader::from_slice(&[0xFF; 8]);
        assert!(matches!(
            br.read_bits(33),
            Err(YingError::InvalidArgument(_))
        ));
        assert_eq!(br.bits_left(), 64);
    }

    #[test]
    fn test_underflow_does_not_advance() {
        let mut br = BitReader::from_slice(&[0x01, 0x02, 0x03]);
        br.read_bits(3).unwrap();
        assert!(br.read_u32().unwrap_err().is_need_more_data());
        assert!(br.read_buffer(3).unwrap_err().is_need_more_data());
        // 位位置也不变, 还能接着读完第一个字节
        assert_eq!(br.position(), 0);
        assert_eq!(br.bits_left(), 21);
        assert_eq!(br.read_bits(5).unwrap(), 0b00001);
        assert_eq!(br.read_u16().unwrap(), 0x0302);
        assert!(br.read_bit().unwrap_err().is_need_more_data());
    }

    #[test]
    fn test_endianness() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x01, 0x02, 0x03, 0x04];
        let mut br = BitReader::from_slice(&data);
        assert_eq!(br.read_u32().unwrap(), 0x0403_0201);
        assert_eq!(br.read_bu32().unwrap(), 0x0102_0304);
        let mut br = BitReader::from_slice(&data);
        assert_eq!(br.read_bu24().unwrap(), 0x01_0203);
        assert_eq!(br.read_bu16().unwrap(), 0x0401);
    }

    #[test]
    fn test_doubles() {
        let v = 3.141_592_653_589_793_f64;
        let bits = v.to_bits();
        let mut data = Vec::new();
        data.extend_from_slice(&v.to_le_bytes());
        data.extend_from_slice(&((bits >> 32) as u32).to_le_bytes());
        data.extend_from_slice(&(bits as u32).to_le_bytes());
        let mut br = BitReader::from_slice(&data);
        assert_eq!(br.read_double().unwrap().to_bits(), bits);
        assert_eq!(br.read_bdouble().unwrap().to_bits(), bits);
    }

    #[test]
    fn test_fixed_point() {
        let mut br = BitReader::from_slice(&[0x80, 0x18, 0x00, 0x80, 0xFF, 0xFF]);
        assert_eq!(br.read_ufixed8().unwrap(), 24.5);
        assert_eq!(br.read_fixed16().unwrap(), -0.5);
    }

    #[test]
    fn test_encoded_u32() {
        let mut br = BitReader::from_slice(&[0x7F, 0xE5, 0x8E, 0x26, 0x80]);
        assert_eq!(br.read_encoded_u32().unwrap(), 0x7F);
        assert_eq!(br.read_encoded_u32().unwrap(), 624_485);
        // 最后一个字节声明还有后续, 但数据不足
        assert!(br.read_encoded_u32().unwrap_err().is_need_more_data());
        assert_eq!(br.position(), 4);
    }

    #[test]
    fn test_string_versions() {
        let mut br = BitReader::from_slice(b"caf\xe9\0caf\xc3\xa9\0x");
        assert_eq!(br.read_string(5).unwrap(), "café");
        assert_eq!(br.read_string(6).unwrap(), "café");
        assert!(matches!(br.read_string(6), Err(YingError::Malformed(_))));
    }

    #[test]
    fn test_rect_matrix_cxform() {
        let rect = Rect::new(-200, 11000, 0, 8000);
        let matrix = Matrix {
            xx: 1.5,
            yx: 0.25,
            xy: -0.25,
            yy: 2.0,
            x0: 100.0,
            y0: -60.0,
        };
        let cx = ColorTransform {
            ra: 128,
            ab: -16,
            ..ColorTransform::IDENTITY
        };
        let mut bw = BitWriter::new();
        bw.write_rect(&rect);
        bw.write_matrix(&matrix);
        bw.write_color_transform(&cx, true);
        bw.write_color_transform(&ColorTransform::IDENTITY, false);
        let mut br = BitReader::new(Bytes::from(bw.finish()));
        assert_eq!(br.read_rect().unwrap(), rect);
        assert_eq!(br.read_matrix().unwrap(), matrix);
        assert_eq!(br.read_color_transform(true).unwrap(), cx);
        assert_eq!(
            br.read_color_transform(false).unwrap(),
            ColorTransform::IDENTITY
        );
        assert!(br.is_eof());
    }

    #[test]
    fn test_split_shares_backing() {
        let data = Bytes::from_static(&[1, 2, 3, 4, 5, 6]);
        let mut br = BitReader::new(data.clone());
        br.read_u8().unwrap();
        let mut sub = br.split(3).unwrap();
        assert_eq!(sub.len(), 3);
        assert_eq!(sub.read_u8().unwrap(), 2);
        assert_eq!(sub.read_buffer(2).unwrap().as_ptr(), data[2..].as_ptr());
        assert!(sub.read_u8().unwrap_err().is_need_more_data());
        assert_eq!(br.read_u8().unwrap(), 5);
        assert!(br.split(5).is_err());
    }

    #[test]
    fn test_decompress() {
        use flate2::Compression;
        use flate2::write::ZlibEncoder;
        use std::io::Write;

        let payload: Vec<u8> = (0..200u32).map(|i| (i * 7) as u8).collect();
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(&payload).unwrap();
        let compressed = enc.finish().unwrap();

        let mut data = compressed.clone();
        data.push(0xAB);
        let mut br = BitReader::from_slice(&data);
        let out = br
            .decompress(Some(compressed.len()), Some(payload.len()))
            .unwrap();
        assert_eq!(&out[..], &payload[..]);
        assert_eq!(br.read_u8().unwrap(), 0xAB);

        let mut br = BitReader::from_slice(&compressed);
        assert_eq!(&br.decompress(None, None).unwrap()[..], &payload[..]);

        let mut br = BitReader::from_slice(&compressed);
        assert!(matches!(
            br.decompress(None, Some(payload.len() + 1)),
            Err(YingError::Inflate(_))
        ));

        let mut br = BitReader::from_slice(&[0x78, 0x9C, 0xFF, 0xFF, 0xFF]);
        assert!(br.decompress(None, Some(10)).is_err());
    }

    #[test]
    fn test_decompress_huge_expected_len_fails_cleanly() {
        use flate2::Compression;
        use flate2::write::ZlibEncoder;
        use std::io::Write;

        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"abc").unwrap();
        let compressed = enc.finish().unwrap();
        let mut br = BitReader::from_slice(&compressed);
        assert!(matches!(
            br.decompress(None, Some(usize::MAX / 2)),
            Err(YingError::Inflate(_))
        ));
    }
}
