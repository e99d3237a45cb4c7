//! SWF 几何与颜色类型.
//!
//! SWF 中所有距离都以 twips (1/20 像素) 表示. 本模块提供矩形、
//! 2x3 仿射矩阵、颜色与颜色变换, 供标签解析器和渲染端共享.

/// 每像素的 twips 数
pub const TWIPS_PER_PIXEL: i32 = 20;

/// 轴对齐矩形 (单位: twips)
///
/// 字段顺序与 SWF 的 RECT 记录一致: xmin, xmax, ymin, ymax.
/// 宽或高不为正的矩形视为空矩形, 在并集运算中被忽略.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x0: i32,
    pub x1: i32,
    pub y0: i32,
    pub y1: i32,
}

impl Rect {
    /// 空矩形
    pub const EMPTY: Rect = Rect {
        x0: 0,
        x1: 0,
        y0: 0,
        y1: 0,
    };

    pub const fn new(x0: i32, x1: i32, y0: i32, y1: i32) -> Self {
        Self { x0, x1, y0, y1 }
    }

    /// 由像素尺寸构造以原点为左上角的矩形
    pub const fn from_pixels(width: u32, height: u32) -> Self {
        Self {
            x0: 0,
            x1: width as i32 * TWIPS_PER_PIXEL,
            y0: 0,
            y1: height as i32 * TWIPS_PER_PIXEL,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }

    pub fn width(&self) -> i32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> i32 {
        self.y1 - self.y0
    }

    /// 两个矩形的并集 (min/max 累加, 与顺序无关)
    pub fn union(&self, other: &Rect) -> Rect {
        if other.is_empty() {
            return *self;
        }
        if self.is_empty() {
            return *other;
        }
        Rect {
            x0: self.x0.min(other.x0),
            x1: self.x1.max(other.x1),
            y0: self.y0.min(other.y0),
            y1: self.y1.max(other.y1),
        }
    }

    /// 经矩阵变换后的包围盒
    ///
    /// 变换四个角点后取 min/max, 结果向外取整到整 twips.
    pub fn transform(&self, matrix: &Matrix) -> Rect {
        if self.is_empty() {
            return Rect::EMPTY;
        }
        let corners = [
            matrix.transform_point(f64::from(self.x0), f64::from(self.y0)),
            matrix.transform_point(f64::from(self.x1), f64::from(self.y0)),
            matrix.transform_point(f64::from(self.x0), f64::from(self.y1)),
            matrix.transform_point(f64::from(self.x1), f64::from(self.y1)),
        ];
        let mut x0 = f64::MAX;
        let mut x1 = f64::MIN;
        let mut y0 = f64::MAX;
        let mut y1 = f64::MIN;
        for (x, y) in corners {
            x0 = x0.min(x);
            x1 = x1.max(x);
            y0 = y0.min(y);
            y1 = y1.max(y);
        }
        Rect {
            x0: x0.floor() as i32,
            x1: x1.ceil() as i32,
            y0: y0.floor() as i32,
            y1: y1.ceil() as i32,
        }
    }
}

/// 2x3 仿射变换矩阵
///
/// ```text
/// x' = xx * x + xy * y + x0
/// y' = yx * x + yy * y + y0
/// ```
/// 平移分量单位为 twips.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub xx: f64,
    pub yx: f64,
    pub xy: f64,
    pub yy: f64,
    pub x0: f64,
    pub y0: f64,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        xx: 1.0,
        yx: 0.0,
        xy: 0.0,
        yy: 1.0,
        x0: 0.0,
        y0: 0.0,
    };

    pub fn translate(x: f64, y: f64) -> Self {
        Self {
            x0: x,
            y0: y,
            ..Self::IDENTITY
        }
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self {
            xx: sx,
            yy: sy,
            ..Self::IDENTITY
        }
    }

    pub fn transform_point(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.xx * x + self.xy * y + self.x0,
            self.yx * x + self.yy * y + self.y0,
        )
    }

    /// 矩阵乘法: 先应用 `self`, 再应用 `other`
    pub fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            xx: other.xx * self.xx + other.xy * self.yx,
            yx: other.yx * self.xx + other.yy * self.yx,
            xy: other.xx * self.xy + other.xy * self.yy,
            yy: other.yx * self.xy + other.yy * self.yy,
            x0: other.xx * self.x0 + other.xy * self.y0 + other.x0,
            y0: other.yx * self.x0 + other.yy * self.y0 + other.y0,
        }
    }

    /// 逆矩阵, 奇异矩阵返回 None
    pub fn inverse(&self) -> Option<Matrix> {
        let det = self.xx * self.yy - self.xy * self.yx;
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let xx = self.yy / det;
        let xy = -self.xy / det;
        let yx = -self.yx / det;
        let yy = self.xx / det;
        Some(Matrix {
            xx,
            yx,
            xy,
            yy,
            x0: -(xx * self.x0 + xy * self.y0),
            y0: -(yx * self.x0 + yy * self.y0),
        })
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// RGBA 颜色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(0xFF, 0xFF, 0xFF);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xFF }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// 打包为 0xAARRGGBB
    pub const fn to_argb(self) -> u32 {
        ((self.a as u32) << 24) | ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }
}

/// 颜色变换
///
/// 乘数为 8.8 定点数 (256 表示 1.0), 加数直接加到 0-255 的通道值上.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorTransform {
    pub ra: i16,
    pub rb: i16,
    pub ga: i16,
    pub gb: i16,
    pub ba: i16,
    pub bb: i16,
    pub aa: i16,
    pub ab: i16,
}

impl ColorTransform {
    pub const IDENTITY: ColorTransform = ColorTransform {
        ra: 256,
        rb: 0,
        ga: 256,
        gb: 0,
        ba: 256,
        bb: 0,
        aa: 256,
        ab: 0,
    };

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// 应用到颜色上, 结果钳位到 0-255
    pub fn apply(&self, color: Color) -> Color {
        fn channel(value: u8, mult: i16, add: i16) -> u8 {
            let v = (i32::from(value) * i32::from(mult)) / 256 + i32::from(add);
            v.clamp(0, 255) as u8
        }
        Color {
            r: channel(color.r, self.ra, self.rb),
            g: channel(color.g, self.ga, self.gb),
            b: channel(color.b, self.ba, self.bb),
            a: channel(color.a, self.aa, self.ab),
        }
    }
}

impl Default for ColorTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_union_ignores_empty() {
        let a = Rect::new(0, 100, 0, 50);
        let b = Rect::new(-20, 40, 10, 80);
        assert_eq!(a.union(&b), Rect::new(-20, 100, 0, 80));
        assert_eq!(a.union(&Rect::EMPTY), a);
        assert_eq!(Rect::EMPTY.union(&b), b);
    }

    #[test]
    fn test_rect_union_order_independent() {
        let rects = [
            Rect::new(0, 10, 0, 10),
            Rect::new(5, 30, -5, 2),
            Rect::new(-7, -1, 20, 40),
        ];
        let forward = rects.iter().fold(Rect::EMPTY, |acc, r| acc.union(r));
        let backward = rects.iter().rev().fold(Rect::EMPTY, |acc, r| acc.union(r));
        assert_eq!(forward, backward);
        assert_eq!(forward, Rect::new(-7, 30, -5, 40));
    }

    #[test]
    fn test_rect_transform_translate_scale() {
        let r = Rect::new(0, 200, 0, 100);
        let m = Matrix::scale(2.0, 0.5).then(&Matrix::translate(20.0, 40.0));
        assert_eq!(r.transform(&m), Rect::new(20, 420, 40, 90));
    }

    #[test]
    fn test_matrix_inverse() {
        let m = Matrix {
            xx: 2.0,
            yx: 0.5,
            xy: -1.0,
            yy: 3.0,
            x0: 100.0,
            y0: -40.0,
        };
        let inv = m.inverse().unwrap();
        let (x, y) = m.transform_point(13.0, -7.0);
        let (bx, by) = inv.transform_point(x, y);
        assert!((bx - 13.0).abs() < 1e-9);
        assert!((by + 7.0).abs() < 1e-9);
        assert!(Matrix::scale(0.0, 1.0).inverse().is_none());
    }

    #[test]
    fn test_color_transform_apply() {
        let cx = ColorTransform {
            ra: 128,
            rb: 10,
            aa: 256,
            ab: -300,
            ..ColorTransform::IDENTITY
        };
        let c = cx.apply(Color::rgba(200, 100, 50, 255));
        assert_eq!(c, Color::rgba(110, 100, 50, 0));
        assert_eq!(ColorTransform::IDENTITY.apply(Color::WHITE), Color::WHITE);
    }
}
