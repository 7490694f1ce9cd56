//! 有理数, 用于像素宽高比 (SAR).

use std::fmt;

/// 有理数 `num/den`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    /// 分子
    pub num: i32,
    /// 分母
    pub den: i32,
}

impl Rational {
    /// 创建有理数
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// 转换为浮点数; 分母为 0 时返回 NaN
    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            return f64::NAN;
        }
        f64::from(self.num) / f64::from(self.den)
    }

    /// 以本值为像素宽高比时, `width`x`height` 图像的显示宽高比 (已约分)
    ///
    /// 任一量为 0 或为负时返回 None.
    pub fn display_aspect(self, width: u32, height: u32) -> Option<Self> {
        if self.num <= 0 || self.den <= 0 || width == 0 || height == 0 {
            return None;
        }
        let w = u64::from(width) * self.num as u64;
        let h = u64::from(height) * self.den as u64;
        let g = gcd(w, h);
        let (w, h) = (w / g, h / g);
        Some(Self::new(i32::try_from(w).ok()?, i32::try_from(h).ok()?))
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.num, self.den)
    }
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 { a } else { gcd(b, a % b) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_aspect() {
        // 720x576 PAL 宽屏, SAR 64:45
        let dar = Rational::new(64, 45).display_aspect(720, 576);
        assert_eq!(dar, Some(Rational::new(16, 9)));
        assert_eq!(Rational::new(1, 1).display_aspect(320, 240), Some(Rational::new(4, 3)));
        assert_eq!(Rational::new(0, 1).display_aspect(320, 240), None);
        assert_eq!(Rational::new(1, 1).display_aspect(0, 240), None);
    }

    #[test]
    fn test_to_f64_and_display() {
        let sar = Rational::new(12, 11);
        assert!((sar.to_f64() - 12.0 / 11.0).abs() < f64::EPSILON);
        assert!(Rational::new(1, 0).to_f64().is_nan());
        assert_eq!(sar.to_string(), "12:11");
    }
}
