//! RGBA colors, their arithmetic and textual forms.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Hue/saturation/lightness with alpha. `h` in degrees, the rest in `0..=1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsl {
    pub h: f64,
    pub s: f64,
    pub l: f64,
    pub a: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsv {
    pub h: f64,
    pub s: f64,
    pub v: f64,
    pub a: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Color {
    /// Channels in `0..=255`, unclamped until output.
    pub rgb: [f64; 3],
    pub alpha: f64,
    /// Authored form (`#fff`, `red`, or the producing function name),
    /// kept so untouched colors print the way they were written.
    pub value: Option<String>,
}

impl Color {
    pub fn new(rgb: [f64; 3], alpha: f64) -> Self {
        Self {
            rgb,
            alpha,
            value: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Parses 3, 4, 6 or 8 hex digits (no leading `#`).
    pub fn from_hex(hex: &str) -> Option<Self> {
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let digits: Vec<u8> = match hex.len() {
            3 | 4 => hex
                .chars()
                .map(|c| u8::from_str_radix(&format!("{c}{c}"), 16).ok())
                .collect::<Option<_>>()?,
            6 | 8 => (0..hex.len())
                .step_by(2)
                .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
                .collect::<Option<_>>()?,
            _ => return None,
        };
        let alpha = digits.get(3).map_or(1.0, |a| f64::from(*a) / 255.0);
        Some(Self::new(
            [
                f64::from(digits[0]),
                f64::from(digits[1]),
                f64::from(digits[2]),
            ],
            alpha,
        ))
    }

    /// Named color lookup, case-insensitive; `transparent` is black at alpha 0.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        let key = keyword.to_ascii_lowercase();
        if key == "transparent" {
            return Some(Self::new([0.0; 3], 0.0).with_value(keyword));
        }
        let hex = NAMED_COLORS.get(key.as_str())?;
        Some(Self::from_hex(hex)?.with_value(keyword))
    }

    pub fn luma(&self) -> f64 {
        let gamma = |n: f64| {
            let n = n / 255.0;
            if n <= 0.03928 {
                n / 12.92
            } else {
                ((n + 0.055) / 1.055).powf(2.4)
            }
        };
        0.2126 * gamma(self.rgb[0]) + 0.7152 * gamma(self.rgb[1]) + 0.0722 * gamma(self.rgb[2])
    }

    /// Applies `op` channel-wise; alpha composites as `a * (1 - b) + b`.
    pub fn operate(&self, op: &str, other: &Color) -> Color {
        let alpha = self.alpha * (1.0 - other.alpha) + other.alpha;
        let mut rgb = [0.0; 3];
        for (i, channel) in rgb.iter_mut().enumerate() {
            *channel = arith(op, self.rgb[i], other.rgb[i]);
        }
        Color::new(rgb, alpha)
    }

    pub fn to_rgb_hex(&self) -> String {
        to_hex(&self.rgb)
    }

    /// `#AARRGGBB`
    pub fn to_argb(&self) -> String {
        to_hex(&[self.alpha * 255.0, self.rgb[0], self.rgb[1], self.rgb[2]])
    }

    pub fn to_hsl(&self) -> Hsl {
        let [r, g, b] = self.rgb.map(|c| c / 255.0);
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let l = (max + min) / 2.0;
        let d = max - min;
        let (h, s) = if max == min {
            (0.0, 0.0)
        } else {
            let s = if l > 0.5 {
                d / (2.0 - max - min)
            } else {
                d / (max + min)
            };
            (hue_of(r, g, b, max, d), s)
        };
        let round6 = |v: f64| (v * 1_000_000.0).round() / 1_000_000.0;
        Hsl {
            h: round6(h * 360.0),
            s: round6(s),
            l: round6(l),
            a: self.alpha,
        }
    }

    pub fn to_hsv(&self) -> Hsv {
        let [r, g, b] = self.rgb.map(|c| c / 255.0);
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let d = max - min;
        let s = if max == 0.0 { 0.0 } else { d / max };
        let h = if max == min {
            0.0
        } else {
            hue_of(r, g, b, max, d)
        };
        Hsv {
            h: h * 360.0,
            s,
            v: max,
            a: self.alpha,
        }
    }

    /// Exact channel and alpha equality.
    pub fn same_as(&self, other: &Color) -> bool {
        self.rgb == other.rgb && self.alpha == other.alpha
    }

    pub fn to_css(&self, compress: bool) -> String {
        let alpha = self.alpha;
        let mut function = None;
        match self.value.as_deref() {
            Some(v) if v.starts_with("rgb") => {
                if alpha < 1.0 {
                    function = Some("rgba");
                }
            }
            Some(v) if v.starts_with("hsl") => {
                function = Some(if alpha < 1.0 { "hsla" } else { "hsl" });
            }
            Some(v) => return v.to_string(),
            None => {
                if alpha < 1.0 {
                    function = Some("rgba");
                }
            }
        }

        let sep = if compress { "," } else { ", " };
        match function {
            Some("rgba") => {
                let mut args: Vec<String> = self
                    .rgb
                    .iter()
                    .map(|c| format_number(c.round().clamp(0.0, 255.0)))
                    .collect();
                args.push(format_number(alpha.clamp(0.0, 1.0)));
                format!("rgba({})", args.join(sep))
            }
            Some(name) => {
                let hsl = self.to_hsl();
                let mut args = vec![
                    format_number(hsl.h),
                    format!("{}%", format_number(hsl.s * 100.0)),
                    format!("{}%", format_number(hsl.l * 100.0)),
                ];
                if name == "hsla" {
                    args.push(format_number(alpha.clamp(0.0, 1.0)));
                }
                format!("{name}({})", args.join(sep))
            }
            None => {
                let hex = self.to_rgb_hex();
                if compress {
                    let b = hex.as_bytes();
                    if b[1] == b[2] && b[3] == b[4] && b[5] == b[6] {
                        return format!("#{}{}{}", b[1] as char, b[3] as char, b[5] as char);
                    }
                }
                hex
            }
        }
    }
}

fn hue_of(r: f64, g: f64, b: f64, max: f64, d: f64) -> f64 {
    let h = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };
    h / 6.0
}

/// Scalar arithmetic shared by colors and dimensions.
pub fn arith(op: &str, a: f64, b: f64) -> f64 {
    match op {
        "+" => a + b,
        "-" => a - b,
        "*" => a * b,
        "/" | "./" => a / b,
        _ => a,
    }
}

fn to_hex(channels: &[f64]) -> String {
    let mut out = String::from("#");
    for c in channels {
        let v = c.round().clamp(0.0, 255.0) as u8;
        out.push_str(&format!("{v:02x}"));
    }
    out
}

/// Shortest decimal form without a trailing `.0`, 8 digits at most.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let rounded = (n * 100_000_000.0).round() / 100_000_000.0;
    if rounded == rounded.trunc() && rounded.abs() < 1e15 {
        let s = format!("{rounded:.0}");
        return if s == "-0" { "0".to_string() } else { s };
    }
    let s = format!("{rounded:.8}");
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

pub static NAMED_COLORS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("aliceblue", "f0f8ff"),
        ("antiquewhite", "faebd7"),
        ("aqua", "00ffff"),
        ("aquamarine", "7fffd4"),
        ("azure", "f0ffff"),
        ("beige", "f5f5dc"),
        ("bisque", "ffe4c4"),
        ("black", "000000"),
        ("blanchedalmond", "ffebcd"),
        ("blue", "0000ff"),
        ("blueviolet", "8a2be2"),
        ("brown", "a52a2a"),
        ("burlywood", "deb887"),
        ("cadetblue", "5f9ea0"),
        ("chartreuse", "7fff00"),
        ("chocolate", "d2691e"),
        ("coral", "ff7f50"),
        ("cornflowerblue", "6495ed"),
        ("cornsilk", "fff8dc"),
        ("crimson", "dc143c"),
        ("cyan", "00ffff"),
        ("darkblue", "00008b"),
        ("darkcyan", "008b8b"),
        ("darkgoldenrod", "b8860b"),
        ("darkgray", "a9a9a9"),
        ("darkgrey", "a9a9a9"),
        ("darkgreen", "006400"),
        ("darkkhaki", "bdb76b"),
        ("darkmagenta", "8b008b"),
        ("darkolivegreen", "556b2f"),
        ("darkorange", "ff8c00"),
        ("darkorchid", "9932cc"),
        ("darkred", "8b0000"),
        ("darksalmon", "e9967a"),
        ("darkseagreen", "8fbc8f"),
        ("darkslateblue", "483d8b"),
        ("darkslategray", "2f4f4f"),
        ("darkslategrey", "2f4f4f"),
        ("darkturquoise", "00ced1"),
        ("darkviolet", "9400d3"),
        ("deeppink", "ff1493"),
        ("deepskyblue", "00bfff"),
        ("dimgray", "696969"),
        ("dimgrey", "696969"),
        ("dodgerblue", "1e90ff"),
        ("firebrick", "b22222"),
        ("floralwhite", "fffaf0"),
        ("forestgreen", "228b22"),
        ("fuchsia", "ff00ff"),
        ("gainsboro", "dcdcdc"),
        ("ghostwhite", "f8f8ff"),
        ("gold", "ffd700"),
        ("goldenrod", "daa520"),
        ("gray", "808080"),
        ("grey", "808080"),
        ("green", "008000"),
        ("greenyellow", "adff2f"),
        ("honeydew", "f0fff0"),
        ("hotpink", "ff69b4"),
        ("indianred", "cd5c5c"),
        ("indigo", "4b0082"),
        ("ivory", "fffff0"),
        ("khaki", "f0e68c"),
        ("lavender", "e6e6fa"),
        ("lavenderblush", "fff0f5"),
        ("lawngreen", "7cfc00"),
        ("lemonchiffon", "fffacd"),
        ("lightblue", "add8e6"),
        ("lightcoral", "f08080"),
        ("lightcyan", "e0ffff"),
        ("lightgoldenrodyellow", "fafad2"),
        ("lightgray", "d3d3d3"),
        ("lightgrey", "d3d3d3"),
        ("lightgreen", "90ee90"),
        ("lightpink", "ffb6c1"),
        ("lightsalmon", "ffa07a"),
        ("lightseagreen", "20b2aa"),
        ("lightskyblue", "87cefa"),
        ("lightslategray", "778899"),
        ("lightslategrey", "778899"),
        ("lightsteelblue", "b0c4de"),
        ("lightyellow", "ffffe0"),
        ("lime", "00ff00"),
        ("limegreen", "32cd32"),
        ("linen", "faf0e6"),
        ("magenta", "ff00ff"),
        ("maroon", "800000"),
        ("mediumaquamarine", "66cdaa"),
        ("mediumblue", "0000cd"),
        ("mediumorchid", "ba55d3"),
        ("mediumpurple", "9370d8"),
        ("mediumseagreen", "3cb371"),
        ("mediumslateblue", "7b68ee"),
        ("mediumspringgreen", "00fa9a"),
        ("mediumturquoise", "48d1cc"),
        ("mediumvioletred", "c71585"),
        ("midnightblue", "191970"),
        ("mintcream", "f5fffa"),
        ("mistyrose", "ffe4e1"),
        ("moccasin", "ffe4b5"),
        ("navajowhite", "ffdead"),
        ("navy", "000080"),
        ("oldlace", "fdf5e6"),
        ("olive", "808000"),
        ("olivedrab", "6b8e23"),
        ("orange", "ffa500"),
        ("orangered", "ff4500"),
        ("orchid", "da70d6"),
        ("palegoldenrod", "eee8aa"),
        ("palegreen", "98fb98"),
        ("paleturquoise", "afeeee"),
        ("palevioletred", "d87093"),
        ("papayawhip", "ffefd5"),
        ("peachpuff", "ffdab9"),
        ("peru", "cd853f"),
        ("pink", "ffc0cb"),
        ("plum", "dda0dd"),
        ("powderblue", "b0e0e6"),
        ("purple", "800080"),
        ("rebeccapurple", "663399"),
        ("red", "ff0000"),
        ("rosybrown", "bc8f8f"),
        ("royalblue", "4169e1"),
        ("saddlebrown", "8b4513"),
        ("salmon", "fa8072"),
        ("sandybrown", "f4a460"),
        ("seagreen", "2e8b57"),
        ("seashell", "fff5ee"),
        ("sienna", "a0522d"),
        ("silver", "c0c0c0"),
        ("skyblue", "87ceeb"),
        ("slateblue", "6a5acd"),
        ("slategray", "708090"),
        ("slategrey", "708090"),
        ("snow", "fffafa"),
        ("springgreen", "00ff7f"),
        ("steelblue", "4682b4"),
        ("tan", "d2b48c"),
        ("teal", "008080"),
        ("thistle", "d8bfd8"),
        ("tomato", "ff6347"),
        ("turquoise", "40e0d0"),
        ("violet", "ee82ee"),
        ("wheat", "f5deb3"),
        ("white", "ffffff"),
        ("whitesmoke", "f5f5f5"),
        ("yellow", "ffff00"),
        ("yellowgreen", "9acd32"),
    ]
    .into_iter()
    .collect()
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_and_keyword_parse() {
        let c = Color::from_hex("f00").unwrap();
        assert_eq!(c.rgb, [255.0, 0.0, 0.0]);
        assert_eq!(c.alpha, 1.0);
        let c = Color::from_hex("00000080").unwrap();
        assert!((c.alpha - 128.0 / 255.0).abs() < 1e-9);
        assert!(Color::from_hex("ggg").is_none());
        let red = Color::from_keyword("Red").unwrap();
        assert_eq!(red.to_css(false), "Red");
        assert_eq!(Color::from_keyword("transparent").unwrap().alpha, 0.0);
        assert!(Color::from_keyword("notacolor").is_none());
    }

    #[test]
    fn test_to_css_forms() {
        let c = Color::new([255.0, 0.0, 0.0], 1.0);
        assert_eq!(c.to_css(false), "#ff0000");
        assert_eq!(c.to_css(true), "#f00");
        let c = Color::new([255.0, 0.0, 0.0], 0.5);
        assert_eq!(c.to_css(false), "rgba(255, 0, 0, 0.5)");
        assert_eq!(c.to_css(true), "rgba(255,0,0,0.5)");
        let c = Color::new([300.0, -4.0, 12.4], 1.0);
        assert_eq!(c.to_css(false), "#ff000c");
        let c = Color::new([255.0, 0.0, 0.0], 1.0).with_value("hsl");
        assert_eq!(c.to_css(false), "hsl(0, 100%, 50%)");
    }

    #[test]
    fn test_operate_and_hsl() {
        let a = Color::new([16.0, 16.0, 16.0], 1.0);
        let b = Color::new([16.0, 32.0, 48.0], 1.0);
        let sum = a.operate("+", &b);
        assert_eq!(sum.rgb, [32.0, 48.0, 64.0]);
        assert_eq!(sum.alpha, 1.0);
        let hsl = Color::new([0.0, 128.0, 0.0], 1.0).to_hsl();
        assert_eq!(hsl.h, 120.0);
        assert_eq!(hsl.s, 1.0);
        assert_eq!(Color::new([0.0, 0.0, 0.0], 0.5).to_argb(), "#80000000");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(0.1 + 0.2), "0.3");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(1.0 / 3.0), "0.33333333");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(format_number(f64::NAN), "NaN");
    }
}
