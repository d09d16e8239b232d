//! Photoshop-style blend modes over two colors.

use crate::functions::helpers::color_arg;
use crate::functions::{FnResult, Function, FunctionRegistry};
use crate::tree::{Color, Node};

type Mode = fn(f64, f64) -> f64;

pub fn register_blend_functions(registry: &mut FunctionRegistry) {
    let table: &[(&str, fn(&[Node]) -> FnResult)] = &[
        ("multiply", |a| blend(a, "multiply", multiply)),
        ("screen", |a| blend(a, "screen", screen)),
        ("overlay", |a| blend(a, "overlay", overlay)),
        ("softlight", |a| blend(a, "softlight", softlight)),
        ("hardlight", |a| blend(a, "hardlight", hardlight)),
        ("difference", |a| blend(a, "difference", difference)),
        ("exclusion", |a| blend(a, "exclusion", exclusion)),
        ("average", |a| blend(a, "average", average)),
        ("negation", |a| blend(a, "negation", negation)),
    ];
    for (name, f) in table {
        registry.register(name, Function::Pure(*f));
    }
}

fn blend(args: &[Node], name: &str, mode: Mode) -> FnResult {
    let backdrop = color_arg(args, 0, name)?;
    let source = color_arg(args, 1, name)?;
    Ok(Some(Node::Color(blend_colors(mode, backdrop, source))))
}

/// Composites `source` over `backdrop` using `mode` per channel.
fn blend_colors(mode: Mode, backdrop: &Color, source: &Color) -> Color {
    let ab = backdrop.alpha;
    let a_s = source.alpha;
    let ar = a_s + ab * (1.0 - a_s);
    let mut rgb = [0.0; 3];
    for (i, out) in rgb.iter_mut().enumerate() {
        let cb = backdrop.rgb[i] / 255.0;
        let cs = source.rgb[i] / 255.0;
        let mut cr = mode(cb, cs);
        if ar != 0.0 {
            cr = (a_s * cs + ab * (cb - a_s * (cb + cs - cr))) / ar;
        }
        *out = cr * 255.0;
    }
    Color::new(rgb, ar)
}

fn multiply(cb: f64, cs: f64) -> f64 {
    cb * cs
}

fn screen(cb: f64, cs: f64) -> f64 {
    cb + cs - cb * cs
}

fn overlay(cb: f64, cs: f64) -> f64 {
    let cb = cb * 2.0;
    if cb <= 1.0 {
        multiply(cb, cs)
    } else {
        screen(cb - 1.0, cs)
    }
}

fn softlight(cb: f64, cs: f64) -> f64 {
    let (d, e) = if cs > 0.5 {
        let d = if cb > 0.25 {
            cb.sqrt()
        } else {
            ((16.0 * cb - 12.0) * cb + 4.0) * cb
        };
        (d, 1.0)
    } else {
        (1.0, cb)
    };
    cb - (1.0 - 2.0 * cs) * e * (d - cb)
}

fn hardlight(cb: f64, cs: f64) -> f64 {
    overlay(cs, cb)
}

fn difference(cb: f64, cs: f64) -> f64 {
    (cb - cs).abs()
}

fn exclusion(cb: f64, cs: f64) -> f64 {
    cb + cs - 2.0 * cb * cs
}

fn average(cb: f64, cs: f64) -> f64 {
    (cb + cs) / 2.0
}

fn negation(cb: f64, cs: f64) -> f64 {
    1.0 - (cb + cs - 1.0).abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(h: &str) -> Color {
        Color::from_hex(h).unwrap()
    }

    #[test]
    fn test_opaque_blends() {
        let red = hex("ff6600");
        let blue = hex("0066ff");
        assert_eq!(blend_colors(multiply, &red, &blue).to_rgb_hex(), "#002900");
        assert_eq!(blend_colors(screen, &red, &blue).to_rgb_hex(), "#ffa3ff");
        assert_eq!(blend_colors(difference, &red, &blue).to_rgb_hex(), "#ff00ff");
        assert_eq!(blend_colors(average, &red, &blue).to_rgb_hex(), "#806680");
        assert_eq!(blend_colors(negation, &red, &blue).to_rgb_hex(), "#ffccff");
    }

    #[test]
    fn test_blend_requires_colors() {
        let err = blend(&[Node::keyword("a"), Node::keyword("b")], "multiply", multiply).unwrap_err();
        assert_eq!(err.message(), "Argument cannot be evaluated to a color");
    }
}
