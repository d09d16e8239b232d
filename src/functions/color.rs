//! Color construction, channel access and HSL adjustments.

use crate::diagnostics::LessResult;
use crate::functions::helpers::{
    arg, as_color, clamp01, color_arg, dimension, number, scaled, text_of, value_of,
};
use crate::functions::{FnResult, Function, FunctionRegistry};
use crate::tree::color::Hsl;
use crate::tree::{Anonymous, Color, Dimension, Node};
use crate::err_msg;

pub fn register_color_functions(registry: &mut FunctionRegistry) {
    let table: &[(&str, fn(&[Node]) -> FnResult)] = &[
        ("rgb", rgb),
        ("rgba", rgba),
        ("hsl", hsl),
        ("hsla", hsla),
        ("hsv", hsv),
        ("hsva", hsva),
        ("hue", hue),
        ("saturation", saturation),
        ("lightness", lightness),
        ("hsvhue", hsvhue),
        ("hsvsaturation", hsvsaturation),
        ("hsvvalue", hsvvalue),
        ("red", red),
        ("green", green),
        ("blue", blue),
        ("alpha", alpha),
        ("luma", luma),
        ("luminance", luminance),
        ("saturate", saturate),
        ("desaturate", desaturate),
        ("lighten", lighten),
        ("darken", darken),
        ("fadein", fadein),
        ("fadeout", fadeout),
        ("fade", fade),
        ("spin", spin),
        ("mix", mix),
        ("greyscale", greyscale),
        ("contrast", contrast),
        ("argb", argb),
        ("color", color),
        ("tint", tint),
        ("shade", shade),
    ];
    for (name, f) in table {
        registry.register(name, Function::Pure(*f));
    }
}

// ============================================================================
// CONSTRUCTION
// ============================================================================

/// Splits the comma-less `rgb(r g b / a)` form into channels and alpha.
fn comma_less(args: &[Node]) -> (Vec<Node>, Option<Node>) {
    match args.first() {
        Some(Node::Expression(e)) => {
            let mut channels = e.value.clone();
            let mut alpha = None;
            if let Some(Node::Operation(op)) = channels.get(2).cloned() {
                channels[2] = *op.left;
                alpha = Some(*op.right);
            }
            (channels, alpha)
        }
        _ => (args.to_vec(), None),
    }
}

fn one() -> Node {
    Node::Dimension(Dimension::unitless(1.0))
}

/// `rgba(r, g, b, a)` or `rgba(color, a)`; `None` when the channels are not numbers.
fn rgba_of(channels: &[Node], alpha: Option<&Node>) -> Option<Color> {
    if let Some(Node::Color(c)) = channels.first() {
        let a = match channels.get(1) {
            Some(g) => number(g).ok()?,
            None => c.alpha,
        };
        return Some(Color::new(c.rgb, a).with_value("rgba"));
    }
    if channels.len() < 3 {
        return None;
    }
    let mut rgb = [0.0; 3];
    for (slot, c) in rgb.iter_mut().zip(channels) {
        *slot = scaled(c, 255.0).ok()?;
    }
    let a = number(alpha?).ok()?;
    Some(Color::new(rgb, a).with_value("rgba"))
}

fn rgb(args: &[Node]) -> FnResult {
    let (channels, alpha) = comma_less(args);
    let alpha = alpha.unwrap_or_else(one);
    Ok(rgba_of(&channels, Some(&alpha)).map(|c| Node::Color(c.with_value("rgb"))))
}

fn rgba(args: &[Node]) -> FnResult {
    let (channels, alpha) = comma_less(args);
    let alpha = alpha.or_else(|| channels.get(3).cloned());
    Ok(rgba_of(&channels, alpha.as_ref()).map(Node::Color))
}

/// HSL to RGB; `h` in degrees, the rest fractions.
pub fn hsla_values(h: f64, s: f64, l: f64, a: f64) -> Color {
    let h = (h % 360.0) / 360.0;
    let s = clamp01(s);
    let l = clamp01(l);
    let a = clamp01(a);
    let m2 = if l <= 0.5 { l * (s + 1.0) } else { l + s - l * s };
    let m1 = l * 2.0 - m2;
    let hue = |h: f64| {
        let h = if h < 0.0 {
            h + 1.0
        } else if h > 1.0 {
            h - 1.0
        } else {
            h
        };
        if h * 6.0 < 1.0 {
            m1 + (m2 - m1) * h * 6.0
        } else if h * 2.0 < 1.0 {
            m2
        } else if h * 3.0 < 2.0 {
            m1 + (m2 - m1) * (2.0 / 3.0 - h) * 6.0
        } else {
            m1
        }
    };
    Color::new(
        [
            hue(h + 1.0 / 3.0) * 255.0,
            hue(h) * 255.0,
            hue(h - 1.0 / 3.0) * 255.0,
        ],
        a,
    )
    .with_value("hsla")
}

fn hsla_of(channels: &[Node], alpha: Option<&Node>) -> Option<Color> {
    if let Some(Node::Color(c)) = channels.first() {
        let a = match channels.get(1) {
            Some(s) => number(s).ok()?,
            None => c.alpha,
        };
        return Some(Color::new(c.rgb, a).with_value("hsla"));
    }
    if channels.len() < 3 {
        return None;
    }
    Some(hsla_values(
        number(&channels[0]).ok()?,
        number(&channels[1]).ok()?,
        number(&channels[2]).ok()?,
        number(alpha?).ok()?,
    ))
}

fn hsl(args: &[Node]) -> FnResult {
    let (channels, alpha) = comma_less(args);
    let alpha = alpha.unwrap_or_else(one);
    Ok(hsla_of(&channels, Some(&alpha)).map(|c| Node::Color(c.with_value("hsl"))))
}

fn hsla(args: &[Node]) -> FnResult {
    let (channels, alpha) = comma_less(args);
    let alpha = alpha.or_else(|| channels.get(3).cloned());
    Ok(hsla_of(&channels, alpha.as_ref()).map(Node::Color))
}

fn hsva_values(h: f64, s: f64, v: f64, a: f64) -> Color {
    let h = ((h % 360.0) / 360.0) * 360.0;
    let i = ((h / 60.0) % 6.0).floor().rem_euclid(6.0) as usize;
    let f = h / 60.0 - i as f64;
    let vs = [v, v * (1.0 - s), v * (1.0 - f * s), v * (1.0 - (1.0 - f) * s)];
    const PERM: [[usize; 3]; 6] = [[0, 3, 1], [2, 0, 1], [1, 0, 3], [1, 2, 0], [3, 1, 0], [0, 1, 2]];
    let p = PERM[i];
    Color::new([vs[p[0]] * 255.0, vs[p[1]] * 255.0, vs[p[2]] * 255.0], a).with_value("rgba")
}

fn hsv(args: &[Node]) -> FnResult {
    Ok(Some(Node::Color(hsva_values(
        number(arg(args, 0, "hsv")?)?,
        number(arg(args, 1, "hsv")?)?,
        number(arg(args, 2, "hsv")?)?,
        1.0,
    ))))
}

fn hsva(args: &[Node]) -> FnResult {
    Ok(Some(Node::Color(hsva_values(
        number(arg(args, 0, "hsva")?)?,
        number(arg(args, 1, "hsva")?)?,
        number(arg(args, 2, "hsva")?)?,
        number(arg(args, 3, "hsva")?)?,
    ))))
}

// ============================================================================
// CHANNELS
// ============================================================================

fn hue(args: &[Node]) -> FnResult {
    Ok(dimension(color_arg(args, 0, "hue")?.to_hsl().h, ""))
}

fn saturation(args: &[Node]) -> FnResult {
    Ok(dimension(color_arg(args, 0, "saturation")?.to_hsl().s * 100.0, "%"))
}

fn lightness(args: &[Node]) -> FnResult {
    Ok(dimension(color_arg(args, 0, "lightness")?.to_hsl().l * 100.0, "%"))
}

fn hsvhue(args: &[Node]) -> FnResult {
    Ok(dimension(color_arg(args, 0, "hsvhue")?.to_hsv().h, ""))
}

fn hsvsaturation(args: &[Node]) -> FnResult {
    Ok(dimension(color_arg(args, 0, "hsvsaturation")?.to_hsv().s * 100.0, "%"))
}

fn hsvvalue(args: &[Node]) -> FnResult {
    Ok(dimension(color_arg(args, 0, "hsvvalue")?.to_hsv().v * 100.0, "%"))
}

fn red(args: &[Node]) -> FnResult {
    Ok(dimension(color_arg(args, 0, "red")?.rgb[0], ""))
}

fn green(args: &[Node]) -> FnResult {
    Ok(dimension(color_arg(args, 0, "green")?.rgb[1], ""))
}

fn blue(args: &[Node]) -> FnResult {
    Ok(dimension(color_arg(args, 0, "blue")?.rgb[2], ""))
}

fn alpha(args: &[Node]) -> FnResult {
    // `alpha(opacity=50)` is parsed as a quoted filter and never lands here.
    Ok(dimension(color_arg(args, 0, "alpha")?.to_hsl().a, ""))
}

fn luma(args: &[Node]) -> FnResult {
    let c = color_arg(args, 0, "luma")?;
    Ok(dimension(c.luma() * c.alpha * 100.0, "%"))
}

fn luminance(args: &[Node]) -> FnResult {
    let c = color_arg(args, 0, "luminance")?;
    let l = 0.2126 * c.rgb[0] / 255.0 + 0.7152 * c.rgb[1] / 255.0 + 0.0722 * c.rgb[2] / 255.0;
    Ok(dimension(l * c.alpha * 100.0, "%"))
}

// ============================================================================
// ADJUSTMENT
// ============================================================================

/// Rebuilds a color from adjusted HSL, keeping the authored function style.
fn from_hsl(orig: &Color, hsl: Hsl) -> Node {
    let mut color = hsla_values(hsl.h, hsl.s, hsl.l, hsl.a);
    color.value = match orig.value.as_deref() {
        Some(v) if v.starts_with("rgb") || v.starts_with("hsl") => Some(v.to_string()),
        _ => Some("rgb".to_string()),
    };
    Node::Color(color)
}

#[derive(Clone, Copy)]
enum Channel {
    Saturation,
    Lightness,
    Alpha,
}

/// Adds `sign * amount` percent to one channel, or a relative share of it
/// when the third argument is `relative`.
fn adjust(args: &[Node], name: &str, channel: Channel, sign: f64) -> FnResult {
    let color = color_arg(args, 0, name)?;
    let amount = value_of(args, 1, name)?;
    let relative = args.get(2).is_some_and(|m| text_of(m) == "relative");
    let mut hsl = color.to_hsl();
    let slot = match channel {
        Channel::Saturation => &mut hsl.s,
        Channel::Lightness => &mut hsl.l,
        Channel::Alpha => &mut hsl.a,
    };
    let delta = if relative {
        *slot * amount / 100.0
    } else {
        amount / 100.0
    };
    *slot = clamp01(*slot + sign * delta);
    Ok(Some(from_hsl(color, hsl)))
}

fn saturate(args: &[Node]) -> FnResult {
    // `filter: saturate(3.2)` stays a plain css call.
    if args.first().and_then(as_color).is_none() {
        return Ok(None);
    }
    adjust(args, "saturate", Channel::Saturation, 1.0)
}

fn desaturate(args: &[Node]) -> FnResult {
    adjust(args, "desaturate", Channel::Saturation, -1.0)
}

fn lighten(args: &[Node]) -> FnResult {
    adjust(args, "lighten", Channel::Lightness, 1.0)
}

fn darken(args: &[Node]) -> FnResult {
    adjust(args, "darken", Channel::Lightness, -1.0)
}

fn fadein(args: &[Node]) -> FnResult {
    adjust(args, "fadein", Channel::Alpha, 1.0)
}

fn fadeout(args: &[Node]) -> FnResult {
    adjust(args, "fadeout", Channel::Alpha, -1.0)
}

fn fade(args: &[Node]) -> FnResult {
    let color = color_arg(args, 0, "fade")?;
    let mut hsl = color.to_hsl();
    hsl.a = clamp01(value_of(args, 1, "fade")? / 100.0);
    Ok(Some(from_hsl(color, hsl)))
}

fn spin(args: &[Node]) -> FnResult {
    let color = color_arg(args, 0, "spin")?;
    let mut hsl = color.to_hsl();
    let hue = (hsl.h + value_of(args, 1, "spin")?) % 360.0;
    hsl.h = if hue < 0.0 { 360.0 + hue } else { hue };
    Ok(Some(from_hsl(color, hsl)))
}

/// Weighted mix; `weight` is the percentage of `a`.
pub fn mix_colors(a: &Color, b: &Color, weight: f64) -> Color {
    let p = weight / 100.0;
    let w = p * 2.0 - 1.0;
    let alpha_diff = a.to_hsl().a - b.to_hsl().a;
    let w1 = (if w * alpha_diff == -1.0 {
        w
    } else {
        (w + alpha_diff) / (1.0 + w * alpha_diff)
    } + 1.0)
        / 2.0;
    let w2 = 1.0 - w1;
    let rgb = [
        a.rgb[0] * w1 + b.rgb[0] * w2,
        a.rgb[1] * w1 + b.rgb[1] * w2,
        a.rgb[2] * w1 + b.rgb[2] * w2,
    ];
    Color::new(rgb, a.alpha * p + b.alpha * (1.0 - p))
}

fn weight_arg(args: &[Node], index: usize) -> LessResult<f64> {
    match args.get(index) {
        None => Ok(50.0),
        Some(Node::Dimension(d)) => Ok(d.value),
        Some(_) => Err(err_msg!(Argument, "argument must be a number")),
    }
}

fn mix(args: &[Node]) -> FnResult {
    let a = color_arg(args, 0, "mix")?;
    let b = color_arg(args, 1, "mix")?;
    Ok(Some(Node::Color(mix_colors(a, b, weight_arg(args, 2)?))))
}

fn tint(args: &[Node]) -> FnResult {
    let white = Color::new([255.0; 3], 1.0);
    let c = color_arg(args, 0, "tint")?;
    Ok(Some(Node::Color(mix_colors(&white, c, weight_arg(args, 1)?))))
}

fn shade(args: &[Node]) -> FnResult {
    let black = Color::new([0.0; 3], 1.0);
    let c = color_arg(args, 0, "shade")?;
    Ok(Some(Node::Color(mix_colors(&black, c, weight_arg(args, 1)?))))
}

fn greyscale(args: &[Node]) -> FnResult {
    let color = color_arg(args, 0, "greyscale")?;
    let mut hsl = color.to_hsl();
    hsl.s = 0.0;
    Ok(Some(from_hsl(color, hsl)))
}

fn contrast(args: &[Node]) -> FnResult {
    // `filter: contrast(3.2)` stays a plain css call.
    let Some(color) = args.first().and_then(as_color) else {
        return Ok(None);
    };
    let mut dark = match args.get(1) {
        Some(_) => color_arg(args, 1, "contrast")?.clone(),
        None => Color::new([0.0; 3], 1.0).with_value("rgba"),
    };
    let mut light = match args.get(2) {
        Some(_) => color_arg(args, 2, "contrast")?.clone(),
        None => Color::new([255.0; 3], 1.0).with_value("rgba"),
    };
    if dark.luma() > light.luma() {
        std::mem::swap(&mut dark, &mut light);
    }
    let threshold = match args.get(3) {
        Some(t) => number(t)?,
        None => 0.43,
    };
    Ok(Some(Node::Color(if color.luma() < threshold {
        light
    } else {
        dark
    })))
}

fn argb(args: &[Node]) -> FnResult {
    Ok(Some(Node::Anonymous(Anonymous::new(
        color_arg(args, 0, "argb")?.to_argb(),
    ))))
}

fn color(args: &[Node]) -> FnResult {
    let c = arg(args, 0, "color")?;
    if let Node::Quoted(q) = c {
        let hex = q.value.strip_prefix('#').unwrap_or("");
        if matches!(hex.len(), 3 | 4 | 6 | 8) {
            if let Some(parsed) = Color::from_hex(hex) {
                return Ok(Some(Node::Color(parsed.with_value(q.value.clone()))));
            }
        }
    }
    let found = match c {
        Node::Color(color) => Some(color.clone()),
        Node::Keyword(_) | Node::Quoted(_) | Node::Anonymous(_) => Color::from_keyword(&text_of(c)),
        _ => None,
    };
    match found {
        Some(mut color) => {
            color.value = None;
            Ok(Some(Node::Color(color)))
        }
        None => Err(err_msg!(
            Argument,
            "argument must be a color keyword or 3|4|6|8 digit hex e.g. #FFF"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::helpers::css;

    fn c(hex: &str) -> Node {
        Node::Color(Color::from_hex(hex).unwrap())
    }

    fn pct(v: f64) -> Node {
        Node::Dimension(Dimension::with_unit(v, "%"))
    }

    fn num(v: f64) -> Node {
        Node::Dimension(Dimension::unitless(v))
    }

    fn run(f: fn(&[Node]) -> FnResult, args: &[Node]) -> String {
        css(&f(args).unwrap().expect("function declined"))
    }

    #[test]
    fn test_constructors() {
        assert_eq!(run(rgb, &[num(255.0), num(0.0), num(0.0)]), "#ff0000");
        assert_eq!(run(rgba, &[num(255.0), num(0.0), num(0.0), num(0.5)]), "rgba(255, 0, 0, 0.5)");
        assert_eq!(run(rgba, &[c("f00"), pct(50.0)]), "rgba(255, 0, 0, 0.5)");
        assert_eq!(run(hsl, &[num(120.0), pct(100.0), pct(25.0)]), "hsl(120, 100%, 25%)");
        assert_eq!(run(hsv, &[num(0.0), pct(100.0), pct(100.0)]), "#ff0000");
        assert!(rgba(&[num(1.0), num(2.0)]).unwrap().is_none());
    }

    #[test]
    fn test_adjustments() {
        assert_eq!(run(lighten, &[c("000"), pct(50.0)]), "#808080");
        assert_eq!(run(darken, &[c("fff"), pct(100.0)]), "#000000");
        assert_eq!(run(fade, &[c("f00"), pct(50.0)]), "rgba(255, 0, 0, 0.5)");
        assert_eq!(run(spin, &[c("f00"), num(-120.0)]), "#0000ff");
        assert_eq!(run(greyscale, &[c("f00")]), "#808080");
        let relative = run(lighten, &[c("808080"), pct(10.0), Node::keyword("relative")]);
        assert_eq!(relative, "#8d8d8d");
    }

    #[test]
    fn test_filter_forms_decline() {
        assert!(saturate(&[num(3.2)]).unwrap().is_none());
        assert!(contrast(&[num(3.2)]).unwrap().is_none());
    }

    #[test]
    fn test_mix_tint_shade_contrast() {
        assert_eq!(run(mix, &[c("f00"), c("00f")]), "#800080");
        assert_eq!(run(tint, &[c("000"), pct(50.0)]), "#808080");
        assert_eq!(run(shade, &[c("fff"), pct(50.0)]), "#808080");
        assert_eq!(run(contrast, &[c("fff")]), "#000000");
    }

    #[test]
    fn test_channels_and_conversions() {
        assert_eq!(run(red, &[c("102030")]), "16");
        assert_eq!(run(lightness, &[c("808080")]), "50.1961%");
        assert_eq!(run(argb, &[c("f00")]), "#ffff0000");
        let quoted = Node::Quoted(crate::tree::Quoted::new('"', "#abc", false));
        assert_eq!(run(color, &[quoted]), "#abc");
        assert_eq!(run(color, &[Node::keyword("red")]), "#ff0000");
        let err = color(&[Node::keyword("nope")]).unwrap_err();
        assert_eq!(err.message(), "argument must be a color keyword or 3|4|6|8 digit hex e.g. #FFF");
    }
}
