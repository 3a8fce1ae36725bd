//! Rhai bindings for the sketch drawing API.
//!
//! Every primitive is a closure over the sketch's own `SharedState`. Color
//! arguments follow the usual creative-coding convention: one number is
//! gray, two are gray + alpha, three are RGB, four are RGBA, and a single
//! string is parsed as a CSS color.

use glam::Vec2;
use image::Rgba;
use rhai::{Array, Dynamic, Engine, EvalAltResult, FLOAT, INT};

use super::random::ValueNoise;
use super::{SharedState, SketchLimits, SketchState};
use crate::color::{channel, parse_css_color, to_rgba8};

type ScriptResult<T> = Result<T, Box<EvalAltResult>>;

/// Build an engine with only the sketch API bound and resource limits set.
pub(super) fn sandboxed_engine(name: &str, state: &SharedState, limits: &SketchLimits) -> Engine {
    let mut engine = Engine::new();

    engine.set_max_operations(limits.max_operations);
    engine.set_max_call_levels(limits.max_call_levels);
    engine.set_max_expr_depths(64, 64);
    engine.set_max_string_size(10_000);
    engine.set_max_array_size(100_000);
    engine.set_max_map_size(10_000);
    engine.disable_symbol("eval");

    let target = name.to_string();
    engine.on_print(move |s| log::info!("[{}] {}", target, s));
    let target = name.to_string();
    engine.on_debug(move |s, _src, pos| log::debug!("[{}] {} ({})", target, s, pos));

    register_variables(&mut engine, state);
    register_style(&mut engine, state);
    register_shapes(&mut engine, state);
    register_transforms(&mut engine, state);
    register_random(&mut engine, state);
    register_math(&mut engine);
    register_forbidden(&mut engine);

    engine
}

// ── Argument coercion ──

fn num(v: &Dynamic) -> ScriptResult<f64> {
    if let Ok(f) = v.as_float() {
        return Ok(f);
    }
    if let Ok(i) = v.as_int() {
        return Ok(i as f64);
    }
    Err(format!("expected a number, got {}", v.type_name()).into())
}

fn nums<const N: usize>(args: [&Dynamic; N]) -> ScriptResult<[f32; N]> {
    let mut out = [0.0f32; N];
    for (slot, arg) in out.iter_mut().zip(args) {
        *slot = num(arg)? as f32;
    }
    Ok(out)
}

fn color_from(args: &[Dynamic]) -> ScriptResult<Rgba<u8>> {
    if let [single] = args {
        if single.is_string() {
            let text = single.clone().into_string().map_err(|t| format!("expected a color, got {t}"))?;
            return parse_css_color(&text)
                .map(to_rgba8)
                .ok_or_else(|| format!("unknown color '{text}'").into());
        }
    }
    let mut v = [0u8; 4];
    for (slot, arg) in v.iter_mut().zip(args) {
        *slot = channel(num(arg)?);
    }
    Ok(match args.len() {
        1 => Rgba([v[0], v[0], v[0], 255]),
        2 => Rgba([v[0], v[0], v[0], v[1]]),
        3 => Rgba([v[0], v[1], v[2], 255]),
        _ => Rgba(v),
    })
}

// ── Read-only globals ──

#[allow(deprecated)]
fn register_variables(engine: &mut Engine, state: &SharedState) {
    let s = state.clone();
    engine.on_var(move |name, _index, _ctx| {
        let value = match name {
            "width" => Dynamic::from_int(s.borrow().canvas.width() as INT),
            "height" => Dynamic::from_int(s.borrow().canvas.height() as INT),
            "frameCount" => Dynamic::from_int(s.borrow().frame_count as INT),
            "PI" => Dynamic::from_float(std::f64::consts::PI),
            "TWO_PI" | "TAU" => Dynamic::from_float(std::f64::consts::TAU),
            "HALF_PI" => Dynamic::from_float(std::f64::consts::FRAC_PI_2),
            "QUARTER_PI" => Dynamic::from_float(std::f64::consts::FRAC_PI_4),
            _ => return Ok(None),
        };
        Ok(Some(value))
    });
}

// ── Color and style ──

/// Registers `name` for 1 to 4 color arguments.
fn register_color_fn<F>(engine: &mut Engine, name: &str, state: &SharedState, apply: F)
where
    F: Fn(&mut SketchState, Rgba<u8>) + Clone + 'static,
{
    let (s, f) = (state.clone(), apply.clone());
    engine.register_fn(name, move |a: Dynamic| -> ScriptResult<()> {
        f(&mut s.borrow_mut(), color_from(&[a])?);
        Ok(())
    });
    let (s, f) = (state.clone(), apply.clone());
    engine.register_fn(name, move |a: Dynamic, b: Dynamic| -> ScriptResult<()> {
        f(&mut s.borrow_mut(), color_from(&[a, b])?);
        Ok(())
    });
    let (s, f) = (state.clone(), apply.clone());
    engine.register_fn(name, move |a: Dynamic, b: Dynamic, c: Dynamic| -> ScriptResult<()> {
        f(&mut s.borrow_mut(), color_from(&[a, b, c])?);
        Ok(())
    });
    let (s, f) = (state.clone(), apply);
    engine.register_fn(
        name,
        move |a: Dynamic, b: Dynamic, c: Dynamic, d: Dynamic| -> ScriptResult<()> {
            f(&mut s.borrow_mut(), color_from(&[a, b, c, d])?);
            Ok(())
        },
    );
}

fn register_style(engine: &mut Engine, state: &SharedState) {
    register_color_fn(engine, "background", state, |st, c| st.canvas.background(c));
    register_color_fn(engine, "fill", state, |st, c| st.canvas.set_fill(Some(c)));
    register_color_fn(engine, "stroke", state, |st, c| st.canvas.set_stroke(Some(c)));

    let s = state.clone();
    engine.register_fn("noFill", move || s.borrow_mut().canvas.set_fill(None));
    let s = state.clone();
    engine.register_fn("noStroke", move || s.borrow_mut().canvas.set_stroke(None));
    let s = state.clone();
    engine.register_fn("strokeWeight", move |w: Dynamic| -> ScriptResult<()> {
        let [w] = nums([&w])?;
        s.borrow_mut().canvas.set_stroke_weight(w);
        Ok(())
    });
    let s = state.clone();
    engine.register_fn("clear", move || s.borrow_mut().canvas.clear());
}

// ── Shapes ──

fn register_shapes(engine: &mut Engine, state: &SharedState) {
    let s = state.clone();
    engine.register_fn(
        "rect",
        move |x: Dynamic, y: Dynamic, w: Dynamic, h: Dynamic| -> ScriptResult<()> {
            let [x, y, w, h] = nums([&x, &y, &w, &h])?;
            s.borrow_mut().canvas.rect(x, y, w, h);
            Ok(())
        },
    );
    let s = state.clone();
    engine.register_fn("square", move |x: Dynamic, y: Dynamic, side: Dynamic| -> ScriptResult<()> {
        let [x, y, side] = nums([&x, &y, &side])?;
        s.borrow_mut().canvas.rect(x, y, side, side);
        Ok(())
    });
    let s = state.clone();
    engine.register_fn(
        "ellipse",
        move |x: Dynamic, y: Dynamic, w: Dynamic, h: Dynamic| -> ScriptResult<()> {
            let [x, y, w, h] = nums([&x, &y, &w, &h])?;
            s.borrow_mut().canvas.ellipse(x, y, w, h);
            Ok(())
        },
    );
    let s = state.clone();
    engine.register_fn("ellipse", move |x: Dynamic, y: Dynamic, d: Dynamic| -> ScriptResult<()> {
        let [x, y, d] = nums([&x, &y, &d])?;
        s.borrow_mut().canvas.ellipse(x, y, d, d);
        Ok(())
    });
    let s = state.clone();
    engine.register_fn("circle", move |x: Dynamic, y: Dynamic, d: Dynamic| -> ScriptResult<()> {
        let [x, y, d] = nums([&x, &y, &d])?;
        s.borrow_mut().canvas.ellipse(x, y, d, d);
        Ok(())
    });
    let s = state.clone();
    engine.register_fn(
        "line",
        move |x1: Dynamic, y1: Dynamic, x2: Dynamic, y2: Dynamic| -> ScriptResult<()> {
            let [x1, y1, x2, y2] = nums([&x1, &y1, &x2, &y2])?;
            s.borrow_mut().canvas.line(Vec2::new(x1, y1), Vec2::new(x2, y2));
            Ok(())
        },
    );
    let s = state.clone();
    engine.register_fn("point", move |x: Dynamic, y: Dynamic| -> ScriptResult<()> {
        let [x, y] = nums([&x, &y])?;
        s.borrow_mut().canvas.point(Vec2::new(x, y));
        Ok(())
    });
    let s = state.clone();
    engine.register_fn(
        "triangle",
        move |x1: Dynamic, y1: Dynamic, x2: Dynamic, y2: Dynamic, x3: Dynamic, y3: Dynamic| -> ScriptResult<()> {
            let [x1, y1, x2, y2, x3, y3] = nums([&x1, &y1, &x2, &y2, &x3, &y3])?;
            s.borrow_mut().canvas.triangle([
                Vec2::new(x1, y1),
                Vec2::new(x2, y2),
                Vec2::new(x3, y3),
            ]);
            Ok(())
        },
    );
    let s = state.clone();
    engine.register_fn(
        "quad",
        move |x1: Dynamic,
              y1: Dynamic,
              x2: Dynamic,
              y2: Dynamic,
              x3: Dynamic,
              y3: Dynamic,
              x4: Dynamic,
              y4: Dynamic|
              -> ScriptResult<()> {
            let [x1, y1, x2, y2, x3, y3, x4, y4] =
                nums([&x1, &y1, &x2, &y2, &x3, &y3, &x4, &y4])?;
            s.borrow_mut().canvas.quad([
                Vec2::new(x1, y1),
                Vec2::new(x2, y2),
                Vec2::new(x3, y3),
                Vec2::new(x4, y4),
            ]);
            Ok(())
        },
    );
}

// ── Transform stack ──

fn register_transforms(engine: &mut Engine, state: &SharedState) {
    let s = state.clone();
    engine.register_fn("push", move || s.borrow_mut().canvas.push());
    let s = state.clone();
    engine.register_fn("pop", move || s.borrow_mut().canvas.pop());
    let s = state.clone();
    engine.register_fn("translate", move |x: Dynamic, y: Dynamic| -> ScriptResult<()> {
        let [x, y] = nums([&x, &y])?;
        s.borrow_mut().canvas.translate(x, y);
        Ok(())
    });
    let s = state.clone();
    engine.register_fn("rotate", move |a: Dynamic| -> ScriptResult<()> {
        let [a] = nums([&a])?;
        s.borrow_mut().canvas.rotate(a);
        Ok(())
    });
    let s = state.clone();
    engine.register_fn("scale", move |k: Dynamic| -> ScriptResult<()> {
        let [k] = nums([&k])?;
        s.borrow_mut().canvas.scale(k, k);
        Ok(())
    });
    let s = state.clone();
    engine.register_fn("scale", move |sx: Dynamic, sy: Dynamic| -> ScriptResult<()> {
        let [sx, sy] = nums([&sx, &sy])?;
        s.borrow_mut().canvas.scale(sx, sy);
        Ok(())
    });
}

// ── Randomness ──

fn register_random(engine: &mut Engine, state: &SharedState) {
    let s = state.clone();
    engine.register_fn("random", move || -> FLOAT { s.borrow_mut().rng.next_f64() });
    let s = state.clone();
    engine.register_fn("random", move |a: Dynamic| -> ScriptResult<Dynamic> {
        if a.is_array() {
            let items: Array = a.into_array().map_err(|t| format!("expected an array, got {t}"))?;
            if items.is_empty() {
                return Ok(Dynamic::UNIT);
            }
            let pick = s.borrow_mut().rng.range(0.0, items.len() as f64) as usize;
            return Ok(items[pick.min(items.len() - 1)].clone());
        }
        let max = num(&a)?;
        Ok(Dynamic::from_float(s.borrow_mut().rng.range(0.0, max)))
    });
    let s = state.clone();
    engine.register_fn("random", move |lo: Dynamic, hi: Dynamic| -> ScriptResult<FLOAT> {
        let (lo, hi) = (num(&lo)?, num(&hi)?);
        Ok(s.borrow_mut().rng.range(lo, hi))
    });
    let s = state.clone();
    engine.register_fn("randomSeed", move |seed: Dynamic| -> ScriptResult<()> {
        s.borrow_mut().rng.reseed(num(&seed)? as u64);
        Ok(())
    });

    let s = state.clone();
    engine.register_fn("noise", move |x: Dynamic| -> ScriptResult<FLOAT> {
        Ok(s.borrow().noise.sample(num(&x)?, 0.0, 0.0))
    });
    let s = state.clone();
    engine.register_fn("noise", move |x: Dynamic, y: Dynamic| -> ScriptResult<FLOAT> {
        Ok(s.borrow().noise.sample(num(&x)?, num(&y)?, 0.0))
    });
    let s = state.clone();
    engine.register_fn(
        "noise",
        move |x: Dynamic, y: Dynamic, z: Dynamic| -> ScriptResult<FLOAT> {
            Ok(s.borrow().noise.sample(num(&x)?, num(&y)?, num(&z)?))
        },
    );
    let s = state.clone();
    engine.register_fn("noiseSeed", move |seed: Dynamic| -> ScriptResult<()> {
        s.borrow_mut().noise = ValueNoise::new(num(&seed)? as u64);
        Ok(())
    });
}

// ── Math helpers ──

fn register_math(engine: &mut Engine) {
    engine.register_fn(
        "map",
        |v: Dynamic, a0: Dynamic, a1: Dynamic, b0: Dynamic, b1: Dynamic| -> ScriptResult<FLOAT> {
            let (v, a0, a1, b0, b1) = (num(&v)?, num(&a0)?, num(&a1)?, num(&b0)?, num(&b1)?);
            if a1 == a0 {
                return Ok(b0);
            }
            Ok(b0 + (v - a0) / (a1 - a0) * (b1 - b0))
        },
    );
    engine.register_fn(
        "constrain",
        |v: Dynamic, lo: Dynamic, hi: Dynamic| -> ScriptResult<FLOAT> {
            let (v, lo, hi) = (num(&v)?, num(&lo)?, num(&hi)?);
            Ok(v.max(lo).min(hi))
        },
    );
    engine.register_fn(
        "lerp",
        |a: Dynamic, b: Dynamic, t: Dynamic| -> ScriptResult<FLOAT> {
            Ok(super::random::lerp(num(&a)?, num(&b)?, num(&t)?))
        },
    );
    engine.register_fn(
        "dist",
        |x1: Dynamic, y1: Dynamic, x2: Dynamic, y2: Dynamic| -> ScriptResult<FLOAT> {
            let (dx, dy) = (num(&x2)? - num(&x1)?, num(&y2)? - num(&y1)?);
            Ok(dx.hypot(dy))
        },
    );
}

// ── Rejected globals ──

fn register_forbidden(engine: &mut Engine) {
    const MESSAGE: &str = "createCanvas() is not available; the surface is sized by the artwork";
    engine.register_fn("createCanvas", |_: Dynamic, _: Dynamic| -> ScriptResult<()> {
        Err(MESSAGE.into())
    });
    engine.register_fn(
        "createCanvas",
        |_: Dynamic, _: Dynamic, _: Dynamic| -> ScriptResult<()> { Err(MESSAGE.into()) },
    );
}
