//! Sandboxed sketch compiler.
//!
//! A sketch is a small Rhai program that defines `fn draw()`. Each sketch
//! gets its own `rhai::Engine` whose only bindings are the drawing, random
//! and math primitives registered in `api`, all closing over that sketch's
//! private `SketchState`. Nothing is shared between engines, so two sketches
//! cannot see or clobber each other's names.
//!
//! Lifecycle:
//!   `compile` → parse → shape check (`draw()` present, no `setup()`)
//!   → top-level statements once → `draw()` once → texture upload.
//!   `SketchRuntime::advance` → `draw()` again → upload → `frameCount += 1`.

mod api;
pub mod canvas;
pub mod random;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use rhai::{CallFnOptions, Dynamic, Engine, EvalAltResult, Scope, AST};
use serde::Deserialize;

use crate::error::{CompileError, CompilePhase};
use crate::texture::Texture;
use canvas::Canvas;
use random::{Lcg, ValueNoise};

/// Pixel-format hint for the private drawing surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// RGBA surface that starts transparent; alpha reaches the texture.
    P2D,
    /// Surface composited over black on upload; the texture is fully opaque.
    Opaque,
}

impl Default for RenderMode {
    fn default() -> Self {
        Self::P2D
    }
}

impl RenderMode {
    /// Accepts `P2D`, `p5.P2D`, `2d`, `OPAQUE`, `WEBGL` (case-insensitive).
    pub fn parse(tag: &str) -> Option<Self> {
        let tag = tag.trim().to_ascii_lowercase();
        match tag.trim_start_matches("p5.") {
            "p2d" | "2d" => Some(Self::P2D),
            "opaque" | "webgl" => Some(Self::Opaque),
            _ => None,
        }
    }
}

/// Resource limits applied to every sketch engine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SketchLimits {
    /// Operations per `draw()` call; 0 disables the limit.
    pub max_operations: u64,
    pub max_call_levels: usize,
}

impl Default for SketchLimits {
    fn default() -> Self {
        Self {
            max_operations: 50_000_000,
            max_call_levels: 64,
        }
    }
}

/// Everything a sketch's primitives are allowed to touch.
#[derive(Debug)]
pub(crate) struct SketchState {
    pub canvas: Canvas,
    pub rng: Lcg,
    pub noise: ValueNoise,
    pub frame_count: u64,
}

pub(crate) type SharedState = Rc<RefCell<SketchState>>;

/// A compiled, validated sketch bound to its private surface and texture.
pub struct SketchRuntime {
    name: String,
    engine: Engine,
    ast: AST,
    scope: Scope<'static>,
    /// Bound as `this` inside `draw()`; survives between frames.
    this: Dynamic,
    state: SharedState,
    texture: Texture,
    seed: u64,
    faulted: bool,
}

/// Compile `source` into a runtime drawing into a `width_px × height_px`
/// surface, seeded from `seed` (or from the clock when absent).
pub fn compile(
    name: &str,
    source: &str,
    seed: Option<u64>,
    width_px: u32,
    height_px: u32,
    mode: RenderMode,
    limits: &SketchLimits,
) -> Result<SketchRuntime, CompileError> {
    let seed = seed.unwrap_or_else(|| {
        let seed = clock_seed();
        log::debug!("[{}] no seed given, using {}", name, seed);
        seed
    });

    let state: SharedState = Rc::new(RefCell::new(SketchState {
        canvas: Canvas::new(width_px, height_px, mode),
        rng: Lcg::new(seed),
        noise: ValueNoise::new(seed),
        frame_count: 0,
    }));
    let engine = api::sandboxed_engine(name, &state, limits);

    let ast = engine.compile(source).map_err(|e| {
        CompileError::new(CompilePhase::Parse, e.to_string()).at_line(e.position().line())
    })?;
    validate_shape(&ast)?;

    let mut scope = Scope::new();
    let initial = engine
        .eval_ast_with_scope::<Dynamic>(&mut scope, &ast)
        .map_err(|e| script_error(CompilePhase::Run, &e))?;
    let this = if initial.is_map() {
        initial
    } else {
        Dynamic::from_map(rhai::Map::new())
    };

    let mut runtime = SketchRuntime {
        name: name.to_string(),
        engine,
        ast,
        scope,
        this,
        state,
        texture: Texture::empty(),
        seed,
        faulted: false,
    };
    runtime
        .invoke_draw()
        .map_err(|e| script_error(CompilePhase::Draw, &e))?;
    runtime.upload();

    log::debug!(
        "[{}] compiled sketch {}x{} seed={}",
        name,
        width_px,
        height_px,
        seed
    );
    Ok(runtime)
}

fn validate_shape(ast: &AST) -> Result<(), CompileError> {
    let mut has_draw = false;
    for f in ast.iter_functions() {
        if f.name == "setup" {
            return Err(CompileError::new(
                CompilePhase::Validate,
                "sketches must not define setup(); the surface is created for you",
            ));
        }
        if f.name == "draw" && f.params.is_empty() {
            has_draw = true;
        }
    }
    if has_draw {
        Ok(())
    } else {
        Err(CompileError::new(
            CompilePhase::Validate,
            "sketch must define fn draw()",
        ))
    }
}

fn script_error(phase: CompilePhase, err: &EvalAltResult) -> CompileError {
    CompileError::new(phase, err.to_string()).at_line(err.position().line())
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

impl SketchRuntime {
    /// Texture mirroring the surface; shared with the scene's material.
    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn frame_count(&self) -> u64 {
        self.state.borrow().frame_count
    }

    pub fn surface_size(&self) -> (u32, u32) {
        let state = self.state.borrow();
        (state.canvas.width(), state.canvas.height())
    }

    /// True once a `draw()` call has failed; the runtime stops advancing.
    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    /// Run `draw()` once more and mark the texture for re-upload. Returns
    /// false if the runtime is (or just became) faulted.
    pub fn advance(&mut self) -> bool {
        if self.faulted {
            return false;
        }
        match self.invoke_draw() {
            Ok(()) => {
                self.upload();
                true
            }
            Err(e) => {
                log::warn!(
                    "[{}] draw() failed at frame {}, sketch halted: {}",
                    self.name,
                    self.frame_count(),
                    e
                );
                self.faulted = true;
                false
            }
        }
    }

    fn invoke_draw(&mut self) -> Result<(), Box<EvalAltResult>> {
        self.state.borrow_mut().canvas.reset_frame_state();
        let options = CallFnOptions::new()
            .eval_ast(false)
            .rewind_scope(true)
            .bind_this_ptr(&mut self.this);
        self.engine
            .call_fn_with_options::<Dynamic>(options, &mut self.scope, &self.ast, "draw", ())?;
        Ok(())
    }

    fn upload(&mut self) {
        let mut state = self.state.borrow_mut();
        self.texture.upload(state.canvas.snapshot());
        state.frame_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::channel;
    use image::Rgba;

    fn build(source: &str, seed: Option<u64>) -> Result<SketchRuntime, CompileError> {
        compile("test", source, seed, 32, 16, RenderMode::P2D, &SketchLimits::default())
    }

    #[test]
    fn parse_render_modes() {
        assert_eq!(RenderMode::parse("p5.P2D"), Some(RenderMode::P2D));
        assert_eq!(RenderMode::parse("2d"), Some(RenderMode::P2D));
        assert_eq!(RenderMode::parse("WEBGL"), Some(RenderMode::Opaque));
        assert_eq!(RenderMode::parse("svg"), None);
    }

    #[test]
    fn compiles_and_draws_initial_frame() {
        let rt = build("fn draw() { background(255, 0, 0); }", Some(1)).unwrap();
        assert_eq!(rt.name(), "test");
        assert_eq!(rt.seed(), 1);
        assert_eq!(rt.surface_size(), (32, 16));
        assert_eq!(rt.frame_count(), 1);
        assert_eq!(rt.texture().version(), 1);
        let img = rt.texture().snapshot().unwrap();
        assert_eq!(img.dimensions(), (32, 16));
        assert_eq!(img.get_pixel(31, 15), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn missing_draw_is_a_validation_error() {
        let err = build("let x = 1;", Some(1)).err().unwrap();
        assert_eq!(err.phase, CompilePhase::Validate);
    }

    #[test]
    fn setup_is_rejected() {
        let err = build("fn setup() {} fn draw() {}", Some(1)).err().unwrap();
        assert_eq!(err.phase, CompilePhase::Validate);
        assert!(err.message.contains("setup"));
    }

    #[test]
    fn create_canvas_is_rejected() {
        let err = build("createCanvas(100, 100); fn draw() {}", Some(1)).err().unwrap();
        assert_eq!(err.phase, CompilePhase::Run);
    }

    #[test]
    fn syntax_error_reports_parse_phase() {
        let err = build("fn draw() { background(0 }", Some(1)).err().unwrap();
        assert_eq!(err.phase, CompilePhase::Parse);
        assert!(err.line.is_some());
    }

    #[test]
    fn initial_draw_failure_reports_draw_phase() {
        let err = build("fn draw() { no_such_primitive(); }", Some(1)).err().unwrap();
        assert_eq!(err.phase, CompilePhase::Draw);
    }

    #[test]
    fn same_seed_same_pixels() {
        let source = r#"
            fn draw() {
                background(noise(1.5, 2.5) * 255);
                noStroke();
                for i in 0..20 {
                    fill(random(255), random(255), random(255));
                    rect(random(width), random(height), 4, 4);
                }
            }
        "#;
        let a = build(source, Some(42)).unwrap();
        let b = build(source, Some(42)).unwrap();
        let c = build(source, Some(43)).unwrap();
        let (pa, pb, pc) = (
            a.texture().snapshot().unwrap(),
            b.texture().snapshot().unwrap(),
            c.texture().snapshot().unwrap(),
        );
        assert_eq!(pa.as_raw(), pb.as_raw());
        assert_ne!(pa.as_raw(), pc.as_raw());
    }

    #[test]
    fn top_level_map_becomes_persistent_this() {
        let source = r#"
            fn draw() {
                this.count += 1;
                background(this.count * 10);
            }
            #{ count: 0 }
        "#;
        let mut rt = build(source, Some(1)).unwrap();
        rt.advance();
        rt.advance();
        let img = rt.texture().snapshot().unwrap();
        assert_eq!(img.get_pixel(0, 0)[0], 30);
        assert_eq!(rt.frame_count(), 3);
    }

    #[test]
    fn frame_count_is_visible_to_draw() {
        let mut rt = build("fn draw() { background(frameCount); }", Some(1)).unwrap();
        assert_eq!(rt.texture().snapshot().unwrap().get_pixel(0, 0)[0], 0);
        rt.advance();
        assert_eq!(rt.texture().snapshot().unwrap().get_pixel(0, 0)[0], 1);
        assert_eq!(rt.texture().version(), 2);
    }

    #[test]
    fn seeded_random_matches_lcg() {
        let rt = build(
            "fn draw() { background(this.r, 0, 0); } #{ r: random(255) }",
            Some(42),
        )
        .unwrap();
        let mut lcg = Lcg::new(42);
        let expected = channel(lcg.next_f64() * 255.0);
        assert_eq!(rt.texture().snapshot().unwrap().get_pixel(3, 3)[0], expected);
    }

    #[test]
    fn sketches_do_not_share_state() {
        let mut a = build(
            "fn draw() { this.n += 1; background(this.n); } #{ n: 0 }",
            Some(1),
        )
        .unwrap();
        let b = build("fn draw() { background(this.n ?? 200); }", Some(1)).unwrap();
        a.advance();
        assert_eq!(a.texture().snapshot().unwrap().get_pixel(0, 0)[0], 2);
        assert_eq!(b.texture().snapshot().unwrap().get_pixel(0, 0)[0], 200);
    }

    #[test]
    fn runtime_failure_faults_but_keeps_last_texture() {
        let source = r#"
            fn draw() {
                if frameCount > 0 { throw "boom"; }
                background(9);
            }
        "#;
        let mut rt = build(source, Some(1)).unwrap();
        assert!(!rt.advance());
        assert!(rt.is_faulted());
        assert!(!rt.advance());
        assert_eq!(rt.texture().version(), 1);
        assert_eq!(rt.texture().snapshot().unwrap().get_pixel(0, 0)[0], 9);
    }

    #[test]
    fn runaway_draw_hits_operation_limit() {
        let limits = SketchLimits {
            max_operations: 10_000,
            ..SketchLimits::default()
        };
        let result = compile(
            "runaway",
            "fn draw() { loop { } }",
            Some(1),
            4,
            4,
            RenderMode::P2D,
            &limits,
        );
        assert_eq!(result.err().unwrap().phase, CompilePhase::Draw);
    }
}
