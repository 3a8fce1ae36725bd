use std::path::PathBuf;
use std::time::Instant;

use anyhow::{anyhow, Context};
use eframe::egui;

use sketch_gallery::artwork::ArtworkFactory;
use sketch_gallery::config::GalleryConfig;
use sketch_gallery::focus::Resolution;
use sketch_gallery::gallery::Gallery;
use sketch_gallery::render::{FrameStats, OrbitControls, SoftwareRenderer};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => GalleryConfig::load(&path)
            .with_context(|| format!("loading gallery manifest {}", path.display()))?,
        None => GalleryConfig::demo().context("parsing the bundled demo gallery")?,
    };
    let app = GalleryApp::from_config(&config)?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([config.window.width, config.window.height])
            .with_title(config.window.title.clone()),
        ..Default::default()
    };

    eframe::run_native(
        &config.window.title,
        options,
        Box::new(move |_cc| Ok(Box::new(app))),
    )
    .map_err(|e| anyhow!("viewer exited: {e}"))
}

struct GalleryApp {
    gallery: Gallery<SoftwareRenderer, OrbitControls>,
    render_scale: f32,
    texture: Option<egui::TextureHandle>,
    uploaded_version: u64,
    stats: FrameStats,
    show_stats: bool,
    last_frame: Option<Instant>,
    status: String,
}

impl GalleryApp {
    fn from_config(config: &GalleryConfig) -> anyhow::Result<Self> {
        let room = config.room()?;
        let camera = config.camera();
        let factory = ArtworkFactory::new()
            .with_loader(config.loader())
            .with_limits(config.sketch.clone());

        let controls = OrbitControls::from_camera(&camera);
        let mut gallery = Gallery::new(SoftwareRenderer::new(1, 1), controls)
            .with_camera(camera)
            .with_room(&room);

        let mut failed = 0;
        for spec in config.artwork_specs()? {
            let unit = factory.build(spec);
            if unit.error.is_some() {
                failed += 1;
            }
            gallery.add_artwork(unit);
        }
        log::info!(
            "gallery ready: {} artworks ({} failed)",
            config.artworks.len(),
            failed
        );

        Ok(Self {
            gallery,
            render_scale: config.render.scale.clamp(0.1, 2.0),
            texture: None,
            uploaded_version: 0,
            stats: FrameStats::default(),
            show_stats: true,
            last_frame: None,
            status: String::new(),
        })
    }

    fn handle_input(&mut self, ui: &egui::Ui, response: &egui::Response) {
        let controls = self.gallery.navigation_mut();
        if response.dragged() {
            let delta = response.drag_delta();
            controls.rotate(delta.x, delta.y);
        }
        if response.hovered() {
            let scroll = ui.input(|i| i.raw_scroll_delta.y);
            if scroll.abs() > 0.1 {
                controls.dolly(scroll);
            }
        }
        if ui.input(|i| i.key_pressed(egui::Key::F3)) {
            self.show_stats = !self.show_stats;
        }
    }

    fn upload_frame(&mut self, ctx: &egui::Context) {
        let renderer = self.gallery.renderer();
        if renderer.version() == self.uploaded_version && self.texture.is_some() {
            return;
        }
        let frame = renderer.framebuffer();
        let size = [frame.width() as usize, frame.height() as usize];
        let image = egui::ColorImage::from_rgba_unmultiplied(size, frame.as_raw());
        match &mut self.texture {
            Some(handle) => handle.set(image, egui::TextureOptions::LINEAR),
            None => {
                self.texture = Some(ctx.load_texture("gallery", image, egui::TextureOptions::LINEAR))
            }
        }
        self.uploaded_version = renderer.version();
    }
}

impl eframe::App for GalleryApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        if let Some(prev) = self.last_frame.replace(now) {
            self.stats.record(now.duration_since(prev).as_secs_f64() * 1000.0);
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| {
                let available = ui.available_size();
                let (rect, response) =
                    ui.allocate_exact_size(available, egui::Sense::click_and_drag());
                self.handle_input(ui, &response);

                let w = (available.x * self.render_scale).max(1.0) as u32;
                let h = (available.y * self.render_scale).max(1.0) as u32;
                self.gallery.renderer_mut().resize(w, h);

                let report = self.gallery.tick();
                match report.resolution {
                    Resolution::Focused(id) | Resolution::PanelRevealed(id) => {
                        if let Some(node) = self.gallery.scene().get(id) {
                            self.status = node.name.clone();
                        }
                    }
                    Resolution::Unchanged => {}
                }

                self.upload_frame(ctx);
                if let Some(texture) = &self.texture {
                    let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
                    ui.painter().image(texture.id(), rect, uv, egui::Color32::WHITE);
                }

                if self.show_stats {
                    let text = format!(
                        "{}\ntick {} | focus: {}",
                        self.stats.overlay_text(),
                        self.gallery.ticks(),
                        if self.status.is_empty() { "-" } else { &self.status }
                    );
                    ui.painter().text(
                        rect.left_top() + egui::vec2(8.0, 8.0),
                        egui::Align2::LEFT_TOP,
                        text,
                        egui::FontId::monospace(12.0),
                        egui::Color32::from_rgb(220, 220, 220),
                    );
                }
            });

        ctx.request_repaint();
    }
}
