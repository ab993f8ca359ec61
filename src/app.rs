use std::time::Duration;

use crate::scheduler::{PipelineState, SchedulerHandle};
use crate::state::{self, ModelStatus, SharedState};

pub struct EyeRecolorApp {
    shared_state: SharedState,
    handle: SchedulerHandle,
    texture: Option<egui::TextureHandle>,
}

impl EyeRecolorApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        shared_state: SharedState,
        handle: SchedulerHandle,
    ) -> Self {
        Self {
            shared_state,
            handle,
            texture: None,
        }
    }

    // swaps in the newest presented frame, if there is one
    fn update_texture(&mut self, ctx: &egui::Context) {
        let Some(image) = state::lock(&self.shared_state).image.take() else {
            return;
        };

        let size = [image.width() as usize, image.height() as usize];
        let ui_image = egui::ColorImage::from_rgba_unmultiplied(size, image.as_raw());
        match &mut self.texture {
            Some(texture) => texture.set(ui_image, egui::TextureOptions::default()),
            None => {
                self.texture =
                    Some(ctx.load_texture("frame", ui_image, egui::TextureOptions::default()))
            }
        }
    }
}

fn model_status_label(status: &ModelStatus) -> String {
    match status {
        ModelStatus::Loading => "Model is loading...".to_string(),
        ModelStatus::Loaded => "Model is loaded.".to_string(),
        ModelStatus::Failed(reason) => format!("Failed to load model. ({reason})"),
    }
}

impl eframe::App for EyeRecolorApp {
    fn update(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        self.update_texture(ctx);

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Quit").clicked() {
                        frame.close();
                    }
                });
            });
        });

        egui::SidePanel::left("side_panel").show(ctx, |ui| {
            let state = state::lock(&self.shared_state);

            ui.label(model_status_label(&state.model));
            ui.label(format!("Pipeline: {:?}", state.pipeline));
            if let Some((w, h)) = state.resolution {
                ui.label(format!("Resolution: {w}x{h}"));
            }
            ui.separator();

            let mut debug = state.debug;
            if ui.checkbox(&mut debug, "Debug overlay").changed() {
                self.handle.set_debug(debug);
            }
            if ui.button("Toggle debug").clicked() {
                self.handle.toggle_debug();
            }

            if state.pipeline != PipelineState::Idle {
                ui.separator();
                match state.mean_fps {
                    Some(fps) => ui.label(format!("{fps:.0} fps (mean of last 10)")),
                    None => ui.label("- fps"),
                };
                ui.label(format!("{} face(s)", state.face_count));
                ui.label(format!("{} frames drawn", state.cycles));
            }

            if !state.notices.is_empty() {
                ui.separator();
                for notice in &state.notices {
                    ui.colored_label(egui::Color32::RED, notice);
                }
            }
        });

        egui::CentralPanel::default().show(ctx, |ui| match &self.texture {
            Some(texture) => {
                let [w, h] = texture.size();
                let ui_img_width = ui.available_width();
                let ui_img_height = ui_img_width / (w as f32 / h.max(1) as f32);
                ui.image(texture, egui::Vec2::new(ui_img_width, ui_img_height));
            }
            None => {
                ui.label("Waiting for the camera...");
            }
        });

        ctx.request_repaint_after(Duration::from_millis(1000 / 30));
    }

    fn on_close_event(&mut self) -> bool {
        self.handle.stop();
        true
    }
}

impl Drop for EyeRecolorApp {
    fn drop(&mut self) {
        self.handle.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_labels() {
        assert_eq!(model_status_label(&ModelStatus::Loading), "Model is loading...");
        assert_eq!(model_status_label(&ModelStatus::Loaded), "Model is loaded.");
        assert!(model_status_label(&ModelStatus::Failed("gone".into()))
            .starts_with("Failed to load model."));
    }
}
