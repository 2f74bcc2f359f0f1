use egui::{Align2, Color32, RichText, Stroke};

use crate::panel::InfoPanel;
use crate::scene::SceneState;
use crate::tooltip::{Tooltip, TooltipKind};

/// What the overlay asks the application to do this frame.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct GuiResponse {
    pub back_clicked: bool,
}

pub fn kind_color(kind: TooltipKind) -> Color32 {
    match kind {
        TooltipKind::Success => Color32::from_rgb(0x27, 0xae, 0x60),
        TooltipKind::Info => Color32::from_rgb(0x29, 0x80, 0xb9),
        TooltipKind::Danger => Color32::from_rgb(0xc0, 0x39, 0x2b),
    }
}

/// Draws the loading indicator until a scene exists, then tooltips and the info panel.
pub fn draw(ctx: &egui::CtxRef, scene: Option<&SceneState>) -> GuiResponse {
    let scene = match scene {
        Some(scene) => scene,
        None => {
            draw_loading(ctx);
            return GuiResponse::default();
        }
    };

    for (index, tooltip) in scene.tooltips.iter().enumerate() {
        if !tooltip.hidden {
            draw_tooltip(ctx, index, tooltip);
        }
    }

    let mut response = GuiResponse::default();
    if scene.panel.visible {
        response.back_clicked = draw_panel(ctx, &scene.panel);
    }
    response
}

fn draw_loading(ctx: &egui::CtxRef) {
    egui::Area::new("loading")
        .anchor(Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
        .interactable(false)
        .show(ctx, |ui| {
            ui.label(RichText::new("Loading...").heading().color(Color32::WHITE));
        });
}

fn draw_tooltip(ctx: &egui::CtxRef, index: usize, tooltip: &Tooltip) {
    let color = kind_color(tooltip.kind);
    let stroke = if tooltip.active {
        Stroke::new(2.0, Color32::WHITE)
    } else {
        Stroke::new(1.0, color)
    };
    let fill = if tooltip.active {
        color
    } else {
        color.linear_multiply(0.6)
    };

    egui::Area::new(("tooltip", index))
        .fixed_pos(egui::pos2(tooltip.screen_pos[0], tooltip.screen_pos[1]))
        .interactable(false)
        .show(ctx, |ui| {
            egui::Frame::popup(&ctx.style())
                .fill(fill)
                .stroke(stroke)
                .show(ui, |ui| {
                    let text = RichText::new(&tooltip.label).color(Color32::WHITE);
                    ui.label(if tooltip.active { text.strong() } else { text });
                });
        });
}

/// Returns true when "Back" was clicked.
fn draw_panel(ctx: &egui::CtxRef, panel: &InfoPanel) -> bool {
    let mut back = false;
    egui::Window::new(RichText::new(&panel.id).strong())
        .id(egui::Id::new("info_panel"))
        .anchor(Align2::RIGHT_TOP, egui::vec2(-24.0, 24.0))
        .collapsible(false)
        .resizable(false)
        .show(ctx, |ui| {
            egui::Grid::new("telemetry")
                .num_columns(2)
                .striped(true)
                .show(ui, |ui| {
                    for (name, value) in [
                        ("Status", &panel.status),
                        ("Flight hours", &panel.flight_hours),
                        ("Battery", &panel.battery_status),
                        ("Location", &panel.location),
                        ("Mission", &panel.mission),
                    ] {
                        ui.label(name);
                        ui.label(value.as_str());
                        ui.end_row();
                    }
                });

            ui.separator();
            ui.label(RichText::new("Maintenance").strong());
            egui::ScrollArea::vertical()
                .max_height(180.0)
                .show(ui, |ui| {
                    if panel.maintenance_logs.is_empty() {
                        ui.label("No entries");
                    }
                    for log in &panel.maintenance_logs {
                        ui.label(RichText::new(&log.date).small());
                        ui.label(log.description.as_str());
                        ui.label(RichText::new(&log.technician).italics());
                        ui.add_space(4.0);
                    }
                });

            ui.separator();
            if ui.button("Back").clicked() {
                back = true;
            }
        });
    back
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_its_own_colour() {
        let colors = [
            kind_color(TooltipKind::Success),
            kind_color(TooltipKind::Info),
            kind_color(TooltipKind::Danger),
        ];
        assert_ne!(colors[0], colors[1]);
        assert_ne!(colors[1], colors[2]);
        assert_ne!(colors[0], colors[2]);
    }
}
