use eframe::egui;

use crate::common::ConnectionState;
use crate::ui::state::AppState;

pub fn render(ui: &mut egui::Ui, state: &AppState) {
    ui.heading("Debug Info");
    ui.separator();

    ui.horizontal(|ui| {
        ui.label("Open connections:");
        let open = state
            .connections
            .values()
            .filter(|status| status.state == ConnectionState::Open)
            .count();
        ui.label(format!("{open}"));
    });

    ui.separator();
    ui.label("Connections:");
    for (conversation, status) in &state.connections {
        let color = match status.state {
            ConnectionState::Open => egui::Color32::GREEN,
            ConnectionState::Connecting => egui::Color32::YELLOW,
            ConnectionState::Closed => egui::Color32::GRAY,
            ConnectionState::Errored => egui::Color32::RED,
        };
        ui.horizontal(|ui| {
            ui.colored_label(color, "●");
            ui.label(conversation.to_string());
            ui.label(egui::RichText::new(format!("#{} {}", status.generation, status.state)).weak());
        });
    }

    ui.separator();
    ui.label("Recent Events:");
    egui::ScrollArea::vertical()
        .id_salt("debug_events")
        .max_height(240.0)
        .show(ui, |ui| {
            for event in state.debug_events.iter().rev().take(20) {
                let time_str = event.timestamp.format("%H:%M:%S");
                let color = match event.event_type.as_str() {
                    "ERROR" | "SESSION_EXPIRED" => egui::Color32::RED,
                    "CONNECTION" => egui::Color32::YELLOW,
                    "LOGGED_IN" => egui::Color32::GREEN,
                    _ => egui::Color32::WHITE,
                };

                ui.horizontal(|ui| {
                    ui.colored_label(color, format!("[{}]", time_str));
                    ui.label(&event.message);
                });
            }
        });
}
