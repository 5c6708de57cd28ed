use eframe::egui;

use crate::common::ChatMessage;

pub fn render(ui: &mut egui::Ui, id: &str, messages: &[ChatMessage], me: Option<&str>) {
    egui::ScrollArea::vertical()
        .id_salt(id)
        .stick_to_bottom(true)
        .auto_shrink([false, false])
        .max_height((ui.available_height() - 36.0).max(0.0))
        .show(ui, |ui| {
            if messages.is_empty() {
                ui.label(egui::RichText::new("No messages yet").weak());
            }
            for message in messages {
                ui.horizontal_wrapped(|ui| {
                    let time = message.timestamp.format("%H:%M");
                    ui.label(egui::RichText::new(format!("[{time}]")).weak());
                    let sender = egui::RichText::new(&message.sender).strong();
                    if Some(message.sender.as_str()) == me {
                        ui.label(sender.color(egui::Color32::LIGHT_BLUE));
                    } else {
                        ui.label(sender);
                    }
                    ui.label(&message.content);
                });
            }
        });
}
