use eframe::egui;

/// What the input bar produced this frame.
#[derive(Default)]
pub struct InputOutcome {
    pub submitted: Option<String>,
    pub focused: bool,
}

pub fn render(ui: &mut egui::Ui, input_text: &mut String, enabled: bool) -> InputOutcome {
    let mut outcome = InputOutcome::default();
    let mut send = false;
    ui.horizontal(|ui| {
        let response = ui.add_enabled(
            enabled,
            egui::TextEdit::singleline(input_text).hint_text("Message"),
        );
        outcome.focused = response.gained_focus() || response.clicked();
        if ui.add_enabled(enabled, egui::Button::new("Send")).clicked() {
            send = true;
        }

        if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
            send = true;
        }
    });

    if send && !input_text.trim().is_empty() {
        let message = input_text.clone();
        input_text.clear();
        outcome.submitted = Some(message);
    }

    outcome
}
