use eframe::egui;

use crate::ui::controller::UiAction;
use crate::ui::state::AppState;

/// Server list with the signed-in user and a logout button.
pub fn render(ui: &mut egui::Ui, state: &AppState, actions: &mut Vec<UiAction>) {
    ui.heading("Servers");
    ui.separator();

    let selected = state.navigation.selected_server();
    for server in state.navigation.servers() {
        let unread: usize = state
            .unread
            .iter()
            .filter(|(conversation, _)| {
                conversation
                    .key
                    .split_once('/')
                    .is_some_and(|(name, _)| name == server.name)
            })
            .map(|(_, count)| count)
            .sum();

        let label = if unread > 0 {
            format!("{} ({unread})", server.name)
        } else {
            server.name.clone()
        };
        if ui
            .selectable_label(selected == Some(server.name.as_str()), label)
            .clicked()
        {
            actions.push(UiAction::SelectServer(server.name.clone()));
        }
    }

    ui.separator();
    if let Some(user) = &state.user {
        ui.horizontal(|ui| {
            ui.colored_label(egui::Color32::GREEN, "●");
            ui.label(user.as_str());
        });
    }
    if ui.button("Log out").clicked() {
        actions.push(UiAction::Logout);
    }
}
