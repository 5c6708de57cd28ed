use eframe::egui;

use crate::common::{Action, Conversation};
use crate::ui::controller::UiAction;
use crate::ui::state::AppState;

pub fn render(ui: &mut egui::Ui, state: &mut AppState, actions: &mut Vec<UiAction>) {
    ui.heading("Friends");
    ui.separator();

    ui.horizontal(|ui| {
        ui.add(egui::TextEdit::singleline(&mut state.friend_input).hint_text("Friend id"));
        if ui.button("Add").clicked() && !state.friend_input.trim().is_empty() {
            actions.push(UiAction::AddFriend(state.friend_input.trim().to_string()));
        }
    });
    if let Some(error) = state.error(Action::Friends) {
        ui.colored_label(egui::Color32::RED, error);
    }

    if state.friends.is_empty() {
        ui.label("No friends added");
        return;
    }

    let open = state.navigation.friend().map(|friend| friend.id.clone());
    for friend in &state.friends {
        let unread = state.unread_count(&Conversation::friend(&friend.id));
        let label = if unread > 0 {
            format!("{} ({unread})", friend.name)
        } else {
            friend.name.clone()
        };
        if ui
            .selectable_label(open.as_deref() == Some(friend.id.as_str()), label)
            .on_hover_text(&friend.id)
            .clicked()
        {
            actions.push(UiAction::OpenFriend(friend.clone()));
        }
    }
}
