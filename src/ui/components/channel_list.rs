use eframe::egui;

use crate::common::{ChannelKind, Conversation};
use crate::ui::controller::UiAction;
use crate::ui::navigation::Screen;
use crate::ui::state::{AppState, RenameForm};

pub fn render(ui: &mut egui::Ui, state: &mut AppState, actions: &mut Vec<UiAction>) {
    let Some(server_name) = state.navigation.selected_server().map(str::to_string) else {
        return;
    };
    let Some(server) = state
        .navigation
        .servers()
        .iter()
        .find(|server| server.name == server_name)
        .cloned()
    else {
        return;
    };
    let selected = match state.navigation.screen() {
        Screen::ChannelSelected { channel, .. } => Some(channel.clone()),
        _ => None,
    };

    ui.heading(&server.name);
    ui.separator();

    for channel in &server.channels {
        let editing = state
            .rename
            .as_ref()
            .is_some_and(|form| form.server == server.name && form.from == channel.name);
        if editing {
            render_rename(ui, state, actions);
            continue;
        }

        ui.horizontal(|ui| {
            let icon = match channel.kind {
                ChannelKind::Message => "#",
                ChannelKind::Board => "📋",
            };
            let unread = state.unread_count(&Conversation::channel(&server.name, &channel.name));
            let label = if unread > 0 {
                format!("{icon} {} ({unread})", channel.name)
            } else {
                format!("{icon} {}", channel.name)
            };
            if ui
                .selectable_label(selected.as_deref() == Some(channel.name.as_str()), label)
                .clicked()
            {
                actions.push(UiAction::SelectChannel(channel.name.clone()));
            }
            if ui.small_button("✏").on_hover_text("Rename").clicked() {
                state.rename = Some(RenameForm {
                    server: server.name.clone(),
                    from: channel.name.clone(),
                    to: channel.name.clone(),
                });
            }
        });
    }
}

fn render_rename(ui: &mut egui::Ui, state: &mut AppState, actions: &mut Vec<UiAction>) {
    let Some(form) = state.rename.as_mut() else {
        return;
    };
    let mut cancel = false;
    ui.horizontal(|ui| {
        let response = ui.text_edit_singleline(&mut form.to);
        let submit = ui.small_button("✔").clicked()
            || (response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)));
        if submit {
            actions.push(UiAction::RenameChannel {
                server: form.server.clone(),
                from: form.from.clone(),
                to: form.to.clone(),
            });
        }
        cancel = ui.small_button("✖").clicked();
    });
    if cancel {
        state.rename = None;
    }
}
