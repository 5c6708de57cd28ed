//! Login and registration forms.

use eframe::egui;

use crate::common::Action;
use crate::ui::controller::UiAction;
use crate::ui::state::AppState;

pub fn render(ui: &mut egui::Ui, state: &mut AppState, registering: bool, actions: &mut Vec<UiAction>) {
    ui.vertical_centered(|ui| {
        ui.set_max_width(320.0);
        if let Some(notice) = &state.notice {
            ui.label(egui::RichText::new(notice).italics());
            ui.add_space(8.0);
        }
        if registering {
            render_register(ui, state, actions);
        } else {
            render_login(ui, state, actions);
        }
    });
}

fn render_login(ui: &mut egui::Ui, state: &mut AppState, actions: &mut Vec<UiAction>) {
    ui.heading("Sign in");
    ui.add_space(8.0);

    let form = &mut state.login_form;
    ui.add(egui::TextEdit::singleline(&mut form.login_id).hint_text("User id"));
    let password =
        ui.add(egui::TextEdit::singleline(&mut form.password).password(true).hint_text("Password"));
    let submit = ui.button("Sign in").clicked()
        || (password.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)));
    if submit {
        actions.push(UiAction::Login {
            login_id: form.login_id.trim().to_string(),
            password: form.password.clone(),
        });
    }

    if let Some(error) = state.error(Action::Login).or(state.error(Action::RestoreSession)) {
        ui.colored_label(egui::Color32::RED, error);
    }
    ui.add_space(8.0);
    if ui.link("Create an account").clicked() {
        actions.push(UiAction::ShowRegister(true));
    }
}

fn render_register(ui: &mut egui::Ui, state: &mut AppState, actions: &mut Vec<UiAction>) {
    ui.heading("Create an account");
    ui.add_space(8.0);

    let form = &mut state.register_form;
    ui.add(egui::TextEdit::singleline(&mut form.email).hint_text("Email"));
    ui.add(egui::TextEdit::singleline(&mut form.username).hint_text("Display name"));
    ui.add(egui::TextEdit::singleline(&mut form.user_id).hint_text("User id"));
    ui.add(egui::TextEdit::singleline(&mut form.password).password(true).hint_text("Password"));
    ui.add(egui::TextEdit::singleline(&mut form.birthday).hint_text("Birthday (YYYY-MM-DD)"));
    if ui.button("Register").clicked() {
        actions.push(UiAction::Register(form.clone()));
    }

    if let Some(error) = state.error(Action::Register).or(state.error(Action::Login)) {
        ui.colored_label(egui::Color32::RED, error);
    }
    ui.add_space(8.0);
    if ui.link("Back to sign in").clicked() {
        actions.push(UiAction::ShowRegister(false));
    }
}
