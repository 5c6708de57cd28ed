use eframe::egui;
use tokio::sync::mpsc;

use crate::common::{Action, ChannelKind, ConnectionState, NetworkEvent};

use super::components::{
    auth, board, channel_list, chat_area, debug_panel, friends, input_bar, sidebar,
};
use super::controller::{Controller, UiAction};
use super::navigation::Screen;

pub struct ChatApp {
    controller: Controller,
    event_receiver: mpsc::Receiver<NetworkEvent>,
}

impl ChatApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        controller: Controller,
        event_receiver: mpsc::Receiver<NetworkEvent>,
    ) -> Self {
        Self {
            controller,
            event_receiver,
        }
    }

    fn handle_network_events(&mut self) {
        while let Ok(event) = self.event_receiver.try_recv() {
            self.controller.apply(event);
        }
    }

    fn render_signed_in(&mut self, ctx: &egui::Context, actions: &mut Vec<UiAction>) {
        let state = &mut self.controller.state;

        egui::SidePanel::left("server_sidebar")
            .resizable(true)
            .default_width(200.0)
            .show(ctx, |ui| {
                sidebar::render(ui, state, actions);
                ui.separator();
                channel_list::render(ui, state, actions);
                ui.separator();
                friends::render(ui, state, actions);
            });

        egui::SidePanel::right("debug_panel")
            .resizable(true)
            .default_width(300.0)
            .show(ctx, |ui| {
                debug_panel::render(ui, state);
            });

        let screen = state.navigation.screen().clone();
        let me = state.user.as_ref().map(|user| user.as_str().to_string());
        egui::CentralPanel::default().show(ctx, |ui| match &screen {
            Screen::ChannelSelected {
                server,
                channel,
                kind: ChannelKind::Message,
            } => {
                ui.heading(format!("# {channel}"));
                if let Some(notice) = &state.notice {
                    ui.label(egui::RichText::new(notice).italics());
                }
                ui.separator();
                let Some(conversation) = state.navigation.channel_conversation() else {
                    return;
                };
                let open = state
                    .connections
                    .get(&conversation)
                    .is_some_and(|status| status.state == ConnectionState::Open);
                chat_area::render(
                    ui,
                    &format!("chat_{server}_{channel}"),
                    state.store.history(&conversation),
                    me.as_deref(),
                );
                if let Some(error) = state.error(Action::Send).or(state.error(Action::Connect)) {
                    ui.colored_label(egui::Color32::RED, error);
                }
                let outcome = input_bar::render(ui, state.draft_mut(&conversation), open);
                if outcome.focused {
                    actions.push(UiAction::Focus(conversation.clone()));
                }
                if let Some(content) = outcome.submitted {
                    actions.push(UiAction::SendMessage {
                        conversation,
                        content,
                    });
                }
            }
            Screen::ChannelSelected {
                server,
                channel,
                kind: ChannelKind::Board,
            } => {
                ui.heading(format!("📋 {channel}"));
                ui.separator();
                board::render(ui, state, server, actions);
            }
            Screen::ServerSelected { server } => {
                ui.heading(server);
                ui.label("Pick a channel on the left.");
            }
            _ => {
                ui.heading("Welcome");
                ui.label("Pick a server on the left.");
            }
        });

        let Some(friend) = state.navigation.friend().cloned() else {
            return;
        };
        let Some(conversation) = state.navigation.friend_conversation() else {
            return;
        };
        let mut open = true;
        egui::Window::new(format!("Chat with {}", friend.name))
            .id(egui::Id::new("friend_chat"))
            .open(&mut open)
            .default_size([360.0, 420.0])
            .show(ctx, |ui| {
                let connected = state
                    .connections
                    .get(&conversation)
                    .is_some_and(|status| status.state == ConnectionState::Open);
                chat_area::render(
                    ui,
                    &format!("friend_{}", friend.id),
                    state.store.history(&conversation),
                    me.as_deref(),
                );
                if let Some(error) = state.error(Action::History) {
                    ui.colored_label(egui::Color32::RED, error);
                }
                let outcome = input_bar::render(ui, state.draft_mut(&conversation), connected);
                if outcome.focused {
                    actions.push(UiAction::Focus(conversation.clone()));
                }
                if let Some(content) = outcome.submitted {
                    actions.push(UiAction::SendMessage {
                        conversation: conversation.clone(),
                        content,
                    });
                }
            });
        if !open {
            actions.push(UiAction::CloseFriend);
        }
    }
}

impl eframe::App for ChatApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_network_events();

        let mut actions = Vec::new();
        match self.controller.state.navigation.screen().clone() {
            Screen::Unauthenticated { registering } => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Guild Chat");
                    ui.separator();
                    auth::render(ui, &mut self.controller.state, registering, &mut actions);
                });
            }
            _ => self.render_signed_in(ctx, &mut actions),
        }

        for action in actions {
            self.controller.dispatch(action);
        }

        ctx.request_repaint();
    }
}
