use eframe::egui;

use crate::common::Action;
use crate::ui::controller::UiAction;
use crate::ui::state::AppState;

pub fn render(ui: &mut egui::Ui, state: &mut AppState, server: &str, actions: &mut Vec<UiAction>) {
    ui.collapsing("New post", |ui| {
        ui.add(egui::TextEdit::singleline(&mut state.post_form.title).hint_text("Title"));
        ui.add(
            egui::TextEdit::multiline(&mut state.post_form.content)
                .hint_text("Content")
                .desired_rows(3),
        );
        if ui.button("Post").clicked() {
            actions.push(UiAction::CreatePost {
                title: state.post_form.title.trim().to_string(),
                content: state.post_form.content.trim().to_string(),
            });
        }
    });
    if let Some(error) = state.error(Action::Board) {
        ui.colored_label(egui::Color32::RED, error);
    }
    ui.separator();

    let me = state.user.as_ref().map(|user| user.as_str().to_string());
    let posts = state.posts_for(server).to_vec();
    if posts.is_empty() {
        ui.label(egui::RichText::new("No posts yet").weak());
        return;
    }

    egui::ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui| {
            for post in posts {
                ui.group(|ui| {
                    ui.horizontal(|ui| {
                        ui.label(egui::RichText::new(&post.title).strong());
                        ui.label(egui::RichText::new(format!("by {}", post.username)).weak());
                    });
                    ui.label(&post.content);
                    ui.horizontal(|ui| {
                        if ui.button(format!("▲ {}", post.votes)).clicked() {
                            actions.push(UiAction::Upvote {
                                post_id: post.id.clone(),
                            });
                        }
                        if me.as_deref() == Some(post.username.as_str())
                            && ui.button("Delete").clicked()
                        {
                            actions.push(UiAction::DeletePost(post.clone()));
                        }
                    });

                    for comment in &post.comments {
                        let author = comment.author.as_deref().unwrap_or("anonymous");
                        ui.label(format!("  {author}: {}", comment.content));
                    }

                    let draft = state.comment_drafts.entry(post.id.clone()).or_default();
                    ui.horizontal(|ui| {
                        ui.add(egui::TextEdit::singleline(draft).hint_text("Comment"));
                        if ui.small_button("Reply").clicked() && !draft.trim().is_empty() {
                            actions.push(UiAction::AddComment {
                                post_id: post.id.clone(),
                                comment: draft.trim().to_string(),
                            });
                        }
                    });
                });
            }
        });
}
