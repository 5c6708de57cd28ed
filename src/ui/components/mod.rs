pub mod auth;
pub mod board;
pub mod channel_list;
pub mod chat_area;
pub mod debug_panel;
pub mod friends;
pub mod input_bar;
pub mod sidebar;
