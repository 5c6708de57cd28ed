pub mod app;
pub mod components;
pub mod controller;
pub mod navigation;
pub mod state;

pub use app::ChatApp;
pub use controller::{Controller, UiAction};
pub use navigation::{Effect, Navigation, Screen};
pub use state::AppState;
