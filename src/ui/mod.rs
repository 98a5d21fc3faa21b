pub mod app;
pub mod state;

pub use app::TerminalApp;
pub use state::AppState;
