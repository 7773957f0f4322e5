//! Terminal user interface: report rendering and the interactive menu.

pub mod menu;
pub mod output;

pub use menu::run_menu;
pub use output::confirm;
