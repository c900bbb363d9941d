pub mod menu;
pub mod suggestion;
