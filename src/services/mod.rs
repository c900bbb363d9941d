pub mod ai;
pub mod menu;
