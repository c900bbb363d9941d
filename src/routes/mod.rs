pub mod ai;
pub mod health;
pub mod menu;
