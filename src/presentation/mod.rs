// Presentation layer - HTTP surface over the latest panel
pub mod app_state;
pub mod handlers;
pub mod panel;
