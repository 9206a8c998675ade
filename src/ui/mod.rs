pub mod composer;
pub mod layout;
pub mod render;
pub mod text_metrics;
pub mod theme;
pub mod typewriter;
