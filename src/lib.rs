pub mod api;
pub mod app;
pub mod config;
pub mod geo;
pub mod persistence;
pub mod persona;
pub mod runtime;
pub mod settings;
pub mod speech;
pub mod state;
pub mod terminal;
pub mod types;
pub mod ui;
pub mod util;

#[cfg(test)]
mod test_support;
