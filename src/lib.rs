pub mod api;
pub mod cli;
pub mod dre;
pub mod error;
pub mod fmt;
pub mod logging;
pub mod models;
pub mod settings;
pub mod tree;
pub mod tui;
