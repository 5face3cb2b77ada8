pub mod config;
pub mod logger;
pub mod model;
pub mod state;
pub mod guard;
pub mod downstream;
