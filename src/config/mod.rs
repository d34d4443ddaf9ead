pub mod compiled;
pub mod manager;
pub mod options;
