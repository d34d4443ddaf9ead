pub mod config;
pub mod filewatcher;
pub mod http;
pub mod mock;
pub mod raml;
