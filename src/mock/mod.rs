pub mod example;
pub mod handler;
pub mod negotiate;
pub mod selector;
