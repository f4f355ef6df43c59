pub mod app;
pub mod completion;
pub mod config;
pub mod credential;
pub mod http;
pub mod palm;
pub mod repl;
pub mod runtime;

pub use app::run;
