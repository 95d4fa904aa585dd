#[macro_use]
extern crate tracing;

mod app;
pub mod cli;
mod console;
mod logging;
mod output;

pub use app::App;
pub use cli::{
    Cli,
    Command,
};
pub use logging::{
    init_errors,
    init_logging,
};
