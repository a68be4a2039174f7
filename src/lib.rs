#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stderr)]
#![deny(clippy::print_stdout)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

pub mod cli;
pub mod error;
pub mod server;

mod config;
mod entities;
mod llm;
mod orchestrator;
mod registry;
mod render;
mod search;
mod sources;
mod utils;
