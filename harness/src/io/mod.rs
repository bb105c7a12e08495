//! Side-effecting parts of the harness: filesystem, subprocesses, network.

pub mod config;
pub mod context;
pub mod init;
pub mod llm;
pub mod process;
pub mod transcript;
pub mod writer;
