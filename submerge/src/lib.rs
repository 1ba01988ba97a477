//! A multi-client command server for a shared, in-memory keyed tree
//! database: an administrator spawns client workers, each serving one
//! window (an interactive terminal or a file pair) against the shared
//! [`submerge_rowdb::Tree`], under a global pause barrier and a
//! quiescence ("wait until idle") barrier.

pub mod admin;
pub mod control;
pub mod interpreter;
pub mod reaper;
pub mod tokenizer;
pub mod window;
pub mod worker;

pub use admin::Admin;
