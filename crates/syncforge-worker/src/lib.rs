//! # syncforge-worker
//!
//! Process isolation for pipeline runs.
//!
//! - **Protocol** ([`WorkerMessage`], [`MessageCodec`]): newline-delimited
//!   JSON frames between controller and worker.
//! - **Worker side** ([`serve`]): answers one request on stdin/stdout.
//! - **Controller side** ([`WorkerClient`]): one fresh process per request.
//! - **Batches** ([`BatchCoordinator`]): sequential items, isolated failures.

pub mod batch;
pub mod client;
pub mod codec;
pub mod message;
pub mod worker;

pub use batch::BatchCoordinator;
pub use client::WorkerClient;
pub use codec::MessageCodec;
pub use message::WorkerMessage;
pub use worker::{serve, serve_with};
