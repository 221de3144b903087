//! # querylens-core
//!
//! Core library for querylens - a live monitor for a single distributed
//! query running on a coordinator.
//!
//! This library provides:
//! - Snapshot types for `GET /v1/query/{queryId}`
//! - Duration/data-size parsing and formatting
//! - The refresh state machine, rate histories and skew histograms
//! - An async poller and HTTP client
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! Data flows one way:
//! - **Fetch:** a [`SnapshotSource`] returns an immutable [`QuerySnapshot`]
//! - **Apply:** [`QueryMonitor`] derives rates and updates the (possibly frozen) views
//! - **Render:** callers read the monitor and build [`StageSummary`]/[`TaskRow`] values
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use querylens_core::{Config, CoordinatorClient, QueryPoller};
//!
//! # async fn run() -> querylens_core::Result<()> {
//! let config = Config::load()?;
//! let client = Arc::new(CoordinatorClient::new(&config.coordinator)?);
//!
//! let mut poller = QueryPoller::new("20230101_000000_00001_abcde", client, &config.monitor);
//! let mut updates = poller.subscribe();
//! poller.start();
//!
//! while updates.changed().await.is_ok() {
//!     let monitor = poller.monitor();
//!     println!("{:?}", monitor.current().map(|s| &s.state));
//!     if monitor.is_terminated() {
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use client::{CoordinatorClient, SnapshotSource};
pub use config::Config;
pub use error::{Error, Result};
pub use histogram::SkewHistogram;
pub use history::{RateHistories, RateHistory};
pub use monitor::{LoadState, QueryMonitor, SnapshotView};
pub use poller::QueryPoller;
pub use summary::{task_rows, StageSummary, TaskFilter, TaskRow};
pub use types::*;

// Public modules
pub mod client;
pub mod config;
pub mod error;
pub mod failure;
pub mod format;
pub mod histogram;
pub mod history;
pub mod logging;
pub mod monitor;
pub mod poller;
pub mod stage;
pub mod summary;
pub mod task_id;
pub mod types;
