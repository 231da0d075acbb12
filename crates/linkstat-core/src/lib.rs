//! # linkstat-core
//!
//! Core functionality for linkstat - a link reachability checker that never
//! forgets a request.
//!
//! Submitted URL batches are probed, numbered, and kept in memory for fast
//! report lookups, while a set of JSON ledgers on disk records every completed
//! result and every request still in flight. After a crash the completed
//! ledger rebuilds the in-memory index and the pending ledgers say exactly
//! which requests need to be rerun.
//!
//! ## Architecture
//!
//! - **Index**: [`VolatileIndex`], the sequence-numbered in-memory store
//! - **Ledgers**: [`DurableStore`], the completed ledger plus two pending ledgers
//! - **Checking**: the [`Probe`] trait and its HTTP implementation [`HttpProbe`]
//! - **Reports**: [`ReportGenerator`] renders numbered status lines into PDF reports
//! - **Service**: [`ProcessingService`] ties them together and owns the
//!   background persistence and shutdown drain
//! - **Error Handling**: one error enum with categories and recovery hints
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use linkstat_core::{Config, LinkRequest, NumberRequest, ProcessingService};
//!
//! # async fn run() -> linkstat_core::Result<()> {
//! let config = Config::load()?;
//! let service = ProcessingService::open(&config).await?;
//!
//! let result = service
//!     .submit_links(LinkRequest::new(["example.com", "example.org"]))
//!     .await?;
//! let report = service
//!     .request_report(NumberRequest::new([result.number]))
//!     .await?;
//! println!("{}", report.text());
//!
//! service.shutdown(config.service.shutdown_timeout()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`]:
//!
//! ```rust,no_run
//! use linkstat_core::{Error, NumberRequest, ProcessingService};
//!
//! # async fn run(service: &ProcessingService) {
//! match service.request_report(NumberRequest::new([42])).await {
//!     Ok(report) => println!("{}", report.description),
//!     Err(Error::IndexOutOfRange { requested, max }) => {
//!         eprintln!("#{requested} has not been assigned yet (highest is #{max})");
//!     },
//!     Err(e) if e.is_recoverable() => eprintln!("Try again: {e}"),
//!     Err(e) => eprintln!("Failed: {e}"),
//! }
//! # }
//! ```

/// Reachability probing
pub mod checker;
/// Configuration loading and environment overrides
pub mod config;
/// Error types and result aliases
pub mod error;
/// In-memory sequence-numbered index
pub mod index;
/// Crash-durable JSON ledgers
pub mod ledger;
/// Plain-text report rendering
pub mod report;
/// Request orchestration, recovery and shutdown
pub mod service;
/// Background task accounting
pub mod tracker;
/// Core data types
pub mod types;

pub use checker::{HttpProbe, Probe, ReachabilityChecker};
pub use config::{Config, Durability, ProbeConfig, ServiceConfig, StorageConfig};
pub use error::{Error, Result};
pub use index::VolatileIndex;
pub use ledger::{CompletedLedger, DurableStore, PendingId};
pub use report::ReportGenerator;
pub use service::ProcessingService;
pub use tracker::PersistTracker;
pub use types::*;
