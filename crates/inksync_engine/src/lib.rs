//! # inksync Engine
//!
//! Device side of the gallery sync engine.
//!
//! This crate provides:
//! - `RemoteGalleryClient`, the device capability trait, with an HTTP
//!   implementation and an in-memory fake
//! - Retry with exponential backoff
//! - Wake handshake (Bluetooth LE behind the `bluetooth` feature)
//! - Plan executor with failure isolation and bounded upload concurrency
//! - Sync orchestrator state machine and run reports
//!
//! ## Run Stages
//!
//! 1. Scan the local tree (a bad root never wakes the device)
//! 2. Probe the device and wake it if asleep
//! 3. Snapshot the remote galleries
//! 4. Build the plan, confirm it if destructive
//! 5. Execute: creates, then uploads, then deletes
//!
//! ## Key Invariants
//!
//! - Requests to one device never overlap
//! - 4xx responses are never retried
//! - A failed action never aborts the run
//! - Without mirror mode nothing is deleted

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod config;
mod executor;
mod http;
mod memory;
mod report;
mod reqwest_client;
mod state;
mod wake;

pub use client::{RemoteGalleryClient, MAX_GALLERY_PAGES};
pub use config::{DeviceConfig, RemoteScope, RetryConfig, SyncConfig, SyncOptions, DEFAULT_HOST};
pub use executor::{CancelToken, Executor};
pub use http::{
    content_type_for, DeviceRequest, HttpClient, HttpGalleryClient, HttpResponse, RequestBody,
    TransportFailure,
};
pub use memory::MemoryGalleryClient;
pub use report::{ActionOutcome, ActionReport, ReportCounts, SkipReason, SyncReport};
pub use reqwest_client::ReqwestClient;
pub use state::{AutoConfirm, Confirmation, RunState, SyncOrchestrator, SyncStats};
#[cfg(feature = "bluetooth")]
pub use wake::BleWaker;
pub use wake::{
    default_waker, NoopWaker, UnavailableWaker, WakeOutcome, WakeRequest, Waker,
    DEFAULT_DEVICE_NAME, WAKE_CHARACTERISTIC,
};
