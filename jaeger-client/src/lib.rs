//! Core of a [Jaeger] distributed tracing client.
//!
//! [Jaeger]: https://www.jaegertracing.io/
//!
//! # Overview
//!
//! This crate manages the in-process lifecycle of spans and traces, decides
//! which traces are sampled, and reports finished spans asynchronously to a
//! remote agent or collector. It is made of a few cooperating parts:
//!
//! - **[`Tracer`](trace::Tracer)** starts spans. It resolves the parent of a
//!   new span from its references, asks the configured
//!   [`Sampler`](trace::Sampler) whether a new trace should be sampled, and
//!   forwards finished, sampled spans to its [`Reporter`](trace::Reporter).
//! - **Samplers** decide once per trace whether its spans are kept. Constant,
//!   probabilistic, rate limiting, per-operation adaptive and remotely
//!   controlled samplers are provided.
//! - **[`RemoteReporter`](trace::RemoteReporter)** queues finished spans and
//!   drains them on a dedicated thread into a [`Sender`](trace::Sender), which
//!   batches them into size-bounded packets.
//! - **Baggage restrictions** limit which baggage keys may be set and how long
//!   their values may be, optionally controlled by a remote endpoint.
//! - **[`Metrics`](metrics::Metrics)** count what every other part does.
//!
//! Tracing must never break the application it observes: span creation and
//! finishing never panic nor return errors, and failures of the remote
//! control plane or transport only show up in logs and metrics.
//!
//! # Getting started
//!
//! ```no_run
//! use jaeger_client::trace::{Config, SamplerConfig, StartSpanOptions};
//!
//! # fn main() -> jaeger_client::error::TraceResult<()> {
//! let tracer = Config::builder("my-service")
//!     .with_sampler(SamplerConfig::constant(true))
//!     .build()?
//!     .build_tracer()?;
//!
//! let parent = tracer.start_span("parent", StartSpanOptions::default()).expect("span");
//! parent.set_baggage_item("user", "alice");
//! {
//!     let child = tracer
//!         .start_span("child", StartSpanOptions::default().child_of(parent.context()))
//!         .expect("span");
//!     child.set_tag("answer", 42);
//!     child.finish();
//! }
//! parent.finish();
//! tracer.close();
//! # Ok(())
//! # }
//! ```
//!
//! # Crate Feature Flags
//!
//! * `internal-logs` (enabled by default): emits the crate's own diagnostics
//!   as [`tracing`](https://docs.rs/tracing) events.
#![warn(
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    unreachable_pub,
    unused
)]
#![allow(clippy::needless_doctest_main)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg), deny(rustdoc::broken_intra_doc_links))]

#[macro_use]
mod internal_logging;

pub mod baggage;
pub mod error;
pub mod global;
pub mod metrics;
pub mod trace;

mod http;
mod worker;

#[doc(hidden)]
#[cfg(feature = "internal-logs")]
pub mod _private {
    pub use tracing::{debug, error, info, warn};
}

/// Version reported in the `jaeger.version` process tag.
pub const JAEGER_CLIENT_VERSION: &str = concat!("Rust-", env!("CARGO_PKG_VERSION"));
