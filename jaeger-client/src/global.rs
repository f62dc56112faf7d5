//! Process-wide tracer slot.
//!
//! Libraries that cannot be handed a [`Tracer`] can look one up here. The
//! slot is empty until [`set_tracer`] is called; nothing in this crate fills
//! it implicitly.
//!
//! ```
//! use jaeger_client::global;
//! use jaeger_client::trace::Tracer;
//!
//! let tracer = Tracer::builder("my-service").build().unwrap();
//! global::set_tracer(tracer);
//!
//! if let Some(tracer) = global::tracer() {
//!     let _span = tracer.start_span("work", Default::default());
//! }
//!
//! global::shutdown_tracer();
//! ```
use std::mem;
use std::sync::RwLock;

use once_cell::sync::Lazy;

use crate::trace::Tracer;

static GLOBAL_TRACER: Lazy<RwLock<Option<Tracer>>> = Lazy::new(|| RwLock::new(None));

/// Installs `tracer` as the global tracer, returning the one previously
/// installed. The previous tracer is not closed.
pub fn set_tracer(tracer: Tracer) -> Option<Tracer> {
    let mut global = match GLOBAL_TRACER.write() {
        Ok(global) => global,
        Err(poisoned) => poisoned.into_inner(),
    };
    mem::replace(&mut *global, Some(tracer))
}

/// A handle to the global tracer, if one is installed.
pub fn tracer() -> Option<Tracer> {
    match GLOBAL_TRACER.read() {
        Ok(global) => global.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// Empties the slot and closes the tracer it held.
pub fn shutdown_tracer() {
    let tracer = match GLOBAL_TRACER.write() {
        Ok(mut global) => global.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    };
    if let Some(tracer) = tracer {
        tracer.close();
    }
}
