//! A thread-safe lazy singleton provider with pluggable initialization strategies.
//!
//! This crate provides two layers for race-free, at-most-once construction of
//! a shared value:
//!
//! - [`Slot<T>`]: the low-level instance slot, a thread-safe holder that is
//!   filled at most once and read lock-free afterwards.
//! - [`Provider<T>`]: the singleton provider, owning a slot plus the
//!   initializer supplied at construction, with a [`Strategy`] selecting how
//!   first construction is synchronized (eager, always-locked, double-checked
//!   or delegated to the platform's once primitive).
//!
//! Both layers guarantee that among concurrent callers exactly one runs the
//! construction logic, that every successful caller observes the identical
//! instance, and that nobody observes a partially constructed value. The read
//! path after warm-up is a single atomic load (except under the deliberately
//! serialized always-locked strategy); contended warm-up waits park on a
//! `parking_lot_core` futex.
//!
//! # Features
//!
//! - **Lock-free fast path**: retrieving a constructed instance requires no
//!   synchronization beyond one Acquire load.
//! - **Pluggable strategy**: trade laziness against post-warm-up cost per
//!   provider, not per crate.
//! - **Fallible initialization with retry**: a failed construction attempt
//!   leaves the slot vacant and the next call retries (lazy strategies).
//! - **Async support**: tasks losing the warm-up race can yield to the
//!   runtime instead of blocking (`async-tokio` / `async-tokio-mt`).
//! - **No heap allocation for the value**: the slot stores `T` inline.
//!
//! # Examples
//!
//! ## Shared configuration handle
//!
//! ```rust
//! use mono_init::Provider;
//!
//! let config = Provider::new(|| "production".to_string());
//!
//! // Whoever calls first constructs; everyone gets the same instance.
//! let a = config.get().unwrap();
//! let b = config.get().unwrap();
//! assert_eq!(a, "production");
//! assert!(std::ptr::eq(a, b));
//! ```
//!
//! ## Fallible construction with retry
//!
//! ```rust
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use mono_init::Provider;
//!
//! static FIRST_ATTEMPT: AtomicBool = AtomicBool::new(true);
//!
//! let handle = Provider::fallible(|| {
//!    if FIRST_ATTEMPT.swap(false, Ordering::SeqCst) {
//!       Err("backend not reachable")
//!    } else {
//!       Ok(42u32)
//!    }
//! });
//!
//! // The failed attempt leaves the slot vacant...
//! assert!(handle.get().is_err());
//! // ...and the next call retries and succeeds.
//! assert_eq!(handle.get().unwrap(), &42);
//! ```
//!
//! ## Choosing a strategy
//!
//! ```rust
//! use mono_init::{Provider, Strategy};
//!
//! // Deterministic startup cost: the instance exists before `eager` returns.
//! let eager = Provider::eager(|| Ok::<_, std::convert::Infallible>(vec![1, 2, 3])).unwrap();
//! assert!(eager.is_initialized());
//!
//! // Strictly serialized access: every retrieval takes the lock.
//! let locked = Provider::with_strategy(Strategy::Locked, || {
//!    Ok::<_, std::convert::Infallible>(String::from("guarded"))
//! })
//! .unwrap();
//! assert_eq!(locked.get().unwrap(), "guarded");
//! ```

/// Error surfaced by failed construction attempts.
mod error;

/// The singleton provider and its strategies.
mod provider;

/// The instance slot.
mod slot;

/// Internal synchronization state management.
mod state;

pub use error::{BoxedError, InitError};
pub use provider::{Provider, Strategy};
pub use slot::Slot;
