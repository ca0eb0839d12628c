//! Error type surfaced by the provider's retrieval operations.

use std::error::Error as StdError;

use thiserror::Error;

/// Boxed error produced by a caller-supplied initializer.
pub type BoxedError = Box<dyn StdError + Send + Sync + 'static>;

/// Failure of a singleton construction attempt.
#[derive(Debug, Error)]
pub enum InitError {
   /// The initializer returned an error.
   ///
   /// For the lazy lock-based strategies the slot is left vacant and the next
   /// retrieval retries construction. For the eager and platform strategies
   /// this is the one and only attempt.
   #[error("singleton initializer failed: {0}")]
   Initialization(#[source] BoxedError),

   /// A platform-strategy provider whose single construction attempt already
   /// failed. The platform's once primitive has fired, so no retry is
   /// possible for the lifetime of the provider.
   #[error("singleton construction failed permanently under the platform strategy")]
   Poisoned,
}
