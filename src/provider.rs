//! The lazy singleton provider.
//!
//! [`Provider<T>`] owns an instance slot, the initializer supplied once at
//! construction, and a [`Strategy`] selecting how construction is
//! synchronized. Callers share one provider (typically behind an `Arc` or a
//! `'static` borrow) and call [`get`](Provider::get); whoever arrives first
//! pays for construction, everyone else reads the published instance.
//!
//! The provider is an explicit value, not process-global state: embedders
//! construct it once and hand out references, and tests construct a fresh
//! provider per case.

use core::fmt;
use std::sync::Once as PlatformOnce;

use log::debug;

use crate::error::{BoxedError, InitError};
use crate::slot::Slot;

/// Caller-supplied construction function, stored once, never replaced.
type Initializer<T> = Box<dyn Fn() -> Result<T, BoxedError> + Send + Sync>;

/// How a provider synchronizes first construction.
///
/// All strategies uphold the same guarantee (at most one successful
/// construction, no torn reads); they differ in when the instance is built
/// and what a retrieval costs after warm-up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
   /// Construct at provider construction time, unconditionally. Retrievals
   /// never pay any synchronization; a failing initializer means no provider
   /// is built at all.
   Eager,
   /// Construct on first call; every call acquires the slot lock, including
   /// reads after warm-up. Simple and wasteful; offered for completeness and
   /// for callers that want strictly serialized access.
   Locked,
   /// Construct on first call; the lock is contended only during warm-up and
   /// the post-warm-up read path is a single atomic load. The default.
   DoubleChecked,
   /// Construct on first call by delegating the once-only guarantee to the
   /// platform (`std::sync::Once`). Matching the static-initializer semantics
   /// it abstracts, a failed attempt is permanent: later retrievals get
   /// [`InitError::Poisoned`] instead of retrying.
   Platform,
}

impl Default for Strategy {
   #[inline]
   fn default() -> Self {
      Self::DoubleChecked
   }
}

/// Owns creation and retrieval of exactly one instance of `T`.
///
/// The initializer runs at most once per successful lifetime regardless of
/// how many threads call [`get`](Provider::get) concurrently; every
/// successful caller observes the identical instance. If the initializer
/// fails under a lazy lock-based strategy, the error is surfaced to the
/// triggering caller, the slot stays vacant and the next call retries.
///
/// ```
/// use mono_init::Provider;
///
/// let provider = Provider::new(|| String::from("shared handle"));
/// let a = provider.get().unwrap();
/// let b = provider.get().unwrap();
/// assert!(std::ptr::eq(a, b));
/// ```
pub struct Provider<T> {
   slot: Slot<T>,
   init: Initializer<T>,
   strategy: Strategy,
   // Only Strategy::Platform fires this. It is one word, so every provider
   // carries it rather than boxing it behind the strategy.
   platform: PlatformOnce,
}

impl<T> Provider<T> {
   /// Creates a double-checked provider around an infallible initializer.
   pub fn new<F>(initializer: F) -> Self
   where
      F: Fn() -> T + Send + Sync + 'static,
   {
      Self::from_parts(
         Box::new(move || Ok(initializer())),
         Strategy::DoubleChecked,
      )
   }

   /// Creates a double-checked provider around a fallible initializer.
   ///
   /// A failed attempt leaves the slot vacant; the next [`get`](Self::get)
   /// retries.
   pub fn fallible<F, E>(initializer: F) -> Self
   where
      F: Fn() -> Result<T, E> + Send + Sync + 'static,
      E: Into<BoxedError>,
   {
      Self::from_parts(
         Box::new(move || initializer().map_err(Into::into)),
         Strategy::DoubleChecked,
      )
   }

   /// Creates a provider using the given strategy.
   ///
   /// [`Strategy::Eager`] runs the initializer right here; its failure is the
   /// only way this constructor errors. The lazy strategies never fail at
   /// construction.
   pub fn with_strategy<F, E>(strategy: Strategy, initializer: F) -> Result<Self, InitError>
   where
      F: Fn() -> Result<T, E> + Send + Sync + 'static,
      E: Into<BoxedError>,
   {
      let init: Initializer<T> = Box::new(move || initializer().map_err(Into::into));
      let slot = match strategy {
         Strategy::Eager => {
            let value = init().map_err(InitError::Initialization)?;
            debug!("singleton instance constructed eagerly");
            Slot::with_value(value)
         }
         _ => Slot::new(),
      };
      Ok(Self {
         slot,
         init,
         strategy,
         platform: PlatformOnce::new(),
      })
   }

   /// Creates an eager provider: the instance exists before this returns.
   ///
   /// For callers that want deterministic startup cost instead of deferred
   /// allocation.
   pub fn eager<F, E>(initializer: F) -> Result<Self, InitError>
   where
      F: Fn() -> Result<T, E> + Send + Sync + 'static,
      E: Into<BoxedError>,
   {
      Self::with_strategy(Strategy::Eager, initializer)
   }

   #[inline]
   fn from_parts(init: Initializer<T>, strategy: Strategy) -> Self {
      Self {
         slot: Slot::new(),
         init,
         strategy,
         platform: PlatformOnce::new(),
      }
   }

   /// The strategy this provider was built with.
   #[inline]
   pub fn strategy(&self) -> Strategy {
      self.strategy
   }

   /// Whether the instance has been constructed. Never blocks.
   #[inline]
   pub fn is_initialized(&self) -> bool {
      self.slot.is_initialized()
   }

   /// Returns the instance if already constructed, without triggering
   /// construction. Never blocks.
   #[inline]
   pub fn peek(&self) -> Option<&T> {
      self.slot.get()
   }

   /// Returns the shared instance, constructing it on first use.
   ///
   /// Guarantees, for every strategy:
   /// - the initializer runs at most once per successful lifetime;
   /// - all successful callers get the identical instance;
   /// - no caller observes a partially constructed instance.
   ///
   /// On initializer failure the error is surfaced to the caller whose
   /// attempt ran it. Under [`Strategy::Locked`] and
   /// [`Strategy::DoubleChecked`] the slot stays vacant and the next call
   /// retries; a waiter parked during the failed attempt is woken and becomes
   /// the next attempt itself. Under [`Strategy::Platform`] the failure is
   /// permanent and later calls get [`InitError::Poisoned`].
   #[inline]
   pub fn get(&self) -> Result<&T, InitError> {
      // Fast path: one Acquire load once the instance exists. The Locked
      // strategy intentionally skips this and pays the lock every call.
      if self.strategy != Strategy::Locked {
         if let Some(value) = self.slot.get() {
            return Ok(value);
         }
      }
      self.construct()
   }

   /// Slow path of [`get`](Self::get): dispatches on the strategy.
   #[cold]
   fn construct(&self) -> Result<&T, InitError> {
      let result = match self.strategy {
         Strategy::Locked => self.slot.get_or_try_init_exclusive(|| self.run_initializer()),
         Strategy::Platform => return self.construct_platform(),
         // An eager provider's slot is filled at construction, so the lock
         // acquisition below finds it ready and returns immediately.
         Strategy::Eager | Strategy::DoubleChecked => {
            self.slot.get_or_try_init(|| self.run_initializer())
         }
      };
      result.map_err(|e| {
         debug!("singleton initializer failed, slot left vacant: {e}");
         InitError::Initialization(e)
      })
   }

   /// Runs the stored initializer once, logging the outcome.
   fn run_initializer(&self) -> Result<T, BoxedError> {
      let value = (self.init)()?;
      debug!("singleton instance constructed");
      Ok(value)
   }

   /// Construction via the platform's once-only primitive.
   ///
   /// `std::sync::Once` fires at most once per provider; an initializer error
   /// therefore cannot be retried, mirroring the crash-the-class-load
   /// semantics of static initialization this strategy models. A panicking
   /// initializer, by contrast, poisons the `Once` and `call_once_force`
   /// allows the next caller to retry, same as the lock-based strategies.
   fn construct_platform(&self) -> Result<&T, InitError> {
      let mut failure = None;
      self.platform.call_once_force(|_| {
         match (self.init)() {
            Ok(value) => {
               // The platform once serializes construction, so the slot lock
               // is uncontended here; a filled slot keeps its value.
               let _ = self.slot.set(value);
               debug!("singleton instance constructed (platform once)");
            }
            Err(e) => failure = Some(e),
         }
      });
      if let Some(e) = failure {
         debug!("platform-strategy initializer failed, provider is poisoned: {e}");
         return Err(InitError::Initialization(e));
      }
      // Vacant slot past a fired `Once` means the single attempt failed in
      // some earlier call.
      self.slot.get().ok_or(InitError::Poisoned)
   }

   /// Async variant of [`get`](Self::get): a task that loses the warm-up race
   /// yields to the runtime instead of blocking its worker thread.
   ///
   /// The initializer itself still runs synchronously. Only the
   /// double-checked strategy has a cooperative lock; the other strategies
   /// acquire their locks synchronously, same as [`get`](Self::get).
   #[cfg(any(feature = "async-tokio", feature = "async-tokio-mt"))]
   pub async fn get_async(&self) -> Result<&T, InitError> {
      if let Some(value) = self.slot.get() {
         return Ok(value);
      }
      match self.strategy {
         Strategy::Eager | Strategy::DoubleChecked => self
            .slot
            .get_or_try_init_async(|| core::future::ready(self.run_initializer()))
            .await
            .map_err(|e| {
               debug!("singleton initializer failed, slot left vacant: {e}");
               InitError::Initialization(e)
            }),
         Strategy::Locked | Strategy::Platform => self.construct(),
      }
   }
}

impl<T: fmt::Debug> fmt::Debug for Provider<T> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("Provider")
         .field("strategy", &self.strategy)
         .field("slot", &self.slot)
         .finish()
   }
}
