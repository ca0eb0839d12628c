//! The instance slot: storage for exactly one lazily constructed value.
//!
//! [`Slot<T>`] is the holder the provider builds on: vacant until the first
//! successful construction, then filled for the rest of its lifetime (barring
//! exclusive-access [`take`](Slot::take)). The ready check on the read path is
//! a single Acquire load; threads racing on first construction serialize
//! through the futex-parked lock in [`state`](crate::state).
//!
//! The slot enforces at-most-once construction but knows nothing about who
//! supplies the initializer; that policy lives in the provider layer.

use core::cell::UnsafeCell;
use core::sync::atomic::Ordering;
use core::{fmt, mem};

#[cfg(any(feature = "async-tokio", feature = "async-tokio-mt"))]
use core::future::Future;

use super::state::SlotState;

/// A thread-safe holder for exactly one value, filled at most once.
///
/// Concurrent callers racing to fill the slot serialize through an internal
/// lock; everyone else reads lock-free. A failed construction attempt rolls
/// the slot back to vacant, so a later call may retry.
pub struct Slot<T> {
   value: UnsafeCell<mem::MaybeUninit<T>>,
   state: SlotState,
}

impl<T> Slot<T> {
   /// Creates a vacant slot.
   #[inline]
   #[must_use]
   pub const fn new() -> Self {
      Self {
         state: SlotState::vacant(),
         value: UnsafeCell::new(mem::MaybeUninit::uninit()),
      }
   }

   /// Creates a slot already holding `value` (the eager case).
   #[inline]
   #[must_use]
   pub const fn with_value(value: T) -> Self {
      Self {
         state: SlotState::ready(),
         value: UnsafeCell::new(mem::MaybeUninit::new(value)),
      }
   }

   /// Checks whether the slot holds a value. Never blocks.
   #[inline]
   pub fn is_initialized(&self) -> bool {
      self.state.is_ready(Ordering::Relaxed)
   }

   /// Returns a reference to the value if the slot is filled. Never blocks.
   ///
   /// The Acquire load pairs with the Release store on commit, so a caller
   /// that observes the slot as ready also observes the value completely
   /// written. No torn reads.
   #[inline]
   pub fn get(&self) -> Option<&T> {
      if self.state.is_ready(Ordering::Acquire) {
         // SAFETY: READY observed with Acquire, the value write is visible.
         Some(unsafe { self.get_unchecked() })
      } else {
         None
      }
   }

   /// Returns a mutable reference to the value if the slot is filled.
   #[inline]
   pub fn get_mut(&mut self) -> Option<&mut T> {
      if self.is_initialized() {
         // SAFETY: READY is set and we hold `&mut self`.
         Some(unsafe { self.get_unchecked_mut() })
      } else {
         None
      }
   }

   /// Returns a reference to the value without checking the slot state.
   ///
   /// # Safety
   ///
   /// Calling this on a vacant slot is undefined behavior. The caller must
   /// have observed the slot as ready, e.g. via [`get`](Self::get).
   #[inline]
   pub unsafe fn get_unchecked(&self) -> &T {
      debug_assert!(
         self.is_initialized(),
         "get_unchecked called on vacant slot"
      );
      // SAFETY: The caller guarantees the slot is filled.
      (*self.value.get()).assume_init_ref()
   }

   /// Returns a mutable reference to the value without checking the slot state.
   ///
   /// # Safety
   ///
   /// Calling this on a vacant slot is undefined behavior, and the caller
   /// must have exclusive access.
   #[inline]
   unsafe fn get_unchecked_mut(&mut self) -> &mut T {
      debug_assert!(
         self.is_initialized(),
         "get_unchecked_mut called on vacant slot"
      );
      // SAFETY: The caller guarantees the slot is filled and access is exclusive.
      unsafe { (*self.value.get()).assume_init_mut() }
   }

   /// Attempts to fill the slot with `value` without blocking.
   ///
   /// Fails and hands `value` back if the slot is already filled or another
   /// thread currently holds the construction lock.
   #[inline]
   pub fn set(&self, value: T) -> Result<&T, T> {
      let Some(guard) = self.state.try_lock() else {
         return Err(value);
      };
      // SAFETY: We hold the construction lock, nobody else writes the value.
      let refv = unsafe { (*self.value.get()).write(value) };
      guard.commit();
      Ok(refv)
   }

   /// Takes the value out, leaving the slot vacant.
   ///
   /// Requires exclusive access, so it never blocks. The provider layer never
   /// calls this; it exists for embedders that reuse a slot between runs
   /// (tests construct fresh state this way).
   #[inline]
   pub fn take(&mut self) -> Option<T> {
      if self.state.set_vacant() {
         // SAFETY: The slot was filled (set_vacant returned true), the state
         // now blocks readers, and we hold `&mut self`.
         unsafe { Some((*self.value.get()).assume_init_read()) }
      } else {
         None
      }
   }

   /// Returns the value, running `f` to construct it if the slot is vacant.
   ///
   /// Among concurrent callers, exactly one executes `f`; the rest park until
   /// the value is published and then read it lock-free.
   #[inline]
   pub fn get_or_init<F>(&self, f: F) -> &T
   where
      F: FnOnce() -> T,
   {
      if let Some(value) = self.get() {
         return value;
      }
      self.initialize(f);
      // SAFETY: initialize() leaves the slot filled.
      unsafe { self.get_unchecked() }
   }

   /// Returns the value, running fallible `f` to construct it if vacant.
   ///
   /// On `Err` the slot stays vacant and the error goes to the caller whose
   /// attempt ran `f`; the next call retries construction. Among concurrent
   /// callers, at most one `f` runs at a time.
   pub fn get_or_try_init<F, E>(&self, f: F) -> Result<&T, E>
   where
      F: FnOnce() -> Result<T, E>,
   {
      if let Some(value) = self.get() {
         return Ok(value);
      }
      self.try_initialize(f)?;
      debug_assert!(self.is_initialized());
      // SAFETY: try_initialize() succeeded, the slot is filled.
      Ok(unsafe { self.get_unchecked() })
   }

   /// Like [`get_or_try_init`](Self::get_or_try_init), but every call takes
   /// the slot lock, including reads of an already-filled slot.
   ///
   /// This deliberately serializes all callers; it exists so the provider can
   /// offer the always-locked strategy with an honest cost model.
   pub(crate) fn get_or_try_init_exclusive<F, E>(&self, f: F) -> Result<&T, E>
   where
      F: FnOnce() -> Result<T, E>,
   {
      let guard = self.state.lock_exclusive();
      if self.state.is_ready(Ordering::Acquire) {
         drop(guard);
         // SAFETY: READY observed under the lock.
         return Ok(unsafe { self.get_unchecked() });
      }
      // Guard drop on the error path releases the lock and leaves the slot
      // vacant, keeping retry possible.
      let value = f()?;
      // SAFETY: We hold the slot lock and the slot is vacant.
      unsafe { (*self.value.get()).write(value) };
      guard.commit();
      // SAFETY: Committed just above.
      Ok(unsafe { self.get_unchecked() })
   }

   /// Async variant of [`get_or_try_init`](Self::get_or_try_init): a caller
   /// that loses the warm-up race yields to the runtime instead of blocking.
   #[cfg(any(feature = "async-tokio", feature = "async-tokio-mt"))]
   pub async fn get_or_try_init_async<F, Fut, E>(&self, f: F) -> Result<&T, E>
   where
      F: FnOnce() -> Fut,
      Fut: Future<Output = Result<T, E>>,
   {
      if let Some(value) = self.get() {
         return Ok(value);
      }
      self.try_initialize_async(f).await?;
      debug_assert!(self.is_initialized());
      // SAFETY: try_initialize_async() succeeded, the slot is filled.
      Ok(unsafe { self.get_unchecked() })
   }

   // --- Cold construction paths ---

   /// Cold path for `get_or_init`. Acquires the lock and runs the initializer.
   #[cold]
   fn initialize<F>(&self, f: F)
   where
      F: FnOnce() -> T,
   {
      let Some(guard) = self.state.lock() else {
         return; // Another thread filled the slot while we waited.
      };
      // SAFETY: We hold the construction lock.
      unsafe { (*self.value.get()).write(f()) };
      guard.commit();
   }

   /// Cold path for `get_or_try_init`. On initializer failure the guard drop
   /// rolls the slot back to vacant and wakes waiters.
   #[cold]
   fn try_initialize<F, E>(&self, f: F) -> Result<(), E>
   where
      F: FnOnce() -> Result<T, E>,
   {
      let Some(guard) = self.state.lock() else {
         return Ok(()); // Another thread filled the slot while we waited.
      };
      let value = f()?;
      // SAFETY: We hold the construction lock.
      unsafe { (*self.value.get()).write(value) };
      guard.commit();
      Ok(())
   }

   /// Cold path for `get_or_try_init_async`.
   #[cfg(any(feature = "async-tokio", feature = "async-tokio-mt"))]
   #[cold]
   async fn try_initialize_async<F, Fut, E>(&self, f: F) -> Result<(), E>
   where
      F: FnOnce() -> Fut,
      Fut: Future<Output = Result<T, E>>,
   {
      let Some(guard) = self.state.lock_async().await else {
         return Ok(()); // Another task filled the slot while we waited.
      };
      let value = f().await?;
      // SAFETY: We hold the construction lock.
      unsafe { (*self.value.get()).write(value) };
      guard.commit();
      Ok(())
   }
}

// SAFETY:
// `&Slot<T>` hands out `&T` across threads, so `T: Sync` is required, and a
// value written by one thread may be read or dropped by another, so `T: Send`
// is required as well. The state machine itself is thread-safe.
unsafe impl<T: Sync + Send> Sync for Slot<T> {}
// SAFETY:
// Ownership of `T` moves with the slot (or out via `take`), so `T: Send`
// suffices.
unsafe impl<T: Send> Send for Slot<T> {}

impl<T> Default for Slot<T> {
   /// Creates a vacant slot.
   #[inline]
   fn default() -> Self {
      Self::new()
   }
}

impl<T: fmt::Debug> fmt::Debug for Slot<T> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      let mut d = f.debug_tuple("Slot");
      match self.get() {
         Some(v) => d.field(v),
         None => d.field(&format_args!("<vacant>")),
      };
      d.finish()
   }
}

impl<T> From<T> for Slot<T> {
   /// Creates a slot already holding the given value.
   #[inline]
   fn from(value: T) -> Self {
      Self::with_value(value)
   }
}

impl<T> Drop for Slot<T> {
   #[inline]
   fn drop(&mut self) {
      if self.is_initialized() {
         // SAFETY: We hold `&mut self`, the slot is filled, and the value is
         // never touched again.
         unsafe { self.value.get_mut().assume_init_drop() };
      }
   }
}
