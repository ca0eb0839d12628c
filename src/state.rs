//! Synchronization state for the instance slot.
//!
//! A single `AtomicU8` packs the whole slot lifecycle:
//! - Bit 0: READY - the slot holds a fully constructed instance
//! - Bit 1: LOCKED - a construction attempt is in progress
//! - Bit 2: WAITING - at least one thread is parked on this slot
//! - Bits 3-7: EPOCH - generation counter guarding against ABA on waits
//!
//! Readers of a ready slot never touch a lock; threads that lose the warm-up
//! race park on the state address via `parking_lot_core`'s futex layer and are
//! woken when the construction attempt commits or rolls back.

use core::mem;
use core::sync::atomic::{self, AtomicU8, Ordering};

use log::trace;
use parking_lot_core::{DEFAULT_PARK_TOKEN, DEFAULT_UNPARK_TOKEN};

/// Atomic lifecycle state of one instance slot.
#[repr(transparent)]
pub(crate) struct SlotState(AtomicU8);

impl SlotState {
   /// Bit flag: the slot holds a constructed instance.
   const READY: u8 = 1;
   /// Bit flag: a construction attempt holds the slot lock.
   const LOCKED: u8 = 2;
   /// Bit flag: at least one thread is parked waiting on this slot.
   const WAITING: u8 = 4;
   /// Start of the epoch bits.
   const EPOCH_1: u8 = 8;
   /// Mask for the epoch bits.
   const EPOCH_MASK: u8 = !(Self::READY | Self::LOCKED | Self::WAITING);

   /// Next epoch value derived from the current state.
   #[inline(always)]
   const fn next_epoch(current_state: u8) -> u8 {
      (current_state & Self::EPOCH_MASK).wrapping_add(Self::EPOCH_1) & Self::EPOCH_MASK
   }

   /// State of a slot that has never been filled.
   #[inline]
   pub(crate) const fn vacant() -> Self {
      Self(AtomicU8::new(0))
   }

   /// State of a slot that starts out filled (eager construction).
   #[inline]
   pub(crate) const fn ready() -> Self {
      Self(AtomicU8::new(Self::READY))
   }

   /// Wakes every thread parked on this slot.
   #[inline]
   fn notify_all(&self) {
      // SAFETY: The address passed to unpark matches the address used for
      // park; both are the address of the state byte.
      unsafe {
         parking_lot_core::unpark_all(self.0.as_ptr() as usize, DEFAULT_UNPARK_TOKEN);
      }
   }

   /// Parks the current thread until the state moves away from `expected_state`.
   #[inline]
   fn wait(&self, expected_state: u8) {
      trace!("parking on contended slot (state={expected_state:#x})");
      // SAFETY: See safety comment in `notify_all`.
      unsafe {
         // park() re-validates the condition before sleeping and only sleeps
         // while the state is still `expected_state`.
         let _ = parking_lot_core::park(
            self.0.as_ptr() as usize,
            || self.0.load(atomic::Ordering::Acquire) == expected_state,
            || {},
            |_, _| {},
            DEFAULT_PARK_TOKEN,
            None,
         );
         // Wake-ups may be spurious; callers loop and re-check the state.
      }
   }

   /// Transitions to READY, bumps the epoch and wakes waiters.
   /// Returns `true` if the slot was not already READY.
   ///
   /// Callable while holding the lock (via a guard) or through `&mut self`.
   #[inline]
   pub(crate) fn set_ready(&self) -> bool {
      // The epoch is derived before the swap; Relaxed suffices because the
      // swap below carries Release.
      let current_state = self.0.load(Ordering::Relaxed);
      let next_epoch = Self::next_epoch(current_state);
      let new_state = Self::READY | next_epoch;

      // Release ordering publishes the instance write: any thread that
      // observes READY with an Acquire load also observes the value.
      let prev_state = self.0.swap(new_state, Ordering::Release);

      if prev_state & Self::WAITING != 0 {
         self.notify_all();
      }

      prev_state & Self::READY == 0
   }

   /// Transitions back to vacant (clears READY/LOCKED), bumps the epoch and
   /// wakes waiters. Returns `true` if the slot was READY before.
   ///
   /// This is the rollback path: a failed construction attempt ends here so
   /// that a later call may retry. Waking the waiters is what turns one of
   /// them into the next construction attempt.
   #[inline]
   pub(crate) fn set_vacant(&self) -> bool {
      let current_state = self.0.load(Ordering::Relaxed);
      let next_epoch = Self::next_epoch(current_state);
      let new_state = next_epoch;

      let prev_state = self.0.swap(new_state, Ordering::Release);

      if prev_state & Self::WAITING != 0 {
         self.notify_all();
      }

      prev_state & Self::READY != 0
   }

   /// Checks the READY flag with the given ordering.
   #[inline]
   pub(crate) fn is_ready(&self, ordering: Ordering) -> bool {
      self.0.load(ordering) & Self::READY != 0
   }

   /// One attempt at acquiring the construction lock.
   ///
   /// Returns:
   /// - `Ok(None)`: the slot is already READY, nothing to construct.
   /// - `Ok(Some(guard))`: lock acquired, caller runs the initializer.
   /// - `Err(state)`: lock held elsewhere; `state` is what the caller should
   ///   wait on (WAITING flag already folded in unless `nowait`).
   #[inline]
   fn lock_step(&self, nowait: bool) -> Result<Option<InitGuard<'_>>, u8> {
      loop {
         // Acquire pairs with the Release swap in set_ready: callers treat
         // `Ok(None)` as "slot filled" and read the value with no further
         // synchronization, so observing READY here must also publish the
         // value write.
         let current_state = self.0.load(Ordering::Acquire);
         if current_state & Self::READY != 0 {
            return Ok(None);
         }

         if current_state & Self::LOCKED == 0 {
            let new_state = current_state | Self::LOCKED;
            match self.0.compare_exchange_weak(
               current_state,
               new_state,
               Ordering::Acquire,
               Ordering::Relaxed,
            ) {
               Ok(_) => return Ok(Some(InitGuard::new(self))),
               Err(_) => {
                  std::hint::spin_loop();
                  continue;
               }
            }
         }
         // Lock held by another construction attempt. Flag our intent to
         // park unless the caller asked not to wait.
         if !nowait && (current_state & Self::WAITING == 0) {
            let new_state = current_state | Self::WAITING;
            match self.0.compare_exchange_weak(
               current_state,
               new_state,
               Ordering::Relaxed,
               Ordering::Relaxed,
            ) {
               Ok(_) => return Err(new_state),
               Err(_) => {
                  // State moved under us (possibly to READY); retry.
                  std::hint::spin_loop();
                  continue;
               }
            }
         }
         return Err(current_state);
      }
   }

   /// Acquires the construction lock, parking if another attempt is running.
   ///
   /// Returns `Some(guard)` if this caller should construct, `None` if the
   /// slot became READY in the meantime.
   #[inline]
   pub(crate) fn lock(&self) -> Option<InitGuard<'_>> {
      match self.lock_step(false) {
         Ok(guard_opt) => guard_opt,
         Err(mut observed_state) => loop {
            self.wait(observed_state);
            match self.lock_step(false) {
               Ok(guard_opt) => return guard_opt,
               Err(new_state) => {
                  observed_state = new_state;
               }
            }
         },
      }
   }

   /// Acquires the construction lock cooperatively, yielding to the runtime
   /// before falling back to a blocking park.
   #[cfg(any(feature = "async-tokio", feature = "async-tokio-mt"))]
   #[inline]
   pub(crate) async fn lock_async(&self) -> Option<InitGuard<'_>> {
      #[allow(clippy::never_loop)]
      loop {
         for _ in 0..16 {
            match self.lock_step(false) {
               Ok(guard_opt) => return guard_opt,
               Err(state) => {
                  for _ in 0..32 {
                     tokio::task::yield_now().await;
                     if self.0.load(Ordering::Relaxed) != state {
                        break;
                     }
                  }
               }
            }
         }

         // Yielding did not get us anywhere; park for real without stalling
         // the runtime's worker thread.
         #[cfg(feature = "async-tokio-mt")]
         {
            return match self.lock_step(false) {
               Ok(x) => x,
               Err(state) => tokio::task::block_in_place(|| {
                  self.wait(state);
                  self.lock()
               }),
            };
         }
      }
   }

   /// Attempts to acquire the construction lock without parking.
   ///
   /// Returns `None` if the slot is READY or the lock is held elsewhere.
   #[inline]
   pub(crate) fn try_lock(&self) -> Option<InitGuard<'_>> {
      self.lock_step(true).ok().flatten()
   }

   /// Acquires the slot lock unconditionally, READY or not.
   ///
   /// This is the always-locked retrieval strategy: every call pays one lock
   /// acquisition, serializing readers even after the instance exists. The
   /// returned guard preserves the READY flag on drop.
   pub(crate) fn lock_exclusive(&self) -> ExclusiveGuard<'_> {
      loop {
         let current_state = self.0.load(Ordering::Relaxed);
         if current_state & Self::LOCKED == 0 {
            let new_state = current_state | Self::LOCKED;
            match self.0.compare_exchange_weak(
               current_state,
               new_state,
               Ordering::Acquire,
               Ordering::Relaxed,
            ) {
               Ok(_) => return ExclusiveGuard::new(self),
               Err(_) => {
                  std::hint::spin_loop();
                  continue;
               }
            }
         }
         if current_state & Self::WAITING == 0 {
            match self.0.compare_exchange_weak(
               current_state,
               current_state | Self::WAITING,
               Ordering::Relaxed,
               Ordering::Relaxed,
            ) {
               Ok(_) => self.wait(current_state | Self::WAITING),
               Err(_) => {
                  std::hint::spin_loop();
                  continue;
               }
            }
         } else {
            self.wait(current_state);
         }
      }
   }
}

/// RAII guard for a construction attempt.
///
/// Holds the LOCKED flag. `commit()` marks the slot READY; dropping the guard
/// instead rolls the slot back to vacant so another call may retry. The drop
/// path is what implements retry-after-failure: an initializer error (or
/// panic) unwinds through here and leaves the slot empty.
pub(crate) struct InitGuard<'a> {
   state: &'a SlotState,
}

impl<'a> InitGuard<'a> {
   /// Wraps a state whose LOCKED flag is already set.
   #[inline(always)]
   pub(crate) const fn new(state: &'a SlotState) -> Self {
      Self { state }
   }

   /// Marks construction as complete, consumes the guard and wakes waiters.
   /// Returns `true` if the slot was not READY before.
   #[inline(always)]
   pub(crate) fn commit(self) -> bool {
      let success = self.state.set_ready();
      mem::forget(self); // Drop would roll the state back.
      success
   }
}

impl Drop for InitGuard<'_> {
   #[inline(always)]
   fn drop(&mut self) {
      self.state.set_vacant();
   }
}

/// RAII guard for an always-locked retrieval.
///
/// Unlike [`InitGuard`], dropping this guard releases the lock while keeping
/// the READY flag intact: an already-constructed instance stays constructed
/// across lock handoffs.
pub(crate) struct ExclusiveGuard<'a> {
   state: &'a SlotState,
}

impl<'a> ExclusiveGuard<'a> {
   /// Wraps a state whose LOCKED flag is already set.
   #[inline(always)]
   pub(crate) const fn new(state: &'a SlotState) -> Self {
      Self { state }
   }

   /// Marks construction as complete, consumes the guard and wakes waiters.
   #[inline(always)]
   pub(crate) fn commit(self) {
      self.state.set_ready();
      mem::forget(self);
   }
}

impl Drop for ExclusiveGuard<'_> {
   #[inline(always)]
   fn drop(&mut self) {
      // Clear LOCKED and WAITING, keep READY, bump the epoch.
      let current_state = self.state.0.load(Ordering::Relaxed);
      let released = (current_state & SlotState::READY) | SlotState::next_epoch(current_state);
      let prev_state = self.state.0.swap(released, Ordering::Release);
      if prev_state & SlotState::WAITING != 0 {
         self.state.notify_all();
      }
   }
}
