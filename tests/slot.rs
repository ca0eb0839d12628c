use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use mono_init::Slot;

#[test]
fn test_new_is_vacant() {
   let slot: Slot<i32> = Slot::new();
   assert!(!slot.is_initialized());
   assert_eq!(slot.get(), None);
}

#[test]
fn test_with_value_is_initialized() {
   let slot = Slot::with_value(42);
   assert!(slot.is_initialized());
   assert_eq!(slot.get(), Some(&42));
}

#[test]
fn test_get_or_init() {
   let slot: Slot<i32> = Slot::new();
   let counter = AtomicUsize::new(0);
   let value = slot.get_or_init(|| {
      counter.fetch_add(1, Ordering::SeqCst);
      42
   });
   assert_eq!(value, &42);
   assert!(slot.is_initialized());
   assert_eq!(counter.load(Ordering::SeqCst), 1);

   // Second call must not run the closure.
   let value = slot.get_or_init(|| {
      counter.fetch_add(1, Ordering::SeqCst);
      panic!("Should not be called")
   });
   assert_eq!(value, &42);
   assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_set() {
   let slot: Slot<i32> = Slot::new();

   // First set fills the slot.
   assert_eq!(slot.set(42), Ok(&42));
   assert!(slot.is_initialized());
   assert_eq!(slot.get(), Some(&42));

   // Second set hands the value back.
   assert_eq!(slot.set(24), Err(24));
   assert_eq!(slot.get(), Some(&42));
}

#[test]
fn test_set_recursive() {
   // `set` from inside the initialization closure must fail, not deadlock:
   // the construction lock is already held.
   let slot: Slot<i32> = Slot::new();
   slot.get_or_init(|| {
      let x = slot.set(44);
      assert!(matches!(x, Err(44)), "Expected set to fail while locked");
      42
   });
   assert!(slot.is_initialized());
   assert_eq!(slot.get(), Some(&42));
}

#[test]
fn test_get_or_try_init_failure_then_retry() {
   let slot: Slot<i32> = Slot::new();
   let attempts = AtomicUsize::new(0);

   let result = slot.get_or_try_init(|| {
      attempts.fetch_add(1, Ordering::SeqCst);
      Err::<i32, _>("init error")
   });
   assert_eq!(result, Err("init error"));
   assert!(!slot.is_initialized()); // Rolled back to vacant.
   assert_eq!(attempts.load(Ordering::SeqCst), 1);

   // Retry succeeds.
   let result = slot.get_or_try_init(|| {
      attempts.fetch_add(1, Ordering::SeqCst);
      Ok::<_, &str>(55)
   });
   assert_eq!(result, Ok(&55));
   assert!(slot.is_initialized());
   assert_eq!(attempts.load(Ordering::SeqCst), 2);

   // Filled slot short-circuits even a failing closure.
   let result = slot.get_or_try_init(|| {
      attempts.fetch_add(1, Ordering::SeqCst);
      Err::<i32, _>("never runs")
   });
   assert_eq!(result, Ok(&55));
   assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn test_take() {
   let mut slot = Slot::with_value(42);
   assert!(slot.is_initialized());
   assert_eq!(slot.take(), Some(42));
   assert!(!slot.is_initialized());
   assert_eq!(slot.get(), None);
   assert_eq!(slot.take(), None);

   let mut empty: Slot<i32> = Slot::new();
   assert_eq!(empty.take(), None);
   assert!(!empty.is_initialized());
}

#[test]
fn test_get_mut() {
   let mut slot = Slot::with_value(String::from("a"));
   slot.get_mut().unwrap().push('b');
   assert_eq!(slot.get(), Some(&String::from("ab")));

   let mut empty: Slot<String> = Slot::new();
   assert_eq!(empty.get_mut(), None);
}

#[test]
fn test_multi_thread_get_or_init() {
   let slot = Arc::new(Slot::new());
   let constructions = Arc::new(AtomicUsize::new(0));
   let threads: Vec<_> = (0..10)
      .map(|_| {
         let slot_clone = Arc::clone(&slot);
         let constructions_clone = Arc::clone(&constructions);
         thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            *slot_clone.get_or_init(|| {
               constructions_clone.fetch_add(1, Ordering::SeqCst);
               thread::sleep(Duration::from_millis(20));
               42
            })
         })
      })
      .collect();

   for handle in threads {
      assert_eq!(handle.join().unwrap(), 42);
   }
   assert_eq!(slot.get(), Some(&42));
   assert_eq!(constructions.load(Ordering::SeqCst), 1);
}

#[test]
fn test_race_losers_observe_full_value() {
   // Threads that lose the construction race park on the lock, get woken by
   // the commit and return through the already-ready check inside the lock
   // path, without ever taking another look via `get()`. Every one of them
   // must still see the payload fully written.
   let slot: Arc<Slot<(u64, u64, String)>> = Arc::new(Slot::new());
   let barrier = Arc::new(Barrier::new(8));
   let threads: Vec<_> = (0..8)
      .map(|_| {
         let slot_clone = Arc::clone(&slot);
         let barrier_clone = Arc::clone(&barrier);
         thread::spawn(move || {
            barrier_clone.wait();
            let value = slot_clone.get_or_init(|| {
               // Slow, multi-step construction so the losers really park.
               let a = 0xDEAD_BEEF_u64;
               thread::sleep(Duration::from_millis(10));
               let b = a.wrapping_mul(31);
               thread::sleep(Duration::from_millis(10));
               (a, b, format!("{a}:{b}"))
            });
            assert_eq!(value.1, value.0.wrapping_mul(31));
            assert_eq!(value.2, format!("{}:{}", value.0, value.1));
         })
      })
      .collect();
   for handle in threads {
      handle.join().unwrap();
   }
   assert!(slot.is_initialized());
}

#[test]
fn test_multi_thread_set_race() {
   let slot = Arc::new(Slot::new());
   let successes = Arc::new(AtomicUsize::new(0));
   let threads: Vec<_> = (0..10)
      .map(|i| {
         let slot_clone = Arc::clone(&slot);
         let successes_clone = Arc::clone(&successes);
         thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            match slot_clone.set(i) {
               Ok(&won) => {
                  successes_clone.fetch_add(1, Ordering::SeqCst);
                  won
               }
               Err(_) => *slot_clone
                  .get()
                  .expect("slot must be filled after a lost set race"),
            }
         })
      })
      .collect();

   let mut first_val = None;
   for handle in threads {
      let val = handle.join().unwrap();
      if first_val.is_none() {
         first_val = Some(val);
      }
      // Every thread observes the winner's value.
      assert_eq!(Some(val), first_val);
   }
   assert_eq!(successes.load(Ordering::SeqCst), 1);
   assert_eq!(slot.get().copied(), first_val);
}

#[test]
fn test_debug_format() {
   let slot = Slot::with_value(7);
   assert_eq!(format!("{slot:?}"), "Slot(7)");

   let vacant: Slot<i32> = Slot::new();
   assert_eq!(format!("{vacant:?}"), "Slot(<vacant>)");
}

#[tokio::test]
async fn test_get_or_try_init_async() {
   let slot: Slot<String> = Slot::new();
   let attempts = Arc::new(AtomicUsize::new(0));

   let result = slot
      .get_or_try_init_async(|| {
         let attempts_clone = Arc::clone(&attempts);
         async move {
            attempts_clone.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok::<_, &str>(String::from("async ok"))
         }
      })
      .await;
   assert_eq!(result, Ok(&String::from("async ok")));
   assert!(slot.is_initialized());
   assert_eq!(attempts.load(Ordering::SeqCst), 1);

   // Second call returns the existing value without running the future.
   let result = slot
      .get_or_try_init_async(|| async {
         attempts.fetch_add(1, Ordering::SeqCst);
         Ok::<_, &str>(String::from("ignored"))
      })
      .await;
   assert_eq!(result, Ok(&String::from("async ok")));
   assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_get_or_try_init_async_failure_then_retry() {
   let slot: Slot<i32> = Slot::new();
   let attempts = Arc::new(AtomicUsize::new(0));

   let result = slot
      .get_or_try_init_async(|| {
         let attempts_clone = Arc::clone(&attempts);
         async move {
            attempts_clone.fetch_add(1, Ordering::SeqCst);
            Err::<i32, _>("async fail")
         }
      })
      .await;
   assert_eq!(result, Err("async fail"));
   assert!(!slot.is_initialized());

   let result = slot
      .get_or_try_init_async(|| {
         let attempts_clone = Arc::clone(&attempts);
         async move {
            attempts_clone.fetch_add(1, Ordering::SeqCst);
            Ok::<_, &str>(7)
         }
      })
      .await;
   assert_eq!(result, Ok(&7));
   assert!(slot.is_initialized());
   assert_eq!(attempts.load(Ordering::SeqCst), 2);
}
