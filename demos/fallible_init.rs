use std::sync::atomic::{AtomicBool, Ordering};

use mono_init::Provider;

static FAIL_FIRST: AtomicBool = AtomicBool::new(true);

fn main() {
   let provider = Provider::fallible(|| {
      let failing = FAIL_FIRST.swap(false, Ordering::SeqCst);
      println!("Attempting construction (fail={failing})...");
      if failing {
         Err("Construction failed!")
      } else {
         Ok("Successfully constructed".to_string())
      }
   });

   // First attempt fails and is surfaced to the caller
   match provider.get() {
      Ok(_) => panic!("Should have failed"),
      Err(e) => println!("Caught error: {e}"),
   }
   assert!(!provider.is_initialized()); // Slot left vacant

   // Second attempt retries and succeeds
   match provider.get() {
      Ok(data) => println!("Got data: {data}"),
      Err(_) => panic!("Should have succeeded"),
   }
   assert!(provider.is_initialized());

   // Subsequent calls share the constructed instance
   println!("Got data again: {}", provider.get().unwrap());
}
