use std::convert::Infallible;

use mono_init::{Provider, Strategy};

fn main() {
   // Eager: deterministic startup cost, the instance exists before use.
   let eager = Provider::eager(|| {
      println!("Eager construction at provider creation");
      Ok::<_, Infallible>(vec![1, 2, 3])
   })
   .unwrap();
   assert!(eager.is_initialized());
   println!("Eager value: {:?}", eager.get().unwrap());

   // Always-locked: every retrieval takes the lock, strictly serialized.
   let locked = Provider::with_strategy(Strategy::Locked, || {
      println!("Locked construction on first call");
      Ok::<_, Infallible>("guarded".to_string())
   })
   .unwrap();
   println!("Locked value: {}", locked.get().unwrap());

   // Double-checked (default): lock contended only during warm-up.
   let checked = Provider::new(|| {
      println!("Double-checked construction on first call");
      42u64
   });
   println!("Double-checked value: {}", checked.get().unwrap());

   // Platform: once-only execution delegated to std::sync::Once.
   let platform = Provider::with_strategy(Strategy::Platform, || {
      println!("Platform-once construction on first call");
      Ok::<_, Infallible>(3.14f64)
   })
   .unwrap();
   println!("Platform value: {}", platform.get().unwrap());
}
