use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use mono_init::Provider;

static COUNTER: AtomicUsize = AtomicUsize::new(0);

fn main() {
   let provider = Arc::new(Provider::new(|| {
      // This closure runs only once
      COUNTER.fetch_add(1, Ordering::Relaxed);
      println!("Constructing shared instance...");
      // Simulate work
      std::thread::sleep(std::time::Duration::from_millis(50));
      "Expensive shared data".to_string()
   }));

   let threads: Vec<_> = (0..5)
      .map(|_| {
         let provider = Arc::clone(&provider);
         std::thread::spawn(move || {
            println!("Thread access: {}", provider.get().unwrap());
         })
      })
      .collect();

   for t in threads {
      t.join().unwrap();
   }

   assert_eq!(provider.peek(), Some(&"Expensive shared data".to_string()));
   assert_eq!(COUNTER.load(Ordering::Relaxed), 1); // Initializer ran only once
   println!("Final data: {}", provider.get().unwrap());
}
