use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use mono_init::Provider;

static COUNTER: AtomicUsize = AtomicUsize::new(0);

#[tokio::main]
async fn main() {
   let provider = Arc::new(Provider::new(|| {
      // This closure runs only once
      COUNTER.fetch_add(1, Ordering::Relaxed);
      println!("Constructing shared instance...");
      "Expensive shared data".to_string()
   }));

   let tasks: Vec<_> = (0..5)
      .map(|_| {
         let provider = Arc::clone(&provider);
         tokio::spawn(async move {
            println!("Task access: {}", provider.get_async().await.unwrap());
         })
      })
      .collect();

   for t in tasks {
      t.await.unwrap();
   }

   assert_eq!(provider.peek(), Some(&"Expensive shared data".to_string()));
   assert_eq!(COUNTER.load(Ordering::Relaxed), 1); // Initializer ran only once
   println!("Final data: {}", provider.get_async().await.unwrap());
}
