//! Single-use completion flag.

use std::sync::atomic::{AtomicBool, Ordering};

/// A boolean that flips from unset to set exactly once.
///
/// Every trigger racing to complete a request calls [`try_complete`]; exactly
/// one of them observes the transition and owns the response.
///
/// [`try_complete`]: CompletionFlag::try_complete
#[derive(Debug, Default)]
pub struct CompletionFlag {
    completed: AtomicBool,
}

impl CompletionFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempt the unset -> set transition. Returns `true` for the single winner.
    pub fn try_complete(&self) -> bool {
        self.completed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_complete(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn first_caller_wins() {
        let flag = CompletionFlag::new();
        assert!(!flag.is_complete());

        assert!(flag.try_complete());
        assert!(flag.is_complete());

        assert!(!flag.try_complete(), "second caller must lose");
    }

    #[test]
    fn exactly_one_winner_across_threads() {
        for _ in 0..50 {
            let flag = Arc::new(CompletionFlag::new());
            let winners = Arc::new(AtomicUsize::new(0));
            let barrier = Arc::new(std::sync::Barrier::new(8));

            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let flag = Arc::clone(&flag);
                    let winners = Arc::clone(&winners);
                    let barrier = Arc::clone(&barrier);
                    std::thread::spawn(move || {
                        barrier.wait();
                        if flag.try_complete() {
                            winners.fetch_add(1, Ordering::SeqCst);
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            assert_eq!(winners.load(Ordering::SeqCst), 1);
        }
    }
}
