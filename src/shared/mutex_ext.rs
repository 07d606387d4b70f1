//! Usage: Mutex extension trait that recovers from poisoned locks instead of panicking.

use std::sync::{Mutex, MutexGuard};

pub(crate) trait MutexExt<T> {
    /// Lock the mutex; if it was poisoned by a panicking holder, recover the
    /// inner value and log where the recovery happened.
    fn lock_or_recover(&self) -> MutexGuard<'_, T>;
}

impl<T> MutexExt<T> for Mutex<T> {
    #[track_caller]
    fn lock_or_recover(&self) -> MutexGuard<'_, T> {
        match self.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                let loc = std::panic::Location::caller();
                tracing::error!(
                    mutex_type = std::any::type_name::<T>(),
                    file = loc.file(),
                    line = loc.line(),
                    "mutex poisoned by a panicking holder; recovering inner value"
                );
                poisoned.into_inner()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn lock_or_recover_returns_guard() {
        let mutex = Mutex::new(42);
        assert_eq!(*mutex.lock_or_recover(), 42);
    }

    #[test]
    fn lock_or_recover_survives_poisoning() {
        let mutex = Arc::new(Mutex::new(0));
        let poisoner = Arc::clone(&mutex);

        let _ = std::thread::spawn(move || {
            let mut guard = poisoner.lock().unwrap();
            *guard = 100;
            panic!("poison the lock");
        })
        .join();

        assert_eq!(*mutex.lock_or_recover(), 100);
    }
}
