use std::future::Future;
use tokio::sync::OnceCell;

/// Lazily built shared value that only remembers success.
///
/// The initializer runs until it succeeds; errors are handed back to the
/// caller and the next call tries again. Concurrent
/// callers wait on a single in-flight initialization.
#[derive(Debug)]
pub struct SingletonCache<T> {
    cell: OnceCell<T>,
}

impl<T> Default for SingletonCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SingletonCache<T> {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::const_new(),
        }
    }

    /// Already holding `value`.
    pub fn with_value(value: T) -> Self {
        Self {
            cell: OnceCell::new_with(Some(value)),
        }
    }

    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    pub async fn get_or_try_init<E, F, Fut>(&self, init: F) -> Result<&T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.cell.get_or_try_init(init).await
    }
}
