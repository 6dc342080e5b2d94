// core/src/core/ctx.rs
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

/// Shared, lockable context handed to every handler of a flow run.
///
/// Guards returned by [`Ctx::read`] and [`Ctx::write`] are blocking and must
/// be dropped before the handler reaches an `.await`.
#[derive(Debug)]
pub struct Ctx<T: Send + Sync + 'static>(Arc<RwLock<T>>);

impl<T: Send + Sync + 'static> Ctx<T> {
  pub fn new(data: T) -> Self {
    Ctx(Arc::new(RwLock::new(data)))
  }

  pub fn read(&self) -> RwLockReadGuard<'_, T> {
    self.0.read()
  }

  pub fn write(&self) -> RwLockWriteGuard<'_, T> {
    self.0.write()
  }

  pub fn try_read(&self) -> Option<RwLockReadGuard<'_, T>> {
    self.0.try_read()
  }

  pub fn try_write(&self) -> Option<RwLockWriteGuard<'_, T>> {
    self.0.try_write()
  }

  /// Read guard narrowed to one part of the context, e.g. `ctx.map_read(|c| &c.items)`.
  pub fn map_read<F, U: ?Sized>(&self, f: F) -> MappedRwLockReadGuard<'_, U>
  where
    F: FnOnce(&T) -> &U,
  {
    RwLockReadGuard::map(self.read(), f)
  }
}

impl<T: Clone + Send + Sync + 'static> Ctx<T> {
  /// Clones the current value out from under the lock.
  pub fn snapshot(&self) -> T {
    self.read().clone()
  }
}

impl<T: Send + Sync + 'static> Clone for Ctx<T> {
  fn clone(&self) -> Self {
    Ctx(Arc::clone(&self.0))
  }
}

impl<T: Send + Sync + 'static + Default> Default for Ctx<T> {
  fn default() -> Self {
    Self::new(Default::default())
  }
}
