// The counting contract a pointee has to satisfy before a RefPtr can hold it.

/// Intrusive reference count.
///
/// # Safety
/// Implementors must keep one count per object, change it only through
/// [`add_ref`](RefCount::add_ref) and [`release`](RefCount::release), and
/// destroy the object exactly once: inside the `release` call that takes the
/// count from one to zero. Both operations must be atomic so they can race
/// from any number of threads.
pub unsafe trait RefCount {
    /// Takes one more reference. Returns the count after the increment.
    fn add_ref(&self) -> usize;

    /// Gives one reference back. Returns the count after the decrement; when
    /// that is zero the object has already been destroyed.
    ///
    /// # Safety
    /// The caller must own the reference it is giving back, and must not
    /// touch `self` again if the result is zero.
    unsafe fn release(&self) -> usize;

    /// Whether the caller's reference is the only one. A `true` answer
    /// happens-after every other owner's last release, so the caller may
    /// treat the payload as exclusively its own.
    fn has_one_ref(&self) -> bool;

    /// Snapshot of the current count. Only meaningful for diagnostics, it can
    /// be stale by the time it is read.
    fn ref_count(&self) -> usize;
}

/// A pointee type that can stand in for `U`, usually a `dyn Trait` it
/// implements.
///
/// # Safety
/// `upcast` must return a pointer to the same address it was given, only
/// attaching the metadata `U` needs.
pub unsafe trait Upcast<U: ?Sized> {
    fn upcast(ptr: *mut Self) -> *mut U;
}

unsafe impl<T, const N: usize> Upcast<[T]> for [T; N] {
    fn upcast(ptr: *mut Self) -> *mut [T] { ptr }
}
