use allocator_api2::alloc::{ AllocError, Allocator, Global };
use std::{
    alloc::Layout,
    cell::UnsafeCell,
    fmt::{ Debug, Display },
    ops::Deref,
    ptr::{ self, NonNull },
    sync::atomic::{
        fence,
        AtomicUsize,
        Ordering
    }
};
use crate::ref_count::{ RefCount, Upcast };

// Past this the count is treated as corrupted, same limit Arc uses.
const MAX_REF_COUNT: usize = isize::MAX as usize;

/// A payload glued to its own atomic reference count.
///
/// Only ever lives behind a raw pointer: the constructors hand back a
/// `NonNull` with a count of zero, the first [`RefPtr`](crate::RefPtr) to
/// adopt it takes the count to one, and the allocation is freed inside the
/// [`release`](RefCount::release) call that brings it back to zero. There is
/// no way to drop one directly.
///
/// The whole body sits in one `UnsafeCell`, so a `&RefCounted` never covers
/// frozen bytes and the final `release` may free the allocation it was
/// called through.
#[repr(transparent)]
pub struct RefCounted<T: ?Sized, A = Global>
where A: Allocator
{
    cell: UnsafeCell<Inner<T, A>>
}

#[repr(C)]
struct Inner<T: ?Sized, A> {
    count: AtomicUsize,
    alloc: A,
    value: T
}

impl<T> RefCounted<T, Global> {
    /// Moves `value` onto the heap with a count of zero.
    pub fn new_raw(value: T) -> NonNull<Self> { Self::new_raw_in(value, Global) }
}

impl<T, A> RefCounted<T, A>
where A: Allocator
{
    pub fn new_raw_in(value: T, alloc: A) -> NonNull<Self> {
        match Self::try_new_raw_in(value, alloc) {
            Ok(p) => p,
            Err(_) => std::alloc::handle_alloc_error(Layout::new::<Self>())
        }
    }

    pub fn try_new_raw_in(value: T, alloc: A) -> Result<NonNull<Self>, AllocError> {
        let out = alloc.allocate(Layout::new::<Self>())?.cast::<Self>();
        unsafe {
            out.as_ptr().write(Self {
                cell: UnsafeCell::new(Inner {
                    count: AtomicUsize::new(0),
                    alloc,
                    value
                })
            });
        }
        ref_trace!("created RefCounted<{}> at {:p}", std::any::type_name::<T>(), out);
        Ok(out)
    }
}

impl<T: ?Sized, A> RefCounted<T, A>
where A: Allocator
{
    fn count(&self) -> &AtomicUsize { unsafe { &*ptr::addr_of!((*self.cell.get()).count) } }

    pub fn get(&self) -> &T { unsafe { &*ptr::addr_of!((*self.cell.get()).value) } }

    pub fn allocator(&self) -> &A { unsafe { &*ptr::addr_of!((*self.cell.get()).alloc) } }

    /// # Safety
    /// The caller must hold the only reference, and nobody may read the
    /// payload while the returned borrow lives.
    pub(crate) unsafe fn get_mut_unchecked(&self) -> &mut T {
        unsafe { &mut *ptr::addr_of_mut!((*self.cell.get()).value) }
    }

    // Only reachable from release once the count has hit zero.
    unsafe fn destroy(&self) {
        ref_trace!("destroying RefCounted at {:p}", self);
        let layout = Layout::for_value(self);
        let inner = self.cell.get();
        unsafe {
            let alloc = ptr::read(ptr::addr_of!((*inner).alloc));
            ptr::drop_in_place(ptr::addr_of_mut!((*inner).value));
            alloc.deallocate(NonNull::new_unchecked(inner).cast(), layout);
        }
    }
}

unsafe impl<T: ?Sized, A> RefCount for RefCounted<T, A>
where A: Allocator
{
    fn add_ref(&self) -> usize {
        // a new reference is always made from an existing one, which already
        // orders everything the new owner may see
        let old = self.count().fetch_add(1, Ordering::Relaxed);
        if old >= MAX_REF_COUNT {
            std::process::abort();
        }
        old + 1
    }

    unsafe fn release(&self) -> usize {
        let old = self.count().fetch_sub(1, Ordering::Release);
        debug_assert!(old != 0, "RefCounted at {:p} released more often than referenced", self);
        if old != 1 {
            return old - 1;
        }
        // pairs with the Release above on every other owner's last decrement
        fence(Ordering::Acquire);
        unsafe { self.destroy() };
        0
    }

    fn has_one_ref(&self) -> bool { self.count().load(Ordering::Acquire) == 1 }

    fn ref_count(&self) -> usize { self.count().load(Ordering::Relaxed) }
}

unsafe impl<T, U, A> Upcast<RefCounted<U, A>> for RefCounted<T, A>
where T: Upcast<U>,
      U: ?Sized,
      A: Allocator
{
    fn upcast(ptr: *mut Self) -> *mut RefCounted<U, A> {
        // T::upcast keeps the address, so only the payload metadata changes
        T::upcast(ptr as *mut T) as *mut RefCounted<U, A>
    }
}

// Shared by reference across threads and destroyed on whichever thread lets go last.
unsafe impl<T: ?Sized + Send + Sync, A: Allocator + Send + Sync> Send for RefCounted<T, A> {}
unsafe impl<T: ?Sized + Send + Sync, A: Allocator + Send + Sync> Sync for RefCounted<T, A> {}

impl<T: ?Sized, A> Deref for RefCounted<T, A>
where A: Allocator
{
    type Target = T;
    fn deref(&self) -> &Self::Target { self.get() }
}

impl<T, A> Debug for RefCounted<T, A>
where T: ?Sized + Debug,
      A: Allocator
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RefCounted {{ value: {:?}, count: {} }}", self.get(), self.ref_count())
    }
}

impl<T, A> Display for RefCounted<T, A>
where T: ?Sized + Display,
      A: Allocator
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.get())
    }
}
