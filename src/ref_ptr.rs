use allocator_api2::alloc::{ AllocError, Allocator, Global };
use std::{
    cmp::Ordering,
    fmt::{ Debug, Display, Pointer },
    hash::{ Hash, Hasher },
    marker::PhantomData,
    mem::{ self, ManuallyDrop },
    ops::Deref,
    ptr::NonNull
};
use crate::{
    ref_count::{ RefCount, Upcast },
    ref_counted::RefCounted
};

/// Strong reference to an intrusively counted pointee.
///
/// Either empty or owning exactly one unit of the pointee's count. Cloning
/// takes another unit, dropping gives one back, and a Rust move hands the
/// unit over without touching the count at all.
pub struct RefPtr<P>
where P: ?Sized + RefCount
{
    ptr: Option<NonNull<P>>,
    _owns: PhantomData<P>
}

impl<P> RefPtr<P>
where P: ?Sized + RefCount
{
    pub const fn null() -> Self { Self { ptr: None, _owns: PhantomData } }

    /// Shares `ptr`, adding one to its count.
    ///
    /// # Safety
    /// `ptr` must point to a live pointee, kept alive by some other reference
    /// or freshly created with a count of zero.
    pub unsafe fn from_raw(ptr: NonNull<P>) -> Self {
        unsafe {
            ptr.as_ref().add_ref();
            Self::adopt(ptr)
        }
    }

    /// [`from_raw`](Self::from_raw), with a null pointer giving an empty handle.
    ///
    /// # Safety
    /// Same as `from_raw` when `ptr` is non-null.
    pub unsafe fn from_raw_opt(ptr: *mut P) -> Self {
        match NonNull::new(ptr) {
            Some(p) => unsafe { Self::from_raw(p) },
            None => Self::null()
        }
    }

    /// Takes over a unit of the count the caller already holds, such as one
    /// given up by [`release`](Self::release). The count is not touched.
    ///
    /// # Safety
    /// The caller must own one unit of `ptr`'s count and give it up here.
    pub unsafe fn adopt(ptr: NonNull<P>) -> Self { Self { ptr: Some(ptr), _owns: PhantomData } }

    pub fn get(&self) -> Option<&P> { self.ptr.map(|p| unsafe { &*p.as_ptr() }) }
    pub fn as_raw(&self) -> Option<NonNull<P>> { self.ptr }
    pub fn is_null(&self) -> bool { self.ptr.is_none() }

    pub fn ref_count(&self) -> usize { self.get().map_or(0, RefCount::ref_count) }
    pub fn has_one_ref(&self) -> bool { self.get().is_some_and(RefCount::has_one_ref) }

    /// Gives up ownership without decrementing. The caller now holds the unit
    /// and has to return it with [`RefCount::release`] or [`adopt`](Self::adopt)
    /// it back into a handle.
    #[must_use = "the released reference leaks unless it is released or adopted"]
    pub fn release(&mut self) -> Option<NonNull<P>> { self.ptr.take() }

    /// Moves the reference out, leaving this handle empty.
    pub fn take(&mut self) -> Self { mem::take(self) }

    pub fn reset(&mut self) { drop(self.take()); }

    pub fn swap(&mut self, other: &mut Self) { mem::swap(&mut self.ptr, &mut other.ptr); }

    /// Exchanges the held reference with a raw slot. Counts stay where they are.
    ///
    /// # Safety
    /// A non-null `slot` must carry one unit of its pointee's count, which
    /// this handle takes over; the slot is handed this handle's unit in return.
    pub unsafe fn swap_raw(&mut self, slot: &mut Option<NonNull<P>>) { mem::swap(&mut self.ptr, slot); }

    /// Copy-assigns from another handle: the new pointee is referenced before
    /// the old one is released, so assigning a handle to its own pointee is fine.
    pub fn assign(&mut self, other: &Self) { *self = other.clone(); }

    /// Points this handle at `ptr`, adding a reference to it before dropping the
    /// previous one.
    ///
    /// # Safety
    /// A non-null `ptr` must be live, as for [`from_raw`](Self::from_raw).
    pub unsafe fn assign_raw(&mut self, ptr: Option<NonNull<P>>) {
        if let Some(p) = ptr {
            unsafe { p.as_ref().add_ref() };
        }
        let old = mem::replace(&mut self.ptr, ptr);
        if let Some(p) = old {
            unsafe { p.as_ref().release() };
        }
    }

    /// Converts into a handle to a more general pointee, typically
    /// `RefCounted<dyn Trait>`, without touching the count.
    pub fn upcast<Q>(self) -> RefPtr<Q>
    where P: Upcast<Q>,
          Q: ?Sized + RefCount
    {
        let this = ManuallyDrop::new(self);
        RefPtr {
            ptr: this.ptr.map(|p| unsafe { NonNull::new_unchecked(P::upcast(p.as_ptr())) }),
            _owns: PhantomData
        }
    }

    /// Shares the pointee under a more general type, adding one reference.
    pub fn upcast_ref<Q>(&self) -> RefPtr<Q>
    where P: Upcast<Q>,
          Q: ?Sized + RefCount
    {
        self.clone().upcast()
    }

    /// Whether both handles hold the same pointee. Two empty handles are equal.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool { a.addr() == b.addr() }

    fn addr(&self) -> usize { self.ptr.map_or(0, |p| p.cast::<u8>().as_ptr() as usize) }
}

impl<T> RefPtr<RefCounted<T, Global>> {
    /// Wraps `value` in a [`RefCounted`] and holds the first reference to it.
    pub fn new(value: T) -> Self { Self::new_in(value, Global) }

    /// Builds the payload with `f`, for constructors that take several arguments.
    pub fn new_with<F>(f: F) -> Self
    where F: FnOnce() -> T
    {
        Self::new(f())
    }
}

impl<T, A> RefPtr<RefCounted<T, A>>
where A: Allocator
{
    pub fn new_in(value: T, alloc: A) -> Self {
        unsafe { Self::from_raw(RefCounted::new_raw_in(value, alloc)) }
    }

    pub fn try_new_in(value: T, alloc: A) -> Result<Self, AllocError> {
        let raw = RefCounted::try_new_raw_in(value, alloc)?;
        Ok(unsafe { Self::from_raw(raw) })
    }

    /// Mutable access to the payload, cloning it into a fresh allocation first
    /// if anybody else still shares it. Panics on a null handle.
    pub fn make_mut(&mut self) -> &mut T
    where T: Clone,
          A: Clone
    {
        if !self.has_one_ref() {
            let (value, alloc) = {
                let shared: &RefCounted<T, A> = self;
                ref_debug!("make_mut cloning shared payload at {:p}", shared);
                (shared.get().clone(), shared.allocator().clone())
            };
            *self = Self::new_in(value, alloc);
        }
        unsafe { (**self).get_mut_unchecked() }
    }
}

impl<T, A> RefPtr<RefCounted<T, A>>
where T: ?Sized,
      A: Allocator
{
    /// Mutable access to the payload, only while this is the sole reference.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        match self.get() {
            Some(rep) if rep.has_one_ref() => Some(unsafe { rep.get_mut_unchecked() }),
            _ => None
        }
    }
}

impl<P> Clone for RefPtr<P>
where P: ?Sized + RefCount
{
    fn clone(&self) -> Self {
        if let Some(rep) = self.get() {
            rep.add_ref();
        }
        Self { ptr: self.ptr, _owns: PhantomData }
    }

    fn clone_from(&mut self, source: &Self) { self.assign(source); }
}

impl<P> Drop for RefPtr<P>
where P: ?Sized + RefCount
{
    fn drop(&mut self) {
        if let Some(p) = self.ptr.take() {
            unsafe { p.as_ref().release() };
        }
    }
}

impl<P> Default for RefPtr<P>
where P: ?Sized + RefCount
{
    fn default() -> Self { Self::null() }
}

impl<P> Deref for RefPtr<P>
where P: ?Sized + RefCount
{
    type Target = P;
    fn deref(&self) -> &Self::Target {
        match self.get() {
            Some(rep) => rep,
            None => panic!("dereferenced a null RefPtr")
        }
    }
}

// Shared across threads like Arc: the pointee is read from several threads and
// may be destroyed on any of them.
unsafe impl<P: ?Sized + RefCount + Send + Sync> Send for RefPtr<P> {}
unsafe impl<P: ?Sized + RefCount + Send + Sync> Sync for RefPtr<P> {}

impl<P> PartialEq for RefPtr<P>
where P: ?Sized + RefCount
{
    fn eq(&self, other: &Self) -> bool { Self::ptr_eq(self, other) }
}

impl<P> Eq for RefPtr<P>
where P: ?Sized + RefCount
{}

impl<P> PartialOrd for RefPtr<P>
where P: ?Sized + RefCount
{
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl<P> Ord for RefPtr<P>
where P: ?Sized + RefCount
{
    fn cmp(&self, other: &Self) -> Ordering { self.addr().cmp(&other.addr()) }
}

impl<P> Hash for RefPtr<P>
where P: ?Sized + RefCount
{
    fn hash<H: Hasher>(&self, state: &mut H) { self.addr().hash(state); }
}

impl<P> Debug for RefPtr<P>
where P: ?Sized + RefCount + Debug
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.get() {
            Some(rep) => write!(f, "RefPtr {{ data: {:?}, strong: {} }}", rep, rep.ref_count()),
            None => write!(f, "RefPtr {{ null }}")
        }
    }
}

impl<P> Display for RefPtr<P>
where P: ?Sized + RefCount + Display
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.get() {
            Some(rep) => write!(f, "{}", rep),
            None => write!(f, "null")
        }
    }
}

impl<P> Pointer for RefPtr<P>
where P: ?Sized + RefCount
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Pointer::fmt(&(self.addr() as *const u8), f)
    }
}
