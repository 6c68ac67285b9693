// Logging goes through these so the `log` feature can compile it out entirely.

macro_rules! ref_trace {
    ($($arg:tt)+) => {
        #[cfg(feature = "log")]
        log::trace!($($arg)+);
    };
}

macro_rules! ref_debug {
    ($($arg:tt)+) => {
        #[cfg(feature = "log")]
        log::debug!($($arg)+);
    };
}

/// Implements [`Upcast`](crate::Upcast) for a concrete payload type through
/// Rust's unsized coercion, so that `RefPtr<RefCounted<From>>` can be turned
/// into `RefPtr<RefCounted<To>>`.
///
/// ```
/// use refptr::{ impl_upcast, RefCounted, RefPtr };
///
/// trait Shape { fn area(&self) -> f64; }
/// struct Square(f64);
/// impl Shape for Square { fn area(&self) -> f64 { self.0 * self.0 } }
/// impl_upcast!(Square => dyn Shape, dyn Shape + Send + Sync);
///
/// let square = RefPtr::new(Square(3.0));
/// let shape: RefPtr<RefCounted<dyn Shape>> = square.upcast_ref();
/// assert_eq!(shape.area(), 9.0);
/// assert_eq!(square.ref_count(), 2);
/// ```
#[macro_export]
macro_rules! impl_upcast {
    ($from:ty => $($to:ty),+ $(,)?) => {
        $(
            unsafe impl $crate::Upcast<$to> for $from {
                fn upcast(ptr: *mut Self) -> *mut $to { ptr }
            }
        )+
    };
}
