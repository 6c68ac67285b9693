//! Intrusive, thread-safe reference counting.
//!
//! A pointee carries its own atomic count and exposes it through [`RefCount`].
//! [`RefCounted`] is the stock way to get one: it wraps any payload together
//! with a counter and frees itself when the last reference goes away.
//! [`RefPtr`] is the strong handle that keeps the count in step with the
//! number of owners.
//!
//! The unit tests are expected to pass under Miri with both Stacked Borrows
//! and Tree Borrows (`cargo +nightly miri test`, optionally with
//! `MIRIFLAGS=-Zmiri-tree-borrows`).
//!
//! ```
//! use refptr::{ RefCounted, RefPtr };
//!
//! let a = RefPtr::new(String::from("Player"));
//! let b = a.clone();
//! assert_eq!(a.ref_count(), 2);
//! drop(a);
//! assert!(b.has_one_ref());
//! assert_eq!(b.as_str(), "Player");
//!
//! // adopting a raw pointee brings its count from 0 to 1
//! let raw = RefCounted::new_raw(7u32);
//! let c = unsafe { RefPtr::from_raw(raw) };
//! assert_eq!(c.ref_count(), 1);
//! ```

#[macro_use]
mod macros;

pub mod ref_count;
pub mod ref_counted;
pub mod ref_ptr;

pub use ref_count::{ RefCount, Upcast };
pub use ref_counted::RefCounted;
pub use ref_ptr::RefPtr;
