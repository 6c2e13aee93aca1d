//! Array rental.
//!
//! Tables never allocate their backing arrays directly. They rent them from
//! an [`ArrayPool`] and hand them back when they grow, shrink or are dropped.
//! The pool is an ordinary value passed to the collection's constructor, so
//! tests and callers can substitute their own.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::alloc::Layout;
use core::cell::RefCell;
use core::fmt::Debug;
use core::mem::MaybeUninit;
use core::ptr::NonNull;

/// A source of uninitialized arrays.
///
/// Implementations may return arrays longer than requested. `release` must
/// accept any array previously produced by `rent` (including zero-length
/// ones) and must not panic.
pub trait ArrayPool {
    /// Rents an array with room for at least `minimum_length` elements.
    fn rent<T>(&self, minimum_length: usize) -> Box<[MaybeUninit<T>]>;

    /// Takes back an array. No element in `buffer` is considered
    /// initialized. When `clear` is set, the pool must wipe the memory
    /// before handing it out again.
    fn release<T>(&self, buffer: Box<[MaybeUninit<T>]>, clear: bool);
}

impl<P: ArrayPool> ArrayPool for &P {
    #[inline]
    fn rent<T>(&self, minimum_length: usize) -> Box<[MaybeUninit<T>]> {
        (**self).rent(minimum_length)
    }

    #[inline]
    fn release<T>(&self, buffer: Box<[MaybeUninit<T>]>, clear: bool) {
        (**self).release(buffer, clear)
    }
}

impl<P: ArrayPool> ArrayPool for Rc<P> {
    #[inline]
    fn rent<T>(&self, minimum_length: usize) -> Box<[MaybeUninit<T>]> {
        (**self).rent(minimum_length)
    }

    #[inline]
    fn release<T>(&self, buffer: Box<[MaybeUninit<T>]>, clear: bool) {
        (**self).release(buffer, clear)
    }
}

/// A pool that allocates on every rent and frees on every release.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeapPool;

impl ArrayPool for HeapPool {
    fn rent<T>(&self, minimum_length: usize) -> Box<[MaybeUninit<T>]> {
        Box::new_uninit_slice(minimum_length)
    }

    fn release<T>(&self, buffer: Box<[MaybeUninit<T>]>, _clear: bool) {
        drop(buffer);
    }
}

const DEFAULT_MAX_ARRAYS_PER_CLASS: usize = 8;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct SizeClass {
    elem_size: usize,
    align: usize,
    len: usize,
}

impl SizeClass {
    fn of<T>(len: usize) -> Self {
        SizeClass {
            elem_size: core::mem::size_of::<T>(),
            align: core::mem::align_of::<T>(),
            len,
        }
    }

    fn layout(self) -> Layout {
        // SAFETY: Every retained array was allocated as `[MaybeUninit<T>; len]`
        // for a `T` with exactly this size and alignment, so the layout was
        // valid when the array was created.
        unsafe { Layout::from_size_align_unchecked(self.elem_size * self.len, self.align) }
    }
}

/// A single-threaded pool that keeps released arrays for reuse.
///
/// Requests are rounded up to a power-of-two length so arrays of similar size
/// share a class. At most `max_per_class` arrays are retained per element
/// layout and length; extra releases are freed immediately.
pub struct RecyclingPool {
    retained: RefCell<Vec<(SizeClass, Vec<NonNull<u8>>)>>,
    max_per_class: usize,
}

impl Debug for RecyclingPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RecyclingPool")
            .field("retained", &self.retained_count())
            .field("max_per_class", &self.max_per_class)
            .finish()
    }
}

impl Default for RecyclingPool {
    fn default() -> Self {
        Self::new()
    }
}

impl RecyclingPool {
    /// Creates an empty pool with the default per-class bound.
    pub fn new() -> Self {
        Self::with_max_per_class(DEFAULT_MAX_ARRAYS_PER_CLASS)
    }

    /// Creates an empty pool retaining at most `max_per_class` arrays per
    /// size class.
    pub fn with_max_per_class(max_per_class: usize) -> Self {
        RecyclingPool {
            retained: RefCell::new(Vec::new()),
            max_per_class,
        }
    }

    /// Number of arrays currently held for reuse.
    pub fn retained_count(&self) -> usize {
        self.retained.borrow().iter().map(|(_, v)| v.len()).sum()
    }

    /// Frees every retained array.
    pub fn trim(&self) {
        let mut retained = self.retained.borrow_mut();
        for (class, arrays) in retained.drain(..) {
            for ptr in arrays {
                // SAFETY: `ptr` came from `Box::into_raw` on an array with
                // `class.layout()` and has not been handed out since.
                unsafe { alloc::alloc::dealloc(ptr.as_ptr(), class.layout()) };
            }
        }
    }
}

impl Drop for RecyclingPool {
    fn drop(&mut self) {
        self.trim();
    }
}

impl ArrayPool for RecyclingPool {
    fn rent<T>(&self, minimum_length: usize) -> Box<[MaybeUninit<T>]> {
        if minimum_length == 0 || core::mem::size_of::<T>() == 0 {
            return Box::new_uninit_slice(minimum_length);
        }

        let len = minimum_length
            .checked_next_power_of_two()
            .unwrap_or(minimum_length);
        let class = SizeClass::of::<T>(len);

        let reused = self
            .retained
            .borrow_mut()
            .iter_mut()
            .find(|(c, _)| *c == class)
            .and_then(|(_, arrays)| arrays.pop());

        match reused {
            // SAFETY: The pointer was produced by `Box::into_raw` on a
            // `Box<[MaybeUninit<U>]>` of length `len` where `U` has the same
            // size and alignment as `T`, so the allocation matches the layout
            // of `[MaybeUninit<T>; len]`. `MaybeUninit` carries no validity
            // requirement for its contents.
            Some(ptr) => unsafe {
                Box::from_raw(core::ptr::slice_from_raw_parts_mut(
                    ptr.as_ptr().cast::<MaybeUninit<T>>(),
                    len,
                ))
            },
            None => Box::new_uninit_slice(len),
        }
    }

    fn release<T>(&self, mut buffer: Box<[MaybeUninit<T>]>, clear: bool) {
        let len = buffer.len();
        if len == 0 || core::mem::size_of::<T>() == 0 || !len.is_power_of_two() {
            return;
        }

        let class = SizeClass::of::<T>(len);
        let mut retained = self.retained.borrow_mut();
        let index = match retained.iter().position(|(c, _)| *c == class) {
            Some(index) => index,
            None => {
                retained.push((class, Vec::new()));
                retained.len() - 1
            }
        };

        let arrays = &mut retained[index].1;
        if arrays.len() >= self.max_per_class {
            return;
        }

        if clear {
            // SAFETY: `buffer` owns `len` elements worth of writable memory.
            unsafe { core::ptr::write_bytes(buffer.as_mut_ptr(), 0, len) };
        }

        let raw = Box::into_raw(buffer).cast::<u8>();
        // SAFETY: `Box::into_raw` never returns null.
        arrays.push(unsafe { NonNull::new_unchecked(raw) });
    }
}

#[cfg(feature = "std")]
std::thread_local! {
    static SHARED: RecyclingPool = RecyclingPool::new();
}

/// Handle to a per-thread [`RecyclingPool`].
///
/// Zero-sized and `Copy`, so every collection can carry one at no cost.
/// During thread teardown it falls back to plain allocation.
#[cfg(feature = "std")]
#[derive(Clone, Copy, Debug, Default)]
pub struct SharedPool;

#[cfg(feature = "std")]
impl ArrayPool for SharedPool {
    fn rent<T>(&self, minimum_length: usize) -> Box<[MaybeUninit<T>]> {
        SHARED
            .try_with(|pool| pool.rent::<T>(minimum_length))
            .unwrap_or_else(|_| Box::new_uninit_slice(minimum_length))
    }

    fn release<T>(&self, buffer: Box<[MaybeUninit<T>]>, clear: bool) {
        let _ = SHARED.try_with(|pool| pool.release(buffer, clear));
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "std")] {
        /// Pool used by collections constructed without an explicit pool.
        pub type DefaultPool = SharedPool;
    } else {
        /// Pool used by collections constructed without an explicit pool.
        pub type DefaultPool = HeapPool;
    }
}

/// An array rented from an [`ArrayPool`].
///
/// The array does not track which of its elements are initialized; that is
/// the owner's job. `clear_on_return` records whether the memory should be
/// wiped when it goes back to the pool, which is the case whenever `T` owns
/// resources.
pub struct RentedArray<T> {
    buffer: Box<[MaybeUninit<T>]>,
    clear_on_return: bool,
}

impl<T> Debug for RentedArray<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RentedArray")
            .field("len", &self.buffer.len())
            .field("clear_on_return", &self.clear_on_return)
            .finish()
    }
}

impl<T> RentedArray<T> {
    /// A zero-length array that owes nothing to any pool.
    pub fn empty() -> Self {
        RentedArray {
            buffer: Box::new_uninit_slice(0),
            clear_on_return: core::mem::needs_drop::<T>(),
        }
    }

    /// Rents an array of at least `minimum_length` elements from `pool`.
    pub fn rent<P: ArrayPool>(pool: &P, minimum_length: usize) -> Self {
        if minimum_length == 0 {
            return Self::empty();
        }

        let buffer = pool.rent::<T>(minimum_length);
        assert!(
            buffer.len() >= minimum_length,
            "pool returned {} elements, {} requested",
            buffer.len(),
            minimum_length
        );

        RentedArray {
            buffer,
            clear_on_return: core::mem::needs_drop::<T>(),
        }
    }

    /// Overrides whether the pool is asked to wipe the array on return.
    pub fn with_clear_on_return(mut self, clear: bool) -> Self {
        self.clear_on_return = clear;
        self
    }

    /// Length of the rented array, which may exceed the requested length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns `true` for a zero-length array.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Whether the pool is asked to wipe this array when it is returned.
    pub fn clear_on_return(&self) -> bool {
        self.clear_on_return
    }

    /// The raw elements, initialized or not.
    pub fn as_uninit_slice(&self) -> &[MaybeUninit<T>] {
        &self.buffer
    }

    /// The raw elements, initialized or not.
    pub fn as_uninit_slice_mut(&mut self) -> &mut [MaybeUninit<T>] {
        &mut self.buffer
    }

    #[inline(always)]
    pub(crate) fn as_ptr(&self) -> *const T {
        self.buffer.as_ptr().cast()
    }

    #[inline(always)]
    pub(crate) fn as_mut_ptr(&mut self) -> *mut T {
        self.buffer.as_mut_ptr().cast()
    }

    /// Views the first `len` elements as initialized.
    ///
    /// # Safety
    ///
    /// `len <= self.len()` and elements `0..len` must be initialized.
    #[inline(always)]
    pub(crate) unsafe fn assume_init_prefix(&self, len: usize) -> &[T] {
        debug_assert!(len <= self.buffer.len());
        // SAFETY: Caller guarantees the prefix is in bounds and initialized.
        unsafe { core::slice::from_raw_parts(self.as_ptr(), len) }
    }

    /// Views the first `len` elements as initialized.
    ///
    /// # Safety
    ///
    /// `len <= self.len()` and elements `0..len` must be initialized.
    #[inline(always)]
    pub(crate) unsafe fn assume_init_prefix_mut(&mut self, len: usize) -> &mut [T] {
        debug_assert!(len <= self.buffer.len());
        // SAFETY: Caller guarantees the prefix is in bounds and initialized.
        unsafe { core::slice::from_raw_parts_mut(self.as_mut_ptr(), len) }
    }

    /// Gives the array back to `pool`. Elements are not dropped.
    pub fn return_to<P: ArrayPool>(self, pool: &P) {
        if self.buffer.is_empty() {
            return;
        }
        pool.release(self.buffer, self.clear_on_return);
    }
}

/// Returns `array` to `pool`, swallowing (and logging) any panic raised by
/// the pool. Used on teardown paths that must not unwind.
pub(crate) fn release_quietly<T, P: ArrayPool>(array: RentedArray<T>, pool: &P) {
    cfg_if::cfg_if! {
        if #[cfg(feature = "std")] {
            let len = array.len();
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                array.return_to(pool);
            }));
            if result.is_err() {
                log::warn!("array pool panicked while taking back a {len}-element array; ignored");
            }
        } else {
            array.return_to(pool);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use core::cell::Cell;

    use super::*;

    /// Pool double that counts traffic and forwards to the heap.
    #[derive(Default)]
    pub(crate) struct RecordingPool {
        pub(crate) rents: Cell<usize>,
        pub(crate) releases: Cell<usize>,
        pub(crate) cleared: Cell<usize>,
        pub(crate) outstanding: Cell<isize>,
    }

    impl ArrayPool for RecordingPool {
        fn rent<T>(&self, minimum_length: usize) -> Box<[MaybeUninit<T>]> {
            self.rents.set(self.rents.get() + 1);
            self.outstanding.set(self.outstanding.get() + 1);
            HeapPool.rent(minimum_length)
        }

        fn release<T>(&self, buffer: Box<[MaybeUninit<T>]>, clear: bool) {
            self.releases.set(self.releases.get() + 1);
            self.outstanding.set(self.outstanding.get() - 1);
            if clear {
                self.cleared.set(self.cleared.get() + 1);
            }
            HeapPool.release(buffer, clear);
        }
    }

    struct PanickingPool;

    impl ArrayPool for PanickingPool {
        fn rent<T>(&self, minimum_length: usize) -> Box<[MaybeUninit<T>]> {
            HeapPool.rent(minimum_length)
        }

        fn release<T>(&self, _buffer: Box<[MaybeUninit<T>]>, _clear: bool) {
            panic!("release refused");
        }
    }

    #[test]
    fn heap_pool_rents_exact() {
        let array = RentedArray::<u64>::rent(&HeapPool, 13);
        assert_eq!(array.len(), 13);
        assert!(!array.clear_on_return());
        array.return_to(&HeapPool);

        let strings = RentedArray::<alloc::string::String>::rent(&HeapPool, 1);
        assert!(strings.clear_on_return());
    }

    #[test]
    fn zero_length_needs_no_pool() {
        let pool = RecordingPool::default();
        let array = RentedArray::<u32>::rent(&pool, 0);
        assert!(array.is_empty());
        array.return_to(&pool);
        assert_eq!(pool.rents.get(), 0);
        assert_eq!(pool.releases.get(), 0);

        let recycling = RecyclingPool::new();
        recycling.release::<u32>(Box::new_uninit_slice(0), true);
        assert_eq!(recycling.retained_count(), 0);
    }

    #[test]
    fn recycling_pool_reuses_arrays() {
        let pool = RecyclingPool::new();
        let first = pool.rent::<u64>(100);
        assert_eq!(first.len(), 128);
        let address = first.as_ptr() as usize;
        pool.release(first, false);
        assert_eq!(pool.retained_count(), 1);

        let second = pool.rent::<i64>(65);
        assert_eq!(second.as_ptr() as usize, address);
        assert_eq!(pool.retained_count(), 0);

        let third = pool.rent::<u32>(100);
        assert_ne!(third.as_ptr() as usize, address);
        pool.release(second, false);
        pool.release(third, false);
        assert_eq!(pool.retained_count(), 2);
    }

    #[test]
    fn recycling_pool_clears_on_request() {
        let pool = RecyclingPool::new();
        let mut array = pool.rent::<u64>(8);
        for slot in array.iter_mut() {
            slot.write(u64::MAX);
        }
        pool.release(array, true);

        let array = pool.rent::<u64>(8);
        for slot in array.iter() {
            // SAFETY: the pool zeroed the memory and zero is a valid u64.
            assert_eq!(unsafe { slot.assume_init_read() }, 0);
        }
        pool.release(array, false);
    }

    #[test]
    fn recycling_pool_bounds_retention() {
        let pool = RecyclingPool::with_max_per_class(2);
        let arrays: Vec<_> = (0..4).map(|_| pool.rent::<u16>(16)).collect();
        for array in arrays {
            pool.release(array, false);
        }
        assert_eq!(pool.retained_count(), 2);

        pool.trim();
        assert_eq!(pool.retained_count(), 0);
    }

    #[test]
    fn recycling_pool_ignores_foreign_lengths() {
        let pool = RecyclingPool::new();
        pool.release(HeapPool.rent::<u8>(10), false);
        assert_eq!(pool.retained_count(), 0);
    }

    #[test]
    fn shared_through_rc() {
        let pool = Rc::new(RecyclingPool::new());
        let a = pool.clone();
        let b = pool.clone();
        a.release(a.rent::<u8>(4), false);
        let array = b.rent::<u8>(4);
        assert_eq!(pool.retained_count(), 0);
        b.release(array, false);
        assert_eq!(pool.retained_count(), 1);
    }

    #[cfg(feature = "std")]
    #[test]
    fn shared_pool_round_trip() {
        let array = RentedArray::<u32>::rent(&SharedPool, 5);
        assert!(array.len() >= 5);
        array.return_to(&SharedPool);
    }

    #[cfg(feature = "std")]
    #[test_log::test]
    fn release_quietly_swallows_panics() {
        let array = RentedArray::<u8>::rent(&PanickingPool, 4);
        release_quietly(array, &PanickingPool);
    }
}
