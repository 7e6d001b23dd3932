use core::fmt;

use portable_atomic::{AtomicI64, Ordering};

/// Bytes of inert padding placed on each side of the hot field.
///
/// Adjacent-line prefetchers pull 64-byte lines in pairs, so a single line of
/// padding still lets a neighbour land in the pair that holds the value.
pub const PADDING_BYTES: usize = 128;

#[derive(Clone, Copy)]
#[repr(C)]
struct Padding([u8; PADDING_BYTES]);

impl Padding {
    const fn new() -> Self {
        Self([0; PADDING_BYTES])
    }
}

/// A 64-bit signed atomic register isolated on its own cache-line pair.
///
/// The value is surrounded by [`PADDING_BYTES`] of padding on each side and the
/// whole struct is aligned to 128 bytes, so neither neighbouring fields, nor
/// the next element of an array, nor an allocator header can share a prefetch
/// pair with it.
///
/// ## Access modes, weakest to strongest
///
/// | Mode            | Load                  | Store                 | Typical use                                    |
/// |-----------------|-----------------------|-----------------------|------------------------------------------------|
/// | plain           | [`Self::get_plain`]   | [`Self::set_plain`]   | Single writer; read-modify-write is not atomic |
/// | opaque          | [`Self::get_opaque`]  | [`Self::set_opaque`]  | Coherent, no cross-variable ordering. Stats    |
/// | acquire/release | [`Self::get_acquire`] | [`Self::set_release`] | Publish/consume handoff, always as a pair      |
/// | sequential      | [`Self::get`]         | [`Self::set`]         | Single total order across all such accesses    |
///
/// Rust cannot express a data-racy load through a shared reference, so the
/// plain tier loads and stores with [`Ordering::Relaxed`]. What makes it
/// "plain" is the read-modify-write family: `*_plain` additions are a separate
/// load and store, and concurrent writers can lose updates. Use
/// [`Self::get_mut`] for truly unsynchronized access.
///
/// Arithmetic wraps on overflow.
///
/// # Example
///
/// ```
/// use spinflake::PaddedAtomicI64;
///
/// let counter = PaddedAtomicI64::new(10);
/// assert_eq!(counter.get_and_increment(), 10);
/// assert_eq!(counter.compare_and_exchange(11, 20), 11);
/// assert_eq!(counter.compare_and_exchange(11, 30), 20);
/// assert_eq!(counter.get(), 20);
/// ```
#[repr(C, align(128))]
pub struct PaddedAtomicI64 {
    _lhs: Padding,
    value: AtomicI64,
    _rhs: Padding,
}

const _: () = {
    assert!(PaddedAtomicI64::VALUE_OFFSET >= PADDING_BYTES);
    assert!(
        core::mem::size_of::<PaddedAtomicI64>()
            - PaddedAtomicI64::VALUE_OFFSET
            - core::mem::size_of::<AtomicI64>()
            >= PADDING_BYTES
    );
};

impl PaddedAtomicI64 {
    /// Byte offset of the hot field from the start of the register.
    pub const VALUE_OFFSET: usize = core::mem::offset_of!(Self, value);

    /// Creates a register holding `initial`.
    pub const fn new(initial: i64) -> Self {
        Self {
            _lhs: Padding::new(),
            value: AtomicI64::new(initial),
            _rhs: Padding::new(),
        }
    }

    /// Returns a mutable reference to the value. Exclusive access makes any
    /// ordering moot.
    pub fn get_mut(&mut self) -> &mut i64 {
        self.value.get_mut()
    }

    /// Consumes the register and returns the value.
    pub fn into_inner(self) -> i64 {
        self.value.into_inner()
    }

    // ---------------------------------------------------------------------
    // Plain
    // ---------------------------------------------------------------------

    /// Loads the value without any ordering guarantee.
    #[inline]
    pub fn get_plain(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Stores the value without any ordering guarantee.
    #[inline]
    pub fn set_plain(&self, value: i64) {
        self.value.store(value, Ordering::Relaxed);
    }

    /// Adds `delta` as a separate load and store, returning the previous
    /// value.
    ///
    /// Not atomic: only correct when this is the only writer.
    #[inline]
    pub fn get_and_add_plain(&self, delta: i64) -> i64 {
        let current = self.value.load(Ordering::Relaxed);
        self.value.store(current.wrapping_add(delta), Ordering::Relaxed);
        current
    }

    /// Adds `delta` as a separate load and store, returning the new value.
    ///
    /// Not atomic: only correct when this is the only writer.
    #[inline]
    pub fn add_and_get_plain(&self, delta: i64) -> i64 {
        self.get_and_add_plain(delta).wrapping_add(delta)
    }

    /// Single-writer increment returning the previous value.
    #[inline]
    pub fn get_and_increment_plain(&self) -> i64 {
        self.get_and_add_plain(1)
    }

    /// Single-writer increment returning the new value.
    #[inline]
    pub fn increment_and_get_plain(&self) -> i64 {
        self.add_and_get_plain(1)
    }

    /// Single-writer decrement returning the previous value.
    #[inline]
    pub fn get_and_decrement_plain(&self) -> i64 {
        self.get_and_add_plain(-1)
    }

    /// Single-writer decrement returning the new value.
    #[inline]
    pub fn decrement_and_get_plain(&self) -> i64 {
        self.add_and_get_plain(-1)
    }

    /// Compare-and-set with no ordering guarantee that may fail spuriously.
    ///
    /// A `false` return does not imply the value differed from `expected`;
    /// call it in a loop.
    #[inline]
    pub fn weak_compare_and_set_plain(&self, expected: i64, new: i64) -> bool {
        self.value
            .compare_exchange_weak(expected, new, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
    }

    // ---------------------------------------------------------------------
    // Opaque
    // ---------------------------------------------------------------------

    /// Atomic, coherent load that orders nothing else.
    #[inline]
    pub fn get_opaque(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Atomic, coherent store that orders nothing else.
    #[inline]
    pub fn set_opaque(&self, value: i64) {
        self.value.store(value, Ordering::Relaxed);
    }

    /// Atomically adds `delta`, returning the previous value.
    #[inline]
    pub fn get_and_add_opaque(&self, delta: i64) -> i64 {
        self.value.fetch_add(delta, Ordering::Relaxed)
    }

    /// Atomically adds `delta`, returning the new value.
    #[inline]
    pub fn add_and_get_opaque(&self, delta: i64) -> i64 {
        self.get_and_add_opaque(delta).wrapping_add(delta)
    }

    #[inline]
    pub fn get_and_increment_opaque(&self) -> i64 {
        self.get_and_add_opaque(1)
    }

    #[inline]
    pub fn increment_and_get_opaque(&self) -> i64 {
        self.add_and_get_opaque(1)
    }

    #[inline]
    pub fn get_and_decrement_opaque(&self) -> i64 {
        self.get_and_add_opaque(-1)
    }

    #[inline]
    pub fn decrement_and_get_opaque(&self) -> i64 {
        self.add_and_get_opaque(-1)
    }

    // ---------------------------------------------------------------------
    // Acquire / Release
    // ---------------------------------------------------------------------

    /// Acquire load. Pairs with [`Self::set_release`]: once the released value
    /// is observed, every write the releasing thread made before it is
    /// visible too.
    #[inline]
    pub fn get_acquire(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    /// Release store. Pairs with [`Self::get_acquire`].
    #[inline]
    pub fn set_release(&self, value: i64) {
        self.value.store(value, Ordering::Release);
    }

    #[inline]
    pub fn get_and_add_acquire(&self, delta: i64) -> i64 {
        self.value.fetch_add(delta, Ordering::Acquire)
    }

    #[inline]
    pub fn add_and_get_acquire(&self, delta: i64) -> i64 {
        self.get_and_add_acquire(delta).wrapping_add(delta)
    }

    #[inline]
    pub fn get_and_increment_acquire(&self) -> i64 {
        self.get_and_add_acquire(1)
    }

    #[inline]
    pub fn increment_and_get_acquire(&self) -> i64 {
        self.add_and_get_acquire(1)
    }

    #[inline]
    pub fn get_and_decrement_acquire(&self) -> i64 {
        self.get_and_add_acquire(-1)
    }

    #[inline]
    pub fn decrement_and_get_acquire(&self) -> i64 {
        self.add_and_get_acquire(-1)
    }

    #[inline]
    pub fn get_and_add_release(&self, delta: i64) -> i64 {
        self.value.fetch_add(delta, Ordering::Release)
    }

    #[inline]
    pub fn add_and_get_release(&self, delta: i64) -> i64 {
        self.get_and_add_release(delta).wrapping_add(delta)
    }

    #[inline]
    pub fn get_and_increment_release(&self) -> i64 {
        self.get_and_add_release(1)
    }

    #[inline]
    pub fn increment_and_get_release(&self) -> i64 {
        self.add_and_get_release(1)
    }

    #[inline]
    pub fn get_and_decrement_release(&self) -> i64 {
        self.get_and_add_release(-1)
    }

    #[inline]
    pub fn decrement_and_get_release(&self) -> i64 {
        self.add_and_get_release(-1)
    }

    /// Compare-and-exchange that acquires on both success and failure.
    ///
    /// Returns the witness value; see [`Self::compare_and_exchange`].
    #[inline]
    pub fn compare_and_exchange_acquire(&self, expected: i64, new: i64) -> i64 {
        witness(
            self.value
                .compare_exchange(expected, new, Ordering::Acquire, Ordering::Acquire),
        )
    }

    /// Compare-and-exchange that releases on success.
    ///
    /// Returns the witness value; see [`Self::compare_and_exchange`].
    #[inline]
    pub fn compare_and_exchange_release(&self, expected: i64, new: i64) -> i64 {
        witness(
            self.value
                .compare_exchange(expected, new, Ordering::Release, Ordering::Relaxed),
        )
    }

    #[inline]
    pub fn weak_compare_and_set_acquire(&self, expected: i64, new: i64) -> bool {
        self.value
            .compare_exchange_weak(expected, new, Ordering::Acquire, Ordering::Acquire)
            .is_ok()
    }

    #[inline]
    pub fn weak_compare_and_set_release(&self, expected: i64, new: i64) -> bool {
        self.value
            .compare_exchange_weak(expected, new, Ordering::Release, Ordering::Relaxed)
            .is_ok()
    }

    // ---------------------------------------------------------------------
    // Sequentially consistent
    // ---------------------------------------------------------------------

    /// Sequentially consistent load.
    #[inline]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::SeqCst)
    }

    /// Sequentially consistent store.
    #[inline]
    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::SeqCst);
    }

    /// Atomically replaces the value, returning the previous one.
    #[inline]
    pub fn get_and_set(&self, value: i64) -> i64 {
        self.value.swap(value, Ordering::SeqCst)
    }

    /// Atomically sets the value to `new` if it currently equals `expected`.
    ///
    /// Always returns the value actually observed, the *witness*. The
    /// exchange succeeded iff the witness equals `expected`; on failure the
    /// witness is the fresh value, so a retry loop needs no extra load.
    ///
    /// ```
    /// use spinflake::PaddedAtomicI64;
    ///
    /// let register = PaddedAtomicI64::new(3);
    /// let mut current = register.get_opaque();
    /// loop {
    ///     let witness = register.compare_and_exchange(current, current * 2);
    ///     if witness == current {
    ///         break;
    ///     }
    ///     current = witness;
    /// }
    /// assert_eq!(register.get(), 6);
    /// ```
    #[inline]
    pub fn compare_and_exchange(&self, expected: i64, new: i64) -> i64 {
        witness(
            self.value
                .compare_exchange(expected, new, Ordering::SeqCst, Ordering::SeqCst),
        )
    }

    /// Sequentially consistent compare-and-set reporting only success.
    #[inline]
    pub fn compare_and_set(&self, expected: i64, new: i64) -> bool {
        self.value
            .compare_exchange(expected, new, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Sequentially consistent compare-and-set that may fail spuriously.
    #[inline]
    pub fn weak_compare_and_set(&self, expected: i64, new: i64) -> bool {
        self.value
            .compare_exchange_weak(expected, new, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    #[inline]
    pub fn get_and_add(&self, delta: i64) -> i64 {
        self.value.fetch_add(delta, Ordering::SeqCst)
    }

    #[inline]
    pub fn add_and_get(&self, delta: i64) -> i64 {
        self.get_and_add(delta).wrapping_add(delta)
    }

    #[inline]
    pub fn get_and_increment(&self) -> i64 {
        self.get_and_add(1)
    }

    #[inline]
    pub fn increment_and_get(&self) -> i64 {
        self.add_and_get(1)
    }

    #[inline]
    pub fn get_and_decrement(&self) -> i64 {
        self.get_and_add(-1)
    }

    #[inline]
    pub fn decrement_and_get(&self) -> i64 {
        self.add_and_get(-1)
    }
}

#[inline]
fn witness(result: Result<i64, i64>) -> i64 {
    match result {
        Ok(v) | Err(v) => v,
    }
}

impl Default for PaddedAtomicI64 {
    fn default() -> Self {
        Self::new(0)
    }
}

impl From<i64> for PaddedAtomicI64 {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for PaddedAtomicI64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PaddedAtomicI64").field(&self.get()).finish()
    }
}

impl fmt::Display for PaddedAtomicI64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.get(), f)
    }
}
