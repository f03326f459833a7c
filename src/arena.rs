//! Grow-only storage pools and the hashing shared by the interning maps.
//!
//! Every pool in the front-end (identifiers, types, AST dwords, value
//! bytes) is append-only for the lifetime of a run. [`ReservedBuf`]
//! models the reserved/committed arena discipline: a buffer is created
//! with an initial committed capacity and a hard reserve limit, and
//! exceeding the limit is fatal.

use std::hash::{BuildHasherDefault, Hasher};

use crate::diagnostics::fatal;

/// A grow-only buffer with a hard element limit.
///
/// Growth past the initial capacity is allowed up to `limit` elements;
/// exceeding the limit terminates the process, mirroring the fatal
/// arena-overflow policy of the rest of the pipeline.
#[derive(Debug)]
pub struct ReservedBuf<T> {
    items: Vec<T>,
    limit: usize,
    name: &'static str,
}

impl<T> ReservedBuf<T> {
    pub fn new(name: &'static str, commit: usize, limit: usize) -> Self {
        debug_assert!(commit <= limit);

        Self {
            items: Vec::with_capacity(commit),
            limit,
            name,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, item: T) -> u32 {
        self.ensure(1);

        let index = self.items.len() as u32;

        self.items.push(item);

        index
    }

    /// Appends `count` default-initialized elements, returning the
    /// index of the first one.
    pub fn extend_with(&mut self, count: usize) -> u32
    where
        T: Default + Clone,
    {
        self.ensure(count);

        let index = self.items.len() as u32;

        self.items.resize(self.items.len() + count, T::default());

        index
    }

    pub fn extend_from_slice(&mut self, items: &[T])
    where
        T: Clone,
    {
        self.ensure(items.len());

        self.items.extend_from_slice(items);
    }

    /// Shrinks the buffer back to `len` elements. Used by stack-shaped
    /// pools; never reclaims capacity.
    pub fn truncate(&mut self, len: usize) {
        debug_assert!(len <= self.items.len());

        self.items.truncate(len);
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items
    }

    fn ensure(&mut self, additional: usize) {
        if self.items.len() + additional > self.limit {
            fatal(format_args!(
                "{} arena exceeds its reserve limit of {} elements",
                self.name, self.limit
            ));
        }
    }
}

impl<T> std::ops::Index<u32> for ReservedBuf<T> {
    type Output = T;

    fn index(&self, index: u32) -> &T {
        &self.items[index as usize]
    }
}

impl<T> std::ops::IndexMut<u32> for ReservedBuf<T> {
    fn index_mut(&mut self, index: u32) -> &mut T {
        &mut self.items[index as usize]
    }
}

/// 32-bit FNV-1a, the hash used by all interning maps in the front-end.
pub fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash = 0x811c_9dc5u32;

    for &b in bytes {
        hash ^= u32::from(b);
        hash = hash.wrapping_mul(0x0100_0193);
    }

    hash
}

/// [`Hasher`] adapter over [`fnv1a`] so the standard `HashMap` can be
/// used without pulling in a different hash than the pools mandate.
#[derive(Default)]
pub struct Fnv1aHasher {
    hash: u32,
    started: bool,
}

impl Hasher for Fnv1aHasher {
    fn finish(&self) -> u64 {
        u64::from(self.hash)
    }

    fn write(&mut self, bytes: &[u8]) {
        if !self.started {
            self.hash = 0x811c_9dc5;
            self.started = true;
        }

        for &b in bytes {
            self.hash ^= u32::from(b);
            self.hash = self.hash.wrapping_mul(0x0100_0193);
        }
    }
}

pub type FnvBuildHasher = BuildHasherDefault<Fnv1aHasher>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1a_matches_reference_vectors() {
        // Reference values for the 32-bit FNV-1a parameters.
        assert_eq!(fnv1a(b""), 0x811c9dc5);
        assert_eq!(fnv1a(b"a"), 0xe40c292c);
        assert_eq!(fnv1a(b"foobar"), 0xbf9cf968);
    }

    #[test]
    fn reserved_buf_grows_and_indexes() {
        let mut buf = ReservedBuf::new("test", 2, 16);

        let a = buf.push(10u32);
        let b = buf.push(20u32);

        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(buf[a], 10);
        assert_eq!(buf[b], 20);
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn reserved_buf_truncates_like_a_stack() {
        let mut buf = ReservedBuf::new("test", 4, 16);

        buf.push(1u32);
        let mark = buf.len();
        buf.push(2u32);
        buf.push(3u32);

        buf.truncate(mark);

        assert_eq!(buf.len(), 1);
        assert_eq!(buf[0], 1);
    }
}
