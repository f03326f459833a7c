//! Storage for globally addressable compile-time values.
//!
//! Every definition value the interpreter materializes lives here, so
//! that identifier references and assignments have stable storage to
//! point at. Values carry their type (with the assignability bit of
//! the defining member) alongside the payload bytes.

use crate::types::TypeId;

/// Handle to a stored global value. `0` is reserved invalid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GlobalValueId(pub u32);

impl GlobalValueId {
    pub const INVALID: GlobalValueId = GlobalValueId(0);

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

struct GlobalValue {
    type_id: TypeId,
    bytes: Vec<u8>,
}

pub struct GlobalValuePool {
    values: Vec<GlobalValue>,
}

impl GlobalValuePool {
    pub fn new() -> Self {
        Self {
            // Index 0 is the reserved invalid handle.
            values: vec![GlobalValue {
                type_id: TypeId::INVALID,
                bytes: Vec::new(),
            }],
        }
    }

    /// Allocates storage of `size` bytes, optionally initialized.
    pub fn make_global_value(
        &mut self,
        type_id: TypeId,
        size: u64,
        opt_initial_value: Option<&[u8]>,
    ) -> GlobalValueId {
        if size > u64::from(u32::MAX >> 1) {
            crate::diagnostics::fatal(format_args!(
                "size {} of type exceeds the maximum supported global value size",
                size
            ));
        }

        let mut bytes = vec![0u8; size as usize];

        if let Some(initial) = opt_initial_value {
            debug_assert!(initial.len() == bytes.len());

            bytes.copy_from_slice(initial);
        }

        let id = GlobalValueId(self.values.len() as u32);

        self.values.push(GlobalValue { type_id, bytes });

        id
    }

    pub fn type_of(&self, id: GlobalValueId) -> TypeId {
        debug_assert!(id.is_valid());

        self.values[id.0 as usize].type_id
    }

    pub fn bytes(&self, id: GlobalValueId) -> &[u8] {
        debug_assert!(id.is_valid());

        &self.values[id.0 as usize].bytes
    }

    pub fn bytes_mut(&mut self, id: GlobalValueId) -> &mut [u8] {
        debug_assert!(id.is_valid());

        &mut self.values[id.0 as usize].bytes
    }
}

impl Default for GlobalValuePool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_and_returns_typed_payloads() {
        let mut pool = GlobalValuePool::new();

        let marker = TypeId::from_raw(7);

        let id = pool.make_global_value(marker, 4, Some(&[1, 2, 3, 4]));

        assert!(id.is_valid());
        assert_eq!(pool.type_of(id), marker);
        assert_eq!(pool.bytes(id), &[1, 2, 3, 4]);

        pool.bytes_mut(id)[0] = 9;

        assert_eq!(pool.bytes(id), &[9, 2, 3, 4]);
    }

    #[test]
    fn uninitialized_values_are_zeroed() {
        let mut pool = GlobalValuePool::new();

        let id = pool.make_global_value(TypeId::from_raw(1), 8, None);

        assert_eq!(pool.bytes(id), &[0; 8]);
    }
}
