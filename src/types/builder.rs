//! Open composite types and their member lifecycle.
//!
//! A composite is created *open* through [`TypePool::create_open_type`],
//! accumulates members, and is finalized by
//! [`TypePool::close_open_type`]. Closing fixes the layout header but
//! member *types* may still be unresolved: a pending member carries the
//! typechecker resumption token under which it was discovered plus the
//! AST handles of its type and value expressions, and is completed
//! lazily by the typechecker on first access.

use crate::ast::AstNodeId;
use crate::globals::GlobalValueId;
use crate::identifiers::IdentifierId;
use crate::source::SourceId;
use crate::types::{CompositeType, TypeId, TypePool, TypeStructure};

/// Index into the typechecker's context stack, letting lazy
/// typechecking re-enter the lexical context a member was declared in.
/// `0` is reserved invalid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResumptionId(pub u32);

impl ResumptionId {
    pub const INVALID: ResumptionId = ResumptionId(0);

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

/// A member of a composite type.
///
/// `type_id` is invalid while the member's type is pending; the
/// resumption and expression handles then describe how to complete it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Member {
    pub name: IdentifierId,
    pub source: SourceId,
    pub is_pub: bool,
    pub is_mut: bool,
    pub is_global: bool,
    pub is_use: bool,
    /// Field offset inside instances of the composite.
    pub offset: u64,
    pub type_id: TypeId,
    pub resumption: ResumptionId,
    pub opt_type_node: AstNodeId,
    pub opt_value_node: AstNodeId,
    /// Storage of the evaluated member value, once demanded.
    pub global_value: GlobalValueId,
}

impl Member {
    pub fn has_pending_type(&self) -> bool {
        self.type_id == TypeId::INVALID
    }
}

/// Input to [`TypePool::add_open_type_member`].
#[derive(Clone, Debug)]
pub struct MemberInit {
    pub name: IdentifierId,
    pub source: SourceId,
    pub is_pub: bool,
    pub is_mut: bool,
    pub is_global: bool,
    pub is_use: bool,
    pub offset: u64,
    /// Invalid when the member's type is pending.
    pub type_id: TypeId,
    pub resumption: ResumptionId,
    pub opt_type_node: AstNodeId,
    pub opt_value_node: AstNodeId,
}

/// Copy of a member together with its position, as returned by the
/// lookup queries.
#[derive(Clone, Debug)]
pub struct MemberInfo {
    pub surrounding_type_id: TypeId,
    pub rank: u16,
    pub name: IdentifierId,
    pub source: SourceId,
    pub is_pub: bool,
    pub is_mut: bool,
    pub is_global: bool,
    pub is_use: bool,
    pub offset: u64,
    pub type_id: TypeId,
    pub resumption: ResumptionId,
    pub opt_type_node: AstNodeId,
    pub opt_value_node: AstNodeId,
    pub global_value: GlobalValueId,
}

impl MemberInfo {
    pub fn has_pending_type(&self) -> bool {
        self.type_id == TypeId::INVALID
    }

    fn from_member(surrounding: TypeId, rank: u16, member: &Member) -> Self {
        Self {
            surrounding_type_id: surrounding,
            rank,
            name: member.name,
            source: member.source,
            is_pub: member.is_pub,
            is_mut: member.is_mut,
            is_global: member.is_global,
            is_use: member.is_use,
            offset: member.offset,
            type_id: member.type_id,
            resumption: member.resumption,
            opt_type_node: member.opt_type_node,
            opt_value_node: member.opt_value_node,
            global_value: member.global_value,
        }
    }
}

/// Iterates the members of a composite whose type is still pending.
///
/// Completion may resolve members while the iteration is in flight, so
/// the iterator re-checks each rank against the pool on every step.
pub struct IncompleteMemberIterator {
    type_id: TypeId,
    curr: u16,
}

impl IncompleteMemberIterator {
    pub fn next(&mut self, types: &TypePool) -> Option<MemberInfo> {
        loop {
            let info = types.member_info_by_rank(self.type_id, self.curr)?;

            self.curr += 1;

            if info.has_pending_type() {
                return Some(info);
            }
        }
    }
}

impl TypePool {
    fn composite(&self, id: TypeId) -> &CompositeType {
        match self.primitive_structure(id) {
            TypeStructure::Composite(composite) => composite,
            other => panic!(
                "expected composite type, found {:?}",
                other.tag()
            ),
        }
    }

    fn composite_mut(&mut self, id: TypeId) -> &mut CompositeType {
        let id = self.dealias(id);

        match self.structure_mut(id) {
            TypeStructure::Composite(composite) => composite,
            other => panic!(
                "expected composite type, found {:?}",
                other.tag()
            ),
        }
    }

    /// Allocates a fresh, open composite type.
    pub fn create_open_type(&mut self, source: SourceId) -> TypeId {
        self.append(TypeStructure::Composite(CompositeType {
            size: 0,
            align: 1,
            stride: 0,
            source,
            is_open: true,
            members: Vec::new(),
        }))
    }

    /// Records a member on an open composite.
    pub fn add_open_type_member(&mut self, composite_id: TypeId, init: MemberInit) {
        let composite = self.composite_mut(composite_id);

        debug_assert!(composite.is_open);

        debug_assert!(composite.members.len() < usize::from(u16::MAX));

        composite.members.push(Member {
            name: init.name,
            source: init.source,
            is_pub: init.is_pub,
            is_mut: init.is_mut,
            is_global: init.is_global,
            is_use: init.is_use,
            offset: init.offset,
            type_id: init.type_id.strip(),
            resumption: init.resumption,
            opt_type_node: init.opt_type_node,
            opt_value_node: init.opt_value_node,
            global_value: GlobalValueId::INVALID,
        });
    }

    /// Finalizes the layout header of an open composite. Members with
    /// pending types remain completable afterwards.
    pub fn close_open_type(&mut self, composite_id: TypeId, size: u64, align: u32, stride: u64) {
        let composite = self.composite_mut(composite_id);

        debug_assert!(composite.is_open);

        composite.size = size;
        composite.align = align.max(1);
        composite.stride = stride;
        composite.is_open = false;
    }

    pub fn is_open(&self, composite_id: TypeId) -> bool {
        self.composite(composite_id).is_open
    }

    pub fn member_count(&self, composite_id: TypeId) -> u16 {
        self.composite(composite_id).members.len() as u16
    }

    /// Looks up a direct member by name. `use` members are not expanded
    /// here; transparent lookup through them is the typechecker's
    /// business, since it may require lazy completion.
    pub fn member_info_by_name(
        &self,
        composite_id: TypeId,
        name: IdentifierId,
    ) -> Option<MemberInfo> {
        let surrounding = self.dealias(composite_id);

        let composite = self.composite(surrounding);

        composite
            .members
            .iter()
            .position(|m| m.name == name)
            .map(|rank| {
                MemberInfo::from_member(surrounding, rank as u16, &composite.members[rank])
            })
    }

    pub fn member_info_by_rank(&self, composite_id: TypeId, rank: u16) -> Option<MemberInfo> {
        let surrounding = self.dealias(composite_id);

        let composite = self.composite(surrounding);

        composite
            .members
            .get(usize::from(rank))
            .map(|member| MemberInfo::from_member(surrounding, rank, member))
    }

    /// Iterator over members whose type has not been resolved yet.
    pub fn incomplete_members_of(&self, composite_id: TypeId) -> IncompleteMemberIterator {
        IncompleteMemberIterator {
            type_id: self.dealias(composite_id),
            curr: 0,
        }
    }

    /// Resolves the type of a pending member. Called by the typechecker
    /// once the member's expressions have been checked and evaluated.
    pub fn set_incomplete_type_member_type_by_rank(
        &mut self,
        composite_id: TypeId,
        rank: u16,
        type_id: TypeId,
    ) {
        debug_assert!(type_id.is_valid());

        let composite = self.composite_mut(composite_id);

        let member = &mut composite.members[usize::from(rank)];

        debug_assert!(member.has_pending_type());

        member.type_id = type_id.strip();
        member.resumption = ResumptionId::INVALID;
    }

    /// Records the storage of a member's evaluated value.
    pub fn set_member_global_value_by_rank(
        &mut self,
        composite_id: TypeId,
        rank: u16,
        global_value: GlobalValueId,
    ) {
        let composite = self.composite_mut(composite_id);

        let member = &mut composite.members[usize::from(rank)];

        debug_assert!(member.global_value == GlobalValueId::INVALID);

        member.global_value = global_value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IntegerType, TypeTag};

    fn member_init(name: u32, type_id: TypeId, offset: u64) -> MemberInit {
        MemberInit {
            name: IdentifierId(name),
            source: SourceId(1),
            is_pub: false,
            is_mut: false,
            is_global: false,
            is_use: false,
            offset,
            type_id,
            resumption: ResumptionId::INVALID,
            opt_type_node: AstNodeId::INVALID,
            opt_value_node: AstNodeId::INVALID,
        }
    }

    #[test]
    fn open_close_lifecycle() {
        let mut pool = TypePool::new();

        let i32_type = pool.id_from_structure(TypeStructure::Integer(IntegerType {
            bits: 32,
            is_signed: true,
        }));

        let composite = pool.create_open_type(SourceId(1));

        assert!(pool.is_open(composite));
        assert_eq!(pool.tag_from_id(composite), TypeTag::Composite);

        pool.add_open_type_member(composite, member_init(10, i32_type, 0));
        pool.add_open_type_member(composite, member_init(11, i32_type, 4));

        pool.close_open_type(composite, 8, 4, 8);

        assert!(!pool.is_open(composite));
        assert_eq!(pool.member_count(composite), 2);

        let by_name = pool.member_info_by_name(composite, IdentifierId(11)).unwrap();

        assert_eq!(by_name.rank, 1);
        assert_eq!(by_name.offset, 4);
        assert_eq!(by_name.type_id, i32_type);

        assert!(pool.member_info_by_name(composite, IdentifierId(12)).is_none());
    }

    #[test]
    fn composites_are_identity_allocated() {
        let mut pool = TypePool::new();

        let first = pool.create_open_type(SourceId(1));
        let second = pool.create_open_type(SourceId(1));

        pool.close_open_type(first, 0, 1, 0);
        pool.close_open_type(second, 0, 1, 0);

        assert_ne!(first, second);
    }

    #[test]
    fn pending_members_complete_by_rank() {
        let mut pool = TypePool::new();

        let i32_type = pool.id_from_structure(TypeStructure::Integer(IntegerType {
            bits: 32,
            is_signed: true,
        }));

        let composite = pool.create_open_type(SourceId(1));

        let mut pending = member_init(20, TypeId::INVALID, 0);
        pending.resumption = ResumptionId(2);
        pending.opt_value_node = AstNodeId(5);

        pool.add_open_type_member(composite, pending);
        pool.add_open_type_member(composite, member_init(21, i32_type, 0));

        pool.close_open_type(composite, 0, 1, 0);

        let mut incomplete = pool.incomplete_members_of(composite);

        let first = incomplete.next(&pool).unwrap();

        assert_eq!(first.rank, 0);
        assert!(first.has_pending_type());
        assert_eq!(first.resumption, ResumptionId(2));

        assert!(incomplete.next(&pool).is_none());

        pool.set_incomplete_type_member_type_by_rank(composite, 0, i32_type);

        let resolved = pool.member_info_by_rank(composite, 0).unwrap();

        assert!(!resolved.has_pending_type());
        assert_eq!(resolved.type_id, i32_type);

        let mut incomplete = pool.incomplete_members_of(composite);

        assert!(incomplete.next(&pool).is_none());
    }
}
