//! Scratch-arena AST construction and finalization.
//!
//! The parser appends nodes child-before-parent. A freshly pushed node
//! temporarily stores the scratch index of its first child in the
//! `next_sibling_offset` slot; [`AstBuilder::complete`] then runs three
//! passes:
//!
//! 1. **Flag pass** — derives first-/last-sibling flags from the stored
//!    first-child indices.
//! 2. **Traversal pass** — rewrites `next_sibling_offset` into a
//!    singly-linked list modelling a preorder traversal, bounded by
//!    [`MAX_TREE_DEPTH`].
//! 3. **Copy pass** — walks that list and emits the nodes contiguously
//!    into the permanent arena in preorder, rewriting
//!    `next_sibling_offset` into relative next-sibling offsets.

use crate::arena::ReservedBuf;
use crate::ast::{
    words, AstAttachment, AstFlags, AstNodeId, AstPool, AstTag, FLAG_FIRST_SIBLING,
    FLAG_LAST_SIBLING, FLAG_NO_CHILDREN, MAX_TREE_DEPTH, NODE_HEADER_DWORDS,
};
use crate::diagnostics::fatal;
use crate::source::SourceId;
use crate::types::TypeId;

/// Opaque handle to a node in the scratch arena, used to wire up the
/// first child of a later parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AstBuilderToken(pub(crate) u32);

impl AstBuilderToken {
    /// Marker used when a pushed node has no children.
    pub const NO_CHILDREN: AstBuilderToken = AstBuilderToken(u32::MAX);
}

pub struct AstBuilder {
    scratch: ReservedBuf<u32>,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self {
            scratch: ReservedBuf::new("ast scratch", 1 << 14, 1 << 29),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.scratch.is_empty()
    }

    /// Appends a node without an attachment payload.
    pub fn push_node(
        &mut self,
        first_child: AstBuilderToken,
        source_id: SourceId,
        flags: AstFlags,
        tag: AstTag,
    ) -> AstBuilderToken {
        self.push_prefix(first_child, source_id, flags, tag, 0)
    }

    /// Appends a node carrying `attachment`.
    pub fn push_node_with<T: AstAttachment>(
        &mut self,
        first_child: AstBuilderToken,
        source_id: SourceId,
        flags: AstFlags,
        attachment: T,
    ) -> AstBuilderToken {
        let token = self.push_prefix(first_child, source_id, flags, T::TAG, T::DWORDS);

        let start = self.scratch.len() - T::DWORDS as usize;

        attachment.write(&mut self.scratch.as_mut_slice()[start..]);

        token
    }

    fn push_prefix(
        &mut self,
        first_child: AstBuilderToken,
        source_id: SourceId,
        flags: AstFlags,
        tag: AstTag,
        attachment_dwords: u32,
    ) -> AstBuilderToken {
        let data_dwords = NODE_HEADER_DWORDS + attachment_dwords;

        let internal = if first_child == AstBuilderToken::NO_CHILDREN {
            FLAG_NO_CHILDREN
        } else {
            0
        };

        let index = self.scratch.len() as u32;

        self.scratch.push(words::pack_header(
            tag,
            flags,
            data_dwords as u8,
            internal,
        ));
        self.scratch.push(first_child.0);
        self.scratch.push(TypeId::INVALID.to_raw());
        self.scratch.push(source_id.0);

        for _ in 0..attachment_dwords {
            self.scratch.push(0);
        }

        AstBuilderToken(index)
    }

    /// Finalizes the scratch tree into `dst` and resets the scratch.
    /// Returns the id of the root node (the last node pushed).
    pub fn complete(&mut self, dst: &mut AstPool) -> AstNodeId {
        debug_assert!(!self.scratch.is_empty());

        let end = self.scratch.len() as u32;

        let scratch = self.scratch.as_mut_slice();

        set_internal_flags(scratch, end);

        let src_root = build_traversal_list(scratch, end);

        let root = copy_to_preorder(scratch, end, src_root, dst);

        self.scratch.truncate(0);

        root
    }
}

impl Default for AstBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Flag pass. At this point `next_sibling_offset` still holds the
/// scratch index of the node's first child (or `NO_CHILDREN`): the
/// direct predecessor of a parent is its last child, and the stored
/// index names its first child.
fn set_internal_flags(scratch: &mut [u32], end: u32) {
    debug_assert!(end != 0);

    let mut prev: Option<u32> = None;

    let mut curr = 0u32;

    while curr != end {
        let next = curr + words::data_dwords(scratch, curr);

        if words::next_sibling_offset(scratch, curr) != AstBuilderToken::NO_CHILDREN.0 {
            let first_child = words::next_sibling_offset(scratch, curr);

            debug_assert!(words::internal_flags(scratch, first_child) & FLAG_FIRST_SIBLING == 0);

            words::add_internal_flags(scratch, first_child, FLAG_FIRST_SIBLING);

            let prev = prev.expect("a parent node must have a predecessor");

            debug_assert!(words::internal_flags(scratch, prev) & FLAG_LAST_SIBLING == 0);

            words::add_internal_flags(scratch, prev, FLAG_LAST_SIBLING);
        }

        prev = Some(curr);

        curr = next;
    }

    let last = prev.expect("tree is non-empty");

    debug_assert!(
        words::internal_flags(scratch, last) & (FLAG_FIRST_SIBLING | FLAG_LAST_SIBLING) == 0
    );

    words::add_internal_flags(scratch, last, FLAG_FIRST_SIBLING | FLAG_LAST_SIBLING);
}

/// Traversal pass. Rewrites `next_sibling_offset` into a linked list
/// that visits the nodes in preorder when started at the returned root
/// (the last node of the scratch).
fn build_traversal_list(scratch: &mut [u32], end: u32) -> u32 {
    let mut depth: i32 = -1;

    let mut recursively_last_child = AstBuilderToken::NO_CHILDREN.0;

    let mut prev_sibling_inds = [0u32; MAX_TREE_DEPTH];

    let mut curr = 0u32;

    loop {
        let internal = words::internal_flags(scratch, curr);

        // Connect predecessor.

        if internal & FLAG_FIRST_SIBLING == 0 {
            debug_assert!(depth >= 0);

            let prev_sibling = prev_sibling_inds[depth as usize];

            words::set_next_sibling_offset(scratch, prev_sibling, curr);
        }

        if internal & FLAG_LAST_SIBLING == 0 {
            if internal & FLAG_FIRST_SIBLING != 0 {
                if depth + 1 >= MAX_TREE_DEPTH as i32 {
                    fatal(format_args!(
                        "maximum parse tree depth of {} exceeded",
                        MAX_TREE_DEPTH
                    ));
                }

                depth += 1;
            }

            debug_assert!(depth >= 0);

            if internal & FLAG_NO_CHILDREN == 0 {
                debug_assert!(recursively_last_child != AstBuilderToken::NO_CHILDREN.0);

                prev_sibling_inds[depth as usize] = recursively_last_child;
            } else {
                prev_sibling_inds[depth as usize] = curr;
            }
        } else {
            if internal & FLAG_FIRST_SIBLING == 0 {
                debug_assert!(depth >= 0);

                depth -= 1;
            }

            if internal & FLAG_NO_CHILDREN != 0 {
                recursively_last_child = curr;
            }
        }

        let next = curr + words::data_dwords(scratch, curr);

        if next == end {
            break;
        }

        curr = next;
    }

    debug_assert!(depth == -1);

    curr
}

/// Copy pass. Follows the traversal list starting at `src_root`,
/// emitting nodes contiguously into `dst` in preorder and rewriting
/// `next_sibling_offset` into the distance to the next actual sibling
/// (or a forward offset past the subtree for last siblings).
fn copy_to_preorder(scratch: &[u32], end: u32, src_root: u32, dst: &mut AstPool) -> AstNodeId {
    let mut prev_sibling_inds = [0u32; MAX_TREE_DEPTH];

    let mut depth: i32 = -1;

    let dst_root = dst.alloc(end);

    let arena = dst.arena_mut();

    let mut dst_curr = dst_root.0;

    let mut src_curr = src_root;

    loop {
        let data_dwords = words::data_dwords(scratch, src_curr);

        let dst_node = dst_curr;

        dst_curr += data_dwords;

        for i in 0..data_dwords {
            arena[dst_node + i] = scratch[(src_curr + i) as usize];
        }

        let curr_ind = dst_node - dst_root.0;

        if words::internal_flags(scratch, src_curr) & FLAG_FIRST_SIBLING == 0 {
            loop {
                // The root node is never popped here.
                debug_assert!(depth > 0);

                let prev_sibling_ind = prev_sibling_inds[depth as usize];

                depth -= 1;

                let prev_sibling = dst_root.0 + prev_sibling_ind;

                arena.as_mut_slice()[prev_sibling as usize + 1] = curr_ind - prev_sibling_ind;

                let prev_internal = arena[prev_sibling] >> 24;

                if prev_internal as u8 & FLAG_LAST_SIBLING == 0 {
                    break;
                }
            }
        }

        // The traversal pass only tracks depth across sibling chains;
        // chains of only children surface here instead.
        if depth + 1 >= MAX_TREE_DEPTH as i32 {
            fatal(format_args!(
                "maximum parse tree depth of {} exceeded",
                MAX_TREE_DEPTH
            ));
        }

        depth += 1;

        prev_sibling_inds[depth as usize] = curr_ind;

        if words::next_sibling_offset(scratch, src_curr) == AstBuilderToken::NO_CHILDREN.0 {
            break;
        }

        src_curr = words::next_sibling_offset(scratch, src_curr);
    }

    debug_assert!(depth != -1);

    while depth >= 0 {
        let prev_sibling_ind = prev_sibling_inds[depth as usize];

        depth -= 1;

        arena.as_mut_slice()[(dst_root.0 + prev_sibling_ind) as usize + 1] =
            end - prev_sibling_ind;
    }

    dst_root
}
