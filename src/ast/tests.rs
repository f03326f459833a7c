//! Structural tests for builder finalization and traversal.
//!
//! Trees are constructed child-before-parent exactly as the parser
//! does, finalized, and then checked against the preorder layout
//! invariants.

use super::*;
use crate::identifiers::IdentifierId;
use crate::source::SourceId;

const SRC: SourceId = SourceId(1);

fn finalize(builder: &mut AstBuilder) -> (AstPool, AstNodeId) {
    let mut pool = AstPool::new();

    let root = builder.complete(&mut pool);

    (pool, root)
}

fn preorder_tags(pool: &AstPool, root: AstNodeId) -> Vec<(AstTag, u32)> {
    let mut out = vec![(pool.tag(root), 0)];

    let mut it = pool.preorder_of(root);

    while let Some((node, depth)) = it.next(pool) {
        out.push((pool.tag(node), depth + 1));
    }

    out
}

#[test]
fn single_node_tree() {
    let mut builder = AstBuilder::new();

    builder.push_node(AstBuilderToken::NO_CHILDREN, SRC, AstFlags::EMPTY, AstTag::Wildcard);

    let (pool, root) = finalize(&mut builder);

    assert_eq!(pool.tag(root), AstTag::Wildcard);
    assert!(!pool.has_children(root));
    assert!(!pool.has_next_sibling(root));
    assert!(pool.is_first_sibling(root));
}

#[test]
fn unary_tree_places_child_after_parent() {
    let mut builder = AstBuilder::new();

    let child = builder.push_node(
        AstBuilderToken::NO_CHILDREN,
        SRC,
        AstFlags::EMPTY,
        AstTag::Wildcard,
    );
    builder.push_node(child, SRC, AstFlags::EMPTY, AstTag::UOpEval);

    let (pool, root) = finalize(&mut builder);

    assert_eq!(pool.tag(root), AstTag::UOpEval);
    assert!(pool.has_children(root));

    let first_child = pool.first_child_of(root);

    assert_eq!(first_child.0, root.0 + pool.data_dwords(root));
    assert_eq!(pool.tag(first_child), AstTag::Wildcard);
    assert!(pool.is_first_sibling(first_child));
    assert!(!pool.has_next_sibling(first_child));
}

#[test]
fn binary_tree_preserves_child_order() {
    let mut builder = AstBuilder::new();

    let lhs = builder.push_node_with(
        AstBuilderToken::NO_CHILDREN,
        SRC,
        AstFlags::EMPTY,
        ValCharData { codepoint: 97 },
    );
    builder.push_node_with(
        AstBuilderToken::NO_CHILDREN,
        SRC,
        AstFlags::EMPTY,
        ValIdentifierData {
            identifier_id: IdentifierId(7),
        },
    );
    builder.push_node(lhs, SRC, AstFlags::EMPTY, AstTag::OpBitAnd);

    let (pool, root) = finalize(&mut builder);

    assert_eq!(pool.tag(root), AstTag::OpBitAnd);

    let first = pool.first_child_of(root);
    let second = pool.next_sibling_of(first);

    assert_eq!(pool.tag(first), AstTag::ValChar);
    assert_eq!(pool.tag(second), AstTag::ValIdentifier);

    assert!(pool.is_first_sibling(first));
    assert!(pool.has_next_sibling(first));
    assert!(!pool.has_next_sibling(second));

    let char_data: ValCharData = pool.attachment(first);
    let ident_data: ValIdentifierData = pool.attachment(second);

    assert_eq!(char_data.codepoint, 97);
    assert_eq!(ident_data.identifier_id, IdentifierId(7));
}

#[test]
fn nary_tree_links_every_sibling() {
    const N: u64 = 5;

    let mut builder = AstBuilder::new();

    let mut first = AstBuilderToken::NO_CHILDREN;

    for i in 0..N {
        let token = builder.push_node_with(
            AstBuilderToken::NO_CHILDREN,
            SRC,
            AstFlags::EMPTY,
            ValIntegerData { value: i },
        );

        if first == AstBuilderToken::NO_CHILDREN {
            first = token;
        }
    }

    builder.push_node_with(
        first,
        SRC,
        AstFlags::EMPTY,
        BlockData {
            definition_count: 0,
            scope_type_id: crate::types::TypeId::INVALID,
        },
    );

    let (pool, root) = finalize(&mut builder);

    let mut it = pool.direct_children_of(root);

    let mut seen = Vec::new();

    while let Some(child) = it.next(&pool) {
        let data: ValIntegerData = pool.attachment(child);

        seen.push(data.value);
    }

    assert_eq!(seen, vec![0, 1, 2, 3, 4]);
}

/// File( A(A1, A2), B( C(C1), D(D1) ) ) built bottom-up, checked via
/// preorder and postorder traversal.
fn build_nested() -> (AstPool, AstNodeId) {
    let mut builder = AstBuilder::new();

    let a1 = builder.push_node(AstBuilderToken::NO_CHILDREN, SRC, AstFlags::EMPTY, AstTag::Leave);
    builder.push_node(AstBuilderToken::NO_CHILDREN, SRC, AstFlags::EMPTY, AstTag::Wildcard);
    let a = builder.push_node(a1, SRC, AstFlags::EMPTY, AstTag::Return);

    let c1 = builder.push_node(AstBuilderToken::NO_CHILDREN, SRC, AstFlags::EMPTY, AstTag::Yield);
    let c = builder.push_node(c1, SRC, AstFlags::EMPTY, AstTag::UOpEval);
    let d1 = builder.push_node(AstBuilderToken::NO_CHILDREN, SRC, AstFlags::EMPTY, AstTag::Leave);
    builder.push_node(d1, SRC, AstFlags::EMPTY, AstTag::UOpTry);
    builder.push_node(c, SRC, AstFlags::EMPTY, AstTag::Case);

    builder.push_node_with(
        a,
        SRC,
        AstFlags::EMPTY,
        FileData {
            definition_count: 0,
            scope_type_id: crate::types::TypeId::INVALID,
        },
    );

    finalize(&mut builder)
}

#[test]
fn nested_tree_preorder_traversal() {
    let (pool, root) = build_nested();

    assert_eq!(
        preorder_tags(&pool, root),
        vec![
            (AstTag::File, 0),
            (AstTag::Return, 1),
            (AstTag::Leave, 2),
            (AstTag::Wildcard, 2),
            (AstTag::Case, 1),
            (AstTag::UOpEval, 2),
            (AstTag::Yield, 3),
            (AstTag::UOpTry, 2),
            (AstTag::Leave, 3),
        ]
    );
}

#[test]
fn nested_tree_postorder_traversal() {
    let (pool, root) = build_nested();

    let mut it = pool.postorder_of(root);

    let mut tags = Vec::new();

    while let Some((node, _)) = it.next(&pool) {
        tags.push(pool.tag(node));
    }

    assert_eq!(
        tags,
        vec![
            AstTag::Leave,
            AstTag::Wildcard,
            AstTag::Return,
            AstTag::Yield,
            AstTag::UOpEval,
            AstTag::Leave,
            AstTag::UOpTry,
            AstTag::Case,
        ]
    );
}

#[test]
fn sibling_flags_satisfy_the_chain_invariants() {
    let (pool, root) = build_nested();

    // Every node with children: the first child carries the
    // first-sibling flag, the last direct child carries last-sibling.
    let mut stack = vec![root];

    while let Some(node) = stack.pop() {
        if !pool.has_children(node) {
            continue;
        }

        let first = pool.first_child_of(node);

        assert!(pool.is_first_sibling(first));
        assert!(pool.data_dwords(first) >= NODE_HEADER_DWORDS);

        let mut last = first;

        let mut it = pool.direct_children_of(node);

        while let Some(child) = it.next(&pool) {
            last = child;
            stack.push(child);
        }

        assert!(!pool.has_next_sibling(last));
    }
}

#[test]
fn type_id_slot_is_writable_after_finalization() {
    let (mut pool, root) = build_nested();

    let marker = crate::types::TypeId::from_raw(42);

    pool.set_type_id(root, marker);

    assert_eq!(pool.type_id(root), marker);
    assert_eq!(pool.type_id(pool.first_child_of(root)), crate::types::TypeId::INVALID);
}

#[test]
fn builder_is_reusable_after_completion() {
    let mut builder = AstBuilder::new();

    builder.push_node(AstBuilderToken::NO_CHILDREN, SRC, AstFlags::EMPTY, AstTag::Wildcard);

    let mut pool = AstPool::new();

    let first_root = builder.complete(&mut pool);

    builder.push_node(AstBuilderToken::NO_CHILDREN, SRC, AstFlags::EMPTY, AstTag::Leave);

    let second_root = builder.complete(&mut pool);

    assert_eq!(pool.tag(first_root), AstTag::Wildcard);
    assert_eq!(pool.tag(second_root), AstTag::Leave);
    assert_ne!(first_root, second_root);
}
