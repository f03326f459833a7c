//! Debug rendering of a finalized AST.
//!
//! Produces either an indented text listing or a serde-serializable
//! tree for JSON output (`evlc --dump-ast json`).

use serde::Serialize;

use crate::ast::{
    AstNodeId, AstPool, AstTag, BlockData, DefinitionData, FileData, ValCharData, ValFloatData,
    ValIdentifierData, ValIntegerData, ValStringData,
};
use crate::identifiers::IdentifierPool;
use crate::lexer::Builtin;

/// Serializable projection of a node and its subtree.
#[derive(Debug, Serialize)]
pub struct DumpNode {
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DumpNode>,
}

fn node_detail(pool: &AstPool, identifiers: &IdentifierPool, node: AstNodeId) -> Option<String> {
    match pool.tag(node) {
        AstTag::Definition => {
            let data: DefinitionData = pool.attachment(node);

            Some(identifiers.name_from(data.identifier_id).to_string())
        }
        AstTag::ValIdentifier => {
            let data: ValIdentifierData = pool.attachment(node);

            Some(identifiers.name_from(data.identifier_id).to_string())
        }
        AstTag::ValInteger => {
            let data: ValIntegerData = pool.attachment(node);

            Some(data.value.to_string())
        }
        AstTag::ValFloat => {
            let data: ValFloatData = pool.attachment(node);

            Some(data.value.to_string())
        }
        AstTag::ValChar => {
            let data: ValCharData = pool.attachment(node);

            Some(format!("U+{:04X}", data.codepoint))
        }
        AstTag::ValString => {
            let data: ValStringData = pool.attachment(node);

            Some(format!("{:?}", identifiers.name_from(data.string_id)))
        }
        AstTag::Builtin => Some(format!("_{}", Builtin::from_ordinal(pool.flags(node).0).name())),
        AstTag::Block => {
            let data: BlockData = pool.attachment(node);

            Some(format!("{} definitions", data.definition_count))
        }
        AstTag::File => {
            let data: FileData = pool.attachment(node);

            Some(format!("{} definitions", data.definition_count))
        }
        _ => None,
    }
}

/// Builds the serializable tree rooted at `node`.
pub fn dump_node(pool: &AstPool, identifiers: &IdentifierPool, node: AstNodeId) -> DumpNode {
    let mut children = Vec::new();

    let mut it = pool.direct_children_of(node);

    while let Some(child) = it.next(pool) {
        children.push(dump_node(pool, identifiers, child));
    }

    DumpNode {
        tag: pool.tag(node).name().to_string(),
        detail: node_detail(pool, identifiers, node),
        children,
    }
}

/// Renders the subtree rooted at `node` as indented text, one node per
/// line.
pub fn dump_text(pool: &AstPool, identifiers: &IdentifierPool, node: AstNodeId) -> String {
    fn render(
        pool: &AstPool,
        identifiers: &IdentifierPool,
        node: AstNodeId,
        depth: usize,
        out: &mut String,
    ) {
        out.push_str(&"  ".repeat(depth));
        out.push_str(pool.tag(node).name());

        if let Some(detail) = node_detail(pool, identifiers, node) {
            out.push(' ');
            out.push_str(&detail);
        }

        out.push('\n');

        let mut it = pool.direct_children_of(node);

        while let Some(child) = it.next(pool) {
            render(pool, identifiers, child, depth + 1, out);
        }
    }

    let mut out = String::new();

    render(pool, identifiers, node, 0, &mut out);

    out
}
