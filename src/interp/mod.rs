//! Compile-time typechecker and evaluator.
//!
//! Typechecking and evaluation are two mutually recursive operations
//! over the finalized AST, both owned by [`Interpreter`]:
//! [`Interpreter::typecheck_expr`] caches its result in the node's
//! type slot, using a dedicated in-progress marker for cycle
//! detection; evaluation produces values on the interpreter's value
//! stack.
//!
//! Scoping is a stack of active *type contexts*: the composite types
//! whose members are in scope. A file pushes `[sentinel, prelude,
//! file]`; every nested block pushes one composite. A *resumption
//! token* is an index into this stack — re-applying one copies the
//! range from the owning root sentinel up to the token back onto the
//! top, so that lazy typechecking of a forward-referenced member
//! resumes under the lexical context it was declared in.

pub mod builtins;
pub mod eval;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::arena::FnvBuildHasher;

use crate::ast::{
    AstFlags, AstNodeId, AstPool, AstTag, BlockData, DefinitionData, FileData, ValIdentifierData,
};
use crate::config::Config;
use crate::diagnostics::ErrorSink;
use crate::globals::GlobalValuePool;
use crate::identifiers::{IdentifierId, IdentifierPool};
use crate::lexer::{Builtin, BUILTIN_COUNT};
use crate::parser::Parser;
use crate::source::{SourceFileId, SourceId, SourceReader};
use crate::types::{
    next_multiple, FuncType, MemberInfo, MemberInit, ResumptionId, TypeId, TypePool, TypeStructure,
    TypeTag,
};

use eval::ValueStack;

/// Maximum number of simultaneously active type contexts.
pub const MAX_ACTIVE_CONTEXTS: usize = 256;

/// Maximum recursion through `use` members during identifier lookup.
const MAX_USE_DEPTH: u32 = 8;

pub struct Interpreter {
    pub(crate) config: Config,
    pub(crate) identifiers: IdentifierPool,
    pub(crate) reader: SourceReader,
    pub(crate) errors: ErrorSink,
    pub(crate) parser: Parser,
    pub(crate) asts: AstPool,
    pub(crate) types: TypePool,
    pub(crate) globals: GlobalValuePool,
    pub(crate) value_stack: ValueStack,
    contexts: [TypeId; MAX_ACTIVE_CONTEXTS],
    context_top: i32,
    prelude_type_id: TypeId,
    pub(crate) builtin_type_ids: [TypeId; BUILTIN_COUNT],
    /// Side table mapping typechecked identifier nodes to the member
    /// they resolved to, so evaluation never re-runs scoped lookup.
    identifier_resolutions: HashMap<AstNodeId, (TypeId, u16), FnvBuildHasher>,
    /// Members whose value is being evaluated, for cycle detection at
    /// evaluation time.
    evaluating_members: HashSet<(u32, u16), FnvBuildHasher>,
}

impl Interpreter {
    /// Creates the interpreter and bootstraps the prelude: a
    /// synthesized file equivalent to
    /// `let std = _import("<std>", _true)` followed by
    /// `use prelude = std.prelude` is typechecked first, and its type
    /// roots every subsequent file's context stack.
    pub fn new(config: Config) -> Self {
        let mut interp = Self::new_bare(config);

        interp.init_prelude();

        interp
    }

    /// Constructs the interpreter without the prelude bootstrap.
    /// Subsequent file scopes then root only `[sentinel, file]`.
    pub(crate) fn new_bare(config: Config) -> Self {
        let mut interp = Self {
            config,
            identifiers: IdentifierPool::new(),
            reader: SourceReader::new(),
            errors: ErrorSink::new(),
            parser: Parser::new(),
            asts: AstPool::new(),
            types: TypePool::new(),
            globals: GlobalValuePool::new(),
            value_stack: ValueStack::new(),
            contexts: [TypeId::INVALID; MAX_ACTIVE_CONTEXTS],
            context_top: -1,
            prelude_type_id: TypeId::INVALID,
            builtin_type_ids: [TypeId::INVALID; BUILTIN_COUNT],
            identifier_resolutions: HashMap::with_hasher(FnvBuildHasher::default()),
            evaluating_members: HashSet::with_hasher(FnvBuildHasher::default()),
        };

        interp.init_builtin_types();

        interp
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn asts(&self) -> &AstPool {
        &self.asts
    }

    pub fn identifiers(&self) -> &IdentifierPool {
        &self.identifiers
    }

    pub fn types(&self) -> &TypePool {
        &self.types
    }

    pub fn reader(&self) -> &SourceReader {
        &self.reader
    }

    pub fn prelude_type_id(&self) -> TypeId {
        self.prelude_type_id
    }

    pub(crate) fn error(&self, source_id: SourceId, args: std::fmt::Arguments<'_>) -> ! {
        self.errors.source_error(&self.reader, source_id, args)
    }

    pub(crate) fn warning(&self, source_id: SourceId, args: std::fmt::Arguments<'_>) {
        self.errors.source_warning(&self.reader, source_id, args)
    }

    // Context stack.

    fn push_context(&mut self, context: TypeId, is_root: bool) {
        debug_assert!(context != TypeId::INVALID || is_root);

        let mut top = (self.context_top + 1) as usize;

        if top + if is_root { 2 } else { 0 } >= MAX_ACTIVE_CONTEXTS {
            crate::diagnostics::fatal(format_args!(
                "maximum of {} active interpreter contexts exceeded",
                MAX_ACTIVE_CONTEXTS
            ));
        }

        if is_root {
            self.contexts[top] = TypeId::INVALID;

            self.contexts[top + 1] = self.prelude_type_id;

            top += 2;
        }

        self.contexts[top] = context;

        self.context_top = top as i32;
    }

    fn pop_context(&mut self, is_root: bool) {
        let to_pop = if is_root { 3 } else { 1 };

        debug_assert!(self.context_top - to_pop >= -1);

        debug_assert!(
            !is_root
                || self.contexts[(self.context_top - to_pop + 1) as usize] == TypeId::INVALID
        );

        self.context_top -= to_pop;
    }

    /// Captures the current context-stack position for lazy
    /// typechecking. The first context is always a root, so a valid
    /// token is never zero.
    fn resumption(&self) -> ResumptionId {
        debug_assert!(self.context_top > 0);

        ResumptionId(self.context_top as u32)
    }

    /// Re-applies a resumption: copies the contiguous context range
    /// from the owning root sentinel up to the token back onto the top
    /// of the stack.
    fn apply_resumption(&mut self, resumption: ResumptionId) {
        debug_assert!(resumption.is_valid());

        let resumption_top = resumption.0 as i32;

        debug_assert!(resumption_top <= self.context_top);

        let mut resumption_bottom = resumption_top - 1;

        while resumption_bottom >= 0 && self.contexts[resumption_bottom as usize] != TypeId::INVALID
        {
            resumption_bottom -= 1;
        }

        debug_assert!(resumption_bottom >= 0);

        let count = (1 + resumption_top - resumption_bottom) as usize;

        if self.context_top as usize + count >= MAX_ACTIVE_CONTEXTS {
            crate::diagnostics::fatal(format_args!(
                "maximum of {} active interpreter contexts exceeded",
                MAX_ACTIVE_CONTEXTS
            ));
        }

        let src = resumption_bottom as usize;

        let dst = (self.context_top + 1) as usize;

        self.contexts.copy_within(src..src + count, dst);

        self.context_top += count as i32;
    }

    /// Pops the contexts pushed by the innermost applied resumption,
    /// including its sentinel.
    fn release_resumption(&mut self) {
        let mut new_top = self.context_top;

        while new_top >= 0 && self.contexts[new_top as usize] != TypeId::INVALID {
            new_top -= 1;
        }

        debug_assert!(new_top >= 0);

        self.context_top = new_top - 1;
    }

    // Identifier lookup.

    /// Resolves `identifier_id` against the active contexts, innermost
    /// first, stopping at the current root sentinel. Members flagged
    /// `use` are searched transparently.
    fn lookup_identifier_definition(
        &mut self,
        identifier_id: IdentifierId,
        lookup_source: SourceId,
    ) -> MemberInfo {
        let mut index = self.context_top;

        debug_assert!(index >= 0);

        while index >= 0 {
            let context = self.contexts[index as usize];

            if context == TypeId::INVALID {
                break;
            }

            if let Some(info) = self.lookup_in_composite(context, identifier_id, 0) {
                return info;
            }

            index -= 1;
        }

        let name = self.identifiers.name_from(identifier_id).to_string();

        self.error(
            lookup_source,
            format_args!("Could not find definition for identifier '{}'", name),
        )
    }

    fn lookup_in_composite(
        &mut self,
        composite: TypeId,
        identifier_id: IdentifierId,
        depth: u32,
    ) -> Option<MemberInfo> {
        if self.types.tag_from_id(composite) != TypeTag::Composite {
            return None;
        }

        if let Some(info) = self.types.member_info_by_name(composite, identifier_id) {
            return Some(info);
        }

        if depth >= MAX_USE_DEPTH {
            return None;
        }

        let member_count = self.types.member_count(composite);

        for rank in 0..member_count {
            let info = match self.types.member_info_by_rank(composite, rank) {
                Some(info) => info,
                None => break,
            };

            if !info.is_use {
                continue;
            }

            let use_type = if info.has_pending_type() {
                self.delayed_typecheck_member(&info)
            } else {
                info.type_id
            };

            let target = match self.types.tag_from_id(use_type) {
                TypeTag::Composite => self.types.dealias(use_type),
                TypeTag::Type => {
                    // The used member is a type-valued constant: its
                    // value names the composite to search.
                    let info = self
                        .types
                        .member_info_by_rank(composite, rank)
                        .expect("member rank is stable");

                    let global = self.ensure_member_global(&info);

                    let bytes = self.globals.bytes(global);

                    TypeId::from_raw(u32::from_le_bytes(
                        bytes[..4].try_into().expect("type values are four bytes"),
                    ))
                }
                _ => continue,
            };

            if let Some(found) = self.lookup_in_composite(target, identifier_id, depth + 1) {
                return Some(found);
            }
        }

        None
    }

    // Definitions and members.

    /// The type- and value-expression children of a definition node.
    pub(crate) fn definition_info(
        &self,
        definition: AstNodeId,
    ) -> (Option<AstNodeId>, Option<AstNodeId>) {
        debug_assert!(self.asts.tag(definition) == AstTag::Definition);

        if !self.asts.has_children(definition) {
            return (None, None);
        }

        let first = self.asts.first_child_of(definition);

        if self.asts.has_flag(definition, AstFlags::DEFINITION_HAS_TYPE) {
            let value = self
                .asts
                .has_next_sibling(first)
                .then(|| self.asts.next_sibling_of(first));

            (Some(first), value)
        } else {
            (None, Some(first))
        }
    }

    fn member_init_from_definition(&mut self, definition: AstNodeId, offset: u64) -> MemberInit {
        debug_assert!(self.asts.tag(definition) == AstTag::Definition);

        let data: DefinitionData = self.asts.attachment(definition);

        let node_type = self.asts.type_id(definition);

        let has_pending_type = node_type == TypeId::INVALID || node_type == TypeId::CHECKING;

        let (opt_type_node, opt_value_node) = self.definition_info(definition);

        MemberInit {
            name: data.identifier_id,
            source: self.asts.source_id(definition),
            is_pub: self.asts.has_flag(definition, AstFlags::DEFINITION_IS_PUB),
            is_mut: self.asts.has_flag(definition, AstFlags::DEFINITION_IS_MUT),
            is_global: self.asts.has_flag(definition, AstFlags::DEFINITION_IS_GLOBAL),
            is_use: self.asts.has_flag(definition, AstFlags::DEFINITION_IS_USE),
            offset,
            type_id: if has_pending_type {
                TypeId::INVALID
            } else {
                node_type.strip()
            },
            resumption: if has_pending_type {
                self.resumption()
            } else {
                ResumptionId::INVALID
            },
            opt_type_node: opt_type_node.unwrap_or(AstNodeId::INVALID),
            opt_value_node: opt_value_node.unwrap_or(AstNodeId::INVALID),
        }
    }

    /// Completes the type of a pending member under the lexical
    /// context it was declared in.
    pub(crate) fn delayed_typecheck_member(&mut self, member: &MemberInfo) -> TypeId {
        if member.type_id != TypeId::INVALID {
            return member.type_id;
        }

        debug_assert!(member.resumption.is_valid());

        self.apply_resumption(member.resumption);

        let defined_type_id;

        if member.opt_type_node != AstNodeId::INVALID {
            let type_node = member.opt_type_node;

            let type_type_id = self.typecheck_expr(type_node);

            if self.types.tag_from_id(type_type_id) != TypeTag::Type {
                self.error(
                    self.asts.source_id(type_node),
                    format_args!("Explicit type annotation of definition must be of type 'Type'"),
                );
            }

            defined_type_id = self.evaluate_type_value(type_node);

            self.types.set_incomplete_type_member_type_by_rank(
                member.surrounding_type_id,
                member.rank,
                defined_type_id,
            );

            if member.opt_value_node != AstNodeId::INVALID {
                let value_node = member.opt_value_node;

                let value_type_id = self.typecheck_expr(value_node);

                if !self
                    .types
                    .can_implicitly_convert_from_to(value_type_id, defined_type_id)
                {
                    self.error(
                        self.asts.source_id(value_node),
                        format_args!(
                            "Definition value cannot be implicitly converted to the type of its explicit type annotation"
                        ),
                    );
                }
            }
        } else {
            if member.opt_value_node == AstNodeId::INVALID {
                self.error(
                    member.source,
                    format_args!("Definition must carry a type annotation or a value"),
                );
            }

            defined_type_id = self.typecheck_expr(member.opt_value_node);

            self.types.set_incomplete_type_member_type_by_rank(
                member.surrounding_type_id,
                member.rank,
                defined_type_id.strip(),
            );
        }

        self.release_resumption();

        defined_type_id.strip()
    }

    // File-level typechecking.

    /// Types a parsed file: every top-level definition becomes an
    /// implicitly-global member of a fresh composite, which is then
    /// driven to completion.
    pub(crate) fn type_from_file_ast(&mut self, file: AstNodeId, file_source: SourceId) -> TypeId {
        debug_assert!(self.asts.tag(file) == AstTag::File);

        let existing: FileData = self.asts.attachment(file);

        if existing.scope_type_id != TypeId::INVALID {
            return existing.scope_type_id;
        }

        let file_type_id = self.types.create_open_type(file_source);

        self.push_context(file_type_id, true);

        let mut it = self.asts.direct_children_of(file);

        while let Some(node) = it.next(&self.asts) {
            if self.asts.tag(node) != AstTag::Definition {
                self.error(
                    self.asts.source_id(node),
                    format_args!("Currently only definitions are supported on a file's top level"),
                );
            }

            let mut member = self.member_init_from_definition(node, 0);

            if member.is_global {
                self.warning(
                    self.asts.source_id(node),
                    format_args!(
                        "Redundant 'global' modifier; top-level definitions are implicitly global"
                    ),
                );
            } else {
                member.is_global = true;
            }

            self.types.add_open_type_member(file_type_id, member);
        }

        self.types.close_open_type(file_type_id, 0, 1, 0);

        let mut incomplete = self.types.incomplete_members_of(file_type_id);

        while let Some(member) = incomplete.next(&self.types) {
            let _ = self.delayed_typecheck_member(&member);
        }

        self.pop_context(true);

        self.asts.set_attachment(
            file,
            &FileData {
                definition_count: existing.definition_count,
                scope_type_id: file_type_id,
            },
        );

        file_type_id
    }

    /// Reads, parses (or reuses the cached AST of) and typechecks the
    /// file at `path`.
    pub fn import_file(&mut self, path: &Path, is_std: bool) -> TypeId {
        let file_id = self.reader.read_source_file(path);

        let root = match self.reader.ast_root(file_id) {
            Some(root) => root,
            None => self.parse_file(file_id, is_std),
        };

        let base = self.reader.file(file_id).source_id_base();

        self.type_from_file_ast(root, SourceId(base))
    }

    fn parse_file(&mut self, file_id: SourceFileId, is_std: bool) -> AstNodeId {
        let Interpreter {
            reader,
            parser,
            asts,
            identifiers,
            errors,
            ..
        } = self;

        let file = reader.file(file_id);

        let root = parser.parse(
            file.content(),
            file.source_id_base(),
            is_std,
            identifiers,
            errors,
            reader,
            asts,
        );

        self.reader.set_ast_root(file_id, root);

        root
    }

    /// Imports the configured entrypoint file.
    pub fn import_entrypoint(&mut self) -> TypeId {
        let path = self.config.entrypoint_filepath.clone();

        self.import_file(&path, false)
    }

    /// The cached AST root of an already-imported file.
    pub fn cached_ast_root(&mut self, path: &Path) -> Option<AstNodeId> {
        let file_id = self.reader.read_source_file(path);

        self.reader.ast_root(file_id)
    }

    /// Resolves an import path relative to the importing file.
    pub(crate) fn resolve_import_path(&self, path: &Path, import_source: SourceId) -> PathBuf {
        if path.is_absolute() || import_source == SourceId::INVALID {
            return path.to_path_buf();
        }

        let location = self.reader.source_location_from_id(import_source);

        match location.filepath.parent() {
            Some(parent) => parent.join(path),
            None => path.to_path_buf(),
        }
    }

    fn init_prelude(&mut self) {
        let std_path = self.config.std_filepath.clone();

        let std_path_id = self
            .identifiers
            .id_from(std_path.to_string_lossy().as_bytes());

        let std_id = self.identifiers.id_from(b"std");

        let prelude_id = self.identifiers.id_from(b"prelude");

        let builder = self.parser.builder_mut();

        let src = SourceId::INVALID;

        let import_builtin = builder.push_node(
            crate::ast::AstBuilderToken::NO_CHILDREN,
            src,
            AstFlags(Builtin::Import as u8),
            AstTag::Builtin,
        );

        builder.push_node_with(
            crate::ast::AstBuilderToken::NO_CHILDREN,
            src,
            AstFlags::EMPTY,
            crate::ast::ValStringData {
                string_id: std_path_id,
            },
        );

        builder.push_node(
            crate::ast::AstBuilderToken::NO_CHILDREN,
            src,
            AstFlags(Builtin::True as u8),
            AstTag::Builtin,
        );

        let import_call = builder.push_node(import_builtin, src, AstFlags::EMPTY, AstTag::Call);

        let std_definition = builder.push_node_with(
            import_call,
            src,
            AstFlags::EMPTY,
            DefinitionData {
                identifier_id: std_id,
            },
        );

        let std_identifier = builder.push_node_with(
            crate::ast::AstBuilderToken::NO_CHILDREN,
            src,
            AstFlags::EMPTY,
            ValIdentifierData {
                identifier_id: std_id,
            },
        );

        builder.push_node_with(
            crate::ast::AstBuilderToken::NO_CHILDREN,
            src,
            AstFlags::EMPTY,
            ValIdentifierData {
                identifier_id: prelude_id,
            },
        );

        let prelude_member =
            builder.push_node(std_identifier, src, AstFlags::EMPTY, AstTag::OpMember);

        builder.push_node_with(
            prelude_member,
            src,
            AstFlags::DEFINITION_IS_USE,
            DefinitionData {
                identifier_id: prelude_id,
            },
        );

        builder.push_node_with(
            std_definition,
            src,
            AstFlags::EMPTY,
            FileData {
                definition_count: 2,
                scope_type_id: TypeId::INVALID,
            },
        );

        let root = {
            let Interpreter { parser, asts, .. } = self;

            parser.builder_mut().complete(asts)
        };

        self.prelude_type_id = self.type_from_file_ast(root, SourceId::INVALID);
    }

    /// Looks up a definition in a file (or block) scope, completing
    /// and evaluating it on demand. Returns the member's type and the
    /// bytes of its stored value.
    pub fn definition_value(&mut self, scope_type: TypeId, name: &str) -> (TypeId, Vec<u8>) {
        let identifier_id = self.identifiers.id_from(name.as_bytes());

        let info = match self.types.member_info_by_name(scope_type, identifier_id) {
            Some(info) => info,
            None => crate::diagnostics::fatal(format_args!(
                "scope has no definition named '{}'",
                name
            )),
        };

        let type_id = if info.has_pending_type() {
            self.delayed_typecheck_member(&info)
        } else {
            info.type_id
        };

        let info = self
            .types
            .member_info_by_rank(info.surrounding_type_id, info.rank)
            .expect("member rank is stable");

        let global = self.ensure_member_global(&info);

        (type_id, self.globals.bytes(global).to_vec())
    }

    // Typechecking.

    /// Typechecks `node`, caching the result in its type slot. An
    /// in-progress marker on the node means typechecking has recursed
    /// into itself: a cyclic type dependency.
    pub fn typecheck_expr(&mut self, node: AstNodeId) -> TypeId {
        let cached = self.asts.type_id(node);

        if cached == TypeId::CHECKING {
            self.error(
                self.asts.source_id(node),
                format_args!("Cyclic type dependency detected"),
            );
        } else if cached != TypeId::INVALID {
            return cached;
        }

        self.asts.set_type_id(node, TypeId::CHECKING);

        let result = self.typecheck_expr_impl(node);

        debug_assert!(result != TypeId::INVALID && result != TypeId::CHECKING);

        self.asts.set_type_id(node, result);

        result
    }

    fn typecheck_expr_impl(&mut self, node: AstNodeId) -> TypeId {
        let source = self.asts.source_id(node);

        match self.asts.tag(node) {
            AstTag::CompositeInitializer
            | AstTag::ArrayInitializer
            | AstTag::Wildcard
            | AstTag::Where
            | AstTag::Expects
            | AstTag::Ensures
            | AstTag::Definition
            | AstTag::ForEach
            | AstTag::Switch
            | AstTag::Case
            | AstTag::Func
            | AstTag::Trait
            | AstTag::Impl
            | AstTag::Catch
            | AstTag::Return
            | AstTag::Leave
            | AstTag::Yield
            | AstTag::ParameterList
            | AstTag::UOpTry
            | AstTag::UOpDefer
            | AstTag::UOpImpliedMember => self.error(
                source,
                format_args!(
                    "Typechecking of '{}' expressions is not implemented yet",
                    self.asts.tag(node).name()
                ),
            ),

            AstTag::Builtin => {
                let builtin = Builtin::from_ordinal(self.asts.flags(node).0);

                let type_id = self.builtin_type_ids[builtin as usize];

                debug_assert!(type_id != TypeId::INVALID);

                type_id
            }

            AstTag::Block => self.typecheck_block(node),

            AstTag::If => {
                let condition = self.asts.first_child_of(node);

                let condition_type_id = self.typecheck_expr(condition);

                if self.types.tag_from_id(condition_type_id) != TypeTag::Boolean {
                    self.error(
                        self.asts.source_id(condition),
                        format_args!("Condition of 'if' must be of boolean type"),
                    );
                }

                if self.asts.has_flag(node, AstFlags::IF_HAS_WHERE) {
                    self.error(
                        source,
                        format_args!("Typechecking of 'where' clauses is not implemented yet"),
                    );
                }

                let consequent = self.asts.next_sibling_of(condition);

                let consequent_type_id = self.typecheck_expr(consequent);

                if self.asts.has_flag(node, AstFlags::IF_HAS_ELSE) {
                    let alternative = self.asts.next_sibling_of(consequent);

                    let alternative_type_id = self.typecheck_expr(alternative);

                    let common_type_id = self
                        .types
                        .common_type(consequent_type_id, alternative_type_id);

                    if common_type_id == TypeId::INVALID {
                        self.error(
                            source,
                            format_args!(
                                "Consequent and alternative of 'if' have incompatible types"
                            ),
                        );
                    }

                    common_type_id
                } else {
                    if self.types.tag_from_id(consequent_type_id) != TypeTag::Void {
                        self.error(
                            source,
                            format_args!(
                                "Consequent of 'if' must be of void type if no alternative is provided"
                            ),
                        );
                    }

                    consequent_type_id.strip()
                }
            }

            AstTag::For => {
                let condition = self.asts.first_child_of(node);

                let condition_type_id = self.typecheck_expr(condition);

                if self.types.tag_from_id(condition_type_id) != TypeTag::Boolean {
                    self.error(
                        self.asts.source_id(condition),
                        format_args!("Condition of 'for' must be of boolean type"),
                    );
                }

                let mut next = self.asts.next_sibling_of(condition);

                if self.asts.has_flag(node, AstFlags::FOR_HAS_STEP) {
                    let step_type_id = self.typecheck_expr(next);

                    if self.types.tag_from_id(step_type_id) != TypeTag::Void {
                        self.error(
                            self.asts.source_id(next),
                            format_args!("Step of 'for' must be of void type"),
                        );
                    }

                    next = self.asts.next_sibling_of(next);
                }

                if self.asts.has_flag(node, AstFlags::FOR_HAS_WHERE) {
                    self.error(
                        source,
                        format_args!("Typechecking of 'where' clauses is not implemented yet"),
                    );
                }

                let body_type_id = self.typecheck_expr(next);

                if self.asts.has_flag(node, AstFlags::FOR_HAS_FINALLY) {
                    let finally = self.asts.next_sibling_of(next);

                    let finally_type_id = self.typecheck_expr(finally);

                    let common_type_id = self.types.common_type(body_type_id, finally_type_id);

                    if common_type_id == TypeId::INVALID {
                        self.error(
                            source,
                            format_args!("Body and finally of 'for' have incompatible types"),
                        );
                    }

                    common_type_id
                } else {
                    if self.types.tag_from_id(body_type_id) != TypeTag::Void {
                        self.error(
                            source,
                            format_args!(
                                "Body of 'for' must be of void type if no finally is provided"
                            ),
                        );
                    }

                    body_type_id.strip()
                }
            }

            AstTag::ValIdentifier => {
                let data: ValIdentifierData = self.asts.attachment(node);

                let member = self.lookup_identifier_definition(data.identifier_id, source);

                let member_type = self.delayed_typecheck_member(&member);

                self.identifier_resolutions
                    .insert(node, (member.surrounding_type_id, member.rank));

                member_type.set_assignability(member.is_mut)
            }

            AstTag::ValInteger | AstTag::ValChar => {
                self.types.id_from_structure(TypeStructure::CompInteger)
            }

            AstTag::ValFloat => self.types.id_from_structure(TypeStructure::CompFloat),

            AstTag::ValString => self.types.id_from_structure(TypeStructure::CompString),

            AstTag::Call => self.typecheck_call(node),

            AstTag::UOpTypeTailArray
            | AstTag::UOpTypeSlice
            | AstTag::UOpTypeMultiPtr
            | AstTag::UOpTypeOptMultiPtr
            | AstTag::UOpTypeOptPtr
            | AstTag::UOpTypePtr
            | AstTag::UOpTypeVar => {
                let operand = self.asts.first_child_of(node);

                let operand_type_id = self.typecheck_expr(operand);

                if self.types.tag_from_id(operand_type_id) != TypeTag::Type {
                    self.error(
                        self.asts.source_id(operand),
                        format_args!(
                            "Operand of '{}' must be of type 'Type'",
                            self.asts.tag(node).name()
                        ),
                    );
                }

                // The constructed type is produced by evaluation; the
                // expression itself denotes a type.
                self.types.id_from_structure(TypeStructure::Type)
            }

            AstTag::OpTypeArray => {
                let count = self.asts.first_child_of(node);

                let count_type_id = self.typecheck_expr(count);

                let count_type_tag = self.types.tag_from_id(count_type_id);

                if count_type_tag != TypeTag::Integer && count_type_tag != TypeTag::CompInteger {
                    self.error(
                        self.asts.source_id(count),
                        format_args!("Expected array count expression of integral type"),
                    );
                }

                let element = self.asts.next_sibling_of(count);

                let element_type_id = self.typecheck_expr(element);

                if self.types.tag_from_id(element_type_id) != TypeTag::Type {
                    self.error(
                        self.asts.source_id(element),
                        format_args!("Expected array element expression of type 'Type'"),
                    );
                }

                self.types.id_from_structure(TypeStructure::Type)
            }

            AstTag::UOpEval => {
                let operand = self.asts.first_child_of(node);

                self.typecheck_expr(operand)
            }

            AstTag::UOpDistinct => {
                let operand = self.asts.first_child_of(node);

                let operand_type_id = self.typecheck_expr(operand);

                if self.types.tag_from_id(operand_type_id) != TypeTag::Type {
                    self.error(
                        self.asts.source_id(operand),
                        format_args!("Operand of 'distinct' must be of type 'Type'"),
                    );
                }

                self.types.id_from_structure(TypeStructure::Type)
            }

            AstTag::UOpAddr => {
                let operand = self.asts.first_child_of(node);

                let operand_type_id = self.typecheck_expr(operand);

                if !operand_type_id.is_assignable() {
                    self.error(
                        self.asts.source_id(operand),
                        format_args!("Operand of '$' must denote a storage location"),
                    );
                }

                self.types
                    .id_from_structure(TypeStructure::Ptr(crate::types::ReferenceType {
                        referenced_type_id: operand_type_id,
                        is_multi: false,
                        is_opt: false,
                    }))
            }

            AstTag::UOpDeref => {
                let operand = self.asts.first_child_of(node);

                let operand_type_id = self.typecheck_expr(operand);

                if self.types.tag_from_id(operand_type_id) != TypeTag::Ptr {
                    self.error(
                        self.asts.source_id(operand),
                        format_args!("Operand of '.*' must be of pointer type"),
                    );
                }

                let reference = match self.types.primitive_structure(operand_type_id) {
                    TypeStructure::Ptr(reference) => *reference,
                    _ => unreachable!("tag was checked to be a pointer"),
                };

                reference
                    .referenced_type_id
                    .mask_assignability(operand_type_id.is_assignable())
            }

            AstTag::UOpBitNot => {
                let operand = self.asts.first_child_of(node);

                let operand_type_id = self.typecheck_expr(operand);

                let tag = self.types.tag_from_id(operand_type_id);

                if tag != TypeTag::Integer && tag != TypeTag::CompInteger {
                    self.error(
                        self.asts.source_id(operand),
                        format_args!("Operand of '~' must be of integral type"),
                    );
                }

                operand_type_id.set_assignability(false)
            }

            AstTag::UOpLogNot => {
                let operand = self.asts.first_child_of(node);

                let operand_type_id = self.typecheck_expr(operand);

                if self.types.tag_from_id(operand_type_id) != TypeTag::Boolean {
                    self.error(
                        self.asts.source_id(operand),
                        format_args!("Operand of '!' must be of boolean type"),
                    );
                }

                operand_type_id.set_assignability(false)
            }

            AstTag::UOpNegate | AstTag::UOpPos => {
                let operand = self.asts.first_child_of(node);

                let operand_type_id = self.typecheck_expr(operand);

                let tag = self.types.tag_from_id(operand_type_id);

                if !matches!(
                    tag,
                    TypeTag::Integer | TypeTag::CompInteger | TypeTag::Float | TypeTag::CompFloat
                ) {
                    self.error(
                        self.asts.source_id(operand),
                        format_args!(
                            "Operand of unary '{}' must be of integral or floating point type",
                            self.asts.tag(node).name()
                        ),
                    );
                }

                if self.asts.tag(node) == AstTag::UOpNegate && tag == TypeTag::Integer {
                    let signed = match self.types.primitive_structure(operand_type_id) {
                        TypeStructure::Integer(integer) => integer.is_signed,
                        _ => unreachable!("tag was checked to be an integer"),
                    };

                    if !signed {
                        self.error(
                            self.asts.source_id(operand),
                            format_args!("Operand of unary '-' must be signed"),
                        );
                    }
                }

                operand_type_id.set_assignability(false)
            }

            AstTag::OpAdd
            | AstTag::OpSub
            | AstTag::OpMul
            | AstTag::OpDiv
            | AstTag::OpAddTC
            | AstTag::OpSubTC
            | AstTag::OpMulTC
            | AstTag::OpMod => self.typecheck_binary_numeric(node, false),

            AstTag::OpBitAnd | AstTag::OpBitOr | AstTag::OpBitXor => {
                self.typecheck_binary_numeric(node, true)
            }

            AstTag::OpShiftL | AstTag::OpShiftR => {
                let lhs = self.asts.first_child_of(node);

                let lhs_type_id = self.typecheck_expr(lhs);

                let lhs_tag = self.types.tag_from_id(lhs_type_id);

                if lhs_tag != TypeTag::Integer && lhs_tag != TypeTag::CompInteger {
                    self.error(
                        self.asts.source_id(lhs),
                        format_args!("Left-hand side of shift must be of integral type"),
                    );
                }

                let rhs = self.asts.next_sibling_of(lhs);

                let rhs_type_id = self.typecheck_expr(rhs);

                let rhs_tag = self.types.tag_from_id(rhs_type_id);

                if rhs_tag != TypeTag::Integer && rhs_tag != TypeTag::CompInteger {
                    self.error(
                        self.asts.source_id(rhs),
                        format_args!("Right-hand side of shift must be of integral type"),
                    );
                }

                lhs_type_id.set_assignability(false)
            }

            AstTag::OpLogAnd | AstTag::OpLogOr => {
                let lhs = self.asts.first_child_of(node);

                let lhs_type_id = self.typecheck_expr(lhs);

                if self.types.tag_from_id(lhs_type_id) != TypeTag::Boolean {
                    self.error(
                        self.asts.source_id(lhs),
                        format_args!(
                            "Left-hand side of '{}' must be of boolean type",
                            self.asts.tag(node).name()
                        ),
                    );
                }

                let rhs = self.asts.next_sibling_of(lhs);

                let rhs_type_id = self.typecheck_expr(rhs);

                if self.types.tag_from_id(rhs_type_id) != TypeTag::Boolean {
                    self.error(
                        self.asts.source_id(rhs),
                        format_args!(
                            "Right-hand side of '{}' must be of boolean type",
                            self.asts.tag(node).name()
                        ),
                    );
                }

                self.types.id_from_structure(TypeStructure::Boolean)
            }

            AstTag::OpMember => self.typecheck_member_access(node),

            AstTag::OpCmpLT
            | AstTag::OpCmpGT
            | AstTag::OpCmpLE
            | AstTag::OpCmpGE
            | AstTag::OpCmpNE
            | AstTag::OpCmpEQ => {
                let lhs = self.asts.first_child_of(node);

                let lhs_type_id = self.typecheck_expr(lhs);

                let lhs_tag = self.types.tag_from_id(lhs_type_id);

                if matches!(lhs_tag, TypeTag::Array | TypeTag::Composite) {
                    self.error(
                        self.asts.source_id(lhs),
                        format_args!(
                            "Left-hand side of comparison must not be of composite or array type"
                        ),
                    );
                }

                let rhs = self.asts.next_sibling_of(lhs);

                let rhs_type_id = self.typecheck_expr(rhs);

                let rhs_tag = self.types.tag_from_id(rhs_type_id);

                if matches!(rhs_tag, TypeTag::Array | TypeTag::Composite) {
                    self.error(
                        self.asts.source_id(rhs),
                        format_args!(
                            "Right-hand side of comparison must not be of composite or array type"
                        ),
                    );
                }

                if self.types.common_type(lhs_type_id, rhs_type_id) == TypeId::INVALID {
                    self.error(
                        source,
                        format_args!("Incompatible operands for comparison"),
                    );
                }

                self.types.id_from_structure(TypeStructure::Boolean)
            }

            AstTag::OpSet
            | AstTag::OpSetAdd
            | AstTag::OpSetSub
            | AstTag::OpSetMul
            | AstTag::OpSetDiv
            | AstTag::OpSetAddTC
            | AstTag::OpSetSubTC
            | AstTag::OpSetMulTC
            | AstTag::OpSetMod
            | AstTag::OpSetBitAnd
            | AstTag::OpSetBitOr
            | AstTag::OpSetBitXor
            | AstTag::OpSetShiftL
            | AstTag::OpSetShiftR => self.typecheck_assignment(node),

            AstTag::OpArrayIndex => {
                let arrayish = self.asts.first_child_of(node);

                let arrayish_type_id = self.typecheck_expr(arrayish);

                let element_type_id = match self.types.primitive_structure(arrayish_type_id) {
                    TypeStructure::Array(array) => array.element_type,
                    TypeStructure::Slice(reference) => reference.referenced_type_id,
                    TypeStructure::Ptr(reference) if reference.is_multi => {
                        reference.referenced_type_id
                    }
                    _ => self.error(
                        self.asts.source_id(arrayish),
                        format_args!(
                            "Left-hand side of the index operator must be of array, slice or multi-pointer type"
                        ),
                    ),
                };

                let index = self.asts.next_sibling_of(arrayish);

                let index_type_id = self.typecheck_expr(index);

                let index_tag = self.types.tag_from_id(index_type_id);

                if index_tag != TypeTag::Integer && index_tag != TypeTag::CompInteger {
                    self.error(
                        self.asts.source_id(index),
                        format_args!("Index operand must be of integral type"),
                    );
                }

                element_type_id.mask_assignability(arrayish_type_id.is_assignable())
            }

            AstTag::Invalid | AstTag::File => unreachable!("not an expression node"),
        }
    }

    fn typecheck_binary_numeric(&mut self, node: AstNodeId, integral_only: bool) -> TypeId {
        let lhs = self.asts.first_child_of(node);

        let lhs_type_id = self.typecheck_expr(lhs);

        self.require_numeric_operand(lhs, lhs_type_id, integral_only);

        let rhs = self.asts.next_sibling_of(lhs);

        let rhs_type_id = self.typecheck_expr(rhs);

        self.require_numeric_operand(rhs, rhs_type_id, integral_only);

        let common_type_id = self.types.common_type(lhs_type_id, rhs_type_id);

        if common_type_id == TypeId::INVALID {
            self.error(
                self.asts.source_id(node),
                format_args!(
                    "Incompatible operands for '{}'",
                    self.asts.tag(node).name()
                ),
            );
        }

        common_type_id.set_assignability(false)
    }

    fn require_numeric_operand(&self, operand: AstNodeId, type_id: TypeId, integral_only: bool) {
        let tag = self.types.tag_from_id(type_id);

        let ok = if integral_only {
            matches!(tag, TypeTag::Integer | TypeTag::CompInteger)
        } else {
            matches!(
                tag,
                TypeTag::Integer | TypeTag::CompInteger | TypeTag::Float | TypeTag::CompFloat
            )
        };

        if !ok {
            self.error(
                self.asts.source_id(operand),
                format_args!(
                    "Operand must be of {} type",
                    if integral_only {
                        "integral"
                    } else {
                        "integral or floating point"
                    }
                ),
            );
        }
    }

    fn typecheck_assignment(&mut self, node: AstNodeId) -> TypeId {
        let tag = self.asts.tag(node);

        let lhs = self.asts.first_child_of(node);

        let lhs_type_id = self.typecheck_expr(lhs);

        if !lhs_type_id.is_assignable() {
            self.error(
                self.asts.source_id(lhs),
                format_args!(
                    "Left-hand side of '{}' must be assignable",
                    tag.name()
                ),
            );
        }

        let lhs_tag = self.types.tag_from_id(lhs_type_id);

        let integral_only = matches!(
            tag,
            AstTag::OpSetMod
                | AstTag::OpSetBitAnd
                | AstTag::OpSetBitOr
                | AstTag::OpSetBitXor
                | AstTag::OpSetShiftL
                | AstTag::OpSetShiftR
        );

        if tag != AstTag::OpSet {
            let ok = if integral_only {
                matches!(lhs_tag, TypeTag::Integer | TypeTag::CompInteger)
            } else {
                matches!(
                    lhs_tag,
                    TypeTag::Integer | TypeTag::CompInteger | TypeTag::Float | TypeTag::CompFloat
                )
            };

            if !ok {
                self.error(
                    self.asts.source_id(lhs),
                    format_args!(
                        "Left-hand side of '{}' must be of {} type",
                        tag.name(),
                        if integral_only {
                            "integral"
                        } else {
                            "integral or floating point"
                        }
                    ),
                );
            }
        }

        let rhs = self.asts.next_sibling_of(lhs);

        let rhs_type_id = self.typecheck_expr(rhs);

        if !self
            .types
            .can_implicitly_convert_from_to(rhs_type_id, lhs_type_id.strip())
        {
            self.error(
                self.asts.source_id(rhs),
                format_args!(
                    "Right-hand side of '{}' cannot be implicitly converted to the assigned type",
                    tag.name()
                ),
            );
        }

        self.types.id_from_structure(TypeStructure::Void)
    }

    fn typecheck_block(&mut self, node: AstNodeId) -> TypeId {
        let data: BlockData = self.asts.attachment(node);

        debug_assert!(data.scope_type_id == TypeId::INVALID);

        let scope_type_id = self.types.create_open_type(self.asts.source_id(node));

        self.asts.set_attachment(
            node,
            &BlockData {
                definition_count: data.definition_count,
                scope_type_id,
            },
        );

        self.push_context(scope_type_id, false);

        let mut offset = 0u64;

        let mut max_align = 1u32;

        let mut result_type_id = TypeId::INVALID;

        let mut it = self.asts.direct_children_of(node);

        while let Some(child) = it.next(&self.asts) {
            let is_last = !self.asts.has_next_sibling(child);

            if self.asts.tag(child) == AstTag::Definition {
                let (opt_type_node, opt_value_node) = self.definition_info(child);

                let defined_type_id = if let Some(type_node) = opt_type_node {
                    let type_type_id = self.typecheck_expr(type_node);

                    if self.types.tag_from_id(type_type_id) != TypeTag::Type {
                        self.error(
                            self.asts.source_id(type_node),
                            format_args!(
                                "Explicit type annotation of definition must be of type 'Type'"
                            ),
                        );
                    }

                    self.evaluate_type_value(type_node)
                } else {
                    let value_node = opt_value_node
                        .expect("parser requires a type annotation or a value");

                    self.typecheck_expr(value_node).strip()
                };

                self.asts.set_type_id(child, defined_type_id);

                let metrics = self.types.metrics_from_id(defined_type_id);

                offset = next_multiple(offset, u64::from(metrics.align));

                let member = self.member_init_from_definition(child, offset);

                offset += metrics.size;

                max_align = max_align.max(metrics.align);

                self.types.add_open_type_member(scope_type_id, member);

                if let (Some(_), Some(value_node)) = (opt_type_node, opt_value_node) {
                    let value_type_id = self.typecheck_expr(value_node);

                    if !self
                        .types
                        .can_implicitly_convert_from_to(value_type_id, defined_type_id)
                    {
                        self.error(
                            self.asts.source_id(value_node),
                            format_args!(
                                "Definition value cannot be implicitly converted to the type of its explicit type annotation"
                            ),
                        );
                    }
                }

                if is_last {
                    result_type_id = defined_type_id;
                }
            } else {
                let expr_type_id = self.typecheck_expr(child);

                if is_last {
                    result_type_id = expr_type_id;
                } else {
                    let expr_tag = self.types.tag_from_id(expr_type_id);

                    if expr_tag != TypeTag::Void && expr_tag != TypeTag::Definition {
                        self.error(
                            self.asts.source_id(child),
                            format_args!(
                                "Expression in non-terminal position in block must be a definition or of void type"
                            ),
                        );
                    }
                }
            }
        }

        self.pop_context(false);

        self.types.close_open_type(
            scope_type_id,
            offset,
            max_align,
            next_multiple(offset, u64::from(max_align)),
        );

        // Empty blocks are of type void.
        if result_type_id == TypeId::INVALID {
            result_type_id = self.types.id_from_structure(TypeStructure::Void);
        }

        result_type_id.set_assignability(false)
    }

    fn typecheck_member_access(&mut self, node: AstNodeId) -> TypeId {
        let lhs = self.asts.first_child_of(node);

        let lhs_type_id = self.typecheck_expr(lhs);

        let lhs_tag = self.types.tag_from_id(lhs_type_id);

        if lhs_tag != TypeTag::Composite && lhs_tag != TypeTag::Type {
            self.error(
                self.asts.source_id(lhs),
                format_args!(
                    "Left-hand side of '.' must be of type 'Type' or a composite type"
                ),
            );
        }

        let rhs = self.asts.next_sibling_of(lhs);

        if self.asts.tag(rhs) != AstTag::ValIdentifier {
            self.error(
                self.asts.source_id(rhs),
                format_args!("Right-hand side of '.' must be an identifier"),
            );
        }

        self.asts.set_type_id(rhs, TypeId::NO_TYPE);

        let identifier_id = {
            let data: ValIdentifierData = self.asts.attachment(rhs);

            data.identifier_id
        };

        if lhs_tag == TypeTag::Composite {
            let member = match self.types.member_info_by_name(lhs_type_id, identifier_id) {
                Some(member) => member,
                None => {
                    let name = self.identifiers.name_from(identifier_id).to_string();

                    self.error(
                        self.asts.source_id(node),
                        format_args!("Left-hand side of '.' has no member '{}'", name),
                    )
                }
            };

            let member_type_id = self.delayed_typecheck_member(&member);

            member_type_id
                .set_assignability(member.is_mut)
                .mask_assignability(lhs_type_id.is_assignable())
        } else {
            // The left-hand side denotes a type: resolve the named
            // member of that type's scope as a constant.
            let scope_type_id = self.evaluate_type_value(lhs);

            if self.types.tag_from_id(scope_type_id) != TypeTag::Composite {
                self.error(
                    self.asts.source_id(lhs),
                    format_args!("Type left of '.' has no member scope"),
                );
            }

            let member = match self.types.member_info_by_name(scope_type_id, identifier_id) {
                Some(member) => member,
                None => {
                    let name = self.identifiers.name_from(identifier_id).to_string();

                    self.error(
                        self.asts.source_id(node),
                        format_args!("Type left of '.' has no member '{}'", name),
                    )
                }
            };

            let member_type_id = self.delayed_typecheck_member(&member);

            member_type_id.set_assignability(false)
        }
    }

    fn typecheck_call(&mut self, node: AstNodeId) -> TypeId {
        let callee = self.asts.first_child_of(node);

        let callee_type_id = self.typecheck_expr(callee);

        if self.types.tag_from_id(callee_type_id) != TypeTag::Func {
            self.error(
                self.asts.source_id(callee),
                format_args!(
                    "Left-hand side of the call operator must be of function type"
                ),
            );
        }

        let func: FuncType = match self.types.primitive_structure(callee_type_id) {
            TypeStructure::Func(func) => *func,
            _ => unreachable!("tag was checked to be a function"),
        };

        let signature_type_id = func.signature_type_id;

        let mut expect_named = false;

        let mut seen_argument_mask = 0u64;

        let mut seen_argument_count = 0u16;

        let mut argument = callee;

        while self.asts.has_next_sibling(argument) {
            argument = self.asts.next_sibling_of(argument);

            let (member, argument_type_id) = if self.asts.tag(argument) == AstTag::OpSet {
                if !expect_named {
                    seen_argument_mask = mask_below(seen_argument_count);

                    expect_named = true;
                }

                let lhs = self.asts.first_child_of(argument);

                let rhs = self.asts.next_sibling_of(lhs);

                let name_node = if self.asts.tag(lhs) == AstTag::UOpImpliedMember {
                    self.asts.set_type_id(lhs, TypeId::NO_TYPE);

                    self.asts.first_child_of(lhs)
                } else {
                    lhs
                };

                if self.asts.tag(name_node) != AstTag::ValIdentifier {
                    self.error(
                        self.asts.source_id(lhs),
                        format_args!("Named argument must name a parameter"),
                    );
                }

                self.asts.set_type_id(name_node, TypeId::NO_TYPE);

                let identifier_id = {
                    let data: ValIdentifierData = self.asts.attachment(name_node);

                    data.identifier_id
                };

                let member = match self
                    .types
                    .member_info_by_name(signature_type_id, identifier_id)
                {
                    Some(member) => member,
                    None => {
                        let name = self.identifiers.name_from(identifier_id).to_string();

                        self.error(
                            self.asts.source_id(lhs),
                            format_args!("'{}' is not an argument of the called function", name),
                        )
                    }
                };

                if member.rank >= 64 {
                    self.error(
                        self.asts.source_id(lhs),
                        format_args!("Function arguments beyond the 64th cannot be bound by name"),
                    );
                }

                let argument_bit = 1u64 << member.rank;

                if seen_argument_mask & argument_bit != 0 {
                    let name = self.identifiers.name_from(identifier_id).to_string();

                    self.error(
                        self.asts.source_id(lhs),
                        format_args!("Function argument '{}' set more than once", name),
                    );
                }

                seen_argument_mask |= argument_bit;

                let argument_type_id = self.typecheck_expr(rhs);

                self.asts.set_type_id(argument, TypeId::NO_TYPE);

                (member, argument_type_id)
            } else {
                if expect_named {
                    self.error(
                        self.asts.source_id(argument),
                        format_args!("Positional arguments must not follow named arguments"),
                    );
                }

                if seen_argument_count >= func.param_count {
                    self.error(
                        self.asts.source_id(argument),
                        format_args!(
                            "Call supplies more than the expected {} argument(s)",
                            func.param_count
                        ),
                    );
                }

                let member = self
                    .types
                    .member_info_by_rank(signature_type_id, seen_argument_count)
                    .expect("rank is below the parameter count");

                let argument_type_id = self.typecheck_expr(argument);

                seen_argument_count += 1;

                (member, argument_type_id)
            };

            let parameter_type_id = if member.has_pending_type() {
                self.delayed_typecheck_member(&member)
            } else {
                member.type_id
            };

            if !self
                .types
                .can_implicitly_convert_from_to(argument_type_id, parameter_type_id)
            {
                self.error(
                    self.asts.source_id(argument),
                    format_args!(
                        "Argument cannot be implicitly converted to the expected parameter type"
                    ),
                );
            }
        }

        func.return_type_id
    }
}

fn mask_below(count: u16) -> u64 {
    if count >= 64 {
        u64::MAX
    } else {
        (1u64 << count) - 1
    }
}

#[cfg(test)]
mod tests;
