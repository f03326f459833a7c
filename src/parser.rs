//! Pratt parser over the token stream.
//!
//! Expressions are parsed with an explicit operator/operand stack
//! driven by two precedence tables indexed by token ordinal range.
//! Precedence numbers grow from tightest (member access) to loosest
//! (assignment); left-associative operators pop earlier operators of
//! equal precedence, right-associative ones only pop strictly tighter
//! ones. Statement-shaped forms — definitions, `if`, `for`, `switch`,
//! `func`, `trait`, `impl` and blocks — have dedicated routines that
//! build their children bottom-up and emit the parent node with the
//! first-child token captured at the start.
//!
//! All malformed input is a fatal source error at the offending token.

use crate::ast::{
    AstBuilder, AstBuilderToken, AstFlags, AstNodeId, AstPool, AstTag, BlockData, DefinitionData,
    FileData, FuncData, ValCharData, ValFloatData, ValIdentifierData, ValIntegerData,
    ValStringData,
};
use crate::diagnostics::ErrorSink;
use crate::identifiers::IdentifierPool;
use crate::lexer::{Lexer, Token};
use crate::source::{SourceId, SourceReader};

const MAX_OPEN_OPERATORS: usize = 64;
const MAX_OPEN_OPERANDS: usize = 128;

#[derive(Clone, Copy)]
struct OperatorDesc {
    node_type: AstTag,
    node_flags: AstFlags,
    /// Grows from tightest to loosest; the opening parenthesis sits
    /// above every real operator.
    precedence: u8,
    /// Left-associative operators pop stacked operators of equal
    /// precedence before being pushed.
    is_left_associative: bool,
    is_binary: bool,
}

#[derive(Clone, Copy)]
struct OperatorDescWithSource {
    desc: OperatorDesc,
    source_id: SourceId,
}

const fn unary(node_type: AstTag, node_flags: AstFlags, precedence: u8) -> OperatorDesc {
    OperatorDesc {
        node_type,
        node_flags,
        precedence,
        is_left_associative: false,
        is_binary: false,
    }
}

const fn binary(node_type: AstTag, precedence: u8, is_left_associative: bool) -> OperatorDesc {
    OperatorDesc {
        node_type,
        node_flags: AstFlags::EMPTY,
        precedence,
        is_left_associative,
        is_binary: true,
    }
}

/// Indexed by `token.ordinal() - Token::ParenL.ordinal()`.
const UNARY_OPERATOR_DESCS: [OperatorDesc; 18] = [
    unary(AstTag::Invalid, AstFlags::EMPTY, 10),                 // ( - opening parenthesis
    unary(AstTag::UOpEval, AstFlags::EMPTY, 8),                  // eval
    unary(AstTag::UOpTry, AstFlags::EMPTY, 8),                   // try
    unary(AstTag::UOpDefer, AstFlags::EMPTY, 8),                 // defer
    unary(AstTag::UOpDistinct, AstFlags::EMPTY, 2),              // distinct
    unary(AstTag::UOpAddr, AstFlags::EMPTY, 2),                  // $
    unary(AstTag::UOpBitNot, AstFlags::EMPTY, 2),                // ~
    unary(AstTag::UOpLogNot, AstFlags::EMPTY, 2),                // !
    unary(AstTag::UOpTypeOptPtr, AstFlags::TYPE_IS_MUT, 2),      // ?
    unary(AstTag::UOpTypeVar, AstFlags::EMPTY, 2),               // ...
    unary(AstTag::UOpTypeTailArray, AstFlags::EMPTY, 2),         // [...]
    unary(AstTag::UOpTypeMultiPtr, AstFlags::TYPE_IS_MUT, 2),    // [*]
    unary(AstTag::UOpTypeOptMultiPtr, AstFlags::TYPE_IS_MUT, 2), // [?]
    unary(AstTag::UOpTypeSlice, AstFlags::TYPE_IS_MUT, 2),       // []
    unary(AstTag::UOpImpliedMember, AstFlags::EMPTY, 1),         // .
    unary(AstTag::UOpTypePtr, AstFlags::TYPE_IS_MUT, 2),         // *
    unary(AstTag::UOpNegate, AstFlags::EMPTY, 2),                // -
    unary(AstTag::UOpPos, AstFlags::EMPTY, 2),                   // +
];

/// Indexed by `token.ordinal() - Token::OpMemberOrRef.ordinal()`.
const BINARY_OPERATOR_DESCS: [OperatorDesc; 37] = [
    binary(AstTag::OpMember, 1, true),      // .
    binary(AstTag::OpMul, 2, true),         // *
    binary(AstTag::OpSub, 3, true),         // -
    binary(AstTag::OpAdd, 3, true),         // +
    binary(AstTag::OpDiv, 2, true),         // /
    binary(AstTag::OpAddTC, 3, true),       // +:
    binary(AstTag::OpSubTC, 3, true),       // -:
    binary(AstTag::OpMulTC, 2, true),       // *:
    binary(AstTag::OpMod, 2, true),         // %
    unary(AstTag::UOpDeref, AstFlags::EMPTY, 1), // .* - postfix dereference
    binary(AstTag::OpBitAnd, 6, true),      // &
    binary(AstTag::OpBitOr, 6, true),       // |
    binary(AstTag::OpBitXor, 6, true),      // ^
    binary(AstTag::OpShiftL, 4, true),      // <<
    binary(AstTag::OpShiftR, 4, true),      // >>
    binary(AstTag::OpLogAnd, 7, true),      // &&
    binary(AstTag::OpLogOr, 7, true),       // ||
    binary(AstTag::OpCmpLT, 5, true),       // <
    binary(AstTag::OpCmpGT, 5, true),       // >
    binary(AstTag::OpCmpLE, 5, true),       // <=
    binary(AstTag::OpCmpGE, 5, true),       // >=
    binary(AstTag::OpCmpNE, 5, true),       // !=
    binary(AstTag::OpCmpEQ, 5, true),       // ==
    binary(AstTag::OpSet, 9, false),        // =
    binary(AstTag::OpSetAdd, 9, false),     // +=
    binary(AstTag::OpSetSub, 9, false),     // -=
    binary(AstTag::OpSetMul, 9, false),     // *=
    binary(AstTag::OpSetDiv, 9, false),     // /=
    binary(AstTag::OpSetAddTC, 9, false),   // +:=
    binary(AstTag::OpSetSubTC, 9, false),   // -:=
    binary(AstTag::OpSetMulTC, 9, false),   // *:=
    binary(AstTag::OpSetMod, 9, false),     // %=
    binary(AstTag::OpSetBitAnd, 9, false),  // &=
    binary(AstTag::OpSetBitOr, 9, false),   // |=
    binary(AstTag::OpSetBitXor, 9, false),  // ^=
    binary(AstTag::OpSetShiftL, 9, false),  // <<=
    binary(AstTag::OpSetShiftR, 9, false),  // >>=
];

struct OperatorStack {
    operand_count: usize,
    operator_top: usize,
    expression_source_id: SourceId,
    operators: [OperatorDescWithSource; MAX_OPEN_OPERATORS],
    operand_tokens: [AstBuilderToken; MAX_OPEN_OPERANDS],
}

impl OperatorStack {
    fn new(expression_source_id: SourceId) -> Self {
        Self {
            operand_count: 0,
            operator_top: 0,
            expression_source_id,
            operators: [OperatorDescWithSource {
                desc: unary(AstTag::Invalid, AstFlags::EMPTY, 0),
                source_id: SourceId::INVALID,
            }; MAX_OPEN_OPERATORS],
            operand_tokens: [AstBuilderToken::NO_CHILDREN; MAX_OPEN_OPERANDS],
        }
    }
}

pub struct Parser {
    builder: AstBuilder,
}

impl Parser {
    pub fn new() -> Self {
        Self {
            builder: AstBuilder::new(),
        }
    }

    /// Direct access to the builder, used for synthesized trees (the
    /// prelude bootstrap).
    pub fn builder_mut(&mut self) -> &mut AstBuilder {
        &mut self.builder
    }

    /// Parses a whole file into `asts`, returning the id of its `File`
    /// root node.
    #[allow(clippy::too_many_arguments)]
    pub fn parse(
        &mut self,
        content: &[u8],
        source_id_base: u32,
        is_std: bool,
        identifiers: &mut IdentifierPool,
        errors: &ErrorSink,
        reader: &SourceReader,
        asts: &mut AstPool,
    ) -> AstNodeId {
        let lexer = Lexer::new(content, source_id_base, is_std, identifiers, errors, reader);

        let mut ctx = ParseCtx {
            lexer,
            builder: &mut self.builder,
        };

        ctx.parse_file(source_id_base);

        self.builder.complete(asts)
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

fn is_definition_start(token: Token) -> bool {
    matches!(
        token,
        Token::KwdLet
            | Token::KwdPub
            | Token::KwdMut
            | Token::KwdGlobal
            | Token::KwdAuto
            | Token::KwdUse
    )
}

struct ParseCtx<'a, 'b> {
    lexer: Lexer<'a>,
    builder: &'b mut AstBuilder,
}

impl ParseCtx<'_, '_> {
    fn error(&self, source_id: SourceId, args: std::fmt::Arguments<'_>) -> ! {
        self.lexer.error(source_id, args)
    }

    // Operator stack plumbing.

    fn pop_operator(&mut self, stack: &mut OperatorStack) {
        debug_assert!(stack.operator_top != 0);

        let top = stack.operators[stack.operator_top - 1];

        stack.operator_top -= 1;

        if top.desc.node_type == AstTag::Invalid {
            return;
        }

        if stack.operand_count <= usize::from(top.desc.is_binary) {
            self.error(
                stack.expression_source_id,
                format_args!("Missing operand(s) for operator '{}'", top.desc.node_type.name()),
            );
        }

        if top.desc.is_binary {
            stack.operand_count -= 1;
        }

        let operator_token = self.builder.push_node(
            stack.operand_tokens[stack.operand_count - 1],
            top.source_id,
            top.desc.node_flags,
            top.desc.node_type,
        );

        stack.operand_tokens[stack.operand_count - 1] = operator_token;
    }

    /// Pops stacked operators that bind at least as tightly as
    /// `precedence`. Returns whether an operator (necessarily binding
    /// looser) remains on the stack.
    fn pop_to_precedence(
        &mut self,
        stack: &mut OperatorStack,
        precedence: u8,
        pop_equal: bool,
    ) -> bool {
        while stack.operator_top != 0 {
            let top = stack.operators[stack.operator_top - 1];

            if top.desc.precedence > precedence
                || (top.desc.precedence == precedence && !pop_equal)
            {
                return true;
            }

            self.pop_operator(stack);
        }

        false
    }

    fn push_operand(&mut self, stack: &mut OperatorStack, operand_token: AstBuilderToken) {
        if stack.operand_count == MAX_OPEN_OPERANDS - 1 {
            self.error(
                stack.expression_source_id,
                format_args!(
                    "Expression exceeds maximum of {} open operands",
                    MAX_OPEN_OPERANDS
                ),
            );
        }

        stack.operand_tokens[stack.operand_count] = operand_token;

        stack.operand_count += 1;
    }

    fn push_operator(&mut self, stack: &mut OperatorStack, op: OperatorDescWithSource) {
        if op.desc.node_type != AstTag::Invalid {
            self.pop_to_precedence(stack, op.desc.precedence, op.desc.is_left_associative);
        }

        if stack.operator_top == MAX_OPEN_OPERATORS {
            self.error(
                stack.expression_source_id,
                format_args!(
                    "Expression exceeds maximum depth of {} open operators",
                    MAX_OPEN_OPERATORS
                ),
            );
        }

        stack.operators[stack.operator_top] = op;

        stack.operator_top += 1;
    }

    fn remove_lparen(&mut self, stack: &mut OperatorStack) {
        debug_assert!(
            stack.operator_top != 0
                && stack.operators[stack.operator_top - 1].desc.node_type == AstTag::Invalid
        );

        stack.operator_top -= 1;
    }

    fn pop_remaining(&mut self, stack: &mut OperatorStack) -> AstBuilderToken {
        while stack.operator_top != 0 {
            self.pop_operator(stack);
        }

        if stack.operand_count != 1 {
            self.error(
                stack.expression_source_id,
                format_args!(
                    "Mismatched operand / operator count ({} operands remaining)",
                    stack.operand_count
                ),
            );
        }

        stack.operand_tokens[0]
    }

    // Statement-shaped forms.

    fn parse_definition(&mut self, is_implicit: bool, is_optional_value: bool) -> AstBuilderToken {
        let mut flags = AstFlags::EMPTY;

        let mut lexeme = self.lexer.next();

        let source_id = lexeme.source_id;

        if lexeme.token == Token::KwdLet {
            lexeme = self.lexer.next();
        } else {
            loop {
                let modifier = match lexeme.token {
                    Token::KwdPub => AstFlags::DEFINITION_IS_PUB,
                    Token::KwdMut => AstFlags::DEFINITION_IS_MUT,
                    Token::KwdGlobal => AstFlags::DEFINITION_IS_GLOBAL,
                    Token::KwdAuto => AstFlags::DEFINITION_IS_AUTO,
                    Token::KwdUse => AstFlags::DEFINITION_IS_USE,
                    _ => break,
                };

                if flags.contains(modifier) {
                    self.error(
                        lexeme.source_id,
                        format_args!(
                            "Definition modifier '{}' encountered more than once",
                            lexeme.token.name()
                        ),
                    );
                }

                flags |= modifier;

                lexeme = self.lexer.next();
            }

            if flags == AstFlags::EMPTY && !is_implicit {
                self.error(
                    lexeme.source_id,
                    format_args!(
                        "Missing 'let' or at least one of 'pub', 'mut' or 'global' at start of definition"
                    ),
                );
            }
        }

        if lexeme.token != Token::Ident {
            self.error(
                lexeme.source_id,
                format_args!(
                    "Expected identifier after definition modifiers but got '{}'",
                    lexeme.token.name()
                ),
            );
        }

        let identifier_id = lexeme.identifier_id();

        let mut lexeme = self.lexer.peek();

        let mut first_child_token = AstBuilderToken::NO_CHILDREN;

        if lexeme.token == Token::Colon {
            flags |= AstFlags::DEFINITION_HAS_TYPE;

            self.lexer.skip();

            first_child_token = self.parse_expr(false);

            lexeme = self.lexer.peek();
        }

        if lexeme.token == Token::OpSet {
            self.lexer.skip();

            let value_token = self.parse_expr(true);

            if first_child_token == AstBuilderToken::NO_CHILDREN {
                first_child_token = value_token;
            }
        } else if !is_optional_value {
            self.error(
                lexeme.source_id,
                format_args!(
                    "Expected '=' after definition identifier and type, but got '{}'",
                    lexeme.token.name()
                ),
            );
        }

        self.builder.push_node_with(
            first_child_token,
            source_id,
            flags,
            DefinitionData { identifier_id },
        )
    }

    fn parse_return(&mut self) -> AstBuilderToken {
        debug_assert!(self.lexer.peek().token == Token::KwdReturn);

        let source_id = self.lexer.next().source_id;

        let value_token = self.parse_expr(true);

        self.builder
            .push_node(value_token, source_id, AstFlags::EMPTY, AstTag::Return)
    }

    fn parse_leave(&mut self) -> AstBuilderToken {
        debug_assert!(self.lexer.peek().token == Token::KwdLeave);

        let source_id = self.lexer.next().source_id;

        self.builder.push_node(
            AstBuilderToken::NO_CHILDREN,
            source_id,
            AstFlags::EMPTY,
            AstTag::Leave,
        )
    }

    fn parse_yield(&mut self) -> AstBuilderToken {
        debug_assert!(self.lexer.peek().token == Token::KwdYield);

        let source_id = self.lexer.next().source_id;

        let value_token = self.parse_expr(true);

        self.builder
            .push_node(value_token, source_id, AstFlags::EMPTY, AstTag::Yield)
    }

    /// Parses one block- or argument-level entry; reports whether it
    /// was a definition.
    fn parse_top_level_expr(&mut self, is_definition_optional_value: bool) -> (AstBuilderToken, bool) {
        let lexeme = self.lexer.peek();

        if is_definition_start(lexeme.token) {
            (
                self.parse_definition(false, is_definition_optional_value),
                true,
            )
        } else if lexeme.token == Token::KwdReturn {
            (self.parse_return(), false)
        } else if lexeme.token == Token::KwdLeave {
            (self.parse_leave(), false)
        } else if lexeme.token == Token::KwdYield {
            (self.parse_yield(), false)
        } else {
            (self.parse_expr(true), false)
        }
    }

    fn parse_where(&mut self) -> AstBuilderToken {
        debug_assert!(self.lexer.peek().token == Token::KwdWhere);

        let source_id = self.lexer.next().source_id;

        let first_child_token = self.parse_definition(true, false);

        while self.lexer.peek().token == Token::Comma {
            self.lexer.skip();

            self.parse_definition(true, false);
        }

        self.builder
            .push_node(first_child_token, source_id, AstFlags::EMPTY, AstTag::Where)
    }

    fn parse_if(&mut self) -> AstBuilderToken {
        debug_assert!(self.lexer.peek().token == Token::KwdIf);

        let mut flags = AstFlags::EMPTY;

        let source_id = self.lexer.next().source_id;

        let condition_token = self.parse_expr(false);

        let mut lexeme = self.lexer.peek();

        if lexeme.token == Token::KwdWhere {
            flags |= AstFlags::IF_HAS_WHERE;

            self.parse_where();

            lexeme = self.lexer.peek();
        }

        if lexeme.token == Token::KwdThen {
            self.lexer.skip();
        }

        self.parse_expr(true);

        if self.lexer.peek().token == Token::KwdElse {
            flags |= AstFlags::IF_HAS_ELSE;

            self.lexer.skip();

            self.parse_expr(true);
        }

        self.builder
            .push_node(condition_token, source_id, flags, AstTag::If)
    }

    fn try_parse_foreach(&mut self, source_id: SourceId) -> Option<AstBuilderToken> {
        let mut is_foreach = false;

        if is_definition_start(self.lexer.peek().token) {
            is_foreach = true;
        } else {
            let lookahead_1 = self.lexer.peek_n(1);

            if lookahead_1.token == Token::ThinArrowL {
                is_foreach = true;
            } else if lookahead_1.token == Token::Comma {
                if is_definition_start(self.lexer.peek_n(2).token) {
                    is_foreach = true;
                }

                if self.lexer.peek_n(3).token == Token::ThinArrowL {
                    is_foreach = true;
                }
            }
        }

        if !is_foreach {
            return None;
        }

        let mut flags = AstFlags::EMPTY;

        let first_child_token = self.parse_definition(true, true);

        let mut lexeme = self.lexer.peek();

        if lexeme.token == Token::Comma {
            flags |= AstFlags::FOREACH_HAS_INDEX;

            self.lexer.skip();

            self.parse_definition(true, true);

            lexeme = self.lexer.peek();
        }

        if lexeme.token != Token::ThinArrowL {
            self.error(
                lexeme.source_id,
                format_args!(
                    "Expected '<-' after for-each loop variables but got '{}'",
                    lexeme.token.name()
                ),
            );
        }

        self.lexer.skip();

        self.parse_expr(false);

        let mut lexeme = self.lexer.peek();

        if lexeme.token == Token::KwdWhere {
            flags |= AstFlags::FOREACH_HAS_WHERE;

            self.parse_where();

            lexeme = self.lexer.peek();
        }

        if lexeme.token == Token::KwdDo {
            self.lexer.skip();
        }

        self.parse_expr(true);

        if self.lexer.peek().token == Token::KwdFinally {
            flags |= AstFlags::FOREACH_HAS_FINALLY;

            self.lexer.skip();

            self.parse_expr(true);
        }

        Some(
            self.builder
                .push_node(first_child_token, source_id, flags, AstTag::ForEach),
        )
    }

    fn parse_for(&mut self) -> AstBuilderToken {
        debug_assert!(self.lexer.peek().token == Token::KwdFor);

        let mut flags = AstFlags::EMPTY;

        let source_id = self.lexer.next().source_id;

        if let Some(foreach_token) = self.try_parse_foreach(source_id) {
            return foreach_token;
        }

        let first_child_token = self.parse_expr(false);

        let mut lexeme = self.lexer.peek();

        if lexeme.token == Token::Comma {
            flags |= AstFlags::FOR_HAS_STEP;

            self.lexer.skip();

            self.parse_expr(true);

            lexeme = self.lexer.peek();
        }

        if lexeme.token == Token::KwdWhere {
            flags |= AstFlags::FOR_HAS_WHERE;

            self.parse_where();

            lexeme = self.lexer.peek();
        }

        if lexeme.token == Token::KwdDo {
            self.lexer.skip();
        }

        self.parse_expr(true);

        if self.lexer.peek().token == Token::KwdFinally {
            flags |= AstFlags::FOR_HAS_FINALLY;

            self.lexer.skip();

            self.parse_expr(true);
        }

        self.builder
            .push_node(first_child_token, source_id, flags, AstTag::For)
    }

    fn parse_case(&mut self) -> AstBuilderToken {
        debug_assert!(self.lexer.peek().token == Token::KwdCase);

        let source_id = self.lexer.next().source_id;

        let first_child_token = self.parse_expr(false);

        let lexeme = self.lexer.next();

        if lexeme.token != Token::ThinArrowR {
            self.error(
                lexeme.source_id,
                format_args!(
                    "Expected '->' after case label expression but got '{}'",
                    lexeme.token.name()
                ),
            );
        }

        self.parse_expr(true);

        self.builder
            .push_node(first_child_token, source_id, AstFlags::EMPTY, AstTag::Case)
    }

    fn parse_switch(&mut self) -> AstBuilderToken {
        debug_assert!(self.lexer.peek().token == Token::KwdSwitch);

        let mut flags = AstFlags::EMPTY;

        let source_id = self.lexer.next().source_id;

        let first_child_token = self.parse_expr(false);

        let mut lexeme = self.lexer.peek();

        if lexeme.token == Token::KwdWhere {
            flags |= AstFlags::SWITCH_HAS_WHERE;

            self.parse_where();

            lexeme = self.lexer.peek();
        }

        if lexeme.token != Token::KwdCase {
            self.error(
                lexeme.source_id,
                format_args!(
                    "Expected at least one 'case' after switch expression but got '{}'",
                    lexeme.token.name()
                ),
            );
        }

        loop {
            self.parse_case();

            if self.lexer.peek().token != Token::KwdCase {
                break;
            }
        }

        self.builder
            .push_node(first_child_token, source_id, flags, AstTag::Switch)
    }

    fn parse_expects(&mut self) -> AstBuilderToken {
        debug_assert!(self.lexer.peek().token == Token::KwdExpects);

        let source_id = self.lexer.next().source_id;

        let first_child_token = self.parse_expr(false);

        while self.lexer.peek().token == Token::Comma {
            self.lexer.skip();

            self.parse_expr(false);
        }

        self.builder.push_node(
            first_child_token,
            source_id,
            AstFlags::EMPTY,
            AstTag::Expects,
        )
    }

    fn parse_ensures(&mut self) -> AstBuilderToken {
        debug_assert!(self.lexer.peek().token == Token::KwdEnsures);

        let source_id = self.lexer.next().source_id;

        let first_child_token = self.parse_expr(false);

        while self.lexer.peek().token == Token::Comma {
            self.lexer.skip();

            self.parse_expr(false);
        }

        self.builder.push_node(
            first_child_token,
            source_id,
            AstFlags::EMPTY,
            AstTag::Ensures,
        )
    }

    fn parse_func(&mut self) -> AstBuilderToken {
        let mut flags = AstFlags::EMPTY;

        let lexeme = self.lexer.next();

        let func_source_id = lexeme.source_id;

        if lexeme.token == Token::KwdProc {
            flags |= AstFlags::FUNC_IS_PROC;
        } else if lexeme.token != Token::KwdFunc {
            self.error(
                lexeme.source_id,
                format_args!(
                    "Expected 'func' or 'proc' but got '{}'",
                    lexeme.token.name()
                ),
            );
        }

        let lexeme = self.lexer.next();

        let parameter_list_source_id = lexeme.source_id;

        if lexeme.token != Token::ParenL {
            self.error(
                lexeme.source_id,
                format_args!(
                    "Expected '(' after '{}' but got '{}'",
                    if flags.contains(AstFlags::FUNC_IS_PROC) {
                        "proc"
                    } else {
                        "func"
                    },
                    lexeme.token.name()
                ),
            );
        }

        let mut lexeme = self.lexer.peek();

        let mut first_parameter_token = AstBuilderToken::NO_CHILDREN;

        while lexeme.token != Token::ParenR {
            let parameter_token = self.parse_definition(true, true);

            if first_parameter_token == AstBuilderToken::NO_CHILDREN {
                first_parameter_token = parameter_token;
            }

            lexeme = self.lexer.peek();

            if lexeme.token == Token::Comma {
                self.lexer.skip();

                lexeme = self.lexer.peek();
            } else if lexeme.token != Token::ParenR {
                self.error(
                    lexeme.source_id,
                    format_args!(
                        "Expected ',' or ')' after function parameter definition but got '{}'",
                        lexeme.token.name()
                    ),
                );
            }
        }

        let first_child_token = self.builder.push_node(
            first_parameter_token,
            parameter_list_source_id,
            AstFlags::EMPTY,
            AstTag::ParameterList,
        );

        self.lexer.skip();

        let mut lexeme = self.lexer.peek();

        if lexeme.token == Token::ThinArrowR {
            flags |= AstFlags::FUNC_HAS_RETURN_TYPE;

            self.lexer.skip();

            self.parse_expr(false);

            lexeme = self.lexer.peek();
        }

        if lexeme.token == Token::KwdExpects {
            flags |= AstFlags::FUNC_HAS_EXPECTS;

            self.parse_expects();

            lexeme = self.lexer.peek();
        }

        if lexeme.token == Token::KwdEnsures {
            flags |= AstFlags::FUNC_HAS_ENSURES;

            self.parse_ensures();

            lexeme = self.lexer.peek();
        }

        if lexeme.token == Token::OpSet {
            flags |= AstFlags::FUNC_HAS_BODY;

            self.lexer.skip();

            self.parse_expr(true);
        }

        self.builder.push_node_with(
            first_child_token,
            func_source_id,
            flags,
            FuncData {
                signature_type_id: crate::types::TypeId::INVALID,
                return_type_id: crate::types::TypeId::INVALID,
            },
        )
    }

    fn parse_trait(&mut self) -> AstBuilderToken {
        debug_assert!(self.lexer.peek().token == Token::KwdTrait);

        let mut flags = AstFlags::EMPTY;

        let source_id = self.lexer.next().source_id;

        let lexeme = self.lexer.next();

        if lexeme.token != Token::ParenL {
            self.error(
                lexeme.source_id,
                format_args!("Expected '(' after 'trait' but got '{}'", lexeme.token.name()),
            );
        }

        let mut lexeme = self.lexer.peek();

        let mut first_child_token = AstBuilderToken::NO_CHILDREN;

        while lexeme.token != Token::ParenR {
            let parameter_token = self.parse_definition(true, true);

            if first_child_token == AstBuilderToken::NO_CHILDREN {
                first_child_token = parameter_token;
            }

            lexeme = self.lexer.peek();

            if lexeme.token == Token::Comma {
                self.lexer.skip();

                lexeme = self.lexer.peek();
            } else if lexeme.token != Token::ParenR {
                self.error(
                    lexeme.source_id,
                    format_args!(
                        "Expected ',' or ')' after trait parameter definition but got '{}'",
                        lexeme.token.name()
                    ),
                );
            }
        }

        self.lexer.skip();

        let mut lexeme = self.lexer.peek();

        if lexeme.token == Token::KwdExpects {
            flags |= AstFlags::TRAIT_HAS_EXPECTS;

            let expects_token = self.parse_expects();

            if first_child_token == AstBuilderToken::NO_CHILDREN {
                first_child_token = expects_token;
            }

            lexeme = self.lexer.peek();
        }

        if lexeme.token != Token::OpSet {
            if flags.contains(AstFlags::TRAIT_HAS_EXPECTS) {
                self.error(
                    lexeme.source_id,
                    format_args!(
                        "Expected '=' after trait expects clause but got '{}'",
                        lexeme.token.name()
                    ),
                );
            } else {
                self.error(
                    lexeme.source_id,
                    format_args!(
                        "Expected '=' or 'expects' after trait parameter list but got '{}'",
                        lexeme.token.name()
                    ),
                );
            }
        }

        self.lexer.skip();

        let body_token = self.parse_expr(true);

        if first_child_token == AstBuilderToken::NO_CHILDREN {
            first_child_token = body_token;
        }

        self.builder
            .push_node(first_child_token, source_id, flags, AstTag::Trait)
    }

    fn parse_impl(&mut self) -> AstBuilderToken {
        debug_assert!(self.lexer.peek().token == Token::KwdImpl);

        let mut flags = AstFlags::EMPTY;

        let source_id = self.lexer.next().source_id;

        let first_child_token = self.parse_expr(false);

        let mut lexeme = self.lexer.peek();

        if lexeme.token == Token::KwdExpects {
            flags |= AstFlags::IMPL_HAS_EXPECTS;

            self.parse_expects();

            lexeme = self.lexer.peek();
        }

        if lexeme.token != Token::OpSet {
            if flags.contains(AstFlags::IMPL_HAS_EXPECTS) {
                self.error(
                    lexeme.source_id,
                    format_args!(
                        "Expected '=' after impl expects clause but got '{}'",
                        lexeme.token.name()
                    ),
                );
            } else {
                self.error(
                    lexeme.source_id,
                    format_args!(
                        "Expected '=' or 'expects' after impl target but got '{}'",
                        lexeme.token.name()
                    ),
                );
            }
        }

        self.lexer.skip();

        self.parse_expr(true);

        self.builder
            .push_node(first_child_token, source_id, flags, AstTag::Impl)
    }

    fn parse_definition_or_impl(&mut self) -> (AstBuilderToken, bool) {
        let lexeme = self.lexer.peek();

        if is_definition_start(lexeme.token) {
            (self.parse_definition(false, false), true)
        } else if lexeme.token == Token::KwdImpl {
            (self.parse_impl(), false)
        } else {
            self.error(
                lexeme.source_id,
                format_args!(
                    "Expected definition or impl but got '{}'",
                    lexeme.token.name()
                ),
            )
        }
    }

    // Expression parsing.

    fn parse_expr(&mut self, allow_complex: bool) -> AstBuilderToken {
        let mut lexeme = self.lexer.peek();

        let mut stack = OperatorStack::new(lexeme.source_id);

        let mut expecting_operand = true;

        loop {
            if expecting_operand {
                match lexeme.token {
                    Token::Ident => {
                        expecting_operand = false;

                        let value_token = self.builder.push_node_with(
                            AstBuilderToken::NO_CHILDREN,
                            lexeme.source_id,
                            AstFlags::EMPTY,
                            ValIdentifierData {
                                identifier_id: lexeme.identifier_id(),
                            },
                        );

                        self.push_operand(&mut stack, value_token);
                    }

                    Token::LitString => {
                        expecting_operand = false;

                        let value_token = self.builder.push_node_with(
                            AstBuilderToken::NO_CHILDREN,
                            lexeme.source_id,
                            AstFlags::EMPTY,
                            ValStringData {
                                string_id: lexeme.identifier_id(),
                            },
                        );

                        self.push_operand(&mut stack, value_token);
                    }

                    Token::LitFloat => {
                        expecting_operand = false;

                        let value_token = self.builder.push_node_with(
                            AstBuilderToken::NO_CHILDREN,
                            lexeme.source_id,
                            AstFlags::EMPTY,
                            ValFloatData {
                                value: lexeme.float_value(),
                            },
                        );

                        self.push_operand(&mut stack, value_token);
                    }

                    Token::LitInteger => {
                        expecting_operand = false;

                        let value_token = self.builder.push_node_with(
                            AstBuilderToken::NO_CHILDREN,
                            lexeme.source_id,
                            AstFlags::EMPTY,
                            ValIntegerData {
                                value: lexeme.integer_value(),
                            },
                        );

                        self.push_operand(&mut stack, value_token);
                    }

                    Token::LitChar => {
                        expecting_operand = false;

                        let value_token = self.builder.push_node_with(
                            AstBuilderToken::NO_CHILDREN,
                            lexeme.source_id,
                            AstFlags::EMPTY,
                            ValCharData {
                                codepoint: lexeme.integer_value() as u32,
                            },
                        );

                        self.push_operand(&mut stack, value_token);
                    }

                    Token::Wildcard => {
                        expecting_operand = false;

                        let value_token = self.builder.push_node(
                            AstBuilderToken::NO_CHILDREN,
                            lexeme.source_id,
                            AstFlags::EMPTY,
                            AstTag::Wildcard,
                        );

                        self.push_operand(&mut stack, value_token);
                    }

                    Token::Builtin => {
                        expecting_operand = false;

                        let value_token = self.builder.push_node(
                            AstBuilderToken::NO_CHILDREN,
                            lexeme.source_id,
                            AstFlags(lexeme.builtin() as u8),
                            AstTag::Builtin,
                        );

                        self.push_operand(&mut stack, value_token);
                    }

                    Token::CompositeInitializer => {
                        expecting_operand = false;

                        let source_id = lexeme.source_id;

                        self.lexer.skip();

                        lexeme = self.lexer.peek();

                        let mut first_child_token = AstBuilderToken::NO_CHILDREN;

                        while lexeme.token != Token::CurlyR {
                            let curr_token = self.parse_expr(true);

                            if first_child_token == AstBuilderToken::NO_CHILDREN {
                                first_child_token = curr_token;
                            }

                            lexeme = self.lexer.peek();

                            if lexeme.token == Token::Comma {
                                self.lexer.skip();

                                lexeme = self.lexer.peek();
                            } else if lexeme.token != Token::CurlyR {
                                self.error(
                                    lexeme.source_id,
                                    format_args!(
                                        "Expected '}}' or ',' after composite initializer argument but got '{}'",
                                        lexeme.token.name()
                                    ),
                                );
                            }
                        }

                        let composite_token = self.builder.push_node(
                            first_child_token,
                            source_id,
                            AstFlags::EMPTY,
                            AstTag::CompositeInitializer,
                        );

                        self.push_operand(&mut stack, composite_token);
                    }

                    Token::ArrayInitializer => {
                        expecting_operand = false;

                        let source_id = lexeme.source_id;

                        self.lexer.skip();

                        lexeme = self.lexer.peek();

                        let mut first_child_token = AstBuilderToken::NO_CHILDREN;

                        while lexeme.token != Token::BracketR {
                            let curr_token = self.parse_expr(true);

                            if first_child_token == AstBuilderToken::NO_CHILDREN {
                                first_child_token = curr_token;
                            }

                            lexeme = self.lexer.peek();

                            if lexeme.token == Token::Comma {
                                self.lexer.skip();

                                lexeme = self.lexer.peek();
                            } else if lexeme.token != Token::BracketR {
                                self.error(
                                    lexeme.source_id,
                                    format_args!(
                                        "Expected ']' or ',' after array initializer argument but got '{}'",
                                        lexeme.token.name()
                                    ),
                                );
                            }
                        }

                        let array_token = self.builder.push_node(
                            first_child_token,
                            source_id,
                            AstFlags::EMPTY,
                            AstTag::ArrayInitializer,
                        );

                        self.push_operand(&mut stack, array_token);
                    }

                    Token::BracketL => {
                        // Array type constructor `[count]element`. The
                        // count becomes an operand and the constructor
                        // a pending operator, so that the element
                        // expression that follows ends up as the
                        // count's sibling.
                        let source_id = lexeme.source_id;

                        self.lexer.skip();

                        let count_token = self.parse_expr(false);

                        lexeme = self.lexer.peek();

                        if lexeme.token != Token::BracketR {
                            self.error(
                                lexeme.source_id,
                                format_args!(
                                    "Expected ']' after array type's size expression, but got '{}'",
                                    lexeme.token.name()
                                ),
                            );
                        }

                        self.push_operand(&mut stack, count_token);

                        self.push_operator(
                            &mut stack,
                            OperatorDescWithSource {
                                desc: binary(AstTag::OpTypeArray, 2, false),
                                source_id,
                            },
                        );
                    }

                    Token::CurlyL => {
                        expecting_operand = false;

                        let source_id = lexeme.source_id;

                        self.lexer.skip();

                        lexeme = self.lexer.peek();

                        let mut first_child_token = AstBuilderToken::NO_CHILDREN;

                        let mut definition_count = 0u32;

                        while lexeme.token != Token::CurlyR {
                            let (curr_token, is_definition) = self.parse_top_level_expr(false);

                            if is_definition {
                                definition_count += 1;
                            }

                            if first_child_token == AstBuilderToken::NO_CHILDREN {
                                first_child_token = curr_token;
                            }

                            lexeme = self.lexer.peek();
                        }

                        let block_token = self.builder.push_node_with(
                            first_child_token,
                            source_id,
                            AstFlags::EMPTY,
                            BlockData {
                                definition_count,
                                scope_type_id: crate::types::TypeId::INVALID,
                            },
                        );

                        self.push_operand(&mut stack, block_token);
                    }

                    Token::KwdIf => {
                        expecting_operand = false;

                        let if_token = self.parse_if();

                        self.push_operand(&mut stack, if_token);

                        lexeme = self.lexer.peek();

                        continue;
                    }

                    Token::KwdFor => {
                        expecting_operand = false;

                        let for_token = self.parse_for();

                        self.push_operand(&mut stack, for_token);

                        lexeme = self.lexer.peek();

                        continue;
                    }

                    Token::KwdSwitch => {
                        expecting_operand = false;

                        let switch_token = self.parse_switch();

                        self.push_operand(&mut stack, switch_token);

                        lexeme = self.lexer.peek();

                        continue;
                    }

                    Token::KwdFunc | Token::KwdProc => {
                        expecting_operand = false;

                        let func_token = self.parse_func();

                        self.push_operand(&mut stack, func_token);

                        lexeme = self.lexer.peek();

                        continue;
                    }

                    Token::KwdTrait => {
                        expecting_operand = false;

                        let trait_token = self.parse_trait();

                        self.push_operand(&mut stack, trait_token);

                        lexeme = self.lexer.peek();

                        continue;
                    }

                    Token::KwdImpl => {
                        expecting_operand = false;

                        let impl_token = self.parse_impl();

                        self.push_operand(&mut stack, impl_token);

                        lexeme = self.lexer.peek();

                        continue;
                    }

                    _ => {
                        // Unary operator.
                        let source_id = lexeme.source_id;

                        let ordinal = lexeme.token.ordinal();

                        let lo = Token::ParenL.ordinal();

                        let hi = Token::OpAdd.ordinal();

                        if ordinal < lo || ordinal > hi {
                            self.error(
                                lexeme.source_id,
                                format_args!(
                                    "Expected operand or unary operator but got '{}'",
                                    lexeme.token.name()
                                ),
                            );
                        }

                        let mut op = UNARY_OPERATOR_DESCS[usize::from(ordinal - lo)];

                        self.lexer.skip();

                        lexeme = self.lexer.peek();

                        // Type constructors take an optional `mut`
                        // modifier that keeps the pre-set flag bit.
                        if op.node_flags == AstFlags::TYPE_IS_MUT {
                            if lexeme.token == Token::KwdMut {
                                self.lexer.skip();

                                lexeme = self.lexer.peek();
                            } else {
                                op.node_flags = AstFlags::EMPTY;
                            }
                        }

                        self.push_operator(&mut stack, OperatorDescWithSource { desc: op, source_id });

                        continue;
                    }
                }
            } else {
                match lexeme.token {
                    Token::ParenL => {
                        // Function call.
                        debug_assert!(stack.operand_count != 0);

                        let source_id = lexeme.source_id;

                        self.pop_to_precedence(&mut stack, 1, true);

                        self.lexer.skip();

                        lexeme = self.lexer.peek();

                        while lexeme.token != Token::ParenR {
                            let _ = self.parse_top_level_expr(true);

                            lexeme = self.lexer.peek();

                            if lexeme.token == Token::Comma {
                                self.lexer.skip();

                                lexeme = self.lexer.peek();
                            } else if lexeme.token != Token::ParenR {
                                self.error(
                                    lexeme.source_id,
                                    format_args!(
                                        "Expected ')' or ',' after function argument but got '{}'",
                                        lexeme.token.name()
                                    ),
                                );
                            }
                        }

                        let call_token = self.builder.push_node(
                            stack.operand_tokens[stack.operand_count - 1],
                            source_id,
                            AstFlags::EMPTY,
                            AstTag::Call,
                        );

                        stack.operand_tokens[stack.operand_count - 1] = call_token;
                    }

                    Token::ParenR => {
                        if !self.pop_to_precedence(&mut stack, 10, false) {
                            // No opening parenthesis on the stack: the
                            // parenthesis belongs to the caller.
                            debug_assert!(stack.operand_count == 1);

                            return stack.operand_tokens[stack.operand_count - 1];
                        }

                        self.remove_lparen(&mut stack);
                    }

                    Token::BracketL => {
                        // Array index.
                        debug_assert!(stack.operand_count != 0);

                        let source_id = lexeme.source_id;

                        self.pop_to_precedence(&mut stack, 1, true);

                        self.lexer.skip();

                        self.parse_expr(false);

                        lexeme = self.lexer.peek();

                        if lexeme.token != Token::BracketR {
                            self.error(
                                lexeme.source_id,
                                format_args!(
                                    "Expected ']' after array index expression, but got '{}'",
                                    lexeme.token.name()
                                ),
                            );
                        }

                        let index_token = self.builder.push_node(
                            stack.operand_tokens[stack.operand_count - 1],
                            source_id,
                            AstFlags::EMPTY,
                            AstTag::OpArrayIndex,
                        );

                        stack.operand_tokens[stack.operand_count - 1] = index_token;
                    }

                    Token::KwdCatch => {
                        let source_id = lexeme.source_id;

                        let mut flags = AstFlags::EMPTY;

                        self.pop_to_precedence(&mut stack, 1, true);

                        self.lexer.skip();

                        lexeme = self.lexer.peek();

                        if is_definition_start(lexeme.token)
                            || self.lexer.peek_n(1).token == Token::ThinArrowR
                        {
                            flags |= AstFlags::CATCH_HAS_DEFINITION;

                            self.parse_definition(true, true);

                            let lexeme = self.lexer.next();

                            if lexeme.token != Token::ThinArrowR {
                                self.error(
                                    lexeme.source_id,
                                    format_args!(
                                        "Expected '->' after inbound definition in catch, but got '{}'",
                                        lexeme.token.name()
                                    ),
                                );
                            }
                        }

                        self.parse_expr(false);

                        let catch_token = self.builder.push_node(
                            stack.operand_tokens[stack.operand_count - 1],
                            source_id,
                            flags,
                            AstTag::Catch,
                        );

                        stack.operand_tokens[stack.operand_count - 1] = catch_token;

                        lexeme = self.lexer.peek();

                        continue;
                    }

                    _ => {
                        // Binary operator, or the end of the expression.
                        let ordinal = lexeme.token.ordinal();

                        let lo = Token::OpMemberOrRef.ordinal();

                        let hi = Token::OpSetShr.ordinal();

                        if ordinal < lo
                            || ordinal > hi
                            || (!allow_complex && lexeme.token == Token::OpSet)
                        {
                            break;
                        }

                        let op = BINARY_OPERATOR_DESCS[usize::from(ordinal - lo)];

                        self.push_operator(
                            &mut stack,
                            OperatorDescWithSource {
                                desc: op,
                                source_id: lexeme.source_id,
                            },
                        );

                        expecting_operand = op.is_binary;
                    }
                }
            }

            self.lexer.skip();

            lexeme = self.lexer.peek();
        }

        self.pop_remaining(&mut stack)
    }

    fn parse_file(&mut self, source_id_base: u32) {
        let mut first_child_token = AstBuilderToken::NO_CHILDREN;

        let mut definition_count = 0u32;

        loop {
            let lexeme = self.lexer.peek();

            if lexeme.token == Token::EndOfSource {
                break;
            }

            let (curr_token, is_definition) = self.parse_definition_or_impl();

            if is_definition {
                definition_count += 1;
            }

            if first_child_token == AstBuilderToken::NO_CHILDREN {
                first_child_token = curr_token;
            }
        }

        self.builder.push_node_with(
            first_child_token,
            SourceId(source_id_base),
            AstFlags::EMPTY,
            FileData {
                definition_count,
                scope_type_id: crate::types::TypeId::INVALID,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::dump::dump_text;

    fn parse_to_pool(text: &str) -> (AstPool, AstNodeId, IdentifierPool) {
        let mut identifiers = IdentifierPool::new();
        let errors = ErrorSink::new();
        let reader = SourceReader::new();
        let mut asts = AstPool::new();

        let mut parser = Parser::new();

        let root = parser.parse(
            text.as_bytes(),
            1,
            true,
            &mut identifiers,
            &errors,
            &reader,
            &mut asts,
        );

        (asts, root, identifiers)
    }

    fn dumped(text: &str) -> String {
        let (asts, root, identifiers) = parse_to_pool(text);

        dump_text(&asts, &identifiers, root)
    }

    #[test]
    fn precedence_binds_multiplication_tighter_than_addition() {
        let dump = dumped("let x = 1 + 2 * 3");

        assert_eq!(
            dump,
            "File 1 definitions\n\
             \x20 Definition x\n\
             \x20   OpAdd\n\
             \x20     LitInteger 1\n\
             \x20     OpMul\n\
             \x20       LitInteger 2\n\
             \x20       LitInteger 3\n"
        );
    }

    #[test]
    fn left_associative_operators_group_leftwards() {
        let dump = dumped("let x = 1 - 2 - 3");

        assert_eq!(
            dump,
            "File 1 definitions\n\
             \x20 Definition x\n\
             \x20   OpSub\n\
             \x20     OpSub\n\
             \x20       LitInteger 1\n\
             \x20       LitInteger 2\n\
             \x20     LitInteger 3\n"
        );
    }

    #[test]
    fn parentheses_override_precedence() {
        let dump = dumped("let x = (1 + 2) * 3");

        assert_eq!(
            dump,
            "File 1 definitions\n\
             \x20 Definition x\n\
             \x20   OpMul\n\
             \x20     OpAdd\n\
             \x20       LitInteger 1\n\
             \x20       LitInteger 2\n\
             \x20     LitInteger 3\n"
        );
    }

    #[test]
    fn definition_modifiers_set_flags() {
        let (asts, root, _) = parse_to_pool("pub mut counter = 0");

        let definition = asts.first_child_of(root);

        assert_eq!(asts.tag(definition), AstTag::Definition);
        assert!(asts.has_flag(definition, AstFlags::DEFINITION_IS_PUB));
        assert!(asts.has_flag(definition, AstFlags::DEFINITION_IS_MUT));
        assert!(!asts.has_flag(definition, AstFlags::DEFINITION_IS_GLOBAL));
        assert!(!asts.has_flag(definition, AstFlags::DEFINITION_HAS_TYPE));
    }

    #[test]
    fn typed_definition_carries_type_then_value() {
        let dump = dumped("let x : u32 = 7");

        assert_eq!(
            dump,
            "File 1 definitions\n\
             \x20 Definition x\n\
             \x20   Identifier u32\n\
             \x20   LitInteger 7\n"
        );
    }

    #[test]
    fn calls_attach_arguments_after_the_callee() {
        let dump = dumped("let x = f(1, .name = 2)");

        assert_eq!(
            dump,
            "File 1 definitions\n\
             \x20 Definition x\n\
             \x20   Call\n\
             \x20     Identifier f\n\
             \x20     LitInteger 1\n\
             \x20     OpSet\n\
             \x20       UOpImpliedMember\n\
             \x20         Identifier name\n\
             \x20       LitInteger 2\n"
        );
    }

    #[test]
    fn member_calls_bind_the_member_first() {
        let dump = dumped("let x = a.b(1)");

        assert_eq!(
            dump,
            "File 1 definitions\n\
             \x20 Definition x\n\
             \x20   Call\n\
             \x20     OpMember\n\
             \x20       Identifier a\n\
             \x20       Identifier b\n\
             \x20     LitInteger 1\n"
        );
    }

    #[test]
    fn blocks_count_definitions_and_keep_order() {
        let (asts, root, _) = parse_to_pool("let x = { let a = 1\n a + 1 }");

        let definition = asts.first_child_of(root);
        let block = asts.first_child_of(definition);

        assert_eq!(asts.tag(block), AstTag::Block);

        let data: BlockData = asts.attachment(block);

        assert_eq!(data.definition_count, 1);

        let mut it = asts.direct_children_of(block);

        assert_eq!(asts.tag(it.next(&asts).unwrap()), AstTag::Definition);
        assert_eq!(asts.tag(it.next(&asts).unwrap()), AstTag::OpAdd);
        assert!(it.next(&asts).is_none());
    }

    #[test]
    fn if_with_else_sets_the_flag() {
        let (asts, root, _) = parse_to_pool("let x = if a then 1 else 2");

        let definition = asts.first_child_of(root);
        let if_node = asts.first_child_of(definition);

        assert_eq!(asts.tag(if_node), AstTag::If);
        assert!(asts.has_flag(if_node, AstFlags::IF_HAS_ELSE));

        let mut it = asts.direct_children_of(if_node);

        assert_eq!(asts.tag(it.next(&asts).unwrap()), AstTag::ValIdentifier);
        assert_eq!(asts.tag(it.next(&asts).unwrap()), AstTag::ValInteger);
        assert_eq!(asts.tag(it.next(&asts).unwrap()), AstTag::ValInteger);
        assert!(it.next(&asts).is_none());
    }

    #[test]
    fn type_constructors_take_an_optional_mut() {
        let (asts, root, _) = parse_to_pool("let p = * mut u8\nlet q = *u8");

        let first_definition = asts.first_child_of(root);
        let mutable_ptr = asts.first_child_of(first_definition);

        assert_eq!(asts.tag(mutable_ptr), AstTag::UOpTypePtr);
        assert!(asts.has_flag(mutable_ptr, AstFlags::TYPE_IS_MUT));

        let second_definition = asts.next_sibling_of(first_definition);
        let const_ptr = asts.first_child_of(second_definition);

        assert_eq!(asts.tag(const_ptr), AstTag::UOpTypePtr);
        assert!(!asts.has_flag(const_ptr, AstFlags::TYPE_IS_MUT));
    }

    #[test]
    fn array_type_wraps_count_then_element() {
        let dump = dumped("let t = [4]u8");

        assert_eq!(
            dump,
            "File 1 definitions\n\
             \x20 Definition t\n\
             \x20   OpTypeArray\n\
             \x20     LitInteger 4\n\
             \x20     Identifier u8\n"
        );
    }

    #[test]
    fn func_with_parameters_return_type_and_body() {
        let (asts, root, _) = parse_to_pool("let f = func (a, b) -> T = a");

        let definition = asts.first_child_of(root);
        let func = asts.first_child_of(definition);

        assert_eq!(asts.tag(func), AstTag::Func);
        assert!(asts.has_flag(func, AstFlags::FUNC_HAS_RETURN_TYPE));
        assert!(asts.has_flag(func, AstFlags::FUNC_HAS_BODY));
        assert!(!asts.has_flag(func, AstFlags::FUNC_IS_PROC));

        let mut it = asts.direct_children_of(func);

        let parameter_list = it.next(&asts).unwrap();

        assert_eq!(asts.tag(parameter_list), AstTag::ParameterList);

        let mut params = asts.direct_children_of(parameter_list);

        assert_eq!(asts.tag(params.next(&asts).unwrap()), AstTag::Definition);
        assert_eq!(asts.tag(params.next(&asts).unwrap()), AstTag::Definition);
        assert!(params.next(&asts).is_none());

        assert_eq!(asts.tag(it.next(&asts).unwrap()), AstTag::ValIdentifier);
        assert_eq!(asts.tag(it.next(&asts).unwrap()), AstTag::ValIdentifier);
        assert!(it.next(&asts).is_none());
    }

    #[test]
    fn catch_takes_the_preceding_expression() {
        let dump = dumped("let x = f() catch y");

        assert_eq!(
            dump,
            "File 1 definitions\n\
             \x20 Definition x\n\
             \x20   Catch\n\
             \x20     Call\n\
             \x20       Identifier f\n\
             \x20     Identifier y\n"
        );
    }

    #[test]
    fn assignment_is_right_associative() {
        let dump = dumped("let x = { a = b = c }");

        assert_eq!(
            dump,
            "File 1 definitions\n\
             \x20 Definition x\n\
             \x20   Block 0 definitions\n\
             \x20     OpSet\n\
             \x20       Identifier a\n\
             \x20       OpSet\n\
             \x20         Identifier b\n\
             \x20         Identifier c\n"
        );
    }

    #[test]
    fn foreach_header_is_detected_by_lookahead() {
        let (asts, root, _) = parse_to_pool("let x = for v <- items do {}");

        let definition = asts.first_child_of(root);
        let foreach = asts.first_child_of(definition);

        assert_eq!(asts.tag(foreach), AstTag::ForEach);

        let mut it = asts.direct_children_of(foreach);

        assert_eq!(asts.tag(it.next(&asts).unwrap()), AstTag::Definition);
        assert_eq!(asts.tag(it.next(&asts).unwrap()), AstTag::ValIdentifier);
        assert_eq!(asts.tag(it.next(&asts).unwrap()), AstTag::Block);
        assert!(it.next(&asts).is_none());
    }
}
