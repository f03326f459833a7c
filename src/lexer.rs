//! Tokenization of evl source text.
//!
//! The lexer consumes a contiguous UTF-8 byte buffer and produces one
//! [`Lexeme`] at a time. Keywords are recognized through the identifier
//! pool's token slot, so a spelling is classified exactly once. The
//! lexer carries a one-token peek plus a remember/restore mechanism for
//! n-token lookahead (`peek_n`), which the parser uses to disambiguate
//! for-each headers and catch clauses.
//!
//! Builtin identifiers (`_` followed by identifier characters) are only
//! accepted when the file is flagged as part of the standard library;
//! in user files a leading underscore is an error unless it is the
//! wildcard `_` on its own.

use crate::diagnostics::ErrorSink;
use crate::identifiers::{IdentifierId, IdentifierPool};
use crate::source::{SourceId, SourceReader};

/// Maximum byte length of a string literal after escape expansion.
pub const MAX_STRING_LITERAL_BYTES: usize = 4096;

/// Token kinds, ordered so that the parser's operator tables can be
/// indexed by ordinal range: unary operators span `ParenL..=OpAdd`,
/// binary operators span `OpMemberOrRef..=OpSetShr`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Token {
    Empty = 0,
    KwdIf,                // if
    KwdThen,              // then
    KwdElse,              // else
    KwdFor,               // for
    KwdDo,                // do
    KwdFinally,           // finally
    KwdSwitch,            // switch
    KwdCase,              // case
    KwdFunc,              // func
    KwdProc,              // proc
    KwdTrait,             // trait
    KwdImpl,              // impl
    KwdWhere,             // where
    KwdExpects,           // expects
    KwdEnsures,           // ensures
    KwdCatch,             // catch
    KwdLet,               // let
    KwdPub,               // pub
    KwdMut,               // mut
    KwdGlobal,            // global
    KwdAuto,              // auto
    KwdUse,               // use
    KwdReturn,            // return
    KwdLeave,             // leave
    KwdYield,             // yield
    ArrayInitializer,     // .[
    CompositeInitializer, // .{
    BracketR,             // ]
    BracketL,             // [
    CurlyR,               // }
    CurlyL,               // {
    ParenR,               // )
    ParenL,               // (
    KwdEval,              // eval
    KwdTry,               // try
    KwdDefer,             // defer
    KwdDistinct,          // distinct
    UOpAddr,              // $
    UOpNot,               // ~
    UOpLogNot,            // !
    TypOptPtr,            // ?
    TypVar,               // ...
    TypTailArray,         // [...]
    TypMultiPtr,          // [*]
    TypOptMultiPtr,       // [?]
    TypSlice,             // []
    OpMemberOrRef,        // .
    OpMulOrTypPtr,        // *
    OpSub,                // -
    OpAdd,                // +
    OpDiv,                // /
    OpAddTC,              // +:
    OpSubTC,              // -:
    OpMulTC,              // *:
    OpMod,                // %
    UOpDeref,             // .*
    OpAnd,                // &
    OpOr,                 // |
    OpXor,                // ^
    OpShl,                // <<
    OpShr,                // >>
    OpLogAnd,             // &&
    OpLogOr,              // ||
    OpLt,                 // <
    OpGt,                 // >
    OpLe,                 // <=
    OpGe,                 // >=
    OpNe,                 // !=
    OpEq,                 // ==
    OpSet,                // =
    OpSetAdd,             // +=
    OpSetSub,             // -=
    OpSetMul,             // *=
    OpSetDiv,             // /=
    OpSetAddTC,           // +:=
    OpSetSubTC,           // -:=
    OpSetMulTC,           // *:=
    OpSetMod,             // %=
    OpSetAnd,             // &=
    OpSetOr,              // |=
    OpSetXor,             // ^=
    OpSetShl,             // <<=
    OpSetShr,             // >>=
    Colon,                // :
    Comma,                // ,
    ThinArrowL,           // <-
    ThinArrowR,           // ->
    WideArrowR,           // =>
    Pragma,               // #
    LitInteger,
    LitFloat,
    LitChar,
    LitString,
    Ident,
    Builtin,
    Wildcard, // _
    EndOfSource,
}

impl Token {
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Token::Empty => "<empty>",
            Token::KwdIf => "if",
            Token::KwdThen => "then",
            Token::KwdElse => "else",
            Token::KwdFor => "for",
            Token::KwdDo => "do",
            Token::KwdFinally => "finally",
            Token::KwdSwitch => "switch",
            Token::KwdCase => "case",
            Token::KwdFunc => "func",
            Token::KwdProc => "proc",
            Token::KwdTrait => "trait",
            Token::KwdImpl => "impl",
            Token::KwdWhere => "where",
            Token::KwdExpects => "expects",
            Token::KwdEnsures => "ensures",
            Token::KwdCatch => "catch",
            Token::KwdLet => "let",
            Token::KwdPub => "pub",
            Token::KwdMut => "mut",
            Token::KwdGlobal => "global",
            Token::KwdAuto => "auto",
            Token::KwdUse => "use",
            Token::KwdReturn => "return",
            Token::KwdLeave => "leave",
            Token::KwdYield => "yield",
            Token::ArrayInitializer => ".[",
            Token::CompositeInitializer => ".{",
            Token::BracketR => "]",
            Token::BracketL => "[",
            Token::CurlyR => "}",
            Token::CurlyL => "{",
            Token::ParenR => ")",
            Token::ParenL => "(",
            Token::KwdEval => "eval",
            Token::KwdTry => "try",
            Token::KwdDefer => "defer",
            Token::KwdDistinct => "distinct",
            Token::UOpAddr => "$",
            Token::UOpNot => "~",
            Token::UOpLogNot => "!",
            Token::TypOptPtr => "?",
            Token::TypVar => "...",
            Token::TypTailArray => "[...]",
            Token::TypMultiPtr => "[*]",
            Token::TypOptMultiPtr => "[?]",
            Token::TypSlice => "[]",
            Token::OpMemberOrRef => ".",
            Token::OpMulOrTypPtr => "*",
            Token::OpSub => "-",
            Token::OpAdd => "+",
            Token::OpDiv => "/",
            Token::OpAddTC => "+:",
            Token::OpSubTC => "-:",
            Token::OpMulTC => "*:",
            Token::OpMod => "%",
            Token::UOpDeref => ".*",
            Token::OpAnd => "&",
            Token::OpOr => "|",
            Token::OpXor => "^",
            Token::OpShl => "<<",
            Token::OpShr => ">>",
            Token::OpLogAnd => "&&",
            Token::OpLogOr => "||",
            Token::OpLt => "<",
            Token::OpGt => ">",
            Token::OpLe => "<=",
            Token::OpGe => ">=",
            Token::OpNe => "!=",
            Token::OpEq => "==",
            Token::OpSet => "=",
            Token::OpSetAdd => "+=",
            Token::OpSetSub => "-=",
            Token::OpSetMul => "*=",
            Token::OpSetDiv => "/=",
            Token::OpSetAddTC => "+:=",
            Token::OpSetSubTC => "-:=",
            Token::OpSetMulTC => "*:=",
            Token::OpSetMod => "%=",
            Token::OpSetAnd => "&=",
            Token::OpSetOr => "|=",
            Token::OpSetXor => "^=",
            Token::OpSetShl => "<<=",
            Token::OpSetShr => ">>=",
            Token::Colon => ":",
            Token::Comma => ",",
            Token::ThinArrowL => "<-",
            Token::ThinArrowR => "->",
            Token::WideArrowR => "=>",
            Token::Pragma => "#",
            Token::LitInteger => "integer literal",
            Token::LitFloat => "float literal",
            Token::LitChar => "character literal",
            Token::LitString => "string literal",
            Token::Ident => "identifier",
            Token::Builtin => "builtin",
            Token::Wildcard => "_",
            Token::EndOfSource => "end of source",
        }
    }
}

/// Compiler-provided builtin functions and constants, addressable as
/// `_name` in std-flagged files.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Builtin {
    Integer = 0,
    Type,
    Definition,
    CompInteger,
    CompFloat,
    CompString,
    TypeBuilder,
    True,
    Typeof,
    Returntypeof,
    Sizeof,
    Alignof,
    Strideof,
    Offsetof,
    Nameof,
    Import,
    CreateTypeBuilder,
    AddTypeMember,
    CompleteType,
}

pub const BUILTIN_COUNT: usize = 19;

const BUILTIN_NAMES: [&str; BUILTIN_COUNT] = [
    "integer",
    "type",
    "definition",
    "comp_integer",
    "comp_float",
    "comp_string",
    "type_builder",
    "true",
    "typeof",
    "returntypeof",
    "sizeof",
    "alignof",
    "strideof",
    "offsetof",
    "nameof",
    "import",
    "create_type_builder",
    "add_type_member",
    "complete_type",
];

impl Builtin {
    pub fn from_name(name: &[u8]) -> Option<Builtin> {
        BUILTIN_NAMES
            .iter()
            .position(|&n| n.as_bytes() == name)
            .map(|i| Builtin::from_ordinal(i as u8))
    }

    pub fn from_ordinal(ordinal: u8) -> Builtin {
        debug_assert!((ordinal as usize) < BUILTIN_COUNT);

        // Ordinals only ever originate from `Builtin as u8`.
        unsafe { std::mem::transmute(ordinal) }
    }

    pub fn name(self) -> &'static str {
        BUILTIN_NAMES[self as usize]
    }
}

/// A scanned token with its source position and payload bits.
///
/// The payload interpretation is keyed by the token: integer value for
/// `LitInteger`/`LitChar`, float bits for `LitFloat`, identifier id for
/// `Ident`/`LitString`, builtin ordinal for `Builtin`.
#[derive(Clone, Copy, Debug)]
pub struct Lexeme {
    pub token: Token,
    pub source_id: SourceId,
    bits: u64,
}

impl Lexeme {
    pub fn integer_value(&self) -> u64 {
        self.bits
    }

    pub fn float_value(&self) -> f64 {
        f64::from_bits(self.bits)
    }

    pub fn identifier_id(&self) -> IdentifierId {
        IdentifierId(self.bits as u32)
    }

    pub fn builtin(&self) -> Builtin {
        Builtin::from_ordinal(self.bits as u8)
    }
}

struct RawLexeme {
    token: Token,
    bits: u64,
}

impl RawLexeme {
    fn plain(token: Token) -> Self {
        Self { token, bits: 0 }
    }

    fn with_bits(token: Token, bits: u64) -> Self {
        Self { token, bits }
    }
}

pub struct Lexer<'a> {
    content: &'a [u8],
    curr: usize,
    peeked: Option<Lexeme>,
    token_start: SourceId,
    source_id_base: u32,
    is_std: bool,
    pub identifiers: &'a mut IdentifierPool,
    pub errors: &'a ErrorSink,
    pub reader: &'a SourceReader,
}

const INVALID_HEX: u8 = 255;

fn is_whitespace(c: u8) -> bool {
    c == b' ' || c == b'\t' || c == b'\n' || c == b'\r'
}

fn is_alphabetic(c: u8) -> bool {
    c.is_ascii_alphabetic()
}

fn is_numeric(c: u8) -> bool {
    c.is_ascii_digit()
}

fn is_identifier_continuation(c: u8) -> bool {
    is_alphabetic(c) || is_numeric(c) || c == b'_'
}

fn hex_value(c: u8) -> u8 {
    match c {
        b'a'..=b'f' => 10 + c - b'a',
        b'A'..=b'F' => 10 + c - b'A',
        b'0'..=b'9' => c - b'0',
        _ => INVALID_HEX,
    }
}

impl<'a> Lexer<'a> {
    pub fn new(
        content: &'a [u8],
        source_id_base: u32,
        is_std: bool,
        identifiers: &'a mut IdentifierPool,
        errors: &'a ErrorSink,
        reader: &'a SourceReader,
    ) -> Self {
        Self {
            content,
            curr: 0,
            peeked: None,
            token_start: SourceId(source_id_base),
            source_id_base,
            is_std,
            identifiers,
            errors,
            reader,
        }
    }

    /// Reports a fatal source error positioned at `source_id`.
    pub fn error(&self, source_id: SourceId, args: std::fmt::Arguments<'_>) -> ! {
        self.errors.source_error(self.reader, source_id, args)
    }

    fn error_here(&self, args: std::fmt::Arguments<'_>) -> ! {
        self.error(self.token_start, args)
    }

    /// Byte at `index`, with 0 standing in for end-of-input so that all
    /// scanning loops terminate without separate bounds checks.
    fn at(&self, index: usize) -> u8 {
        self.content.get(index).copied().unwrap_or(0)
    }

    pub fn next(&mut self) -> Lexeme {
        if let Some(lexeme) = self.peeked.take() {
            return lexeme;
        }

        self.skip_whitespace();

        self.token_start = SourceId(self.source_id_base + self.curr as u32);

        let raw = self.raw_next();

        Lexeme {
            token: raw.token,
            source_id: self.token_start,
            bits: raw.bits,
        }
    }

    pub fn peek(&mut self) -> Lexeme {
        if self.peeked.is_none() {
            let lexeme = self.next();
            self.peeked = Some(lexeme);
        }

        self.peeked.unwrap()
    }

    /// Lookahead of `n` tokens past the current peek, restoring the
    /// lexer state afterwards.
    pub fn peek_n(&mut self, n: u32) -> Lexeme {
        debug_assert!(n != 0);

        let remembered_peek = self.peek();

        let remembered_curr = self.curr;

        self.peeked = None;

        let mut result = remembered_peek;

        for _ in 0..n {
            result = self.next();
        }

        self.curr = remembered_curr;
        self.peeked = Some(remembered_peek);

        result
    }

    pub fn skip(&mut self) {
        let _ = self.next();
    }

    fn skip_block_comment(&mut self) {
        let comment_start = SourceId(self.source_id_base + self.curr as u32);

        self.curr += 2;

        let mut nesting = 1u32;

        while nesting != 0 {
            match self.at(self.curr) {
                b'/' if self.at(self.curr + 1) == b'*' => {
                    self.curr += 2;
                    nesting += 1;
                }
                b'*' if self.at(self.curr + 1) == b'/' => {
                    self.curr += 2;
                    nesting -= 1;
                }
                0 if self.curr >= self.content.len() => {
                    self.error(comment_start, format_args!("'/*' without matching '*/'"));
                }
                _ => self.curr += 1,
            }
        }
    }

    fn skip_whitespace(&mut self) {
        loop {
            while is_whitespace(self.at(self.curr)) {
                self.curr += 1;
            }

            if self.at(self.curr) == b'/' {
                if self.at(self.curr + 1) == b'/' {
                    self.curr += 2;

                    while self.at(self.curr) != b'\n' && self.curr < self.content.len() {
                        self.curr += 1;
                    }
                } else if self.at(self.curr + 1) == b'*' {
                    self.skip_block_comment();
                } else {
                    break;
                }
            } else {
                break;
            }
        }
    }

    fn scan_identifier(&mut self) -> RawLexeme {
        let token_begin = self.curr - 1;

        while is_identifier_continuation(self.at(self.curr)) {
            self.curr += 1;
        }

        let bytes = &self.content[token_begin..self.curr];

        let id = self.identifiers.id_from(bytes);

        let token = self.identifiers.token_from(id);

        RawLexeme::with_bits(
            token,
            if token == Token::Ident {
                u64::from(id.0)
            } else {
                0
            },
        )
    }

    fn scan_builtin(&mut self) -> RawLexeme {
        let token_begin = self.curr;

        while is_identifier_continuation(self.at(self.curr)) {
            self.curr += 1;
        }

        let name = &self.content[token_begin..self.curr];

        match Builtin::from_name(name) {
            Some(builtin) => RawLexeme::with_bits(Token::Builtin, builtin as u64),
            None => self.error_here(format_args!(
                "Unknown builtin '_{}'",
                String::from_utf8_lossy(name)
            )),
        }
    }

    fn scan_number_with_base(&mut self, base: u8) -> RawLexeme {
        let token_begin = self.curr;

        self.curr += 1;

        let mut value = 0u64;

        let (radix, digit_of): (u64, fn(u8) -> Option<u64>) = match base {
            b'b' => (2, |c| match c {
                b'0' | b'1' => Some(u64::from(c - b'0')),
                _ => None,
            }),
            b'o' => (8, |c| match c {
                b'0'..=b'7' => Some(u64::from(c - b'0')),
                _ => None,
            }),
            _ => {
                debug_assert!(base == b'x');

                (16, |c| {
                    let v = hex_value(c);
                    (v != INVALID_HEX).then_some(u64::from(v))
                })
            }
        };

        while let Some(digit) = digit_of(self.at(self.curr)) {
            value = match value.checked_mul(radix).and_then(|v| v.checked_add(digit)) {
                Some(v) => v,
                None => self.error_here(format_args!(
                    "Integer literal exceeds maximum currently supported value of 2^64-1"
                )),
            };

            self.curr += 1;
        }

        if self.curr == token_begin + 1 {
            self.error_here(format_args!(
                "Expected at least one digit in integer literal"
            ));
        }

        if is_identifier_continuation(self.at(self.curr)) {
            self.error_here(format_args!(
                "Unexpected character '{}' after integer literal",
                self.at(self.curr) as char
            ));
        }

        RawLexeme::with_bits(Token::LitInteger, value)
    }

    fn scan_number(&mut self, first: u8) -> RawLexeme {
        let token_begin = self.curr - 1;

        let mut value = u64::from(first - b'0');

        let mut max_exceeded = false;

        while is_numeric(self.at(self.curr)) {
            value = match value
                .checked_mul(10)
                .and_then(|v| v.checked_add(u64::from(self.at(self.curr) - b'0')))
            {
                Some(v) => v,
                None => {
                    max_exceeded = true;
                    0
                }
            };

            self.curr += 1;
        }

        if self.at(self.curr) == b'.' && is_numeric(self.at(self.curr + 1)) {
            self.curr += 1;

            while is_numeric(self.at(self.curr)) {
                self.curr += 1;
            }

            if self.at(self.curr) == b'e' {
                self.curr += 1;

                if self.at(self.curr) == b'+' || self.at(self.curr) == b'-' {
                    self.curr += 1;
                }

                while is_numeric(self.at(self.curr)) {
                    self.curr += 1;
                }
            }

            if is_alphabetic(self.at(self.curr)) || self.at(self.curr) == b'_' {
                self.error_here(format_args!(
                    "Unexpected character '{}' after float literal",
                    self.at(self.curr) as char
                ));
            }

            let text = std::str::from_utf8(&self.content[token_begin..self.curr])
                .expect("float literal bytes are ASCII");

            let float_value: f64 = match text.parse() {
                Ok(v) => v,
                Err(_) => self.error_here(format_args!("Malformed float literal")),
            };

            if float_value.is_infinite() {
                self.error_here(format_args!("Float literal exceeds maximum IEEE-754 value"));
            }

            RawLexeme::with_bits(Token::LitFloat, float_value.to_bits())
        } else {
            if self.at(self.curr) == b'.' {
                self.curr += 1;

                self.error_here(format_args!(
                    "Expected at least one digit after decimal point in float literal"
                ));
            }

            if max_exceeded {
                self.error_here(format_args!(
                    "Integer literal exceeds maximum currently supported value of 2^64-1"
                ));
            }

            if is_alphabetic(self.at(self.curr)) || self.at(self.curr) == b'_' {
                self.error_here(format_args!(
                    "Unexpected character '{}' after integer literal",
                    self.at(self.curr) as char
                ));
            }

            RawLexeme::with_bits(Token::LitInteger, value)
        }
    }

    fn scan_utf8_surrogates(&mut self, leader_value: u32, surrogate_count: u32) -> u32 {
        let mut codepoint = leader_value;

        for i in 0..surrogate_count {
            let surrogate = self.at(self.curr + 1 + i as usize);

            if surrogate & 0xC0 != 0x80 {
                self.error_here(format_args!(
                    "Expected utf-8 continuation code unit (0b10xxxxxx) but got 0x{:02X}",
                    surrogate
                ));
            }

            codepoint |= u32::from(surrogate & 0x3F) << (6 * (surrogate_count - i - 1));
        }

        self.curr += surrogate_count as usize + 1;

        codepoint
    }

    fn scan_utf8_char(&mut self) -> u32 {
        let first = self.at(self.curr);

        if first & 0x80 == 0 {
            self.curr += 1;

            u32::from(first)
        } else if first & 0xE0 == 0xC0 {
            self.scan_utf8_surrogates(u32::from(first & 0x1F) << 6, 1)
        } else if first & 0xF0 == 0xE0 {
            self.scan_utf8_surrogates(u32::from(first & 0x0F) << 12, 2)
        } else if first & 0xF8 == 0xF0 {
            self.scan_utf8_surrogates(u32::from(first & 0x07) << 18, 3)
        } else {
            self.error_here(format_args!(
                "Unexpected code unit 0x{:02X} in character literal; only utf-8 sources are supported",
                first
            ))
        }
    }

    fn scan_escape_char(&mut self) -> u32 {
        let escapee = self.at(self.curr + 1);

        let codepoint;

        match escapee {
            b'x' => {
                let hi = hex_value(self.at(self.curr + 2));

                if hi == INVALID_HEX {
                    self.error_here(format_args!(
                        "Expected two hexadecimal digits after escape '\\x' but got '{}' instead of the first digit",
                        self.at(self.curr + 2) as char
                    ));
                }

                let lo = hex_value(self.at(self.curr + 3));

                if lo == INVALID_HEX {
                    self.error_here(format_args!(
                        "Expected two hexadecimal digits after escape '\\x' but got '{}' instead of the second digit",
                        self.at(self.curr + 3) as char
                    ));
                }

                codepoint = u32::from(hi) * 16 + u32::from(lo);

                self.curr += 2;
            }

            b'X' => {
                let mut value = 0u32;

                for i in 0..6 {
                    let digit = hex_value(self.at(self.curr + 2 + i));

                    if digit == INVALID_HEX {
                        self.error_here(format_args!(
                            "Expected six hexadecimal digits after escape '\\X' but got '{}' instead of digit {}",
                            self.at(self.curr + 2 + i) as char,
                            i + 1
                        ));
                    }

                    value = value * 16 + u32::from(digit);
                }

                if value > 0x10FFFF {
                    self.error_here(format_args!(
                        "Codepoint 0x{:X} in escape '\\X' is greater than the maximum unicode codepoint U+10FFFF",
                        value
                    ));
                }

                codepoint = value;

                self.curr += 6;
            }

            b'u' => {
                let mut value = 0u32;

                for i in 0..4 {
                    let c = self.at(self.curr + 2 + i);

                    if !c.is_ascii_digit() {
                        self.error_here(format_args!(
                            "Expected four decimal digits after escape '\\u' but got '{}' instead of digit {}",
                            c as char,
                            i + 1
                        ));
                    }

                    value = value * 10 + u32::from(c - b'0');
                }

                codepoint = value;

                self.curr += 4;
            }

            b'\\' | b'\'' | b'"' => codepoint = u32::from(escapee),
            b'0' => codepoint = 0,
            b'a' => codepoint = 0x07,
            b'b' => codepoint = 0x08,
            b'f' => codepoint = 0x0C,
            b'n' => codepoint = u32::from(b'\n'),
            b'r' => codepoint = u32::from(b'\r'),
            b't' => codepoint = u32::from(b'\t'),
            b'v' => codepoint = 0x0B,

            _ => self.error_here(format_args!(
                "Unknown character escape '{}'",
                escapee as char
            )),
        }

        self.curr += 2;

        codepoint
    }

    fn scan_char(&mut self) -> RawLexeme {
        let codepoint = if self.at(self.curr) == b'\\' {
            self.scan_escape_char()
        } else {
            self.scan_utf8_char()
        };

        if self.at(self.curr) != b'\'' {
            self.error_here(format_args!(
                "Expected end of character literal (') but got '{}'",
                self.at(self.curr) as char
            ));
        }

        self.curr += 1;

        RawLexeme::with_bits(Token::LitChar, u64::from(codepoint))
    }

    fn scan_string(&mut self) -> RawLexeme {
        let mut buffer = Vec::with_capacity(32);

        loop {
            match self.at(self.curr) {
                b'"' => break,
                b'\\' => {
                    let codepoint = self.scan_escape_char();

                    match char::from_u32(codepoint) {
                        Some(c) => {
                            let mut utf8 = [0u8; 4];
                            buffer.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
                        }
                        None => self.error_here(format_args!(
                            "Escape denotes invalid codepoint 0x{:X}",
                            codepoint
                        )),
                    }
                }
                b'\n' => self.error_here(format_args!("String constant spans across newline")),
                0 if self.curr >= self.content.len() => {
                    self.error_here(format_args!("String constant is missing its closing '\"'"))
                }
                other => {
                    buffer.push(other);
                    self.curr += 1;
                }
            }

            if buffer.len() > MAX_STRING_LITERAL_BYTES {
                self.error_here(format_args!(
                    "String constant is longer than the supported maximum of {} bytes",
                    MAX_STRING_LITERAL_BYTES
                ));
            }
        }

        self.curr += 1;

        let id = self.identifiers.id_from(&buffer);

        RawLexeme::with_bits(Token::LitString, u64::from(id.0))
    }

    fn raw_next(&mut self) -> RawLexeme {
        let first = self.at(self.curr);

        self.curr += 1;

        let second = if first == 0 { 0 } else { self.at(self.curr) };

        match first {
            b'a'..=b'z' | b'A'..=b'Z' => self.scan_identifier(),

            b'0' if second == b'b' || second == b'o' || second == b'x' => {
                self.scan_number_with_base(second)
            }

            b'0'..=b'9' => self.scan_number(first),

            b'\'' => self.scan_char(),

            b'"' => self.scan_string(),

            b'_' => {
                if is_identifier_continuation(second) {
                    if !self.is_std {
                        self.error_here(format_args!("Illegal identifier starting with '_'"));
                    }

                    self.scan_builtin()
                } else {
                    RawLexeme::plain(Token::Wildcard)
                }
            }

            b'+' => {
                if second == b'=' {
                    self.curr += 1;
                    RawLexeme::plain(Token::OpSetAdd)
                } else if second == b':' {
                    if self.at(self.curr + 1) == b'=' {
                        self.curr += 2;
                        RawLexeme::plain(Token::OpSetAddTC)
                    } else {
                        self.curr += 1;
                        RawLexeme::plain(Token::OpAddTC)
                    }
                } else {
                    RawLexeme::plain(Token::OpAdd)
                }
            }

            b'-' => {
                if second == b'>' {
                    self.curr += 1;
                    RawLexeme::plain(Token::ThinArrowR)
                } else if second == b':' {
                    if self.at(self.curr + 1) == b'=' {
                        self.curr += 2;
                        RawLexeme::plain(Token::OpSetSubTC)
                    } else {
                        self.curr += 1;
                        RawLexeme::plain(Token::OpSubTC)
                    }
                } else if second == b'=' {
                    self.curr += 1;
                    RawLexeme::plain(Token::OpSetSub)
                } else {
                    RawLexeme::plain(Token::OpSub)
                }
            }

            b'*' => {
                if second == b'=' {
                    self.curr += 1;
                    RawLexeme::plain(Token::OpSetMul)
                } else if second == b':' {
                    if self.at(self.curr + 1) == b'=' {
                        self.curr += 2;
                        RawLexeme::plain(Token::OpSetMulTC)
                    } else {
                        self.curr += 1;
                        RawLexeme::plain(Token::OpMulTC)
                    }
                } else if second == b'/' {
                    self.error_here(format_args!("'*/' without previous matching '/*'"))
                } else {
                    RawLexeme::plain(Token::OpMulOrTypPtr)
                }
            }

            b'/' => {
                if second == b'=' {
                    self.curr += 1;
                    RawLexeme::plain(Token::OpSetDiv)
                } else {
                    RawLexeme::plain(Token::OpDiv)
                }
            }

            b'%' => {
                if second == b'=' {
                    self.curr += 1;
                    RawLexeme::plain(Token::OpSetMod)
                } else {
                    RawLexeme::plain(Token::OpMod)
                }
            }

            b'&' => {
                if second == b'&' {
                    self.curr += 1;
                    RawLexeme::plain(Token::OpLogAnd)
                } else if second == b'=' {
                    self.curr += 1;
                    RawLexeme::plain(Token::OpSetAnd)
                } else {
                    RawLexeme::plain(Token::OpAnd)
                }
            }

            b'|' => {
                if second == b'|' {
                    self.curr += 1;
                    RawLexeme::plain(Token::OpLogOr)
                } else if second == b'=' {
                    self.curr += 1;
                    RawLexeme::plain(Token::OpSetOr)
                } else {
                    RawLexeme::plain(Token::OpOr)
                }
            }

            b'^' => {
                if second == b'=' {
                    self.curr += 1;
                    RawLexeme::plain(Token::OpSetXor)
                } else {
                    RawLexeme::plain(Token::OpXor)
                }
            }

            b'<' => {
                if second == b'<' {
                    if self.at(self.curr + 1) == b'=' {
                        self.curr += 2;
                        RawLexeme::plain(Token::OpSetShl)
                    } else {
                        self.curr += 1;
                        RawLexeme::plain(Token::OpShl)
                    }
                } else if second == b'=' {
                    self.curr += 1;
                    RawLexeme::plain(Token::OpLe)
                } else if second == b'-' {
                    self.curr += 1;
                    RawLexeme::plain(Token::ThinArrowL)
                } else {
                    RawLexeme::plain(Token::OpLt)
                }
            }

            b'>' => {
                if second == b'>' {
                    if self.at(self.curr + 1) == b'=' {
                        self.curr += 2;
                        RawLexeme::plain(Token::OpSetShr)
                    } else {
                        self.curr += 1;
                        RawLexeme::plain(Token::OpShr)
                    }
                } else if second == b'=' {
                    self.curr += 1;
                    RawLexeme::plain(Token::OpGe)
                } else {
                    RawLexeme::plain(Token::OpGt)
                }
            }

            b'.' => {
                if second == b'.' {
                    if self.at(self.curr + 1) != b'.' {
                        self.error_here(format_args!("Unexpected token '..'"));
                    }

                    self.curr += 2;
                    RawLexeme::plain(Token::TypVar)
                } else if second == b'*' {
                    self.curr += 1;
                    RawLexeme::plain(Token::UOpDeref)
                } else if second == b'[' {
                    self.curr += 1;
                    RawLexeme::plain(Token::ArrayInitializer)
                } else if second == b'{' {
                    self.curr += 1;
                    RawLexeme::plain(Token::CompositeInitializer)
                } else {
                    RawLexeme::plain(Token::OpMemberOrRef)
                }
            }

            b'!' => {
                if second == b'=' {
                    self.curr += 1;
                    RawLexeme::plain(Token::OpNe)
                } else {
                    RawLexeme::plain(Token::UOpLogNot)
                }
            }

            b'=' => {
                if second == b'=' {
                    self.curr += 1;
                    RawLexeme::plain(Token::OpEq)
                } else if second == b'>' {
                    self.curr += 1;
                    RawLexeme::plain(Token::WideArrowR)
                } else {
                    RawLexeme::plain(Token::OpSet)
                }
            }

            b'$' => RawLexeme::plain(Token::UOpAddr),
            b'~' => RawLexeme::plain(Token::UOpNot),
            b'?' => RawLexeme::plain(Token::TypOptPtr),
            b':' => RawLexeme::plain(Token::Colon),
            b',' => RawLexeme::plain(Token::Comma),
            b'#' => RawLexeme::plain(Token::Pragma),

            b'[' => {
                if second == b'.'
                    && self.at(self.curr + 1) == b'.'
                    && self.at(self.curr + 2) == b'.'
                    && self.at(self.curr + 3) == b']'
                {
                    self.curr += 4;
                    RawLexeme::plain(Token::TypTailArray)
                } else if second == b'*' && self.at(self.curr + 1) == b']' {
                    self.curr += 2;
                    RawLexeme::plain(Token::TypMultiPtr)
                } else if second == b'?' && self.at(self.curr + 1) == b']' {
                    self.curr += 2;
                    RawLexeme::plain(Token::TypOptMultiPtr)
                } else if second == b']' {
                    self.curr += 1;
                    RawLexeme::plain(Token::TypSlice)
                } else {
                    RawLexeme::plain(Token::BracketL)
                }
            }

            b']' => RawLexeme::plain(Token::BracketR),
            b'{' => RawLexeme::plain(Token::CurlyL),
            b'}' => RawLexeme::plain(Token::CurlyR),
            b'(' => RawLexeme::plain(Token::ParenL),
            b')' => RawLexeme::plain(Token::ParenR),

            0 => {
                self.curr -= 1;

                if self.curr < self.content.len() {
                    self.error_here(format_args!("Null character in source file"));
                }

                RawLexeme::plain(Token::EndOfSource)
            }

            other => self.error_here(format_args!(
                "Unexpected character '{}' in source file",
                other as char
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn lex_all(text: &str) -> Vec<(Token, u64)> {
        let mut identifiers = IdentifierPool::new();
        let errors = ErrorSink::new();
        let reader = SourceReader::new();

        let mut lexer = Lexer::new(text.as_bytes(), 1, true, &mut identifiers, &errors, &reader);

        let mut out = Vec::new();

        loop {
            let lexeme = lexer.next();

            if lexeme.token == Token::EndOfSource {
                break;
            }

            out.push((lexeme.token, lexeme.bits));
        }

        out
    }

    fn lex_tokens(text: &str) -> Vec<Token> {
        lex_all(text).into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn scans_keywords_and_identifiers() {
        assert_eq!(
            lex_tokens("let frob = if cond then a else b"),
            vec![
                Token::KwdLet,
                Token::Ident,
                Token::OpSet,
                Token::KwdIf,
                Token::Ident,
                Token::KwdThen,
                Token::Ident,
                Token::KwdElse,
                Token::Ident,
            ]
        );
    }

    #[rstest]
    #[case("+:=", vec![Token::OpSetAddTC])]
    #[case("<<=", vec![Token::OpSetShl])]
    #[case("->", vec![Token::ThinArrowR])]
    #[case("<-", vec![Token::ThinArrowL])]
    #[case("=>", vec![Token::WideArrowR])]
    #[case("[...]", vec![Token::TypTailArray])]
    #[case("[*]", vec![Token::TypMultiPtr])]
    #[case("[?]", vec![Token::TypOptMultiPtr])]
    #[case("[]", vec![Token::TypSlice])]
    #[case(".[", vec![Token::ArrayInitializer])]
    #[case(".{", vec![Token::CompositeInitializer])]
    #[case(".*", vec![Token::UOpDeref])]
    #[case("...", vec![Token::TypVar])]
    #[case("&& || == != <= >=", vec![Token::OpLogAnd, Token::OpLogOr, Token::OpEq, Token::OpNe, Token::OpLe, Token::OpGe])]
    #[case("+: -: *:", vec![Token::OpAddTC, Token::OpSubTC, Token::OpMulTC])]
    fn scans_multi_character_operators(#[case] text: &str, #[case] expected: Vec<Token>) {
        assert_eq!(lex_tokens(text), expected);
    }

    #[rstest]
    #[case("0", 0)]
    #[case("42", 42)]
    #[case("0b1011", 11)]
    #[case("0o17", 15)]
    #[case("0xfF", 255)]
    #[case("18446744073709551615", u64::MAX)]
    fn scans_integer_literals(#[case] text: &str, #[case] expected: u64) {
        assert_eq!(lex_all(text), vec![(Token::LitInteger, expected)]);
    }

    #[test]
    fn scans_float_literals() {
        let lexed = lex_all("3.25");

        assert_eq!(lexed.len(), 1);
        assert_eq!(lexed[0].0, Token::LitFloat);
        assert_eq!(f64::from_bits(lexed[0].1), 3.25);
    }

    #[rstest]
    #[case("'a'", 'a' as u64)]
    #[case("'\\n'", '\n' as u64)]
    #[case("'\\x41'", 0x41)]
    #[case("'\\X01F600'", 0x1F600)]
    #[case("'\\u0065'", 65)]
    #[case("'ü'", 0xFC)]
    fn scans_char_literals(#[case] text: &str, #[case] expected: u64) {
        assert_eq!(lex_all(text), vec![(Token::LitChar, expected)]);
    }

    #[test]
    fn string_literals_expand_escapes() {
        let mut identifiers = IdentifierPool::new();
        let errors = ErrorSink::new();
        let reader = SourceReader::new();

        let mut lexer = Lexer::new(
            b"\"hi\\n\\x41\"",
            1,
            false,
            &mut identifiers,
            &errors,
            &reader,
        );

        let lexeme = lexer.next();

        assert_eq!(lexeme.token, Token::LitString);
        assert_eq!(identifiers.bytes_from(lexeme.identifier_id()), b"hi\nA");
    }

    #[test]
    fn skips_comments_including_nested_blocks() {
        assert_eq!(
            lex_tokens("a // line\n /* outer /* inner */ still */ b"),
            vec![Token::Ident, Token::Ident]
        );
    }

    #[test]
    fn wildcard_is_not_a_builtin() {
        assert_eq!(lex_tokens("_"), vec![Token::Wildcard]);
    }

    #[test]
    fn builtins_resolve_by_name() {
        let lexed = lex_all("_integer _import _true");

        assert_eq!(
            lexed,
            vec![
                (Token::Builtin, Builtin::Integer as u64),
                (Token::Builtin, Builtin::Import as u64),
                (Token::Builtin, Builtin::True as u64),
            ]
        );
    }

    #[test]
    fn peek_n_preserves_lexer_state() {
        let mut identifiers = IdentifierPool::new();
        let errors = ErrorSink::new();
        let reader = SourceReader::new();

        let mut lexer = Lexer::new(b"a , b <- c", 1, false, &mut identifiers, &errors, &reader);

        assert_eq!(lexer.peek().token, Token::Ident);
        assert_eq!(lexer.peek_n(1).token, Token::Comma);
        assert_eq!(lexer.peek_n(3).token, Token::ThinArrowL);
        assert_eq!(lexer.peek().token, Token::Ident);

        let tokens: Vec<Token> = std::iter::from_fn(|| {
            let l = lexer.next();
            (l.token != Token::EndOfSource).then_some(l.token)
        })
        .collect();

        assert_eq!(
            tokens,
            vec![
                Token::Ident,
                Token::Comma,
                Token::Ident,
                Token::ThinArrowL,
                Token::Ident,
            ]
        );
    }

    #[test]
    fn literals_survive_a_print_and_relex_round_trip() {
        for value in [0u64, 1, 42, 255, 1 << 40, u64::MAX] {
            assert_eq!(
                lex_all(&value.to_string()),
                vec![(Token::LitInteger, value)]
            );
        }

        for value in [0.5f64, 3.25, 1234.5678] {
            let lexed = lex_all(&format!("{}", value));

            assert_eq!(lexed[0].0, Token::LitFloat);
            assert_eq!(f64::from_bits(lexed[0].1), value);
        }
    }

    #[test]
    fn unary_and_binary_table_ranges_are_contiguous() {
        assert_eq!(
            Token::OpAdd.ordinal() - Token::ParenL.ordinal(),
            17,
            "unary operator table covers ParenL..=OpAdd"
        );
        assert_eq!(
            Token::OpSetShr.ordinal() - Token::OpMemberOrRef.ordinal(),
            36,
            "binary operator table covers OpMemberOrRef..=OpSetShr"
        );
    }
}
