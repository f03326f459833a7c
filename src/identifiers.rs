//! Interned identifier spellings.
//!
//! The pool maps byte sequences to stable [`IdentifierId`] handles and
//! keeps a token slot per entry, letting it double as the keyword
//! table: the lexer interns every identifier it scans and asks the
//! entry which token its spelling corresponds to. String literals are
//! interned here too, so a `CompString` value is just an id.

use std::collections::HashMap;

use crate::arena::FnvBuildHasher;
use crate::lexer::Token;

/// Handle to an interned identifier. `0` is reserved invalid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IdentifierId(pub u32);

impl IdentifierId {
    pub const INVALID: IdentifierId = IdentifierId(0);

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

struct IdentifierEntry {
    bytes: Box<[u8]>,
    token: Token,
}

/// Append-only pool of interned identifiers with keyword tagging.
pub struct IdentifierPool {
    entries: Vec<IdentifierEntry>,
    map: HashMap<Box<[u8]>, IdentifierId, FnvBuildHasher>,
}

const KEYWORDS: &[(&str, Token)] = &[
    ("if", Token::KwdIf),
    ("then", Token::KwdThen),
    ("else", Token::KwdElse),
    ("for", Token::KwdFor),
    ("do", Token::KwdDo),
    ("finally", Token::KwdFinally),
    ("switch", Token::KwdSwitch),
    ("case", Token::KwdCase),
    ("func", Token::KwdFunc),
    ("proc", Token::KwdProc),
    ("trait", Token::KwdTrait),
    ("impl", Token::KwdImpl),
    ("where", Token::KwdWhere),
    ("expects", Token::KwdExpects),
    ("ensures", Token::KwdEnsures),
    ("catch", Token::KwdCatch),
    ("let", Token::KwdLet),
    ("pub", Token::KwdPub),
    ("mut", Token::KwdMut),
    ("global", Token::KwdGlobal),
    ("auto", Token::KwdAuto),
    ("use", Token::KwdUse),
    ("return", Token::KwdReturn),
    ("leave", Token::KwdLeave),
    ("yield", Token::KwdYield),
    ("eval", Token::KwdEval),
    ("try", Token::KwdTry),
    ("defer", Token::KwdDefer),
    ("distinct", Token::KwdDistinct),
];

impl IdentifierPool {
    pub fn new() -> Self {
        let mut pool = Self {
            entries: Vec::with_capacity(256),
            map: HashMap::with_hasher(FnvBuildHasher::default()),
        };

        // Entry 0 is the reserved invalid handle.
        pool.entries.push(IdentifierEntry {
            bytes: Box::from(&b""[..]),
            token: Token::Empty,
        });

        for &(spelling, token) in KEYWORDS {
            let id = pool.id_from(spelling.as_bytes());
            pool.entries[id.0 as usize].token = token;
        }

        pool
    }

    /// Interns `bytes`, returning the existing handle when the spelling
    /// has been seen before.
    pub fn id_from(&mut self, bytes: &[u8]) -> IdentifierId {
        if let Some(&id) = self.map.get(bytes) {
            return id;
        }

        if bytes.len() > usize::from(u16::MAX) {
            crate::diagnostics::fatal(format_args!(
                "identifier of {} bytes exceeds the supported maximum length",
                bytes.len()
            ));
        }

        let id = IdentifierId(self.entries.len() as u32);

        let owned: Box<[u8]> = Box::from(bytes);

        self.entries.push(IdentifierEntry {
            bytes: owned.clone(),
            token: Token::Ident,
        });

        self.map.insert(owned, id);

        id
    }

    pub fn bytes_from(&self, id: IdentifierId) -> &[u8] {
        debug_assert!(id.is_valid());

        &self.entries[id.0 as usize].bytes
    }

    /// The spelling as UTF-8, for diagnostics. Identifiers are ASCII by
    /// construction; interned string literals are valid UTF-8 because
    /// the lexer only emits expanded UTF-8.
    pub fn name_from(&self, id: IdentifierId) -> &str {
        std::str::from_utf8(self.bytes_from(id)).unwrap_or("<non-utf8>")
    }

    pub fn token_from(&self, id: IdentifierId) -> Token {
        debug_assert!(id.is_valid());

        self.entries[id.0 as usize].token
    }

    pub fn entry_from(&self, id: IdentifierId) -> (&[u8], Token) {
        let entry = &self.entries[id.0 as usize];

        (&entry.bytes, entry.token)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Default for IdentifierPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_bytes() {
        let mut pool = IdentifierPool::new();

        let id = pool.id_from(b"some_name");

        assert_eq!(pool.bytes_from(id), b"some_name");
    }

    #[test]
    fn interning_is_stable_across_calls() {
        let mut pool = IdentifierPool::new();

        let a = pool.id_from(b"value");
        let b = pool.id_from(b"value");
        let c = pool.id_from(b"other");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn keywords_carry_their_token() {
        let mut pool = IdentifierPool::new();

        let kw = pool.id_from(b"let");
        let plain = pool.id_from(b"letter");

        assert_eq!(pool.token_from(kw), Token::KwdLet);
        assert_eq!(pool.token_from(plain), Token::Ident);
    }

    #[test]
    fn handle_zero_is_never_returned() {
        let mut pool = IdentifierPool::new();

        for name in ["a", "b", "c", ""] {
            assert_ne!(pool.id_from(name.as_bytes()), IdentifierId::INVALID);
        }
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn round_trip_arbitrary_bytes(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
                let mut pool = IdentifierPool::new();

                let id = pool.id_from(&bytes);

                prop_assert_eq!(pool.bytes_from(id), &bytes[..]);
                prop_assert_eq!(pool.id_from(&bytes), id);
            }
        }
    }
}
