//! Rule values and the grammar construction surface.
//!
//! Rules are immutable values built once and shared by reference; `+`
//! sequences two rules, `|` adds a choice alternative and `>>` forms a
//! branch from a condition and a body. Everything else is a constructor
//! function or a small builder following the same chainable-setter style as
//! the rest of the crate.

use std::{fmt, ops, sync::Arc, sync::OnceLock};

use zwohash::HashMap;

use crate::{
    callback::{StateRef, Value},
    char_class::CharClass,
    encoding::{Encoding, ENCODING_COUNT},
    event::TokenKind,
    grammar::{Grammar, ProdId},
    trie::{encode_str, Trie},
};

/// Per-encoding cache of a literal's code units.
pub(crate) struct UnitCache([OnceLock<Vec<u32>>; ENCODING_COUNT]);

impl UnitCache {
    fn new() -> Self {
        UnitCache(std::array::from_fn(|_| OnceLock::new()))
    }

    pub(crate) fn get<E: Encoding>(&self, text: &str) -> &[u32] {
        self.0[E::ID].get_or_init(|| encode_str::<E>(text))
    }
}

/// Per-encoding cache of a compiled literal trie, keyed by rule identity.
pub(crate) struct TrieCache([OnceLock<Trie>; ENCODING_COUNT]);

impl TrieCache {
    fn new() -> Self {
        TrieCache(std::array::from_fn(|_| OnceLock::new()))
    }

    pub(crate) fn get<E: Encoding>(&self, build: impl FnOnce() -> Trie) -> &Trie {
        self.0[E::ID].get_or_init(build)
    }
}

/// A list separator.
#[derive(Clone)]
pub struct Sep {
    pub(crate) rule: Rule,
    pub(crate) trailing: bool,
}

/// A separator that must not appear after the last item.
pub fn sep(rule: Rule) -> Sep {
    Sep {
        rule,
        trailing: false,
    }
}

/// A separator that is tolerated after the last item.
pub fn trailing_sep(rule: Rule) -> Sep {
    Sep {
        rule,
        trailing: true,
    }
}

#[derive(Clone)]
pub(crate) enum EscapeAction {
    Capture(CharClass),
    Rule(Rule),
    Symbol(Arc<SymbolTable>),
}

/// An escape sequence of a delimited region.
#[derive(Clone)]
pub struct Escape {
    pub(crate) token: Rule,
    pub(crate) actions: Vec<EscapeAction>,
}

/// Starts an escape sequence triggered by `token`.
pub fn escape(token: Rule) -> Escape {
    Escape {
        token,
        actions: vec![],
    }
}

impl Escape {
    /// After the escape token, captures one character of `class` as the
    /// escaped value.
    pub fn capture(mut self, class: CharClass) -> Self {
        self.actions.push(EscapeAction::Capture(class));
        self
    }

    /// After the escape token, parses `rule`; its values are the escaped
    /// values.
    pub fn rule(mut self, rule: Rule) -> Self {
        self.actions.push(EscapeAction::Rule(rule));
        self
    }

    /// After the escape token, matches a symbol of `table`; its mapped value
    /// is the escaped value.
    pub fn symbol(mut self, table: &Arc<SymbolTable>) -> Self {
        self.actions.push(EscapeAction::Symbol(table.clone()));
        self
    }
}

/// Maps literal symbol texts to values.
///
/// Lookup at parse time goes through the same longest-match trie as literal
/// sets; duplicate keys keep the earliest mapping.
pub struct SymbolTable {
    entries: Vec<(Box<str>, Value)>,
    index: HashMap<Box<str>, usize>,
    fold: bool,
    tries: TrieCache,
}

impl Default for SymbolTable {
    fn default() -> Self {
        SymbolTable::new()
    }
}

impl SymbolTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        SymbolTable {
            entries: vec![],
            index: HashMap::default(),
            fold: false,
            tries: TrieCache::new(),
        }
    }

    /// Makes symbol lookup ASCII case insensitive.
    pub fn case_folding(mut self) -> Self {
        self.fold = true;
        self
    }

    /// Adds a mapping; the first mapping for a text wins.
    pub fn map(mut self, text: &str, value: Value) -> Self {
        if !self.index.contains_key(text) {
            self.index
                .insert(text.into(), self.entries.len());
            self.entries.push((text.into(), value));
        }
        self
    }

    /// Number of mappings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn value(&self, idx: usize) -> &Value {
        &self.entries[idx].1
    }

    pub(crate) fn trie_for<E: Encoding>(&self) -> &Trie {
        self.tries.get::<E>(|| {
            let mut trie = Trie::new(self.fold);
            for (idx, (text, _)) in self.entries.iter().enumerate() {
                trie.insert(&encode_str::<E>(text), idx, None);
            }
            trie
        })
    }
}

pub(crate) enum Node {
    // Token rules.
    Lit {
        text: Box<str>,
        fold: bool,
        units: UnitCache,
    },
    Keyword {
        text: Box<str>,
        trailing: CharClass,
        fold: bool,
        units: UnitCache,
    },
    LitSet {
        entries: Vec<Box<str>>,
        fold: bool,
        tries: TrieCache,
    },
    Class(CharClass),
    CodePoint,
    Eof,
    Eol,
    Newline,
    Position,
    Identifier {
        head: CharClass,
        tail: CharClass,
    },
    Digits {
        radix: u32,
        sep: Option<Rule>,
        no_leading_zero: bool,
    },
    NDigits {
        n: usize,
        radix: u32,
    },
    Integer {
        radix: u32,
        sep: Option<Rule>,
        no_leading_zero: bool,
    },
    Sign,
    PlusSign,
    MinusSign,
    Until {
        token: Rule,
        or_eof: bool,
    },
    WithKind {
        kind: TokenKind,
        inner: Rule,
    },

    // Composite rules.
    Seq(Vec<Rule>),
    Choice(Vec<Rule>),
    Branch {
        condition: Rule,
        body: Rule,
    },
    Opt(Rule),
    List {
        item: Rule,
        sep: Option<Sep>,
    },
    TermList {
        item: Rule,
        sep: Option<Sep>,
        term: Rule,
        opt: bool,
    },
    While {
        body: Rule,
    },
    Try {
        rule: Rule,
        recovery: Option<Rule>,
    },
    Find {
        tokens: Vec<Rule>,
        limits: Vec<Rule>,
    },
    Recover {
        branches: Vec<Rule>,
        limits: Vec<Rule>,
    },
    Peek(Rule),
    PeekNot(Rule),
    Capture(Rule),
    ErrorRule {
        label: &'static str,
        rule: Option<Rule>,
    },
    Delimited {
        open: Rule,
        close: Rule,
        content: Rule,
        escapes: Vec<Escape>,
    },
    Symbol {
        table: Arc<SymbolTable>,
        pattern: Option<Rule>,
    },
    Recurse(ProdId),
    Inline(ProdId),
    Subgrammar {
        grammar: Arc<Grammar>,
        entry: ProdId,
    },
    Return,
    Effect(Arc<dyn Fn(StateRef)>),
    DebugRule(&'static str),
    WhitespaceNow(Rule),
    NoWhitespace(Rule),

    // Context variables.
    CtxCreate {
        id: &'static str,
        init: Value,
    },
    CtxSet {
        id: &'static str,
        value: Value,
    },
    CtxToggle {
        id: &'static str,
    },
    CtxAdd {
        id: &'static str,
        delta: i64,
    },
    CtxRequire {
        id: &'static str,
        expected: Value,
        label: &'static str,
    },
    CtxValue {
        id: &'static str,
    },
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Node::Lit { .. } => "Lit",
            Node::Keyword { .. } => "Keyword",
            Node::LitSet { .. } => "LitSet",
            Node::Class(_) => "Class",
            Node::CodePoint => "CodePoint",
            Node::Eof => "Eof",
            Node::Eol => "Eol",
            Node::Newline => "Newline",
            Node::Position => "Position",
            Node::Identifier { .. } => "Identifier",
            Node::Digits { .. } => "Digits",
            Node::NDigits { .. } => "NDigits",
            Node::Integer { .. } => "Integer",
            Node::Sign => "Sign",
            Node::PlusSign => "PlusSign",
            Node::MinusSign => "MinusSign",
            Node::Until { .. } => "Until",
            Node::WithKind { .. } => "WithKind",
            Node::Seq(_) => "Seq",
            Node::Choice(_) => "Choice",
            Node::Branch { .. } => "Branch",
            Node::Opt(_) => "Opt",
            Node::List { .. } => "List",
            Node::TermList { .. } => "TermList",
            Node::While { .. } => "While",
            Node::Try { .. } => "Try",
            Node::Find { .. } => "Find",
            Node::Recover { .. } => "Recover",
            Node::Peek(_) => "Peek",
            Node::PeekNot(_) => "PeekNot",
            Node::Capture(_) => "Capture",
            Node::ErrorRule { .. } => "ErrorRule",
            Node::Delimited { .. } => "Delimited",
            Node::Symbol { .. } => "Symbol",
            Node::Recurse(_) => "Recurse",
            Node::Inline(_) => "Inline",
            Node::Subgrammar { .. } => "Subgrammar",
            Node::Return => "Return",
            Node::Effect(_) => "Effect",
            Node::DebugRule(_) => "DebugRule",
            Node::WhitespaceNow(_) => "WhitespaceNow",
            Node::NoWhitespace(_) => "NoWhitespace",
            Node::CtxCreate { .. } => "CtxCreate",
            Node::CtxSet { .. } => "CtxSet",
            Node::CtxToggle { .. } => "CtxToggle",
            Node::CtxAdd { .. } => "CtxAdd",
            Node::CtxRequire { .. } => "CtxRequire",
            Node::CtxValue { .. } => "CtxValue",
        };
        f.write_str(name)
    }
}

/// A parser rule value.
///
/// Rules are cheap to clone and shared immutably; cloning shares the
/// underlying node, which is what lets compiled tries be reused by identity.
#[derive(Clone)]
pub struct Rule(pub(crate) Arc<Node>);

impl Rule {
    pub(crate) fn new(node: Node) -> Self {
        Rule(Arc::new(node))
    }

    /// Whether this rule can act as a branch: it can decide commitment by
    /// peeking at the input.
    ///
    /// Production references are reported as branches; whether that holds is
    /// checked against the production's actual rule when it is parsed.
    pub fn is_branch(&self) -> bool {
        match &*self.0 {
            Node::Find { .. } | Node::Recover { .. } => false,
            Node::Seq(items) => items.first().is_some_and(|first| first.is_branch()),
            Node::Try { rule, .. } => rule.is_branch(),
            Node::List { item, .. } => item.is_branch(),
            Node::TermList { item, opt, .. } => *opt || item.is_branch(),
            Node::Capture(inner)
            | Node::WithKind { inner, .. }
            | Node::NoWhitespace(inner)
            | Node::WhitespaceNow(inner) => inner.is_branch(),
            _ => true,
        }
    }

    /// Whether this is a branch whose condition never fails.
    ///
    /// Choices containing an unconditional alternative are unconditional,
    /// which makes their exhausted-choice error impossible.
    pub fn is_unconditional_branch(&self) -> bool {
        match &*self.0 {
            Node::Position
            | Node::Sign
            | Node::Opt(_)
            | Node::While { .. }
            | Node::ErrorRule { .. }
            | Node::Return
            | Node::Effect(_)
            | Node::DebugRule(_)
            | Node::CtxCreate { .. }
            | Node::CtxSet { .. }
            | Node::CtxToggle { .. }
            | Node::CtxAdd { .. }
            | Node::CtxRequire { .. }
            | Node::CtxValue { .. } => true,
            Node::TermList { opt, .. } => *opt,
            Node::Choice(alts) => alts.iter().any(|alt| alt.is_unconditional_branch()),
            Node::Seq(items) => items
                .first()
                .is_some_and(|first| first.is_unconditional_branch()),
            Node::Branch { condition, .. } => condition.is_unconditional_branch(),
            Node::Capture(inner)
            | Node::WithKind { inner, .. }
            | Node::NoWhitespace(inner)
            | Node::WhitespaceNow(inner) => inner.is_unconditional_branch(),
            _ => false,
        }
    }

    /// Assigns a token kind reported in token events.
    pub fn with_kind(self, kind: TokenKind) -> Rule {
        Rule::new(Node::WithKind { kind, inner: self })
    }

    pub(crate) fn node(&self) -> &Node {
        &self.0
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match &*self.0 {
            Node::Lit { text, .. } => return write!(f, "lit({text:?})"),
            Node::Keyword { text, .. } => return write!(f, "keyword({text:?})"),
            Node::LitSet { .. } => "literal_set",
            Node::Class(class) => return write!(f, "class({})", class.name()),
            Node::CodePoint => "code_point",
            Node::Eof => "eof",
            Node::Eol => "eol",
            Node::Newline => "newline",
            Node::Position => "position",
            Node::Identifier { .. } => "identifier",
            Node::Digits { .. } => "digits",
            Node::NDigits { .. } => "n_digits",
            Node::Integer { .. } => "integer",
            Node::Sign => "sign",
            Node::PlusSign => "plus_sign",
            Node::MinusSign => "minus_sign",
            Node::Until { .. } => "until",
            Node::WithKind { .. } => "with_kind",
            Node::Seq(_) => "seq",
            Node::Choice(_) => "choice",
            Node::Branch { .. } => "branch",
            Node::Opt(_) => "opt",
            Node::List { .. } => "list",
            Node::TermList { .. } => "terminated list",
            Node::While { .. } => "while",
            Node::Try { .. } => "try",
            Node::Find { .. } => "find",
            Node::Recover { .. } => "recover",
            Node::Peek(_) => "peek",
            Node::PeekNot(_) => "peek_not",
            Node::Capture(_) => "capture",
            Node::ErrorRule { label, .. } => return write!(f, "error({label:?})"),
            Node::Delimited { .. } => "delimited",
            Node::Symbol { .. } => "symbol",
            Node::Recurse(id) => return write!(f, "p({id:?})"),
            Node::Inline(id) => return write!(f, "inline({id:?})"),
            Node::Subgrammar { .. } => "subgrammar",
            Node::Return => "return",
            Node::Effect(_) => "effect",
            Node::DebugRule(msg) => return write!(f, "debug({msg:?})"),
            Node::WhitespaceNow(_) => "whitespace",
            Node::NoWhitespace(_) => "no_whitespace",
            Node::CtxCreate { id, .. } => return write!(f, "context({id:?}).create"),
            Node::CtxSet { id, .. } => return write!(f, "context({id:?}).set"),
            Node::CtxToggle { id } => return write!(f, "context({id:?}).toggle"),
            Node::CtxAdd { id, .. } => return write!(f, "context({id:?}).add"),
            Node::CtxRequire { id, .. } => return write!(f, "context({id:?}).require"),
            Node::CtxValue { id } => return write!(f, "context({id:?}).value"),
        };
        f.write_str(name)
    }
}

/// Sequence: `a + b`.
impl ops::Add for Rule {
    type Output = Rule;

    fn add(self, rhs: Rule) -> Rule {
        let mut items = match &*self.0 {
            Node::Seq(items) => items.clone(),
            _ => vec![self.clone()],
        };
        match &*rhs.0 {
            Node::Seq(more) => items.extend(more.iter().cloned()),
            _ => items.push(rhs.clone()),
        }
        Rule::new(Node::Seq(items))
    }
}

/// Choice: `a | b`, tried in declaration order.
impl ops::BitOr for Rule {
    type Output = Rule;

    fn bitor(self, rhs: Rule) -> Rule {
        let mut alts = match &*self.0 {
            Node::Choice(alts) => alts.clone(),
            _ => vec![self.clone()],
        };
        match &*rhs.0 {
            Node::Choice(more) => alts.extend(more.iter().cloned()),
            _ => alts.push(rhs.clone()),
        }
        Rule::new(Node::Choice(alts))
    }
}

/// Branch: `condition >> body`.
impl ops::Shr for Rule {
    type Output = Rule;

    fn shr(self, rhs: Rule) -> Rule {
        Rule::new(Node::Branch {
            condition: self,
            body: rhs,
        })
    }
}

/// A character class used directly as a one-code-point token rule.
impl From<CharClass> for Rule {
    fn from(class: CharClass) -> Rule {
        Rule::new(Node::Class(class))
    }
}

/// Matches the literal `text`.
pub fn lit(text: &str) -> Rule {
    Rule::new(Node::Lit {
        text: text.into(),
        fold: false,
        units: UnitCache::new(),
    })
}

/// Matches a single ASCII character as one code unit.
pub fn lit_c(c: char) -> Rule {
    debug_assert!(c.is_ascii());
    lit(&c.to_string())
}

/// Matches a single code point, encoded as whatever the input encoding uses.
pub fn lit_cp(c: char) -> Rule {
    lit(&c.to_string())
}

/// Makes a literal, keyword or literal set match ASCII case insensitively.
pub fn ascii_case_folding(rule: Rule) -> Rule {
    match &*rule.0 {
        Node::Lit { text, units: _, .. } => Rule::new(Node::Lit {
            text: text.clone(),
            fold: true,
            units: UnitCache::new(),
        }),
        Node::Keyword {
            text, trailing, ..
        } => Rule::new(Node::Keyword {
            text: text.clone(),
            trailing: trailing.clone(),
            fold: true,
            units: UnitCache::new(),
        }),
        Node::LitSet { entries, .. } => Rule::new(Node::LitSet {
            entries: entries.clone(),
            fold: true,
            tries: TrieCache::new(),
        }),
        _ => panic!("case folding applies to literals, keywords and literal sets"),
    }
}

/// Matches `text` like a literal, but only when it is not continued by a
/// character of the identifier it belongs to.
pub fn keyword(text: &str, ident: &Rule) -> Rule {
    let trailing = match ident.node() {
        Node::Identifier { head, tail } => head.clone() | tail.clone(),
        _ => panic!("keyword requires the identifier rule it is reserved against"),
    };
    keyword_class(text, trailing)
}

/// Like [`keyword`], with an explicit forbidden-trailing class.
pub fn keyword_class(text: &str, trailing: CharClass) -> Rule {
    Rule::new(Node::Keyword {
        text: text.into(),
        trailing,
        fold: false,
        units: UnitCache::new(),
    })
}

/// Matches the longest of the given literals.
pub fn literal_set(literals: &[&str]) -> Rule {
    Rule::new(Node::LitSet {
        entries: literals.iter().map(|&lit| lit.into()).collect(),
        fold: false,
        tries: TrieCache::new(),
    })
}

/// Matches any single well-formed code point.
pub fn code_point() -> Rule {
    Rule::new(Node::CodePoint)
}

/// Matches only at the end of the input, consuming nothing.
pub fn eof() -> Rule {
    Rule::new(Node::Eof)
}

/// Matches a newline or the end of the input.
pub fn eol() -> Rule {
    Rule::new(Node::Eol)
}

/// Matches `\n` or `\r\n`.
pub fn newline() -> Rule {
    Rule::new(Node::Newline)
}

/// Produces the current position as a value, consuming nothing.
pub fn position() -> Rule {
    Rule::new(Node::Position)
}

/// Matches one `head` character followed by any number of `tail` characters
/// and produces the lexeme.
pub fn identifier(head: CharClass, tail: CharClass) -> Rule {
    Rule::new(Node::Identifier { head, tail })
}

/// Builder for digit-sequence tokens.
#[derive(Clone)]
pub struct Digits {
    radix: u32,
    sep: Option<Rule>,
    no_leading_zero: bool,
}

/// Decimal digits.
pub fn digits() -> Digits {
    digits_radix(10)
}

/// Digits of the given radix (2 to 36).
pub fn digits_radix(radix: u32) -> Digits {
    assert!((2..=36).contains(&radix));
    Digits {
        radix,
        sep: None,
        no_leading_zero: false,
    }
}

impl Digits {
    /// Allows `sep` tokens between digits (not leading or trailing).
    pub fn sep(mut self, sep: Rule) -> Self {
        self.sep = Some(sep);
        self
    }

    /// Rejects a leading zero followed by more digits.
    pub fn no_leading_zero(mut self) -> Self {
        self.no_leading_zero = true;
        self
    }
}

impl From<Digits> for Rule {
    fn from(digits: Digits) -> Rule {
        Rule::new(Node::Digits {
            radix: digits.radix,
            sep: digits.sep,
            no_leading_zero: digits.no_leading_zero,
        })
    }
}

/// Matches a single digit of the given radix.
pub fn digit(radix: u32) -> Rule {
    n_digits(1, radix)
}

/// Matches exactly `n` digits of the given radix.
pub fn n_digits(n: usize, radix: u32) -> Rule {
    assert!(n >= 1);
    assert!((2..=36).contains(&radix));
    Rule::new(Node::NDigits { n, radix })
}

/// Matches like the digit rule and additionally produces the numeric value,
/// reporting an `integer_overflow` error if it does not fit.
pub fn integer(digits: Digits) -> Rule {
    Rule::new(Node::Integer {
        radix: digits.radix,
        sep: digits.sep,
        no_leading_zero: digits.no_leading_zero,
    })
}

/// Produces `-1` for a minus sign, `+1` for a plus sign or no sign.
pub fn sign() -> Rule {
    Rule::new(Node::Sign)
}

/// Matches `+` and produces `+1`.
pub fn plus_sign() -> Rule {
    Rule::new(Node::PlusSign)
}

/// Matches `-` and produces `-1`.
pub fn minus_sign() -> Rule {
    Rule::new(Node::MinusSign)
}

/// Builder for [`until`].
#[derive(Clone)]
pub struct Until {
    token: Rule,
    or_eof: bool,
}

/// Consumes everything up to and including `token`.
pub fn until(token: Rule) -> Until {
    Until {
        token,
        or_eof: false,
    }
}

impl Until {
    /// Also accepts the end of the input in place of the token.
    pub fn or_eof(mut self) -> Self {
        self.or_eof = true;
        self
    }
}

impl From<Until> for Rule {
    fn from(until: Until) -> Rule {
        Rule::new(Node::Until {
            token: until.token,
            or_eof: until.or_eof,
        })
    }
}

/// Takes the branch if it matches, otherwise produces the nil sentinel.
pub fn opt(rule: Rule) -> Rule {
    Rule::new(Node::Opt(rule))
}

/// One or more items; stops at the first item branch that is not taken.
pub fn list(item: Rule) -> Rule {
    Rule::new(Node::List { item, sep: None })
}

/// One or more items separated by `sep`.
pub fn list_sep(item: Rule, sep: Sep) -> Rule {
    Rule::new(Node::List {
        item,
        sep: Some(sep),
    })
}

/// Zero or more items.
pub fn opt_list(item: Rule) -> Rule {
    opt(list(item))
}

/// Zero or more items separated by `sep`.
pub fn opt_list_sep(item: Rule, sep: Sep) -> Rule {
    opt(list_sep(item, sep))
}

/// Repeats the branch until it is not taken; never fails.
pub fn while_(body: Rule) -> Rule {
    Rule::new(Node::While { body })
}

/// Like [`while_`], but requires at least one iteration.
pub fn while_one(body: Rule) -> Rule {
    body.clone() >> while_(body)
}

/// Runs `rule`; on failure, pretends it succeeded after discarding its
/// partial results.
pub fn try_(rule: Rule) -> Rule {
    Rule::new(Node::Try {
        rule,
        recovery: None,
    })
}

/// Runs `rule`; on failure, runs `recovery` to resynchronize and continues
/// if it succeeds.
pub fn try_recover(rule: Rule, recovery: impl Into<Rule>) -> Rule {
    Rule::new(Node::Try {
        rule,
        recovery: Some(recovery.into()),
    })
}

/// Builder for [`find`].
#[derive(Clone)]
pub struct Find {
    tokens: Vec<Rule>,
    limits: Vec<Rule>,
}

/// Advances to the next position where one of `tokens` matches, without
/// consuming it.
pub fn find(tokens: Vec<Rule>) -> Find {
    assert!(!tokens.is_empty());
    Find {
        tokens,
        limits: vec![],
    }
}

impl Find {
    /// Aborts the search when one of `limits` matches first.
    pub fn limit(mut self, limits: Vec<Rule>) -> Self {
        self.limits.extend(limits);
        self
    }
}

impl From<Find> for Rule {
    fn from(find: Find) -> Rule {
        Rule::new(Node::Find {
            tokens: find.tokens,
            limits: find.limits,
        })
    }
}

/// Builder for [`recover`].
#[derive(Clone)]
pub struct Recover {
    branches: Vec<Rule>,
    limits: Vec<Rule>,
}

/// Discards input until one of `branches` matches, then parses it.
pub fn recover(branches: Vec<Rule>) -> Recover {
    assert!(!branches.is_empty());
    Recover {
        branches,
        limits: vec![],
    }
}

impl Recover {
    /// Surrenders, without consuming it, when one of `limits` appears first.
    pub fn limit(mut self, limits: Vec<Rule>) -> Self {
        self.limits.extend(limits);
        self
    }
}

impl From<Recover> for Rule {
    fn from(recover: Recover) -> Rule {
        Rule::new(Node::Recover {
            branches: recover.branches,
            limits: recover.limits,
        })
    }
}

/// Commits without consuming if `rule` would match here.
pub fn peek(rule: Rule) -> Rule {
    Rule::new(Node::Peek(rule))
}

/// Commits without consuming if `rule` would *not* match here; as a plain
/// rule it reports `unexpected` over the matched span.
pub fn peek_not(rule: Rule) -> Rule {
    Rule::new(Node::PeekNot(rule))
}

/// Runs `rule` and additionally produces the lexeme it consumed.
pub fn capture(rule: Rule) -> Rule {
    Rule::new(Node::Capture(rule))
}

/// Always fails, reporting an `unexpected` error labeled `label`.
pub fn error(label: &'static str) -> Rule {
    Rule::new(Node::ErrorRule { label, rule: None })
}

/// Always fails; first matches `rule` speculatively so the error spans it.
pub fn error_matching(label: &'static str, rule: Rule) -> Rule {
    Rule::new(Node::ErrorRule {
        label,
        rule: Some(rule),
    })
}

/// Matches a symbol of `table` directly against the input.
pub fn symbol(table: &Arc<SymbolTable>) -> Rule {
    Rule::new(Node::Symbol {
        table: table.clone(),
        pattern: None,
    })
}

/// Parses `pattern` (e.g. an identifier), then requires its lexeme to be a
/// symbol of `table`, producing the mapped value.
pub fn symbol_matching(table: &Arc<SymbolTable>, pattern: Rule) -> Rule {
    Rule::new(Node::Symbol {
        table: table.clone(),
        pattern: Some(pattern),
    })
}

/// Recurses into a production, creating a production frame.
pub fn p(id: ProdId) -> Rule {
    Rule::new(Node::Recurse(id))
}

/// Parses a production's rule in place: no production frame, the outer
/// whitespace rule stays active, values flow into the current pack.
pub fn inline(id: ProdId) -> Rule {
    Rule::new(Node::Inline(id))
}

/// Parses the entry production of another grammar.
pub fn subgrammar(grammar: &Arc<Grammar>, entry: ProdId) -> Rule {
    Rule::new(Node::Subgrammar {
        grammar: grammar.clone(),
        entry,
    })
}

/// Finishes the surrounding production early and successfully.
pub fn return_() -> Rule {
    Rule::new(Node::Return)
}

/// Runs a side effect on the parse state; consumes nothing.
pub fn effect(f: impl Fn(StateRef) + 'static) -> Rule {
    Rule::new(Node::Effect(Arc::new(f)))
}

/// Emits a debug event with `message`; consumes nothing.
pub fn debug(message: &'static str) -> Rule {
    Rule::new(Node::DebugRule(message))
}

/// Runs `ws` as whitespace at this point, instead of the automatic rule.
pub fn whitespace(ws: Rule) -> Rule {
    Rule::new(Node::WhitespaceNow(ws))
}

/// Suspends automatic whitespace while parsing `rule`.
pub fn no_whitespace(rule: Rule) -> Rule {
    Rule::new(Node::NoWhitespace(rule))
}

/// Rules operating on a boolean context variable.
#[derive(Clone, Copy)]
pub struct ContextFlag {
    id: &'static str,
}

/// Names a boolean context variable of the current production.
pub fn context_flag(id: &'static str) -> ContextFlag {
    ContextFlag { id }
}

impl ContextFlag {
    /// Creates the flag with an initial value.
    pub fn create(self, init: bool) -> Rule {
        Rule::new(Node::CtxCreate {
            id: self.id,
            init: Value::Bool(init),
        })
    }

    /// Sets the flag.
    pub fn set(self, value: bool) -> Rule {
        Rule::new(Node::CtxSet {
            id: self.id,
            value: Value::Bool(value),
        })
    }

    /// Toggles the flag.
    pub fn toggle(self) -> Rule {
        Rule::new(Node::CtxToggle { id: self.id })
    }

    /// Fails with `label` unless the flag has the expected value.
    pub fn require(self, expected: bool, label: &'static str) -> Rule {
        Rule::new(Node::CtxRequire {
            id: self.id,
            expected: Value::Bool(expected),
            label,
        })
    }

    /// Produces the flag's current value.
    pub fn value(self) -> Rule {
        Rule::new(Node::CtxValue { id: self.id })
    }
}

/// Rules operating on an integer context variable.
#[derive(Clone, Copy)]
pub struct ContextCounter {
    id: &'static str,
}

/// Names an integer context variable of the current production.
pub fn context_counter(id: &'static str) -> ContextCounter {
    ContextCounter { id }
}

impl ContextCounter {
    /// Creates the counter with an initial value.
    pub fn create(self, init: i64) -> Rule {
        Rule::new(Node::CtxCreate {
            id: self.id,
            init: Value::Int(init),
        })
    }

    /// Increments the counter.
    pub fn inc(self) -> Rule {
        self.add(1)
    }

    /// Decrements the counter.
    pub fn dec(self) -> Rule {
        self.add(-1)
    }

    /// Adds `delta` to the counter.
    pub fn add(self, delta: i64) -> Rule {
        Rule::new(Node::CtxAdd { id: self.id, delta })
    }

    /// Fails with `label` unless the counter has the expected value.
    pub fn require(self, expected: i64, label: &'static str) -> Rule {
        Rule::new(Node::CtxRequire {
            id: self.id,
            expected: Value::Int(expected),
            label,
        })
    }

    /// Produces the counter's current value.
    pub fn value(self) -> Rule {
        Rule::new(Node::CtxValue { id: self.id })
    }
}

/// A terminator: a token that must follow a body.
#[derive(Clone)]
pub struct Terminator {
    term: Rule,
}

/// Requires `term` after whatever body is attached.
pub fn terminator(term: Rule) -> Terminator {
    Terminator { term }
}

impl Terminator {
    /// The terminating token itself.
    pub fn token(&self) -> Rule {
        self.term.clone()
    }

    /// `body` followed by the terminator.
    pub fn then(&self, body: Rule) -> Rule {
        body + self.term.clone()
    }

    /// Either the terminator directly (producing nil), or `body` followed by
    /// the terminator.
    pub fn opt(&self, body: Rule) -> Rule {
        opt(peek_not(self.term.clone()) >> body) + self.term.clone()
    }

    /// Items until the terminator, recovering to the next separator or the
    /// terminator on item errors.
    pub fn list(&self, item: Rule) -> Rule {
        Rule::new(Node::TermList {
            item,
            sep: None,
            term: self.term.clone(),
            opt: false,
        })
    }

    /// Separated items until the terminator.
    pub fn list_sep(&self, item: Rule, sep: Sep) -> Rule {
        Rule::new(Node::TermList {
            item,
            sep: Some(sep),
            term: self.term.clone(),
            opt: false,
        })
    }

    /// Like [`list`][Self::list], but the terminator may follow immediately.
    pub fn opt_list(&self, item: Rule) -> Rule {
        Rule::new(Node::TermList {
            item,
            sep: None,
            term: self.term.clone(),
            opt: true,
        })
    }

    /// Like [`list_sep`][Self::list_sep], but the terminator may follow
    /// immediately.
    pub fn opt_list_sep(&self, item: Rule, sep: Sep) -> Rule {
        Rule::new(Node::TermList {
            item,
            sep: Some(sep),
            term: self.term.clone(),
            opt: true,
        })
    }

    /// The recovery rule synchronizing at this terminator.
    pub fn recovery_rule(&self) -> Rule {
        find(vec![self.term.clone()]).into()
    }
}

/// A bracket pair: an opening branch condition and a closing terminator.
#[derive(Clone)]
pub struct Brackets {
    open: Rule,
    close: Rule,
}

/// A region delimited by `open` and `close` tokens.
pub fn brackets(open: Rule, close: Rule) -> Brackets {
    Brackets { open, close }
}

/// `( .. )` brackets.
pub fn parenthesized() -> Brackets {
    brackets(lit("("), lit(")"))
}

/// `[ .. ]` brackets.
pub fn square_bracketed() -> Brackets {
    brackets(lit("["), lit("]"))
}

/// `{ .. }` brackets.
pub fn curly_bracketed() -> Brackets {
    brackets(lit("{"), lit("}"))
}

/// `< .. >` brackets.
pub fn angle_bracketed() -> Brackets {
    brackets(lit("<"), lit(">"))
}

impl Brackets {
    /// The opening token; it is the branch condition of every variant.
    pub fn open(&self) -> Rule {
        self.open.clone()
    }

    /// The closing token.
    pub fn close(&self) -> Rule {
        self.close.clone()
    }

    /// The closing token as a terminator.
    pub fn as_terminator(&self) -> Terminator {
        terminator(self.close.clone())
    }

    /// `open` then `body` then `close`.
    pub fn around(&self, body: Rule) -> Rule {
        self.open.clone() >> self.as_terminator().then(body)
    }

    /// `open`, an optional `body`, then `close`.
    pub fn opt(&self, body: Rule) -> Rule {
        self.open.clone() >> self.as_terminator().opt(body)
    }

    /// `open`, items until `close`.
    pub fn list(&self, item: Rule) -> Rule {
        self.open.clone() >> self.as_terminator().list(item)
    }

    /// `open`, separated items until `close`.
    pub fn list_sep(&self, item: Rule, sep: Sep) -> Rule {
        self.open.clone() >> self.as_terminator().list_sep(item, sep)
    }

    /// `open`, zero or more items until `close`.
    pub fn opt_list(&self, item: Rule) -> Rule {
        self.open.clone() >> self.as_terminator().opt_list(item)
    }

    /// `open`, zero or more separated items until `close`.
    pub fn opt_list_sep(&self, item: Rule, sep: Sep) -> Rule {
        self.open.clone() >> self.as_terminator().opt_list_sep(item, sep)
    }
}

/// A delimited region builder.
#[derive(Clone)]
pub struct Delimited {
    open: Rule,
    close: Rule,
}

/// A region delimited by `open` and `close` whose inside is matched
/// character by character.
pub fn delimited(open: Rule, close: Rule) -> Delimited {
    Delimited { open, close }
}

/// `" .. "` strings.
pub fn quoted() -> Delimited {
    delimited(lit("\""), lit("\""))
}

/// `' .. '` strings.
pub fn single_quoted() -> Delimited {
    delimited(lit("'"), lit("'"))
}

/// `""" .. """` strings.
pub fn triple_quoted() -> Delimited {
    delimited(lit("\"\"\""), lit("\"\"\""))
}

/// `` ` .. ` `` strings.
pub fn backticked() -> Delimited {
    delimited(lit("`"), lit("`"))
}

impl Delimited {
    /// The region's content is a sequence of `content` characters.
    ///
    /// Reaching the end of the input inside the region reports
    /// `missing_delimiter`; characters outside `content` are reported and
    /// skipped.
    pub fn of(&self, content: impl Into<Rule>) -> Rule {
        self.build(content.into(), vec![])
    }

    /// Like [`of`][Self::of], with escape sequences tried before content
    /// characters.
    pub fn of_with_escapes(&self, content: impl Into<Rule>, escapes: Vec<Escape>) -> Rule {
        self.build(content.into(), escapes)
    }

    fn build(&self, content: Rule, escapes: Vec<Escape>) -> Rule {
        Rule::new(Node::Delimited {
            open: self.open.clone(),
            close: self.close.clone(),
            content,
            escapes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::char_class::ascii;

    #[test]
    fn operators_flatten() {
        let seq = lit("a") + lit("b") + lit("c");
        assert_matches::assert_matches!(seq.node(), Node::Seq(items) if items.len() == 3);

        let choice = lit("a") | lit("b") | lit("c");
        assert_matches::assert_matches!(choice.node(), Node::Choice(alts) if alts.len() == 3);
    }

    #[test]
    fn branch_flags() {
        assert!(lit("a").is_branch());
        assert!(!lit("a").is_unconditional_branch());

        assert!(opt(lit("a")).is_unconditional_branch());
        assert!(while_(lit("a")).is_unconditional_branch());
        assert!(position().is_unconditional_branch());
        assert!(sign().is_unconditional_branch());
        assert!(error("boom").is_unconditional_branch());

        let choice = lit("a") | opt(lit("b"));
        assert!(choice.is_unconditional_branch());
        let choice = lit("a") | lit("b");
        assert!(!choice.is_unconditional_branch());

        // A try-wrapped alternative stays conditional.
        assert!(!try_(lit("a")).is_unconditional_branch());

        let seq = lit("a") + lit("b");
        assert!(seq.is_branch());

        let rule: Rule = find(vec![lit(";")]).into();
        assert!(!rule.is_branch());
    }

    #[test]
    fn symbol_table_first_mapping_wins() {
        let table = SymbolTable::new()
            .map("amp", Value::Char('&'))
            .map("amp", Value::Char('!'));
        assert_eq!(table.len(), 1);
        assert_eq!(table.value(0), &Value::Char('&'));
    }

    #[test]
    fn keyword_requires_identifier() {
        let ident = identifier(ascii::alpha(), ascii::word());
        let kw = keyword("int", &ident);
        assert_matches::assert_matches!(kw.node(), Node::Keyword { .. });
    }
}
