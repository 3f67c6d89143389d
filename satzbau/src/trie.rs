//! The literal-trie matcher.
//!
//! A set of literals is compiled into a trie whose transitions are labeled
//! with (widened) code units. Matching walks the trie greedily, remembers
//! the last node that accepts, and commits to the longest accepted prefix of
//! the input. Accept nodes can carry a trailing-veto character class, which
//! rejects a candidate that is immediately followed by a member of the class
//! (how keywords refuse to match inside identifiers).

use crate::{
    char_class::CharClass,
    encoding::Encoding,
    reader::Reader,
};

#[derive(Debug)]
struct Accept {
    /// Index of the accepted literal, by declaration order.
    value: usize,
    veto: Option<CharClass>,
}

#[derive(Debug, Default)]
struct Node {
    accept: Option<Accept>,
    /// Transition labels in insertion order; ties in the walk cannot happen
    /// since labels are unique per node.
    transitions: Vec<(u32, usize)>,
}

/// A compiled literal trie for one encoding.
#[derive(Debug)]
pub(crate) struct Trie {
    nodes: Vec<Node>,
    fold_ascii: bool,
}

/// Outcome of a trie walk. The reader is always reset: to the end of the
/// accepted literal on a match, to the walk's start otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TrieMatch {
    /// The literal with the given declaration index matched.
    Match {
        value: usize,
    },
    /// No literal matched; `prefix_len` code units of common prefix did.
    NoMatch {
        prefix_len: usize,
    },
}

#[inline]
fn fold(unit: u32, fold_ascii: bool) -> u32 {
    if fold_ascii && (0x41..=0x5A).contains(&unit) {
        unit + 0x20
    } else {
        unit
    }
}

impl Trie {
    /// Creates an empty trie; literals compare case-folded if `fold_ascii`.
    pub(crate) fn new(fold_ascii: bool) -> Self {
        Trie {
            nodes: vec![Node::default()],
            fold_ascii,
        }
    }

    /// Inserts a literal given as widened code units.
    ///
    /// Duplicate literals keep the earliest declaration, so earlier entries
    /// win ties by construction.
    pub(crate) fn insert(&mut self, units: &[u32], value: usize, veto: Option<CharClass>) {
        let mut node = 0;
        for &unit in units {
            let unit = fold(unit, self.fold_ascii);
            node = match self.nodes[node]
                .transitions
                .iter()
                .find(|&&(label, _)| label == unit)
            {
                Some(&(_, next)) => next,
                None => {
                    let next = self.nodes.len();
                    self.nodes.push(Node::default());
                    self.nodes[node].transitions.push((unit, next));
                    next
                }
            };
        }
        let accept = &mut self.nodes[node].accept;
        if accept.is_none() {
            *accept = Some(Accept { value, veto });
        }
    }

    /// Walks the trie from the reader's position.
    ///
    /// On a match the reader ends up just past the accepted literal; on a
    /// failure it is left where it started.
    pub(crate) fn walk<E: Encoding>(&self, reader: &mut Reader<E>) -> TrieMatch {
        let start = reader.current();
        let mut best = None;
        let mut node = 0;

        loop {
            if let Some(accept) = &self.nodes[node].accept {
                if !self.vetoed(accept, reader) {
                    best = Some((accept.value, reader.current()));
                }
            }

            let next = reader.peek().and_then(|unit| {
                let unit = fold(unit, self.fold_ascii);
                self.nodes[node]
                    .transitions
                    .iter()
                    .find(|&&(label, _)| label == unit)
            });
            match next {
                Some(&(_, next)) => {
                    reader.bump();
                    node = next;
                }
                None => break,
            }
        }

        match best {
            Some((value, end)) => {
                reader.reset(end);
                TrieMatch::Match { value }
            }
            None => {
                let prefix_len = reader.position() - start.position();
                reader.reset(start);
                TrieMatch::NoMatch { prefix_len }
            }
        }
    }

    fn vetoed<E: Encoding>(&self, accept: &Accept, reader: &Reader<E>) -> bool {
        match &accept.veto {
            None => false,
            Some(class) => match reader.decode() {
                Ok((c, _)) => class.matches(c),
                Err(_) => false,
            },
        }
    }
}

/// Encodes `text` into the widened code units of `E`.
pub(crate) fn encode_str<E: Encoding>(text: &str) -> Vec<u32> {
    let mut units = vec![];
    for c in text.chars() {
        E::encode_char(c, &mut units);
    }
    units
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::char_class::ascii;
    use crate::encoding::Utf8;

    fn trie_of(literals: &[&str]) -> Trie {
        let mut trie = Trie::new(false);
        for (idx, lit) in literals.iter().enumerate() {
            trie.insert(&encode_str::<Utf8>(lit), idx, None);
        }
        trie
    }

    #[test]
    fn longest_match_wins() {
        let trie = trie_of(&["int", "integer", "in"]);
        let mut reader = Reader::<Utf8>::from_str("integers");
        assert_eq!(trie.walk(&mut reader), TrieMatch::Match { value: 1 });
        assert_eq!(reader.position(), 7);

        let mut reader = Reader::<Utf8>::from_str("inline");
        assert_eq!(trie.walk(&mut reader), TrieMatch::Match { value: 2 });
        assert_eq!(reader.position(), 2);
    }

    #[test]
    fn failure_resets_and_reports_prefix() {
        let trie = trie_of(&["abc", "abd"]);
        let mut reader = Reader::<Utf8>::from_str("abx");
        assert_eq!(trie.walk(&mut reader), TrieMatch::NoMatch { prefix_len: 2 });
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn earlier_declaration_wins_ties() {
        let mut trie = Trie::new(false);
        trie.insert(&encode_str::<Utf8>("same"), 0, None);
        trie.insert(&encode_str::<Utf8>("same"), 1, None);
        let mut reader = Reader::<Utf8>::from_str("same");
        assert_eq!(trie.walk(&mut reader), TrieMatch::Match { value: 0 });
    }

    #[test]
    fn trailing_veto_rejects_keywords_in_identifiers() {
        let mut trie = Trie::new(false);
        trie.insert(&encode_str::<Utf8>("int"), 0, Some(ascii::word()));

        let mut reader = Reader::<Utf8>::from_str("int x");
        assert_eq!(trie.walk(&mut reader), TrieMatch::Match { value: 0 });

        let mut reader = Reader::<Utf8>::from_str("interface");
        assert_eq!(trie.walk(&mut reader), TrieMatch::NoMatch { prefix_len: 3 });
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn veto_falls_back_to_shorter_accept() {
        let mut trie = Trie::new(false);
        trie.insert(&encode_str::<Utf8>("in"), 0, None);
        trie.insert(&encode_str::<Utf8>("int"), 1, Some(ascii::word()));

        // "int" is vetoed by the following "e", but "in" still matches.
        let mut reader = Reader::<Utf8>::from_str("integer");
        assert_eq!(trie.walk(&mut reader), TrieMatch::Match { value: 0 });
        assert_eq!(reader.position(), 2);
    }

    #[test]
    fn ascii_case_folding() {
        let mut trie = Trie::new(true);
        trie.insert(&encode_str::<Utf8>("select"), 0, None);
        let mut reader = Reader::<Utf8>::from_str("SeLeCt *");
        assert_eq!(trie.walk(&mut reader), TrieMatch::Match { value: 0 });
        assert_eq!(reader.position(), 6);
    }

    #[test]
    fn empty_set_never_matches() {
        let trie = Trie::new(false);
        let mut reader = Reader::<Utf8>::from_str("x");
        assert_eq!(trie.walk(&mut reader), TrieMatch::NoMatch { prefix_len: 0 });
    }
}
