//! Grammars and productions.
//!
//! A [`Production`] is a named grammar entry point: a rule plus an optional
//! value specification, an optional whitespace rule and the two marker
//! flags. Productions live in a [`Grammar`], which hands out [`ProdId`]s so
//! rules can refer to each other recursively before everything is defined.

use crate::{callback::ValueSpec, rule::Rule};

/// Identifies a production within its [`Grammar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProdId(pub(crate) usize);

/// A named grammar entry point.
pub struct Production {
    pub(crate) name: &'static str,
    pub(crate) rule: Rule,
    pub(crate) value: Option<ValueSpec>,
    pub(crate) whitespace: Option<Rule>,
    pub(crate) token_production: bool,
    pub(crate) transparent: bool,
}

impl Production {
    /// Creates a production from its name and rule.
    pub fn new(name: &'static str, rule: Rule) -> Self {
        Production {
            name,
            rule,
            value: None,
            whitespace: None,
            token_production: false,
            transparent: false,
        }
    }

    /// Sets the value specification applied when the production finishes.
    pub fn value(mut self, value: impl Into<ValueSpec>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Sets the whitespace rule active within this production's extent.
    pub fn whitespace(mut self, whitespace: Rule) -> Self {
        self.whitespace = Some(whitespace);
        self
    }

    /// Marks this as a token production: whitespace is suspended inside.
    pub fn token(mut self) -> Self {
        self.token_production = true;
        self
    }

    /// Marks this production transparent: it emits no production events.
    pub fn transparent(mut self) -> Self {
        self.transparent = true;
        self
    }

    /// The production's name.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// A set of productions forming a grammar.
///
/// Grammars are immutable once built and shared by reference; a parse action
/// is a pure function of grammar and input.
pub struct Grammar {
    productions: Vec<Production>,
}

impl Grammar {
    /// Starts building a grammar.
    pub fn builder() -> GrammarBuilder {
        GrammarBuilder { slots: vec![] }
    }

    pub(crate) fn production(&self, id: ProdId) -> &Production {
        &self.productions[id.0]
    }

    /// The name of a production.
    pub fn name_of(&self, id: ProdId) -> &'static str {
        self.productions[id.0].name
    }
}

/// Collects productions and resolves forward references.
pub struct GrammarBuilder {
    slots: Vec<(&'static str, Option<Production>)>,
}

impl GrammarBuilder {
    /// Declares a production by name, to be defined later.
    ///
    /// This is how recursive rules obtain the [`ProdId`] for
    /// [`p`][crate::rule::p] before the production exists.
    pub fn declare(&mut self, name: &'static str) -> ProdId {
        self.slots.push((name, None));
        ProdId(self.slots.len() - 1)
    }

    /// Defines a previously declared production.
    pub fn define(&mut self, id: ProdId, production: Production) {
        let slot = &mut self.slots[id.0];
        assert!(
            slot.1.is_none(),
            "production {:?} defined twice",
            production.name
        );
        slot.1 = Some(production);
    }

    /// Declares and defines a production in one step.
    pub fn add(&mut self, production: Production) -> ProdId {
        self.slots.push((production.name, Some(production)));
        ProdId(self.slots.len() - 1)
    }

    /// Finishes the grammar.
    ///
    /// Panics if a declared production was never defined; that is a bug in
    /// the grammar, not a runtime condition.
    pub fn build(self) -> Grammar {
        let productions = self
            .slots
            .into_iter()
            .map(|(name, production)| {
                production.unwrap_or_else(|| panic!("production {name:?} declared but not defined"))
            })
            .collect();
        Grammar { productions }
    }
}
