//! The value pipeline.
//!
//! Rules append [`Value`]s to the running production's argument pack; when
//! the production finishes, its value specification turns the pack into the
//! production's result. A specification is a [`Callback`] (applied to the
//! whole pack), a [`SinkSpec`] (fed incrementally by list-shaped rules), or
//! a sink piped into a callback with `>>`.

use std::{any::Any, fmt, rc::Rc, sync::Arc};

use crate::reader::Span;

/// A dynamically typed value produced by rules and callbacks.
#[derive(Clone)]
pub enum Value {
    /// The sentinel produced by `opt` when the branch was not taken.
    Nil,
    /// A boolean.
    Bool(bool),
    /// A single character.
    Char(char),
    /// A signed integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// An input position.
    Pos(usize),
    /// A consumed span of the input.
    Lexeme(Span),
    /// An owned string.
    Str(String),
    /// An ordered list of values.
    List(Vec<Value>),
    /// Named fields of an aggregate, in assignment order.
    Record(Vec<(String, Value)>),
    /// An arbitrary user value.
    Any(Rc<dyn Any>),
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("Nil"),
            Value::Bool(v) => write!(f, "Bool({v})"),
            Value::Char(v) => write!(f, "Char({v:?})"),
            Value::Int(v) => write!(f, "Int({v})"),
            Value::Float(v) => write!(f, "Float({v})"),
            Value::Pos(v) => write!(f, "Pos({v})"),
            Value::Lexeme(v) => write!(f, "Lexeme({}..{})", v.begin, v.end),
            Value::Str(v) => write!(f, "Str({v:?})"),
            Value::List(v) => f.debug_tuple("List").field(v).finish(),
            Value::Record(v) => f.debug_tuple("Record").field(v).finish(),
            Value::Any(_) => f.write_str("Any(..)"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Pos(a), Value::Pos(b)) => a == b,
            (Value::Lexeme(a), Value::Lexeme(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Any(a), Value::Any(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Value {
    /// Wraps a user value.
    pub fn any(value: impl Any) -> Self {
        Value::Any(Rc::new(value))
    }

    /// The contained character, if any.
    pub fn as_char(&self) -> Option<char> {
        match self {
            Value::Char(c) => Some(*c),
            _ => None,
        }
    }

    /// The contained integer, if any.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The contained span, if any.
    pub fn as_lexeme(&self) -> Option<Span> {
        match self {
            Value::Lexeme(span) => Some(*span),
            _ => None,
        }
    }

    /// The contained string, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The contained list, if any.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Whether this is the `opt` sentinel.
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Borrows the contained user value, if it has type `T`.
    pub fn downcast<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Any(value) => value.downcast_ref(),
            _ => None,
        }
    }
}

/// The mutable parse state passed through an action, if any.
pub type StateRef<'a> = Option<&'a mut dyn Any>;

/// A callable that turns an argument pack into a value.
#[derive(Clone)]
pub struct Callback {
    f: Arc<dyn Fn(StateRef, &[Value]) -> Value>,
}

impl Callback {
    /// Creates a callback with access to the parse state.
    pub fn new(f: impl Fn(StateRef, &[Value]) -> Value + 'static) -> Self {
        Callback { f: Arc::new(f) }
    }

    /// Creates a callback that ignores the parse state.
    pub fn pure(f: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Callback::new(move |_, args| f(args))
    }

    /// Forwards a single argument unchanged, or the whole pack as a list.
    pub fn forward() -> Self {
        Callback::pure(|args| match args {
            [single] => single.clone(),
            _ => Value::List(args.to_vec()),
        })
    }

    /// Always returns a clone of `value`.
    pub fn constant(value: Value) -> Self {
        Callback::pure(move |_| value.clone())
    }

    /// Applies the callback.
    pub fn invoke(&self, state: StateRef, args: &[Value]) -> Value {
        (self.f)(state, args)
    }

    /// Composes callbacks: `self` first, then `next` on its result.
    pub fn then(self, next: Callback) -> Callback {
        Callback::new(move |mut state, args| {
            let first = self.invoke(state.as_deref_mut(), args);
            next.invoke(state, &[first])
        })
    }
}

/// Composition `first | second`: apply `second` to the result of `first`.
impl std::ops::BitOr for Callback {
    type Output = Callback;

    fn bitor(self, rhs: Callback) -> Callback {
        self.then(rhs)
    }
}

/// An incremental accumulator fed by list-shaped rules.
pub trait Sink {
    /// Consumes the arguments of one item.
    fn add(&mut self, args: Vec<Value>);

    /// Produces the accumulated value.
    fn finish(self: Box<Self>) -> Value;
}

/// A factory for [`Sink`] instances.
///
/// The factory receives the parse state, which is how state-owned allocators
/// or capacity hints are injected into the produced containers.
#[derive(Clone)]
pub struct SinkSpec {
    make: Arc<dyn Fn(StateRef) -> Box<dyn Sink>>,
}

impl SinkSpec {
    /// Creates a sink specification from a factory.
    pub fn new(make: impl Fn(StateRef) -> Box<dyn Sink> + 'static) -> Self {
        SinkSpec { make: Arc::new(make) }
    }

    /// Instantiates a sink for one list rule.
    pub fn build(&self, state: StateRef) -> Box<dyn Sink> {
        (self.make)(state)
    }
}

/// Piping `sink >> callback`: drain the sink, then apply the callback.
impl std::ops::Shr<Callback> for SinkSpec {
    type Output = ValueSpec;

    fn shr(self, rhs: Callback) -> ValueSpec {
        ValueSpec::SinkThen(self, rhs)
    }
}

/// A production's value specification.
#[derive(Clone)]
pub enum ValueSpec {
    /// Apply a callback to the full argument pack.
    Callback(Callback),
    /// Feed list items into a sink; its result is the produced value.
    Sink(SinkSpec),
    /// Feed a sink, then apply a callback to the pack (sink result included).
    SinkThen(SinkSpec, Callback),
}

impl ValueSpec {
    pub(crate) fn sink(&self) -> Option<&SinkSpec> {
        match self {
            ValueSpec::Sink(sink) | ValueSpec::SinkThen(sink, _) => Some(sink),
            ValueSpec::Callback(_) => None,
        }
    }
}

impl From<Callback> for ValueSpec {
    fn from(cb: Callback) -> Self {
        ValueSpec::Callback(cb)
    }
}

impl From<SinkSpec> for ValueSpec {
    fn from(sink: SinkSpec) -> Self {
        ValueSpec::Sink(sink)
    }
}

struct ListSink {
    items: Vec<Value>,
    dedup: bool,
}

impl Sink for ListSink {
    fn add(&mut self, args: Vec<Value>) {
        for arg in args {
            if self.dedup && self.items.contains(&arg) {
                continue;
            }
            self.items.push(arg);
        }
    }

    fn finish(self: Box<Self>) -> Value {
        Value::List(self.items)
    }
}

/// An ordered, duplicate-preserving list sink.
pub fn as_list() -> SinkSpec {
    SinkSpec::new(|_| {
        Box::new(ListSink {
            items: vec![],
            dedup: false,
        })
    })
}

/// A set-like sink that drops duplicate values.
pub fn as_collection() -> SinkSpec {
    SinkSpec::new(|_| {
        Box::new(ListSink {
            items: vec![],
            dedup: true,
        })
    })
}

struct ConcatSink {
    items: Vec<Value>,
}

impl Sink for ConcatSink {
    fn add(&mut self, args: Vec<Value>) {
        for arg in args {
            match arg {
                Value::List(sub) => self.items.extend(sub),
                Value::Nil => {}
                other => self.items.push(other),
            }
        }
    }

    fn finish(self: Box<Self>) -> Value {
        Value::List(self.items)
    }
}

/// A sink that concatenates sub-containers into one list.
pub fn concat() -> SinkSpec {
    SinkSpec::new(|_| Box::new(ConcatSink { items: vec![] }))
}

struct FoldSink {
    acc: Value,
    step: Arc<dyn Fn(Value, Vec<Value>) -> Value>,
}

impl Sink for FoldSink {
    fn add(&mut self, args: Vec<Value>) {
        let acc = std::mem::replace(&mut self.acc, Value::Nil);
        self.acc = (self.step)(acc, args);
    }

    fn finish(self: Box<Self>) -> Value {
        self.acc
    }
}

/// A sink folding each item's arguments into an accumulator.
pub fn fold(init: Value, step: impl Fn(Value, Vec<Value>) -> Value + 'static) -> SinkSpec {
    let step: Arc<dyn Fn(Value, Vec<Value>) -> Value> = Arc::new(step);
    SinkSpec::new(move |_| {
        Box::new(FoldSink {
            acc: init.clone(),
            step: step.clone(),
        })
    })
}

struct AggregateSink {
    fields: Vec<(String, Value)>,
}

impl Sink for AggregateSink {
    fn add(&mut self, args: Vec<Value>) {
        // Items arrive as (member-tag, value) pairs.
        let mut args = args.into_iter();
        while let Some(tag) = args.next() {
            let name = match tag {
                Value::Str(name) => name,
                other => panic!("aggregate member tag must be a string, got {other:?}"),
            };
            let value = args.next().unwrap_or(Value::Nil);
            if let Some(field) = self.fields.iter_mut().find(|(n, _)| *n == name) {
                field.1 = value;
            } else {
                self.fields.push((name, value));
            }
        }
    }

    fn finish(self: Box<Self>) -> Value {
        Value::Record(self.fields)
    }
}

/// A sink assigning `(member-tag, value)` pairs into a record.
///
/// The record starts out empty (the default-initialized aggregate); later
/// assignments to the same tag overwrite earlier ones.
pub fn as_aggregate() -> SinkSpec {
    SinkSpec::new(|_| Box::new(AggregateSink { fields: vec![] }))
}

/// A placeholder or pre-bound argument of a [`bind`] callback.
#[derive(Clone)]
pub enum BindArg {
    /// Expands to the full argument pack.
    Values,
    /// The `n`th produced argument, 1-indexed.
    Nth {
        /// 1-based index into the pack.
        n: usize,
        /// Used when the pack has fewer than `n` arguments.
        fallback: Option<Value>,
        /// Applied to the selected argument.
        map: Option<Arc<dyn Fn(Value) -> Value>>,
    },
    /// The ambient parse state, mapped into a value.
    ParseState {
        /// Extracts a value from the state; required to use the state.
        map: Arc<dyn Fn(&mut dyn Any) -> Value>,
    },
    /// A fixed value.
    Const(Value),
}

/// Placeholder expanding to the full argument pack.
pub fn values() -> BindArg {
    BindArg::Values
}

/// Placeholder for the `n`th produced argument, 1-indexed.
pub fn nth_value(n: usize) -> BindArg {
    assert!(n >= 1, "nth_value is 1-indexed");
    BindArg::Nth {
        n,
        fallback: None,
        map: None,
    }
}

/// Placeholder extracting a value from the parse state.
pub fn parse_state(map: impl Fn(&mut dyn Any) -> Value + 'static) -> BindArg {
    BindArg::ParseState { map: Arc::new(map) }
}

impl BindArg {
    /// Supplies a fallback for a missing argument.
    pub fn or(self, fallback: Value) -> BindArg {
        match self {
            BindArg::Nth { n, map, .. } => BindArg::Nth {
                n,
                fallback: Some(fallback),
                map,
            },
            other => other,
        }
    }

    /// Post-processes the selected argument.
    pub fn map(self, f: impl Fn(Value) -> Value + 'static) -> BindArg {
        match self {
            BindArg::Nth { n, fallback, .. } => BindArg::Nth {
                n,
                fallback,
                map: Some(Arc::new(f)),
            },
            other => other,
        }
    }
}

/// Binds a callback's arguments to placeholders and fixed values.
///
/// The bound callback evaluates each [`BindArg`] against the produced
/// argument pack and the parse state, then invokes `callback` on the result.
/// Using [`parse_state`] in a binding makes the parse state mandatory; an
/// action without state will panic when such a callback is applied.
pub fn bind(callback: Callback, bound: Vec<BindArg>) -> Callback {
    Callback::new(move |mut state, args| {
        let mut actual = Vec::with_capacity(args.len());
        for arg in &bound {
            match arg {
                BindArg::Values => actual.extend_from_slice(args),
                BindArg::Nth { n, fallback, map } => {
                    let value = match args.get(n - 1) {
                        Some(value) => value.clone(),
                        None => fallback
                            .clone()
                            .expect("bound argument index out of range and no fallback given"),
                    };
                    actual.push(match map {
                        Some(map) => map(value),
                        None => value,
                    });
                }
                BindArg::ParseState { map } => {
                    let state = state
                        .as_deref_mut()
                        .expect("callback binding requires a parse state");
                    actual.push(map(state));
                }
                BindArg::Const(value) => actual.push(value.clone()),
            }
        }
        callback.invoke(state, &actual)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_and_composition() {
        let cb = Callback::forward();
        assert_eq!(cb.invoke(None, &[Value::Int(3)]), Value::Int(3));

        let double = Callback::pure(|args| Value::Int(args[0].as_int().unwrap() * 2));
        let succ = Callback::pure(|args| Value::Int(args[0].as_int().unwrap() + 1));
        let both = double | succ;
        assert_eq!(both.invoke(None, &[Value::Int(5)]), Value::Int(11));
    }

    #[test]
    fn list_and_collection_sinks() {
        let mut sink = as_list().build(None);
        sink.add(vec![Value::Int(1)]);
        sink.add(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(
            sink.finish(),
            Value::List(vec![Value::Int(1), Value::Int(1), Value::Int(2)])
        );

        let mut sink = as_collection().build(None);
        sink.add(vec![Value::Int(1)]);
        sink.add(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(sink.finish(), Value::List(vec![Value::Int(1), Value::Int(2)]));
    }

    #[test]
    fn concat_flattens() {
        let mut sink = concat().build(None);
        sink.add(vec![Value::List(vec![Value::Int(1), Value::Int(2)])]);
        sink.add(vec![Value::List(vec![Value::Int(3)]), Value::Int(4)]);
        assert_eq!(
            sink.finish(),
            Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)])
        );
    }

    #[test]
    fn fold_accumulates() {
        let sum = fold(Value::Int(0), |acc, args| {
            let mut total = acc.as_int().unwrap();
            for arg in args {
                total += arg.as_int().unwrap();
            }
            Value::Int(total)
        });
        let mut sink = sum.build(None);
        sink.add(vec![Value::Int(1)]);
        sink.add(vec![Value::Int(2), Value::Int(3)]);
        assert_eq!(sink.finish(), Value::Int(6));
    }

    #[test]
    fn aggregate_overwrites_fields() {
        let mut sink = as_aggregate().build(None);
        sink.add(vec![Value::Str("a".into()), Value::Int(1)]);
        sink.add(vec![Value::Str("b".into()), Value::Int(2)]);
        sink.add(vec![Value::Str("a".into()), Value::Int(3)]);
        assert_eq!(
            sink.finish(),
            Value::Record(vec![
                ("a".to_string(), Value::Int(3)),
                ("b".to_string(), Value::Int(2)),
            ])
        );
    }

    #[test]
    fn binding_placeholders() {
        let cb = Callback::pure(|args| Value::List(args.to_vec()));
        let bound = bind(
            cb,
            vec![
                nth_value(2),
                nth_value(5).or(Value::Nil),
                BindArg::Const(Value::Bool(true)),
            ],
        );
        let out = bound.invoke(None, &[Value::Int(1), Value::Int(2)]);
        assert_eq!(
            out,
            Value::List(vec![Value::Int(2), Value::Nil, Value::Bool(true)])
        );
    }

    #[test]
    fn binding_reads_state() {
        struct Counter(i64);
        let cb = Callback::pure(|args| args[0].clone());
        let bound = bind(
            cb,
            vec![parse_state(|state| {
                Value::Int(state.downcast_ref::<Counter>().unwrap().0)
            })],
        );
        let mut state = Counter(7);
        let out = bound.invoke(Some(&mut state), &[]);
        assert_eq!(out, Value::Int(7));
    }
}
