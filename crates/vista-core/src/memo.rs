//! Render memoization.
//!
//! A *producer* is a plain function from props to a subtree. Calling it
//! through [`RenderContext::memo`] fingerprints the props, looks the pair
//! (producer, fingerprint) up in a [`RenderCache`], and only invokes the
//! producer on a miss.
//!
//! The cache holds the producer's pristine output weakly. Callers always
//! receive a deep clone of it, stamped with a [`MemoStamp`] that keeps the
//! pristine output alive for as long as the clone (or the live node the
//! stamp is later transferred to) exists. Live trees and the cache never
//! share a mutable node.
//!
//! Fingerprints render primitives in their literal textual form and every
//! `Rc` by the identity the [`IdentityRegistry`] assigns to its allocation.
//! Fields named `key` or `ref` are skipped, and props that carry children
//! bypass the cache entirely.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use vista_dom::{Node, WeakNode};

use crate::collections::HashMap;
use crate::identity::IdentityRegistry;

const RESERVED_FIELDS: [&str; 2] = ["key", "ref"];
const FIELD_SEPARATOR: char = '\u{1f}';
const NULL_SENTINEL: &str = "\0null";
const UNDEFINED_SENTINEL: &str = "\0undef";
const SOME_TAG: &str = "\0some:";
const MIN_CACHE_SWEEP: usize = 64;

/// A value that can be part of a props fingerprint.
pub trait FingerprintValue {
    fn write_fingerprint(&self, out: &mut String, identities: &mut IdentityRegistry);
}

fn push_literal(out: &mut String, literal: &str) {
    for ch in literal.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\0' => out.push_str("\\0"),
            '=' => out.push_str("\\="),
            FIELD_SEPARATOR => out.push_str("\\u"),
            other => out.push(other),
        }
    }
}

macro_rules! literal_fingerprint {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FingerprintValue for $ty {
                fn write_fingerprint(&self, out: &mut String, _identities: &mut IdentityRegistry) {
                    push_literal(out, &self.to_string());
                }
            }
        )*
    };
}

literal_fingerprint!(
    bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
);

impl FingerprintValue for str {
    fn write_fingerprint(&self, out: &mut String, _identities: &mut IdentityRegistry) {
        push_literal(out, self);
    }
}

impl FingerprintValue for String {
    fn write_fingerprint(&self, out: &mut String, identities: &mut IdentityRegistry) {
        self.as_str().write_fingerprint(out, identities);
    }
}

impl<T: FingerprintValue + ?Sized> FingerprintValue for &T {
    fn write_fingerprint(&self, out: &mut String, identities: &mut IdentityRegistry) {
        (**self).write_fingerprint(out, identities);
    }
}

impl<T: FingerprintValue> FingerprintValue for Option<T> {
    fn write_fingerprint(&self, out: &mut String, identities: &mut IdentityRegistry) {
        match self {
            Some(value) => {
                out.push_str(SOME_TAG);
                value.write_fingerprint(out, identities);
            }
            None => out.push_str(NULL_SENTINEL),
        }
    }
}

impl FingerprintValue for () {
    fn write_fingerprint(&self, out: &mut String, _identities: &mut IdentityRegistry) {
        out.push_str(UNDEFINED_SENTINEL);
    }
}

impl<T: ?Sized + 'static> FingerprintValue for Rc<T> {
    fn write_fingerprint(&self, out: &mut String, identities: &mut IdentityRegistry) {
        let id = identities.object_id(self);
        out.push_str("\0#");
        out.push_str(&id.to_string());
    }
}

/// Accumulates `name=value` pairs into a fingerprint string.
pub struct Fingerprinter<'a> {
    out: String,
    identities: &'a mut IdentityRegistry,
}

impl<'a> Fingerprinter<'a> {
    pub fn new(identities: &'a mut IdentityRegistry) -> Self {
        Self {
            out: String::new(),
            identities,
        }
    }

    pub fn field<V: FingerprintValue + ?Sized>(&mut self, name: &str, value: &V) -> &mut Self {
        if RESERVED_FIELDS.contains(&name) {
            return self;
        }
        push_literal(&mut self.out, name);
        self.out.push('=');
        value.write_fingerprint(&mut self.out, self.identities);
        self.out.push(FIELD_SEPARATOR);
        self
    }

    pub fn finish(self) -> String {
        self.out
    }
}

/// Inputs of a memoizable producer.
pub trait Props: 'static {
    fn fingerprint(&self, f: &mut Fingerprinter<'_>);

    /// Props carrying child content are unique to their usage site and
    /// are never memoized.
    fn has_children(&self) -> bool {
        false
    }
}

pub type Producer<P> = fn(&RenderContext, &P) -> Node;

pub type ProducerId = usize;

fn producer_id<P>(producer: Producer<P>) -> ProducerId {
    producer as usize
}

/// Annotation stamped on memoized outputs.
#[derive(Clone)]
pub struct MemoStamp {
    producer: ProducerId,
    fingerprint: Rc<str>,
    origin: Option<Node>,
}

impl MemoStamp {
    pub fn producer(&self) -> ProducerId {
        self.producer
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Whether both stamps come from the same producer called with the
    /// same inputs.
    pub fn same_output(&self, other: &MemoStamp) -> bool {
        self.producer == other.producer && self.fingerprint == other.fingerprint
    }
}

impl fmt::Debug for MemoStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoStamp")
            .field("producer", &self.producer)
            .field("fingerprint", &self.fingerprint)
            .field("pristine", &self.origin.is_none())
            .finish()
    }
}

/// Reads the memo stamp off `node`, if it carries one.
pub fn memo_stamp(node: &Node) -> Option<Rc<MemoStamp>> {
    node.annotation()?.downcast::<MemoStamp>().ok()
}

/// (producer, fingerprint) -> weakly held pristine output.
///
/// Entries whose output was collected are evicted on lookup, and in bulk
/// whenever the cache has doubled since the last sweep.
pub struct RenderCache {
    producers: HashMap<ProducerId, HashMap<Rc<str>, WeakNode>>,
    sweep_at: usize,
}

impl RenderCache {
    pub fn new() -> Self {
        Self {
            producers: HashMap::new(),
            sweep_at: MIN_CACHE_SWEEP,
        }
    }

    /// Returns the cached output, evicting the entry if it was collected.
    pub fn get(&mut self, producer: ProducerId, fingerprint: &str) -> Option<Node> {
        let entries = self.producers.get_mut(&producer)?;
        let weak = entries.get(fingerprint)?;
        match weak.upgrade() {
            Some(node) => Some(node),
            None => {
                entries.remove(fingerprint);
                if entries.is_empty() {
                    self.producers.remove(&producer);
                }
                None
            }
        }
    }

    /// Stores `node` for the pair; `None` clears the entry.
    pub fn put(&mut self, producer: ProducerId, fingerprint: Rc<str>, node: Option<&Node>) {
        match node {
            Some(node) => {
                self.producers
                    .entry(producer)
                    .or_default()
                    .insert(fingerprint, node.downgrade());
                let len = self.len();
                if len >= self.sweep_at {
                    let evicted = self.prune();
                    log::trace!("render cache sweep evicted {evicted} of {len} entries");
                    self.sweep_at = (self.len() * 2).max(MIN_CACHE_SWEEP);
                }
            }
            None => {
                if let Some(entries) = self.producers.get_mut(&producer) {
                    entries.remove(&*fingerprint);
                    if entries.is_empty() {
                        self.producers.remove(&producer);
                    }
                }
            }
        }
    }

    pub fn prune(&mut self) -> usize {
        let mut evicted = 0;
        self.producers.retain(|_, entries| {
            let before = entries.len();
            entries.retain(|_, weak| weak.is_alive());
            evicted += before - entries.len();
            !entries.is_empty()
        });
        evicted
    }

    pub fn len(&self) -> usize {
        self.producers.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }
}

impl Default for RenderCache {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
}

struct RenderContextInner {
    cache: RefCell<RenderCache>,
    identities: RefCell<IdentityRegistry>,
    hits: Cell<usize>,
    misses: Cell<usize>,
}

/// Handed to every render function. Owns the render cache and the
/// identity registry of one runtime.
#[derive(Clone)]
pub struct RenderContext {
    inner: Rc<RenderContextInner>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RenderContextInner {
                cache: RefCell::new(RenderCache::new()),
                identities: RefCell::new(IdentityRegistry::new()),
                hits: Cell::new(0),
                misses: Cell::new(0),
            }),
        }
    }

    pub fn fingerprint<P: Props + ?Sized>(&self, props: &P) -> Rc<str> {
        let mut identities = self.inner.identities.borrow_mut();
        let mut fingerprinter = Fingerprinter::new(&mut identities);
        props.fingerprint(&mut fingerprinter);
        Rc::from(fingerprinter.finish())
    }

    /// Calls `producer` unless an equal call is cached.
    pub fn memo<P: Props>(&self, producer: Producer<P>, props: &P) -> Node {
        if props.has_children() {
            log::trace!("memo bypass: props carry children");
            return producer(self, props);
        }
        let id = producer_id(producer);
        let fingerprint = self.fingerprint(props);
        if let Some(hit) = self.lookup(id, &fingerprint) {
            return hit;
        }
        self.inner.misses.set(self.inner.misses.get() + 1);
        log::trace!("memo miss for producer {id:#x}");
        let output = producer(self, props);
        match self.store(id, fingerprint, Some(&output)) {
            Some(copy) => copy,
            None => output,
        }
    }

    /// Cache lookup without invoking the producer.
    pub fn cache_get<P: Props>(&self, producer: Producer<P>, props: &P) -> Option<Node> {
        let fingerprint = self.fingerprint(props);
        self.lookup(producer_id(producer), &fingerprint)
    }

    /// Caches `output` as the result of `producer(props)`; `None` clears
    /// the entry. Returns the stamped copy callers should use.
    pub fn cache_put<P: Props>(
        &self,
        producer: Producer<P>,
        props: &P,
        output: Option<&Node>,
    ) -> Option<Node> {
        let fingerprint = self.fingerprint(props);
        self.store(producer_id(producer), fingerprint, output)
    }

    pub fn stats(&self) -> MemoStats {
        MemoStats {
            hits: self.inner.hits.get(),
            misses: self.inner.misses.get(),
            entries: self.inner.cache.borrow().len(),
        }
    }

    /// Sweeps collected cache entries and freed identities.
    pub fn prune(&self) -> usize {
        let evicted = self.inner.cache.borrow_mut().prune();
        self.inner.identities.borrow_mut().prune();
        evicted
    }

    fn lookup(&self, producer: ProducerId, fingerprint: &Rc<str>) -> Option<Node> {
        let pristine = self.inner.cache.borrow_mut().get(producer, fingerprint)?;
        self.inner.hits.set(self.inner.hits.get() + 1);
        log::trace!("memo hit for producer {producer:#x}");
        Some(stamped_copy(&pristine, producer, Rc::clone(fingerprint)))
    }

    fn store(
        &self,
        producer: ProducerId,
        fingerprint: Rc<str>,
        output: Option<&Node>,
    ) -> Option<Node> {
        let output = output?;
        output.set_annotation(Some(Rc::new(MemoStamp {
            producer,
            fingerprint: Rc::clone(&fingerprint),
            origin: None,
        })));
        self.inner
            .cache
            .borrow_mut()
            .put(producer, Rc::clone(&fingerprint), Some(output));
        Some(stamped_copy(output, producer, fingerprint))
    }
}

fn stamped_copy(pristine: &Node, producer: ProducerId, fingerprint: Rc<str>) -> Node {
    let copy = pristine.clone_node(true);
    copy.set_annotation(Some(Rc::new(MemoStamp {
        producer,
        fingerprint,
        origin: Some(pristine.clone()),
    })));
    copy
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("stats", &self.stats())
            .finish()
    }
}
