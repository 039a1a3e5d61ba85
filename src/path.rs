//! Dotted response addresses and broadcasting access into JSON trees.
//!
//! An address such as `result.edges.node` names a place in a response by its
//! response keys. Arrays met while walking an address are crossed implicitly:
//! the remaining segments are resolved against every element, so one address
//! can match zero, one or many concrete locations.

use std::fmt;

use serde_json::{Map, Value};

/// A dotted address into a response tree
///
/// # Examples
///
/// - `""` - the tree itself
/// - `user.name` - key `name` of key `user`
/// - `items.name` - key `name` of every element when `items` is an array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    /// The raw address string
    pub raw: String,
    /// Parsed address segments (response keys)
    pub segments: Vec<String>,
}

impl FieldPath {
    /// Parse a dotted address
    ///
    /// Empty segments are ignored, so `""` and `"."` both denote the root.
    ///
    /// # Example
    ///
    /// ```
    /// use graphql_shape::path::FieldPath;
    ///
    /// let path = FieldPath::parse("user.address.city");
    /// assert_eq!(path.segments.len(), 3);
    /// ```
    pub fn parse(path: &str) -> Self {
        let segments = path
            .split('.')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            raw: path.to_string(),
            segments,
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// One step of a concrete location
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathKey {
    /// A key within an object
    Key(String),
    /// An index within an array
    Index(usize),
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathKey::Key(key) => write!(f, "{}", key),
            PathKey::Index(index) => write!(f, "[{}]", index),
        }
    }
}

/// A concrete location in a tree, as produced by [`locate`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    keys: Vec<PathKey>,
}

impl Location {
    /// The location of the tree itself
    pub fn root() -> Self {
        Self::default()
    }

    /// Key or index of this location within its parent, `None` at the root
    pub fn key(&self) -> Option<&PathKey> {
        self.keys.last()
    }

    fn child(&self, key: PathKey) -> Self {
        let mut keys = self.keys.clone();
        keys.push(key);
        Self { keys }
    }

    /// Value at this location
    pub fn get<'v>(&self, tree: &'v Value) -> Option<&'v Value> {
        follow(tree, &self.keys)
    }

    /// Mutable value at this location
    pub fn get_mut<'v>(&self, tree: &'v mut Value) -> Option<&'v mut Value> {
        follow_mut(tree, &self.keys)
    }

    /// Container directly enclosing this location, `None` at the root
    pub fn parent<'v>(&self, tree: &'v Value) -> Option<&'v Value> {
        let (_, parent_keys) = self.keys.split_last()?;
        follow(tree, parent_keys)
    }

    /// Mutable container directly enclosing this location
    pub fn parent_mut<'v>(&self, tree: &'v mut Value) -> Option<&'v mut Value> {
        let (_, parent_keys) = self.keys.split_last()?;
        follow_mut(tree, parent_keys)
    }

    /// Replace the value at this location
    ///
    /// Replacing at the root swaps the whole tree. Returns `false` when the
    /// location no longer exists.
    pub fn set(&self, tree: &mut Value, value: Value) -> bool {
        match self.get_mut(tree) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.keys.is_empty() {
            return write!(f, "$");
        }
        for (i, key) in self.keys.iter().enumerate() {
            match key {
                PathKey::Key(k) if i > 0 => write!(f, ".{}", k)?,
                other => write!(f, "{}", other)?,
            }
        }
        Ok(())
    }
}

fn step<'v>(node: &'v Value, key: &PathKey) -> Option<&'v Value> {
    match (node, key) {
        (Value::Object(map), PathKey::Key(k)) => map.get(k),
        (Value::Array(items), PathKey::Index(i)) => items.get(*i),
        _ => None,
    }
}

fn step_mut<'v>(node: &'v mut Value, key: &PathKey) -> Option<&'v mut Value> {
    match (node, key) {
        (Value::Object(map), PathKey::Key(k)) => map.get_mut(k),
        (Value::Array(items), PathKey::Index(i)) => items.get_mut(*i),
        _ => None,
    }
}

fn follow<'v>(tree: &'v Value, keys: &[PathKey]) -> Option<&'v Value> {
    keys.iter().try_fold(tree, step)
}

fn follow_mut<'v>(tree: &'v mut Value, keys: &[PathKey]) -> Option<&'v mut Value> {
    keys.iter().try_fold(tree, step_mut)
}

/// Resolve an address to every concrete location it matches
///
/// Whenever the node reached is an array while segments remain, the rest of
/// the address is resolved against each element. Missing keys and scalars in
/// the middle of an address contribute no locations.
pub fn locate(tree: &Value, path: &FieldPath) -> Vec<Location> {
    let mut found = Vec::new();
    collect(tree, &path.segments, Location::root(), &mut found);
    found
}

fn collect(node: &Value, segments: &[String], at: Location, found: &mut Vec<Location>) {
    let Some((head, rest)) = segments.split_first() else {
        found.push(at);
        return;
    };

    match node {
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                collect(item, segments, at.child(PathKey::Index(index)), found);
            }
        }
        Value::Object(map) => {
            if let Some(child) = map.get(head) {
                collect(child, rest, at.child(PathKey::Key(head.clone())), found);
            }
        }
        _ => {}
    }
}

/// Values matched by an address, in traversal order
pub fn read<'v>(tree: &'v Value, path: &FieldPath) -> Vec<&'v Value> {
    locate(tree, path)
        .iter()
        .filter_map(|location| location.get(tree))
        .collect()
}

/// What a visitor can see of the tree around the value it is rewriting
pub struct MatchContext<'t> {
    root: &'t Value,
    location: &'t Location,
}

impl<'t> MatchContext<'t> {
    /// Build a context for a location within `root`
    pub fn new(root: &'t Value, location: &'t Location) -> Self {
        Self { root, location }
    }

    /// The whole tree, as it was when the visitor was called
    pub fn root(&self) -> &'t Value {
        self.root
    }

    /// Structural container (object or array) of the matched value
    pub fn parent(&self) -> Option<&'t Value> {
        self.location.parent(self.root)
    }

    /// Key or index of the matched value within its parent
    pub fn key(&self) -> Option<&'t PathKey> {
        self.location.key()
    }

    /// Concrete location of the matched value
    pub fn location(&self) -> &'t Location {
        self.location
    }
}

type Mutation = Box<dyn FnOnce(&mut Map<String, Value>, &str)>;

/// Structural mutations queued while a visitor runs
///
/// Each mutation receives the parent object of the match and the match's key.
/// The queue is flushed by [`write`] after the visitor's result has been
/// stored, never while the visitor is still running.
#[derive(Default)]
pub struct Deferred {
    queue: Vec<Mutation>,
}

impl Deferred {
    /// Queue a mutation of the match's parent object
    pub fn push<F>(&mut self, mutation: F)
    where
        F: FnOnce(&mut Map<String, Value>, &str) + 'static,
    {
        self.queue.push(Box::new(mutation));
    }

    fn flush(self, tree: &mut Value, location: &Location) {
        if self.queue.is_empty() {
            return;
        }

        let Some(PathKey::Key(key)) = location.key().cloned() else {
            tracing::debug!(
                location = %location,
                dropped = self.queue.len(),
                "Dropping structural mutations: match is not keyed within an object"
            );
            return;
        };

        match location.parent_mut(tree) {
            Some(Value::Object(parent)) => {
                for mutation in self.queue {
                    mutation(parent, &key);
                }
            }
            _ => {
                tracing::debug!(location = %location, "Dropping structural mutations: parent vanished");
            }
        }
    }
}

/// Rewrite every value matched by an address
///
/// For each match the visitor receives the current value (owned), a
/// [`MatchContext`] over the unmodified tree and a [`Deferred`] queue. The
/// returned value replaces the match, then the queued mutations are applied to
/// the match's parent before the next match is visited.
///
/// # Returns
///
/// * `Ok(count)` - number of locations rewritten
/// * `Err(E)` - the first visitor error; earlier matches stay rewritten
pub fn write<F, E>(tree: &mut Value, path: &FieldPath, mut visitor: F) -> Result<usize, E>
where
    F: FnMut(Value, &MatchContext<'_>, &mut Deferred) -> Result<Value, E>,
{
    let locations = locate(tree, path);
    let mut written = 0;

    for location in &locations {
        let Some(current) = location.get(tree).cloned() else {
            continue;
        };

        let mut deferred = Deferred::default();
        let next = {
            let context = MatchContext::new(tree, location);
            visitor(current, &context, &mut deferred)?
        };

        if location.set(tree, next) {
            deferred.flush(tree, location);
            written += 1;
        }
    }

    Ok(written)
}
