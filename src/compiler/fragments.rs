//! Fragment expansion.
//!
//! Fragment bodies compile to rules addressed relative to the fragment. A
//! spread does not copy those rules when it is walked: the fragment may not be
//! compiled yet. Instead the spread leaves a [`Slot::Splice`] at its position,
//! and [`FragmentResolver::finish`] fills every slot once the whole document
//! has been walked.
//!
//! Fragments are expanded in declaration order, so a fragment may only spread
//! fragments declared before it. Spreads from operations may target any
//! fragment in the document.

use std::fmt;

use indexmap::IndexMap;

use super::CompileError;
use crate::program::{FragmentTable, Rule};

/// Where rules are being collected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// The operation program
    Program,
    /// The body of the named fragment
    Fragment(String),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Program => write!(f, "operation"),
            Target::Fragment(name) => write!(f, "fragment {}", name),
        }
    }
}

/// A collected rule, or the position of a pending fragment splice
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Rule(Rule),
    Splice(usize),
}

/// A spread waiting for its fragment's rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Splice {
    /// Collection the spread appeared in
    pub target: Target,
    /// Address of the spread within that collection
    pub prefix: String,
    /// Name of the spread fragment
    pub fragment: String,
}

/// Collects rules and pending splices during a walk
#[derive(Debug, Default)]
pub struct FragmentResolver {
    program: Vec<Slot>,
    fragments: IndexMap<String, Vec<Slot>>,
    splices: Vec<Splice>,
}

impl FragmentResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start collecting the body of fragment `name`
    pub fn declare(&mut self, name: &str) -> Result<(), CompileError> {
        if self.fragments.contains_key(name) {
            return Err(CompileError::DuplicateFragment(name.to_string()));
        }
        self.fragments.insert(name.to_string(), Vec::new());
        Ok(())
    }

    fn slots(&mut self, target: &Target) -> &mut Vec<Slot> {
        match target {
            Target::Program => &mut self.program,
            Target::Fragment(name) => self.fragments.entry(name.clone()).or_default(),
        }
    }

    /// Append a rule to `target`
    pub fn push(&mut self, target: &Target, rule: Rule) {
        self.slots(target).push(Slot::Rule(rule));
    }

    /// Reserve the position of a spread of `fragment` at address `prefix`
    pub fn enqueue(&mut self, target: &Target, prefix: String, fragment: String) {
        let index = self.splices.len();
        self.splices.push(Splice {
            target: target.clone(),
            prefix,
            fragment,
        });
        self.slots(target).push(Slot::Splice(index));
    }

    /// Expand every splice
    ///
    /// # Returns
    ///
    /// * `Ok((rules, table))` - the program's rules in walk order (shallow
    ///   first) and each fragment's fully expanded rules
    /// * `Err(CompileError::UnknownFragment)` - a spread names no fragment
    /// * `Err(CompileError::ForwardFragment)` - a fragment spreads itself or a
    ///   fragment declared after it
    pub fn finish(self) -> Result<(Vec<Rule>, FragmentTable), CompileError> {
        let FragmentResolver {
            program,
            fragments,
            splices,
        } = self;
        let declared: Vec<String> = fragments.keys().cloned().collect();

        let mut table = FragmentTable::new();
        for (name, slots) in fragments {
            let rules = expand(slots, &table, &splices, &declared)?;
            table.insert(name, rules);
        }

        let rules = expand(program, &table, &splices, &declared)?;
        Ok((rules, table))
    }
}

fn expand(
    slots: Vec<Slot>,
    table: &FragmentTable,
    splices: &[Splice],
    declared: &[String],
) -> Result<Vec<Rule>, CompileError> {
    let mut rules = Vec::with_capacity(slots.len());

    for slot in slots {
        let index = match slot {
            Slot::Rule(rule) => {
                rules.push(rule);
                continue;
            }
            Slot::Splice(index) => index,
        };

        let splice = &splices[index];
        let Some(body) = table.get(&splice.fragment) else {
            let referenced_from = splice.target.to_string();
            return Err(if declared.contains(&splice.fragment) {
                CompileError::ForwardFragment {
                    fragment: splice.fragment.clone(),
                    referenced_from,
                }
            } else {
                CompileError::UnknownFragment {
                    fragment: splice.fragment.clone(),
                    referenced_from,
                }
            });
        };

        tracing::debug!(
            fragment = %splice.fragment,
            prefix = %splice.prefix,
            rules = body.len(),
            "Splicing fragment"
        );
        rules.extend(body.iter().map(|rule| rule.prefixed(&splice.prefix)));
    }

    Ok(rules)
}
