//! Compressed radix tree over path segments.
//!
//! One tree exists per HTTP method. Static text is stored in compressed
//! prefixes (a node holds the longest common prefix before any divergence),
//! static children are partitioned by leading byte, and each node carries at
//! most one `:param` child and at most one `*catchall` child. That shape
//! makes two param children at the same position unrepresentable.
//!
//! Matching applies the precedence static > param > catch-all at every node
//! and backtracks when a deeper static descent dead-ends, so `/:cc/cc`
//! still matches `/a/cc` when a static sibling `/a...` exists.

use std::collections::HashMap;

use hyper::Method;
use thiserror::Error;

use crate::http::handler::HandlerChain;
use crate::routing::params::Params;

/// Conflicting or malformed pattern detected while registering a route.
///
/// Always surfaced to the caller at registration time; matching never
/// reports conflicts.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The exact pattern was already registered for this method.
    #[error("a handler chain is already registered for '{0}'")]
    Duplicate(String),

    /// Two param segments with different names at the same position.
    #[error("param ':{new}' in '{path}' conflicts with existing param ':{existing}'")]
    ParamNameConflict {
        path: String,
        new: String,
        existing: String,
    },

    /// A `*name` segment that is not the final segment of the pattern.
    #[error("catch-all segment must be the final segment of '{0}'")]
    CatchAllNotTerminal(String),

    /// Two catch-alls with different names at the same position.
    #[error("catch-all '*{new}' in '{path}' conflicts with existing catch-all '*{existing}'")]
    CatchAllConflict {
        path: String,
        new: String,
        existing: String,
    },

    /// Pattern that cannot be parsed into valid segments.
    #[error("invalid route pattern '{path}': {reason}")]
    InvalidPattern { path: String, reason: &'static str },
}

/// Param child: captures exactly one non-empty, slash-free segment and then
/// continues matching in its subtree.
#[derive(Clone)]
struct ParamChild {
    name: String,
    node: Node,
}

/// Catch-all child: captures the entire remainder of the path. Terminal by
/// construction; it has no subtree to descend into.
#[derive(Clone)]
struct CatchAllChild {
    name: String,
    chain: HandlerChain,
}

/// One node of the segment tree.
///
/// `prefix` is the compressed static text leading into this node; the root
/// of each method tree uses an empty prefix. A chain is present only when
/// some registered route terminates exactly here; an intermediate node is
/// not an endpoint.
#[derive(Clone, Default)]
struct Node {
    prefix: String,
    statics: Vec<Node>,
    param: Option<Box<ParamChild>>,
    catch_all: Option<CatchAllChild>,
    chain: Option<HandlerChain>,
}

impl Node {
    /// Insert `rest` (the pattern remainder after this node's prefix has
    /// been consumed) below this node. `full` is the original pattern, kept
    /// only for error messages.
    fn insert(
        &mut self,
        full: &str,
        rest: &str,
        chain: HandlerChain,
    ) -> Result<(), RegistrationError> {
        if rest.is_empty() {
            if self.chain.is_some() {
                return Err(RegistrationError::Duplicate(full.to_string()));
            }
            self.chain = Some(chain);
            return Ok(());
        }

        match rest.as_bytes()[0] {
            b':' => self.insert_param(full, rest, chain),
            b'*' => self.insert_catch_all(full, rest, chain),
            _ => self.insert_static(full, rest, chain),
        }
    }

    fn insert_param(
        &mut self,
        full: &str,
        rest: &str,
        chain: HandlerChain,
    ) -> Result<(), RegistrationError> {
        let name_end = rest.find('/').unwrap_or(rest.len());
        let name = &rest[1..name_end];
        let tail = &rest[name_end..];

        let param = self.param.get_or_insert_with(|| {
            Box::new(ParamChild {
                name: name.to_string(),
                node: Node::default(),
            })
        });
        if param.name != name {
            return Err(RegistrationError::ParamNameConflict {
                path: full.to_string(),
                new: name.to_string(),
                existing: param.name.clone(),
            });
        }
        param.node.insert(full, tail, chain)
    }

    fn insert_catch_all(
        &mut self,
        full: &str,
        rest: &str,
        chain: HandlerChain,
    ) -> Result<(), RegistrationError> {
        let name = &rest[1..];
        if let Some(existing) = &self.catch_all {
            if existing.name == name {
                return Err(RegistrationError::Duplicate(full.to_string()));
            }
            return Err(RegistrationError::CatchAllConflict {
                path: full.to_string(),
                new: name.to_string(),
                existing: existing.name.clone(),
            });
        }
        self.catch_all = Some(CatchAllChild {
            name: name.to_string(),
            chain,
        });
        Ok(())
    }

    fn insert_static(
        &mut self,
        full: &str,
        rest: &str,
        chain: HandlerChain,
    ) -> Result<(), RegistrationError> {
        // Static text runs until the next wildcard segment (pattern
        // validation guarantees a wildcard is always preceded by '/').
        let literal_end = rest.find(|c| c == ':' || c == '*').unwrap_or(rest.len());
        let literal = &rest[..literal_end];
        let first = literal.as_bytes()[0];

        let Some(child) = self
            .statics
            .iter_mut()
            .find(|c| c.prefix.as_bytes()[0] == first)
        else {
            let mut child = Node {
                prefix: literal.to_string(),
                ..Node::default()
            };
            child.insert(full, &rest[literal_end..], chain)?;
            self.statics.push(child);
            return Ok(());
        };

        let common = common_prefix_len(&child.prefix, literal);
        if common < child.prefix.len() {
            // Divergence inside the compressed prefix: split the child so
            // the tree keeps the longest-common-prefix invariant.
            let lower = Node {
                prefix: child.prefix[common..].to_string(),
                statics: std::mem::take(&mut child.statics),
                param: child.param.take(),
                catch_all: child.catch_all.take(),
                chain: child.chain.take(),
            };
            child.prefix.truncate(common);
            child.statics = vec![lower];
        }
        child.insert(full, &rest[common..], chain)
    }

    /// Resolve `path` below this node, appending captures to `captures`.
    /// Captures pushed along a dead-end branch are popped before the next
    /// alternative is tried.
    fn walk<'n, 'p>(
        &'n self,
        path: &'p str,
        captures: &mut Vec<(&'n str, &'p str)>,
    ) -> Option<&'n HandlerChain> {
        if path.is_empty() {
            if let Some(chain) = &self.chain {
                return Some(chain);
            }
            // An exhausted path can still be claimed by a catch-all with an
            // empty remainder ("/static/" against "/static/*files").
            if let Some(ca) = &self.catch_all {
                captures.push((&ca.name, ""));
                return Some(&ca.chain);
            }
            return None;
        }

        let first = path.as_bytes()[0];
        if let Some(child) = self.statics.iter().find(|c| c.prefix.as_bytes()[0] == first) {
            if let Some(rest) = path.strip_prefix(child.prefix.as_str()) {
                if let Some(found) = child.walk(rest, captures) {
                    return Some(found);
                }
            }
        }

        if let Some(param) = &self.param {
            let value_end = path.find('/').unwrap_or(path.len());
            if value_end > 0 {
                captures.push((&param.name, &path[..value_end]));
                if let Some(found) = param.node.walk(&path[value_end..], captures) {
                    return Some(found);
                }
                captures.pop();
            }
        }

        if let Some(ca) = &self.catch_all {
            captures.push((&ca.name, path));
            return Some(&ca.chain);
        }

        None
    }
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.bytes().zip(b.bytes()).take_while(|(x, y)| x == y).count()
}

/// Reject patterns the segment grammar cannot express before they reach the
/// tree: wildcards must be the sole token of their segment, must carry a
/// name, and a catch-all must terminate the pattern.
fn validate_pattern(path: &str) -> Result<(), RegistrationError> {
    let invalid = |reason| RegistrationError::InvalidPattern {
        path: path.to_string(),
        reason,
    };

    if !path.starts_with('/') {
        return Err(invalid("pattern must begin with '/'"));
    }

    let segments: Vec<&str> = path.split('/').collect();
    for (idx, segment) in segments.iter().enumerate() {
        let Some(marker) = segment.find(|c| c == ':' || c == '*') else {
            continue;
        };
        if marker != 0 || segment[1..].contains(|c| c == ':' || c == '*') {
            return Err(invalid("a wildcard must be the sole token of its segment"));
        }
        if segment.len() == 1 {
            return Err(invalid("a wildcard segment requires a name"));
        }
        if segment.starts_with('*') && idx != segments.len() - 1 {
            return Err(RegistrationError::CatchAllNotTerminal(path.to_string()));
        }
    }
    Ok(())
}

/// Per-method segment trees.
///
/// Built at registration time; matching reads it without locks. The engine
/// publishes complete snapshots of this structure, so cloning must stay
/// cheap relative to registration frequency (chains clone by `Arc`).
#[derive(Clone, Default)]
pub struct Router {
    trees: HashMap<Method, Node>,
    no_route: Option<HandlerChain>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `chain` at the node representing `pattern` in the tree for
    /// `method`, splitting compressed nodes as needed. Any ambiguity with an
    /// existing registration fails here, never at request time.
    pub fn register(
        &mut self,
        method: Method,
        pattern: &str,
        chain: HandlerChain,
    ) -> Result<(), RegistrationError> {
        validate_pattern(pattern)?;
        let root = self.trees.entry(method).or_default();
        root.insert(pattern, pattern, chain)
    }

    /// Resolve `path` against the tree for `method`.
    ///
    /// Returns the registered chain plus captured parameters, or `None` when
    /// no route terminates at the resolved node. The lookup is a pure,
    /// non-blocking computation.
    pub fn resolve(&self, method: &Method, path: &str) -> Option<(&HandlerChain, Params)> {
        let root = self.trees.get(method)?;
        let mut captures = Vec::new();
        let chain = root.walk(path, &mut captures)?;
        Some((chain, Params::from_captures(&captures)))
    }

    /// Install the fallback chain invoked when no route matches.
    pub fn set_no_route(&mut self, chain: HandlerChain) {
        self.no_route = Some(chain);
    }

    /// Fallback chain for unmatched requests, if one was installed.
    pub fn no_route(&self) -> Option<&HandlerChain> {
        self.no_route.as_ref()
    }
}
