//! memconsumer-router: Zero-dependency Radix Trie HTTP Router
//!
//! Routes are stored per method in a segment trie. The routed value is
//! generic, so callers can route to an enum, a handler id, or a boxed
//! closure.
//!
//! ## Path Syntax
//! - `{name}` - Named parameter (captures one segment). Names are ASCII
//!   letters, digits and `_`.
//!
//! A static segment beats a parameter at the same position.
//!
//! ## Example
//! ```
//! use memconsumer_router::Router;
//!
//! let mut router = Router::new();
//! router.insert("GET", "/hello", "hello").unwrap();
//! router.insert("GET", "/hello/consume/{bytes}", "consume").unwrap();
//!
//! let m = router.find("GET", "/hello/consume/1024").unwrap();
//! assert_eq!(*m.value, "consume");
//! assert_eq!(m.param("bytes"), Some("1024"));
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Route match result
#[derive(Debug, Clone, PartialEq)]
pub struct Match<'r, T> {
    /// The routed value
    pub value: &'r T,
    /// Captured path parameters as (name, value) pairs, in path order
    pub params: Vec<(String, String)>,
}

impl<T> Match<'_, T> {
    /// Look up a captured parameter by name
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get params as HashMap for convenient access
    pub fn params_map(&self) -> HashMap<String, String> {
        self.params.iter().cloned().collect()
    }
}

/// Route registration failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertError {
    /// A value is already registered for this method and path
    Conflict { path: String },
    /// A parameter with a different name already occupies this position
    ParamConflict {
        path: String,
        existing: String,
        new: String,
    },
    /// Malformed segment such as `{}` or `a{b`
    InvalidSegment { path: String, segment: String },
}

impl fmt::Display for InsertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsertError::Conflict { path } => write!(f, "route already registered: {}", path),
            InsertError::ParamConflict { path, existing, new } => write!(
                f,
                "parameter {{{}}} in {} conflicts with existing parameter {{{}}}",
                new, path, existing
            ),
            InsertError::InvalidSegment { path, segment } => {
                write!(f, "invalid segment {:?} in {}", segment, path)
            }
        }
    }
}

impl std::error::Error for InsertError {}

enum Segment<'p> {
    Static(&'p str),
    Param(&'p str),
}

fn parse_segment<'p>(path: &str, segment: &'p str) -> Result<Segment<'p>, InsertError> {
    let invalid = || InsertError::InvalidSegment {
        path: path.to_string(),
        segment: segment.to_string(),
    };

    match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        Some(name)
            if !name.is_empty()
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') =>
        {
            Ok(Segment::Param(name))
        }
        Some(_) => Err(invalid()),
        None if segment.contains(['{', '}']) => Err(invalid()),
        None => Ok(Segment::Static(segment)),
    }
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Trie node for path segment matching
#[derive(Debug)]
struct Node<T> {
    /// Static children (key = path segment)
    children: HashMap<String, Node<T>>,
    /// Parameter child ({id})
    param_child: Option<Box<ParamNode<T>>>,
    /// Routed value if this is a terminal node
    value: Option<T>,
}

impl<T> Node<T> {
    fn new() -> Self {
        Self {
            children: HashMap::new(),
            param_child: None,
            value: None,
        }
    }
}

#[derive(Debug)]
struct ParamNode<T> {
    name: String,
    node: Node<T>,
}

/// Zero-dependency Radix Trie HTTP Router
///
/// Routes are organized by HTTP method, then matched segment by segment.
/// Methods are compared case-insensitively. `HEAD` falls back to `GET`.
#[derive(Debug)]
pub struct Router<T> {
    /// Method -> Trie root
    trees: BTreeMap<String, Node<T>>,
}

impl<T> Default for Router<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Router<T> {
    /// Create a new router
    pub fn new() -> Self {
        Self {
            trees: BTreeMap::new(),
        }
    }

    /// Insert a route
    ///
    /// # Example
    /// ```
    /// use memconsumer_router::Router;
    ///
    /// let mut router = Router::new();
    /// router.insert("GET", "/users/{id}", 0).unwrap();
    /// assert!(router.insert("GET", "/users/{name}", 1).is_err());
    /// ```
    pub fn insert(&mut self, method: &str, path: &str, value: T) -> Result<(), InsertError> {
        let segments = split_path(path)
            .into_iter()
            .map(|seg| parse_segment(path, seg))
            .collect::<Result<Vec<_>, _>>()?;

        let mut node = self
            .trees
            .entry(method.to_ascii_uppercase())
            .or_insert_with(Node::new);

        for segment in segments {
            node = match segment {
                Segment::Static(s) => node.children.entry(s.to_string()).or_insert_with(Node::new),
                Segment::Param(name) => {
                    let param = node.param_child.get_or_insert_with(|| {
                        Box::new(ParamNode {
                            name: name.to_string(),
                            node: Node::new(),
                        })
                    });
                    if param.name != name {
                        return Err(InsertError::ParamConflict {
                            path: path.to_string(),
                            existing: param.name.clone(),
                            new: name.to_string(),
                        });
                    }
                    &mut param.node
                }
            };
        }

        if node.value.is_some() {
            return Err(InsertError::Conflict {
                path: path.to_string(),
            });
        }
        node.value = Some(value);
        Ok(())
    }

    /// Find a matching route
    ///
    /// Returns `None` when no route is registered for this method and path.
    pub fn find(&self, method: &str, path: &str) -> Option<Match<'_, T>> {
        let method = method.to_ascii_uppercase();
        let segments = split_path(path);

        let found = self
            .trees
            .get(&method)
            .and_then(|tree| Self::find_node(tree, &segments, &mut Vec::new()));

        match found {
            None if method == "HEAD" => self
                .trees
                .get("GET")
                .and_then(|tree| Self::find_node(tree, &segments, &mut Vec::new())),
            other => other,
        }
    }

    fn find_node<'r>(
        node: &'r Node<T>,
        segments: &[&str],
        params: &mut Vec<(String, String)>,
    ) -> Option<Match<'r, T>> {
        let Some((segment, rest)) = segments.split_first() else {
            return node.value.as_ref().map(|value| Match {
                value,
                params: params.clone(),
            });
        };

        if let Some(child) = node.children.get(*segment) {
            if let Some(m) = Self::find_node(child, rest, params) {
                return Some(m);
            }
        }

        if let Some(ref param) = node.param_child {
            params.push((param.name.clone(), (*segment).to_string()));
            if let Some(m) = Self::find_node(&param.node, rest, params) {
                return Some(m);
            }
            params.pop();
        }

        None
    }

    /// Methods that have a route for `path`, in alphabetical order
    ///
    /// Used to answer `405 Method Not Allowed` with an `Allow` header.
    pub fn allowed_methods(&self, path: &str) -> Vec<String> {
        let segments = split_path(path);
        let mut allowed: Vec<String> = self
            .trees
            .iter()
            .filter(|(_, tree)| Self::find_node(tree, &segments, &mut Vec::new()).is_some())
            .map(|(method, _)| method.clone())
            .collect();

        if allowed.iter().any(|m| m == "GET") && !allowed.iter().any(|m| m == "HEAD") {
            allowed.push("HEAD".to_string());
            allowed.sort();
        }
        allowed
    }
}
