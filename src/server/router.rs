//! Segment-trie router with wildcard suffixes and synthesized `OPTIONS`.

use crate::{
    errors::{RegisterError, ResponseError, RouteError},
    http::response::default_headers,
    Handler, Method, Request, Response, StatusCode,
};
use std::{collections::HashMap, fmt, sync::Arc};

const WILDCARD: &str = "*";

/// Splits a path into its non-empty `/`-separated segments.
#[inline]
fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

#[derive(Default)]
struct Node {
    handlers: HashMap<Method, Arc<dyn Handler>>,
    children: HashMap<Box<str>, Node>,
    options_synthesized: bool,
}

impl Node {
    /// Methods with a handler on this node, in name order.
    fn own_methods(&self) -> Vec<Method> {
        let mut methods: Vec<Method> = self.handlers.keys().cloned().collect();
        methods.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        methods
    }

    /// Methods served at this node's path: its own plus those of its `*`
    /// child, in name order.
    fn allowed(&self) -> Vec<Method> {
        let mut methods = self.own_methods();
        if let Some(wildcard) = self.children.get(WILDCARD) {
            for method in wildcard.handlers.keys() {
                if !methods.contains(method) {
                    methods.push(method.clone());
                }
            }
            methods.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        }
        methods
    }

    fn synthesize_options(&mut self) {
        let user_options = self.handlers.contains_key(&Method::Options) && !self.options_synthesized;
        let has_methods = self
            .handlers
            .keys()
            .any(|method| *method != Method::Options || !self.options_synthesized);

        if has_methods && !user_options {
            let mut allow: Vec<Method> = self
                .allowed()
                .into_iter()
                .filter(|method| *method != Method::Options)
                .collect();
            allow.push(Method::Options);

            self.handlers
                .insert(Method::Options, Arc::new(OptionsHandler::new(&allow)));
            self.options_synthesized = true;
        }

        for child in self.children.values_mut() {
            child.synthesize_options();
        }
    }

    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, path: &str) -> fmt::Result {
        if !self.handlers.is_empty() {
            let own = self.own_methods();
            let methods: Vec<&str> = own.iter().map(Method::as_str).collect();
            writeln!(f, "{} [{}]", if path.is_empty() { "/" } else { path }, methods.join(", "))?;
        }

        let mut labels: Vec<&Box<str>> = self.children.keys().collect();
        labels.sort();
        for label in labels {
            self.children[label].fmt_tree(f, &format!("{path}/{label}"))?;
        }
        Ok(())
    }
}

/// Answers `OPTIONS` with `200` and an `Allow` header, without a body.
struct OptionsHandler {
    allow: String,
}

impl OptionsHandler {
    fn new(methods: &[Method]) -> Self {
        let allow: Vec<&str> = methods.iter().map(Method::as_str).collect();
        Self {
            allow: allow.join(", "),
        }
    }

    fn respond(&self, resp: &mut Response) -> Result<(), ResponseError> {
        let mut headers = default_headers(0);
        headers.delete("content-type");
        headers.set("Allow", &self.allow);

        resp.write_status_line(StatusCode::Ok)?;
        resp.write_headers(&headers)
    }
}

impl Handler for OptionsHandler {
    fn handle(&self, resp: &mut Response, _: &Request) {
        if let Err(err) = self.respond(resp) {
            tracing::error!(%err, "failed to write OPTIONS response");
        }
    }
}

/// Mutable route table, turned into a [`Router`] by [`build`](RouterBuilder::build).
///
/// # Examples
/// ```
/// use scratch_http::{Method, Request, Response, Router};
///
/// fn hello(_: &mut Response, _: &Request) {}
///
/// let mut builder = Router::builder();
/// builder
///     .get("/*", hello)?
///     .get("/yourproblem", hello)?
///     .post("/api/items", hello)?;
///
/// let router = builder.build();
/// assert!(router.find(&Method::Get, "/anything/at/all").is_ok());
/// assert!(router.find(&Method::Options, "/api/items").is_ok());
/// # Ok::<(), scratch_http::RegisterError>(())
/// ```
#[derive(Default)]
pub struct RouterBuilder {
    root: Node,
}

impl RouterBuilder {
    /// Registers `handler` for `method` on `path`.
    ///
    /// Empty segments are ignored, so `/`, `` and `//` all name the root. A
    /// final `*` segment matches every remaining suffix, including none.
    ///
    /// # Errors
    ///
    /// - [`RegisterError::DuplicateRoute`] if the node already has a handler
    ///   for `method` (a synthesized `OPTIONS` handler may be replaced)
    /// - [`RegisterError::WildcardNotLast`] if `*` is followed by more segments
    pub fn add<H: Handler>(
        &mut self,
        method: Method,
        path: &str,
        handler: H,
    ) -> Result<&mut Self, RegisterError> {
        let parts: Vec<&str> = segments(path).collect();
        if let Some((_, init)) = parts.split_last() {
            if init.contains(&WILDCARD) {
                return Err(RegisterError::WildcardNotLast {
                    path: path.to_owned(),
                });
            }
        }

        let mut node = &mut self.root;
        for segment in parts {
            node = node.children.entry(segment.into()).or_default();
        }

        let synthesized = method == Method::Options && node.options_synthesized;
        if node.handlers.contains_key(&method) && !synthesized {
            return Err(RegisterError::DuplicateRoute {
                method,
                path: path.to_owned(),
            });
        }

        if synthesized {
            node.options_synthesized = false;
        }
        node.handlers.insert(method, Arc::new(handler));
        Ok(self)
    }

    #[inline]
    pub fn get<H: Handler>(&mut self, path: &str, handler: H) -> Result<&mut Self, RegisterError> {
        self.add(Method::Get, path, handler)
    }

    #[inline]
    pub fn post<H: Handler>(&mut self, path: &str, handler: H) -> Result<&mut Self, RegisterError> {
        self.add(Method::Post, path, handler)
    }

    #[inline]
    pub fn put<H: Handler>(&mut self, path: &str, handler: H) -> Result<&mut Self, RegisterError> {
        self.add(Method::Put, path, handler)
    }

    #[inline]
    pub fn delete<H: Handler>(
        &mut self,
        path: &str,
        handler: H,
    ) -> Result<&mut Self, RegisterError> {
        self.add(Method::Delete, path, handler)
    }

    #[inline]
    pub fn patch<H: Handler>(&mut self, path: &str, handler: H) -> Result<&mut Self, RegisterError> {
        self.add(Method::Patch, path, handler)
    }

    /// Installs an `OPTIONS` handler on every node that has at least one
    /// method, unless one was registered explicitly.
    ///
    /// The handler answers `200` with `Allow` listing the node's methods,
    /// `OPTIONS` included. Calling it again recomputes the lists and
    /// changes nothing else.
    pub fn synthesize_options(&mut self) -> &mut Self {
        self.root.synthesize_options();
        self
    }

    /// Synthesizes `OPTIONS` handlers and freezes the table.
    pub fn build(mut self) -> Router {
        self.synthesize_options();
        Router { root: self.root }
    }
}

/// Immutable route table shared by all connections.
pub struct Router {
    root: Node,
}

impl Router {
    #[inline]
    pub fn builder() -> RouterBuilder {
        RouterBuilder::default()
    }

    /// Resolves the handler for `method` on `path`.
    ///
    /// Each segment descends into the literal child of that name when there
    /// is one, otherwise into the `*` child, which absorbs the rest of the
    /// path. On the final node the method resolves against the node itself,
    /// then against its `*` child, so `/domain/*` also serves `/domain`.
    ///
    /// # Errors
    ///
    /// - [`RouteError::NotFound`]: a segment matches neither a literal nor a `*`
    /// - [`RouteError::MethodNotAllowed`]: the path resolved but `method` did
    ///   not; `allowed` is empty when the path is only a prefix of other routes
    pub fn find(&self, method: &Method, path: &str) -> Result<&dyn Handler, RouteError> {
        let mut node = &self.root;

        for segment in segments(path) {
            if let Some(child) = node.children.get(segment) {
                node = child;
            } else if let Some(wildcard) = node.children.get(WILDCARD) {
                node = wildcard;
                break;
            } else {
                return Err(RouteError::NotFound);
            }
        }

        if let Some(handler) = node.handlers.get(method) {
            return Ok(handler.as_ref());
        }
        if let Some(handler) = node
            .children
            .get(WILDCARD)
            .and_then(|wildcard| wildcard.handlers.get(method))
        {
            return Ok(handler.as_ref());
        }

        Err(RouteError::MethodNotAllowed {
            allowed: node.allowed(),
        })
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.root.fmt_tree(f, "")
    }
}
