/// One request to resolve against the benchmark route table.
#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    request: TestRequest,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, request: TestRequest) -> Self {
        Self { name, group, request }
    }

    pub fn static_route(name: &'static str, request: TestRequest) -> Self {
        Self::new(name, TestGroup::Static, request)
    }

    pub fn dynamic_route(name: &'static str, request: TestRequest) -> Self {
        Self::new(name, TestGroup::Dynamic, request)
    }

    pub fn versioned_route(name: &'static str, request: TestRequest) -> Self {
        Self::new(name, TestGroup::Versioned, request)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn request(&self) -> &TestRequest {
        &self.request
    }

    pub fn path(&self) -> &'static str {
        self.request.path
    }
}

#[derive(Debug, Copy, Clone)]
pub struct TestRequest {
    method: &'static str,
    path: &'static str,
    version: Option<&'static str>,
}

impl TestRequest {
    pub const fn new(method: &'static str, path: &'static str) -> Self {
        Self { method, path, version: None }
    }

    pub const fn versioned(method: &'static str, path: &'static str, version: &'static str) -> Self {
        Self { method, path, version: Some(version) }
    }

    pub fn method(&self) -> &'static str {
        self.method
    }

    pub fn path(&self) -> &'static str {
        self.path
    }

    pub fn version(&self) -> Option<&'static str> {
        self.version
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Static,
    Dynamic,
    Versioned,
}

/// `(method, pattern, version)` triples registered by the router benchmarks.
pub const ROUTE_TABLE: &[(&str, &str, Option<&str>)] = &[
    ("GET", "/", None),
    ("GET", "/health", None),
    ("GET", "/users", None),
    ("POST", "/users", None),
    ("GET", "/users/me", None),
    ("GET", "/users/:id", None),
    ("PUT", "/users/:id", None),
    ("DELETE", "/users/:id", None),
    ("GET", "/users/:id/posts", None),
    ("GET", "/users/:id/posts/:post_id", None),
    ("GET", "/users/:id/posts/:post_id/comments/:comment_id", None),
    ("GET", "/orgs/:org/repos/:repo/issues/:number", None),
    ("GET", "/orgs/:org/repos/:repo/pulls/:number", None),
    ("GET", "/items/:id", Some("2")),
    ("GET", "/items/:id", Some("3")),
];
