//! Resolution requests and their terminal outcomes.
//!
//! A [`Request`] is pending by construction. Each outcome setter consumes it
//! and returns a [`Settled`] value that exposes no setters, so an outcome can
//! be assigned exactly once.

use url::Url;

use super::error::ResolveError;
use super::file::File;

/// A pending unit of resolution work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    url: Url,
    lineage: Vec<Url>,
}

impl Request {
    /// Creates a root request for a seed URL.
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self {
            url,
            lineage: Vec::new(),
        }
    }

    /// Creates a child request reached from `self`.
    pub(crate) fn child(&self, url: Url) -> Self {
        let mut lineage = self.lineage.clone();
        lineage.push(self.url.clone());
        Self { url, lineage }
    }

    /// The URL to resolve.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Number of ancestors; 0 for a seed URL.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.lineage.len()
    }

    /// URLs of every ancestor, oldest first.
    #[must_use]
    pub fn lineage(&self) -> &[Url] {
        &self.lineage
    }

    /// Returns true if `url` is this request's URL or one of its ancestors.
    #[must_use]
    pub fn has_visited(&self, url: &Url) -> bool {
        self.url == *url || self.lineage.contains(url)
    }

    /// Settles the request with a concrete file.
    #[must_use]
    pub fn resolves_to(self, file: File) -> Settled {
        self.settle(Outcome::ResolvedTo(file))
    }

    /// Settles the request as permanently unavailable.
    ///
    /// `normalized` carries a canonical form of the URL when the provider has one.
    #[must_use]
    pub fn deadend(self, normalized: Option<Url>) -> Settled {
        self.settle(Outcome::Deadend(normalized))
    }

    /// Settles the request with an error.
    #[must_use]
    pub fn errs(self, normalized: Option<Url>, error: ResolveError) -> Settled {
        self.settle(Outcome::Errs(normalized, error))
    }

    /// Redirects resolution to another URL.
    #[must_use]
    pub fn yields(self, url: Url) -> Settled {
        self.settle(Outcome::Yields(url))
    }

    /// Expands the request into several child URLs.
    #[must_use]
    pub fn bundles(self, urls: Vec<Url>) -> Settled {
        self.settle(Outcome::Bundles(urls))
    }

    fn settle(self, outcome: Outcome) -> Settled {
        Settled {
            request: self,
            outcome,
        }
    }
}

/// Outcome assigned to a request.
#[derive(Debug, Clone)]
pub enum Outcome {
    ResolvedTo(File),
    Deadend(Option<Url>),
    Yields(Url),
    Bundles(Vec<Url>),
    Errs(Option<Url>, ResolveError),
}

impl Outcome {
    /// Returns true for outcomes that end resolution (no further URLs).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ResolvedTo(_) | Self::Deadend(_) | Self::Errs(..))
    }

    /// Short label used in logs and CLI output.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::ResolvedTo(_) => "resolved",
            Self::Deadend(_) => "deadend",
            Self::Yields(_) => "yields",
            Self::Bundles(_) => "bundles",
            Self::Errs(..) => "error",
        }
    }
}

/// A request with its outcome. Read-only.
#[derive(Debug, Clone)]
pub struct Settled {
    request: Request,
    outcome: Outcome,
}

impl Settled {
    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.request.url
    }

    #[must_use]
    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    /// Splits into the originating request and its outcome.
    #[must_use]
    pub fn into_parts(self) -> (Request, Outcome) {
        (self.request, self.outcome)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::resolver::file::FileSize;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_new_request_is_root() {
        let request = Request::new(url("https://a.example/x"));
        assert_eq!(request.depth(), 0);
        assert!(request.lineage().is_empty());
    }

    #[test]
    fn test_child_extends_lineage() {
        let root = Request::new(url("https://a.example/x"));
        let child = root.child(url("https://b.example/y"));
        let grandchild = child.child(url("https://c.example/z"));
        assert_eq!(grandchild.depth(), 2);
        assert_eq!(
            grandchild.lineage(),
            &[url("https://a.example/x"), url("https://b.example/y")]
        );
        assert!(grandchild.has_visited(&url("https://a.example/x")));
        assert!(grandchild.has_visited(&url("https://c.example/z")));
        assert!(!grandchild.has_visited(&url("https://d.example/")));
    }

    #[test]
    fn test_setters_produce_expected_outcome() {
        let target = url("https://a.example/x");
        let file = File::new("basic", target.clone(), "x", FileSize::Unknown);

        let settled = Request::new(target.clone()).resolves_to(file);
        assert!(matches!(settled.outcome(), Outcome::ResolvedTo(f) if f.name() == "x"));
        assert!(settled.outcome().is_terminal());

        let settled = Request::new(target.clone()).yields(url("https://b.example/"));
        assert!(!settled.outcome().is_terminal());
        assert_eq!(settled.outcome().label(), "yields");

        let settled = Request::new(target.clone()).deadend(None);
        assert!(settled.outcome().is_terminal());
        assert_eq!(settled.url(), &target);
    }

    #[test]
    fn test_into_parts_preserves_request() {
        let request = Request::new(url("https://a.example/x"));
        let (back, outcome) = request.clone().bundles(vec![]).into_parts();
        assert_eq!(back, request);
        assert!(matches!(outcome, Outcome::Bundles(urls) if urls.is_empty()));
    }
}
