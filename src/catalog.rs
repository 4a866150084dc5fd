//! Conformance case catalog.
//!
//! Each case pairs a raw request with the status prefix a conforming server
//! must answer with. Cases are validated once when the catalog is built and
//! are read-only afterwards.

use crate::protocol::{Request, Status};
use bytes::Bytes;
use std::sync::Arc;

/// Resource the reference server ships in its file corpus
pub const DEFAULT_EXISTING_PATH: &str = "/courses/ud923/filecorpus/yellowstone.jpg";

/// A single conformance case
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    request: Bytes,
    expected: Status,
    description: String,
}

impl TestCase {
    /// Build a case from an expected status prefix such as `GETFILE OK`.
    pub fn new(
        request: impl Into<Bytes>,
        expected_prefix: &str,
        description: impl Into<String>,
    ) -> Result<Self, CatalogError> {
        let description = description.into();
        let expected = Status::from_prefix(expected_prefix)
            .filter(|status| status.is_conformance_token())
            .ok_or_else(|| CatalogError::UnrecognizedStatus {
                description: description.clone(),
                prefix: expected_prefix.to_string(),
            })?;

        Self::with_status(request, expected, description)
    }

    /// Build a case from a status directly.
    pub fn with_status(
        request: impl Into<Bytes>,
        expected: Status,
        description: impl Into<String>,
    ) -> Result<Self, CatalogError> {
        let description = description.into();
        if !expected.is_conformance_token() {
            return Err(CatalogError::UnrecognizedStatus {
                description,
                prefix: expected.prefix().to_string(),
            });
        }

        let request = request.into();

        // A case must agree with the request grammar: only grammatical
        // requests can reach the file lookup.
        let grammatical = Request::parse(&request).is_ok();
        if grammatical == (expected == Status::Invalid) {
            return Err(CatalogError::GrammarMismatch {
                description,
                expected,
            });
        }

        Ok(Self {
            request,
            expected,
            description,
        })
    }

    pub fn request(&self) -> &Bytes {
        &self.request
    }

    pub fn expected(&self) -> Status {
        self.expected
    }

    pub fn expected_prefix(&self) -> &'static str {
        self.expected.prefix()
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Immutable ordered set of cases, cheap to clone across tasks
#[derive(Debug, Clone)]
pub struct Catalog {
    cases: Arc<[TestCase]>,
}

impl Catalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    /// The fixed conformance catalog.
    ///
    /// `existing_path` must name a resource present on the server under test.
    pub fn standard(existing_path: &str) -> Result<Self, CatalogError> {
        Ok(Self::standard_builder(existing_path)?.build())
    }

    /// Builder preloaded with the fixed cases, for appending extras.
    pub fn standard_builder(existing_path: &str) -> Result<CatalogBuilder, CatalogError> {
        let long_path = format!("/path/too/long/{}", "a".repeat(500));

        let mut builder = Catalog::builder();
        builder
            .case(TestCase::with_status(
                Request::new(existing_path).encode(),
                Status::Ok,
                "Valid request with an existing file",
            )?)
            .case(TestCase::with_status(
                Request::new("/nonexistent/file.txt").encode(),
                Status::FileNotFound,
                "Request for a non-existing file",
            )?)
            .case(TestCase::with_status(
                "GETFILE GET no/leading/slash\r\n\r\n",
                Status::Invalid,
                "Request without leading slash in path",
            )?)
            .case(TestCase::with_status(
                "INVALID REQUEST\r\n\r\n",
                Status::Invalid,
                "Malformed request",
            )?)
            // Observed reference behavior: an oversized but grammatical path
            // is looked up and missed, not rejected as INVALID.
            .case(TestCase::with_status(
                Request::new(long_path).encode(),
                Status::FileNotFound,
                "Oversized path treated as non-existing file (observed behavior)",
            )?)
            .case(TestCase::with_status(
                "GETFILEGET /valid/path\r\n\r\n",
                Status::Invalid,
                "Malformed request without space",
            )?)
            .case(TestCase::with_status(
                "GETFILE    GET /valid/path\r\n\r\n",
                Status::Invalid,
                "Malformed request with too many spaces after scheme",
            )?)
            .case(TestCase::with_status(
                "GETFILE GET      /valid/path\r\n\r\n",
                Status::Invalid,
                "Malformed request with too many spaces after method",
            )?);

        Ok(builder)
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TestCase> {
        self.cases.iter()
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a TestCase;
    type IntoIter = std::slice::Iter<'a, TestCase>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Accumulates cases in insertion order
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    cases: Vec<TestCase>,
}

impl CatalogBuilder {
    pub fn case(&mut self, case: TestCase) -> &mut Self {
        self.cases.push(case);
        self
    }

    pub fn build(self) -> Catalog {
        Catalog {
            cases: self.cases.into(),
        }
    }
}

/// Defects in the catalog itself. These are fatal: they mean the suite is
/// broken, not the server under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    UnrecognizedStatus { description: String, prefix: String },
    GrammarMismatch { description: String, expected: Status },
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::UnrecognizedStatus {
                description,
                prefix,
            } => write!(
                f,
                "Case '{}' expects unrecognized status '{}'",
                description, prefix
            ),
            CatalogError::GrammarMismatch {
                description,
                expected,
            } => write!(
                f,
                "Case '{}' expects '{}' but its request {} the request grammar",
                description,
                expected,
                if *expected == Status::Invalid {
                    "satisfies"
                } else {
                    "violates"
                }
            ),
        }
    }
}

impl std::error::Error for CatalogError {}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_standard_catalog_order() {
        let catalog = Catalog::standard(DEFAULT_EXISTING_PATH).unwrap();
        let expected: Vec<Status> = catalog.iter().map(|c| c.expected()).collect();
        assert_eq!(
            expected,
            vec![
                Status::Ok,
                Status::FileNotFound,
                Status::Invalid,
                Status::Invalid,
                Status::FileNotFound,
                Status::Invalid,
                Status::Invalid,
                Status::Invalid,
            ]
        );
        assert_eq!(
            &catalog.iter().next().unwrap().request()[..],
            b"GETFILE GET /courses/ud923/filecorpus/yellowstone.jpg\r\n\r\n"
        );
    }

    #[test]
    fn test_standard_catalog_excludes_root_path() {
        let catalog = Catalog::standard(DEFAULT_EXISTING_PATH).unwrap();
        assert!(catalog
            .iter()
            .all(|c| &c.request()[..] != b"GETFILE GET /\r\n\r\n"));
    }

    #[test]
    fn test_every_case_expects_conformance_token() {
        let catalog = Catalog::standard("/x").unwrap();
        for case in &catalog {
            assert!(case.expected().is_conformance_token());
            assert!(case.request().ends_with(b"\r\n\r\n"));
        }
    }

    #[test]
    fn test_oversized_path_case() {
        let catalog = Catalog::standard(DEFAULT_EXISTING_PATH).unwrap();
        let case = catalog.iter().nth(4).unwrap();
        assert_eq!(case.expected_prefix(), "GETFILE FILE_NOT_FOUND");
        assert!(case.request().len() > 500);
    }

    #[test]
    fn test_new_from_prefix() {
        let case = assert_ok!(TestCase::new("GETFILE GET /x\r\n\r\n", "GETFILE OK", "ok"));
        assert_eq!(case.expected(), Status::Ok);
        assert_eq!(case.description(), "ok");
    }

    #[test]
    fn test_unrecognized_status_rejected() {
        for prefix in ["GETFILE ERROR", "GETFILE NOPE", "OK", ""] {
            match TestCase::new("GETFILE GET /x\r\n\r\n", prefix, "bad") {
                Err(CatalogError::UnrecognizedStatus { prefix: p, .. }) => assert_eq!(p, prefix),
                other => panic!("unexpected: {:?}", other),
            }
        }
    }

    #[test]
    fn test_grammar_mismatch_rejected() {
        assert!(matches!(
            TestCase::new("GETFILE GET /x\r\n\r\n", "GETFILE INVALID", "bad"),
            Err(CatalogError::GrammarMismatch { .. })
        ));
        assert!(matches!(
            TestCase::new("GETFILEGET /x\r\n\r\n", "GETFILE FILE_NOT_FOUND", "bad"),
            Err(CatalogError::GrammarMismatch { .. })
        ));
    }

    #[test]
    fn test_error_status_cannot_be_expected() {
        assert_err!(TestCase::with_status(
            "GETFILE GET /x\r\n\r\n",
            Status::Error,
            "server error"
        ));
    }

    #[test]
    fn test_oversized_request_must_expect_invalid() {
        // 1031 bytes: a server's request buffer truncates the terminator
        let request = Request::new(format!("/{}", "a".repeat(1014))).encode();
        assert_eq!(request.len(), 1031);
        assert_ok!(TestCase::with_status(request.clone(), Status::Invalid, "too long"));
        assert!(matches!(
            TestCase::with_status(request, Status::FileNotFound, "too long"),
            Err(CatalogError::GrammarMismatch { .. })
        ));
    }

    #[test]
    fn test_trailing_space_after_marker_must_expect_invalid() {
        assert_ok!(TestCase::with_status(
            "GETFILE GET /a\r\n\r\nx y",
            Status::Invalid,
            "space after terminator"
        ));
    }

    #[test]
    fn test_builder_appends_after_standard() {
        let mut builder = Catalog::standard_builder("/x").unwrap();
        builder.case(TestCase::new("GETFILE GET /\r\n\r\n", "GETFILE OK", "root").unwrap());
        let catalog = builder.build();
        assert!(!catalog.is_empty());
        assert_eq!(catalog.len(), 9);
        assert_eq!(catalog.iter().nth(8).unwrap().description(), "root");
    }
}
