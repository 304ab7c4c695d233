//! Diagnostic text cleanup for handlers that relay toolchain output.
//!
//! Compilers report errors against the scratch file they were handed, so the
//! raw text leaks host paths (`/var/folders/.../main.go:3:5`) and build
//! banners that mean nothing to the client. Handlers apply a
//! [`DiagnosticsSanitizer`] to that text before putting it in a response. The
//! execution guard never calls this.

use std::sync::OnceLock;

use regex::Regex;

pub struct DiagnosticsSanitizer {
    banners: Vec<String>,
    path_pattern: Regex,
    replacement: String,
}

impl DiagnosticsSanitizer {
    /// `banners` are removed verbatim; every `path_pattern` match becomes
    /// `replacement`.
    pub fn new(
        banners: impl IntoIterator<Item = impl Into<String>>,
        path_pattern: &str,
        replacement: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            banners: banners.into_iter().map(Into::into).collect(),
            path_pattern: Regex::new(path_pattern)?,
            replacement: replacement.into(),
        })
    }

    /// Rules for `go build` / `go run` output on a scratch file under `/var`.
    pub fn go_toolchain() -> &'static Self {
        static GO: OnceLock<DiagnosticsSanitizer> = OnceLock::new();
        GO.get_or_init(|| {
            Self::new(["# command-line-arguments"], r"/var.*\.go:", "tmp.go:")
                .expect("go toolchain pattern is valid")
        })
    }

    #[must_use]
    pub fn sanitize(&self, input: &str) -> String {
        let mut text = input.to_owned();
        for banner in &self.banners {
            text = text.replace(banner.as_str(), "");
        }
        self.path_pattern
            .replace_all(&text, regex::NoExpand(&self.replacement))
            .into_owned()
    }
}

impl std::fmt::Debug for DiagnosticsSanitizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticsSanitizer")
            .field("banners", &self.banners)
            .field("path_pattern", &self.path_pattern.as_str())
            .field("replacement", &self.replacement)
            .finish()
    }
}
