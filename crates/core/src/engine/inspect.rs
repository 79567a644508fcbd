use nutpress_api::error::Result;
use nutpress_api::models::{EngineRole, NutType, VersionNumber};
use nutpress_api::nut::{Nut, NutRef, NutStream};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

use crate::engine::{Engine, EngineRequest, StageReport, per_nut};
use crate::nut::read_all;

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"url\(\s*['"]?([^'")?#]+)"#).expect("static pattern"));

static IMPORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"@import\s+(?:url\(\s*)?['"]?([^'")\s;]+)"#).expect("static pattern"));

/// Scans `url(...)` occurrences in stylesheets and records the targets found
/// among the stage's own nut set as references of the referring nut.
pub struct CssUrlInspector;

impl Engine for CssUrlInspector {
    fn role(&self) -> EngineRole {
        EngineRole::Inspector
    }

    fn process(
        &self,
        request: &EngineRequest,
        nuts: Vec<NutRef>,
        report: &mut StageReport,
    ) -> Result<Vec<NutRef>> {
        discover(self.role(), &URL_RE, request, nuts, report)
    }
}

/// Scans `@import` statements in stylesheets, both the bare and the
/// `url(...)` forms, and records same-set targets as references.
pub struct CssImportInspector;

impl Engine for CssImportInspector {
    fn role(&self) -> EngineRole {
        EngineRole::Inspector
    }

    // Imported sheets resolve before the url scan.
    fn priority(&self) -> i32 {
        -1
    }

    fn process(
        &self,
        request: &EngineRequest,
        nuts: Vec<NutRef>,
        report: &mut StageReport,
    ) -> Result<Vec<NutRef>> {
        discover(self.role(), &IMPORT_RE, request, nuts, report)
    }
}

fn discover(
    role: EngineRole,
    pattern: &Regex,
    request: &EngineRequest,
    nuts: Vec<NutRef>,
    report: &mut StageReport,
) -> Result<Vec<NutRef>> {
    // Same-set candidates; a stylesheet never references itself.
    let candidates: Vec<NutRef> = nuts.clone();

    per_nut(role, request, nuts, report, |nut| {
        if nut.nut_type() != NutType::Css {
            return Ok(nut);
        }

        let content = read_all(nut.as_ref())?;
        let text = String::from_utf8_lossy(&content);

        let mut extra: Vec<NutRef> = Vec::new();
        for capture in pattern.captures_iter(&text) {
            let target = capture[1].trim();
            let found = candidates
                .iter()
                .find(|c| c.name() != nut.name() && name_matches(c.name(), target));

            if let Some(referenced) = found {
                if !extra.iter().any(|r| r.name() == referenced.name())
                    && !nut.referenced().iter().any(|r| r.name() == referenced.name())
                {
                    extra.push(referenced.clone());
                }
            }
        }

        if extra.is_empty() {
            Ok(nut)
        } else {
            Ok(Arc::new(ReferencingNut::new(nut, extra)) as NutRef)
        }
    })
}

/// True when a nut name resolves the referenced target: an exact match, or
/// the target is the trailing path of the name (stylesheets use relative
/// urls).
fn name_matches(name: &str, target: &str) -> bool {
    let mut target = target;
    loop {
        if let Some(rest) = target.strip_prefix("./") {
            target = rest;
        } else if let Some(rest) = target.strip_prefix("../") {
            target = rest;
        } else if let Some(rest) = target.strip_prefix('/') {
            target = rest;
        } else {
            break;
        }
    }
    name == target || name.ends_with(&format!("/{target}"))
}

/// Delegating wrapper adding references discovered by an inspector.
struct ReferencingNut {
    inner: NutRef,
    references: Vec<NutRef>,
}

impl ReferencingNut {
    fn new(inner: NutRef, extra: Vec<NutRef>) -> Self {
        let mut references = inner.referenced().to_vec();
        references.extend(extra);
        Self { inner, references }
    }
}

impl Nut for ReferencingNut {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn nut_type(&self) -> NutType {
        self.inner.nut_type()
    }

    fn version(&self) -> VersionNumber {
        self.inner.version()
    }

    fn open_stream(&self) -> Result<NutStream> {
        self.inner.open_stream()
    }

    fn referenced(&self) -> &[NutRef] {
        &self.references
    }

    fn components(&self) -> Option<&[NutRef]> {
        self.inner.components()
    }

    fn proxy_uris(&self) -> &[String] {
        self.inner.proxy_uris()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nut::MemoryNut;
    use std::collections::HashSet;

    fn request() -> EngineRequest {
        EngineRequest {
            workflow_id: "wf".into(),
            heap_id: "heap".into(),
            heap_version: VersionNumber::from_raw(1),
            nut_names: Vec::new(),
            skip: HashSet::new(),
            best_effort: false,
        }
    }

    fn nut(name: &str, nut_type: NutType, content: &str) -> NutRef {
        Arc::new(MemoryNut::new(name, nut_type, content.as_bytes().to_vec()))
    }

    #[test]
    fn records_same_set_url_targets() {
        let css = nut(
            "style/main.css",
            NutType::Css,
            "body { background: url('../img/bg.png'); }",
        );
        let img = nut("img/bg.png", NutType::Png, "png-bytes");

        let mut report = StageReport::default();
        let out = CssUrlInspector
            .process(&request(), vec![css, img], &mut report)
            .unwrap();

        assert_eq!(out.len(), 2);
        let refs = out[0].referenced();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].name(), "img/bg.png");
    }

    #[test]
    fn leaves_non_css_untouched() {
        let js = nut("app.js", NutType::Javascript, "var x = 'url(a.png)';");
        let mut report = StageReport::default();
        let out = CssUrlInspector
            .process(&request(), vec![js], &mut report)
            .unwrap();
        assert!(out[0].referenced().is_empty());
    }

    #[test]
    fn unknown_targets_are_ignored() {
        let css = nut("a.css", NutType::Css, "i { background: url(gone.png); }");
        let mut report = StageReport::default();
        let out = CssUrlInspector
            .process(&request(), vec![css], &mut report)
            .unwrap();
        assert!(out[0].referenced().is_empty());
    }

    #[test]
    fn records_imported_stylesheets() {
        let main = nut(
            "main.css",
            NutType::Css,
            "@import 'base.css';\n@import url(\"theme/dark.css\");\nbody {}",
        );
        let base = nut("base.css", NutType::Css, "p {}");
        let dark = nut("theme/dark.css", NutType::Css, "b {}");

        let mut report = StageReport::default();
        let out = CssImportInspector
            .process(&request(), vec![main, base, dark], &mut report)
            .unwrap();

        let refs: Vec<_> = out[0].referenced().iter().map(|r| r.name()).collect();
        assert_eq!(refs, vec!["base.css", "theme/dark.css"]);
    }

    #[test]
    fn both_inspectors_compose_without_duplicates() {
        let main = nut(
            "main.css",
            NutType::Css,
            "@import url('base.css');\nbody { background: url('img/bg.png'); }",
        );
        let base = nut("base.css", NutType::Css, "p {}");
        let img = nut("img/bg.png", NutType::Png, "png");

        let mut report = StageReport::default();
        let after_imports = CssImportInspector
            .process(&request(), vec![main, base, img], &mut report)
            .unwrap();
        let out = CssUrlInspector
            .process(&request(), after_imports, &mut report)
            .unwrap();

        // The url scan sees the @import url(...) form too; the reference
        // recorded by the import pass is not duplicated.
        let refs: Vec<_> = out[0].referenced().iter().map(|r| r.name()).collect();
        assert_eq!(refs, vec!["base.css", "img/bg.png"]);
    }
}
