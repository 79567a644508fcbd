use indexmap::IndexMap;
use nutpress_api::error::Result;
use nutpress_api::models::{EngineRole, NutType};
use nutpress_api::nut::NutRef;
use std::sync::Arc;

use crate::engine::{Engine, EngineRequest, StageReport};
use crate::nut::CompositeNut;

/// Merges the aggregatable nuts of each text type into one composite named
/// `{stem}.{ext}`. The composite takes the position of its first member;
/// non-aggregatable nuts pass through in place.
pub struct TextAggregator {
    stem: String,
}

impl TextAggregator {
    /// `stem` is the caller-supplied base name, e.g. "aggregate" for
    /// `aggregate.css` / `aggregate.js` outputs.
    pub fn new(stem: impl Into<String>) -> Self {
        Self { stem: stem.into() }
    }
}

impl Default for TextAggregator {
    fn default() -> Self {
        Self::new("aggregate")
    }
}

enum Slot {
    Keep(NutRef),
    Merged(NutType),
}

impl Engine for TextAggregator {
    fn role(&self) -> EngineRole {
        EngineRole::Aggregator
    }

    fn process(
        &self,
        _request: &EngineRequest,
        nuts: Vec<NutRef>,
        _report: &mut StageReport,
    ) -> Result<Vec<NutRef>> {
        // First-occurrence order for both groups and slots.
        let mut groups: IndexMap<NutType, Vec<NutRef>> = IndexMap::new();
        let mut slots: Vec<Slot> = Vec::new();

        for nut in nuts {
            let nut_type = nut.nut_type();
            if nut_type.is_aggregatable() {
                let group = groups.entry(nut_type).or_default();
                if group.is_empty() {
                    slots.push(Slot::Merged(nut_type));
                }
                group.push(nut);
            } else {
                slots.push(Slot::Keep(nut));
            }
        }

        let mut out = Vec::with_capacity(slots.len());
        for slot in slots {
            match slot {
                Slot::Keep(nut) => out.push(nut),
                Slot::Merged(nut_type) => {
                    let components = groups.shift_remove(&nut_type).expect("group exists");
                    let name = format!("{}.{}", self.stem, nut_type);
                    out.push(Arc::new(CompositeNut::new(name, components)?) as NutRef);
                }
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nut::MemoryNut;
    use nutpress_api::models::VersionNumber;
    use nutpress_api::nut::Nut;
    use std::collections::HashSet;
    use std::io::Read;

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

    fn read(nut: &NutRef) -> Vec<u8> {
        let mut out = Vec::new();
        nut.open_stream().unwrap().read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn merges_css_in_order() {
        let mut report = StageReport::default();
        let out = TextAggregator::default()
            .process(
                &request(),
                vec![nut("n1.css", NutType::Css, "n1"), nut("n2.css", NutType::Css, "n2")],
                &mut report,
            )
            .unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name(), "aggregate.css");
        assert_eq!(read(&out[0]), b"n1n2");
    }

    #[test]
    fn groups_by_type_and_keeps_images_in_place() {
        let mut report = StageReport::default();
        let out = TextAggregator::default()
            .process(
                &request(),
                vec![
                    nut("a.css", NutType::Css, "a"),
                    nut("logo.png", NutType::Png, "png"),
                    nut("x.js", NutType::Javascript, "x"),
                    nut("b.css", NutType::Css, "b"),
                ],
                &mut report,
            )
            .unwrap();

        let names: Vec<_> = out.iter().map(|n| n.name().to_string()).collect();
        assert_eq!(names, vec!["aggregate.css", "logo.png", "aggregate.js"]);
        assert_eq!(read(&out[0]), b"ab");
    }

    #[test]
    fn union_of_references_is_preserved() {
        let img = nut("img.png", NutType::Png, "p");
        let a = Arc::new(
            MemoryNut::new("a.css", NutType::Css, b"a".to_vec())
                .with_references(vec![img.clone()]),
        ) as NutRef;
        let b = nut("b.css", NutType::Css, "b");

        let mut report = StageReport::default();
        let out = TextAggregator::default()
            .process(&request(), vec![a, b], &mut report)
            .unwrap();

        assert_eq!(out[0].referenced().len(), 1);
        assert_eq!(out[0].referenced()[0].name(), "img.png");
    }
}
