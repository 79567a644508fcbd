use nutpress_api::error::{PipelineError, Result};
use nutpress_api::models::{NutType, VersionNumber};
use nutpress_api::nut::{Nut, NutRef, NutStream};
use std::io::{self, Read};

/// Ordered concatenation of other nuts presented as a single resource.
///
/// The combined version is computed once at construction from the component
/// versions, in order. Nested composites are flattened, and the reference
/// list is the ordered union of all component references.
pub struct CompositeNut {
    name: String,
    nut_type: NutType,
    version: VersionNumber,
    components: Vec<NutRef>,
    references: Vec<NutRef>,
}

impl CompositeNut {
    pub fn new(name: impl Into<String>, composition: Vec<NutRef>) -> Result<Self> {
        let name = name.into();

        if composition.is_empty() {
            return Err(PipelineError::Configuration(format!(
                "composite nut '{name}' must have at least one component"
            )));
        }

        // References come from the pre-flatten members as well as the
        // flattened components: a delegating wrapper around a composite
        // carries its own discovered references, which flattening through
        // `components()` would otherwise discard.
        let mut references: Vec<NutRef> = Vec::new();
        let mut components: Vec<NutRef> = Vec::with_capacity(composition.len());
        for nut in composition {
            extend_unique(&mut references, nut.referenced());
            match nut.components() {
                Some(inner) => components.extend(inner.iter().cloned()),
                None => components.push(nut),
            }
        }
        for component in &components {
            extend_unique(&mut references, component.referenced());
        }

        let nut_type = components[0].nut_type();
        let version = VersionNumber::combine_all(components.iter().map(|n| n.version()));

        Ok(Self {
            name,
            nut_type,
            version,
            components,
            references,
        })
    }
}

fn extend_unique(references: &mut Vec<NutRef>, extra: &[NutRef]) {
    for referenced in extra {
        if !references.iter().any(|r| r.name() == referenced.name()) {
            references.push(referenced.clone());
        }
    }
}

impl Nut for CompositeNut {
    fn name(&self) -> &str {
        &self.name
    }

    fn nut_type(&self) -> NutType {
        self.nut_type
    }

    fn version(&self) -> VersionNumber {
        self.version
    }

    fn open_stream(&self) -> Result<NutStream> {
        Ok(Box::new(SequenceStream::new(self.components.clone())))
    }

    fn referenced(&self) -> &[NutRef] {
        &self.references
    }

    fn components(&self) -> Option<&[NutRef]> {
        Some(&self.components)
    }
}

/// Streams the components one after the other. A component is opened lazily,
/// fully drained, then closed before the next one is opened, so the whole
/// composition is never held in memory at once.
struct SequenceStream {
    components: Vec<NutRef>,
    next: usize,
    current: Option<NutStream>,
}

impl SequenceStream {
    fn new(components: Vec<NutRef>) -> Self {
        Self {
            components,
            next: 0,
            current: None,
        }
    }
}

impl Read for SequenceStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            if self.current.is_none() {
                let Some(component) = self.components.get(self.next) else {
                    return Ok(0);
                };
                let stream = component.open_stream().map_err(io::Error::other)?;
                self.current = Some(stream);
                self.next += 1;
            }

            let read = self
                .current
                .as_mut()
                .expect("stream opened above")
                .read(buf)?;

            if read == 0 {
                // Component exhausted; close it before opening the next one.
                self.current = None;
                continue;
            }

            return Ok(read);
        }
    }
}
