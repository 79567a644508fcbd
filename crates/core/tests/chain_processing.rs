//! Engine chain behavior: caching, idempotence, skip-sets and failure
//! handling.

use nutpress_api::error::PipelineError;
use nutpress_api::models::EngineRole;
use nutpress_api::nut::NutRef;
use nutpress_core::cache::MemoryCacheProvider;
use nutpress_core::dao::MemoryNutDao;
use nutpress_core::engine::{
    ChainRequest, Engine, EngineRequest, StageReport, ZstdCompressor, per_nut,
};
use nutpress_core::heap::Heap;
use nutpress_core::nut::read_all;
use nutpress_core::workflow::Workflow;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Converter that counts how many nuts it actually processed.
struct CountingConverter {
    calls: Arc<AtomicUsize>,
}

impl Engine for CountingConverter {
    fn role(&self) -> EngineRole {
        EngineRole::Converter
    }

    fn process(
        &self,
        request: &EngineRequest,
        nuts: Vec<NutRef>,
        report: &mut StageReport,
    ) -> Result<Vec<NutRef>, PipelineError> {
        per_nut(self.role(), request, nuts, report, |nut| {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(nut)
        })
    }
}

/// Converter that rejects one specific nut.
struct RejectingConverter {
    reject: String,
}

impl Engine for RejectingConverter {
    fn role(&self) -> EngineRole {
        EngineRole::Converter
    }

    fn process(
        &self,
        request: &EngineRequest,
        nuts: Vec<NutRef>,
        report: &mut StageReport,
    ) -> Result<Vec<NutRef>, PipelineError> {
        per_nut(self.role(), request, nuts, report, |nut| {
            if nut.name() == self.reject {
                Err(PipelineError::Io(io::Error::other("invalid syntax")))
            } else {
                Ok(nut)
            }
        })
    }
}

fn dao_with(paths: &[(&str, &str)]) -> Arc<MemoryNutDao> {
    let dao = MemoryNutDao::new();
    for (path, content) in paths {
        dao.put(*path, content.as_bytes().to_vec());
    }
    Arc::new(dao)
}

fn bytes_of(outcome: &[NutRef]) -> Vec<Vec<u8>> {
    outcome
        .iter()
        .map(|n| read_all(n.as_ref()).unwrap())
        .collect()
}

#[tokio::test]
async fn second_identical_invocation_is_served_from_cache() {
    let calls = Arc::new(AtomicUsize::new(0));
    let heap = Heap::builder("h")
        .source(dao_with(&[("a.css", "a"), ("b.css", "b")]), [r".*\.css"])
        .build()
        .unwrap();

    let workflow = Workflow::builder("wf")
        .heap(heap)
        .engine(Arc::new(CountingConverter {
            calls: calls.clone(),
        }))
        .cache(Arc::new(MemoryCacheProvider::new()))
        .build()
        .unwrap();

    let first = workflow.run(&ChainRequest::all()).await.unwrap();
    assert!(!first.from_cache);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let second = workflow.run(&ChainRequest::all()).await.unwrap();
    assert!(second.from_cache);
    // No re-execution of work engines, byte-identical output.
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(bytes_of(&first.nuts), bytes_of(&second.nuts));
}

#[tokio::test]
async fn heap_change_invalidates_the_cached_result() {
    let calls = Arc::new(AtomicUsize::new(0));
    let dao = Arc::new(MemoryNutDao::new());
    dao.put("a.css", b"old".to_vec());

    let heap = Heap::builder("h")
        .source(dao.clone(), ["a.css"])
        .build()
        .unwrap();

    let workflow = Workflow::builder("wf")
        .heap(heap.clone())
        .engine(Arc::new(CountingConverter {
            calls: calls.clone(),
        }))
        .cache(Arc::new(MemoryCacheProvider::new()))
        .build()
        .unwrap();

    let first = workflow.run(&ChainRequest::all()).await.unwrap();
    assert_eq!(bytes_of(&first.nuts), vec![b"old".to_vec()]);

    dao.put("a.css", b"new".to_vec());
    assert!(heap.check_for_updates().await.unwrap());

    let after = workflow.run(&ChainRequest::all()).await.unwrap();
    assert!(!after.from_cache);
    assert_eq!(bytes_of(&after.nuts), vec![b"new".to_vec()]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn skipped_roles_pass_input_through() {
    let heap = Heap::builder("h")
        .source(dao_with(&[("a.css", "plain content")]), ["a.css"])
        .build()
        .unwrap();

    let workflow = Workflow::builder("wf")
        .heap(heap)
        .engine(Arc::new(ZstdCompressor::default()))
        .build()
        .unwrap();

    let compressed = workflow.run(&ChainRequest::all()).await.unwrap();
    assert_ne!(bytes_of(&compressed.nuts), vec![b"plain content".to_vec()]);

    let skipped = workflow
        .run(&ChainRequest::all().skipping(EngineRole::Compressor))
        .await
        .unwrap();
    assert_eq!(bytes_of(&skipped.nuts), vec![b"plain content".to_vec()]);
}

#[tokio::test]
async fn best_effort_drops_only_the_failing_nut() {
    let heap = Heap::builder("h")
        .source(
            dao_with(&[("a.css", "a"), ("bad.css", "x"), ("c.css", "c")]),
            [r".*\.css"],
        )
        .build()
        .unwrap();

    let workflow = Workflow::builder("wf")
        .heap(heap)
        .engine(Arc::new(RejectingConverter {
            reject: "bad.css".into(),
        }))
        .build()
        .unwrap();

    let outcome = workflow
        .run(&ChainRequest::all().best_effort(true))
        .await
        .unwrap();

    let names: Vec<_> = outcome.nuts.iter().map(|n| n.name().to_string()).collect();
    assert_eq!(names, vec!["a.css", "c.css"]);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].nut, "bad.css");
    assert_eq!(outcome.failures[0].role, EngineRole::Converter);
}

#[tokio::test]
async fn strict_mode_aborts_naming_the_failing_nut_and_stage() {
    let heap = Heap::builder("h")
        .source(
            dao_with(&[("a.css", "a"), ("bad.css", "x"), ("c.css", "c")]),
            [r".*\.css"],
        )
        .build()
        .unwrap();

    let workflow = Workflow::builder("wf")
        .heap(heap)
        .engine(Arc::new(RejectingConverter {
            reject: "bad.css".into(),
        }))
        .build()
        .unwrap();

    match workflow.run(&ChainRequest::all()).await {
        Err(PipelineError::Processing { nut, role, .. }) => {
            assert_eq!(nut, "bad.css");
            assert_eq!(role, EngineRole::Converter);
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected a processing error"),
    }
}

#[tokio::test]
async fn requested_names_narrow_the_set_in_heap_order() {
    let heap = Heap::builder("h")
        .source(
            dao_with(&[("a.css", "a"), ("b.css", "b"), ("c.css", "c")]),
            [r".*\.css"],
        )
        .build()
        .unwrap();

    let workflow = Workflow::builder("wf").heap(heap).build().unwrap();

    let outcome = workflow
        .run(&ChainRequest::named(["c.css", "a.css"]))
        .await
        .unwrap();
    let names: Vec<_> = outcome.nuts.iter().map(|n| n.name().to_string()).collect();
    assert_eq!(names, vec!["a.css", "c.css"]);

    match workflow.run(&ChainRequest::named(["missing.css"])).await {
        Err(PipelineError::Resolution { pattern }) => assert_eq!(pattern, "missing.css"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected a resolution error"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_identical_requests_compute_at_most_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let heap = Heap::builder("h")
        .source(dao_with(&[("a.css", "a")]), ["a.css"])
        .build()
        .unwrap();

    let workflow = Arc::new(
        Workflow::builder("wf")
            .heap(heap)
            .engine(Arc::new(CountingConverter {
                calls: calls.clone(),
            }))
            .cache(Arc::new(MemoryCacheProvider::new()))
            .build()
            .unwrap(),
    );

    // Warm the heap so both tasks race on the cache, not on resolution.
    workflow.heap().nuts().await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let workflow = workflow.clone();
        handles.push(tokio::spawn(async move {
            workflow.run(&ChainRequest::all()).await.unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // Losers of the per-key race wait, re-check and hit the fresh entry.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn partial_best_effort_results_are_not_cached() {
    let heap = Heap::builder("h")
        .source(dao_with(&[("a.css", "a"), ("bad.css", "x")]), [r".*\.css"])
        .build()
        .unwrap();

    let workflow = Workflow::builder("wf")
        .heap(heap)
        .engine(Arc::new(RejectingConverter {
            reject: "bad.css".into(),
        }))
        .cache(Arc::new(MemoryCacheProvider::new()))
        .build()
        .unwrap();

    let first = workflow
        .run(&ChainRequest::all().best_effort(true))
        .await
        .unwrap();
    assert_eq!(first.failures.len(), 1);

    // A replay must re-run the stages and report the drop again, not serve
    // the partial list as if nothing went missing.
    let second = workflow
        .run(&ChainRequest::all().best_effort(true))
        .await
        .unwrap();
    assert!(!second.from_cache);
    assert_eq!(second.failures.len(), 1);
    assert_eq!(second.failures[0].nut, "bad.css");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn refreshes_during_execution_never_poison_the_cache() {
    let dao = Arc::new(MemoryNutDao::new());
    dao.put("a.css", b"rev-0".to_vec());

    let heap = Heap::builder("h")
        .source(dao.clone(), ["a.css"])
        .build()
        .unwrap();

    let workflow = Arc::new(
        Workflow::builder("wf")
            .heap(heap.clone())
            .cache(Arc::new(MemoryCacheProvider::new()))
            .build()
            .unwrap(),
    );

    let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let hammer = {
        let workflow = workflow.clone();
        let stop = stop.clone();
        tokio::spawn(async move {
            while !stop.load(Ordering::SeqCst) {
                workflow.run(&ChainRequest::all()).await.unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    // A run racing the refresh must never leave old bytes stored under the
    // new heap version; after each swap the served content is current.
    for i in 1..100u32 {
        let content = format!("rev-{i}").into_bytes();
        dao.put("a.css", content.clone());
        heap.check_for_updates().await.unwrap();

        let outcome = workflow.run(&ChainRequest::all()).await.unwrap();
        assert_eq!(bytes_of(&outcome.nuts), vec![content]);
    }

    stop.store(true, Ordering::SeqCst);
    hammer.await.unwrap();
}
