use datascope::api::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

#[derive(Debug, PartialEq)]
struct Locale(&'static str);

const THREADS: usize = 8;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_concurrent_self_healing_learns_once() {
    init_logging();
    let catalog = Arc::new(DataCatalog::new());
    catalog.register(supplier_fn(|_, _| Ok(Locale("en-GB"))));
    let mut tree = ScopeProviderTree::new(catalog, EngineConfig::default());
    let page = tree.add_child(tree.root(), "page").unwrap();
    let leaf = tree.add_child(page, "leaf").unwrap();
    tree.resolve_data_scopes().unwrap();

    let builder = ContextBuilder::new(Arc::new(tree));
    let barrier = Arc::new(Barrier::new(THREADS));
    let missing_calls = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let builder = builder.clone();
            let barrier = Arc::clone(&barrier);
            let missing_calls = Arc::clone(&missing_calls);
            thread::spawn(move || {
                let request = RequestScope::new();
                builder.setup_data_context(&request).unwrap();
                barrier.wait();
                let locale = request.context_for(leaf).unwrap().get::<Locale>(None).unwrap();
                missing_calls.fetch_add(request.missing_data_calls(), Ordering::SeqCst);
                assert_eq!(*locale, Locale("en-GB"));
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let dependency = Dependency::of::<Locale>(None);
    let entries: usize = builder
        .tree()
        .pre_order()
        .into_iter()
        .map(|id| {
            builder
                .tree()
                .definition(id)
                .unwrap()
                .entries()
                .iter()
                .filter(|entry| entry.dependency == dependency)
                .count()
        })
        .sum();
    assert_eq!(entries, 1);
    assert!(builder.tree().definition(leaf).unwrap().contains(&dependency));
    assert_eq!(missing_calls.load(Ordering::SeqCst), THREADS);

    let request = RequestScope::new();
    builder.setup_data_context(&request).unwrap();
    request.context_for(leaf).unwrap().get::<Locale>(None).unwrap();
    assert_eq!(request.missing_data_calls(), 0);
}

#[test]
fn test_shared_tree_serves_parallel_requests() {
    init_logging();
    let catalog = Arc::new(DataCatalog::new());
    catalog.register(supplier_fn(|_, dependency| {
        Ok(dependency.scope_name().unwrap_or("anonymous").to_string())
    }));
    let mut tree = ScopeProviderTree::new(catalog, EngineConfig::default());
    let root = tree.root();
    tree.rules_mut(root).unwrap().add_scope(Scope::wildcard());
    let mut regions = Vec::new();
    for name in ["north", "south", "east", "west"] {
        let region = tree.add_child(root, name).unwrap();
        tree.rules_mut(region)
            .unwrap()
            .add_scope(Scope::named(name))
            .add_consumer(Dependency::of::<String>(Some(name)))
            .add_consumer(Dependency::of::<String>(None));
        regions.push((region, name));
    }
    tree.resolve_data_scopes().unwrap();
    let builder = ContextBuilder::new(Arc::new(tree));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let builder = builder.clone();
            let regions = regions.clone();
            thread::spawn(move || {
                for _ in 0..25 {
                    let request = RequestScope::new();
                    builder.setup_data_context(&request).unwrap();
                    for (region, name) in &regions {
                        let context = request.context_for(*region).unwrap();
                        assert_eq!(*context.get::<String>(Some(*name)).unwrap(), *name);
                        assert_eq!(*context.get::<String>(None).unwrap(), "anonymous");
                    }
                    assert_eq!(request.missing_data_calls(), 0);
                    request.dispose().unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}
