use datascope::api::*;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, PartialEq)]
struct Person(String);

#[derive(Debug, PartialEq)]
struct Address(String);

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn person_catalog() -> Arc<DataCatalog> {
    let catalog = Arc::new(DataCatalog::new());
    catalog.register(supplier_fn(|_, dependency| {
        Ok(Person(dependency.scope_name().unwrap_or("default").to_string()))
    }));
    catalog
}

fn assert_no_duplicate_resolution(tree: &ScopeProviderTree) {
    for node in tree.pre_order() {
        let own: HashSet<Dependency> =
            tree.definition(node).unwrap().dependencies().into_iter().collect();
        for ancestor in tree.ancestors(node) {
            for dependency in tree.definition(ancestor).unwrap().dependencies() {
                assert!(
                    !own.contains(&dependency),
                    "{} resolved by both {} and ancestor {}",
                    dependency,
                    node,
                    ancestor
                );
            }
        }
    }
}

#[test]
fn test_no_duplicate_resolution_between_node_and_ancestors() {
    init_logging();
    let mut tree = ScopeProviderTree::new(person_catalog(), EngineConfig::default());
    let root = tree.root();
    tree.rules_mut(root)
        .unwrap()
        .add_scope(Scope::for_type::<Person>())
        .add_supply(Dependency::of::<Person>(None));

    let layout = tree.add_child(root, "layout").unwrap();
    tree.rules_mut(layout)
        .unwrap()
        .add_supply(Dependency::of::<Person>(None))
        .add_supply(Dependency::of::<Person>(Some("customer")));
    let region = tree.add_child(layout, "region").unwrap();
    tree.rules_mut(region)
        .unwrap()
        .add_supply(Dependency::of::<Person>(Some("customer")))
        .add_consumer(Dependency::of::<Person>(None));

    let report = tree.resolve_data_scopes().unwrap();
    assert_no_duplicate_resolution(&tree);
    assert_eq!(report.pruned, 2);
    assert_eq!(report.resolved, 2);
    assert!(tree.definition(root).unwrap().contains(&Dependency::of::<Person>(None)));
    assert_eq!(
        tree.definition(layout).unwrap().dependencies(),
        vec![Dependency::of::<Person>(Some("customer"))]
    );
    assert!(tree.definition(region).unwrap().is_empty());
}

#[test]
fn test_consumers_are_claimed_by_nearest_scope() {
    init_logging();
    let mut tree = ScopeProviderTree::new(person_catalog(), EngineConfig::default());
    let root = tree.root();
    tree.rules_mut(root).unwrap().add_scope(Scope::wildcard());
    let page = tree.add_child(root, "page").unwrap();
    tree.rules_mut(page)
        .unwrap()
        .add_scope(Scope::exact::<Person>("customer"));
    let region = tree.add_child(page, "region").unwrap();
    tree.rules_mut(region)
        .unwrap()
        .add_consumer(Dependency::of::<Person>(Some("customer")))
        .add_consumer(Dependency::of::<Person>(Some("vendor")));

    let report = tree.resolve_data_scopes().unwrap();
    assert!(report.unclaimed.is_empty());
    assert_eq!(
        tree.definition(page).unwrap().dependencies(),
        vec![Dependency::of::<Person>(Some("customer"))]
    );
    assert_eq!(
        tree.definition(root).unwrap().dependencies(),
        vec![Dependency::of::<Person>(Some("vendor"))]
    );
    assert!(tree.definition(region).unwrap().is_empty());
}

#[test]
fn test_unclaimed_and_unresolved_are_reported() {
    init_logging();
    let mut tree = ScopeProviderTree::new(Arc::new(DataCatalog::new()), EngineConfig::default());
    let root = tree.root();
    tree.rules_mut(root)
        .unwrap()
        .add_supply(Dependency::of::<Address>(None));
    let page = tree.add_child(root, "page").unwrap();
    tree.rules_mut(page)
        .unwrap()
        .add_consumer(Dependency::of::<Person>(None));

    let report = tree.resolve_data_scopes().unwrap();
    assert_eq!(report.unclaimed, vec![(page, Dependency::of::<Person>(None))]);
    assert_eq!(report.unresolved, vec![(root, Dependency::of::<Address>(None))]);
    assert_eq!(report.resolved, 0);
    assert!(tree.is_resolved());
}

#[test]
fn test_strict_resolution_fails_on_missing_supplier() {
    init_logging();
    let config = EngineConfig {
        strict_resolution: true,
        ..EngineConfig::default()
    };
    let mut tree = ScopeProviderTree::new(person_catalog(), config);
    let root = tree.root();
    tree.rules_mut(root)
        .unwrap()
        .add_supply(Dependency::of::<Person>(None))
        .add_supply(Dependency::of::<Address>(None));

    let err = tree.resolve_data_scopes().unwrap_err();
    assert!(matches!(err, ScopeError::UnresolvedDependency { .. }));
    assert!(err.is_startup_fatal());
    assert!(!tree.is_resolved());
}

#[test]
fn test_resolution_is_idempotent() {
    init_logging();
    let mut tree = ScopeProviderTree::new(person_catalog(), EngineConfig::default());
    let root = tree.root();
    tree.rules_mut(root)
        .unwrap()
        .add_scope(Scope::for_type::<Person>())
        .add_supply(Dependency::of::<Person>(None));
    for name in ["left", "right"] {
        let child = tree.add_child(root, name).unwrap();
        tree.rules_mut(child)
            .unwrap()
            .add_scope(Scope::named(name))
            .add_consumer(Dependency::of::<Person>(Some(name)))
            .add_consumer(Dependency::of::<Person>(None));
    }

    let first = tree.resolve_data_scopes().unwrap();
    let snapshot: Vec<_> = tree
        .pre_order()
        .into_iter()
        .map(|id| tree.definition(id).unwrap().keys())
        .collect();

    let second = tree.resolve_data_scopes().unwrap();
    let again: Vec<_> = tree
        .pre_order()
        .into_iter()
        .map(|id| tree.definition(id).unwrap().keys())
        .collect();

    assert_eq!(snapshot, again);
    assert_eq!(first.resolved, second.resolved);
    assert_eq!(first.pruned, second.pruned);
    assert_no_duplicate_resolution(&tree);
}

#[test]
fn test_scoped_lookup_never_crosses_siblings() {
    init_logging();
    let mut tree = ScopeProviderTree::new(person_catalog(), EngineConfig::default());
    let a = tree.add_child(tree.root(), "a").unwrap();
    let b1 = tree.add_child(a, "b1").unwrap();
    let b2 = tree.add_child(a, "b2").unwrap();
    tree.rules_mut(b1)
        .unwrap()
        .add_scope(Scope::exact::<Person>("b1"))
        .add_supply(Dependency::of::<Person>(Some("b1")));
    tree.rules_mut(b2)
        .unwrap()
        .add_scope(Scope::exact::<Person>("b2"))
        .add_supply(Dependency::of::<Person>(Some("b2")));
    tree.resolve_data_scopes().unwrap();

    let builder = ContextBuilder::new(Arc::new(tree));
    let request = RequestScope::new();
    builder.setup_data_context(&request).unwrap();

    let left = request.context_for(b1).unwrap();
    let right = request.context_for(b2).unwrap();
    assert_eq!(*left.get::<Person>(Some("b1")).unwrap(), Person("b1".to_string()));
    assert_eq!(*right.get::<Person>(Some("b2")).unwrap(), Person("b2".to_string()));
    assert!(left.get_optional::<Person>(Some("b2")).is_none());
    assert!(right.get_optional::<Person>(Some("b1")).is_none());
    assert!(request.context_for(a).unwrap().get_optional::<Person>(Some("b1")).is_none());
}

#[test]
fn test_node_local_supplier_overrides_catalog() {
    init_logging();
    let mut tree = ScopeProviderTree::new(person_catalog(), EngineConfig::default());
    let page = tree.add_child(tree.root(), "page").unwrap();
    tree.rules_mut(page)
        .unwrap()
        .add_supplier(supplier_fn(|_, _| Ok(Person("local".to_string()))))
        .add_supply(Dependency::of::<Person>(None));
    tree.resolve_data_scopes().unwrap();

    let builder = ContextBuilder::new(Arc::new(tree));
    let request = RequestScope::new();
    builder.setup_data_context(&request).unwrap();
    assert_eq!(
        *request.context_for(page).unwrap().get::<Person>(None).unwrap(),
        Person("local".to_string())
    );
}

#[test]
fn test_run_after_declared_too_late_is_reported() {
    init_logging();
    let catalog = person_catalog();
    catalog.register(
        supplier_fn(|context, _| {
            let person = context.get::<Person>(None)?;
            Ok(Address(format!("{} street", person.0)))
        })
        .after(Dependency::of::<Person>(None)),
    );

    let mut tree = ScopeProviderTree::new(catalog, EngineConfig::default());
    let root = tree.root();
    tree.rules_mut(root)
        .unwrap()
        .add_supply(Dependency::of::<Address>(None))
        .add_supply(Dependency::of::<Person>(None));

    let report = tree.resolve_data_scopes().unwrap();
    assert_eq!(report.ordering_warnings.len(), 1);
    assert!(report.ordering_warnings[0].contains("Address"));
}

struct Region {
    name: &'static str,
    reads: &'static str,
}

impl ScopedElement for Region {
    fn element_name(&self) -> &str {
        self.name
    }

    fn declare_scope(&self, rules: &mut ScopeRules) {
        rules.add_consumer(Dependency::of::<Person>(Some(self.reads)));
    }
}

struct Page {
    regions: Vec<Region>,
}

impl ScopedElement for Page {
    fn element_name(&self) -> &str {
        "page"
    }

    fn declare_scope(&self, rules: &mut ScopeRules) {
        rules.add_scope(Scope::for_type::<Person>());
    }

    fn children(&self) -> Vec<&dyn ScopedElement> {
        self.regions.iter().map(|r| r as &dyn ScopedElement).collect()
    }
}

#[test]
fn test_elements_declare_their_scopes() {
    init_logging();
    let mut tree = ScopeProviderTree::new(person_catalog(), EngineConfig::default());
    let page = Page {
        regions: vec![
            Region { name: "header", reads: "customer" },
            Region { name: "footer", reads: "customer" },
            Region { name: "sidebar", reads: "vendor" },
        ],
    };
    let page_id = tree.add_element(tree.root(), &page).unwrap();
    tree.resolve_data_scopes().unwrap();

    assert_eq!(
        tree.definition(page_id).unwrap().dependencies(),
        vec![
            Dependency::of::<Person>(Some("customer")),
            Dependency::of::<Person>(Some("vendor")),
        ]
    );
    assert_no_duplicate_resolution(&tree);
}

#[test]
fn test_failed_strict_resolution_keeps_previous_definitions() {
    init_logging();
    let config = EngineConfig {
        strict_resolution: true,
        ..EngineConfig::default()
    };
    let mut tree = ScopeProviderTree::new(person_catalog(), config);
    let root = tree.root();
    tree.rules_mut(root)
        .unwrap()
        .add_supply(Dependency::of::<Person>(None));
    let page = tree.add_child(root, "page").unwrap();
    tree.rules_mut(page)
        .unwrap()
        .add_supply(Dependency::of::<Person>(None));
    let leaf = tree.add_child(page, "leaf").unwrap();
    tree.resolve_data_scopes().unwrap();
    assert!(tree.definition(page).unwrap().is_empty());

    tree.rules_mut(leaf)
        .unwrap()
        .add_supply(Dependency::of::<Address>(None));
    let err = tree.resolve_data_scopes().unwrap_err();
    assert!(matches!(err, ScopeError::UnresolvedDependency { .. }));

    assert!(tree.is_resolved());
    assert_no_duplicate_resolution(&tree);
    assert_eq!(
        tree.definition(root).unwrap().dependencies(),
        vec![Dependency::of::<Person>(None)]
    );
    assert!(tree.definition(page).unwrap().is_empty());
    assert!(tree.definition(leaf).unwrap().is_empty());
}
