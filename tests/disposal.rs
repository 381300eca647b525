use ferrous_host::{
    DiError, DiResult, Dispose, Injectable, Resolver, ResolverContext, ServiceCollection,
    ServiceProvider,
};
use std::sync::{Arc, Mutex};

type Log = Arc<Mutex<Vec<String>>>;

#[derive(Debug)]
struct Tracked {
    name: &'static str,
    log: Log,
}

impl Dispose for Tracked {
    fn dispose(&self) {
        self.log.lock().unwrap().push(format!("dispose:{}", self.name));
    }
}

fn tracked(ctx: &ResolverContext<'_>, name: &'static str, log: &Log) -> DiResult<Arc<Tracked>> {
    let service = Arc::new(Tracked {
        name,
        log: log.clone(),
    });
    ctx.register_disposer(service.clone());
    Ok(service)
}

#[derive(Debug)]
struct First(Arc<Tracked>);
struct Second(Arc<Tracked>);
struct Third(Arc<Tracked>);

#[test]
fn test_scope_disposes_in_reverse_order() {
    let log: Log = Arc::default();
    let mut sc = ServiceCollection::new();
    let (l1, l2, l3) = (log.clone(), log.clone(), log.clone());
    sc.add_scoped_factory::<First, _>(move |ctx| Ok(Arc::new(First(tracked(ctx, "first", &l1)?))));
    sc.add_scoped_factory::<Second, _>(move |ctx| Ok(Arc::new(Second(tracked(ctx, "second", &l2)?))));
    sc.add_scoped_factory::<Third, _>(move |ctx| Ok(Arc::new(Third(tracked(ctx, "third", &l3)?))));

    let sp = sc.build();
    let scope = sp.create_scope();
    scope.resolve_required::<First>().unwrap();
    scope.resolve_required::<Second>().unwrap();
    scope.resolve_required::<Third>().unwrap();

    scope.dispose();
    assert_eq!(
        *log.lock().unwrap(),
        vec!["dispose:third", "dispose:second", "dispose:first"]
    );
}

#[test]
fn test_dispose_is_idempotent() {
    let log: Log = Arc::default();
    let l = log.clone();
    let mut sc = ServiceCollection::new();
    sc.add_singleton_factory::<First, _>(move |ctx| Ok(Arc::new(First(tracked(ctx, "first", &l)?))));

    let sp = sc.build();
    sp.resolve_required::<First>().unwrap();

    sp.dispose();
    sp.dispose();
    assert_eq!(log.lock().unwrap().len(), 1);
    assert!(sp.is_disposed());
}

#[test]
fn test_scope_dispose_leaves_singletons_alone() {
    let log: Log = Arc::default();
    let (l1, l2) = (log.clone(), log.clone());
    let mut sc = ServiceCollection::new();
    sc.add_singleton_factory::<First, _>(move |ctx| Ok(Arc::new(First(tracked(ctx, "singleton", &l1)?))));
    sc.add_scoped_factory::<Second, _>(move |ctx| Ok(Arc::new(Second(tracked(ctx, "scoped", &l2)?))));

    let sp = sc.build();
    let scope = sp.create_scope();
    scope.resolve_required::<First>().unwrap();
    scope.resolve_required::<Second>().unwrap();

    scope.dispose();
    assert_eq!(*log.lock().unwrap(), vec!["dispose:scoped"]);

    sp.dispose();
    assert_eq!(*log.lock().unwrap(), vec!["dispose:scoped", "dispose:singleton"]);
}

#[test]
fn test_root_disposes_own_scoped_before_singletons() {
    let log: Log = Arc::default();
    let (l1, l2) = (log.clone(), log.clone());
    let mut sc = ServiceCollection::new();
    sc.add_scoped_factory::<Second, _>(move |ctx| Ok(Arc::new(Second(tracked(ctx, "root-scoped", &l2)?))));
    sc.add_singleton_factory::<First, _>(move |ctx| Ok(Arc::new(First(tracked(ctx, "singleton", &l1)?))));

    let sp = sc.build();
    sp.resolve_required::<First>().unwrap();
    sp.resolve_required::<Second>().unwrap();

    sp.dispose();
    assert_eq!(
        *log.lock().unwrap(),
        vec!["dispose:root-scoped", "dispose:singleton"]
    );
}

#[test]
fn test_transient_disposers_are_not_tracked() {
    let log: Log = Arc::default();
    let l = log.clone();
    let mut sc = ServiceCollection::new();
    sc.add_transient_factory::<First, _>(move |ctx| Ok(Arc::new(First(tracked(ctx, "transient", &l)?))));

    let sp = sc.build();
    let scope = sp.create_scope();
    scope.resolve_required::<First>().unwrap();
    scope.dispose();
    sp.dispose();

    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn test_dropping_scope_disposes_it() {
    let log: Log = Arc::default();
    let l = log.clone();
    let mut sc = ServiceCollection::new();
    sc.add_scoped_factory::<First, _>(move |ctx| Ok(Arc::new(First(tracked(ctx, "dropped", &l)?))));

    let sp = sc.build();
    {
        let scope = sp.create_scope();
        scope.resolve_required::<First>().unwrap();
    }
    assert_eq!(*log.lock().unwrap(), vec!["dispose:dropped"]);
}

struct Connection {
    log: Log,
}

impl Dispose for Connection {
    fn dispose(&self) {
        self.log.lock().unwrap().push("dispose:connection".to_string());
    }
}

impl Injectable for Connection {
    fn construct(ctx: &ResolverContext<'_>) -> DiResult<Self> {
        Ok(Connection {
            log: ctx.dependency::<Mutex<Vec<String>>>()?,
        })
    }

    fn disposer(this: &Arc<Self>) -> Option<Arc<dyn Dispose>> {
        Some(this.clone())
    }
}

#[test]
fn test_constructed_services_dispose_through_injectable_hook() {
    let log: Log = Arc::default();
    let mut sc = ServiceCollection::new();
    sc.add_singleton_instance::<Mutex<Vec<String>>>(log.clone());
    sc.add_scoped::<Connection, Connection>();

    let sp = sc.build();
    let scope = sp.create_scope();
    let connection = scope.resolve_required::<Connection>().unwrap();
    assert!(Arc::ptr_eq(&connection.log, &log));

    scope.dispose();
    assert_eq!(*log.lock().unwrap(), vec!["dispose:connection"]);
}

#[test]
fn test_resolution_after_root_dispose_fails() {
    let mut sc = ServiceCollection::new();
    sc.add_instance(5u8);
    let sp = sc.build();
    sp.dispose();

    assert!(matches!(
        sp.resolve::<u8>(),
        Err(DiError::Disposed { container: "root" })
    ));
    assert!(sp.resolve_all::<u8>().is_err());
}

#[test]
fn test_singleton_finished_after_root_dispose_is_disposed_not_cached() {
    let log: Log = Arc::default();
    let root: Arc<Mutex<Option<ServiceProvider>>> = Arc::default();
    let (l, slot) = (log.clone(), root.clone());
    let mut sc = ServiceCollection::new();
    sc.add_singleton_factory::<First, _>(move |ctx| {
        let first = tracked(ctx, "first", &l)?;
        // Host shuts down while the singleton is still being built.
        if let Some(sp) = slot.lock().unwrap().take() {
            sp.dispose();
        }
        Ok(Arc::new(First(first)))
    });

    let sp = sc.build();
    *root.lock().unwrap() = Some(sp.clone());

    let err = sp.resolve_required::<First>().unwrap_err();
    assert!(matches!(err, DiError::Disposed { container: "root" }));
    assert_eq!(*log.lock().unwrap(), vec!["dispose:first"]);
    assert_eq!(sp.singleton_count(), 0);

    sp.dispose();
    assert_eq!(log.lock().unwrap().len(), 1);
}
