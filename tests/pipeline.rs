use ferrous_host::{
    async_trait, CancellationToken, ContainerOptions, DiError, DiResult, ErrorBoundary,
    ExecutionContext, Injectable, InvocationState, Middleware, Next, PipelineBuilder,
    PipelineError, PipelineResult, Request, ResolverContext, ServiceCollection,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type Trace = Arc<Mutex<Vec<String>>>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Layer {
    name: &'static str,
    trace: Trace,
}

#[async_trait]
impl Middleware for Layer {
    async fn handle(&self, ctx: &mut ExecutionContext, next: Next<'_>) -> PipelineResult {
        self.trace.lock().unwrap().push(format!("{}:in", self.name));
        next.run(ctx).await?;
        self.trace.lock().unwrap().push(format!("{}:out", self.name));
        Ok(())
    }
}

fn layer(name: &'static str, trace: &Trace) -> Arc<dyn Middleware> {
    Arc::new(Layer {
        name,
        trace: trace.clone(),
    })
}

#[tokio::test]
async fn test_components_wrap_in_registration_order() {
    let trace: Trace = Arc::default();
    let mut builder = PipelineBuilder::new(ServiceCollection::new().build());
    builder
        .use_middleware(layer("L1", &trace))
        .use_middleware(layer("L2", &trace))
        .use_middleware(layer("L3", &trace));
    let pipeline = builder.build().unwrap();
    assert_eq!(pipeline.len(), 3);

    let ctx = pipeline.handle(Request::new("GET", "/")).await.unwrap();
    assert_eq!(
        *trace.lock().unwrap(),
        ["L1:in", "L2:in", "L3:in", "L3:out", "L2:out", "L1:out"]
    );
    assert_eq!(ctx.state(), InvocationState::Completed);
}

#[tokio::test]
async fn test_short_circuit_skips_inner_components() {
    let reached = Arc::new(AtomicUsize::new(0));
    let counter = reached.clone();

    let mut builder = PipelineBuilder::new(ServiceCollection::new().build());
    builder
        .use_fn(|ctx, next| {
            Box::pin(async move {
                if ctx.request().header("authorization").is_none() {
                    ctx.response_mut().status = 401;
                    return Ok(());
                }
                next.run(ctx).await
            })
        })
        .use_fn(move |_ctx, _next| {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        });
    let pipeline = builder.build().unwrap();

    let denied = pipeline.handle(Request::new("GET", "/orders")).await.unwrap();
    assert_eq!(denied.response().status, 401);
    assert_eq!(denied.state(), InvocationState::ShortCircuited);
    assert_eq!(reached.load(Ordering::SeqCst), 0);

    let allowed = pipeline
        .handle(Request::new("GET", "/orders").with_header("authorization", "Bearer t"))
        .await
        .unwrap();
    assert_eq!(allowed.response().status, 200);
    assert_eq!(reached.load(Ordering::SeqCst), 1);
    // The inner component returned without calling next
    assert_eq!(allowed.state(), InvocationState::ShortCircuited);
}

/// Answers without calling `next`.
struct Responder {
    trace: Trace,
}

#[async_trait]
impl Middleware for Responder {
    async fn handle(&self, ctx: &mut ExecutionContext, _next: Next<'_>) -> PipelineResult {
        self.trace.lock().unwrap().push("L2:in".to_string());
        ctx.response_mut().status = 304;
        self.trace.lock().unwrap().push("L2:out".to_string());
        Ok(())
    }
}

#[tokio::test]
async fn test_middle_component_short_circuits_and_outer_unwinds() {
    let trace: Trace = Arc::default();
    let mut builder = PipelineBuilder::new(ServiceCollection::new().build());
    builder
        .use_middleware(layer("L1", &trace))
        .use_middleware(Arc::new(Responder {
            trace: trace.clone(),
        }))
        .use_middleware(layer("L3", &trace));
    let pipeline = builder.build().unwrap();

    let ctx = pipeline.handle(Request::new("GET", "/assets/app.js")).await.unwrap();
    assert_eq!(*trace.lock().unwrap(), ["L1:in", "L2:in", "L2:out", "L1:out"]);
    assert_eq!(ctx.state(), InvocationState::ShortCircuited);
    assert_eq!(ctx.response().status, 304);
}

#[tokio::test]
async fn test_empty_pipeline_completes() {
    let pipeline = PipelineBuilder::new(ServiceCollection::new().build())
        .build()
        .unwrap();
    let ctx = pipeline.handle(Request::new("GET", "/")).await.unwrap();
    assert_eq!(ctx.state(), InvocationState::Completed);
    assert_eq!(ctx.response().status, 200);
}

struct Failing;

#[async_trait]
impl Middleware for Failing {
    async fn handle(&self, _ctx: &mut ExecutionContext, _next: Next<'_>) -> PipelineResult {
        Err(PipelineError::fault::<Failing>("database unavailable"))
    }
}

#[tokio::test]
async fn test_error_boundary_turns_faults_into_500() {
    init_tracing();
    let mut sc = ServiceCollection::new();
    sc.add_singleton::<ErrorBoundary, ErrorBoundary>();

    let mut builder = PipelineBuilder::new(sc.build());
    builder
        .use_component::<ErrorBoundary>()
        .use_middleware(Arc::new(Failing));
    let pipeline = builder.build().unwrap();

    let ctx = pipeline.handle(Request::new("POST", "/orders")).await.unwrap();
    assert_eq!(ctx.response().status, 500);
    assert!(ctx.response().body_text().contains("database unavailable"));
    assert_eq!(ctx.state(), InvocationState::Faulted);
}

#[tokio::test]
async fn test_fault_without_boundary_propagates() {
    let mut builder = PipelineBuilder::new(ServiceCollection::new().build());
    builder.use_middleware(Arc::new(Failing));
    let pipeline = builder.build().unwrap();

    match pipeline.handle(Request::new("GET", "/")).await {
        Err(PipelineError::Fault { component, .. }) => assert!(component.ends_with("Failing")),
        other => panic!("expected a fault, got ok={}", other.is_ok()),
    }
}

struct RequestCounter {
    hits: AtomicUsize,
}

impl Injectable for RequestCounter {
    fn construct(_: &ResolverContext<'_>) -> DiResult<Self> {
        Ok(RequestCounter {
            hits: AtomicUsize::new(0),
        })
    }
}

struct CountingComponent {
    counter: Arc<RequestCounter>,
}

impl Injectable for CountingComponent {
    fn construct(ctx: &ResolverContext<'_>) -> DiResult<Self> {
        Ok(CountingComponent {
            counter: ctx.dependency::<RequestCounter>()?,
        })
    }
}

#[async_trait]
impl Middleware for CountingComponent {
    async fn handle(&self, ctx: &mut ExecutionContext, next: Next<'_>) -> PipelineResult {
        let hits = self.counter.hits.fetch_add(1, Ordering::SeqCst) + 1;
        ctx.insert(hits);
        next.run(ctx).await
    }
}

#[tokio::test]
async fn test_container_components_resolve_per_request_scope() {
    let mut sc = ServiceCollection::new();
    sc.add_scoped::<RequestCounter, RequestCounter>();
    sc.add_transient::<CountingComponent, CountingComponent>();

    let mut builder = PipelineBuilder::new(sc.build());
    builder
        .use_component::<CountingComponent>()
        .use_component::<CountingComponent>();
    let pipeline = builder.build().unwrap();

    // Both components share the request's scoped counter
    let first = pipeline.handle(Request::new("GET", "/")).await.unwrap();
    assert_eq!(first.get::<usize>(), Some(&2));
    assert!(first.scope().is_disposed());

    // A new request gets a fresh scope
    let second = pipeline.handle(Request::new("GET", "/")).await.unwrap();
    assert_eq!(second.get::<usize>(), Some(&2));
}

#[test]
fn test_unregistered_component_fails_at_build() {
    let mut builder = PipelineBuilder::new(ServiceCollection::new().build());
    builder.use_component::<ErrorBoundary>();
    match builder.build() {
        Err(DiError::UnresolvedService { service }) => assert!(service.ends_with("ErrorBoundary")),
        Err(other) => panic!("expected UnresolvedService, got {}", other),
        Ok(_) => panic!("build should fail"),
    }
}

#[tokio::test]
async fn test_unvalidated_component_fails_at_invocation() {
    let provider = ServiceCollection::new().build_with(ContainerOptions {
        validate_pipeline_on_build: false,
        ..ContainerOptions::default()
    });
    let mut builder = PipelineBuilder::new(provider);
    builder.use_component::<ErrorBoundary>();
    let pipeline = builder.build().unwrap();

    let result = pipeline.handle(Request::new("GET", "/")).await;
    assert!(matches!(
        result,
        Err(PipelineError::Resolution(DiError::UnresolvedService { .. }))
    ));
}

#[tokio::test]
async fn test_cancelled_invocation_stops_before_next_component() {
    let trace: Trace = Arc::default();
    let token = CancellationToken::new();
    let canceller = token.clone();

    let mut builder = PipelineBuilder::new(ServiceCollection::new().build());
    builder
        .use_fn(move |ctx, next| {
            let canceller = canceller.clone();
            Box::pin(async move {
                canceller.cancel();
                next.run(ctx).await
            })
        })
        .use_middleware(layer("inner", &trace));
    let pipeline = builder.build().unwrap();

    let result = pipeline
        .handle_with_token(Request::new("GET", "/slow"), token)
        .await;
    assert!(matches!(result, Err(PipelineError::Cancelled(_))));
    assert!(trace.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_context_cannot_be_invoked_twice() {
    let provider = ServiceCollection::new().build();
    let pipeline = PipelineBuilder::new(provider.clone()).build().unwrap();

    let mut ctx = ExecutionContext::new(Request::new("GET", "/"), provider.create_scope());
    pipeline.invoke(&mut ctx).await.unwrap();
    assert!(matches!(
        pipeline.invoke(&mut ctx).await,
        Err(PipelineError::ContextReused)
    ));
}

#[tokio::test]
async fn test_pipeline_handles_concurrent_requests() {
    let mut builder = PipelineBuilder::new(ServiceCollection::new().build());
    builder.use_fn(|ctx, next| {
        Box::pin(async move {
            let path = ctx.request().path.clone();
            ctx.response_mut().write(path);
            next.run(ctx).await
        })
    });
    let pipeline = Arc::new(builder.build().unwrap());

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let pipeline = pipeline.clone();
            tokio::spawn(async move {
                let ctx = pipeline.handle(Request::new("GET", format!("/{}", i))).await.unwrap();
                (i, ctx.response().body_text())
            })
        })
        .collect();

    for task in tasks {
        let (i, body) = task.await.unwrap();
        assert_eq!(body, format!("/{}", i));
    }
}
