//! Error types for the container, the module host and the pipeline.

use thiserror::Error;

use crate::cancellation::CancellationError;

/// Boxed error used for failures raised by user code (factories, module hooks,
/// pipeline components).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependency injection and composition errors.
///
/// # Examples
///
/// ```rust
/// use ferrous_host::{DiError, ServiceCollection, Resolver};
///
/// let provider = ServiceCollection::new().build();
/// match provider.resolve_required::<String>() {
///     Err(DiError::UnresolvedService { service }) => {
///         assert_eq!(service, "alloc::string::String");
///     }
///     _ => unreachable!(),
/// }
/// ```
///
/// ```rust
/// use ferrous_host::DiError;
///
/// let cycle = DiError::CyclicDependency { modules: vec!["P", "Q"] };
/// assert_eq!(cycle.to_string(), "cyclic module dependency among: P, Q");
/// ```
#[derive(Debug, Error)]
pub enum DiError {
    /// Required resolution found no descriptor.
    #[error("service not registered: {service}")]
    UnresolvedService { service: &'static str },

    /// A required constructor dependency of `for_type` could not be resolved.
    #[error("cannot construct {for_type}: dependency {parameter} failed to resolve")]
    UnresolvedDependency {
        for_type: &'static str,
        parameter: &'static str,
        #[source]
        source: Box<DiError>,
    },

    /// Module dependency graph contains a cycle. Fatal at load time.
    #[error("cyclic module dependency among: {}", .modules.join(", "))]
    CyclicDependency { modules: Vec<&'static str> },

    /// Resolution attempted on a disposed container.
    #[error("{container} container has been disposed")]
    Disposed { container: &'static str },

    /// Service graph cycle detected during resolution (includes path).
    #[error("circular service dependency: {}", .0.join(" -> "))]
    Circular(Vec<&'static str>),

    /// Maximum resolution depth exceeded.
    #[error("max resolution depth {0} exceeded")]
    DepthExceeded(usize),

    /// Stored instance did not have the requested type.
    #[error("type mismatch for: {0}")]
    TypeMismatch(&'static str),

    /// A factory or constructor reported a failure of its own.
    #[error("failed to construct {service}: {source}")]
    Construction {
        service: &'static str,
        #[source]
        source: BoxError,
    },

    /// A module lifecycle hook failed.
    #[error("module {module} failed during {phase}: {source}")]
    Module {
        module: &'static str,
        phase: &'static str,
        #[source]
        source: BoxError,
    },

    /// Initialization already failed once; module hooks are not re-run.
    #[error("application initialization failed earlier; create a new application")]
    InitializationFailed,

    /// Options validation rejected the configured value.
    #[error("options {options} failed validation: {message}")]
    OptionsValidation { options: &'static str, message: String },

    /// A keyed factory registry has no entry for the requested key.
    #[error("no factory registered in {registry} for key {key}")]
    UnknownKey { registry: &'static str, key: String },
}

impl DiError {
    /// Wraps a user-level failure raised while building `S`.
    pub fn construction<S: ?Sized>(source: impl Into<BoxError>) -> Self {
        DiError::Construction {
            service: std::any::type_name::<S>(),
            source: source.into(),
        }
    }

    /// Errors that describe the shape of the container rather than a single
    /// missing service. These pass through dependency wrapping untouched.
    pub(crate) fn is_structural(&self) -> bool {
        matches!(
            self,
            DiError::Circular(_) | DiError::DepthExceeded(_) | DiError::Disposed { .. }
        )
    }

    /// Walks `UnresolvedDependency` wrappers down to the innermost cause.
    pub fn root_cause(&self) -> &DiError {
        let mut current = self;
        while let DiError::UnresolvedDependency { source, .. } = current {
            current = source.as_ref();
        }
        current
    }
}

/// Result type for DI operations.
///
/// ```rust
/// use ferrous_host::{DiResult, DiError};
///
/// fn failing_operation() -> DiResult<()> {
///     Err(DiError::UnresolvedService { service: "some_service" })
/// }
///
/// assert!(failing_operation().is_err());
/// ```
pub type DiResult<T> = Result<T, DiError>;

/// Failure of a pipeline invocation.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A component returned an error of its own.
    #[error("component {component} failed: {source}")]
    Fault {
        component: &'static str,
        #[source]
        source: BoxError,
    },

    /// A container-resolved component could not be resolved.
    #[error(transparent)]
    Resolution(#[from] DiError),

    /// The invocation's cancellation token was triggered.
    #[error(transparent)]
    Cancelled(#[from] CancellationError),

    /// `invoke` was called with a context that already ran.
    #[error("execution context has already been invoked")]
    ContextReused,
}

impl PipelineError {
    /// Wraps an error raised by component `C`.
    pub fn fault<C: ?Sized>(source: impl Into<BoxError>) -> Self {
        PipelineError::Fault {
            component: std::any::type_name::<C>(),
            source: source.into(),
        }
    }
}

/// Result type for pipeline components.
pub type PipelineResult<T = ()> = Result<T, PipelineError>;
