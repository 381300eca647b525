//! Strongly-typed options registered as immutable singletons.
//!
//! Modules usually expose their settings through [`Options<T>`]: the value is
//! assembled once, on first resolution, from a default plus a chain of
//! configure callbacks that may read other services.

use std::sync::Arc;

use crate::collection::ServiceCollection;
use crate::error::{DiError, DiResult};
use crate::provider::ResolverContext;

type DefaultFn<T> = Arc<dyn Fn() -> T + Send + Sync>;
type ConfigureFn<T> = Arc<dyn Fn(&ResolverContext<'_>, &mut T) -> DiResult<()> + Send + Sync>;
type ValidateFn<T> = Arc<dyn Fn(&T) -> Result<(), String> + Send + Sync>;

/// Immutable snapshot of configured options.
///
/// # Examples
///
/// ```
/// use ferrous_host::{ServiceCollection, Options, Resolver, DiResult};
///
/// #[derive(Default)]
/// struct DatabaseConfig {
///     url: String,
///     pool_size: u32,
/// }
///
/// # fn main() -> DiResult<()> {
/// let mut services = ServiceCollection::new();
/// services
///     .add_options::<DatabaseConfig>()
///     .configure(|_, config| {
///         config.url = "postgres://localhost".to_string();
///         config.pool_size = 8;
///         Ok(())
///     })
///     .register();
///
/// let provider = services.build();
/// let options = provider.resolve_required::<Options<DatabaseConfig>>()?;
/// assert_eq!(options.get().pool_size, 8);
/// # Ok(())
/// # }
/// ```
pub struct Options<T> {
    value: Arc<T>,
}

impl<T> Options<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Arc::new(value),
        }
    }

    /// Shared handle to the configured value.
    pub fn get(&self) -> Arc<T> {
        self.value.clone()
    }

    pub fn value(&self) -> &T {
        &self.value
    }
}

/// Fluent builder returned by [`ServiceCollection::add_options`].
///
/// Steps run in a fixed order when `Options<T>` is first resolved:
/// the default value, every `configure` callback, every `post_configure`
/// callback, then every `validate` check. A failed check surfaces as
/// [`DiError::OptionsValidation`] from the resolution call.
pub struct OptionsBuilder<'a, T>
where
    T: Default + Send + Sync + 'static,
{
    services: &'a mut ServiceCollection,
    default_maker: Option<DefaultFn<T>>,
    configures: Vec<ConfigureFn<T>>,
    post_configures: Vec<ConfigureFn<T>>,
    validates: Vec<ValidateFn<T>>,
}

impl<'a, T> OptionsBuilder<'a, T>
where
    T: Default + Send + Sync + 'static,
{
    fn new(services: &'a mut ServiceCollection) -> Self {
        Self {
            services,
            default_maker: None,
            configures: Vec::new(),
            post_configures: Vec::new(),
            validates: Vec::new(),
        }
    }

    /// Starting value used instead of `T::default()`.
    pub fn default_with<F>(mut self, f: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.default_maker = Some(Arc::new(f));
        self
    }

    /// Adds a configure step. Steps run in the order they were added and
    /// may resolve other services through the context.
    pub fn configure<F>(mut self, f: F) -> Self
    where
        F: Fn(&ResolverContext<'_>, &mut T) -> DiResult<()> + Send + Sync + 'static,
    {
        self.configures.push(Arc::new(f));
        self
    }

    /// Adds a step that runs after every configure step, for derived fields.
    ///
    /// ```
    /// use ferrous_host::{ServiceCollection, Options, Resolver, DiResult};
    ///
    /// #[derive(Default)]
    /// struct UrlConfig { base: String, path: String, full: String }
    ///
    /// # fn main() -> DiResult<()> {
    /// let mut services = ServiceCollection::new();
    /// services
    ///     .add_options::<UrlConfig>()
    ///     .post_configure(|_, config| {
    ///         config.full = format!("{}{}", config.base, config.path);
    ///         Ok(())
    ///     })
    ///     .configure(|_, config| {
    ///         config.base = "https://api.example.com".into();
    ///         config.path = "/v1".into();
    ///         Ok(())
    ///     })
    ///     .register();
    ///
    /// let provider = services.build();
    /// let options = provider.resolve_required::<Options<UrlConfig>>()?;
    /// assert_eq!(options.value().full, "https://api.example.com/v1");
    /// # Ok(())
    /// # }
    /// ```
    pub fn post_configure<F>(mut self, f: F) -> Self
    where
        F: Fn(&ResolverContext<'_>, &mut T) -> DiResult<()> + Send + Sync + 'static,
    {
        self.post_configures.push(Arc::new(f));
        self
    }

    /// Adds a validation check run against the final value.
    pub fn validate<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validates.push(Arc::new(f));
        self
    }

    /// Registers `Options<T>` as a singleton factory and returns the
    /// collection for further chaining.
    pub fn register(self) -> &'a mut ServiceCollection {
        let OptionsBuilder {
            services,
            default_maker,
            configures,
            post_configures,
            validates,
        } = self;

        services.add_singleton_factory::<Options<T>, _>(move |ctx| {
            let mut value = match &default_maker {
                Some(make) => make(),
                None => T::default(),
            };
            for step in configures.iter().chain(post_configures.iter()) {
                step(ctx, &mut value)?;
            }
            for check in &validates {
                check(&value).map_err(|message| DiError::OptionsValidation {
                    options: std::any::type_name::<T>(),
                    message,
                })?;
            }
            Ok(Arc::new(Options::new(value)))
        })
    }
}

impl ServiceCollection {
    /// Starts building `Options<T>`. Call [`OptionsBuilder::register`] to
    /// finish.
    pub fn add_options<T>(&mut self) -> OptionsBuilder<'_, T>
    where
        T: Default + Send + Sync + 'static,
    {
        OptionsBuilder::new(self)
    }
}
