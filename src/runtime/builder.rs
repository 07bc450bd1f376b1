//! Runtime builder and the entry points that drive a root awaitable.
//!
//! A [`Runtime`] is only a resolved configuration. Each call to
//! [`Runtime::block_on`] creates a fresh [`Executor`], installs the root
//! awaitable under a proxy frame, and runs the executor until that frame is
//! resumed.

use std::cell::Cell;
use std::future::Future;
use std::rc::Rc;

use crate::awaiter::{Awaitable, Sanitized};
use crate::cx::{task, Cx};
use crate::error::{Error, ErrorKind, Result};
use crate::runtime::config::{ClockMode, RuntimeConfig};
use crate::runtime::env_config;
use crate::runtime::executor::{Executor, RunExit};
use crate::runtime::frame::{Handle, ProxyFrame};
use crate::tracing_compat::{debug, debug_span};

/// Builder for constructing a runtime with custom configuration.
///
/// Values set through builder methods win over environment variables, which
/// win over a config file, which wins over [`RuntimeConfig::default`].
#[derive(Debug, Clone, Default)]
pub struct RuntimeBuilder {
    clock: Option<ClockMode>,
    max_steps: Option<u64>,
    name: Option<String>,
    env: bool,
    #[cfg(feature = "config-file")]
    file: Option<std::path::PathBuf>,
}

impl RuntimeBuilder {
    /// Create a new builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the clock mode.
    #[must_use]
    pub fn clock(mut self, clock: ClockMode) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set the step limit (0 = unbounded).
    #[must_use]
    pub fn max_steps(mut self, steps: u64) -> Self {
        self.max_steps = Some(steps);
        self
    }

    /// Set the run label.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Read `OXCO_*` environment variables at build time.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        self.env = true;
        self
    }

    /// A builder that reads `OXCO_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new().with_env_overrides()
    }

    /// Load a TOML config file at build time.
    #[cfg(feature = "config-file")]
    #[must_use]
    pub fn config_file(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Resolve the configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ErrorKind::Config`] error if an environment variable or
    /// the config file holds an invalid value, or the file cannot be read.
    pub fn build(self) -> Result<Runtime> {
        let mut config = RuntimeConfig::default();

        #[cfg(feature = "config-file")]
        if let Some(path) = &self.file {
            let toml = env_config::parse_toml_file(path)?;
            env_config::apply_toml_config(&mut config, &toml)?;
        }
        if self.env {
            env_config::apply_env_overrides(&mut config)?;
        }

        if let Some(clock) = self.clock {
            config.clock = clock;
        }
        if let Some(steps) = self.max_steps {
            config.max_steps = (steps > 0).then_some(steps);
        }
        if let Some(name) = self.name {
            config.name = name;
        }
        config.normalize();
        debug!(
            clock = %config.clock,
            max_steps = ?config.max_steps,
            name = %config.name,
            "runtime configured"
        );
        Ok(Runtime { config })
    }
}

/// A configured runtime.
#[derive(Debug, Clone)]
pub struct Runtime {
    config: RuntimeConfig,
}

impl Runtime {
    /// Creates a runtime from an explicit configuration.
    #[must_use]
    pub fn with_config(mut config: RuntimeConfig) -> Self {
        config.normalize();
        Self { config }
    }

    /// The resolved configuration.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Drives `awaitable` as the root of a new run and returns its result.
    ///
    /// # Errors
    ///
    /// Returns the awaitable's own error, or an execution error
    /// ([`ErrorKind::Stopped`], [`ErrorKind::Deadlock`],
    /// [`ErrorKind::StepLimit`]) if the executor gave up before the root
    /// completed. In that case every pending awaitable is abandoned.
    pub fn block_on<A: Awaitable>(&self, awaitable: A) -> Result<A::Output> {
        let executor = Executor::with_config(&self.config);
        let _span = debug_span!("oxco.run", name = %self.config.name).entered();

        let mut root = Sanitized::new(awaitable);
        root.set_executor(&executor);

        let done = Rc::new(Cell::new(false));
        let flag = Rc::clone(&done);
        let frame = ProxyFrame::new(move || flag.set(true));
        let parent = Handle::new(&frame);

        if root.ready() {
            done.set(true);
        } else {
            let next = root.suspend(parent.clone())?;
            if next.ptr_eq(&parent) {
                done.set(true);
            } else {
                next.resume();
            }
        }

        let exit = executor.run_until(|| done.get());
        debug!(?exit, steps = executor.steps(), "run finished");
        let kind = match exit {
            RunExit::Satisfied => return root.resume(),
            RunExit::Stopped => ErrorKind::Stopped,
            RunExit::Idle => ErrorKind::Deadlock,
            RunExit::StepLimit => ErrorKind::StepLimit,
        };
        executor.abandon_all();
        root.abandon();
        Err(Error::new(kind).with_message(format!(
            "root did not complete after {} steps",
            executor.steps()
        )))
    }

    /// Runs `f` as the root task.
    ///
    /// # Errors
    ///
    /// See [`block_on`](Self::block_on).
    pub fn run<T, F, Fut>(&self, f: F) -> Result<T>
    where
        T: 'static,
        F: FnOnce(Cx) -> Fut,
        Fut: Future<Output = Result<T>> + 'static,
    {
        self.block_on(task(f))
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::with_config(RuntimeConfig::default())
    }
}

/// Runs `f` as the root task of a default runtime.
///
/// ```
/// let v = oxco::run(|cx| async move {
///     cx.sleep(std::time::Duration::from_millis(5)).await?;
///     Ok(cx.now().as_millis())
/// });
/// assert_eq!(v.unwrap(), 5);
/// ```
///
/// # Errors
///
/// See [`Runtime::block_on`].
pub fn run<T, F, Fut>(f: F) -> Result<T>
where
    T: 'static,
    F: FnOnce(Cx) -> Fut,
    Fut: Future<Output = Result<T>> + 'static,
{
    Runtime::default().run(f)
}
