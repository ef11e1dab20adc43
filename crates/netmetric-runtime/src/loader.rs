// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Batch registration and initialization of modules.
//!
//! Registration (structural, reversible, O(1)) and initialization
//! (arbitrary user code) are deliberately separate steps: when `on_init`
//! fails, the loader unregisters the module again, so the registry never
//! retains a module that did not complete its own startup.

use std::num::NonZeroUsize;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use netmetric_core::{CancelToken, CoreResult, ErrorCode, Module};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::registry::MetricRegistry;

/// Configuration for a single [`ModuleLoader::load_modules`] call.
///
/// Everything is optional; the defaults give a sequential, idempotent load
/// that accepts every module and logs through the `log` facade.
#[derive(Clone)]
pub struct ModuleLoadOptions {
    /// Process modules one at a time, in order (default). When `false`, the
    /// batch fans out over a bounded set of tokio tasks.
    pub sequential: bool,
    /// Upper bound on concurrent module processing in parallel mode.
    /// `0` means "use the machine's available parallelism".
    pub max_parallelism: usize,
    /// Downgrade an `AlreadyExists` registration failure from error to skip,
    /// so re-loading the same batch is idempotent (default `true`).
    pub treat_already_exists_as_skip: bool,
    /// Predicate deciding whether a module is attempted at all.
    pub module_filter: Option<Arc<dyn Fn(&dyn Module) -> bool + Send + Sync>>,
    /// Observer for benign events. Falls back to `log::info!`.
    pub log_info: Option<Arc<dyn Fn(&str) + Send + Sync>>,
    /// Observer for error events. Falls back to `log::error!`.
    pub log_error: Option<Arc<dyn Fn(&str) + Send + Sync>>,
}

impl Default for ModuleLoadOptions {
    fn default() -> Self {
        Self {
            sequential: true,
            max_parallelism: 0,
            treat_already_exists_as_skip: true,
            module_filter: None,
            log_info: None,
            log_error: None,
        }
    }
}

impl std::fmt::Debug for ModuleLoadOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleLoadOptions")
            .field("sequential", &self.sequential)
            .field("max_parallelism", &self.max_parallelism)
            .field(
                "treat_already_exists_as_skip",
                &self.treat_already_exists_as_skip,
            )
            .field("module_filter", &self.module_filter.is_some())
            .finish()
    }
}

/// The immutable record of one batch load.
#[derive(Debug, Clone, Default)]
pub struct LoadSummary {
    /// Modules that completed registration.
    pub registered: usize,
    /// Modules whose `on_init` hook ran and succeeded.
    pub initialized: usize,
    /// Modules rejected by the filter or downgraded duplicates.
    pub skipped: usize,
    /// Human-readable diagnostics, one per failed module. Order is not
    /// guaranteed under parallel execution.
    pub errors: Vec<String>,
    /// Wall-clock duration of the whole load call.
    pub elapsed: Duration,
}

/// Shared mutable state for one load call; counters are atomics so the
/// parallel strategy can share them without extra locking.
struct LoadContext {
    registry: Arc<MetricRegistry>,
    options: ModuleLoadOptions,
    registered: AtomicUsize,
    initialized: AtomicUsize,
    skipped: AtomicUsize,
    errors: Mutex<Vec<String>>,
}

impl LoadContext {
    fn info(&self, message: &str) {
        match &self.options.log_info {
            Some(sink) => sink(message),
            None => log::info!("{message}"),
        }
    }

    fn record_error(&self, message: String) {
        match &self.options.log_error {
            Some(sink) => sink(&message),
            None => log::error!("{message}"),
        }
        match self.errors.lock() {
            Ok(mut errors) => errors.push(message),
            Err(poisoned) => poisoned.into_inner().push(message),
        }
    }
}

/// A stateless utility that batch-registers and batch-initializes modules
/// against one [`MetricRegistry`].
pub struct ModuleLoader;

impl ModuleLoader {
    /// Loads a batch of modules: filter, register, then init, per module.
    ///
    /// The call itself always succeeds with a [`LoadSummary`]; per-module
    /// failures are aggregated into [`LoadSummary::errors`]. The one
    /// exception is a *panicking* `on_init` hook: the module is still rolled
    /// back, then the panic resumes and aborts the whole load — a defect is
    /// never absorbed into the error list.
    ///
    /// Cancellation is cooperative: sequential loads stop before the next
    /// module, parallel loads stop handing out new work. Modules that
    /// already completed stay registered and initialized.
    pub async fn load_modules(
        registry: &Arc<MetricRegistry>,
        modules: Vec<Arc<dyn Module>>,
        options: ModuleLoadOptions,
        cancel: CancelToken,
    ) -> CoreResult<LoadSummary> {
        let started = Instant::now();
        let sequential = options.sequential;
        let ctx = Arc::new(LoadContext {
            registry: registry.clone(),
            options,
            registered: AtomicUsize::new(0),
            initialized: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
            errors: Mutex::new(Vec::new()),
        });

        if sequential {
            for module in &modules {
                if cancel.is_cancelled() {
                    ctx.info("load cancelled; remaining modules were not processed");
                    break;
                }
                process_module(&ctx, module);
            }
        } else {
            Self::load_parallel(&ctx, modules, &cancel).await;
        }

        let errors = match ctx.errors.lock() {
            Ok(errors) => errors.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        Ok(LoadSummary {
            registered: ctx.registered.load(Ordering::SeqCst),
            initialized: ctx.initialized.load(Ordering::SeqCst),
            skipped: ctx.skipped.load(Ordering::SeqCst),
            errors,
            elapsed: started.elapsed(),
        })
    }

    /// Fans the batch out over tokio tasks, bounded by the effective degree
    /// of parallelism. Cancellation is best-effort: in-flight modules run to
    /// completion, queued ones are dropped.
    async fn load_parallel(ctx: &Arc<LoadContext>, modules: Vec<Arc<dyn Module>>, cancel: &CancelToken) {
        let limit = effective_parallelism(ctx.options.max_parallelism);
        let semaphore = Arc::new(Semaphore::new(limit));
        let mut workers = JoinSet::new();

        for module in modules {
            if cancel.is_cancelled() {
                ctx.info("load cancelled; remaining modules were not scheduled");
                break;
            }
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("load semaphore is never closed");
            let ctx = ctx.clone();
            let cancel = cancel.clone();
            workers.spawn(async move {
                let _permit = permit;
                if cancel.is_cancelled() {
                    return;
                }
                process_module(&ctx, &module);
            });
        }

        // Let every worker settle before surfacing the first panic, so
        // completed modules are accounted for and rollbacks have finished.
        let mut first_panic = None;
        while let Some(joined) = workers.join_next().await {
            if let Err(err) = joined {
                if err.is_panic() && first_panic.is_none() {
                    first_panic = Some(err.into_panic());
                }
            }
        }
        if let Some(payload) = first_panic {
            resume_unwind(payload);
        }
    }
}

/// The per-module procedure, identical under both strategies.
fn process_module(ctx: &LoadContext, module: &Arc<dyn Module>) {
    let name = module.name().to_string();

    if let Some(filter) = &ctx.options.module_filter {
        if !filter(module.as_ref()) {
            ctx.skipped.fetch_add(1, Ordering::SeqCst);
            ctx.info(&format!("module '{name}' skipped by filter"));
            return;
        }
    }

    match ctx.registry.register_module(module.clone()) {
        Ok(()) => {}
        Err(e)
            if e.code() == ErrorCode::AlreadyExists && ctx.options.treat_already_exists_as_skip =>
        {
            ctx.skipped.fetch_add(1, Ordering::SeqCst);
            ctx.info(&format!("module '{name}' already registered, skipping"));
            return;
        }
        Err(e) => {
            ctx.record_error(format!("module '{name}': registration failed: {e}"));
            return;
        }
    }
    ctx.registered.fetch_add(1, Ordering::SeqCst);

    let Some(lifecycle) = module.lifecycle() else {
        return;
    };
    match catch_unwind(AssertUnwindSafe(|| lifecycle.on_init())) {
        Ok(Ok(())) => {
            ctx.initialized.fetch_add(1, Ordering::SeqCst);
        }
        Ok(Err(e)) => {
            // Roll back so the registry never retains a module whose
            // startup failed.
            if let Err(rollback) = ctx.registry.unregister(module) {
                ctx.record_error(format!("module '{name}': rollback failed: {rollback}"));
            }
            ctx.record_error(format!("module '{name}': init failed: {e}"));
        }
        Err(payload) => {
            // A panicking hook is a defect: restore the invariant, then let
            // the panic continue.
            let _ = ctx.registry.unregister(module);
            resume_unwind(payload);
        }
    }
}

/// Resolves the configured degree of parallelism, falling back to the
/// machine's available parallelism for `0`.
fn effective_parallelism(configured: usize) -> usize {
    if configured > 0 {
        configured
    } else {
        std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
    }
}
