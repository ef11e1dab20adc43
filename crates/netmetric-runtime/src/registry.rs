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

//! The thread-safe catalog of currently-active modules.
//!
//! One internal mutex guards all structural state. It is held only for
//! collection bookkeeping and is always released before any lifecycle hook
//! runs, so a hook that re-enters the registry (a module unregistering
//! itself from its own `on_dispose`, say) can never deadlock.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use netmetric_core::{CoreError, CoreResult, ErrorCode, Module};

/// Dispose-once tracking is keyed by instance identity, not name: the thin
/// data-pointer address of the `Arc` allocation. Claimed identities keep a
/// strong `Arc` alive in [`RegistryInner::retired`] so an address can never
/// be recycled while it is being tracked.
fn identity(module: &Arc<dyn Module>) -> usize {
    Arc::as_ptr(module) as *const () as usize
}

struct RegistryInner {
    /// Name -> module, the "is registered" authority.
    modules: HashMap<String, Arc<dyn Module>>,
    /// Registration order of the names in `modules`, for deterministic
    /// snapshots.
    order: Vec<String>,
    /// Identities whose `on_dispose` has been claimed.
    disposed: HashSet<usize>,
    /// Strong references pinning every identity in `disposed`.
    retired: Vec<Arc<dyn Module>>,
}

/// The single source of truth for which modules are currently active.
///
/// Safe under arbitrary concurrent registration, unregistration,
/// enumeration, and disposal. Registration does not invoke lifecycle hooks;
/// that separation is what lets the loader guarantee rollback semantics.
pub struct MetricRegistry {
    inner: Mutex<RegistryInner>,
    disposed: AtomicBool,
    error_sink: Box<dyn Fn(&str) + Send + Sync>,
}

impl MetricRegistry {
    /// Creates an empty registry reporting disposal failures via
    /// `log::error!`.
    pub fn new() -> Self {
        Self::with_error_sink(Box::new(|msg| log::error!("{msg}")))
    }

    /// Creates an empty registry with a custom sink for disposal-failure
    /// diagnostics.
    pub fn with_error_sink(error_sink: Box<dyn Fn(&str) + Send + Sync>) -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                modules: HashMap::new(),
                order: Vec::new(),
                disposed: HashSet::new(),
                retired: Vec::new(),
            }),
            disposed: AtomicBool::new(false),
            error_sink,
        }
    }

    /// Registers a module under its unique name.
    ///
    /// Fails with [`ErrorCode::InvalidArgument`] for an empty name,
    /// [`ErrorCode::InvalidState`] once the registry is disposed, and
    /// [`ErrorCode::AlreadyExists`] on a duplicate name (the incumbent stays
    /// registered). No lifecycle hook is invoked here.
    pub fn register_module(&self, module: Arc<dyn Module>) -> CoreResult<()> {
        let name = module.name().to_string();
        if name.trim().is_empty() {
            return Err(CoreError::new(
                ErrorCode::InvalidArgument,
                "module name must not be empty",
            ));
        }

        let mut inner = self.lock_inner();
        // Re-checked under the lock: `dispose` flips the flag before it
        // drains, so a registration racing past the flag either lands before
        // the drain (and is torn down with the rest) or fails here.
        if self.disposed.load(Ordering::SeqCst) {
            return Err(CoreError::new(
                ErrorCode::InvalidState,
                "registry has been disposed",
            ));
        }
        if inner.modules.contains_key(&name) {
            return Err(CoreError::new(
                ErrorCode::AlreadyExists,
                format!("a module named '{name}' is already registered"),
            ));
        }

        inner.modules.insert(name.clone(), module);
        inner.order.push(name.clone());
        drop(inner);

        log::info!("Registered module: {name}");
        Ok(())
    }

    /// Unregisters the module with the given name and disposes it.
    ///
    /// The structural removal is committed and the lock released *before*
    /// `on_dispose` runs. The hook fires at most once per instance, however
    /// many paths reach it.
    pub fn unregister_module(&self, name: &str) -> CoreResult<()> {
        if name.trim().is_empty() {
            return Err(CoreError::new(
                ErrorCode::InvalidArgument,
                "module name must not be empty",
            ));
        }

        let to_dispose = {
            let mut inner = self.lock_inner();
            if self.disposed.load(Ordering::SeqCst) {
                return Err(CoreError::new(
                    ErrorCode::InvalidState,
                    "registry has been disposed",
                ));
            }
            let module = inner.modules.remove(name).ok_or_else(|| {
                CoreError::new(ErrorCode::NotFound, format!("no module named '{name}'"))
            })?;
            inner.order.retain(|n| n != name);
            Self::claim_disposal(&mut inner, &module)
        };

        log::debug!("Unregistered module: {name}");
        if let Some(module) = to_dispose {
            self.dispose_module(&module);
        }
        Ok(())
    }

    /// Unregisters the given module instance and disposes it.
    ///
    /// Fails with [`ErrorCode::NotFound`] if the name is absent *or* maps to
    /// a different instance — identity, not name, decides a match here.
    pub fn unregister(&self, module: &Arc<dyn Module>) -> CoreResult<()> {
        let name = module.name().to_string();
        if name.trim().is_empty() {
            return Err(CoreError::new(
                ErrorCode::InvalidArgument,
                "module name must not be empty",
            ));
        }

        let to_dispose = {
            let mut inner = self.lock_inner();
            if self.disposed.load(Ordering::SeqCst) {
                return Err(CoreError::new(
                    ErrorCode::InvalidState,
                    "registry has been disposed",
                ));
            }
            match inner.modules.get(&name) {
                Some(current) if identity(current) == identity(module) => {}
                _ => {
                    return Err(CoreError::new(
                        ErrorCode::NotFound,
                        format!("module '{name}' is not registered"),
                    ))
                }
            }
            let module = inner
                .modules
                .remove(&name)
                .unwrap_or_else(|| unreachable!("entry checked above"));
            inner.order.retain(|n| *n != name);
            Self::claim_disposal(&mut inner, &module)
        };

        log::debug!("Unregistered module: {name}");
        if let Some(module) = to_dispose {
            self.dispose_module(&module);
        }
        Ok(())
    }

    /// Returns an immutable point-in-time snapshot of the registered
    /// modules, in insertion order.
    ///
    /// Mutation after the snapshot is taken never affects it, and taking one
    /// never blocks on user code.
    pub fn modules(&self) -> Vec<Arc<dyn Module>> {
        let inner = self.lock_inner();
        inner
            .order
            .iter()
            .filter_map(|name| inner.modules.get(name).cloned())
            .collect()
    }

    /// Returns `true` if a module with the given name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.lock_inner().modules.contains_key(name)
    }

    /// Returns the number of registered modules.
    pub fn len(&self) -> usize {
        self.lock_inner().modules.len()
    }

    /// Returns `true` if no modules are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` once [`dispose`](Self::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Tears down the registry: every registered module is disposed exactly
    /// once and the collection is emptied.
    ///
    /// Idempotent — only the first call does any work. Afterwards all
    /// register/unregister operations fail with
    /// [`ErrorCode::InvalidState`].
    ///
    /// An `on_dispose` hook returning an error is reported through the
    /// error sink and teardown of the remaining modules continues; one
    /// misbehaving module must not block cleanup of the others. A hook that
    /// panics is a defect and the panic propagates (no lock is held, so the
    /// registry itself stays usable for reads).
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let to_dispose = {
            let mut inner = self.lock_inner();
            let snapshot: Vec<Arc<dyn Module>> = inner
                .order
                .iter()
                .filter_map(|name| inner.modules.get(name).cloned())
                .collect();
            inner.modules.clear();
            inner.order.clear();
            snapshot
                .into_iter()
                .filter_map(|module| Self::claim_disposal(&mut inner, &module))
                .collect::<Vec<_>>()
        };

        log::info!("Disposing registry ({} modules)", to_dispose.len());
        for module in &to_dispose {
            self.dispose_module(module);
        }
    }

    /// Claims the dispose-once slot for `module`. Returns the module if this
    /// caller won the claim and must run `on_dispose`. Must be called with
    /// the inner lock held.
    fn claim_disposal(
        inner: &mut RegistryInner,
        module: &Arc<dyn Module>,
    ) -> Option<Arc<dyn Module>> {
        let key = identity(module);
        if !inner.disposed.insert(key) {
            return None;
        }
        inner.retired.push(module.clone());
        Some(module.clone())
    }

    /// Runs `on_dispose` outside any lock, reporting expected failures
    /// through the error sink.
    fn dispose_module(&self, module: &Arc<dyn Module>) {
        if let Some(lifecycle) = module.lifecycle() {
            if let Err(e) = lifecycle.on_dispose() {
                (self.error_sink)(&format!(
                    "disposal of module '{}' failed: {e}",
                    module.name()
                ));
            }
        }
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, RegistryInner> {
        // A poisoned lock means a panic inside O(1) bookkeeping, which
        // cannot leave the collections torn; keep going.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricRegistry")
            .field("len", &self.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
