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

use netmetric_core::{
    CancelToken, CoreError, CoreResult, ErrorCode, MetricCollector, Module, ModuleLifecycle,
};
use netmetric_runtime::{MetricRegistry, ModuleLoadOptions, ModuleLoader};
use std::borrow::Cow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// --- TEST MODULE WITH SCRIPTABLE LIFECYCLE ---

#[derive(Default)]
struct Counters {
    init: AtomicUsize,
    dispose: AtomicUsize,
}

struct ScriptedModule {
    name: String,
    counters: Arc<Counters>,
    fail_init: bool,
    panic_init: bool,
    cancel_on_init: Option<CancelToken>,
}

impl ScriptedModule {
    fn ok(name: &str) -> Arc<dyn Module> {
        Self::build(name, Arc::new(Counters::default()), false, false)
    }

    fn failing(name: &str, counters: Arc<Counters>) -> Arc<dyn Module> {
        Self::build(name, counters, true, false)
    }

    fn panicking(name: &str, counters: Arc<Counters>) -> Arc<dyn Module> {
        Self::build(name, counters, false, true)
    }

    fn tracked(name: &str, counters: Arc<Counters>) -> Arc<dyn Module> {
        Self::build(name, counters, false, false)
    }

    fn cancelling(name: &str, token: CancelToken) -> Arc<dyn Module> {
        Arc::new(Self {
            name: name.to_string(),
            counters: Arc::new(Counters::default()),
            fail_init: false,
            panic_init: false,
            cancel_on_init: Some(token),
        })
    }

    fn build(name: &str, counters: Arc<Counters>, fail_init: bool, panic_init: bool) -> Arc<dyn Module> {
        Arc::new(Self {
            name: name.to_string(),
            counters,
            fail_init,
            panic_init,
            cancel_on_init: None,
        })
    }
}

impl Module for ScriptedModule {
    fn name(&self) -> Cow<'static, str> {
        Cow::Owned(self.name.clone())
    }

    fn collectors(&self) -> Vec<Arc<dyn MetricCollector>> {
        Vec::new()
    }

    fn lifecycle(&self) -> Option<&dyn ModuleLifecycle> {
        Some(self)
    }
}

impl ModuleLifecycle for ScriptedModule {
    fn on_init(&self) -> CoreResult<()> {
        self.counters.init.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = &self.cancel_on_init {
            token.cancel();
        }
        if self.panic_init {
            panic!("defective module");
        }
        if self.fail_init {
            return Err(CoreError::new(
                ErrorCode::Exporter,
                "could not reach backing service",
            ));
        }
        Ok(())
    }

    fn on_dispose(&self) -> CoreResult<()> {
        self.counters.dispose.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn registered_names(registry: &MetricRegistry) -> Vec<String> {
    registry
        .modules()
        .iter()
        .map(|m| m.name().to_string())
        .collect()
}

// --- SEQUENTIAL STRATEGY ---

#[tokio::test]
async fn test_duplicate_name_in_batch_is_skipped_by_default() -> anyhow::Result<()> {
    let registry = Arc::new(MetricRegistry::new());
    let batch = vec![
        ScriptedModule::ok("db"),
        ScriptedModule::ok("cache"),
        ScriptedModule::ok("db"),
    ];

    let summary = ModuleLoader::load_modules(
        &registry,
        batch,
        ModuleLoadOptions::default(),
        CancelToken::new(),
    )
    .await?;

    assert_eq!(summary.registered, 2);
    assert_eq!(summary.initialized, 2);
    assert_eq!(summary.skipped, 1);
    assert!(summary.errors.is_empty());
    assert_eq!(registered_names(&registry), vec!["db", "cache"]);
    Ok(())
}

#[tokio::test]
async fn test_duplicate_name_is_an_error_when_skip_disabled() -> anyhow::Result<()> {
    let registry = Arc::new(MetricRegistry::new());
    let batch = vec![ScriptedModule::ok("db"), ScriptedModule::ok("db")];

    let options = ModuleLoadOptions {
        treat_already_exists_as_skip: false,
        ..Default::default()
    };
    let summary =
        ModuleLoader::load_modules(&registry, batch, options, CancelToken::new()).await?;

    assert_eq!(summary.registered, 1);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].contains("db"));
    Ok(())
}

#[tokio::test]
async fn test_failed_init_rolls_the_module_back() -> anyhow::Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let registry = Arc::new(MetricRegistry::new());
    let counters = Arc::new(Counters::default());
    let batch = vec![
        ScriptedModule::ok("db"),
        ScriptedModule::failing("broker", counters.clone()),
        ScriptedModule::ok("cache"),
    ];

    let summary = ModuleLoader::load_modules(
        &registry,
        batch,
        ModuleLoadOptions::default(),
        CancelToken::new(),
    )
    .await?;

    // "broker" was registered, failed its init, and was unregistered again.
    assert_eq!(summary.registered, 3);
    assert_eq!(summary.initialized, 2);
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].contains("broker"));
    assert_eq!(registered_names(&registry), vec!["db", "cache"]);

    // Rollback goes through unregister, so the failed module was disposed.
    assert_eq!(counters.init.load(Ordering::SeqCst), 1);
    assert_eq!(counters.dispose.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_filtered_modules_are_skipped_not_errored() -> anyhow::Result<()> {
    let registry = Arc::new(MetricRegistry::new());
    let batch = vec![ScriptedModule::ok("db"), ScriptedModule::ok("cache")];

    let options = ModuleLoadOptions {
        module_filter: Some(Arc::new(|m: &dyn Module| m.name() != "cache")),
        ..Default::default()
    };
    let summary =
        ModuleLoader::load_modules(&registry, batch, options, CancelToken::new()).await?;

    assert_eq!(summary.registered, 1);
    assert_eq!(summary.skipped, 1);
    assert!(summary.errors.is_empty());
    assert_eq!(registered_names(&registry), vec!["db"]);
    Ok(())
}

#[tokio::test]
async fn test_pre_cancelled_load_processes_nothing() -> anyhow::Result<()> {
    let registry = Arc::new(MetricRegistry::new());
    let batch = vec![ScriptedModule::ok("db"), ScriptedModule::ok("cache")];

    let cancel = CancelToken::new();
    cancel.cancel();
    let summary =
        ModuleLoader::load_modules(&registry, batch, ModuleLoadOptions::default(), cancel).await?;

    assert_eq!(summary.registered, 0);
    assert_eq!(summary.skipped, 0);
    assert!(registry.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_cancellation_mid_batch_keeps_completed_modules() -> anyhow::Result<()> {
    let registry = Arc::new(MetricRegistry::new());
    let cancel = CancelToken::new();
    let late = Arc::new(Counters::default());

    // "cache" trips the shared token from its own init hook.
    let batch = vec![
        ScriptedModule::ok("db"),
        ScriptedModule::cancelling("cache", cancel.clone()),
        ScriptedModule::tracked("queue", late.clone()),
    ];
    let summary =
        ModuleLoader::load_modules(&registry, batch, ModuleLoadOptions::default(), cancel).await?;

    // Modules completed before cancellation stay registered; the rest of
    // the batch is never started.
    assert_eq!(summary.registered, 2);
    assert_eq!(summary.initialized, 2);
    assert_eq!(registered_names(&registry), vec!["db", "cache"]);
    assert_eq!(late.init.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn test_panicking_init_rolls_back_then_aborts_the_load() {
    let registry = Arc::new(MetricRegistry::new());
    let counters = Arc::new(Counters::default());
    let registry_probe = registry.clone();

    let batch = vec![
        ScriptedModule::ok("db"),
        ScriptedModule::panicking("defect", counters.clone()),
    ];
    let result = tokio::spawn(async move {
        ModuleLoader::load_modules(
            &registry_probe,
            batch,
            ModuleLoadOptions::default(),
            CancelToken::new(),
        )
        .await
    })
    .await;

    // The load aborted with the hook's panic...
    assert!(result.is_err());
    // ...but the registry is consistent: the defective module was rolled
    // back before the panic resumed, and the earlier module survived.
    assert_eq!(registered_names(&registry), vec!["db"]);
    assert_eq!(counters.dispose.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_custom_log_sinks_observe_events() -> anyhow::Result<()> {
    let registry = Arc::new(MetricRegistry::new());
    let infos = Arc::new(std::sync::Mutex::new(Vec::new()));
    let errors = Arc::new(std::sync::Mutex::new(Vec::new()));

    let infos_sink = infos.clone();
    let errors_sink = errors.clone();
    let options = ModuleLoadOptions {
        log_info: Some(Arc::new(move |msg: &str| {
            infos_sink.lock().unwrap().push(msg.to_string())
        })),
        log_error: Some(Arc::new(move |msg: &str| {
            errors_sink.lock().unwrap().push(msg.to_string())
        })),
        ..Default::default()
    };

    let counters = Arc::new(Counters::default());
    let batch = vec![
        ScriptedModule::ok("db"),
        ScriptedModule::ok("db"),
        ScriptedModule::failing("broker", counters),
    ];
    ModuleLoader::load_modules(&registry, batch, options, CancelToken::new()).await?;

    assert!(infos.lock().unwrap().iter().any(|m| m.contains("db")));
    assert!(errors.lock().unwrap().iter().any(|m| m.contains("broker")));
    Ok(())
}

// --- PARALLEL STRATEGY ---

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_load_registers_everything() -> anyhow::Result<()> {
    let registry = Arc::new(MetricRegistry::new());
    let batch: Vec<Arc<dyn Module>> = (0..32)
        .map(|i| ScriptedModule::ok(&format!("module-{i}")))
        .collect();

    let options = ModuleLoadOptions {
        sequential: false,
        max_parallelism: 4,
        ..Default::default()
    };
    let summary =
        ModuleLoader::load_modules(&registry, batch, options, CancelToken::new()).await?;

    assert_eq!(summary.registered, 32);
    assert_eq!(summary.initialized, 32);
    assert_eq!(summary.skipped, 0);
    assert!(summary.errors.is_empty());
    assert_eq!(registry.len(), 32);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_errors_are_aggregated_without_order_guarantee() -> anyhow::Result<()> {
    let registry = Arc::new(MetricRegistry::new());
    let mut batch: Vec<Arc<dyn Module>> = Vec::new();
    for i in 0..8 {
        batch.push(ScriptedModule::ok(&format!("ok-{i}")));
        batch.push(ScriptedModule::failing(
            &format!("bad-{i}"),
            Arc::new(Counters::default()),
        ));
    }

    let options = ModuleLoadOptions {
        sequential: false,
        max_parallelism: 4,
        ..Default::default()
    };
    let summary =
        ModuleLoader::load_modules(&registry, batch, options, CancelToken::new()).await?;

    assert_eq!(summary.initialized, 8);
    assert_eq!(summary.errors.len(), 8);
    // Error order is not promised under parallel execution; assert
    // membership only.
    for i in 0..8 {
        let needle = format!("bad-{i}");
        assert!(
            summary.errors.iter().any(|e| e.contains(&needle)),
            "missing error for {needle}"
        );
        assert!(!registry.contains(&needle));
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_rollback_keeps_registry_consistent() -> anyhow::Result<()> {
    let registry = Arc::new(MetricRegistry::new());
    let counters = Arc::new(Counters::default());
    let batch = vec![
        ScriptedModule::tracked("db", counters.clone()),
        ScriptedModule::failing("broker", counters.clone()),
    ];

    let options = ModuleLoadOptions {
        sequential: false,
        ..Default::default()
    };
    let summary =
        ModuleLoader::load_modules(&registry, batch, options, CancelToken::new()).await?;

    assert_eq!(summary.initialized, 1);
    assert!(registry.contains("db"));
    assert!(!registry.contains("broker"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_panic_is_surfaced_after_rollback() {
    let registry = Arc::new(MetricRegistry::new());
    let counters = Arc::new(Counters::default());
    let registry_inner = registry.clone();

    let mut batch: Vec<Arc<dyn Module>> = (0..8)
        .map(|i| ScriptedModule::ok(&format!("ok-{i}")))
        .collect();
    batch.push(ScriptedModule::panicking("defect", counters.clone()));

    let result = tokio::spawn(async move {
        let options = ModuleLoadOptions {
            sequential: false,
            max_parallelism: 4,
            ..Default::default()
        };
        ModuleLoader::load_modules(&registry_inner, batch, options, CancelToken::new()).await
    })
    .await;

    // The hook's panic resumed out of the load after all workers settled...
    assert!(result.is_err());
    // ...with the panicking module rolled back and disposed first.
    assert!(!registry.contains("defect"));
    assert_eq!(counters.dispose.load(Ordering::SeqCst), 1);
}
