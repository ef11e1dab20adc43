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

//! Periodic harvesting of metrics from every registered module.

use std::sync::Arc;
use std::time::{Duration, Instant};

use netmetric_core::{CancelToken, Metric};

use crate::registry::MetricRegistry;

/// Drives collection over a registry on a fixed interval.
///
/// Each harvest pass walks a fresh snapshot of the registry, brackets every
/// module's collectors with its `on_before_collect`/`on_after_collect`
/// hooks, and gathers whatever the collectors produce. Collector and hook
/// failures are logged and never abort the pass — metrics from healthy
/// modules still flow.
#[derive(Debug)]
pub struct HarvestService {
    registry: Arc<MetricRegistry>,
    last_harvest: Instant,
    interval: Duration,
}

impl HarvestService {
    /// Creates a new harvest service over the given registry.
    pub fn new(registry: Arc<MetricRegistry>, interval: Duration) -> Self {
        Self {
            registry,
            last_harvest: Instant::now(),
            interval,
        }
    }

    /// Should be called periodically. Runs a harvest if the interval has
    /// passed; returns whether one ran. The harvested metrics are handed to
    /// `export`, which is whatever pipeline the host wires up.
    pub async fn tick(
        &mut self,
        cancel: &CancelToken,
        export: impl FnOnce(Vec<Metric>),
    ) -> bool {
        if self.last_harvest.elapsed() < self.interval {
            return false;
        }
        log::trace!("Harvesting all registered modules...");
        let metrics = self.harvest_now(cancel).await;
        self.last_harvest = Instant::now();
        export(metrics);
        true
    }

    /// Runs one unconditional harvest pass and returns everything collected.
    pub async fn harvest_now(&self, cancel: &CancelToken) -> Vec<Metric> {
        let mut collected = Vec::new();

        for module in self.registry.modules() {
            if cancel.is_cancelled() {
                break;
            }
            let name = module.name();

            if let Some(lifecycle) = module.lifecycle() {
                if let Err(e) = lifecycle.on_before_collect() {
                    log::warn!("module '{name}': before-collect hook failed, skipping: {e}");
                    continue;
                }
            }

            for collector in module.collectors() {
                if cancel.is_cancelled() {
                    break;
                }
                match collector.collect(cancel).await {
                    Ok(Some(metric)) => collected.push(metric),
                    Ok(None) => {}
                    Err(e) => log::warn!(
                        "collector '{}' in module '{name}' failed: {e}",
                        collector.collector_id()
                    ),
                }
            }

            if let Some(lifecycle) = module.lifecycle() {
                if let Err(e) = lifecycle.on_after_collect() {
                    log::warn!("module '{name}': after-collect hook failed: {e}");
                }
            }
        }

        collected
    }

    /// Returns the registry this service harvests from.
    pub fn registry(&self) -> &Arc<MetricRegistry> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use netmetric_core::{
        CoreError, CoreResult, ErrorCode, MetricCollector, MetricId, Module, ModuleLifecycle,
    };
    use std::borrow::Cow;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct GaugeCollector {
        value: f64,
        fail: bool,
    }

    #[async_trait]
    impl MetricCollector for GaugeCollector {
        fn collector_id(&self) -> Cow<'static, str> {
            Cow::Borrowed("test.gauge")
        }

        async fn collect(&self, _cancel: &CancelToken) -> CoreResult<Option<Metric>> {
            if self.fail {
                return Err(CoreError::new(ErrorCode::Exporter, "probe unreachable"));
            }
            Ok(Some(Metric::new_gauge(
                MetricId::new("test", "gauge"),
                "A test gauge",
                "units",
                self.value,
            )))
        }
    }

    struct HookedModule {
        name: String,
        collectors: Vec<Arc<dyn MetricCollector>>,
        before_calls: AtomicUsize,
        after_calls: AtomicUsize,
        fail_before: AtomicBool,
    }

    impl HookedModule {
        fn new(name: &str, collectors: Vec<Arc<dyn MetricCollector>>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                collectors,
                before_calls: AtomicUsize::new(0),
                after_calls: AtomicUsize::new(0),
                fail_before: AtomicBool::new(false),
            })
        }
    }

    impl Module for HookedModule {
        fn name(&self) -> Cow<'static, str> {
            Cow::Owned(self.name.clone())
        }

        fn collectors(&self) -> Vec<Arc<dyn MetricCollector>> {
            self.collectors.clone()
        }

        fn lifecycle(&self) -> Option<&dyn ModuleLifecycle> {
            Some(self)
        }
    }

    impl ModuleLifecycle for HookedModule {
        fn on_before_collect(&self) -> CoreResult<()> {
            self.before_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_before.load(Ordering::SeqCst) {
                Err(CoreError::new(ErrorCode::InvalidState, "not ready"))
            } else {
                Ok(())
            }
        }

        fn on_after_collect(&self) -> CoreResult<()> {
            self.after_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_harvest_gathers_metrics_and_runs_hooks() {
        let registry = Arc::new(MetricRegistry::new());
        let module = HookedModule::new(
            "probe",
            vec![
                Arc::new(GaugeCollector {
                    value: 1.0,
                    fail: false,
                }),
                Arc::new(GaugeCollector {
                    value: 2.0,
                    fail: true,
                }),
            ],
        );
        registry.register_module(module.clone()).unwrap();

        let service = HarvestService::new(registry, Duration::from_secs(1));
        let metrics = service.harvest_now(&CancelToken::new()).await;

        // The failing collector is logged and skipped, not fatal.
        assert_eq!(metrics.len(), 1);
        assert_eq!(module.before_calls.load(Ordering::SeqCst), 1);
        assert_eq!(module.after_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_before_hook_skips_module_collectors() {
        let registry = Arc::new(MetricRegistry::new());
        let module = HookedModule::new(
            "probe",
            vec![Arc::new(GaugeCollector {
                value: 1.0,
                fail: false,
            })],
        );
        module.fail_before.store(true, Ordering::SeqCst);
        registry.register_module(module.clone()).unwrap();

        let service = HarvestService::new(registry, Duration::from_secs(1));
        let metrics = service.harvest_now(&CancelToken::new()).await;

        assert!(metrics.is_empty());
        // The after hook is not run when the before hook rejected the pass.
        assert_eq!(module.after_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_tick_respects_interval() {
        let registry = Arc::new(MetricRegistry::new());
        let mut service = HarvestService::new(registry, Duration::from_secs(3600));

        let exported = AtomicBool::new(false);
        let ran = service
            .tick(&CancelToken::new(), |_| exported.store(true, Ordering::SeqCst))
            .await;

        // Interval has not elapsed since construction.
        assert!(!ran);
        assert!(!exported.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cancelled_harvest_stops_early() {
        let registry = Arc::new(MetricRegistry::new());
        let module = HookedModule::new(
            "probe",
            vec![Arc::new(GaugeCollector {
                value: 1.0,
                fail: false,
            })],
        );
        registry.register_module(module).unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        let service = HarvestService::new(registry, Duration::from_secs(1));
        let metrics = service.harvest_now(&cancel).await;
        assert!(metrics.is_empty());
    }
}
