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

//! Collectors reading memory and CPU figures from a shared
//! `sysinfo::System`.
//!
//! The owning [`SystemProbeModule`](crate::probe::SystemProbeModule)
//! refreshes the `System` in its `on_before_collect` hook, so each collector
//! only reads the already-refreshed figures.

use std::borrow::Cow;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use netmetric_core::{
    CancelToken, CoreError, CoreResult, ErrorCode, Metric, MetricCollector, MetricId,
};
use sysinfo::System;

fn cancelled() -> CoreError {
    CoreError::new(ErrorCode::Cancelled, "collection cancelled")
}

fn poisoned() -> CoreError {
    CoreError::new(ErrorCode::Unexpected, "system probe state poisoned")
}

/// Reports resident system memory in use, in bytes.
pub struct MemoryCollector {
    system: Arc<Mutex<System>>,
}

impl MemoryCollector {
    /// Creates a collector reading from the given shared `System`.
    pub fn new(system: Arc<Mutex<System>>) -> Self {
        Self { system }
    }
}

#[async_trait]
impl MetricCollector for MemoryCollector {
    fn collector_id(&self) -> Cow<'static, str> {
        Cow::Borrowed("system.memory")
    }

    async fn collect(&self, cancel: &CancelToken) -> CoreResult<Option<Metric>> {
        if cancel.is_cancelled() {
            return Err(cancelled());
        }
        let used_bytes = {
            let system = self.system.lock().map_err(|_| poisoned())?;
            system.used_memory()
        };
        Ok(Some(Metric::new_gauge(
            MetricId::new("system", "memory_used_bytes"),
            "Resident system memory in use",
            "bytes",
            used_bytes as f64,
        )))
    }
}

/// Reports global CPU utilization as a percentage across all cores.
pub struct CpuCollector {
    system: Arc<Mutex<System>>,
}

impl CpuCollector {
    /// Creates a collector reading from the given shared `System`.
    pub fn new(system: Arc<Mutex<System>>) -> Self {
        Self { system }
    }
}

#[async_trait]
impl MetricCollector for CpuCollector {
    fn collector_id(&self) -> Cow<'static, str> {
        Cow::Borrowed("system.cpu")
    }

    async fn collect(&self, cancel: &CancelToken) -> CoreResult<Option<Metric>> {
        if cancel.is_cancelled() {
            return Err(cancelled());
        }
        let load_percent = {
            let system = self.system.lock().map_err(|_| poisoned())?;
            system.global_cpu_usage()
        };
        Ok(Some(Metric::new_gauge(
            MetricId::new("system", "cpu_load_percent"),
            "Global CPU utilization",
            "percent",
            load_percent as f64,
        )))
    }
}
