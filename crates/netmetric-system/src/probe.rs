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

//! The local-system probe module.

use std::borrow::Cow;
use std::sync::{Arc, Mutex};

use netmetric_core::{CoreError, CoreResult, ErrorCode, MetricCollector, Module, ModuleLifecycle};
use sysinfo::System;

use crate::collectors::{CpuCollector, MemoryCollector};

/// A module probing the local machine through one shared `sysinfo::System`.
///
/// The `System` handle is refreshed once in `on_init` and again before each
/// harvest pass, so the collectors see one consistent reading per cycle.
pub struct SystemProbeModule {
    name: Cow<'static, str>,
    system: Arc<Mutex<System>>,
    collectors: Vec<Arc<dyn MetricCollector>>,
}

impl SystemProbeModule {
    /// Creates the probe module under the default name `"system"`.
    pub fn new() -> Self {
        Self::named("system")
    }

    /// Creates the probe module under a custom name, for hosts running
    /// several registries or needing a namespaced module name.
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        let system = Arc::new(Mutex::new(System::new()));
        let collectors: Vec<Arc<dyn MetricCollector>> = vec![
            Arc::new(MemoryCollector::new(system.clone())),
            Arc::new(CpuCollector::new(system.clone())),
        ];
        Self {
            name: name.into(),
            system,
            collectors,
        }
    }

    fn refresh(&self) -> CoreResult<()> {
        let mut system = self
            .system
            .lock()
            .map_err(|_| CoreError::new(ErrorCode::Unexpected, "system probe state poisoned"))?;
        system.refresh_memory();
        system.refresh_cpu_all();
        Ok(())
    }
}

impl Default for SystemProbeModule {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for SystemProbeModule {
    fn name(&self) -> Cow<'static, str> {
        self.name.clone()
    }

    fn collectors(&self) -> Vec<Arc<dyn MetricCollector>> {
        self.collectors.clone()
    }

    fn lifecycle(&self) -> Option<&dyn ModuleLifecycle> {
        Some(self)
    }
}

impl ModuleLifecycle for SystemProbeModule {
    fn on_init(&self) -> CoreResult<()> {
        log::debug!("System probe '{}' warming up", self.name);
        self.refresh()
    }

    fn on_before_collect(&self) -> CoreResult<()> {
        self.refresh()
    }
}
