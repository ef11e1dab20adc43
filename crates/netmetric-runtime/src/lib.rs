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

//! # NetMetric Runtime
//!
//! The registry, loader, and harvest machinery that orchestrate the
//! contracts from `netmetric-core`.
//!
//! A host constructs modules, batch-loads them with
//! [`ModuleLoader::load_modules`], then drives a [`HarvestService`] (or its
//! own scheduler over [`MetricRegistry::modules`]) to pull metrics from
//! every collector. At shutdown, [`MetricRegistry::dispose`] tears modules
//! down exactly once.

#![warn(missing_docs)]

pub mod loader;
pub mod registry;
pub mod service;

pub use loader::{LoadSummary, ModuleLoadOptions, ModuleLoader};
pub use registry::MetricRegistry;
pub use service::HarvestService;
