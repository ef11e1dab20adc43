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

//! # NetMetric Core
//!
//! Foundational crate containing the traits, metric types, and interface
//! contracts that define the framework's architecture.
//!
//! A *module* is a named unit that owns zero or more *collectors* and may
//! opt into lifecycle hooks. The runtime crate registers modules into a
//! central registry and periodically asks every collector to produce a
//! metric; this crate only defines the contracts those pieces agree on.

#![warn(missing_docs)]

pub mod cancel;
pub mod collector;
pub mod error;
pub mod metric;
pub mod module;

pub use cancel::CancelToken;
pub use collector::MetricCollector;
pub use error::{CoreError, CoreResult, ErrorCode};
pub use metric::{Metric, MetricId, MetricMetadata, MetricType, MetricValue};
pub use module::{Module, ModuleLifecycle};
