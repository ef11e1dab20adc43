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

//! # NetMetric System
//!
//! A concrete [`Module`](netmetric_core::Module) probing the local machine
//! via the `sysinfo` crate: memory in use and global CPU load. Doubles as
//! the reference implementation of the core contracts for provider-module
//! authors.

#![warn(missing_docs)]

pub mod collectors;
pub mod probe;

pub use collectors::{CpuCollector, MemoryCollector};
pub use probe::SystemProbeModule;
