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

//! The module and lifecycle contracts.
//!
//! A module is the unit of registration: a named bundle of collectors for
//! one provider (a database, a broker, the local system). Lifecycle hooks
//! are an optional capability — a module that has nothing to set up or tear
//! down simply leaves [`Module::lifecycle`] at its default.

use std::borrow::Cow;
use std::sync::Arc;

use crate::collector::MetricCollector;
use crate::error::CoreResult;

/// A named unit exposing zero or more collectors.
///
/// The name is the module's sole identity within a registry: it must be
/// non-empty and unique among currently-registered modules. The registry
/// tracks disposal by instance identity, not by name, so two instances may
/// reuse a name at different times without being confused.
pub trait Module: Send + Sync {
    /// The unique, non-empty name of this module.
    fn name(&self) -> Cow<'static, str>;

    /// The collectors this module owns. May be empty.
    fn collectors(&self) -> Vec<Arc<dyn MetricCollector>>;

    /// The module's lifecycle hooks, if it opts into them.
    fn lifecycle(&self) -> Option<&dyn ModuleLifecycle> {
        None
    }
}

/// Optional lifecycle hooks a module may implement.
///
/// Every hook defaults to a no-op. Hooks signal *expected* failures by
/// returning an error, which the runtime logs and contains (rolling back a
/// failed init, continuing disposal past a failed dispose). A panicking
/// hook is treated as a defect: the runtime still restores its invariants,
/// then lets the panic propagate.
pub trait ModuleLifecycle: Send + Sync {
    /// Called once after successful registration during a load operation.
    fn on_init(&self) -> CoreResult<()> {
        Ok(())
    }

    /// Called before each harvest pass over this module's collectors.
    fn on_before_collect(&self) -> CoreResult<()> {
        Ok(())
    }

    /// Called after each harvest pass over this module's collectors.
    fn on_after_collect(&self) -> CoreResult<()> {
        Ok(())
    }

    /// Called at most once per instance, when the module is unregistered or
    /// its registry is disposed.
    fn on_dispose(&self) -> CoreResult<()> {
        Ok(())
    }
}
