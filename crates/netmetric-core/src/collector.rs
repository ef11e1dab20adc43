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

//! The collector contract.
//!
//! A collector is a stateful object, typically living in a provider crate,
//! that knows how to probe one specific resource (a database, a broker, the
//! local system) and turn the reading into a [`Metric`]. The runtime never
//! calls collectors directly — it reaches them through the owning module's
//! [`collectors`](crate::module::Module::collectors) enumeration.

use std::borrow::Cow;

use async_trait::async_trait;

use crate::cancel::CancelToken;
use crate::error::CoreResult;
use crate::metric::{Metric, MetricId};

/// The core trait every metric collector implements.
///
/// Collection is async-first so a slow probe (a network round-trip, a
/// blocking syscall behind `spawn_blocking`) never stalls its caller's
/// runtime. Implementations must be safe to call from any thread.
#[async_trait]
pub trait MetricCollector: Send + Sync {
    /// Returns a unique, human-readable identifier for this collector.
    fn collector_id(&self) -> Cow<'static, str>;

    /// Performs one collection pass.
    ///
    /// `Ok(None)` means the collector has nothing to report this cycle —
    /// that is not an error. Implementations should check `cancel` at their
    /// own safe points and bail out with [`ErrorCode::Cancelled`] when it
    /// fires.
    ///
    /// [`ErrorCode::Cancelled`]: crate::error::ErrorCode::Cancelled
    async fn collect(&self, cancel: &CancelToken) -> CoreResult<Option<Metric>>;

    /// Factory helper: creates an empty summary instrument for this
    /// collector to fill via [`Metric::observe`].
    fn summary_instrument(&self, id: MetricId, description: &str, unit: &str) -> Metric {
        Metric::new_summary(id, description, unit)
    }

    /// Factory helper: creates an empty histogram instrument with the given
    /// bucket bounds.
    fn histogram_instrument(
        &self,
        id: MetricId,
        description: &str,
        unit: &str,
        bucket_bounds: Vec<f64>,
    ) -> Metric {
        Metric::new_histogram(id, description, unit, bucket_bounds)
    }
}
