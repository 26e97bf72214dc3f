//! Backward search for the most recent deployment.
//!
//! Windows are laid end to end going back from the configured `until`:
//!
//! ```text
//! iteration 1: [until - step,   until)
//! iteration 2: [until - 2*step, until - step)
//! ...
//! ```
//!
//! The walk stops at the first non-empty window, or once the offset reaches
//! `max_lookback`. The last window is not clipped, so with a lookback that is
//! not a multiple of the step the search can reach slightly past it.

use chrono::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{ReleaseError, Result};
use crate::list::ReleaseLister;
use crate::obs;
use crate::storage_traits::BlobStore;
use crate::types::ReleaseDeployment;
use crate::window::TimeWindow;

/// Walks step-sized windows backward until a deployment shows up.
pub struct LastDeploymentFinder<S> {
    lister: ReleaseLister<S>,
    step: Duration,
    max_lookback: Duration,
}

impl<S: BlobStore> LastDeploymentFinder<S> {
    pub fn new(lister: ReleaseLister<S>, step: Duration, max_lookback: Duration) -> Self {
        Self {
            lister,
            step,
            max_lookback,
        }
    }

    pub fn lister(&self) -> &ReleaseLister<S> {
        &self.lister
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    pub fn max_lookback(&self) -> Duration {
        self.max_lookback
    }

    /// The newest deployment in the first non-empty window.
    ///
    /// Returns [`ReleaseError::NoDeploymentsFound`] when the budget runs out.
    /// Any listing error stops the search immediately.
    pub async fn find_last(&self, cancel: &CancellationToken) -> Result<ReleaseDeployment> {
        let anchor = self.lister.window().until();
        let mut offset = Duration::zero();
        let mut iteration = 0_u32;

        while offset < self.max_lookback {
            let Some(window) = TimeWindow::ending_before(anchor, offset, self.step) else {
                break;
            };
            iteration += 1;
            obs::emit_search_window(iteration, &window);

            let mut deployments = self.lister.list_in_window(window, cancel).await?;
            if !deployments.is_empty() {
                let newest = deployments.swap_remove(0);
                obs::emit_search_found(iteration, &newest.metadata.timestamp);
                return Ok(newest);
            }

            offset = match offset.checked_add(&self.step) {
                Some(next) => next,
                None => break,
            };
        }

        obs::emit_search_exhausted(iteration, self.max_lookback.num_hours());
        Err(ReleaseError::NoDeploymentsFound {
            max_lookback: self.max_lookback,
        })
    }
}
