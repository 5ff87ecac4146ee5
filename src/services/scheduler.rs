use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::sleep;
use tracing::{debug, info};

/// Position of a finished group within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupProgress {
    /// Zero-based.
    pub index: usize,
    pub total_groups: usize,
    pub size: usize,
}

/// Runs items in fixed-size groups: everything in a group concurrently, a barrier at the
/// end of each group, and a settling delay before the next one.
///
/// All futures are polled on the calling task. Concurrency comes from suspension points,
/// not threads, so `process` may borrow freely.
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    batch_size: usize,
    batch_delay: Duration,
}

impl BatchScheduler {
    pub fn new(batch_size: usize, batch_delay: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            batch_delay,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Sizes of the groups `total` items split into, in dispatch order.
    pub fn group_sizes(&self, total: usize) -> Vec<usize> {
        (0..total)
            .step_by(self.batch_size)
            .map(|start| (total - start).min(self.batch_size))
            .collect()
    }

    /// Processes `items` group by group and hands each group's outcomes, in input order,
    /// to `on_group` once every item in it has finished. Returning `ControlFlow::Break`
    /// from `on_group` stops before the next group. Returns the number of groups run.
    pub async fn run<'a, T, O, F, Fut, G>(&self, items: &'a [T], process: F, mut on_group: G) -> usize
    where
        F: Fn(&'a T) -> Fut,
        Fut: Future<Output = O>,
        G: FnMut(GroupProgress, Vec<O>) -> ControlFlow<()>,
    {
        let total_groups = items.len().div_ceil(self.batch_size);

        for (index, group) in items.chunks(self.batch_size).enumerate() {
            if index > 0 && !self.batch_delay.is_zero() {
                debug!(
                    delay_secs = self.batch_delay.as_secs_f64(),
                    "waiting before next batch"
                );
                sleep(self.batch_delay).await;
            }

            info!(
                batch = index + 1,
                of = total_groups,
                size = group.len(),
                "dispatching batch"
            );

            let outcomes = join_all(group.iter().map(&process)).await;

            let progress = GroupProgress {
                index,
                total_groups,
                size: group.len(),
            };

            if on_group(progress, outcomes).is_break() {
                return index + 1;
            }
        }

        total_groups
    }
}
