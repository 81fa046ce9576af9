use super::events::{Progress, ScrapeEvent};
use crate::error::Result;
use crate::utils::{jittered, poll_until};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

/// Bounded patience for the scroll loop.
///
/// The page never says "all reviews loaded", so the loop stops when the
/// target is met, when the count has not grown for more than `grace`
/// consecutive attempts, or at `max_attempts`. The first two also require
/// `min_attempts` to have passed.
#[derive(Debug, Clone, Copy)]
pub struct ScrollPolicy {
    pub min_attempts: usize,
    pub max_attempts: usize,
    pub grace: usize,
    /// How long one attempt waits for the count to grow.
    pub settle: Duration,
    pub jitter: Duration,
    pub poll_interval: Duration,
}

impl Default for ScrollPolicy {
    fn default() -> Self {
        Self {
            min_attempts: 4,
            max_attempts: 50,
            grace: 3,
            settle: Duration::from_millis(1500),
            jitter: Duration::from_millis(500),
            poll_interval: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadDecision {
    Continue,
    TargetReached,
    Exhausted,
    CeilingHit,
}

#[derive(Debug, Clone)]
pub struct ScrollState {
    target: usize,
    previous: usize,
    current: usize,
    attempt: usize,
    stalled: usize,
}

impl ScrollState {
    pub fn new(target: usize) -> Self {
        Self {
            target,
            previous: 0,
            current: 0,
            attempt: 0,
            stalled: 0,
        }
    }

    pub fn observe(&mut self, policy: &ScrollPolicy, current: usize) -> LoadDecision {
        self.previous = self.current;
        self.current = current;
        self.attempt += 1;

        if self.current > self.previous {
            self.stalled = 0;
        } else {
            self.stalled += 1;
        }

        let warmed_up = self.attempt >= policy.min_attempts;
        if warmed_up && self.current >= self.target {
            LoadDecision::TargetReached
        } else if warmed_up && self.stalled > policy.grace {
            LoadDecision::Exhausted
        } else if self.attempt >= policy.max_attempts {
            LoadDecision::CeilingHit
        } else {
            LoadDecision::Continue
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn attempt(&self) -> usize {
        self.attempt
    }

    pub fn stalled(&self) -> usize {
        self.stalled
    }
}

/// Something that reveals more reviews when advanced.
#[async_trait]
pub trait ReviewFeed: Send + Sync {
    async fn advance(&self) -> Result<()>;
    async fn visible(&self) -> Result<usize>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoadOutcome {
    pub loaded: usize,
    pub attempts: usize,
    pub decision: LoadDecision,
}

pub struct ReviewLoader {
    policy: ScrollPolicy,
}

impl ReviewLoader {
    pub fn new(policy: ScrollPolicy) -> Self {
        Self { policy }
    }

    pub async fn load(
        &self,
        feed: &dyn ReviewFeed,
        target: usize,
        progress: &Progress,
    ) -> Result<LoadOutcome> {
        let mut state = ScrollState::new(target);

        loop {
            feed.advance().await?;

            let previous = state.current();
            let wait = jittered(self.policy.settle, self.policy.jitter);
            let grown = poll_until(wait, self.policy.poll_interval, || async move {
                let n = feed.visible().await?;
                Ok((n > previous).then_some(n))
            })
            .await?;
            let current = match grown {
                Some(n) => n,
                None => feed.visible().await?,
            };

            let decision = state.observe(&self.policy, current);
            progress.emit(ScrapeEvent::Loaded {
                count: current,
                attempt: state.attempt(),
            });
            debug!(
                "Scroll attempt {}: {} reviews visible ({} stalled)",
                state.attempt(),
                current,
                state.stalled()
            );

            if decision != LoadDecision::Continue {
                info!(
                    "Stopped loading after {} attempts with {} reviews: {:?}",
                    state.attempt(),
                    current,
                    decision
                );
                return Ok(LoadOutcome {
                    loaded: current,
                    attempts: state.attempt(),
                    decision,
                });
            }
        }
    }
}
