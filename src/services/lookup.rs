use crate::domain::{MapPage, Strategy, StrategyChain};
use crate::error::Result;
use crate::utils::poll_until;
use std::time::Duration;
use tracing::debug;

/// Per-lookup waits. Nothing bounds a whole scrape.
#[derive(Debug, Clone, Copy)]
pub struct LookupTimeouts {
    /// Best-effort lookups: consent dialog, reviews tab.
    pub optional: Duration,
    /// Lookups a step cannot do without: search box, results, review container.
    pub required: Duration,
    pub poll_interval: Duration,
}

impl Default for LookupTimeouts {
    fn default() -> Self {
        Self {
            optional: Duration::from_secs(5),
            required: Duration::from_secs(10),
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Tries each strategy in order, giving each its own `timeout`, and returns
/// the first one that matches anything.
pub async fn wait_for_chain<'c>(
    page: &dyn MapPage,
    chain: &'c StrategyChain,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<Option<&'c Strategy>> {
    for strategy in chain.strategies() {
        let found = poll_until(timeout, poll_interval, || async move {
            let n = page.count(strategy).await?;
            Ok((n > 0).then_some(n))
        })
        .await?;

        if let Some(n) = found {
            debug!("{}: '{}' matched {} element(s)", chain.name(), strategy.css(), n);
            return Ok(Some(strategy));
        }
        debug!("{}: '{}' matched nothing", chain.name(), strategy.css());
    }
    Ok(None)
}

/// Polls every strategy of the chain under one shared deadline and returns the
/// earliest strategy in chain order that matches.
pub async fn wait_for_any<'c>(
    page: &dyn MapPage,
    chain: &'c StrategyChain,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<Option<&'c Strategy>> {
    poll_until(timeout, poll_interval, || async move {
        for strategy in chain.strategies() {
            if page.count(strategy).await? > 0 {
                return Ok(Some(strategy));
            }
        }
        Ok(None)
    })
    .await
}

/// The first strategy that currently matches, without waiting.
pub async fn first_present<'c>(
    page: &dyn MapPage,
    chain: &'c StrategyChain,
) -> Result<Option<(&'c Strategy, usize)>> {
    for strategy in chain.strategies() {
        let n = page.count(strategy).await?;
        if n > 0 {
            return Ok(Some((strategy, n)));
        }
    }
    Ok(None)
}
