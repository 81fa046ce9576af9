use crate::config::Config;
use crate::domain::{Review, Suggestion};
use crate::error::{Result, ScraperError};
use crate::infrastructure::{export_to_dir, BrowserSession, ExportFormat, HeaderSet};
use crate::services::{
    Progress, ReviewAnalytics, ScrapeEvent, ScrapeReport, ScrapeRequest, ScrapingService,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

const TEXT_WIDTH: usize = 80;
const NAME_WIDTH: usize = 24;
const DATE_WIDTH: usize = 18;
const BAR_WIDTH: usize = 30;

#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    pub query: String,
    pub count: usize,
    pub pick: Option<usize>,
    pub exports: Vec<ExportFormat>,
    pub out_dir: PathBuf,
}

/// Prints the places a query resolves to.
pub async fn search(config: &Config, query: &str) -> Result<()> {
    let service = ScrapingService::new(config.locators.clone(), config.scrape);

    let session = BrowserSession::open(&config.browser).await?;
    let result = service.places().search(session.page(), query).await;
    session.close().await;

    let suggestions = result?.suggestions(query);
    if suggestions.is_empty() {
        println!("No places found for '{}'", query);
        return Ok(());
    }
    print_suggestions(&suggestions);
    Ok(())
}

pub async fn scrape(config: &Config, options: ScrapeOptions) -> Result<()> {
    if options.count < 1 {
        return Err(ScraperError::Config(
            "number of reviews must be positive".to_string(),
        ));
    }

    let service = Arc::new(ScrapingService::new(config.locators.clone(), config.scrape));
    let session = BrowserSession::open(&config.browser).await?;
    let result = run_scrape(&session, service, &options).await;
    session.close().await;
    let report = result?;

    let reviews = report.reviews.as_slice();
    if reviews.len() < options.count {
        warn!(
            "Only {} of {} requested reviews were available ({:?})",
            reviews.len(),
            options.count,
            report.load.decision
        );
    }

    print_reviews(reviews);
    print_analytics(&ReviewAnalytics::from_reviews(reviews));

    let mut formats: Vec<ExportFormat> = Vec::new();
    for format in &options.exports {
        if !formats.contains(format) {
            formats.push(*format);
        }
    }
    for format in &formats {
        let path = export_to_dir(reviews, *format, HeaderSet::Plain, &options.out_dir)?;
        println!("Saved {}", path.display());
    }

    Ok(())
}

async fn run_scrape(
    session: &BrowserSession,
    service: Arc<ScrapingService>,
    options: &ScrapeOptions,
) -> Result<ScrapeReport> {
    let outcome = until_cancelled(
        service.places().search(session.page(), &options.query),
        tokio::signal::ctrl_c(),
    )
    .await?;
    let suggestions = outcome.suggestions(&options.query);
    if suggestions.is_empty() {
        return Err(ScraperError::Other(format!(
            "No places found for '{}'",
            options.query
        )));
    }
    let chosen = until_cancelled(
        choose(&suggestions, options.pick),
        tokio::signal::ctrl_c(),
    )
    .await?;
    info!("Scraping reviews of {}", chosen.label);

    let request = ScrapeRequest {
        target: chosen.target.clone(),
        count: options.count,
    };
    let page = session.page().clone();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut task = tokio::spawn(async move {
        service.scrape(&page, &request, &Progress::new(tx)).await
    });

    let bar = progress_bar(options.count)?;
    let joined = loop {
        tokio::select! {
            Some(event) = rx.recv() => show(&bar, event),
            joined = &mut task => break joined,
            _ = tokio::signal::ctrl_c() => {
                task.abort();
                let _ = (&mut task).await;
                bar.abandon_with_message("Cancelled");
                return Err(ScraperError::Cancelled);
            }
        }
    };
    while let Ok(event) = rx.try_recv() {
        show(&bar, event);
    }

    joined.map_err(|e| ScraperError::Other(format!("scrape task failed: {}", e)))?
}

/// Runs `work` unless `cancel` completes first.
async fn until_cancelled<T, C>(work: impl Future<Output = Result<T>>, cancel: C) -> Result<T>
where
    C: Future,
{
    tokio::select! {
        biased;
        _ = cancel => Err(ScraperError::Cancelled),
        out = work => out,
    }
}

fn progress_bar(target: usize) -> Result<ProgressBar> {
    let bar = ProgressBar::new(target as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .map_err(|e| ScraperError::Other(e.to_string()))?,
    );
    Ok(bar)
}

fn show(bar: &ProgressBar, event: ScrapeEvent) {
    match event {
        ScrapeEvent::Status(message) => bar.set_message(message),
        ScrapeEvent::Loaded { count, attempt } => {
            bar.set_position((count as u64).min(bar.length().unwrap_or(u64::MAX)));
            bar.set_message(format!("scroll {}", attempt));
        }
        ScrapeEvent::Extracted(_) => {}
        ScrapeEvent::Finished { count } => {
            bar.set_position(count as u64);
            bar.finish_with_message(format!("Scraped {} reviews", count));
        }
    }
}

async fn choose(suggestions: &[Suggestion], pick: Option<usize>) -> Result<&Suggestion> {
    if let [only] = suggestions {
        if only.opens_directly() {
            return Ok(only);
        }
    }

    let number = match pick {
        Some(n) => n,
        None => {
            print_suggestions(suggestions);
            println!("Pick a place [1-{}]:", suggestions.len());
            let mut line = String::new();
            BufReader::new(tokio::io::stdin())
                .read_line(&mut line)
                .await?;
            line.trim()
                .parse::<usize>()
                .map_err(|_| ScraperError::Config(format!("'{}' is not a number", line.trim())))?
        }
    };

    number
        .checked_sub(1)
        .and_then(|i| suggestions.get(i))
        .ok_or_else(|| {
            ScraperError::Config(format!(
                "pick a number between 1 and {}",
                suggestions.len()
            ))
        })
}

fn print_suggestions(suggestions: &[Suggestion]) {
    for (i, suggestion) in suggestions.iter().enumerate() {
        println!("{:>3}. {}", i + 1, suggestion.label);
    }
}

/// Cuts `text` to `max` characters, marking the cut with "...".
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

fn print_reviews(reviews: &[Review]) {
    println!(
        "{:<4} {:<name$} {:<6} {:<date$} {}",
        "#",
        "Name",
        "Rating",
        "Date",
        "Review",
        name = NAME_WIDTH,
        date = DATE_WIDTH
    );
    println!("{}", "-".repeat(4 + NAME_WIDTH + 6 + DATE_WIDTH + TEXT_WIDTH + 4));
    for (i, review) in reviews.iter().enumerate() {
        println!(
            "{:<4} {:<name$} {:<6} {:<date$} {}",
            i + 1,
            truncate(&review.name, NAME_WIDTH),
            review.rating,
            truncate(&review.date, DATE_WIDTH),
            truncate(&review.text, TEXT_WIDTH),
            name = NAME_WIDTH,
            date = DATE_WIDTH
        );
    }
}

fn print_analytics(analytics: &ReviewAnalytics) {
    println!();
    match analytics.average_rating {
        Some(avg) => println!(
            "Average rating: {:.2} ({} of {} rated)",
            avg, analytics.rated, analytics.total
        ),
        None => println!("Average rating: n/a"),
    }

    let most = analytics.rating_distribution.iter().copied().max().unwrap_or(0);
    for star in (1..=5).rev() {
        let n = analytics.rating_distribution[star - 1];
        println!("{} star  {:<w$} {}", star, scaled_bar(n, most), n, w = BAR_WIDTH);
    }

    if analytics.length_histogram.is_empty() {
        return;
    }
    println!("\nReview length (chars)");
    let most = analytics
        .length_histogram
        .iter()
        .map(|b| b.count)
        .max()
        .unwrap_or(0);
    for bin in &analytics.length_histogram {
        println!(
            "{:>5}-{:<5} {:<w$} {}",
            bin.from,
            bin.to,
            scaled_bar(bin.count, most),
            bin.count,
            w = BAR_WIDTH
        );
    }
}

fn scaled_bar(n: usize, most: usize) -> String {
    if most == 0 {
        return String::new();
    }
    "#".repeat((n * BAR_WIDTH).div_ceil(most))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PlaceTarget;
    use crate::services::SearchOutcome;

    #[test]
    fn truncation_marks_long_text() {
        assert_eq!(truncate("short", 80), "short");
        let long = "é".repeat(100);
        let cut = truncate(&long, 80);
        assert_eq!(cut.chars().count(), 80);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn bars_scale_to_the_largest_bucket() {
        assert_eq!(scaled_bar(0, 0), "");
        assert_eq!(scaled_bar(10, 10).len(), BAR_WIDTH);
        assert_eq!(scaled_bar(1, 10).len(), 3);
    }

    #[tokio::test]
    async fn explicit_pick_is_one_based() {
        let suggestions = vec![
            Suggestion {
                id: 0,
                label: "A".into(),
                target: PlaceTarget::Direct { query: "a".into() },
            },
            Suggestion {
                id: 1,
                label: "B".into(),
                target: PlaceTarget::Direct { query: "b".into() },
            },
        ];

        assert_eq!(choose(&suggestions, Some(2)).await.unwrap().label, "B");
        assert!(matches!(
            choose(&suggestions, Some(0)).await,
            Err(ScraperError::Config(_))
        ));
        assert!(matches!(
            choose(&suggestions, Some(3)).await,
            Err(ScraperError::Config(_))
        ));
    }

    #[tokio::test]
    async fn a_pasted_link_is_used_without_asking() {
        let url = "https://maps.app.goo.gl/xyz";
        let suggestions = SearchOutcome::DirectLink(url.into()).suggestions(url);

        let chosen = choose(&suggestions, None).await.unwrap();
        assert_eq!(chosen.target, PlaceTarget::Link { url: url.into() });
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_waiting_prompt() {
        let waiting = std::future::pending::<Result<()>>();
        assert!(matches!(
            until_cancelled(waiting, async {}).await,
            Err(ScraperError::Cancelled)
        ));

        let done = until_cancelled(async { Ok(7) }, std::future::pending::<()>()).await;
        assert_eq!(done.unwrap(), 7);
    }
}
