//! News insights worker host and client CLI.
//!
//! `worker` runs stage workers until Ctrl-C. The other subcommands act as a
//! client against the same database.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use news_insights::config::Config;
use news_insights::pipeline::DEFAULT_FRAGMENT_LIMIT;
use news_insights::{
    ArticleIndex, Clock, CrawlStage, FixedDelay, FragmentIndex, FsArchive, HttpFetcher,
    InsightStage, MainTextExtractor, OpenAiClient, Pipeline, PollOutcome, QuotePageParser,
    Session, SqliteStore, Stage, StageQueue, StageWorker, StalenessCache, StatusLog,
    SummarizeStage, SystemClock, WorkerConfig, WorkerSet,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "news-insights")]
#[command(about = "Ticker news pipeline: crawl, summarize, extract insights")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run stage workers until interrupted
    Worker {
        /// Stages to run (repeatable); all three when omitted
        #[arg(long = "stage")]
        stages: Vec<Stage>,

        /// Workers per stage
        #[arg(long, default_value_t = 1)]
        instances: usize,
    },

    /// Submit a ticker for processing
    Submit {
        #[arg(long)]
        user: String,
        #[arg(long)]
        session: String,
        #[arg(long)]
        ticker: String,

        /// Poll until the job finishes or the attempts run out
        #[arg(long)]
        wait: bool,
    },

    /// Show the resolved status of a job
    Status { job_id: String },

    /// Show every status event of a job, newest first
    History { job_id: String },

    /// List job ids with status events
    Jobs,

    /// Delete a job's status events
    Clear { job_id: String },

    /// Print stored fragments for a ticker as JSON
    Fragments {
        ticker: String,
        #[arg(long, default_value_t = DEFAULT_FRAGMENT_LIMIT)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,news_insights=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    if let Some(parent) = config.sqlite_file().as_deref().and_then(|p| p.parent()) {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let store = Arc::new(
        SqliteStore::new(&config.database_url)
            .await
            .context("Failed to open database")?,
    );
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let status = StatusLog::new(store.clone(), clock.clone());

    match cli.command {
        Commands::Worker { stages, instances } => {
            run_workers(&config, store, status, clock, stages, instances).await?
        }
        Commands::Submit {
            user,
            session,
            ticker,
            wait,
        } => {
            let pipeline = Pipeline::new(status, store.clone(), store);
            let session = Session::new(user, session)?;
            let submission = pipeline.submit(&session, &ticker).await?;
            println!("{}", submission.job_id);
            println!("queue position: {}", submission.queue_position);

            if wait {
                match pipeline
                    .poll(submission.job_id.as_str(), config.pipeline.poll)
                    .await?
                {
                    PollOutcome::Ready(status) => println!("ready: {}", status.text),
                    PollOutcome::Failed(status) => println!("failed: {}", status.text),
                    PollOutcome::Busy { last } => {
                        println!("busy: job still running (last status: {})", last.text)
                    }
                }
            }
        }
        Commands::Status { job_id } => {
            let resolved = status.resolve(&job_id).await?;
            println!("{}", resolved.text);
        }
        Commands::History { job_id } => {
            for event in status.history(&job_id).await? {
                println!("{}\t{}", event.time.to_rfc3339(), event.status);
            }
        }
        Commands::Jobs => {
            for job_id in status.job_ids().await? {
                println!("{job_id}");
            }
        }
        Commands::Clear { job_id } => {
            let removed = status.clear(&job_id).await?;
            println!("removed {removed} events");
        }
        Commands::Fragments { ticker, limit } => {
            let pipeline = Pipeline::new(status, store.clone(), store);
            let fragments = pipeline.fragments(&ticker, limit).await?;
            println!("{}", serde_json::to_string_pretty(&fragments)?);
        }
    }

    Ok(())
}

async fn run_workers(
    config: &Config,
    store: Arc<SqliteStore>,
    status: StatusLog,
    clock: Arc<dyn Clock>,
    stages: Vec<Stage>,
    instances: usize,
) -> Result<()> {
    let stages = if stages.is_empty() {
        Stage::ALL.to_vec()
    } else {
        stages
    };
    let settings = &config.pipeline;
    let worker_config = |stage: Stage, n: usize| {
        WorkerConfig::with_worker_id(format!("{stage}-{n}"))
            .with_dequeue_timeout(settings.dequeue_timeout)
    };

    let archive = Arc::new(FsArchive::new(&config.archive_dir, clock.clone()));
    let mut workers = WorkerSet::new();

    for stage in stages {
        match stage {
            Stage::Crawl => {
                let handler = Arc::new(
                    CrawlStage::builder()
                        .cache(StalenessCache::new(store.clone(), clock.clone()).with_ttl(settings.cache_ttl))
                        .articles(ArticleIndex::new(store.clone()))
                        .fetcher(Arc::new(HttpFetcher::new()?))
                        .parser(Arc::new(QuotePageParser::default()))
                        .archive(archive.clone())
                        .limiter(Arc::new(FixedDelay::for_downloads(settings.download_delay)))
                        .status(status.clone())
                        .clock(clock.clone())
                        .max_articles(settings.max_articles)
                        .next(StageQueue::new(store.clone()))
                        .build(),
                );
                for n in 0..instances {
                    workers.spawn(
                        StageWorker::new(handler.clone(), StageQueue::new(store.clone()), status.clone())
                            .with_config(worker_config(stage, n)),
                    );
                }
            }
            Stage::Summarize => {
                let handler = Arc::new(
                    SummarizeStage::builder()
                        .news(store.clone())
                        .archive(archive.clone())
                        .extractor(Arc::new(MainTextExtractor))
                        .summarizer(Arc::new(openai_client(config)?))
                        .limiter(Arc::new(FixedDelay::new(settings.summary_delay)))
                        .status(status.clone())
                        .instructions(config.summary_prompt()?)
                        .next(StageQueue::new(store.clone()))
                        .build(),
                );
                for n in 0..instances {
                    workers.spawn(
                        StageWorker::new(handler.clone(), StageQueue::new(store.clone()), status.clone())
                            .with_config(worker_config(stage, n)),
                    );
                }
            }
            Stage::Insight => {
                let handler = Arc::new(
                    InsightStage::builder()
                        .news(store.clone())
                        .fragments(FragmentIndex::new(store.clone()))
                        .extractor(Arc::new(openai_client(config)?))
                        .status(status.clone())
                        .clock(clock.clone())
                        .instructions(config.insight_prompt()?)
                        .content_limit(settings.content_limit)
                        .build(),
                );
                for n in 0..instances {
                    workers.spawn(
                        StageWorker::new(handler.clone(), StageQueue::new(store.clone()), status.clone())
                            .with_config(worker_config(stage, n)),
                    );
                }
            }
        }
    }

    tracing::info!(workers = workers.len(), "workers running, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    workers.shutdown().await;
    Ok(())
}

fn openai_client(config: &Config) -> Result<OpenAiClient> {
    let mut client = OpenAiClient::new(config.require_openai_key()?).with_model(&config.openai_model);
    if let Some(base_url) = &config.openai_base_url {
        client = client.with_base_url(base_url);
    }
    Ok(client)
}
