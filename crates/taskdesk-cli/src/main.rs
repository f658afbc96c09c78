//! taskdesk - タスク管理バックエンドの開発用 CLI
//!
//! すべて in-memory の adapter で動きます。各サブコマンドは起動のたびに
//! デモデータを投入してから実行します。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;

use taskdesk_core::Config;
use taskdesk_core::app::{
    DispatchOutcome, NotificationDispatcher, ReminderJob, ReminderScanner, ScanReport,
    TaskService,
};
use taskdesk_core::domain::{NewTask, Priority, StatusName, User, UserId};
use taskdesk_core::impls::{
    InMemoryCacheStore, InMemoryMessageChannel, InMemoryTaskStore, LogMailer,
};
use taskdesk_core::observability::init_tracing;
use taskdesk_core::ports::{
    Clock, IdGenerator, MessageChannel, Subscription, SystemClock, UlidGenerator,
};
use taskdesk_core::query::{SearchSpec, SortSpec};
use taskdesk_core::worker::WorkerGroup;

#[derive(Debug, Parser)]
#[command(name = "taskdesk", version, about = "Task tracking backend (in-memory)")]
struct Cli {
    /// TOML config; defaults apply when the file does not exist.
    #[arg(long, env = "TASKDESK_CONFIG", default_value = "taskdesk.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Seed demo data, list it, then run one reminder scan and dispatch.
    Demo,

    /// Query the demo data.
    Query {
        /// e.g. '{"name":"statusName","value":"Pending"}'
        #[arg(long)]
        search: Option<String>,

        /// e.g. '{"name":"dueDate","order":"ASC"}' (any other order is descending)
        #[arg(long)]
        sort: Option<String>,

        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long, default_value_t = 10)]
        limit: u32,
    },

    /// Scan for tasks due the day after DATE (default: today) and mail them.
    Remind {
        /// YYYY-MM-DD, UTC
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Run the reminder job and the dispatcher until Ctrl-C.
    Serve,
}

/// Wiring of every port to its in-memory adapter.
struct App {
    config: Config,
    store: Arc<InMemoryTaskStore>,
    channel: Arc<InMemoryMessageChannel>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    service: TaskService,
    scanner: Arc<ReminderScanner>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl App {
    fn build(config: Config) -> anyhow::Result<Self> {
        let store = Arc::new(InMemoryTaskStore::new());
        let channel = Arc::new(InMemoryMessageChannel::new());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(clock.clone()));
        let mailer = Arc::new(LogMailer);

        let service = TaskService::new(
            store.clone(),
            store.clone(),
            Arc::new(InMemoryCacheStore::new()),
            mailer.clone(),
            clock.clone(),
            ids.clone(),
        )
        .with_assignment_subject(config.mail.assignment_subject.clone());

        let scanner = Arc::new(ReminderScanner::new(
            store.clone(),
            store.clone(),
            channel.clone(),
            clock.clone(),
            config.reminder.topic.clone(),
            config.reminder.batch_size,
        ));

        let template = config
            .reminder_template()
            .context("loading reminder template")?;
        let dispatcher = Arc::new(
            NotificationDispatcher::new(mailer, template)
                .with_subject(config.mail.reminder_subject.clone())
                .with_max_attempts(config.dispatcher.max_attempts),
        );

        Ok(Self {
            config,
            store,
            channel,
            clock,
            ids,
            service,
            scanner,
            dispatcher,
        })
    }

    async fn user(&self, first: &str, last: &str, email: Option<&str>) -> UserId {
        let id: UserId = self.ids.generate();
        self.store
            .insert_user(User {
                id,
                first_name: Some(first.to_string()),
                last_name: Some(last.to_string()),
                email: email.map(str::to_string),
                is_deleted: false,
            })
            .await;
        id
    }

    /// Statuses, a few users, and tasks spread around tomorrow.
    async fn seed_demo(&self) -> anyhow::Result<()> {
        let pending = self.service.create_status(StatusName::Pending).await?;
        let in_progress = self.service.create_status(StatusName::InProgress).await?;
        let completed = self.service.create_status(StatusName::Completed).await?;

        let ada = self.user("Ada", "Lovelace", Some("ada@example.com")).await;
        let alan = self.user("Alan", "Turing", Some("alan@example.com")).await;
        let grace = self.user("Grace", "Hopper", None).await;

        let tomorrow = start_of_day(self.clock.now()) + Duration::days(1);
        let tasks = vec![
            ("Write release notes", Priority::High, ada, pending.id, Duration::hours(10)),
            ("Review cache patch", Priority::Medium, alan, in_progress.id, Duration::hours(15)),
            // no address: skipped by the reminder scan
            ("Plan retro", Priority::Low, grace, pending.id, Duration::hours(11)),
            ("Rotate credentials", Priority::High, alan, completed.id, Duration::days(4)),
            ("Tidy backlog", Priority::Low, ada, in_progress.id, Duration::days(-2)),
        ];
        let count = tasks.len();
        for (name, priority, owner, status, offset) in tasks {
            self.service
                .create_task(NewTask {
                    name: name.to_string(),
                    priority: Some(priority),
                    category: Some("demo".to_string()),
                    user_id: Some(owner),
                    status_id: Some(status),
                    due_date: Some(tomorrow + offset),
                    ..NewTask::default()
                })
                .await
                .with_context(|| format!("seeding task '{name}'"))?;
        }
        tracing::info!(tasks = count, "demo data seeded");
        Ok(())
    }

    /// Scan once, then close the channel and dispatch everything published.
    async fn remind_once(&self, reference: DateTime<Utc>) -> anyhow::Result<RemindOutput> {
        let scan = self.scanner.run_once(reference).await?;
        let subscription = self.channel.subscribe(&self.config.reminder.topic);
        self.channel.close();

        let mut dispatched = Vec::new();
        while let Some(delivery) = subscription.receive().await {
            dispatched.push(self.dispatcher.handle(delivery).await);
        }
        Ok(RemindOutput { scan, dispatched })
    }

    async fn serve(self) -> anyhow::Result<()> {
        let mut workers = WorkerGroup::new();

        let job = ReminderJob::new(
            self.scanner.clone(),
            self.config.reminder.schedule,
            self.clock.clone(),
        );
        workers.spawn("reminder", move |rx| job.run(rx));

        let dispatcher = self.dispatcher.clone();
        let subscription = self.channel.subscribe(&self.config.reminder.topic);
        workers.spawn("dispatcher", move |rx| dispatcher.listen(subscription, rx));

        tracing::info!(
            workers = workers.len(),
            schedule = ?self.config.reminder.schedule,
            "serving; Ctrl-C to stop"
        );
        tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;

        tracing::info!("shutting down");
        workers.shutdown_and_join().await;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RemindOutput {
    scan: ScanReport,
    dispatched: Vec<DispatchOutcome>,
}

fn start_of_day(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive().and_time(chrono::NaiveTime::MIN).and_utc()
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;
    init_tracing(&config.log.filter);

    let app = App::build(config)?;
    app.seed_demo().await?;

    match cli.command {
        Command::Demo => {
            let page = app.service.query(None, None, 1, 10).await?;
            print_json(&page)?;
            print_json(&app.service.priority_summary("High").await?)?;
            let output = app.remind_once(app.clock.now()).await?;
            print_json(&output)?;
            print_json(&app.service.cache_counts())?;
        }
        Command::Query {
            search,
            sort,
            page,
            limit,
        } => {
            let search = search.as_deref().map(SearchSpec::from_json).transpose()?;
            let sort = sort.as_deref().map(SortSpec::from_json).transpose()?;
            let result = app
                .service
                .query(search.as_ref(), sort.as_ref(), page, limit)
                .await?;
            print_json(&result)?;
        }
        Command::Remind { date } => {
            let reference = match date {
                Some(date) => date.and_time(chrono::NaiveTime::MIN).and_utc(),
                None => app.clock.now(),
            };
            let output = app.remind_once(reference).await?;
            if output.scan.failed > 0 {
                print_json(&output)?;
                bail!("{} reminder batch(es) failed to publish", output.scan.failed);
            }
            print_json(&output)?;
        }
        Command::Serve => app.serve().await?,
    }
    Ok(())
}
