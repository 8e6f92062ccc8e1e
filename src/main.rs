use chrono::{Local, NaiveDate};
use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use itertools::Itertools;
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    fs::OpenOptions,
    io::{self, stdin},
    sync::Mutex,
    time::Duration,
};
use tapwise::{
    app::{App, Control},
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    keyset::KeySet,
    language::{Language, LessonCatalogue},
    report::{BackgroundReporter, ReportSink, Sinks},
    runtime::{AppEvent, Clock, CrosstermEventSource, FixedTicker, MonotonicClock, Runner},
    session_log::SessionLog,
    stats::{KeyPerformance, StatsDb},
    ui,
    word_source::{FixedSource, KeySetSource, LessonSource, PracticeSource},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const TICK_RATE_MS: u64 = 100;
const PROGRESS_DAYS: u32 = 7;
const PROBLEM_KEYS: u32 = 5;

/// keyboard practice in the terminal
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Practice a chosen set of keys or a programming lesson, with per-key accuracy tracking, daily goals and session history."
)]
pub struct Cli {
    /// number of words per session
    #[clap(short = 'w', long)]
    number_of_words: Option<usize>,

    /// letters to practice, e.g. "enairl"
    #[clap(short = 'k', long)]
    keys: Option<String>,

    /// practice the whole alphabet
    #[clap(long, conflicts_with = "keys")]
    all_keys: bool,

    /// programming lesson as LANGUAGE or LANGUAGE:N, e.g. "rust:2"
    #[clap(short = 'l', long, conflicts_with = "prompt")]
    lesson: Option<String>,

    /// custom prompt to type
    #[clap(short = 'p', long)]
    prompt: Option<String>,

    /// daily practice goal in minutes
    #[clap(long)]
    goal: Option<u32>,

    /// also append finished sessions to a CSV log
    #[clap(long)]
    log_csv: bool,

    /// print stored statistics and exit
    #[clap(long)]
    stats: bool,
}

impl Cli {
    /// Fold flags into the stored config.
    fn apply_to(&self, config: &mut Config) {
        if let Some(n) = self.number_of_words {
            config.number_of_words = n;
        }
        if let Some(keys) = &self.keys {
            config.selected_keys = KeySet::parse(keys);
        }
        if self.all_keys {
            config.selected_keys = KeySet::all();
        }
        if let Some(goal) = self.goal {
            config.daily_goal_minutes = goal;
        }
        if self.log_csv {
            config.session_log = true;
        }
    }

    fn practice_source(&self, config: &Config) -> Result<PracticeSource, Box<dyn Error>> {
        if let Some(prompt) = &self.prompt {
            return Ok(PracticeSource::Prompt(FixedSource::new(prompt)));
        }
        if let Some(selector) = &self.lesson {
            let catalogue = LessonCatalogue::load()?;
            let (language, lesson) = catalogue.resolve(selector)?;
            return Ok(PracticeSource::Lesson(LessonSource::new(
                language.name.clone(),
                lesson.clone(),
            )));
        }
        Ok(PracticeSource::Keys(KeySetSource::new(
            Language::english()?,
            config.selected_keys.clone(),
            config.number_of_words,
        )))
    }
}

fn init_tracing() {
    let Some(path) = AppDirs::log_file_path() else {
        return;
    };
    if let Some(parent) = path.parent() {
        if std::fs::create_dir_all(parent).is_err() {
            return;
        }
    }
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
}

fn open_store(config: &Config) -> Result<StatsDb, Box<dyn Error>> {
    Ok(StatsDb::open_default()?.with_goal_minutes(config.daily_goal_minutes))
}

/// An explicit `--goal` also retargets today, which may already have a row.
fn apply_goal_flag(cli: &Cli, store: &StatsDb, today: NaiveDate) -> Result<(), Box<dyn Error>> {
    if let Some(minutes) = cli.goal {
        store.set_goal_target(today, minutes)?;
    }
    Ok(())
}

fn build_reporter(config: &Config) -> Result<BackgroundReporter, Box<dyn Error>> {
    let mut sinks = Sinks::new()
        .with_sessions(open_store(config)?)
        .with_keys(open_store(config)?);
    if config.session_log {
        match AppDirs::session_log_path() {
            Some(path) => sinks = sinks.with_sessions(SessionLog::new(path)),
            None => warn!("no state directory; CSV session log disabled"),
        }
    }
    Ok(BackgroundReporter::spawn(sinks))
}

fn print_stats(store: &StatsDb) -> Result<(), Box<dyn Error>> {
    let today = Local::now().date_naive();
    let averages = store.average_metrics(10)?;
    let goal = store.goal_for(today)?;
    let xp = store.experience()?;

    println!("sessions:      {}", averages.total_sessions);
    println!("last speed:    {} wpm", store.last_speed()?);
    println!("top speed:     {} wpm", store.top_speed()?);
    println!(
        "last 10 avg:   {} wpm, {}% accuracy, score {}",
        averages.avg_wpm, averages.avg_accuracy, averages.avg_score
    );
    println!(
        "today:         {}/{} min{}",
        goal.completed_minutes(),
        goal.target_minutes,
        if goal.achieved { " (goal reached)" } else { "" }
    );
    println!("goal streak:   {} days", store.goal_streak(today)?);
    println!(
        "experience:    {} today, {} this week, {} total",
        xp.daily, xp.weekly, xp.total
    );

    let progress = store.progress(PROGRESS_DAYS, today)?;
    if !progress.is_empty() {
        println!();
        println!("date        sessions  wpm  accuracy");
        for day in progress {
            println!(
                "{}  {:>8}  {:>3}  {:>7}%",
                day.date.format("%Y-%m-%d"),
                day.sessions,
                day.avg_wpm,
                day.avg_accuracy
            );
        }
    }

    let weakest = store.problem_keys(PROBLEM_KEYS)?;
    if !weakest.is_empty() {
        println!();
        println!("weakest keys:  {}", weakest_label(&weakest));
    }

    let keys = store.key_performance()?;
    if !keys.is_empty() {
        println!();
        println!("key  accuracy  speed  errors");
        for k in keys {
            println!(
                "{:<4} {:>7}%  {:>5}  {:>6}",
                if k.key == ' ' { '·' } else { k.key },
                k.accuracy,
                k.speed,
                k.error_count
            );
        }
    }
    Ok(())
}

fn weakest_label(keys: &[KeyPerformance]) -> String {
    keys.iter()
        .map(|k| format!("{} {}%", if k.key == ' ' { '·' } else { k.key }, k.accuracy))
        .join(", ")
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing();

    let config_store = FileConfigStore::new();
    let mut config = config_store.load();
    cli.apply_to(&mut config);
    if let Err(e) = config_store.save(&config) {
        warn!(error = %e, "failed to save config");
    }

    let store = open_store(&config)?;
    store.apply_due_resets(Local::now())?;
    apply_goal_flag(&cli, &store, Local::now().date_naive())?;

    if cli.stats {
        return print_stats(&store);
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let source = cli.practice_source(&config)?;
    let reporter = build_reporter(&config)?;
    let mut app = App::new(source, reporter, config)
        .with_store(store)
        .with_config_store(config_store);
    info!(keys = %app.active_keys(), "starting");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    // flush pending reports before exit
    app.engine.into_reporter().shutdown();
    result
}

fn start_tui<B: Backend, R: ReportSink>(
    terminal: &mut Terminal<B>,
    app: &mut App<R>,
) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );
    let clock = MonotonicClock::new();

    loop {
        terminal.draw(|f| ui::draw(app, f))?;

        match runner.step() {
            AppEvent::Key(key) => {
                if app.handle_key(key, clock.now_ms()) == Control::Quit {
                    return Ok(());
                }
            }
            AppEvent::Resize => {}
            AppEvent::Tick => app.on_tick(),
        }
    }
}
