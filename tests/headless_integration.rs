use std::sync::mpsc;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tapwise::app::{App, Control};
use tapwise::config::Config;
use tapwise::report::CompletionReport;
use tapwise::runtime::{AppEvent, Clock, FixedTicker, ManualClock, Runner, TestEventSource};
use tapwise::word_source::{FixedSource, PracticeSource};

fn key(c: char) -> AppEvent {
    AppEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))
}

fn app(prompt: &str) -> App<Vec<CompletionReport>> {
    App::new(
        PracticeSource::Prompt(FixedSource::new(prompt)),
        Vec::new(),
        Config::default(),
    )
}

/// Drive the app until the channel runs dry or it quits.
fn drive(app: &mut App<Vec<CompletionReport>>, events: Vec<AppEvent>, step_ms: u64) -> bool {
    let (tx, rx) = mpsc::channel();
    let expected = events.len();
    for ev in events {
        tx.send(ev).unwrap();
    }
    drop(tx);

    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(5)),
    );
    let clock = ManualClock::new(0);

    let mut seen = 0;
    while seen < expected {
        match runner.step() {
            AppEvent::Key(k) => {
                seen += 1;
                clock.advance(step_ms);
                if app.handle_key(k, clock.now_ms()) == Control::Quit {
                    return true;
                }
            }
            AppEvent::Resize => seen += 1,
            AppEvent::Tick => app.on_tick(),
        }
    }
    false
}

#[test]
fn headless_typing_flow_completes() {
    let mut app = app("hi");
    let quit = drive(&mut app, vec![key('h'), key('i'), key(' ')], 200);

    assert!(!quit);
    let reports = app.engine.reporter();
    assert_eq!(reports.len(), 1);
    let summary = &reports[0].summary;
    assert_eq!(summary.keystrokes, 3);
    assert_eq!(summary.errors, 0);
    assert_eq!(summary.accuracy, 100);
    assert_eq!(summary.selected_keys, "custom");
    // 3 keystrokes over 400ms: (3 / 5) / (0.4 / 60) = 90
    assert_eq!(summary.wpm, 90);

    // a fresh session is loaded with the same prompt
    assert_eq!(app.engine.session().counters().keystrokes, 0);
    assert_eq!(app.engine.last_speed(), 90);
}

#[test]
fn headless_mistakes_are_reported_per_key() {
    let mut app = app("ab");
    drive(
        &mut app,
        vec![
            key('x'),
            AppEvent::Key(KeyEvent::new(KeyCode::Backspace, KeyModifiers::NONE)),
            key('a'),
            key('b'),
            key(' '),
        ],
        100,
    );

    let report = &app.engine.reporter()[0];
    assert_eq!(report.summary.keystrokes, 5);
    assert_eq!(report.summary.errors, 1);
    assert_eq!(report.summary.accuracy, 80);

    let x = report.deltas.iter().find(|d| d.character == 'x').unwrap();
    assert_eq!((x.correct, x.incorrect), (0, 1));
    let a = report.deltas.iter().find(|d| d.character == 'a').unwrap();
    assert_eq!((a.correct, a.incorrect), (1, 0));
}

#[test]
fn headless_escape_quits_mid_session() {
    let mut app = app("hello");
    let quit = drive(
        &mut app,
        vec![
            key('h'),
            AppEvent::Resize,
            AppEvent::Key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)),
            key('e'),
        ],
        50,
    );

    assert!(quit);
    assert!(app.engine.reporter().is_empty());
    assert_eq!(app.engine.session().counters().keystrokes, 1);
}

#[test]
fn headless_modified_keys_are_ignored() {
    let mut app = app("hi");
    drive(
        &mut app,
        vec![AppEvent::Key(KeyEvent::new(KeyCode::Char('h'), KeyModifiers::ALT))],
        50,
    );
    assert_eq!(app.engine.session().counters().keystrokes, 0);
}
