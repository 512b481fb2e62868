use std::sync::mpsc;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{backend::TestBackend, Terminal};

use tenta::app::{App, AppState};
use tenta::attempts::AttemptLog;
use tenta::catalog::{Catalog, Question};
use tenta::enrollment::{
    fixture_enrollments, EnrollmentStore, MemoryEnrollmentStore, SqliteEnrollmentStore,
};
use tenta::flow::{QuizFlow, QuizRequest, Services};
use tenta::runtime::{FixedTicker, QuizEvent, Runner, TestEventSource};
use tenta::session::{QuizSession, SessionConfig, SubmitReason};

fn key(code: KeyCode) -> QuizEvent {
    QuizEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
}

fn memory_services() -> Services {
    Services::new(
        Box::new(MemoryEnrollmentStore::new(fixture_enrollments(None).unwrap())),
        Some(AttemptLog::open_in_memory().unwrap()),
    )
}

fn request(user_id: u32, course_id: u32, quiz_id: u32) -> QuizRequest {
    QuizRequest {
        user_id,
        course_id,
        quiz_id,
        default_passing_score: 70,
    }
}

fn question(correct_answer: usize) -> Question {
    Question {
        prompt: format!("Pick option {correct_answer}"),
        options: vec!["a".into(), "b".into(), "c".into()],
        correct_answer,
        explanations: None,
    }
}

fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
    terminal
        .backend()
        .buffer()
        .content
        .iter()
        .map(|c| c.symbol())
        .collect()
}

// Drives the real event loop headlessly: keys go through TestEventSource,
// frames land in a TestBackend.
#[test]
fn headless_quiz_passes_through_event_loop() {
    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(TestEventSource::new(rx), FixedTicker::from_millis(5));
    let mut app = App::new(
        Catalog::embedded().unwrap(),
        memory_services(),
        request(1, 1, 3),
    );

    // key for quiz 3 is [1, 0, 2]
    for code in [
        KeyCode::Char('2'),
        KeyCode::Right,
        KeyCode::Char('1'),
        KeyCode::Right,
        KeyCode::Char('3'),
        KeyCode::Char('s'),
    ] {
        tx.send(key(code)).unwrap();
    }
    tx.send(QuizEvent::Resize).unwrap();
    tx.send(key(KeyCode::Esc)).unwrap();

    let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
    app.run(&mut terminal, &runner).unwrap();

    assert_eq!(app.state, AppState::Results);
    let flow = app.flow.as_ref().unwrap();
    let result = flow.session().result().unwrap();
    assert!(result.passed);
    assert_eq!(result.score.rounded(), 100);

    let enrollment = app.services.enrollments.get_for_user(1, 1).unwrap();
    assert_eq!(
        enrollment.completed_lessons.iter().copied().collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(enrollment.progress, 75.0);

    let text = buffer_text(&terminal);
    assert!(text.contains("Congratulations!"));
    assert!(text.contains("Quiz passed!"));
}

#[test]
fn headless_failed_quiz_leaves_enrollment_alone() {
    // 3 questions keyed [0, 1, 2], answered [0, 1, 1]
    let questions = vec![question(0), question(1), question(2)];
    let mut session = QuizSession::new(questions, SessionConfig::default()).unwrap();
    session.select_answer(0, 0).unwrap();
    session.select_answer(1, 1).unwrap();
    session.select_answer(2, 1).unwrap();

    let result = session.submit(SubmitReason::Manual).unwrap();
    assert!((result.score.percent - 66.666).abs() < 0.01);
    assert!(!result.passed);

    let catalog = Catalog::embedded().unwrap();
    let mut services = memory_services();
    let mut flow = QuizFlow::load(&catalog, &services, &request(1, 1, 3)).unwrap();
    for (q, o) in [1, 0, 0].into_iter().enumerate() {
        flow.session_mut().select_answer(q, o).unwrap();
    }
    assert!(!flow
        .submit(SubmitReason::Manual, &mut services)
        .unwrap()
        .passed);

    let enrollment = services.enrollments.get_for_user(1, 1).unwrap();
    assert!(!enrollment.has_completed(3));
    assert_eq!(enrollment.progress, 50.0);
}

#[test]
fn headless_timer_auto_submits_partial_answers() {
    let questions = vec![question(0), question(1), question(2)];
    let mut session = QuizSession::new(
        questions,
        SessionConfig {
            passing_score: 70,
            time_limit: Some(Duration::from_secs(60)),
        },
    )
    .unwrap();
    session.select_answer(0, 0).unwrap();

    let (_tx, rx) = mpsc::channel();
    let runner = Runner::new(TestEventSource::new(rx), FixedTicker::from_millis(1));

    // every tick counts as one second of quiz time
    let mut ticks = 0;
    let result = loop {
        assert!(ticks < 100, "timer never expired");
        if let QuizEvent::Tick = runner.step() {
            ticks += 1;
            if let Some(result) = session.tick(Duration::from_secs(1)) {
                break result;
            }
        }
    };

    assert_eq!(ticks, 60);
    assert_eq!(result.reason, SubmitReason::TimeExpired);
    assert_eq!(result.score.correct, 1);
    assert_eq!(result.elapsed, Duration::from_secs(60));
    assert!(session.submit(SubmitReason::Manual).is_none());
}

#[test]
fn headless_pass_persists_in_sqlite_once() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("tenta.db");
    let catalog = Catalog::embedded().unwrap();

    let mut store = SqliteEnrollmentStore::open(&db).unwrap();
    store.seed(&fixture_enrollments(None).unwrap()).unwrap();
    let mut services = Services::new(Box::new(store), Some(AttemptLog::open(&db).unwrap()));

    let mut flow = QuizFlow::load(&catalog, &services, &request(1, 2, 7)).unwrap();
    for (q, o) in [2, 1, 0, 3].into_iter().enumerate() {
        flow.session_mut().select_answer(q, o).unwrap();
    }
    assert!(flow
        .submit(SubmitReason::Manual, &mut services)
        .unwrap()
        .passed);
    let first = flow.enrollment().clone();
    assert!(first.has_completed(7));

    flow.retake();
    for (q, o) in [2, 1, 0, 3].into_iter().enumerate() {
        flow.session_mut().select_answer(q, o).unwrap();
    }
    flow.submit(SubmitReason::Manual, &mut services);
    drop(services);

    let reopened = SqliteEnrollmentStore::open(&db).unwrap();
    let stored = reopened.get_for_user(1, 2).unwrap();
    assert_eq!(stored, first);
    assert!((stored.progress - 100.0 / 3.0).abs() < 1e-9);

    let history = AttemptLog::open(&db).unwrap();
    assert_eq!(history.for_quiz(1, 7).unwrap().len(), 2);
}

#[test]
fn headless_not_enrolled_shows_error_screen() {
    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(TestEventSource::new(rx), FixedTicker::from_millis(5));
    let mut app = App::new(
        Catalog::embedded().unwrap(),
        memory_services(),
        request(1, 3, 9),
    );
    assert_eq!(app.state, AppState::Error);

    tx.send(key(KeyCode::Char('r'))).unwrap();
    tx.send(key(KeyCode::Esc)).unwrap();
    let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
    app.run(&mut terminal, &runner).unwrap();

    assert_eq!(app.state, AppState::Error);
    assert!(buffer_text(&terminal).contains("not enrolled"));
}
