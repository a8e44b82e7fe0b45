//! Score population end to end over a tempdir store

mod helpers;

use helpers::*;
use langtrends_common::time::is_first_of_month;
use langtrends_data::services::PopulateError;
use std::collections::HashSet;
use std::sync::Arc;

const LANGUAGES: [(&str, Option<&str>); 5] = [
    ("JavaScript", None),
    ("Python", None),
    ("Java", None),
    ("C#", None),
    ("Emacs Lisp", Some("elisp")),
];

fn busy_providers() -> (RateProvider, RateProvider) {
    let repositories = RateProvider::new("GitHub")
        .with_rate("JavaScript", 30_000)
        .with_rate("Python", 28_000)
        .with_rate("Java", 15_000)
        .with_rate("C#", 9_000)
        .with_rate("Emacs Lisp", 1_200);
    let questions = RateProvider::new("Stack Overflow")
        .with_rate("JavaScript", 9_000)
        .with_rate("Python", 11_000)
        .with_rate("Java", 5_000)
        .with_rate("C#", 4_000)
        .with_rate("elisp", 40);
    (repositories, questions)
}

fn names() -> Vec<String> {
    LANGUAGES.iter().map(|(name, _)| name.to_string()).collect()
}

#[tokio::test]
async fn test_bounded_run_from_2023() {
    let env = TestEnv::new();
    let (repositories, questions) = busy_providers();
    let mut populator = test_populator(
        &env,
        metadata_for(&LANGUAGES),
        names(),
        ymd(2023, 1, 1),
        ymd(2026, 10, 1),
        Arc::new(repositories),
        Arc::new(questions),
    );

    populator.populate_languages(None).await.unwrap();
    let added = populator.populate_all_scores(Some(10)).await.unwrap();

    let scores = env.scores();
    assert_eq!(added, 10);
    assert_eq!(scores.len(), 10);
    assert_eq!(scores.iter().map(|s| s.date).min(), Some(ymd(2023, 1, 1)));
    assert!(scores.iter().all(|s| s.points > 1000));
}

#[tokio::test]
async fn test_second_run_adds_nothing() {
    let env = TestEnv::new();
    let (repositories, questions) = busy_providers();
    let repositories = Arc::new(repositories);
    let mut populator = test_populator(
        &env,
        metadata_for(&LANGUAGES),
        names(),
        ymd(2023, 1, 1),
        ymd(2023, 6, 1),
        repositories.clone(),
        Arc::new(questions),
    );

    populator.populate_languages(None).await.unwrap();
    assert_eq!(populator.populate_all_scores(None).await.unwrap(), 30);
    let first_run = std::fs::read_to_string(env.store.scores_file()).unwrap();
    let calls = repositories.calls();

    assert_eq!(populator.populate_all_scores(None).await.unwrap(), 0);
    assert_eq!(repositories.calls(), calls);
    assert_eq!(
        std::fs::read_to_string(env.store.scores_file()).unwrap(),
        first_run
    );
}

#[tokio::test]
async fn test_persisted_scores_are_unique_aligned_and_sorted() {
    let env = TestEnv::new();
    let (repositories, questions) = busy_providers();
    let mut populator = test_populator(
        &env,
        metadata_for(&LANGUAGES),
        names(),
        ymd(2022, 11, 1),
        ymd(2023, 3, 1),
        Arc::new(repositories),
        Arc::new(questions),
    );

    populator.populate_languages(None).await.unwrap();
    // Budget stops part-way through a month; the next run finishes it
    populator.populate_all_scores(Some(7)).await.unwrap();
    populator.populate_all_scores(None).await.unwrap();

    let scores = env.scores();
    assert_eq!(scores.len(), 25);

    let keys: HashSet<_> = scores.iter().map(|s| (s.date, s.language_id)).collect();
    assert_eq!(keys.len(), scores.len());
    assert!(scores.iter().all(|s| is_first_of_month(s.date)));
    assert!(scores
        .windows(2)
        .all(|w| (w[0].date, w[0].language_id) < (w[1].date, w[1].language_id)));
}

#[tokio::test]
async fn test_regression_fails_but_keeps_partial_progress() {
    let env = TestEnv::new();
    // Java (id 2) reports half of its stored total over the full window
    let repositories = RateProvider::new("GitHub")
        .with_rate("JavaScript", 30_000)
        .with_rate("Java", 50)
        .with_window("Java", ymd(2022, 12, 1), ymd(2023, 2, 1), 10_000);
    let questions = RateProvider::new("Stack Overflow").with_rate("JavaScript", 9_000);
    let mut populator = test_populator(
        &env,
        metadata_for(&[("JavaScript", None), ("Java", None)]),
        language_names(&["JavaScript", "Java"]),
        ymd(2022, 12, 1),
        ymd(2023, 2, 1),
        Arc::new(repositories),
        Arc::new(questions),
    );
    populator.populate_languages(None).await.unwrap();
    write_scores(
        &env,
        &[
            (ymd(2022, 12, 1), 1, 39_000),
            (ymd(2022, 12, 1), 2, 19_000),
            (ymd(2023, 1, 1), 1, 78_000),
            (ymd(2023, 1, 1), 2, 20_000),
        ],
    );

    let failure = populator.populate_all_scores(None).await.unwrap_err();

    assert!(matches!(failure.source, PopulateError::Regression { .. }));
    assert!(failure.to_string().contains("decreased"));
    assert!(failure.to_string().contains("Java"));
    assert_eq!(failure.scores_added, 1);

    let scores = env.scores();
    assert_eq!(scores.len(), 5);
    assert!(scores
        .iter()
        .any(|s| s.date == ymd(2023, 2, 1) && s.language_id == 1 && s.points == 117_000));
}

#[tokio::test]
async fn test_terminal_provider_error_persists_progress() {
    let env = TestEnv::new();
    let (repositories, questions) = busy_providers();
    let repositories = repositories.with_quota(7);
    let mut populator = test_populator(
        &env,
        metadata_for(&LANGUAGES),
        names(),
        ymd(2023, 1, 1),
        ymd(2023, 12, 1),
        Arc::new(repositories),
        Arc::new(questions),
    );
    populator.populate_languages(None).await.unwrap();

    let failure = populator.populate_all_scores(None).await.unwrap_err();

    assert!(failure.to_string().contains("GitHub API quota exhausted"));
    // Quota 7 answers six queries; the seventh returns 0 remaining
    assert_eq!(failure.scores_added, 6);
    assert_eq!(env.scores().len(), 6);
}

#[tokio::test]
async fn test_failed_write_keeps_the_walk_error() {
    let env = TestEnv::new();
    let (repositories, questions) = busy_providers();
    let mut populator = test_populator(
        &env,
        metadata_for(&LANGUAGES),
        names(),
        ymd(2023, 1, 1),
        ymd(2023, 12, 1),
        Arc::new(repositories.with_quota(7)),
        Arc::new(questions),
    );
    populator.populate_languages(None).await.unwrap();
    // A directory in place of the temporary file makes the write fail
    let mut temp_path = env.store.scores_file().as_os_str().to_owned();
    temp_path.push(".tmp");
    std::fs::create_dir_all(&temp_path).unwrap();

    let failure = populator.populate_all_scores(None).await.unwrap_err();

    assert!(matches!(failure.source, PopulateError::Provider { .. }));
    assert!(failure.unsaved.is_some());
    assert_eq!(failure.scores_added, 6);
    let message = failure.to_string();
    assert!(message.contains("GitHub API quota exhausted"));
    assert!(message.contains("scores were not saved"));
    assert!(!env.store.scores_file().exists());
}

#[tokio::test]
async fn test_stale_language_is_never_scored() {
    let env = TestEnv::new();
    let (repositories, questions) = busy_providers();
    // Python was tracked earlier but has since left the live catalog
    let live = language_names(&["JavaScript", "Java"]);
    let mut populator = test_populator(
        &env,
        metadata_for(&LANGUAGES),
        live,
        ymd(2023, 1, 1),
        ymd(2023, 3, 1),
        Arc::new(repositories),
        Arc::new(questions),
    );
    env.store
        .write_languages(&[
            langtrends_data::models::Language::new(1, "JavaScript"),
            langtrends_data::models::Language::new(2, "Python"),
            langtrends_data::models::Language::new(3, "Java"),
        ])
        .unwrap();

    let added = populator.populate_all_scores(None).await.unwrap();

    assert_eq!(added, 6);
    assert!(env.scores().iter().all(|s| s.language_id != 2));
}

#[tokio::test]
async fn test_malformed_scores_file_is_an_error() {
    let env = TestEnv::new();
    let (repositories, questions) = busy_providers();
    let mut populator = test_populator(
        &env,
        metadata_for(&LANGUAGES),
        names(),
        ymd(2023, 1, 1),
        ymd(2023, 3, 1),
        Arc::new(repositories),
        Arc::new(questions),
    );
    populator.populate_languages(None).await.unwrap();
    std::fs::write(env.store.scores_file(), "[{\"date\": ").unwrap();

    let failure = populator.populate_all_scores(None).await.unwrap_err();

    assert!(matches!(failure.source, PopulateError::Store(_)));
    assert_eq!(failure.scores_added, 0);
    assert_eq!(
        std::fs::read_to_string(env.store.scores_file()).unwrap(),
        "[{\"date\": "
    );
}
