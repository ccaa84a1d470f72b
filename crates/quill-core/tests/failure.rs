//! Failure-path behavior: the auth gate, queue preservation across failed
//! saves, idempotent retries, single-flight, and offline-first loads.

use std::sync::Arc;

use quill_core::model::{Character, Episode, Plot, Work, WorkKind};
use quill_core::remote::OpAction;
use quill_core::{EntityKind, ErrorCode, SaveError, SaveOutcome, SelectError, Studio};
use quill_sim::{SimBackend, SimOp};

fn session() -> (Arc<SimBackend>, Studio) {
    let backend = Arc::new(SimBackend::signed_in("acct-1", "mara@example.com"));
    let studio = Studio::new(backend.clone());
    (backend, studio)
}

fn init_logs() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn durable_work(id: i64, title: &str) -> Work {
    Work::new(id, title, WorkKind::Plot, chrono::Utc::now())
}

#[tokio::test]
async fn save_while_signed_out_is_rejected_before_any_remote_call() {
    let backend = Arc::new(SimBackend::new());
    let studio = Studio::new(backend.clone());
    studio.refresh_user().await;

    studio.create_work("offline draft", WorkKind::Novel);
    let err = studio.save_all().await.expect_err("gate must reject");
    assert!(matches!(err, SaveError::NotLoggedIn));
    assert_eq!(err.code(), ErrorCode::NotLoggedIn);
    assert_eq!(backend.mutation_log(), [], "zero remote calls attempted");
    assert!(studio.is_dirty(), "edits are kept for a later save");
}

#[tokio::test]
async fn failed_save_preserves_queues_and_retry_reissues_the_identical_set() {
    init_logs();
    let (backend, studio) = session();
    backend.seed_work(durable_work(1, "W"));
    backend.seed_episode(Episode::new(2, 1, "E1", 0));
    backend.seed_episode(Episode::new(20, 1, "E2", 1));
    backend.seed_plot(Plot::new(3, 2, "P1", 0));
    backend.seed_plot(Plot::new(30, 20, "P2", 0));

    studio.refresh_user().await;
    studio.load_works().await;
    studio.select_work(1).await.expect("clean session");
    studio.select_episode(2).await;
    studio.select_episode(20).await;

    studio.rename_work(1, "W-renamed").expect("work loaded");
    studio.delete_episode(2).expect("episode loaded");
    let character = studio
        .create_character(1, "late arrival", "#555555")
        .expect("work loaded");
    studio
        .set_plot_content(30, "{\"doc\":\"draft\"}")
        .expect("plot loaded");

    backend.fail_when(|op| matches!(op, SimOp::CreateCharacter(_)));
    backend.clear_log();

    let err = studio.save_all().await.expect_err("injected failure");
    match &err {
        SaveError::Remote { op, .. } => {
            assert_eq!(op.kind, EntityKind::Character);
            assert_eq!(op.action, OpAction::Create);
            assert_eq!(op.id, character);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(err.code(), ErrorCode::RemoteRejected);

    // Fail-fast: the attempt stopped at the rejected create; the update
    // and content steps never ran.
    assert_eq!(
        backend.mutation_log(),
        [
            SimOp::DeletePlot(3),
            SimOp::DeleteEpisode(2),
            SimOp::CreateCharacter(character),
        ]
    );
    assert!(studio.is_dirty(), "queues preserved for retry");
    assert!(!studio.is_saving(), "in-flight flag cleared");

    // The retry recomputes — and re-issues — the identical net set,
    // including the deletes that already landed (assumed idempotent).
    backend.clear_failure();
    backend.clear_log();
    let outcome = studio.save_all().await.expect("retry succeeds");
    assert_eq!(outcome, SaveOutcome::Saved);
    assert_eq!(
        backend.mutation_log(),
        [
            SimOp::DeletePlot(3),
            SimOp::DeleteEpisode(2),
            SimOp::CreateCharacter(character),
            SimOp::UpdateWork(1),
            SimOp::PutContent(30),
        ]
    );
    assert!(!studio.is_dirty());
}

#[tokio::test]
async fn failure_in_the_delete_step_stops_everything_downstream() {
    let (backend, studio) = session();
    backend.seed_work(durable_work(1, "W"));
    backend.seed_character(Character::new(4, 1, "A", "#111111"));

    studio.refresh_user().await;
    studio.load_works().await;
    studio.select_work(1).await.expect("clean session");

    studio.delete_character(4).expect("character loaded");
    studio.rename_work(1, "W2").expect("work loaded");

    backend.fail_when(|op| matches!(op, SimOp::DeleteCharacter(_)));
    backend.clear_log();

    studio.save_all().await.expect_err("delete fails");
    assert_eq!(backend.mutation_log(), [SimOp::DeleteCharacter(4)]);
    assert!(studio.is_dirty());
}

#[tokio::test]
async fn second_save_while_one_is_parked_is_a_no_op() {
    let (backend, studio) = session();
    studio.refresh_user().await;
    let work = studio.create_work("W", WorkKind::Plot);

    backend.pause_when(|op| matches!(op, SimOp::CreateWork(_)));
    let first = studio.save_all();
    tokio::pin!(first);
    assert!(
        futures::poll!(first.as_mut()).is_pending(),
        "save parks on the paused create"
    );
    assert!(studio.is_saving());

    let second = studio.save_all().await.expect("overlapping call is a no-op");
    assert_eq!(second, SaveOutcome::InFlight);
    assert!(studio.is_dirty(), "the no-op call left the queues alone");

    backend.clear_pause();
    let outcome = first.await.expect("released save completes");
    assert_eq!(outcome, SaveOutcome::Saved);
    assert!(!studio.is_saving());
    assert_eq!(backend.mutation_log(), [SimOp::CreateWork(work)]);
}

#[tokio::test]
async fn bucket_load_failure_degrades_to_an_empty_bucket() {
    init_logs();
    let (backend, studio) = session();
    backend.seed_work(durable_work(1, "W"));
    backend.seed_episode(Episode::new(2, 1, "E1", 0));

    studio.refresh_user().await;
    studio.load_works().await;

    backend.fail_when(|op| matches!(op, SimOp::ListEpisodes(_)));
    studio.select_work(1).await.expect("load failure is not an error");
    assert!(studio.store().episodes_of(1).is_empty());

    // A later successful load repopulates.
    backend.clear_failure();
    studio.load_episodes(1).await;
    assert_eq!(studio.store().episodes_of(1).len(), 1);
}

#[tokio::test]
async fn switching_works_while_dirty_requires_an_explicit_discard() {
    let (backend, studio) = session();
    backend.seed_work(durable_work(1, "W1"));
    backend.seed_work(durable_work(2, "W2"));

    studio.refresh_user().await;
    studio.load_works().await;
    studio.select_work(1).await.expect("clean session");

    let draft = studio.create_work("unsaved draft", WorkKind::Novel);
    let err = studio.select_work(2).await.expect_err("dirty session");
    assert_eq!(err, SelectError::UnsavedChanges);
    assert_eq!(err.code(), ErrorCode::UnsavedChanges);
    assert_eq!(studio.selection().work, Some(1), "selection unchanged");

    studio.discard_and_select_work(2).await;
    assert_eq!(studio.selection().work, Some(2));
    assert!(!studio.is_dirty());
    assert!(
        studio.store().work(draft).is_none(),
        "unsaved local work erased by the reload"
    );

    // Nothing left to save.
    backend.clear_log();
    studio.save_all().await.expect("clean save");
    assert_eq!(backend.mutation_log(), []);
}

#[tokio::test]
async fn dirty_body_is_not_clobbered_by_a_content_load() {
    let (backend, studio) = session();
    backend.seed_work(durable_work(1, "W"));
    backend.seed_episode(Episode::new(2, 1, "E", 0));
    let mut plot = Plot::new(3, 2, "P", 0);
    plot.content = "{\"doc\":\"server copy\"}".to_string();
    backend.seed_plot(plot);

    studio.refresh_user().await;
    studio.load_works().await;
    studio.select_work(1).await.expect("clean session");
    studio.select_episode(2).await;

    studio
        .set_plot_content(3, "{\"doc\":\"local edit\"}")
        .expect("plot loaded");
    let body = studio.load_plot_content(3).await;
    assert_eq!(body, "{\"doc\":\"local edit\"}", "local edit wins");
}
