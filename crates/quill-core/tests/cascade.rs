//! Cascading-delete accounting: store contents, net delete sets, ordering,
//! and selection cleanup, including mixed durable/pending-create trees.

use std::sync::Arc;

use quill_core::model::{Character, Episode, Plot, Relation, Work, WorkKind};
use quill_core::Studio;
use quill_sim::{SimBackend, SimOp};

fn session() -> (Arc<SimBackend>, Studio) {
    let backend = Arc::new(SimBackend::signed_in("acct-1", "mara@example.com"));
    let studio = Studio::new(backend.clone());
    (backend, studio)
}

fn durable_work(id: i64, title: &str) -> Work {
    Work::new(id, title, WorkKind::Plot, chrono::Utc::now())
}

/// Seed a durable work with 2 episodes x 2 plots, 3 characters, and 2
/// relations among them, then load it into a session.
async fn loaded_tree(backend: &Arc<SimBackend>, studio: &Studio) {
    backend.seed_work(durable_work(1, "W"));
    backend.seed_episode(Episode::new(10, 1, "E1", 0));
    backend.seed_episode(Episode::new(11, 1, "E2", 1));
    backend.seed_plot(Plot::new(100, 10, "P1", 0));
    backend.seed_plot(Plot::new(101, 10, "P2", 1));
    backend.seed_plot(Plot::new(110, 11, "P3", 0));
    backend.seed_plot(Plot::new(111, 11, "P4", 1));
    backend.seed_character(Character::new(20, 1, "A", "#111111"));
    backend.seed_character(Character::new(21, 1, "B", "#222222"));
    backend.seed_character(Character::new(22, 1, "C", "#333333"));
    backend.seed_relation(1, Relation::new(30, 20, 21, "rival of"));
    backend.seed_relation(1, Relation::new(31, 22, 20, "parent of"));

    studio.refresh_user().await;
    studio.load_works().await;
    studio.select_work(1).await.expect("clean session");
    studio.select_episode(10).await;
    studio.select_episode(11).await;
}

#[tokio::test]
async fn deleting_a_work_empties_the_store_and_deletes_child_first() {
    let (backend, studio) = session();
    loaded_tree(&backend, &studio).await;

    studio.delete_work(1).expect("work loaded");

    {
        let store = studio.store();
        assert!(store.works().is_empty());
        assert!(store.episodes_of(1).is_empty());
        assert!(store.plots_of(10).is_empty());
        assert!(store.plots_of(11).is_empty());
        assert!(store.characters_of(1).is_empty());
        assert!(store.relations().is_empty());
    }

    studio.save_all().await.expect("save should succeed");
    let log = backend.mutation_log();
    assert_eq!(
        log,
        [
            SimOp::DeleteRelation(30),
            SimOp::DeleteRelation(31),
            SimOp::DeleteCharacter(20),
            SimOp::DeleteCharacter(21),
            SimOp::DeleteCharacter(22),
            SimOp::DeletePlot(100),
            SimOp::DeletePlot(101),
            SimOp::DeletePlot(110),
            SimOp::DeletePlot(111),
            SimOp::DeleteEpisode(10),
            SimOp::DeleteEpisode(11),
            SimOp::DeleteWork(1),
        ]
    );
    assert_eq!(backend.work(1), None);
    assert_eq!(backend.relation(30), None);
}

#[tokio::test]
async fn pending_create_descendants_are_annihilated_not_deleted_remotely() {
    let (backend, studio) = session();
    loaded_tree(&backend, &studio).await;

    // Grow the tree with unsaved entities.
    let new_episode = studio.create_episode(1, "E3").expect("work loaded");
    let new_plot = studio.create_plot(new_episode, "P5").expect("episode");
    let new_character = studio.create_character(1, "D", "#444444").expect("work");
    let new_relation = studio
        .create_relation(new_character, 20, "shadow of")
        .expect("same work");

    studio.delete_work(1).expect("work loaded");
    studio.save_all().await.expect("save should succeed");

    let log = backend.mutation_log();
    // Only durable ids reach the server.
    for op in &log {
        let id = op.id().expect("every delete addresses an id");
        assert!(
            ![new_episode, new_plot, new_character, new_relation].contains(&id),
            "pending-create id {id} must not produce a remote call"
        );
    }
    assert_eq!(log.len(), 12, "same delete set as the all-durable tree");
}

#[tokio::test]
async fn deleting_an_episode_cascades_to_its_plots_only() {
    let (backend, studio) = session();
    loaded_tree(&backend, &studio).await;

    studio.delete_episode(10).expect("episode loaded");

    {
        let store = studio.store();
        assert!(store.plots_of(10).is_empty());
        assert_eq!(store.plots_of(11).len(), 2, "sibling episode untouched");
        assert_eq!(store.characters_of(1).len(), 3, "characters untouched");
    }

    studio.save_all().await.expect("save should succeed");
    assert_eq!(
        backend.mutation_log(),
        [
            SimOp::DeletePlot(100),
            SimOp::DeletePlot(101),
            SimOp::DeleteEpisode(10),
        ]
    );
}

#[tokio::test]
async fn deleting_a_character_removes_relations_on_both_ends() {
    let (backend, studio) = session();
    loaded_tree(&backend, &studio).await;

    // Character 20 is source of relation 30 and target of relation 31.
    studio.delete_character(20).expect("character loaded");

    {
        let store = studio.store();
        assert!(store.relations_touching(20).is_empty());
        assert_eq!(store.characters_of(1).len(), 2);
        assert!(store.relations().is_empty());
    }

    studio.save_all().await.expect("save should succeed");
    assert_eq!(
        backend.mutation_log(),
        [
            SimOp::DeleteRelation(30),
            SimOp::DeleteRelation(31),
            SimOp::DeleteCharacter(20),
        ]
    );
}

#[tokio::test]
async fn deletes_clear_matching_selection_entries() {
    let (backend, studio) = session();
    loaded_tree(&backend, &studio).await;

    studio.select_plot(100, false);
    studio.select_plot(101, true);
    studio.select_character(Some(20));
    assert_eq!(studio.selection().plots, [100, 101]);

    studio.delete_plot(100).expect("plot loaded");
    assert_eq!(studio.selection().plots, [101]);

    studio.delete_character(20).expect("character loaded");
    assert_eq!(studio.selection().character, None);

    studio.delete_work(1).expect("work loaded");
    let selection = studio.selection();
    assert_eq!(selection.work, None);
    assert_eq!(selection.episode, None);
    assert!(selection.plots.is_empty());
}

#[tokio::test]
async fn dirty_plot_bodies_die_with_their_work() {
    let (backend, studio) = session();
    loaded_tree(&backend, &studio).await;

    studio
        .set_plot_content(100, "{\"doc\":\"unsaved\"}")
        .expect("plot loaded");
    studio.delete_work(1).expect("work loaded");
    studio.save_all().await.expect("save should succeed");

    let log = backend.mutation_log();
    assert!(
        !log.contains(&SimOp::PutContent(100)),
        "deleted plot must not get a content put"
    );
}
