//! Property tests: sibling ordering stays dense and unique, and
//! created-then-deleted entities never produce remote calls.

use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

use quill_core::Studio;
use quill_core::model::WorkKind;
use quill_sim::{SimBackend, SimOp};

fn shuffled(n: usize) -> impl Strategy<Value = Vec<usize>> {
    Just((0..n).collect::<Vec<_>>()).prop_shuffle()
}

fn offline_session() -> Studio {
    Studio::new(Arc::new(SimBackend::signed_in("acct-1", "mara@example.com")))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn reorder_always_yields_dense_unique_indices(perm in (1usize..8).prop_flat_map(shuffled)) {
        let studio = offline_session();
        let work = studio.create_work("W", WorkKind::Plot);
        let episode = studio.create_episode(work, "E").expect("work exists");
        let ids: Vec<_> = (0..perm.len())
            .map(|i| studio.create_plot(episode, format!("p{i}")).expect("episode exists"))
            .collect();

        let order: Vec<_> = perm.iter().map(|&pos| ids[pos]).collect();
        studio.reorder_plots(episode, &order).expect("valid permutation");

        let store = studio.store();
        let indices: Vec<_> = store.plots_of(episode).iter().map(|p| p.order_index).collect();
        let expected: Vec<i64> = (0..indices.len()).map(|i| i64::try_from(i).expect("small")).collect();
        prop_assert_eq!(indices, expected, "dense, no gaps, no duplicates");

        let bucket_order: Vec<_> = store.plots_of(episode).iter().map(|p| p.id).collect();
        prop_assert_eq!(bucket_order, order, "bucket follows the requested order");
    }

    #[test]
    fn appends_after_gapped_deletes_keep_indices_unique(
        n in 2usize..8,
        kill in any::<usize>(),
        extra in 1usize..4,
    ) {
        let studio = offline_session();
        let work = studio.create_work("W", WorkKind::Plot);
        let episode = studio.create_episode(work, "E").expect("work exists");
        let ids: Vec<_> = (0..n)
            .map(|i| studio.create_plot(episode, format!("p{i}")).expect("episode exists"))
            .collect();

        // Deleting from the middle leaves a gap; appends must not collide.
        studio.delete_plot(ids[kill % n]).expect("plot exists");
        for i in 0..extra {
            studio.create_plot(episode, format!("late{i}")).expect("episode exists");
        }

        let store = studio.store();
        let indices: Vec<_> = store.plots_of(episode).iter().map(|p| p.order_index).collect();
        let unique: BTreeSet<_> = indices.iter().copied().collect();
        prop_assert_eq!(unique.len(), indices.len(), "order indices stay unique");
    }

    #[test]
    fn deleted_pending_creates_never_reach_the_server(
        delete_mask in proptest::collection::vec(any::<bool>(), 1..10),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime");
        runtime.block_on(async {
            let backend = Arc::new(SimBackend::signed_in("acct-1", "mara@example.com"));
            let studio = Studio::new(backend.clone());
            studio.refresh_user().await;

            let work = studio.create_work("W", WorkKind::Plot);
            let episode = studio.create_episode(work, "E").expect("work exists");
            let ids: Vec<_> = (0..delete_mask.len())
                .map(|i| studio.create_plot(episode, format!("p{i}")).expect("episode exists"))
                .collect();
            let doomed: Vec<_> = ids
                .iter()
                .zip(&delete_mask)
                .filter(|&(_, &kill)| kill)
                .map(|(&id, _)| id)
                .collect();
            for &id in &doomed {
                studio.delete_plot(id).expect("plot exists");
            }

            studio.save_all().await.expect("save succeeds");

            let log = backend.mutation_log();
            for op in &log {
                if let Some(id) = op.id() {
                    prop_assert!(
                        !doomed.contains(&id),
                        "annihilated id {} produced a remote call",
                        id
                    );
                }
            }
            let created = log
                .iter()
                .filter(|op| matches!(op, SimOp::CreatePlot(_)))
                .count();
            prop_assert_eq!(created, ids.len() - doomed.len());
            Ok(())
        })?;
    }
}
