use strata::errors::{ErrorKind, StrataError};
use strata::gallery::{GROUPS_ID, PHOTOS_ID};
use strata::migration::{CollectionRef, MigrationEngine, MigrationStep, Operation, StepOutcome, Target, Transform};
use strata::schema::{FieldSpec, Rule, RuleKind, RulePatch};
use strata::store::SchemaStore;
use strata::Version;
use strata_int_test::test_util::{cleanup, create_test_context, run_test, ConcurrentWriterStore, TestContext};

fn photos() -> CollectionRef {
    CollectionRef::any_of([PHOTOS_ID, "photos"])
}

fn add_exif() -> MigrationStep {
    MigrationStep::new(
        1,
        "add_exif",
        vec![Operation::add_field(photos(), 9, FieldSpec::json("json1111111111", "exif"))],
    )
    .with_down(vec![Operation::remove_field(photos(), "json1111111111")])
}

fn lock_stacks(collection: CollectionRef) -> MigrationStep {
    MigrationStep::new(
        2,
        "lock_stacks",
        vec![Operation::set_rules(
            collection,
            RulePatch::new().with(RuleKind::Delete, Rule::Nobody),
        )],
    )
}

fn add_sort_order() -> MigrationStep {
    MigrationStep::new(
        3,
        "added_sort_order",
        vec![Operation::add_field(
            photos(),
            7,
            FieldSpec::number("number5043921187", "sortOrder"),
        )],
    )
    .with_down(vec![Operation::remove_field(photos(), "number5043921187")])
}

fn applied(ctx: &TestContext) -> Vec<u64> {
    ctx.ledger()
        .applied_versions()
        .unwrap()
        .into_iter()
        .map(|version| version.value())
        .collect()
}

// ==================== Stop on First Failure ====================

#[test]
fn test_failure_keeps_earlier_steps_and_halts() {
    run_test(
        create_test_context,
        |ctx| {
            let engine = ctx.engine(vec![
                add_exif(),
                lock_stacks(CollectionRef::named("stacks")),
                add_sort_order(),
            ])?;

            let report = engine.upgrade(Target::Latest)?;
            assert!(!report.is_success());
            assert_eq!(report.planned.len(), 3);
            assert_eq!(report.committed_versions(), vec![Version::new(1)]);

            let failure = report.failure.as_ref().unwrap();
            assert_eq!(failure.step.version, Version::new(2));
            assert_eq!(failure.error.kind(), &ErrorKind::NotFound);

            assert_eq!(applied(&ctx), vec![1]);
            let photos = ctx.store().find_collection(PHOTOS_ID)?;
            assert!(photos.get_field_by_name("exif").is_some());
            assert!(photos.get_field_by_name("sortOrder").is_none());

            let err = report.into_result().unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::StepFailed);
            assert_eq!(err.root_cause().kind(), &ErrorKind::NotFound);
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_rerun_after_fix_resumes_at_failed_step() {
    run_test(
        create_test_context,
        |ctx| {
            let broken = ctx.engine(vec![
                add_exif(),
                lock_stacks(CollectionRef::named("stacks")),
                add_sort_order(),
            ])?;
            assert!(!broken.upgrade(Target::Latest)?.is_success());
            drop(broken);

            let fixed = ctx.engine(vec![
                add_exif(),
                lock_stacks(CollectionRef::any_of(["stacks", GROUPS_ID])),
                add_sort_order(),
            ])?;
            let report = fixed.upgrade(Target::Latest)?.into_result()?;
            assert_eq!(
                report.committed_versions(),
                vec![Version::new(2), Version::new(3)]
            );
            assert_eq!(applied(&ctx), vec![1, 2, 3]);

            let photos = ctx.store().find_collection(PHOTOS_ID)?;
            assert_eq!(photos.fields.iter().filter(|f| f.name == "exif").count(), 1);
            assert_eq!(photos.field_position("number5043921187"), Some(7));
            assert_eq!(ctx.store().find_collection(GROUPS_ID)?.rules.delete, Rule::Nobody);
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_failed_downgrade_keeps_remaining_entries() {
    run_test(
        create_test_context,
        |ctx| {
            let failing_down = MigrationStep::new(2, "flaky_down", Vec::<Operation>::new())
                .with_down(Transform::custom(|_| {
                    Err(StrataError::new("admin API unavailable", ErrorKind::BackendError))
                }));
            let engine = ctx.engine(vec![add_exif(), failing_down, add_sort_order()])?;
            engine.upgrade(Target::Latest)?.into_result()?;

            let report = engine.downgrade(Version::INITIAL)?;
            assert_eq!(report.committed_versions(), vec![Version::new(3)]);
            assert_eq!(report.failure.as_ref().unwrap().step.version, Version::new(2));
            assert_eq!(applied(&ctx), vec![1, 2]);
            let photos = ctx.store().find_collection(PHOTOS_ID)?;
            assert!(photos.get_field_by_name("sortOrder").is_none());
            assert!(photos.get_field_by_name("exif").is_some());
            Ok(())
        },
        cleanup,
    );
}

// ==================== Guarded vs Unguarded Lookups ====================

#[test]
fn test_unguarded_missing_collection_is_not_found() {
    run_test(
        create_test_context,
        |ctx| {
            let step = MigrationStep::new(
                1,
                "drop_legacy",
                vec![Operation::delete_collection(CollectionRef::named("legacy_photos"))],
            );
            let report = ctx.engine(vec![step])?.upgrade(Target::Latest)?;
            let failure = report.failure.unwrap();
            assert!(failure.error.is_not_found());
            assert!(failure.error.message().contains("legacy_photos"));
            assert!(ctx.ledger().entries()?.is_empty());
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_guarded_missing_collection_is_skipped() {
    run_test(
        create_test_context,
        |ctx| {
            let step = MigrationStep::new(
                1,
                "drop_legacy",
                vec![Operation::delete_collection(
                    CollectionRef::named("legacy_photos").guarded(),
                )],
            );
            let report = ctx.engine(vec![step])?.upgrade(Target::Latest)?.into_result()?;
            assert!(matches!(
                report.committed[0].outcome,
                StepOutcome::Skipped { .. }
            ));
            assert_eq!(applied(&ctx), vec![1]);
            Ok(())
        },
        cleanup,
    );
}

// ==================== Concurrent Modification ====================

#[test]
fn test_concurrent_edit_is_conflict_and_not_recorded() {
    run_test(
        create_test_context,
        |ctx| {
            let racing = ConcurrentWriterStore::new(ctx.store(), PHOTOS_ID);
            let interference = racing.interference();
            let engine = MigrationEngine::builder()
                .schema_store(SchemaStore::new(racing))
                .ledger(ctx.ledger())
                .add_step(add_exif())
                .build()?;

            let report = engine.upgrade(Target::Latest)?;
            assert_eq!(*interference.lock(), 1);
            let failure = report.failure.as_ref().unwrap();
            assert_eq!(failure.error.kind(), &ErrorKind::Conflict);
            assert!(report.committed.is_empty());
            assert!(ctx.ledger().entries()?.is_empty());
            assert!(ctx
                .store()
                .find_collection(PHOTOS_ID)?
                .get_field_by_name("exif")
                .is_none());

            // the competing write is done; a rerun reads the fresh revision
            let report = engine.upgrade(Target::Latest)?.into_result()?;
            assert_eq!(report.committed_versions(), vec![Version::new(1)]);
            assert_eq!(*interference.lock(), 1);
            assert_eq!(applied(&ctx), vec![1]);
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_stale_custom_save_is_conflict() {
    run_test(
        create_test_context,
        |ctx| {
            let step = MigrationStep::new(
                1,
                "rename_photos_twice",
                Transform::custom(|store| {
                    let mut stale = store.find_collection(PHOTOS_ID)?;
                    let mut fresh = stale.clone();
                    fresh.name = "pictures".to_string();
                    store.save(&fresh)?;
                    stale.name = "images".to_string();
                    store.save(&stale)?;
                    Ok(StepOutcome::Applied)
                }),
            );
            let report = ctx.engine(vec![step])?.upgrade(Target::Latest)?;
            assert_eq!(report.failure.unwrap().error.kind(), &ErrorKind::Conflict);
            assert_eq!(ctx.store().find_collection(PHOTOS_ID)?.name, "pictures");
            assert!(ctx.ledger().entries()?.is_empty());
            Ok(())
        },
        cleanup,
    );
}
