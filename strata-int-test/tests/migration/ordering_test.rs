use parking_lot::Mutex;
use std::sync::Arc;
use strata::errors::ErrorKind;
use strata::gallery::{ALBUMS_ID, GROUPS_ID, PHOTOS_ID};
use strata::ledger::LedgerEntry;
use strata::migration::{CollectionRef, MigrationStep, Operation, StepOutcome, Target, Transform};
use strata::schema::FieldSpec;
use strata::Version;
use strata_int_test::test_util::{cleanup, create_test_context, run_test, TestContext};

type Trace = Arc<Mutex<Vec<(char, u64)>>>;

/// A step that records `('u', version)` / `('d', version)` when it runs.
fn traced(version: u64, trace: &Trace) -> MigrationStep {
    let up = Arc::clone(trace);
    let down = Arc::clone(trace);
    MigrationStep::new(
        version,
        &format!("step_{}", version),
        Transform::custom(move |_| {
            up.lock().push(('u', version));
            Ok(StepOutcome::Applied)
        }),
    )
    .with_down(Transform::custom(move |_| {
        down.lock().push(('d', version));
        Ok(StepOutcome::Applied)
    }))
}

fn applied(ctx: &TestContext) -> Vec<u64> {
    ctx.ledger()
        .applied_versions()
        .unwrap()
        .into_iter()
        .map(|version| version.value())
        .collect()
}

fn sort_order(collection_id: &str, field_id: &str, position: usize) -> Operation {
    Operation::add_field(
        CollectionRef::named(collection_id),
        position,
        FieldSpec::number(field_id, "sortOrder"),
    )
}

// ==================== Upgrade Ordering ====================

#[test]
fn test_upgrade_applies_pending_in_ascending_order() {
    run_test(
        create_test_context,
        |ctx| {
            let trace: Trace = Arc::default();
            ctx.ledger()
                .record(LedgerEntry::now(Version::new(1768425595), "step_1768425595"))?;

            // registered out of order on purpose
            let engine = ctx.engine(vec![
                traced(1770000003, &trace),
                traced(1768425595, &trace),
                traced(1769000000, &trace),
            ])?;
            let report = engine.upgrade(Target::Version(Version::new(1770000003)))?;
            assert!(report.is_success());
            assert_eq!(*trace.lock(), vec![('u', 1769000000), ('u', 1770000003)]);
            assert_eq!(applied(&ctx), vec![1768425595, 1769000000, 1770000003]);
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_upgrade_to_intermediate_target() {
    run_test(
        create_test_context,
        |ctx| {
            let trace: Trace = Arc::default();
            let engine = ctx.engine(vec![
                traced(10, &trace),
                traced(20, &trace),
                traced(30, &trace),
            ])?;

            engine.upgrade(Version::new(20).into())?.into_result()?;
            assert_eq!(applied(&ctx), vec![10, 20]);

            // a target between versions stops below it
            let report = engine.upgrade(Version::new(25).into())?.into_result()?;
            assert!(report.planned.is_empty());

            engine.upgrade(Target::Latest)?.into_result()?;
            assert_eq!(*trace.lock(), vec![('u', 10), ('u', 20), ('u', 30)]);
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_steps_see_schema_left_by_earlier_steps() {
    run_test(
        create_test_context,
        |ctx| {
            // the second step only works if the first already ran
            let engine = ctx.engine(vec![
                MigrationStep::new(
                    1,
                    "rename_albums",
                    vec![Operation::rename_collection(
                        CollectionRef::named(ALBUMS_ID),
                        "photo_albums",
                    )],
                )
                .with_down(vec![Operation::rename_collection(
                    CollectionRef::named(ALBUMS_ID),
                    "albums",
                )]),
                MigrationStep::new(
                    2,
                    "added_album_sort_order",
                    vec![sort_order("photo_albums", "number1063427325", 5)],
                )
                .with_down(vec![Operation::remove_field(
                    CollectionRef::named("photo_albums"),
                    "number1063427325",
                )]),
            ])?;

            engine.upgrade(Target::Latest)?.into_result()?;
            let albums = ctx.store().find_collection(ALBUMS_ID)?;
            assert_eq!(albums.name, "photo_albums");
            assert_eq!(albums.field_position("number1063427325"), Some(5));

            // reverting in descending order undoes the field before the rename
            engine.downgrade(Version::INITIAL)?.into_result()?;
            let albums = ctx.store().find_collection(ALBUMS_ID)?;
            assert_eq!(albums.name, "albums");
            assert!(albums.get_field_by_id("number1063427325").is_none());
            Ok(())
        },
        cleanup,
    );
}

// ==================== Downgrade Ordering ====================

#[test]
fn test_downgrade_reverts_in_descending_order() {
    run_test(
        create_test_context,
        |ctx| {
            let trace: Trace = Arc::default();
            let engine = ctx.engine(vec![
                traced(10, &trace),
                traced(20, &trace),
                traced(30, &trace),
                traced(40, &trace),
            ])?;
            engine.upgrade(Target::Latest)?.into_result()?;
            trace.lock().clear();

            let report = engine.downgrade(Version::new(20))?.into_result()?;
            assert_eq!(
                report.committed_versions(),
                vec![Version::new(40), Version::new(30)]
            );
            assert_eq!(*trace.lock(), vec![('d', 40), ('d', 30)]);
            assert_eq!(applied(&ctx), vec![10, 20]);
            assert_eq!(ctx.ledger().last_applied()?, Version::new(20));
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_downgrade_at_or_above_current_is_noop() {
    run_test(
        create_test_context,
        |ctx| {
            let trace: Trace = Arc::default();
            let engine = ctx.engine(vec![traced(10, &trace), traced(20, &trace)])?;
            engine.upgrade(Target::Latest)?.into_result()?;

            let report = engine.downgrade(Version::new(20))?.into_result()?;
            assert!(report.planned.is_empty());
            let report = engine.downgrade(Version::new(99))?.into_result()?;
            assert!(report.planned.is_empty());
            assert_eq!(applied(&ctx), vec![10, 20]);
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_downgrade_with_version_outside_catalog_fails_before_any_step() {
    run_test(
        create_test_context,
        |ctx| {
            let trace: Trace = Arc::default();
            ctx.ledger().record(LedgerEntry::now(Version::new(10), "step_10"))?;
            ctx.ledger()
                .record(LedgerEntry::now(Version::new(15), "removed_from_catalog"))?;
            ctx.ledger().record(LedgerEntry::now(Version::new(20), "step_20"))?;
            let engine = ctx.engine(vec![traced(10, &trace), traced(20, &trace)])?;

            let err = engine.downgrade(Version::INITIAL).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::Configuration);
            assert!(err.message().contains("15"));
            assert!(trace.lock().is_empty());
            assert_eq!(applied(&ctx), vec![10, 15, 20]);

            // reverting only above the unknown version is fine
            engine.downgrade(Version::new(15))?.into_result()?;
            assert_eq!(*trace.lock(), vec![('d', 20)]);
            Ok(())
        },
        cleanup,
    );
}

// ==================== Out-of-Order Steps ====================

#[test]
fn test_older_unapplied_step_is_skipped_by_default() {
    run_test(
        create_test_context,
        |ctx| {
            let trace: Trace = Arc::default();
            ctx.ledger().record(LedgerEntry::now(Version::new(30), "step_30"))?;
            let engine = ctx.engine(vec![traced(20, &trace), traced(30, &trace), traced(40, &trace)])?;

            let report = engine.upgrade(Target::Latest)?.into_result()?;
            assert_eq!(report.committed_versions(), vec![Version::new(40)]);
            assert_eq!(*trace.lock(), vec![('u', 40)]);
            assert!(!ctx.ledger().contains(Version::new(20))?);

            let status = engine.status()?;
            let pending: Vec<u64> = status.pending().map(|s| s.step.version.value()).collect();
            assert_eq!(pending, vec![20]);
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_out_of_order_option_applies_older_step() {
    run_test(
        create_test_context,
        |ctx| {
            let trace: Trace = Arc::default();
            ctx.ledger().record(LedgerEntry::now(Version::new(30), "step_30"))?;
            let engine = ctx
                .engine_builder()
                .out_of_order(true)
                .add_steps(vec![traced(20, &trace), traced(30, &trace), traced(40, &trace)])
                .build()?;

            engine.upgrade(Target::Latest)?.into_result()?;
            assert_eq!(*trace.lock(), vec![('u', 20), ('u', 40)]);
            assert_eq!(applied(&ctx), vec![20, 30, 40]);
            Ok(())
        },
        cleanup,
    );
}

// ==================== Catalog Validation ====================

#[test]
fn test_duplicate_versions_fail_before_any_step_runs() {
    run_test(
        create_test_context,
        |ctx| {
            let trace: Trace = Arc::default();
            let before = ctx.store().collections()?;
            let result = ctx.engine(vec![
                traced(1, &trace),
                MigrationStep::new(2, "added_photo_sort_order", vec![sort_order(PHOTOS_ID, "number5043921187", 7)]),
                MigrationStep::new(2, "added_group_sort_order", vec![sort_order(GROUPS_ID, "number5043921188", 6)]),
            ]);

            let err = result.err().unwrap();
            assert_eq!(err.kind(), &ErrorKind::Configuration);
            assert!(trace.lock().is_empty());
            assert!(ctx.ledger().entries()?.is_empty());
            assert_eq!(ctx.store().collections()?, before);
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_malformed_field_fails_at_build() {
    run_test(
        create_test_context,
        |ctx| {
            let result = ctx.engine(vec![MigrationStep::new(
                1,
                "bad_relation",
                vec![Operation::add_field(
                    CollectionRef::named(PHOTOS_ID),
                    4,
                    FieldSpec::relation("relation1219621782", "tags", ""),
                )],
            )]);
            assert_eq!(result.err().unwrap().kind(), &ErrorKind::Configuration);
            Ok(())
        },
        cleanup,
    );
}
