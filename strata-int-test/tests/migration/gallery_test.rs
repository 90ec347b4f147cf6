use serde_json::json;
use std::fs;
use strata::gallery::{self, FAVORITES_ID, GROUPS_ID, PHOTOS_ID, TAGS_ID};
use strata::migration::{StepOutcome, Target};
use strata::schema::{FieldSpec, Rule};
use strata::Version;
use strata_int_test::test_util::{cleanup, create_test_context, create_test_context_with, run_test, TestContext};

fn gallery_engine(ctx: &TestContext) -> strata::errors::StrataResult<strata::migration::MigrationEngine> {
    ctx.engine_builder().catalog(gallery::catalog()?).build()
}

fn thumbs(ctx: &TestContext) -> serde_json::Value {
    ctx.store()
        .find_collection(PHOTOS_ID)
        .unwrap()
        .get_field_by_name("photo")
        .and_then(|field| field.get_option("thumbs"))
        .cloned()
        .unwrap()
}

// ==================== Full Catalog ====================

#[test]
fn test_gallery_upgrade_and_status() {
    run_test(
        create_test_context,
        |ctx| {
            let engine = gallery_engine(&ctx)?;
            let status = engine.status()?;
            assert_eq!(status.current, Version::INITIAL);
            assert_eq!(status.pending().count(), 15);

            let report = engine.upgrade(Target::Latest)?.into_result()?;
            assert_eq!(report.committed.len(), 15);
            assert!(report
                .committed
                .iter()
                .all(|record| record.outcome == StepOutcome::Applied));

            let status = engine.status()?;
            assert_eq!(status.current, Version::new(1770000008));
            assert_eq!(status.applied().count(), 15);
            assert!(status.unknown.is_empty());
            let irreversible: Vec<&str> = status
                .steps
                .iter()
                .filter(|s| !s.reversible)
                .map(|s| s.step.name.as_str())
                .collect();
            assert_eq!(irreversible, vec!["drop_favorites_collection"]);

            let photos = ctx.store().find_collection(PHOTOS_ID)?;
            assert_eq!(photos.fields.len(), 29);
            assert_eq!(thumbs(&ctx), json!(["100x100", "250x250", "500x500", "1200x0"]));
            assert!(ctx.store().find_optional(FAVORITES_ID)?.is_none());
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_gallery_partial_downgrade() {
    run_test(
        create_test_context,
        |ctx| {
            let engine = gallery_engine(&ctx)?;
            engine.upgrade(Target::Latest)?.into_result()?;

            // back to before the photo field was replaced
            let report = engine.downgrade(Version::new(1769454383))?.into_result()?;
            assert_eq!(report.committed.len(), 7);
            assert_eq!(report.committed[0].outcome, StepOutcome::Irreversible);
            assert_eq!(ctx.ledger().last_applied()?, Version::new(1769454383));
            assert_eq!(thumbs(&ctx), json!(["100x100", "500x500", "1200x0"]));

            let groups = ctx.store().find_collection(GROUPS_ID)?;
            assert!(groups.get_field_by_name("sortOrder").is_none());
            assert!(groups.get_field_by_name("album").is_none());
            assert_eq!(groups.rules.update, Rule::Unset);

            // the dropped collection does not come back
            assert!(ctx.store().find_optional(FAVORITES_ID)?.is_none());

            let report = engine.upgrade(Target::Latest)?.into_result()?;
            assert_eq!(report.committed.len(), 7);
            assert!(matches!(
                report.committed.last().unwrap().outcome,
                StepOutcome::Skipped { .. }
            ));
            assert_eq!(ctx.store().find_collection(PHOTOS_ID)?.fields.len(), 29);
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_gallery_full_downgrade_restores_baseline() {
    run_test(
        create_test_context,
        |ctx| {
            let engine = gallery_engine(&ctx)?;
            engine.upgrade(Target::Latest)?.into_result()?;
            engine.downgrade(Version::INITIAL)?.into_result()?;

            assert!(ctx.ledger().entries()?.is_empty());
            for expected in gallery::baseline_schema()
                .into_iter()
                .filter(|collection| collection.id != FAVORITES_ID)
            {
                let actual = ctx.store().find_collection(&expected.id)?;
                assert!(actual.observably_eq(&expected), "{} differs", expected.name);
            }
            Ok(())
        },
        cleanup,
    );
}

// ==================== Environments ====================

#[test]
fn test_gallery_with_existing_tags_field() {
    run_test(
        || {
            let collections = gallery::baseline_schema()
                .into_iter()
                .map(|mut collection| {
                    if collection.id == PHOTOS_ID {
                        collection = collection.with_field(
                            FieldSpec::relation("relation0000000042", "tags", TAGS_ID)
                                .option("maxSelect", 5),
                        );
                    }
                    collection
                })
                .collect();
            create_test_context_with(collections)
        },
        |ctx| {
            let engine = gallery_engine(&ctx)?;
            engine
                .upgrade(Target::Version(Version::new(1744042594)))?
                .into_result()?;

            let photos = ctx.store().find_collection(PHOTOS_ID)?;
            let tags: Vec<&FieldSpec> = photos.fields.iter().filter(|f| f.name == "tags").collect();
            assert_eq!(tags.len(), 1);
            assert_eq!(tags[0].id, "relation0000000042");
            assert_eq!(tags[0].get_option("maxSelect"), Some(&json!(5)));
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_gallery_dry_run_changes_nothing() {
    run_test(
        create_test_context,
        |ctx| {
            let before = fs::read_to_string(ctx.schema_path())?;
            let engine = ctx
                .engine_builder()
                .catalog(gallery::catalog()?)
                .dry_run(true)
                .build()?;

            let report = engine.upgrade(Target::Latest)?;
            assert!(report.dry_run);
            assert_eq!(report.planned.len(), 15);
            assert!(report.committed.is_empty());
            assert!(ctx.ledger().entries()?.is_empty());
            assert_eq!(fs::read_to_string(ctx.schema_path())?, before);
            Ok(())
        },
        cleanup,
    );
}
