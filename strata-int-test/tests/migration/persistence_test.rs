use serde_json::Value;
use std::fs;
use strata::gallery::{self, PHOTOS_ID};
use strata::migration::{CollectionRef, MigrationStep, Operation, Target};
use strata::schema::{FieldSpec, Rule, RuleKind, RulePatch};
use strata::store::{JsonFileSchemaStore, SchemaStoreProvider};
use strata::Version;
use strata_int_test::test_util::{cleanup, create_json_test_context, create_test_context};

fn photos() -> CollectionRef {
    CollectionRef::any_of([PHOTOS_ID, "photos"])
}

fn steps() -> Vec<MigrationStep> {
    vec![
        MigrationStep::new(
            1737763600,
            "add_exif",
            vec![Operation::add_field(photos(), 9, FieldSpec::json("json1111111111", "exif"))],
        )
        .with_down(vec![Operation::remove_field(photos(), "json1111111111")]),
        MigrationStep::new(
            1737763601,
            "hide_photos",
            vec![Operation::set_rules(
                photos(),
                RulePatch::new()
                    .with(RuleKind::List, Rule::Nobody)
                    .with(RuleKind::View, Rule::Unset),
            )],
        ),
    ]
}

// ==================== Reopen ====================

#[test]
fn test_state_survives_reopen() {
    let ctx = create_test_context().unwrap();
    {
        let engine = ctx.engine(steps()).unwrap();
        engine.upgrade(Target::Latest).unwrap().into_result().unwrap();
    }

    let ctx = ctx.reopen().unwrap();
    let versions: Vec<u64> = ctx
        .ledger()
        .entries()
        .unwrap()
        .iter()
        .map(|entry| entry.version.value())
        .collect();
    assert_eq!(versions, vec![1737763600, 1737763601]);

    let photos = ctx.store().find_collection(PHOTOS_ID).unwrap();
    assert!(photos.get_field_by_name("exif").is_some());
    // null and "" stay distinct on disk
    assert_eq!(photos.rules.list, Rule::Nobody);
    assert_eq!(photos.rules.view, Rule::Unset);

    {
        let engine = ctx.engine(steps()).unwrap();
        let report = engine.upgrade(Target::Latest).unwrap();
        assert!(report.planned.is_empty());
        engine.downgrade(Version::new(1737763600)).unwrap().into_result().unwrap();
    }

    let ctx = ctx.reopen().unwrap();
    assert_eq!(ctx.ledger().last_applied().unwrap(), Version::new(1737763600));
    cleanup(ctx).unwrap();
}

#[test]
fn test_reopen_after_partial_failure_resumes() {
    let ctx = create_test_context().unwrap();
    {
        let mut broken = steps();
        broken.push(MigrationStep::new(
            1737763602,
            "drop_legacy",
            vec![Operation::delete_collection(CollectionRef::named("legacy"))],
        ));
        let engine = ctx.engine(broken).unwrap();
        let report = engine.upgrade(Target::Latest).unwrap();
        assert_eq!(report.committed.len(), 2);
        assert!(report.failure.is_some());
    }

    let ctx = ctx.reopen().unwrap();
    {
        let mut fixed = steps();
        fixed.push(MigrationStep::new(
            1737763602,
            "drop_legacy",
            vec![Operation::delete_collection(
                CollectionRef::named("legacy").guarded(),
            )],
        ));
        let engine = ctx.engine(fixed).unwrap();
        let report = engine.upgrade(Target::Latest).unwrap().into_result().unwrap();
        assert_eq!(report.committed_versions(), vec![Version::new(1737763602)]);
    }
    cleanup(ctx).unwrap();
}

// ==================== File Formats ====================

#[test]
fn test_json_ledger_file_shape() {
    let ctx = create_json_test_context().unwrap();
    {
        let engine = ctx.engine(steps()).unwrap();
        engine.upgrade(Target::Latest).unwrap().into_result().unwrap();
    }

    let content = fs::read_to_string(ctx.path().join("pb_ledger.json")).unwrap();
    let records: Value = serde_json::from_str(&content).unwrap();
    let records = records.as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["version"], Value::from(1737763600u64));
    assert_eq!(records[0]["name"], Value::from("add_exif"));
    let applied_at = records[1]["appliedAt"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(applied_at).is_ok());
    cleanup(ctx).unwrap();
}

#[test]
fn test_schema_snapshot_keeps_rule_distinction() {
    let ctx = create_json_test_context().unwrap();
    {
        let engine = ctx.engine(steps()).unwrap();
        engine.upgrade(Target::Latest).unwrap().into_result().unwrap();
    }

    let content = fs::read_to_string(ctx.schema_path()).unwrap();
    let snapshot: Value = serde_json::from_str(&content).unwrap();
    let photos = snapshot["collections"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["id"] == PHOTOS_ID)
        .unwrap();
    assert_eq!(photos["listRule"], Value::from(""));
    assert!(photos["viewRule"].is_null());
    assert!(photos.as_object().unwrap().contains_key("viewRule"));

    // another process sees the same schema
    let other = JsonFileSchemaStore::open(ctx.schema_path()).unwrap();
    assert_eq!(other.collections().unwrap(), ctx.store().collections().unwrap());
    cleanup(ctx).unwrap();
}

#[test]
fn test_seed_is_written_only_once() {
    let ctx = create_json_test_context().unwrap();
    ctx.store()
        .save(&{
            let mut albums = ctx.store().find_collection("albums").unwrap();
            albums.name = "photo_albums".to_string();
            albums
        })
        .unwrap();

    let reopened = JsonFileSchemaStore::open_or_seed(ctx.schema_path(), gallery::baseline_schema()).unwrap();
    assert!(reopened.find_collection("photo_albums").is_ok());
    assert!(reopened.find_collection("albums").is_err());
    cleanup(ctx).unwrap();
}
