use serde_json::json;
use std::fs;
use std::path::Path;
use strata::errors::ErrorKind;
use strata::gallery::{GROUPS_ID, PHOTOS_ID};
use strata::migration::{Catalog, StepOutcome, Target};
use strata::schema::Rule;
use strata::Version;
use strata_int_test::test_util::{cleanup, create_test_context, random_path, run_test};

fn write_step(dir: &Path, file_name: &str, content: serde_json::Value) {
    fs::write(dir.join(file_name), serde_json::to_string_pretty(&content).unwrap()).unwrap();
}

fn migrations_dir() -> std::path::PathBuf {
    let dir = random_path();
    fs::create_dir_all(&dir).unwrap();

    write_step(
        &dir,
        "1770000001_updated_photos_add_group.json",
        json!({
            "up": [{
                "op": "addField",
                "collection": [PHOTOS_ID, "photos"],
                "position": 6,
                "field": {
                    "cascadeDelete": false,
                    "collectionId": GROUPS_ID,
                    "id": "relation9876543213",
                    "maxSelect": 1,
                    "minSelect": 0,
                    "name": "group",
                    "type": "relation"
                }
            }],
            "down": [{
                "op": "removeField",
                "collection": [PHOTOS_ID, "photos"],
                "fieldId": "relation9876543213"
            }]
        }),
    );
    write_step(
        &dir,
        "1770000002_updated_groups_rules.json",
        json!({
            "up": [{
                "op": "setRules",
                "collection": GROUPS_ID,
                "rules": {"listRule": "", "updateRule": "@request.auth.id = user"}
            }],
            "down": [{
                "op": "setRules",
                "collection": GROUPS_ID,
                "rules": {"listRule": "@request.auth.id = user", "updateRule": null}
            }]
        }),
    );
    write_step(
        &dir,
        "1770000008_drop_favorites_collection.json",
        json!({
            "up": [{
                "op": "deleteCollection",
                "collection": {"anyOf": ["favorites"], "optional": true}
            }]
        }),
    );
    fs::write(dir.join("README.md"), "not a migration").unwrap();
    dir
}

// ==================== Loading ====================

#[test]
fn test_load_dir_reads_step_files() {
    let dir = migrations_dir();
    let catalog = Catalog::load_dir(&dir).unwrap();

    let versions: Vec<u64> = catalog.steps().iter().map(|s| s.version().value()).collect();
    assert_eq!(versions, vec![1770000001, 1770000002, 1770000008]);
    assert_eq!(
        catalog.get(Version::new(1770000002)).unwrap().name(),
        "updated_groups_rules"
    );
    assert!(!catalog.get(Version::new(1770000008)).unwrap().is_reversible());
    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn test_malformed_step_file_is_configuration_error() {
    let dir = random_path();
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("1770000009_broken.json"), "{\"up\": [{\"op\": \"truncate\"}]}").unwrap();

    let err = Catalog::load_dir(&dir).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::Configuration);
    assert!(err.message().contains("1770000009_broken.json"));
    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn test_missing_dir_is_configuration_error() {
    let err = Catalog::load_dir(random_path()).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::Configuration);
}

// ==================== Running ====================

#[test]
fn test_engine_runs_step_files() {
    run_test(
        create_test_context,
        |ctx| {
            let dir = migrations_dir();
            let engine = ctx.engine_builder().migrations_dir(&dir).build()?;

            let report = engine.upgrade(Target::Latest)?.into_result()?;
            assert_eq!(report.committed.len(), 3);
            assert_eq!(report.committed[2].outcome, StepOutcome::Applied);

            let photos = ctx.store().find_collection(PHOTOS_ID)?;
            assert_eq!(photos.field_position("relation9876543213"), Some(6));
            let groups = ctx.store().find_collection(GROUPS_ID)?;
            assert_eq!(groups.rules.list, Rule::Nobody);
            assert_eq!(groups.rules.update, Rule::expr("@request.auth.id = user"));

            engine.downgrade(Version::new(1770000001))?.into_result()?;
            let groups = ctx.store().find_collection(GROUPS_ID)?;
            assert_eq!(groups.rules.list, Rule::expr("@request.auth.id = user"));
            assert_eq!(groups.rules.update, Rule::Unset);

            fs::remove_dir_all(dir)?;
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_builder_keeps_load_error() {
    run_test(
        create_test_context,
        |ctx| {
            let dir = random_path();
            fs::create_dir_all(&dir)?;
            write_step(
                &dir,
                "1770000003_bad_field.json",
                json!({
                    "up": [{
                        "op": "addField",
                        "collection": PHOTOS_ID,
                        "field": {"id": "number1", "name": "sort order", "type": "number"}
                    }]
                }),
            );

            let err = ctx.engine_builder().migrations_dir(&dir).build().err().unwrap();
            assert_eq!(err.kind(), &ErrorKind::Configuration);
            assert!(ctx.ledger().entries()?.is_empty());
            fs::remove_dir_all(dir)?;
            Ok(())
        },
        cleanup,
    );
}
