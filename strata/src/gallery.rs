//! The photo gallery's schema history.
//!
//! [`baseline_schema`] is the schema the first migration applies to and
//! [`catalog`] holds every migration the gallery has shipped. Collections are
//! addressed by id first and by name second, so the catalog also runs against
//! deployments where a collection was recreated under another id.

use crate::errors::StrataResult;
use crate::migration::{Catalog, CollectionRef, MigrationStep, Operation};
use crate::schema::{CollectionDefinition, CollectionType, FieldSpec, Rule, RuleKind, RulePatch, RuleSet};
use serde_json::{json, Value};

pub const PHOTOS_ID: &str = "pbc_1234567890";
pub const GROUPS_ID: &str = "pbc_9876543210";
pub const ALBUMS_ID: &str = "pbc_2468135790";
pub const TAGS_ID: &str = "pbc_1219621782";
pub const FAVORITES_ID: &str = "pbc_1357924680";
pub const USERS_ID: &str = "_pb_users_auth_";

const OWNER: &str = "@request.auth.id = user";
const SIGNED_IN: &str = "@request.auth.id != ''";
const SIGNED_IN_NULL_CHECK: &str = "@request.auth.id != null";
const NOT_OWNER: &str = "@request.auth.id != user";

const PHOTO_MIME_TYPES: [&str; 5] = ["image/jpeg", "image/png", "image/gif", "image/webp", "image/svg+xml"];

fn photos() -> CollectionRef {
    CollectionRef::any_of([PHOTOS_ID, "photos"])
}

fn groups() -> CollectionRef {
    CollectionRef::any_of([GROUPS_ID, "groups"])
}

fn albums() -> CollectionRef {
    CollectionRef::any_of([ALBUMS_ID, "albums"])
}

fn tags() -> CollectionRef {
    CollectionRef::any_of([TAGS_ID, "tags"])
}

fn rules(list: Rule, view: Rule, create: Rule, update: Rule, delete: Rule) -> RuleSet {
    RuleSet {
        list,
        view,
        create,
        update,
        delete,
    }
}

fn owner() -> Rule {
    Rule::expr(OWNER)
}

fn record_id() -> FieldSpec {
    FieldSpec::text("text3208210256", "id")
        .required(true)
        .system(true)
        .option("autogeneratePattern", "[a-z0-9]{15}")
        .option("max", 15)
        .option("min", 15)
        .option("pattern", "^[a-z0-9]+$")
        .option("primaryKey", true)
}

fn text(id: &str, name: &str, max: u64) -> FieldSpec {
    FieldSpec::text(id, name)
        .option("autogeneratePattern", "")
        .option("max", max)
        .option("min", 0)
        .option("pattern", "")
        .option("primaryKey", false)
}

fn number(id: &str, name: &str, only_int: bool) -> FieldSpec {
    FieldSpec::number(id, name)
        .option("max", Value::Null)
        .option("min", Value::Null)
        .option("onlyInt", only_int)
}

fn relation(id: &str, name: &str, collection_id: &str, max_select: u64) -> FieldSpec {
    FieldSpec::relation(id, name, collection_id)
        .option("cascadeDelete", false)
        .option("maxSelect", max_select)
        .option("minSelect", 0)
}

fn timestamp(id: &str, name: &str, on_update: bool) -> FieldSpec {
    FieldSpec::date(id, name)
        .system(true)
        .option("onCreate", true)
        .option("onUpdate", on_update)
}

fn photo_file(thumbs: &[&str]) -> FieldSpec {
    FieldSpec::file("file2359244304", "photo")
        .required(true)
        .option("maxSelect", 1)
        .option("maxSize", 52428800)
        .option("mimeTypes", json!(PHOTO_MIME_TYPES))
        .option("protected", false)
        .option("thumbs", json!(thumbs))
}

fn favorite(id: &str) -> FieldSpec {
    FieldSpec::bool(id, "favorite")
}

/// The gallery schema before any catalog step ran.
pub fn baseline_schema() -> Vec<CollectionDefinition> {
    let photos = CollectionDefinition::new(PHOTOS_ID, "photos")
        .with_field(record_id())
        .with_field(text("text724990059", "title", 200))
        .with_field(text("text1843675174", "description", 2000))
        .with_field(photo_file(&["100x100", "500x500", "1200x0"]))
        .with_field(relation("relation2375276105", "user", USERS_ID, 1).required(true))
        .with_field(text("text1587448267", "location", 200))
        .with_field(FieldSpec::bool("bool1260321794", "isPublic"))
        .with_field(timestamp("date2990389176", "created", false))
        .with_field(timestamp("date3332085495", "updated", true))
        .with_rules(rules(owner(), owner(), Rule::expr(SIGNED_IN), owner(), owner()));

    let groups = CollectionDefinition::new(GROUPS_ID, "groups")
        .with_field(record_id())
        .with_field(text("text1579384326", "name", 200).required(true).presentable(true))
        .with_field(text("text1843675174", "description", 2000))
        .with_field(relation("relation2375276105", "user", USERS_ID, 1).required(true))
        .with_field(timestamp("date2990389176", "created", false))
        .with_field(timestamp("date3332085495", "updated", true))
        .with_rules(rules(owner(), owner(), Rule::expr(SIGNED_IN), Rule::Unset, Rule::Unset));

    let albums = CollectionDefinition::new(ALBUMS_ID, "albums")
        .with_field(record_id())
        .with_field(text("text1579384326", "name", 200).required(true).presentable(true))
        .with_field(text("text1843675174", "description", 2000))
        .with_field(relation("relation2375276105", "user", USERS_ID, 1).required(true))
        .with_field(relation("relation3045132946", "cover", PHOTOS_ID, 1))
        .with_field(timestamp("date2990389176", "created", false))
        .with_field(timestamp("date3332085495", "updated", true));

    let tags = CollectionDefinition::new(TAGS_ID, "tags")
        .with_field(record_id())
        .with_field(text("text1579384326", "name", 50).required(true).presentable(true))
        .with_field(relation("relation2375276105", "user", USERS_ID, 1).required(true))
        .with_field(timestamp("date2990389176", "created", false))
        .with_field(timestamp("date3332085495", "updated", true))
        .with_rules(rules(owner(), owner(), owner(), owner(), owner()));

    let favorites = CollectionDefinition::new(FAVORITES_ID, "favorites")
        .with_field(record_id())
        .with_field(relation("relation2375276105", "user", USERS_ID, 1).required(true))
        .with_field(relation("relation1536498241", "photo", PHOTOS_ID, 1).required(true))
        .with_field(timestamp("date2990389176", "created", false))
        .with_rules(rules(owner(), owner(), Rule::expr(SIGNED_IN), Rule::Nobody, owner()));

    vec![photos, groups, albums, tags, favorites]
}

/// The users collection the gallery's `user` relations point at.
pub fn users_collection() -> CollectionDefinition {
    CollectionDefinition::new(USERS_ID, "users")
        .with_type(CollectionType::Auth)
        .with_field(record_id())
        .with_field(FieldSpec::text("text1579384326", "name").option("max", 255))
        .with_rules(rules(
            Rule::expr("id = @request.auth.id"),
            Rule::expr("id = @request.auth.id"),
            Rule::Nobody,
            Rule::expr("id = @request.auth.id"),
            Rule::expr("id = @request.auth.id"),
        ))
}

fn exif_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::json("json1111111111", "exif").option("maxSize", 0),
        text("text2222222222", "cameraMake", 100),
        text("text3333333333", "cameraModel", 100),
        text("text4444444444", "lens", 100),
        number("number5555555555", "iso", true),
        text("text6666666666", "shutterSpeed", 50),
        number("number7777777777", "aperture", false),
        number("number8888888888", "focalLength", false),
        FieldSpec::date("date9999999999", "dateTaken")
            .option("max", "")
            .option("min", ""),
        number("number1010101010", "latitude", false),
        number("number1111111010", "longitude", false),
        number("number1212121212", "width", true),
        number("number1313131313", "height", true),
        number("number1414141414", "orientation", true),
        number("number1515151515", "fileSize", true),
    ]
}

fn add_metadata_to_photos() -> MigrationStep {
    let fields = exif_fields();
    let down = fields
        .iter()
        .map(|field| Operation::remove_field(photos(), &field.id))
        .collect::<Vec<_>>();
    let up = fields
        .into_iter()
        .enumerate()
        .map(|(offset, field)| Operation::add_field(photos(), 9 + offset, field))
        .collect::<Vec<_>>();
    MigrationStep::new(1737937600, "add_metadata_to_photos", up).with_down(down)
}

/// Every migration the gallery has shipped, in version order.
pub fn catalog() -> StrataResult<Catalog> {
    Catalog::new(vec![
        MigrationStep::new(
            1737763600,
            "updated_photos_rules",
            vec![Operation::set_rules(
                photos(),
                RulePatch::new().with(RuleKind::Create, Rule::expr(SIGNED_IN_NULL_CHECK)),
            )],
        )
        .with_down(vec![Operation::set_rules(
            photos(),
            RulePatch::new().with(RuleKind::Create, Rule::expr(SIGNED_IN)),
        )]),
        add_metadata_to_photos(),
        MigrationStep::new(
            1744042594,
            "add_tags_relation_to_photos",
            vec![Operation::add_field_if_missing(
                photos(),
                4,
                relation("relation1219621782", "tags", TAGS_ID, 10),
            )],
        )
        .with_down(vec![Operation::remove_field(photos(), "relation1219621782")]),
        MigrationStep::new(
            1768425595,
            "updated_photos",
            vec![Operation::set_rules(
                photos(),
                RulePatch::new()
                    .with(RuleKind::Create, Rule::expr(NOT_OWNER))
                    .with(RuleKind::List, Rule::Nobody)
                    .with(RuleKind::View, Rule::Nobody),
            )],
        )
        .with_down(vec![Operation::set_rules(
            photos(),
            RulePatch::new()
                .with(RuleKind::Create, Rule::expr(SIGNED_IN_NULL_CHECK))
                .with(RuleKind::List, owner())
                .with(RuleKind::View, owner()),
        )]),
        MigrationStep::new(
            1768492764,
            "updated_groups",
            vec![Operation::set_rules(
                groups(),
                RulePatch::new()
                    .with(RuleKind::Create, owner())
                    .with(RuleKind::List, Rule::Nobody)
                    .with(RuleKind::View, Rule::Nobody),
            )],
        )
        .with_down(vec![Operation::set_rules(
            groups(),
            RulePatch::new()
                .with(RuleKind::Create, Rule::expr(SIGNED_IN))
                .with(RuleKind::List, owner())
                .with(RuleKind::View, owner()),
        )]),
        MigrationStep::new(
            1768511038,
            "updated_albums",
            vec![Operation::set_rules(
                albums(),
                RulePatch::new()
                    .with(RuleKind::Create, owner())
                    .with(RuleKind::Delete, owner())
                    .with(RuleKind::List, Rule::Nobody)
                    .with(RuleKind::Update, owner())
                    .with(RuleKind::View, Rule::Nobody),
            )],
        )
        .with_down(vec![Operation::set_rules(albums(), RulePatch::all(Rule::Unset))]),
        MigrationStep::new(
            1768583139,
            "updated_tags",
            vec![Operation::set_rules(
                tags(),
                RulePatch::new()
                    .with(RuleKind::Create, Rule::expr(SIGNED_IN))
                    .with(RuleKind::Delete, Rule::expr(SIGNED_IN))
                    .with(RuleKind::Update, Rule::expr(SIGNED_IN)),
            )],
        )
        .with_down(vec![Operation::set_rules(
            tags(),
            RulePatch::new()
                .with(RuleKind::Create, owner())
                .with(RuleKind::Delete, owner())
                .with(RuleKind::Update, owner()),
        )]),
        MigrationStep::new(
            1769454383,
            "updated_albums",
            vec![Operation::add_field(albums(), 5, number("number1063427325", "sortOrder", false))],
        )
        .with_down(vec![Operation::remove_field(albums(), "number1063427325")]),
        // replaces the photo field to add the 250x250 thumb
        MigrationStep::new(
            1769609592,
            "updated_photos",
            vec![Operation::add_field(
                photos(),
                3,
                photo_file(&["100x100", "250x250", "500x500", "1200x0"]),
            )],
        )
        .with_down(vec![Operation::add_field(
            photos(),
            3,
            photo_file(&["100x100", "500x500", "1200x0"]),
        )]),
        MigrationStep::new(
            1770000001,
            "updated_photos_add_group",
            vec![Operation::add_field(
                photos(),
                6,
                relation("relation9876543213", "group", GROUPS_ID, 1),
            )],
        )
        .with_down(vec![Operation::remove_field(photos(), "relation9876543213")]),
        MigrationStep::new(
            1770000002,
            "updated_groups_rules",
            vec![Operation::set_rules(
                groups(),
                RulePatch::new()
                    .with(RuleKind::Create, Rule::expr(SIGNED_IN))
                    .with(RuleKind::Delete, owner())
                    .with(RuleKind::List, owner())
                    .with(RuleKind::Update, owner())
                    .with(RuleKind::View, owner()),
            )],
        )
        .with_down(vec![Operation::set_rules(
            groups(),
            RulePatch::new()
                .with(RuleKind::Create, owner())
                .with(RuleKind::Delete, Rule::Unset)
                .with(RuleKind::List, Rule::Nobody)
                .with(RuleKind::Update, Rule::Unset)
                .with(RuleKind::View, Rule::Nobody),
        )]),
        MigrationStep::new(
            1770000003,
            "added_sort_order",
            vec![
                Operation::add_field(photos(), 7, number("number5043921187", "sortOrder", false)),
                Operation::add_field(groups(), 6, number("number5043921188", "sortOrder", false)),
            ],
        )
        .with_down(vec![
            Operation::remove_field(photos(), "number5043921187"),
            Operation::remove_field(groups(), "number5043921188"),
        ]),
        MigrationStep::new(
            1770000005,
            "added_album_to_photos_groups",
            vec![
                Operation::add_field(
                    photos(),
                    7,
                    relation("relation2468135792", "album", ALBUMS_ID, 1),
                ),
                Operation::add_field(
                    groups(),
                    6,
                    relation("relation2468135793", "album", ALBUMS_ID, 1),
                ),
            ],
        )
        .with_down(vec![
            Operation::remove_field(photos(), "relation2468135792"),
            Operation::remove_field(groups(), "relation2468135793"),
        ]),
        MigrationStep::new(
            1770000007,
            "added_favorite_to_photos_groups",
            vec![
                Operation::add_field_if_missing(photos(), 8, favorite("bool135791116")),
                Operation::add_field_if_missing(groups(), 7, favorite("bool135791117")),
            ],
        )
        .with_down(vec![
            Operation::remove_field(photos(), "bool135791116"),
            Operation::remove_field(groups(), "bool135791117"),
        ]),
        // the favorite flags replace the collection; it is not recreated on revert
        MigrationStep::new(
            1770000008,
            "drop_favorites_collection",
            vec![Operation::delete_collection(
                CollectionRef::named("favorites").guarded(),
            )],
        ),
    ])
}
