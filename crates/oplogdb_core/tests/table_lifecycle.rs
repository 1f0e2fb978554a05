//! End-to-end table lifecycle tests: persistence, replay, compaction,
//! load strategies, events, and instance reconstruction.

use oplogdb_core::{Table, TableEvent, TableOptions, TypeRegistry, Value};
use std::sync::Arc;
use tempfile::tempdir;

fn car(make: &str, year: i64, colour: &str, tags: &[&str]) -> Value {
    Value::object(vec![
        ("make".into(), Value::from(make)),
        ("year".into(), Value::from(year)),
        ("colour".into(), Value::from(colour)),
        (
            "tags".into(),
            Value::Array(tags.iter().map(|t| Value::from(*t)).collect()),
        ),
    ])
}

fn settings() -> Value {
    Value::object(vec![
        ("darkMode".into(), Value::from("auto")),
        (
            "colours".into(),
            Value::object(vec![
                ("red".into(), Value::from("#FF5E00")),
                ("green".into(), Value::from("#00FF5E")),
                ("magenta".into(), Value::from("#FF00FF")),
            ]),
        ),
    ])
}

#[test]
fn append_then_replay_equivalence() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cars.olf");

    let table = Table::create(&path, Value::Array(vec![])).unwrap();
    let cars = table.root();
    cars.push(car("Subaru", 1991, "Fuscia", &["fun", "sporty"])).unwrap();
    cars.push(car("Jaguar", 2004, "Red", &["fun", "expensive"])).unwrap();

    let first = cars.get(0usize).unwrap().unwrap().into_node().unwrap();
    first.set("colour", "Crimson").unwrap();
    first.get("tags").unwrap().unwrap().into_node().unwrap().push("classic").unwrap();
    cars.remove(1usize).unwrap();

    let before_close = table.snapshot();
    table.close().unwrap();

    let reloaded = Table::load_with_options(&path, TableOptions::new().compact_on_load(false))
        .unwrap();
    assert_eq!(reloaded.snapshot(), before_close);
    reloaded.close().unwrap();
}

#[test]
fn deleting_a_branch_survives_reload() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("settings.olf");

    let table = Table::create(&path, settings()).unwrap();
    table.root().remove("colours").unwrap();
    table.close().unwrap();

    let reloaded = Table::load(&path).unwrap();
    let root = reloaded.root();
    assert!(root.get("colours").unwrap().is_none());
    assert_eq!(
        root.get("darkMode").unwrap().unwrap().snapshot().unwrap(),
        Value::from("auto")
    );
    reloaded.close().unwrap();
}

#[test]
fn compaction_is_idempotent_and_preserves_the_value() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cars.olf");

    let table = Table::create(&path, Value::Array(vec![])).unwrap();
    table.root().push(car("Lexus", 1997, "Indigo", &["regal"])).unwrap();
    let first = table.root().get(0usize).unwrap().unwrap().into_node().unwrap();
    first.set("colour", "Black").unwrap();
    first.set("colour", "Indigo").unwrap();

    let logical = table.snapshot();

    table.compact().unwrap();
    let once = std::fs::read(&path).unwrap();

    table.compact().unwrap();
    let twice = std::fs::read(&path).unwrap();

    assert_eq!(once, twice, "back-to-back compactions are byte-identical");
    assert_eq!(table.snapshot(), logical, "compaction never changes the value");
    table.close().unwrap();
}

#[test]
fn compaction_discards_update_and_delete_history() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("settings.olf");

    let table =
        Table::create_with_options(&path, settings(), TableOptions::new()).unwrap();
    table.root().set("darkMode", "always-on").unwrap();
    table.root().remove("colours").unwrap();
    table.compact().unwrap();
    table.close().unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(!text.contains("delete "), "history of deletes is gone");
    assert!(!text.contains("auto"), "overwritten value is gone from disk");
    assert!(!text.contains("#FF5E00"), "deleted subtree is gone from disk");
    assert!(text.contains("_['darkMode'] = `always-on`;\n"));
}

#[test]
fn load_compacts_by_default() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("settings.olf");

    let table = Table::create(&path, settings()).unwrap();
    table.root().set("darkMode", "always-on").unwrap();
    table.close().unwrap();

    let dirty = std::fs::read_to_string(&path).unwrap();
    assert!(dirty.contains("auto"), "history present before reload");

    let reloaded = Table::load(&path).unwrap();
    reloaded.close().unwrap();

    let clean = std::fs::read_to_string(&path).unwrap();
    assert!(!clean.contains("auto"), "compact-on-load rewrote the file");
}

#[test]
fn streaming_and_whole_file_loads_agree() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cars.olf");

    let table = Table::create(&path, Value::Array(vec![])).unwrap();
    for i in 0..25_i64 {
        table.root().push(car(&format!("Make{i}"), 1990 + i, "Grey", &["tag"])).unwrap();
    }
    table.root().remove(3usize).unwrap();
    table.close().unwrap();

    let on_disk = std::fs::read(&path).unwrap();

    let whole = Table::load_with_options(&path, TableOptions::new().compact_on_load(false))
        .unwrap();
    let whole_value = whole.snapshot();
    whole.close().unwrap();

    let streamed = Table::load_with_options(&path, TableOptions::new().always_stream(true))
        .unwrap();
    let streamed_value = streamed.snapshot();
    streamed.close().unwrap();

    assert_eq!(whole_value, streamed_value);
    // Streaming loads never compact, even though compact_on_load defaulted
    // to true in its options.
    assert_eq!(std::fs::read(&path).unwrap(), on_disk);
}

#[test]
fn hostile_strings_round_trip_exactly() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("strings.olf");

    let hostile = "back\\slash, a ` tick, and ${interpolation}";
    let table = Table::create(&path, Value::Object(vec![])).unwrap();
    table.root().set("s", hostile).unwrap();
    table.close().unwrap();

    let reloaded = Table::load(&path).unwrap();
    assert_eq!(
        reloaded.root().get("s").unwrap().unwrap().snapshot().unwrap(),
        Value::from(hostile)
    );
    reloaded.close().unwrap();
}

#[test]
fn special_numbers_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("numbers.olf");

    let table = Table::create(&path, Value::Object(vec![])).unwrap();
    table.root().set("nan", f64::NAN).unwrap();
    table.root().set("inf", f64::INFINITY).unwrap();
    table.root().set("ninf", f64::NEG_INFINITY).unwrap();
    table.root().set("pi", 3.141_592_653_589_793).unwrap();
    let before = table.snapshot();
    table.close().unwrap();

    let reloaded = Table::load(&path).unwrap();
    assert_eq!(reloaded.snapshot(), before);
    reloaded.close().unwrap();
}

#[test]
fn dates_round_trip_at_millisecond_precision() {
    use chrono::{TimeZone, Utc};

    let dir = tempdir().unwrap();
    let path = dir.path().join("dates.olf");

    let table = Table::create(&path, Value::Object(vec![])).unwrap();
    let when = Utc.with_ymd_and_hms(2021, 2, 3, 4, 5, 6).unwrap();
    table.root().set("when", Value::Date(when)).unwrap();
    table.close().unwrap();

    let reloaded = Table::load(&path).unwrap();
    assert_eq!(
        reloaded.root().get("when").unwrap().unwrap().snapshot().unwrap(),
        Value::Date(when)
    );
    reloaded.close().unwrap();
}

#[test]
fn appends_reach_the_file_in_submission_order() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("order.olf");

    let table = Table::create(&path, Value::Object(vec![])).unwrap();
    for i in 0..50 {
        table.root().set(format!("k{i}"), i).unwrap();
    }
    table.close().unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let positions: Vec<usize> = (0..50)
        .map(|i| text.find(&format!("_['k{i}'] = {i};")).unwrap())
        .collect();
    let mut sorted = positions.clone();
    sorted.sort_unstable();
    assert_eq!(positions, sorted, "FIFO order preserved in the log");
}

#[test]
fn persisted_events_carry_the_change() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.olf");

    let table = Table::create(&path, Value::Object(vec![])).unwrap();
    let events = table.subscribe();

    table.root().set("answer", 42).unwrap();
    match events.recv().unwrap() {
        TableEvent::Persisted { change } => assert_eq!(change, "_['answer'] = 42;\n"),
        other => panic!("unexpected event: {other:?}"),
    }
    table.close().unwrap();
}

#[test]
fn registered_instances_reconstruct_and_unknown_tags_degrade() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("people.olf");

    let table = Table::create(&path, Value::Object(vec![])).unwrap();
    table
        .root()
        .set(
            "aral",
            Value::instance("Person", vec![("name".into(), Value::from("Aral"))]),
        )
        .unwrap();
    table.close().unwrap();

    // With the tag registered, the instance survives as an instance.
    let mut registry = TypeRegistry::new();
    registry.register_tag("Person");
    let options = TableOptions::new()
        .compact_on_load(false)
        .type_registry(Arc::new(registry));
    let with_registry = Table::load_with_options(&path, options).unwrap();
    let person = with_registry.root().get("aral").unwrap().unwrap().snapshot().unwrap();
    assert_eq!(person.kind(), "instance");
    assert_eq!(person.get("name"), Some(&Value::from("Aral")));
    with_registry.close().unwrap();

    // Without it, the same log replays to a plain object.
    let options = TableOptions::new().compact_on_load(false);
    let without_registry = Table::load_with_options(&path, options).unwrap();
    let person = without_registry.root().get("aral").unwrap().unwrap().snapshot().unwrap();
    assert_eq!(person.kind(), "object");
    assert_eq!(person.get("name"), Some(&Value::from("Aral")));
    without_registry.close().unwrap();
}

#[test]
fn deep_mutation_through_nested_handles_persists() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("deep.olf");

    let table = Table::create(&path, Value::Object(vec![])).unwrap();
    table
        .root()
        .set(
            "a",
            Value::object(vec![(
                "b".into(),
                Value::object(vec![("c".into(), Value::Array(vec![]))]),
            )]),
        )
        .unwrap();

    table
        .root()
        .get("a").unwrap().unwrap().into_node().unwrap()
        .get("b").unwrap().unwrap().into_node().unwrap()
        .get("c").unwrap().unwrap().into_node().unwrap()
        .push("deep value")
        .unwrap();

    let before = table.snapshot();
    table.close().unwrap();

    let reloaded = Table::load(&path).unwrap();
    assert_eq!(reloaded.snapshot(), before);
    reloaded.close().unwrap();
}
