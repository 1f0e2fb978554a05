//! Replay: executing operations against a root value.

use crate::error::{CodecError, CodecResult};
use crate::key::{Key, KeyPath};
use crate::op::{Operation, Payload, RootKind};
use crate::value::Value;

/// Applies one operation to a root slot.
///
/// `root` starts as `None` for a fresh replay; the first operation of a
/// well-formed log is a create-root, which fills it. A later create-root
/// resets the slot (a compacted log begins again from its header).
///
/// # Errors
///
/// Returns [`CodecError::Replay`] when the operation does not fit the
/// current state: an assign or delete before any root exists, a missing
/// parent container, or a path that traverses a scalar. Any of these means
/// the log is corrupt, since serialization always writes parents first.
pub fn apply(root: &mut Option<Value>, op: &Operation) -> CodecResult<()> {
    match op {
        Operation::CreateRoot(RootKind::Object) => {
            *root = Some(Value::Object(Vec::new()));
            Ok(())
        }
        Operation::CreateRoot(RootKind::Array) => {
            *root = Some(Value::Array(Vec::new()));
            Ok(())
        }
        Operation::Assign { path, payload } => {
            let target = root
                .as_mut()
                .ok_or_else(|| CodecError::replay("assign before the root was created"))?;
            let (parents, last) = path
                .split_last()
                .ok_or_else(|| CodecError::replay("the root is assigned via create-root only"))?;
            let parent = navigate_mut(target, parents, path)?;
            set_key(parent, last, payload_value(payload), path)
        }
        Operation::Delete { path } => {
            let target = root
                .as_mut()
                .ok_or_else(|| CodecError::replay("delete before the root was created"))?;
            let (parents, last) = path
                .split_last()
                .ok_or_else(|| CodecError::replay("the root cannot be deleted"))?;
            let parent = navigate_mut(target, parents, path)?;
            delete_key(parent, last);
            Ok(())
        }
    }
}

fn payload_value(payload: &Payload) -> Value {
    match payload {
        Payload::Null => Value::Null,
        Payload::Undefined => Value::Undefined,
        Payload::Bool(b) => Value::Bool(*b),
        Payload::Number(n) => Value::Number(*n),
        Payload::Text(s) => Value::Text(s.clone()),
        Payload::Date(d) => Value::Date(*d),
        Payload::EmptyObject => Value::Object(Vec::new()),
        Payload::EmptyArray => Value::Array(Vec::new()),
        Payload::Instance(tag) => Value::Instance {
            tag: tag.clone(),
            fields: Vec::new(),
        },
    }
}

fn navigate_mut<'a>(
    mut current: &'a mut Value,
    keys: &[Key],
    full_path: &KeyPath,
) -> CodecResult<&'a mut Value> {
    for key in keys {
        current = match current {
            Value::Array(items) => {
                let index = key.as_index()
                    .ok_or_else(|| bad_path(full_path, "string key into an array"))?;
                items
                    .get_mut(index)
                    .ok_or_else(|| bad_path(full_path, "missing array element"))?
            }
            Value::Object(fields) | Value::Instance { fields, .. } => {
                let name = key.as_name();
                fields
                    .iter_mut()
                    .find(|(k, _)| *k == name)
                    .map(|(_, v)| v)
                    .ok_or_else(|| bad_path(full_path, "missing field"))?
            }
            _ => return Err(bad_path(full_path, "path traverses a non-container")),
        };
    }
    Ok(current)
}

fn set_key(parent: &mut Value, key: &Key, value: Value, full_path: &KeyPath) -> CodecResult<()> {
    match parent {
        Value::Array(items) => {
            let index =
                key.as_index().ok_or_else(|| bad_path(full_path, "string key into an array"))?;
            if index < items.len() {
                items[index] = value;
            } else {
                // Sparse assign: pad the gap with holes, as a replayed
                // delete-then-reassign sequence can skip indices.
                items.resize(index, Value::Undefined);
                items.push(value);
            }
            Ok(())
        }
        Value::Object(_) | Value::Instance { .. } => {
            parent.set_field(&key.as_name(), value);
            Ok(())
        }
        _ => Err(bad_path(full_path, "assignment into a non-container")),
    }
}

fn delete_key(parent: &mut Value, key: &Key) {
    match parent {
        Value::Array(items) => {
            // Deleting an array element leaves a hole; later elements keep
            // their indices. Deleting past the end is a no-op.
            if let Some(index) = key.as_index() {
                if let Some(slot) = items.get_mut(index) {
                    *slot = Value::Undefined;
                }
            }
        }
        Value::Object(_) | Value::Instance { .. } => {
            parent.remove_field(&key.as_name());
        }
        _ => {}
    }
}

fn bad_path(path: &KeyPath, message: &str) -> CodecError {
    CodecError::replay(format!("{message} at {path}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::{serialize, serialize_root};

    fn replay(ops: &[Operation]) -> Value {
        let mut root = None;
        for op in ops {
            apply(&mut root, op).unwrap();
        }
        root.unwrap()
    }

    #[test]
    fn replays_a_small_table() {
        let ops = vec![
            Operation::CreateRoot(RootKind::Object),
            Operation::assign(KeyPath::root().child("darkMode"), Payload::Text("auto".into())),
            Operation::assign(KeyPath::root().child("colours"), Payload::EmptyObject),
            Operation::assign(
                KeyPath::root().child("colours").child("red"),
                Payload::Text("#AA0000".into()),
            ),
        ];

        let root = replay(&ops);
        assert_eq!(root.get("darkMode"), Some(&Value::Text("auto".into())));
        assert_eq!(
            root.get("colours").unwrap().get("red"),
            Some(&Value::Text("#AA0000".into()))
        );
    }

    #[test]
    fn assign_then_delete_round() {
        let mut ops = vec![
            Operation::CreateRoot(RootKind::Object),
            Operation::assign(KeyPath::root().child("colours"), Payload::EmptyObject),
            Operation::assign(
                KeyPath::root().child("colours").child("red"),
                Payload::Text("#AA0000".into()),
            ),
            Operation::assign(KeyPath::root().child("darkMode"), Payload::Bool(true)),
        ];
        ops.push(Operation::delete(KeyPath::root().child("colours")));

        let root = replay(&ops);
        assert!(root.get("colours").is_none());
        assert_eq!(root.get("darkMode"), Some(&Value::Bool(true)));
    }

    #[test]
    fn array_delete_leaves_a_hole() {
        let ops = vec![
            Operation::CreateRoot(RootKind::Array),
            Operation::assign(KeyPath::root().child(0usize), Payload::Number(1.0)),
            Operation::assign(KeyPath::root().child(1usize), Payload::Number(2.0)),
            Operation::delete(KeyPath::root().child(0usize)),
        ];

        let root = replay(&ops);
        assert_eq!(
            root.as_array().unwrap(),
            &[Value::Undefined, Value::Number(2.0)]
        );
    }

    #[test]
    fn sparse_assign_pads_with_holes() {
        let ops = vec![
            Operation::CreateRoot(RootKind::Array),
            Operation::assign(KeyPath::root().child(2usize), Payload::Bool(true)),
        ];

        let root = replay(&ops);
        assert_eq!(
            root.as_array().unwrap(),
            &[Value::Undefined, Value::Undefined, Value::Bool(true)]
        );
    }

    #[test]
    fn later_create_root_resets() {
        let ops = vec![
            Operation::CreateRoot(RootKind::Object),
            Operation::assign(KeyPath::root().child("a"), Payload::Number(1.0)),
            Operation::CreateRoot(RootKind::Array),
        ];

        let root = replay(&ops);
        assert_eq!(root, Value::Array(vec![]));
    }

    #[test]
    fn numeric_keys_normalize_per_container() {
        // A numeric name addresses an array slot; an index addresses an
        // object field by its decimal name.
        let ops = vec![
            Operation::CreateRoot(RootKind::Object),
            Operation::assign(KeyPath::root().child(7usize), Payload::Bool(true)),
        ];
        let root = replay(&ops);
        assert_eq!(root.get("7"), Some(&Value::Bool(true)));

        let ops = vec![
            Operation::CreateRoot(RootKind::Array),
            Operation::assign(KeyPath::root().child("0"), Payload::Bool(true)),
        ];
        let root = replay(&ops);
        assert_eq!(root.as_array().unwrap(), &[Value::Bool(true)]);
    }

    #[test]
    fn missing_parent_is_corrupt() {
        let mut root = Some(Value::Object(vec![]));
        let op = Operation::assign(
            KeyPath::root().child("missing").child("deep"),
            Payload::Null,
        );
        assert!(matches!(
            apply(&mut root, &op),
            Err(CodecError::Replay { .. })
        ));
    }

    #[test]
    fn mutation_before_root_is_corrupt() {
        let mut root = None;
        let op = Operation::assign(KeyPath::root().child("a"), Payload::Null);
        assert!(matches!(
            apply(&mut root, &op),
            Err(CodecError::Replay { .. })
        ));
    }

    #[test]
    fn delete_of_missing_key_is_noop() {
        let mut root = Some(Value::Object(vec![]));
        apply(&mut root, &Operation::delete(KeyPath::root().child("nope"))).unwrap();
        assert_eq!(root.unwrap(), Value::Object(vec![]));
    }

    #[test]
    fn serialize_then_replay_reconstructs() {
        let original = Value::object(vec![
            ("cars".into(), Value::Array(vec![Value::object(vec![
                ("make".into(), Value::from("Subaru")),
                ("year".into(), Value::from(1991)),
                ("tags".into(), Value::from(vec!["fun", "sporty"])),
            ])])),
            ("counts".into(), Value::Array(vec![
                Value::Number(f64::NAN),
                Value::Number(f64::INFINITY),
                Value::Number(f64::NEG_INFINITY),
            ])),
            ("nasty".into(), Value::from("back\\slash ` tick ${interp}")),
        ]);

        let ops = serialize_root(&original).unwrap();
        let mut root = None;
        for op in &ops {
            apply(&mut root, op).unwrap();
        }
        assert_eq!(root.unwrap(), original);
    }

    #[test]
    fn subtree_serialize_replays_into_place() {
        let mut root = Some(Value::object(vec![("cars".into(), Value::Array(vec![]))]));
        let car = Value::object(vec![("make".into(), Value::from("Lexus"))]);

        let path = KeyPath::root().child("cars").child(0usize);
        for op in serialize(&car, &path).unwrap() {
            apply(&mut root, &op).unwrap();
        }

        let root = root.unwrap();
        assert_eq!(root.get("cars").unwrap().as_array().unwrap()[0], car);
    }
}
