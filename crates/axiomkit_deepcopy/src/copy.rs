//! Recursive deep-copy engine and its entry points.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::hook::invoke_copier;
use crate::report::{ReportDeepCopy, ReportDeepCopyBuilder};
use crate::spec::{DeepCopyResult, EnumUnsupportedStrategy, EnumValueKind, SpecDeepCopyOptions};
use crate::tracker::{IdentityTracker, SpecIdentityKey};
use crate::util::{SpecCopyFault, SpecPathSegment, is_depth_within_limit, validate_depth_limit};
use crate::value::{MapKey, SpecRef, SpecTypeName, Value};

type TypeCopyResult = Result<Value, SpecCopyFault>;

#[derive(Debug)]
struct SpecCopyContext<'a> {
    spec_dc_options: &'a SpecDeepCopyOptions,
    tracker: IdentityTracker,
    builder_dc_report: ReportDeepCopyBuilder,
}

////////////////////////////////////////////////////////////////////////////////
// #region EntryPoints

/// Deep-copy `src`, failing on any non-absent unsupported value.
pub fn copy(src: &Value) -> DeepCopyResult<Value> {
    deep_copy(src, &SpecDeepCopyOptions::strict()).map(|(dst, _)| dst)
}

/// Deep-copy `src`, replacing unsupported values with their zero value.
///
/// The error path is reserved for failures no policy can recover from.
pub fn copy_skip_unsupported(src: &Value) -> DeepCopyResult<Value> {
    deep_copy(src, &SpecDeepCopyOptions::lenient()).map(|(dst, _)| dst)
}

/// Deep-copy `src` under the strict policy, panicking on failure.
pub fn must_copy(src: &Value) -> Value {
    match copy(src) {
        Ok(dst) => dst,
        Err(e) => panic!("{e}"),
    }
}

/// Deep-copy `src` according to `spec_dc_options`.
///
/// This is the shared invocation behind [`copy`], [`copy_skip_unsupported`]
/// and [`must_copy`]. Each call uses a fresh identity tracker, so:
/// - references to the same storage map to the same new storage,
/// - cyclic graphs terminate and produce an isomorphic cyclic copy,
/// - nothing reachable through generic traversal is shared with `src`.
///
/// A [`Value::Nil`] input is returned as-is without running the engine.
/// On failure no partial copy is returned.
///
/// A cyclic copy is an `Rc` cycle; free it with [`Value::release_refs`].
pub fn deep_copy(
    src: &Value,
    spec_dc_options: &SpecDeepCopyOptions,
) -> DeepCopyResult<(Value, ReportDeepCopy)> {
    if matches!(src, Value::Nil) {
        return Ok((Value::Nil, ReportDeepCopy::default()));
    }
    validate_depth_limit(spec_dc_options.depth_limit)?;

    debug!(
        type_name = %src.type_name(),
        rule_unsupported = ?spec_dc_options.rule_unsupported,
        depth_limit = ?spec_dc_options.depth_limit,
        n_copiers = spec_dc_options.copiers.len(),
        "deep copy started"
    );

    let mut spec_dc_ctx = SpecCopyContext {
        spec_dc_options,
        tracker: IdentityTracker::new(),
        builder_dc_report: ReportDeepCopyBuilder::default(),
    };
    let dst = match recursive_copy(src, 0, &mut spec_dc_ctx) {
        Ok(v) => v,
        Err(fault) => {
            let err = fault.into_error();
            debug!(error = %err, "deep copy failed");
            return Err(err);
        }
    };

    let report_dc = spec_dc_ctx.builder_dc_report.build();
    debug!(
        n_tracked = spec_dc_ctx.tracker.len(),
        report = %report_dc,
        "deep copy finished"
    );
    Ok((dst, report_dc))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Dispatch

fn recursive_copy(
    v: &Value,
    n_depth: usize,
    spec_dc_ctx: &mut SpecCopyContext,
) -> TypeCopyResult {
    if !is_depth_within_limit(n_depth, spec_dc_ctx.spec_dc_options.depth_limit) {
        let n_limit = spec_dc_ctx.spec_dc_options.depth_limit.unwrap_or(n_depth);
        return Err(SpecCopyFault::depth_limit(n_limit));
    }
    spec_dc_ctx.builder_dc_report.add_visited();

    if let Some(dst) = invoke_copier(v, &spec_dc_ctx.spec_dc_options.copiers) {
        trace!(type_name = %v.type_name(), "self-copy hook used");
        spec_dc_ctx.builder_dc_report.add_hook();
        return Ok(dst);
    }

    match (v.kind(), v) {
        (EnumValueKind::Scalar, _) => Ok(v.clone()),
        (EnumValueKind::FixedSequence, Value::Array { elem, items }) => {
            recursive_copy_array(elem, items, n_depth, spec_dc_ctx)
        }
        (EnumValueKind::DynamicSequence, Value::List { elem, items }) => {
            recursive_copy_list(elem, items.as_ref(), n_depth, spec_dc_ctx)
        }
        (EnumValueKind::Mapping, Value::Map { key, elem, entries }) => {
            recursive_copy_map(key, elem, entries.as_ref(), n_depth, spec_dc_ctx)
        }
        (EnumValueKind::Reference, Value::Ref { elem, target }) => {
            recursive_copy_ref(elem, target.as_ref(), n_depth, spec_dc_ctx)
        }
        (EnumValueKind::DynamicWrapper, Value::Dyn { ty, held }) => {
            recursive_copy_dyn(ty, held.as_deref(), n_depth, spec_dc_ctx)
        }
        (EnumValueKind::AggregateRecord, _) => recursive_copy_record(v, n_depth, spec_dc_ctx),
        _ => copy_unsupported(v, spec_dc_ctx),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region PerKindCopiers

fn recursive_copy_array(
    elem: &SpecTypeName,
    items: &[Value],
    n_depth: usize,
    spec_dc_ctx: &mut SpecCopyContext,
) -> TypeCopyResult {
    let mut l_items = Vec::with_capacity(items.len());
    for (n_idx, item) in items.iter().enumerate() {
        let item_dst = recursive_copy(item, n_depth + 1, spec_dc_ctx)
            .map_err(|f| f.within(SpecPathSegment::Index(n_idx)))?;
        l_items.push(item_dst);
    }
    Ok(Value::Array {
        elem: elem.clone(),
        items: l_items,
    })
}

fn recursive_copy_list(
    elem: &SpecTypeName,
    items: Option<&Vec<Value>>,
    n_depth: usize,
    spec_dc_ctx: &mut SpecCopyContext,
) -> TypeCopyResult {
    let Some(items) = items else {
        return Ok(Value::List {
            elem: elem.clone(),
            items: None,
        });
    };

    let mut l_items = Vec::with_capacity(items.capacity());
    for (n_idx, item) in items.iter().enumerate() {
        let item_dst = recursive_copy(item, n_depth + 1, spec_dc_ctx)
            .map_err(|f| f.within(SpecPathSegment::Index(n_idx)))?;
        l_items.push(item_dst);
    }
    Ok(Value::List {
        elem: elem.clone(),
        items: Some(l_items),
    })
}

fn recursive_copy_map(
    key: &SpecTypeName,
    elem: &SpecTypeName,
    entries: Option<&HashMap<MapKey, Value>>,
    n_depth: usize,
    spec_dc_ctx: &mut SpecCopyContext,
) -> TypeCopyResult {
    let Some(entries) = entries else {
        return Ok(Value::Map {
            key: key.clone(),
            elem: elem.clone(),
            entries: None,
        });
    };

    // Keys are reused as-is; only values are deep-copied.
    let mut dict_entries = HashMap::with_capacity(entries.len());
    for (map_key, item) in entries {
        let item_dst = recursive_copy(item, n_depth + 1, spec_dc_ctx)
            .map_err(|f| f.within(SpecPathSegment::Key(map_key.clone())))?;
        dict_entries.insert(map_key.clone(), item_dst);
    }
    Ok(Value::Map {
        key: key.clone(),
        elem: elem.clone(),
        entries: Some(dict_entries),
    })
}

fn recursive_copy_ref(
    elem: &SpecTypeName,
    target: Option<&SpecRef>,
    n_depth: usize,
    spec_dc_ctx: &mut SpecCopyContext,
) -> TypeCopyResult {
    let Some(target) = target else {
        return Ok(Value::Ref {
            elem: elem.clone(),
            target: None,
        });
    };

    let key = SpecIdentityKey::of(target, elem);
    if let Some(target_dst) = spec_dc_ctx.tracker.lookup(&key) {
        trace!(n_addr = key.n_addr, elem = %elem, "reference already copied");
        spec_dc_ctx.builder_dc_report.add_ref_shared();
        return Ok(Value::Ref {
            elem: elem.clone(),
            target: Some(target_dst),
        });
    }

    let referent = target
        .try_borrow()
        .map_err(|_| SpecCopyFault::reference_busy(elem))?;

    // Register before descending so cycles resolve to this cell.
    let target_dst = SpecRef::new(referent.zero_like());
    spec_dc_ctx.tracker.register(key, target_dst.clone());
    spec_dc_ctx.builder_dc_report.add_ref_allocated();

    let referent_dst = recursive_copy(&referent, n_depth + 1, spec_dc_ctx)
        .map_err(|f| f.within(SpecPathSegment::Deref))?;
    drop(referent);

    target_dst.set(referent_dst);
    Ok(Value::Ref {
        elem: elem.clone(),
        target: Some(target_dst),
    })
}

fn recursive_copy_dyn(
    ty: &SpecTypeName,
    held: Option<&Value>,
    n_depth: usize,
    spec_dc_ctx: &mut SpecCopyContext,
) -> TypeCopyResult {
    let Some(held) = held else {
        return Ok(Value::Dyn {
            ty: ty.clone(),
            held: None,
        });
    };

    let held_dst = recursive_copy(held, n_depth + 1, spec_dc_ctx)
        .map_err(|f| f.within(SpecPathSegment::Unwrap(held.type_name())))?;
    Ok(Value::Dyn {
        ty: ty.clone(),
        held: Some(Box::new(held_dst)),
    })
}

fn recursive_copy_record(
    v: &Value,
    n_depth: usize,
    spec_dc_ctx: &mut SpecCopyContext,
) -> TypeCopyResult {
    let record = match v {
        Value::Timestamp(ts) => return Ok(Value::Timestamp(*ts)),
        Value::Record(record) => record,
        _ => return copy_unsupported(v, spec_dc_ctx),
    };

    let mut record_dst = record.zero_like();
    for (field, field_dst) in record.fields.iter().zip(record_dst.fields.iter_mut()) {
        if !field.exported {
            spec_dc_ctx.builder_dc_report.add_field_omitted();
            continue;
        }
        field_dst.value = recursive_copy(&field.value, n_depth + 1, spec_dc_ctx)
            .map_err(|f| f.within(SpecPathSegment::Field(field.name.clone())))?;
    }
    Ok(Value::Record(record_dst))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region UnsupportedPolicy

fn copy_unsupported(v: &Value, spec_dc_ctx: &mut SpecCopyContext) -> TypeCopyResult {
    if v.is_absent() {
        return Ok(v.clone());
    }

    match spec_dc_ctx.spec_dc_options.rule_unsupported {
        EnumUnsupportedStrategy::Error => Err(SpecCopyFault::unsupported(v.type_name())),
        EnumUnsupportedStrategy::Zero => {
            debug!(type_name = %v.type_name(), "unsupported value zeroed");
            spec_dc_ctx.builder_dc_report.add_zeroed();
            Ok(v.zero_like())
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use std::rc::Rc;

    use chrono::{TimeZone, Utc};

    use crate::hook::{DeepCopier, ForeignObject, SpecCopierRegistry};
    use crate::spec::{DeepCopyError, EnumOpaqueClass};
    use crate::value::{SpecForeignKey, SpecRecord};

    #[derive(Debug)]
    struct ChanHandle;

    impl ForeignObject for ChanHandle {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Debug)]
    struct Pool {
        n_size: i64,
    }

    impl DeepCopier for Pool {
        fn deep_copy(&self) -> Value {
            Value::opaque(
                "*Pool",
                EnumOpaqueClass::Foreign,
                Rc::new(Pool { n_size: self.n_size }),
            )
        }
    }

    impl ForeignObject for Pool {
        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_copier(&self) -> Option<&dyn DeepCopier> {
            Some(self)
        }
    }

    fn chan() -> Value {
        Value::opaque("chan int", EnumOpaqueClass::Chan, Rc::new(ChanHandle))
    }

    fn node(name: &str) -> SpecRef {
        SpecRef::new(Value::from(
            SpecRecord::new("Node")
                .with_field("name", Value::text(name))
                .with_field("next", Value::nil_ref("Node")),
        ))
    }

    fn link(from: &SpecRef, to: &SpecRef) {
        let mut guard = from.borrow_mut();
        let next = guard
            .as_record_mut()
            .and_then(|r| r.field_mut("next"))
            .expect("next field");
        *next = Value::ref_to("Node", to);
    }

    fn next_of(target: &SpecRef) -> SpecRef {
        target
            .borrow()
            .as_record()
            .and_then(|r| r.field("next"))
            .and_then(Value::target)
            .cloned()
            .expect("next target")
    }

    #[test]
    fn scalars_copy_by_value() {
        for v in [
            Value::Bool(true),
            Value::Int(-7),
            Value::Uint(7),
            Value::Float(1.5),
            Value::text("hello"),
        ] {
            assert_eq!(copy(&v).expect("copy"), v);
        }
    }

    #[test]
    fn nil_input_bypasses_engine() {
        let (dst, report) = deep_copy(&Value::Nil, &SpecDeepCopyOptions::strict()).expect("copy");
        assert_eq!(dst, Value::Nil);
        assert_eq!(report, ReportDeepCopy::default());
        assert_eq!(copy_skip_unsupported(&Value::Nil).expect("copy"), Value::Nil);
        assert_eq!(must_copy(&Value::Nil), Value::Nil);
    }

    #[test]
    fn map_copy_is_independent() {
        let src = Value::map(
            "string",
            "int",
            [
                (MapKey::from("a"), Value::Int(1)),
                (MapKey::from("b"), Value::Int(2)),
            ],
        );
        let mut dst = copy(&src).expect("copy");
        assert_eq!(dst, src);

        dst.entries_mut()
            .expect("entries")
            .insert(MapKey::from("c"), Value::Int(3));
        assert_eq!(src.entries().map(HashMap::len), Some(2));
        assert_eq!(dst.entries().map(HashMap::len), Some(3));
    }

    #[test]
    fn map_keys_are_not_deep_copied() {
        let key_target = SpecRef::new(Value::Int(1));
        let src = Value::map(
            "*int",
            "*int",
            [(
                MapKey::Ref(key_target.clone()),
                Value::ref_to("int", &key_target),
            )],
        );
        let dst = copy(&src).expect("copy");
        let (key_dst, value_dst) = dst
            .entries()
            .and_then(|e| e.iter().next())
            .expect("one entry");

        assert_eq!(key_dst, &MapKey::Ref(key_target.clone()));
        assert!(!value_dst.target().expect("target").ptr_eq(&key_target));
    }

    #[test]
    fn foreign_map_keys_pass_through_in_both_modes() {
        let key = SpecForeignKey::new(Rc::new(ChanHandle));
        let src = Value::map(
            "tuple",
            "string",
            [(MapKey::Foreign(key.clone()), Value::text("x"))],
        );

        for spec_dc_options in [SpecDeepCopyOptions::strict(), SpecDeepCopyOptions::lenient()] {
            let (dst, report) = deep_copy(&src, &spec_dc_options).expect("copy");
            let (key_dst, value_dst) = dst
                .entries()
                .and_then(|e| e.iter().next())
                .expect("one entry");
            assert!(matches!(key_dst, MapKey::Foreign(k) if k.ptr_eq(&key)));
            assert_eq!(value_dst, &Value::text("x"));
            assert_eq!(report.cnt_zeroed, 0);
        }
    }

    #[test]
    fn list_keeps_length_and_capacity() {
        let mut l_items = Vec::with_capacity(16);
        l_items.push(Value::text("a"));
        l_items.push(Value::text("b"));
        let src = Value::List {
            elem: Rc::from("string"),
            items: Some(l_items),
        };

        let mut dst = copy(&src).expect("copy");
        assert_eq!(dst, src);
        let items_dst = dst.items_mut().expect("items");
        assert_eq!(items_dst.len(), 2);
        assert!(items_dst.capacity() >= 16);

        items_dst[0] = Value::text("z");
        assert_eq!(src.items().map(|l| l[0].clone()), Some(Value::text("a")));
    }

    #[test]
    fn array_elements_are_copied_in_order() {
        let shared = SpecRef::new(Value::Int(5));
        let src = Value::array(
            "*int",
            vec![Value::ref_to("int", &shared), Value::nil_ref("int")],
        );
        let dst = copy(&src).expect("copy");
        let items = dst.items().expect("items");
        assert_eq!(items.len(), 2);
        let first = items[0].target().expect("first");
        assert!(!first.ptr_eq(&shared));
        assert_eq!(*first.borrow(), Value::Int(5));
        assert!(items[1].is_absent());
    }

    #[test]
    fn absent_values_stay_absent() {
        let src = Value::from(
            SpecRecord::new("Holder")
                .with_field("list", Value::nil_list("int"))
                .with_field("map", Value::nil_map("string", "int"))
                .with_field("ptr", Value::nil_ref("int"))
                .with_field("any", Value::nil_dyn("any"))
                .with_field("chan", Value::nil_opaque("chan int", EnumOpaqueClass::Chan))
                .with_field("empty", Value::list("int", vec![])),
        );
        let dst = copy(&src).expect("copy");
        assert_eq!(dst, src);

        let record = dst.as_record().expect("record");
        for name in ["list", "map", "ptr", "any", "chan"] {
            assert!(record.field(name).is_some_and(Value::is_absent), "{name}");
        }
        assert!(record.field("empty").is_some_and(|v| !v.is_absent()));
    }

    #[test]
    fn self_cycle_terminates() {
        let a = node("a");
        link(&a, &a);
        let src = Value::ref_to("Node", &a);

        let (dst, report) = deep_copy(&src, &SpecDeepCopyOptions::strict()).expect("copy");
        let a_dst = dst.target().expect("target").clone();
        assert!(!a_dst.ptr_eq(&a));
        assert!(next_of(&a_dst).ptr_eq(&a_dst));
        assert_eq!(report.cnt_refs_allocated, 1);
        assert_eq!(report.cnt_refs_shared, 1);
    }

    #[test]
    fn cyclic_copy_can_be_released() {
        let a = node("a");
        let b = node("b");
        link(&a, &b);
        link(&b, &a);
        let src = Value::ref_to("Node", &a);

        let dst = copy(&src).expect("copy");
        let a_dst = dst.target().expect("target").clone();
        assert_eq!(dst.release_refs(), 2);
        assert_eq!(*a_dst.borrow(), Value::Nil);
        assert!(a.borrow().as_record().is_some());
        assert_eq!(src.release_refs(), 2);
    }

    #[test]
    fn mutual_cycle_is_isomorphic() {
        let a = node("a");
        let b = node("b");
        link(&a, &b);
        link(&b, &a);

        let dst = copy(&Value::ref_to("Node", &a)).expect("copy");
        let a_dst = dst.target().expect("target").clone();
        let b_dst = next_of(&a_dst);
        assert!(!b_dst.ptr_eq(&b));
        assert!(next_of(&b_dst).ptr_eq(&a_dst));
        assert_eq!(
            b_dst.borrow().as_record().and_then(|r| r.field("name")),
            Some(&Value::text("b"))
        );
    }

    #[test]
    fn shared_references_stay_shared() {
        let target = SpecRef::new(Value::from(
            SpecRecord::new("Leaf").with_field("n", Value::Int(1)),
        ));
        let src = Value::from(
            SpecRecord::new("Pair")
                .with_field("left", Value::ref_to("Leaf", &target))
                .with_field("right", Value::ref_to("Leaf", &target)),
        );

        let dst = copy(&src).expect("copy");
        let record = dst.as_record().expect("record");
        let left = record.field("left").and_then(Value::target).expect("left");
        let right = record.field("right").and_then(Value::target).expect("right");
        assert!(left.ptr_eq(right));
        assert!(!left.ptr_eq(&target));

        left.set(Value::from(SpecRecord::new("Leaf").with_field("n", Value::Int(9))));
        assert_eq!(
            target.borrow().as_record().and_then(|r| r.field("n")),
            Some(&Value::Int(1))
        );
    }

    #[test]
    fn identity_key_includes_static_type() {
        let target = SpecRef::new(Value::Int(1));
        let src = Value::array(
            "ptr",
            vec![Value::ref_to("int", &target), Value::ref_to("alias", &target)],
        );
        let (dst, report) = deep_copy(&src, &SpecDeepCopyOptions::strict()).expect("copy");
        let items = dst.items().expect("items");
        let first = items[0].target().expect("first");
        let second = items[1].target().expect("second");
        assert!(!first.ptr_eq(second));
        assert_eq!(report.cnt_refs_allocated, 2);
    }

    #[test]
    fn dyn_wrapper_is_unwrapped_and_rewrapped() {
        let src = Value::wrap("any", Value::new_ref(Value::text("x")));
        let dst = copy(&src).expect("copy");
        assert_eq!(dst.type_name(), "any");
        let inner = dst.held().and_then(Value::target).expect("inner");
        assert!(!inner.ptr_eq(src.held().and_then(Value::target).expect("src inner")));
        assert_eq!(*inner.borrow(), Value::text("x"));
    }

    #[test]
    fn non_exported_fields_are_zeroed_silently() {
        let src = Value::from(
            SpecRecord::new("Account")
                .with_field("Balance", Value::Int(42))
                .with_private_field("secret", Value::text("hunter2")),
        );
        let (dst, report) = deep_copy(&src, &SpecDeepCopyOptions::strict()).expect("copy");
        let record = dst.as_record().expect("record");
        assert_eq!(record.field("Balance"), Some(&Value::Int(42)));
        assert_eq!(record.field("secret"), Some(&Value::text("")));
        assert_eq!(report.cnt_fields_omitted, 1);
    }

    #[test]
    fn non_exported_unsupported_field_is_not_an_error() {
        let src = Value::from(SpecRecord::new("Worker").with_private_field("events", chan()));
        let dst = copy(&src).expect("copy");
        assert!(
            dst.as_record()
                .and_then(|r| r.field("events"))
                .is_some_and(Value::is_absent)
        );
    }

    #[test]
    fn timestamp_is_copied_atomically() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 17, 8, 30, 0).single().expect("ts");
        let src = Value::from(SpecRecord::new("Event").with_field("at", Value::Timestamp(ts)));
        let (dst, report) = deep_copy(&src, &SpecDeepCopyOptions::strict()).expect("copy");
        assert_eq!(
            dst.as_record().and_then(|r| r.field("at")),
            Some(&Value::Timestamp(ts))
        );
        assert_eq!(report.cnt_visited, 2);
    }

    #[test]
    fn strict_mode_rejects_unsupported() {
        let src = Value::from(
            SpecRecord::new("Job")
                .with_field("id", Value::Int(1))
                .with_field("done", Value::wrap("any", chan())),
        );
        let err = copy(&src).expect_err("strict must fail");
        assert_eq!(
            err,
            DeepCopyError::UnsupportedType {
                type_name: "chan int".to_string(),
                path: "$.done.(chan int)".to_string(),
            }
        );
    }

    #[test]
    fn lenient_mode_zeroes_unsupported() {
        let src = Value::from(
            SpecRecord::new("Job")
                .with_field("id", Value::Int(1))
                .with_field("done", Value::wrap("any", chan())),
        );
        let (dst, report) = deep_copy(&src, &SpecDeepCopyOptions::lenient()).expect("copy");
        let record = dst.as_record().expect("record");
        assert_eq!(record.field("id"), Some(&Value::Int(1)));
        let held = record.field("done").and_then(Value::held).expect("held");
        assert_eq!(held, &Value::nil_opaque("chan int", EnumOpaqueClass::Chan));
        assert_eq!(report.cnt_zeroed, 1);
    }

    #[test]
    #[should_panic(expected = "unsupported non-nil value for type: chan int")]
    fn must_copy_panics_on_unsupported() {
        must_copy(&Value::list("chan int", vec![chan()]));
    }

    #[test]
    fn foreign_copier_takes_precedence() {
        let src = Value::list(
            "*Pool",
            vec![Value::opaque(
                "*Pool",
                EnumOpaqueClass::Foreign,
                Rc::new(Pool { n_size: 4 }),
            )],
        );
        let (dst, report) = deep_copy(&src, &SpecDeepCopyOptions::strict()).expect("copy");
        let Some(Value::Opaque(opaque)) = dst.items().and_then(|l| l.first()) else {
            panic!("expected opaque item");
        };
        let pool = opaque
            .handle
            .as_ref()
            .and_then(|h| h.as_any().downcast_ref::<Pool>())
            .expect("pool");
        assert_eq!(pool.n_size, 4);
        assert_ne!(dst, src);
        assert_eq!(report.cnt_hooks, 1);
    }

    #[test]
    fn registered_copier_overrides_generic_traversal() {
        let cache = SpecRef::new(Value::Int(1));
        let src = Value::from(
            SpecRecord::new("Session")
                .with_field("cache", Value::ref_to("int", &cache))
                .with_field("events", chan()),
        );
        let shared_cache = cache.clone();
        let spec_dc_options = SpecDeepCopyOptions {
            copiers: SpecCopierRegistry::new().with("Session", move |_| {
                Value::from(
                    SpecRecord::new("Session")
                        .with_field("cache", Value::ref_to("int", &shared_cache)),
                )
            }),
            ..SpecDeepCopyOptions::strict()
        };

        let (dst, report) = deep_copy(&src, &spec_dc_options).expect("copy");
        let cache_dst = dst
            .as_record()
            .and_then(|r| r.field("cache"))
            .and_then(Value::target)
            .expect("cache");
        assert!(cache_dst.ptr_eq(&cache));
        assert_eq!(report.cnt_hooks, 1);
        assert_eq!(report.cnt_visited, 1);
    }

    #[test]
    fn depth_limit_is_enforced() {
        let src = Value::list(
            "[]int",
            vec![Value::list("int", vec![Value::Int(1)])],
        );
        let spec_dc_options = SpecDeepCopyOptions {
            depth_limit: Some(1),
            ..SpecDeepCopyOptions::lenient()
        };
        let err = deep_copy(&src, &spec_dc_options).expect_err("too deep");
        assert_eq!(
            err,
            DeepCopyError::DepthLimitExceeded {
                depth_limit: 1,
                path: "$[0][0]".to_string(),
            }
        );

        let spec_dc_options = SpecDeepCopyOptions {
            depth_limit: Some(2),
            ..SpecDeepCopyOptions::strict()
        };
        assert!(deep_copy(&src, &spec_dc_options).is_ok());

        let spec_dc_options = SpecDeepCopyOptions {
            depth_limit: Some(0),
            ..SpecDeepCopyOptions::strict()
        };
        assert!(matches!(
            deep_copy(&src, &spec_dc_options),
            Err(DeepCopyError::InvalidDepthLimit(_))
        ));
    }

    #[test]
    fn busy_reference_fails_in_both_modes() {
        let target = SpecRef::new(Value::Int(1));
        let src = Value::ref_to("int", &target);
        let _guard = target.borrow_mut();

        for spec_dc_options in [SpecDeepCopyOptions::strict(), SpecDeepCopyOptions::lenient()] {
            let err = deep_copy(&src, &spec_dc_options).expect_err("busy");
            assert_eq!(
                err,
                DeepCopyError::ReferenceBusy {
                    type_name: "*int".to_string(),
                    path: "$".to_string(),
                }
            );
        }
    }

    #[test]
    fn untyped_nil_inside_graph_copies_as_absent() {
        let src = Value::list("any", vec![Value::Nil, Value::Int(1)]);
        assert_eq!(copy(&src).expect("copy"), src);
    }

    #[test]
    fn fuzz_like_random_graphs_terminate() {
        fn derive_next(seed: u64, n_idx: usize, n_nodes: usize) -> usize {
            let mut value = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
            value ^= (n_idx as u64).wrapping_mul(0x9E3779B97F4A7C15);
            (value % n_nodes as u64) as usize
        }

        for n_seed in 0_u64..40 {
            let n_nodes = 1 + (n_seed as usize % 7);
            let l_nodes: Vec<SpecRef> = (0..n_nodes).map(|i| node(&format!("n{i}"))).collect();
            for (n_idx, from) in l_nodes.iter().enumerate() {
                link(from, &l_nodes[derive_next(n_seed, n_idx, n_nodes)]);
            }
            let src = Value::list(
                "*Node",
                l_nodes.iter().map(|n| Value::ref_to("Node", n)).collect(),
            );

            let (dst, report) = deep_copy(&src, &SpecDeepCopyOptions::strict()).expect("copy");
            assert_eq!(report.cnt_refs_allocated, n_nodes as u64);

            let l_dst: Vec<SpecRef> = dst
                .items()
                .expect("items")
                .iter()
                .map(|v| v.target().cloned().expect("target"))
                .collect();
            for (n_idx, node_dst) in l_dst.iter().enumerate() {
                let n_next = derive_next(n_seed, n_idx, n_nodes);
                assert!(next_of(node_dst).ptr_eq(&l_dst[n_next]));
                assert!(!node_dst.ptr_eq(&l_nodes[n_idx]));
            }
        }
    }
}
