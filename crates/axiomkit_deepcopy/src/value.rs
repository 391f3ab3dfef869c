//! Typed runtime value model and the kind classifier.
//!
//! Every [`Value`] carries enough static type information to rebuild its own
//! zero value, so absent and zeroed results keep the type of the input.

use std::cell::{BorrowError, Ref, RefCell, RefMut};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use chrono::{DateTime, Utc};

use crate::hook::ForeignObject;
use crate::spec::{EnumOpaqueClass, EnumValueKind};

/// Interned static type name (`int`, `[]string`, `Node`, ...).
pub type SpecTypeName = Rc<str>;

pub(crate) const C_TYPE_BOOL: &str = "bool";
pub(crate) const C_TYPE_INT: &str = "int";
pub(crate) const C_TYPE_UINT: &str = "uint";
pub(crate) const C_TYPE_FLOAT: &str = "float";
pub(crate) const C_TYPE_TEXT: &str = "string";
pub(crate) const C_TYPE_TIMESTAMP: &str = "timestamp";
pub(crate) const C_TYPE_NIL: &str = "nil";

////////////////////////////////////////////////////////////////////////////////
// #region SharedStorage

/// Shared, mutable storage cell addressed by references.
///
/// Equality and hashing use storage identity, never the stored value.
#[derive(Clone)]
pub struct SpecRef(Rc<RefCell<Value>>);

impl SpecRef {
    /// Allocate new storage holding `value`.
    pub fn new(value: Value) -> Self {
        Self(Rc::new(RefCell::new(value)))
    }

    /// Borrow the stored value. Panics if it is mutably borrowed.
    pub fn borrow(&self) -> Ref<'_, Value> {
        self.0.borrow()
    }

    /// Mutably borrow the stored value. Panics if it is borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, Value> {
        self.0.borrow_mut()
    }

    /// Borrow the stored value without panicking.
    pub fn try_borrow(&self) -> Result<Ref<'_, Value>, BorrowError> {
        self.0.try_borrow()
    }

    /// Replace the stored value.
    pub fn set(&self, value: Value) {
        *self.0.borrow_mut() = value;
    }

    /// Whether both handles denote the same storage.
    pub fn ptr_eq(&self, other: &SpecRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Stable identity of the storage for the lifetime of this handle.
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl PartialEq for SpecRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for SpecRef {}

impl Hash for SpecRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for SpecRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpecRef({:#x})", self.addr())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region MapKeys

/// Host object used as a mapping key, compared by identity.
#[derive(Clone)]
pub struct SpecForeignKey(Rc<dyn ForeignObject>);

impl SpecForeignKey {
    pub fn new(object: Rc<dyn ForeignObject>) -> Self {
        Self(object)
    }

    pub fn object(&self) -> &Rc<dyn ForeignObject> {
        &self.0
    }

    pub fn ptr_eq(&self, other: &SpecForeignKey) -> bool {
        self.addr() == other.addr()
    }

    fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl PartialEq for SpecForeignKey {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for SpecForeignKey {}

impl Hash for SpecForeignKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for SpecForeignKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpecForeignKey({:#x})", self.addr())
    }
}

/// Hashable mapping key. Keys are never deep-copied.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Text(String),
    /// Keyed by storage identity.
    Ref(SpecRef),
    /// Keyed by host object identity.
    Foreign(SpecForeignKey),
}

impl From<&str> for MapKey {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MapKey {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for MapKey {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for MapKey {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Uint(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Ref(r) => write!(f, "*{:#x}", r.addr()),
            Self::Foreign(k) => write!(f, "<foreign {:#x}>", k.addr()),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region RecordsAndOpaque

/// One member of a [`SpecRecord`].
#[derive(Debug, Clone, PartialEq)]
pub struct SpecRecordField {
    /// Member name.
    pub name: String,
    /// Externally visible members are copied; others stay zero in copies.
    pub exported: bool,
    /// Member value.
    pub value: Value,
}

/// Struct-like aggregate with ordered members.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecRecord {
    /// Record type name.
    pub ty: SpecTypeName,
    /// Members in declaration order.
    pub fields: Vec<SpecRecordField>,
}

impl SpecRecord {
    /// Empty record of type `ty`.
    pub fn new(ty: &str) -> Self {
        Self {
            ty: Rc::from(ty),
            fields: Vec::new(),
        }
    }

    /// Append an exported member.
    pub fn with_field(mut self, name: &str, value: Value) -> Self {
        self.fields.push(SpecRecordField {
            name: name.to_string(),
            exported: true,
            value,
        });
        self
    }

    /// Append a non-exported member.
    pub fn with_private_field(mut self, name: &str, value: Value) -> Self {
        self.fields.push(SpecRecordField {
            name: name.to_string(),
            exported: false,
            value,
        });
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields
            .iter_mut()
            .find(|f| f.name == name)
            .map(|f| &mut f.value)
    }

    /// Same record type with every member zeroed.
    pub fn zero_like(&self) -> Self {
        Self {
            ty: self.ty.clone(),
            fields: self
                .fields
                .iter()
                .map(|f| SpecRecordField {
                    name: f.name.clone(),
                    exported: f.exported,
                    value: f.value.zero_like(),
                })
                .collect(),
        }
    }
}

/// Function, channel, raw pointer or foreign handle.
#[derive(Clone)]
pub struct SpecOpaque {
    /// Static type name.
    pub ty: SpecTypeName,
    /// Opaque sub-category.
    pub class: EnumOpaqueClass,
    /// Held object; `None` is the absent value of this type.
    pub handle: Option<Rc<dyn ForeignObject>>,
}

impl SpecOpaque {
    fn handle_addr(&self) -> Option<usize> {
        self.handle
            .as_ref()
            .map(|h| Rc::as_ptr(h) as *const () as usize)
    }
}

impl PartialEq for SpecOpaque {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty
            && self.class == other.class
            && self.handle_addr() == other.handle_addr()
    }
}

impl fmt::Debug for SpecOpaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpecOpaque")
            .field("ty", &self.ty)
            .field("class", &self.class)
            .field("handle", &self.handle)
            .finish()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Value

/// A runtime value together with its static type.
///
/// `PartialEq` compares references and opaque handles by identity, so it
/// never walks into shared storage and terminates on cyclic graphs.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// No concrete runtime type at all.
    Nil,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Text(String),
    /// Record-shaped, but copied as a unit.
    Timestamp(DateTime<Utc>),
    /// Fixed-size sequence.
    Array {
        elem: SpecTypeName,
        items: Vec<Value>,
    },
    /// Resizable sequence; `None` is absent.
    List {
        elem: SpecTypeName,
        items: Option<Vec<Value>>,
    },
    /// Mapping; `None` is absent.
    Map {
        key: SpecTypeName,
        elem: SpecTypeName,
        entries: Option<HashMap<MapKey, Value>>,
    },
    /// Pointer-like reference; `None` is absent.
    Ref {
        elem: SpecTypeName,
        target: Option<SpecRef>,
    },
    /// Dynamic wrapper of static type `ty`; `None` holds nothing.
    Dyn {
        ty: SpecTypeName,
        held: Option<Box<Value>>,
    },
    Record(SpecRecord),
    Opaque(SpecOpaque),
}

impl Value {
    pub fn text(value: &str) -> Self {
        Self::Text(value.to_string())
    }

    pub fn array(elem: &str, items: Vec<Value>) -> Self {
        Self::Array {
            elem: Rc::from(elem),
            items,
        }
    }

    pub fn list(elem: &str, items: Vec<Value>) -> Self {
        Self::List {
            elem: Rc::from(elem),
            items: Some(items),
        }
    }

    pub fn nil_list(elem: &str) -> Self {
        Self::List {
            elem: Rc::from(elem),
            items: None,
        }
    }

    pub fn map<I>(key: &str, elem: &str, entries: I) -> Self
    where
        I: IntoIterator<Item = (MapKey, Value)>,
    {
        Self::Map {
            key: Rc::from(key),
            elem: Rc::from(elem),
            entries: Some(entries.into_iter().collect()),
        }
    }

    pub fn nil_map(key: &str, elem: &str) -> Self {
        Self::Map {
            key: Rc::from(key),
            elem: Rc::from(elem),
            entries: None,
        }
    }

    /// Allocate new storage for `value` and reference it.
    pub fn new_ref(value: Value) -> Self {
        let elem: SpecTypeName = Rc::from(value.type_name().as_str());
        Self::Ref {
            elem,
            target: Some(SpecRef::new(value)),
        }
    }

    /// Reference existing storage holding a value of type `elem`.
    pub fn ref_to(elem: &str, target: &SpecRef) -> Self {
        Self::Ref {
            elem: Rc::from(elem),
            target: Some(target.clone()),
        }
    }

    pub fn nil_ref(elem: &str) -> Self {
        Self::Ref {
            elem: Rc::from(elem),
            target: None,
        }
    }

    /// Wrap `value` in a dynamic wrapper of static type `ty`.
    pub fn wrap(ty: &str, value: Value) -> Self {
        Self::Dyn {
            ty: Rc::from(ty),
            held: Some(Box::new(value)),
        }
    }

    pub fn nil_dyn(ty: &str) -> Self {
        Self::Dyn {
            ty: Rc::from(ty),
            held: None,
        }
    }

    pub fn opaque(ty: &str, class: EnumOpaqueClass, handle: Rc<dyn ForeignObject>) -> Self {
        Self::Opaque(SpecOpaque {
            ty: Rc::from(ty),
            class,
            handle: Some(handle),
        })
    }

    pub fn nil_opaque(ty: &str, class: EnumOpaqueClass) -> Self {
        Self::Opaque(SpecOpaque {
            ty: Rc::from(ty),
            class,
            handle: None,
        })
    }

    /// Classify the value by shape.
    ///
    /// The result depends on the variant only, never on contents. Untyped
    /// [`Value::Nil`] falls into the opaque category, where it copies as absent.
    pub fn kind(&self) -> EnumValueKind {
        match self {
            Self::Bool(_) | Self::Int(_) | Self::Uint(_) | Self::Float(_) | Self::Text(_) => {
                EnumValueKind::Scalar
            }
            Self::Array { .. } => EnumValueKind::FixedSequence,
            Self::List { .. } => EnumValueKind::DynamicSequence,
            Self::Map { .. } => EnumValueKind::Mapping,
            Self::Ref { .. } => EnumValueKind::Reference,
            Self::Dyn { .. } => EnumValueKind::DynamicWrapper,
            Self::Timestamp(_) | Self::Record(_) => EnumValueKind::AggregateRecord,
            Self::Nil | Self::Opaque(_) => EnumValueKind::Opaque,
        }
    }

    /// Whether this is the absent value of a reference-like or opaque type.
    pub fn is_absent(&self) -> bool {
        match self {
            Self::Nil => true,
            Self::List { items, .. } => items.is_none(),
            Self::Map { entries, .. } => entries.is_none(),
            Self::Ref { target, .. } => target.is_none(),
            Self::Dyn { held, .. } => held.is_none(),
            Self::Opaque(o) => o.handle.is_none(),
            _ => false,
        }
    }

    /// Render the static type.
    pub fn type_name(&self) -> String {
        match self {
            Self::Nil => C_TYPE_NIL.to_string(),
            Self::Bool(_) => C_TYPE_BOOL.to_string(),
            Self::Int(_) => C_TYPE_INT.to_string(),
            Self::Uint(_) => C_TYPE_UINT.to_string(),
            Self::Float(_) => C_TYPE_FLOAT.to_string(),
            Self::Text(_) => C_TYPE_TEXT.to_string(),
            Self::Timestamp(_) => C_TYPE_TIMESTAMP.to_string(),
            Self::Array { elem, items } => format!("[{}]{elem}", items.len()),
            Self::List { elem, .. } => format!("[]{elem}"),
            Self::Map { key, elem, .. } => format!("map[{key}]{elem}"),
            Self::Ref { elem, .. } => format!("*{elem}"),
            Self::Dyn { ty, .. } => ty.to_string(),
            Self::Record(r) => r.ty.to_string(),
            Self::Opaque(o) => o.ty.to_string(),
        }
    }

    /// Zero value of the same static type.
    ///
    /// Scalars become their defaults, arrays and records are zeroed
    /// member-wise, and every reference-like or opaque value becomes absent.
    pub fn zero_like(&self) -> Value {
        match self {
            Self::Nil => Self::Nil,
            Self::Bool(_) => Self::Bool(false),
            Self::Int(_) => Self::Int(0),
            Self::Uint(_) => Self::Uint(0),
            Self::Float(_) => Self::Float(0.0),
            Self::Text(_) => Self::Text(String::new()),
            Self::Timestamp(_) => Self::Timestamp(DateTime::<Utc>::UNIX_EPOCH),
            Self::Array { elem, items } => Self::Array {
                elem: elem.clone(),
                items: items.iter().map(Value::zero_like).collect(),
            },
            Self::List { elem, .. } => Self::List {
                elem: elem.clone(),
                items: None,
            },
            Self::Map { key, elem, .. } => Self::Map {
                key: key.clone(),
                elem: elem.clone(),
                entries: None,
            },
            Self::Ref { elem, .. } => Self::Ref {
                elem: elem.clone(),
                target: None,
            },
            Self::Dyn { ty, .. } => Self::Dyn {
                ty: ty.clone(),
                held: None,
            },
            Self::Record(r) => Self::Record(r.zero_like()),
            Self::Opaque(o) => Self::Opaque(SpecOpaque {
                ty: o.ty.clone(),
                class: o.class,
                handle: None,
            }),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&SpecRecord> {
        match self {
            Self::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_record_mut(&mut self) -> Option<&mut SpecRecord> {
        match self {
            Self::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Referenced storage, if this is a non-absent reference.
    pub fn target(&self) -> Option<&SpecRef> {
        match self {
            Self::Ref { target, .. } => target.as_ref(),
            _ => None,
        }
    }

    /// Held value, if this is a non-empty dynamic wrapper.
    pub fn held(&self) -> Option<&Value> {
        match self {
            Self::Dyn { held, .. } => held.as_deref(),
            _ => None,
        }
    }

    pub fn items(&self) -> Option<&Vec<Value>> {
        match self {
            Self::Array { items, .. } => Some(items),
            Self::List { items, .. } => items.as_ref(),
            _ => None,
        }
    }

    pub fn items_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Self::Array { items, .. } => Some(items),
            Self::List { items, .. } => items.as_mut(),
            _ => None,
        }
    }

    pub fn entries(&self) -> Option<&HashMap<MapKey, Value>> {
        match self {
            Self::Map { entries, .. } => entries.as_ref(),
            _ => None,
        }
    }

    pub fn entries_mut(&mut self) -> Option<&mut HashMap<MapKey, Value>> {
        match self {
            Self::Map { entries, .. } => entries.as_mut(),
            _ => None,
        }
    }

    /// Reset every storage cell reachable from this value to [`Value::Nil`].
    ///
    /// A graph whose references loop back on themselves is an `Rc` cycle and
    /// is not freed on drop. Call this on such a graph (source or copy) once
    /// it is no longer needed. Cells borrowed at the time are left untouched.
    /// Returns the number of cells reset.
    pub fn release_refs(&self) -> usize {
        let mut l_pending = Vec::new();
        self.collect_refs(&mut l_pending);

        let mut set_seen = HashSet::new();
        let mut l_cells = Vec::new();
        while let Some(target) = l_pending.pop() {
            if !set_seen.insert(target.addr()) {
                continue;
            }
            if let Ok(referent) = target.try_borrow() {
                referent.collect_refs(&mut l_pending);
            }
            l_cells.push(target);
        }

        let mut cnt_released = 0;
        for target in &l_cells {
            if let Ok(mut referent) = target.0.try_borrow_mut() {
                *referent = Value::Nil;
                cnt_released += 1;
            }
        }
        cnt_released
    }

    /// Push the references directly held by this value, without following them.
    fn collect_refs(&self, l_refs: &mut Vec<SpecRef>) {
        match self {
            Self::Array { items, .. }
            | Self::List {
                items: Some(items), ..
            } => items.iter().for_each(|v| v.collect_refs(l_refs)),
            Self::Map {
                entries: Some(entries),
                ..
            } => {
                for (key, item) in entries {
                    if let MapKey::Ref(target) = key {
                        l_refs.push(target.clone());
                    }
                    item.collect_refs(l_refs);
                }
            }
            Self::Ref {
                target: Some(target),
                ..
            } => l_refs.push(target.clone()),
            Self::Dyn {
                held: Some(held), ..
            } => held.collect_refs(l_refs),
            Self::Record(record) => record
                .fields
                .iter()
                .for_each(|field| field.value.collect_refs(l_refs)),
            _ => {}
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Self::Uint(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl From<SpecRecord> for Value {
    fn from(value: SpecRecord) -> Self {
        Self::Record(value)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
