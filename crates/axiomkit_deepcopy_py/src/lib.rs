use std::any::Any;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use axiomkit_deepcopy::{
    DeepCopier, DeepCopyError, EnumOpaqueClass, EnumUnsupportedStrategy, ForeignObject, MapKey,
    ReportDeepCopy, SpecDeepCopyOptions, SpecForeignKey, SpecRecord, SpecRecordField, SpecRef,
    Value, deep_copy,
};
use pyo3::exceptions::{PyRuntimeError, PyTypeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyBool, PyDict, PyFloat, PyInt, PyList, PyString, PyTuple, PyType};

const N_BRIDGE_ABI_VERSION: u64 = 1;
const C_BRIDGE_CONTRACT_VERSION: &str = "axiomkit.deepcopy.copy.v1";
const C_BRIDGE_TRANSPORT: &str = "rust_native";

const C_TYPE_OBJECT: &str = "object";
const C_TYPE_LIST: &str = "[]object";
const C_TYPE_DICT: &str = "map[object]object";
const C_TYPE_CALLABLE: &str = "callable";

/// Immutable types whose instances are shared by copies.
const L_SHARED_TYPES: [(&str, &str); 7] = [
    ("builtins", "bytes"),
    ("builtins", "complex"),
    ("builtins", "range"),
    ("datetime", "date"),
    ("datetime", "time"),
    ("datetime", "timedelta"),
    ("datetime", "tzinfo"),
];

/// Builtin value types; instances of their subclasses are copied by `copy.deepcopy`.
const L_BUILTIN_TYPES: [&str; 9] = [
    "int",
    "float",
    "str",
    "bytes",
    "tuple",
    "list",
    "dict",
    "set",
    "frozenset",
];

#[pyclass(name = "ReportDeepCopy")]
#[derive(Debug, Clone)]
struct PyReportDeepCopy {
    #[pyo3(get)]
    cnt_visited: u64,
    #[pyo3(get)]
    cnt_refs_allocated: u64,
    #[pyo3(get)]
    cnt_refs_shared: u64,
    #[pyo3(get)]
    cnt_hooks: u64,
    #[pyo3(get)]
    cnt_zeroed: u64,
    #[pyo3(get)]
    cnt_fields_omitted: u64,
}

impl From<ReportDeepCopy> for PyReportDeepCopy {
    fn from(report_dc: ReportDeepCopy) -> Self {
        Self {
            cnt_visited: report_dc.cnt_visited,
            cnt_refs_allocated: report_dc.cnt_refs_allocated,
            cnt_refs_shared: report_dc.cnt_refs_shared,
            cnt_hooks: report_dc.cnt_hooks,
            cnt_zeroed: report_dc.cnt_zeroed,
            cnt_fields_omitted: report_dc.cnt_fields_omitted,
        }
    }
}

impl PyReportDeepCopy {
    fn as_report(&self) -> ReportDeepCopy {
        ReportDeepCopy {
            cnt_visited: self.cnt_visited,
            cnt_refs_allocated: self.cnt_refs_allocated,
            cnt_refs_shared: self.cnt_refs_shared,
            cnt_hooks: self.cnt_hooks,
            cnt_zeroed: self.cnt_zeroed,
            cnt_fields_omitted: self.cnt_fields_omitted,
        }
    }
}

#[pymethods]
impl PyReportDeepCopy {
    fn to_dict(&self) -> BTreeMap<String, u64> {
        self.as_report().to_dict()
    }

    #[pyo3(signature = (prefix = "[DEEPCOPY]"))]
    fn format(&self, prefix: &str) -> String {
        self.as_report().format(prefix)
    }

    fn __str__(&self) -> String {
        self.as_report().to_string()
    }
}

fn parse_rule_unsupported(value: &str) -> PyResult<EnumUnsupportedStrategy> {
    match value {
        "error" => Ok(EnumUnsupportedStrategy::Error),
        "zero" => Ok(EnumUnsupportedStrategy::Zero),
        _ => Err(PyValueError::new_err(format!(
            "Invalid unsupported strategy: `{value}`. Expected one of: ['error', 'zero']"
        ))),
    }
}

fn map_deep_copy_error(exception: DeepCopyError) -> PyErr {
    match exception {
        DeepCopyError::UnsupportedType { .. } => PyTypeError::new_err(exception.to_string()),
        DeepCopyError::InvalidDepthLimit(message) => PyValueError::new_err(message),
        DeepCopyError::DepthLimitExceeded { .. } => PyValueError::new_err(exception.to_string()),
        DeepCopyError::ReferenceBusy { .. } => PyRuntimeError::new_err(exception.to_string()),
    }
}

////////////////////////////////////////////////////////////////////////////////
// #region PyHandle

/// How a Python object behind an opaque handle is copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnumPyCopyRoute {
    /// Immutable; the copy shares the object.
    Shared,
    /// Copied by `copy.deepcopy`, which honours `__deepcopy__`.
    Delegate,
    /// No copy capability; left to the unsupported-value policy.
    Unsupported,
}

/// State shared by every handle created during one bridge call.
#[derive(Debug)]
struct SpecPyCopyState {
    /// Memo passed to every `copy.deepcopy` call.
    memo: Py<PyDict>,
    /// First Python exception raised by a delegated copy.
    slot_err: RefCell<Option<PyErr>>,
}

impl SpecPyCopyState {
    fn new(py: Python<'_>) -> Self {
        Self {
            memo: PyDict::new(py).unbind(),
            slot_err: RefCell::new(None),
        }
    }

    fn record_error(&self, err: PyErr) {
        let mut slot = self.slot_err.borrow_mut();
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    fn take_error(&self) -> Option<PyErr> {
        self.slot_err.borrow_mut().take()
    }
}

/// Python object carried through the engine as an opaque handle.
#[derive(Debug)]
struct PyObjectHandle {
    obj: Py<PyAny>,
    ty: String,
    route: EnumPyCopyRoute,
    state: Rc<SpecPyCopyState>,
}

impl PyObjectHandle {
    fn with_object(&self, obj: Py<PyAny>) -> Value {
        Value::opaque(
            &self.ty,
            EnumOpaqueClass::Foreign,
            Rc::new(PyObjectHandle {
                obj,
                ty: self.ty.clone(),
                route: EnumPyCopyRoute::Shared,
                state: Rc::clone(&self.state),
            }),
        )
    }

    fn delegate_copy<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyAny>> {
        py.import("copy")?
            .getattr("deepcopy")?
            .call1((self.obj.bind(py), self.state.memo.bind(py)))
    }
}

impl ForeignObject for PyObjectHandle {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_copier(&self) -> Option<&dyn DeepCopier> {
        match self.route {
            EnumPyCopyRoute::Shared | EnumPyCopyRoute::Delegate => Some(self),
            EnumPyCopyRoute::Unsupported => None,
        }
    }
}

impl DeepCopier for PyObjectHandle {
    fn deep_copy(&self) -> Value {
        Python::with_gil(|py| match self.route {
            EnumPyCopyRoute::Delegate => match self.delegate_copy(py) {
                Ok(obj_dst) => self.with_object(obj_dst.unbind()),
                Err(err) => {
                    // Re-raised once the traversal returns.
                    self.state.record_error(err);
                    Value::nil_opaque(&self.ty, EnumOpaqueClass::Foreign)
                }
            },
            EnumPyCopyRoute::Shared | EnumPyCopyRoute::Unsupported => {
                self.with_object(self.obj.clone_ref(py))
            }
        })
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region PyToValue

fn type_name_of(obj: &Bound<'_, PyAny>) -> PyResult<String> {
    let cls = obj.get_type();
    let c_module: String = cls.getattr("__module__")?.extract()?;
    let c_qualname: String = cls.getattr("__qualname__")?.extract()?;
    Ok(format!("{c_module}.{c_qualname}"))
}

/// Python object graph -> engine value graph.
struct SpecPyToValue<'py> {
    state: Rc<SpecPyCopyState>,
    tuple_shared_types: Bound<'py, PyTuple>,
    tuple_builtin_types: Bound<'py, PyTuple>,
    /// `id()` of each list/dict/instance -> its storage cell.
    dict_refs: HashMap<usize, SpecRef>,
    /// Record type name -> Python class, for rebuilding instances.
    dict_classes: HashMap<String, Py<PyAny>>,
}

impl<'py> SpecPyToValue<'py> {
    fn new(py: Python<'py>, state: Rc<SpecPyCopyState>) -> PyResult<Self> {
        let l_shared_types = L_SHARED_TYPES
            .iter()
            .map(|(c_module, c_name)| py.import(*c_module)?.getattr(*c_name))
            .collect::<PyResult<Vec<_>>>()?;
        let builtins = py.import("builtins")?;
        let l_builtin_types = L_BUILTIN_TYPES
            .iter()
            .map(|c_name| builtins.getattr(*c_name))
            .collect::<PyResult<Vec<_>>>()?;
        Ok(Self {
            state,
            tuple_shared_types: PyTuple::new(py, l_shared_types)?,
            tuple_builtin_types: PyTuple::new(py, l_builtin_types)?,
            dict_refs: HashMap::new(),
            dict_classes: HashMap::new(),
        })
    }

    fn to_elem(&mut self, obj: &Bound<'py, PyAny>) -> PyResult<Value> {
        if obj.is_none() {
            return Ok(Value::nil_dyn(C_TYPE_OBJECT));
        }
        Ok(Value::wrap(C_TYPE_OBJECT, self.to_value(obj)?))
    }

    fn new_handle(
        &self,
        obj: &Bound<'py, PyAny>,
        ty: String,
        route: EnumPyCopyRoute,
    ) -> PyObjectHandle {
        PyObjectHandle {
            obj: obj.clone().unbind(),
            ty,
            route,
            state: Rc::clone(&self.state),
        }
    }

    fn to_opaque(
        &self,
        obj: &Bound<'py, PyAny>,
        ty: String,
        class: EnumOpaqueClass,
        route: EnumPyCopyRoute,
    ) -> Value {
        let value_ty = ty.clone();
        Value::opaque(&value_ty, class, Rc::new(self.new_handle(obj, ty, route)))
    }

    /// Keys are carried, never copied; anything beyond plain scalars travels
    /// as the key object itself.
    fn to_key(&self, obj: &Bound<'py, PyAny>) -> PyResult<MapKey> {
        if obj.is_exact_instance_of::<PyBool>() {
            return Ok(MapKey::Bool(obj.extract()?));
        }
        if obj.is_exact_instance_of::<PyString>() {
            return Ok(MapKey::Text(obj.extract()?));
        }
        if obj.is_exact_instance_of::<PyInt>() {
            if let Ok(n) = obj.extract::<i64>() {
                return Ok(MapKey::Int(n));
            }
        }
        let handle = self.new_handle(obj, type_name_of(obj)?, EnumPyCopyRoute::Shared);
        Ok(MapKey::Foreign(SpecForeignKey::new(Rc::new(handle))))
    }

    /// Reference to the storage cell for `obj`, built once per `id()`.
    fn to_shared<F>(&mut self, obj: &Bound<'py, PyAny>, elem: &str, build: F) -> PyResult<Value>
    where
        F: FnOnce(&mut Self) -> PyResult<Value>,
    {
        let n_id = obj.as_ptr() as usize;
        if let Some(target) = self.dict_refs.get(&n_id) {
            return Ok(Value::ref_to(elem, target));
        }
        let target = SpecRef::new(Value::Nil);
        self.dict_refs.insert(n_id, target.clone());
        let referent = build(self)?;
        target.set(referent);
        Ok(Value::ref_to(elem, &target))
    }

    fn to_value(&mut self, obj: &Bound<'py, PyAny>) -> PyResult<Value> {
        // Exact builtin scalars cannot carry their own `__deepcopy__`.
        if obj.is_exact_instance_of::<PyBool>() {
            return Ok(Value::Bool(obj.extract()?));
        }
        if obj.is_exact_instance_of::<PyInt>() {
            return match obj.extract::<i64>() {
                Ok(n) => Ok(Value::Int(n)),
                Err(_) => Ok(self.to_opaque(
                    obj,
                    type_name_of(obj)?,
                    EnumOpaqueClass::Foreign,
                    EnumPyCopyRoute::Shared,
                )),
            };
        }
        if obj.is_exact_instance_of::<PyFloat>() {
            return Ok(Value::Float(obj.extract()?));
        }
        if obj.is_exact_instance_of::<PyString>() {
            return Ok(Value::Text(obj.extract()?));
        }
        if obj.is_instance_of::<PyType>() {
            return Ok(self.to_opaque(
                obj,
                C_TYPE_CALLABLE.to_string(),
                EnumOpaqueClass::Func,
                EnumPyCopyRoute::Unsupported,
            ));
        }
        if obj.hasattr("__deepcopy__")? {
            let ty = type_name_of(obj)?;
            return Ok(self.to_opaque(obj, ty, EnumOpaqueClass::Foreign, EnumPyCopyRoute::Delegate));
        }
        if obj.is_instance(self.tuple_shared_types.as_any())? {
            let ty = type_name_of(obj)?;
            return Ok(self.to_opaque(obj, ty, EnumOpaqueClass::Foreign, EnumPyCopyRoute::Shared));
        }
        if obj.is_exact_instance_of::<PyTuple>() {
            let tuple = obj.downcast::<PyTuple>()?;
            let l_items = tuple
                .iter()
                .map(|item| self.to_elem(&item))
                .collect::<PyResult<Vec<_>>>()?;
            return Ok(Value::array(C_TYPE_OBJECT, l_items));
        }
        if obj.is_exact_instance_of::<PyList>() {
            let list = obj.downcast::<PyList>()?;
            return self.to_shared(obj, C_TYPE_LIST, |this| {
                let l_items = list
                    .iter()
                    .map(|item| this.to_elem(&item))
                    .collect::<PyResult<Vec<_>>>()?;
                Ok(Value::list(C_TYPE_OBJECT, l_items))
            });
        }
        if obj.is_exact_instance_of::<PyDict>() {
            let dict = obj.downcast::<PyDict>()?;
            return self.to_shared(obj, C_TYPE_DICT, |this| {
                let mut l_entries = Vec::with_capacity(dict.len());
                for (key, item) in dict.iter() {
                    l_entries.push((this.to_key(&key)?, this.to_elem(&item)?));
                }
                Ok(Value::map(C_TYPE_OBJECT, C_TYPE_OBJECT, l_entries))
            });
        }
        // Sets and builtin subclasses keep their own class through `copy.deepcopy`.
        if obj.is_instance(self.tuple_builtin_types.as_any())? {
            let ty = type_name_of(obj)?;
            return Ok(self.to_opaque(obj, ty, EnumOpaqueClass::Foreign, EnumPyCopyRoute::Delegate));
        }
        if obj.is_callable() {
            return Ok(self.to_opaque(
                obj,
                C_TYPE_CALLABLE.to_string(),
                EnumOpaqueClass::Func,
                EnumPyCopyRoute::Unsupported,
            ));
        }
        if obj.hasattr("__dict__")? {
            let ty = type_name_of(obj)?;
            self.dict_classes
                .entry(ty.clone())
                .or_insert_with(|| obj.get_type().into_any().unbind());
            let attrs = obj.getattr("__dict__")?;
            let attrs = attrs.downcast::<PyDict>()?;
            return self.to_shared(obj, &ty, |this| {
                let mut record = SpecRecord::new(&ty);
                for (key, item) in attrs.iter() {
                    let name: String = key.extract()?;
                    record.fields.push(SpecRecordField {
                        exported: !name.starts_with('_'),
                        value: this.to_elem(&item)?,
                        name,
                    });
                }
                Ok(Value::from(record))
            });
        }
        let ty = type_name_of(obj)?;
        Ok(self.to_opaque(obj, ty, EnumOpaqueClass::Foreign, EnumPyCopyRoute::Unsupported))
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ValueToPy

fn handle_object<'py>(
    py: Python<'py>,
    handle: &Rc<dyn ForeignObject>,
    ty: &str,
) -> PyResult<Bound<'py, PyAny>> {
    handle
        .as_any()
        .downcast_ref::<PyObjectHandle>()
        .map(|h| h.obj.bind(py).clone())
        .ok_or_else(|| PyTypeError::new_err(format!("Value of type `{ty}` has no Python object.")))
}

/// Engine value graph -> Python object graph.
struct SpecValueToPy<'py, 'a> {
    py: Python<'py>,
    dict_classes: &'a HashMap<String, Py<PyAny>>,
    /// Storage address -> rebuilt Python object.
    dict_objs: HashMap<usize, Bound<'py, PyAny>>,
}

impl<'py, 'a> SpecValueToPy<'py, 'a> {
    fn new(py: Python<'py>, dict_classes: &'a HashMap<String, Py<PyAny>>) -> Self {
        Self {
            py,
            dict_classes,
            dict_objs: HashMap::new(),
        }
    }

    fn none(&self) -> Bound<'py, PyAny> {
        self.py.None().into_bound(self.py)
    }

    fn to_py_int<T>(&self, n: T) -> Bound<'py, PyAny>
    where
        T: IntoPyObject<
                'py,
                Target = PyInt,
                Output = Bound<'py, PyInt>,
                Error = std::convert::Infallible,
            >,
    {
        match n.into_pyobject(self.py) {
            Ok(obj) => obj.into_any(),
            Err(never) => match never {},
        }
    }

    fn key_to_py(&self, key: &MapKey) -> PyResult<Bound<'py, PyAny>> {
        match key {
            MapKey::Bool(b) => Ok(PyBool::new(self.py, *b).to_owned().into_any()),
            MapKey::Int(n) => Ok(self.to_py_int(*n)),
            MapKey::Uint(n) => Ok(self.to_py_int(*n)),
            MapKey::Text(s) => Ok(PyString::new(self.py, s).into_any()),
            MapKey::Foreign(key) => handle_object(self.py, key.object(), C_TYPE_OBJECT),
            MapKey::Ref(_) => Err(PyTypeError::new_err(
                "Reference map keys cannot be converted to Python objects.",
            )),
        }
    }

    fn record_to_py(
        &mut self,
        record: &SpecRecord,
        target: Option<&SpecRef>,
    ) -> PyResult<Bound<'py, PyAny>> {
        let cls = self
            .dict_classes
            .get(&*record.ty)
            .ok_or_else(|| {
                PyTypeError::new_err(format!("No Python class known for record `{}`.", record.ty))
            })?
            .bind(self.py)
            .clone();
        let obj = cls.call_method1("__new__", (cls.clone(),))?;
        if let Some(target) = target {
            self.dict_objs.insert(target.addr(), obj.clone());
        }
        for field in &record.fields {
            obj.setattr(field.name.as_str(), self.to_py(&field.value)?)?;
        }
        Ok(obj)
    }

    fn ref_to_py(&mut self, target: &SpecRef) -> PyResult<Bound<'py, PyAny>> {
        if let Some(obj) = self.dict_objs.get(&target.addr()) {
            return Ok(obj.clone());
        }
        let referent = target.borrow();
        match &*referent {
            Value::List {
                items: Some(items), ..
            } => {
                let list = PyList::empty(self.py);
                self.dict_objs.insert(target.addr(), list.clone().into_any());
                for item in items {
                    list.append(self.to_py(item)?)?;
                }
                Ok(list.into_any())
            }
            Value::Map {
                entries: Some(entries),
                ..
            } => {
                let dict = PyDict::new(self.py);
                self.dict_objs.insert(target.addr(), dict.clone().into_any());
                for (key, item) in entries {
                    dict.set_item(self.key_to_py(key)?, self.to_py(item)?)?;
                }
                Ok(dict.into_any())
            }
            Value::Record(record) => self.record_to_py(record, Some(target)),
            other => {
                let obj = self.to_py(other)?;
                self.dict_objs.insert(target.addr(), obj.clone());
                Ok(obj)
            }
        }
    }

    fn to_py(&mut self, value: &Value) -> PyResult<Bound<'py, PyAny>> {
        match value {
            Value::Nil => Ok(self.none()),
            Value::Bool(b) => Ok(PyBool::new(self.py, *b).to_owned().into_any()),
            Value::Int(n) => Ok(self.to_py_int(*n)),
            Value::Uint(n) => Ok(self.to_py_int(*n)),
            Value::Float(f) => Ok(PyFloat::new(self.py, *f).into_any()),
            Value::Text(s) => Ok(PyString::new(self.py, s).into_any()),
            Value::Timestamp(_) => Err(PyTypeError::new_err(
                "Engine timestamps have no Python counterpart; datetimes travel as objects.",
            )),
            Value::Array { items, .. } => {
                let l_items = items
                    .iter()
                    .map(|item| self.to_py(item))
                    .collect::<PyResult<Vec<_>>>()?;
                Ok(PyTuple::new(self.py, l_items)?.into_any())
            }
            Value::List { items: None, .. }
            | Value::Map { entries: None, .. }
            | Value::Ref { target: None, .. }
            | Value::Dyn { held: None, .. } => Ok(self.none()),
            Value::List {
                items: Some(items), ..
            } => {
                let list = PyList::empty(self.py);
                for item in items {
                    list.append(self.to_py(item)?)?;
                }
                Ok(list.into_any())
            }
            Value::Map {
                entries: Some(entries),
                ..
            } => {
                let dict = PyDict::new(self.py);
                for (key, item) in entries {
                    dict.set_item(self.key_to_py(key)?, self.to_py(item)?)?;
                }
                Ok(dict.into_any())
            }
            Value::Ref {
                target: Some(target),
                ..
            } => self.ref_to_py(target),
            Value::Dyn {
                held: Some(held), ..
            } => self.to_py(held),
            Value::Record(record) => self.record_to_py(record, None),
            Value::Opaque(opaque) => match &opaque.handle {
                None => Ok(self.none()),
                Some(handle) => handle_object(self.py, handle, &opaque.ty),
            },
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

fn run_deep_copy<'py>(
    obj: &Bound<'py, PyAny>,
    rule_unsupported: &str,
    depth_limit: Option<usize>,
) -> PyResult<(Bound<'py, PyAny>, ReportDeepCopy)> {
    let py = obj.py();
    let spec_dc_options = SpecDeepCopyOptions {
        rule_unsupported: parse_rule_unsupported(rule_unsupported)?,
        depth_limit,
        ..SpecDeepCopyOptions::default()
    };
    if obj.is_none() {
        let (_, report_dc) =
            deep_copy(&Value::Nil, &spec_dc_options).map_err(map_deep_copy_error)?;
        return Ok((obj.clone(), report_dc));
    }

    let state = Rc::new(SpecPyCopyState::new(py));
    let mut conv_src = SpecPyToValue::new(py, Rc::clone(&state))?;
    let res_src = conv_src.to_value(obj);
    let res_dst = match res_src {
        Ok(src) => match deep_copy(&src, &spec_dc_options) {
            Ok((dst, report_dc)) => {
                let res_obj = match state.take_error() {
                    Some(err) => Err(err),
                    None => SpecValueToPy::new(py, &conv_src.dict_classes).to_py(&dst),
                };
                dst.release_refs();
                res_obj.map(|obj_dst| (obj_dst, report_dc))
            }
            Err(err) => Err(map_deep_copy_error(err)),
        },
        Err(err) => Err(err),
    };
    for target in conv_src.dict_refs.values() {
        target.set(Value::Nil);
    }
    res_dst
}

#[pyfunction(name = "copy")]
#[pyo3(signature = (obj, rule_unsupported = "error", depth_limit = None))]
fn copy_py<'py>(
    obj: &Bound<'py, PyAny>,
    rule_unsupported: &str,
    depth_limit: Option<usize>,
) -> PyResult<Bound<'py, PyAny>> {
    let (obj_dst, _) = run_deep_copy(obj, rule_unsupported, depth_limit)?;
    Ok(obj_dst)
}

#[pyfunction(name = "copy_with_report")]
#[pyo3(signature = (obj, rule_unsupported = "error", depth_limit = None))]
fn copy_with_report_py<'py>(
    obj: &Bound<'py, PyAny>,
    rule_unsupported: &str,
    depth_limit: Option<usize>,
) -> PyResult<(Bound<'py, PyAny>, PyReportDeepCopy)> {
    let (obj_dst, report_dc) = run_deep_copy(obj, rule_unsupported, depth_limit)?;
    Ok((obj_dst, PyReportDeepCopy::from(report_dc)))
}

#[pymodule]
fn _axiomkit_deepcopy_rs(module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_class::<PyReportDeepCopy>()?;
    module.add_function(wrap_pyfunction!(copy_py, module)?)?;
    module.add_function(wrap_pyfunction!(copy_with_report_py, module)?)?;
    module.add("__bridge_abi__", N_BRIDGE_ABI_VERSION)?;
    module.add("__bridge_contract__", C_BRIDGE_CONTRACT_VERSION)?;
    module.add("__bridge_transport__", C_BRIDGE_TRANSPORT)?;
    Ok(())
}
