//! Integration tests for aotwasm-core.
//!
//! These tests drive the complete pipeline the way a host does:
//! - Registry construction from precompiled modules
//! - Loading by metadata view and by contents
//! - Instantiation against an import object
//! - Interaction with exported memories, tables, globals and functions
//! - Trap propagation

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use aotwasm_common::{ExternKind, RefKind, RuntimeConfig, RuntimeError, TrapKind};
use aotwasm_core::trap::raise;
use aotwasm_core::{
    Checksum, Engine, ExportType, Exports, ExternRef, Func, FuncRefTable, FuncType, Global,
    GlobalType, ImportType, Imports, Memory, Module, ModuleMetadataView, ModuleRegistry,
    RegistryEntry, ResolvedImports, StaticLibrary, Table, TableElement, ValType, Value,
    compute_checksum,
};

const EXAMPLE_WASM: &[u8] = b"\0asm\x01\0\0\0example";

// ============================================================================
// Precompiled module stand-in
// ============================================================================

/// What the compiler emits for `example`: it imports a memory and a logging
/// function, and exports the memory, a function table, a counter and two
/// functions.
fn instantiate_example(imports: &ResolvedImports) -> Result<Exports, RuntimeError> {
    let memory = imports.memory("env", "memory")?.share();
    let log = imports.func("env", "log")?.clone();

    let counter = Global::new(GlobalType::I32, 0.0, true);
    let counter_handle = counter.share();

    let store_memory = memory.share();
    let store = Func::new(
        FuncType::new([ValType::I32, ValType::I32], []),
        move |args| {
            let [Value::I32(offset), Value::I32(value)] = args else {
                raise(TrapKind::BadSignature)
            };
            let offset = u64::try_from(*offset).unwrap_or(u64::MAX);
            if store_memory
                .write(offset, &value.to_le_bytes())
                .is_err()
            {
                raise(TrapKind::MemoryOutOfBounds);
            }
            log.call(&[Value::I32(*value)])?;
            let count = counter_handle.get_value()?;
            counter_handle.set_value(count + 1.0)?;
            Ok(vec![])
        },
    );

    let div = Func::new(
        FuncType::new([ValType::I32, ValType::I32], [ValType::I32]),
        |args| match args {
            [Value::I32(_), Value::I32(0)] => raise(TrapKind::IntegerDivisionByZero),
            [Value::I32(a), Value::I32(b)] => Ok(vec![Value::I32(a.wrapping_div(*b))]),
            _ => raise(TrapKind::BadSignature),
        },
    );

    let table = FuncRefTable::new(2, 4)?;
    table.set(0, Some(div.clone()))?;

    Ok(Exports::new()
        .with("memory", memory)
        .with("table", Table::from(table))
        .with("counter", counter)
        .with("store", store)
        .with("div", div))
}

fn example_module() -> Module {
    Module::new(
        "example",
        vec![
            ImportType::new("env", "memory", ExternKind::Memory),
            ImportType::new("env", "log", ExternKind::Function),
        ],
        vec![
            ExportType::new("memory", ExternKind::Memory),
            ExportType::new("table", ExternKind::Table),
            ExportType::new("counter", ExternKind::Global),
            ExportType::new("store", ExternKind::Function),
            ExportType::new("div", ExternKind::Function),
        ],
        instantiate_example,
    )
}

fn engine() -> Engine {
    let registry = ModuleRegistry::new([RegistryEntry::new(
        "example",
        compute_checksum(EXAMPLE_WASM),
        || Ok(example_module()),
    )])
    .unwrap();
    Engine::new(registry, &RuntimeConfig::default())
}

fn example_imports(logged: &Rc<RefCell<Vec<i32>>>) -> (Imports, Memory) {
    let memory = Memory::new(1, 2, false).unwrap();
    let sink = Rc::clone(logged);
    let log = Func::new(FuncType::new([ValType::I32], []), move |args| {
        if let [Value::I32(v)] = args {
            sink.borrow_mut().push(*v);
        }
        Ok(vec![])
    });

    let mut imports = Imports::new();
    imports
        .define("env", "memory", memory.share())
        .define("env", "log", log);
    (imports, memory)
}

// ============================================================================
// Test: Loading
// ============================================================================

#[test]
fn test_load_by_name_checks_checksum() {
    let engine = engine();
    let checksum = compute_checksum(EXAMPLE_WASM);

    let module = engine.load_module_by_name("example", &checksum).unwrap();
    assert_eq!(module.name(), "example");
    assert_eq!(module.imports(), example_module().imports());
    assert_eq!(module.exports(), example_module().exports());

    let other = Checksum::from_hex(&"ff00".repeat(16)).unwrap();
    let err = engine.load_module_by_name("example", &other).unwrap_err();
    assert!(matches!(err, RuntimeError::ChecksumMismatch { .. }));
    assert!(err.is_loading_error());
}

#[test]
fn test_load_from_metadata_view() {
    let engine = engine();
    let view = ModuleMetadataView::encode("example", &compute_checksum(EXAMPLE_WASM)).unwrap();

    let module = engine.load_module(&view).unwrap();
    assert_eq!(module.name(), "example");
}

#[test]
fn test_load_from_contents_matches_by_name() {
    let engine = engine();

    let by_contents = engine.load_module(EXAMPLE_WASM).unwrap();
    let by_name = engine
        .load_module_by_name("example", &compute_checksum(EXAMPLE_WASM))
        .unwrap();
    assert!(Arc::ptr_eq(&by_contents, &by_name));

    let err = engine.load_module(b"\0asm\x01\0\0\0other").unwrap_err();
    assert!(matches!(err, RuntimeError::UnknownModule { .. }));
}

#[test]
fn test_module_not_precompiled() {
    let engine = engine();
    let view = ModuleMetadataView::encode("missing", &compute_checksum(b"missing")).unwrap();

    let err = engine.load_module(&view).unwrap_err();
    assert!(err.to_string().contains("was not precompiled"));
}

// ============================================================================
// Test: Instantiation and exports
// ============================================================================

#[test]
fn test_instance_shares_imported_memory() {
    let engine = engine();
    let module = engine.load_module(EXAMPLE_WASM).unwrap();
    let logged = Rc::new(RefCell::new(Vec::new()));
    let (imports, memory) = example_imports(&logged);

    let instance = module.create_instance(&imports).unwrap();
    let store = instance.get_func("store").unwrap();

    store.call(&[Value::I32(8), Value::I32(0x0102_0304)]).unwrap();

    let mut buf = [0u8; 4];
    memory.read(8, &mut buf).unwrap();
    assert_eq!(buf, [4, 3, 2, 1]);
    assert_eq!(*logged.borrow(), vec![0x0102_0304]);
    assert_eq!(instance.get_global("counter").unwrap().get_value().unwrap(), 1.0);

    // Growth through the instance is visible to the host
    instance.get_memory("memory").unwrap().grow(1).unwrap();
    assert_eq!(memory.size().unwrap(), 2);
}

#[test]
fn test_instances_are_independent() {
    let engine = engine();
    let module = engine.load_module(EXAMPLE_WASM).unwrap();
    let logged = Rc::new(RefCell::new(Vec::new()));

    let (first_imports, _) = example_imports(&logged);
    let (second_imports, _) = example_imports(&logged);
    let mut first = module.create_instance(&first_imports).unwrap();
    let second = module.create_instance(&second_imports).unwrap();

    first
        .get_func("store")
        .unwrap()
        .call(&[Value::I32(0), Value::I32(1)])
        .unwrap();
    first.destroy();
    first.destroy();

    assert!(first.is_destroyed());
    assert!(first.get_export("counter").is_err());
    assert_eq!(second.get_global("counter").unwrap().get_value().unwrap(), 0.0);
    assert!(second.get_func("div").is_ok());
    assert_eq!(module.name(), "example");
}

#[test]
fn test_table_export() {
    let engine = engine();
    let module = engine.load_module(EXAMPLE_WASM).unwrap();
    let logged = Rc::new(RefCell::new(Vec::new()));
    let (imports, _) = example_imports(&logged);
    let instance = module.create_instance(&imports).unwrap();

    let table = instance.get_table("table").unwrap();
    assert_eq!(table.kind(), RefKind::FuncRef);
    assert!(!table.is_owned());

    let TableElement::FuncRef(Some(div)) = table.get_element(0).unwrap() else {
        panic!("expected a function in slot 0");
    };
    assert_eq!(
        div.call(&[Value::I32(9), Value::I32(3)]).unwrap(),
        vec![Value::I32(3)]
    );
    assert!(div.ptr_eq(&instance.get_func("div").unwrap()));

    let err = table
        .set_element(1, ExternRef::new("host").into())
        .unwrap_err();
    assert!(matches!(err, RuntimeError::ElementTypeMismatch { .. }));
    assert!(table.get_element(1).unwrap().is_null());
}

#[test]
fn test_exported_func_kind_checked() {
    let engine = engine();
    let module = engine.load_module(EXAMPLE_WASM).unwrap();
    let logged = Rc::new(RefCell::new(Vec::new()));
    let (imports, _) = example_imports(&logged);
    let instance = module.create_instance(&imports).unwrap();

    assert!(instance.get_memory("div").is_err());
    assert!(instance.get_func("nope").is_err());
}

#[test]
fn test_missing_import_fails_instantiation() {
    let engine = engine();
    let module = engine.load_module(EXAMPLE_WASM).unwrap();

    let mut imports = Imports::new();
    imports.define("env", "memory", Memory::new(1, 1, false).unwrap());

    let err = module.create_instance(&imports).unwrap_err();
    assert!(err.is_link_error());
    assert_eq!(err.to_string(), "Unresolved import: env.log");
}

// ============================================================================
// Test: Traps
// ============================================================================

#[test]
fn test_trap_is_recoverable() {
    let engine = engine();
    let module = engine.load_module(EXAMPLE_WASM).unwrap();
    let logged = Rc::new(RefCell::new(Vec::new()));
    let (imports, memory) = example_imports(&logged);
    let instance = module.create_instance(&imports).unwrap();

    let div = instance.get_func("div").unwrap();
    let err = div.call(&[Value::I32(1), Value::I32(0)]).unwrap_err();
    assert_eq!(err.trap_kind(), Some(TrapKind::IntegerDivisionByZero));

    let store = instance.get_func("store").unwrap();
    let err = store
        .call(&[Value::I32(65_534), Value::I32(7)])
        .unwrap_err();
    assert_eq!(err.trap_kind(), Some(TrapKind::MemoryOutOfBounds));

    // Nothing was left borrowed by the unwind
    assert_eq!(memory.grow(1).unwrap(), 2);
    assert_eq!(div.call(&[Value::I32(8), Value::I32(2)]).unwrap(), vec![Value::I32(4)]);
    assert!(engine.load_module(EXAMPLE_WASM).is_ok());
}

// ============================================================================
// Test: Dynamic library modules
// ============================================================================

#[test]
fn test_registry_over_library() {
    let library = Arc::new(StaticLibrary::new("libexample").with_symbol(
        "example_instantiate",
        instantiate_example,
    ));
    let registry = ModuleRegistry::new([RegistryEntry::new(
        "example",
        compute_checksum(EXAMPLE_WASM),
        move || {
            Module::from_library(
                "example",
                example_module().imports().to_vec(),
                example_module().exports().to_vec(),
                library.clone(),
                "example_instantiate",
            )
        },
    )])
    .unwrap();
    let engine = Engine::new(registry, &RuntimeConfig::default());

    let module = engine.load_module(EXAMPLE_WASM).unwrap();
    let logged = Rc::new(RefCell::new(Vec::new()));
    let (imports, _) = example_imports(&logged);
    let instance = module.create_instance(&imports).unwrap();

    assert!(instance.get_func("div").is_ok());
}

// ============================================================================
// Test: Example scenarios
// ============================================================================

#[test]
fn test_scenario_memory_grow() {
    let memory = Memory::new(1, 2, false).unwrap();

    assert_eq!(memory.grow(1).unwrap(), 2);
    assert!(matches!(
        memory.grow(1),
        Err(RuntimeError::GrowOutOfRange { .. })
    ));
    assert_eq!(memory.size().unwrap(), 2);
}

#[test]
fn test_scenario_funcref_table() {
    let table = Table::new(RefKind::FuncRef, 4, Some(8)).unwrap();
    let func = Func::new(FuncType::default(), |_| Ok(vec![]));

    assert!(matches!(
        table.set_element(10, func.into()),
        Err(RuntimeError::IndexOutOfRange { .. })
    ));
    assert!(matches!(
        table.set_element(0, ExternRef::new(0u8).into()),
        Err(RuntimeError::ElementTypeMismatch { .. })
    ));
}

#[test]
fn test_scenario_immutable_global() {
    let global = Global::new(GlobalType::I32, 5.0, false);

    assert!(matches!(
        global.set_value(10.0),
        Err(RuntimeError::ImmutableGlobal)
    ));
    assert_eq!(global.get_value().unwrap(), 5.0);
}
