//! Integration tests for aotwasm-host.
//!
//! These tests drive the bridge the way a scripting engine binding does:
//! - Load a module from a metadata view and inspect its metadata
//! - Create host objects and link them as imports
//! - Reach exports through handles
//! - Tear everything down

use aotwasm_common::{ExternKind, RefKind, RuntimeConfig, RuntimeError, TrapKind};
use aotwasm_core::trap::raise;
use aotwasm_core::{
    Engine, ExportType, Exports, Func, FuncType, GlobalType, ImportType, Imports, Module,
    ModuleMetadataView, ModuleRegistry, RegistryEntry, ResolvedImports, Table, TableElement,
    ValType, Value, compute_checksum,
};
use aotwasm_host::{HostBridge, HostObject, TableDescriptor};

const ADDER_WASM: &[u8] = b"\0asm\x01\0\0\0adder";

fn instantiate_adder(imports: &ResolvedImports) -> Result<Exports, RuntimeError> {
    let base = imports.global("env", "base")?.share();
    let add = Func::new(
        FuncType::new([ValType::I32], [ValType::I32]),
        move |args| {
            let [Value::I32(x)] = args else {
                raise(TrapKind::BadSignature)
            };
            #[allow(clippy::cast_possible_truncation)]
            let base = base.get_value()? as i32;
            match base.checked_add(*x) {
                Some(sum) => Ok(vec![Value::I32(sum)]),
                None => raise(TrapKind::IntegerOverflow),
            }
        },
    );
    let table = Table::new(RefKind::FuncRef, 1, Some(1))?;
    table.set_element(0, add.clone().into())?;

    Ok(Exports::new().with("add", add).with("funcs", table))
}

fn bridge() -> HostBridge {
    let registry = ModuleRegistry::new([RegistryEntry::new(
        "adder",
        compute_checksum(ADDER_WASM),
        || {
            Ok(Module::new(
                "adder",
                vec![ImportType::new("env", "base", ExternKind::Global)],
                vec![
                    ExportType::new("add", ExternKind::Function),
                    ExportType::new("funcs", ExternKind::Table),
                ],
                instantiate_adder,
            ))
        },
    )])
    .unwrap();
    HostBridge::new(Engine::new(registry, &RuntimeConfig::default()))
}

#[test]
fn test_full_lifecycle() {
    let mut bridge = bridge();

    let view = ModuleMetadataView::encode("adder", &compute_checksum(ADDER_WASM)).unwrap();
    let (module, metadata) = bridge.load_module(&view).unwrap();
    assert_eq!(metadata.name, "adder");
    assert_eq!(metadata.imports.len(), 1);
    assert_eq!(bridge.get_module_metadata(module).unwrap(), metadata);

    let base = bridge.create_global(GlobalType::I32, true, 40.0);
    let mut imports = Imports::new();
    imports.define("env", "base", bridge.import_extern(base).unwrap());

    let instance = bridge.create_instance(module, &imports).unwrap();
    let add = bridge.export_handle(instance, "add").unwrap();

    assert_eq!(
        bridge.call_function(add, &[Value::I32(2)]).unwrap(),
        vec![Value::I32(42)]
    );

    // The instance reads the host's global through the import
    bridge.set_global_value(base, 1.0).unwrap();
    assert_eq!(
        bridge.call_function(add, &[Value::I32(2)]).unwrap(),
        vec![Value::I32(3)]
    );

    bridge.destroy_instance(instance).unwrap();
    bridge.destroy_instance(instance).unwrap();
    assert!(bridge.export_handle(instance, "add").is_err());

    // Exported handles outlive the instance
    assert!(bridge.call_function(add, &[Value::I32(0)]).is_ok());

    bridge.unload_module(module).unwrap();
    assert!(bridge.get_module_metadata(module).is_err());
}

#[test]
fn test_trap_through_handle() {
    let mut bridge = bridge();
    let (module, _) = bridge.load_module(ADDER_WASM).unwrap();

    let base = bridge.create_global(GlobalType::I32, false, f64::from(i32::MAX));
    let mut imports = Imports::new();
    imports.define("env", "base", bridge.import_extern(base).unwrap());

    let instance = bridge.create_instance(module, &imports).unwrap();
    let add = bridge.export_handle(instance, "add").unwrap();

    let err = bridge.call_function(add, &[Value::I32(1)]).unwrap_err();
    assert_eq!(err.trap_kind(), Some(TrapKind::IntegerOverflow));
    assert_eq!(
        bridge.call_function(add, &[Value::I32(-1)]).unwrap(),
        vec![Value::I32(i32::MAX - 1)]
    );
}

#[test]
fn test_exported_table_handle() {
    let mut bridge = bridge();
    let (module, _) = bridge.load_module(ADDER_WASM).unwrap();
    let base = bridge.create_global(GlobalType::I32, false, 0.0);
    let mut imports = Imports::new();
    imports.define("env", "base", bridge.import_extern(base).unwrap());
    let instance = bridge.create_instance(module, &imports).unwrap();

    let funcs = bridge.export_handle(instance, "funcs").unwrap();
    assert!(matches!(bridge.get(funcs).unwrap(), HostObject::Table(_)));
    assert_eq!(bridge.get_table_size(funcs).unwrap(), 1);

    let TableElement::FuncRef(Some(func)) = bridge.get_table_element(funcs, 0).unwrap() else {
        panic!("expected a function");
    };
    assert_eq!(func.call(&[Value::I32(5)]).unwrap(), vec![Value::I32(5)]);

    assert!(matches!(
        bridge.grow_table(funcs, 1, None),
        Err(RuntimeError::GrowOutOfRange { .. })
    ));
}

#[test]
fn test_link_errors() {
    let mut bridge = bridge();
    let (module, _) = bridge.load_module(ADDER_WASM).unwrap();

    let err = bridge.create_instance(module, &Imports::new()).unwrap_err();
    assert!(matches!(err, RuntimeError::ImportResolution { .. }));

    let memory = bridge.create_memory(1, None).unwrap();
    let mut imports = Imports::new();
    imports.define("env", "base", bridge.import_extern(memory).unwrap());
    let err = bridge.create_instance(module, &imports).unwrap_err();
    assert!(matches!(err, RuntimeError::ImportKindMismatch { .. }));

    assert!(bridge.import_extern(module).is_err());
}

#[test]
fn test_unknown_module() {
    let mut bridge = bridge();
    let err = bridge.load_module(b"\0asm\x01\0\0\0").unwrap_err();
    assert!(matches!(err, RuntimeError::UnknownModule { .. }));
    assert!(bridge.is_empty());
}

#[test]
fn test_host_created_table_descriptor() {
    let mut bridge = bridge();
    let table = bridge
        .create_table(&TableDescriptor::new(RefKind::FuncRef, 4).with_maximum(8))
        .unwrap();
    let func = bridge.create_function(Func::new(FuncType::default(), |_| Ok(vec![])));

    assert!(matches!(
        bridge.set_table_element(table, 10, bridge.func(func).unwrap().clone().into()),
        Err(RuntimeError::IndexOutOfRange { .. })
    ));
    bridge
        .set_table_element(table, 3, bridge.func(func).unwrap().clone().into())
        .unwrap();
    assert!(!bridge.get_table_element(table, 3).unwrap().is_null());
    assert_eq!(bridge.len(), 2);
}
