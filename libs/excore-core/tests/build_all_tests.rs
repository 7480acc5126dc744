//! End-to-end TOML-to-built-object-graph tests, exercising `LazyConfig`
//! against a small set of `#[excore::register]`-annotated targets. Mirrors
//! the teacher's `tests/macro_tests.rs` convention: targets live at module
//! scope so `inventory` can find them at link time.

use std::collections::{BTreeMap, HashMap};

use excore_core::config_dict::WorkspaceContext;
use excore_core::lazy_config::{BuildContext, LazyConfig};
use excore_core::registry::RegistryPool;
use excore_core::value::Value;

#[excore_core::register(field = "Backbone", name = "resnet18", required = ["depth"])]
fn resnet(params: BTreeMap<String, Value>) -> anyhow::Result<Value> {
    if !params.contains_key("depth") {
        anyhow::bail!("resnet requires `depth`");
    }
    Ok(Value::Map(params))
}

#[excore_core::register(field = "Model")]
fn fcn(params: BTreeMap<String, Value>) -> anyhow::Result<Value> {
    Ok(Value::Map(params))
}

fn workspace_context() -> WorkspaceContext {
    let mut primary_to_registry = HashMap::new();
    primary_to_registry.insert("Model".to_string(), "Model".to_string());
    WorkspaceContext {
        primary_fields: vec!["Model".to_string()],
        primary_to_registry,
        validate: true,
    }
}

#[test]
fn builds_a_shared_backbone_graph_end_to_end() {
    RegistryPool::bootstrap();
    let pool = RegistryPool::global();

    let toml = r#"
        [Model.Fcn]
        "!backbone" = "resnet18"

        [Backbone.resnet18]
        depth = 50
    "#;
    let raw = excore_core::config_dict::ConfigDict::from_toml_str(toml, "model.toml").unwrap();
    let mut lazy = LazyConfig::new(raw, workspace_context(), BuildContext::default());

    let output = lazy.build_all(pool).unwrap();
    let fcn = output.primary_modules.get("Model").expect("Model built");
    let fcn_map = fcn.as_map().expect("Model resolves to a map");
    assert!(fcn_map.contains_key("Fcn"));
}

#[test]
fn reports_missing_required_param_as_an_instantiation_error() {
    RegistryPool::bootstrap();
    let pool = RegistryPool::global();

    let toml = r#"
        [Model.Bad]
        "!backbone" = "resnet18"
    "#;
    let raw = excore_core::config_dict::ConfigDict::from_toml_str(toml, "bad.toml").unwrap();
    let mut lazy = LazyConfig::new(raw, workspace_context(), BuildContext::default());

    let result = lazy.build_all(pool);
    assert!(result.is_err());
}

#[test]
fn auxiliary_data_survives_alongside_primary_modules() {
    RegistryPool::bootstrap();
    let pool = RegistryPool::global();

    let toml = r#"
        [Server]
        port = 8080

        [Model.Fcn2]
        "!backbone" = "resnet18"

        [Backbone.resnet18]
        depth = 34
    "#;
    let raw = excore_core::config_dict::ConfigDict::from_toml_str(toml, "mixed.toml").unwrap();
    let mut lazy = LazyConfig::new(raw, workspace_context(), BuildContext::default());

    let output = lazy.build_all(pool).unwrap();
    assert!(output.primary_modules.contains_key("Model"));
    assert!(output.auxiliary.contains_key("Server"));
}
