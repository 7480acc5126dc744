use std::collections::BTreeMap;

use excore_core::{RegistryPool, Value};

#[excore_core::register(field = "TestBackbone")]
fn counting_resnet(params: BTreeMap<String, Value>) -> anyhow::Result<Value> {
    Ok(Value::Map(params))
}

#[excore_core::register(field = "TestBackbone", name = "vgg", required = ["depth"])]
fn vgg(params: BTreeMap<String, Value>) -> anyhow::Result<Value> {
    if !params.contains_key("depth") {
        anyhow::bail!("missing depth");
    }
    Ok(Value::Map(params))
}

#[test]
fn registered_target_is_discoverable_after_bootstrap() {
    RegistryPool::bootstrap();
    let pool = RegistryPool::global();
    let registry = pool.get("TestBackbone").expect("field registered by the macro");
    assert!(registry.contains("CountingResnet") || registry.contains("counting_resnet"));
    assert!(registry.contains("vgg"));
}

#[test]
fn required_params_surface_from_the_attribute() {
    RegistryPool::bootstrap();
    let pool = RegistryPool::global();
    let registry = pool.get("TestBackbone").unwrap();
    let descriptor = registry.get("vgg").unwrap();
    assert_eq!(descriptor.factory.required_params(), &["depth"]);
}
