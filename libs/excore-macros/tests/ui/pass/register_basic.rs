use std::collections::BTreeMap;

use excore_core::Value;

#[excore_core::register(field = "Backbone")]
fn resnet(params: BTreeMap<String, Value>) -> anyhow::Result<Value> {
    Ok(Value::Map(params))
}

#[excore_core::register(field = "Backbone", name = "vgg16", required = ["depth"])]
fn vgg(params: BTreeMap<String, Value>) -> anyhow::Result<Value> {
    Ok(Value::Map(params))
}

fn main() {}
