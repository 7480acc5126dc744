use std::collections::BTreeMap;

use excore_core::Value;

#[excore_core::register(name = "ResNet")]
fn resnet(params: BTreeMap<String, Value>) -> anyhow::Result<Value> {
    Ok(Value::Map(params))
}

fn main() {}
