//! Built-in palette node classes
//!
//! Each class is submitted with `inventory`, so
//! [`NodeClassRegistry::with_builtins`](graph_sync::NodeClassRegistry::with_builtins)
//! picks them up without a central list.

use graph_sync::{GraphNode, NodeClass, NodeClassFn, NodeClassRegistry, NodeInputs, PortDescriptor, PortSide};
use serde_json::{json, Value};

/// Output port shared by every input widget node
pub const PORT_OUTPUT: &str = "Output";
/// Option list port of the choice nodes
pub const PORT_OPTIONS: &str = "Options";
/// Input port of the print node
pub const PORT_INPUT: &str = "Input";

fn widget_class(class_name: &str, value: Value) -> NodeClass {
    NodeClass::new(class_name)
        .with_port(PortDescriptor::source(PORT_OUTPUT, PortSide::Right))
        .with_default_data(json!({ "value": value }))
}

/// A choice node receives its option list from exactly one upstream node
fn choice_class(class_name: &str, value: Value, update: graph_sync::NodeUpdateFn) -> NodeClass {
    NodeClass::new(class_name)
        .with_port(PortDescriptor::target(PORT_OPTIONS, PortSide::Left).with_connection_limit(1))
        .with_port(PortDescriptor::source(PORT_OUTPUT, PortSide::Right))
        .with_default_data(json!({ "value": value, "options": [], "error": Value::Null }))
        .with_update(update)
}

/// What a node exposes to the nodes plugged after it
pub fn output_value(node: &GraphNode) -> Value {
    match node.data.get("value") {
        Some(value) => json!({ "value": value }),
        None => json!({}),
    }
}

/// Option list read from the single `Options` connection
///
/// `Ok(None)` means the upstream node carries no value, in which case the
/// current options are kept.
fn plugged_options(inputs: &NodeInputs<'_>) -> Result<Option<Vec<String>>, &'static str> {
    let [source] = inputs.port(PORT_OPTIONS) else {
        return Err("No node plugged in Options port");
    };
    match source.data.get("value") {
        Some(Value::Array(items)) => Ok(Some(items.iter().map(option_label).collect())),
        Some(_) => Err("'options' found in input is not a list."),
        None => Ok(None),
    }
}

fn option_label(item: &Value) -> String {
    match item {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Shared update of the choice nodes; `pick` keeps the part of the current
/// value that is still offered
fn update_choice(inputs: &NodeInputs<'_>, pick: fn(&Value, &[String]) -> Value) -> Option<Value> {
    match plugged_options(inputs) {
        Ok(Some(options)) => {
            let current = inputs.node.data.get("value").unwrap_or(&Value::Null);
            Some(json!({
                "value": pick(current, &options),
                "options": options,
                "error": Value::Null,
            }))
        }
        Ok(None) => Some(json!({ "error": "No 'options' found in input dict." })),
        Err(error) => Some(json!({ "value": pick(&Value::Null, &[]), "options": [], "error": error })),
    }
}

fn update_select(inputs: &NodeInputs<'_>) -> Option<Value> {
    update_choice(inputs, |current, options| match current {
        Value::String(s) if options.contains(s) => current.clone(),
        _ => options.first().map_or(Value::Null, |o| Value::String(o.clone())),
    })
}

fn update_multi_choice(inputs: &NodeInputs<'_>) -> Option<Value> {
    update_choice(inputs, |current, options| {
        let kept: Vec<Value> = current
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter(|item| item.as_str().is_some_and(|s| options.iter().any(|o| o == s)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Value::Array(kept)
    })
}

/// The print node shows the output of every node plugged into it
fn update_print(inputs: &NodeInputs<'_>) -> Option<Value> {
    let shown: serde_json::Map<String, Value> = inputs
        .port(PORT_INPUT)
        .iter()
        .map(|node| (node.id.clone(), output_value(node)))
        .collect();
    Some(json!({ "inputs": shown }))
}

fn array_input() -> NodeClass {
    widget_class("Array Input", json!([]))
}

fn button() -> NodeClass {
    widget_class("Button", json!(0))
}

fn check_box() -> NodeClass {
    widget_class("Check Box", json!(false))
}

fn color_picker() -> NodeClass {
    widget_class("Color Picker", json!("#000000"))
}

fn float_input() -> NodeClass {
    widget_class("Float Input", json!(0.0))
}

fn int_input() -> NodeClass {
    widget_class("Int Input", json!(0))
}

fn text_input() -> NodeClass {
    widget_class("Text Input", json!(""))
}

fn select() -> NodeClass {
    choice_class("Select", Value::Null, update_select)
}

fn multi_choice() -> NodeClass {
    choice_class("Multi Choice", json!([]), update_multi_choice)
}

fn print() -> NodeClass {
    NodeClass::new("Print")
        .with_port(PortDescriptor::target(PORT_INPUT, PortSide::Left))
        .with_default_data(json!({ "inputs": {} }))
        .with_update(update_print)
}

inventory::submit!(NodeClassFn(array_input));
inventory::submit!(NodeClassFn(button));
inventory::submit!(NodeClassFn(check_box));
inventory::submit!(NodeClassFn(color_picker));
inventory::submit!(NodeClassFn(float_input));
inventory::submit!(NodeClassFn(int_input));
inventory::submit!(NodeClassFn(text_input));
inventory::submit!(NodeClassFn(select));
inventory::submit!(NodeClassFn(multi_choice));
inventory::submit!(NodeClassFn(print));

/// Registry holding every built-in class
///
/// Binaries must reach the submissions above through this module, or the
/// linker may leave them out.
pub fn builtin_registry() -> NodeClassRegistry {
    NodeClassRegistry::with_builtins()
}
