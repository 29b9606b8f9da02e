use super::{PythonScript, MESSAGES_DIR, REQUIREMENTS_FILE};
use crate::message::test_support::message;
use crate::script::{Script, ScriptContext};
use crate::templates;
use serde_json::{json, Value};
use std::fs;

fn default_script() -> String {
    [
        templates::PYTHON_IMPORTS,
        templates::PYTHON_VARIABLES,
        templates::PYTHON_METHODS,
        templates::PYTHON_MAIN,
        templates::PYTHON_END,
    ]
    .concat()
}

fn rendered(script: &mut PythonScript) -> (String, String) {
    let text = String::from_utf8(script.render_script().expect("render script")).expect("utf8");
    let reqs = String::from_utf8(script.render_requirements().expect("render requirements"))
        .expect("utf8");
    (text, reqs)
}

#[test]
fn default_script_is_template_sequence() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut script = PythonScript::new(dir.path()).expect("script");
    let (text, reqs) = rendered(&mut script);
    assert_eq!(text, default_script());
    assert_eq!(reqs, templates::PYTHON_REQUIREMENTS);
    assert!(dir.path().join(MESSAGES_DIR).is_dir());
}

#[test]
fn registered_import_is_prepended_to_imports() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut script = PythonScript::new(dir.path()).expect("script");
    script.register_import("test").expect("import");
    script.register_import("other").expect("import");
    script.register_import("test").expect("repeated import");
    let (text, _) = rendered(&mut script);
    assert_eq!(text, format!("import other\nimport test\n{}", default_script()));
}

#[test]
fn registered_requirement_is_appended() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut script = PythonScript::new(dir.path()).expect("script");
    script.register_requirement("test == 1.2.3").expect("requirement");
    script.register_requirement("test == 1.2.3").expect("repeated requirement");
    let (_, reqs) = rendered(&mut script);
    assert_eq!(reqs, format!("{}test == 1.2.3\n", templates::PYTHON_REQUIREMENTS));
}

#[test]
fn body_sits_between_main_and_end() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut script = PythonScript::new(dir.path()).expect("script");
    script.write("    first()\n").expect("write");
    script.write("    second()\n").expect("write");
    let (text, _) = rendered(&mut script);
    let expected = [
        templates::PYTHON_IMPORTS,
        templates::PYTHON_VARIABLES,
        templates::PYTHON_METHODS,
        templates::PYTHON_MAIN,
        "    first()\n    second()\n",
        templates::PYTHON_END,
    ]
    .concat();
    assert_eq!(text, expected);
}

#[test]
fn resource_is_stored_as_wire_json() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut script = PythonScript::new(dir.path()).expect("script");
    let msg = message("fix", "NewOrderSingle", json!({ "price": "10" }));
    script.register_resource("order-1", &msg).expect("resource");

    let path = dir.path().join(MESSAGES_DIR).join("order-1.json");
    let stored: Value =
        serde_json::from_str(&fs::read_to_string(path).expect("read resource")).expect("json");
    assert_eq!(stored["metadata"]["messageType"], "NewOrderSingle");
    assert_eq!(stored["fields"]["price"]["simpleValue"], "10");
}

#[test]
fn resource_id_cannot_escape_messages_dir() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut script = PythonScript::new(dir.path()).expect("script");
    let msg = message("fix", "NewOrderSingle", json!({}));
    assert!(script.register_resource("../escape", &msg).is_err());
}

#[test]
fn close_writes_script_and_requirements_once() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut script = PythonScript::new(dir.path()).expect("script");
    script.write("    replay()\n").expect("write");

    let paths = script.close().expect("close");
    assert_eq!(paths.len(), 2);
    let name = paths[0]
        .file_name()
        .and_then(|name| name.to_str())
        .expect("script name");
    assert!(name.starts_with("script-") && name.ends_with(".py"), "{name}");
    assert!(fs::read_to_string(&paths[0])
        .expect("read script")
        .contains("    replay()\n"));
    assert_eq!(paths[1], dir.path().join(REQUIREMENTS_FILE));

    assert!(script.close().is_err());
    assert!(script.write("late").is_err());
}
