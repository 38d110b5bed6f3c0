//! ConfigObject derive macro 的集成测试

use std::time::Duration;

use livecfg::binder::{TypeDescriptor, Value};
use livecfg::{ConfigObject, Multimap};

#[derive(Debug, Default, Clone, PartialEq, ConfigObject)]
struct Server {
    host: String,
    port: i32,
    debug: bool,
}

#[derive(Debug, Default, Clone, ConfigObject)]
struct Limits {
    #[config(name = "max-body")]
    max_body: i64,
    timeout: Duration,
    ratios: Vec<f64>,
    routes: Multimap<String>,
    #[config(skip)]
    hits: u64,
}

#[test]
fn test_fields_follow_declaration_order() {
    let names: Vec<_> = Server::fields().into_iter().map(|f| f.name).collect();
    assert_eq!(names, vec!["host", "port", "debug"]);
}

#[test]
fn test_renamed_and_skipped_fields() {
    let fields = Limits::fields();
    assert_eq!(fields.len(), 4);
    assert_eq!(fields[0].name, "max-body");
    assert_eq!(fields[0].kind, TypeDescriptor::Long);
    assert_eq!(fields[2].kind, TypeDescriptor::list_of(TypeDescriptor::Double));
    assert_eq!(fields[3].kind, TypeDescriptor::multimap_of(TypeDescriptor::String));
}

#[test]
fn test_apply_field() {
    let mut server = Server::default();
    server.apply_field("host", Value::String("example.org".to_string())).unwrap();
    server.apply_field("port", Value::Int(443)).unwrap();
    server.apply_field("unknown", Value::Bool(true)).unwrap();
    assert_eq!(
        server,
        Server {
            host: "example.org".to_string(),
            port: 443,
            debug: false,
        }
    );
}

#[test]
fn test_apply_field_type_mismatch() {
    let mut limits = Limits {
        hits: 7,
        ..Default::default()
    };
    let err = limits.apply_field("max-body", Value::Bool(true)).unwrap_err();
    assert_eq!(err.raw, "true");
    assert_eq!(limits.max_body, 0);
    assert_eq!(limits.hits, 7);
}
