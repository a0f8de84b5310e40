//! Compiles rule files from a temp directory and scans crafted text.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use pastewatch_rules::{compile, compile_with_globals, CompileError, RuleCompiler, RuleDescriptorSet};

const AWS_RULE: &str = r#"
rule aws_key {
    strings:
        $a = "AKIA"
    condition:
        $a
}
"#;

const PASSWORD_RULE: &str = r#"
rule password_dump {
    strings:
        $p = "password:" nocase
    condition:
        #p >= 2
}
"#;

fn write(dir: &Path, name: &str, contents: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path.display().to_string()
}

fn descriptors(args: &[String]) -> RuleDescriptorSet {
    let mut set = RuleDescriptorSet::new();
    for arg in args {
        set.push_arg(arg).unwrap();
    }
    set
}

#[test]
fn valid_sources_compile_and_match() {
    let dir = TempDir::new().unwrap();
    let aws = write(dir.path(), "aws.yar", AWS_RULE);
    let pw = write(dir.path(), "pw.yar", PASSWORD_RULE);

    let set = descriptors(&[aws, format!("creds:{pw}")]);
    let engine = compile(&set).unwrap();
    assert_eq!(engine.rule_count(), 2);

    let matches = engine
        .scan_str("key=AKIAABCDEFGH password: a Password: b")
        .unwrap();
    let names: Vec<_> = matches.iter().map(|m| m.rule_name.as_str()).collect();
    assert!(names.contains(&"aws_key"));
    assert!(names.contains(&"creds:password_dump"));

    assert!(engine.scan_str("nothing to see here").unwrap().is_empty());
}

#[test]
fn same_rule_name_in_distinct_namespaces() {
    let dir = TempDir::new().unwrap();
    let a = write(dir.path(), "a.yar", AWS_RULE);
    let b = write(dir.path(), "b.yar", AWS_RULE);

    let set = descriptors(&[format!("first:{a}"), format!("second:{b}")]);
    let engine = compile(&set).unwrap();

    let names: Vec<_> = engine
        .scan_str("AKIA")
        .unwrap()
        .into_iter()
        .map(|m| m.rule_name)
        .collect();
    assert!(names.contains(&"first:aws_key".to_string()));
    assert!(names.contains(&"second:aws_key".to_string()));
}

#[test]
fn unreadable_source_aborts_compilation() {
    let dir = TempDir::new().unwrap();
    let good = write(dir.path(), "good.yar", AWS_RULE);
    let missing = dir.path().join("missing.yar").display().to_string();

    let set = descriptors(&[good, missing.clone()]);
    match compile(&set) {
        Err(CompileError::SourceOpen { path, .. }) => assert_eq!(path, missing),
        other => panic!("expected SourceOpen, got: {other:?}"),
    }
}

#[test]
fn malformed_source_aborts_compilation() {
    let dir = TempDir::new().unwrap();
    let bad = write(dir.path(), "bad.yar", "rule broken { condition: }");

    let set = descriptors(&[format!("ns:{bad}")]);
    match compile(&set) {
        Err(CompileError::SourceParse { path, cause }) => {
            assert_eq!(path, bad);
            assert!(!cause.is_empty());
        }
        other => panic!("expected SourceParse, got: {other:?}"),
    }
}

#[test]
fn non_utf8_source_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("latin1.yar");
    fs::write(&path, b"rule caf\xe9 { condition: true }\n").unwrap();
    let path = path.display().to_string();

    let set = descriptors(&[path.clone()]);
    match compile(&set) {
        Err(CompileError::SourceParse { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected SourceParse, got: {other:?}"),
    }
}

#[test]
fn empty_descriptor_set_is_refused() {
    let err = compile(&RuleDescriptorSet::new()).unwrap_err();
    assert!(matches!(err, CompileError::Finalize(_)));
}

#[test]
fn builder_registers_inline_sources() {
    let mut compiler = RuleCompiler::new().unwrap();
    compiler.add_source("", "<inline>", AWS_RULE).unwrap();
    assert_eq!(compiler.registered(), 1);

    let engine = compiler.finalize().unwrap();
    assert_eq!(engine.scan(b"xxAKIAxx").unwrap()[0].rule_name, "aws_key");
}

#[test]
fn globals_are_visible_to_rules() {
    let dir = TempDir::new().unwrap();
    let rule = write(
        dir.path(),
        "strict.yar",
        "rule strict_mode { condition: strict }",
    );
    let set = descriptors(&[rule]);

    let on = compile_with_globals(&set, &["strict=true".parse().unwrap()]).unwrap();
    assert_eq!(on.scan_str("anything").unwrap().len(), 1);

    let off = compile_with_globals(&set, &["strict=false".parse().unwrap()]).unwrap();
    assert!(off.scan_str("anything").unwrap().is_empty());
}

#[test]
fn undefined_identifier_without_global_fails_to_parse() {
    let dir = TempDir::new().unwrap();
    let rule = write(
        dir.path(),
        "strict.yar",
        "rule strict_mode { condition: strict }",
    );
    let err = compile(&descriptors(&[rule])).unwrap_err();
    assert!(matches!(err, CompileError::SourceParse { .. }));
}

#[test]
fn invalid_global_name_fails_instantiation() {
    let result = RuleCompiler::with_globals(&["not-an-identifier=1".parse().unwrap()]);
    assert!(matches!(result, Err(CompileError::Init(_))));
}
