use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;

use archetype_flow::check::check_archetype;
use archetype_flow::choices::{read_choices, ContextValue};
use archetype_flow::config::load_config;
use archetype_flow::error::ArchetypeError;
use archetype_flow::flow::{resolve_batch, Session};
use archetype_flow::output::{select_outputs, MergedValue};
use archetype_flow::path::ContextPath;
use archetype_flow::render::TemplateEngine;
use archetype_flow::{
    generate, load_archetype, plan_generation, plan_outputs, ExternalInputs, GenerateOptions,
};

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn inputs(pairs: &[(&str, &str)]) -> ExternalInputs {
    ExternalInputs {
        values: pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        choices_file: None,
    }
}

fn path(raw: &str) -> ContextPath {
    ContextPath::parse(raw).unwrap()
}

fn targets(outputs: &archetype_flow::output::SelectedOutputs) -> Vec<String> {
    outputs
        .files
        .iter()
        .map(|f| f.target.to_string_lossy().replace('\\', "/"))
        .collect()
}

fn dependencies(outputs: &archetype_flow::output::SelectedOutputs) -> Vec<&str> {
    outputs.model["dependencies"]
        .as_list()
        .unwrap()
        .iter()
        .filter_map(MergedValue::as_text)
        .collect()
}

#[test]
fn test_load_config() {
    let config = load_config(&fixture_path("basic-archetype")).unwrap();
    assert_eq!(config.archetype.descriptor, "archetype.xml");
    assert_eq!(config.choices.file, ".helidon");
    assert_eq!(config.choices.prefix, "FLOW.");
}

#[test]
fn test_load_archetype_expands_invoke() {
    let loaded = load_archetype(&fixture_path("basic-archetype")).unwrap();
    let archetype = &loaded.archetype;

    let steps: Vec<&str> = archetype
        .steps()
        .into_iter()
        .map(|id| archetype.node(id).id.as_str())
        .collect();
    assert_eq!(steps, vec!["project", "features", "mp-extras"]);
    assert!(archetype.node_at(&path("docker.image")).is_some());
    assert!(archetype.node_at(&path("flavor.se")).is_some());
}

#[test]
fn test_batch_resolution_applies_option_presets() {
    let loaded = load_archetype(&fixture_path("basic-archetype")).unwrap();
    let mut session = Session::new(&loaded.archetype);
    session.apply_externals([("flavor", "se")]).unwrap();
    resolve_batch(&mut session).unwrap();

    let tree = session.into_choices();
    assert_eq!(tree.value(&path("media")), Some(&ContextValue::select(["json"])));
    assert!(tree.get(&path("media")).unwrap().read_only);
    assert_eq!(tree.value(&path("docker")), Some(&ContextValue::Boolean(false)));
    assert!(!tree.contains(&path("docker.image")));
    assert!(!tree.contains(&path("openapi")));
}

#[test]
fn test_batch_resolution_requires_flavor() {
    let loaded = load_archetype(&fixture_path("basic-archetype")).unwrap();
    let mut session = Session::new(&loaded.archetype);
    match resolve_batch(&mut session) {
        Err(ArchetypeError::MissingInput { path }) => assert_eq!(path, "flavor"),
        other => panic!("expected MissingInput, got {other:?}"),
    }
}

#[test]
fn test_external_value_wins_over_preset() {
    let outputs = plan_outputs(
        &fixture_path("basic-archetype"),
        &inputs(&[("flavor", "se"), ("media", "jsonp")]),
    )
    .unwrap();
    assert!(!outputs.files.is_empty());

    let loaded = load_archetype(&fixture_path("basic-archetype")).unwrap();
    let mut session = Session::new(&loaded.archetype);
    session
        .apply_externals([("flavor", "se"), ("media", "jsonp")])
        .unwrap();
    resolve_batch(&mut session).unwrap();
    assert_eq!(
        session.tree().value(&path("media")),
        Some(&ContextValue::select(["jsonp"]))
    );
}

#[test]
fn test_select_outputs_for_se() {
    let outputs = plan_outputs(
        &fixture_path("basic-archetype"),
        &inputs(&[("flavor", "se"), ("name", "shop"), ("package", "com.example.shop")]),
    )
    .unwrap();

    assert_eq!(
        targets(&outputs),
        vec![
            "README.md",
            "src/main/java/com/example/shop/Main.java",
            "LICENSE"
        ]
    );
    assert_eq!(outputs.files[0].engine, Some(TemplateEngine::Tera));
    assert_eq!(outputs.files[2].engine, None);

    assert_eq!(outputs.model["artifactId"].as_text(), Some("shop"));
    assert_eq!(outputs.model["package"].as_text(), Some("com.example.shop"));
    assert_eq!(
        outputs.model["mainClass"].as_text(),
        Some("com.example.shop.Main")
    );
    assert_eq!(
        dependencies(&outputs),
        vec![
            "io.helidon.config:helidon-config",
            "io.helidon.webserver:helidon-webserver"
        ]
    );

    let readme = outputs.model["readme"].as_map().unwrap();
    let keys: Vec<&str> = readme.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["title", "footer"]);
}

#[test]
fn test_select_outputs_for_mp_with_docker() {
    let loaded = load_archetype(&fixture_path("basic-archetype")).unwrap();
    let mut session = Session::new(&loaded.archetype);
    session
        .apply_externals([("flavor", "mp"), ("docker", "true")])
        .unwrap();
    resolve_batch(&mut session).unwrap();
    let tree = session.into_choices();
    assert_eq!(tree.value(&path("openapi")), Some(&ContextValue::Boolean(true)));
    assert_eq!(
        tree.value(&path("docker.image")),
        Some(&ContextValue::Text("myapp:latest".into()))
    );

    let outputs = select_outputs(&loaded.archetype, &tree).unwrap();
    assert!(targets(&outputs).contains(&"Dockerfile".to_string()));
    assert_eq!(
        dependencies(&outputs),
        vec![
            "io.helidon.microprofile.bundles:helidon-microprofile",
            "io.helidon.webserver:helidon-webserver",
            "io.helidon.health:helidon-health"
        ]
    );
}

#[test]
fn test_generate_writes_files_and_choices() {
    let output_dir = tempfile::tempdir().unwrap();
    let out = output_dir.path().join("shop");

    let result = generate(
        GenerateOptions {
            archetype: fixture_path("basic-archetype"),
            output: Some(out.clone()),
            inputs: inputs(&[("flavor", "se"), ("name", "shop"), ("package", "com.example.shop")]),
            overwrite: false,
        },
        None,
    )
    .unwrap();

    assert_eq!(result.files_created.len(), 2);
    assert_eq!(result.files_copied.len(), 1);

    let readme = fs::read_to_string(out.join("README.md")).unwrap();
    assert!(readme.starts_with("# shop"));
    assert!(readme.contains("Helidon application (se)"));
    let config_dep = readme.find("- io.helidon.config:helidon-config").unwrap();
    let server_dep = readme.find("- io.helidon.webserver:helidon-webserver").unwrap();
    assert!(config_dep < server_dep);
    assert!(readme.contains("Generated by archetype-flow"));

    let main = fs::read_to_string(out.join("src/main/java/com/example/shop/Main.java")).unwrap();
    assert!(main.starts_with("package com.example.shop;"));
    assert_eq!(
        fs::read_to_string(out.join("LICENSE")).unwrap(),
        "Apache License 2.0\n"
    );

    let persisted = read_choices(&out.join(".helidon"), "FLOW.").unwrap();
    assert!(persisted
        .choices
        .contains(&("flavor".to_string(), "se".to_string())));
    assert!(persisted
        .choices
        .contains(&("media".to_string(), "json".to_string())));
}

#[test]
fn test_replaying_choices_file_reproduces_outputs() {
    let output_dir = tempfile::tempdir().unwrap();
    let out = output_dir.path().join("app");
    generate(
        GenerateOptions {
            archetype: fixture_path("basic-archetype"),
            output: Some(out.clone()),
            inputs: inputs(&[("flavor", "mp"), ("docker", "true")]),
            overwrite: false,
        },
        None,
    )
    .unwrap();

    let replayed = plan_outputs(
        &fixture_path("basic-archetype"),
        &ExternalInputs {
            values: Vec::new(),
            choices_file: Some(out.join(".helidon")),
        },
    )
    .unwrap();
    assert!(targets(&replayed).contains(&"Dockerfile".to_string()));
    assert_eq!(dependencies(&replayed)[0], "io.helidon.microprofile.bundles:helidon-microprofile");
}

fn renamed_file_archetype(root: &std::path::Path) -> PathBuf {
    let archetype = root.join("archetype");
    fs::create_dir_all(archetype.join("files")).unwrap();
    fs::write(archetype.join("files/__name__.txt"), "hello").unwrap();
    fs::write(
        archetype.join("helidon-archetype.xml"),
        r#"<archetype-flow>
             <flow-step id="project">
               <flow-input id="name" type="text" default="app"/>
             </flow-step>
             <output>
               <transformation id="named">
                 <replace regex="__name__" replacement="${name}"/>
               </transformation>
               <files transformations="named"><directory>files</directory></files>
             </output>
           </archetype-flow>"#,
    )
    .unwrap();
    archetype
}

#[test]
fn test_generated_files_stay_inside_output_dir() {
    let root = tempfile::tempdir().unwrap();
    let archetype = renamed_file_archetype(root.path());
    let out = root.path().join("work/out");

    let result = generate(
        GenerateOptions {
            archetype: archetype.clone(),
            output: Some(out.clone()),
            inputs: inputs(&[("name", "../../escaped")]),
            overwrite: false,
        },
        None,
    );
    assert!(matches!(result, Err(ArchetypeError::OutputResolution { .. })));
    assert!(!root.path().join("escaped.txt").exists());
    assert!(!root.path().join("work/escaped.txt").exists());

    let result = generate(
        GenerateOptions {
            archetype,
            output: Some(out.clone()),
            inputs: inputs(&[("name", "shop")]),
            overwrite: false,
        },
        None,
    )
    .unwrap();
    assert_eq!(result.files_copied, vec![PathBuf::from("shop.txt")]);
    assert_eq!(fs::read_to_string(out.join("shop.txt")).unwrap(), "hello");
}

#[test]
fn test_plan_generation_refuses_non_empty_output() {
    let output_dir = tempfile::tempdir().unwrap();
    fs::write(output_dir.path().join("existing.txt"), "keep").unwrap();

    let result = plan_generation(
        GenerateOptions {
            archetype: fixture_path("basic-archetype"),
            output: Some(output_dir.path().to_path_buf()),
            inputs: inputs(&[("flavor", "se")]),
            overwrite: false,
        },
        None,
    );
    assert!(matches!(result, Err(ArchetypeError::OutputExists { .. })));
}

#[test]
fn test_plan_generation_writes_nothing() {
    let output_dir = tempfile::tempdir().unwrap();
    let out = output_dir.path().join("planned");

    let plan = plan_generation(
        GenerateOptions {
            archetype: fixture_path("basic-archetype"),
            output: Some(out.clone()),
            inputs: inputs(&[("flavor", "se")]),
            overwrite: false,
        },
        None,
    )
    .unwrap();
    assert_eq!(plan.render_plan.files.len(), 3);
    assert!(!out.exists());
}

#[test]
fn test_check_fixture_is_valid() {
    let result = check_archetype(&fixture_path("basic-archetype")).unwrap();
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert_eq!(result.step_count, 3);
    assert_eq!(result.output_count, 5);
}

#[test]
fn test_cyclic_invoke_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("helidon-archetype.xml"),
        r#"<archetype-flow><invoke src="a.xml"/></archetype-flow>"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("a.xml"),
        r#"<archetype-flow><invoke src="helidon-archetype.xml"/></archetype-flow>"#,
    )
    .unwrap();

    match load_archetype(dir.path()) {
        Err(ArchetypeError::CyclicInvoke { chain }) => assert!(chain.len() >= 2),
        Err(other) => panic!("expected CyclicInvoke, got {other:?}"),
        Ok(_) => panic!("expected CyclicInvoke"),
    }
}

#[test]
fn test_cli_check() {
    Command::cargo_bin("archetype")
        .unwrap()
        .arg("check")
        .arg(fixture_path("basic-archetype"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Archetype is valid!"));
}

#[test]
fn test_cli_outputs_prints_json() {
    Command::cargo_bin("archetype")
        .unwrap()
        .arg("outputs")
        .arg(fixture_path("basic-archetype"))
        .args(["-i", "flavor=se"])
        .assert()
        .success()
        .stdout(predicate::str::contains("io.helidon.config:helidon-config"))
        .stdout(predicate::str::contains("\"artifactId\": \"myapp\""));
}

#[test]
fn test_cli_batch_generate_reports_missing_input() {
    let output_dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("archetype")
        .unwrap()
        .arg("generate")
        .arg(fixture_path("basic-archetype"))
        .arg("-o")
        .arg(output_dir.path().join("out"))
        .arg("--batch")
        .assert()
        .failure()
        .stderr(predicate::str::contains("flavor"));
}

#[test]
fn test_cli_batch_generate() {
    let output_dir = tempfile::tempdir().unwrap();
    let out = output_dir.path().join("out");
    Command::cargo_bin("archetype")
        .unwrap()
        .arg("generate")
        .arg(fixture_path("basic-archetype"))
        .arg("-o")
        .arg(&out)
        .args(["--batch", "-i", "flavor=mp", "--input", "name=orders"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Project generated at"));

    assert!(out.join("README.md").exists());
    assert!(out.join("src/main/java/com/example/myapp/Main.java").exists());
}

#[test]
fn test_cli_rejects_malformed_input() {
    Command::cargo_bin("archetype")
        .unwrap()
        .arg("outputs")
        .arg(fixture_path("basic-archetype"))
        .args(["-i", "flavor"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("PATH=VALUE"));
}
