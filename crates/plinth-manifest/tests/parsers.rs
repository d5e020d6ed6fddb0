use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use ashlar::PROJECT_ROOT_ID;
use async_trait::async_trait;
use plinth_manifest::{
    parse_manifest, parser_for, ManifestError, ParseOptions, ParsedManifest, Resolver,
    Result as ManifestResult,
};
use pretty_assertions::assert_eq;

fn write_fixture(dir: &tempfile::TempDir, basename: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(basename);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

#[test]
fn package_json_yields_direct_deps() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(
        &dir,
        "package.json",
        r#"{
            "name": "My-App",
            "version": "0.1.0",
            "dependencies": { "Left-Pad": "^1.3.0", "chalk": "^5.0.0" },
            "devDependencies": { "jest": "^29.0.0" }
        }"#,
    );
    let parser = parser_for("package.json").unwrap();
    assert_eq!(parser.kind(), "package.json");
    assert!(!parser.includes_transitive());

    let parsed = parser.parse(&path).unwrap();
    assert_eq!(parsed.root.name, "my-app");
    assert_eq!(parsed.root.dependencies, vec!["chalk", "jest", "left-pad"]);
    assert_eq!(parsed.graph.node_count(), 4);
    assert!(parsed.graph.has_edge("my-app", "left-pad"));
    assert!(!parsed.includes_transitive);
}

#[test]
fn package_lock_yields_the_transitive_graph() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(
        &dir,
        "package-lock.json",
        r#"{
            "name": "my-app",
            "lockfileVersion": 3,
            "packages": {
                "": { "version": "0.1.0", "dependencies": { "a": "^1.0.0" } },
                "node_modules/a": { "version": "1.0.0", "dependencies": { "b": "^2.0.0" } },
                "node_modules/b": { "version": "2.0.0" }
            }
        }"#,
    );
    let parsed = parser_for("package-lock.json").unwrap().parse(&path).unwrap();
    assert!(parsed.includes_transitive);
    assert_eq!(parsed.graph.ids(), vec!["a", "b", "my-app"]);
    assert!(parsed.graph.has_edge("my-app", "a"));
    assert!(parsed.graph.has_edge("a", "b"));
    assert_eq!(
        parsed.graph.node("b").unwrap().meta.version(),
        Some("2.0.0")
    );
}

#[test]
fn v1_package_locks_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(
        &dir,
        "package-lock.json",
        r#"{ "name": "old", "lockfileVersion": 1, "dependencies": {} }"#,
    );
    let err = parser_for("package-lock.json")
        .unwrap()
        .parse(&path)
        .unwrap_err();
    assert!(matches!(err, ManifestError::InvalidManifest(_)));
}

#[test]
fn cargo_toml_resolves_renamed_dependencies() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(
        &dir,
        "Cargo.toml",
        r#"
            [package]
            name = "my_tool"
            version = "0.2.0"

            [dependencies]
            serde = "1"
            fancy_log = { package = "tracing_subscriber", version = "0.3" }

            [dev-dependencies]
            pretty_assertions = "1"
        "#,
    );
    let parsed = parser_for("Cargo.toml").unwrap().parse(&path).unwrap();
    assert_eq!(parsed.root.name, "my-tool");
    assert_eq!(
        parsed.root.dependencies,
        vec!["pretty-assertions", "serde", "tracing-subscriber"]
    );
}

#[test]
fn cargo_lock_finds_the_root_package() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(
        &dir,
        "Cargo.lock",
        r#"
            version = 3

            [[package]]
            name = "my-tool"
            version = "0.2.0"
            dependencies = ["serde"]

            [[package]]
            name = "serde"
            version = "1.0.152"
            dependencies = ["serde_derive 1.0.152"]

            [[package]]
            name = "serde_derive"
            version = "1.0.152"
        "#,
    );
    let parsed = parser_for("Cargo.lock").unwrap().parse(&path).unwrap();
    assert!(parsed.includes_transitive);
    assert_eq!(parsed.root.name, "my-tool");
    assert!(parsed.graph.has_edge("serde", "serde-derive"));
}

#[test]
fn requirements_txt_skips_options_and_urls() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(
        &dir,
        "requirements.txt",
        r#"
            # Production dependencies
            requests>=2.28
            charset_normalizer (<3)
            -r dev-requirements.txt
            --hash=sha256:deadbeef
            git+https://github.com/psf/black
        "#,
    );
    let parsed = parser_for("requirements.txt").unwrap().parse(&path).unwrap();
    assert_eq!(parsed.root.name, PROJECT_ROOT_ID);
    assert_eq!(
        parsed.root.dependencies,
        vec!["charset-normalizer", "requests"]
    );
}

#[test]
fn unknown_manifests_are_unsupported() {
    assert!(parser_for("Gemfile").is_none());
}

#[derive(Debug)]
struct MarkingResolver;

#[async_trait]
impl Resolver for MarkingResolver {
    async fn expand(&self, mut parsed: ParsedManifest) -> ManifestResult<ParsedManifest> {
        let root = parsed.root.name.clone();
        parsed.graph.add_node("expanded-dep");
        parsed.graph.ensure_edge(&root, "expanded-dep")?;
        parsed.includes_transitive = true;
        Ok(parsed)
    }
}

#[async_std::test]
async fn requirement_files_delegate_expansion_to_the_resolver() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(&dir, "requirements.txt", "requests\n");
    let opts = ParseOptions {
        resolver: Some(Arc::new(MarkingResolver)),
    };
    let parsed = parse_manifest(&path, &opts).await.unwrap();
    assert!(parsed.includes_transitive);
    assert!(parsed.graph.has_node("expanded-dep"));
}

#[async_std::test]
async fn lock_files_do_not_invoke_the_resolver() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(
        &dir,
        "package-lock.json",
        r#"{ "name": "app", "lockfileVersion": 3, "packages": { "": {} } }"#,
    );
    let opts = ParseOptions {
        resolver: Some(Arc::new(MarkingResolver)),
    };
    let parsed = parse_manifest(&path, &opts).await.unwrap();
    assert!(!parsed.graph.has_node("expanded-dep"));
}
