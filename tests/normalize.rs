//! End-to-end behaviour of the rename and rewrite passes on real trees.

use protogen::pipeline::{self, Stage};
use protogen::renamer::{self, RenameRule};
use protogen::rewriter;
use protogen::target::{PostProcess, TargetConfig};
use protogen::NormalizeError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const GEN_TO_ALT: RenameRule = RenameRule {
    match_suffix: "_gen.js",
    replacement_suffix: ".alt",
    old_extension: ".js",
    new_extension: ".alt",
    old_specifier_extension: ".js",
    new_specifier_extension: ".alt",
};

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn read(root: &Path, rel: &str) -> String {
    std::fs::read_to_string(root.join(rel)).unwrap()
}

/// Relative path -> bytes for every file under `root`.
fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    fn visit(root: &Path, dir: &Path, out: &mut BTreeMap<PathBuf, Vec<u8>>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                visit(root, &path, out);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_path_buf();
                out.insert(rel, std::fs::read(&path).unwrap());
            }
        }
    }
    let mut out = BTreeMap::new();
    visit(root, root, &mut out);
    out
}

async fn normalize(root: &Path, rules: &[RenameRule]) -> Result<(), NormalizeError> {
    let mappings = renamer::rename_generated(root, rules).await?;
    rewriter::rewrite_imports(root, &mappings).await?;
    Ok(())
}

#[tokio::test]
async fn scenario_a_renames_and_rewrites_parent_import() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "a/foo_gen.js", "export default 1;\n");
    write(root, "a/b/bar_gen.js", "import x from \"../foo_gen.js\";\n");

    normalize(root, &[GEN_TO_ALT]).await.unwrap();

    assert!(!root.join("a/foo_gen.js").exists());
    assert_eq!(read(root, "a/foo.alt"), "export default 1;\n");
    assert!(!root.join("a/b/bar_gen.js").exists());
    assert_eq!(read(root, "a/b/bar.alt"), "import x from \"../foo.alt\";\n");
}

#[tokio::test]
async fn scenario_b_collision_leaves_both_files() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "a/foo_gen.js", "generated");
    write(root, "a/foo.alt", "hand written");

    let err = normalize(root, &[GEN_TO_ALT]).await.unwrap_err();

    assert!(matches!(err, NormalizeError::RenameCollision { .. }));
    assert_eq!(read(root, "a/foo_gen.js"), "generated");
    assert_eq!(read(root, "a/foo.alt"), "hand written");
}

#[tokio::test]
async fn scenario_c_flag_off_leaves_tree_untouched() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "greeter_pb.js", "var x = require('./other_pb.js');\n");
    write(root, "other_pb.js", "module.exports = {};\n");
    write(root, "greeter_pb.d.ts", "import * as o from \"./other_pb\";\n");
    let before = snapshot(root);

    let target = TargetConfig {
        name: "node".to_string(),
        out: root.to_path_buf(),
        invocations: vec![],
        post_process: None,
    };
    let report = pipeline::run_target(&target, None).await;

    assert_eq!(report.stage, Stage::Done);
    assert_eq!(snapshot(root), before);
}

#[tokio::test]
async fn dual_module_tree_resolves_after_rewrite() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(
        root,
        "greeter/v1/greeter_grpc_pb.js",
        "'use strict';\r\nvar grpc = require('@grpc/grpc-js');\r\nvar greeter_v1_greeter_pb = require('./greeter_pb.js');\r\nvar common_pb = require('../../common/common_pb.js');\r\n",
    );
    write(root, "greeter/v1/greeter_pb.js", "var common_pb = require('../../common/common_pb.js');\n");
    write(
        root,
        "greeter/v1/greeter_pb.d.ts",
        "import * as jspb from \"google-protobuf\";\nimport * as common_pb from \"../../common/common_pb\";\n",
    );
    write(root, "common/common_pb.js", "module.exports = {};\n");
    write(root, "common/common_pb.d.ts", "export class Empty {}\n");
    write(root, "index.ts", "export * from \"./greeter/v1/greeter_pb\";\n");
    write(root, "README.md", "see './greeter/v1/greeter_pb.js'\n");

    let target = TargetConfig {
        name: "node".to_string(),
        out: root.to_path_buf(),
        invocations: vec![],
        post_process: Some(PostProcess::DualModule),
    };
    let report = pipeline::run_target(&target, None).await;

    assert_eq!(report.stage, Stage::Done, "{:?}", report.error);
    assert_eq!(report.renamed, 5);
    assert_eq!(
        read(root, "greeter/v1/greeter_grpc_pb.cjs"),
        "'use strict';\r\nvar grpc = require('@grpc/grpc-js');\r\nvar greeter_v1_greeter_pb = require('./greeter_pb.cjs');\r\nvar common_pb = require('../../common/common_pb.cjs');\r\n"
    );
    assert_eq!(
        read(root, "greeter/v1/greeter_pb.cjs"),
        "var common_pb = require('../../common/common_pb.cjs');\n"
    );
    assert_eq!(
        read(root, "greeter/v1/greeter_pb.d.cts"),
        "import * as jspb from \"google-protobuf\";\nimport * as common_pb from \"../../common/common_pb.cjs\";\n"
    );
    assert_eq!(
        read(root, "index.ts"),
        "export * from \"./greeter/v1/greeter_pb.cjs\";\n"
    );
    // The heuristic matches any literal candidate, not just import statements.
    assert_eq!(read(root, "README.md"), "see './greeter/v1/greeter_pb.cjs'\n");
}

#[tokio::test]
async fn unrelated_files_stay_byte_identical() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "a/foo_gen.js", "export {};\n");
    write(root, "a/plain.js", "import y from './elsewhere.js';\r\nconst s = 'foo_gen.js';");
    std::fs::write(root.join("a/blob.bin"), [0u8, 159, 146, 150, b'\n']).unwrap();
    let plain_before = std::fs::read(root.join("a/plain.js")).unwrap();

    normalize(root, &[GEN_TO_ALT]).await.unwrap();

    assert_eq!(std::fs::read(root.join("a/plain.js")).unwrap(), plain_before);
    assert_eq!(
        std::fs::read(root.join("a/blob.bin")).unwrap(),
        vec![0u8, 159, 146, 150, b'\n']
    );
}

#[tokio::test]
async fn rewrite_pass_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "a/foo_gen.js", "export {};\n");
    write(root, "a/b/user.js", "import f from '../foo_gen';\n");

    let mappings = renamer::rename_generated(root, &[GEN_TO_ALT]).await.unwrap();
    let first = rewriter::rewrite_imports(root, &mappings).await.unwrap();
    let after_first = snapshot(root);
    let second = rewriter::rewrite_imports(root, &mappings).await.unwrap();

    assert_eq!(first.replacements, 1);
    assert_eq!(second.replacements, 0);
    assert_eq!(snapshot(root), after_first);
    assert_eq!(read(root, "a/b/user.js"), "import f from '../foo.alt';\n");
}
