// tests/build_actions.rs

use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use devflow::actions::{Action, CompileAction, ShellAction};
use devflow::config::{Manifest, TargetKind};
use devflow::graph::{leaf, parallel, Scheduler};
use devflow::plan;
use devflow::registry::{Overrides, TargetRegistry};
use devflow_test_utils::builders::{ManifestBuilder, TargetSpecBuilder};
use devflow_test_utils::probes::FakeCompiler;
use devflow_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn registry_for(tmp: &Path, manifest: &Manifest) -> TargetRegistry {
    let overrides = Overrides {
        dest: Some(tmp.join("dist").to_string_lossy().into_owned()),
        ..Overrides::default()
    };
    TargetRegistry::from_manifest(manifest, &overrides).unwrap()
}

#[tokio::test]
async fn copy_mirrors_only_matching_files() -> TestResult {
    init_tracing();
    let tmp = tempfile::tempdir()?;
    let src = tmp.path().join("assets");
    std::fs::create_dir_all(src.join("img"))?;
    std::fs::write(src.join("img/logo.png"), "png")?;
    std::fs::write(src.join("favicon.ico"), "ico")?;
    std::fs::write(src.join("notes.md"), "not an asset")?;

    let manifest = ManifestBuilder::new()
        .with_target(
            "assets",
            TargetSpecBuilder::new(TargetKind::Assets, &src.to_string_lossy(), "static")
                .glob("**/*.png")
                .glob("*.ico")
                .build(),
        )
        .build();
    let registry = registry_for(tmp.path(), &manifest);
    let target = registry.resolve("assets")?;

    with_timeout(Scheduler.run(&plan::target_leaf(target))).await?;

    let dist = tmp.path().join("dist/static");
    assert_eq!(std::fs::read_to_string(dist.join("img/logo.png"))?, "png");
    assert_eq!(std::fs::read_to_string(dist.join("favicon.ico"))?, "ico");
    assert!(!dist.join("notes.md").exists());
    Ok(())
}

#[tokio::test]
async fn compile_writes_bundle_from_sorted_sources() -> TestResult {
    init_tracing();
    let tmp = tempfile::tempdir()?;
    let src = tmp.path().join("styles");
    std::fs::create_dir_all(src.join("pages"))?;
    std::fs::write(src.join("pages/main.scss"), "")?;
    std::fs::write(src.join("app.scss"), "")?;

    let manifest = ManifestBuilder::new()
        .with_target(
            "styles",
            TargetSpecBuilder::new(TargetKind::Styles, &src.to_string_lossy(), "frontend")
                .glob("**/*.scss")
                .bundle("app.css")
                .command("sass")
                .build(),
        )
        .build();
    let registry = registry_for(tmp.path(), &manifest);
    let target = registry.resolve("styles")?;

    let compiler = Arc::new(FakeCompiler::new());
    let graph = leaf(
        "build:styles",
        Arc::new(CompileAction::new(Arc::clone(target), compiler.clone())) as Arc<dyn Action>,
    );
    with_timeout(Scheduler.run(&graph)).await?;

    let invocations = compiler.invocations.lock().unwrap().clone();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].len(), 2);
    // Sorted for deterministic compiler invocations.
    assert!(invocations[0][0].ends_with("app.scss"));
    assert!(invocations[0][1].ends_with("pages/main.scss"));

    let bundle = tmp.path().join("dist/frontend/app.css");
    assert!(bundle.is_file());
    Ok(())
}

#[tokio::test]
async fn same_stem_bundles_in_one_directory_do_not_collide() -> TestResult {
    init_tracing();
    let tmp = tempfile::tempdir()?;
    let scripts_src = tmp.path().join("scripts");
    let styles_src = tmp.path().join("styles");
    std::fs::create_dir_all(&scripts_src)?;
    std::fs::create_dir_all(&styles_src)?;
    std::fs::write(scripts_src.join("main.js"), "")?;
    std::fs::write(styles_src.join("main.scss"), "")?;

    // `app.js` and `app.css` share a directory and a file stem, which
    // validation permits; their scratch files must stay distinct.
    let manifest = ManifestBuilder::new()
        .with_target(
            "scripts",
            TargetSpecBuilder::new(TargetKind::Scripts, &scripts_src.to_string_lossy(), "frontend")
                .glob("**/*.js")
                .bundle("app.js")
                .command("babel")
                .build(),
        )
        .with_target(
            "styles",
            TargetSpecBuilder::new(TargetKind::Styles, &styles_src.to_string_lossy(), "frontend")
                .glob("**/*.scss")
                .bundle("app.css")
                .command("sass")
                .build(),
        )
        .build();
    let registry = registry_for(tmp.path(), &manifest);
    let scripts = registry.resolve("scripts")?;
    let styles = registry.resolve("styles")?;

    // Repeated parallel builds to exercise interleaved write/rename.
    for _ in 0..20 {
        let graph = parallel(
            "build:targets",
            [
                leaf(
                    "build:scripts",
                    Arc::new(CompileAction::new(
                        Arc::clone(scripts),
                        Arc::new(FakeCompiler::new()),
                    )) as Arc<dyn Action>,
                ),
                leaf(
                    "build:styles",
                    Arc::new(CompileAction::new(
                        Arc::clone(styles),
                        Arc::new(FakeCompiler::new()),
                    )) as Arc<dyn Action>,
                ),
            ],
        );
        with_timeout(Scheduler.run(&graph)).await?;

        let js = std::fs::read_to_string(tmp.path().join("dist/frontend/app.js"))?;
        let css = std::fs::read_to_string(tmp.path().join("dist/frontend/app.css"))?;
        assert!(js.contains("main.js"), "app.js got foreign bytes: {js}");
        assert!(css.contains("main.scss"), "app.css got foreign bytes: {css}");
    }
    Ok(())
}

#[tokio::test]
async fn compile_with_no_matching_sources_is_a_no_op() -> TestResult {
    init_tracing();
    let tmp = tempfile::tempdir()?;
    let src = tmp.path().join("styles");
    std::fs::create_dir_all(&src)?;

    let manifest = ManifestBuilder::new()
        .with_target(
            "styles",
            TargetSpecBuilder::new(TargetKind::Styles, &src.to_string_lossy(), "frontend")
                .glob("**/*.scss")
                .bundle("app.css")
                .command("sass")
                .build(),
        )
        .build();
    let registry = registry_for(tmp.path(), &manifest);
    let target = registry.resolve("styles")?;

    let compiler = Arc::new(FakeCompiler::new());
    let graph = leaf(
        "build:styles",
        Arc::new(CompileAction::new(Arc::clone(target), compiler.clone())) as Arc<dyn Action>,
    );
    with_timeout(Scheduler.run(&graph)).await?;

    assert!(compiler.invocations.lock().unwrap().is_empty());
    assert!(!tmp.path().join("dist/frontend/app.css").exists());
    Ok(())
}

#[tokio::test]
async fn build_graph_cleans_before_building() -> TestResult {
    init_tracing();
    let tmp = tempfile::tempdir()?;
    let src = tmp.path().join("assets");
    std::fs::create_dir_all(&src)?;
    std::fs::write(src.join("favicon.ico"), "ico")?;

    // A stale artifact from a previous run.
    let stale = tmp.path().join("dist/static/stale.txt");
    std::fs::create_dir_all(stale.parent().unwrap())?;
    std::fs::write(&stale, "old")?;

    let manifest = ManifestBuilder::new()
        .with_target(
            "assets",
            TargetSpecBuilder::new(TargetKind::Assets, &src.to_string_lossy(), "static")
                .glob("**/*.ico")
                .build(),
        )
        .build();
    let registry = registry_for(tmp.path(), &manifest);

    with_timeout(Scheduler.run(&plan::build_graph(&registry))).await?;

    assert!(!stale.exists());
    assert!(tmp.path().join("dist/static/favicon.ico").is_file());
    Ok(())
}

#[tokio::test]
async fn migrate_without_commands_fails() -> TestResult {
    init_tracing();
    let tmp = tempfile::tempdir()?;
    let src = tmp.path().join("assets");
    std::fs::create_dir_all(&src)?;

    let manifest = ManifestBuilder::new()
        .with_target(
            "assets",
            TargetSpecBuilder::new(TargetKind::Assets, &src.to_string_lossy(), "static")
                .glob("**/*")
                .build(),
        )
        .build();
    let registry = registry_for(tmp.path(), &manifest);

    let result = with_timeout(Scheduler.run(&plan::migrate_graph(&registry, &manifest))).await;
    assert!(result.is_err());
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn shell_action_stops_at_the_first_failing_command() -> TestResult {
    init_tracing();
    let tmp = tempfile::tempdir()?;
    let marker = tmp.path().join("ran.txt");

    let graph = leaf(
        "shell",
        Arc::new(ShellAction::new(
            "shell",
            vec![
                format!("echo first >> {}", marker.display()),
                "exit 7".to_string(),
                format!("echo third >> {}", marker.display()),
            ],
        )) as Arc<dyn Action>,
    );

    let result = with_timeout(Scheduler.run(&graph)).await;
    assert!(result.is_err());
    assert_eq!(std::fs::read_to_string(&marker)?, "first\n");
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn migrate_runs_commands_in_order() -> TestResult {
    init_tracing();
    let tmp = tempfile::tempdir()?;
    let src = tmp.path().join("assets");
    std::fs::create_dir_all(&src)?;
    let marker = tmp.path().join("migrated.txt");

    let manifest = ManifestBuilder::new()
        .with_target(
            "assets",
            TargetSpecBuilder::new(TargetKind::Assets, &src.to_string_lossy(), "static")
                .glob("**/*")
                .build(),
        )
        .with_migrate_command(&format!("echo one >> {}", marker.display()))
        .with_migrate_command(&format!("echo two >> {}", marker.display()))
        .build();
    let registry = registry_for(tmp.path(), &manifest);

    with_timeout(Scheduler.run(&plan::migrate_graph(&registry, &manifest))).await?;

    let contents = std::fs::read_to_string(&marker)?;
    assert_eq!(contents, "one\ntwo\n");
    Ok(())
}
