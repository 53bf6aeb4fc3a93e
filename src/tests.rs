use std::fs;
use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use crate::config::RunConfig;
use crate::driver::{run_with, DriverError};
use crate::module::{ImportContext, ModuleResolver};
use crate::runtime::{ExportValue, Interpreter, Runtime, RuntimeOptions};

/// Write `files` under a fresh temp dir and return it with its canonical
/// root.
fn project(files: &[(&str, &str)]) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    for (name, contents) in files {
        let path = root.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }
    (dir, root)
}

/// Interpreter whose own loader only looks in `root/vendor`.
fn interpreter(root: &Path) -> Interpreter {
    let templates = format!(
        "{0}/vendor/?.t;{0}/vendor/?/init.t",
        root.display()
    );
    Interpreter::new(RuntimeOptions::default().with_template_list(&templates))
}

fn config(root: &Path, entry: &str) -> RunConfig {
    let mut config = RunConfig::new(root.join(entry));
    config.module_dirs = vec![root.join("mods")];
    config.no_default_module_dirs = true;
    config
}

const APP: &[(&str, &str)] = &[
    (
        "app/main.t",
        "local util = require \"lib.util\"\n\
         local shared = require \".shared\"\n\
         require \"lib.util\"\n\
         require \"legacy\"\n\
         require \"platform\"\n\
         export answer = util.value\n\
         export banner = shared.name\n",
    ),
    ("mods/lib/util.t", "return { value = 42 }\n"),
    ("shared.t", "return { name = 'hi' }\n"),
    ("vendor/legacy.t", "link '-lm'\n"),
];

#[test]
fn test_dependencies_from_every_loader() {
    let (_dir, root) = project(APP);
    let mut interp = interpreter(&root);

    let outcome = run_with(&config(&root, "app/main.t"), &mut interp).unwrap();

    // the entry script and the built-in `platform` module are not recorded
    assert_eq!(
        outcome.dependencies,
        vec![
            root.join("mods/lib/util.t"),
            root.join("shared.t"),
            root.join("vendor/legacy.t"),
        ]
    );
}

#[test]
fn test_depfile_is_relativized_to_root() {
    let (_dir, root) = project(APP);
    let mut interp = interpreter(&root);
    let mut config = config(&root, "app/main.t");
    config.output = Some(root.join("out.o"));
    config.depfile = Some(root.join("out.d"));
    config.depfile_root = Some(root.clone());

    let outcome = run_with(&config, &mut interp).unwrap();

    assert_eq!(
        fs::read_to_string(root.join("out.d")).unwrap(),
        "out.o: mods/lib/util.t shared.t vendor/legacy.t\n"
    );
    assert!(fs::metadata(root.join("out.o")).unwrap().len() > 0);

    let exported: Vec<(String, ExportValue)> = outcome
        .exports
        .into_iter()
        .map(|e| (e.name, e.value))
        .collect();
    assert_eq!(
        exported,
        vec![
            ("answer".to_string(), ExportValue::Integer(42)),
            ("banner".to_string(), ExportValue::Bytes(b"hi".to_vec())),
        ]
    );
}

#[test]
fn test_depfile_target_defaults_to_input() {
    let (_dir, root) = project(&[("main.t", "export x = 1\n")]);
    let mut interp = interpreter(&root);
    let mut config = config(&root, "main.t");
    config.depfile = Some(root.join("main.d"));

    run_with(&config, &mut interp).unwrap();

    assert_eq!(
        fs::read_to_string(root.join("main.d")).unwrap(),
        format!("{}:\n", root.join("main.t").display())
    );
}

#[test]
fn test_same_relative_module_from_two_origins_is_recorded_twice() {
    let (_dir, root) = project(&[
        ("x/main.t", "require \".x.a\"\nrequire \".y.b\"\n"),
        ("x/a.t", "require \".common\"\n"),
        ("y/b.t", "require \".common\"\n"),
        ("common.t", "return 1\n"),
    ]);
    let mut interp = interpreter(&root);

    let outcome = run_with(&config(&root, "x/main.t"), &mut interp).unwrap();

    assert_eq!(
        outcome.dependencies,
        vec![
            root.join("common.t"),
            root.join("x/a.t"),
            root.join("common.t"),
            root.join("y/b.t"),
        ]
    );
}

#[test]
fn test_earlier_search_directory_wins() {
    let (_dir, root) = project(&[
        ("main.t", "export v = require('m').v\n"),
        ("first/m/init.t", "return { v = 1 }\n"),
        ("second/m.t", "return { v = 2 }\n"),
    ]);
    let mut interp = interpreter(&root);
    let mut config = config(&root, "main.t");
    config.module_dirs = vec![root.join("first"), root.join("second")];

    let outcome = run_with(&config, &mut interp).unwrap();

    assert_eq!(outcome.dependencies, vec![root.join("first/m/init.t")]);
    assert!(matches!(
        interp.export_value("v"),
        Some(crate::runtime::Value::Int(1))
    ));
}

#[test]
fn test_malformed_specifier_skips_search_paths() {
    let (_dir, root) = project(&[
        ("main.t", "require \"lib/util\"\n"),
        ("mods/lib/util.t", "return 1\n"),
    ]);
    let mut interp = interpreter(&root);

    let err = run_with(&config(&root, "main.t"), &mut interp).unwrap_err();
    let text = err.to_string();

    assert!(matches!(err, DriverError::Script(_)));
    assert!(text.contains("Module 'lib/util' not found"));
    assert!(!text.contains("Attempted paths:"));
    assert!(text.contains("Default loader:"));
}

#[test]
fn test_unresolved_module_lists_every_place_searched() {
    let (_dir, root) = project(&[("main.t", "require \"nowhere\"\n")]);
    let mut interp = interpreter(&root);

    let err = run_with(&config(&root, "main.t"), &mut interp).unwrap_err();
    let text = err.to_string();

    assert!(text.contains(&root.join("mods/nowhere.t").display().to_string()));
    assert!(text.contains(&root.join("mods/nowhere/init.t").display().to_string()));
    assert!(text.contains(&format!("no file '{}'", root.join("vendor/nowhere.t").display())));
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn test_depfile_written_even_when_save_fails() {
    let (_dir, root) = project(&[
        ("main.t", "require \"dep\"\nexport x = 1\nexport x2 = 'y'\n"),
        ("mods/dep.t", "return 1\n"),
    ]);
    let mut interp = interpreter(&root);
    let mut config = config(&root, "main.t");
    config.output = Some(root.join("missing-dir").join("main.o"));
    config.depfile = Some(root.join("main.d"));
    config.depfile_root = Some(root.clone());

    let err = run_with(&config, &mut interp).unwrap_err();

    assert!(matches!(err, DriverError::Backend(_)));
    assert_eq!(
        fs::read_to_string(root.join("main.d")).unwrap(),
        "missing-dir/main.o: mods/dep.t\n"
    );
}

#[test]
fn test_depfile_failure_has_its_own_exit_code() {
    let (_dir, root) = project(&[("main.t", "return 0\n")]);
    let mut interp = interpreter(&root);
    let mut config = config(&root, "main.t");
    config.depfile = Some(root.join("no-such-dir").join("main.d"));

    let err = run_with(&config, &mut interp).unwrap_err();
    assert!(matches!(err, DriverError::Depfile(_)));
    assert_eq!(err.exit_code(), 3);
}

#[test]
fn test_import_cycle_aborts_the_run() {
    let (_dir, root) = project(&[
        ("main.t", "require \"a\"\n"),
        ("mods/a.t", "require \"b\"\n"),
        ("mods/b.t", "require \"a\"\n"),
    ]);
    let mut interp = interpreter(&root);

    let err = run_with(&config(&root, "main.t"), &mut interp).unwrap_err();
    assert!(err.to_string().contains("a -> b -> a"));
}

#[test]
fn test_repeated_require_returns_cached_instance() {
    let (_dir, root) = project(&[
        (
            "main.t",
            "local a = require \"counter\"\nlocal b = require(\"counter\")\nreturn { a = a, b = b }\n",
        ),
        ("mods/counter.t", "return { n = 1 }\n"),
    ]);
    let mut interp = interpreter(&root);
    let entry = root.join("main.t");

    let chunk = interp.load_chunk(&entry).unwrap();
    let mut imports = ImportContext::new(ModuleResolver::new(vec![root.join("mods")]));
    let value = interp.execute(&chunk, &mut imports).unwrap();

    let (a, b) = (value.field("a").unwrap(), value.field("b").unwrap());
    assert!(a.same_instance(&b));
    assert!(imports.cache().get("counter").is_some());
    assert_eq!(imports.into_dependencies(), vec![root.join("mods/counter.t")]);
}

#[test]
fn test_relative_require_served_by_runtime_templates_is_recorded() {
    let (_dir, root) = project(&[
        ("app/main.t", "require \".x\"\n"),
        ("vendor/x.t", "return 1\n"),
    ]);
    let mut interp = Interpreter::new(
        RuntimeOptions::default().with_template_list(&format!("{}/vendor/?.t", root.display())),
    );

    let outcome = run_with(&config(&root, "app/main.t"), &mut interp).unwrap();

    assert_eq!(outcome.dependencies, vec![root.join("vendor/x.t")]);
}

#[test]
fn test_include_dirs_reach_includec_and_headers_land_in_depfile() {
    let (_dir, root) = project(&[
        (
            "main.t",
            "local c = includec \"limits.h\"\n\
             local opts = assign({ width = 8 }, { width = c.WIDTH })\n\
             export width = opts.width\n",
        ),
        ("include/limits.h", "#include \"bits.h\"\n#define WIDTH BITS\n"),
        ("include/bits.h", "#define BITS 64\n"),
    ]);
    let mut interp = interpreter(&root);
    let mut config = config(&root, "main.t");
    config.include_dirs = vec![root.join("include")];
    config.depfile = Some(root.join("main.d"));
    config.depfile_root = Some(root.clone());

    run_with(&config, &mut interp).unwrap();

    assert!(matches!(
        interp.export_value("width"),
        Some(crate::runtime::Value::Int(64))
    ));
    assert_eq!(
        fs::read_to_string(root.join("main.d")).unwrap(),
        "main.t: include/limits.h include/bits.h\n"
    );
}
