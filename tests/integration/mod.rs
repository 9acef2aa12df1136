//! Integration tests: file-based resolution, discovery, caching, and
//! naming-scheme escalation through the full pipeline.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use anyhow::Result;
use tempfile::TempDir;

use modforge::core::{ForgeError, Value};
use modforge::pipeline::{Pipeline, RecipeSource, ResolveOptions, candidate_paths};

const ZLIB: &str = r#"
name = "zlib"
version = "1.2.8"
homepage = "http://www.zlib.net/"
description = "zlib compression library"
toolchain = { name = "GCC", version = "4.8.2" }
moduleclass = "lib"
"#;

const GCC: &str = r#"
name = "GCC"
version = "4.8.2"
homepage = "http://gcc.gnu.org/"
description = "GNU Compiler Collection"
toolchain = { name = "system", version = "system" }
moduleclass = "compiler"
"#;

const HDF5: &str = r#"
name = "HDF5"
version = "1.8.13"
homepage = "http://www.hdfgroup.org/HDF5/"
description = "HDF5 data format library"
toolchain = { name = "GCC", version = "4.8.2" }
dependencies = [["zlib", "1.2.8"]]
moduleclass = "data"
"#;

/// Installs the test log subscriber; repeated calls are no-ops.
fn init_logs() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn write_recipe(dir: &Path, rel: &str, text: &str) -> Result<()> {
    let path = dir.join(rel);
    fs::create_dir_all(path.parent().unwrap())?;
    fs::write(path, text)?;
    Ok(())
}

#[test]
fn test_file_resolution_with_toolchain_dependency() -> Result<()> {
    init_logs();
    let temp = TempDir::new()?;
    let path = temp.path().join("HDF5-1.8.13-GCC-4.8.2.mf");
    fs::write(&path, HDF5)?;

    let pipeline = Pipeline::new(ResolveOptions::default());
    let resolved = pipeline.resolve(&RecipeSource::Path(path.clone()), None, true, None, false)?;
    assert_eq!(resolved.len(), 1);

    let summary = &resolved[0];
    assert_eq!(summary.spec.as_deref(), Some(path.as_path()));
    assert_eq!(summary.full_mod_name, "HDF5/1.8.13-GCC-4.8.2");
    assert_eq!(summary.short_mod_name, "HDF5/1.8.13-GCC-4.8.2");

    // declared dependency plus the toolchain as a dependency
    let names: Vec<&str> =
        summary.dependencies.iter().map(|d| d.full_mod_name.as_str()).collect();
    assert_eq!(names, vec!["zlib/1.2.8-GCC-4.8.2", "GCC/4.8.2"]);
    let toolchain_dep = summary.dependencies.last().unwrap();
    assert!(toolchain_dep.system_toolchain);
    Ok(())
}

#[test]
fn test_system_toolchain_is_not_a_dependency() -> Result<()> {
    let pipeline = Pipeline::new(ResolveOptions::default());
    let resolved =
        pipeline.resolve(&RecipeSource::Literal(GCC.to_string()), None, true, None, false)?;
    assert!(resolved[0].dependencies.is_empty());
    assert_eq!(resolved[0].full_mod_name, "GCC/4.8.2");
    Ok(())
}

#[test]
fn test_cached_resolutions_are_equal_but_independent() -> Result<()> {
    let temp = TempDir::new()?;
    let path = temp.path().join("zlib-1.2.8-GCC-4.8.2.mf");
    fs::write(&path, ZLIB)?;

    let pipeline = Pipeline::new(ResolveOptions::default());
    let source = RecipeSource::Path(path);
    let mut first = pipeline.resolve(&source, None, true, None, false)?;
    let second = pipeline.resolve(&source, None, true, None, false)?;

    assert_eq!(first[0].full_mod_name, second[0].full_mod_name);
    first[0].recipe.set("buildopts", Value::Str("-j4".into()))?;
    assert_eq!(second[0].recipe.value("buildopts")?, Value::Str("".into()));

    // a third resolution still sees the unmutated cache entry
    let third = pipeline.resolve(&source, None, true, None, false)?;
    assert_eq!(third[0].recipe.value("buildopts")?, Value::Str("".into()));
    Ok(())
}

#[test]
fn test_build_specs_bypass_the_cache() -> Result<()> {
    let pipeline = Pipeline::new(ResolveOptions::default());
    let source = RecipeSource::Literal(ZLIB.to_string());

    let mut specs = BTreeMap::new();
    specs.insert("version".to_string(), Value::Str("1.2.11".into()));
    let narrowed = pipeline.resolve(&source, Some(&specs), true, None, false)?;
    assert_eq!(narrowed[0].full_mod_name, "zlib/1.2.11-GCC-4.8.2");

    let plain = pipeline.resolve(&source, None, true, None, false)?;
    assert_eq!(plain[0].full_mod_name, "zlib/1.2.8-GCC-4.8.2");
    Ok(())
}

#[test]
fn test_concurrent_same_key_resolutions_agree() -> Result<()> {
    let temp = TempDir::new()?;
    let path = temp.path().join("zlib-1.2.8-GCC-4.8.2.mf");
    fs::write(&path, ZLIB)?;

    let pipeline = Arc::new(Pipeline::new(ResolveOptions::default()));
    let mut handles = Vec::new();
    for _ in 0..8 {
        let pipeline = Arc::clone(&pipeline);
        let source = RecipeSource::Path(path.clone());
        handles.push(thread::spawn(move || {
            pipeline.resolve(&source, None, true, None, false).map(|r| r[0].full_mod_name.clone())
        }));
    }
    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap(), "zlib/1.2.8-GCC-4.8.2");
    }
    Ok(())
}

#[test]
fn test_discovery_candidate_order() -> Result<()> {
    let temp = TempDir::new()?;
    let root = temp.path();

    // populate the *last* candidate form first, then shadow it with
    // earlier forms one by one
    write_recipe(root, "Foo-1.2.mf", "last")?;
    let options = ResolveOptions {
        search_roots: vec![root.to_path_buf()],
        ..ResolveOptions::default()
    };

    let pipeline = Pipeline::new(options.clone());
    assert_eq!(pipeline.discover_path("Foo", "1.2"), Some(root.join("Foo-1.2.mf")));

    write_recipe(root, "f/Foo/Foo-1.2.mf", "third")?;
    let pipeline = Pipeline::new(options.clone());
    assert_eq!(pipeline.discover_path("Foo", "1.2"), Some(root.join("f/Foo/Foo-1.2.mf")));

    write_recipe(root, "Foo/Foo-1.2.mf", "second")?;
    let pipeline = Pipeline::new(options.clone());
    assert_eq!(pipeline.discover_path("Foo", "1.2"), Some(root.join("Foo/Foo-1.2.mf")));

    write_recipe(root, "Foo/1.2.mf", "first")?;
    let pipeline = Pipeline::new(options);
    assert_eq!(pipeline.discover_path("Foo", "1.2"), Some(root.join("Foo/1.2.mf")));
    Ok(())
}

#[test]
fn test_discovery_miss_is_an_answer_and_hits_are_cached() -> Result<()> {
    let temp = TempDir::new()?;
    let options = ResolveOptions {
        search_roots: vec![temp.path().to_path_buf()],
        ..ResolveOptions::default()
    };
    let pipeline = Pipeline::new(options);
    assert_eq!(pipeline.discover_path("Bar", "3.0"), None);

    write_recipe(temp.path(), "Bar/3.0.mf", "found")?;
    let discovered = pipeline.discover_path("Bar", "3.0").unwrap();

    // the answer is cached by (name, version): removing the file does not
    // change it until invalidation
    fs::remove_file(&discovered)?;
    assert_eq!(pipeline.discover_path("Bar", "3.0"), Some(discovered));
    pipeline.cache().invalidate();
    assert_eq!(pipeline.discover_path("Bar", "3.0"), None);
    Ok(())
}

#[test]
fn test_candidate_paths_documented_order() {
    let paths = candidate_paths(Path::new("root"), "Foo", "1.2");
    assert_eq!(paths[0], Path::new("root/Foo/1.2.mf"));
    assert_eq!(paths[1], Path::new("root/Foo/Foo-1.2.mf"));
    assert_eq!(paths[2], Path::new("root/f/Foo/Foo-1.2.mf"));
    assert_eq!(paths[3], Path::new("root/Foo-1.2.mf"));
}

#[test]
fn test_hierarchical_scheme_escalates_to_full_recipes() -> Result<()> {
    init_logs();
    let temp = TempDir::new()?;
    let root = temp.path();
    write_recipe(root, "zlib/zlib-1.2.8-GCC-4.8.2.mf", ZLIB)?;
    write_recipe(root, "GCC/GCC-4.8.2.mf", GCC)?;

    let options = ResolveOptions {
        naming_scheme: "hierarchical".to_string(),
        search_roots: vec![root.to_path_buf()],
        ..ResolveOptions::default()
    };
    let pipeline = Pipeline::new(options);
    let resolved =
        pipeline.resolve(&RecipeSource::Literal(HDF5.to_string()), None, true, None, false)?;

    let summary = &resolved[0];
    assert_eq!(summary.full_mod_name, "Compiler/GCC/4.8.2/HDF5/1.8.13");
    assert_eq!(summary.short_mod_name, "HDF5/1.8.13");
    assert_eq!(summary.recipe.module_subdir(), "Compiler/GCC/4.8.2");

    // naming the zlib dependency record required its full recipe, found
    // through discovery; the GCC toolchain dependency lands under Core
    let names: Vec<&str> =
        summary.dependencies.iter().map(|d| d.full_mod_name.as_str()).collect();
    assert_eq!(names, vec!["Compiler/GCC/4.8.2/zlib/1.2.8", "Core/GCC/4.8.2"]);
    Ok(())
}

#[test]
fn test_hierarchical_escalation_without_recipe_fails() {
    let options = ResolveOptions {
        naming_scheme: "hierarchical".to_string(),
        ..ResolveOptions::default()
    };
    let pipeline = Pipeline::new(options);
    let err = pipeline
        .resolve(&RecipeSource::Literal(HDF5.to_string()), None, true, None, false)
        .unwrap_err();
    assert!(matches!(err, ForgeError::RecipeNotFound { ref name, .. } if name == "zlib"));
}

#[test]
fn test_multi_block_source() -> Result<()> {
    let temp = TempDir::new()?;
    let text = format!("#@block zlib{ZLIB}#@block gcc\n{GCC}");
    let path = temp.path().join("bundle.mf");
    fs::write(&path, &text)?;

    let pipeline = Pipeline::new(ResolveOptions::default());
    let resolved = pipeline.resolve(&RecipeSource::Path(path.clone()), None, true, None, false)?;
    assert_eq!(resolved.len(), 2);
    assert_eq!(resolved[0].block.as_deref(), Some("zlib"));
    assert_eq!(resolved[1].block.as_deref(), Some("gcc"));
    assert_eq!(resolved[0].original_spec.as_deref(), Some(path.as_path()));
    assert_eq!(resolved[1].full_mod_name, "GCC/4.8.2");
    Ok(())
}

#[test]
fn test_only_blocks_filter() -> Result<()> {
    let text = format!("#@block zlib{ZLIB}#@block gcc\n{GCC}");

    let options = ResolveOptions {
        only_blocks: Some(vec!["gcc".to_string()]),
        ..ResolveOptions::default()
    };
    let pipeline = Pipeline::new(options);
    let resolved =
        pipeline.resolve(&RecipeSource::Literal(text.clone()), None, true, None, false)?;
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].full_mod_name, "GCC/4.8.2");

    let options = ResolveOptions {
        only_blocks: Some(vec!["nope".to_string()]),
        ..ResolveOptions::default()
    };
    let err = Pipeline::new(options)
        .resolve(&RecipeSource::Literal(text), None, true, None, false)
        .unwrap_err();
    assert!(matches!(err, ForgeError::UnknownBlock { ref name, .. } if name == "nope"));
    Ok(())
}

#[test]
fn test_hidden_request_mangles_identity() -> Result<()> {
    let pipeline = Pipeline::new(ResolveOptions::default());
    let resolved = pipeline.resolve(
        &RecipeSource::Literal(ZLIB.to_string()),
        None,
        true,
        Some(true),
        false,
    )?;
    assert_eq!(resolved[0].full_mod_name, "zlib/.1.2.8-GCC-4.8.2");
    assert!(resolved[0].hidden);
    Ok(())
}

#[test]
fn test_dump_round_trip_through_files() -> Result<()> {
    let temp = TempDir::new()?;
    let original_path = temp.path().join("HDF5-1.8.13-GCC-4.8.2.mf");
    fs::write(&original_path, HDF5)?;

    let pipeline = Pipeline::new(ResolveOptions::default());
    let original =
        pipeline.resolve(&RecipeSource::Path(original_path), None, true, None, false)?;

    let dumped_path = temp.path().join("dumped.mf");
    original[0].recipe.dump_to(&dumped_path)?;
    let reparsed = pipeline.resolve(&RecipeSource::Path(dumped_path), None, true, None, false)?;

    assert_eq!(original[0].recipe.name(), reparsed[0].recipe.name());
    assert_eq!(original[0].recipe.version(), reparsed[0].recipe.version());
    assert_eq!(original[0].full_mod_name, reparsed[0].full_mod_name);
    assert_eq!(original[0].dependencies, reparsed[0].dependencies);
    Ok(())
}

#[test]
fn test_parse_only_skips_summaries() -> Result<()> {
    let pipeline = Pipeline::new(ResolveOptions::default());
    let resolved = pipeline.resolve(
        &RecipeSource::Literal(HDF5.to_string()),
        None,
        true,
        None,
        true,
    )?;
    assert!(resolved[0].full_mod_name.is_empty());
    assert!(resolved[0].dependencies.is_empty());
    // the recipe itself is fully parsed
    assert_eq!(resolved[0].recipe.name(), "HDF5");
    Ok(())
}
