use std::env;
use std::error::Error;
use std::fs;
use std::path::Path;

use jsonschema::JSONSchema;
use rune_runtime::{decode_snapshot_json, snapshot_json_schema};

fn main() -> Result<(), Box<dyn Error>> {
    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("snapshot-schema") => snapshot_schema(args.next().as_deref()),
        Some("validate-snapshots") => {
            let pattern = args.next().unwrap_or_else(|| "rune-data/*.json".to_string());
            validate_snapshots(&pattern)
        }
        Some("help") | None => {
            print_usage();
            Ok(())
        }
        Some(cmd) => {
            eprintln!("Unknown xtask '{cmd}'.");
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    eprintln!("Usage: cargo xtask snapshot-schema [OUT]");
    eprintln!("       cargo xtask validate-snapshots [GLOB]");
    eprintln!("       cargo xtask help");
}

fn snapshot_schema(out: Option<&str>) -> Result<(), Box<dyn Error>> {
    let schema = serde_json::to_string_pretty(&snapshot_json_schema())?;
    match out {
        Some(path) => {
            let path = Path::new(path);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, schema)?;
            println!("Wrote snapshot schema to {}", path.display());
        }
        None => println!("{schema}"),
    }
    Ok(())
}

fn validate_snapshots(pattern: &str) -> Result<(), Box<dyn Error>> {
    let schema_value = snapshot_json_schema();
    let schema = JSONSchema::compile(&schema_value)
        .map_err(|err| format!("snapshot schema does not compile: {err}"))?;

    let mut checked = 0usize;
    let mut failures = 0usize;
    for entry in glob::glob(pattern)? {
        let path = entry?;
        checked += 1;
        let contents = fs::read_to_string(&path)?;

        let instance: serde_json::Value = match serde_json::from_str(&contents) {
            Ok(value) => value,
            Err(err) => {
                failures += 1;
                eprintln!("{}: not JSON: {err}", path.display());
                continue;
            }
        };

        if let Err(errors) = schema.validate(&instance) {
            failures += 1;
            for error in errors {
                eprintln!("{}: {} at {}", path.display(), error, error.instance_path);
            }
            continue;
        }

        // Decode too, so a file fails here exactly when the registry would reject it.
        if let Err(err) = decode_snapshot_json(&contents) {
            failures += 1;
            eprintln!("{}: {err}", path.display());
            continue;
        }

        println!("{}: ok", path.display());
    }

    if checked == 0 {
        println!("No snapshots matched '{pattern}'");
    }
    if failures > 0 {
        return Err(format!("{failures} of {checked} snapshots failed validation").into());
    }
    Ok(())
}
