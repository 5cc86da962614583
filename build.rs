use std::collections::BTreeMap;
use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_LOCALE: &str = "en-US";

fn main() {
    let manifest_dir =
        PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR is set by cargo"));
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    let locales_dir = manifest_dir.join("locales");
    println!("cargo:rerun-if-changed={}", locales_dir.display());

    let locales = load_locales(&locales_dir);
    if !locales.contains_key(DEFAULT_LOCALE) {
        panic!("default locale {DEFAULT_LOCALE} is missing from {}", locales_dir.display());
    }

    let mut generated = String::new();
    writeln!(generated, "pub const DEFAULT_LOCALE: &str = {DEFAULT_LOCALE:?};").unwrap();
    writeln!(generated, "pub static LOCALES: &[(&str, &[(&str, &str)])] = &[").unwrap();
    for (locale, entries) in &locales {
        writeln!(generated, "    ({locale:?}, &[").unwrap();
        for (key, value) in entries {
            writeln!(generated, "        ({key:?}, {value:?}),").unwrap();
        }
        writeln!(generated, "    ]),").unwrap();
    }
    writeln!(generated, "];").unwrap();

    fs::write(out_dir.join("formplus_i18n_generated.rs"), generated)
        .expect("failed to write generated i18n catalog");
}

fn load_locales(dir: &Path) -> BTreeMap<String, BTreeMap<String, String>> {
    let mut locales = BTreeMap::new();
    let entries = fs::read_dir(dir)
        .unwrap_or_else(|error| panic!("failed to read {}: {error}", dir.display()));
    for entry in entries {
        let path = entry.expect("failed to read locale entry").path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("toml") {
            continue;
        }
        println!("cargo:rerun-if-changed={}", path.display());
        let Some(locale) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        let text = fs::read_to_string(&path)
            .unwrap_or_else(|error| panic!("failed to read {}: {error}", path.display()));
        let table: toml::Table = toml::from_str(&text)
            .unwrap_or_else(|error| panic!("invalid locale file {}: {error}", path.display()));
        let mut flattened = BTreeMap::new();
        flatten("", &table, &mut flattened, &path);
        locales.insert(locale.to_string(), flattened);
    }
    locales
}

fn flatten(prefix: &str, table: &toml::Table, out: &mut BTreeMap<String, String>, path: &Path) {
    for (key, value) in table {
        let full_key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            toml::Value::Table(nested) => flatten(&full_key, nested, out, path),
            toml::Value::String(text) => {
                out.insert(full_key, text.clone());
            }
            other => panic!(
                "locale entry {full_key} in {} must be a string, found {other}",
                path.display()
            ),
        }
    }
}
