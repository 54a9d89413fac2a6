use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use jclassfile::class_file;
use log::{debug, info};
use rayon::prelude::*;
use zip::ZipArchive;

use crate::config::TransformerContext;
use crate::reader::read_class;
use crate::sink::{MemorySink, Sink, VerifyingSink};
use crate::transform::{OutputSink, Transformer};
use crate::writer::write_class;

const MANIFEST: &str = "META-INF/MANIFEST.MF";

/// Counts gathered over one transform run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct TransformOutput {
    pub(crate) class_count: usize,
    pub(crate) rewritten_count: usize,
}

/// File or archive entry keyed by its `/`-separated path.
struct Entry {
    path: String,
    data: Vec<u8>,
}

/// Read `input`, run every transformer over its classes, then let each
/// transformer add assets. Everything lands in `output`.
pub(crate) fn transform_inputs(
    input: &Path,
    output: &Path,
    transformers: &[Box<dyn Transformer>],
    context: &TransformerContext,
) -> Result<TransformOutput> {
    if !input.exists() {
        anyhow::bail!("input not found: {}", input.display());
    }
    let mut entries = collect_entries(input)?;
    // JarInputStream only finds the manifest when it is the first entry.
    entries.sort_by_key(|entry| entry.path != MANIFEST);
    let class_count = entries
        .iter()
        .filter(|entry| is_class_entry(&entry.path))
        .count();

    // Classes are independent; order is restored by the indexed collect.
    let processed = entries
        .into_par_iter()
        .map(|entry| transform_entry(entry, transformers, context))
        .collect::<Result<Vec<_>>>()?;
    let rewritten_count = processed.iter().filter(|(_, changed)| *changed).count();

    // Assets are built before the output is opened; a failed pass leaves no partial output.
    let mut assets = MemorySink::default();
    {
        let mut verifying = VerifyingSink::new(&mut assets);
        for transformer in transformers {
            let metadata = transformer.metadata();
            debug!("asset pass: {}", metadata.name);
            transformer
                .edit_assets(context, &mut verifying)
                .with_context(|| format!("{} failed to emit assets", metadata.id))?;
        }
    }

    let mut sink = Sink::create(output)?;
    let written = processed
        .into_iter()
        .map(|(entry, _)| (entry.path, entry.data))
        .chain(assets.entries);
    for (path, data) in written {
        sink.add_entry(&path, data)
            .with_context(|| format!("failed to write {}:{}", output.display(), path))?;
    }
    sink.finish()?;

    info!("rewrote {rewritten_count} of {class_count} classes");
    Ok(TransformOutput {
        class_count,
        rewritten_count,
    })
}

fn transform_entry(
    entry: Entry,
    transformers: &[Box<dyn Transformer>],
    context: &TransformerContext,
) -> Result<(Entry, bool)> {
    if !is_class_entry(&entry.path) {
        return Ok((entry, false));
    }
    let mut class =
        read_class(&entry.data).with_context(|| format!("failed to parse {}", entry.path))?;
    let name = class.name.clone();
    let mut changed = false;
    for transformer in transformers {
        changed |= transformer
            .edit_class(context, &name, &mut class)
            .with_context(|| format!("{} failed on {}", transformer.metadata().id, name))?;
    }
    if !changed {
        return Ok((entry, false));
    }

    let data = write_class(&class).with_context(|| format!("failed to write {name}"))?;
    verify_class(&entry.path, &data)?;
    Ok((
        Entry {
            path: entry.path,
            data,
        },
        true,
    ))
}

/// Re-parse emitted bytes with the independent class-file parser.
pub(crate) fn verify_class(path: &str, data: &[u8]) -> Result<()> {
    class_file::parse(data).with_context(|| format!("emitted class {path} does not parse"))?;
    Ok(())
}

fn is_class_entry(path: &str) -> bool {
    path.ends_with(".class") && !path.ends_with("module-info.class")
}

fn collect_entries(input: &Path) -> Result<Vec<Entry>> {
    if input.is_dir() {
        let mut entries = Vec::new();
        collect_dir(input, "", &mut entries)?;
        return Ok(entries);
    }

    let extension = input.extension().and_then(|ext| ext.to_str()).unwrap_or("");
    match extension {
        "jar" | "zip" => collect_jar(input),
        "class" => {
            let data =
                fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
            let class =
                read_class(&data).with_context(|| format!("failed to parse {}", input.display()))?;
            Ok(vec![Entry {
                path: format!("{}.class", class.name),
                data,
            }])
        }
        _ => anyhow::bail!("unsupported input file: {}", input.display()),
    }
}

fn collect_dir(dir: &Path, prefix: &str, entries: &mut Vec<Entry>) -> Result<()> {
    let mut children = Vec::new();
    for child in
        fs::read_dir(dir).with_context(|| format!("failed to read directory {}", dir.display()))?
    {
        let child = child.with_context(|| format!("failed to read entry under {}", dir.display()))?;
        children.push(child.path());
    }

    // Keep deterministic ordering by sorting directory listings.
    children.sort();

    for child in children {
        let name = child
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let path = format!("{prefix}{name}");
        if child.is_dir() {
            collect_dir(&child, &format!("{path}/"), entries)?;
        } else {
            let data =
                fs::read(&child).with_context(|| format!("failed to read {}", child.display()))?;
            entries.push(Entry { path, data });
        }
    }
    Ok(())
}

fn collect_jar(path: &Path) -> Result<Vec<Entry>> {
    let file = fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut archive =
        ZipArchive::new(file).with_context(|| format!("failed to read {}", path.display()))?;

    let mut entry_names = Vec::new();
    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if entry.is_dir() {
            continue;
        }
        if entry.enclosed_name().is_none() {
            anyhow::bail!(
                "unsafe entry path {}:{}",
                path.display(),
                entry.name()
            );
        }
        entry_names.push(entry.name().to_string());
    }

    entry_names.sort();

    let mut entries = Vec::with_capacity(entry_names.len());
    for name in entry_names {
        let mut entry = archive
            .by_name(&name)
            .with_context(|| format!("failed to read {}:{}", path.display(), name))?;
        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .with_context(|| format!("failed to read {}:{}", path.display(), name))?;
        entries.push(Entry { path: name, data });
    }
    Ok(entries)
}
