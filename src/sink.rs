use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::scan::verify_class;
use crate::transform::OutputSink;

/// Output destination chosen from the output path: `.jar`/`.zip` archives or a directory tree.
pub(crate) enum Sink {
    Jar(JarSink),
    Directory(DirectorySink),
}

impl Sink {
    pub(crate) fn create(path: &Path) -> Result<Self> {
        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");
        match extension {
            "jar" | "zip" => Ok(Sink::Jar(JarSink::create(path)?)),
            _ => Ok(Sink::Directory(DirectorySink::create(path)?)),
        }
    }

    pub(crate) fn finish(self) -> Result<()> {
        match self {
            Sink::Jar(jar) => jar.finish(),
            Sink::Directory(_) => Ok(()),
        }
    }
}

impl OutputSink for Sink {
    fn add_entry(&mut self, path: &str, bytes: Vec<u8>) -> io::Result<()> {
        match self {
            Sink::Jar(jar) => jar.add_entry(path, bytes),
            Sink::Directory(dir) => dir.add_entry(path, bytes),
        }
    }
}

pub(crate) struct JarSink {
    path: PathBuf,
    writer: ZipWriter<File>,
}

impl JarSink {
    fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file =
            File::create(path).with_context(|| format!("failed to open {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: ZipWriter::new(file),
        })
    }

    fn finish(mut self) -> Result<()> {
        self.writer
            .finish()
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }
}

impl OutputSink for JarSink {
    fn add_entry(&mut self, path: &str, bytes: Vec<u8>) -> io::Result<()> {
        self.writer
            .start_file(path, SimpleFileOptions::default())
            .map_err(io::Error::other)?;
        self.writer.write_all(&bytes)
    }
}

pub(crate) struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    fn create(root: &Path) -> Result<Self> {
        fs::create_dir_all(root).with_context(|| format!("failed to create {}", root.display()))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }
}

impl OutputSink for DirectorySink {
    fn add_entry(&mut self, path: &str, bytes: Vec<u8>) -> io::Result<()> {
        let mut target = self.root.clone();
        for component in Path::new(path).components() {
            match component {
                Component::Normal(segment) => target.push(segment),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("entry {path} escapes {}", self.root.display()),
                    ));
                }
            }
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(target, bytes)
    }
}

/// Entries held in memory until the real output is opened.
#[derive(Debug, Default)]
pub(crate) struct MemorySink {
    pub(crate) entries: Vec<(String, Vec<u8>)>,
}

impl OutputSink for MemorySink {
    fn add_entry(&mut self, path: &str, bytes: Vec<u8>) -> io::Result<()> {
        self.entries.push((path.to_string(), bytes));
        Ok(())
    }
}

/// Checks every class passing through with the independent class-file parser.
pub(crate) struct VerifyingSink<'a> {
    inner: &'a mut dyn OutputSink,
}

impl<'a> VerifyingSink<'a> {
    pub(crate) fn new(inner: &'a mut dyn OutputSink) -> Self {
        Self { inner }
    }
}

impl OutputSink for VerifyingSink<'_> {
    fn add_entry(&mut self, path: &str, bytes: Vec<u8>) -> io::Result<()> {
        if path.ends_with(".class") {
            verify_class(path, &bytes).map_err(io::Error::other)?;
        }
        self.inner.add_entry(path, bytes)
    }
}
