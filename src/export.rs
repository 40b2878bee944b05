use std::fs::File;
use std::io::{self, Read, Seek, Write};
use std::path::Path;

use anyhow::{Context, Result};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Writes the whole project directory into a deflated ZIP archive at
/// `out_path`. Entries are added in sorted order so the archive is
/// reproducible for a given tree.
pub fn export_zip(project_dir: &Path, out_path: &Path) -> Result<()> {
    let file = File::create(out_path)
        .with_context(|| format!("failed to create archive: {:?}", out_path))?;
    let mut zip = ZipWriter::new(file);

    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    add_dir_recursive(&mut zip, project_dir, Path::new(""), options)
        .with_context(|| format!("failed to archive project dir: {:?}", project_dir))?;

    zip.finish().context("failed to finalize archive")?;
    Ok(())
}

fn add_dir_recursive<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    dir: &Path,
    zip_prefix: &Path,
    options: SimpleFileOptions,
) -> Result<()> {
    let mut entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read dir: {:?}", dir))?
        .collect::<Result<Vec<_>, io::Error>>()
        .with_context(|| format!("failed to list dir: {:?}", dir))?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let zip_path = zip_prefix.join(entry.file_name());
        let zip_name = zip_path.to_string_lossy().replace('\\', "/");

        let file_type = entry.file_type().context("failed to read file type")?;
        if file_type.is_dir() {
            zip.add_directory(zip_name.as_str(), options)
                .with_context(|| format!("failed to add directory entry: {}", zip_name))?;
            add_dir_recursive(zip, &path, &zip_path, options)?;
            continue;
        }
        if !file_type.is_file() {
            continue;
        }

        zip.start_file(zip_name.as_str(), options)
            .with_context(|| format!("failed to start archive entry: {}", zip_name))?;
        let mut source = File::open(&path).with_context(|| format!("failed to open: {:?}", path))?;
        let mut buf = Vec::new();
        source
            .read_to_end(&mut buf)
            .with_context(|| format!("failed to read: {:?}", path))?;
        zip.write_all(&buf)
            .with_context(|| format!("failed to write archive entry: {}", zip_name))?;
    }

    Ok(())
}
