//! Archive format detection and extraction.
//!
//! Formats are recognized from magic bytes at the head of the file; file
//! extensions are not consulted. A renamed archive still unpacks as what it
//! actually is.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use tracing::info;

use crate::error::ExecError;

/// Recognized plugin archive formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    TarGz,
    TarBz2,
}

impl ArchiveFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Tar => "tar",
            Self::TarGz => "tar+gzip",
            Self::TarBz2 => "tar+bzip2",
        }
    }
}

/// The ustar magic sits at offset 257 in a tar header block.
const TAR_MAGIC_OFFSET: usize = 257;

/// Sniff the archive format from the first header block.
pub fn detect_format(path: &Path) -> Result<ArchiveFormat, ExecError> {
    let mut head = [0u8; 512];
    let mut file = File::open(path)?;
    let read = read_head(&mut file, &mut head)?;
    let head = &head[..read];

    if head.len() >= 4 && head[..2] == *b"PK" && matches!(head[2], 3 | 5 | 7) {
        return Ok(ArchiveFormat::Zip);
    }
    if head.len() >= 2 && head[..2] == [0x1f, 0x8b] {
        return Ok(ArchiveFormat::TarGz);
    }
    if head.len() >= 3 && head[..3] == *b"BZh" {
        return Ok(ArchiveFormat::TarBz2);
    }
    if head.len() >= TAR_MAGIC_OFFSET + 5 && &head[TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + 5] == b"ustar"
    {
        return Ok(ArchiveFormat::Tar);
    }

    Err(ExecError::UnsupportedArchive {
        path: path.to_path_buf(),
    })
}

fn read_head(file: &mut File, buf: &mut [u8]) -> Result<usize, ExecError> {
    let mut total = 0;
    while total < buf.len() {
        let n = file.read(&mut buf[total..])?;
        if n == 0 {
            break;
        }
        total += n;
    }
    Ok(total)
}

/// Detect the format and unpack the archive into `target_dir`.
pub fn detect_and_unpack(path: &Path, target_dir: &Path) -> Result<ArchiveFormat, ExecError> {
    let format = detect_format(path)?;
    info!(archive = %path.display(), format = format.as_str(), "Unpacking archive");
    std::fs::create_dir_all(target_dir)?;

    let unpack_err = |e: String| ExecError::Unpack {
        path: path.to_path_buf(),
        message: e,
    };

    match format {
        ArchiveFormat::Zip => {
            let file = File::open(path)?;
            let mut zip = zip::ZipArchive::new(file).map_err(|e| unpack_err(e.to_string()))?;
            zip.extract(target_dir).map_err(|e| unpack_err(e.to_string()))?;
        }
        ArchiveFormat::Tar => {
            tar::Archive::new(File::open(path)?).unpack(target_dir)?;
        }
        ArchiveFormat::TarGz => {
            tar::Archive::new(GzDecoder::new(File::open(path)?)).unpack(target_dir)?;
        }
        ArchiveFormat::TarBz2 => {
            tar::Archive::new(BzDecoder::new(File::open(path)?)).unpack(target_dir)?;
        }
    }
    Ok(format)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn tar_bytes() -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        let data = b"hello from tar";
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, "hello.txt", &data[..]).unwrap();
        builder.into_inner().unwrap()
    }

    fn zip_bytes() -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        zip.start_file("hello.txt", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"hello from zip").unwrap();
        zip.finish().unwrap().into_inner()
    }

    fn gzipped(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    fn write_archive(dir: &Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn detects_and_unpacks_zip() {
        let dir = tempfile::tempdir().unwrap();
        let archive = write_archive(dir.path(), "plugin.zip", &zip_bytes());

        let format = detect_and_unpack(&archive, &dir.path().join("out")).unwrap();
        assert_eq!(format, ArchiveFormat::Zip);
        let content = std::fs::read_to_string(dir.path().join("out/hello.txt")).unwrap();
        assert_eq!(content, "hello from zip");
    }

    #[test]
    fn detects_and_unpacks_plain_tar() {
        let dir = tempfile::tempdir().unwrap();
        let archive = write_archive(dir.path(), "plugin.tar", &tar_bytes());

        let format = detect_and_unpack(&archive, &dir.path().join("out")).unwrap();
        assert_eq!(format, ArchiveFormat::Tar);
        assert!(dir.path().join("out/hello.txt").exists());
    }

    #[test]
    fn detects_and_unpacks_bzip2_tar() {
        let dir = tempfile::tempdir().unwrap();
        let mut encoder =
            bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
        encoder.write_all(&tar_bytes()).unwrap();
        let archive = write_archive(dir.path(), "plugin.tbz", &encoder.finish().unwrap());

        let format = detect_and_unpack(&archive, &dir.path().join("out")).unwrap();
        assert_eq!(format, ArchiveFormat::TarBz2);
        assert!(dir.path().join("out/hello.txt").exists());
    }

    #[test]
    fn extension_is_ignored_content_wins() {
        // A gzip-compressed tar named `.zip` still unpacks as tar+gzip.
        let dir = tempfile::tempdir().unwrap();
        let archive = write_archive(dir.path(), "mislabeled.zip", &gzipped(&tar_bytes()));

        let format = detect_and_unpack(&archive, &dir.path().join("out")).unwrap();
        assert_eq!(format, ArchiveFormat::TarGz);
        assert!(dir.path().join("out/hello.txt").exists());
    }

    #[test]
    fn unknown_content_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let archive = write_archive(dir.path(), "junk.tar.gz", b"definitely not an archive");

        let err = detect_format(&archive).unwrap_err();
        assert!(matches!(err, ExecError::UnsupportedArchive { .. }));
    }
}
