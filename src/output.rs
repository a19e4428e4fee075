// src/output.rs
//! Where the rendered feed goes: a file path, or `-` for standard output.

use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::OutputError;

/// File mode for newly created output files (Unix only).
pub const OUTPUT_MODE: u32 = 0o644;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Stdout,
    File(PathBuf),
}

impl Destination {
    pub fn parse(to: &str) -> Self {
        if to == "-" {
            Destination::Stdout
        } else {
            Destination::File(PathBuf::from(to))
        }
    }

    /// Write the complete document. The destination is only opened once the
    /// bytes exist, so a failed run never truncates an existing file.
    pub fn write_all(&self, bytes: &[u8]) -> Result<(), OutputError> {
        let res = match self {
            Destination::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(bytes).and_then(|()| out.flush())
            }
            Destination::File(path) => write_file(path, bytes),
        };
        res.map_err(|source| OutputError {
            destination: self.to_string(),
            source,
        })
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Stdout => f.write_str("<stdout>"),
            Destination::File(path) => write!(f, "{}", path.display()),
        }
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut opts = OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(OUTPUT_MODE);
    }
    let mut file = opts.open(path)?;
    file.write_all(bytes)?;
    file.flush()?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dash_means_stdout() {
        assert_eq!(Destination::parse("-"), Destination::Stdout);
        assert_eq!(
            Destination::parse("out.xml"),
            Destination::File(PathBuf::from("out.xml"))
        );
        assert_eq!(Destination::Stdout.to_string(), "<stdout>");
    }

    #[test]
    fn file_is_truncated_and_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.xml");
        std::fs::write(&path, "old content that is longer").unwrap();

        Destination::File(path.clone()).write_all(b"new").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let fresh = dir.path().join("fresh.xml");
            Destination::File(fresh.clone()).write_all(b"x").unwrap();
            let mode = std::fs::metadata(&fresh).unwrap().permissions().mode() & 0o777;
            // umask may only remove bits.
            assert_eq!(mode & !OUTPUT_MODE, 0);
        }
    }

    #[test]
    fn missing_directory_is_an_output_error() {
        let dir = tempfile::tempdir().unwrap();
        let dest = Destination::File(dir.path().join("nope").join("feed.xml"));
        let err = dest.write_all(b"x").unwrap_err();
        assert!(err.to_string().contains("nope"), "{err}");
    }
}
