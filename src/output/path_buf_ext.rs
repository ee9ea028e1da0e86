use std::fs::{File, OpenOptions};
use std::path::PathBuf;

use anyhow::Context;

/// An extension trait that adds an open method to std::path::PathBuf.
pub trait PathBufExt {
    fn open(&self, allow_overwrite: bool) -> anyhow::Result<File>;
}

impl PathBufExt for PathBuf {
    fn open(&self, allow_overwrite: bool) -> anyhow::Result<File> {
        let mut options = OpenOptions::new();
        options.write(true);
        if allow_overwrite {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }
        options
            .open(self)
            .context(format!("failed to create file: {}", self.to_string_lossy()))
    }
}
