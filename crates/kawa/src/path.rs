use std::{
    ffi::{OsStr, OsString},
    path::PathBuf,
};

pub trait KawaPathExt {
    /// Insert `_{tag}` between the file stem and the extension, so
    /// `v-1.mp4` tagged `enc` becomes `v-1_enc.mp4`. Only the last
    /// extension component counts as the extension.
    fn add_suffix<T: AsRef<OsStr>>(&mut self, tag: T);
}

impl KawaPathExt for PathBuf {
    fn add_suffix<T: AsRef<OsStr>>(&mut self, tag: T) {
        let mut name = self.file_stem().map(OsString::from).unwrap_or_default();
        name.push("_");
        name.push(tag);
        if let Some(ext) = self.extension() {
            name.push(".");
            name.push(ext);
        }
        self.set_file_name(name);
    }
}
