//! Copying unregistered files into the read-add location.

use chrono::Local;
use ldb_types::StorageUri;
use uuid::Uuid;

/// Directory under the read-add location that receives imported files.
pub const AUTOIMPORT_DIR: &str = "ldb-autoimport";

/// A fresh `<read_add>/ldb-autoimport/<YYYY-MM-DD>/<unique-id>` directory.
pub fn import_base(read_add: &StorageUri) -> StorageUri {
    read_add.join(&format!(
        "{AUTOIMPORT_DIR}/{}/{}",
        Local::now().format("%Y-%m-%d"),
        Uuid::now_v7().simple()
    ))
}

/// Where `source` lands below `base`: its protocol followed by its full path.
pub fn import_destination(base: &StorageUri, source: &StorageUri) -> StorageUri {
    let path = source.path.replace(std::path::MAIN_SEPARATOR, "/");
    base.join(&format!("{}/{}", source.protocol, path.trim_start_matches('/')))
}
