/// Source file readers.
///
/// Retrieval of the export from the portal happens elsewhere; by the time
/// this module runs the file is already on disk.
///
/// Submodules:
/// - `bsk`: BSK client portal CSV exports.

pub mod bsk;
