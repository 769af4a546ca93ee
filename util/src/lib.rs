use std::path::PathBuf;

/// Directory for output produced by a test, e.g. diagnostics or VTK files.
///
/// The directory is not created.
pub fn test_output_dir(test_name: &str) -> PathBuf {
    PathBuf::from("data/unit_tests/").join(test_name)
}
