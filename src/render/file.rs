use std::path::Path;

use crate::error::Result;
use crate::render::engine::{TemplateData, TemplateEngine};

/// Render one template source under `name`, the name errors report.
pub fn render_file_content(
    name: &str,
    content: &str,
    engine: TemplateEngine,
    data: &TemplateData,
) -> Result<String> {
    engine.render(name, content, data)
}

/// Detect binary files using content_inspector (BOM-aware, null-byte scanning).
///
/// Reads only the first 8KB to avoid unnecessary allocation for large files.
pub fn is_binary_file(path: &Path) -> bool {
    use std::io::Read;

    let Ok(file) = std::fs::File::open(path) else {
        return false;
    };

    let mut buf = [0u8; 8192];
    let Ok(n) = file.take(8192).read(&mut buf) else {
        return false;
    };

    !content_inspector::inspect(&buf[..n]).is_text()
}
