use serde::{Deserialize, Serialize};

use crate::file_id::FileId;

/// A location in a source file.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Site {
    pub file: FileId,
    pub line: u32,
    pub column: u32,
}

impl std::fmt::Display for Site {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

impl Site {
    pub fn new(file: FileId, line: u32, column: u32) -> Site {
        Site { file, line, column }
    }
}
