//! # Tree Passes
//!
//! Everything between parsing and generation that is not evaluation.
//!
//! ## Pipeline
//!
//! 1. **`import`**: load and parse `@import` targets (before evaluation)
//! 2. evaluation (see [`crate::eval`])
//! 3. **`join`**: nested selectors become full selector paths
//! 4. **`visibility`**: everything outside reference imports is marked visible
//! 5. **`extend`**: `:extend()` adds rewritten paths to matching rulesets
//! 6. **`to_css`**: rulesets are flattened and non-output nodes dropped

pub mod extend;
pub mod import;
pub mod join;
pub mod to_css;
pub mod visibility;

pub use extend::process_extends;
pub use import::{FileManager, FsFileManager, ImportManager, ImportSequencer, LoadedFile, MemoryFileManager};
pub use join::join_selectors;
pub use to_css::{merge_rules, to_css_tree};
pub use visibility::mark_visible;
