pub mod builder;
pub mod classifier;
pub mod generator;
pub mod item;
pub mod resolver;

pub use builder::{BuilderConfig, ChangelogBuilder, ResolvedChangelog};
pub use classifier::{Changelog, Classifier, LabelFilters};
pub use generator::{ChangelogGenerator, DocumentHeader, OutputFormat};
pub use resolver::QueryRange;
