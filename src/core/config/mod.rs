mod paths;
mod settings;

pub use paths::AppPaths;
pub use settings::RagSettings;
