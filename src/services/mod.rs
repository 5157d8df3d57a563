pub mod clustering;
pub mod compatibility;
pub mod embedding;
pub mod matching;
pub mod pipeline;
pub mod vocab;

pub use matching::MatchSelector;
pub use pipeline::MatchPipeline;
pub use vocab::ItemVocabModel;
