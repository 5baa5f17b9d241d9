pub mod candidates;
pub mod config;
pub mod error;
pub mod normalize;
pub mod pipeline;
pub mod registry;
pub mod resolver;
pub mod scorer;
pub mod workbook;

pub use candidates::CandidateIndex;
pub use config::{FeedLayout, LinkerConfig, ResolutionPolicy, SheetLayout};
pub use error::{LinkError, Result};
pub use normalize::{normalize_address, normalize_name, NormalizedKey};
pub use pipeline::{Linker, OutputPaths, RunSummary};
pub use registry::{RegistryEntry, RegistryScanner};
pub use resolver::{InputRow, ResolutionResult, ResolutionStatus, Resolver};
pub use scorer::{AddressScorer, ScorerKind};
