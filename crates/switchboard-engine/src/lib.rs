pub mod assistant;
pub mod chain;
pub mod detect;
pub mod dispatch;
pub mod error;
pub mod orchestrator;
pub mod processor;
pub mod progress;
pub mod slash;
pub mod timewindow;

pub use assistant::{AssistantClient, SystemClient};
pub use chain::{detect_chain, ChainExecutor, ChainPlan};
pub use dispatch::{ClientSlot, Dispatcher, ServiceHandler};
pub use error::EngineError;
pub use orchestrator::{MultiServiceOutcome, Orchestrator};
pub use processor::{CommandProcessor, ProcessedCommand};
pub use progress::{NoopReporter, Progress, ProgressReporter, StoreReporter};
pub use slash::{classify_slash, parse_slash, SlashClassifier, SlashCommand};
pub use timewindow::TimeWindow;
