//! Built-in capabilities.
//!
//! - Web scraping
//! - Company data lookup
//! - Speech synthesis and audio playback
//! - Chat webhook delivery
//! - Tool memory queries

mod company;
mod memory_query;
mod message;
mod playback;
mod speech;
mod web;

// Discovery tools
pub use company::{CompanyLookupConfig, CompanyLookupTool};
pub use web::{WebScrapeConfig, WebScrapeTool};

// Audio tools
pub use playback::{AudioPlaybackTool, PlaybackConfig};
pub use speech::{SpeechConfig, SpeechSynthesisTool, voice_id};

// Delivery tool
pub use message::{MessagePostConfig, MessagePostTool};

// Memory tool
pub use memory_query::MemoryQueryTool;
