// Purpose: key presses in, voices out
// This layer sits above the graph builder and the streaming adapter

pub mod factory;
pub mod message;
pub mod scheduler;
pub mod timer;
pub mod voice;

pub use factory::VoiceFactory;
pub use message::{HostEvent, MessageReceiver};
pub use scheduler::VoiceScheduler;
