// Purpose - PCM conversion, streaming playback, audio sinks

pub mod converter;
pub mod sink;
pub mod stream;

pub use converter::PcmConverter;
pub use sink::{AudioSink, Mixer, PlaybackHandle, SinkSource};
pub use stream::{render, PcmBuffer, PlayState, StreamSource, VoiceControl};
