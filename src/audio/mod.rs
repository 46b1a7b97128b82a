pub mod analyser;
pub mod decoder;
pub mod output;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod testing;

pub use analyser::{AnalyserSettings, SpectrumAnalyser};
pub use decoder::{decode_file, DecodedAudio};
pub use output::{AudioOutput, PlaybackHandle, RodioOutput, SilentOutput};
pub use pipeline::{AudioPipeline, SpectrumSnapshot};
